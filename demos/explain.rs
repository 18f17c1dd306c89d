use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use forest_implicants::explain::{ExplainConfig, Explainer};
use forest_implicants::limits::Limits;
use forest_implicants::model::{Model, TreeEnsemble};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Model description (JSON).
    #[arg(value_name = "FILE")]
    model: PathBuf,

    /// Classes to explain together, by name. All classes separately if omitted.
    #[clap(long, value_name = "NAME")]
    class: Vec<String>,

    /// Number of worker threads.
    #[clap(short, long, value_name = "INT", default_value = "4")]
    jobs: usize,

    /// Time limit per class (seconds).
    #[clap(long, value_name = "INT")]
    tlim: Option<u64>,

    /// Print the trees before explaining.
    #[clap(long)]
    print: bool,

    /// Emit the decoded predicates as JSON instead of a report.
    #[clap(long)]
    json: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    log::debug!("args = {:?}", args);

    let model = Model::from_json(File::open(&args.model)?)?;
    if args.print {
        let ensemble = model.ensemble();
        for (i, tree) in ensemble.trees().iter().enumerate() {
            println!("Tree {}:", i);
            print!("{}", tree.render(ensemble.schema()));
        }
    }

    let mut limits = Limits::unlimited();
    if let Some(seconds) = args.tlim {
        limits = limits.with_time(Duration::from_secs(seconds));
    }
    let config = ExplainConfig::default().with_jobs(args.jobs).with_limits(limits);
    let mut explainer = Explainer::new(model, config)?;

    let explanations = if args.class.is_empty() {
        explainer.explain_all()?
    } else {
        let names: Vec<&str> = args.class.iter().map(String::as_str).collect();
        vec![explainer.explain_class_names(&names)?]
    };

    if args.json {
        let output: Vec<_> = explanations
            .iter()
            .map(|explanation| {
                let classes: Vec<&str> = explanation
                    .classes
                    .iter()
                    .map(|&c| explainer.model().ensemble().schema().class_name(c))
                    .collect();
                let predicates: Vec<_> = explanation.implicants().iter().map(|imp| explainer.decode(imp)).collect();
                serde_json::json!({
                    "classes": classes,
                    "status": explanation.outcome.to_string(),
                    "predicates": predicates,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for explanation in &explanations {
            print!("{}", explainer.report(explanation)?);
        }
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
