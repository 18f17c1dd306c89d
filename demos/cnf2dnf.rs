use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use forest_implicants::cnf::Formula;
use forest_implicants::limits::Limits;
use forest_implicants::reduce::{reduce, ReduceConfig, VarOrder};
use forest_implicants::types::Var;

/// Replace sub-formulas by their prime implicants.
#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// DIMACS CNF file to process.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Variables to eliminate, in the given order.
    #[clap(short, long, value_name = "VAR", num_args = 1.., conflicts_with = "num", required_unless_present = "num")]
    vars: Vec<u32>,

    /// Number of variables to eliminate, starting with the most frequent one.
    #[clap(short, long, value_name = "INT")]
    num: Option<usize>,

    /// Time limit per variable (seconds).
    #[clap(short, long, value_name = "INT", default_value = "10")]
    tlim: u64,

    /// Memory limit per variable (megabytes).
    #[clap(short, long, value_name = "INT", default_value = "500")]
    mlim: usize,

    /// Number of worker threads.
    #[clap(short, long, value_name = "INT", default_value = "1")]
    jobs: usize,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    log::debug!("args = {:?}", args);

    let formula = Formula::parse_dimacs(File::open(&args.file)?)?;

    let order = if args.vars.is_empty() {
        VarOrder::Frequency
    } else {
        if let Some(&bad) = args.vars.iter().find(|&&v| v == 0 || v > formula.num_vars()) {
            color_eyre::eyre::bail!("variable {} is not in the formula", bad);
        }
        VarOrder::Given(args.vars.iter().map(|&v| Var::new(v)).collect())
    };

    let config = ReduceConfig {
        order,
        target: args.num,
        jobs: args.jobs,
        limits: Limits::unlimited()
            .with_time(Duration::from_secs(args.tlim))
            .with_memory(args.mlim),
    };

    let reduction = reduce(&formula, &config);
    print!("{}", reduction);
    Ok(())
}
