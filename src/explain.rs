//! Explanation driver: encodes a model once and computes prime implicants per class.

use std::fmt;

use rayon::prelude::*;

use crate::cnf::Formula;
use crate::decode::{Decoder, Predicate};
use crate::encoding::Encoding;
use crate::forest_encoder::ForestEncoder;
use crate::implicants::{Implicant, ImplicantOracle, MinimalModels, Outcome};
use crate::limits::{Budget, Exhausted, Limits};
use crate::model::{ClassId, Model, TreeEnsemble, TreeId};
use crate::tree_encoder::TreeEncoder;

/// Configuration of an [`Explainer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainConfig {
    /// Number of worker threads computing implicants.
    pub jobs: usize,
    /// Limits applied to every implicant computation and to the combination enumeration.
    pub limits: Limits,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            limits: Limits::unlimited(),
        }
    }
}

impl ExplainConfig {
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// The encoder matching the model shape.
#[derive(Debug, Clone)]
pub enum Encoder {
    Tree(TreeEncoder),
    Forest(ForestEncoder),
}

impl Encoder {
    pub fn new(model: &Model, limits: &Limits) -> Result<Self, Exhausted> {
        match model {
            Model::Tree(model) => Ok(Encoder::Tree(TreeEncoder::new(model))),
            Model::Forest(model) => Ok(Encoder::Forest(ForestEncoder::with_budget(model, &Budget::start(limits))?)),
        }
    }

    pub fn encoding(&self) -> &dyn Encoding {
        match self {
            Encoder::Tree(encoder) => encoder,
            Encoder::Forest(encoder) => encoder,
        }
    }
}

/// Prime implicants for one target class set.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub classes: Vec<ClassId>,
    pub outcome: Outcome,
}

impl Explanation {
    /// The implicants, or an empty slice if the computation was interrupted.
    pub fn implicants(&self) -> &[Implicant] {
        self.outcome.implicants().unwrap_or(&[])
    }
}

/// Encodes a model once and answers explanation queries on a worker pool.
pub struct Explainer<O = MinimalModels> {
    model: Model,
    encoder: Encoder,
    oracle: O,
    pool: rayon::ThreadPool,
    config: ExplainConfig,
}

impl Explainer<MinimalModels> {
    pub fn new(model: Model, config: ExplainConfig) -> Result<Self, ExplainError> {
        Self::with_oracle(model, config, MinimalModels)
    }
}

impl<O: ImplicantOracle> Explainer<O> {
    pub fn with_oracle(model: Model, config: ExplainConfig, oracle: O) -> Result<Self, ExplainError> {
        if config.jobs == 0 {
            return Err(ExplainError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.jobs).build()?;
        let encoder = Encoder::new(&model, &config.limits)?;
        log::info!(
            "Encoded {} model: {} variables, {} clauses, {} interval variables",
            model.kind(),
            encoder.encoding().base().num_vars(),
            encoder.encoding().base().num_clauses(),
            encoder.encoding().projection().len()
        );
        Ok(Self {
            model,
            encoder,
            oracle,
            pool,
            config,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    pub fn class_id(&self, name: &str) -> Result<ClassId, ExplainError> {
        self.model
            .ensemble()
            .schema()
            .class_id(name)
            .ok_or_else(|| ExplainError::UnknownClass(name.to_string()))
    }

    /// Explains a single class.
    pub fn explain_class(&mut self, class: ClassId) -> Result<Explanation, ExplainError> {
        self.explain_classes(&[class])
    }

    /// Explains "the model predicts one of `classes`".
    pub fn explain_classes(&mut self, classes: &[ClassId]) -> Result<Explanation, ExplainError> {
        let mut explanations = self.explain_sets(&[classes.to_vec()])?;
        Ok(explanations.remove(0))
    }

    /// Same as [`Explainer::explain_classes`], with classes given by name.
    pub fn explain_class_names(&mut self, names: &[&str]) -> Result<Explanation, ExplainError> {
        let classes = names
            .iter()
            .map(|name| self.class_id(name))
            .collect::<Result<Vec<_>, _>>()?;
        self.explain_classes(&classes)
    }

    /// Explains every class separately, in class order.
    pub fn explain_all(&mut self) -> Result<Vec<Explanation>, ExplainError> {
        let sets: Vec<Vec<ClassId>> = (0..self.model.ensemble().n_classes()).map(|c| vec![c]).collect();
        self.explain_sets(&sets)
    }

    /// Explains several class sets. Targets are encoded one after another; the
    /// implicant computations run concurrently on the worker pool.
    pub fn explain_sets(&mut self, sets: &[Vec<ClassId>]) -> Result<Vec<Explanation>, ExplainError> {
        let n_classes = self.model.ensemble().n_classes();
        if let Some(&class) = sets.iter().flatten().find(|&&c| c >= n_classes) {
            return Err(ExplainError::ClassOutOfRange(class));
        }

        let queries: Vec<Option<Formula>> = sets
            .iter()
            .map(|classes| {
                let encoding = self.encoder.encoding();
                let target = encoding.encode_target(classes)?;
                Some(encoding.base().extended(target))
            })
            .collect();

        let projection = self.encoder.encoding().projection().to_vec();
        let oracle = &self.oracle;
        let limits = self.config.limits;
        let outcomes: Vec<Outcome> = self.pool.install(|| {
            queries
                .par_iter()
                .map(|query| match query {
                    Some(formula) => oracle.compute(formula, &projection, &limits),
                    None => Outcome::Implicants(Vec::new()),
                })
                .collect()
        });

        let explanations: Vec<Explanation> = sets
            .iter()
            .zip(outcomes)
            .map(|(classes, outcome)| Explanation {
                classes: classes.clone(),
                outcome,
            })
            .collect();
        for explanation in &explanations {
            log::info!("Classes {:?}: {}", explanation.classes, explanation.outcome);
        }
        Ok(explanations)
    }

    pub fn decoder(&self) -> Decoder<'_> {
        let ensemble = self.model.ensemble();
        Decoder::new(ensemble.schema(), ensemble.thresholds(), self.encoder.encoding().allocator())
    }

    pub fn decode(&self, implicant: &Implicant) -> Predicate {
        self.decoder().decode(implicant)
    }

    /// Leaf and implicant statistics for a single-class explanation.
    ///
    /// Leaves are those of the first class of the set. Fails on an explanation
    /// with no class.
    pub fn report(&self, explanation: &Explanation) -> Result<ClassReport, ExplainError> {
        let ensemble = self.model.ensemble();
        let class = explanation.classes.first().copied().ok_or(ExplainError::EmptyClassSet)?;

        let mut leaves_per_tree = Vec::with_capacity(ensemble.n_trees());
        let mut leaves = Vec::new();
        for (tree, data) in ensemble.trees().iter().enumerate() {
            let of_class = data.leaves_of_class(class);
            leaves_per_tree.push(of_class.len());
            leaves.extend(of_class.into_iter().map(|leaf| LeafStat {
                tree,
                depth: data.depth(leaf),
                samples: data.samples_total(leaf),
            }));
        }
        leaves.sort_by(|a, b| b.samples.total_cmp(&a.samples));

        let predicates: Vec<Predicate> = explanation.implicants().iter().map(|imp| self.decode(imp)).collect();
        let mut cases: Vec<usize> = predicates.iter().map(|p| p.cases).collect();
        cases.sort_unstable();

        Ok(ClassReport {
            class,
            name: ensemble.schema().class_name(class).to_string(),
            leaves_per_tree,
            leaves,
            outcome: explanation.outcome.clone(),
            cases,
            predicates,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafStat {
    pub tree: TreeId,
    pub depth: usize,
    pub samples: f64,
}

/// Per-class summary: leaves of the class and the decoded implicants.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassReport {
    pub class: ClassId,
    pub name: String,
    pub leaves_per_tree: Vec<usize>,
    /// Leaves of the class, by decreasing sample count.
    pub leaves: Vec<LeafStat>,
    pub outcome: Outcome,
    /// Condition counts of the implicants, ascending.
    pub cases: Vec<usize>,
    pub predicates: Vec<Predicate>,
}

impl ClassReport {
    pub fn leaf_depths(&self) -> Vec<usize> {
        let mut depths: Vec<usize> = self.leaves.iter().map(|l| l.depth).collect();
        depths.sort_unstable();
        depths
    }
}

impl fmt::Display for ClassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(42))?;
        writeln!(f, "Explaining class: {}", self.name)?;
        if self.leaves_per_tree.len() == 1 {
            writeln!(f, "Number of leaf nodes: {}", self.leaves_per_tree[0])?;
        } else {
            for (tree, n) in self.leaves_per_tree.iter().enumerate() {
                writeln!(f, "Number of leaf nodes for tree {}: {}", tree, n)?;
            }
        }
        match self.outcome.implicants() {
            Some(implicants) => writeln!(f, "Number of prime implicants: {}", implicants.len())?,
            None => writeln!(f, "Prime implicants: {}", self.outcome)?,
        }
        writeln!(f, "Leaf depths:                 {:?}", self.leaf_depths())?;
        writeln!(f, "Implicant case distinctions: {:?}", self.cases)?;
        for predicate in &self.predicates {
            writeln!(f, "  {}", predicate.query)?;
        }
        Ok(())
    }
}

/// Error type for explanation runs.
#[derive(Debug)]
pub enum ExplainError {
    UnknownClass(String),
    ClassOutOfRange(ClassId),
    /// A report was asked for an explanation with no class.
    EmptyClassSet,
    NoWorkers,
    Pool(rayon::ThreadPoolBuildError),
    /// The combination enumeration hit a limit.
    Interrupted(Exhausted),
}

impl From<rayon::ThreadPoolBuildError> for ExplainError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        ExplainError::Pool(e)
    }
}

impl From<Exhausted> for ExplainError {
    fn from(e: Exhausted) -> Self {
        ExplainError::Interrupted(e)
    }
}

impl fmt::Display for ExplainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplainError::UnknownClass(name) => write!(f, "unknown class '{}'", name),
            ExplainError::ClassOutOfRange(class) => write!(f, "class id {} is out of range", class),
            ExplainError::EmptyClassSet => write!(f, "explanation has no target class"),
            ExplainError::NoWorkers => write!(f, "at least one worker thread is required"),
            ExplainError::Pool(e) => write!(f, "failed to build worker pool: {}", e),
            ExplainError::Interrupted(e) => write!(f, "combination enumeration interrupted: {}", e),
        }
    }
}

impl std::error::Error for ExplainError {}
