//! Formula reduction: replacing the clauses around a variable by their prime implicants.
//!
//! For every candidate variable `v`, the clauses containing `v` (positively or
//! negatively) form a sub-formula whose prime implicants are computed with
//! [`CoverImplicants`] under per-task limits. A successful computation turns the
//! sub-formula into a DNF, which "eliminates" `v`. Candidates are processed by a
//! pool of worker threads; once the requested number of eliminations is reached,
//! outstanding work is cancelled.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::cnf::{Clause, Formula};
use crate::implicants::{CoverImplicants, Implicant, ImplicantOracle, Outcome};
use crate::limits::{Budget, Exhausted, Limits};
use crate::types::Var;

/// Order in which variables are tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarOrder {
    /// Exactly these variables, in this order.
    Given(Vec<Var>),
    /// All occurring variables by decreasing [`frequency_order`] score.
    Frequency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceConfig {
    pub order: VarOrder,
    /// Stop after this many eliminations. `None` tries every variable.
    pub target: Option<usize>,
    pub jobs: usize,
    /// Limits of every single task.
    pub limits: Limits,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            order: VarOrder::Frequency,
            target: None,
            jobs: 1,
            limits: Limits::unlimited()
                .with_time(Duration::from_secs(10))
                .with_memory(500),
        }
    }
}

/// Clause occurrence lists of every variable.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    formula: &'a Formula,
    clauses_of: Vec<Vec<usize>>,
}

impl<'a> Occurrences<'a> {
    pub fn new(formula: &'a Formula) -> Self {
        let mut clauses_of = vec![Vec::new(); formula.num_vars() as usize];
        for (i, clause) in formula.iter().enumerate() {
            let vars: BTreeSet<Var> = clause.lits().iter().map(|l| l.var()).collect();
            for var in vars {
                clauses_of[var.index()].push(i);
            }
        }
        Self { formula, clauses_of }
    }

    /// Number of clauses containing `var`.
    pub fn count(&self, var: Var) -> usize {
        self.clauses_of.get(var.index()).map_or(0, Vec::len)
    }

    /// The clauses containing `var`, and the variables they mention.
    pub fn subformula(&self, var: Var) -> (Formula, Vec<Var>) {
        let clauses: Vec<Clause> = self
            .clauses_of
            .get(var.index())
            .into_iter()
            .flatten()
            .map(|&i| self.formula.clauses()[i].clone())
            .collect();
        let projection: BTreeSet<Var> = clauses.iter().flat_map(|c| c.lits().iter().map(|l| l.var())).collect();
        (Formula::new(clauses), projection.into_iter().collect())
    }
}

/// Occurring variables by decreasing score `sum over occurrences of 1 / |clause|^2`.
///
/// Ties are broken towards the higher variable id.
pub fn frequency_order(formula: &Formula) -> Vec<Var> {
    let mut scores = vec![0.0f64; formula.num_vars() as usize];
    for clause in formula.iter() {
        let weight = 1.0 / (clause.len() * clause.len()) as f64;
        for lit in clause.lits() {
            scores[lit.var().index()] += weight;
        }
    }
    let mut order: Vec<Var> = (1..=formula.num_vars())
        .map(Var::new)
        .filter(|v| scores[v.index()] > 0.0)
        .collect();
    order.sort_by(|a, b| {
        scores[b.index()]
            .total_cmp(&scores[a.index()])
            .then_with(|| b.cmp(a))
    });
    order
}

/// Result of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskReport {
    Eliminated {
        var: Var,
        clauses: usize,
        dnf: Vec<Implicant>,
    },
    Skipped {
        var: Var,
        reason: Exhausted,
    },
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskReport::Skipped { var, reason } => {
                write!(f, "c skipped elimination of variable {} due to {}", var.id(), reason)
            }
            TaskReport::Eliminated { var, clauses, dnf } => {
                writeln!(
                    f,
                    "c found {} prime implicants for {} clauses containing variable {}",
                    dnf.len(),
                    clauses,
                    var.id()
                )?;
                write!(f, "DNF")?;
                for term in dnf {
                    if term.is_empty() {
                        write!(f, " 0")?;
                    } else {
                        write!(f, " {} 0", term)?;
                    }
                }
                write!(f, " 0")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reduction {
    /// Task reports, in completion order.
    pub reports: Vec<TaskReport>,
    pub eliminated: Vec<Var>,
    /// Clauses that mention no eliminated variable.
    pub remaining: Vec<Clause>,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{}", report)?;
        }
        for clause in &self.remaining {
            writeln!(f, "{}", clause)?;
        }
        Ok(())
    }
}

struct TaskResult {
    var: Var,
    clauses: usize,
    outcome: Outcome,
}

fn worker(
    occurrences: &Occurrences<'_>,
    limits: &Limits,
    cancel: &Arc<AtomicBool>,
    tasks: Receiver<Var>,
    results: Sender<TaskResult>,
) {
    for var in tasks.iter() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let (subformula, projection) = occurrences.subformula(var);
        log::debug!(
            "Variable {}: {} clauses over {} variables",
            var.id(),
            subformula.num_clauses(),
            projection.len()
        );
        let budget = Budget::start(limits).with_cancel(cancel.clone());
        let outcome = CoverImplicants.compute_within(&subformula, &projection, &budget);
        let result = TaskResult {
            var,
            clauses: subformula.num_clauses(),
            outcome,
        };
        // The receiver is gone once the target is reached.
        if results.send(result).is_err() {
            break;
        }
    }
}

/// Runs the reduction.
pub fn reduce(formula: &Formula, config: &ReduceConfig) -> Reduction {
    let occurrences = Occurrences::new(formula);
    let order = match &config.order {
        VarOrder::Given(vars) => vars.clone(),
        VarOrder::Frequency => frequency_order(formula),
    };
    log::info!("Trying {} variables with {} workers", order.len(), config.jobs.max(1));

    let (task_snd, task_rcv) = crossbeam_channel::unbounded();
    for &var in &order {
        // Cannot fail: the receiver is alive.
        let _ = task_snd.send(var);
    }
    drop(task_snd);

    let (result_snd, result_rcv) = crossbeam_channel::unbounded();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut reports = Vec::new();
    let mut eliminated = Vec::new();

    thread::scope(|scope| {
        for _ in 0..config.jobs.max(1) {
            let tasks = task_rcv.clone();
            let results = result_snd.clone();
            let occurrences = &occurrences;
            let cancel = &cancel;
            let limits = &config.limits;
            scope.spawn(move || worker(occurrences, limits, cancel, tasks, results));
        }
        drop(result_snd);

        for result in result_rcv.iter() {
            if config.target.is_some_and(|t| eliminated.len() >= t) {
                continue;
            }
            match result.outcome {
                Outcome::Implicants(dnf) => {
                    log::info!("Eliminated variable {} ({} implicants)", result.var.id(), dnf.len());
                    eliminated.push(result.var);
                    reports.push(TaskReport::Eliminated {
                        var: result.var,
                        clauses: result.clauses,
                        dnf,
                    });
                    if config.target.is_some_and(|t| eliminated.len() >= t) {
                        log::info!("Reached {} eliminations, cancelling remaining tasks", eliminated.len());
                        cancel.store(true, Ordering::Relaxed);
                    }
                }
                Outcome::Timeout => reports.push(TaskReport::Skipped {
                    var: result.var,
                    reason: Exhausted::Time,
                }),
                Outcome::Memout => reports.push(TaskReport::Skipped {
                    var: result.var,
                    reason: Exhausted::Memory,
                }),
                Outcome::Cancelled => {}
            }
        }
    });

    let removed: BTreeSet<Var> = eliminated.iter().copied().collect();
    let remaining = formula
        .iter()
        .filter(|clause| !clause.lits().iter().any(|l| removed.contains(&l.var())))
        .cloned()
        .collect();

    Reduction {
        reports,
        eliminated,
        remaining,
    }
}
