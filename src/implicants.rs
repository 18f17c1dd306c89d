//! Prime implicants and projected model enumeration.
//!
//! Two enumeration schemes are provided:
//!
//! - [`MinimalModels`]: all inclusion-minimal sets of projection variables that
//!   are true in some model. Each model found is shrunk by repeatedly demanding a
//!   strictly smaller true set (a clause over the current true set) while keeping
//!   the false part fixed (assumptions). When no smaller model exists, the last
//!   clause also blocks the set and all its supersets.
//! - [`CoverImplicants`]: prime implicants of a CNF. For each model `M`, a second
//!   solver keeps, per clause, the variables whose literal is true in `M`, and
//!   searches for a minimal cover of all clauses; the implicant takes the
//!   polarity of `M` on the covering variables and is blocked in the first solver.
//!
//! Every computation owns its solvers, so calls may run concurrently.

use std::fmt;

use crate::cnf::Formula;
use crate::limits::{Budget, Exhausted, Limits};
use crate::sat::{SolveResult, Solver};
use crate::types::{Lit, Var};

/// A conjunction of literals, kept sorted by variable.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Implicant(Vec<Lit>);

impl Implicant {
    pub fn new(mut lits: Vec<Lit>) -> Self {
        lits.sort_by_key(|l| l.var());
        lits.dedup();
        Self(lits)
    }

    pub fn lits(&self) -> &[Lit] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.0.contains(&lit)
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.iter().map(|l| l.var())
    }
}

impl fmt::Display for Implicant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for lit in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", lit.to_dimacs())?;
            first = false;
        }
        Ok(())
    }
}

/// Result of an implicant computation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// The complete list, sorted by length and then by literals.
    Implicants(Vec<Implicant>),
    Timeout,
    Memout,
    Cancelled,
}

impl Outcome {
    pub fn implicants(&self) -> Option<&[Implicant]> {
        match self {
            Outcome::Implicants(implicants) => Some(implicants),
            _ => None,
        }
    }

    pub fn into_implicants(self) -> Option<Vec<Implicant>> {
        match self {
            Outcome::Implicants(implicants) => Some(implicants),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Implicants(_))
    }

    fn finish(mut implicants: Vec<Implicant>) -> Self {
        implicants.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Outcome::Implicants(implicants)
    }
}

impl From<Exhausted> for Outcome {
    fn from(exhausted: Exhausted) -> Self {
        match exhausted {
            Exhausted::Time => Outcome::Timeout,
            Exhausted::Memory => Outcome::Memout,
            Exhausted::Cancelled => Outcome::Cancelled,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Implicants(implicants) => write!(f, "{} implicants", implicants.len()),
            Outcome::Timeout => write!(f, "timeout"),
            Outcome::Memout => write!(f, "memout"),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Computes implicants of a formula over a set of projection variables.
pub trait ImplicantOracle: Send + Sync {
    /// Runs the computation against an already started budget.
    fn compute_within(&self, formula: &Formula, projection: &[Var], budget: &Budget) -> Outcome;

    fn compute(&self, formula: &Formula, projection: &[Var], limits: &Limits) -> Outcome {
        self.compute_within(formula, projection, &Budget::start(limits))
    }
}

/// Inclusion-minimal true sets over the projection.
///
/// Implicants are returned as positive literals of the variables in the set.
#[derive(Debug, Copy, Clone, Default)]
pub struct MinimalModels;

impl ImplicantOracle for MinimalModels {
    fn compute_within(&self, formula: &Formula, projection: &[Var], budget: &Budget) -> Outcome {
        let mut solver = Solver::from_formula(formula);
        let mut implicants = Vec::new();

        loop {
            match solver.solve_under(&[], budget) {
                SolveResult::Sat => {}
                SolveResult::Unsat => break,
                SolveResult::Interrupted(exhausted) => return exhausted.into(),
            }

            loop {
                let (minim, facts): (Vec<Var>, Vec<Var>) = projection.iter().copied().partition(|&v| solver.value(v));
                solver.add_clause(minim.iter().map(|v| v.neg()));
                let assumptions: Vec<Lit> = facts.iter().map(|v| v.neg()).collect();

                match solver.solve_under(&assumptions, budget) {
                    SolveResult::Sat => {}
                    SolveResult::Unsat => {
                        log::trace!("Minimal model with {} true variables", minim.len());
                        implicants.push(Implicant::new(minim.iter().map(|v| v.pos()).collect()));
                        break;
                    }
                    SolveResult::Interrupted(exhausted) => return exhausted.into(),
                }
            }
        }

        Outcome::finish(implicants)
    }
}

/// Prime implicants of a CNF, in the polarity of the models they were found in.
#[derive(Debug, Copy, Clone, Default)]
pub struct CoverImplicants;

impl ImplicantOracle for CoverImplicants {
    fn compute_within(&self, formula: &Formula, projection: &[Var], budget: &Budget) -> Outcome {
        let mut solver = Solver::from_formula(formula);
        let mut implicants = Vec::new();

        loop {
            match solver.solve_under(&[], budget) {
                SolveResult::Sat => {}
                SolveResult::Unsat => break,
                SolveResult::Interrupted(exhausted) => return exhausted.into(),
            }

            // Clauses of the cover problem: variables satisfying each clause in the model.
            let mut cover = Solver::new();
            cover.ensure_vars(formula.num_vars() as usize);
            for clause in formula.iter() {
                let satisfying = clause
                    .lits()
                    .iter()
                    .filter(|&&l| solver.model_satisfies(l))
                    .map(|l| l.var().pos());
                cover.add_clause(satisfying);
            }

            let mut chosen = Vec::new();
            loop {
                match cover.solve_under(&[], budget) {
                    SolveResult::Sat => {}
                    SolveResult::Unsat => break,
                    SolveResult::Interrupted(exhausted) => return exhausted.into(),
                }
                let (minim, facts): (Vec<Var>, Vec<Var>) = projection.iter().copied().partition(|&v| cover.value(v));
                cover.add_clause(minim.iter().map(|v| v.neg()));
                for v in facts {
                    cover.add_clause([v.neg()]);
                }
                chosen = minim;
            }

            let implicant = Implicant::new(chosen.iter().map(|&v| v.lit(solver.value(v))).collect());
            solver.add_clause(implicant.lits().iter().map(|&l| -l));
            implicants.push(implicant);
        }

        Outcome::finish(implicants)
    }
}

/// Enumerates all distinct models projected on `projection`.
///
/// Each model is returned as the list of projection variables it sets to true.
pub fn enumerate_models(formula: &Formula, projection: &[Var], budget: &Budget) -> Result<Vec<Vec<Var>>, Exhausted> {
    let mut solver = Solver::from_formula(formula);
    let mut models = Vec::new();

    loop {
        match solver.solve_under(&[], budget) {
            SolveResult::Sat => {}
            SolveResult::Unsat => break,
            SolveResult::Interrupted(exhausted) => return Err(exhausted),
        }
        let block: Vec<Lit> = projection.iter().map(|&v| v.lit(!solver.value(v))).collect();
        let model: Vec<Var> = projection.iter().copied().filter(|&v| solver.value(v)).collect();
        log::trace!("Model {}: {:?}", models.len(), model);
        models.push(model);
        if !solver.add_clause(block) {
            break;
        }
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::cnf::Clause;

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().map(|&i| Var::new(i)).collect()
    }

    fn implicant(xs: &[i32]) -> Implicant {
        Implicant::new(xs.iter().map(|&x| Lit::from_dimacs(x)).collect())
    }

    #[test]
    fn test_minimal_models_simple() {
        // (x1 | x2) & (x1 | x3): minimal true sets are {1} and {2, 3}.
        let formula = Formula::new(vec![Clause::from([1, 2]), Clause::from([1, 3])]);
        let outcome = MinimalModels.compute(&formula, &vars(&[1, 2, 3]), &Limits::unlimited());
        assert_eq!(outcome, Outcome::Implicants(vec![implicant(&[1]), implicant(&[2, 3])]));
    }

    #[test]
    fn test_minimal_models_with_hidden_vars() {
        // x4 -> x1, x5 -> (x2 & x3), (x4 | x5). Projection excludes 4 and 5.
        let formula = Formula::new(vec![
            Clause::from([-4, 1]),
            Clause::from([-5, 2]),
            Clause::from([-5, 3]),
            Clause::from([4, 5]),
        ]);
        let outcome = MinimalModels.compute(&formula, &vars(&[1, 2, 3]), &Limits::unlimited());
        assert_eq!(outcome, Outcome::Implicants(vec![implicant(&[1]), implicant(&[2, 3])]));
    }

    #[test]
    fn test_minimal_models_empty_set() {
        let formula = Formula::with_num_vars(vec![Clause::from([1, -1])], 2);
        let outcome = MinimalModels.compute(&formula, &vars(&[1, 2]), &Limits::unlimited());
        assert_eq!(outcome, Outcome::Implicants(vec![Implicant::new(vec![])]));
    }

    #[test]
    fn test_minimal_models_unsat() {
        let formula = Formula::new(vec![Clause::from([1]), Clause::from([-1])]);
        let outcome = MinimalModels.compute(&formula, &vars(&[1]), &Limits::unlimited());
        assert_eq!(outcome, Outcome::Implicants(vec![]));
    }

    #[test]
    fn test_cover_implicants() {
        // (x1 | x2) & (~x1 | x3): prime implicants are {x1, x3}, {~x1, x2}, {x2, x3}.
        let formula = Formula::new(vec![Clause::from([1, 2]), Clause::from([-1, 3])]);
        let outcome = CoverImplicants.compute(&formula, &vars(&[1, 2, 3]), &Limits::unlimited());
        let implicants = outcome.into_implicants().unwrap();
        for imp in &implicants {
            // Every implicant satisfies every clause.
            for clause in formula.iter() {
                assert!(clause.lits().iter().any(|&l| imp.contains(l)), "{} misses {}", imp, clause);
            }
        }
        assert!(implicants.contains(&implicant(&[1, 3])));
        assert!(implicants.contains(&implicant(&[-1, 2])));
    }

    #[test]
    fn test_cancelled_outcome() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let formula = Formula::new(vec![Clause::from([1, 2])]);
        let budget = Budget::unlimited().with_cancel(Arc::new(AtomicBool::new(true)));
        let outcome = MinimalModels.compute_within(&formula, &vars(&[1, 2]), &budget);
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_enumerate_models_projected() {
        // Exactly one of x1, x2, x3; x4 is free and hidden.
        let formula = Formula::with_num_vars(
            vec![
                Clause::from([1, 2, 3]),
                Clause::from([-1, -2]),
                Clause::from([-1, -3]),
                Clause::from([-2, -3]),
            ],
            4,
        );
        let mut models = enumerate_models(&formula, &vars(&[1, 2, 3]), &Budget::unlimited()).unwrap();
        models.sort();
        assert_eq!(models, vec![vars(&[1]), vars(&[2]), vars(&[3])]);
    }

    #[test]
    fn test_implicant_display() {
        assert_eq!(implicant(&[3, -1]).to_string(), "-1 3");
    }
}
