//! Incremental SAT solving on top of [`varisat`].
//!
//! [`Solver`] keeps the crate's own [`Lit`]/[`Var`] types at its boundary and
//! adds two things the implicant oracles need: a [`Budget`] check before every
//! solver call, and a dense model where variables the solver never saw read as
//! `false`.

use std::collections::HashMap;
use std::mem;

use varisat::ExtendFormula;

use crate::cnf::Formula;
use crate::limits::{Budget, Exhausted};
use crate::types::{Lit, Var};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveResult {
    Sat,
    Unsat,
    Interrupted(Exhausted),
}

fn to_varisat(lit: Lit) -> varisat::Lit {
    varisat::Lit::from_dimacs(lit.to_dimacs() as isize)
}

fn from_varisat(lit: varisat::Lit) -> Lit {
    Lit::from_dimacs(lit.to_dimacs() as i32)
}

pub struct Solver {
    inner: varisat::Solver<'static>,
    /// Variables occurring in some added clause.
    known: Vec<bool>,
    num_clauses: usize,
    num_lits: usize,
    /// Set once an empty clause was added.
    unsat: bool,
    model: Vec<bool>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self {
            inner: varisat::Solver::new(),
            known: Vec::new(),
            num_clauses: 0,
            num_lits: 0,
            unsat: false,
            model: Vec::new(),
        }
    }

    /// Creates a solver loaded with all clauses of the formula.
    pub fn from_formula(formula: &Formula) -> Self {
        let mut solver = Self::new();
        solver.add_formula(formula);
        solver
    }

    pub fn num_vars(&self) -> usize {
        self.known.len()
    }

    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    /// Declares variables `1..=n`, so that models cover them.
    pub fn ensure_vars(&mut self, n: usize) {
        if self.known.len() < n {
            self.known.resize(n, false);
        }
    }

    /// Rough estimate of the memory held by the solver, in bytes.
    pub fn memory_usage(&self) -> usize {
        // Clause storage plus watch lists, and per-variable state.
        self.num_lits * 3 * mem::size_of::<varisat::Lit>()
            + self.num_clauses * 4 * mem::size_of::<usize>()
            + self.known.len() * 64
    }

    /// Adds a clause. Returns `false` if the solver became trivially unsatisfiable.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) -> bool {
        let lits: Vec<varisat::Lit> = lits.into_iter().map(to_varisat).collect();
        if lits.is_empty() {
            self.unsat = true;
            return false;
        }
        if let Some(max) = lits.iter().map(|l| l.var().index() + 1).max() {
            self.ensure_vars(max);
        }
        for lit in &lits {
            self.known[lit.var().index()] = true;
        }
        self.num_clauses += 1;
        self.num_lits += lits.len();
        self.inner.add_clause(&lits);
        !self.unsat
    }

    pub fn add_formula(&mut self, formula: &Formula) -> bool {
        self.ensure_vars(formula.num_vars() as usize);
        for clause in formula.iter() {
            self.add_clause(clause.lits().iter().copied());
        }
        !self.unsat
    }

    pub fn solve(&mut self) -> SolveResult {
        self.solve_under(&[], &Budget::unlimited())
    }

    /// Solves under the given assumptions, after checking the budget.
    ///
    /// An `Unsat` answer under non-empty assumptions does not make the solver
    /// permanently unsatisfiable.
    pub fn solve_under(&mut self, assumptions: &[Lit], budget: &Budget) -> SolveResult {
        self.model.clear();
        if self.unsat {
            return SolveResult::Unsat;
        }
        if let Some(exhausted) = budget.check(self.memory_usage()) {
            return SolveResult::Interrupted(exhausted);
        }

        // The solver has never seen these variables: they are free, so a
        // positive assumption holds as soon as the rest is satisfiable.
        let mut free: HashMap<Var, bool> = HashMap::new();
        let mut passed = Vec::with_capacity(assumptions.len());
        for &lit in assumptions {
            let seen = self.known.get(lit.var().index()).copied().unwrap_or(false);
            if seen {
                passed.push(to_varisat(lit));
            } else if free.insert(lit.var(), lit.is_positive()) == Some(!lit.is_positive()) {
                return SolveResult::Unsat;
            }
        }

        self.inner.assume(&passed);
        let result = self.inner.solve();
        self.inner.assume(&[]);

        match result {
            Ok(true) => {
                let n = self
                    .known
                    .len()
                    .max(free.keys().map(|v| v.index() + 1).max().unwrap_or(0));
                let mut model = vec![false; n];
                for lit in self.inner.model().unwrap_or_default() {
                    let lit = from_varisat(lit);
                    if lit.var().index() < n {
                        model[lit.var().index()] = lit.is_positive();
                    }
                }
                for (var, value) in free {
                    model[var.index()] = value;
                }
                self.model = model;
                SolveResult::Sat
            }
            Ok(false) => SolveResult::Unsat,
            Err(e) => {
                log::warn!("SAT solver stopped: {}", e);
                SolveResult::Interrupted(Exhausted::Cancelled)
            }
        }
    }

    /// Value of a variable in the last model. Variables beyond the model are `false`.
    pub fn value(&self, var: Var) -> bool {
        self.model.get(var.index()).copied().unwrap_or(false)
    }

    /// Whether a literal is satisfied by the last model.
    pub fn model_satisfies(&self, lit: Lit) -> bool {
        self.value(lit.var()) == lit.is_positive()
    }

    /// The last model, indexed by `Var::index`.
    pub fn model(&self) -> &[bool] {
        &self.model
    }
}
