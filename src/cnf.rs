//! Clauses, CNF formulas, and the DIMACS CNF format.
//!
//! A [`Formula`] is an immutable conjunction of [`Clause`]s. Encoders build the
//! base formula once and derive per-query formulas with [`Formula::extended`],
//! leaving the base untouched.
//!
//! # DIMACS CNF
//!
//! ```text
//! c comment
//! p cnf <num_vars> <num_clauses>
//! 1 -2 3 0
//! -1 2 0
//! ```
//!
//! Clauses are terminated by `0` and may span several lines. Parsing is done
//! by `varisat-dimacs`.

use std::fmt;
use std::io::{self, Read};

use varisat_dimacs::DimacsParser;
use varisat_formula::CnfFormula;

use crate::types::{Lit, Var};

/// A disjunction of literals.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Clause(Vec<Lit>);

impl Clause {
    pub fn new(lits: Vec<Lit>) -> Self {
        Self(lits)
    }

    /// Binary clause `a -> b`, i.e. `(~a | b)`.
    pub fn implies(a: Lit, b: Lit) -> Self {
        Self(vec![-a, b])
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

    /// Largest variable mentioned in the clause.
    pub fn max_var(&self) -> Option<Var> {
        self.0.iter().map(|lit| lit.var()).max()
    }
}

impl From<Vec<Lit>> for Clause {
    fn from(lits: Vec<Lit>) -> Self {
        Self(lits)
    }
}

impl<const N: usize> From<[i32; N]> for Clause {
    fn from(lits: [i32; N]) -> Self {
        Self(lits.into_iter().map(Lit::from_dimacs).collect())
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lit in &self.0 {
            write!(f, "{} ", lit.to_dimacs())?;
        }
        write!(f, "0")
    }
}

/// A conjunction of clauses.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Formula {
    clauses: Vec<Clause>,
    num_vars: u32,
}

impl Formula {
    pub fn new(clauses: Vec<Clause>) -> Self {
        let num_vars = clauses.iter().filter_map(Clause::max_var).map(Var::id).max().unwrap_or(0);
        Self { clauses, num_vars }
    }

    /// Same as [`Formula::new`], but declares at least `num_vars` variables,
    /// including ones that occur in no clause.
    pub fn with_num_vars(clauses: Vec<Clause>, num_vars: u32) -> Self {
        let mut formula = Self::new(clauses);
        formula.num_vars = formula.num_vars.max(num_vars);
        formula
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    /// Returns a new formula with the extra clauses appended.
    pub fn extended(&self, extra: impl IntoIterator<Item = Clause>) -> Formula {
        let mut clauses = self.clauses.clone();
        clauses.extend(extra);
        Formula::with_num_vars(clauses, self.num_vars)
    }

    /// Parses a formula in DIMACS CNF format.
    ///
    /// The declared variable count is kept even when the last variables occur
    /// in no clause. A clause count that disagrees with the header is an error.
    pub fn parse_dimacs<R: Read>(mut reader: R) -> Result<Formula, DimacsError> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;

        let mut parser = DimacsParser::new();
        parser.parse_chunk(&input).map_err(DimacsError::parse)?;
        parser.eof().map_err(DimacsError::parse)?;
        parser.check_header().map_err(DimacsError::parse)?;
        let declared = parser.header().map_or(0, |header| header.var_count);

        let mut formula = Formula::from_varisat(&parser.take_formula());
        formula.num_vars = formula.num_vars.max(declared as u32);
        Ok(formula)
    }

    /// Converts a formula of the `varisat` family.
    pub fn from_varisat(cnf: &CnfFormula) -> Formula {
        let clauses = cnf
            .iter()
            .map(|lits| {
                Clause::new(
                    lits.iter()
                        .map(|lit| Lit::from_dimacs(lit.to_dimacs() as i32))
                        .collect(),
                )
            })
            .collect();
        Formula::with_num_vars(clauses, cnf.var_count() as u32)
    }

    /// Renders the formula in DIMACS CNF format, header included.
    pub fn to_dimacs(&self) -> String {
        let mut output = format!("p cnf {} {}\n", self.num_vars, self.clauses.len());
        for clause in &self.clauses {
            output.push_str(&clause.to_string());
            output.push('\n');
        }
        output
    }
}

impl FromIterator<Clause> for Formula {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        Formula::new(iter.into_iter().collect())
    }
}

/// Error type for DIMACS input.
#[derive(Debug)]
pub enum DimacsError {
    /// File I/O error.
    Io(io::Error),
    /// Parse error with message.
    Parse(String),
}

impl DimacsError {
    fn parse(e: impl fmt::Display) -> Self {
        DimacsError::Parse(e.to_string())
    }
}

impl From<io::Error> for DimacsError {
    fn from(e: io::Error) -> Self {
        DimacsError::Io(e)
    }
}

impl fmt::Display for DimacsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimacsError::Io(e) => write!(f, "I/O error: {}", e),
            DimacsError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for DimacsError {}
