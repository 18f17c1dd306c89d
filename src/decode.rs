//! Decoding implicants into feature-threshold predicates.
//!
//! An implicant is a set of ruled-out intervals. Scanning consecutive interval
//! pairs `(i, i + 1)` of a feature, a boundary where exactly one side is ruled
//! out becomes a condition on threshold `i`: `feature > t` when interval `i` is
//! ruled out, `feature <= t` when interval `i + 1` is.

use std::fmt;

use serde::Serialize;

use crate::implicants::Implicant;
use crate::model::{FeatureId, Schema, Thresholds};
use crate::vars::VarAllocator;

/// Number of conditions above which the query is split in two halves.
const SPLIT_QUERY_ABOVE: usize = 10;

/// Formats a threshold with six decimals, trailing zeros and dot removed.
pub fn format_threshold(threshold: f64) -> String {
    let text = format!("{:.6}", threshold);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum Comparison {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Le => write!(f, "<="),
            Comparison::Gt => write!(f, ">"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub feature: FeatureId,
    pub name: String,
    pub op: Comparison,
    pub threshold: f64,
}

impl Condition {
    pub fn holds(&self, x: &[f64]) -> bool {
        match self.op {
            Comparison::Le => x[self.feature] <= self.threshold,
            Comparison::Gt => x[self.feature] > self.threshold,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.op, format_threshold(self.threshold))
    }
}

/// A conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    /// Number of distinct features with at least one condition.
    pub features: usize,
    /// Number of conditions.
    pub cases: usize,
    pub query: String,
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn holds(&self, x: &[f64]) -> bool {
        self.conditions.iter().all(|c| c.holds(x))
    }
}

fn render_query(conditions: &[Condition]) -> String {
    let parts: Vec<String> = conditions.iter().map(Condition::to_string).collect();
    if parts.len() > SPLIT_QUERY_ABOVE {
        let (first, second) = parts.split_at(parts.len() / 2);
        format!("({}) and ({})", first.join(" and "), second.join(" and "))
    } else {
        parts.join(" and ")
    }
}

/// Decodes implicants over the interval variables of one encoder.
#[derive(Debug, Copy, Clone)]
pub struct Decoder<'a> {
    schema: &'a Schema,
    thresholds: &'a Thresholds,
    vars: &'a VarAllocator,
}

impl<'a> Decoder<'a> {
    pub fn new(schema: &'a Schema, thresholds: &'a Thresholds, vars: &'a VarAllocator) -> Self {
        Self {
            schema,
            thresholds,
            vars,
        }
    }

    /// # Panics
    ///
    /// Panics if the implicant mentions a variable that is not an interval variable.
    pub fn decode(&self, implicant: &Implicant) -> Predicate {
        let mut ruled_out: Vec<Vec<bool>> = (0..self.schema.n_features())
            .map(|feature| vec![false; self.thresholds.n_intervals(feature)])
            .collect();
        for lit in implicant.lits() {
            let (feature, index) = self.vars.interval_of(lit.var());
            ruled_out[feature][index] = lit.is_positive();
        }

        let mut conditions = Vec::new();
        let mut features = 0;
        for (feature, ruled) in ruled_out.iter().enumerate() {
            let before = conditions.len();
            for (i, pair) in ruled.windows(2).enumerate() {
                if pair[0] != pair[1] {
                    conditions.push(Condition {
                        feature,
                        name: self.schema.feature_name(feature).to_string(),
                        op: if pair[0] { Comparison::Gt } else { Comparison::Le },
                        threshold: self.thresholds.value(feature, i),
                    });
                }
            }
            if conditions.len() > before {
                features += 1;
            }
        }

        Predicate {
            features,
            cases: conditions.len(),
            query: render_query(&conditions),
            conditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::model::{Node, Tree};
    use crate::types::{Lit, Var};
    use crate::vars::VarRole;

    #[test]
    fn test_format_threshold() {
        assert_eq!(format_threshold(2.5), "2.5");
        assert_eq!(format_threshold(100.0), "100");
        assert_eq!(format_threshold(0.1234567), "0.123457");
        assert_eq!(format_threshold(-1.25), "-1.25");
        assert_eq!(format_threshold(0.0), "0");
    }

    struct Fixture {
        schema: Schema,
        thresholds: Thresholds,
        vars: VarAllocator,
    }

    /// Feature "x" with thresholds 1, 2, 3 (intervals 1..=4), feature "y" with 0.5 (intervals 5..=6).
    fn fixture() -> Fixture {
        let tree = Tree::new(vec![
            Node::inner(0, 2.0, 1, 2),
            Node::inner(0, 1.0, 3, 4),
            Node::inner(0, 3.0, 5, 6),
            Node::leaf(vec![1.0]),
            Node::inner(1, 0.5, 7, 8),
            Node::leaf(vec![1.0]),
            Node::leaf(vec![1.0]),
            Node::leaf(vec![1.0]),
            Node::leaf(vec![1.0]),
        ])
        .unwrap();
        let thresholds = Thresholds::from_trees(2, &[tree]);
        let mut vars = VarAllocator::new();
        for feature in 0..2 {
            vars.new_vars(thresholds.n_intervals(feature), |index| VarRole::Interval { feature, index });
        }
        Fixture {
            schema: Schema::new(vec!["x".into(), "y".into()], vec!["c".into()]),
            thresholds,
            vars,
        }
    }

    fn implicant(ids: &[u32]) -> Implicant {
        Implicant::new(ids.iter().map(|&i| Var::new(i).pos()).collect())
    }

    #[test]
    fn test_decode_upper_bound() {
        let f = fixture();
        let decoder = Decoder::new(&f.schema, &f.thresholds, &f.vars);
        // Intervals 3 and 4 of x ruled out: x <= 2.
        let predicate = decoder.decode(&implicant(&[3, 4]));
        assert_eq!(predicate.query, "x <= 2");
        assert_eq!(predicate.features, 1);
        assert_eq!(predicate.cases, 1);
        assert!(predicate.holds(&[2.0, 0.0]));
        assert!(!predicate.holds(&[2.5, 0.0]));
    }

    #[test]
    fn test_decode_band_and_second_feature() {
        let f = fixture();
        let decoder = Decoder::new(&f.schema, &f.thresholds, &f.vars);
        // x in (1, 3], y > 0.5.
        let predicate = decoder.decode(&implicant(&[1, 4, 5]));
        assert_eq!(predicate.query, "x > 1 and x <= 3 and y > 0.5");
        assert_eq!(predicate.features, 2);
        assert_eq!(predicate.cases, 3);
        assert_eq!(predicate.conditions[2].op, Comparison::Gt);
    }

    #[test]
    fn test_decode_empty() {
        let f = fixture();
        let decoder = Decoder::new(&f.schema, &f.thresholds, &f.vars);
        let predicate = decoder.decode(&Implicant::new(vec![]));
        assert_eq!(predicate.query, "");
        assert_eq!(predicate.features, 0);
        assert!(predicate.holds(&[0.0, 0.0]));
    }

    #[test]
    fn test_decode_negative_literals_are_open() {
        let f = fixture();
        let decoder = Decoder::new(&f.schema, &f.thresholds, &f.vars);
        let predicate = decoder.decode(&Implicant::new(vec![Lit::from_dimacs(-1), Var::new(4).pos()]));
        assert_eq!(predicate.query, "x <= 3");
    }

    #[test]
    #[should_panic(expected = "is not an interval variable")]
    fn test_decode_foreign_variable() {
        let f = fixture();
        let decoder = Decoder::new(&f.schema, &f.thresholds, &f.vars);
        decoder.decode(&implicant(&[42]));
    }

    #[test]
    fn test_long_query_is_split() {
        let conditions: Vec<Condition> = (0..12)
            .map(|i| Condition {
                feature: 0,
                name: format!("f{}", i),
                op: Comparison::Le,
                threshold: i as f64,
            })
            .collect();
        let query = render_query(&conditions);
        assert!(query.starts_with("(f0 <= 0 and "));
        assert!(query.contains("f5 <= 5) and (f6 <= 6"));
        assert!(query.ends_with("f11 <= 11)"));
    }
}
