//! CNF encoding of a tree ensemble.
//!
//! Variables are allocated in this order: node-true and node-false per tree,
//! intervals of every feature, then the left and right deactivation ladders of
//! every feature. Each target numbers one more variable per combination after
//! those, in a scratch copy of the allocator, so queries never grow the base.
//!
//! Instead of one clause per (node, interval) pair, nodes rule out intervals
//! through the ladders: `left[i]` rules out intervals `0..=i`, `right[i]` rules
//! out intervals `i..`. A node's false side sets `left[split - 1]`, its true
//! side sets `right[split]`, where `split` is the number of intervals up to and
//! including the node's threshold.
//!
//! A target for a class set selects one of the feasible leaf combinations whose
//! summed class fractions favor a class of the set.

use crate::cnf::{Clause, Formula};
use crate::combinations::Combinations;
use crate::encoding::{node_constraints, Encoding, IntervalVars, NodeVars};
use crate::limits::{Budget, Exhausted};
use crate::model::{ClassId, FeatureId, ForestModel, TreeEnsemble};
use crate::types::Var;
use crate::vars::{VarAllocator, VarRole};

/// Deactivation ladders of one feature.
#[derive(Debug, Clone)]
struct Ladder {
    left: Vec<Var>,
    right: Vec<Var>,
}

#[derive(Debug, Clone)]
pub struct ForestEncoder {
    vars: VarAllocator,
    nodes: NodeVars,
    intervals: IntervalVars,
    ladders: Vec<Ladder>,
    base: Formula,
    combinations: Combinations,
}

impl ForestEncoder {
    /// Encodes the forest and enumerates its feasible combinations without limits.
    pub fn new(model: &ForestModel) -> Self {
        match Self::with_budget(model, &Budget::unlimited()) {
            Ok(encoder) => encoder,
            Err(exhausted) => unreachable!("unlimited enumeration stopped: {}", exhausted),
        }
    }

    /// Same as [`ForestEncoder::new`], but the combination enumeration obeys `budget`.
    pub fn with_budget(model: &ForestModel, budget: &Budget) -> Result<Self, Exhausted> {
        let mut vars = VarAllocator::new();
        let nodes = NodeVars::allocate(&mut vars, model.trees());
        let n_features = model.n_features();
        let thresholds = model.thresholds();
        let intervals = IntervalVars::allocate(&mut vars, thresholds, n_features);
        let lefts: Vec<Vec<Var>> = (0..n_features)
            .map(|feature| {
                vars.new_vars(thresholds.n_intervals(feature), |index| VarRole::DeactivateLeft { feature, index })
            })
            .collect();
        let rights: Vec<Vec<Var>> = (0..n_features)
            .map(|feature| {
                vars.new_vars(thresholds.n_intervals(feature), |index| VarRole::DeactivateRight { feature, index })
            })
            .collect();
        let ladders: Vec<Ladder> = lefts
            .into_iter()
            .zip(rights)
            .map(|(left, right)| Ladder { left, right })
            .collect();

        let mut clauses = node_constraints(model.trees(), &nodes);
        clauses.extend(value_constraints(model, &nodes, &ladders));
        for (feature, ladder) in ladders.iter().enumerate() {
            clauses.extend(ladder_constraints(ladder, intervals.feature(feature)));
        }
        let base = Formula::with_num_vars(clauses, vars.num_vars());

        log::debug!(
            "Encoded forest with {} trees: {} variables, {} clauses",
            model.n_trees(),
            base.num_vars(),
            base.num_clauses()
        );

        let combinations = Combinations::enumerate(model, &base, &vars, &nodes, &intervals, budget)?;

        Ok(Self {
            vars,
            nodes,
            intervals,
            ladders,
            base,
            combinations,
        })
    }

    pub fn combinations(&self) -> &Combinations {
        &self.combinations
    }

    pub fn nodes(&self) -> &NodeVars {
        &self.nodes
    }

    pub fn intervals(&self) -> &IntervalVars {
        &self.intervals
    }

    pub fn left_ladder(&self, feature: FeatureId) -> &[Var] {
        &self.ladders[feature].left
    }

    pub fn right_ladder(&self, feature: FeatureId) -> &[Var] {
        &self.ladders[feature].right
    }
}

fn value_constraints(model: &ForestModel, nodes: &NodeVars, ladders: &[Ladder]) -> Vec<Clause> {
    let thresholds = model.thresholds();
    let mut clauses = Vec::new();
    for (tree, data) in model.trees().iter().enumerate() {
        for node in 0..data.n_nodes() {
            if let Some(split) = data.split(node) {
                let point = thresholds.split_point(split.feature, split.threshold);
                let ladder = &ladders[split.feature];
                clauses.push(Clause::implies(
                    nodes.var(tree, node, false).pos(),
                    ladder.left[point - 1].pos(),
                ));
                if point < ladder.right.len() {
                    clauses.push(Clause::implies(nodes.var(tree, node, true).pos(), ladder.right[point].pos()));
                }
            }
        }
    }
    clauses
}

/// Ladder propagation and ladder-to-interval links of one feature.
fn ladder_constraints(ladder: &Ladder, intervals: &[Var]) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for i in 1..intervals.len() {
        clauses.push(Clause::implies(ladder.left[i].pos(), ladder.left[i - 1].pos()));
        clauses.push(Clause::implies(ladder.right[i - 1].pos(), ladder.right[i].pos()));
    }
    for (i, interval) in intervals.iter().enumerate() {
        clauses.push(Clause::implies(ladder.left[i].pos(), interval.pos()));
        clauses.push(Clause::implies(ladder.right[i].pos(), interval.pos()));
    }
    clauses
}

impl Encoding for ForestEncoder {
    fn base(&self) -> &Formula {
        &self.base
    }

    fn projection(&self) -> &[Var] {
        self.intervals.all()
    }

    fn allocator(&self) -> &VarAllocator {
        &self.vars
    }

    fn encode_target(&self, classes: &[ClassId]) -> Option<Vec<Clause>> {
        let mut scratch = self.vars.clone();
        let mut root = Vec::new();
        let mut clauses = Vec::new();
        for &class in classes {
            for combination in self.combinations.of_class(class) {
                let enc = scratch.new_var(VarRole::Combination);
                root.push(enc.pos());
                for leaf in combination.leaf_vars() {
                    clauses.push(Clause::implies(enc.pos(), leaf.pos()));
                }
            }
        }
        if root.is_empty() {
            return None;
        }
        log::debug!("Target for classes {:?}: {} combinations", classes, root.len());
        clauses.push(Clause::new(root));
        Some(clauses)
    }
}
