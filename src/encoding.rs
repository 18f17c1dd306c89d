//! Variable families and constraints shared by the tree and forest encoders.
//!
//! Semantics of the variables:
//!
//! - node-true `(t, n)`: the decision path of tree `t` passes through the
//!   `<=` side of node `n`; for a leaf, the leaf is reached.
//! - node-false `(t, n)`: the path passes through the `>` side of node `n`.
//! - interval `(f, i)`: interval `i` of feature `f` is ruled out.
//!
//! A child's true or false variable implies its parent's variable for the side
//! it hangs on. A node forces the intervals incompatible with its side to be
//! ruled out.

use crate::cnf::{Clause, Formula};
use crate::model::{ClassId, FeatureId, NodeId, Thresholds, Tree, TreeId};
use crate::types::Var;
use crate::vars::{VarAllocator, VarRole};

/// Node-true and node-false variables of every tree.
#[derive(Debug, Clone)]
pub struct NodeVars {
    true_vars: Vec<Vec<Var>>,
    false_vars: Vec<Vec<Var>>,
}

impl NodeVars {
    pub fn allocate(vars: &mut VarAllocator, trees: &[Tree]) -> Self {
        let mut true_vars = Vec::with_capacity(trees.len());
        let mut false_vars = Vec::with_capacity(trees.len());
        for (tree, data) in trees.iter().enumerate() {
            true_vars.push(vars.new_vars(data.n_nodes(), |node| VarRole::NodeTrue { tree, node }));
            false_vars.push(vars.new_vars(data.n_nodes(), |node| VarRole::NodeFalse { tree, node }));
        }
        Self { true_vars, false_vars }
    }

    pub fn var(&self, tree: TreeId, node: NodeId, side: bool) -> Var {
        if side {
            self.true_vars[tree][node]
        } else {
            self.false_vars[tree][node]
        }
    }

    /// The variable that is true when a leaf is reached.
    pub fn leaf_var(&self, tree: TreeId, leaf: NodeId) -> Var {
        self.true_vars[tree][leaf]
    }

    /// Leaf variables of all trees, tree by tree.
    pub fn leaf_vars(&self, trees: &[Tree]) -> Vec<Var> {
        trees
            .iter()
            .enumerate()
            .flat_map(|(tree, data)| data.leaves().map(move |leaf| self.leaf_var(tree, leaf)))
            .collect()
    }
}

/// Interval variables of every feature.
#[derive(Debug, Clone)]
pub struct IntervalVars {
    per_feature: Vec<Vec<Var>>,
    all: Vec<Var>,
}

impl IntervalVars {
    pub fn allocate(vars: &mut VarAllocator, thresholds: &Thresholds, n_features: usize) -> Self {
        let per_feature: Vec<Vec<Var>> = (0..n_features)
            .map(|feature| vars.new_vars(thresholds.n_intervals(feature), |index| VarRole::Interval { feature, index }))
            .collect();
        let all = per_feature.iter().flatten().copied().collect();
        Self { per_feature, all }
    }

    pub fn feature(&self, feature: FeatureId) -> &[Var] {
        &self.per_feature[feature]
    }

    pub fn var(&self, feature: FeatureId, index: usize) -> Var {
        self.per_feature[feature][index]
    }

    pub fn n_features(&self) -> usize {
        self.per_feature.len()
    }

    /// All interval variables, feature by feature. This is the projection set.
    pub fn all(&self) -> &[Var] {
        &self.all
    }
}

/// Child-implies-parent constraints of every inner node.
pub fn node_constraints(trees: &[Tree], nodes: &NodeVars) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for (tree, data) in trees.iter().enumerate() {
        for node in 0..data.n_nodes() {
            if let Some(split) = data.split(node) {
                for side in [true, false] {
                    clauses.push(Clause::implies(
                        nodes.var(tree, split.left, side).pos(),
                        nodes.var(tree, node, true).pos(),
                    ));
                }
                for side in [true, false] {
                    clauses.push(Clause::implies(
                        nodes.var(tree, split.right, side).pos(),
                        nodes.var(tree, node, false).pos(),
                    ));
                }
            }
        }
    }
    clauses
}

/// At least one interval of every feature stays open.
pub fn feasibility_constraints(intervals: &IntervalVars) -> Vec<Clause> {
    (0..intervals.n_features())
        .map(|feature| Clause::new(intervals.feature(feature).iter().map(|v| v.neg()).collect()))
        .collect()
}

/// An encoded model: a base formula plus per-query target clauses.
pub trait Encoding {
    fn base(&self) -> &Formula;

    /// Variables over which implicants are computed.
    fn projection(&self) -> &[Var];

    fn allocator(&self) -> &VarAllocator;

    /// Target clauses for "the model predicts one of `classes`".
    ///
    /// Returns `None` when no leaf (or no leaf combination) leads to any of the
    /// classes, in which case the explanation is empty. Variables the target
    /// needs beyond the base are numbered after the base's and are not kept.
    fn encode_target(&self, classes: &[ClassId]) -> Option<Vec<Clause>>;
}
