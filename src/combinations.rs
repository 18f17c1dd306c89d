//! Feasible leaf combinations of a forest.
//!
//! A combination selects one leaf per tree such that the decision paths of all
//! selected leaves are compatible, i.e. every feature keeps at least one
//! interval open. Combinations are enumerated as the models of the forest base
//! formula plus exactly-one-leaf-per-tree constraints, projected on the leaf
//! variables.

use num_bigint::BigUint;

use crate::cnf::{Clause, Formula};
use crate::encoding::{feasibility_constraints, IntervalVars, NodeVars};
use crate::implicants::enumerate_models;
use crate::limits::{Budget, Exhausted};
use crate::model::{argmax, ClassId, ForestModel, NodeId, TreeEnsemble, TreeId};
use crate::types::Var;
use crate::vars::VarAllocator;

/// One leaf per tree, with its per-class score.
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    /// Selected leaf of every tree, ordered by tree.
    leaves: Vec<(TreeId, NodeId)>,
    leaf_vars: Vec<Var>,
    scores: Vec<f64>,
    class: ClassId,
}

impl Combination {
    pub fn leaves(&self) -> &[(TreeId, NodeId)] {
        &self.leaves
    }

    pub fn leaf_vars(&self) -> &[Var] {
        &self.leaf_vars
    }

    /// Sum over the selected leaves of their class fractions.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn class(&self) -> ClassId {
        self.class
    }
}

/// Per-class sums of leaf class fractions.
pub fn score(model: &ForestModel, leaves: &[(TreeId, NodeId)]) -> Vec<f64> {
    let mut scores = vec![0.0; model.n_classes()];
    for &(tree, leaf) in leaves {
        for (score, fraction) in scores.iter_mut().zip(model.tree(tree).class_fractions(leaf)) {
            *score += fraction;
        }
    }
    scores
}

/// Upper bound on the number of combinations: the product of the leaf counts.
pub fn naive_count(model: &ForestModel) -> BigUint {
    model
        .trees()
        .iter()
        .fold(BigUint::from(1u32), |acc, tree| acc * BigUint::from(tree.n_leaves()))
}

/// Exactly one leaf per tree and at least one open interval per feature.
pub fn combination_constraints(model: &ForestModel, nodes: &NodeVars, intervals: &IntervalVars) -> Vec<Clause> {
    let mut clauses = Vec::new();
    for (tree, data) in model.trees().iter().enumerate() {
        let leaves: Vec<Var> = data.leaves().map(|leaf| nodes.leaf_var(tree, leaf)).collect();
        clauses.push(Clause::new(leaves.iter().map(|v| v.pos()).collect()));
        for (i, a) in leaves.iter().enumerate() {
            for b in &leaves[i + 1..] {
                clauses.push(Clause::new(vec![a.neg(), b.neg()]));
            }
        }
    }
    clauses.extend(feasibility_constraints(intervals));
    clauses
}

/// All feasible combinations, filed by class.
#[derive(Debug, Clone)]
pub struct Combinations {
    by_class: Vec<Vec<Combination>>,
    naive: BigUint,
}

impl Combinations {
    pub fn enumerate(
        model: &ForestModel,
        base: &Formula,
        vars: &VarAllocator,
        nodes: &NodeVars,
        intervals: &IntervalVars,
        budget: &Budget,
    ) -> Result<Self, Exhausted> {
        let naive = naive_count(model);
        log::info!("Total combinations: {}", naive);

        let formula = base.extended(combination_constraints(model, nodes, intervals));
        let projection = nodes.leaf_vars(model.trees());
        let models = enumerate_models(&formula, &projection, budget)?;

        let mut by_class = vec![Vec::new(); model.n_classes()];
        for leaf_vars in models {
            let mut leaves: Vec<(TreeId, NodeId)> = leaf_vars.iter().map(|&v| vars.node_of(v)).collect();
            leaves.sort_unstable();
            let leaf_vars = leaves.iter().map(|&(tree, leaf)| nodes.leaf_var(tree, leaf)).collect();
            let scores = score(model, &leaves);
            let class = argmax(&scores);
            by_class[class].push(Combination {
                leaves,
                leaf_vars,
                scores,
                class,
            });
        }

        let combinations = Self { by_class, naive };
        log::info!("Valid combinations: {}", combinations.feasible_count());
        for (class, list) in combinations.by_class.iter().enumerate() {
            log::debug!("Class {}: {} combinations", class, list.len());
        }
        Ok(combinations)
    }

    pub fn of_class(&self, class: ClassId) -> &[Combination] {
        &self.by_class[class]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combination> {
        self.by_class.iter().flatten()
    }

    pub fn feasible_count(&self) -> usize {
        self.by_class.iter().map(Vec::len).sum()
    }

    pub fn naive_count(&self) -> &BigUint {
        &self.naive
    }
}
