//! CNF encoding of a single decision tree.
//!
//! Variables are allocated in this order: one selector per class, node-true
//! for every node, node-false for every node, then the intervals of every
//! feature. The base formula consists of
//!
//! - class constraints: selector `c` implies that some leaf classified `c` is reached,
//! - node constraints (see [`crate::encoding`]),
//! - value constraints: a node's false side rules out every interval up to its
//!   split point, its true side every interval above it,
//! - feasibility: every feature keeps at least one interval open.
//!
//! The target for a class set is the disjunction of the class selectors.

use crate::cnf::{Clause, Formula};
use crate::encoding::{feasibility_constraints, node_constraints, Encoding, IntervalVars, NodeVars};
use crate::model::{ClassId, TreeEnsemble, TreeModel};
use crate::types::Var;
use crate::vars::{VarAllocator, VarRole};

#[derive(Debug, Clone)]
pub struct TreeEncoder {
    vars: VarAllocator,
    classes: Vec<Var>,
    nodes: NodeVars,
    intervals: IntervalVars,
    /// Whether at least one leaf is classified as each class.
    reachable: Vec<bool>,
    base: Formula,
}

impl TreeEncoder {
    pub fn new(model: &TreeModel) -> Self {
        let mut vars = VarAllocator::new();
        let classes = vars.new_vars(model.n_classes(), VarRole::Class);
        let nodes = NodeVars::allocate(&mut vars, model.trees());
        let intervals = IntervalVars::allocate(&mut vars, model.thresholds(), model.n_features());

        let mut clauses = Vec::new();
        clauses.extend(class_constraints(model, &classes, &nodes));
        clauses.extend(node_constraints(model.trees(), &nodes));
        clauses.extend(value_constraints(model, &nodes, &intervals));
        clauses.extend(feasibility_constraints(&intervals));
        let base = Formula::with_num_vars(clauses, vars.num_vars());

        let tree = model.tree(0);
        let reachable = (0..model.n_classes())
            .map(|class| !tree.leaves_of_class(class).is_empty())
            .collect();

        log::debug!(
            "Encoded tree with {} nodes: {} variables, {} clauses",
            tree.n_nodes(),
            base.num_vars(),
            base.num_clauses()
        );

        Self {
            vars,
            classes,
            nodes,
            intervals,
            reachable,
            base,
        }
    }

    pub fn class_var(&self, class: ClassId) -> Var {
        self.classes[class]
    }

    pub fn nodes(&self) -> &NodeVars {
        &self.nodes
    }

    pub fn intervals(&self) -> &IntervalVars {
        &self.intervals
    }
}

/// Selector `c` implies that one of the leaves classified `c` is reached.
fn class_constraints(model: &TreeModel, classes: &[Var], nodes: &NodeVars) -> Vec<Clause> {
    let tree = model.tree(0);
    classes
        .iter()
        .enumerate()
        .map(|(class, selector)| {
            let mut lits = vec![selector.neg()];
            lits.extend(tree.leaves_of_class(class).into_iter().map(|leaf| nodes.leaf_var(0, leaf).pos()));
            Clause::new(lits)
        })
        .collect()
}

fn value_constraints(model: &TreeModel, nodes: &NodeVars, intervals: &IntervalVars) -> Vec<Clause> {
    let tree = model.tree(0);
    let thresholds = model.thresholds();
    let mut clauses = Vec::new();
    for node in 0..tree.n_nodes() {
        if let Some(split) = tree.split(node) {
            let point = thresholds.split_point(split.feature, split.threshold);
            let (low, high) = intervals.feature(split.feature).split_at(point);
            for v in low {
                clauses.push(Clause::implies(nodes.var(0, node, false).pos(), v.pos()));
            }
            for v in high {
                clauses.push(Clause::implies(nodes.var(0, node, true).pos(), v.pos()));
            }
        }
    }
    clauses
}

impl Encoding for TreeEncoder {
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
        if !classes.iter().any(|&c| self.reachable[c]) {
            return None;
        }
        let target = Clause::new(classes.iter().map(|&c| self.classes[c].pos()).collect());
        Some(vec![target])
    }
}
