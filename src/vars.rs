//! Variable allocation with role bookkeeping.
//!
//! Every encoder owns exactly one [`VarAllocator`]. Variables are issued in
//! strictly increasing order starting at 1 and are never reused. Each variable
//! remembers the role it was allocated for, so that decoding a literal back to
//! a tree node or a feature interval is a single table lookup.

use crate::model::{ClassId, FeatureId, NodeId, TreeId};
use crate::types::Var;

/// What a boolean variable stands for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VarRole {
    /// The decision path goes to the "<=" side of this node (for leaves: the leaf is reached).
    NodeTrue { tree: TreeId, node: NodeId },
    /// The decision path goes to the ">" side of this node.
    NodeFalse { tree: TreeId, node: NodeId },
    /// Selector of a target class (single tree only).
    Class(ClassId),
    /// The interval `index` of `feature` is ruled out.
    Interval { feature: FeatureId, index: usize },
    /// Left deactivation ladder: intervals `0..=index` are ruled out.
    DeactivateLeft { feature: FeatureId, index: usize },
    /// Right deactivation ladder: intervals `index..` are ruled out.
    DeactivateRight { feature: FeatureId, index: usize },
    /// Auxiliary selector of one leaf combination inside a target encoding.
    Combination,
}

#[derive(Debug, Clone, Default)]
pub struct VarAllocator {
    roles: Vec<VarRole>,
}

impl VarAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh variable for the given role.
    pub fn new_var(&mut self, role: VarRole) -> Var {
        self.roles.push(role);
        Var::new(self.roles.len() as u32)
    }

    /// Issues `n` fresh variables, with roles produced by `role(i)`.
    pub fn new_vars(&mut self, n: usize, role: impl Fn(usize) -> VarRole) -> Vec<Var> {
        (0..n).map(|i| self.new_var(role(i))).collect()
    }

    /// Number of variables issued so far (equals the largest id).
    pub fn num_vars(&self) -> u32 {
        self.roles.len() as u32
    }

    pub fn role(&self, var: Var) -> Option<VarRole> {
        self.roles.get(var.index()).copied()
    }

    /// Maps an interval variable back to its `(feature, index)` pair.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not an interval variable of this allocator.
    pub fn interval_of(&self, var: Var) -> (FeatureId, usize) {
        match self.role(var) {
            Some(VarRole::Interval { feature, index }) => (feature, index),
            other => panic!("variable {} is not an interval variable (role: {:?})", var, other),
        }
    }

    /// Maps a leaf-true variable back to its `(tree, node)` pair.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a node-true variable of this allocator.
    pub fn node_of(&self, var: Var) -> (TreeId, NodeId) {
        match self.role(var) {
            Some(VarRole::NodeTrue { tree, node }) => (tree, node),
            other => panic!("variable {} is not a node variable (role: {:?})", var, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut vars = VarAllocator::new();
        let a = vars.new_var(VarRole::Class(0));
        let b = vars.new_var(VarRole::Class(1));
        let rest = vars.new_vars(3, |index| VarRole::Interval { feature: 0, index });
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(rest.iter().map(|v| v.id()).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(vars.num_vars(), 5);
    }

    #[test]
    fn test_role_lookup() {
        let mut vars = VarAllocator::new();
        let leaf = vars.new_var(VarRole::NodeTrue { tree: 2, node: 7 });
        let interval = vars.new_var(VarRole::Interval { feature: 1, index: 3 });
        assert_eq!(vars.node_of(leaf), (2, 7));
        assert_eq!(vars.interval_of(interval), (1, 3));
        assert_eq!(vars.role(Var::new(10)), None);
    }

    #[test]
    #[should_panic(expected = "is not an interval variable")]
    fn test_interval_of_wrong_role() {
        let mut vars = VarAllocator::new();
        let class = vars.new_var(VarRole::Class(0));
        vars.interval_of(class);
    }

    #[test]
    fn test_allocators_are_independent() {
        let mut first = VarAllocator::new();
        let mut second = VarAllocator::new();
        first.new_var(VarRole::Combination);
        first.new_var(VarRole::Combination);
        assert_eq!(second.new_var(VarRole::Combination).id(), 1);
    }
}
