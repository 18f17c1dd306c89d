//! Read-only structural view of trained decision trees and forests.
//!
//! A model is built once, either programmatically from [`Node`]s or from a
//! JSON [`ModelDescription`], and is immutable afterwards. All encoders and the
//! decoder query it through the [`TreeEnsemble`] trait.
//!
//! # Node layout
//!
//! Nodes of a tree live in one array; node `0` is the root. An inner node
//! tests `x[feature] <= threshold` and continues with `left` when the test
//! holds and with `right` otherwise. Every node carries per-class sample
//! counts; only those of leaves are used.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "kind": "tree",
//!   "features": ["petal_length"],
//!   "classes": ["setosa", "other"],
//!   "trees": [{ "nodes": [
//!     { "feature": 0, "threshold": 2.45, "left": 1, "right": 2, "value": [50, 100] },
//!     { "value": [50, 0] },
//!     { "value": [0, 100] }
//!   ]}]
//! }
//! ```

use std::fmt;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use crate::decode::format_threshold;

pub type TreeId = usize;
pub type NodeId = usize;
pub type FeatureId = usize;
pub type ClassId = usize;

/// The test performed by an inner node.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub feature: FeatureId,
    pub threshold: f64,
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub split: Option<Split>,
    /// Per-class sample counts.
    pub values: Vec<f64>,
}

impl Node {
    pub fn leaf(values: Vec<f64>) -> Self {
        Self { split: None, values }
    }

    pub fn inner(feature: FeatureId, threshold: f64, left: NodeId, right: NodeId) -> Self {
        Self {
            split: Some(Split {
                feature,
                threshold,
                left,
                right,
            }),
            values: Vec::new(),
        }
    }
}

/// Index of the largest score; the first index wins ties.
pub fn argmax(scores: &[f64]) -> ClassId {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }
    best
}

/// A single decision tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    depths: Vec<usize>,
}

impl Tree {
    /// Creates a tree, checking that the nodes form a proper binary tree rooted at node 0.
    pub fn new(nodes: Vec<Node>) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::EmptyTree);
        }

        let n = nodes.len();
        let mut parents = vec![0usize; n];
        for (node, data) in nodes.iter().enumerate() {
            if let Some(split) = &data.split {
                for child in [split.left, split.right] {
                    if child >= n {
                        return Err(ModelError::ChildOutOfRange { node, child });
                    }
                    if child == 0 || split.left == split.right {
                        return Err(ModelError::InvalidChild { node, child });
                    }
                    parents[child] += 1;
                    if parents[child] > 1 {
                        return Err(ModelError::MultipleParents { node: child });
                    }
                }
            }
        }

        // Depths via an explicit work-list; also detects unreachable nodes.
        let mut depths = vec![usize::MAX; n];
        depths[0] = 0;
        let mut stack = vec![0];
        while let Some(node) = stack.pop() {
            if let Some(split) = &nodes[node].split {
                for child in [split.left, split.right] {
                    depths[child] = depths[node] + 1;
                    stack.push(child);
                }
            }
        }
        if let Some(node) = depths.iter().position(|&d| d == usize::MAX) {
            return Err(ModelError::Unreachable { node });
        }

        Ok(Self { nodes, depths })
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node]
    }

    pub fn is_inner(&self, node: NodeId) -> bool {
        self.nodes[node].split.is_some()
    }

    pub fn split(&self, node: NodeId) -> Option<&Split> {
        self.nodes[node].split.as_ref()
    }

    pub fn left_child(&self, node: NodeId) -> Option<NodeId> {
        self.split(node).map(|s| s.left)
    }

    pub fn right_child(&self, node: NodeId) -> Option<NodeId> {
        self.split(node).map(|s| s.right)
    }

    pub fn depth(&self, node: NodeId) -> usize {
        self.depths[node]
    }

    pub fn samples_per_class(&self, node: NodeId) -> &[f64] {
        &self.nodes[node].values
    }

    pub fn samples_total(&self, node: NodeId) -> f64 {
        self.nodes[node].values.iter().sum()
    }

    /// Per-class sample fractions of a node.
    pub fn class_fractions(&self, node: NodeId) -> impl Iterator<Item = f64> + '_ {
        let total = self.samples_total(node);
        self.nodes[node].values.iter().map(move |&v| v / total)
    }

    /// Majority class of a node.
    pub fn node_class(&self, node: NodeId) -> ClassId {
        argmax(&self.nodes[node].values)
    }

    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.n_nodes()).filter(|&node| !self.is_inner(node))
    }

    pub fn n_leaves(&self) -> usize {
        self.leaves().count()
    }

    pub fn leaves_of_class(&self, class: ClassId) -> Vec<NodeId> {
        self.leaves().filter(|&leaf| self.node_class(leaf) == class).collect()
    }

    /// Follows the decision path of `x` down to a leaf.
    pub fn leaf_for(&self, x: &[f64]) -> NodeId {
        let mut node = 0;
        while let Some(split) = self.split(node) {
            node = if x[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
        node
    }

    fn check_schema(&self, schema: &Schema) -> Result<(), ModelError> {
        for (node, data) in self.nodes.iter().enumerate() {
            match &data.split {
                Some(split) => {
                    if split.feature >= schema.n_features() {
                        return Err(ModelError::FeatureOutOfRange {
                            node,
                            feature: split.feature,
                        });
                    }
                    if !split.threshold.is_finite() {
                        return Err(ModelError::InvalidThreshold { node });
                    }
                }
                None => {
                    if data.values.len() != schema.n_classes() {
                        return Err(ModelError::ClassCountMismatch {
                            node,
                            expected: schema.n_classes(),
                            found: data.values.len(),
                        });
                    }
                    let valid = data.values.iter().all(|v| v.is_finite() && *v >= 0.0);
                    if !valid || self.samples_total(node) <= 0.0 {
                        return Err(ModelError::EmptyLeaf { node });
                    }
                }
            }
        }
        Ok(())
    }

    /// Renders the tree one node per line, indented by depth.
    pub fn render(&self, schema: &Schema) -> String {
        let mut output = String::new();
        for node in 0..self.n_nodes() {
            output.push_str(&" ".repeat(self.depth(node)));
            output.push_str(&format!("N{}:", node));
            if self.samples_per_class(node).len() == schema.n_classes() {
                output.push_str(&format!(" {}", schema.class_name(self.node_class(node))));
            }
            if let Some(split) = self.split(node) {
                output.push_str(&format!(
                    " ({} <= {}) ? N{} : N{}",
                    schema.feature_name(split.feature),
                    format_threshold(split.threshold),
                    split.left,
                    split.right
                ));
            }
            output.push('\n');
        }
        output
    }
}

/// Feature and class names.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    features: Vec<String>,
    classes: Vec<String>,
}

impl Schema {
    pub fn new(features: Vec<String>, classes: Vec<String>) -> Self {
        Self { features, classes }
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn feature_name(&self, feature: FeatureId) -> &str {
        &self.features[feature]
    }

    pub fn feature_id(&self, name: &str) -> Option<FeatureId> {
        self.features.iter().position(|f| f == name)
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        &self.classes[class]
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.classes.iter().position(|c| c == name)
    }

    pub fn class_names(&self) -> &[String] {
        &self.classes
    }
}

/// Sorted distinct split thresholds per feature, each chain closed by `+inf`.
///
/// Interval `i` of a feature is `(t[i-1], t[i]]`, with `t[-1] = -inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    chains: Vec<Vec<f64>>,
}

impl Thresholds {
    pub fn from_trees(n_features: usize, trees: &[Tree]) -> Self {
        let mut chains = vec![Vec::new(); n_features];
        for tree in trees {
            for node in 0..tree.n_nodes() {
                if let Some(split) = tree.split(node) {
                    // `-0.0 + 0.0` is `0.0`: both zeros name the same split.
                    chains[split.feature].push(split.threshold + 0.0);
                }
            }
        }
        for chain in &mut chains {
            chain.sort_by(f64::total_cmp);
            chain.dedup();
            chain.push(f64::INFINITY);
        }
        Self { chains }
    }

    /// All interval upper bounds of a feature, sentinel included.
    pub fn values(&self, feature: FeatureId) -> &[f64] {
        &self.chains[feature]
    }

    pub fn value(&self, feature: FeatureId, index: usize) -> f64 {
        self.chains[feature][index]
    }

    /// Number of intervals of a feature (always at least one).
    pub fn n_intervals(&self, feature: FeatureId) -> usize {
        self.chains[feature].len()
    }

    /// Number of intervals up to and including `threshold`.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is not a split value of `feature`.
    pub fn split_point(&self, feature: FeatureId, threshold: f64) -> usize {
        let chain = &self.chains[feature];
        let threshold = threshold + 0.0;
        match chain.binary_search_by(|t| t.total_cmp(&threshold)) {
            Ok(index) => index + 1,
            Err(_) => panic!("threshold {} is not in the chain of feature {}", threshold, feature),
        }
    }

    /// Index of the interval containing `x`.
    pub fn interval_of(&self, feature: FeatureId, x: f64) -> usize {
        self.chains[feature].partition_point(|&t| t < x)
    }
}

/// Structural queries shared by single trees and forests.
pub trait TreeEnsemble {
    fn schema(&self) -> &Schema;
    fn trees(&self) -> &[Tree];
    fn thresholds(&self) -> &Thresholds;
    fn predict(&self, x: &[f64]) -> ClassId;

    fn n_trees(&self) -> usize {
        self.trees().len()
    }

    fn n_features(&self) -> usize {
        self.schema().n_features()
    }

    fn n_classes(&self) -> usize {
        self.schema().n_classes()
    }

    fn tree(&self, tree: TreeId) -> &Tree {
        &self.trees()[tree]
    }
}

#[derive(Debug, Clone)]
pub struct TreeModel {
    schema: Schema,
    tree: Tree,
    thresholds: Thresholds,
}

impl TreeModel {
    pub fn new(schema: Schema, tree: Tree) -> Result<Self, ModelError> {
        tree.check_schema(&schema).map_err(|e| e.in_tree(0))?;
        let thresholds = Thresholds::from_trees(schema.n_features(), std::slice::from_ref(&tree));
        Ok(Self {
            schema,
            tree,
            thresholds,
        })
    }
}

impl TreeEnsemble for TreeModel {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn trees(&self) -> &[Tree] {
        std::slice::from_ref(&self.tree)
    }

    fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    fn predict(&self, x: &[f64]) -> ClassId {
        self.tree.node_class(self.tree.leaf_for(x))
    }
}

#[derive(Debug, Clone)]
pub struct ForestModel {
    schema: Schema,
    trees: Vec<Tree>,
    thresholds: Thresholds,
}

impl ForestModel {
    pub fn new(schema: Schema, trees: Vec<Tree>) -> Result<Self, ModelError> {
        if trees.is_empty() {
            return Err(ModelError::TreeCount {
                kind: ModelKind::Forest,
                found: 0,
            });
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.check_schema(&schema).map_err(|e| e.in_tree(i))?;
        }
        let thresholds = Thresholds::from_trees(schema.n_features(), &trees);
        Ok(Self {
            schema,
            trees,
            thresholds,
        })
    }

    /// Per-class scores: the sum over trees of the reached leaf's class fractions.
    pub fn scores(&self, x: &[f64]) -> Vec<f64> {
        let mut scores = vec![0.0; self.schema.n_classes()];
        for tree in &self.trees {
            let leaf = tree.leaf_for(x);
            for (score, fraction) in scores.iter_mut().zip(tree.class_fractions(leaf)) {
                *score += fraction;
            }
        }
        scores
    }
}

impl TreeEnsemble for ForestModel {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn trees(&self) -> &[Tree] {
        &self.trees
    }

    fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    fn predict(&self, x: &[f64]) -> ClassId {
        argmax(&self.scores(x))
    }
}

/// A trained model, either a single tree or a forest.
#[derive(Debug, Clone)]
pub enum Model {
    Tree(TreeModel),
    Forest(ForestModel),
}

impl Model {
    pub fn ensemble(&self) -> &dyn TreeEnsemble {
        match self {
            Model::Tree(model) => model,
            Model::Forest(model) => model,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Tree(_) => ModelKind::Tree,
            Model::Forest(_) => ModelKind::Forest,
        }
    }

    pub fn from_description(description: ModelDescription) -> Result<Self, ModelError> {
        let schema = Schema::new(description.features, description.classes);
        let trees = description
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| tree.into_tree().map_err(|e| e.in_tree(i)))
            .collect::<Result<Vec<_>, _>>()?;

        match description.kind {
            ModelKind::Tree => {
                if trees.len() != 1 {
                    return Err(ModelError::TreeCount {
                        kind: ModelKind::Tree,
                        found: trees.len(),
                    });
                }
                let tree = trees.into_iter().next().ok_or(ModelError::EmptyTree)?;
                Ok(Model::Tree(TreeModel::new(schema, tree)?))
            }
            ModelKind::Forest => Ok(Model::Forest(ForestModel::new(schema, trees)?)),
        }
    }

    pub fn from_json<R: Read>(reader: R) -> Result<Self, ModelError> {
        let description: ModelDescription = serde_json::from_reader(reader)?;
        Self::from_description(description)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Tree,
    Forest,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Tree => write!(f, "tree"),
            ModelKind::Forest => write!(f, "forest"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    pub kind: ModelKind,
    pub features: Vec<String>,
    pub classes: Vec<String>,
    pub trees: Vec<TreeDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDescription {
    pub nodes: Vec<NodeDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<NodeId>,
    #[serde(default)]
    pub value: Vec<f64>,
}

impl TreeDescription {
    fn into_tree(self) -> Result<Tree, ModelError> {
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(node, desc)| match (desc.feature, desc.threshold, desc.left, desc.right) {
                (Some(feature), Some(threshold), Some(left), Some(right)) => Ok(Node {
                    split: Some(Split {
                        feature,
                        threshold,
                        left,
                        right,
                    }),
                    values: desc.value,
                }),
                (None, None, None, None) => Ok(Node::leaf(desc.value)),
                _ => Err(ModelError::IncompleteSplit { node }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Tree::new(nodes)
    }
}

/// Error type for model construction.
#[derive(Debug)]
pub enum ModelError {
    EmptyTree,
    ChildOutOfRange { node: NodeId, child: NodeId },
    InvalidChild { node: NodeId, child: NodeId },
    MultipleParents { node: NodeId },
    Unreachable { node: NodeId },
    IncompleteSplit { node: NodeId },
    FeatureOutOfRange { node: NodeId, feature: FeatureId },
    InvalidThreshold { node: NodeId },
    ClassCountMismatch { node: NodeId, expected: usize, found: usize },
    EmptyLeaf { node: NodeId },
    TreeCount { kind: ModelKind, found: usize },
    /// An error located in a specific tree.
    InTree { tree: TreeId, error: Box<ModelError> },
    Json(serde_json::Error),
    Io(io::Error),
}

impl ModelError {
    fn in_tree(self, tree: TreeId) -> Self {
        ModelError::InTree {
            tree,
            error: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Json(e)
    }
}

impl From<io::Error> for ModelError {
    fn from(e: io::Error) -> Self {
        ModelError::Io(e)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyTree => write!(f, "tree has no nodes"),
            ModelError::ChildOutOfRange { node, child } => {
                write!(f, "node {} refers to missing child {}", node, child)
            }
            ModelError::InvalidChild { node, child } => {
                write!(f, "node {} has invalid child {}", node, child)
            }
            ModelError::MultipleParents { node } => write!(f, "node {} has more than one parent", node),
            ModelError::Unreachable { node } => write!(f, "node {} is not reachable from the root", node),
            ModelError::IncompleteSplit { node } => {
                write!(f, "node {} must have all of feature, threshold, left, right, or none", node)
            }
            ModelError::FeatureOutOfRange { node, feature } => {
                write!(f, "node {} splits on unknown feature {}", node, feature)
            }
            ModelError::InvalidThreshold { node } => write!(f, "node {} has a non-finite threshold", node),
            ModelError::ClassCountMismatch { node, expected, found } => write!(
                f,
                "leaf {} has {} class counts, expected {}",
                node, found, expected
            ),
            ModelError::EmptyLeaf { node } => write!(f, "leaf {} has no valid samples", node),
            ModelError::TreeCount { kind, found } => write!(f, "{} model with {} trees", kind, found),
            ModelError::InTree { tree, error } => write!(f, "tree {}: {}", tree, error),
            ModelError::Json(e) => write!(f, "JSON error: {}", e),
            ModelError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ModelError {}
