//! # forest-implicants: Prime Implicant Explanations for Decision Trees and Forests
//!
//! **`forest-implicants`** explains the decisions of a trained decision tree or tree ensemble.
//! For every class it computes *prime implicants*: minimal sets of feature-threshold conditions
//! which, once satisfied, guarantee the predicted class regardless of all other feature values.
//!
//! ## How it works
//!
//! - The split thresholds of every feature cut its value range into **intervals**, one boolean
//!   variable each. A true interval variable means "this interval is ruled out".
//! - The model structure is translated into **CNF**: decision paths, the intervals each path rules
//!   out, and (for forests) the feasible **leaf combinations** and the class they vote for.
//! - A SAT-based oracle enumerates the inclusion-minimal sets of ruled-out intervals that are
//!   consistent with the target class. Each set is **decoded** into a predicate such as
//!   `petal_length > 2.45 and petal_width <= 1.75`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use forest_implicants::explain::{ExplainConfig, Explainer};
//! use forest_implicants::model::{Model, Node, Schema, Tree, TreeModel};
//!
//! // x <= 2.5 ? low : high
//! let tree = Tree::new(vec![
//!     Node::inner(0, 2.5, 1, 2),
//!     Node::leaf(vec![10.0, 0.0]),
//!     Node::leaf(vec![0.0, 10.0]),
//! ])
//! .unwrap();
//! let schema = Schema::new(vec!["x".into()], vec!["low".into(), "high".into()]);
//! let model = Model::Tree(TreeModel::new(schema, tree).unwrap());
//!
//! let mut explainer = Explainer::new(model, ExplainConfig::default().with_jobs(1)).unwrap();
//! let explanation = explainer.explain_class_names(&["high"]).unwrap();
//! let predicate = explainer.decode(&explanation.implicants()[0]);
//! assert_eq!(predicate.query, "x > 2.5");
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: read-only view of trees and forests, JSON model descriptions.
//! - **[`tree_encoder`]** and **[`forest_encoder`]**: CNF encodings, built on [`encoding`].
//! - **[`combinations`]**: feasible leaf combinations of a forest.
//! - **[`implicants`]**: minimal-model and cover-based prime implicant enumeration.
//! - **[`sat`]**: incremental solving with varisat, behind all of the above.
//! - **[`decode`]**: implicants to predicates.
//! - **[`explain`]**: the explanation driver with its worker pool.
//! - **[`reduce`]**: CNF reduction by replacing variable neighbourhoods with their prime implicants.

pub mod cnf;
pub mod combinations;
pub mod decode;
pub mod encoding;
pub mod explain;
pub mod forest_encoder;
pub mod implicants;
pub mod limits;
pub mod model;
pub mod reduce;
pub mod sat;
pub mod tree_encoder;
pub mod types;
pub mod vars;
