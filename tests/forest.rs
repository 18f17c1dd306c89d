//! Explanations of tree ensembles.

mod common;

use num_bigint::BigUint;

use forest_implicants::encoding::Encoding;
use forest_implicants::explain::{Encoder, ExplainConfig, Explainer};
use forest_implicants::forest_encoder::ForestEncoder;
use forest_implicants::limits::Limits;
use forest_implicants::model::{ForestModel, Model, Node, Schema, Tree, TreeEnsemble};

use common::{grid, load};

fn stump(feature: usize, threshold: f64, left: Vec<f64>, right: Vec<f64>) -> Tree {
    Tree::new(vec![
        Node::inner(feature, threshold, 1, 2),
        Node::leaf(left),
        Node::leaf(right),
    ])
    .unwrap()
}

fn schema() -> Schema {
    Schema::new(vec!["x".into(), "y".into()], vec!["a".into(), "b".into()])
}

/// x <= 1 votes a, y <= 1 votes a; otherwise b.
fn independent() -> ForestModel {
    ForestModel::new(
        schema(),
        vec![
            stump(0, 1.0, vec![2.0, 0.0], vec![0.0, 2.0]),
            stump(1, 1.0, vec![2.0, 0.0], vec![0.0, 2.0]),
        ],
    )
    .unwrap()
}

// ─── Combinations ──────────────────────────────────────────────────────────────

#[test]
fn independent_splits_are_all_feasible() {
    let encoder = ForestEncoder::new(&independent());
    let combinations = encoder.combinations();
    assert_eq!(combinations.feasible_count(), 4);
    assert_eq!(combinations.naive_count(), &BigUint::from(4u32));
    // Both ties go to the first class.
    assert_eq!(combinations.of_class(0).len(), 3);
    assert_eq!(combinations.of_class(1).len(), 1);
    assert_eq!(combinations.of_class(1)[0].leaves(), &[(0, 2), (1, 2)]);
    assert_eq!(combinations.of_class(1)[0].scores(), &[0.0, 2.0]);
}

#[test]
fn identical_splits_exclude_crossed_leaves() {
    let model = ForestModel::new(
        schema(),
        vec![
            stump(0, 1.0, vec![2.0, 0.0], vec![0.0, 2.0]),
            stump(0, 1.0, vec![1.0, 1.0], vec![0.0, 3.0]),
        ],
    )
    .unwrap();
    let encoder = ForestEncoder::new(&model);
    let combinations = encoder.combinations();
    assert_eq!(combinations.naive_count(), &BigUint::from(4u32));
    assert_eq!(combinations.feasible_count(), 2);
    let leaves: Vec<_> = combinations.iter().map(|c| c.leaves().to_vec()).collect();
    assert!(leaves.contains(&vec![(0, 1), (1, 1)]));
    assert!(leaves.contains(&vec![(0, 2), (1, 2)]));
}

#[test]
fn combination_limit_interrupts_encoding() {
    let model = Model::Forest(independent());
    let limits = Limits::unlimited().with_memory(0);
    assert!(Encoder::new(&model, &limits).is_err());
}

// ─── Explanations ──────────────────────────────────────────────────────────────

#[test]
fn independent_splits_explanations() {
    let mut explainer = Explainer::new(Model::Forest(independent()), ExplainConfig::default().with_jobs(2)).unwrap();
    let explanations = explainer.explain_all().unwrap();

    let decode = |i: usize| -> Vec<String> {
        explanations[i].implicants().iter().map(|imp| explainer.decode(imp).query).collect()
    };
    assert_eq!(decode(1), vec!["x > 1 and y > 1"]);
    assert_eq!(
        decode(0),
        vec!["x > 1 and y <= 1", "x <= 1 and y > 1", "x <= 1 and y <= 1"]
    );
}

#[test]
fn class_without_combinations() {
    let model = ForestModel::new(
        schema(),
        vec![
            stump(0, 1.0, vec![3.0, 1.0], vec![2.0, 1.0]),
            stump(1, 1.0, vec![3.0, 0.0], vec![1.0, 0.0]),
        ],
    )
    .unwrap();
    let mut explainer = Explainer::new(Model::Forest(model), ExplainConfig::default().with_jobs(1)).unwrap();
    let explanation = explainer.explain_class_names(&["b"]).unwrap();
    assert!(explanation.outcome.is_complete());
    assert!(explanation.implicants().is_empty());

    // Every combination votes a; each one rules out an interval of x and one of y.
    let everything = explainer.explain_class_names(&["a"]).unwrap();
    assert_eq!(everything.implicants().len(), 4);
    assert!(everything.implicants().iter().all(|imp| imp.len() == 2));
}

#[test]
fn encoder_is_shared_between_queries() {
    let mut explainer = Explainer::new(Model::Forest(independent()), ExplainConfig::default().with_jobs(1)).unwrap();
    let projection = explainer.encoder().encoding().projection().to_vec();
    let first = explainer.explain_class(1).unwrap();
    let second = explainer.explain_class(1).unwrap();
    assert_eq!(first, second);
    assert_eq!(explainer.encoder().encoding().projection(), projection.as_slice());
}

// ─── Iris Forest ───────────────────────────────────────────────────────────────

#[test]
fn iris_forest_is_sound_and_complete() {
    let mut explainer = Explainer::new(load("iris_forest.json"), ExplainConfig::default()).unwrap();
    let explanations = explainer.explain_all().unwrap();
    let points = grid(explainer.model().ensemble());

    for explanation in &explanations {
        let class = explanation.classes[0];
        let predicates: Vec<_> = explanation.implicants().iter().map(|i| explainer.decode(i)).collect();
        for point in &points {
            let predicted = explainer.model().ensemble().predict(point);
            let covered = predicates.iter().any(|p| p.holds(point));
            if covered {
                assert_eq!(predicted, class, "{:?} satisfies an implicant of class {}", point, class);
            }
            if predicted == class {
                assert!(covered, "{:?} of class {} is not covered", point, class);
            }
        }
    }
}

#[test]
fn iris_forest_combinations() {
    let model = load("iris_forest.json");
    let Model::Forest(forest) = &model else {
        panic!("expected a forest");
    };
    assert_eq!(forest.n_trees(), 3);
    let encoder = ForestEncoder::new(forest);
    let combinations = encoder.combinations();
    assert_eq!(combinations.naive_count(), &BigUint::from(36u32));
    assert!(combinations.feasible_count() < 36);
    let per_class: usize = (0..forest.n_classes()).map(|c| combinations.of_class(c).len()).sum();
    assert_eq!(per_class, combinations.feasible_count());

    // Every grid point reaches a feasible combination filed under the predicted class.
    for point in grid(forest) {
        let leaves: Vec<(usize, usize)> = forest
            .trees()
            .iter()
            .enumerate()
            .map(|(tree, data)| (tree, data.leaf_for(&point)))
            .collect();
        let combination = combinations
            .iter()
            .find(|c| c.leaves() == leaves.as_slice())
            .unwrap_or_else(|| panic!("no combination for {:?}", point));
        assert_eq!(combination.class(), forest.predict(&point));
    }
}

#[test]
fn iris_forest_report() {
    let mut explainer = Explainer::new(load("iris_forest.json"), ExplainConfig::default().with_jobs(1)).unwrap();
    let explanation = explainer.explain_class_names(&["setosa"]).unwrap();
    let report = explainer.report(&explanation).unwrap();
    assert_eq!(report.leaves_per_tree, vec![1, 1, 1]);
    let text = report.to_string();
    assert!(text.contains("Number of leaf nodes for tree 2: 1"));
}
