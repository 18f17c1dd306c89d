//! Explanations of single decision trees.

mod common;

use forest_implicants::decode::Comparison;
use forest_implicants::explain::{ExplainConfig, Explainer};
use forest_implicants::model::{Model, Node, Schema, Tree, TreeEnsemble, TreeModel};

use common::{grid, load};

fn explainer(model: Model) -> Explainer {
    Explainer::new(model, ExplainConfig::default().with_jobs(2)).unwrap()
}

// ─── Small Trees ───────────────────────────────────────────────────────────────

#[test]
fn single_split() {
    let tree = Tree::new(vec![
        Node::inner(0, 0.5, 1, 2),
        Node::leaf(vec![4.0, 1.0]),
        Node::leaf(vec![1.0, 4.0]),
    ])
    .unwrap();
    let schema = Schema::new(vec!["age".into()], vec!["young".into(), "old".into()]);
    let mut explainer = explainer(Model::Tree(TreeModel::new(schema, tree).unwrap()));

    let explanations = explainer.explain_all().unwrap();
    assert_eq!(explanations.len(), 2);

    let young: Vec<String> = explanations[0].implicants().iter().map(|i| explainer.decode(i).query).collect();
    let old: Vec<String> = explanations[1].implicants().iter().map(|i| explainer.decode(i).query).collect();
    assert_eq!(young, vec!["age <= 0.5"]);
    assert_eq!(old, vec!["age > 0.5"]);
}

#[test]
fn unused_feature_has_no_conditions() {
    // y never appears in a split.
    let tree = Tree::new(vec![
        Node::inner(0, 1.0, 1, 2),
        Node::leaf(vec![2.0, 0.0]),
        Node::inner(0, 3.0, 3, 4),
        Node::leaf(vec![0.0, 2.0]),
        Node::leaf(vec![2.0, 0.0]),
    ])
    .unwrap();
    let schema = Schema::new(vec!["x".into(), "y".into()], vec!["out".into(), "in".into()]);
    let mut explainer = explainer(Model::Tree(TreeModel::new(schema, tree).unwrap()));

    let inside = explainer.explain_class_names(&["in"]).unwrap();
    assert_eq!(inside.implicants().len(), 1);
    let predicate = explainer.decode(&inside.implicants()[0]);
    assert_eq!(predicate.query, "x > 1 and x <= 3");
    assert_eq!(predicate.features, 1);
    assert_eq!(predicate.conditions[0].op, Comparison::Gt);

    let outside = explainer.explain_class_names(&["out"]).unwrap();
    let mut queries: Vec<String> = outside.implicants().iter().map(|i| explainer.decode(i).query).collect();
    queries.sort();
    assert_eq!(queries, vec!["x <= 1", "x > 3"]);
}

#[test]
fn class_without_leaves() {
    let tree = Tree::new(vec![
        Node::inner(0, 1.0, 1, 2),
        Node::leaf(vec![2.0, 0.0, 1.0]),
        Node::leaf(vec![0.0, 2.0, 1.0]),
    ])
    .unwrap();
    let schema = Schema::new(vec!["x".into()], vec!["a".into(), "b".into(), "c".into()]);
    let mut explainer = explainer(Model::Tree(TreeModel::new(schema, tree).unwrap()));

    let explanation = explainer.explain_class(2).unwrap();
    assert!(explanation.outcome.is_complete());
    assert!(explanation.implicants().is_empty());
}

#[test]
fn class_set_keeps_leaf_regions() {
    let tree = Tree::new(vec![
        Node::inner(0, 1.0, 1, 2),
        Node::leaf(vec![3.0, 0.0, 0.0]),
        Node::inner(0, 2.0, 3, 4),
        Node::leaf(vec![0.0, 3.0, 0.0]),
        Node::leaf(vec![0.0, 0.0, 3.0]),
    ])
    .unwrap();
    let schema = Schema::new(vec!["x".into()], vec!["a".into(), "b".into(), "c".into()]);
    let mut explainer = explainer(Model::Tree(TreeModel::new(schema, tree).unwrap()));

    let explanation = explainer.explain_class_names(&["b", "c"]).unwrap();
    let queries: Vec<String> = explanation.implicants().iter().map(|i| explainer.decode(i).query).collect();
    // One minimal set of ruled-out intervals per leaf of the set.
    assert_eq!(queries, vec!["x > 2", "x > 1 and x <= 2"]);
}

#[test]
fn signed_zero_thresholds_share_one_split() {
    // Both zeros name one split, so leaf 4 is unreachable.
    let tree = Tree::new(vec![
        Node::inner(0, 0.0, 1, 2),
        Node::inner(0, -0.0, 3, 4),
        Node::leaf(vec![0.0, 3.0]),
        Node::leaf(vec![3.0, 0.0]),
        Node::leaf(vec![0.0, 1.0]),
    ])
    .unwrap();
    let schema = Schema::new(vec!["x".into()], vec!["neg".into(), "pos".into()]);
    let mut explainer = explainer(Model::Tree(TreeModel::new(schema, tree).unwrap()));

    let neg = explainer.explain_class_names(&["neg"]).unwrap();
    let queries: Vec<String> = neg.implicants().iter().map(|i| explainer.decode(i).query).collect();
    assert_eq!(queries, vec!["x <= 0"]);
}

// ─── Iris Tree ─────────────────────────────────────────────────────────────────

#[test]
fn iris_tree_is_sound_and_complete() {
    let mut explainer = explainer(load("iris_tree.json"));
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
fn iris_tree_setosa() {
    let mut explainer = explainer(load("iris_tree.json"));
    let explanation = explainer.explain_class_names(&["setosa"]).unwrap();
    let queries: Vec<String> = explanation.implicants().iter().map(|i| explainer.decode(i).query).collect();
    assert_eq!(queries, vec!["petal_length <= 2.45"]);

    let report = explainer.report(&explanation).unwrap();
    assert_eq!(report.leaves_per_tree, vec![1]);
    assert_eq!(report.leaf_depths(), vec![1]);
}

#[test]
fn iris_tree_report() {
    let mut explainer = explainer(load("iris_tree.json"));
    let explanation = explainer.explain_class_names(&["virginica"]).unwrap();
    let report = explainer.report(&explanation).unwrap();
    // Leaves 6 and 8.
    assert_eq!(report.leaves_per_tree, vec![2]);
    assert_eq!(report.leaf_depths(), vec![3, 3]);
    assert_eq!(report.leaves[0].samples, 43.0);
    let text = report.to_string();
    assert!(text.contains("Explaining class: virginica"));
    assert!(text.contains("Number of leaf nodes: 2"));
}

#[test]
fn iris_tree_render() {
    let model = load("iris_tree.json");
    let ensemble = model.ensemble();
    let text = ensemble.tree(0).render(ensemble.schema());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "N0: setosa (petal_length <= 2.45) ? N1 : N2");
    assert_eq!(lines[1], " N1: setosa");
    assert_eq!(lines[8], "   N8: virginica");
}
