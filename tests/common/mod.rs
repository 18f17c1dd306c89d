//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::path::PathBuf;

use forest_implicants::model::{Model, TreeEnsemble};

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("data").join(name)
}

pub fn load(name: &str) -> Model {
    Model::from_json(File::open(data_path(name)).unwrap()).unwrap()
}

/// One representative value per interval of every feature: the interval's upper
/// threshold, or one past the last threshold for the unbounded interval.
pub fn representatives(ensemble: &dyn TreeEnsemble) -> Vec<Vec<f64>> {
    let thresholds = ensemble.thresholds();
    (0..ensemble.n_features())
        .map(|feature| {
            let values = thresholds.values(feature);
            let mut points: Vec<f64> = values.iter().copied().filter(|t| t.is_finite()).collect();
            points.push(points.last().map_or(0.0, |t| t + 1.0));
            points
        })
        .collect()
}

/// All points of the grid spanned by the representatives.
pub fn grid(ensemble: &dyn TreeEnsemble) -> Vec<Vec<f64>> {
    let mut points = vec![Vec::new()];
    for values in representatives(ensemble) {
        points = points
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&v| {
                    let mut point = prefix.clone();
                    point.push(v);
                    point
                })
            })
            .collect();
    }
    points
}
