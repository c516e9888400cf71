//! Trained classifiers and their input features
//!
//! Artifacts carry the standard scaler fitted during preprocessing, so
//! they accept raw feature values.

use serde::{Deserialize, Serialize};

/// Number of numeric input features
pub const FEATURE_COUNT: usize = 10;

/// Numeric feature columns, in model input order
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Elevation",
    "Aspect",
    "Slope",
    "Horizontal_Distance_To_Hydrology",
    "Vertical_Distance_To_Hydrology",
    "Horizontal_Distance_To_Roadways",
    "Hillshade_9am",
    "Hillshade_Noon",
    "Hillshade_3pm",
    "Horizontal_Distance_To_Fire_Points",
];

/// The environmental measurements a prediction is made from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct Features {
    pub Elevation: f64,
    pub Aspect: f64,
    pub Slope: f64,
    pub Horizontal_Distance_To_Hydrology: f64,
    pub Vertical_Distance_To_Hydrology: f64,
    pub Horizontal_Distance_To_Roadways: f64,
    pub Hillshade_9am: f64,
    pub Hillshade_Noon: f64,
    pub Hillshade_3pm: f64,
    pub Horizontal_Distance_To_Fire_Points: f64,
}

impl Features {
    /// Values in [`FEATURE_COLUMNS`] order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.Elevation,
            self.Aspect,
            self.Slope,
            self.Horizontal_Distance_To_Hydrology,
            self.Vertical_Distance_To_Hydrology,
            self.Horizontal_Distance_To_Roadways,
            self.Hillshade_9am,
            self.Hillshade_Noon,
            self.Hillshade_3pm,
            self.Horizontal_Distance_To_Fire_Points,
        ]
    }
}

/// Per-column standardization `(x - mean) / std`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub means: [f64; FEATURE_COUNT],
    pub stds: [f64; FEATURE_COUNT],
}

impl Scaler {
    /// Scaler that leaves values unchanged
    pub fn identity() -> Self {
        Self {
            means: [0.0; FEATURE_COUNT],
            stds: [1.0; FEATURE_COUNT],
        }
    }

    /// Fit on rows using the population standard deviation
    ///
    /// Constant columns get a std of 1 so they scale to zero.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        if rows.is_empty() {
            return Self::identity();
        }
        let n = rows.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        let mut stds = [0.0; FEATURE_COUNT];
        for col in 0..FEATURE_COUNT {
            let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
            means[col] = mean;
            stds[col] = if var > 0.0 { var.sqrt() } else { 1.0 };
        }
        Self { means, stds }
    }

    /// Standardize one row
    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for col in 0..FEATURE_COUNT {
            out[col] = (row[col] - self.means[col]) / self.stds[col];
        }
        out
    }
}

/// A trained cover type classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Always predicts the most frequent training label
    MajorityClass { class: i64 },

    /// Predicts the label of the closest class centroid
    NearestCentroid {
        scaler: Scaler,
        classes: Vec<i64>,
        centroids: Vec<[f64; FEATURE_COUNT]>,
    },

    /// Gaussian naive Bayes with per-class feature means and variances
    GaussianNaiveBayes {
        scaler: Scaler,
        classes: Vec<i64>,
        log_priors: Vec<f64>,
        means: Vec<[f64; FEATURE_COUNT]>,
        variances: Vec<[f64; FEATURE_COUNT]>,
    },
}

impl ModelArtifact {
    /// Short name of the model family
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::MajorityClass { .. } => "majority_class",
            ModelArtifact::NearestCentroid { .. } => "nearest_centroid",
            ModelArtifact::GaussianNaiveBayes { .. } => "gaussian_naive_bayes",
        }
    }

    /// Predict the cover type for raw feature values
    pub fn predict(&self, raw: &[f64; FEATURE_COUNT]) -> i64 {
        match self {
            ModelArtifact::MajorityClass { class } => *class,
            ModelArtifact::NearestCentroid { scaler, .. }
            | ModelArtifact::GaussianNaiveBayes { scaler, .. } => {
                self.predict_scaled(&scaler.transform(raw))
            }
        }
    }

    /// Predict for values already standardized with the model's scaler
    pub fn predict_scaled(&self, x: &[f64; FEATURE_COUNT]) -> i64 {
        match self {
            ModelArtifact::MajorityClass { class } => *class,
            ModelArtifact::NearestCentroid {
                classes, centroids, ..
            } => argmax(classes, centroids.iter().map(|c| -squared_distance(x, c))),
            ModelArtifact::GaussianNaiveBayes {
                classes,
                log_priors,
                means,
                variances,
                ..
            } => {
                let scores = log_priors
                    .iter()
                    .zip(means.iter().zip(variances))
                    .map(|(prior, (mean, var))| prior + log_likelihood(x, mean, var));
                argmax(classes, scores)
            }
        }
    }
}

fn squared_distance(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn log_likelihood(
    x: &[f64; FEATURE_COUNT],
    mean: &[f64; FEATURE_COUNT],
    var: &[f64; FEATURE_COUNT],
) -> f64 {
    x.iter()
        .zip(mean.iter().zip(var))
        .map(|(x, (m, v))| {
            -0.5 * (2.0 * std::f64::consts::PI * v).ln() - (x - m).powi(2) / (2.0 * v)
        })
        .sum()
}

/// Label with the highest score; ties go to the earliest class
fn argmax(classes: &[i64], scores: impl Iterator<Item = f64>) -> i64 {
    let mut best: Option<(i64, f64)> = None;
    for (class, score) in classes.iter().zip(scores) {
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((*class, score));
        }
    }
    best.map(|(class, _)| class).unwrap_or_default()
}
