//! Candidate models, evaluation and promotion

use crate::error::Result;
use crate::preprocess::{labeled_rows, LabeledRows};
use crate::table::Table;
use covertype_core::SampleRng;
use covertype_registry::{FsRegistry, ModelArtifact, Scaler, FEATURE_COUNT};
use indexmap::IndexMap;
use tracing::{info, warn};

/// Model families trained on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    MajorityClass,
    NearestCentroid,
    GaussianNaiveBayes,
}

impl Candidate {
    pub const ALL: [Candidate; 3] = [
        Candidate::MajorityClass,
        Candidate::NearestCentroid,
        Candidate::GaussianNaiveBayes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Candidate::MajorityClass => "majority_class",
            Candidate::NearestCentroid => "nearest_centroid",
            Candidate::GaussianNaiveBayes => "gaussian_naive_bayes",
        }
    }

    /// Fit on standardized features; `scaler` is embedded for raw predictions
    pub fn fit(self, train: &LabeledRows, scaler: &Scaler) -> ModelArtifact {
        let stats = ClassStats::collect(train);
        match self {
            Candidate::MajorityClass => ModelArtifact::MajorityClass {
                class: stats.majority(),
            },
            Candidate::NearestCentroid => ModelArtifact::NearestCentroid {
                scaler: scaler.clone(),
                classes: stats.classes.clone(),
                centroids: stats.means.clone(),
            },
            Candidate::GaussianNaiveBayes => {
                let total = train.len() as f64;
                // Smoothing relative to the largest feature variance
                let max_var = stats
                    .variances
                    .iter()
                    .flatten()
                    .fold(0.0_f64, |acc, v| acc.max(*v));
                let epsilon = 1e-9 * max_var.max(1.0);
                ModelArtifact::GaussianNaiveBayes {
                    scaler: scaler.clone(),
                    classes: stats.classes.clone(),
                    log_priors: stats
                        .counts
                        .iter()
                        .map(|&n| (n as f64 / total).ln())
                        .collect(),
                    means: stats.means.clone(),
                    variances: stats
                        .variances
                        .iter()
                        .map(|row| row.map(|v| v + epsilon))
                        .collect(),
                }
            }
        }
    }
}

/// Per-class counts, means and population variances, classes ascending
struct ClassStats {
    classes: Vec<i64>,
    counts: Vec<usize>,
    means: Vec<[f64; FEATURE_COUNT]>,
    variances: Vec<[f64; FEATURE_COUNT]>,
}

impl ClassStats {
    fn collect(rows: &LabeledRows) -> Self {
        let mut grouped: IndexMap<i64, Vec<&[f64; FEATURE_COUNT]>> = IndexMap::new();
        for (features, label) in rows.features.iter().zip(&rows.labels) {
            grouped.entry(*label).or_default().push(features);
        }
        grouped.sort_keys();

        let mut stats = ClassStats {
            classes: Vec::with_capacity(grouped.len()),
            counts: Vec::with_capacity(grouped.len()),
            means: Vec::with_capacity(grouped.len()),
            variances: Vec::with_capacity(grouped.len()),
        };
        for (class, members) in grouped {
            let n = members.len() as f64;
            let mut mean = [0.0; FEATURE_COUNT];
            let mut var = [0.0; FEATURE_COUNT];
            for col in 0..FEATURE_COUNT {
                mean[col] = members.iter().map(|r| r[col]).sum::<f64>() / n;
                var[col] = members
                    .iter()
                    .map(|r| (r[col] - mean[col]).powi(2))
                    .sum::<f64>()
                    / n;
            }
            stats.classes.push(class);
            stats.counts.push(members.len());
            stats.means.push(mean);
            stats.variances.push(var);
        }
        stats
    }

    /// Most frequent class; ties go to the smallest label
    fn majority(&self) -> i64 {
        let mut best: Option<(i64, usize)> = None;
        for (class, count) in self.classes.iter().zip(&self.counts) {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((*class, *count));
            }
        }
        best.map(|(class, _)| class).unwrap_or_default()
    }
}

/// Split row indices so each class keeps roughly `test_fraction` held out
///
/// Returns `(train, test)`, both in ascending order.
pub fn stratified_split(
    labels: &[i64],
    test_fraction: f64,
    rng: &mut SampleRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: IndexMap<i64, Vec<usize>> = IndexMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(*label).or_default().push(i);
    }
    by_class.sort_keys();

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut members) in by_class {
        rng.shuffle(&mut members);
        let n_test = ((members.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(members.len().saturating_sub(1));
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Fraction of rows the model labels correctly
pub fn accuracy(model: &ModelArtifact, rows: &LabeledRows) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .features
        .iter()
        .zip(&rows.labels)
        .filter(|(x, y)| model.predict_scaled(x) == **y)
        .count();
    correct as f64 / rows.len() as f64
}

/// Score of one candidate on the held-out rows
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub candidate: &'static str,
    pub run_id: String,
    pub accuracy: f64,
}

/// What a training step produced
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub candidates: Vec<CandidateResult>,
    /// Promoted version and the candidate it came from
    pub promoted: Option<(u32, &'static str)>,
}

/// Training inputs shared by every candidate
pub struct Trainer<'a> {
    pub registry: &'a FsRegistry,
    pub model_name: &'a str,
    pub seed: u64,
    pub test_fraction: f64,
}

impl Trainer<'_> {
    /// Train every candidate on a preprocessed table and promote the best
    ///
    /// Returns `None` when there is nothing to train on.
    pub fn run(
        &self,
        table: Option<&Table>,
        scaler: Option<&Scaler>,
    ) -> Result<Option<TrainOutcome>> {
        let (table, scaler) = match (table, scaler) {
            (Some(table), Some(scaler)) if !table.is_empty() => (table, scaler),
            _ => {
                warn!("preprocessed table is missing or empty, skipping training");
                return Ok(None);
            }
        };

        let (rows, _) = labeled_rows(table)?;
        let mut rng = SampleRng::new(self.seed);
        let (train_idx, test_idx) = stratified_split(&rows.labels, self.test_fraction, &mut rng);
        if test_idx.is_empty() {
            warn!(rows = rows.len(), "too few rows for a test split, skipping training");
            return Ok(None);
        }
        let train = select(&rows, &train_idx);
        let test = select(&rows, &test_idx);
        info!(train = train.len(), test = test.len(), "split rows");

        let mut candidates = Vec::with_capacity(Candidate::ALL.len());
        let mut best: Option<(usize, f64)> = None;
        for candidate in Candidate::ALL {
            let model = candidate.fit(&train, scaler);
            let score = accuracy(&model, &test);

            let mut params = IndexMap::new();
            params.insert("model".to_string(), candidate.name().to_string());
            let mut metrics = IndexMap::new();
            metrics.insert("accuracy".to_string(), score);
            let run_id = self.registry.log_run(candidate.name(), params, metrics, model)?;
            info!(model = candidate.name(), accuracy = score, "evaluated candidate");

            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((candidates.len(), score));
            }
            candidates.push(CandidateResult {
                candidate: candidate.name(),
                run_id,
                accuracy: score,
            });
        }

        let promoted = match best {
            Some((i, score)) => {
                let winner = &candidates[i];
                let version = self.registry.register_model(self.model_name, &winner.run_id)?;
                self.registry
                    .transition_to_production(self.model_name, version.version)?;
                info!(
                    model = winner.candidate,
                    accuracy = score,
                    version = version.version,
                    "promoted best candidate"
                );
                Some((version.version, winner.candidate))
            }
            None => {
                warn!("no candidate scored above zero, Production unchanged");
                None
            }
        };

        Ok(Some(TrainOutcome {
            candidates,
            promoted,
        }))
    }
}

fn select(rows: &LabeledRows, indices: &[usize]) -> LabeledRows {
    LabeledRows {
        features: indices.iter().map(|&i| rows.features[i]).collect(),
        labels: indices.iter().map(|&i| rows.labels[i]).collect(),
    }
}
