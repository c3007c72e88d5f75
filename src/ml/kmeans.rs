use crate::error::{AppError, Result};
use crate::ml::models::KMeansConfig;
use crate::ml::tfidf::SparseVector;
use linfa::traits::FitWith;
use linfa::DatasetBase;
use linfa_clustering::{IncrKMeansError, KMeans, KMeansInit};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Mini-batch k-means over TF-IDF rows.
///
/// Fitting runs linfa's incremental k-means (k-means++ seeding on an init
/// sample, then one centroid update per batch). Only the centroids are kept;
/// prediction is a nearest-centroid lookup against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniBatchKMeans {
    config: KMeansConfig,

    /// n_clusters × dim
    centroids: Array2<f64>,

    /// Squared L2 norm of each centroid
    centroid_norms: Array1<f64>,

    is_fitted: bool,
}

impl MiniBatchKMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            centroids: Array2::zeros((0, 0)),
            centroid_norms: Array1::zeros(0),
            is_fitted: false,
        }
    }

    /// Fit centroids on rows of dimension `dim`.
    ///
    /// With `dim == 0` there is nothing to separate and every row lands in
    /// cluster 0. With no more distinct rows than clusters, each distinct row
    /// becomes its own centroid.
    pub fn fit(&mut self, rows: &[SparseVector], dim: usize) -> Result<()> {
        if rows.is_empty() {
            return Err(AppError::Internal(
                "Cannot fit k-means on an empty dataset".to_string(),
            ));
        }
        let k = self.config.n_clusters;
        if k == 0 {
            return Err(AppError::Configuration(
                "k-means needs at least one cluster".to_string(),
            ));
        }

        self.is_fitted = true;

        if dim == 0 {
            self.centroids = Array2::zeros((0, 0));
            self.refresh_norms();
            return Ok(());
        }

        let distinct = distinct_rows(rows);
        self.centroids = if distinct.len() <= k {
            debug!(distinct = distinct.len(), k, "Too few distinct rows, using them as centroids");
            densify(rows, &distinct, dim)
        } else {
            self.fit_batches(rows, dim)?
        };
        self.refresh_norms();

        Ok(())
    }

    fn fit_batches(&self, rows: &[SparseVector], dim: usize) -> Result<Array2<f64>> {
        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(self.config.random_state);

        let params = KMeans::params_with_rng(self.config.n_clusters, rng.clone())
            .init_method(KMeansInit::KMeansPlusPlus)
            .tolerance(self.config.tolerance);

        let batch_size = self.config.batch_size.max(1);
        let max_steps = self.config.max_epochs.max(1) * n.div_ceil(batch_size);

        // The first batch is the k-means++ init sample
        let mut batch = pick(n, self.config.init_size.max(self.config.n_clusters), &mut rng);
        let mut model: Option<KMeans<f64, _>> = None;

        for step in 0..max_steps {
            let records = densify(rows, &batch, dim);
            let dataset = DatasetBase::from(records);

            match params.fit_with(model.take(), &dataset) {
                Ok(converged) => {
                    debug!(step, "k-means converged");
                    return Ok(converged.centroids().clone());
                }
                Err(IncrKMeansError::NotConverged(current)) => model = Some(current),
                Err(e) => {
                    return Err(AppError::Internal(format!("k-means fit failed: {}", e)));
                }
            }

            batch = pick(n, batch_size, &mut rng);
        }

        debug!(steps = max_steps, "k-means stopped at the step limit");
        model
            .map(|m| m.centroids().clone())
            .ok_or_else(|| AppError::Internal("k-means produced no model".to_string()))
    }

    /// Cluster id for one row
    pub fn predict_one(&self, row: &SparseVector) -> Result<usize> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "MiniBatchKMeans must be fitted before predict".to_string(),
            ));
        }
        if self.centroids.nrows() == 0 {
            return Ok(0);
        }
        Ok(self.nearest(row))
    }

    pub fn predict(&self, rows: &[SparseVector]) -> Result<Vec<usize>> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Nearest centroid; lowest index wins ties.
    ///
    /// `||x||²` is the same for every centroid so it is left out.
    fn nearest(&self, row: &SparseVector) -> usize {
        let dim = self.centroids.ncols();
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in self.centroids.rows().into_iter().enumerate() {
            let dot: f64 = row
                .iter()
                .filter(|(idx, _)| *idx < dim)
                .map(|&(idx, w)| w * centroid[idx])
                .sum();
            let dist = self.centroid_norms[c] - 2.0 * dot;
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }

    fn refresh_norms(&mut self) {
        self.centroid_norms = self
            .centroids
            .rows()
            .into_iter()
            .map(|c| c.dot(&c))
            .collect();
    }
}

/// `size` distinct row indices, or every index when there are fewer rows
fn pick(n: usize, size: usize, rng: &mut StdRng) -> Vec<usize> {
    if n <= size {
        (0..n).collect()
    } else {
        sample(rng, n, size).into_vec()
    }
}

/// Index of the first occurrence of each distinct row
fn distinct_rows(rows: &[SparseVector]) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            let key: Vec<(usize, u64)> = row.iter().map(|&(i, w)| (i, w.to_bits())).collect();
            seen.insert(key)
        })
        .map(|(i, _)| i)
        .collect()
}

fn densify(rows: &[SparseVector], indices: &[usize], dim: usize) -> Array2<f64> {
    let mut dense = Array2::zeros((indices.len(), dim));
    for (r, &i) in indices.iter().enumerate() {
        for &(idx, w) in &rows[i] {
            if idx < dim {
                dense[[r, idx]] = w;
            }
        }
    }
    dense
}
