use super::Discretization;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, concatenate};
use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KMeansError {
    #[error("Number of clusters must be at least 1")]
    ZeroClusters,
    #[error("Cannot form {n_clusters} clusters from {n_frames} frames")]
    TooFewFrames { n_clusters: usize, n_frames: usize },
    #[error("Input has {found} columns, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// k-means clustering with k-means++ seeding and Lloyd iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Iteration stops once the relative change of the inertia drops below this.
    pub tolerance: f64,
}

impl KMeans {
    pub fn new(n_clusters: usize, max_iter: usize) -> Self {
        Self {
            n_clusters,
            max_iter,
            tolerance: 1e-5,
        }
    }

    /// Clusters the frames of all trajectories together.
    ///
    /// # Errors
    ///
    /// Returns [`KMeansError::TooFewFrames`] if there are fewer frames than clusters
    /// and [`KMeansError::DimensionMismatch`] if trajectories differ in width.
    #[instrument(skip_all, name = "kmeans", fields(k = self.n_clusters))]
    pub fn fit<R: Rng>(
        &self,
        data: &[Array2<f64>],
        rng: &mut R,
    ) -> Result<KMeansModel, KMeansError> {
        if self.n_clusters == 0 {
            return Err(KMeansError::ZeroClusters);
        }
        let points = stack_frames(data)?;
        let n_frames = points.nrows();
        if n_frames < self.n_clusters {
            return Err(KMeansError::TooFewFrames {
                n_clusters: self.n_clusters,
                n_frames,
            });
        }

        let mut centers = self.seed(points.view(), rng);
        let mut inertia = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            iterations += 1;
            let assignments = assign_all(points.view(), centers.view());
            let new_inertia: f64 = assignments.iter().map(|&(_, d2)| d2).sum();
            update_centers(points.view(), &assignments, &mut centers);

            let change = (inertia - new_inertia).abs() / new_inertia.max(f64::MIN_POSITIVE);
            inertia = new_inertia;
            debug!("Iteration {iterations}: inertia {inertia:.6e}");
            if change < self.tolerance {
                converged = true;
                break;
            }
        }

        if converged {
            info!("k-means converged after {iterations} iterations (inertia {inertia:.4e})");
        } else {
            warn!(
                "k-means did not converge within {} iterations (inertia {inertia:.4e})",
                self.max_iter
            );
        }

        Ok(KMeansModel {
            centers,
            inertia,
            iterations,
            converged,
        })
    }

    /// k-means++: each new center is drawn with probability proportional to the
    /// squared distance from the nearest center chosen so far.
    fn seed<R: Rng>(&self, points: ArrayView2<f64>, rng: &mut R) -> Array2<f64> {
        let n = points.nrows();
        let mut chosen = Vec::with_capacity(self.n_clusters);
        chosen.push(rng.gen_range(0..n));
        let mut nearest: Vec<f64> = (0..n)
            .map(|i| squared_distance(points.row(i), points.row(chosen[0])))
            .collect();

        while chosen.len() < self.n_clusters {
            let next = match WeightedIndex::new(&nearest) {
                Ok(weights) => weights.sample(rng),
                // All remaining points coincide with a center.
                Err(_) => rng.gen_range(0..n),
            };
            chosen.push(next);
            let center = points.row(next);
            nearest
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, d2)| *d2 = d2.min(squared_distance(points.row(i), center)));
        }

        points.select(Axis(0), &chosen)
    }
}

fn stack_frames(data: &[Array2<f64>]) -> Result<Array2<f64>, KMeansError> {
    let width = data.first().map_or(0, |d| d.ncols());
    if let Some(bad) = data.iter().find(|d| d.ncols() != width) {
        return Err(KMeansError::DimensionMismatch {
            expected: width,
            found: bad.ncols(),
        });
    }
    let views: Vec<ArrayView2<f64>> = data.iter().map(|d| d.view()).collect();
    if views.is_empty() {
        return Ok(Array2::zeros((0, 0)));
    }
    concatenate(Axis(0), &views).map_err(|_| KMeansError::DimensionMismatch {
        expected: width,
        found: width,
    })
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_center(point: ArrayView1<f64>, centers: ArrayView2<f64>) -> (usize, f64) {
    centers
        .rows()
        .into_iter()
        .map(|center| squared_distance(point, center))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (index, d2)| {
            if d2 < best.1 { (index, d2) } else { best }
        })
}

fn assign_all(points: ArrayView2<f64>, centers: ArrayView2<f64>) -> Vec<(usize, f64)> {
    (0..points.nrows())
        .into_par_iter()
        .map(|i| nearest_center(points.row(i), centers))
        .collect()
}

/// Moves every center to the mean of its members. Empty clusters keep their
/// previous center.
fn update_centers(points: ArrayView2<f64>, assignments: &[(usize, f64)], centers: &mut Array2<f64>) {
    let mut sums = Array2::<f64>::zeros(centers.dim());
    let mut counts = vec![0usize; centers.nrows()];
    for (point, &(label, _)) in points.rows().into_iter().zip(assignments) {
        let mut sum = sums.row_mut(label);
        sum += &point;
        counts[label] += 1;
    }
    for (label, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(label) / count as f64;
            centers.row_mut(label).assign(&mean);
        }
    }
}

/// Fitted cluster centers.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    centers: Array2<f64>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

impl KMeansModel {
    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    pub fn n_clusters(&self) -> usize {
        self.centers.nrows()
    }

    /// Sum of squared distances of the frames to their centers.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Index of the nearest center for every row of `data`.
    pub fn assign(&self, data: ArrayView2<f64>) -> Result<Vec<usize>, KMeansError> {
        if data.ncols() != self.centers.ncols() {
            return Err(KMeansError::DimensionMismatch {
                expected: self.centers.ncols(),
                found: data.ncols(),
            });
        }
        Ok(assign_all(data, self.centers.view())
            .into_iter()
            .map(|(label, _)| label)
            .collect())
    }

    /// Discretizes each trajectory against the fitted centers.
    pub fn discretize(&self, data: &[Array2<f64>]) -> Result<Discretization, KMeansError> {
        let dtrajs = data
            .iter()
            .map(|trajectory| self.assign(trajectory.view()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Discretization {
            dtrajs,
            centers: self.centers.clone(),
        })
    }
}
