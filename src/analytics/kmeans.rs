//! Deterministic k-means over rows of an `ndarray` matrix.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Fitted clusters: one centroid row per cluster, one label per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub centroids: Array2<f32>,
    pub labels: Vec<usize>,
}

impl Clustering {
    /// Index of the centroid nearest to `sample`.
    pub fn predict(&self, sample: ArrayView1<f32>) -> usize {
        nearest(&self.centroids, sample)
    }
}

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    tolerance: f32,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }

    /// Cluster the rows of `samples`.
    ///
    /// Seeds with sample 0, then repeatedly the sample farthest from every
    /// chosen seed. Returns `None` when there are fewer samples than clusters.
    pub fn fit(&self, samples: ArrayView2<f32>) -> Option<Clustering> {
        let n = samples.nrows();
        if self.k == 0 || n < self.k {
            return None;
        }

        let mut centroids = Array2::<f32>::zeros((self.k, samples.ncols()));
        centroids.row_mut(0).assign(&samples.row(0));
        let mut closest: Vec<f32> = samples
            .outer_iter()
            .map(|s| squared(s, samples.row(0)))
            .collect();
        for c in 1..self.k {
            let far = closest
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(i, _)| i);
            centroids.row_mut(c).assign(&samples.row(far));
            for (d, s) in closest.iter_mut().zip(samples.outer_iter()) {
                *d = d.min(squared(s, samples.row(far)));
            }
        }

        let mut labels = vec![0; n];
        for _ in 0..self.max_iterations {
            for (label, sample) in labels.iter_mut().zip(samples.outer_iter()) {
                *label = nearest(&centroids, sample);
            }

            let mut sums = Array2::<f32>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; self.k];
            for (label, sample) in labels.iter().zip(samples.outer_iter()) {
                let mut row = sums.row_mut(*label);
                row += &sample;
                counts[*label] += 1;
            }

            let mut shift = 0.0f32;
            for (c, count) in counts.iter().enumerate() {
                // Empty clusters keep their previous centroid.
                if *count == 0 {
                    continue;
                }
                let updated: Array1<f32> = sums.row(c).mapv(|v| v / *count as f32);
                shift += squared(updated.view(), centroids.row(c));
                centroids.row_mut(c).assign(&updated);
            }
            if shift <= self.tolerance {
                break;
            }
        }

        for (label, sample) in labels.iter_mut().zip(samples.outer_iter()) {
            *label = nearest(&centroids, sample);
        }
        Some(Clustering { centroids, labels })
    }
}

fn squared(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &Array2<f32>, sample: ArrayView1<f32>) -> usize {
    centroids
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, c)| (i, squared(c, sample)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_two_obvious_groups() {
        let samples = array![
            [250.0f32, 0.0, 0.0],
            [240.0, 10.0, 5.0],
            [0.0, 0.0, 250.0],
            [10.0, 5.0, 240.0],
            [245.0, 5.0, 0.0],
        ];
        let clustering = KMeans::new(2).fit(samples.view()).unwrap();
        assert_eq!(clustering.labels, vec![0, 0, 1, 1, 0]);
        assert!(clustering.centroids[[0, 0]] > 200.0);
        assert!(clustering.centroids[[1, 2]] > 200.0);
        assert_eq!(clustering.predict(array![5.0f32, 0.0, 230.0].view()), 1);
    }

    #[test]
    fn test_too_few_samples() {
        let samples = array![[1.0f32, 2.0, 3.0]];
        assert!(KMeans::new(2).fit(samples.view()).is_none());
    }

    #[test]
    fn test_identical_samples_do_not_panic() {
        let samples = Array2::<f32>::from_elem((6, 3), 7.0);
        let clustering = KMeans::new(2).fit(samples.view()).unwrap();
        assert!(clustering.labels.iter().all(|&l| l == 0));
    }
}
