use super::{FeatureError, Featurizer};
use crate::core::models::topology::Topology;
use crate::core::models::trajectory::Trajectory;
use itertools::Itertools;
use ndarray::Array2;
use tracing::debug;

/// Pairwise distances between the C-alpha atoms of a protein.
///
/// C-alpha atoms are numbered in topology order. Pairs whose numbers differ by no
/// more than `excluded_neighbors` are skipped, which removes the nearly constant
/// distances along the backbone.
#[derive(Debug, Clone)]
pub struct CaDistanceFeaturizer {
    n_atoms: usize,
    pairs: Vec<(usize, usize)>,
    labels: Vec<String>,
    periodic: bool,
}

impl CaDistanceFeaturizer {
    pub fn new(
        topology: &Topology,
        excluded_neighbors: usize,
        periodic: bool,
    ) -> Result<Self, FeatureError> {
        let ca_indices = topology.alpha_carbon_indices();
        let pairs: Vec<(usize, usize)> = ca_indices
            .iter()
            .copied()
            .enumerate()
            .tuple_combinations()
            .filter(|((pos_a, _), (pos_b, _))| pos_b - pos_a > excluded_neighbors)
            .map(|((_, atom_a), (_, atom_b))| (atom_a, atom_b))
            .collect();

        if pairs.len() < 2 {
            return Err(FeatureError::TooFewPairs { found: pairs.len() });
        }
        debug!(
            "Selected {} C-alpha pairs from {} C-alpha atoms",
            pairs.len(),
            ca_indices.len()
        );

        let labels = pairs
            .iter()
            .map(|&(a, b)| Self::label(topology, a, b))
            .collect();

        Ok(Self {
            n_atoms: topology.n_atoms(),
            pairs,
            labels,
            periodic,
        })
    }

    fn label(topology: &Topology, a: usize, b: usize) -> String {
        let describe = |i: usize| match topology.atom(i) {
            Some(atom) => format!("{}{}", atom.residue_name, atom.residue_number),
            None => format!("atom{i}"),
        };
        format!("DIST: CA {} - CA {}", describe(a), describe(b))
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}

impl Featurizer for CaDistanceFeaturizer {
    fn dimension(&self) -> usize {
        self.pairs.len()
    }

    fn describe(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn featurize(&self, trajectory: &Trajectory) -> Result<Array2<f64>, FeatureError> {
        let frames = trajectory.frames();
        let mut features = Array2::zeros((frames.len(), self.pairs.len()));
        for (index, (frame, mut row)) in frames.iter().zip(features.rows_mut()).enumerate() {
            if frame.n_atoms() != self.n_atoms {
                return Err(FeatureError::AtomCountMismatch {
                    frame: index,
                    expected: self.n_atoms,
                    found: frame.n_atoms(),
                });
            }
            for (value, &(a, b)) in row.iter_mut().zip(&self.pairs) {
                *value = frame.distance(a, b, self.periodic);
            }
        }
        Ok(features)
    }
}
