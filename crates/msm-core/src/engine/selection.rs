use super::config::{InputConfig, RunFlags};
use rand::Rng;
use rand::seq::index::sample;
use std::path::{Path, PathBuf};
use tracing::info;

/// The reference structure and the trajectories a run works on, with paths
/// resolved against the data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySet {
    structure: PathBuf,
    trajectories: Vec<PathBuf>,
}

impl TrajectorySet {
    /// Joins every relative path to `input.data_dir`. Absolute paths are kept.
    pub fn resolve(input: &InputConfig) -> Self {
        let resolve = |path: &Path| input.data_dir.join(path);
        Self {
            structure: resolve(&input.structure),
            trajectories: input.trajectories.iter().map(|p| resolve(p)).collect(),
        }
    }

    /// Applies the selection rules of a run: bootstrap subsampling first, then
    /// truncation to a single trajectory for quick runs.
    pub fn select<R: Rng>(
        input: &InputConfig,
        flags: &RunFlags,
        bootstrap_fraction: f64,
        rng: &mut R,
    ) -> Self {
        let mut set = Self::resolve(input);
        if flags.bootstrap {
            set.bootstrap(bootstrap_fraction, rng);
        }
        if flags.quick {
            set.quick();
        }
        info!("Selected {} trajectories", set.len());
        set
    }

    /// Keeps `round(fraction * N)` trajectories, at least one, drawn without
    /// replacement. The kept trajectories appear in the order they were drawn.
    pub fn bootstrap<R: Rng>(&mut self, fraction: f64, rng: &mut R) {
        let n = self.trajectories.len();
        if n == 0 {
            return;
        }
        let keep = bootstrap_size(n, fraction);
        let drawn = sample(rng, n, keep);
        self.trajectories = drawn
            .into_iter()
            .map(|index| self.trajectories[index].clone())
            .collect();
    }

    pub fn quick(&mut self) {
        self.trajectories.truncate(1);
    }

    pub fn structure(&self) -> &Path {
        &self.structure
    }

    pub fn trajectories(&self) -> &[PathBuf] {
        &self.trajectories
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}

pub fn bootstrap_size(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).round() as usize).clamp(1, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn input(n: usize) -> InputConfig {
        InputConfig {
            data_dir: PathBuf::from("/data"),
            output_dir: PathBuf::from("."),
            structure: PathBuf::from("top.gro"),
            trajectories: (0..n).map(|i| PathBuf::from(format!("run{i}.gro"))).collect(),
        }
    }

    #[test]
    fn relative_paths_are_joined_to_data_dir() {
        let mut config = input(2);
        config.trajectories[1] = PathBuf::from("/elsewhere/abs.gro");
        let set = TrajectorySet::resolve(&config);
        assert_eq!(set.structure(), Path::new("/data/top.gro"));
        assert_eq!(set.trajectories()[0], PathBuf::from("/data/run0.gro"));
        assert_eq!(set.trajectories()[1], PathBuf::from("/elsewhere/abs.gro"));
    }

    #[test]
    fn quick_keeps_exactly_one_trajectory() {
        let mut rng = StdRng::seed_from_u64(0);
        let flags = RunFlags {
            quick: true,
            ..RunFlags::default()
        };
        let set = TrajectorySet::select(&input(12), &flags, 0.5, &mut rng);
        assert_eq!(set.len(), 1);
        assert_eq!(set.trajectories()[0], PathBuf::from("/data/run0.gro"));
    }

    #[test]
    fn bootstrap_draws_half_without_replacement() {
        for n in [1, 2, 3, 7, 12] {
            let mut rng = StdRng::seed_from_u64(n as u64);
            let flags = RunFlags {
                bootstrap: true,
                ..RunFlags::default()
            };
            let set = TrajectorySet::select(&input(n), &flags, 0.5, &mut rng);
            assert_eq!(set.len(), ((0.5 * n as f64).round() as usize).max(1));
            let unique: HashSet<_> = set.trajectories().iter().collect();
            assert_eq!(unique.len(), set.len());
        }
    }

    #[test]
    fn bootstrap_then_quick_gives_one() {
        let mut rng = StdRng::seed_from_u64(5);
        let flags = RunFlags {
            bootstrap: true,
            quick: true,
            ..RunFlags::default()
        };
        let set = TrajectorySet::select(&input(12), &flags, 0.5, &mut rng);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn bootstrap_size_rounds_half_away_from_zero() {
        assert_eq!(bootstrap_size(12, 0.5), 6);
        assert_eq!(bootstrap_size(3, 0.5), 2);
        assert_eq!(bootstrap_size(1, 0.5), 1);
        assert_eq!(bootstrap_size(4, 0.01), 1);
    }
}
