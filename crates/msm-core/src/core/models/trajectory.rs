use nalgebra::{Point3, Vector3};
use std::path::{Path, PathBuf};

/// A single snapshot of atomic coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Atomic positions in nanometres, in topology order.
    pub positions: Vec<Point3<f64>>,
    /// Edge lengths of a rectangular periodic box in nanometres, if the file provides one.
    pub box_lengths: Option<Vector3<f64>>,
    /// Simulation time in picoseconds, if the file provides one.
    pub time: Option<f64>,
}

impl Frame {
    pub fn new(positions: Vec<Point3<f64>>) -> Self {
        Self {
            positions,
            box_lengths: None,
            time: None,
        }
    }

    pub fn with_box(mut self, box_lengths: Vector3<f64>) -> Self {
        self.box_lengths = Some(box_lengths);
        self
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    /// Distance between two atoms, using the minimum-image convention when `periodic`
    /// is set and the frame carries a box with non-zero edges.
    pub fn distance(&self, i: usize, j: usize, periodic: bool) -> f64 {
        let mut delta = self.positions[j] - self.positions[i];
        if periodic {
            if let Some(lengths) = self.box_lengths {
                for axis in 0..3 {
                    let edge = lengths[axis];
                    if edge > 0.0 {
                        delta[axis] -= edge * (delta[axis] / edge).round();
                    }
                }
            }
        }
        delta.norm()
    }
}

/// An ordered sequence of frames loaded from one trajectory file.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    frames: Vec<Frame>,
    source: Option<PathBuf>,
}

impl Trajectory {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            source: None,
        }
    }

    pub fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_frame(a: [f64; 3], b: [f64; 3]) -> Frame {
        Frame::new(vec![Point3::new(a[0], a[1], a[2]), Point3::new(b[0], b[1], b[2])])
    }

    #[test]
    fn distance_without_box_is_euclidean() {
        let frame = pair_frame([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]);
        assert!((frame.distance(0, 1, true) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn distance_applies_minimum_image_when_periodic() {
        let frame =
            pair_frame([0.1, 0.0, 0.0], [2.9, 0.0, 0.0]).with_box(Vector3::new(3.0, 3.0, 3.0));
        assert!((frame.distance(0, 1, true) - 0.2).abs() < 1e-12);
        assert!((frame.distance(0, 1, false) - 2.8).abs() < 1e-12);
    }

    #[test]
    fn zero_box_edges_are_ignored() {
        let frame =
            pair_frame([0.0, 0.0, 0.0], [0.0, 0.0, 5.0]).with_box(Vector3::new(1.0, 1.0, 0.0));
        assert!((frame.distance(0, 1, true) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn trajectory_records_its_source() {
        let trajectory = Trajectory::new(vec![pair_frame([0.0; 3], [1.0; 3])])
            .with_source(Path::new("data/run0.gro"));
        assert_eq!(trajectory.n_frames(), 1);
        assert!(!trajectory.is_empty());
        assert_eq!(trajectory.source(), Some(Path::new("data/run0.gro")));
    }
}
