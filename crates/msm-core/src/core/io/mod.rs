//! Readers for coordinate files and writers for numerical artifacts.
//!
//! Structures and trajectories are read through the [`traits::TrajectoryFile`]
//! trait, which GRO and PDB implement. XTC trajectories carry coordinates only
//! and are read with [`xtc::XtcFile`] against the structure's topology.
//! [`read_structure`] and [`read_trajectory`] pick the reader from the file
//! extension. Array artifacts use the NumPy `.npy` and `.npz` containers (see
//! [`arrays`]).

pub mod arrays;
pub mod gro;
pub mod pdb;
pub mod traits;
pub mod xtc;

use crate::core::models::topology::Topology;
use crate::core::models::trajectory::Trajectory;
use gro::{GroError, GroFile};
use pdb::{PdbError, PdbFile};
use std::path::{Path, PathBuf};
use thiserror::Error;
use traits::TrajectoryFile;
use xtc::{XtcError, XtcFile};

#[derive(Debug, Error)]
pub enum TrajectoryIoError {
    #[error("Failed to read GRO file '{path}': {source}")]
    Gro {
        path: PathBuf,
        #[source]
        source: GroError,
    },
    #[error("Failed to read PDB file '{path}': {source}")]
    Pdb {
        path: PathBuf,
        #[source]
        source: PdbError,
    },
    #[error("Failed to read XTC file '{path}': {source}")]
    Xtc {
        path: PathBuf,
        #[source]
        source: XtcError,
    },
    #[error("Unsupported coordinate format for '{0}' (expected .gro, .pdb or .xtc)")]
    UnsupportedFormat(PathBuf),
    #[error("'{0}' has no atom names and cannot serve as the structure (use .gro or .pdb)")]
    NotAStructure(PathBuf),
    #[error("Trajectory '{path}' has {found} atoms but the structure has {expected}")]
    TopologyMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("Trajectory '{0}' contains no frames")]
    NoFrames(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryFormat {
    Gro,
    Pdb,
    Xtc,
}

impl TrajectoryFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gro" => Some(Self::Gro),
            "pdb" | "ent" => Some(Self::Pdb),
            "xtc" => Some(Self::Xtc),
            _ => None,
        }
    }
}

fn format_of(path: &Path) -> Result<TrajectoryFormat, TrajectoryIoError> {
    TrajectoryFormat::from_path(path)
        .ok_or_else(|| TrajectoryIoError::UnsupportedFormat(path.to_path_buf()))
}

fn read_any(path: &Path) -> Result<(Topology, Trajectory), TrajectoryIoError> {
    let (topology, frames) = match format_of(path)? {
        TrajectoryFormat::Gro => {
            GroFile::read_from_path(path).map_err(|source| TrajectoryIoError::Gro {
                path: path.to_path_buf(),
                source,
            })?
        }
        TrajectoryFormat::Pdb => {
            PdbFile::read_from_path(path).map_err(|source| TrajectoryIoError::Pdb {
                path: path.to_path_buf(),
                source,
            })?
        }
        TrajectoryFormat::Xtc => {
            return Err(TrajectoryIoError::NotAStructure(path.to_path_buf()));
        }
    };
    Ok((topology, Trajectory::new(frames).with_source(path)))
}

/// Reads the topology of a reference structure file.
pub fn read_structure(path: &Path) -> Result<Topology, TrajectoryIoError> {
    read_any(path).map(|(topology, _)| topology)
}

/// Reads every frame of a trajectory file and checks it against `topology`.
pub fn read_trajectory(path: &Path, topology: &Topology) -> Result<Trajectory, TrajectoryIoError> {
    let (found, trajectory) = match format_of(path)? {
        TrajectoryFormat::Xtc => {
            let frames =
                XtcFile::read_frames_from_path(path).map_err(|source| TrajectoryIoError::Xtc {
                    path: path.to_path_buf(),
                    source,
                })?;
            let found = frames.first().map_or(topology.n_atoms(), |f| f.n_atoms());
            (found, Trajectory::new(frames).with_source(path))
        }
        _ => {
            let (file_topology, trajectory) = read_any(path)?;
            (file_topology.n_atoms(), trajectory)
        }
    };
    if found != topology.n_atoms() {
        return Err(TrajectoryIoError::TopologyMismatch {
            path: path.to_path_buf(),
            expected: topology.n_atoms(),
            found,
        });
    }
    if trajectory.is_empty() {
        return Err(TrajectoryIoError::NoFrames(path.to_path_buf()));
    }
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};
    use std::fs;
    use tempfile::tempdir;

    const TWO_ATOM_GRO: &str = "\
two atoms t= 0.0
    2
    1ALA     CA    1   0.000   0.000   0.000
    2GLY     CA    2   0.380   0.000   0.000
   3.00000   3.00000   3.00000
";

    #[test]
    fn format_is_chosen_from_extension() {
        assert_eq!(
            TrajectoryFormat::from_path(Path::new("a/b/run.GRO")),
            Some(TrajectoryFormat::Gro)
        );
        assert_eq!(
            TrajectoryFormat::from_path(Path::new("model.pdb")),
            Some(TrajectoryFormat::Pdb)
        );
        assert_eq!(
            TrajectoryFormat::from_path(Path::new("traj.xtc")),
            Some(TrajectoryFormat::Xtc)
        );
        assert_eq!(TrajectoryFormat::from_path(Path::new("traj.dcd")), None);
        assert_eq!(TrajectoryFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_reported() {
        let result = read_structure(Path::new("traj.dcd"));
        assert!(matches!(result, Err(TrajectoryIoError::UnsupportedFormat(_))));
    }

    #[test]
    fn xtc_cannot_serve_as_the_structure() {
        let result = read_structure(Path::new("traj.xtc"));
        assert!(matches!(result, Err(TrajectoryIoError::NotAStructure(_))));
    }

    fn xtc_frame(positions: &[[f32; 3]]) -> Vec<u8> {
        let mut buf = Vec::new();
        let n_atoms = positions.len() as i32;
        for value in [1995, n_atoms, 0] {
            buf.write_i32::<BigEndian>(value).unwrap();
        }
        for value in [0.0, 3.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 3.0] {
            buf.write_f32::<BigEndian>(value).unwrap();
        }
        buf.write_i32::<BigEndian>(n_atoms).unwrap();
        for &value in positions.iter().flatten() {
            buf.write_f32::<BigEndian>(value).unwrap();
        }
        buf
    }

    #[test]
    fn xtc_trajectory_is_read_against_the_structure_topology() {
        let dir = tempdir().unwrap();
        let structure = dir.path().join("ref.gro");
        fs::write(&structure, TWO_ATOM_GRO).unwrap();
        let path = dir.path().join("run.xtc");
        let mut bytes = xtc_frame(&[[0.0, 0.0, 0.0], [0.38, 0.0, 0.0]]);
        bytes.extend(xtc_frame(&[[0.0, 0.0, 0.0], [0.40, 0.0, 0.0]]));
        fs::write(&path, bytes).unwrap();

        let topology = read_structure(&structure).unwrap();
        let trajectory = read_trajectory(&path, &topology).unwrap();
        assert_eq!(trajectory.n_frames(), 2);
        assert_eq!(trajectory.source(), Some(path.as_path()));
        assert!((trajectory.frames()[1].distance(0, 1, true) - 0.40).abs() < 1e-6);

        fs::write(&path, xtc_frame(&[[0.0; 3]])).unwrap();
        assert!(matches!(
            read_trajectory(&path, &topology),
            Err(TrajectoryIoError::TopologyMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn empty_xtc_has_no_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.xtc");
        fs::write(&path, b"").unwrap();
        let topology = Topology::new(Vec::new());
        assert!(matches!(
            read_trajectory(&path, &topology),
            Err(TrajectoryIoError::NoFrames(_))
        ));
    }

    #[test]
    fn trajectory_keeps_its_source_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.gro");
        fs::write(&path, TWO_ATOM_GRO).unwrap();

        let topology = read_structure(&path).unwrap();
        let trajectory = read_trajectory(&path, &topology).unwrap();
        assert_eq!(trajectory.n_frames(), 1);
        assert_eq!(trajectory.source(), Some(path.as_path()));
    }

    #[test]
    fn trajectory_with_other_atom_count_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.gro");
        fs::write(&path, TWO_ATOM_GRO).unwrap();

        let topology = Topology::new(Vec::new());
        let result = read_trajectory(&path, &topology);
        assert!(matches!(
            result,
            Err(TrajectoryIoError::TopologyMismatch {
                expected: 0,
                found: 2,
                ..
            })
        ));
    }
}
