use crate::core::models::topology::Topology;
use crate::core::models::trajectory::Frame;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading coordinate file formats.
///
/// A file yields the topology of its first frame together with every frame it
/// contains. Single-structure files are simply trajectories of length one, so the
/// same reader serves both the reference structure and the trajectories.
pub trait TrajectoryFile {
    /// The error type for read operations.
    type Error: Error + From<io::Error>;

    /// Reads the topology and all frames from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the topology taken from the first frame and the frames in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, if frames disagree on their atom count,
    /// or if the underlying reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<(Topology, Vec<Frame>), Self::Error>;

    /// Reads the topology and all frames from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<(Topology, Vec<Frame>), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}
