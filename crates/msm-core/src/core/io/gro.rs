use crate::core::io::traits::TrajectoryFile;
use crate::core::models::topology::{AtomRecord, Topology};
use crate::core::models::trajectory::Frame;
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GroParseErrorKind },
    #[error("Frame {frame} has {found} atoms, expected {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("File contains no frames")]
    Empty,
}

#[derive(Debug, Error)]
pub enum GroParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid integer in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Atom line is too short (must be at least {required} chars)")]
    LineTooShort { required: usize },
    #[error("Invalid box vector line '{0}'")]
    InvalidBox(String),
    #[error("Unexpected end of file")]
    UnexpectedEof,
}

const COORDINATE_START: usize = 20;
const DEFAULT_COORDINATE_WIDTH: usize = 8;

/// Width of each coordinate field, taken from the spacing of the first two
/// decimal points. `gmx` writes `%8.3f` unless a higher precision is requested.
fn coordinate_width(line: &str) -> usize {
    let mut dots = line
        .get(COORDINATE_START..)
        .unwrap_or("")
        .match_indices('.')
        .map(|(i, _)| i);
    match (dots.next(), dots.next()) {
        (Some(first), Some(second)) => second - first,
        _ => DEFAULT_COORDINATE_WIDTH,
    }
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, GroError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| GroError::Parse {
        line: line_num,
        kind: GroParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

/// Extracts the simulation time from a title such as `"Protein t= 120.00000 step= 60000"`.
fn parse_time(title: &str) -> Option<f64> {
    let (_, rest) = title.split_once("t=")?;
    rest.split_whitespace().next()?.parse().ok()
}

struct LineCursor<'a, R: BufRead> {
    reader: &'a mut R,
    line_num: usize,
}

impl<R: BufRead> LineCursor<'_, R> {
    fn next_line(&mut self) -> Result<Option<String>, GroError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_num += 1;
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    fn require_line(&mut self) -> Result<String, GroError> {
        self.next_line()?.ok_or(GroError::Parse {
            line: self.line_num + 1,
            kind: GroParseErrorKind::UnexpectedEof,
        })
    }
}

/// GROMACS `.gro` coordinate files, including multi-frame trajectories written by
/// `gmx trjconv -o traj.gro`.
pub struct GroFile;

impl GroFile {
    fn parse_atom_line(line: &str, line_num: usize) -> Result<(AtomRecord, Point3<f64>), GroError> {
        let width = coordinate_width(line);
        let required = COORDINATE_START + 3 * width;
        if line.len() < required {
            return Err(GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::LineTooShort { required },
            });
        }
        let res_num_str = slice_and_trim(line, 0, 5);
        let residue_number: isize = res_num_str.parse().map_err(|_| GroError::Parse {
            line: line_num,
            kind: GroParseErrorKind::InvalidInt {
                columns: "1-5".into(),
                value: res_num_str.into(),
            },
        })?;
        let residue_name = slice_and_trim(line, 5, 10);
        let atom_name = slice_and_trim(line, 10, 15);
        let field = |axis: usize| {
            let start = COORDINATE_START + axis * width;
            parse_float(line, start, start + width, line_num)
        };
        let (x, y, z) = (field(0)?, field(1)?, field(2)?);
        Ok((
            AtomRecord::new(atom_name, residue_name, residue_number),
            Point3::new(x, y, z),
        ))
    }

    /// Parses the box line. Only the three diagonal entries are used; the
    /// off-diagonal entries of triclinic boxes are ignored.
    fn parse_box_line(line: &str, line_num: usize) -> Result<Option<Vector3<f64>>, GroError> {
        let values: Vec<f64> = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidBox(line.trim().to_string()),
            })?;
        if values.len() < 3 {
            return Err(GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidBox(line.trim().to_string()),
            });
        }
        let lengths = Vector3::new(values[0], values[1], values[2]);
        if lengths.iter().all(|&v| v == 0.0) {
            Ok(None)
        } else {
            Ok(Some(lengths))
        }
    }
}

impl TrajectoryFile for GroFile {
    type Error = GroError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Topology, Vec<Frame>), Self::Error> {
        let mut cursor = LineCursor {
            reader,
            line_num: 0,
        };
        let mut topology: Option<Topology> = None;
        let mut frames = Vec::new();

        while let Some(title) = cursor.next_line()? {
            if title.trim().is_empty() && !frames.is_empty() {
                continue;
            }
            let count_line = cursor.require_line()?;
            let n_atoms: usize = count_line.trim().parse().map_err(|_| GroError::Parse {
                line: cursor.line_num,
                kind: GroParseErrorKind::InvalidAtomCount(count_line.trim().to_string()),
            })?;

            let mut atoms = Vec::with_capacity(n_atoms);
            let mut positions = Vec::with_capacity(n_atoms);
            for _ in 0..n_atoms {
                let line = cursor.require_line()?;
                let (atom, position) = Self::parse_atom_line(&line, cursor.line_num)?;
                atoms.push(atom);
                positions.push(position);
            }
            let box_line = cursor.require_line()?;
            let box_lengths = Self::parse_box_line(&box_line, cursor.line_num)?;

            match &topology {
                None => topology = Some(Topology::new(atoms)),
                Some(existing) if existing.n_atoms() != n_atoms => {
                    return Err(GroError::AtomCountMismatch {
                        frame: frames.len(),
                        expected: existing.n_atoms(),
                        found: n_atoms,
                    });
                }
                Some(_) => {}
            }

            frames.push(Frame {
                positions,
                box_lengths,
                time: parse_time(&title),
            });
        }

        let topology = topology.ok_or(GroError::Empty)?;
        Ok((topology, frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_FRAMES: &str = "\
Trp-cage t=   0.00000 step= 0
    3
    1ASN      N    1   1.000   2.000   3.000
    1ASN     CA    2   1.100   2.000   3.000
    2LEU     CA    3   1.400   2.000   3.000
   3.00000   3.00000   3.00000
Trp-cage t= 100.00000 step= 50000
    3
    1ASN      N    1   1.000   2.100   3.000
    1ASN     CA    2   1.100   2.100   3.000
    2LEU     CA    3   1.500   2.100   3.000
   3.00000   3.00000   3.00000
";

    #[test]
    fn read_multi_frame_gro() {
        let (topology, frames) = GroFile::read_from(&mut Cursor::new(TWO_FRAMES)).unwrap();
        assert_eq!(topology.n_atoms(), 3);
        assert_eq!(topology.atom(1).unwrap().name, "CA");
        assert_eq!(topology.atom(2).unwrap().residue_name, "LEU");
        assert_eq!(topology.atom(2).unwrap().residue_number, 2);
        assert_eq!(frames.len(), 2);
        assert!((frames[1].positions[2].x - 1.5).abs() < 1e-12);
        assert_eq!(frames[0].time, Some(0.0));
        assert_eq!(frames[1].time, Some(100.0));
        assert_eq!(frames[0].box_lengths, Some(Vector3::new(3.0, 3.0, 3.0)));
    }

    #[test]
    fn atom_count_mismatch_between_frames_is_an_error() {
        let broken = "\
frame one
    1
    1ALA     CA    1   0.000   0.000   0.000
   1.0 1.0 1.0
frame two
    2
    1ALA     CA    1   0.000   0.000   0.000
    2ALA     CA    2   0.000   0.000   0.000
   1.0 1.0 1.0
";
        let result = GroFile::read_from(&mut Cursor::new(broken));
        assert!(matches!(
            result,
            Err(GroError::AtomCountMismatch {
                frame: 1,
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn truncated_file_reports_unexpected_eof() {
        let truncated = "title\n    2\n    1ALA     CA    1   0.000   0.000   0.000\n";
        let result = GroFile::read_from(&mut Cursor::new(truncated));
        assert!(matches!(
            result,
            Err(GroError::Parse {
                kind: GroParseErrorKind::UnexpectedEof,
                ..
            })
        ));
    }

    #[test]
    fn invalid_coordinate_reports_columns() {
        let bad = "title\n    1\n    1ALA     CA    1   0.000   x.xxx   0.000\n 1 1 1\n";
        let err = GroFile::read_from(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("29-36"));
    }

    #[test]
    fn high_precision_coordinates_use_wider_fields() {
        let atom = format!(
            "{:>5}{:<5}{:>5}{:>5}{:>10.5}{:>10.5}{:>10.5}{:>11.6}{:>11.6}{:>11.6}",
            1, "ALA", "CA", 1, 1.23456, -2.5, 13.75, 0.1, 0.2, 0.3
        );
        let input = format!("ndec 5\n    1\n{atom}\n   4.00000   4.00000   4.00000\n");
        let (_, frames) = GroFile::read_from(&mut Cursor::new(input)).unwrap();
        let p = frames[0].positions[0];
        assert!((p.x - 1.23456).abs() < 1e-12);
        assert!((p.y + 2.5).abs() < 1e-12);
        assert!((p.z - 13.75).abs() < 1e-12);
    }

    #[test]
    fn short_high_precision_line_reports_required_length() {
        let line = "    1ALA     CA    1   1.23456   2.00000";
        let input = format!("title\n    1\n{line}\n 1 1 1\n");
        let err = GroFile::read_from(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            GroError::Parse {
                kind: GroParseErrorKind::LineTooShort { required: 50 },
                ..
            }
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        let result = GroFile::read_from(&mut Cursor::new(""));
        assert!(matches!(result, Err(GroError::Empty)));
    }

    #[test]
    fn zero_box_is_treated_as_non_periodic() {
        let no_box = "title\n    1\n    1ALA     CA    1   0.000   0.000   0.000\n   0.0 0.0 0.0\n";
        let (_, frames) = GroFile::read_from(&mut Cursor::new(no_box)).unwrap();
        assert!(frames[0].box_lengths.is_none());
        assert!(frames[0].time.is_none());
    }
}
