use crate::core::io::traits::TrajectoryFile;
use crate::core::models::topology::{AtomRecord, Topology};
use crate::core::models::trajectory::Frame;
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead};
use thiserror::Error;

const ANGSTROM_TO_NM: f64 = 0.1;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Model {model} has {found} atoms, expected {expected}")]
    AtomCountMismatch {
        model: usize,
        expected: usize,
        found: usize,
    },
    #[error("File contains no ATOM/HETATM records")]
    Empty,
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

#[derive(Default)]
struct ModelBuffer {
    atoms: Vec<AtomRecord>,
    positions: Vec<Point3<f64>>,
}

/// Protein Data Bank files. Each `MODEL`/`ENDMDL` block is one frame; a file without
/// `MODEL` records is a single frame. Coordinates are converted to nanometres.
pub struct PdbFile;

impl PdbFile {
    fn flush(
        buffer: &mut ModelBuffer,
        box_lengths: Option<Vector3<f64>>,
        topology: &mut Option<Topology>,
        frames: &mut Vec<Frame>,
    ) -> Result<(), PdbError> {
        if buffer.positions.is_empty() {
            return Ok(());
        }
        let ModelBuffer { atoms, positions } = std::mem::take(buffer);
        match topology {
            None => *topology = Some(Topology::new(atoms)),
            Some(existing) if existing.n_atoms() != positions.len() => {
                return Err(PdbError::AtomCountMismatch {
                    model: frames.len(),
                    expected: existing.n_atoms(),
                    found: positions.len(),
                });
            }
            Some(_) => {}
        }
        frames.push(Frame {
            positions,
            box_lengths,
            time: None,
        });
        Ok(())
    }
}

impl TrajectoryFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Topology, Vec<Frame>), Self::Error> {
        let mut topology: Option<Topology> = None;
        let mut frames = Vec::new();
        let mut buffer = ModelBuffer::default();
        let mut box_lengths: Option<Vector3<f64>> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            let record = line.get(..6).unwrap_or(line.as_str()).trim();
            match record {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let residue_number: isize =
                        res_seq_str.parse().map_err(|_| PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::InvalidInt {
                                columns: "23-26".into(),
                                value: res_seq_str.into(),
                            },
                        })?;
                    let x = parse_float(&line, 30, 38, line_num)?;
                    let y = parse_float(&line, 38, 46, line_num)?;
                    let z = parse_float(&line, 46, 54, line_num)?;

                    buffer.atoms.push(AtomRecord::new(
                        slice_and_trim(&line, 12, 16),
                        slice_and_trim(&line, 17, 20),
                        residue_number,
                    ));
                    buffer
                        .positions
                        .push(Point3::new(x, y, z) * ANGSTROM_TO_NM);
                }
                "CRYST1" => {
                    let a = parse_float(&line, 6, 15, line_num)?;
                    let b = parse_float(&line, 15, 24, line_num)?;
                    let c = parse_float(&line, 24, 33, line_num)?;
                    // Placeholder unit cells (1 x 1 x 1) carry no periodic information.
                    box_lengths = if a > 1.0 && b > 1.0 && c > 1.0 {
                        Some(Vector3::new(a, b, c) * ANGSTROM_TO_NM)
                    } else {
                        None
                    };
                }
                "MODEL" | "ENDMDL" => {
                    Self::flush(&mut buffer, box_lengths, &mut topology, &mut frames)?;
                }
                "END" => break,
                _ => {}
            }
        }
        Self::flush(&mut buffer, box_lengths, &mut topology, &mut frames)?;

        let topology = topology.ok_or(PdbError::Empty)?;
        Ok((topology, frames))
    }
}
