//! Reader for GROMACS `.xtc` trajectories.
//!
//! Each frame is an XDR (big-endian) record. Systems of up to nine atoms are
//! stored as plain floats. Larger systems use the `xdrfile` integer packing:
//! coordinates are quantized by the frame precision, packed into a bitstream,
//! and runs of atoms close to their predecessor are written as small deltas.
//!
//! XTC files carry no atom names, so they can only be read as trajectories
//! against a topology taken from a GRO or PDB structure.

use crate::core::models::trajectory::Frame;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;

const MAGIC: i32 = 1995;
const MAX_UNPACKED_ATOMS: usize = 9;
const FIRST_INDEX: usize = 9;

#[rustfmt::skip]
const MAGIC_INTS: [u32; 73] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0,
    8, 10, 12, 16, 20, 25, 32, 40, 50, 64,
    80, 101, 128, 161, 203, 256, 322, 406, 512, 645,
    812, 1024, 1290, 1625, 2048, 2580, 3250, 4096, 5060, 6501,
    8192, 10321, 13003, 16384, 20642, 26007, 32768, 41285, 52015, 65536,
    82570, 104031, 131072, 165140, 208063, 262144, 330280, 416127, 524287, 660561,
    832255, 1048576, 1321122, 1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042,
    8388607, 10568983, 13316085, 16777216,
];

#[derive(Debug, Error)]
pub enum XtcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Frame {frame} has magic number {found} (expected 1995)")]
    BadMagic { frame: usize, found: i32 },
    #[error("Frame {frame} has an invalid header: {reason}")]
    InvalidHeader { frame: usize, reason: &'static str },
    #[error("Frame {frame} has {found} atoms, expected {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Frame {frame} has corrupt packed coordinates: {source}")]
    Packing {
        frame: usize,
        #[source]
        source: PackingError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum PackingError {
    #[error("bitstream ended early")]
    Truncated,
    #[error("precision {0} is not positive")]
    InvalidPrecision(f32),
    #[error("coordinate bounds are inverted on axis {0}")]
    InvertedBounds(usize),
    #[error("small-delta index {0} is out of range")]
    SmallIndex(i64),
    #[error("decoded {found} coordinates for {expected} atoms")]
    CoordinateCount { expected: usize, found: usize },
}

/// Big-endian reader for the XDR primitives used by the format.
struct XdrReader<R: Read> {
    inner: R,
}

impl<R: Read> XdrReader<R> {
    /// Returns `None` on a clean end of input before the first byte.
    fn read_i32_or_eof(&mut self) -> io::Result<Option<i32>> {
        let mut bytes = [0u8; 4];
        let mut filled = 0;
        while filled < bytes.len() {
            match self.inner.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Some(BigEndian::read_i32(&bytes)))
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        self.inner.read_i32::<BigEndian>()
    }

    fn read_f32(&mut self) -> io::Result<f32> {
        self.inner.read_f32::<BigEndian>()
    }

    /// Reads opaque data, which XDR pads to a multiple of four bytes.
    fn read_opaque(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; len.div_ceil(4) * 4];
        self.inner.read_exact(&mut data)?;
        data.truncate(len);
        Ok(data)
    }
}

/// Most-significant-bit-first reader over the packed coordinate block.
struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    fn read(&mut self, n_bits: u32) -> Result<u32, PackingError> {
        if n_bits > 32 || self.bit + n_bits as usize > self.data.len() * 8 {
            return Err(PackingError::Truncated);
        }
        let mut value: u64 = 0;
        let mut remaining = n_bits;
        while remaining > 0 {
            let byte = u32::from(self.data[self.bit / 8]);
            let available = 8 - (self.bit % 8) as u32;
            let take = available.min(remaining);
            let bits = (byte >> (available - take)) & ((1 << take) - 1);
            value = (value << take) | u64::from(bits);
            self.bit += take as usize;
            remaining -= take;
        }
        Ok(value as u32)
    }

    /// Reads three integers packed as one little-endian big number of
    /// `n_bits` bits, mixed-radix over `sizes`.
    fn read_ints(&mut self, n_bits: u32, sizes: [u32; 3]) -> Result<[u32; 3], PackingError> {
        let mut bytes = [0u32; 32];
        if n_bits as usize > bytes.len() * 8 {
            return Err(PackingError::Truncated);
        }
        let mut n_bytes = 0;
        let mut remaining = n_bits;
        while remaining > 8 {
            bytes[n_bytes] = self.read(8)?;
            n_bytes += 1;
            remaining -= 8;
        }
        if remaining > 0 {
            bytes[n_bytes] = self.read(remaining)?;
            n_bytes += 1;
        }

        let mut nums = [0u32; 3];
        for i in (1..3).rev() {
            let size = u64::from(sizes[i]);
            let mut num: u64 = 0;
            for j in (0..n_bytes).rev() {
                num = (num << 8) | u64::from(bytes[j]);
                let quotient = num / size;
                bytes[j] = quotient as u32;
                num -= quotient * size;
            }
            nums[i] = num as u32;
        }
        nums[0] = bytes[0] | (bytes[1] << 8) | (bytes[2] << 16) | (bytes[3] << 24);
        Ok(nums)
    }
}

/// Number of bits needed to hold values in `0..size`, capped at 32.
fn size_of_int(size: u32) -> u32 {
    let mut num: u64 = 1;
    let mut bits = 0;
    while u64::from(size) >= num && bits < 32 {
        bits += 1;
        num <<= 1;
    }
    bits
}

/// Number of bits needed to hold the mixed-radix product of `sizes`.
fn size_of_ints(sizes: [u32; 3]) -> u32 {
    let mut bytes = [0u64; 32];
    bytes[0] = 1;
    let mut n_bytes = 1;
    for size in sizes {
        let mut carry: u64 = 0;
        let mut count = 0;
        while count < n_bytes {
            carry += bytes[count] * u64::from(size);
            bytes[count] = carry & 0xff;
            carry >>= 8;
            count += 1;
        }
        while carry != 0 {
            bytes[count] = carry & 0xff;
            carry >>= 8;
            count += 1;
        }
        n_bytes = count;
    }
    let top = bytes[n_bytes - 1];
    let mut num: u64 = 1;
    let mut bits = 0;
    while top >= num {
        bits += 1;
        num <<= 1;
    }
    bits + 8 * (n_bytes as u32 - 1)
}

fn small_index(value: i64) -> Result<usize, PackingError> {
    usize::try_from(value)
        .ok()
        .filter(|index| (FIRST_INDEX..MAGIC_INTS.len()).contains(index))
        .ok_or(PackingError::SmallIndex(value))
}

/// Decodes the packed integer coordinates of `n_atoms` atoms.
fn unpack_coordinates(
    data: &[u8],
    n_atoms: usize,
    min: [i32; 3],
    max: [i32; 3],
    initial_small_index: i32,
) -> Result<Vec<[i64; 3]>, PackingError> {
    let mut sizes = [0u32; 3];
    for axis in 0..3 {
        let span = i64::from(max[axis]) - i64::from(min[axis]) + 1;
        sizes[axis] = u32::try_from(span)
            .ok()
            .filter(|&s| s > 0)
            .ok_or(PackingError::InvertedBounds(axis))?;
    }
    let per_axis = sizes.iter().any(|&s| s > 0xff_ffff);
    let axis_bits = sizes.map(size_of_int);
    let packed_bits = if per_axis { 0 } else { size_of_ints(sizes) };

    let mut index = small_index(i64::from(initial_small_index))?;
    let mut smaller = MAGIC_INTS[FIRST_INDEX.max(index - 1)] / 2;
    let mut small_num = MAGIC_INTS[index] / 2;
    let mut size_small = MAGIC_INTS[index];

    let mut bits = BitReader::new(data);
    let mut coords = Vec::with_capacity(n_atoms);
    let mut run: i32 = 0;

    while coords.len() < n_atoms {
        let raw = if per_axis {
            let mut raw = [0u32; 3];
            for axis in 0..3 {
                raw[axis] = bits.read(axis_bits[axis])?;
            }
            raw
        } else {
            bits.read_ints(packed_bits, sizes)?
        };
        let this: [i64; 3] = std::array::from_fn(|axis| i64::from(raw[axis]) + i64::from(min[axis]));

        let mut is_smaller: i32 = 0;
        if bits.read(1)? == 1 {
            let code = bits.read(5)? as i32;
            is_smaller = code % 3;
            run = code - is_smaller;
            is_smaller -= 1;
        }

        if run > 0 {
            let mut prev = this;
            for k in (0..run).step_by(3) {
                let delta = bits.read_ints(index as u32, [size_small; 3])?;
                let next: [i64; 3] = std::array::from_fn(|axis| {
                    i64::from(delta[axis]) + prev[axis] - i64::from(small_num)
                });
                // The first delta atom precedes the full atom in file order.
                coords.push(next);
                if k == 0 {
                    coords.push(this);
                }
                prev = next;
            }
        } else {
            coords.push(this);
        }

        index = small_index(index as i64 + i64::from(is_smaller))?;
        if is_smaller < 0 {
            small_num = smaller;
            smaller = if index > FIRST_INDEX {
                MAGIC_INTS[index - 1] / 2
            } else {
                0
            };
        } else if is_smaller > 0 {
            smaller = small_num;
            small_num = MAGIC_INTS[index] / 2;
        }
        size_small = MAGIC_INTS[index];
    }

    if coords.len() != n_atoms {
        return Err(PackingError::CoordinateCount {
            expected: n_atoms,
            found: coords.len(),
        });
    }
    Ok(coords)
}

pub struct XtcFile;

impl XtcFile {
    fn read_frame<R: Read>(xdr: &mut XdrReader<R>, frame: usize) -> Result<Option<Frame>, XtcError> {
        let Some(magic) = xdr.read_i32_or_eof()? else {
            return Ok(None);
        };
        if magic != MAGIC {
            return Err(XtcError::BadMagic {
                frame,
                found: magic,
            });
        }
        let n_atoms = usize::try_from(xdr.read_i32()?).map_err(|_| XtcError::InvalidHeader {
            frame,
            reason: "negative atom count",
        })?;
        let _step = xdr.read_i32()?;
        let time = xdr.read_f32()?;
        let mut cell = [0f32; 9];
        for value in &mut cell {
            *value = xdr.read_f32()?;
        }
        let n_coords = xdr.read_i32()?;
        if usize::try_from(n_coords).ok() != Some(n_atoms) {
            return Err(XtcError::InvalidHeader {
                frame,
                reason: "coordinate count differs from atom count",
            });
        }

        let positions = if n_atoms <= MAX_UNPACKED_ATOMS {
            let mut positions = Vec::with_capacity(n_atoms);
            for _ in 0..n_atoms {
                let (x, y, z) = (xdr.read_f32()?, xdr.read_f32()?, xdr.read_f32()?);
                positions.push(Point3::new(f64::from(x), f64::from(y), f64::from(z)));
            }
            positions
        } else {
            let precision = xdr.read_f32()?;
            let mut min = [0i32; 3];
            let mut max = [0i32; 3];
            for value in min.iter_mut().chain(max.iter_mut()) {
                *value = xdr.read_i32()?;
            }
            let initial_small_index = xdr.read_i32()?;
            let n_bytes = usize::try_from(xdr.read_i32()?).map_err(|_| XtcError::InvalidHeader {
                frame,
                reason: "negative packed byte count",
            })?;
            let data = xdr.read_opaque(n_bytes)?;

            let packing = |source| XtcError::Packing { frame, source };
            if precision.is_nan() || precision <= 0.0 {
                return Err(packing(PackingError::InvalidPrecision(precision)));
            }
            let scale = 1.0 / f64::from(precision);
            unpack_coordinates(&data, n_atoms, min, max, initial_small_index)
                .map_err(packing)?
                .into_iter()
                .map(|[x, y, z]| Point3::new(x as f64 * scale, y as f64 * scale, z as f64 * scale))
                .collect()
        };

        let lengths = Vector3::new(f64::from(cell[0]), f64::from(cell[4]), f64::from(cell[8]));
        Ok(Some(Frame {
            positions,
            box_lengths: (!lengths.iter().all(|&v| v == 0.0)).then_some(lengths),
            time: Some(f64::from(time)),
        }))
    }

    /// Reads every frame in file order. An empty input yields no frames.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed header or packed block, if frames
    /// disagree on their atom count, or if the reader fails.
    pub fn read_frames(reader: &mut impl Read) -> Result<Vec<Frame>, XtcError> {
        let mut xdr = XdrReader { inner: reader };
        let mut frames: Vec<Frame> = Vec::new();
        while let Some(frame) = Self::read_frame(&mut xdr, frames.len())? {
            if let Some(first) = frames.first() {
                if first.n_atoms() != frame.n_atoms() {
                    return Err(XtcError::AtomCountMismatch {
                        frame: frames.len(),
                        expected: first.n_atoms(),
                        found: frame.n_atoms(),
                    });
                }
            }
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn read_frames_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>, XtcError> {
        let file = File::open(path)?;
        Self::read_frames(&mut BufReader::new(file))
    }
}
