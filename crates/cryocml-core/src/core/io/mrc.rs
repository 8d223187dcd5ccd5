use super::traits::{DensityFile, DensityGrid};
use crate::core::image::{Image2D, ImageError, Volume};
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

const HEADER_BYTES: usize = 1024;
const LABEL_BYTES: usize = 80;
const MAX_LABELS: usize = 10;

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported MRC data mode {0}")]
    UnsupportedMode(i32),
    #[error("Invalid MRC header: {0}")]
    InvalidHeader(String),
    #[error("Stack images have inconsistent dimensions: expected {expected:?}, found {found:?}")]
    InconsistentStack {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Stack is empty")]
    EmptyStack,
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrcMode {
    Int8,
    Int16,
    Float32,
    Uint16,
}

impl MrcMode {
    fn from_code(code: i32) -> Result<Self, MrcError> {
        match code {
            0 => Ok(MrcMode::Int8),
            1 => Ok(MrcMode::Int16),
            2 => Ok(MrcMode::Float32),
            6 => Ok(MrcMode::Uint16),
            other => Err(MrcError::UnsupportedMode(other)),
        }
    }

    fn bytes_per_sample(&self) -> usize {
        match self {
            MrcMode::Int8 => 1,
            MrcMode::Int16 | MrcMode::Uint16 => 2,
            MrcMode::Float32 => 4,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f64 {
        match self {
            MrcMode::Int8 => bytes[0] as i8 as f64,
            MrcMode::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            MrcMode::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            MrcMode::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MrcHeader {
    pub mode: MrcMode,
    pub cell: [f32; 3],
    pub labels: Vec<String>,
}

#[inline]
fn word_i32(header: &[u8], word: usize) -> i32 {
    let o = word * 4;
    i32::from_le_bytes([header[o], header[o + 1], header[o + 2], header[o + 3]])
}

#[inline]
fn word_f32(header: &[u8], word: usize) -> f32 {
    f32::from_bits(word_i32(header, word) as u32)
}

/// MRC2014, little-endian. Reads modes 0, 1, 2 and 6; always writes mode 2.
pub struct MrcFile;

impl DensityFile for MrcFile {
    type Metadata = MrcHeader;
    type Error = MrcError;

    fn read_from(reader: &mut impl Read) -> Result<(DensityGrid, Self::Metadata), Self::Error> {
        let mut header = [0u8; HEADER_BYTES];
        reader.read_exact(&mut header)?;

        let raw_dims = [word_i32(&header, 0), word_i32(&header, 1), word_i32(&header, 2)];
        if raw_dims.iter().any(|&d| d <= 0) {
            return Err(MrcError::InvalidHeader(format!(
                "non-positive dimensions {:?}",
                raw_dims
            )));
        }
        let dims = raw_dims.map(|d| d as usize);
        let mode = MrcMode::from_code(word_i32(&header, 3))?;
        let cell = [word_f32(&header, 10), word_f32(&header, 11), word_f32(&header, 12)];
        let extended = word_i32(&header, 23);
        if extended < 0 {
            return Err(MrcError::InvalidHeader(format!(
                "negative extended header size {}",
                extended
            )));
        }
        let label_count = (word_i32(&header, 55).max(0) as usize).min(MAX_LABELS);
        let labels = (0..label_count)
            .map(|i| {
                let start = 224 + i * LABEL_BYTES;
                String::from_utf8_lossy(&header[start..start + LABEL_BYTES])
                    .trim_end_matches(['\0', ' '])
                    .to_string()
            })
            .collect();

        io::copy(&mut reader.by_ref().take(extended as u64), &mut io::sink())?;

        let width = mode.bytes_per_sample();
        let size = dims
            .iter()
            .try_fold(width, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                MrcError::InvalidHeader(format!("data size of {:?} overflows", raw_dims))
            })?;
        let mut raw = Vec::new();
        reader.by_ref().take(size as u64).read_to_end(&mut raw)?;
        if raw.len() < size {
            return Err(MrcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} data bytes, found {}", size, raw.len()),
            )));
        }
        let data = raw.chunks_exact(width).map(|b| mode.decode(b)).collect();

        Ok((DensityGrid { dims, data }, MrcHeader { mode, cell, labels }))
    }

    fn write_to(grid: &DensityGrid, writer: &mut impl Write) -> Result<(), Self::Error> {
        let [nx, ny, nz] = grid.dims;
        let mut header = [0u8; HEADER_BYTES];
        let mut put_i32 = |word: usize, value: i32| {
            header[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
        };
        put_i32(0, nx as i32);
        put_i32(1, ny as i32);
        put_i32(2, nz as i32);
        put_i32(3, 2);
        put_i32(7, nx as i32);
        put_i32(8, ny as i32);
        put_i32(9, nz as i32);
        put_i32(16, 1);
        put_i32(17, 2);
        put_i32(18, 3);
        put_i32(55, 1);

        let (min, max, sum) = grid.data.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v),
        );
        let n = grid.data.len().max(1) as f64;
        let mean = sum / n;
        let rms = (grid.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let mut put_f32 = |word: usize, value: f32| {
            header[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
        };
        put_f32(10, nx as f32);
        put_f32(11, ny as f32);
        put_f32(12, nz as f32);
        for word in 13..16 {
            put_f32(word, 90.0);
        }
        if !grid.data.is_empty() {
            put_f32(19, min as f32);
            put_f32(20, max as f32);
        }
        put_f32(21, mean as f32);
        put_f32(54, rms as f32);

        header[208..212].copy_from_slice(b"MAP ");
        header[212..216].copy_from_slice(&[0x44, 0x44, 0x00, 0x00]);
        let label = format!("cryocml {}", env!("CARGO_PKG_VERSION"));
        let label_len = label.len().min(LABEL_BYTES);
        header[224..224 + label_len].copy_from_slice(&label.as_bytes()[..label_len]);

        writer.write_all(&header)?;
        let mut body = Vec::with_capacity(grid.data.len() * 4);
        for &v in &grid.data {
            body.extend_from_slice(&(v as f32).to_le_bytes());
        }
        writer.write_all(&body)?;
        Ok(())
    }
}

/// Reads every section of an MRC file as a separate image.
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<Vec<Image2D>, MrcError> {
    let (grid, _) = MrcFile::read_from_path(path)?;
    let [nx, ny, _] = grid.dims;
    grid.data
        .chunks_exact(nx * ny)
        .map(|section| Image2D::from_vec(nx, ny, section.to_vec()).map_err(MrcError::from))
        .collect()
}

pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<Volume, MrcError> {
    let (grid, _) = MrcFile::read_from_path(path)?;
    let [nx, ny, nz] = grid.dims;
    Ok(Volume::from_vec(nx, ny, nz, grid.data)?)
}

pub fn stack_to_grid(images: &[Image2D]) -> Result<DensityGrid, MrcError> {
    let first = images.first().ok_or(MrcError::EmptyStack)?;
    let expected = (first.nx(), first.ny());
    let mut data = Vec::with_capacity(expected.0 * expected.1 * images.len());
    for image in images {
        let found = (image.nx(), image.ny());
        if found != expected {
            return Err(MrcError::InconsistentStack { expected, found });
        }
        data.extend_from_slice(image.data());
    }
    Ok(DensityGrid {
        dims: [expected.0, expected.1, images.len()],
        data,
    })
}

pub fn write_stack<P: AsRef<Path>>(path: P, images: &[Image2D]) -> Result<(), MrcError> {
    MrcFile::write_to_path(&stack_to_grid(images)?, path)
}

pub fn write_volume<P: AsRef<Path>>(path: P, volume: &Volume) -> Result<(), MrcError> {
    let grid = DensityGrid {
        dims: volume.dims(),
        data: volume.data().to_vec(),
    };
    MrcFile::write_to_path(&grid, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn stack_round_trips_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.mrc");
        let images: Vec<Image2D> = (0..3)
            .map(|k| Image2D::from_fn(4, 5, |x, y| (x + 10 * y + 100 * k) as f64 * 0.5))
            .collect();
        write_stack(&path, &images).unwrap();
        let back = read_stack(&path).unwrap();
        assert_eq!(back, images);
    }

    #[test]
    fn volume_round_trips_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol.mrc");
        let vol = Volume::from_fn(3, 4, 2, |x, y, z| x as f64 - y as f64 + 0.25 * z as f64);
        write_volume(&path, &vol).unwrap();
        assert_eq!(read_volume(&path).unwrap(), vol);
    }

    #[test]
    fn header_carries_mode_cell_and_label() {
        let grid = DensityGrid {
            dims: [2, 2, 1],
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        let mut bytes = Vec::new();
        MrcFile::write_to(&grid, &mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES + 16);
        let (read, header) = MrcFile::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read, grid);
        assert_eq!(header.mode, MrcMode::Float32);
        assert_eq!(header.cell, [2.0, 2.0, 1.0]);
        assert_eq!(header.labels.len(), 1);
        assert!(header.labels[0].starts_with("cryocml"));
    }

    #[test]
    fn integer_modes_are_decoded() {
        let mut bytes = vec![0u8; HEADER_BYTES];
        bytes[0..4].copy_from_slice(&2i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&1i32.to_le_bytes());
        bytes[8..12].copy_from_slice(&1i32.to_le_bytes());
        bytes[12..16].copy_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&(-7i16).to_le_bytes());
        bytes.extend_from_slice(&300i16.to_le_bytes());
        let (grid, header) = MrcFile::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.mode, MrcMode::Int16);
        assert_eq!(grid.data, vec![-7.0, 300.0]);
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let mut bytes = vec![0u8; HEADER_BYTES];
        for word in 0..3 {
            bytes[word * 4..word * 4 + 4].copy_from_slice(&1i32.to_le_bytes());
        }
        bytes[12..16].copy_from_slice(&4i32.to_le_bytes());
        assert!(matches!(
            MrcFile::read_from(&mut Cursor::new(bytes)),
            Err(MrcError::UnsupportedMode(4))
        ));
    }

    #[test]
    fn overflowing_dimensions_are_an_invalid_header() {
        let mut bytes = vec![0u8; HEADER_BYTES];
        for word in 0..3 {
            bytes[word * 4..word * 4 + 4].copy_from_slice(&i32::MAX.to_le_bytes());
        }
        bytes[12..16].copy_from_slice(&2i32.to_le_bytes());
        assert!(matches!(
            MrcFile::read_from(&mut Cursor::new(bytes)),
            Err(MrcError::InvalidHeader(_))
        ));
    }

    #[test]
    fn truncated_data_is_an_io_error() {
        let grid = DensityGrid {
            dims: [2, 2, 2],
            data: vec![0.0; 8],
        };
        let mut bytes = Vec::new();
        MrcFile::write_to(&grid, &mut bytes).unwrap();
        bytes.truncate(HEADER_BYTES + 10);
        assert!(matches!(
            MrcFile::read_from(&mut Cursor::new(bytes)),
            Err(MrcError::Io(_))
        ));
    }

    #[test]
    fn mixed_stack_is_rejected() {
        let images = vec![Image2D::zeros(4, 4), Image2D::zeros(4, 5)];
        assert!(matches!(
            stack_to_grid(&images),
            Err(MrcError::InconsistentStack { .. })
        ));
        assert!(matches!(stack_to_grid(&[]), Err(MrcError::EmptyStack)));
    }
}
