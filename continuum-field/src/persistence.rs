// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Binary field snapshots.
//!
//! Little-endian, versioned:
//!
//! ```text
//! header    "PHI6"  u32 version  u32 dim=6  u32 capacity  u32 num_centers
//!           f32 fractal_dim  f32 time  f32 adaptive_alpha
//! metric    36 × f32 g   36 × f32 g⁻¹   f32 det g
//! centers   N × { 6 × f32 position, f32 re, f32 im, f32 σ, metric block }
//! trailer   u32 CRC32 over every preceding byte
//! ```
//!
//! Fault counters, removal marks and injected torsion are runtime state and
//! are not written. A decoded field starts at version 1 with a fresh index.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use continuum_math::{Metric, Point, DIM};
use num_complex::Complex;
use thiserror::Error;
use tracing::info;

use crate::error::FieldError;
use crate::field::{Center, RbfField};

pub const MAGIC: &[u8; 4] = b"PHI6";
pub const FORMAT_VERSION: u32 = 1;

const METRIC_FLOATS: usize = 2 * DIM * DIM + 1;
const HEADER_BYTES: usize = 4 + 4 * 4 + 3 * 4;
const CENTER_BYTES: usize = (DIM + 3 + METRIC_FLOATS) * 4;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("bad magic bytes {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("field dimension {0} is not 6")]
    WrongDimension(u32),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Truncated buffer or filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Well-formed bytes describing an invalid field.
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] FieldError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

fn write_metric(buf: &mut Vec<u8>, metric: &Metric) -> std::io::Result<()> {
    for v in metric.to_full() {
        buf.write_f32::<LittleEndian>(v)?;
    }
    for v in metric.inverse_full() {
        buf.write_f32::<LittleEndian>(v)?;
    }
    buf.write_f32::<LittleEndian>(metric.determinant())
}

fn write_field(buf: &mut Vec<u8>, field: &RbfField) -> std::io::Result<()> {
    buf.extend_from_slice(MAGIC);
    buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_u32::<LittleEndian>(DIM as u32)?;
    // len ≤ capacity ≤ MAX_CAPACITY = u32::MAX
    buf.write_u32::<LittleEndian>(field.capacity() as u32)?;
    buf.write_u32::<LittleEndian>(field.len() as u32)?;
    buf.write_f32::<LittleEndian>(field.fractal_dim())?;
    buf.write_f32::<LittleEndian>(field.time())?;
    buf.write_f32::<LittleEndian>(field.adaptive_alpha())?;
    write_metric(buf, field.global_metric())?;

    for center in field.centers() {
        for &c in center.point().coords() {
            buf.write_f32::<LittleEndian>(c)?;
        }
        buf.write_f32::<LittleEndian>(center.coeff().re)?;
        buf.write_f32::<LittleEndian>(center.coeff().im)?;
        buf.write_f32::<LittleEndian>(center.sigma())?;
        write_metric(buf, center.local_metric())?;
    }
    Ok(())
}

/// Serialize a field snapshot.
pub fn encode(field: &RbfField) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_BYTES + METRIC_FLOATS * 4 + field.len() * CENTER_BYTES + 4);
    // Writes into a Vec cannot fail.
    let _ = write_field(&mut buf, field);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

fn read_metric<R: Read>(r: &mut R) -> PersistenceResult<Metric> {
    let mut full = [0.0f32; DIM * DIM];
    r.read_f32_into::<LittleEndian>(&mut full)?;
    let mut inverse = [0.0f32; DIM * DIM];
    r.read_f32_into::<LittleEndian>(&mut inverse)?;
    let det = r.read_f32::<LittleEndian>()?;
    Metric::from_cached(&full, &inverse, det).map_err(|e| PersistenceError::Invalid(e.into()))
}

/// Rebuild a field from [`encode`] output.
pub fn decode(bytes: &[u8]) -> PersistenceResult<RbfField> {
    let mut r = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(PersistenceError::BadMagic(magic));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }
    let dim = r.read_u32::<LittleEndian>()?;
    if dim as usize != DIM {
        return Err(PersistenceError::WrongDimension(dim));
    }

    if bytes.len() < HEADER_BYTES + 4 {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(PersistenceError::ChecksumMismatch { stored, computed });
    }

    let capacity = r.read_u32::<LittleEndian>()? as usize;
    let num_centers = r.read_u32::<LittleEndian>()? as usize;
    let fractal_dim = r.read_f32::<LittleEndian>()?;
    let time = r.read_f32::<LittleEndian>()?;
    let adaptive_alpha = r.read_f32::<LittleEndian>()?;
    let global_metric = read_metric(&mut r)?;

    let expected = HEADER_BYTES + METRIC_FLOATS * 4 + num_centers * CENTER_BYTES + 4;
    if bytes.len() != expected {
        return Err(FieldError::InvalidInput(format!(
            "{} centers need {} bytes, snapshot has {}",
            num_centers,
            expected,
            bytes.len()
        ))
        .into());
    }
    if !time.is_finite() {
        return Err(FieldError::InvalidInput(format!("non-finite time {}", time)).into());
    }

    let mut centers = Vec::with_capacity(num_centers);
    for _ in 0..num_centers {
        let mut coords = [0.0f32; DIM];
        r.read_f32_into::<LittleEndian>(&mut coords)?;
        let point = Point::new(coords).map_err(FieldError::from)?;
        let coeff = Complex::new(r.read_f32::<LittleEndian>()?, r.read_f32::<LittleEndian>()?);
        let sigma = r.read_f32::<LittleEndian>()?;
        let local_metric = read_metric(&mut r)?;
        if !(coeff.re.is_finite() && coeff.im.is_finite()) || !(sigma.is_finite() && sigma > 0.0) {
            return Err(FieldError::InvalidInput(format!("center coefficient {} width {}", coeff, sigma)).into());
        }
        centers.push(Center::new(point, coeff, sigma, local_metric));
    }

    Ok(RbfField::restore(
        capacity,
        fractal_dim,
        global_metric,
        adaptive_alpha,
        time,
        centers,
    )?)
}

pub fn save(field: &RbfField, path: impl AsRef<Path>) -> PersistenceResult<()> {
    let bytes = encode(field);
    fs::write(path.as_ref(), &bytes)?;
    info!(path = %path.as_ref().display(), centers = field.len(), bytes = bytes.len(), "saved field snapshot");
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> PersistenceResult<RbfField> {
    let bytes = fs::read(path.as_ref())?;
    let field = decode(&bytes)?;
    info!(path = %path.as_ref().display(), centers = field.len(), "loaded field snapshot");
    Ok(field)
}
