//! Dense embedding matrix and its `.npy` codec.
//!
//! The embedding cache is a single NumPy array of shape `(N, D)` so that it can be produced or
//! inspected with the usual Python tooling. Only C-ordered little-endian float arrays are
//! accepted; `<f8` data is narrowed to `f32` on load.
//!
//! # Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 6 | Magic `\x93NUMPY` |
//! | 6 | 2 | Format version (major, minor) |
//! | 8 | 2 or 4 | Header length, little-endian (`u16` for v1, `u32` for v2/v3) |
//! | 10 or 12 | var | ASCII header dict, space padded, newline terminated |
//! | aligned | N*D*4 | Row-major values |


use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::{NewsError, Result};

pub const NPY_MAGIC: [u8; 6] = *b"\x93NUMPY";

/// Header plus preamble is padded to a multiple of this many bytes
const HEADER_ALIGNMENT: usize = 64;

/// Row-major `(rows, dimension)` matrix of embedding vectors
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementType {
    F32,
    F64,
}

impl EmbeddingMatrix {
    /// Build a matrix from individual vectors, rejecting ragged input
    #[inline]
    pub fn from_rows(vectors: &[Vec<f32>]) -> Result<Self> {
        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(NewsError::InvalidDimension {
                expected: 1,
                actual: 0,
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for vector in vectors {
            if vector.len() != dimension {
                return Err(NewsError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self {
            rows: vectors.len(),
            dimension,
            data,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Vector stored at a 0-based row, `None` when out of range
    #[inline]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    #[inline]
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }

    /// Load a matrix from a `.npy` file
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading embedding matrix from {}", path.display());
        let bytes = fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Write the matrix to `path`, replacing any previous file only once the write completed
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        let mut file = fs::File::create(tmp_path)?;
        file.write_all(&self.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, path)?;
        debug!(
            "Saved {}x{} embedding matrix to {}",
            self.rows,
            self.dimension,
            path.display()
        );
        Ok(())
    }

    /// Encode as a version 1.0 `.npy` array of `<f4`
    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
            self.rows, self.dimension
        );
        // magic + version + u16 length + header + trailing newline
        let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
        let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
        header.extend(std::iter::repeat_n(' ', padding));
        header.push('\n');

        let mut out = Vec::with_capacity(unpadded + padding + self.data.len() * 4);
        out.extend_from_slice(&NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        // Padded header never exceeds a few hundred bytes
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode a `.npy` byte buffer
    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 10 || bytes[..6] != NPY_MAGIC {
            return Err(invalid("missing NPY magic"));
        }

        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                let raw = bytes
                    .get(8..12)
                    .ok_or_else(|| invalid("truncated header length"))?;
                (
                    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                    12,
                )
            }
            other => return Err(invalid(&format!("unsupported format version {}", other))),
        };

        let header_bytes = bytes
            .get(header_start..header_start + header_len)
            .ok_or_else(|| invalid("truncated header"))?;
        let header =
            std::str::from_utf8(header_bytes).map_err(|_| invalid("header is not ASCII"))?;
        let (element, rows, dimension) = parse_header(header)?;

        let payload = &bytes[header_start + header_len..];
        let element_size = match element {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        };
        let expected = rows
            .checked_mul(dimension)
            .and_then(|count| count.checked_mul(element_size))
            .ok_or_else(|| invalid("shape overflows"))?;
        if payload.len() != expected {
            return Err(invalid(&format!(
                "expected {} data bytes for shape ({}, {}), found {}",
                expected,
                rows,
                dimension,
                payload.len()
            )));
        }

        let data = match element {
            ElementType::F32 => payload
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            ElementType::F64 => payload
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
        };

        Ok(Self {
            rows,
            dimension,
            data,
        })
    }
}

fn invalid(reason: &str) -> NewsError {
    NewsError::InvalidEmbeddingCache(reason.to_string())
}

fn parse_header(header: &str) -> Result<(ElementType, usize, usize)> {
    let descr = dict_value(header, "descr").ok_or_else(|| invalid("header has no descr"))?;
    let element = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => ElementType::F32,
        "<f8" => ElementType::F64,
        other => return Err(invalid(&format!("unsupported dtype {}", other))),
    };

    let fortran_order =
        dict_value(header, "fortran_order").ok_or_else(|| invalid("header has no fortran_order"))?;
    if fortran_order != "False" {
        return Err(invalid("fortran-ordered arrays are not supported"));
    }

    let shape = dict_value(header, "shape").ok_or_else(|| invalid("header has no shape"))?;
    let dims = shape
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid(&format!("malformed shape {}", shape)))?;

    match dims.as_slice() {
        [rows, dimension] if *dimension > 0 => Ok((element, *rows, *dimension)),
        _ => Err(invalid(&format!("expected a 2-D shape, found {}", shape))),
    }
}

/// Raw value text for `'key': value` in a NumPy header dict
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("'{}':", key);
    let start = header.find(&marker)? + marker.len();
    let rest = header.get(start..)?.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find([',', '}'])?
    };
    rest.get(..end).map(str::trim)
}
