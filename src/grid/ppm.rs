//! Netpbm PPM reading (P6 binary, P3 ASCII) and writing (P6).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Grid;
use crate::error::GridError;
use crate::utils::config::CHANNELS;

/// Byte cursor over a PPM file that understands header whitespace and `#` comments.
struct HeaderCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderCursor<'a> {
    fn skip_space_and_comments(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        self.skip_space_and_comments();
        let bytes: &'a [u8] = self.bytes;
        let start = self.pos;
        while let Some(&b) = bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b'#' {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&bytes[start..self.pos]).ok()
    }

    fn number(&mut self, what: &str) -> Result<u32, GridError> {
        let tok = self
            .token()
            .ok_or_else(|| GridError::Header(format!("missing {what}")))?;
        tok.parse()
            .map_err(|_| GridError::Header(format!("bad {what}: {tok:?}")))
    }
}

/// Parse an in-memory PPM image. Sample values are kept as stored (no rescaling for maxval < 255).
pub fn parse_ppm(bytes: &[u8]) -> Result<Grid, GridError> {
    let mut cur = HeaderCursor { bytes, pos: 0 };
    let magic = cur
        .token()
        .ok_or_else(|| GridError::Header("empty file".to_string()))?;
    let binary = match magic {
        "P6" => true,
        "P3" => false,
        other => return Err(GridError::UnsupportedFormat(other.to_string())),
    };
    let width = cur.number("width")? as usize;
    let height = cur.number("height")? as usize;
    let max_value = cur.number("max value")?;
    if max_value == 0 || max_value > 255 {
        return Err(GridError::MaxValue(max_value));
    }

    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(|| GridError::Header(format!("{width}x{height} is too large")))?;
    let pixels = if binary {
        // Exactly one whitespace byte separates the header from the raster.
        let start = cur.pos + 1;
        let available = bytes.len().saturating_sub(start);
        if available < expected {
            return Err(GridError::Truncated {
                expected,
                actual: available,
            });
        }
        bytes[start..start + expected].to_vec()
    } else {
        let mut pixels = Vec::with_capacity(expected);
        while pixels.len() < expected {
            let Some(tok) = cur.token() else {
                return Err(GridError::Truncated {
                    expected,
                    actual: pixels.len(),
                });
            };
            let v: u32 = tok
                .parse()
                .map_err(|_| GridError::Header(format!("bad sample {tok:?}")))?;
            if v > max_value {
                return Err(GridError::Header(format!(
                    "sample {v} above max value {max_value}"
                )));
            }
            pixels.push(v as u8);
        }
        pixels
    };

    Grid::from_raw(width, height, pixels)
        .ok_or_else(|| GridError::Header("dimension/raster mismatch".to_string()))
}

/// Read a PPM file from disk.
pub fn read_ppm(path: &Path) -> Result<Grid, GridError> {
    let bytes = std::fs::read(path)?;
    parse_ppm(&bytes)
}

/// Serialize a grid as binary P6.
pub fn encode_ppm(grid: &Grid) -> Vec<u8> {
    let mut out = format!("P6\n{} {}\n255\n", grid.width(), grid.height()).into_bytes();
    out.extend_from_slice(grid.as_bytes());
    out
}

/// Write a grid to disk as binary P6.
pub fn write_ppm(path: &Path, grid: &Grid) -> Result<(), GridError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&encode_ppm(grid))?;
    w.flush()?;
    Ok(())
}
