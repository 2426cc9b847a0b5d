//! Gzip helpers for the streaming copy path.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::{Error, Result};

/// Compress data with gzip.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());

    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(format!("Failed to write to gzip encoder: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| Error::Compression(format!("Failed to finish gzip compression: {}", e)))
}

/// Decompress gzip data.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);

    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Compression(format!("Failed to decompress gzip data: {}", e)))?;

    Ok(output)
}
