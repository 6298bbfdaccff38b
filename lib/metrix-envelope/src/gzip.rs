/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::EnvelopeError;

pub const DEFAULT_DECOMPRESS_LIMIT: usize = 16 * 1024 * 1024;

pub fn compress(data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data).map_err(EnvelopeError::Compress)?;
    encoder.finish().map_err(EnvelopeError::Compress)
}

/// Gunzip `data`, refusing to produce more than `limit` bytes.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>, EnvelopeError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(EnvelopeError::Decompress)?;
    if out.len() > limit {
        return Err(EnvelopeError::DecompressLimit(limit));
    }
    Ok(out)
}
