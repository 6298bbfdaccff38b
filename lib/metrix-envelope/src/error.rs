/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use openssl::error::ErrorStack;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Compression,
    Integrity,
    Crypto,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("gzip compress failed: {0}")]
    Compress(#[source] io::Error),
    #[error("gzip decompress failed: {0}")]
    Decompress(#[source] io::Error),
    #[error("decompressed payload exceeds {0} bytes")]
    DecompressLimit(usize),
    #[error("hash mismatch")]
    HashMismatch,
    #[error("malformed hash value")]
    MalformedHash,
    #[error("empty hmac key")]
    EmptyKey,
    #[error("ciphertext too short: {len} < {min}")]
    CiphertextTooShort { len: usize, min: usize },
    #[error("invalid key material: {0}")]
    KeyLoad(String),
    #[error("openssl error: {0}")]
    OpenSsl(#[from] ErrorStack),
}

impl EnvelopeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnvelopeError::Compress(_)
            | EnvelopeError::Decompress(_)
            | EnvelopeError::DecompressLimit(_) => ErrorCategory::Compression,
            EnvelopeError::HashMismatch | EnvelopeError::MalformedHash => ErrorCategory::Integrity,
            EnvelopeError::EmptyKey
            | EnvelopeError::CiphertextTooShort { .. }
            | EnvelopeError::KeyLoad(_)
            | EnvelopeError::OpenSsl(_) => ErrorCategory::Crypto,
        }
    }
}
