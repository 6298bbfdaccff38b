/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::{EnvelopeError, ErrorCategory};

mod gzip;
pub use gzip::{DEFAULT_DECOMPRESS_LIMIT, compress, decompress};

mod hmac;
pub use hmac::HmacKey;

mod hybrid;
pub use hybrid::{AES_GCM_NONCE_LEN, AES_GCM_TAG_LEN, AES_KEY_LEN, DecryptKey, EncryptKey};

mod key;
pub use key::{KeyPair, generate_key_pair};

mod envelope;
pub use envelope::{Envelope, SealedPayload};

pub const HEADER_HASH: &str = "HashSHA256";
pub const ENCODING_GZIP: &str = "gzip";
