/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::{DEFAULT_DECOMPRESS_LIMIT, DecryptKey, EncryptKey, EnvelopeError, HmacKey};

/// A payload ready to be put on the wire, with its side channel values.
#[derive(Debug)]
pub struct SealedPayload {
    pub body: Vec<u8>,
    pub gzip: bool,
    /// Hex encoded HMAC-SHA256 of `body`.
    pub signature: Option<String>,
}

/// Optional compression, integrity and confidentiality layers.
///
/// Outbound order is compress, encrypt, sign. The signature always covers the
/// exact wire body, so a receiver can reject tampered requests before doing
/// any decryption or decompression work.
#[derive(Clone, Debug)]
pub struct Envelope {
    gzip: bool,
    hmac: Option<HmacKey>,
    encrypt_key: Option<EncryptKey>,
    decrypt_key: Option<DecryptKey>,
    decompress_limit: usize,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            gzip: false,
            hmac: None,
            encrypt_key: None,
            decrypt_key: None,
            decompress_limit: DEFAULT_DECOMPRESS_LIMIT,
        }
    }
}

impl Envelope {
    pub fn with_gzip(mut self, enable: bool) -> Self {
        self.gzip = enable;
        self
    }

    pub fn with_hmac(mut self, key: HmacKey) -> Self {
        self.hmac = Some(key);
        self
    }

    pub fn with_encrypt_key(mut self, key: EncryptKey) -> Self {
        self.encrypt_key = Some(key);
        self
    }

    pub fn with_decrypt_key(mut self, key: DecryptKey) -> Self {
        self.decrypt_key = Some(key);
        self
    }

    pub fn with_decompress_limit(mut self, limit: usize) -> Self {
        self.decompress_limit = limit;
        self
    }

    pub fn hmac(&self) -> Option<&HmacKey> {
        self.hmac.as_ref()
    }

    pub fn seal(&self, payload: &[u8]) -> Result<SealedPayload, EnvelopeError> {
        let mut body = if self.gzip {
            crate::compress(payload)?
        } else {
            payload.to_vec()
        };
        if let Some(key) = &self.encrypt_key {
            body = key.encrypt(&body)?;
        }
        let signature = match &self.hmac {
            Some(key) => Some(key.sign_hex(&body)?),
            None => None,
        };
        Ok(SealedPayload {
            body,
            gzip: self.gzip,
            signature,
        })
    }

    /// Verify the signature if both a key and a signature are present.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), EnvelopeError> {
        match (&self.hmac, signature) {
            (Some(key), Some(sig)) => key.verify_hex(body, sig),
            _ => Ok(()),
        }
    }

    pub fn open(
        &self,
        body: &[u8],
        gzip: bool,
        signature: Option<&str>,
    ) -> Result<Vec<u8>, EnvelopeError> {
        self.verify(body, signature)?;
        let plain = match &self.decrypt_key {
            Some(key) => key.decrypt(body)?,
            None => body.to_vec(),
        };
        if gzip {
            crate::decompress(&plain, self.decompress_limit)
        } else {
            Ok(plain)
        }
    }
}
