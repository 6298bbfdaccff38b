/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;

use crate::EnvelopeError;

/// Shared secret for HMAC-SHA256 payload signing.
#[derive(Clone)]
pub struct HmacKey {
    pkey: PKey<Private>,
}

impl HmacKey {
    pub fn new(secret: &[u8]) -> Result<Self, EnvelopeError> {
        if secret.is_empty() {
            return Err(EnvelopeError::EmptyKey);
        }
        let pkey = PKey::hmac(secret)?;
        Ok(HmacKey { pkey })
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.pkey)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    pub fn sign_hex(&self, data: &[u8]) -> Result<String, EnvelopeError> {
        self.sign(data).map(hex::encode)
    }

    /// Check a hex encoded signature in constant time.
    pub fn verify_hex(&self, data: &[u8], signature: &str) -> Result<(), EnvelopeError> {
        let received = hex::decode(signature.trim()).map_err(|_| EnvelopeError::MalformedHash)?;
        let expected = self.sign(data)?;
        if constant_time_eq::constant_time_eq(&expected, &received) {
            Ok(())
        } else {
            Err(EnvelopeError::HashMismatch)
        }
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        let key = HmacKey::new(b"Jefe").unwrap();
        let sig = key.sign_hex(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn tamper() {
        let key = HmacKey::new(b"secret").unwrap();
        let data = b"[{\"id\":\"PollCount\",\"type\":\"counter\",\"delta\":5}]".to_vec();
        let sig = key.sign_hex(&data).unwrap();
        key.verify_hex(&data, &sig).unwrap();

        for i in 0..data.len() {
            let mut bad = data.clone();
            bad[i] ^= 0x01;
            assert!(matches!(
                key.verify_hex(&bad, &sig),
                Err(EnvelopeError::HashMismatch)
            ));
        }

        let other = HmacKey::new(b"other").unwrap();
        assert!(other.verify_hex(&data, &sig).is_err());
    }

    #[test]
    fn malformed() {
        let key = HmacKey::new(b"secret").unwrap();
        assert!(matches!(
            key.verify_hex(b"x", "zz"),
            Err(EnvelopeError::MalformedHash)
        ));
        assert!(matches!(
            key.verify_hex(b"x", "abcd"),
            Err(EnvelopeError::HashMismatch)
        ));
        assert!(matches!(HmacKey::new(b""), Err(EnvelopeError::EmptyKey)));
    }
}
