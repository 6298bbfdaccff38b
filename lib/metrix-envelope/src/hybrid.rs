/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use openssl::encrypt::{Decrypter, Encrypter};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::rand::rand_bytes;
use openssl::rsa::{Padding, Rsa};
use openssl::symm::{Cipher, decrypt_aead, encrypt_aead};

use crate::EnvelopeError;

pub const AES_KEY_LEN: usize = 32;
pub const AES_GCM_NONCE_LEN: usize = 12;
pub const AES_GCM_TAG_LEN: usize = 16;

/// Receiver public key. Encrypts a fresh AES-256-GCM key per message.
///
/// Wire layout: `rsa_oaep(aes_key) || nonce || ciphertext || tag`.
#[derive(Clone)]
pub struct EncryptKey {
    pkey: PKey<Public>,
}

impl EncryptKey {
    pub fn from_pkey(pkey: PKey<Public>) -> Result<Self, EnvelopeError> {
        if pkey.rsa().is_err() {
            return Err(EnvelopeError::KeyLoad("not an rsa public key".to_string()));
        }
        Ok(EncryptKey { pkey })
    }

    /// Accepts both SPKI (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &[u8]) -> Result<Self, EnvelopeError> {
        let pkey = match PKey::public_key_from_pem(pem) {
            Ok(pkey) => pkey,
            Err(_) => {
                let rsa = Rsa::public_key_from_pem_pkcs1(pem)
                    .map_err(|e| EnvelopeError::KeyLoad(format!("invalid public key pem: {e}")))?;
                PKey::from_rsa(rsa)?
            }
        };
        EncryptKey::from_pkey(pkey)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, EnvelopeError> {
        let pem = std::fs::read(path).map_err(|e| {
            EnvelopeError::KeyLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        EncryptKey::from_pem(&pem)
    }

    /// PKCS#1 encoding.
    pub fn to_pem(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(self.pkey.rsa()?.public_key_to_pem_pkcs1()?)
    }

    pub fn block_size(&self) -> usize {
        self.pkey.size()
    }

    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        if plain.is_empty() {
            return Ok(Vec::new());
        }

        let mut aes_key = [0u8; AES_KEY_LEN];
        rand_bytes(&mut aes_key)?;
        let mut nonce = [0u8; AES_GCM_NONCE_LEN];
        rand_bytes(&mut nonce)?;

        let mut encrypter = Encrypter::new(&self.pkey)?;
        encrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
        encrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
        encrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;
        let mut key_block = vec![0u8; encrypter.encrypt_len(&aes_key)?];
        let len = encrypter.encrypt(&aes_key, &mut key_block)?;
        key_block.truncate(len);

        let mut tag = [0u8; AES_GCM_TAG_LEN];
        let sealed = encrypt_aead(
            Cipher::aes_256_gcm(),
            &aes_key,
            Some(&nonce),
            &[],
            plain,
            &mut tag,
        )?;

        let mut out = Vec::with_capacity(key_block.len() + nonce.len() + sealed.len() + tag.len());
        out.extend_from_slice(&key_block);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        out.extend_from_slice(&tag);
        Ok(out)
    }
}

impl std::fmt::Debug for EncryptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptKey(rsa {} bits)", self.pkey.bits())
    }
}

/// Receiver private key.
#[derive(Clone)]
pub struct DecryptKey {
    pkey: PKey<Private>,
}

impl DecryptKey {
    pub fn from_pkey(pkey: PKey<Private>) -> Result<Self, EnvelopeError> {
        if pkey.rsa().is_err() {
            return Err(EnvelopeError::KeyLoad("not an rsa private key".to_string()));
        }
        Ok(DecryptKey { pkey })
    }

    /// Accepts both PKCS#8 and PKCS#1 PEM.
    pub fn from_pem(pem: &[u8]) -> Result<Self, EnvelopeError> {
        let pkey = PKey::private_key_from_pem(pem)
            .map_err(|e| EnvelopeError::KeyLoad(format!("invalid private key pem: {e}")))?;
        DecryptKey::from_pkey(pkey)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, EnvelopeError> {
        let pem = std::fs::read(path).map_err(|e| {
            EnvelopeError::KeyLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        DecryptKey::from_pem(&pem)
    }

    /// PKCS#1 encoding.
    pub fn to_pem(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(self.pkey.rsa()?.private_key_to_pem()?)
    }

    pub fn encrypt_key(&self) -> Result<EncryptKey, EnvelopeError> {
        let der = self.pkey.public_key_to_der()?;
        EncryptKey::from_pkey(PKey::public_key_from_der(&der)?)
    }

    pub fn block_size(&self) -> usize {
        self.pkey.size()
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let block_size = self.block_size();
        let min = block_size + AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN;
        if data.len() < min {
            return Err(EnvelopeError::CiphertextTooShort {
                len: data.len(),
                min,
            });
        }

        let (key_block, rest) = data.split_at(block_size);
        let (nonce, rest) = rest.split_at(AES_GCM_NONCE_LEN);
        let (sealed, tag) = rest.split_at(rest.len() - AES_GCM_TAG_LEN);

        let mut decrypter = Decrypter::new(&self.pkey)?;
        decrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
        decrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
        decrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;
        let mut aes_key = vec![0u8; decrypter.decrypt_len(key_block)?];
        let len = decrypter.decrypt(key_block, &mut aes_key)?;
        aes_key.truncate(len);
        if aes_key.len() != AES_KEY_LEN {
            return Err(EnvelopeError::KeyLoad(format!(
                "unexpected session key length {}",
                aes_key.len()
            )));
        }

        let plain = decrypt_aead(
            Cipher::aes_256_gcm(),
            &aes_key,
            Some(nonce),
            &[],
            sealed,
            tag,
        )?;
        Ok(plain)
    }
}

impl std::fmt::Debug for DecryptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecryptKey(rsa {} bits)", self.pkey.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_key_pair;

    #[test]
    fn round_trip() {
        let pair = generate_key_pair(2048).unwrap();
        for len in [1usize, 12, 255, 4096, 65_537] {
            let data: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
            let sealed = pair.public.encrypt(&data).unwrap();
            assert_eq!(
                sealed.len(),
                256 + AES_GCM_NONCE_LEN + data.len() + AES_GCM_TAG_LEN
            );
            assert_eq!(pair.private.decrypt(&sealed).unwrap(), data);
        }
    }

    #[test]
    fn empty_short_circuits() {
        let pair = generate_key_pair(2048).unwrap();
        assert!(pair.public.encrypt(&[]).unwrap().is_empty());
        assert!(pair.private.decrypt(&[]).unwrap().is_empty());
    }

    #[test]
    fn fresh_key_per_message() {
        let pair = generate_key_pair(2048).unwrap();
        let a = pair.public.encrypt(b"same").unwrap();
        let b = pair.public.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn too_short() {
        let pair = generate_key_pair(2048).unwrap();
        let r = pair.private.decrypt(&[0u8; 100]);
        assert!(matches!(
            r,
            Err(EnvelopeError::CiphertextTooShort { len: 100, min: 284 })
        ));
    }

    #[test]
    fn tampered_or_wrong_key() {
        let pair = generate_key_pair(2048).unwrap();
        let mut sealed = pair.public.encrypt(b"{\"id\":\"x\"}").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(pair.private.decrypt(&sealed).is_err());

        let other = generate_key_pair(2048).unwrap();
        let sealed = pair.public.encrypt(b"payload").unwrap();
        assert!(other.private.decrypt(&sealed).is_err());
    }

    #[test]
    fn pem_formats() {
        let pair = generate_key_pair(2048).unwrap();
        let pkcs1 = pair.public.to_pem().unwrap();
        assert!(String::from_utf8_lossy(&pkcs1).contains("RSA PUBLIC KEY"));
        let public = EncryptKey::from_pem(&pkcs1).unwrap();

        let spki = pair.private.pkey.public_key_to_pem().unwrap();
        let public2 = EncryptKey::from_pem(&spki).unwrap();

        let private = DecryptKey::from_pem(&pair.private.to_pem().unwrap()).unwrap();
        let sealed = public.encrypt(b"x").unwrap();
        assert_eq!(private.decrypt(&sealed).unwrap(), b"x");
        let sealed = public2.encrypt(b"y").unwrap();
        assert_eq!(private.decrypt(&sealed).unwrap(), b"y");

        assert!(matches!(
            EncryptKey::from_pem(b"garbage"),
            Err(EnvelopeError::KeyLoad(_))
        ));
        assert!(matches!(
            DecryptKey::from_pem(b"garbage"),
            Err(EnvelopeError::KeyLoad(_))
        ));
    }

    #[test]
    fn key_file() {
        let pair = generate_key_pair(2048).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public.pem");
        std::fs::write(&path, pair.public.to_pem().unwrap()).unwrap();
        let public = EncryptKey::from_pem_file(&path).unwrap();
        assert_eq!(public.block_size(), 256);

        let missing = dir.path().join("missing.pem");
        assert!(DecryptKey::from_pem_file(&missing).is_err());
    }
}
