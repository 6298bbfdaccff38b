/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::Path;

use openssl::pkey::PKey;
use openssl::rsa::Rsa;

use crate::{DecryptKey, EncryptKey, EnvelopeError};

pub struct KeyPair {
    pub private: DecryptKey,
    pub public: EncryptKey,
}

impl KeyPair {
    /// Write `private.pem` and `public.pem` into `dir`.
    pub fn write_pem_files(&self, dir: &Path) -> Result<(), EnvelopeError> {
        let io_err = |e: std::io::Error| EnvelopeError::KeyLoad(format!("{}: {e}", dir.display()));
        std::fs::create_dir_all(dir).map_err(io_err)?;
        std::fs::write(dir.join("private.pem"), self.private.to_pem()?).map_err(io_err)?;
        std::fs::write(dir.join("public.pem"), self.public.to_pem()?).map_err(io_err)?;
        Ok(())
    }
}

pub fn generate_key_pair(bits: u32) -> Result<KeyPair, EnvelopeError> {
    let rsa = Rsa::generate(bits)?;
    let private = DecryptKey::from_pkey(PKey::from_rsa(rsa)?)?;
    let public = private.encrypt_key()?;
    Ok(KeyPair { private, public })
}
