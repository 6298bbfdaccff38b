/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

#[cfg(test)]
macro_rules! yaml_doc {
    ($s:expr) => {
        yaml_rust::YamlLoader::load_from_str($s).unwrap().remove(0)
    };
}

mod doc;
mod hash;

pub mod key;
pub mod value;

pub use doc::{foreach_doc, load_doc};
pub use hash::{foreach_kv, get_required as hash_get_required};
