/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

pub fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub fn get_required<'a>(map: &'a yaml::Hash, k: &str) -> anyhow::Result<&'a Yaml> {
    let key = Yaml::String(k.to_owned());
    map.get(&key)
        .ok_or_else(|| anyhow!("no required key {k} found in this map"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk() {
        let doc = yaml_doc!("address: localhost:8080\nrate_limit: 4");
        let map = doc.as_hash().unwrap();
        let mut keys = Vec::new();
        foreach_kv(map, |k, _| {
            keys.push(k.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(keys, vec!["address", "rate_limit"]);

        let doc = yaml_doc!("1: a");
        assert!(foreach_kv(doc.as_hash().unwrap(), |_, _| Ok(())).is_err());
    }

    #[test]
    fn required() {
        let doc = yaml_doc!("type: fixed");
        let map = doc.as_hash().unwrap();
        assert_eq!(get_required(map, "type").unwrap().as_str(), Some("fixed"));
        assert!(get_required(map, "delays").is_err());
    }
}
