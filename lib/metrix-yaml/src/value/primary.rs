/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

pub fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub fn as_nonzero_usize(v: &Yaml) -> anyhow::Result<NonZeroUsize> {
    let u = as_usize(v)?;
    NonZeroUsize::new(u).ok_or_else(|| anyhow!("value should be greater than zero"))
}

pub fn as_f64(v: &Yaml) -> anyhow::Result<f64> {
    match v {
        Yaml::String(s) | Yaml::Real(s) => Ok(f64::from_str(s)?),
        Yaml::Integer(i) => Ok(*i as f64),
        _ => Err(anyhow!(
            "yaml value type for 'f64' should be 'string', 'integer' or 'real'"
        )),
    }
}

pub fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

pub fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) | Yaml::Real(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

pub fn as_list<T, F>(v: &Yaml, convert: F) -> anyhow::Result<Vec<T>>
where
    F: Fn(&Yaml) -> anyhow::Result<T>,
{
    match v {
        Yaml::Array(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, v)| convert(v).context(format!("invalid value for list element #{i}")))
            .collect(),
        _ => {
            let node = convert(v).context("invalid single value for the list")?;
            Ok(vec![node])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_bool() {
        assert!(as_bool(&Yaml::String("Yes".to_string())).unwrap());
        assert!(!as_bool(&Yaml::Boolean(false)).unwrap());
        assert!(as_bool(&Yaml::Integer(1)).unwrap());
        assert!(as_bool(&Yaml::String("maybe".to_string())).is_err());
    }

    #[test]
    fn t_usize() {
        assert_eq!(as_usize(&Yaml::Integer(10)).unwrap(), 10);
        assert_eq!(as_usize(&Yaml::String("3".to_string())).unwrap(), 3);
        assert!(as_usize(&Yaml::Integer(-1)).is_err());
        assert!(as_nonzero_usize(&Yaml::Integer(0)).is_err());
    }

    #[test]
    fn t_list() {
        let doc = yaml_doc!("[1, 2, 3]");
        assert_eq!(as_list(&doc, as_usize).unwrap(), vec![1, 2, 3]);
        assert_eq!(as_list(&Yaml::Integer(7), as_usize).unwrap(), vec![7]);
    }
}
