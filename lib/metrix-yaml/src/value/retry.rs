/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::anyhow;
use yaml_rust::Yaml;

use metrix_types::BackoffPolicy;

/// Parse a retry schedule.
///
/// A bare list is a fixed schedule. A map selects the policy with `type`:
///
/// ```yaml
/// type: exponential
/// initial: 1s
/// factor: 2
/// max_delay: 10s
/// max_retries: 4
/// ```
pub fn as_backoff_policy(v: &Yaml) -> anyhow::Result<BackoffPolicy> {
    let policy = match v {
        Yaml::Array(_) => BackoffPolicy::Fixed(super::as_list(v, super::as_duration)?),
        Yaml::Hash(map) => {
            let ty = crate::hash_get_required(map, "type")?;
            let ty = super::as_string(ty)?;
            match crate::key::normalize(&ty).as_str() {
                "fixed" => {
                    let delays = crate::hash_get_required(map, "delays")?;
                    BackoffPolicy::Fixed(super::as_list(delays, super::as_duration)?)
                }
                "exponential" => {
                    let mut initial = Duration::from_secs(1);
                    let mut factor = 2.0;
                    let mut max_delay = Duration::from_secs(30);
                    let mut max_retries = 3;
                    crate::foreach_kv(map, |k, v| match crate::key::normalize(k).as_str() {
                        "type" => Ok(()),
                        "initial" => {
                            initial = super::as_duration(v)?;
                            Ok(())
                        }
                        "factor" => {
                            factor = super::as_f64(v)?;
                            Ok(())
                        }
                        "max_delay" => {
                            max_delay = super::as_duration(v)?;
                            Ok(())
                        }
                        "max_retries" => {
                            max_retries = super::as_usize(v)?;
                            Ok(())
                        }
                        _ => Err(anyhow!("invalid key {k}")),
                    })?;
                    BackoffPolicy::Exponential {
                        initial,
                        factor,
                        max_delay,
                        max_retries,
                    }
                }
                "jittered" => {
                    let base = crate::hash_get_required(map, "base")?;
                    let base = as_backoff_policy(base)?;
                    let jitter = match map.get(&Yaml::String("jitter".to_string())) {
                        Some(v) => super::as_f64(v)?,
                        None => 0.2,
                    };
                    BackoffPolicy::Jittered {
                        base: Box::new(base),
                        jitter,
                    }
                }
                _ => return Err(anyhow!("unsupported backoff policy type {ty}")),
            }
        }
        _ => return Err(anyhow!("yaml value type for backoff policy should be 'array' or 'map'")),
    };
    policy.check().map_err(|e| anyhow!("invalid backoff policy: {e}"))?;
    Ok(policy)
}
