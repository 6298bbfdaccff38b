/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use ip_network::IpNetwork;
use log::debug;
use yaml_rust::{Yaml, yaml};

use metrix_store::SqlStoreConfig;
use metrix_types::BackoffPolicy;

use crate::opts::ProcArgs;

const DEFAULT_LISTEN: &str = "localhost:8080";
const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/metrics-db.json";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen: String,
    /// Zero means a synchronous snapshot after every mutation.
    pub store_interval: Duration,
    pub file_storage_path: Option<PathBuf>,
    pub restore: bool,
    pub database_dsn: Option<String>,
    pub hash_key: Option<String>,
    pub crypto_key: Option<PathBuf>,
    pub trusted_subnet: Option<IpNetwork>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub db_retry: BackoffPolicy,
    pub shutdown_grace: Duration,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: DEFAULT_LISTEN.to_string(),
            store_interval: Duration::from_secs(300),
            file_storage_path: Some(PathBuf::from(DEFAULT_FILE_STORAGE_PATH)),
            restore: true,
            database_dsn: None,
            hash_key: None,
            crypto_key: None,
            trusted_subnet: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(5),
            db_retry: BackoffPolicy::default(),
            shutdown_grace: Duration::from_secs(2),
            body_limit: 4 << 20,
        }
    }
}

fn non_empty_string(v: &Yaml) -> anyhow::Result<Option<String>> {
    let s = metrix_yaml::value::as_string(v)?;
    if s.is_empty() { Ok(None) } else { Ok(Some(s)) }
}

impl ServerConfig {
    pub fn parse_yaml(&mut self, map: &yaml::Hash) -> anyhow::Result<()> {
        metrix_yaml::foreach_kv(map, |k, v| self.set(k, v))
    }

    pub(crate) fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match metrix_yaml::key::normalize(k).as_str() {
            "address" | "listen" => {
                self.listen = metrix_yaml::value::as_string(v)
                    .context(format!("invalid listen address value for key {k}"))?;
                Ok(())
            }
            "store_interval" => {
                self.store_interval = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "file_storage_path" => {
                self.file_storage_path = non_empty_string(v)
                    .context(format!("invalid path value for key {k}"))?
                    .map(PathBuf::from);
                Ok(())
            }
            "restore" => {
                self.restore = metrix_yaml::value::as_bool(v)
                    .context(format!("invalid bool value for key {k}"))?;
                Ok(())
            }
            "database_dsn" => {
                self.database_dsn =
                    non_empty_string(v).context(format!("invalid dsn value for key {k}"))?;
                Ok(())
            }
            "key" | "hash_key" => {
                self.hash_key =
                    non_empty_string(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "crypto_key" => {
                self.crypto_key = non_empty_string(v)
                    .context(format!("invalid path value for key {k}"))?
                    .map(PathBuf::from);
                Ok(())
            }
            "trusted_subnet" => {
                self.trusted_subnet = match v {
                    Yaml::String(s) if s.is_empty() => None,
                    Yaml::Null => None,
                    _ => Some(
                        metrix_yaml::value::as_ip_network(v)
                            .context(format!("invalid ip network value for key {k}"))?,
                    ),
                };
                Ok(())
            }
            "db_max_connections" => {
                let n = metrix_yaml::value::as_nonzero_usize(v)
                    .context(format!("invalid nonzero usize value for key {k}"))?;
                self.db_max_connections = u32::try_from(n.get())
                    .map_err(|_| anyhow!("too large value for key {k}"))?;
                Ok(())
            }
            "db_acquire_timeout" => {
                self.db_acquire_timeout = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "db_retry" => {
                self.db_retry = metrix_yaml::value::as_backoff_policy(v)
                    .context(format!("invalid backoff policy value for key {k}"))?;
                Ok(())
            }
            "shutdown_grace" => {
                self.shutdown_grace = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "body_limit" => {
                self.body_limit = metrix_yaml::value::as_nonzero_usize(v)
                    .context(format!("invalid nonzero usize value for key {k}"))?
                    .get();
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.listen.is_empty() {
            return Err(anyhow!("no listen address set"));
        }
        self.db_retry
            .check()
            .map_err(|e| anyhow!("invalid db retry policy: {e}"))?;
        Ok(())
    }

    pub fn sql_store_config(&self) -> Option<SqlStoreConfig> {
        let dsn = self.database_dsn.as_ref()?;
        let mut config = SqlStoreConfig::new(dsn.as_str());
        config.max_connections = self.db_max_connections;
        config.acquire_timeout = self.db_acquire_timeout;
        config.retry = self.db_retry.clone();
        Some(config)
    }
}

/// Build the effective config: defaults, then the config file, then the
/// environment and command line overrides.
pub fn load(args: &ProcArgs) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Some(file) = &args.daemon_config.config_file {
        // allow multiple docs, and treat them as the same
        metrix_yaml::foreach_doc(file, |_, doc| match doc {
            Yaml::Hash(map) => config.parse_yaml(map),
            _ => Err(anyhow!("yaml doc root should be hash")),
        })
        .context(format!("failed to load config file {}", file.display()))?;
        debug!("loaded config from {}", file.display());
    }

    for (k, v) in &args.overrides {
        config
            .set(k, &Yaml::String(v.clone()))
            .context(format!("invalid command line or env value for {k}"))?;
    }

    config.check()?;
    Ok(config)
}
