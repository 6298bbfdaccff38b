/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use log::debug;
use yaml_rust::{Yaml, yaml};

use crate::opts::ProcArgs;

const DEFAULT_SERVER_ADDRESS: &str = "localhost:8080";
const DEFAULT_RATE_LIMIT: NonZeroUsize = NonZeroUsize::new(10).unwrap();

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub server_address: String,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub hash_key: Option<String>,
    pub rate_limit: NonZeroUsize,
    pub crypto_key: Option<PathBuf>,
    pub compress: bool,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    pub real_ip: Option<IpAddr>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            hash_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            crypto_key: None,
            compress: true,
            request_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
            real_ip: None,
        }
    }
}

fn non_empty_string(v: &Yaml) -> anyhow::Result<Option<String>> {
    let s = metrix_yaml::value::as_string(v)?;
    if s.is_empty() { Ok(None) } else { Ok(Some(s)) }
}

impl AgentConfig {
    pub fn parse_yaml(&mut self, map: &yaml::Hash) -> anyhow::Result<()> {
        metrix_yaml::foreach_kv(map, |k, v| self.set(k, v))
    }

    pub(crate) fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match metrix_yaml::key::normalize(k).as_str() {
            "address" | "server_address" => {
                self.server_address = metrix_yaml::value::as_string(v)
                    .context(format!("invalid server address value for key {k}"))?;
                Ok(())
            }
            "poll_interval" => {
                self.poll_interval = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "report_interval" => {
                self.report_interval = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "key" | "hash_key" => {
                self.hash_key =
                    non_empty_string(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "rate_limit" => {
                self.rate_limit = metrix_yaml::value::as_nonzero_usize(v)
                    .context(format!("invalid nonzero usize value for key {k}"))?;
                Ok(())
            }
            "crypto_key" => {
                self.crypto_key = non_empty_string(v)
                    .context(format!("invalid path value for key {k}"))?
                    .map(PathBuf::from);
                Ok(())
            }
            "compress" => {
                self.compress = metrix_yaml::value::as_bool(v)
                    .context(format!("invalid bool value for key {k}"))?;
                Ok(())
            }
            "request_timeout" => {
                self.request_timeout = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "shutdown_grace" => {
                self.shutdown_grace = metrix_yaml::value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "real_ip" => {
                self.real_ip = match non_empty_string(v)? {
                    Some(s) => Some(
                        IpAddr::from_str(&s)
                            .map_err(|e| anyhow!("invalid ip address value for key {k}: {e}"))?,
                    ),
                    None => None,
                };
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.server_address.is_empty() {
            return Err(anyhow!("no server address set"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval should not be zero"));
        }
        if self.report_interval.is_zero() {
            return Err(anyhow!("report interval should not be zero"));
        }
        Ok(())
    }

    /// The configured `X-Real-IP` value, or the local address used to reach
    /// the server.
    pub fn real_ip(&self) -> Option<IpAddr> {
        self.real_ip
            .or_else(|| detect_local_ip(&self.server_address))
    }
}

fn detect_local_ip(server: &str) -> Option<IpAddr> {
    let peer = server.to_socket_addrs().ok()?.next()?;
    let bind: SocketAddr = match peer {
        SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
        SocketAddr::V6(_) => ([0u16; 8], 0).into(),
    };
    // connecting an udp socket only selects the route, nothing is sent
    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(peer).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    debug!("detected local address {ip} for server {server}");
    Some(ip)
}

/// Build the effective config: defaults, then the config file, then the
/// environment and command line overrides.
pub fn load(args: &ProcArgs) -> anyhow::Result<AgentConfig> {
    let mut config = AgentConfig::default();

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
