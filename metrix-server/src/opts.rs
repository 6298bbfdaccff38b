/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command, ValueHint, value_parser};

use metrix_daemon::opts::{DaemonArgs, DaemonArgsExt};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");

const ARGS_ADDRESS: &str = "address";
const ARGS_STORE_INTERVAL: &str = "store-interval";
const ARGS_FILE_STORAGE_PATH: &str = "file-storage-path";
const ARGS_RESTORE: &str = "restore";
const ARGS_DATABASE_DSN: &str = "database-dsn";
const ARGS_KEY: &str = "key";
const ARGS_CRYPTO_KEY: &str = "crypto-key";
const ARGS_TRUSTED_SUBNET: &str = "trusted-subnet";
const ARGS_GENERATE_KEYS: &str = "generate-keys";

/// Command line and environment options mapped to their config keys.
const OVERRIDE_ARGS: &[(&str, &str)] = &[
    (ARGS_ADDRESS, "address"),
    (ARGS_STORE_INTERVAL, "store_interval"),
    (ARGS_FILE_STORAGE_PATH, "file_storage_path"),
    (ARGS_RESTORE, "restore"),
    (ARGS_DATABASE_DSN, "database_dsn"),
    (ARGS_KEY, "key"),
    (ARGS_CRYPTO_KEY, "crypto_key"),
    (ARGS_TRUSTED_SUBNET, "trusted_subnet"),
];

#[derive(Debug)]
pub struct ProcArgs {
    pub daemon_config: DaemonArgs,
    pub generate_keys: Option<PathBuf>,
    /// `(config key, raw value)` pairs that override the config file.
    pub overrides: Vec<(&'static str, String)>,
}

impl Default for ProcArgs {
    fn default() -> Self {
        ProcArgs {
            daemon_config: DaemonArgs::new(PKG_NAME),
            generate_keys: None,
            overrides: Vec::new(),
        }
    }
}

fn override_arg(id: &'static str, env: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .help(help)
        .num_args(1)
        .long(id)
        .env(env)
}

fn build_cli_args() -> Command {
    Command::new(PKG_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .append_daemon_args()
        .arg(
            override_arg(ARGS_ADDRESS, "ADDRESS", "Listen address")
                .value_name("HOST:PORT")
                .short('a'),
        )
        .arg(
            override_arg(
                ARGS_STORE_INTERVAL,
                "STORE_INTERVAL",
                "Snapshot interval, 0 to write on every update",
            )
            .value_name("DURATION")
            .short('i'),
        )
        .arg(
            override_arg(
                ARGS_FILE_STORAGE_PATH,
                "FILE_STORAGE_PATH",
                "Snapshot file path, empty to disable",
            )
            .value_name("FILE")
            .value_hint(ValueHint::FilePath)
            .short('f'),
        )
        .arg(
            override_arg(ARGS_RESTORE, "RESTORE", "Restore from the snapshot file on start")
                .value_name("BOOL")
                .short('r'),
        )
        .arg(
            override_arg(ARGS_DATABASE_DSN, "DATABASE_DSN", "Database connection string")
                .value_name("DSN")
                .short('d'),
        )
        .arg(
            override_arg(ARGS_KEY, "KEY", "HMAC-SHA256 signing key")
                .value_name("KEY")
                .short('k'),
        )
        .arg(
            override_arg(ARGS_CRYPTO_KEY, "CRYPTO_KEY", "RSA private key PEM file")
                .value_name("PEM FILE")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            override_arg(
                ARGS_TRUSTED_SUBNET,
                "TRUSTED_SUBNET",
                "Only accept agents whose X-Real-IP is inside this network",
            )
            .value_name("CIDR"),
        )
        .arg(
            Arg::new(ARGS_GENERATE_KEYS)
                .help("Write a new RSA key pair into the directory and exit")
                .num_args(1)
                .value_name("DIR")
                .value_hint(ValueHint::DirPath)
                .value_parser(value_parser!(PathBuf))
                .long(ARGS_GENERATE_KEYS),
        )
}

fn parse_matches(args: &ArgMatches) -> anyhow::Result<ProcArgs> {
    let mut proc_args = ProcArgs::default();
    proc_args.daemon_config.parse_clap(args)?;

    if let Some(dir) = args.get_one::<PathBuf>(ARGS_GENERATE_KEYS) {
        proc_args.generate_keys = Some(dir.to_path_buf());
    }
    for &(id, key) in OVERRIDE_ARGS {
        if let Some(v) = args.get_one::<String>(id) {
            proc_args.overrides.push((key, v.to_string()));
        }
    }
    Ok(proc_args)
}

pub fn parse_clap() -> anyhow::Result<ProcArgs> {
    let args = build_cli_args().get_matches();
    parse_matches(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> ProcArgs {
        let m = build_cli_args().try_get_matches_from(argv).unwrap();
        parse_matches(&m).unwrap()
    }

    #[test]
    fn flags_to_overrides() {
        let args = parse(&[
            "metrix-server",
            "-a",
            "0.0.0.0:8181",
            "-i",
            "0",
            "-k",
            "secret",
            "--trusted-subnet",
            "192.168.0.0/16",
        ]);
        let find = |key: &str| {
            args.overrides
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(find("address"), Some("0.0.0.0:8181"));
        assert_eq!(find("store_interval"), Some("0"));
        assert_eq!(find("key"), Some("secret"));
        assert_eq!(find("trusted_subnet"), Some("192.168.0.0/16"));
        assert!(args.generate_keys.is_none());
    }

    #[test]
    fn generate_keys() {
        let args = parse(&["metrix-server", "--generate-keys", "/tmp/keys"]);
        assert_eq!(args.generate_keys, Some(PathBuf::from("/tmp/keys")));
    }
}
