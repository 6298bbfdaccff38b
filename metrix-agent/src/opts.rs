/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use clap::{Arg, ArgMatches, Command, ValueHint};

use metrix_daemon::opts::{DaemonArgs, DaemonArgsExt};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");

const ARGS_ADDRESS: &str = "address";
const ARGS_POLL_INTERVAL: &str = "poll-interval";
const ARGS_REPORT_INTERVAL: &str = "report-interval";
const ARGS_KEY: &str = "key";
const ARGS_RATE_LIMIT: &str = "rate-limit";
const ARGS_CRYPTO_KEY: &str = "crypto-key";
const ARGS_REAL_IP: &str = "real-ip";

const OVERRIDE_ARGS: &[(&str, &str)] = &[
    (ARGS_ADDRESS, "address"),
    (ARGS_POLL_INTERVAL, "poll_interval"),
    (ARGS_REPORT_INTERVAL, "report_interval"),
    (ARGS_KEY, "key"),
    (ARGS_RATE_LIMIT, "rate_limit"),
    (ARGS_CRYPTO_KEY, "crypto_key"),
    (ARGS_REAL_IP, "real_ip"),
];

#[derive(Debug)]
pub struct ProcArgs {
    pub daemon_config: DaemonArgs,
    pub overrides: Vec<(&'static str, String)>,
}

impl Default for ProcArgs {
    fn default() -> Self {
        ProcArgs {
            daemon_config: DaemonArgs::new(PKG_NAME),
            overrides: Vec::new(),
        }
    }
}

fn build_cli_args() -> Command {
    Command::new(PKG_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .append_daemon_args()
        .arg(
            Arg::new(ARGS_ADDRESS)
                .help("Server address")
                .num_args(1)
                .value_name("HOST:PORT")
                .short('a')
                .long(ARGS_ADDRESS)
                .env("ADDRESS"),
        )
        .arg(
            Arg::new(ARGS_POLL_INTERVAL)
                .help("Interval between two metric polls")
                .num_args(1)
                .value_name("DURATION")
                .short('p')
                .long(ARGS_POLL_INTERVAL)
                .env("POLL_INTERVAL"),
        )
        .arg(
            Arg::new(ARGS_REPORT_INTERVAL)
                .help("Interval between two reports")
                .num_args(1)
                .value_name("DURATION")
                .short('r')
                .long(ARGS_REPORT_INTERVAL)
                .env("REPORT_INTERVAL"),
        )
        .arg(
            Arg::new(ARGS_KEY)
                .help("HMAC-SHA256 signing key")
                .num_args(1)
                .value_name("KEY")
                .short('k')
                .long(ARGS_KEY)
                .env("KEY"),
        )
        .arg(
            Arg::new(ARGS_RATE_LIMIT)
                .help("Max number of reports in flight")
                .num_args(1)
                .value_name("COUNT")
                .short('l')
                .long(ARGS_RATE_LIMIT)
                .env("RATE_LIMIT"),
        )
        .arg(
            Arg::new(ARGS_CRYPTO_KEY)
                .help("RSA public key PEM file of the server")
                .num_args(1)
                .value_name("PEM FILE")
                .value_hint(ValueHint::FilePath)
                .long(ARGS_CRYPTO_KEY)
                .env("CRYPTO_KEY"),
        )
        .arg(
            Arg::new(ARGS_REAL_IP)
                .help("Value of the X-Real-IP header, detected if not set")
                .num_args(1)
                .value_name("IP")
                .long(ARGS_REAL_IP),
        )
}

fn parse_matches(args: &ArgMatches) -> anyhow::Result<ProcArgs> {
    let mut proc_args = ProcArgs::default();
    proc_args.daemon_config.parse_clap(args)?;

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

    #[test]
    fn flags_to_overrides() {
        let m = build_cli_args()
            .try_get_matches_from([
                "metrix-agent",
                "-a",
                "10.0.0.1:8080",
                "-l",
                "4",
                "--real-ip",
                "10.0.0.9",
                "-vv",
            ])
            .unwrap();
        let args = parse_matches(&m).unwrap();
        assert_eq!(args.daemon_config.verbose_level, 2);
        assert!(args.overrides.contains(&("address", "10.0.0.1:8080".to_string())));
        assert!(args.overrides.contains(&("rate_limit", "4".to_string())));
        assert!(args.overrides.contains(&("real_ip", "10.0.0.9".to_string())));
    }
}
