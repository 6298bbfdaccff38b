/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use slog::{Drain, o};
use slog_scope::GlobalLoggerGuard;

use crate::opts::DaemonArgs;

mod stderr;
pub use stderr::{StderrDrain, StderrLogStats};

const PROCESS_LOG_THREAD_NAME: &str = "log-process";

pub fn verbose_to_level(verbose_level: u8) -> log::Level {
    match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

/// Route the `log` facade to an async stderr drain.
///
/// The returned guard must be held for the lifetime of the process.
pub fn setup(args: &DaemonArgs) -> anyhow::Result<GlobalLoggerGuard> {
    let drain = StderrDrain::spawn(PROCESS_LOG_THREAD_NAME, args.verbose_level > 1)
        .context("failed to spawn log writer thread")?;
    let logger = slog::Logger::root(drain.fuse(), o!("daemon" => args.process_name));

    let scope_guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init_with_level(verbose_to_level(args.verbose_level))
        .context("failed to install the log facade")?;
    Ok(scope_guard)
}
