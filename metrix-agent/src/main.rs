/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use log::{debug, error, info};

use metrix_agent::config::AgentConfig;
use metrix_daemon::control::QuitHandle;

fn main() -> anyhow::Result<()> {
    let proc_args =
        metrix_agent::opts::parse_clap().context("failed to parse command line options")?;

    // set up process logger early, only proc args is used inside
    let _log_guard = metrix_daemon::log::setup(&proc_args.daemon_config)
        .context("failed to setup logger")?;

    let config = metrix_agent::config::load(&proc_args).context("failed to load config")?;
    debug!(
        "report to {} every {:?}, poll every {:?}",
        config.server_address, config.report_interval, config.poll_interval
    );

    if proc_args.daemon_config.test_config {
        info!("the format of the config file is ok");
        return Ok(());
    }

    match tokio_run(config) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn tokio_run(config: AgentConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("metrix-agent")
        .build()
        .context("failed to start runtime")?;
    rt.block_on(async {
        let quit = QuitHandle::new();
        metrix_daemon::signal::register_quit(quit.clone())
            .context("failed to setup signal handler")?;
        metrix_agent::run::run(config, quit).await
    })
}
