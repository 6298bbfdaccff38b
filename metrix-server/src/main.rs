/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use log::{debug, error, info};

use metrix_daemon::control::QuitHandle;
use metrix_server::config::ServerConfig;

const GENERATED_KEY_BITS: u32 = 4096;

fn main() -> anyhow::Result<()> {
    let proc_args =
        metrix_server::opts::parse_clap().context("failed to parse command line options")?;

    // set up process logger early, only proc args is used inside
    let _log_guard = metrix_daemon::log::setup(&proc_args.daemon_config)
        .context("failed to setup logger")?;

    if let Some(dir) = &proc_args.generate_keys {
        let pair = metrix_envelope::generate_key_pair(GENERATED_KEY_BITS)
            .context("failed to generate rsa key pair")?;
        pair.write_pem_files(dir)
            .context(format!("failed to write key files into {}", dir.display()))?;
        info!("rsa key pair written to {}", dir.display());
        return Ok(());
    }

    let config = metrix_server::config::load(&proc_args).context("failed to load config")?;
    debug!("effective listen address {}", config.listen);

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

fn tokio_run(config: ServerConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("metrix-server")
        .build()
        .context("failed to start runtime")?;
    rt.block_on(async {
        let quit = QuitHandle::new();
        metrix_daemon::signal::register_quit(quit.clone())
            .context("failed to setup signal handler")?;
        metrix_server::serve::run(config, quit).await
    })
}
