/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use log::{info, warn};

use metrix_daemon::control::{QuitHandle, wait_with_grace};
use metrix_envelope::{EncryptKey, Envelope, HmacKey};

use crate::config::AgentConfig;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::probe::SysinfoProbe;
use crate::transport::HttpTransport;

pub fn build_envelope(config: &AgentConfig) -> anyhow::Result<Envelope> {
    let mut envelope = Envelope::default().with_gzip(config.compress);
    if let Some(key) = &config.hash_key {
        let key = HmacKey::new(key.as_bytes()).context("invalid hash key")?;
        envelope = envelope.with_hmac(key);
    }
    if let Some(path) = &config.crypto_key {
        let key = EncryptKey::from_pem_file(path)
            .context(format!("failed to load public key {}", path.display()))?;
        envelope = envelope.with_encrypt_key(key);
    }
    Ok(envelope)
}

/// Poll and report until `quit` is triggered.
pub async fn run(config: AgentConfig, quit: QuitHandle) -> anyhow::Result<()> {
    let envelope = build_envelope(&config)?;
    let real_ip = config.real_ip();
    let transport = HttpTransport::new(&config.server_address, config.request_timeout, real_ip)
        .context("failed to create http client")?;
    info!("reporting to {}", transport.url());

    let dispatcher = Dispatcher::new(
        DispatchConfig {
            poll_interval: config.poll_interval,
            report_interval: config.report_interval,
            rate_limit: config.rate_limit,
        },
        transport,
        envelope,
    );
    let mut tasks = dispatcher.spawn(SysinfoProbe::new(), quit.token());

    quit.triggered().await;
    info!("quit requested, waiting for in-flight reports");
    let drained = wait_with_grace(config.shutdown_grace, async {
        while let Some(r) = tasks.join_next().await {
            if let Err(e) = r {
                warn!("dispatch task failed: {e}");
            }
        }
    })
    .await;
    if drained.is_none() {
        tasks.abort_all();
    }

    let stats = dispatcher.stats();
    info!(
        "{} polls, {} reports sent, {} failed, {} ticks dropped",
        stats.get_polls(),
        stats.get_sent(),
        stats.get_failed(),
        stats.get_ticks_dropped()
    );
    Ok(())
}
