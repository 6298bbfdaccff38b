/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use metrix_daemon::control::{QuitHandle, wait_with_grace};
use metrix_envelope::{DecryptKey, Envelope, HmacKey};

use crate::backend::StoreBackend;
use crate::config::ServerConfig;
use crate::http::{AppState, build_router};

pub fn build_envelope(config: &ServerConfig) -> anyhow::Result<Envelope> {
    let mut envelope = Envelope::default();
    if let Some(key) = &config.hash_key {
        let key = HmacKey::new(key.as_bytes()).context("invalid hash key")?;
        envelope = envelope.with_hmac(key);
    }
    if let Some(path) = &config.crypto_key {
        let key = DecryptKey::from_pem_file(path)
            .context(format!("failed to load private key {}", path.display()))?;
        envelope = envelope.with_decrypt_key(key);
    }
    Ok(envelope)
}

/// Serve until `quit` is triggered, then drain requests and persist.
pub async fn run(config: ServerConfig, quit: QuitHandle) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen.as_str())
        .await
        .context(format!("failed to bind to {}", config.listen))?;
    serve_on(listener, config, quit).await
}

/// Like [`run`], on an already bound listener.
///
/// Open requests get at most `shutdown_grace` to finish after quit. The final
/// snapshot is written either way.
pub async fn serve_on(
    listener: TcpListener,
    config: ServerConfig,
    quit: QuitHandle,
) -> anyhow::Result<()> {
    let envelope = build_envelope(&config)?;
    let backend = StoreBackend::build(&config).await?;

    let state = Arc::new(AppState {
        store: backend.store(),
        envelope,
        trusted_subnet: config.trusted_subnet,
        body_limit: config.body_limit,
    });
    info!("listening on {}", listener.local_addr()?);

    // stopped only after the http server has drained, so that the final
    // snapshot sees every accepted update
    let persist_quit = CancellationToken::new();
    let persist_task = {
        let config = config.clone();
        let quit = persist_quit.clone();
        tokio::spawn(async move {
            backend.run_until(&config, quit).await;
            backend.close().await;
        })
    };

    let serve_quit = quit.token();
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { serve_quit.cancelled().await })
        .into_future();
    tokio::pin!(server);
    let served = tokio::select! {
        r = &mut server => r.context("http server failed"),
        _ = quit.triggered() => {
            match wait_with_grace(config.shutdown_grace, &mut server).await {
                Some(r) => r.context("http server failed"),
                None => {
                    warn!("requests still in flight are abandoned");
                    Ok(())
                }
            }
        }
    };
    info!("http server stopped");

    persist_quit.cancel();
    if let Some(Err(e)) = wait_with_grace(config.shutdown_grace, persist_task).await {
        warn!("persistence task failed: {e}");
    }
    served
}
