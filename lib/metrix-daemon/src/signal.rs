/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;

pub trait AsyncSignalAction: Clone + Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(unix)]
pub fn register_quit<QUIT>(do_quit: QUIT) -> anyhow::Result<()>
where
    QUIT: AsyncSignalAction,
{
    use std::future::poll_fn;

    use anyhow::anyhow;
    use log::info;
    use tokio::signal::unix::{SignalKind, signal};

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::quit(), "SIGQUIT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let mut sig =
            signal(kind).map_err(|e| anyhow!("failed to create {name} listener: {e}"))?;
        let action = do_quit.clone();
        tokio::spawn(async move {
            if poll_fn(|cx| sig.poll_recv(cx)).await.is_some() {
                info!("got quit signal {name}");
                action.run().await;
            }
        });
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn register_quit<QUIT>(do_quit: QUIT) -> anyhow::Result<()>
where
    QUIT: AsyncSignalAction,
{
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("got ctrl-c signal");
            do_quit.run().await;
        }
    });
    Ok(())
}
