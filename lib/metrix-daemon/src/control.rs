/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::signal::AsyncSignalAction;

/// Process wide quit trigger, passed to every long running task.
#[derive(Clone, Default)]
pub struct QuitHandle {
    token: CancellationToken,
}

impl QuitHandle {
    pub fn new() -> Self {
        QuitHandle::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

impl AsyncSignalAction for QuitHandle {
    async fn run(&self) {
        self.trigger();
    }
}

/// Wait for `fut` for at most `grace`, after a quit has been triggered.
///
/// Returns `None` if the grace period ran out first.
pub async fn wait_with_grace<F>(grace: Duration, fut: F) -> Option<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(grace, fut).await {
        Ok(v) => {
            debug!("all tasks finished within the grace period");
            Some(v)
        }
        Err(_) => {
            warn!("grace period of {grace:?} elapsed, forcing shutdown");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_by_action() {
        let quit = QuitHandle::new();
        let token = quit.token();
        assert!(!token.is_cancelled());
        quit.run().await;
        assert!(token.is_cancelled());
        assert!(quit.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn grace() {
        let r = wait_with_grace(Duration::from_secs(2), async { 7 }).await;
        assert_eq!(r, Some(7));

        let r = wait_with_grace(
            Duration::from_secs(2),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await;
        assert!(r.is_none());
    }
}
