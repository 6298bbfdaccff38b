/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use thiserror::Error;

use metrix_envelope::{ENCODING_GZIP, HEADER_HASH, SealedPayload};
use metrix_types::HEADER_REAL_IP;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server replied with status {0}")]
    Status(StatusCode),
}

/// Delivery of one sealed report batch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: SealedPayload) -> Result<(), TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    real_ip: Option<String>,
}

impl HttpTransport {
    pub fn new(
        server_address: &str,
        timeout: Duration,
        real_ip: Option<IpAddr>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            client,
            url: format!("http://{server_address}/updates/"),
            real_ip: real_ip.map(|ip| ip.to_string()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: SealedPayload) -> Result<(), TransportError> {
        let mut req = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_ENCODING, ENCODING_GZIP);
        if payload.gzip {
            req = req.header(CONTENT_ENCODING, ENCODING_GZIP);
        }
        if let Some(signature) = payload.signature {
            req = req.header(HEADER_HASH, signature);
        }
        if let Some(ip) = &self.real_ip {
            req = req.header(HEADER_REAL_IP, ip.as_str());
        }

        let rsp = req.body(payload.body).send().await?;
        let status = rsp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status))
        }
    }
}
