/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, warn};
use thiserror::Error;

use metrix_envelope::EnvelopeError;
use metrix_store::{BatchUpsertError, StoreError};
use metrix_types::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("source address is not trusted")]
    Forbidden,
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("{0}")]
    Envelope(#[from] EnvelopeError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Batch(#[from] BatchUpsertError),
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Body(_)
            | ApiError::Envelope(_)
            | ApiError::Validation(_)
            | ApiError::Json(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => store_status(e),
            ApiError::Batch(e) => match store_status(&e.source) {
                StatusCode::BAD_REQUEST => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("request failed: {self}");
        } else {
            debug!("request rejected with {status}: {self}");
        }
        (status, self.to_string()).into_response()
    }
}
