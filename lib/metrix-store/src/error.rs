/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use metrix_types::{MetricCollection, ValidationError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metric {0} not found")]
    NotFound(String),
    #[error("invalid metric: {0}")]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored row for {id}: {reason}")]
    CorruptRow { id: String, reason: String },
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A rolled back batch upsert. Nothing of `original` has been applied.
#[derive(Debug, Error)]
#[error("batch upsert aborted: {source}")]
pub struct BatchUpsertError {
    pub original: MetricCollection,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database unavailable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("fatal database error: {0}")]
    Fatal(#[source] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
