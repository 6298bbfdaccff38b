/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt::Write;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use log::warn;

use metrix_store::{MetricStore, StoreError};
use metrix_types::{MetricCollection, MetricKind, MetricQuery, MetricRecord};

use super::{ApiError, AppState};

async fn lookup(state: &AppState, name: &str, kind: MetricKind) -> Result<MetricRecord, ApiError> {
    let record = state.store.get_metric(name).await?;
    if record.kind() != kind {
        return Err(StoreError::NotFound(name.to_string()).into());
    }
    Ok(record)
}

pub(super) async fn update_by_path(
    State(state): State<Arc<AppState>>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let record = MetricRecord::parse(&kind, &name, &value)?;
    state.store.set_metric(&record).await?;
    Ok(StatusCode::OK)
}

pub(super) async fn value_by_path(
    State(state): State<Arc<AppState>>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let kind = MetricKind::from_str(&kind)?;
    let record = lookup(&state, &name, kind).await?;
    Ok(record.value().to_string())
}

pub(super) async fn update_json(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MetricRecord>, ApiError> {
    let record: MetricRecord = serde_json::from_slice(&body)?;
    let stored = state.store.set_metric(&record).await?;
    Ok(Json(stored))
}

pub(super) async fn value_json(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MetricRecord>, ApiError> {
    let query: MetricQuery = serde_json::from_slice(&body)?;
    let record = lookup(&state, &query.name, query.kind).await?;
    Ok(Json(record))
}

pub(super) async fn update_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MetricCollection>, ApiError> {
    let batch: MetricCollection = serde_json::from_slice(&body)?;
    let duplicates = batch.duplicate_names();
    if !duplicates.is_empty() {
        warn!("batch carries duplicate metric names: {duplicates:?}");
    }
    let stored = state.store.upsert_batch(batch).await?;
    Ok(Json(stored))
}

pub(super) async fn list_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ApiError> {
    let lines = state.store.list_all().await?;
    let mut page = String::from("<html><head><title>metrics</title></head><body><ul>\n");
    for line in lines {
        let _ = writeln!(page, "<li>{}</li>", escape_html(&line));
    }
    page.push_str("</ul></body></html>\n");
    Ok(Html(page))
}

pub(super) async fn ping(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.store.ping().await {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
