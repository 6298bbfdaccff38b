/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::{debug, warn};

use metrix_envelope::{ENCODING_GZIP, EnvelopeError};

use super::{ApiError, AppState, HASH_HEADER, REAL_IP_HEADER};

fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(ENCODING_GZIP))
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|item| item.split(';').next())
        .any(|coding| coding.trim().eq_ignore_ascii_case(ENCODING_GZIP))
}

/// Reject requests whose `X-Real-IP` is missing or outside the trusted subnet.
pub(super) async fn trusted_subnet(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(network) = &state.trusted_subnet {
        let real_ip = request
            .headers()
            .get(&REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if !real_ip.is_some_and(|ip| network.contains(ip)) {
            debug!("reject request from untrusted address {real_ip:?}");
            return ApiError::Forbidden.into_response();
        }
    }
    next.run(request).await
}

async fn open_request(state: &AppState, request: Request) -> Result<Request, ApiError> {
    let (mut parts, body) = request.into_parts();

    let signature = match parts.headers.get(&HASH_HEADER) {
        Some(v) => Some(
            v.to_str()
                .map_err(|_| EnvelopeError::MalformedHash)?
                .to_string(),
        ),
        None => None,
    };
    let gzip = is_gzip_encoded(&parts.headers);

    let wire = axum::body::to_bytes(body, state.body_limit)
        .await
        .map_err(|e| ApiError::Body(e.to_string()))?;
    let plain = state.envelope.open(&wire, gzip, signature.as_deref())?;

    parts.headers.remove(CONTENT_ENCODING);
    parts.headers.remove(CONTENT_LENGTH);
    Ok(Request::from_parts(parts, Body::from(plain)))
}

async fn seal_response(state: &AppState, response: Response, gzip: bool) -> Response {
    let (mut parts, body) = response.into_parts();
    let mut body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            warn!("failed to collect response body: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if gzip && !body.is_empty() {
        match metrix_envelope::compress(&body) {
            Ok(compressed) => {
                body = Bytes::from(compressed);
                parts
                    .headers
                    .insert(CONTENT_ENCODING, HeaderValue::from_static(ENCODING_GZIP));
            }
            Err(e) => warn!("failed to compress response: {e}"),
        }
    }

    if let Some(key) = state.envelope.hmac() {
        match key.sign_hex(&body) {
            Ok(sig) => match HeaderValue::from_str(&sig) {
                Ok(v) => {
                    parts.headers.insert(HASH_HEADER, v);
                }
                Err(e) => warn!("invalid response signature header: {e}"),
            },
            Err(e) => warn!("failed to sign response: {e}"),
        }
    }

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

/// Verify, decrypt and decompress the request, then compress and sign the
/// response.
pub(super) async fn envelope(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let gzip_response = accepts_gzip(request.headers());
    let request = match open_request(&state, request).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let response = next.run(request).await;
    seal_response(&state, response, gzip_response).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("br, gzip;q=0.8"));
        assert!(accepts_gzip(&headers));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("deflate, identity"));
        assert!(!accepts_gzip(&headers));
    }

    #[test]
    fn content_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!is_gzip_encoded(&headers));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("GZIP"));
        assert!(is_gzip_encoded(&headers));
    }
}
