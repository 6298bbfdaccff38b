/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::middleware;
use axum::routing::{get, post};
use ip_network::IpNetwork;

use metrix_envelope::Envelope;
use metrix_store::ArcMetricStore;

mod envelope;
mod error;
mod handlers;

pub use error::ApiError;

const HASH_HEADER: HeaderName = HeaderName::from_static("hashsha256");
const REAL_IP_HEADER: HeaderName = HeaderName::from_static("x-real-ip");

pub struct AppState {
    pub store: ArcMetricStore,
    pub envelope: Envelope,
    pub trusted_subnet: Option<IpNetwork>,
    pub body_limit: usize,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_metrics))
        .route("/ping", get(handlers::ping))
        .route(
            "/update/{kind}/{name}/{value}",
            post(handlers::update_by_path),
        )
        .route("/value/{kind}/{name}", get(handlers::value_by_path))
        .route("/update", post(handlers::update_json))
        .route("/update/", post(handlers::update_json))
        .route("/value", post(handlers::value_json))
        .route("/value/", post(handlers::value_json))
        .route("/updates", post(handlers::update_batch))
        .route("/updates/", post(handlers::update_batch))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            envelope::envelope,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            envelope::trusted_subnet,
        ))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
    use axum::http::{Request, Response, StatusCode};
    use metrix_envelope::{HmacKey, generate_key_pair};
    use metrix_store::{MemoryStore, MetricStore};
    use tower::ServiceExt;

    fn state_with(envelope: Envelope, trusted_subnet: Option<IpNetwork>) -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(MemoryStore::new()),
            envelope,
            trusted_subnet,
            body_limit: 1 << 20,
        })
    }

    fn plain_state() -> Arc<AppState> {
        state_with(Envelope::default(), None)
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response<Body> {
        build_router(Arc::clone(state))
            .oneshot(request)
            .await
            .unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn plain_update_and_value() {
        let state = plain_state();

        let r = send(&state, post("/update/counter/PollCount/5")).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(&state, post("/update/counter/PollCount/7")).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(&state, get("/value/counter/PollCount")).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(body_text(r).await, "12");

        let r = send(&state, post("/update/gauge/Alloc/1.5")).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(&state, get("/value/gauge/Alloc")).await;
        assert_eq!(body_text(r).await, "1.5");
    }

    #[tokio::test]
    async fn plain_route_errors() {
        let state = plain_state();

        let r = send(&state, post("/update/histogram/x/1")).await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        let r = send(&state, post("/update/counter/x/1.5")).await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        let r = send(&state, post("/update/gauge/x/abc")).await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let r = send(&state, get("/value/gauge/missing")).await;
        assert_eq!(r.status(), StatusCode::NOT_FOUND);

        // a stored counter is not visible as a gauge
        send(&state, post("/update/counter/c/1")).await;
        let r = send(&state, get("/value/gauge/c")).await;
        assert_eq!(r.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_update_returns_stored_value() {
        let state = plain_state();
        state.store.increment_counter("hits", 10).await.unwrap();

        let r = send(
            &state,
            post_json("/update/", r#"{"id":"hits","type":"counter","delta":5}"#),
        )
        .await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(
            body_text(r).await,
            r#"{"id":"hits","type":"counter","delta":15}"#
        );

        let r = send(&state, post_json("/value", r#"{"id":"hits","type":"counter"}"#)).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(
            body_text(r).await,
            r#"{"id":"hits","type":"counter","delta":15}"#
        );

        let r = send(&state, post_json("/value/", r#"{"id":"hits","type":"gauge"}"#)).await;
        assert_eq!(r.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_update_errors() {
        let state = plain_state();
        for body in [
            r#"{"id":"x","type":"summary","value":1}"#,
            r#"{"id":"x","type":"gauge"}"#,
            r#"{"id":"","type":"gauge","value":1}"#,
            "not json",
        ] {
            let r = send(&state, post_json("/update", body)).await;
            assert_eq!(r.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn batch_update() {
        let state = plain_state();
        state.store.increment_counter("PollCount", 1).await.unwrap();

        let r = send(
            &state,
            post_json(
                "/updates/",
                r#"[{"id":"Alloc","type":"gauge","value":2.5},{"id":"PollCount","type":"counter","delta":4}]"#,
            ),
        )
        .await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(
            body_text(r).await,
            r#"[{"id":"Alloc","type":"gauge","value":2.5},{"id":"PollCount","type":"counter","delta":5}]"#
        );
        assert_eq!(state.store.get_gauge("Alloc").await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn listing_and_ping() {
        let state = plain_state();
        state.store.set_gauge("b", 2.0).await.unwrap();
        state.store.increment_counter("a", 1).await.unwrap();

        let r = send(&state, get("/")).await;
        assert_eq!(r.status(), StatusCode::OK);
        let ct = r.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(ct.starts_with("text/html"));
        let page = body_text(r).await;
        let a = page.find("<li>a: 1</li>").unwrap();
        let b = page.find("<li>b: 2</li>").unwrap();
        assert!(a < b);

        let r = send(&state, get("/ping")).await;
        assert_eq!(r.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_and_compressed_request() {
        let key = HmacKey::new(b"secret").unwrap();
        let state = state_with(Envelope::default().with_hmac(key.clone()), None);
        let agent = Envelope::default().with_gzip(true).with_hmac(key.clone());

        let sealed = agent
            .seal(br#"[{"id":"g","type":"gauge","value":0.5}]"#)
            .unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/updates/")
            .header(CONTENT_ENCODING, "gzip")
            .header(ACCEPT_ENCODING, "gzip")
            .header("HashSHA256", sealed.signature.clone().unwrap())
            .body(Body::from(sealed.body.clone()))
            .unwrap();
        let r = send(&state, request).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.headers().get(CONTENT_ENCODING).unwrap(), "gzip");

        let signature = r
            .headers()
            .get("HashSHA256")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let wire = axum::body::to_bytes(r.into_body(), 1 << 20).await.unwrap();
        key.verify_hex(&wire, &signature).unwrap();
        let plain = metrix_envelope::decompress(&wire, 1 << 20).unwrap();
        assert_eq!(plain, br#"[{"id":"g","type":"gauge","value":0.5}]"#);

        // flip one byte of the wire body
        let mut tampered = sealed.body;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let request = Request::builder()
            .method("POST")
            .uri("/updates/")
            .header(CONTENT_ENCODING, "gzip")
            .header("HashSHA256", sealed.signature.unwrap())
            .body(Body::from(tampered))
            .unwrap();
        let r = send(&state, request).await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.get_gauge("g").await.unwrap(), 0.5);
    }

    #[tokio::test]
    async fn encrypted_request() {
        let pair = generate_key_pair(2048).unwrap();
        let state = state_with(
            Envelope::default().with_decrypt_key(pair.private),
            None,
        );
        let agent = Envelope::default()
            .with_gzip(true)
            .with_encrypt_key(pair.public);

        let sealed = agent
            .seal(br#"{"id":"c","type":"counter","delta":3}"#)
            .unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/update")
            .header(CONTENT_ENCODING, "gzip")
            .body(Body::from(sealed.body))
            .unwrap();
        let r = send(&state, request).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(state.store.get_counter("c").await.unwrap(), 3);

        // plaintext is not a valid ciphertext
        let r = send(
            &state,
            post_json("/update", r#"{"id":"c","type":"counter","delta":3}"#),
        )
        .await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.get_counter("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn trusted_subnet() {
        let subnet = "10.1.0.0/16".parse::<IpNetwork>().unwrap();
        let state = state_with(Envelope::default(), Some(subnet));

        let r = send(&state, post("/update/gauge/g/1")).await;
        assert_eq!(r.status(), StatusCode::FORBIDDEN);

        let request = Request::builder()
            .method("POST")
            .uri("/update/gauge/g/1")
            .header("X-Real-IP", "10.2.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&state, request).await.status(), StatusCode::FORBIDDEN);

        let request = Request::builder()
            .method("POST")
            .uri("/update/gauge/g/1")
            .header("X-Real-IP", "10.1.3.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&state, request).await.status(), StatusCode::OK);
        assert_eq!(state.store.get_gauge("g").await.unwrap(), 1.0);
    }
}
