//! Stream control surface integration tests.
//!
//! Drives a real server over HTTP through the `TestScServer` harness.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use sc_test_utils::TestScServer;
use serde_json::{json, Value};
use std::sync::Arc;
use stream_controller::services::stream_processor::mock::{FailOn, MockStreamProcessor};

struct Client {
    base: String,
    http: reqwest::Client,
}

impl Client {
    fn new(server: &TestScServer) -> Self {
        Self {
            base: server.url(),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let response = self.http.get(format!("{}{}", self.base, path)).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    async fn add(&self, key: &str) -> Result<(u16, Value)> {
        self.post(&format!("/stream/{key}/add"), json!({"name": key}))
            .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let (_, body) = self.get("/streams").await?;
        Ok(body["payload"]
            .as_object()
            .map(|streams| streams.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Four sequential adds fill an empty registry.
#[tokio::test]
async fn test_fill_to_capacity() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);

    for key in ["a", "b", "c", "d"] {
        let (status, body) = client.add(key).await?;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": 1, "payload": "success"}));
    }

    assert_eq!(client.keys().await?, vec!["a", "b", "c", "d"]);
    assert_eq!(server.registry().count().await, 4);

    Ok(())
}

/// A fifth key evicts exactly one stream, the oldest admitted.
#[tokio::test]
async fn test_overflow_evicts_one() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);

    for key in ["a", "b", "c", "d"] {
        client.add(key).await?;
    }

    let (status, _) = client.add("e").await?;
    assert_eq!(status, 200);

    assert_eq!(client.keys().await?, vec!["b", "c", "d", "e"]);

    Ok(())
}

/// Batch add replaces an existing key in place and evicts only for the new one.
#[tokio::test]
async fn test_batch_add_replace_and_evict() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);

    for key in ["a", "b", "c", "x"] {
        client.add(key).await?;
    }

    let (status, body) = client
        .post(
            "/streams/multi/control/add",
            json!({"x": {"name": "x-v2"}, "y": {"name": "y"}}),
        )
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["status"], 1);
    assert_eq!(body["payload"]["x"]["status"], 1);
    assert_eq!(body["payload"]["y"]["status"], 1);

    assert_eq!(client.keys().await?, vec!["b", "c", "x", "y"]);

    let (_, info) = client.get("/stream/x/info").await?;
    assert_eq!(info["payload"]["config"]["name"], "x-v2");

    Ok(())
}

/// Batch delete with a missing key reports it per item and fails the batch.
#[tokio::test]
async fn test_batch_delete_partial() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);
    client.add("p").await?;

    let (status, body) = client
        .post("/streams/multi/control/delete", json!(["p", "q"]))
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["status"], 0);
    assert_eq!(body["payload"]["p"], json!({"status": 1, "payload": "success"}));
    assert_eq!(
        body["payload"]["q"],
        json!({"status": 0, "payload": "stream not found: q"})
    );
    assert!(client.keys().await?.is_empty());

    Ok(())
}

/// An empty batch add is rejected before the registry is touched.
#[tokio::test]
async fn test_batch_add_empty_rejected() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);
    client.add("keep").await?;

    let (status, body) = client.post("/streams/multi/control/add", json!({})).await?;

    assert_eq!(status, 400);
    assert_eq!(body["status"], 0);
    assert_eq!(client.keys().await?, vec!["keep"]);

    Ok(())
}

/// Malformed JSON is a 400 with the failure envelope.
#[tokio::test]
async fn test_malformed_body_rejected() -> Result<()> {
    let server = TestScServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/streams/multi/control/add", server.url()))
        .header("content-type", "application/json")
        .body("{\"a\": ")
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], 0);
    assert!(body["payload"].as_str().unwrap().starts_with("validation error"));

    Ok(())
}

/// Single-stream lifecycle: add, edit, reload, info, delete.
#[tokio::test]
async fn test_single_stream_lifecycle() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);

    client.add("cam1").await?;

    let (status, _) = client
        .post("/stream/cam1/edit", json!({"name": "renamed", "fps": 30}))
        .await?;
    assert_eq!(status, 200);

    let (status, body) = client.get("/stream/cam1/reload").await?;
    assert_eq!(status, 200);
    assert_eq!(body["payload"], "success");

    let (status, body) = client.get("/stream/cam1/info").await?;
    assert_eq!(status, 200);
    assert_eq!(body["payload"]["key"], "cam1");
    assert_eq!(body["payload"]["config"]["name"], "renamed");
    assert_eq!(body["payload"]["config"]["fps"], 30);

    let (status, _) = client.get("/stream/cam1/delete").await?;
    assert_eq!(status, 200);

    let (status, body) = client.get("/stream/cam1/info").await?;
    assert_eq!(status, 500);
    assert_eq!(body, json!({"status": 0, "payload": "stream not found: cam1"}));

    Ok(())
}

/// Edits never admit new keys.
#[tokio::test]
async fn test_edit_unknown_key_fails() -> Result<()> {
    let server = TestScServer::spawn().await?;
    let client = Client::new(&server);

    let (status, body) = client.post("/stream/ghost/edit", json!({})).await?;

    assert_eq!(status, 500);
    assert_eq!(body["status"], 0);
    assert!(client.keys().await?.is_empty());

    Ok(())
}

/// A failing victim teardown aborts the admission and leaves the new key out.
#[tokio::test]
async fn test_eviction_failure_reported() -> Result<()> {
    let processor = Arc::new(MockStreamProcessor::failing_for(FailOn::Stop, ["a"]));
    let server = TestScServer::spawn_with(processor, &[]).await?;
    let client = Client::new(&server);

    for key in ["a", "b", "c", "d"] {
        client.add(key).await?;
    }

    let (status, body) = client.add("e").await?;

    assert_eq!(status, 500);
    assert!(body["payload"]
        .as_str()
        .unwrap()
        .starts_with("eviction failed"));
    assert!(!client.keys().await?.contains(&"e".to_string()));
    assert!(server.registry().count().await <= 4);

    Ok(())
}

/// Basic auth guards stream routes when credentials are configured.
#[tokio::test]
async fn test_basic_auth_required_when_configured() -> Result<()> {
    let processor = Arc::new(MockStreamProcessor::accepting());
    let server = TestScServer::spawn_with(
        processor,
        &[("SC_API_USERNAME", "operator"), ("SC_API_PASSWORD", "hunter2")],
    )
    .await?;
    let http = reqwest::Client::new();

    let response = http.get(format!("{}/streams", server.url())).send().await?;
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"status": 0, "payload": "unauthorized"}));

    let response = http
        .get(format!("{}/streams", server.url()))
        .basic_auth("operator", Some("hunter2"))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let response = http.get(format!("{}/health", server.url())).send().await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

/// Smaller capacity and LRU-style eviction are honored end to end.
#[tokio::test]
async fn test_least_recently_touched_policy() -> Result<()> {
    let processor = Arc::new(MockStreamProcessor::accepting());
    let server = TestScServer::spawn_with(
        processor,
        &[
            ("SC_MAX_STREAMS", "2"),
            ("SC_EVICTION_POLICY", "least-recently-touched"),
        ],
    )
    .await?;
    let client = Client::new(&server);

    client.add("a").await?;
    client.add("b").await?;
    client.get("/stream/a/reload").await?;
    client.add("c").await?;

    assert_eq!(client.keys().await?, vec!["a", "c"]);

    Ok(())
}
