//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use recast::catalog::CatalogClient;
use recast::core::executor::{EngineError, EngineResponse, TransformEngine};
use recast::core::transformation::Transformation;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Boot a mock catalog answering the connect handshake (auth probe plus
/// version check) as a version 3 server.
pub async fn mock_catalog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"me": {}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/site"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"system/platform/version": "3.12.8"})),
        )
        .mount(&server)
        .await;
    server
}

pub async fn connect(server: &MockServer) -> CatalogClient {
    CatalogClient::connect(&server.uri(), Some("admin"), Some("secret"))
        .await
        .unwrap()
}

/// One search hit in the index shape the client parses.
pub fn hit(uuid: &str, title: &str, is_template: &str) -> Value {
    json!({
        "geonet:info": {"uuid": uuid},
        "defaultTitle": title,
        "isTemplate": is_template,
    })
}

/// Hit with workflow fields; `draft == "e"` marks a pending working copy.
pub fn workflow_hit(uuid: &str, title: &str, md_status: i64, draft: &str) -> Value {
    json!({
        "geonet:info": {"uuid": uuid},
        "defaultTitle": title,
        "isTemplate": "n",
        "mdStatus": md_status,
        "draft": draft,
    })
}

/// Mount a single search page followed by the empty page that ends paging.
pub async fn mount_search(server: &MockServer, hits: Vec<Value>) {
    let count = hits.len();
    Mock::given(method("GET"))
        .and(path("/api/q"))
        .and(query_param("from", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": hits})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/q"))
        .and(query_param("from", (count + 1).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

pub async fn mount_fetch(server: &MockServer, uuid: &str, xml: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/records/{uuid}/formatters/xml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(server)
        .await;
}

/// Transformation library with one stylesheet taking a required and an
/// optional parameter. Keep the TempDir alive for the test's duration.
pub fn library_with_stylesheet(name: &str) -> (TempDir, Transformation) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(format!("{name}.xsl"));
    std::fs::write(
        &path,
        r#"<?xml version="1.0"?>
<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform" version="1.0">
  <xsl:param name="organisation"/>
  <xsl:param name="prefix" select="'legacy'"/>
  <xsl:template match="/">
    <xsl:copy-of select="."/>
  </xsl:template>
</xsl:stylesheet>
"#,
    )
    .unwrap();
    let transformation = Transformation::load(&path).unwrap();
    (dir, transformation)
}

pub fn required_params() -> IndexMap<String, String> {
    let mut params = IndexMap::new();
    params.insert("organisation".to_string(), "ACME".to_string());
    params
}

/// Engine double that replays scripted responses in record order and counts
/// how often it was invoked.
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<Result<EngineResponse, EngineError>>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(responses: Vec<Result<EngineResponse, EngineError>>) -> Self {
        ScriptedEngine {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformEngine for ScriptedEngine {
    async fn apply(
        &self,
        _transformation: &Transformation,
        _params: &IndexMap<String, String>,
        _xml: &str,
    ) -> Result<EngineResponse, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(EngineError::Unavailable(
                "scripted engine exhausted".to_string(),
            )))
    }
}
