use crate::catalog::error::CatalogError;
use crate::catalog::filter::FilterExpression;
use crate::catalog::types::{
    Group, MetadataType, RecordRef, WorkflowStage, WorkflowState, WorkflowStatus,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// ASCII set for encoding path segments (slashes included).
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'/').add(b'?').add(b'#');

/// Catalog server major version this client speaks.
const SUPPORTED_VERSION: u32 = 3;

/// HTTP client for the remote metadata catalog's REST API.
///
/// The client is read-only except for `create`, `overwrite`, and `delete`;
/// the transform phase of the pipeline only ever calls `search` and `fetch`.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base: Url,
    credentials: Option<(String, String)>,
    xsrf_token: Option<String>,
}

impl CatalogClient {
    /// Authenticate against the catalog and verify its version.
    ///
    /// Basic auth is tried first; when the probe request is rejected the
    /// client falls back to the XSRF cookie token handed out in the refusal.
    /// Redirects are refused so operators use the canonical server URL.
    pub async fn connect(
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, CatalogError> {
        let base = Url::parse(url.trim_end_matches('/'))?;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let credentials = match (username, password) {
            (Some(u), Some(p)) => {
                tracing::info!("Authenticating as: {}", u);
                Some((u.to_string(), p.to_string()))
            }
            _ => None,
        };

        let mut client = CatalogClient {
            http,
            base,
            credentials,
            xsrf_token: None,
        };

        let probe = client
            .request(Method::POST, &["api", "info"])
            .query(&[("_content_type", "json"), ("type", "me")])
            .send()
            .await?;
        if probe.status().is_redirection() {
            let location = probe
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<unknown>")
                .to_string();
            return Err(CatalogError::Redirect { location });
        }
        if !probe.status().is_success() {
            // Without a usable basic-auth session the write endpoints demand
            // the XSRF token issued alongside the refusal.
            match extract_xsrf_token(probe.headers()) {
                Some(token) => {
                    tracing::debug!("XSRF token found");
                    client.xsrf_token = Some(token);
                }
                None => return Err(CatalogError::MissingXsrfToken),
            }
        }

        let version = client.server_version().await?;
        if version != SUPPORTED_VERSION {
            return Err(CatalogError::UnsupportedVersion(version.to_string()));
        }
        tracing::info!("Catalog version: {}", version);
        Ok(client)
    }

    /// Base URL the client was connected with.
    pub fn url(&self) -> &Url {
        &self.base
    }

    async fn server_version(&self) -> Result<u32, CatalogError> {
        let resp = self
            .request(Method::GET, &["api", "site"])
            .header("Accept", "application/json")
            .send()
            .await?;
        let resp = ensure_ok(resp, "site info").await?;
        let value: Value = resp.json().await?;
        value
            .get("system/platform/version")
            .and_then(|v| v.as_str())
            .and_then(|v| v.split('.').next())
            .and_then(|major| major.parse().ok())
            .ok_or(CatalogError::MissingVersion)
    }

    /// Search records matching the filter expression, in catalog sort order
    /// (change date, most recent first). Pages through the index until an
    /// empty page is returned.
    pub async fn search(&self, filters: &FilterExpression) -> Result<Vec<RecordRef>, CatalogError> {
        let mut filter_params = vec![
            ("_content_type".to_string(), "json".to_string()),
            ("buildSummary".to_string(), "false".to_string()),
            // fast=index is what makes titles and workflow fields available
            ("fast".to_string(), "index".to_string()),
            ("sortBy".to_string(), "changeDate".to_string()),
            ("sortOrder".to_string(), "reverse".to_string()),
        ];
        filter_params.extend(filters.to_search_params());
        tracing::debug!("Search params: {:?}", filter_params);

        let mut records = Vec::new();
        let mut from_pos: usize = 0;
        loop {
            let resp = self
                .request(Method::GET, &["api", "q"])
                .header("Accept", "application/json")
                .query(&filter_params)
                // the search index 'from' parameter starts at 1
                .query(&[("from", (from_pos + 1).to_string())])
                .send()
                .await?;
            let resp = ensure_ok(resp, "search").await?;
            let value: Value = resp.json().await?;
            let hits = search_hits(&value);
            if hits.is_empty() {
                break;
            }
            from_pos += hits.len();
            for hit in &hits {
                match as_record(hit) {
                    Some(rec) => {
                        tracing::debug!("Record: {:?}", rec);
                        records.push(rec);
                    }
                    None => tracing::debug!("Skipping hit without uuid: {}", hit),
                }
            }
        }
        Ok(records)
    }

    /// Fetch the raw XML body of one record.
    pub async fn fetch(&self, uuid: &str) -> Result<String, CatalogError> {
        tracing::debug!("Fetching record: {}", uuid);
        let encoded = encode_segment(uuid);
        let resp = self
            .request(Method::GET, &["api", "records", &encoded, "formatters", "xml"])
            .header("Accept", "application/xml")
            .query(&[
                ("increasePopularity", "false"),
                ("withInfo", "false"),
                ("attachment", "false"),
                // only relevant when workflow is enabled
                ("approved", "false"),
            ])
            .send()
            .await?;
        let resp = ensure_ok(resp, "fetch record").await?;
        Ok(resp.text().await?)
    }

    /// Create a new record from `xml`; the catalog assigns the uuid and this
    /// returns it, extracted from the import report message.
    pub async fn create(
        &self,
        xml: &str,
        md_type: MetadataType,
        group: i64,
    ) -> Result<String, CatalogError> {
        tracing::debug!("Creating record: md_type={}, group={}", md_type.api_name(), group);
        let resp = self
            .request(Method::PUT, &["api", "records"])
            .header("Accept", "application/json")
            .header("Content-Type", "application/xml")
            .query(&[
                ("uuidProcessing", "GENERATEUUID"),
                ("group", &group.to_string()),
                ("metadataType", md_type.api_name()),
            ])
            .body(xml.to_string())
            .send()
            .await?;
        let resp = ensure_ok(resp, "create record").await?;
        let payload: Value = resp.json().await?;
        extract_created_uuid(&payload).ok_or(CatalogError::MissingCreatedUuid)
    }

    /// Replace an existing record's content in place.
    ///
    /// PUT /records delete-recreates the record and loses catalog-side
    /// metadata (workflow state, privileges), so this goes through the editor
    /// flow instead: open the XML editor view, then save our XML as the edit
    /// outcome. `update_date_stamp=false` registers the edit as minor.
    ///
    /// With workflow enabled the editor refuses to save a record as APPROVED
    /// directly, so an approved record is saved as SUBMITTED and then
    /// re-approved through the status endpoint. Should the re-approval fail,
    /// the submitted working copy stays visible to reviewers.
    pub async fn overwrite(
        &self,
        uuid: &str,
        xml: &str,
        md_type: MetadataType,
        update_date_stamp: bool,
        state: Option<WorkflowState>,
    ) -> Result<(), CatalogError> {
        tracing::debug!("Updating record {}: md_type={}", uuid, md_type.wire_value());
        let encoded = encode_segment(uuid);

        let resp = self
            .request(Method::GET, &["api", "records", &encoded, "editor"])
            .header("Accept", "application/xml")
            .query(&[("currTab", "xml"), ("withAttributes", "false")])
            .send()
            .await?;
        ensure_ok(resp, "open editor").await?;

        let minor = if update_date_stamp { "false" } else { "true" };
        let mut form: Vec<(&str, String)> = vec![
            ("tab", "xml".to_string()),
            ("minor", minor.to_string()),
            ("withAttributes", "false".to_string()),
            ("withValidationErrors", "false".to_string()),
            ("commit", "true".to_string()),
            ("terminate", "true".to_string()),
            ("template", md_type.wire_value().to_string()),
            ("data", xml.to_string()),
        ];
        if let Some(state) = state {
            let saved = match state.status {
                WorkflowStatus::Approved => WorkflowStatus::Submitted,
                other => other,
            };
            if let Some(code) = saved.code() {
                form.push(("status", code.to_string()));
            }
        }
        let resp = self
            .request(Method::POST, &["api", "records", &encoded, "editor"])
            .form(&form)
            .send()
            .await?;
        ensure_ok(resp, "save editor").await?;

        if let Some(WorkflowState {
            stage: WorkflowStage::Approved,
            ..
        }) = state
        {
            self.approve(&encoded).await?;
        }
        Ok(())
    }

    /// Move a record back to APPROVED after an editor save.
    async fn approve(&self, encoded_uuid: &str) -> Result<(), CatalogError> {
        let resp = self
            .request(Method::PUT, &["api", "records", encoded_uuid, "status"])
            .json(&serde_json::json!({
                "changeMessage": "Approved by recast",
                "status": WorkflowStatus::Approved.code(),
            }))
            .send()
            .await?;
        ensure_ok(resp, "approve record").await?;
        Ok(())
    }

    /// Delete one record, without server-side backup.
    pub async fn delete(&self, uuid: &str) -> Result<(), CatalogError> {
        tracing::debug!("Deleting record: {}", uuid);
        let encoded = encode_segment(uuid);
        let resp = self
            .request(Method::DELETE, &["api", "records", &encoded])
            .query(&[("withBackup", "false")])
            .send()
            .await?;
        ensure_ok(resp, "delete record").await?;
        Ok(())
    }

    /// List the catalog groups available as targets for created records.
    pub async fn groups(&self) -> Result<Vec<Group>, CatalogError> {
        let resp = self
            .request(Method::GET, &["api", "groups"])
            .header("Accept", "application/json")
            .send()
            .await?;
        let resp = ensure_ok(resp, "list groups").await?;
        Ok(resp.json().await?)
    }

    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, join_path(&self.base, segments));
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }
        if let Some(token) = &self.xsrf_token {
            builder = builder.header("X-XSRF-TOKEN", token);
        }
        builder
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT_ENCODE_SET).to_string()
}

fn join_path(base: &Url, segments: &[&str]) -> String {
    let mut url = base.as_str().trim_end_matches('/').to_string();
    for segment in segments {
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    url
}

async fn ensure_ok(
    resp: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, CatalogError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        operation,
        status,
        body,
    })
}

fn extract_xsrf_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v: &HeaderValue| v.to_str().ok())
        .find_map(|cookie| {
            let (name, rest) = cookie.split_once('=')?;
            if name.trim() == "XSRF-TOKEN" {
                Some(rest.split(';').next().unwrap_or(rest).to_string())
            } else {
                None
            }
        })
}

fn search_hits(value: &Value) -> Vec<Value> {
    match value.get("metadata") {
        Some(Value::Array(hits)) => hits.clone(),
        // a single-record result is not wrapped in a list
        Some(hit @ Value::Object(obj)) if obj.contains_key("geonet:info") => vec![hit.clone()],
        _ => Vec::new(),
    }
}

fn as_record(hit: &Value) -> Option<RecordRef> {
    let uuid = hit.get("geonet:info")?.get("uuid")?.as_str()?.to_string();
    let title = hit
        .get("defaultTitle")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();
    let md_type = hit
        .get("isTemplate")
        .and_then(|t| t.as_str())
        .and_then(MetadataType::from_wire)
        .unwrap_or_default();
    Some(RecordRef {
        uuid,
        title,
        md_type,
        state: workflow_state(hit),
    })
}

fn workflow_state(hit: &Value) -> Option<WorkflowState> {
    // absent mdStatus means workflow is disabled on this catalog
    let md_status = hit.get("mdStatus")?;
    if hit.get("draft").and_then(|d| d.as_str()) == Some("e") {
        // Working copy status would need an extra API call; the pipeline only
        // needs the stage, so the status is left unknown.
        return Some(WorkflowState {
            stage: WorkflowStage::WorkingCopy,
            status: WorkflowStatus::Unknown,
        });
    }
    let code = md_status
        .as_i64()
        .or_else(|| md_status.as_str().and_then(|s| s.parse().ok()))?;
    let status = WorkflowStatus::from_code(code);
    let stage = if status == WorkflowStatus::Approved {
        WorkflowStage::Approved
    } else {
        WorkflowStage::NeverApproved
    };
    Some(WorkflowState { stage, status })
}

fn extract_created_uuid(payload: &Value) -> Option<String> {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    let re = UUID_RE.get_or_init(|| {
        Regex::new(r"'([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})'")
            .expect("uuid pattern is valid")
    });
    // The new uuid is only reported inside the import log messages:
    // metadataInfos: { "<id>": [ { "message": "... UUID '<uuid>'", ... } ] }
    let infos = payload.get("metadataInfos")?.as_object()?;
    for entries in infos.values() {
        for info in entries.as_array()? {
            let message = info.get("message")?.as_str()?;
            if let Some(captures) = re.captures(message) {
                return Some(captures[1].to_string());
            }
        }
    }
    None
}
