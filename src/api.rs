//! Blocking HTTP surface over the KoboToolbox v2 REST API.
//!
//! The client owns the authenticated session: the `Authorization` header and
//! base URL are fixed when the client is built from a
//! [`ClientConfig`](crate::config::ClientConfig) and live exactly as long as
//! the client. All requests are synchronous; any timeout comes from the
//! configuration.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ClientConfig, ExtractOptions};
use crate::error::{ExtractError, Result};
use crate::flatten::assemble;
use crate::io::excel_write;
use crate::model::TableSet;

/// Query parameters passed through to the data endpoint.
#[derive(Debug, Clone, Default)]
pub struct DataQuery {
    /// Raw MongoDB-style `query` filter, passed through verbatim.
    pub query: Option<String>,
    /// Zero-based offset into the submission list.
    pub start: Option<u64>,
    /// Maximum number of submissions to return.
    pub limit: Option<u64>,
    /// Only submissions strictly newer than this timestamp. Ignored when an
    /// explicit `query` is present.
    pub submitted_after: Option<String>,
}

impl DataQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(query) = &self.query {
            params.push(("query", query.clone()));
            if self.submitted_after.is_some() {
                debug!("ignoring submitted_after because an explicit query is set");
            }
        } else if let Some(after) = &self.submitted_after {
            params.push((
                "query",
                format!(r#"{{"_submission_time": {{"$gt": "{after}"}}}}"#),
            ));
        }
        if let Some(start) = self.start {
            params.push(("start", start.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Client for one KoboToolbox instance.
pub struct KoboClient {
    http: Client,
    base: Url,
}

impl KoboClient {
    /// Builds a client with the token header and timeout baked into the
    /// underlying session.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let token = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| ExtractError::InvalidToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base: config.endpoint.base_url()?,
        })
    }

    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.base.join(&format!("api/v2{path}"))?;
        debug!(%url, "GET");

        let response = self.http.get(url.clone()).query(params).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json()?)
    }

    /// Lists all assets visible to the token.
    pub fn assets(&self) -> Result<Vec<Value>> {
        let response = self.get("/assets.json", &[])?;
        Ok(results_array(&response))
    }

    /// Maps asset names to their uids. Assets without both fields are
    /// omitted.
    pub fn asset_uids(&self) -> Result<BTreeMap<String, String>> {
        let mut uids = BTreeMap::new();
        for asset in self.assets()? {
            let name = asset.get("name").and_then(Value::as_str);
            let uid = asset.get("uid").and_then(Value::as_str);
            if let (Some(name), Some(uid)) = (name, uid) {
                uids.insert(name.to_string(), uid.to_string());
            }
        }
        Ok(uids)
    }

    /// Fetches one asset's detail document, including its form definition.
    pub fn asset(&self, uid: &str) -> Result<Value> {
        self.get(&format!("/assets/{uid}.json"), &[])
    }

    /// Fetches an asset's submissions, applying the given query parameters.
    pub fn submissions(&self, uid: &str, query: &DataQuery) -> Result<Vec<Value>> {
        let response = self.get(&format!("/assets/{uid}/data.json"), &query.params())?;
        Ok(results_array(&response))
    }

    /// Fetches submissions and assembles them into flat tables. Returns
    /// `Ok(None)` when the asset has no matching submissions.
    #[instrument(level = "info", skip_all, fields(asset = %uid))]
    pub fn tables(
        &self,
        uid: &str,
        query: &DataQuery,
        options: &ExtractOptions,
    ) -> Result<Option<TableSet>> {
        let submissions = self.submissions(uid, query)?;
        info!(submission_count = submissions.len(), "submissions fetched");
        assemble(&submissions, options)
    }

    /// Fetches, flattens, and writes one asset's submissions to a workbook.
    ///
    /// Returns `Ok(false)` when there is no data to write, `Ok(true)` on
    /// success; write failures propagate as errors.
    #[instrument(level = "info", skip_all, fields(asset = %uid, output = %path.display()))]
    pub fn export_excel(
        &self,
        uid: &str,
        path: &Path,
        query: &DataQuery,
        options: &ExtractOptions,
    ) -> Result<bool> {
        let Some(tables) = self.tables(uid, query, options)? else {
            warn!("no submissions to export");
            return Ok(false);
        };
        debug!(sheet_count = tables.len(), "workbook assembled");
        excel_write::write_workbook(path, &tables, options)?;
        Ok(true)
    }
}

fn results_array(response: &Value) -> Vec<Value> {
    response
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
