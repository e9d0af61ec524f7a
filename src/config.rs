use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Base URL of the main KoboToolbox instance.
const DEFAULT_ENDPOINT: &str = "https://kf.kobotoolbox.org/";
/// Base URL of the humanitarian-response KoboToolbox instance.
const HUMANITARIAN_ENDPOINT: &str = "https://kc.humanitarianresponse.info/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs consumed by the flattener and the workbook exporter.
///
/// Every field has a documented default so callers only override what they
/// need; tests exercise non-default separators and sheet-name lengths through
/// this struct rather than through hard-coded literals.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Separator joining nested field names into table names. Default `"_"`.
    pub separator: String,
    /// Name of the table holding one row per top-level submission. Default
    /// `"root"`.
    pub root_table: String,
    /// Cell content written for missing or `null` values. Default empty.
    pub null_marker: String,
    /// Maximum sheet-name length accepted by the target spreadsheet format.
    /// Default 31, the Excel limit.
    pub max_sheet_name_len: usize,
    /// Submission field names dropped before flattening. Defaults to the
    /// KoboToolbox bookkeeping fields that carry no survey answers.
    pub excluded_fields: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            root_table: "root".to_string(),
            null_marker: String::new(),
            max_sheet_name_len: 31,
            excluded_fields: [
                "_validation_status",
                "formhub/uuid",
                "meta/instanceID",
                "_xform_id_string",
                "meta/rootUuid",
            ]
            .iter()
            .map(|field| field.to_string())
            .collect(),
        }
    }
}

/// Well-known KoboToolbox API endpoints plus an escape hatch for self-hosted
/// instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `https://kf.kobotoolbox.org/`
    Default,
    /// `https://kc.humanitarianresponse.info/`
    Humanitarian,
    /// Any other base URL.
    Custom(Url),
}

impl Endpoint {
    /// Resolves a CLI-style endpoint string: the names `default` and
    /// `humanitarian` map to the well-known instances, anything else must be
    /// a parseable base URL.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "default" => Ok(Endpoint::Default),
            "humanitarian" => Ok(Endpoint::Humanitarian),
            other => Ok(Endpoint::Custom(Url::parse(other)?)),
        }
    }

    /// Base URL the API paths are joined onto.
    pub fn base_url(&self) -> Result<Url> {
        match self {
            Endpoint::Default => Ok(Url::parse(DEFAULT_ENDPOINT)?),
            Endpoint::Humanitarian => Ok(Url::parse(HUMANITARIAN_ENDPOINT)?),
            Endpoint::Custom(url) => Ok(url.clone()),
        }
    }
}

/// Connection settings for one [`KoboClient`](crate::api::KoboClient). The
/// authenticated session lives exactly as long as the client built from this
/// configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API token sent as `Authorization: Token <token>`.
    pub token: String,
    /// Instance the client talks to.
    pub endpoint: Endpoint,
    /// Per-request timeout. Default 30 seconds.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the default endpoint.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: Endpoint::Default,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replaces the endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Replaces the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
