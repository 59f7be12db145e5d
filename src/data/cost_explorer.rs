use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use tracing::{debug, warn};
use crate::config::ConnectionConfig;
use crate::data::signing::{amz_date, Credentials, RequestSigner};
use crate::data::types::{GetCostForecastInput, GetCostForecastOutput};

pub const GET_COST_FORECAST_TARGET: &str = "AWSInsightsIndexService.GetCostForecast";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const SERVICE: &str = "ce";

/// Remote forecast capability. One call, one response, no paging.
#[async_trait]
pub trait CostForecastApi: Send + Sync {
    async fn get_cost_forecast(
        &self,
        input: &GetCostForecastInput,
    ) -> Result<GetCostForecastOutput, ApiError>;
}

/// Hands out a fresh forecast session per list call
pub trait ConnectionManager: Send + Sync {
    fn cost_explorer(&self) -> Result<Box<dyn CostForecastApi>>;

    /// Region the sessions are bound to.
    fn region(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Access denied ({code}): {message}")]
    AccessDenied { code: String, message: String },

    #[error("Request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Cost Explorer JSON-protocol client
pub struct CostExplorerClient {
    client: Client,
    endpoint: String,
    host: String,
    region: String,
    credentials: Credentials,
}

impl CostExplorerClient {
    pub fn new(region: String, credentials: Credentials) -> Result<Self, ApiError> {
        let endpoint = default_endpoint(&region);
        Self::with_endpoint(endpoint, region, credentials)
    }

    /// Create a client against a custom endpoint (for testing)
    pub fn with_endpoint(
        endpoint: String,
        region: String,
        credentials: Credentials,
    ) -> Result<Self, ApiError> {
        let url = Url::parse(&endpoint).map_err(|_| ApiError::InvalidEndpoint(endpoint.clone()))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ApiError::InvalidEndpoint(endpoint)),
        };

        Ok(Self {
            client: Client::new(),
            endpoint: format!("{}/", endpoint.trim_end_matches('/')),
            host,
            region,
            credentials,
        })
    }

    /// Map a non-2xx response onto an error, using the AWS JSON error body when present
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ApiError {
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();
        let (code, message) = parse_error_body(&body_text);

        if code.contains("Throttling") || code.contains("LimitExceeded") || status_code == 429 {
            warn!("Cost Explorer throttled the request: {}", message);
            return ApiError::Throttled(message);
        }

        match status_code {
            401 | 403 => ApiError::AccessDenied { code, message },
            400..=499 if !code.is_empty() => {
                if code.contains("AccessDenied")
                    || code.contains("UnrecognizedClient")
                    || code.contains("InvalidSignature")
                {
                    ApiError::AccessDenied { code, message }
                } else {
                    ApiError::Rejected { code, message }
                }
            }
            500..=599 => {
                warn!("Server error {}: {}", status_code, message);
                ApiError::ServerError {
                    status: status_code,
                    message,
                }
            }
            _ => ApiError::Http {
                status: status_code,
                message,
            },
        }
    }
}

#[async_trait]
impl CostForecastApi for CostExplorerClient {
    async fn get_cost_forecast(
        &self,
        input: &GetCostForecastInput,
    ) -> Result<GetCostForecastOutput, ApiError> {
        let body = serde_json::to_vec(input)?;
        let now = Utc::now();
        let date = amz_date(now);

        let mut signed: Vec<(&str, &str)> = vec![
            ("content-type", JSON_CONTENT_TYPE),
            ("host", self.host.as_str()),
            ("x-amz-date", date.as_str()),
            ("x-amz-target", GET_COST_FORECAST_TARGET),
        ];
        if let Some(token) = &self.credentials.session_token {
            signed.push(("x-amz-security-token", token.as_str()));
        }

        let authorization = RequestSigner::new(&self.credentials, &self.region, SERVICE)
            .authorization(now, "POST", "/", &signed, &body)
            .map_err(|e| ApiError::Signing(e.to_string()))?;

        // reqwest derives Host from the URL; it matches the signed value
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, authorization);
        for (name, value) in signed.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }

        debug!(
            "GetCostForecast {} {}..{} via {}",
            input.granularity, input.time_period.start, input.time_period.end, self.endpoint
        );

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(status, response).await);
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Pull `(code, message)` out of an AWS JSON error body.
///
/// `__type` may be namespaced (`com.amazonaws...#ValidationException`); only the
/// part after `#` is kept.
fn parse_error_body(body: &str) -> (String, String) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return (String::new(), body.to_string());
    };

    let code = json
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_default();
    let message = json
        .get("message")
        .or_else(|| json.get("Message"))
        .and_then(|v| v.as_str())
        .unwrap_or(body)
        .to_string();

    (code, message)
}

pub fn default_endpoint(region: &str) -> String {
    if partition_for_region(region) == "aws-cn" {
        format!("https://ce.{}.amazonaws.com.cn", region)
    } else {
        format!("https://ce.{}.amazonaws.com", region)
    }
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Builds a signed client per call from explicit connection settings
pub struct AwsConnectionManager {
    connection: ConnectionConfig,
    credentials: Option<Credentials>,
}

impl AwsConnectionManager {
    pub fn new(connection: ConnectionConfig, credentials: Option<Credentials>) -> Self {
        Self {
            connection,
            credentials,
        }
    }
}

impl ConnectionManager for AwsConnectionManager {
    fn cost_explorer(&self) -> Result<Box<dyn CostForecastApi>> {
        let credentials = self
            .credentials
            .clone()
            .context("AWS credentials not configured (AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY)")?;

        let region = self.connection.region.clone();
        let client = match &self.connection.endpoint {
            Some(endpoint) => CostExplorerClient::with_endpoint(endpoint.clone(), region, credentials),
            None => CostExplorerClient::new(region, credentials),
        }
        .context("Failed to create Cost Explorer client")?;

        Ok(Box::new(client))
    }

    fn region(&self) -> &str {
        &self.connection.region
    }
}
