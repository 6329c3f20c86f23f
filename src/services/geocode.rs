use crate::config::GeocodeSettings;
use crate::models::{ZipCode, ZipCodeSet};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling the zip code radius service
///
/// The variants keep the precise cause for logs. Callers that talk to
/// people should use [`GeocodeError::reason`], which is the same for all
/// of them.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP client could not be built: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned status {0}")]
    ApiError(StatusCode),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// What went wrong, as far as the person searching is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeFailureReason {
    QuotaExhaustedOrUnavailable,
}

impl GeocodeFailureReason {
    pub fn user_message(self) -> &'static str {
        match self {
            GeocodeFailureReason::QuotaExhaustedOrUnavailable => {
                "We can't look up nearby zip codes right now. Please try your search again later."
            }
        }
    }
}

impl GeocodeError {
    pub fn reason(&self) -> GeocodeFailureReason {
        GeocodeFailureReason::QuotaExhaustedOrUnavailable
    }
}

/// Client for the radius lookup endpoint of the zip code service
///
/// Requests have the shape `GET {base}/{api_key}/{format}/{zip}/{radius}/miles`.
/// One call per search; there are no retries.
pub struct GeocodeClient {
    radius_base_url: String,
    timeout: Duration,
    client: Client,
}

impl GeocodeClient {
    /// Create a new client
    pub fn new(base_url: &str, api_key: &str, format: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GeocodeError::ClientBuild)?;

        let radius_base_url = format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(api_key),
            format.trim_matches('/'),
        );

        Ok(Self {
            radius_base_url,
            timeout,
            client,
        })
    }

    pub fn from_settings(settings: &GeocodeSettings) -> Result<Self, GeocodeError> {
        Self::new(
            &settings.base_url,
            &settings.api_key,
            &settings.format,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Full lookup URL for an origin and radius
    pub fn radius_url(&self, origin: &ZipCode, radius_miles: u32) -> String {
        format!("{}/{}/{}/miles", self.radius_base_url, origin, radius_miles)
    }

    /// Resolve an origin zip code and radius to the zip codes inside it
    ///
    /// Upstream order is preserved, including the origin itself when the
    /// service lists it.
    pub async fn resolve_radius(&self, origin: &ZipCode, radius_miles: u32) -> Result<ZipCodeSet, GeocodeError> {
        // The URL carries the API key, so only the origin and radius are logged.
        tracing::debug!("Resolving zip codes within {} miles of {}", radius_miles, origin);

        let response = self
            .client
            .get(self.radius_url(origin, radius_miles))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::ApiError(status));
        }

        let json: Value = response.json().await.map_err(|e| self.transport_error(e))?;

        let zip_codes = parse_zip_codes(&json)?;

        tracing::debug!("Radius lookup for {} returned {} zip codes", origin, zip_codes.len());

        Ok(zip_codes)
    }

    fn transport_error(&self, error: reqwest::Error) -> GeocodeError {
        if error.is_timeout() {
            GeocodeError::Timeout(self.timeout)
        } else {
            GeocodeError::RequestError(error)
        }
    }
}

/// Project the `zip_codes` array of a radius response onto bare zip codes.
///
/// An exhausted quota shows up as a 200 body without `zip_codes`.
fn parse_zip_codes(json: &Value) -> Result<ZipCodeSet, GeocodeError> {
    let entries = json
        .get("zip_codes")
        .and_then(|z| z.as_array())
        .ok_or_else(|| GeocodeError::InvalidResponse(describe_body(json)))?;

    let mut zip_codes = Vec::with_capacity(entries.len());
    for entry in entries {
        let raw = match entry.get("zip_code") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(zip) if zip <= 99_999 => format!("{:05}", zip),
                _ => n.to_string(),
            },
            _ => return Err(GeocodeError::InvalidResponse("zip_codes entry without zip_code".into())),
        };

        // Entries that are not five-digit zips are dropped; the rest keep upstream order.
        match ZipCode::parse(&raw) {
            Ok(zip) => zip_codes.push(zip),
            Err(e) => tracing::warn!("Skipping radius entry: {}", e),
        }
    }

    Ok(ZipCodeSet::new(zip_codes))
}

fn describe_body(json: &Value) -> String {
    match json.get("error_msg").and_then(|m| m.as_str()) {
        Some(message) => format!("missing zip_codes ({})", message),
        None => "missing zip_codes".to_string(),
    }
}
