//! HTTP client for the vaccinespotter appointment feed.
//!
//! Wraps `reqwest` with typed GeoJSON deserialization and an explicit error
//! boundary, so callers can tell a failed fetch apart from a state with no
//! matching appointments.

use std::time::Duration;

use thiserror::Error;

use crate::types::{Appointment, FeatureCollection, states};

const DEFAULT_BASE_URL: &str = "https://www.vaccinespotter.org/api/v0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned {status} for state {state}")]
    Status {
        state: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode feed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported state code: {0}")]
    UnsupportedState(String),
}

/// Client for the per-state appointment availability feed.
pub struct SpotterClient {
    client: reqwest::Client,
    base_url: String,
}

impl SpotterClient {
    /// Client pointed at the production feed.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client with a custom base URL (for testing against a mock server).
    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vaxspot-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every appointment location published for a state.
    ///
    /// `state` must be an uppercase two-letter code the feed publishes.
    /// Malformed individual records never fail the call; they degrade to
    /// records the pipeline filters out.
    pub async fn fetch_state(&self, state: &str) -> Result<Vec<Appointment>, FetchError> {
        if !states::is_valid(state) {
            return Err(FetchError::UnsupportedState(state.to_string()));
        }

        let url = format!("{}/states/{}.json", self.base_url, state);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                state: state.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        let collection: FeatureCollection = serde_json::from_str(&body)?;

        let appointments: Vec<Appointment> = collection
            .features
            .into_iter()
            .map(Appointment::from_feature)
            .collect();
        tracing::debug!(
            state,
            count = appointments.len(),
            "fetched appointment records"
        );
        Ok(appointments)
    }
}
