use crate::config::GeocodeConfig;
use crate::error::{LocatorError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A single geocoding candidate returned by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub latitude: f64,
    pub longitude: f64,
}

/// External coordinate lookup. Zero candidates is a reportable outcome of a
/// successful call, distinct from a transport or auth failure.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Vec<Candidate>>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Geocoder against a Google-style `/maps/api/geocode/json` endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Candidate>> {
        debug!("Geocoding address: {}", address);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let body: GeocodeResponse = response.json().await?;
        match body.status.as_str() {
            "OK" => Ok(body
                .results
                .iter()
                .map(|result| Candidate {
                    latitude: result.geometry.location.lat,
                    longitude: result.geometry.location.lng,
                })
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(LocatorError::Api {
                message: body
                    .error_message
                    .unwrap_or_else(|| format!("provider returned status {other}")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_response() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "results": [
                    {"geometry": {"location": {"lat": 47.6062, "lng": -122.3321}}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(body.status, "OK");
        assert_eq!(body.results[0].geometry.location.lat, 47.6062);
    }

    #[test]
    fn zero_results_parses_without_results_field() {
        let body: GeocodeResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS"}"#).unwrap();
        assert!(body.results.is_empty());
        assert!(body.error_message.is_none());
    }
}
