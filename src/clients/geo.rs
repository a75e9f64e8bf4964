use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

const IPGEOLOCATION_URL: &str = "https://api.ipgeolocation.io/ipgeo";

/// Geolocator
///
/// Resolves a client IP address to a latitude/longitude pair.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self, ip: &str) -> AppResult<(f64, f64)>;
}

pub type GeolocatorState = Arc<dyn Geolocator>;

// ipgeolocation.io returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct IpGeoResponse {
    latitude: String,
    longitude: String,
}

#[derive(Clone)]
pub struct IpGeolocationClient {
    http: reqwest::Client,
    api_key: String,
}

impl IpGeolocationClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Geolocator for IpGeolocationClient {
    async fn locate(&self, ip: &str) -> AppResult<(f64, f64)> {
        let response = self
            .http
            .get(IPGEOLOCATION_URL)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("ip", ip),
                ("fields", "latitude,longitude"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "ipgeolocation returned {}",
                response.status()
            )));
        }

        let location: IpGeoResponse = response.json().await?;
        let lat = location
            .latitude
            .parse::<f64>()
            .map_err(|_| AppError::Upstream("ipgeolocation returned a bad latitude".to_string()))?;
        let lng = location
            .longitude
            .parse::<f64>()
            .map_err(|_| AppError::Upstream("ipgeolocation returned a bad longitude".to_string()))?;
        Ok((lat, lng))
    }
}
