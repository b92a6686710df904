// src/core/services/geo.rs

use crate::core::models::GeoInfo;
use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

const GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Wire format of an ip-api.com response.
#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, rename = "regionName")]
    region: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the ip-api.com geolocation service.
pub struct GeoClient {
    http: reqwest::Client,
}

impl GeoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Looks up country/region/city/ISP for a hosting IP.
    pub async fn lookup(&self, ip: Ipv4Addr) -> Result<GeoInfo> {
        let url = format!("{GEO_ENDPOINT}/{ip}");
        debug!(ip = %ip, "Looking up IP geolocation.");

        let response: GeoApiResponse = self.http.get(&url).send().await?.json().await?;
        if response.status != "success" {
            let message = response.message.unwrap_or_else(|| "unknown".to_string());
            warn!(ip = %ip, message = %message, "Geolocation lookup rejected.");
            return Err(eyre!("geolocation lookup failed: {message}"));
        }

        Ok(GeoInfo {
            country: response.country,
            region: response.region,
            city: response.city,
            isp: response.isp,
        })
    }
}
