//! The external zmanim provider interface.
//!
//! The engine never computes marker timestamps itself; it asks a provider for
//! one calendar day's worth. [`MarkerProvider`] is the seam (tests inject
//! in-process fakes) and [`HebcalProvider`] is the production implementation
//! against the Hebcal Zmanim JSON API:
//!
//! ```text
//! GET {base}/zmanim?cfg=json&geonameid={id}&date={YYYY-MM-DD}
//! ```
//!
//! The response's `times` object maps marker names to ISO-8601 timestamps.
//! It carries many more markers than the 13 we drive; unknown keys are
//! dropped and a subset is accepted. Requests run with a bounded timeout so
//! a hung provider cannot wedge the daily fetch task, and the caller holds no
//! store lock while the request is in flight.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

use crate::zman::{MarkerSet, Zman};

/// Default provider endpoint; the service the original deployment used.
pub const DEFAULT_PROVIDER_URL: &str = "https://www.hebcal.com";

/// Request timeout for a single fetch.
const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Source of one day's marker timestamps for a fixed location.
#[async_trait]
pub trait MarkerProvider: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<MarkerSet>;
}

/// Hebcal Zmanim API client for a single geoname location.
pub struct HebcalProvider {
    client: reqwest::Client,
    base_url: String,
    geonameid: u32,
}

/// The subset of the provider response we read; everything else is ignored.
#[derive(Debug, Deserialize)]
struct ZmanimResponse {
    times: BTreeMap<String, DateTime<FixedOffset>>,
}

impl HebcalProvider {
    pub fn new(base_url: impl Into<String>, geonameid: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            geonameid,
        })
    }

    fn url(&self, date: NaiveDate) -> String {
        format!(
            "{}/zmanim?cfg=json&geonameid={}&date={}",
            self.base_url.trim_end_matches('/'),
            self.geonameid,
            date.format("%Y-%m-%d")
        )
    }
}

#[async_trait]
impl MarkerProvider for HebcalProvider {
    async fn fetch(&self, date: NaiveDate) -> Result<MarkerSet> {
        let url = self.url(date);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("zmanim request failed: {url}"))?
            .error_for_status()
            .context("zmanim request returned an error status")?;

        let parsed: ZmanimResponse = response
            .json()
            .await
            .context("zmanim response was not the expected JSON shape")?;

        let mut markers = MarkerSet::new(date);
        for (key, time) in parsed.times {
            if let Some(zman) = Zman::from_key(&key) {
                markers.times.insert(zman, time.with_timezone(&Utc));
            }
        }
        Ok(markers)
    }
}
