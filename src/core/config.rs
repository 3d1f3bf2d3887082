//! Configuration for the dashboard map and its data endpoints
//!
//! All structures deserialize from JSON with every field optional, so a
//! deployment only needs to spell out what differs from the defaults.

use crate::{core::geo::LatLng, MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dark/light flag read from the application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Theme {
    pub is_dark: bool,
}

impl Theme {
    pub fn dark() -> Self {
        Self { is_dark: true }
    }

    pub fn light() -> Self {
        Self { is_dark: false }
    }
}

/// Bounds and current value of the year filter.
///
/// Only used for display; no temporal slicing of the datasets is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i32,
    pub end: i32,
    pub current: i32,
}

impl TimeRange {
    pub fn new(start: i32, end: i32) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start,
            end,
            current: end,
        }
    }

    /// Moves the current year, clamped into `[start, end]`
    pub fn set_current(&mut self, year: i32) {
        self.current = year.clamp(self.start, self.end);
    }

    pub fn with_current(mut self, year: i32) -> Self {
        self.set_current(year);
        self
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(1990, 2024)
    }
}

/// Where the base datasets are fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetEndpoints {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl DatasetEndpoints {
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DatasetEndpoints {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Initial camera, style, theme and data endpoints of the dashboard map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub style_url: String,
    pub center: LatLng,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    pub theme: Theme,
    pub time_range: TimeRange,
    pub datasets: DatasetEndpoints,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style_url: "https://demotiles.maplibre.org/style.json".to_string(),
            // Mumbai
            center: LatLng::new(19.076, 72.8777),
            zoom: 9.0,
            bearing: 0.0,
            pitch: 0.0,
            theme: Theme::default(),
            time_range: TimeRange::default(),
            datasets: DatasetEndpoints::default(),
        }
    }
}

impl MapConfig {
    /// Parses and validates a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.center.is_valid() {
            return Err(MapError::Config(format!(
                "center out of range: {}, {}",
                self.center.lat, self.center.lng
            )));
        }
        if !(0.0..=24.0).contains(&self.zoom) {
            return Err(MapError::Config(format!("zoom {} outside 0..=24", self.zoom)));
        }
        if !(0.0..=85.0).contains(&self.pitch) {
            return Err(MapError::Config(format!("pitch {} outside 0..=85", self.pitch)));
        }
        if self.datasets.base_url.trim().is_empty() {
            return Err(MapError::Config("dataset base_url is empty".to_string()));
        }
        if self.time_range.start > self.time_range.end {
            return Err(MapError::Config(format!(
                "time range start {} after end {}",
                self.time_range.start, self.time_range.end
            )));
        }
        Ok(())
    }
}
