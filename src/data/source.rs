//! Dataset loading: the `DataSource` contract and its HTTP and in-memory
//! implementations.

use crate::{
    core::config::DatasetEndpoints,
    data::geojson::FeatureCollection,
    prelude::{HashMap, HashSet},
    MapError, Result,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The base datasets of the dashboard, fetched together as one load group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetName {
    Tehsils,
    Contours,
    MetroLine,
    MetroStations,
    RailwayLine,
    RailwayStations,
}

impl DatasetName {
    pub const ALL: [DatasetName; 6] = [
        DatasetName::Tehsils,
        DatasetName::Contours,
        DatasetName::MetroLine,
        DatasetName::MetroStations,
        DatasetName::RailwayLine,
        DatasetName::RailwayStations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::Tehsils => "tehsils",
            DatasetName::Contours => "contours",
            DatasetName::MetroLine => "metro-line",
            DatasetName::MetroStations => "metro-stations",
            DatasetName::RailwayLine => "railway-line",
            DatasetName::RailwayStations => "railway-stations",
        }
    }

    /// Path of the dataset below the API base URL
    pub fn path(&self) -> String {
        match self {
            DatasetName::Tehsils | DatasetName::Contours => format!("geojson/{}", self.as_str()),
            _ => format!("geojson/transport/{}", self.as_str()),
        }
    }

    /// Id of the map source the dataset is registered under
    pub fn source_id(&self) -> &'static str {
        match self {
            DatasetName::Tehsils => "tehsils",
            DatasetName::Contours => "contours",
            DatasetName::MetroLine => "metroLine",
            DatasetName::MetroStations => "metroStations",
            DatasetName::RailwayLine => "railwayLine",
            DatasetName::RailwayStations => "railwayStations",
        }
    }
}

impl std::fmt::Display for DatasetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful load group, ordered by dataset
pub type LoadedDatasets = BTreeMap<DatasetName, FeatureCollection>;

/// Supplies named FeatureCollections on demand
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch a single dataset
    async fn fetch(&self, name: DatasetName) -> Result<FeatureCollection>;

    /// Fetch every requested dataset concurrently.
    ///
    /// All-or-nothing: the first failure fails the whole group and no
    /// partial result is returned.
    async fn load(&self, names: &[DatasetName]) -> Result<LoadedDatasets> {
        let fetches = names.iter().map(|name| async move {
            let collection = self.fetch(*name).await.map_err(|e| {
                log::warn!("dataset {} failed: {}", name, e);
                e
            })?;
            Ok::<_, MapError>((*name, collection))
        });

        let loaded = futures::future::try_join_all(fetches).await?;
        Ok(loaded.into_iter().collect())
    }
}

/// Shared HTTP client; building it once avoids per-request TLS and pool setup.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("geodash/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
});

/// Fetches datasets from the dashboard's GeoJSON API
pub struct HttpDataSource {
    endpoints: DatasetEndpoints,
}

impl HttpDataSource {
    pub fn new(endpoints: DatasetEndpoints) -> Self {
        Self { endpoints }
    }

    pub fn url_for(&self, name: DatasetName) -> String {
        self.endpoints.url_for(&name.path())
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, name: DatasetName) -> Result<FeatureCollection> {
        let url = self.url_for(name);
        log::debug!("fetching dataset {} from {}", name, url);

        let load_error = |reason: String| MapError::DataLoad {
            dataset: name.to_string(),
            reason,
        };

        let response = HTTP_CLIENT
            .get(&url)
            .timeout(self.endpoints.timeout())
            .send()
            .await
            .map_err(|e| load_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(load_error(format!("HTTP {}", response.status())));
        }

        let body = response.text().await.map_err(|e| load_error(e.to_string()))?;
        let collection = FeatureCollection::from_str(&body)?;
        log::info!("dataset {} loaded ({} features)", name, collection.len());
        Ok(collection)
    }
}

/// In-memory datasets, optionally slowed down or made to fail
#[derive(Default)]
pub struct StaticDataSource {
    datasets: HashMap<DatasetName, FeatureCollection>,
    failing: HashSet<DatasetName>,
    latency: Duration,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled demo data set (Delhi tehsils and transit network)
    pub fn mock() -> Result<Self> {
        let raw = [
            (DatasetName::Tehsils, include_str!("../../data/mock/tehsils.geojson")),
            (DatasetName::Contours, include_str!("../../data/mock/contours.geojson")),
            (DatasetName::MetroLine, include_str!("../../data/mock/metro-line.geojson")),
            (DatasetName::MetroStations, include_str!("../../data/mock/metro-stations.geojson")),
            (DatasetName::RailwayLine, include_str!("../../data/mock/railway-line.geojson")),
            (DatasetName::RailwayStations, include_str!("../../data/mock/railway-stations.geojson")),
        ];

        let mut source = Self::new();
        for (name, text) in raw {
            source = source.with_dataset(name, FeatureCollection::from_str(text)?);
        }
        Ok(source)
    }

    pub fn with_dataset(mut self, name: DatasetName, collection: FeatureCollection) -> Self {
        self.datasets.insert(name, collection);
        self
    }

    /// Makes every fetch of `name` fail
    pub fn fail_on(mut self, name: DatasetName) -> Self {
        self.failing.insert(name);
        self
    }

    /// Delays every fetch, mimicking a slow backend
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    async fn fetch(&self, name: DatasetName) -> Result<FeatureCollection> {
        #[cfg(feature = "tokio-runtime")]
        {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
        }

        if self.failing.contains(&name) {
            return Err(MapError::DataLoad {
                dataset: name.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.datasets
            .get(&name)
            .cloned()
            .ok_or_else(|| MapError::DataLoad {
                dataset: name.to_string(),
                reason: "no such dataset".to_string(),
            })
    }
}
