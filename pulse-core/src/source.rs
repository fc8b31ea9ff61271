use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::alert::{Alert, AlertId, Category, CategoryFilter, Coordinates, Severity};
use crate::config::{SourceConfig, MAX_BATCH_SIZE};
use crate::error::FetchError;

/// Supplies alerts on demand, optionally narrowed to one category.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch_alerts(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError>;
}

#[async_trait]
impl<S: AlertSource + ?Sized> AlertSource for Arc<S> {
    async fn fetch_alerts(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError> {
        (**self).fetch_alerts(filter).await
    }
}

struct Templates {
    titles: &'static [&'static str],
    descriptions: &'static [&'static str],
}

fn templates(category: Category) -> &'static Templates {
    const TRAFFIC: Templates = Templates {
        titles: &["Road Closed", "Heavy Traffic", "Accident Reported", "Construction Zone"],
        descriptions: &[
            "Main St blocked due to accident",
            "Delays on Outer Ring Road southbound",
            "Multi-vehicle collision on HSR Layout Main Road",
            "Road repair work in progress",
        ],
    };
    const WEATHER: Templates = Templates {
        titles: &["Thunderstorms", "Heavy Rain", "Flood Warning", "Weather Alert"],
        descriptions: &[
            "Severe storms expected in the area",
            "Flash flood warning issued",
            "Heavy rainfall affecting visibility",
            "Strong winds and hail possible",
        ],
    };
    const SAFETY: Templates = Templates {
        titles: &["Event Advisory", "Security Alert", "Public Notice", "Emergency Response"],
        descriptions: &[
            "Protest planned downtown",
            "Increased police presence",
            "Emergency drill in progress",
            "Public safety announcement",
        ],
    };

    match category {
        Category::Traffic => &TRAFFIC,
        Category::Weather => &WEATHER,
        Category::Safety => &SAFETY,
    }
}

/// Fabricates a fixed-size batch of alerts after a simulated network delay.
#[derive(Debug, Clone)]
pub struct MockAlertSource {
    batch_size: usize,
    latency: Duration,
    location: String,
    center: Coordinates,
    spread: f64,
}

impl MockAlertSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            latency: config.latency(),
            location: config.location.clone(),
            center: config.center,
            spread: config.spread_degrees,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Draws every category independently, then drops the ones the filter
    /// excludes, so filtered batches shrink rather than being topped up.
    pub fn generate_batch(&self, filter: CategoryFilter) -> Vec<Alert> {
        let mut rng = rand::thread_rng();
        (0..self.batch_size)
            .filter_map(|_| {
                let category = Category::ALL[rng.gen_range(0..Category::ALL.len())];
                filter
                    .matches(category)
                    .then(|| self.generate_alert(&mut rng, category))
            })
            .collect()
    }

    fn generate_alert(&self, rng: &mut impl Rng, category: Category) -> Alert {
        let table = templates(category);
        let title = table.titles.choose(&mut *rng).copied().unwrap_or("Alert");
        let description = table.descriptions.choose(&mut *rng).copied().unwrap_or("");
        let minutes: u32 = rng.gen_range(1..=60);
        let lat = self.center.lat + (rng.gen::<f64>() - 0.5) * self.spread;
        let lng = self.center.lng + (rng.gen::<f64>() - 0.5) * self.spread;

        let mut alert = Alert::new(
            AlertId::new(Uuid::new_v4().to_string()),
            category,
            title,
            description,
        );
        alert.location = self.location.clone();
        alert.age_label = format!("{minutes} mins ago");
        alert.coordinates = Coordinates { lat, lng };
        alert.severity = Severity::ALL[rng.gen_range(0..Severity::ALL.len())];
        alert
    }
}

impl Default for MockAlertSource {
    fn default() -> Self {
        Self::new(&SourceConfig::default())
    }
}

#[async_trait]
impl AlertSource for MockAlertSource {
    async fn fetch_alerts(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(FetchError::InvalidRequest(format!(
                "batch size {} outside 1..={MAX_BATCH_SIZE}",
                self.batch_size
            )));
        }
        tokio::time::sleep(self.latency).await;
        let alerts = self.generate_batch(filter);
        debug!(filter = %filter, count = alerts.len(), "generated mock alerts");
        Ok(alerts)
    }
}
