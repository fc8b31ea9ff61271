use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alert::Coordinates;
use crate::config::SourceConfig;

pub const KNOWN_AREAS: &[&str] = &[
    "HSR Layout, Bengaluru",
    "Koramangala, Bengaluru",
    "Indiranagar, Bengaluru",
    "Whitefield, Bengaluru",
    "Electronic City, Bengaluru",
];

const AREA_SPREAD_DEGREES: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMatch {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Looks up Bengaluru areas by name for the location search box.
#[derive(Debug, Clone)]
pub struct LocationDirectory {
    latency: Duration,
    center: Coordinates,
}

impl LocationDirectory {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.search_latency_ms),
            center: config.center,
        }
    }

    pub async fn search(&self, query: &str) -> Vec<LocationMatch> {
        tokio::time::sleep(self.latency).await;
        let matches = self.matching(query);
        debug!(query, count = matches.len(), "location search");
        matches
    }

    fn matching(&self, query: &str) -> Vec<LocationMatch> {
        let needle = query.trim().to_lowercase();
        let mut rng = rand::thread_rng();
        KNOWN_AREAS
            .iter()
            .filter(|area| area.to_lowercase().contains(&needle))
            .map(|area| LocationMatch {
                name: (*area).to_owned(),
                coordinates: Coordinates {
                    lat: self.center.lat + (rng.gen::<f64>() - 0.5) * AREA_SPREAD_DEGREES,
                    lng: self.center.lng + (rng.gen::<f64>() - 0.5) * AREA_SPREAD_DEGREES,
                },
            })
            .collect()
    }
}

impl Default for LocationDirectory {
    fn default() -> Self {
        Self::new(&SourceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_case_insensitive_substring() {
        let directory = LocationDirectory::default();
        let names: Vec<_> = directory
            .matching("  KORA")
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Koramangala, Bengaluru"]);
    }

    #[test]
    fn empty_query_lists_every_area() {
        let directory = LocationDirectory::default();
        assert_eq!(directory.matching("").len(), KNOWN_AREAS.len());
        assert!(directory.matching("mysuru").is_empty());
    }

    #[test]
    fn coordinates_stay_near_the_city_centre() {
        let directory = LocationDirectory::default();
        for found in directory.matching("bengaluru") {
            assert!((found.coordinates.lat - 12.9121).abs() <= 0.05);
            assert!((found.coordinates.lng - 77.6446).abs() <= 0.05);
        }
    }
}
