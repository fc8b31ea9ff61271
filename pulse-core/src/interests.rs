use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::SourceConfig;
use crate::error::{InterestsError, ParseError, SubmissionError};
use crate::feedback::{AnalyticsEvent, AnalyticsHandle, FeedbackTransport};

pub const MIN_INTERESTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
}

const fn interest(id: &'static str, label: &'static str, emoji: &'static str) -> Interest {
    Interest { id, label, emoji }
}

pub const INTERESTS: &[Interest] = &[
    interest("cycling", "Cycling", "🚴"),
    interest("running", "Running", "🏃"),
    interest("restaurants", "Restaurants", "🍽️"),
    interest("travelling-by-road", "Travelling by Road", "🛣️"),
    interest("aviation", "Aviation", "✈️"),
    interest("art", "Art", "🎨"),
    interest("crypto", "Crypto", "₿"),
    interest("baking", "Baking", "🧁"),
    interest("botany", "Botany", "🌿"),
    interest("cars", "Cars", "🚗"),
    interest("real-estate", "Real Estate", "🏠"),
    interest("technology", "Technology", "📱"),
    interest("fashion", "Fashion", "👗"),
    interest("dogs", "Dogs", "🐕"),
    interest("birds", "Birds", "🐦"),
    interest("health-care", "Health care", "🏥"),
    interest("geography", "Geography", "🗺️"),
    interest("finance", "Finance", "💰"),
    interest("cats", "Cats", "🐱"),
    interest("lgbtq", "LGBTQ", "🏳️‍🌈"),
    interest("mental-health", "Mental Health", "🧠"),
    interest("programming", "Programming", "💻"),
    interest("cinema", "Cinema", "🎬"),
    interest("sports", "Sports", "⚽"),
    interest("travel", "Travel", "🧳"),
    interest("gaming", "Gaming", "🎮"),
    interest("photography", "Photography", "📸"),
    interest("design", "Design", "🎨"),
    interest("ufo", "UFO", "🛸"),
    interest("music", "Music", "🎵"),
];

pub fn find_interest(id: &str) -> Option<&'static Interest> {
    INTERESTS.iter().find(|interest| interest.id == id)
}

/// Interests picked by the user, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSelection {
    selected: Vec<&'static str>,
}

impl InterestSelection {
    /// Flips the selection of `id`; returns whether it is now selected.
    pub fn toggle(&mut self, id: &str) -> Result<bool, ParseError> {
        let interest = find_interest(id).ok_or_else(|| ParseError::new("interest", id))?;
        if let Some(pos) = self.selected.iter().position(|selected| *selected == interest.id) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(interest.id);
            Ok(true)
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|selected| *selected == id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn can_continue(&self) -> bool {
        self.selected.len() >= MIN_INTERESTS
    }

    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().map(|id| (*id).to_owned()).collect()
    }
}

#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn save_interests(&self, interests: &[String]) -> Result<(), SubmissionError>;
}

#[derive(Debug, Clone)]
pub struct MockInterestStore {
    latency: Duration,
}

impl MockInterestStore {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.interests_latency_ms),
        }
    }
}

#[async_trait]
impl InterestStore for MockInterestStore {
    async fn save_interests(&self, interests: &[String]) -> Result<(), SubmissionError> {
        tokio::time::sleep(self.latency).await;
        info!(?interests, "user interests saved");
        Ok(())
    }
}

/// Saves the selection, then reports it to analytics on the non-critical channel.
pub async fn submit_interests(
    store: &dyn InterestStore,
    transport: Arc<dyn FeedbackTransport>,
    selection: &InterestSelection,
) -> Result<AnalyticsHandle, InterestsError> {
    if !selection.can_continue() {
        return Err(InterestsError::TooFew {
            required: MIN_INTERESTS,
            selected: selection.len(),
        });
    }
    let interests = selection.ids();
    store.save_interests(&interests).await?;

    let count = interests.len();
    let event = AnalyticsEvent::InterestsSelected { interests, count };
    Ok(AnalyticsHandle::spawn(transport, event))
}
