use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::alert::{Alert, CategoryFilter};
use crate::error::{AnalyticsError, ConfigError, FetchError, SubmissionError};
use crate::feedback::{AnalyticsEvent, FeedbackRecord, FeedbackTransport};
use crate::interests::InterestStore;
use crate::source::AlertSource;

/// Talks to a real Pulse backend:
/// `GET alerts`, `POST feedback`, `POST analytics` and
/// `POST preferences/interests`, all relative to the base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    alerts_url: Url,
    feedback_url: Url,
    analytics_url: Url,
    interests_url: Url,
}

#[derive(Serialize)]
struct InterestsBody<'a> {
    interests: &'a [String],
}

impl HttpBackend {
    pub fn new(client: Client, base_url: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url)
            .map_err(|err| ConfigError::Invalid(format!("backend.base_url: {err}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let join = |path: &str| {
            base.join(path)
                .map_err(|err| ConfigError::Invalid(format!("backend endpoint {path}: {err}")))
        };

        Ok(Self {
            alerts_url: join("alerts")?,
            feedback_url: join("feedback")?,
            analytics_url: join("analytics")?,
            interests_url: join("preferences/interests")?,
            client,
        })
    }
}

#[async_trait]
impl AlertSource for HttpBackend {
    async fn fetch_alerts(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError> {
        let mut request = self.client.get(self.alerts_url.clone());
        if let Some(category) = filter.category() {
            request = request.query(&[("type", category.as_str())]);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let alerts: Vec<Alert> = response.json().await?;
        let total = alerts.len();
        let alerts: Vec<Alert> = alerts
            .into_iter()
            .filter(|alert| filter.matches(alert.category))
            .collect();
        if alerts.len() != total {
            debug!(filter = %filter, dropped = total - alerts.len(), "backend returned alerts outside the filter");
        }
        Ok(alerts)
    }
}

#[async_trait]
impl FeedbackTransport for HttpBackend {
    async fn send_feedback(&self, record: &FeedbackRecord) -> Result<(), SubmissionError> {
        let response = self
            .client
            .post(self.feedback_url.clone())
            .json(record)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Status(status));
        }
        Ok(())
    }

    async fn send_analytics(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let response = self
            .client
            .post(self.analytics_url.clone())
            .json(event)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalyticsError::Status(status));
        }
        Ok(())
    }
}

#[async_trait]
impl InterestStore for HttpBackend {
    async fn save_interests(&self, interests: &[String]) -> Result<(), SubmissionError> {
        let response = self
            .client
            .post(self.interests_url.clone())
            .json(&InterestsBody { interests })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Status(status));
        }
        Ok(())
    }
}
