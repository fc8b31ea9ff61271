use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alert::{Alert, AlertId, Category, Verdict};
use crate::config::SourceConfig;
use crate::error::{AnalyticsError, SubmissionError};

/// Body of `POST /feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub alert_id: AlertId,
    #[serde(rename = "type")]
    pub verdict: Verdict,
    pub alert_type: Category,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(alert: &Alert, verdict: Verdict) -> Self {
        Self {
            alert_id: alert.id.clone(),
            verdict,
            alert_type: alert.category,
            timestamp: Utc::now(),
        }
    }
}

/// Body of `POST /analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    AlertFeedback {
        #[serde(rename = "alertId")]
        alert_id: AlertId,
        feedback: Verdict,
        #[serde(rename = "alertType")]
        alert_type: Category,
    },
    InterestsSelected {
        interests: Vec<String>,
        count: usize,
    },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AlertFeedback { .. } => "alert_feedback",
            Self::InterestsSelected { .. } => "interests_selected",
        }
    }
}

#[async_trait]
pub trait FeedbackTransport: Send + Sync {
    async fn send_feedback(&self, record: &FeedbackRecord) -> Result<(), SubmissionError>;
    async fn send_analytics(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Accepts everything after a short delay and logs what it was given.
#[derive(Debug, Clone)]
pub struct MockFeedbackTransport {
    feedback_latency: Duration,
    analytics_latency: Duration,
}

impl MockFeedbackTransport {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            feedback_latency: Duration::from_millis(config.feedback_latency_ms),
            analytics_latency: Duration::from_millis(config.analytics_latency_ms),
        }
    }
}

impl Default for MockFeedbackTransport {
    fn default() -> Self {
        Self::new(&SourceConfig::default())
    }
}

#[async_trait]
impl FeedbackTransport for MockFeedbackTransport {
    async fn send_feedback(&self, record: &FeedbackRecord) -> Result<(), SubmissionError> {
        tokio::time::sleep(self.feedback_latency).await;
        info!(
            alert_id = %record.alert_id,
            verdict = %record.verdict,
            alert_type = %record.alert_type,
            "feedback submitted"
        );
        Ok(())
    }

    async fn send_analytics(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        tokio::time::sleep(self.analytics_latency).await;
        info!(event = event.name(), payload = ?event, "analytics event");
        Ok(())
    }
}

/// Result of the secondary analytics step. Dropping it detaches the task;
/// awaiting [`AnalyticsHandle::outcome`] reports what happened.
#[derive(Debug)]
pub struct AnalyticsHandle {
    join: JoinHandle<Result<(), AnalyticsError>>,
}

impl AnalyticsHandle {
    pub(crate) fn spawn(transport: Arc<dyn FeedbackTransport>, event: AnalyticsEvent) -> Self {
        let join = tokio::spawn(async move {
            let result = transport.send_analytics(&event).await;
            if let Err(err) = &result {
                warn!(event = event.name(), error = %err, "analytics event dropped");
            }
            result
        });
        Self { join }
    }

    pub async fn outcome(self) -> Result<(), AnalyticsError> {
        self.join.await?
    }
}

#[derive(Debug)]
pub struct Submission {
    pub record: FeedbackRecord,
    pub analytics: AnalyticsHandle,
}

#[derive(Clone)]
pub struct FeedbackSubmitter {
    transport: Arc<dyn FeedbackTransport>,
}

impl FeedbackSubmitter {
    pub fn new(transport: Arc<dyn FeedbackTransport>) -> Self {
        Self { transport }
    }

    /// Sends the feedback record; once it is acknowledged the analytics event
    /// goes out on its own task and cannot fail the submission.
    pub async fn submit(&self, alert: &Alert, verdict: Verdict) -> Result<Submission, SubmissionError> {
        let record = FeedbackRecord::new(alert, verdict);
        self.transport.send_feedback(&record).await?;
        info!(alert_id = %alert.id, verdict = %verdict, "feedback recorded");

        let event = AnalyticsEvent::AlertFeedback {
            alert_id: alert.id.clone(),
            feedback: verdict,
            alert_type: alert.category,
        };
        let analytics = AnalyticsHandle::spawn(self.transport.clone(), event);
        Ok(Submission { record, analytics })
    }
}

impl std::fmt::Debug for FeedbackSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSubmitter").finish_non_exhaustive()
    }
}
