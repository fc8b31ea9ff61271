//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{
    Alert, AlertSource, AnalyticsError, AnalyticsEvent, Category, CategoryFilter, FeedConfig,
    FeedController, FeedbackRecord, FeedbackSubmitter, FeedbackTransport, FetchError,
    SubmissionError,
};

/// Categories T W S T T W S T: four traffic, two weather, two safety.
pub fn mixed_batch(prefix: &str) -> Vec<Alert> {
    use Category::*;
    [Traffic, Weather, Safety, Traffic, Traffic, Weather, Safety, Traffic]
        .into_iter()
        .enumerate()
        .map(|(i, category)| {
            Alert::new(
                format!("{prefix}-{i}"),
                category,
                format!("{category} alert {i}"),
                "generated for tests",
            )
        })
        .collect()
}

/// Serves a fixed batch, narrowed by the requested filter, and records every call.
pub struct ScriptedSource {
    batch: Mutex<Vec<Alert>>,
    calls: Mutex<Vec<CategoryFilter>>,
    delay: Mutex<Duration>,
    delay_by_filter: Mutex<HashMap<CategoryFilter, Duration>>,
    failures: Mutex<VecDeque<FetchError>>,
}

impl ScriptedSource {
    pub fn new(batch: Vec<Alert>) -> Arc<Self> {
        Arc::new(Self {
            batch: Mutex::new(batch),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            delay_by_filter: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
        })
    }

    pub fn set_batch(&self, batch: Vec<Alert>) {
        *self.batch.lock().unwrap() = batch;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_delay_for(&self, filter: CategoryFilter, delay: Duration) {
        self.delay_by_filter.lock().unwrap().insert(filter, delay);
    }

    /// The next call fails with `err` (queued failures are consumed in order).
    pub fn push_failure(&self, err: FetchError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn calls(&self) -> Vec<CategoryFilter> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSource for ScriptedSource {
    async fn fetch_alerts(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError> {
        self.calls.lock().unwrap().push(filter);
        let delay = self
            .delay_by_filter
            .lock()
            .unwrap()
            .get(&filter)
            .copied()
            .unwrap_or_else(|| *self.delay.lock().unwrap());
        tokio::time::sleep(delay).await;

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self
            .batch
            .lock()
            .unwrap()
            .iter()
            .filter(|alert| filter.matches(alert.category))
            .cloned()
            .collect())
    }
}

/// Keeps every feedback record and analytics event it is handed.
#[derive(Default)]
pub struct RecordingTransport {
    feedback: Mutex<Vec<FeedbackRecord>>,
    analytics: Mutex<Vec<AnalyticsEvent>>,
    feedback_delay: Mutex<Duration>,
    fail_feedback: AtomicBool,
    fail_analytics: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_feedback_delay(&self, delay: Duration) {
        *self.feedback_delay.lock().unwrap() = delay;
    }

    pub fn fail_feedback(&self, fail: bool) {
        self.fail_feedback.store(fail, Ordering::SeqCst);
    }

    pub fn fail_analytics(&self, fail: bool) {
        self.fail_analytics.store(fail, Ordering::SeqCst);
    }

    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        self.feedback.lock().unwrap().clone()
    }

    pub fn analytics(&self) -> Vec<AnalyticsEvent> {
        self.analytics.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackTransport for RecordingTransport {
    async fn send_feedback(&self, record: &FeedbackRecord) -> Result<(), SubmissionError> {
        let delay = *self.feedback_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_feedback.load(Ordering::SeqCst) {
            return Err(SubmissionError::Rejected(
                record.alert_id.clone(),
                "feedback service down".into(),
            ));
        }
        self.feedback.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn send_analytics(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        if self.fail_analytics.load(Ordering::SeqCst) {
            return Err(AnalyticsError::Rejected("analytics service down".into()));
        }
        self.analytics.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn feed_config() -> FeedConfig {
    FeedConfig {
        refresh_interval_secs: 30,
        request_timeout_secs: 10,
        max_retries: 0,
        retry_backoff_ms: 500,
    }
}

pub fn controller(
    source: Arc<ScriptedSource>,
    transport: Arc<RecordingTransport>,
    config: FeedConfig,
) -> FeedController {
    FeedController::new(source, FeedbackSubmitter::new(transport), config)
}
