use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertId, Category, CategoryFilter, Verdict};
use crate::config::FeedConfig;
use crate::error::{ControllerError, FetchError, SubmissionError};
use crate::feedback::{AnalyticsHandle, FeedbackSubmitter};
use crate::source::AlertSource;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Ready,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Background,
    Manual,
}

/// The feed as the presentation layer sees it.
#[derive(Debug, Clone)]
pub struct FeedState {
    items: Vec<Alert>,
    active_filter: CategoryFilter,
    phase: FeedPhase,
    refresh_trigger: Option<RefreshTrigger>,
    feedback_count: u64,
    last_error: Option<String>,
    pending_feedback: HashSet<AlertId>,
    latest_request: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            active_filter: CategoryFilter::All,
            phase: FeedPhase::Idle,
            refresh_trigger: None,
            feedback_count: 0,
            last_error: None,
            pending_feedback: HashSet::new(),
            latest_request: 0,
        }
    }
}

impl FeedState {
    /// Alerts in arrival order, unfiltered.
    pub fn items(&self) -> &[Alert] {
        &self.items
    }

    pub fn active_filter(&self) -> CategoryFilter {
        self.active_filter
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == FeedPhase::Loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase == FeedPhase::Refreshing
    }

    pub fn refresh_trigger(&self) -> Option<RefreshTrigger> {
        self.refresh_trigger
    }

    pub fn feedback_count(&self) -> u64 {
        self.feedback_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_submitting(&self, alert_id: &AlertId) -> bool {
        self.pending_feedback.contains(alert_id)
    }

    pub fn find(&self, alert_id: &AlertId) -> Option<&Alert> {
        self.items.iter().find(|alert| &alert.id == alert_id)
    }

    /// Alerts matching the active filter.
    pub fn visible(&self) -> impl Iterator<Item = &Alert> + '_ {
        let filter = self.active_filter;
        self.items
            .iter()
            .filter(move |alert| filter.matches(alert.category))
    }

    pub fn count_for(&self, filter: CategoryFilter) -> usize {
        self.items
            .iter()
            .filter(|alert| filter.matches(alert.category))
            .count()
    }

    pub fn category_counts(&self) -> [(Category, usize); 3] {
        Category::ALL.map(|category| (category, self.count_for(category.into())))
    }

    /// Sets the verdict on an unanswered alert. Unknown and already answered
    /// alerts are left as they are.
    pub fn apply_feedback(&mut self, alert_id: &AlertId, verdict: Verdict) -> bool {
        let Some(alert) = self.items.iter_mut().find(|alert| &alert.id == alert_id) else {
            return false;
        };
        if !alert.record_feedback(verdict) {
            return false;
        }
        self.feedback_count += 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    PhaseChanged(FeedPhase),
    AlertsReplaced {
        filter: CategoryFilter,
        count: usize,
    },
    FetchFailed {
        filter: CategoryFilter,
        message: String,
    },
    FeedbackApplied {
        alert_id: AlertId,
        verdict: Verdict,
    },
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// The batch replaced the feed's items.
    Applied { count: usize },
    /// The fetch failed; the last good items were kept.
    Failed(FetchError),
    /// A newer request was issued while this one was in flight.
    Stale,
    /// Another fetch was already in flight, so this refresh never started.
    Skipped,
    Disposed,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug)]
pub enum FeedbackOutcome {
    Recorded {
        applied: bool,
        analytics: AnalyticsHandle,
    },
    AlreadyAnswered,
    InFlight,
    UnknownAlert,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Load(CategoryFilter),
    Refresh(RefreshTrigger),
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    token: u64,
    filter: CategoryFilter,
}

struct Shared {
    source: Arc<dyn AlertSource>,
    submitter: FeedbackSubmitter,
    config: FeedConfig,
    state: RwLock<FeedState>,
    disposed: AtomicBool,
    events: broadcast::Sender<FeedEvent>,
}

impl Shared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn emit(&self, event: FeedEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_phase(&self, state: &mut FeedState, phase: FeedPhase) {
        if state.phase != phase {
            state.phase = phase;
            self.emit(FeedEvent::PhaseChanged(phase));
        }
    }

    /// Issues a request token together with the phase transition it implies.
    async fn begin(&self, request: Request) -> Result<Ticket, FetchOutcome> {
        let mut state = self.state.write().await;
        if self.is_disposed() {
            return Err(FetchOutcome::Disposed);
        }
        match request {
            Request::Load(filter) => {
                state.active_filter = filter;
                state.refresh_trigger = None;
                self.set_phase(&mut state, FeedPhase::Loading);
            }
            Request::Refresh(trigger) => {
                if matches!(state.phase, FeedPhase::Loading | FeedPhase::Refreshing) {
                    debug!(?trigger, "fetch already in flight, skipping refresh");
                    return Err(FetchOutcome::Skipped);
                }
                state.refresh_trigger = Some(trigger);
                self.set_phase(&mut state, FeedPhase::Refreshing);
            }
        }
        state.latest_request += 1;
        Ok(Ticket {
            token: state.latest_request,
            filter: state.active_filter,
        })
    }

    async fn complete(&self, mut guard: InFlight, result: Result<Vec<Alert>, FetchError>) -> FetchOutcome {
        let mut state = self.state.write().await;
        guard.armed = false;
        let ticket = guard.ticket;
        if self.is_disposed() {
            debug!(token = ticket.token, "controller disposed, dropping alert response");
            return FetchOutcome::Disposed;
        }
        if ticket.token != state.latest_request {
            debug!(
                token = ticket.token,
                latest = state.latest_request,
                filter = %ticket.filter,
                "discarding stale alert response"
            );
            return FetchOutcome::Stale;
        }

        state.refresh_trigger = None;
        self.set_phase(&mut state, FeedPhase::Ready);
        match result {
            Ok(alerts) => {
                let count = alerts.len();
                state.items = alerts;
                state.last_error = None;
                self.emit(FeedEvent::AlertsReplaced {
                    filter: ticket.filter,
                    count,
                });
                FetchOutcome::Applied { count }
            }
            Err(err) => {
                warn!(filter = %ticket.filter, error = %err, "failed to fetch alerts");
                let message = err.to_string();
                state.last_error = Some(message.clone());
                self.emit(FeedEvent::FetchFailed {
                    filter: ticket.filter,
                    message,
                });
                FetchOutcome::Failed(err)
            }
        }
    }

    async fn fetch(&self, filter: CategoryFilter) -> Result<Vec<Alert>, FetchError> {
        let timeout = self.config.request_timeout();
        let mut attempt: u32 = 0;
        loop {
            let result = match tokio::time::timeout(timeout, self.source.fetch_alerts(filter)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            };
            match result {
                Err(err) if err.is_transient() && attempt < u32::from(self.config.max_retries) => {
                    let delay = self.config.backoff_for(attempt);
                    attempt += 1;
                    warn!(attempt, ?delay, filter = %filter, error = %err, "alert fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Returns a fetch whose caller went away to `Ready`, unless a newer
    /// request has taken over the feed since.
    fn abandon(&self, state: &mut FeedState, token: u64) {
        if self.is_disposed() || state.latest_request != token {
            return;
        }
        if matches!(state.phase, FeedPhase::Loading | FeedPhase::Refreshing) {
            debug!(token, "alert fetch cancelled, keeping current items");
            state.refresh_trigger = None;
            self.set_phase(state, FeedPhase::Ready);
        }
    }

    async fn run(self: &Arc<Self>, request: Request) -> FetchOutcome {
        let ticket = match self.begin(request).await {
            Ok(ticket) => ticket,
            Err(outcome) => return outcome,
        };
        let guard = InFlight {
            shared: Arc::clone(self),
            ticket,
            armed: true,
        };
        let result = self.fetch(ticket.filter).await;
        self.complete(guard, result).await
    }

    async fn load(self: &Arc<Self>, filter: CategoryFilter) -> FetchOutcome {
        self.run(Request::Load(filter)).await
    }

    async fn refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> FetchOutcome {
        self.run(Request::Refresh(trigger)).await
    }

    fn apply_feedback_locked(&self, state: &mut FeedState, alert_id: &AlertId, verdict: Verdict) -> bool {
        if self.is_disposed() || !state.apply_feedback(alert_id, verdict) {
            return false;
        }
        self.emit(FeedEvent::FeedbackApplied {
            alert_id: alert_id.clone(),
            verdict,
        });
        true
    }

    async fn apply_feedback(&self, alert_id: &AlertId, verdict: Verdict) -> bool {
        let mut state = self.state.write().await;
        self.apply_feedback_locked(&mut state, alert_id, verdict)
    }
}

/// Held across a fetch. If the fetch future is dropped before its result is
/// applied, the phase it set is rolled back.
struct InFlight {
    shared: Arc<Shared>,
    ticket: Ticket,
    armed: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let token = self.ticket.token;
        if let Ok(mut state) = self.shared.state.try_write() {
            self.shared.abandon(&mut state, token);
            return;
        }
        // The lock is busy; finish the rollback once it frees up.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move {
                let mut state = shared.state.write().await;
                shared.abandon(&mut state, token);
            });
        }
    }
}

/// Clears an alert's in-flight marker if its submission future is dropped
/// before the outcome is applied.
struct PendingFeedback {
    shared: Arc<Shared>,
    alert_id: Option<AlertId>,
}

impl Drop for PendingFeedback {
    fn drop(&mut self) {
        let Some(alert_id) = self.alert_id.take() else {
            return;
        };
        if let Ok(mut state) = self.shared.state.try_write() {
            state.pending_feedback.remove(&alert_id);
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move {
                shared.state.write().await.pending_feedback.remove(&alert_id);
            });
        }
    }
}

pub struct RefreshHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(self) -> Result<(), ControllerError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(ControllerError::from)
    }

    fn abort(self) {
        self.join.abort();
    }
}

fn spawn_refresher(shared: Arc<Shared>, interval: Duration) -> RefreshHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(?interval, "alert refresher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.recv() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = cancel_rx.recv() => break,
                        _ = shared.refresh(RefreshTrigger::Background) => {}
                    }
                }
            }
        }
        info!("alert refresher stopped");
    });

    RefreshHandle { cancel_tx, join }
}

/// Owns the feed state and keeps it fresh.
///
/// Every fetch takes a request token when it starts; only the completion
/// holding the latest token may touch the feed, so a slow response for an
/// old filter can never overwrite a newer one.
pub struct FeedController {
    shared: Arc<Shared>,
    refresher: Option<RefreshHandle>,
}

impl FeedController {
    pub fn new(source: Arc<dyn AlertSource>, submitter: FeedbackSubmitter, config: FeedConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Shared {
            source,
            submitter,
            config,
            state: RwLock::new(FeedState::default()),
            disposed: AtomicBool::new(false),
            events,
        };
        Self {
            shared: Arc::new(shared),
            refresher: None,
        }
    }

    /// Starts the background refresher and performs the initial unfiltered load.
    pub async fn start(&mut self) -> FetchOutcome {
        if self.refresher.is_none() {
            let interval = self.shared.config.refresh_interval();
            self.refresher = Some(spawn_refresher(self.shared.clone(), interval));
        }
        self.shared.load(CategoryFilter::All).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> FeedState {
        self.shared.state.read().await.clone()
    }

    pub async fn visible_alerts(&self) -> Vec<Alert> {
        self.shared.state.read().await.visible().cloned().collect()
    }

    pub async fn set_filter(&self, filter: CategoryFilter) -> FetchOutcome {
        self.shared.load(filter).await
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.shared.refresh(RefreshTrigger::Manual).await
    }

    pub async fn apply_feedback(&self, alert_id: &AlertId, verdict: Verdict) -> bool {
        self.shared.apply_feedback(alert_id, verdict).await
    }

    /// Sends feedback for one alert and applies it once the backend accepts it.
    ///
    /// Alerts that are unknown, already answered or mid-submission are
    /// answered without contacting the backend.
    pub async fn submit_feedback(
        &self,
        alert_id: &AlertId,
        verdict: Verdict,
    ) -> Result<FeedbackOutcome, SubmissionError> {
        let alert = {
            let mut state = self.shared.state.write().await;
            let alert = match state.find(alert_id) {
                None => return Ok(FeedbackOutcome::UnknownAlert),
                Some(alert) if alert.feedback().is_some() => {
                    return Ok(FeedbackOutcome::AlreadyAnswered)
                }
                Some(alert) => alert.clone(),
            };
            if !state.pending_feedback.insert(alert_id.clone()) {
                return Ok(FeedbackOutcome::InFlight);
            }
            alert
        };
        let mut pending = PendingFeedback {
            shared: Arc::clone(&self.shared),
            alert_id: Some(alert_id.clone()),
        };

        let result = self.shared.submitter.submit(&alert, verdict).await;
        // Clearing the marker and applying the verdict share one guard, so no
        // other caller can see the alert unanswered and not in flight between them.
        let mut state = self.shared.state.write().await;
        pending.alert_id = None;
        state.pending_feedback.remove(alert_id);

        match result {
            Ok(submission) => {
                let applied = self.shared.apply_feedback_locked(&mut state, alert_id, verdict);
                Ok(FeedbackOutcome::Recorded {
                    applied,
                    analytics: submission.analytics,
                })
            }
            Err(err) => {
                warn!(alert_id = %alert_id, verdict = %verdict, error = %err, "feedback submission failed");
                Err(err)
            }
        }
    }

    /// Stops the refresher and waits for it to exit. Fetches still in flight
    /// complete without touching the feed.
    pub async fn dispose(mut self) -> Result<(), ControllerError> {
        self.shared.disposed.store(true, Ordering::Release);
        match self.refresher.take() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::Release);
        if let Some(handle) = self.refresher.take() {
            handle.abort();
        }
    }
}
