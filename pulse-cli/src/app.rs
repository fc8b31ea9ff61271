use std::sync::Arc;

use pulse_core::{
    submit_interests, AlertId, AlertSource, CategoryFilter, ControllerError, FeedController,
    FeedEvent, FeedPhase, FeedbackOutcome, FeedbackSubmitter, FeedbackTransport, FetchOutcome,
    InterestSelection, InterestStore, LocationDirectory, PulseConfig, RefreshTrigger, Verdict,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::view;

pub struct Backend {
    pub source: Arc<dyn AlertSource>,
    pub transport: Arc<dyn FeedbackTransport>,
    pub interests: Arc<dyn InterestStore>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Filter(CategoryFilter),
    Refresh,
    List,
    Rate(String, Verdict),
    Interests,
    Pick(Vec<String>),
    SaveInterests,
    Search(String),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let command = match head.to_ascii_lowercase().as_str() {
        "all" | "traffic" | "weather" | "safety" => {
            Command::Filter(head.parse().map_err(|err| format!("{err}"))?)
        }
        "filter" => match rest.first() {
            Some(value) => Command::Filter(value.parse().map_err(|err| format!("{err}"))?),
            None => return Err("usage: filter <all|traffic|weather|safety>".to_owned()),
        },
        "refresh" | "r" => Command::Refresh,
        "list" | "ls" => Command::List,
        "like" | "dislike" => {
            let verdict: Verdict = head.parse().map_err(|err| format!("{err}"))?;
            match rest.first() {
                Some(target) => Command::Rate((*target).to_owned(), verdict),
                None => return Err(format!("usage: {head} <n|id>")),
            }
        }
        "interests" => Command::Interests,
        "pick" if !rest.is_empty() => {
            Command::Pick(rest.iter().map(|id| (*id).to_owned()).collect())
        }
        "pick" => return Err("usage: pick <id>...".to_owned()),
        "save" => Command::SaveInterests,
        "search" => Command::Search(rest.join(" ")),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };
    Ok(Some(command))
}

pub struct App {
    controller: FeedController,
    transport: Arc<dyn FeedbackTransport>,
    interests: Arc<dyn InterestStore>,
    locations: LocationDirectory,
    selection: InterestSelection,
    location: String,
}

impl App {
    pub fn new(backend: Backend, locations: LocationDirectory, config: &PulseConfig) -> Self {
        let submitter = FeedbackSubmitter::new(backend.transport.clone());
        Self {
            controller: FeedController::new(backend.source, submitter, config.feed.clone()),
            transport: backend.transport,
            interests: backend.interests,
            locations,
            selection: InterestSelection::default(),
            location: config.source.location.clone(),
        }
    }

    pub async fn run(mut self, initial: CategoryFilter) -> Result<(), ControllerError> {
        let mut events = self.controller.subscribe();
        println!("Pulse Bengaluru · type `help` for commands");

        self.controller.start().await;
        if initial != CategoryFilter::All {
            self.controller.set_filter(initial).await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.handle_line(&line).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "failed to read from stdin");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "feed events lagged");
                        self.render().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.controller.dispose().await
    }

    async fn render(&self) {
        let state = self.controller.snapshot().await;
        println!("{}", view::feed(&state, &self.location));
    }

    async fn on_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::PhaseChanged(FeedPhase::Loading) => println!("Loading alerts…"),
            FeedEvent::PhaseChanged(FeedPhase::Refreshing) => {
                let state = self.controller.snapshot().await;
                if state.refresh_trigger() == Some(RefreshTrigger::Manual) {
                    println!("Refreshing…");
                }
            }
            FeedEvent::PhaseChanged(_) => {}
            FeedEvent::AlertsReplaced { .. } => self.render().await,
            FeedEvent::FetchFailed { filter, message } => {
                println!("Could not load {filter} alerts: {message}");
            }
            FeedEvent::FeedbackApplied { verdict, .. } => {
                let count = self.controller.snapshot().await.feedback_count();
                println!("Thanks for your feedback ({verdict})! Total submitted: {count}");
            }
        }
    }

    /// Returns `false` once the user asks to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(message) => {
                println!("{message}");
                return true;
            }
        };

        match command {
            Command::Filter(filter) => {
                self.report_fetch(self.controller.set_filter(filter).await);
            }
            Command::Refresh => self.report_fetch(self.controller.refresh().await),
            Command::List => self.render().await,
            Command::Rate(target, verdict) => self.rate(&target, verdict).await,
            Command::Interests => println!("{}", view::interests(&self.selection)),
            Command::Pick(ids) => {
                for id in ids {
                    if let Err(err) = self.selection.toggle(&id) {
                        println!("{err}");
                    }
                }
                println!("{}", view::interests(&self.selection));
            }
            Command::SaveInterests => self.save_interests().await,
            Command::Search(query) => {
                let matches = self.locations.search(&query).await;
                println!("{}", view::locations(&matches));
            }
            Command::Help => println!("{}", view::HELP),
            Command::Quit => return false,
        }
        true
    }

    fn report_fetch(&self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Skipped => println!("Still fetching, try again in a moment."),
            FetchOutcome::Stale => debug!("fetch superseded by a newer request"),
            // Applied and Failed are rendered from the event stream.
            _ => {}
        }
    }

    /// Resolves a 1-based position in the visible list, falling back to a raw id.
    async fn resolve_target(&self, target: &str) -> AlertId {
        if let Ok(position) = target.parse::<usize>() {
            let visible = self.controller.visible_alerts().await;
            if let Some(alert) = position.checked_sub(1).and_then(|index| visible.get(index)) {
                return alert.id.clone();
            }
        }
        AlertId::new(target)
    }

    async fn rate(&self, target: &str, verdict: Verdict) {
        let alert_id = self.resolve_target(target).await;
        match self.controller.submit_feedback(&alert_id, verdict).await {
            // Analytics delivery is left to run in the background.
            Ok(FeedbackOutcome::Recorded { .. }) => {}
            Ok(FeedbackOutcome::AlreadyAnswered) => println!("You already rated this alert."),
            Ok(FeedbackOutcome::InFlight) => println!("Your feedback for this alert is still sending."),
            Ok(FeedbackOutcome::UnknownAlert) => println!("No alert `{alert_id}` in the feed."),
            Err(err) => println!("Could not send feedback: {err}. Try again."),
        }
    }

    async fn save_interests(&self) {
        match submit_interests(self.interests.as_ref(), self.transport.clone(), &self.selection).await {
            Ok(_analytics) => println!("Saved {} interests.", self.selection.len()),
            Err(err) => println!("{err}"),
        }
    }
}
