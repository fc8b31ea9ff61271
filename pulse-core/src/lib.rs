pub mod alert;
pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod http;
pub mod interests;
pub mod locations;
pub mod source;

pub use alert::{Alert, AlertId, Category, CategoryFilter, Coordinates, Severity, Verdict};
pub use config::{BackendConfig, BackendMode, FeedConfig, PulseConfig, SourceConfig};
pub use controller::{
    FeedController, FeedEvent, FeedPhase, FeedState, FeedbackOutcome, FetchOutcome, RefreshTrigger,
};
pub use error::{
    AnalyticsError, ConfigError, ControllerError, FetchError, InterestsError, ParseError,
    SubmissionError,
};
pub use feedback::{
    AnalyticsEvent, AnalyticsHandle, FeedbackRecord, FeedbackSubmitter, FeedbackTransport,
    MockFeedbackTransport, Submission,
};
pub use http::HttpBackend;
pub use interests::{submit_interests, InterestSelection, InterestStore, MockInterestStore, INTERESTS};
pub use locations::{LocationDirectory, LocationMatch};
pub use source::{AlertSource, MockAlertSource};
