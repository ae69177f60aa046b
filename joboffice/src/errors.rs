//  ERRORS.rs
//    by Ray Plante
//
//  Description:
//!   Top-level error type for the `joboffice` binary: wraps every
//!   collaborator's own error type so `main` and the loop can propagate a
//!   single kind up to the point where it's logged and turned into an exit code.

use std::fmt::{Display, Formatter, Result as FResult};

use joboffice_blackboard::blackboard;
use joboffice_cfg::errors as cfg;
use joboffice_scheduler::scheduler;
use joboffice_shr::kafka;
use specifications::record::RecordError;


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    /// Failed to load or resolve the policy/configuration file.
    Config(cfg::Error),
    /// A blackboard mutation or transaction failed.
    Blackboard(blackboard::Error),
    /// The scheduler rejected its own configuration, or a `processDataset`
    /// call failed outright (as opposed to simply not recognizing the
    /// dataset, which is not an error).
    Scheduler(scheduler::Error),
    /// A Kafka client or send/poll operation failed.
    Kafka(kafka::Error),
    /// An event payload didn't decode as JSON.
    EventDecode { payload: String, err: String },
    /// A dataset record embedded in an event property didn't decode.
    DatasetDecode(RecordError),
    /// Something about the daemonize fork/redirect failed.
    Daemonize(String),
    /// `start()` was called on a job office that was already started.
    AlreadyStarted,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Config(err) => write!(f, "{}", err),
            Self::Blackboard(err) => write!(f, "{}", err),
            Self::Scheduler(err) => write!(f, "{}", err),
            Self::Kafka(err) => write!(f, "{}", err),
            Self::EventDecode { payload, err } => write!(f, "failed to decode event payload '{}': {}", payload, err),
            Self::DatasetDecode(err) => write!(f, "failed to decode dataset record embedded in event: {}", err),
            Self::Daemonize(msg) => write!(f, "failed to daemonize: {}", msg),
            Self::AlreadyStarted => write!(f, "job office is already started"),
        }
    }
}
impl std::error::Error for Error {}

impl From<cfg::Error> for Error {
    fn from(err: cfg::Error) -> Self { Self::Config(err) }
}
impl From<blackboard::Error> for Error {
    fn from(err: blackboard::Error) -> Self { Self::Blackboard(err) }
}
impl From<scheduler::Error> for Error {
    fn from(err: scheduler::Error) -> Self { Self::Scheduler(err) }
}
impl From<kafka::Error> for Error {
    fn from(err: kafka::Error) -> Self { Self::Kafka(err) }
}
impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self { Self::DatasetDecode(err) }
}
