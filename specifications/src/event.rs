//  EVENT.rs
//    by Ray Plante
//
//  Description:
//!   Defines the event envelopes exchanged between job offices, pipelines,
//!   and the status-watching tools, along with the selector-string format
//!   used to address a subset of jobs by run ID and status.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};


/***** LIBRARY *****/
/// A status report: something a pipeline (or the job office itself) announces
/// about the state of a job.
///
/// `properties` carries event-specific payload -- for a dataset announcement
/// this is the encoded [`crate::record`] form of a [`crate::Dataset`]; for a
/// job status update it may carry free-form diagnostic fields.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Identifies the processing run this event belongs to.
    pub run_id: String,
    /// Identifies who is reporting the event (a pipeline instance, the job
    /// office itself).
    pub originator_id: String,
    /// The reported status, e.g. `"job:available"`, `"job:done"`, `"data:available"`.
    pub status: String,
    /// Event-specific payload.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl StatusEvent {
    pub fn new<R: Into<String>, O: Into<String>, S: Into<String>>(run_id: R, originator_id: O, status: S) -> Self {
        Self { run_id: run_id.into(), originator_id: originator_id.into(), status: status.into(), properties: BTreeMap::new() }
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A command directed at a specific job: an instruction for it to start,
/// stop, or otherwise change state. Carries everything a [`StatusEvent`]
/// does, plus the ID of the job the command targets.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    pub run_id: String,
    pub originator_id: String,
    pub status: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// The job (or pipeline instance) this command is addressed to.
    pub destination_id: String,
}

impl CommandEvent {
    pub fn new<R, O, S, D>(run_id: R, originator_id: O, status: S, destination_id: D) -> Self
    where R: Into<String>, O: Into<String>, S: Into<String>, D: Into<String> {
        Self {
            run_id: run_id.into(),
            originator_id: originator_id.into(),
            status: status.into(),
            properties: BTreeMap::new(),
            destination_id: destination_id.into(),
        }
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A selector over status events, built from an equality conjunction of
/// fields (e.g. `RUNID='run7' and STATUS='job:done'`). This mirrors the
/// content-based selector strings the job office uses to subscribe to just
/// the events it cares about rather than filtering a full topic itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    clauses: Vec<(String, String)>,
}

impl Selector {
    pub fn new() -> Self { Self { clauses: Vec::new() } }

    pub fn eq<F: Into<String>, V: Into<String>>(mut self, field: F, value: V) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn run_id<V: Into<String>>(self, value: V) -> Self { self.eq("RUNID", value) }
    pub fn status<V: Into<String>>(self, value: V) -> Self { self.eq("STATUS", value) }
    pub fn destination_id<V: Into<String>>(self, value: V) -> Self { self.eq("DESTINATIONID", value) }

    /// Checks whether this selector constrains `field` and, if so, whether
    /// it constrains it to exactly `value`. A selector with no clause for
    /// `field` is treated as unconstrained on that field and matches
    /// anything, the way a subscriber that never mentioned `DESTINATIONID`
    /// accepts events regardless of who they're addressed to.
    pub fn matches(&self, field: &str, value: &str) -> bool {
        self.clauses.iter()
            .filter(|(f, _)| f == field)
            .all(|(_, v)| v == value)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        let mut first = true;
        for (field, value) in &self.clauses {
            if !first { write!(f, " and ")?; }
            first = false;
            write!(f, "{}='{}'", field, value)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_renders_as_equality_conjunction() {
        let sel = Selector::new().run_id("run7").status("job:done");
        assert_eq!(sel.to_string(), "RUNID='run7' and STATUS='job:done'");
    }

    #[test]
    fn empty_selector_renders_as_empty_string() {
        assert_eq!(Selector::new().to_string(), "");
    }

    #[test]
    fn unconstrained_field_matches_anything() {
        let sel = Selector::new().run_id("run7");
        assert!(sel.matches("RUNID", "run7"));
        assert!(!sel.matches("RUNID", "other"));
        assert!(sel.matches("DESTINATIONID", "whatever"));
    }

    #[test]
    fn status_event_builder_sets_property() {
        let ev = StatusEvent::new("run7", "pipelineA", "data:available")
            .with_property("dataset", "raw{visit=1}");
        assert_eq!(ev.properties.get("dataset").map(String::as_str), Some("raw{visit=1}"));
    }

    #[test]
    fn command_event_carries_destination() {
        let cmd = CommandEvent::new("run7", "joboffice", "job:start", "pipelineA-3");
        assert_eq!(cmd.destination_id, "pipelineA-3");
    }
}
