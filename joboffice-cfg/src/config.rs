//  CONFIG.rs
//    by Ray Plante
//
//  Description:
//!   Defines `JobOfficeConfig`, the top-level on-disk shape of a job
//!   office's configuration file: where it persists the blackboard, how it
//!   listens for Kafka events, and how it schedules jobs.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use joboffice_scheduler::SchedulerConfig;

use crate::errors::Error;


/***** CONFIG *****/
/// Where the blackboard's durable state lives on disk.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PersistConfig {
    /// The directory under which the six queues are persisted. May contain
    /// a `{name}` placeholder, substituted with the job office's own `name`
    /// at startup so that several job offices can share a parent directory.
    pub dir: String,
}

impl Default for PersistConfig {
    fn default() -> Self { Self { dir: "./joboffice-{name}".to_string() } }
}


/// How a job office listens to Kafka: the broker to connect to, the topics
/// it watches, and the polling cadence it falls back to when those topics
/// run dry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ListenConfig {
    /// Seconds to wait before the very first poll, giving the broker
    /// connection time to settle.
    #[serde(default = "ListenConfig::default_initial_wait", rename = "initialWait")]
    pub initial_wait: u64,
    /// Seconds to back off after a poll finds nothing on any topic.
    #[serde(default = "ListenConfig::default_empty_wait", rename = "emptyWait")]
    pub empty_wait: u64,
    /// Caps how many records are pulled off a topic in a single poll before
    /// yielding back to the scheduling loop.
    #[serde(default = "ListenConfig::default_high_watermark", rename = "highWatermark")]
    pub high_watermark: usize,
    /// Topic(s) carrying `dataAvailable`-style dataset announcements.
    #[serde(default, rename = "dataReadyEvent")]
    pub data_ready_event: Vec<String>,
    /// Topic carrying job-status events from worker pipelines.
    #[serde(rename = "pipelineEvent")]
    pub pipeline_event: String,
    /// Topic this job office watches for a request to shut down.
    #[serde(rename = "stopEvent")]
    pub stop_event: String,
    /// Topic this job office publishes its own lifecycle events to.
    #[serde(rename = "jobOfficeEvent")]
    pub job_office_event: String,
    /// Hostname of the Kafka broker.
    #[serde(rename = "brokerHostName")]
    pub broker_host_name: String,
    /// Port of the Kafka broker.
    #[serde(default = "ListenConfig::default_broker_host_port", rename = "brokerHostPort")]
    pub broker_host_port: u16,
}

impl ListenConfig {
    fn default_initial_wait() -> u64 { 1 }
    fn default_empty_wait() -> u64 { 5 }
    fn default_high_watermark() -> usize { 100 }
    fn default_broker_host_port() -> u16 { 9092 }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            initial_wait: Self::default_initial_wait(),
            empty_wait: Self::default_empty_wait(),
            high_watermark: Self::default_high_watermark(),
            data_ready_event: Vec::new(),
            pipeline_event: String::new(),
            stop_event: String::new(),
            job_office_event: String::new(),
            broker_host_name: String::new(),
            broker_host_port: Self::default_broker_host_port(),
        }
    }
}


/***** LIBRARY *****/
/// The full configuration for one job office: its name, where it persists
/// its blackboard, how it listens to Kafka, and how it schedules jobs.
/// Loaded from and written back out to a YAML file via [`from_path`] and
/// [`to_path`].
///
/// [`from_path`]: JobOfficeConfig::from_path
/// [`to_path`]: JobOfficeConfig::to_path
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JobOfficeConfig {
    /// Identifies this job office, substituted into `persist.dir` and
    /// reported in its own lifecycle events.
    pub name: String,
    /// Where the blackboard's durable state lives.
    #[serde(default)]
    pub persist: PersistConfig,
    /// How this job office listens for and publishes Kafka events.
    #[serde(default)]
    pub listen: ListenConfig,
    /// How this job office turns announced datasets into jobs.
    #[serde(default)]
    pub schedule: SchedulerConfig,
}

impl JobOfficeConfig {
    /// Loads a `JobOfficeConfig` from the YAML file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path: &Path = path.as_ref();
        let mut raw: String = String::new();
        {
            let mut handle: File = match File::open(path) {
                Ok(handle) => handle,
                Err(err) => {
                    return Err(Error::FileOpenError { path: path.into(), err });
                },
            };
            if let Err(err) = handle.read_to_string(&mut raw) {
                return Err(Error::FileReadError { path: path.into(), err });
            }
        }
        match serde_yaml::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(err) => Err(Error::FileParseError { path: path.into(), err }),
        }
    }

    /// Writes this `JobOfficeConfig` out to `path` as YAML.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path: &Path = path.as_ref();
        let config: String = match serde_yaml::to_string(self) {
            Ok(config) => config,
            Err(err) => {
                return Err(Error::ConfigSerializeError { err });
            },
        };
        {
            let mut handle: File = match File::create(path) {
                Ok(handle) => handle,
                Err(err) => {
                    return Err(Error::FileCreateError { path: path.into(), err });
                },
            };
            if let Err(err) = handle.write_all(config.as_bytes()) {
                return Err(Error::FileWriteError { path: path.into(), err });
            }
        }
        Ok(())
    }

    /// Resolves `persist.dir`, substituting `{name}` with this job office's
    /// own `name`.
    pub fn persist_dir(&self) -> String {
        self.persist.dir.replace("{name}", &self.name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joboffice.yml");

        let cfg = JobOfficeConfig {
            name: "postisr".to_string(),
            persist: PersistConfig { dir: "./data/{name}".to_string() },
            listen: ListenConfig {
                initial_wait: 2,
                empty_wait: 10,
                high_watermark: 50,
                data_ready_event: vec!["dataAvailable".to_string()],
                pipeline_event: "pipelineStatus".to_string(),
                stop_event: "stopJobOffice".to_string(),
                job_office_event: "jobOfficeStatus".to_string(),
                broker_host_name: "localhost".to_string(),
                broker_host_port: 9092,
            },
            schedule: SchedulerConfig::default(),
        };
        cfg.to_path(&path).unwrap();

        let loaded = JobOfficeConfig::from_path(&path).unwrap();
        assert_eq!(loaded.name, "postisr");
        assert_eq!(loaded.persist.dir, "./data/{name}");
        assert_eq!(loaded.listen.broker_host_name, "localhost");
        assert_eq!(loaded.persist_dir(), "./data/postisr");
    }

    #[test]
    fn missing_file_is_a_file_open_error() {
        let err = JobOfficeConfig::from_path("/no/such/joboffice.yml").unwrap_err();
        assert!(matches!(err, Error::FileOpenError { .. }));
    }

    #[test]
    fn minimal_config_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.yml");
        std::fs::write(&path, "name: minimal\n").unwrap();

        let cfg = JobOfficeConfig::from_path(&path).unwrap();
        assert_eq!(cfg.name, "minimal");
        assert_eq!(cfg.listen.broker_host_port, 9092);
        assert_eq!(cfg.persist_dir(), "./joboffice-minimal");
    }
}
