//  MAIN.rs
//    by Ray Plante
//
//  Description:
//!   `show-events`: a diagnostic listener that subscribes to one or more
//!   topics and prints every event it sees, decoded where possible. Used to
//!   watch a job office's traffic by hand while debugging a run.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use log::{debug, info, warn, LevelFilter};

use specifications::event::{CommandEvent, StatusEvent};


/***** ARGUMENTS *****/
#[derive(Parser)]
#[clap(name = "show-events", version = env!("CARGO_PKG_VERSION"), about = "Watches and prints events flowing through a job office's broker.")]
struct Opts {
    /// Print debug info.
    #[clap(long, env = "DEBUG")]
    debug: bool,

    /// Kafka broker hostname.
    #[clap(long, default_value = "localhost", env = "BROKER_HOST")]
    broker_host: String,
    /// Kafka broker port.
    #[clap(long, default_value_t = 9092, env = "BROKER_PORT")]
    broker_port: u16,

    /// Topics to subscribe to; may be repeated.
    #[clap(short, long = "topic", required = true)]
    topics: Vec<String>,

    /// Only print events belonging to this run, skipping every other run's
    /// traffic on the subscribed topics.
    #[clap(short, long, env = "RUN_ID")]
    run_id: Option<String>,

    /// Consumer group id this listener joins; defaults to a private group
    /// so it sees the full topic history rather than sharing offsets with
    /// a running job office.
    #[clap(short, long, default_value = "show-events")]
    group_id: String,

    /// Seconds to wait between polls that find nothing.
    #[clap(long, default_value_t = 5)]
    poll_timeout: u64,

    /// Stop after printing this many events; runs forever when unset.
    #[clap(short = 'n', long)]
    count: Option<usize>,
}

/// Renders one polled message as a human-readable line, decoding it as a
/// `StatusEvent` or `CommandEvent` (in that order, since every `CommandEvent`
/// is also valid JSON for the `StatusEvent` shape minus `destinationId`) and
/// falling back to the raw payload when neither parses.
fn render(topic: &str, payload: &str) -> String {
    if let Ok(event) = serde_json::from_str::<CommandEvent>(payload) {
        return format!(
            "[{}] run={} from={} -> {} status={} properties={:?}",
            topic, event.run_id, event.originator_id, event.destination_id, event.status, event.properties
        );
    }
    if let Ok(event) = serde_json::from_str::<StatusEvent>(payload) {
        return format!(
            "[{}] run={} from={} status={} properties={:?}",
            topic, event.run_id, event.originator_id, event.status, event.properties
        );
    }
    format!("[{}] <undecodable payload> {}", topic, payload)
}

/// Returns the run-id an arbitrary JSON payload carries, if it parses as
/// either event shape, so a `--run-id` filter can apply uniformly without
/// knowing in advance which kind of event arrived.
fn payload_run_id(payload: &str) -> Option<String> {
    serde_json::from_str::<StatusEvent>(payload).map(|e| e.run_id).ok()
        .or_else(|| serde_json::from_str::<CommandEvent>(payload).map(|e| e.run_id).ok())
}

fn main() -> ExitCode {
    dotenv().ok();
    let opts = Opts::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    logger.filter_level(if opts.debug { LevelFilter::Debug } else { LevelFilter::Info });
    logger.init();

    let brokers = format!("{}:{}", opts.broker_host, opts.broker_port);
    let topics: Vec<&str> = opts.topics.iter().map(String::as_str).collect();
    let consumer = match joboffice_shr::kafka::make_consumer(&brokers, &opts.group_id, &topics) {
        Ok(consumer) => consumer,
        Err(err) => { log::error!("failed to subscribe to {:?} on '{}': {}", topics, brokers, err); return ExitCode::from(1); },
    };

    info!("watching topics {:?} on '{}'", opts.topics, brokers);
    let timeout = Duration::from_secs(opts.poll_timeout);
    let mut seen = 0usize;
    loop {
        match joboffice_shr::kafka::poll_once(&consumer, timeout) {
            Ok(Some((topic, _key, payload))) => {
                if let Some(want) = &opts.run_id {
                    match payload_run_id(&payload) {
                        Some(run_id) if &run_id == want => {},
                        _ => { debug!("skipping event for a different run"); continue; },
                    }
                }
                println!("{}", render(&topic, &payload));
                seen += 1;
                if let Some(count) = opts.count {
                    if seen >= count { break; }
                }
            },
            Ok(None) => debug!("no events within {:?}; still watching", timeout),
            Err(err) => warn!("poll failed: {}", err),
        }
    }

    ExitCode::SUCCESS
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_status_event() {
        let event = StatusEvent::new("run7", "pipelineA", "job:ready");
        let payload = serde_json::to_string(&event).unwrap();
        let line = render("pipelineEvent", &payload);
        assert!(line.contains("run=run7"));
        assert!(line.contains("status=job:ready"));
    }

    #[test]
    fn renders_a_command_event_with_its_destination() {
        let event = CommandEvent::new("run7", "joboffice", "job:assign", "pipelineA-3");
        let payload = serde_json::to_string(&event).unwrap();
        let line = render("pipelineEvent", &payload);
        assert!(line.contains("-> pipelineA-3"));
    }

    #[test]
    fn falls_back_to_raw_payload_when_undecodable() {
        let line = render("pipelineEvent", "not json");
        assert!(line.contains("undecodable"));
    }

    #[test]
    fn extracts_run_id_from_either_event_shape() {
        let status = StatusEvent::new("run7", "pipelineA", "job:ready");
        let command = CommandEvent::new("run9", "joboffice", "job:assign", "pipelineA-3");
        assert_eq!(payload_run_id(&serde_json::to_string(&status).unwrap()), Some("run7".to_string()));
        assert_eq!(payload_run_id(&serde_json::to_string(&command).unwrap()), Some("run9".to_string()));
    }
}
