//  MAIN.rs
//    by Ray Plante
//
//  Description:
//!   `send-event`: a thin CLI that publishes a single status or command
//!   event to a job office's event broker -- useful for poking a running
//!   office by hand, or for driving it from a shell script in tests.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use log::{error, info, LevelFilter};

use specifications::event::{CommandEvent, StatusEvent};
use specifications::record::dataset_to_record;
use specifications::Dataset;
use specifications::id_value::IdValue;

const DATASET_PROPERTY: &str = "dataset";
const SUCCESS_PROPERTY: &str = "success";
const PIPELINE_NAME_PROPERTY: &str = "pipelineName";


/***** ARGUMENTS *****/
/// The kind of event to publish: a pipeline announcing it's ready, the
/// office assigning it a job, a dataset becoming available, a pipeline
/// reporting a job done, or a request to stop the office.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Ready,
    Assign,
    Dataset,
    Done,
    Stop,
}

#[derive(Parser)]
#[clap(name = "send-event", version = env!("CARGO_PKG_VERSION"), about = "Publishes a single event to a job office's event broker.")]
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

    /// Identifies the processing run this event belongs to.
    #[clap(short, long, env = "RUN_ID")]
    run_id: String,

    /// The kind of event to send.
    #[clap(short, long, value_enum)]
    kind: Kind,

    /// Topic to publish to; defaults to a sensible per-kind topic name if
    /// not given.
    #[clap(short, long)]
    topic: Option<String>,

    /// Who is reporting this event: a pipeline instance name for `ready`
    /// and `done`, or the job office's own name for `assign` and `stop`.
    #[clap(short = 'o', long, default_value = "send-event", env = "ORIGINATOR_ID")]
    originator_id: String,
    /// Required for `assign`: the job (or pipeline instance) the command is
    /// addressed to.
    #[clap(short = 'd', long)]
    destination_id: Option<String>,

    /// Pipeline name, for `ready`.
    #[clap(long)]
    pipeline_name: Option<String>,
    /// Whether the reported job succeeded, for `done`.
    #[clap(long)]
    success: Option<bool>,

    /// One dataset in `type,name=value,...` form; may be repeated. Used by
    /// `dataset` (the datasets becoming available) and `assign` (unused,
    /// present for symmetry with the wire schema).
    #[clap(long = "dataset")]
    datasets: Vec<String>,
}

fn parse_dataset(spec: &str) -> Result<Dataset, String> {
    let mut fields = spec.split(',');
    let dataset_type = fields.next().filter(|s| !s.is_empty()).ok_or_else(|| format!("dataset '{}' is missing a type", spec))?;
    let mut dataset = Dataset::new(dataset_type);
    for field in fields {
        let (name, value) = field.split_once('=').ok_or_else(|| format!("dataset '{}' has a malformed identifier '{}'", spec, field))?;
        let id_value = match value.parse::<i64>() {
            Ok(v) => IdValue::Int(v),
            Err(_) => IdValue::Str(value.to_string()),
        };
        dataset = dataset.with_id(name, id_value);
    }
    Ok(dataset)
}

fn main() -> ExitCode {
    dotenv().ok();
    let opts = Opts::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    logger.filter_level(if opts.debug { LevelFilter::Debug } else { LevelFilter::Info });
    logger.init();

    let (default_topic, payload) = match opts.kind {
        Kind::Ready => {
            let Some(pipeline_name) = &opts.pipeline_name else {
                error!("'--kind ready' requires --pipeline-name");
                return ExitCode::from(1);
            };
            let event = StatusEvent::new(opts.run_id.clone(), opts.originator_id.clone(), "job:ready")
                .with_property(PIPELINE_NAME_PROPERTY, pipeline_name.clone());
            ("pipelineEvent", serde_json::to_string(&event))
        },
        Kind::Assign => {
            let Some(destination_id) = &opts.destination_id else {
                error!("'--kind assign' requires --destination-id");
                return ExitCode::from(1);
            };
            let event = CommandEvent::new(opts.run_id.clone(), opts.originator_id.clone(), "job:assign", destination_id.clone());
            ("pipelineEvent", serde_json::to_string(&event))
        },
        Kind::Dataset => {
            let mut event = StatusEvent::new(opts.run_id.clone(), opts.originator_id.clone(), "data:available")
                .with_property(SUCCESS_PROPERTY, opts.success.unwrap_or(true).to_string());
            for (i, spec) in opts.datasets.iter().enumerate() {
                let dataset = match parse_dataset(spec) {
                    Ok(dataset) => dataset,
                    Err(err) => { error!("{}", err); return ExitCode::from(1); },
                };
                event = event.with_property(format!("{}.{}", DATASET_PROPERTY, i), dataset_to_record(&dataset));
            }
            ("dataReady", serde_json::to_string(&event))
        },
        Kind::Done => {
            let event = StatusEvent::new(opts.run_id.clone(), opts.originator_id.clone(), "job:done")
                .with_property(SUCCESS_PROPERTY, opts.success.unwrap_or(true).to_string());
            ("pipelineEvent", serde_json::to_string(&event))
        },
        Kind::Stop => {
            let event = StatusEvent::new(opts.run_id.clone(), opts.originator_id.clone(), "stop");
            ("stop", serde_json::to_string(&event))
        },
    };
    let payload = payload.expect("event always serializes");
    let topic = opts.topic.clone().unwrap_or_else(|| default_topic.to_string());

    let brokers = format!("{}:{}", opts.broker_host, opts.broker_port);
    let producer = match joboffice_shr::kafka::make_producer(&brokers) {
        Ok(producer) => producer,
        Err(err) => { error!("failed to connect to broker '{}': {}", brokers, err); return ExitCode::from(1); },
    };

    info!("sending {:?} event for run '{}' on topic '{}'", opts.kind, opts.run_id, topic);
    match joboffice_shr::kafka::send_event_sync(&producer, &topic, &opts.run_id, &payload) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => { error!("failed to send event: {}", err); ExitCode::from(1) },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_dataset_spec() {
        let dataset = parse_dataset("raw,visit=44291,ccd=12").unwrap();
        assert_eq!(dataset.dataset_type, "raw");
        assert_eq!(dataset.ids.get("visit"), Some(&IdValue::Int(44291)));
    }

    #[test]
    fn rejects_a_dataset_spec_with_no_type() {
        assert!(parse_dataset(",visit=1").is_err());
    }

    #[test]
    fn rejects_a_malformed_identifier() {
        assert!(parse_dataset("raw,visit").is_err());
    }

    #[test]
    fn string_valued_identifiers_stay_strings() {
        let dataset = parse_dataset("raw,band=r").unwrap();
        assert_eq!(dataset.ids.get("band"), Some(&IdValue::Str("r".to_string())));
    }
}
