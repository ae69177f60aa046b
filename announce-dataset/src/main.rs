//  MAIN.rs
//    by Ray Plante
//
//  Description:
//!   `announce-dataset`: a thin CLI that publishes `data:available`
//!   status events for one or more datasets, either built directly from
//!   command-line options or driven by a list file written in a small
//!   directive grammar.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use log::{debug, error, info, warn, LevelFilter};

use specifications::dataset::Dataset;
use specifications::event::StatusEvent;
use specifications::id_value::IdValue;
use specifications::record::dataset_to_record;

const DATASET_PROPERTY: &str = "dataset";
const SUCCESS_PROPERTY: &str = "success";
const STATUS_DATA_AVAILABLE: &str = "data:available";


/***** ARGUMENTS *****/
#[derive(Parser)]
#[clap(name = "announce-dataset", version = env!("CARGO_PKG_VERSION"), about = "Publishes dataset-available events to a job office.")]
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

    /// Identifies the processing run these datasets belong to.
    #[clap(short, long, env = "RUN_ID")]
    run_id: String,
    /// Identifies this announcer as the event's originator.
    #[clap(short, long, default_value = "announce-dataset", env = "ORIGINATOR_ID")]
    originator_id: String,

    /// Topic to publish to.
    #[clap(short, long, default_value = "dataReady", env = "TOPIC")]
    topic: String,
    /// Seconds to sleep between successive announcements.
    #[clap(short, long, default_value_t = 0, env = "INTERVAL")]
    interval: u64,

    /// Whether an announced dataset is valid by default, absent a `>success`
    /// or `>fail` directive overriding it for the following entries.
    #[clap(long, env = "DEFAULT_VALID")]
    invalid: bool,

    /// Names of identifiers that should be parsed as integers rather than
    /// strings when no type sigil is given inline.
    #[clap(long = "intid", value_delimiter = ',', env = "INT_IDS")]
    int_ids: Vec<String>,

    /// A directive-grammar list file describing a sequence of datasets to
    /// announce. When omitted, a single dataset is built from `--type`/`--id`.
    #[clap(short, long)]
    list_file: Option<PathBuf>,

    /// The dataset type to announce, when not using `--list-file`.
    #[clap(long = "type")]
    dataset_type: Option<String>,
    /// An identifier in `name=value` form; may be repeated. Used only when
    /// not using `--list-file`.
    #[clap(long = "id")]
    ids: Vec<String>,
}


/***** DIRECTIVE GRAMMAR *****/
/// One entry to announce: a dataset plus the success flag it should carry
/// and how long to wait after sending it before moving on to the next.
struct Entry {
    dataset: Dataset,
    success: bool,
    pause: Duration,
}

/// Mutable parse state carried across lines of a list file: the directives
/// set `>topic`/`>pause`/etc. persist until overridden, since the grammar
/// allows a stream of directives interspersed with plain dataset lines
/// rather than one directive per dataset.
struct ParseState {
    topic: String,
    interval: Duration,
    id_delim: char,
    eq_delim: char,
    success: bool,
    int_ids: Vec<String>,
    format: Option<String>,
}

impl ParseState {
    fn new(opts: &Opts) -> Self {
        Self {
            topic: opts.topic.clone(),
            interval: Duration::from_secs(opts.interval),
            id_delim: ',',
            eq_delim: '=',
            success: !opts.invalid,
            int_ids: opts.int_ids.clone(),
            format: None,
        }
    }
}

#[derive(Debug)]
struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Parses a list file written in the directive grammar into a sequence of
/// entries to announce, each carrying the topic/success/pause in force at
/// the point it appeared.
///
/// Recognized directives (one per line, `>` prefixed): `>topic name`,
/// `>pause n`, `>interval n`, `>iddelim c`, `>eqdelim c`, `>success`,
/// `>fail`, `>intids a b c`, `>format str`. Lines starting with `#` are
/// comments; blank lines are ignored. Any other non-empty line is a dataset
/// line: `<type><iddelim><name><eqdelim><value><iddelim>...`.
fn parse_list_file(text: &str, opts: &Opts) -> Result<Vec<(String, Entry)>, ParseError> {
    let mut state = ParseState::new(opts);
    let mut entries = Vec::new();
    let mut pending_pause = Duration::from_secs(0);

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('>') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let directive = parts.next().unwrap_or("").to_lowercase();
            let arg = parts.next().unwrap_or("").trim();
            match directive.as_str() {
                "topic" => state.topic = arg.to_string(),
                "pause" => {
                    pending_pause = parse_duration(arg, lineno)?;
                },
                "interval" => state.interval = parse_duration(arg, lineno)?,
                "iddelim" => state.id_delim = parse_char(arg, lineno)?,
                "eqdelim" => state.eq_delim = parse_char(arg, lineno)?,
                "success" => state.success = true,
                "fail" => state.success = false,
                "intids" => state.int_ids = arg.split_whitespace().map(String::from).collect(),
                "format" => state.format = Some(arg.to_string()),
                other => return Err(ParseError(format!("line {}: unrecognized directive '>{}'", lineno + 1, other))),
            }
            continue;
        }

        let dataset = parse_dataset_line(line, &state, lineno)?;
        let pause = if pending_pause.is_zero() { state.interval } else { std::mem::replace(&mut pending_pause, Duration::from_secs(0)) };
        entries.push((state.topic.clone(), Entry { dataset, success: state.success, pause }));
    }
    Ok(entries)
}

fn parse_duration(arg: &str, lineno: usize) -> Result<Duration, ParseError> {
    arg.parse::<u64>().map(Duration::from_secs).map_err(|_| ParseError(format!("line {}: expected an integer number of seconds, got '{}'", lineno + 1, arg)))
}

fn parse_char(arg: &str, lineno: usize) -> Result<char, ParseError> {
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ParseError(format!("line {}: expected a single delimiter character, got '{}'", lineno + 1, arg))),
    }
}

/// Parses one dataset line: `<type><iddelim><name><eqdelim><value>...`, e.g.
/// `raw,visit=44291,ccd=12`. A name listed under `>intids` (or given via
/// `--intid`) is parsed as an integer; otherwise the value is kept as a
/// string, matching the original's untyped-list-file convention where only
/// integer identifiers need to be called out explicitly.
fn parse_dataset_line(line: &str, state: &ParseState, lineno: usize) -> Result<Dataset, ParseError> {
    let mut fields = line.split(state.id_delim);
    let dataset_type = fields.next().filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError(format!("line {}: missing dataset type", lineno + 1)))?;
    let mut dataset = Dataset::new(dataset_type);
    for field in fields {
        let field = field.trim();
        if field.is_empty() { continue; }
        let mut kv = field.splitn(2, state.eq_delim);
        let name = kv.next().unwrap_or("").trim();
        let value = kv.next()
            .ok_or_else(|| ParseError(format!("line {}: identifier '{}' missing a value", lineno + 1, field)))?
            .trim();
        let id_value: IdValue = if state.int_ids.iter().any(|n| n == name) {
            value.parse::<i64>().map(IdValue::Int)
                .map_err(|_| ParseError(format!("line {}: identifier '{}' is declared integer but got '{}'", lineno + 1, name, value)))?
        } else {
            IdValue::Str(value.to_string())
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

    let entries: Vec<(String, Entry)> = if let Some(list_file) = &opts.list_file {
        let text = match fs::read_to_string(list_file) {
            Ok(text) => text,
            Err(err) => { error!("failed to read list file '{}': {}", list_file.display(), err); return ExitCode::from(1); },
        };
        match parse_list_file(&text, &opts) {
            Ok(entries) => entries,
            Err(err) => { error!("failed to parse list file '{}': {}", list_file.display(), err); return ExitCode::from(1); },
        }
    } else {
        let Some(dataset_type) = &opts.dataset_type else {
            error!("either --list-file or --type must be given");
            return ExitCode::from(1);
        };
        let mut dataset = Dataset::new(dataset_type.clone());
        for id in &opts.ids {
            let mut kv = id.splitn(2, '=');
            let name = kv.next().unwrap_or("").trim();
            let Some(value) = kv.next() else {
                error!("malformed --id '{}'; expected 'name=value'", id);
                return ExitCode::from(1);
            };
            let id_value: IdValue = if opts.int_ids.iter().any(|n| n == name) {
                match value.trim().parse::<i64>() {
                    Ok(v) => IdValue::Int(v),
                    Err(_) => { error!("--id '{}' declared integer but isn't", id); return ExitCode::from(1); },
                }
            } else {
                IdValue::Str(value.trim().to_string())
            };
            dataset = dataset.with_id(name, id_value);
        }
        vec![(opts.topic.clone(), Entry { dataset, success: !opts.invalid, pause: Duration::from_secs(opts.interval) })]
    };

    if entries.is_empty() {
        warn!("nothing to announce");
        return ExitCode::SUCCESS;
    }

    let brokers = format!("{}:{}", opts.broker_host, opts.broker_port);
    let producer = match joboffice_shr::kafka::make_producer(&brokers) {
        Ok(producer) => producer,
        Err(err) => { error!("failed to connect to broker '{}': {}", brokers, err); return ExitCode::from(1); },
    };

    for (i, (topic, entry)) in entries.iter().enumerate() {
        let record = dataset_to_record(&entry.dataset);
        let event = StatusEvent::new(opts.run_id.clone(), opts.originator_id.clone(), STATUS_DATA_AVAILABLE)
            .with_property(DATASET_PROPERTY, record)
            .with_property(SUCCESS_PROPERTY, entry.success.to_string());
        let payload = serde_json::to_string(&event).expect("StatusEvent always serializes");

        info!("announcing dataset {} ({}) on topic '{}'", entry.dataset, if entry.success { "valid" } else { "invalid" }, topic);
        if let Err(err) = joboffice_shr::kafka::send_event_sync(&producer, topic, &opts.run_id, &payload) {
            error!("failed to send announcement {}: {}", i, err);
            return ExitCode::from(1);
        }

        if !entry.pause.is_zero() {
            debug!("sleeping {:?} before the next announcement", entry.pause);
            thread::sleep(entry.pause);
        }
    }

    ExitCode::SUCCESS
}


#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Opts {
        Opts {
            debug: false,
            broker_host: "localhost".into(),
            broker_port: 9092,
            run_id: "run7".into(),
            originator_id: "announce-dataset".into(),
            topic: "dataReady".into(),
            interval: 0,
            invalid: false,
            int_ids: vec!["visit".into(), "ccd".into()],
            list_file: None,
            dataset_type: None,
            ids: Vec::new(),
        }
    }

    #[test]
    fn parses_a_simple_dataset_line() {
        let state = ParseState::new(&opts());
        let dataset = parse_dataset_line("raw,visit=44291,ccd=12", &state, 0).unwrap();
        assert_eq!(dataset.dataset_type, "raw");
        assert_eq!(dataset.ids.get("visit"), Some(&IdValue::Int(44291)));
        assert_eq!(dataset.ids.get("ccd"), Some(&IdValue::Int(12)));
    }

    #[test]
    fn directives_adjust_parse_state_for_later_lines() {
        let text = "\
>topic custom
>fail
raw,visit=1
>success
raw,visit=2
";
        let entries = parse_list_file(text, &opts()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "custom");
        assert!(!entries[0].1.success);
        assert!(entries[1].1.success);
    }

    #[test]
    fn pause_directive_applies_only_to_the_next_entry() {
        let text = "\
>pause 5
raw,visit=1
raw,visit=2
";
        let entries = parse_list_file(text, &opts()).unwrap();
        assert_eq!(entries[0].1.pause, Duration::from_secs(5));
        assert_eq!(entries[1].1.pause, Duration::from_secs(0));
    }

    #[test]
    fn unrecognized_directive_is_rejected() {
        let text = ">bogus thing\n";
        assert!(parse_list_file(text, &opts()).is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# a comment\n\nraw,visit=1\n";
        let entries = parse_list_file(text, &opts()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn custom_delimiters_are_honored() {
        let text = "\
>iddelim ;
>eqdelim :
raw;visit:1;ccd:2
";
        let entries = parse_list_file(text, &opts()).unwrap();
        assert_eq!(entries[0].1.dataset.ids.get("visit"), Some(&IdValue::Int(1)));
    }
}
