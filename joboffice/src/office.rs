//  OFFICE.rs
//    by Ray Plante
//
//  Description:
//!   Implements `JobOffice`: the long-running scheduler loop that reads
//!   announced datasets and pipeline status off Kafka, turns them into jobs
//!   via the `joboffice-scheduler` crate, and dispatches ready jobs to ready
//!   pipelines through the `Blackboard`. Exposes the `start`/`stop`/`is_alive`/`join`
//!   surface of a thread-as-object: one worker thread running the loop below,
//!   plus one stop-listener thread (see `stop_listener`) that only ever sets
//!   the shared halt flag.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rdkafka::consumer::BaseConsumer;
use rdkafka::producer::BaseProducer;

use joboffice_blackboard::blackboard::Blackboard;
use joboffice_blackboard::item::{BlackboardItem, JobItem, PipelineItem};
use joboffice_cfg::config::JobOfficeConfig;
use joboffice_scheduler::scheduler::Scheduler;
use joboffice_shr::kafka;
use specifications::dataset::Dataset;
use specifications::event::{CommandEvent, Selector, StatusEvent};
use specifications::record;

use crate::errors::Error;
use crate::stop_listener;


/***** CONSTANTS *****/
/// Status strings carried on `StatusEvent`/`CommandEvent.status`. Kept as
/// constants for the same reason `joboffice_blackboard::item::keys` is: one
/// place to typo-check against, not a literal repeated at every call site.
pub mod status {
    pub const JOB_READY: &str = "job:ready";
    pub const JOB_DONE: &str = "job:done";
    pub const JOB_ASSIGN: &str = "job:assign";
    pub const FINAL_DATASET: &str = "joboffice:final-dataset";
}

const SUCCESS_PROPERTY: &str = "success";
const PIPELINE_NAME_PROPERTY: &str = "pipelineName";
const NAME_PROPERTY: &str = "name";
const IDENTITY_PROPERTY: &str = "identity";
const DATASET_PROPERTY: &str = "dataset";
const INPUTS_PROPERTY: &str = "inputs";
const OUTPUTS_PROPERTY: &str = "outputs";


/***** HELPERS (pure; unit-tested without a broker) *****/
/// Flattens a list of datasets into `<prefix>.0`, `<prefix>.1`, ... entries,
/// each holding one dataset's own `record::dataset_to_record` encoding. The
/// indexed-prefix shape mirrors `joboffice_blackboard::item`'s
/// `dataset_list_block`, just without that module's further per-line
/// flattening -- an event property value is free to be a multi-line string.
fn datasets_to_properties(prefix: &str, datasets: &[Dataset]) -> Vec<(String, String)> {
    datasets.iter().enumerate().map(|(i, ds)| (format!("{}.{}", prefix, i), record::dataset_to_record(ds))).collect()
}

/// Reverses [`datasets_to_properties`]: reads `<prefix>.0`, `<prefix>.1`, ...
/// back out of `properties` until the next index is missing.
fn datasets_from_properties(properties: &BTreeMap<String, String>, prefix: &str) -> Result<Vec<Dataset>, Error> {
    let mut out = Vec::new();
    let mut i = 0usize;
    loop {
        let Some(raw) = properties.get(&format!("{}.{}", prefix, i)) else { break };
        out.push(record::dataset_from_record(raw)?);
        i += 1;
    }
    Ok(out)
}

/// Builds the `job:assign` command event for a job handed to a pipeline.
fn build_assign_event(office_name: &str, job: &JobItem, pipeline: &PipelineItem) -> CommandEvent {
    let mut event = CommandEvent::new(pipeline.run_id.clone(), office_name, status::JOB_ASSIGN, pipeline.originator_id.clone())
        .with_property(NAME_PROPERTY, job.name.clone())
        .with_property(IDENTITY_PROPERTY, record::dataset_to_record(&job.job_identity));
    for (key, value) in datasets_to_properties(INPUTS_PROPERTY, &job.inputs) {
        event = event.with_property(key, value);
    }
    for (key, value) in datasets_to_properties(OUTPUTS_PROPERTY, &job.outputs) {
        event = event.with_property(key, value);
    }
    event
}

/// Implements the `job:done` branch of `processDoneJobs`:
/// success completes the job, failure retries it until the budget's
/// exhausted. Pure with respect to Kafka -- only touches the blackboard --
/// so it's unit-testable without a broker.
fn apply_job_done(bb: &mut Blackboard, originator_id: &str, success: bool) -> Result<(), Error> {
    if success {
        bb.complete_job(originator_id, true)?;
        info!("job assigned to '{}' completed successfully", originator_id);
    } else {
        let rescheduled = bb.retry_job(originator_id)?;
        if rescheduled {
            info!("job assigned to '{}' failed; rescheduled for retry", originator_id);
        } else {
            warn!("job assigned to '{}' failed and exhausted its retry budget", originator_id);
        }
    }
    Ok(())
}

/// Implements one pass of the dispatch loop in `allocateJobs`:
/// if both `pipelinesReady` and `jobsAvailable` are non-empty, peeks both
/// heads and returns them (without mutating the blackboard) so the caller
/// can publish the `job:assign` event first; the caller then calls
/// [`commit_dispatch`] to perform the actual one-transaction move.
fn peek_dispatch(bb: &Blackboard) -> Result<Option<(JobItem, PipelineItem)>, Error> {
    if bb.pipelines_ready.is_empty() || bb.jobs_available.is_empty() {
        return Ok(None);
    }
    let BlackboardItem::Job(job) = bb.jobs_available.get(0)?.clone() else {
        unreachable!("jobsAvailable only ever holds JobItems");
    };
    let BlackboardItem::Pipeline(pipeline) = bb.pipelines_ready.get(0)?.clone() else {
        unreachable!("pipelinesReady only ever holds PipelineItems");
    };
    Ok(Some((job, pipeline)))
}

/// Moves the head of `pipelinesReady` and the head of `jobsAvailable` to
/// `jobsInProgress` as one transaction -- this pair of dequeues is one
/// transaction. Called only once the `job:assign` event
/// for this pair has already been published.
fn commit_dispatch(bb: &mut Blackboard, pipeline: &PipelineItem) -> Result<(), Error> {
    bb.transaction::<(), Error>(|bb| {
        bb.pipelines_ready.pop(0)?;
        let popped = bb.jobs_available.pop(0)?;
        let BlackboardItem::Job(mut job) = popped else { unreachable!("jobsAvailable only ever holds JobItems") };
        job.assigned_pipeline_id = Some(pipeline.originator_id.clone());
        bb.jobs_in_progress.append(BlackboardItem::Job(job));
        Ok(())
    })
}

/// Implements `observeStatusOfJobs`: halts once the final
/// dataset has been seen and nothing is left in flight.
fn should_halt(final_dataset_sent: bool, bb: &Blackboard) -> bool {
    final_dataset_sent && bb.jobs_in_progress.is_empty() && bb.jobs_available.is_empty()
}


/***** RUN STATE *****/
/// Everything the worker thread owns once `start()` has handed it off.
/// Not `Send`-restricted beyond what `BaseConsumer`/`BaseProducer` already
/// guarantee (both wrap a reference-counted `librdkafka` handle and are
/// safely movable to another thread).
struct RunState {
    blackboard: Blackboard,
    scheduler: Scheduler,
    producer: BaseProducer,
    data_consumer: Option<BaseConsumer>,
    pipeline_consumer: BaseConsumer,
    job_office_consumer: BaseConsumer,
    pending_ready: Vec<StatusEvent>,
    final_dataset_sent: bool,
    /// Scopes every inbound event to this processing run, the way the
    /// original's `RUNID='…'` selector strings carve a run's events out of a
    /// topic shared by several concurrent runs.
    run_selector: Selector,
}


/***** KAFKA-WIRED LOOP STEPS *****/
/// Implements `processJobOfficeEvents`: a single non-blocking
/// poll of the admin channel, watching only for the final-dataset signal.
fn process_job_office_events(state: &mut RunState, timeout: Duration) -> Result<(), Error> {
    let Some((_, _, payload)) = kafka::poll_once(&state.job_office_consumer, timeout)? else { return Ok(()) };
    match serde_json::from_str::<StatusEvent>(&payload) {
        Ok(event) if !kafka::matches_selector(&state.run_selector, &event.run_id, &event.status, None) => {
            debug!("ignoring job-office event for a different run ('{}')", event.run_id);
        },
        Ok(event) if event.status == status::FINAL_DATASET => {
            info!("received final-dataset notification for run '{}'", event.run_id);
            state.final_dataset_sent = true;
        },
        Ok(event) => debug!("ignoring job-office event with status '{}'", event.status),
        Err(err) => warn!("dropping malformed job-office event: {}", err),
    }
    Ok(())
}

/// Drains the pipeline-event topic up to `watermark` messages, handling
/// `job:done` events inline and buffering `job:ready` events for
/// `allocate_jobs` to register. The first poll of the pass uses
/// `initial_wait`; subsequent drains use the shorter `empty_wait`, so every
/// subscribed topic gets one patient wait per iteration without starving
/// the stop path.
fn drain_pipeline_events(state: &mut RunState, initial_wait: Duration, empty_wait: Duration, watermark: usize) -> Result<(), Error> {
    for n in 0..watermark {
        let timeout = if n == 0 { initial_wait } else { empty_wait };
        let Some((_, _, payload)) = kafka::poll_once(&state.pipeline_consumer, timeout)? else { break };
        let event = match serde_json::from_str::<StatusEvent>(&payload) {
            Ok(event) => event,
            Err(err) => { warn!("dropping malformed pipeline event: {}", err); continue; },
        };
        if !kafka::matches_selector(&state.run_selector, &event.run_id, &event.status, None) {
            debug!("ignoring pipeline event for a different run ('{}')", event.run_id);
            continue;
        }
        match event.status.as_str() {
            status::JOB_DONE => {
                let success = event.properties.get(SUCCESS_PROPERTY).map(|v| v == "true" || v == "1").unwrap_or(true);
                apply_job_done(&mut state.blackboard, &event.originator_id, success)?;
            },
            status::JOB_READY => state.pending_ready.push(event),
            other => debug!("ignoring pipeline event with status '{}'", other),
        }
    }
    Ok(())
}

/// Implements `processDataEvents`: drains the configured data-ready
/// topic(s) up to `watermark` messages, feeding every embedded dataset to
/// the scheduler. A `NonClosedSetError`-style failure from the scheduler is
/// logged and the rest of the pass continues; it never aborts the iteration.
fn process_data_events(state: &mut RunState, initial_wait: Duration, empty_wait: Duration, watermark: usize) -> Result<(), Error> {
    let Some(consumer) = state.data_consumer.as_ref() else { return Ok(()) };
    for n in 0..watermark {
        let timeout = if n == 0 { initial_wait } else { empty_wait };
        let Some((_, _, payload)) = kafka::poll_once(consumer, timeout)? else { break };
        let event = match serde_json::from_str::<StatusEvent>(&payload) {
            Ok(event) => event,
            Err(err) => { warn!("dropping malformed data-ready event: {}", err); continue; },
        };
        if !kafka::matches_selector(&state.run_selector, &event.run_id, &event.status, None) {
            debug!("ignoring data-ready event for a different run ('{}')", event.run_id);
            continue;
        }
        let success: Option<bool> = event.properties.get(SUCCESS_PROPERTY).map(|v| v == "true" || v == "1");
        let datasets = match datasets_from_properties(&event.properties, DATASET_PROPERTY) {
            Ok(datasets) => datasets,
            Err(err) => { warn!("dropping data-ready event with undecodable dataset property: {}", err); continue; },
        };
        for ds in &datasets {
            if let Err(err) = state.scheduler.process_dataset(&mut state.blackboard, ds, success) {
                warn!("scheduler could not process announced dataset '{}': {}", ds, err);
            }
        }
    }
    Ok(())
}

/// Implements `allocateJobs`: registers every buffered
/// `job:ready` pipeline, then dispatches jobs to ready pipelines one pair
/// at a time -- peek both heads, publish `job:assign`, then move both in
/// one transaction -- until either queue runs dry.
fn allocate_jobs(state: &mut RunState, office_name: &str, pipeline_topic: &str) -> Result<(), Error> {
    for ready in state.pending_ready.drain(..).collect::<Vec<_>>() {
        let pipeline = PipelineItem {
            pipeline_name: ready.properties.get(PIPELINE_NAME_PROPERTY).cloned().unwrap_or_default(),
            run_id: ready.run_id,
            originator_id: ready.originator_id,
        };
        state.blackboard.register_pipeline(pipeline)?;
    }

    while let Some((job, pipeline)) = peek_dispatch(&state.blackboard)? {
        let event = build_assign_event(office_name, &job, &pipeline);
        let payload = serde_json::to_string(&event).expect("CommandEvent always serializes");
        kafka::send_event_sync(&state.producer, pipeline_topic, &pipeline.run_id, &payload)?;
        commit_dispatch(&mut state.blackboard, &pipeline)?;
        info!("assigned job '{}' to pipeline '{}'", job.name, pipeline.originator_id);
    }
    Ok(())
}


/// Runs one full pass of the loop's six steps. `processJobOfficeEvents` and
/// `processDoneJobs`/`processDataEvents`'s first poll share `initial_wait`
/// so that every subscribed topic gets one patient wait per iteration
/// rather than `initial_wait` applying only to whichever step happens to
/// run first.
fn run_iteration(state: &mut RunState, config: &JobOfficeConfig, halt: &AtomicBool) -> Result<(), Error> {
    let initial_wait = Duration::from_secs(config.listen.initial_wait);
    let empty_wait = Duration::from_secs(config.listen.empty_wait);
    let watermark = config.listen.high_watermark;

    process_job_office_events(state, initial_wait)?;
    drain_pipeline_events(state, initial_wait, empty_wait, watermark)?;
    process_data_events(state, initial_wait, empty_wait, watermark)?;
    state.scheduler.make_jobs_available(&mut state.blackboard)?;
    allocate_jobs(state, &config.name, &config.listen.pipeline_event)?;
    if should_halt(state.final_dataset_sent, &state.blackboard) {
        info!("final dataset observed and no jobs remain in flight; halting");
        halt.store(true, Ordering::SeqCst);
    }
    Ok(())
}

/// The worker thread's body. Runs iterations until `halt` is set, either by
/// the stop listener or by `observeStatusOfJobs` noticing a clean finish.
/// Any error that escapes `run_iteration` (as
/// opposed to the ones already handled inline with a `warn!`) is logged,
/// recorded on the job office, and ends the loop -- this is the only way
/// the worker thread exits other than a clean halt.
fn run_loop(mut state: RunState, config: JobOfficeConfig, halt: Arc<AtomicBool>, last_error: Arc<Mutex<Option<String>>>) {
    info!("job office '{}' entering main loop", config.name);
    while !halt.load(Ordering::SeqCst) {
        if let Err(err) = run_iteration(&mut state, &config, &halt) {
            error!("job office '{}' main loop failed: {}", config.name, err);
            *last_error.lock().expect("last_error mutex poisoned") = Some(err.to_string());
            halt.store(true, Ordering::SeqCst);
            break;
        }
    }
    info!("job office '{}' halted", config.name);
}


/***** JOB OFFICE *****/
/// The long-running scheduler service. Construct with [`JobOffice::new`],
/// then drive it with the thread-as-object surface: [`JobOffice::start`],
/// [`JobOffice::stop`], [`JobOffice::is_alive`], [`JobOffice::join`].
pub struct JobOffice {
    config: JobOfficeConfig,
    run_state: Option<RunState>,
    halt: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    worker: Option<JoinHandle<()>>,
    stop_listener: Option<JoinHandle<()>>,
}

impl JobOffice {
    /// Opens the blackboard, rehydrates the scheduler's trigger handlers
    /// from it (crash recovery), ensures every configured topic exists,
    /// and builds the Kafka clients the loop will use. Does not
    /// start any thread; call [`JobOffice::start`] for that.
    pub fn new(config: JobOfficeConfig, run_id: impl Into<String>) -> Result<Self, Error> {
        let run_id = run_id.into();
        let bb_dir = config.persist_dir();
        info!("job office '{}' persisting to '{}'", config.name, bb_dir);
        let mut blackboard = Blackboard::open(&bb_dir)?;

        let mut scheduler = Scheduler::from_config(&config.schedule)?;
        scheduler.rehydrate(&blackboard);

        let brokers = format!("{}:{}", config.listen.broker_host_name, config.listen.broker_host_port);
        let group_id = format!("joboffice-{}", config.name);

        let mut topics: Vec<&str> = config.listen.data_ready_event.iter().map(String::as_str).collect();
        topics.push(&config.listen.pipeline_event);
        topics.push(&config.listen.stop_event);
        topics.push(&config.listen.job_office_event);
        futures::executor::block_on(kafka::ensure_topics(topics, &brokers))?;

        let data_consumer = if config.listen.data_ready_event.is_empty() {
            None
        } else {
            let topics: Vec<&str> = config.listen.data_ready_event.iter().map(String::as_str).collect();
            Some(kafka::make_consumer(&brokers, &group_id, &topics)?)
        };
        let pipeline_consumer = kafka::make_consumer(&brokers, &group_id, &[&config.listen.pipeline_event])?;
        let job_office_consumer = kafka::make_consumer(&brokers, &group_id, &[&config.listen.job_office_event])?;
        let producer = kafka::make_producer(&brokers)?;

        let run_state = RunState {
            blackboard,
            scheduler,
            producer,
            data_consumer,
            pipeline_consumer,
            job_office_consumer,
            pending_ready: Vec::new(),
            final_dataset_sent: false,
            run_selector: Selector::new().run_id(run_id),
        };

        Ok(Self {
            config,
            run_state: Some(run_state),
            halt: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
            worker: None,
            stop_listener: None,
        })
    }

    /// Starts the worker thread and the stop-listener thread. Returns
    /// [`Error::AlreadyStarted`] if called more than once on the same
    /// `JobOffice` without an intervening [`JobOffice::new`].
    pub fn start(&mut self) -> Result<(), Error> {
        let run_state = self.run_state.take().ok_or(Error::AlreadyStarted)?;

        let brokers = format!("{}:{}", self.config.listen.broker_host_name, self.config.listen.broker_host_port);
        let group_id = format!("joboffice-{}-stop", self.config.name);
        let stop_consumer = kafka::make_consumer(&brokers, &group_id, &[&self.config.listen.stop_event])?;
        let stop_waittime = Duration::from_secs(60);

        let stop_halt = self.halt.clone();
        let stop_handle = thread::spawn(move || stop_listener::run(stop_consumer, stop_halt, stop_waittime));

        let worker_halt = self.halt.clone();
        let worker_last_error = self.last_error.clone();
        let worker_config = self.config.clone();
        let worker_handle = thread::spawn(move || run_loop(run_state, worker_config, worker_halt, worker_last_error));

        self.worker = Some(worker_handle);
        self.stop_listener = Some(stop_handle);
        Ok(())
    }

    /// Sets the shared halt flag. The worker thread finishes its current
    /// iteration, then exits; the stop-listener thread notices on its next
    /// wake-up (at most `waittime` later) and exits too.
    pub fn stop(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }

    /// True until the worker thread has returned. A `JobOffice` that was
    /// never started, or whose threads have already been joined, reports `false`.
    pub fn is_alive(&self) -> bool {
        self.worker.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Blocks until both threads have exited.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stop_listener.take() {
            let _ = handle.join();
        }
    }

    /// The error that ended the main loop, if it exited abnormally rather
    /// than via a clean halt.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("last_error mutex poisoned").clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use specifications::dataset::Dataset;

    fn sample_job(name: &str) -> JobItem {
        JobItem {
            job_identity: Dataset::new("visitJob").with_id("visit", 1i64),
            name: name.to_string(),
            inputs: vec![Dataset::new("raw").with_id("visit", 1i64)],
            outputs: vec![Dataset::new("postISRCCD").with_id("visit", 1i64)],
            assigned_pipeline_id: None,
            success: None,
            retries_remaining: 1,
        }
    }

    #[test]
    fn dataset_properties_round_trip() {
        let datasets = vec![
            Dataset::new("raw").with_id("visit", 1i64),
            Dataset::new("raw").with_id("visit", 2i64),
        ];
        let props: BTreeMap<String, String> = datasets_to_properties("inputs", &datasets).into_iter().collect();
        let back = datasets_from_properties(&props, "inputs").unwrap();
        assert_eq!(back, datasets);
    }

    #[test]
    fn empty_dataset_list_round_trips_to_nothing() {
        let props = BTreeMap::new();
        let back = datasets_from_properties(&props, "inputs").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn assign_event_carries_identity_and_lists() {
        let job = sample_job("visitJob-1");
        let pipeline = PipelineItem { pipeline_name: "ISR".into(), run_id: "run7".into(), originator_id: "ISR-3".into() };
        let event = build_assign_event("joboffice", &job, &pipeline);
        assert_eq!(event.status, status::JOB_ASSIGN);
        assert_eq!(event.destination_id, "ISR-3");
        assert_eq!(event.properties.get(NAME_PROPERTY).map(String::as_str), Some("visitJob-1"));
        assert!(event.properties.contains_key(IDENTITY_PROPERTY));
        assert!(event.properties.contains_key("inputs.0"));
        assert!(event.properties.contains_key("outputs.0"));
    }

    #[test]
    fn job_done_success_completes_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        bb.make_job_available(0).unwrap();
        bb.allocate_job(0, "pipeline-7").unwrap();

        apply_job_done(&mut bb, "pipeline-7", true).unwrap();
        assert_eq!(bb.jobs_in_progress.len(), 0);
        assert_eq!(bb.jobs_done.len(), 1);
    }

    #[test]
    fn job_done_failure_reschedules_until_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        bb.make_job_available(0).unwrap();
        bb.allocate_job(0, "pipeline-7").unwrap();

        apply_job_done(&mut bb, "pipeline-7", false).unwrap();
        assert_eq!(bb.jobs_available.len(), 1, "one retry remaining should reschedule");

        bb.allocate_job(0, "pipeline-7").unwrap();
        apply_job_done(&mut bb, "pipeline-7", false).unwrap();
        assert_eq!(bb.jobs_done.len(), 1, "retry budget exhausted should land in jobsDone");
    }

    #[test]
    fn dispatch_moves_one_pair_per_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        bb.make_job_available(0).unwrap();
        bb.register_pipeline(PipelineItem { pipeline_name: "ISR".into(), run_id: "run7".into(), originator_id: "ISR-3".into() }).unwrap();

        let (job, pipeline) = peek_dispatch(&bb).unwrap().unwrap();
        assert_eq!(job.name, "visitJob-1");
        assert_eq!(pipeline.originator_id, "ISR-3");
        // peeking must not have mutated anything
        assert_eq!(bb.jobs_available.len(), 1);
        assert_eq!(bb.pipelines_ready.len(), 1);

        commit_dispatch(&mut bb, &pipeline).unwrap();
        assert_eq!(bb.jobs_available.len(), 0);
        assert_eq!(bb.pipelines_ready.len(), 0);
        assert_eq!(bb.jobs_in_progress.len(), 1);
    }

    #[test]
    fn halts_only_once_final_and_drained() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        assert!(!should_halt(true, &bb));

        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        bb.make_job_available(0).unwrap();
        assert!(!should_halt(true, &bb), "a ready-but-undispatched job should block halt");
        assert!(!should_halt(false, &bb), "no halt without the final-dataset latch either");

        bb.allocate_job(0, "pipeline-7").unwrap();
        bb.complete_job("pipeline-7", true).unwrap();
        assert!(should_halt(true, &bb));
    }
}
