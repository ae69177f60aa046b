//  BLACKBOARD.rs
//    by Ray Plante
//
//  Description:
//!   Implements `Blackboard`, the job office's durable, transactional store:
//!   six named queues sharing one reentrant lock, and the named
//!   single-transaction move helpers that are the only way the scheduler
//!   and the job office loop are allowed to mutate them.

use std::fmt::{Display, Formatter, Result as FResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use enum_debug::EnumDebug as _;
use log::debug;

use crate::item::{BlackboardItem, DataProductItem, JobItem, PipelineItem};
use crate::lock::BlackboardLock;
use crate::transactional::{self, TransactionalQueue};


/***** CONSTANTS *****/
const DATA_AVAILABLE_DIR: &str = "dataAvailable";
const JOBS_POSSIBLE_DIR: &str = "jobsPossible";
const JOBS_AVAILABLE_DIR: &str = "jobsAvailable";
const JOBS_IN_PROGRESS_DIR: &str = "jobsInProgress";
const JOBS_DONE_DIR: &str = "jobsDone";
const PIPELINES_READY_DIR: &str = "pipelinesReady";


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    Queue(transactional::Error),
    /// A convenience move was asked to act on an item that isn't where the
    /// caller claimed it was (e.g. `complete_job` given an originator id
    /// with no matching in-progress job).
    NotFound(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Queue(err) => write!(f, "{}", err),
            Self::NotFound(what) => write!(f, "{}", what),
        }
    }
}
impl std::error::Error for Error {}
impl From<transactional::Error> for Error {
    fn from(err: transactional::Error) -> Self { Self::Queue(err) }
}


/***** LIBRARY *****/
/// The job office's persistent state: six queues plus the lock that makes
/// moves between them atomic. See the crate root documentation for the
/// lifecycle each queue represents.
pub struct Blackboard {
    lock: Arc<BlackboardLock>,
    pub data_available: TransactionalQueue,
    pub jobs_possible: TransactionalQueue,
    pub jobs_available: TransactionalQueue,
    pub jobs_in_progress: TransactionalQueue,
    pub jobs_done: TransactionalQueue,
    pub pipelines_ready: TransactionalQueue,
}

impl Blackboard {
    /// Opens (creating if necessary) the six queue directories under `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref();
        let dir = |name: &str| -> PathBuf { root.join(name) };
        Ok(Self {
            lock: Arc::new(BlackboardLock::new()),
            data_available: TransactionalQueue::open(dir(DATA_AVAILABLE_DIR))?,
            jobs_possible: TransactionalQueue::open(dir(JOBS_POSSIBLE_DIR))?,
            jobs_available: TransactionalQueue::open(dir(JOBS_AVAILABLE_DIR))?,
            jobs_in_progress: TransactionalQueue::open(dir(JOBS_IN_PROGRESS_DIR))?,
            jobs_done: TransactionalQueue::open(dir(JOBS_DONE_DIR))?,
            pipelines_ready: TransactionalQueue::open(dir(PIPELINES_READY_DIR))?,
        })
    }

    /// Runs `f` under the shared lock, as one transaction spanning all six
    /// queues: whichever ones `f` actually mutates commit together on
    /// `Ok`, or abort together on `Err`. Entering and committing/aborting a
    /// queue `f` never touches is a no-op (an empty pending log replays to
    /// nothing), so this stays correct without `f` having to declare which
    /// queues it plans to use.
    fn with_transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        self.transaction(f)
    }

    /// The public counterpart of [`Blackboard::with_transaction`], generic
    /// over the caller's own error type: callers outside this crate (e.g.
    /// `joboffice-scheduler`, which needs to interleave its own
    /// `NonClosedSetError` with blackboard mutations inside one atomic
    /// scope) can run a closure that returns their error type directly, as
    /// long as it can be built `From` this crate's [`Error`].
    pub fn transaction<T, E: From<Error>>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let _guard = self.lock.acquire();
        for q in self.all_queues_mut() { q.begin(); }

        let result = f(self);
        match &result {
            Ok(_) => {
                for q in self.all_queues_mut() {
                    q.commit().map_err(Error::from).map_err(E::from)?;
                }
            },
            Err(_) => {
                for q in self.all_queues_mut() { q.abort(); }
            },
        }
        result
    }

    fn all_queues_mut(&mut self) -> [&mut TransactionalQueue; 6] {
        [
            &mut self.data_available, &mut self.jobs_possible, &mut self.jobs_available,
            &mut self.jobs_in_progress, &mut self.jobs_done, &mut self.pipelines_ready,
        ]
    }

    /// Records a newly-observed dataset in `dataAvailable`. This queue is
    /// an append-only audit log; nothing is ever removed from it.
    pub fn record_data_product(&mut self, dataset: specifications::Dataset, success: bool) -> Result<(), Error> {
        self.with_transaction(|bb| {
            bb.data_available.append(BlackboardItem::DataProduct(DataProductItem { dataset, success }));
            Ok(())
        })
    }

    /// Appends a newly-formed job to `jobsPossible`.
    pub fn add_possible_job(&mut self, job: JobItem) -> Result<(), Error> {
        self.with_transaction(|bb| {
            bb.jobs_possible.append(BlackboardItem::Job(job));
            Ok(())
        })
    }

    /// Moves a job from `jobsPossible` to `jobsAvailable`: `jobsPossible` →
    /// `jobsAvailable`, preserving the job's place relative to the others
    /// already moved this pass.
    pub fn make_job_available(&mut self, index: usize) -> Result<(), Error> {
        self.with_transaction(|bb| {
            let item = bb.jobs_possible.pop(index)?;
            debug!("moving {} from jobsPossible to jobsAvailable", item.variant());
            bb.jobs_available.append(item);
            Ok(())
        })
    }

    /// Moves the job at `index` in `jobsAvailable` to `jobsInProgress`,
    /// recording the pipeline originator id it was assigned to.
    pub fn allocate_job(&mut self, index: usize, pipeline_originator_id: impl Into<String>) -> Result<JobItem, Error> {
        self.with_transaction(|bb| {
            let item = bb.jobs_available.pop(index)?;
            let BlackboardItem::Job(mut job) = item else {
                return Err(Error::NotFound("item at jobsAvailable index is not a JobItem".to_string()));
            };
            job.assigned_pipeline_id = Some(pipeline_originator_id.into());
            let item = BlackboardItem::Job(job.clone());
            debug!("moving {} from jobsAvailable to jobsInProgress", item.variant());
            bb.jobs_in_progress.append(item);
            Ok(job)
        })
    }

    /// Moves the in-progress job whose `assigned_pipeline_id` matches
    /// `originator_id` to `jobsDone`, flagging it `success`.
    pub fn complete_job(&mut self, originator_id: &str, success: bool) -> Result<(), Error> {
        self.with_transaction(|bb| {
            let index = find_job_by_originator(&bb.jobs_in_progress, originator_id)
                .ok_or_else(|| Error::NotFound(format!("no in-progress job assigned to '{}'", originator_id)))?;
            let item = bb.jobs_in_progress.pop(index)?;
            let BlackboardItem::Job(mut job) = item else { unreachable!("jobsInProgress only ever holds JobItems") };
            job.success = Some(success);
            let item = BlackboardItem::Job(job);
            debug!("moving {} from jobsInProgress to jobsDone (success={})", item.variant(), success);
            bb.jobs_done.append(item);
            Ok(())
        })
    }

    /// Moves the in-progress job whose `assigned_pipeline_id` matches
    /// `originator_id` back to `jobsAvailable` for a retry, decrementing
    /// `retries_remaining`. Returns `false` (and moves it to `jobsDone`
    /// instead, flagged failed) once the retry budget is exhausted.
    pub fn retry_job(&mut self, originator_id: &str) -> Result<bool, Error> {
        self.with_transaction(|bb| {
            let index = find_job_by_originator(&bb.jobs_in_progress, originator_id)
                .ok_or_else(|| Error::NotFound(format!("no in-progress job assigned to '{}'", originator_id)))?;
            let item = bb.jobs_in_progress.pop(index)?;
            let BlackboardItem::Job(mut job) = item else { unreachable!("jobsInProgress only ever holds JobItems") };

            job.assigned_pipeline_id = None;
            if job.retries_remaining == 0 {
                job.success = Some(false);
                let item = BlackboardItem::Job(job);
                debug!("moving {} from jobsInProgress to jobsDone (retry budget exhausted)", item.variant());
                bb.jobs_done.append(item);
                Ok(false)
            } else {
                job.retries_remaining -= 1;
                let item = BlackboardItem::Job(job);
                debug!("moving {} from jobsInProgress to jobsAvailable (retry)", item.variant());
                bb.jobs_available.append(item);
                Ok(true)
            }
        })
    }

    /// Appends a newly-ready pipeline to `pipelinesReady`.
    pub fn register_pipeline(&mut self, pipeline: PipelineItem) -> Result<(), Error> {
        self.with_transaction(|bb| {
            bb.pipelines_ready.append(BlackboardItem::Pipeline(pipeline));
            Ok(())
        })
    }

    /// Pops and returns the head of `pipelinesReady`, if any.
    pub fn claim_pipeline(&mut self) -> Result<Option<PipelineItem>, Error> {
        self.with_transaction(|bb| {
            if bb.pipelines_ready.is_empty() { return Ok(None); }
            let item = bb.pipelines_ready.pop(0)?;
            let BlackboardItem::Pipeline(pipeline) = item else { unreachable!("pipelinesReady only ever holds PipelineItems") };
            Ok(Some(pipeline))
        })
    }
}

fn find_job_by_originator(queue: &TransactionalQueue, originator_id: &str) -> Option<usize> {
    queue.iter().position(|item| match item {
        BlackboardItem::Job(job) => job.assigned_pipeline_id.as_deref() == Some(originator_id),
        _ => false,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use specifications::Dataset;

    fn sample_job(name: &str) -> JobItem {
        JobItem {
            job_identity: Dataset::new("visitJob").with_id("visit", 1i64),
            name: name.to_string(),
            inputs: vec![],
            outputs: vec![],
            assigned_pipeline_id: None,
            success: None,
            retries_remaining: 1,
        }
    }

    #[test]
    fn job_lifecycle_moves_between_queues() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();

        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        assert_eq!(bb.jobs_possible.len(), 1);

        bb.make_job_available(0).unwrap();
        assert_eq!(bb.jobs_possible.len(), 0);
        assert_eq!(bb.jobs_available.len(), 1);

        bb.allocate_job(0, "pipeline-7").unwrap();
        assert_eq!(bb.jobs_available.len(), 0);
        assert_eq!(bb.jobs_in_progress.len(), 1);

        bb.complete_job("pipeline-7", true).unwrap();
        assert_eq!(bb.jobs_in_progress.len(), 0);
        assert_eq!(bb.jobs_done.len(), 1);
    }

    #[test]
    fn retry_reschedules_until_budget_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        bb.add_possible_job(sample_job("visitJob-1")).unwrap();
        bb.make_job_available(0).unwrap();
        bb.allocate_job(0, "pipeline-7").unwrap();

        let rescheduled = bb.retry_job("pipeline-7").unwrap();
        assert!(rescheduled);
        assert_eq!(bb.jobs_available.len(), 1);
        assert_eq!(bb.jobs_in_progress.len(), 0);

        bb.allocate_job(0, "pipeline-7").unwrap();
        let rescheduled_again = bb.retry_job("pipeline-7").unwrap();
        assert!(!rescheduled_again, "retries_remaining should be exhausted");
        assert_eq!(bb.jobs_done.len(), 1);
    }

    #[test]
    fn pipeline_register_and_claim() {
        let dir = tempfile::tempdir().unwrap();
        let mut bb = Blackboard::open(dir.path()).unwrap();
        assert!(bb.claim_pipeline().unwrap().is_none());

        bb.register_pipeline(PipelineItem { pipeline_name: "ISR".into(), run_id: "run7".into(), originator_id: "ISR-3".into() }).unwrap();
        let claimed = bb.claim_pipeline().unwrap().unwrap();
        assert_eq!(claimed.originator_id, "ISR-3");
        assert!(bb.claim_pipeline().unwrap().is_none());
    }
}
