//  TRANSACTIONAL.rs
//    by Ray Plante
//
//  Description:
//!   Implements `TransactionalQueue`: an in-memory queue (`mem`) backed by
//!   a `PersistingQueue` (`disk`), with the rollback-snapshot/pending-log
//!   discipline that lets a `Blackboard` move items between queues as one
//!   atomic unit.

use std::fmt::{Display, Formatter, Result as FResult};

use enum_debug::EnumDebug;
use log::{debug, error};

use crate::disk::{self, PersistingQueue};
use crate::item::BlackboardItem;


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    Disk(disk::Error),
    /// Disk replay at commit failed *and* the subsequent attempt to
    /// re-sync disk from the rollback snapshot also failed. Per the
    /// rollback-failure policy, this leaves `mem` and `disk` potentially
    /// diverged and requires operator intervention.
    Corrupted { commit_err: String, rollback_err: String },
    OutOfRange { index: usize, len: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Disk(err) => write!(f, "{}", err),
            Self::Corrupted { commit_err, rollback_err } => write!(
                f,
                "queue is corrupted: commit failed ({}) and rollback also failed ({}); operator intervention required",
                commit_err, rollback_err,
            ),
            Self::OutOfRange { index, len } => write!(f, "index {} out of range (queue has {} items)", index, len),
        }
    }
}
impl std::error::Error for Error {}
impl From<disk::Error> for Error {
    fn from(err: disk::Error) -> Self { Self::Disk(err) }
}


/***** LIBRARY *****/
/// One mutation recorded in a transaction's pending log, replayed against
/// `disk` at commit in the order it was applied to `mem`.
#[derive(Clone, Debug, EnumDebug)]
enum Action {
    Append { name: String, item: BlackboardItem },
    InsertAt { index: usize, name: String, item: BlackboardItem },
    Pop { index: usize },
    RemoveAll,
}

/// An in-memory queue backed by a `PersistingQueue`, with transactional
/// commit/abort semantics. See `joboffice-blackboard`'s crate docs for the
/// full transaction lifecycle; in short: mutations during a transaction
/// land in `mem` immediately and are logged, `disk` is touched only at
/// commit, and an abort restores `mem` from the snapshot taken when the
/// transaction was entered.
pub struct TransactionalQueue {
    mem: Vec<(String, BlackboardItem)>,
    disk: PersistingQueue,
    rb: Option<Vec<(String, BlackboardItem)>>,
    pending: Vec<Action>,
    next_seq: u64,
}

impl TransactionalQueue {
    /// Opens the backing directory and hydrates `mem` from what's on disk.
    pub fn open(dir: impl Into<std::path::PathBuf>) -> Result<Self, Error> {
        let disk = PersistingQueue::open(dir)?;
        let mem = disk.read_all()?;
        let next_seq = mem.iter()
            .filter_map(|(name, _)| name.split('.').next().and_then(|s| s.parse::<u64>().ok()))
            .max()
            .map(|n| n + 1)
            .unwrap_or(0);
        Ok(Self { mem, disk, rb: None, pending: Vec::new(), next_seq })
    }

    fn next_name(&mut self) -> String {
        let hint = format!("{:010}", self.next_seq);
        self.next_seq += 1;
        PersistingQueue::name_for_hint(&hint)
    }

    /// Enters a transaction scope: takes a snapshot of `mem` if one isn't
    /// already pending (so nested scopes on the same queue are harmless),
    /// and resets the pending log.
    pub fn begin(&mut self) {
        if self.rb.is_none() {
            self.rb = Some(self.mem.clone());
        }
    }

    /// Commits the transaction: replays the pending log against `disk`. On
    /// a replay failure, restores both `disk` and `mem` from the rollback
    /// snapshot and propagates the original error; if that restoration
    /// itself fails, raises [`Error::Corrupted`].
    pub fn commit(&mut self) -> Result<(), Error> {
        let pending = std::mem::take(&mut self.pending);
        if let Err(commit_err) = self.replay(&pending) {
            if let Err(rollback_err) = self.resync_disk_from_rollback() {
                error!("rollback failed after commit failure: {}", rollback_err);
                self.rb = None;
                return Err(Error::Corrupted { commit_err: commit_err.to_string(), rollback_err: rollback_err.to_string() });
            }
            if let Some(rb) = self.rb.take() { self.mem = rb; }
            return Err(commit_err);
        }
        self.rb = None;
        Ok(())
    }

    /// Aborts the transaction: restores `mem` from the snapshot. `disk` was
    /// never touched during the scope, so nothing there needs undoing.
    pub fn abort(&mut self) {
        if let Some(rb) = self.rb.take() {
            self.mem = rb;
        }
        self.pending.clear();
    }

    fn replay(&mut self, pending: &[Action]) -> Result<(), Error> {
        for action in pending {
            debug!("replaying {} action against disk", action.variant());
            match action {
                Action::Append { name, item } => {
                    let hint = name.rsplit_once('.').map(|(h, _)| h).unwrap_or(name);
                    self.disk.append(item, hint)?;
                },
                Action::InsertAt { index, name, item } => {
                    let hint = name.rsplit_once('.').map(|(h, _)| h).unwrap_or(name);
                    self.disk.insert_at(item, *index, hint)?;
                },
                Action::Pop { index } => { self.disk.pop(*index)?; },
                Action::RemoveAll => { self.disk.remove_all()?; },
            }
        }
        Ok(())
    }

    fn resync_disk_from_rollback(&mut self) -> Result<(), Error> {
        let Some(rb) = self.rb.clone() else { return Ok(()); };
        self.disk.remove_all()?;
        for (name, item) in &rb {
            let hint = name.rsplit_once('.').map(|(h, _)| h).unwrap_or(name);
            self.disk.append(item, hint)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.mem.len() }
    pub fn is_empty(&self) -> bool { self.mem.is_empty() }

    pub fn get(&self, index: usize) -> Result<&BlackboardItem, Error> {
        self.mem.get(index).map(|(_, item)| item)
            .ok_or(Error::OutOfRange { index, len: self.mem.len() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlackboardItem> {
        self.mem.iter().map(|(_, item)| item)
    }

    /// Appends `item` to the tail of `mem`, logging the mutation for replay
    /// at commit. Must be called within a `begin()`/`commit()` scope.
    pub fn append(&mut self, item: BlackboardItem) {
        let name = self.next_name();
        self.mem.push((name.clone(), item.clone()));
        self.pending.push(Action::Append { name, item });
    }

    /// Inserts `item` at `index`, or appends it if `index` is out of range.
    pub fn insert_at(&mut self, item: BlackboardItem, index: usize) {
        if index >= self.mem.len() {
            self.append(item);
            return;
        }
        let name = self.next_name();
        self.mem.insert(index, (name.clone(), item.clone()));
        self.pending.push(Action::InsertAt { index, name, item });
    }

    /// Removes and returns the item at `index`.
    pub fn pop(&mut self, index: usize) -> Result<BlackboardItem, Error> {
        if index >= self.mem.len() { return Err(Error::OutOfRange { index, len: self.mem.len() }); }
        let (_, item) = self.mem.remove(index);
        self.pending.push(Action::Pop { index });
        Ok(item)
    }

    /// Removes every item from `mem`.
    pub fn remove_all(&mut self) {
        self.mem.clear();
        self.pending.push(Action::RemoveAll);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use specifications::Dataset;
    use crate::item::DataProductItem;

    fn sample(n: i64) -> BlackboardItem {
        BlackboardItem::DataProduct(DataProductItem { dataset: Dataset::new("raw").with_id("visit", n), success: true })
    }

    #[test]
    fn commit_persists_to_disk_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = TransactionalQueue::open(dir.path()).unwrap();
        q.begin();
        q.append(sample(1));
        q.append(sample(2));
        q.commit().unwrap();
        assert_eq!(q.len(), 2);

        let reopened = TransactionalQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(0).unwrap(), &sample(1));
        assert_eq!(reopened.get(1).unwrap(), &sample(2));
    }

    #[test]
    fn abort_restores_mem_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = TransactionalQueue::open(dir.path()).unwrap();
        q.begin();
        q.append(sample(1));
        q.commit().unwrap();

        q.begin();
        q.append(sample(2));
        assert_eq!(q.len(), 2);
        q.abort();
        assert_eq!(q.len(), 1);

        let reopened = TransactionalQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn commit_failure_surfaces_corruption_when_rollback_also_fails() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut q = TransactionalQueue::open(dir.path()).unwrap();
        q.begin();
        q.append(sample(1));
        q.commit().unwrap();

        // A read-only directory lets the order-list rewrite through (it's an
        // existing file) but blocks the renames that add or remove item files,
        // so both the append and the rollback's own cleanup fail.
        let mut perms = fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o500);
        fs::set_permissions(dir.path(), perms.clone()).unwrap();

        q.begin();
        q.append(sample(2));
        let result = q.commit();

        perms.set_mode(0o700);
        fs::set_permissions(dir.path(), perms).unwrap();

        assert!(matches!(result, Err(Error::Corrupted { .. })), "a read-only directory should fail both commit and its rollback");

        // The item file itself was never touched, so reopening (now that the
        // directory is writable again) reconciles it back into the order list.
        let reopened = TransactionalQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get(0).unwrap(), &sample(1));
    }

    #[test]
    fn pop_then_commit_removes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = TransactionalQueue::open(dir.path()).unwrap();
        q.begin();
        q.append(sample(1));
        q.append(sample(2));
        q.commit().unwrap();

        q.begin();
        let popped = q.pop(0).unwrap();
        q.commit().unwrap();
        assert_eq!(popped, sample(1));

        let reopened = TransactionalQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get(0).unwrap(), &sample(2));
    }
}
