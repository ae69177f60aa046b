//  DISK.rs
//    by Ray Plante
//
//  Description:
//!   Implements `PersistingQueue`, the on-disk half of a `TransactionalQueue`:
//!   a directory holding one file per item plus an `_order.list` sidecar
//!   that records the authoritative item order, kept consistent through the
//!   atomic rename protocol of `joboffice_shr::fs`.

use std::fmt::{Display, Formatter, Result as FResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use joboffice_shr::fs as shrfs;
use specifications::record::RecordError;

use crate::item::BlackboardItem;


/***** CONSTANTS *****/
const ORDER_FILE: &str = "_order.list";
const ITEM_EXT: &str = "item";


/***** ERRORS *****/
#[derive(Debug)]
pub enum Error {
    OpenDir { dir: PathBuf, err: io::Error },
    Fs(shrfs::Error),
    ReadItem { path: PathBuf, err: io::Error },
    DecodeItem { path: PathBuf, err: RecordError },
    OrderListWrite { path: PathBuf, err: io::Error },
    UnknownName(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use Error::*;
        match self {
            OpenDir { dir, err }        => write!(f, "failed to create/open queue directory '{}': {}", dir.display(), err),
            Fs(err)                     => write!(f, "{}", err),
            ReadItem { path, err }      => write!(f, "failed to read item file '{}': {}", path.display(), err),
            DecodeItem { path, err }    => write!(f, "failed to decode item file '{}': {}", path.display(), err),
            OrderListWrite { path, err } => write!(f, "failed to write order list '{}': {}", path.display(), err),
            UnknownName(name)          => write!(f, "no item named '{}' in this queue", name),
        }
    }
}
impl std::error::Error for Error {}
impl From<shrfs::Error> for Error {
    fn from(err: shrfs::Error) -> Self { Self::Fs(err) }
}


/***** LIBRARY *****/
/// The on-disk half of a queue: a directory of item files plus the order
/// list that names their authoritative sequence.
pub struct PersistingQueue {
    dir: PathBuf,
    order: Vec<String>,
}

impl PersistingQueue {
    /// Opens (creating if necessary) the queue directory at `dir`,
    /// reconciling its `_order.list` against what's actually on disk: any
    /// file present but unlisted is appended (in sorted order); any listed
    /// name missing from disk is dropped. The reconciled order is written
    /// back immediately so a second open sees a consistent view.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| Error::OpenDir { dir: dir.clone(), err })?;

        let order_path = dir.join(ORDER_FILE);
        let mut order: Vec<String> = match fs::read_to_string(&order_path) {
            Ok(text) => text.lines().map(str::to_string).filter(|l| !l.is_empty()).collect(),
            Err(_)   => Vec::new(),
        };

        let on_disk: Vec<String> = shrfs::list_dir_filtered(&dir)?
            .into_iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        let mut reconciled = Vec::new();
        let mut missing = Vec::new();
        for name in &order {
            if on_disk.contains(name) { reconciled.push(name.clone()); }
            else { missing.push(name.clone()); }
        }
        let mut extra: Vec<String> = on_disk.iter().filter(|n| !order.contains(n)).cloned().collect();
        extra.sort();
        reconciled.extend(extra.iter().cloned());

        if !missing.is_empty() || !extra.is_empty() {
            warn!(
                "reconciling queue directory '{}': {} entries dropped (missing from disk), {} entries added (untracked on disk)",
                dir.display(), missing.len(), extra.len(),
            );
        }
        order = reconciled;

        let mut q = Self { dir, order };
        q.rewrite_order()?;
        Ok(q)
    }

    fn item_path(&self, name: &str) -> PathBuf { self.dir.join(name) }

    fn rewrite_order(&self) -> Result<(), Error> {
        let order_path = self.dir.join(ORDER_FILE);
        let text = self.order.join("\n");
        fs::write(&order_path, text).map_err(|err| Error::OrderListWrite { path: order_path, err })
    }

    /// Computes the file name a given name hint maps to, so callers that
    /// need to predict a name before it's written (e.g. a `TransactionalQueue`
    /// recording it in `mem` ahead of commit) stay in sync with this module's
    /// naming convention.
    pub fn name_for_hint(hint: &str) -> String { format!("{}.{}", hint, ITEM_EXT) }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }
    pub fn names(&self) -> &[String] { &self.order }

    /// Reads and decodes item `index` without removing it.
    pub fn get(&self, index: usize) -> Result<BlackboardItem, Error> {
        let name = self.order.get(index).ok_or_else(|| Error::UnknownName(format!("index {}", index)))?;
        self.read_named(name)
    }

    fn read_named(&self, name: &str) -> Result<BlackboardItem, Error> {
        let path = self.item_path(name);
        let text = fs::read_to_string(&path).map_err(|err| Error::ReadItem { path: path.clone(), err })?;
        BlackboardItem::from_record(&text).map_err(|err| Error::DecodeItem { path, err })
    }

    /// Appends `item` under a freshly-minted file name, writing it via the
    /// add-then-rename protocol and updating the order list. Returns the
    /// name it was stored under.
    pub fn append(&mut self, item: &BlackboardItem, name_hint: &str) -> Result<String, Error> {
        let name = format!("{}.{}", name_hint, ITEM_EXT);
        let path = self.item_path(&name);
        let result = shrfs::write_atomic(&path, item.to_record());
        match result {
            Ok(()) => {
                self.order.push(name.clone());
                if let Err(err) = self.rewrite_order() {
                    self.order.pop();
                    let _ = shrfs::remove_atomic(&path);
                    return Err(err);
                }
                debug!("appended '{}' to queue directory '{}'", name, self.dir.display());
                Ok(name)
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts `item` at position `index`, or appends it if `index` is out
    /// of range, per the primitive's documented fallback.
    pub fn insert_at(&mut self, item: &BlackboardItem, index: usize, name_hint: &str) -> Result<String, Error> {
        if index >= self.order.len() { return self.append(item, name_hint); }

        let name = format!("{}.{}", name_hint, ITEM_EXT);
        let path = self.item_path(&name);
        shrfs::write_atomic(&path, item.to_record())?;
        self.order.insert(index, name.clone());
        if let Err(err) = self.rewrite_order() {
            self.order.remove(index);
            let _ = shrfs::remove_atomic(&path);
            return Err(err);
        }
        Ok(name)
    }

    /// Removes and returns the item at `index`.
    pub fn pop(&mut self, index: usize) -> Result<BlackboardItem, Error> {
        let name = self.order.get(index).cloned().ok_or_else(|| Error::UnknownName(format!("index {}", index)))?;
        let item = self.read_named(&name)?;

        self.order.remove(index);
        if let Err(err) = self.rewrite_order() {
            self.order.insert(index, name);
            return Err(err);
        }
        shrfs::remove_atomic(self.item_path(&name))?;
        Ok(item)
    }

    /// Removes every item in the queue.
    pub fn remove_all(&mut self) -> Result<(), Error> {
        let names = std::mem::take(&mut self.order);
        self.rewrite_order()?;
        for name in names {
            shrfs::remove_atomic(self.item_path(&name))?;
        }
        Ok(())
    }

    /// Reads every item in order. Used to hydrate a `MemQueue` snapshot
    /// when a `TransactionalQueue` is first opened.
    pub fn read_all(&self) -> Result<Vec<(String, BlackboardItem)>, Error> {
        self.order.iter().map(|name| Ok((name.clone(), self.read_named(name)?))).collect()
    }
}
