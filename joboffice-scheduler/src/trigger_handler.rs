//  TRIGGER_HANDLER.rs
//    by Ray Plante
//
//  Description:
//!   Implements `TriggerHandler`: the per-job countdown set that tracks
//!   which prerequisite datasets a still-forming job is waiting on.

use std::collections::BTreeSet;

use specifications::dataset::Dataset;


/***** LIBRARY *****/
/// Tracks the canonical-string identities of the datasets a job is still
/// waiting on. Constructed from the full list a `Trigger::list_datasets`
/// call produces; shrinks towards empty as matching datasets are observed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerHandler {
    missing: BTreeSet<String>,
}

impl TriggerHandler {
    /// Seeds a handler with the canonical identities of every dataset in
    /// `needed`.
    pub fn new(needed: &[Dataset]) -> Self {
        Self { missing: needed.iter().map(|ds| ds.to_canonical_string(false)).collect() }
    }

    /// Records receipt of `ds`. Returns `true` iff `ds` was in the missing
    /// set (i.e. this handler was actually waiting on it); never increases
    /// the missing count.
    pub fn add_dataset(&mut self, ds: &Dataset) -> bool {
        self.missing.remove(&ds.to_canonical_string(false))
    }

    /// True iff every prerequisite has been observed.
    pub fn is_ready(&self) -> bool { self.missing.is_empty() }

    /// The number of prerequisites still outstanding.
    pub fn missing_count(&self) -> usize { self.missing.len() }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn ds(visit: i64) -> Dataset { Dataset::new("raw").with_id("visit", visit) }

    #[test]
    fn ready_exactly_when_count_reaches_zero() {
        let mut h = TriggerHandler::new(&[ds(1), ds(2)]);
        assert!(!h.is_ready());
        assert_eq!(h.missing_count(), 2);

        assert!(h.add_dataset(&ds(1)));
        assert!(!h.is_ready());
        assert_eq!(h.missing_count(), 1);

        assert!(h.add_dataset(&ds(2)));
        assert!(h.is_ready());
        assert_eq!(h.missing_count(), 0);
    }

    #[test]
    fn repeated_dataset_never_drops_count_below_zero() {
        let mut h = TriggerHandler::new(&[ds(1)]);
        assert!(h.add_dataset(&ds(1)));
        assert!(!h.add_dataset(&ds(1)));
        assert_eq!(h.missing_count(), 0);
        assert!(h.is_ready());
    }

    #[test]
    fn unrelated_dataset_is_not_accepted() {
        let mut h = TriggerHandler::new(&[ds(1)]);
        assert!(!h.add_dataset(&ds(99)));
        assert_eq!(h.missing_count(), 1);
    }
}
