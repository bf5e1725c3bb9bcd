//! Phase grouping and ordering.
//!
//! Entries are bucketed by their `phase` tag and the buckets are sorted
//! into the order the pipeline will mount them. The comparator works off
//! the caller-configured phase list:
//!
//! - both phases configured: configured index decides;
//! - one configured: the *unconfigured* one sorts first (its index is
//!   treated as −1, which is less than any real index);
//! - neither configured: lexicographic by phase name.
//!
//! Unconfigured phases sorting first is a deliberate compatibility choice,
//! so default-phase entries run ahead of every configured phase unless the
//! empty string is itself placed in the order list.
//!
//! The reserved phases `ERROR` and `FINAL` are appended to every configured
//! order, in that relative order. Any earlier mention of them in the
//! caller's list is dropped first, so they always land in the last two
//! positions.

use std::cmp::Ordering;

use crate::registry::Entry;

/// The phase error-variant registrations are forced into. Sorts after every
/// caller-configured phase.
pub const ERROR_PHASE: &str = "ERROR";

/// The phase that sorts after everything, `ERROR` included.
pub const FINAL_PHASE: &str = "FINAL";

/// A named bucket of entries, in registration order.
pub(crate) struct Phase {
    pub(crate) name: String,
    pub(crate) entries: Vec<Entry>,
}

/// The caller's phase order with the reserved phases appended last.
pub(crate) fn order_with_reserved(configured: &[String]) -> Vec<String> {
    let mut order: Vec<String> = configured
        .iter()
        .filter(|name| *name != ERROR_PHASE && *name != FINAL_PHASE)
        .cloned()
        .collect();
    order.push(ERROR_PHASE.to_owned());
    order.push(FINAL_PHASE.to_owned());
    order
}

/// Buckets `entries` by phase tag and sorts the buckets.
///
/// Within a bucket, entries keep their registration order no matter how
/// often the pipeline is rebuilt from the same snapshot.
pub(crate) fn resolve(entries: &[Entry], order: &[String]) -> Vec<Phase> {
    let mut phases: Vec<Phase> = Vec::new();
    for entry in entries {
        match phases.iter_mut().find(|p| p.name == entry.phase()) {
            Some(phase) => phase.entries.push(entry.clone()),
            None => phases.push(Phase { name: entry.phase().to_owned(), entries: vec![entry.clone()] }),
        }
    }
    phases.sort_by(|a, b| compare(order, &a.name, &b.name));
    phases
}

/// Index of `name` in the configured order, with −1 standing in for
/// "not configured".
fn index_of(order: &[String], name: &str) -> isize {
    order
        .iter()
        .position(|candidate| candidate == name)
        .map_or(-1, |i| i as isize)
}

fn compare(order: &[String], a: &str, b: &str) -> Ordering {
    let ia = index_of(order, a);
    let ib = index_of(order, b);
    if ia != -1 || ib != -1 {
        ia.cmp(&ib)
    } else {
        a.cmp(b)
    }
}
