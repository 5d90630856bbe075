//! Events emitted by loop tasks to the coordinator.

use crate::transport::QueryKind;
use joblist_types::{ConsistencyIndex, ContinuationToken, DetailSnapshot, JobIdSet, JobRecord};

/// A new page membership observed by the listing loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IdChange {
    pub ids: JobIdSet,
    /// Listing rows for the new members, shown until details arrive.
    pub records: Vec<JobRecord>,
}

impl IdChange {
    pub fn from_records(records: Vec<JobRecord>) -> Self {
        Self {
            ids: JobIdSet::from_records(&records),
            records,
        }
    }
}

/// Something a loop task wants the coordinator to know.
///
/// Every event carries the generation of the loop that produced it; the
/// coordinator drops events from generations it has since replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// A successful listing cycle.
    Listing {
        generation: u64,
        /// First result since the loop was (re)started at index zero.
        initial: bool,
        index: ConsistencyIndex,
        next_token: Option<ContinuationToken>,
        /// Present only when membership differs from the previous cycle.
        change: Option<IdChange>,
    },
    /// A details cycle whose snapshot differs from the previous one.
    Details {
        generation: u64,
        index: ConsistencyIndex,
        snapshot: DetailSnapshot,
    },
    /// The backend denied a query; the loop has stopped.
    Forbidden {
        generation: u64,
        kind: QueryKind,
        reason: String,
    },
}
