//! Blocking-query watch and pagination engine for a cluster's job list.
//!
//! Keeps a paginated view of a large, mutating job list fresh against a
//! backend whose queries block until data newer than a given consistency
//! index exists.
//!
//! # Architecture
//!
//! Two long-poll loops cooperate:
//!
//! - **Listing loop** ([`IdWatchLoop`]): cheap query for which jobs are on the
//!   current page. Reports the continuation token and membership changes.
//! - **Details loop** ([`DetailWatchLoop`]): expensive query for full records
//!   of exactly those jobs. Restarted from index zero whenever the applied
//!   membership changes.
//!
//! Between them sits the [`LiveUpdateGate`], which either applies a
//! membership change at once or holds it until the user asks for it. The
//! [`CursorPaginator`] owns the page position, and the [`WatchCoordinator`]
//! wires everything together and exposes the read model.
//!
//! ## Guarantees
//!
//! 1. At most one request in flight per loop; a superseded request is
//!    cancelled and its late result discarded
//! 2. Each loop's consistency index never decreases, and failures never
//!    advance it
//! 3. Transient failures stall and retry; authorization denials stop the
//!    watch for the scope
//! 4. A failed cycle never blanks what is displayed
//!
//! # Example
//!
//! ```
//! use joblist_watch::{MemoryPreferences, MockTransport, WatchConfig, WatchCoordinator};
//! use std::sync::Arc;
//!
//! let coordinator = WatchCoordinator::new(
//!     Arc::new(MockTransport::new()),
//!     Arc::new(MemoryPreferences::new()),
//!     WatchConfig::headless(),
//! );
//! assert_eq!(coordinator.config().default_page_size, 10);
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod detail_loop;
mod error;
pub mod event;
pub mod gate;
pub mod handle;
pub mod http;
pub mod id_loop;
pub mod paginator;
pub mod prefs;
pub mod throttle;
pub mod transport;

pub use client::{BlockingQueryClient, QueryChannel};
pub use config::{WatchConfig, DEFAULT_PAGE_SIZE, JOB_DETAILS_THROTTLE_MS, JOB_LIST_THROTTLE_MS};
pub use coordinator::{PageRow, PageView, WatchCoordinator, WatchNotification};
pub use detail_loop::DetailWatchLoop;
pub use error::{WatchError, WatchResult};
pub use event::{IdChange, LoopEvent};
pub use gate::{GateDecision, LiveUpdateGate};
pub use handle::{LoopState, LoopStatus, WatchHandle};
pub use http::{HttpConfig, HttpTransport};
pub use id_loop::{IdWatchLoop, ListingSeed};
pub use paginator::CursorPaginator;
pub use prefs::{MemoryPreferences, PreferenceStore, SqlitePreferences, WatchPreferences};
pub use throttle::Throttle;
pub use transport::mock::{MockReply, MockTransport};
pub use transport::{QueryKind, QueryMeta, QueryResult, QueryTransport, RequestSpec};
