//! The three logical tables of local persistence.
//!
//! * [`OperationStore`] — append-only operations keyed by the compound
//!   `(oid, timestamp)`, with a secondary per-document order so document scans
//!   come back in timestamp order.
//! * [`BaselineStore`] — one folded snapshot per sub-object id.
//! * [`InfoStore`] — singleton rows: the local replica, the global ack
//!   watermark, and the stored schema.
//!
//! The stores are plain data structures with no locking of their own; the
//! metadata façade owns all three behind a single lock, which is what makes a
//! multi-store write one atomic transaction.

mod baselines;
mod info;
mod operations;

pub use baselines::{Baseline, BaselineStore};
pub use info::{InfoStore, LocalReplicaInfo, Schema};
pub use operations::{OperationStore, StoredOperation};
