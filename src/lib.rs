//! Activity-level core for finite-capacity production scheduling.
//!
//! Provides the activity record, its production-status state machine, the
//! reconciliation of updates from interactive edits, automated transmissions
//! and simulation, and the drum-buffer-rope (DBR) / JIT buffer model used for
//! release decisions. Placement of activities on a timeline is done by an
//! external scheduler, which this crate sees only through [`models::Batch`].
//!
//! # Modules
//!
//! - **`models`**: Domain types: `InternalActivity`, `BaseActivity`,
//!   `ProductionStatus`, `BufferInfo`, `ResourceLocks`, `ProductionInfoOverride`
//! - **`scenario`**: Per-call context, options, change tracking and effects
//! - **`reconcile`**: Internal, external and new-activity update merges
//! - **`transmission`**: Inbound ERP/MES and UI directives
//! - **`manager`**: Ordered activity set with split and un-split
//! - **`persistence`**: Version-tagged binary format
//! - **`validation`**: Coded validation errors and integrity checks
//! - **`error`**: Crate error type
//!
//! # Architecture
//!
//! Every mutating call takes an [`scenario::ActivityContext`] for read-only
//! scenario state, an [`scenario::ActivityEffects`] buffer for requests to
//! collaborators (unschedule, inventory, history), and a
//! [`scenario::DataChanges`] tracker the caller uses to notify dependents.
//! The host serializes writers per scenario; nothing here takes a global lock.
//!
//! # References
//!
//! - Goldratt & Cox (1984), "The Goal"
//! - Schragenheim & Dettmer (2000), "Manufacturing at Warp Speed"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod error;
pub mod manager;
pub mod models;
pub mod persistence;
pub mod reconcile;
pub mod scenario;
pub mod transmission;
pub mod validation;

pub use error::{ActivityError, ErrorKind, Result};
