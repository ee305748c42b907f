//! Delivery coordinator
//!
//! A single task owns the store, observes connectivity and runs at most one
//! delivery loop at a time. Callers talk to it through the cloneable
//! [`Coordinator`] handle and observe it through a watch channel of
//! [`CoordinatorState`] snapshots.
//!
//! # Architecture
//!
//! ```text
//!   Coordinator (handle) ──requests──▶ CoordinatorTask ──spawns──▶ delivery worker
//!          ▲                               │    ▲                        │
//!          └────── watch<CoordinatorState> ┘    └── StillQueued/Delivered┘
//! ```
//!
//! The task is the only writer of the store. Workers never touch it
//! directly; they ask the task to remove a message after each confirmed
//! delivery.

mod classify;
mod config;
mod core;
mod delivery;
mod handle;
mod messages;
mod state;

pub use classify::{FailureClass, TRANSIENT_SIGNATURES, classify, is_transient};
pub use config::CoordinatorConfig;
pub use handle::Coordinator;
pub use messages::{CoordResult, CoordinatorError, LoopExit, LoopReport};
pub use state::{CoordinatorState, Inputs, Status, combine, should_start_delivery};
