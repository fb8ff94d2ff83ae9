//! Push-based live observation of store queries.
//!
//! # Responsibility
//! - Announce committed mutations on an in-process change bus.
//! - Re-evaluate registered queries when a relevant table changes and fan
//!   the fresh snapshot out to every subscriber.
//!
//! # Invariants
//! - One driver task per live query; subscribers share its result.
//! - Dropping the last handle of a live query stops its driver.
//! - A query evaluation never runs on the mutating caller's thread.

pub mod bus;
pub mod query;

pub use bus::{Change, ChangeBus, Table};
pub use query::{combine_latest, LiveQuery, Snapshot, Subscription};
