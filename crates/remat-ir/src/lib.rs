#![warn(missing_docs)]
//! Execution-plan model for the remat schedule optimizer.
//!
//! A traced training iteration arrives as a flat list of operator
//! records over a table of operand descriptors. This crate owns that
//! model: arena-backed [`Operand`]s, [`Task`] occurrences, the
//! [`Schedule`] stream, the shared [`Common`] context, and the JSON
//! wire format. Analyses and rewrites live in sibling crates and keep
//! all their per-pass state outside these types.

pub mod arena;
mod display;
mod error;
pub mod json;
mod operand;
mod schedule;
mod task;

pub use arena::{Arena, Handle};
pub use display::{pretty_bytes, pretty_duration};
pub use error::LoadError;
pub use json::{read_case, write_case};
pub use operand::Operand;
pub use schedule::{Common, Schedule, HASH_BASE};
pub use task::{Task, DEALLOC, FORBIDDEN, SHARE};
