//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Each `*Core` type is the row without its ID, used for inserts.

pub mod admin;
pub mod candidate;
pub mod election;
pub mod log;
pub mod voter;
