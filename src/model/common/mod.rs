//! Types shared between the database and API representations.

pub mod action;
pub mod code;
pub mod role;
