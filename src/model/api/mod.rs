//! API-friendly types: request bodies, response views and request guards.
//!
//! Response types render IDs as hex strings via [`id::ApiId`].

pub mod admin;
pub mod auth;
pub mod election;
pub mod id;
pub mod log;
pub mod pagination;
pub mod voter;
