//! Data models for the team members backend.
//!
//! The serialized shape of these models is the public contract of the REST API.

mod team_member;

pub use team_member::*;
