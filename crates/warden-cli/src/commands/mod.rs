//! CLI command implementations.

pub mod config;
pub mod policy;
pub mod policy_set;
