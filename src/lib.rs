//! mamoru-cli: scaffold, validate and publish Mamoru monitoring agents
//!
//! Agents are described by a `manifest.yml` (plus `queries.yml` for SQL
//! agents) and registered as daemon metadata on the Validation Chain.
//! Publishing a non-subscribable agent also registers a daemon on a chain
//! and assigns it to the caller's organization.

pub mod cli;
pub mod config;
pub mod field_type;
pub mod ledger;
pub mod manifest;
pub mod organization;
pub mod publish;
pub mod retry;
pub mod schema;
