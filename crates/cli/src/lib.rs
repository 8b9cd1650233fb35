//! Scheduled lifecycle management of ZeroSSL IP-address certificates.
//!
//! Runs from cron: issues certificates for newly configured identities,
//! renews the ones the CA reports as expiring soon, publishes key and
//! chain to operator paths, and drives operator hook scripts for
//! domain validation and post-issuance actions.
//!
//! # Architecture
//!
//! - [`Config`] - YAML run configuration (one entry per identity)
//! - [`StateStore`] - durable mapping from configuration identity to
//!   the most recent remote certificate, making reruns idempotent
//! - [`Orchestrator`] - the per-certificate workflow state machine
//! - [`hooks`] - operator script execution with a fixed env contract

pub mod config;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod state;

pub use config::{CertConfig, Config};
pub use orchestrator::Orchestrator;
pub use state::{CertificateRecord, StateStore};
