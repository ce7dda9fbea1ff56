//! workflow-runtime: queue-driven workflow execution
//!
//! Pulls job ids from a [`queue::JobSource`], runs a [`workflow::Workflow`]
//! for each one inside its own task-local [`fixture`] scope, and relays
//! every step update into the job's record in a [`store::JobStore`].

pub mod cli;
pub mod config;
pub mod error;
pub mod fixture;
pub mod hooks;
pub mod logging;
pub mod queue;
pub mod runtime;
pub mod store;
pub mod workflow;
