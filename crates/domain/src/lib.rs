//! # adpilot-domain
//!
//! Pure domain model for the adpilot campaign automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **metric catalog** (fields, value types, windows, snapshots)
//! - Define **Rules** (condition expression → trust gate → governed actions)
//! - Evaluate condition expressions against metric snapshots (pure)
//! - Classify signal health through the **trust gate** (pure)
//! - Define immutable **Rule Executions** and their per-action results
//! - Define **Events** published when rules change or execute
//! - Ship the built-in **rule templates**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod event;
pub mod execution;
pub mod metric;
pub mod rule;
pub mod template;
