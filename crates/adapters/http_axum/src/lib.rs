//! # adpilot-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **rule CRUD API** (`/api/rules`, `/api/rule-templates`, …)
//! - Trigger manual rule executions through the [`RuleRunner`] driving port
//! - Stream domain events to browsers over **Server-Sent Events**
//! - Map application errors into JSON error bodies with matching status codes
//!
//! ## Dependency rule
//! Depends on `adpilot-app` (for port traits and services) and `adpilot-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.
//!
//! [`RuleRunner`]: adpilot_app::ports::RuleRunner

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
mod test_support;
