//! Typed integration contracts for the ballast effect runtime.
//!
//! A contract is the declarative description of one external integration: which
//! protocol it speaks, how to reach it, which named operations it offers, and which
//! resilience policy guards calls to it. This crate owns the schema, load-time
//! validation, and per-call input validation. Executing operations against a live
//! dependency is `ballast-runtime`'s job.
//!
//! Contracts deserialize from JSON or YAML strings; fetching them from files or
//! storage is deliberately left to the embedder.

pub mod error;
pub mod model;
pub mod validate;
