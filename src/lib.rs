//! palisade: input validation security gateway
//!
//! Inspects a single text input for known attack patterns (SQL injection,
//! command injection, XSS, path traversal), aggregates the matches into a
//! risk score, and renders an explainable allow/warn/block decision. The
//! pipeline is wrapped in a fail-safe layer: any internal fault degrades to
//! a structured block report, never a raw error.

pub mod ai;
pub mod audit;
pub mod cli;
pub mod config;
pub mod decision;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod sanitize;
pub mod scorer;
pub mod severity;
