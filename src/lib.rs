//! civicpulse - safety-governed attention-state engine for civic signals
//!
//! Aggregated civic signal clusters pass a fixed pipeline of safety gates
//! before anything becomes visible; per-area state machines track what the
//! outcome means for each monitored area; a governance overlay keeps
//! thresholds unpredictable and silence explainable; and a tiered
//! WebSocket channel delivers the result with per-tier delay and
//! redaction.

pub mod audit;
pub mod cli;
pub mod config;
pub mod disclosure;
pub mod engine;
pub mod governance;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod realtime;
pub mod tier;
