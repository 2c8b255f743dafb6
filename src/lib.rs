//! risk-ledger: fixed-fractional position sizing with an auditable trail
//!
//! This library provides the core components for:
//! - Van Tharp position sizing on fixed-point decimals
//! - A hash-verified ledger of every sizing calculation
//! - Position lifecycle with optimistic concurrency
//! - An append-only OODA execution audit trail
//! - P&L and R-multiple metrics
//! - Paper decision cycles against a market feed and exchange
//! - Parquet archival of historical records
//! - Structured logging and Prometheus metrics

pub mod account;
pub mod archive;
pub mod audit;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod market;
pub mod money;
pub mod pnl;
pub mod position;
pub mod risk;
pub mod storage;
pub mod telemetry;
pub mod types;
