//! PaperTrader Core: domain types, indicators, sizing, strategy, broker simulation.
//!
//! This crate simulates one instrument at a time:
//! - Domain types (bars, orders, fills, positions, trades)
//! - EMA/ATR indicators precomputed per instrument
//! - Percent-risk position sizing
//! - EMA crossover strategy state machine with bracket exits
//! - Bar-driven broker simulator with OCO bracket resolution
//! - Bar providers (CSV, synthetic) and the live execution gateway boundary

pub mod data;
pub mod domain;
pub mod engine;
pub mod gateway;
pub mod indicators;
pub mod sizers;
pub mod strategy;
