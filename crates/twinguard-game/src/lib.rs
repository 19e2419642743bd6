//! # twinguard-game
//!
//! Game-theoretic cost and strategy model for TwinGuard.
//!
//! This crate provides:
//! - **PayoffMatrix** / **SensitivityProfile**: per-mode payoff, risk and
//!   breach tables, swapped as a unit
//! - **price_packet**: table-driven cost of one packet
//! - **NashRouter**: advisory expected-payoff-optimal strategy per AP
//! - **StrategySchedule**: TRUST → VERIFY → AVOID rotation with per-strategy
//!   counters

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod payoff;
pub mod router;
pub mod schedule;
pub mod strategy;

pub use error::{GameError, Result};
pub use payoff::{
    price_packet, Payoff, PayoffMatrix, Pricing, RiskParams, Sensitivity, SensitivityParams,
    SensitivityProfile,
};
pub use router::{optimal_strategy, ExpectedPayoffs, NashRouter, RouterDecision};
pub use schedule::{PerStrategy, StrategyCounters, StrategySchedule, DEFAULT_WINDOW_MS};
pub use strategy::{Outcome, Strategy};
