//! Loan pricing mathematics.
//!
//! [`amortization`] generates constant-installment schedules and their
//! summary totals; [`irr`] hosts the bounded root-finder behind the
//! effective-annual-cost figure; [`common`] pins the rounding policy and
//! day-count convention everything else relies on.

pub mod amortization;
pub mod common;
pub mod irr;

pub use amortization::{AmortizationEngine, AmortizationError, AmortizationResult, monthly_rate};
pub use irr::{IrrError, periodic_irr};
