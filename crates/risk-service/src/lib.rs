//! Command-line front end of the liquidity risk engine.
//!
//! # Components
//!
//! - `cli`: argument definitions
//! - `commands`: engine assembly and query execution
//! - `telemetry`: tracing subscriber setup
//!
//! Query results are printed as JSON on stdout; logs go to stderr.

pub mod cli;
pub mod commands;
pub mod telemetry;
