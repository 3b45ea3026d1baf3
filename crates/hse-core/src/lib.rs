//! Core types and trait definitions for the HSE KPI tracker.
//!
//! Storage backends implement [`store::KpiStore`]; the grid projection,
//! analytics and value update protocol are written against that trait and
//! know nothing of HTTP or SQL.

pub mod activity;
pub mod analytics;
pub mod catalog;
pub mod change;
pub mod error;
pub mod grid;
pub mod protocol;
pub mod store;
pub mod value;

pub use error::{Error, Result};
