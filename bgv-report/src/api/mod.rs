//! HTTP handlers
//!
//! Thin axum handlers over the aggregation facade. The wider platform's
//! gateway owns authentication and route wiring; these endpoints only shape
//! path/query parameters into facade calls and map errors to status codes.

pub mod applications;
pub mod health;
pub mod invoice;
pub mod tracker;
