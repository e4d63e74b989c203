//! sigstat: process-capability statistics per SKU
//!
//! Computes mean, variance, standard deviation and sigma level from raw
//! measurements and keeps them in a SQLite specification table keyed by SKU.

pub mod cli;
pub mod core;
