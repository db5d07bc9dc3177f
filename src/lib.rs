//! PriceFeed Library
//!
//! Redundant two-source price oracle with a failover state machine

pub mod config;
pub mod oracle;
pub mod persistence;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;
