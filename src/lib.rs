//! Vessel position tracker
//!
//! Live AIS position reports flow through a bounded worker pool into a
//! partitioned log, are persisted as the latest position per vessel, and are
//! projected into a search index.

pub mod collector;
pub mod config;
pub mod database;
pub mod errors;
pub mod feed;
pub mod log;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod service;
