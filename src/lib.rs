//! Ticker Scraper
//!
//! Queue-driven worker that searches a social site for ticker symbols through
//! a remote Chrome session and stores the collected posts back on the job,
//! plus a small HTTP API for submitting tickers and reading results.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
