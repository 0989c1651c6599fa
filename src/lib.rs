//! Fetch-cache-extract pipeline for a terminal news reader.
//!
//! Sources are fetched concurrently with per-source failure isolation and
//! fallback to the SQLite article cache; full article text is extracted
//! lazily with a bounded number of pipelines in flight.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod http;
pub mod models;
pub mod services;
