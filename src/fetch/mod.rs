//! Grid fetching.
//!
//! This module provides the HTTP client that reads grid snapshots from a
//! CityIO endpoint and posts summaries to a result sink.

pub mod client;

pub use client::{FetchOptions, FetchedGrid, GridFetcher};
