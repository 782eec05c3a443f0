//! # revlink: entity signals from wiki revision dumps
//!
//! Extracts hyperlink anchor text from wiki markup, resolves page titles and
//! their redirect aliases to stable numeric ids, and joins/aggregates
//! per-entity monthly time series keyed by those ids.
//!
//! ## Architecture
//!
//! - **[`extractor`]**: `[[link]]` scanner over revision text
//! - **[`resolver`]**: title dictionary, redirect tables, canonical id map
//! - **[`series`]**: time-series parsing, inner join and positional aggregation
//! - **[`pipeline`]**: streaming stage runners over line sources and sinks
//! - **[`models`]**: revision and anchor records
//! - **[`config`]**: run parameters (month count, hop limit, sampling window)
//! - **[`io`]**: file/stdio line sources and sinks

pub mod config;
pub mod extractor;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod series;
