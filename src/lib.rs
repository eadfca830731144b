//! Popular pages report engine.
//!
//! Turns a stream of assessed page rows (each target page with its redirects)
//! into a ranked list of the most viewed pages for a date range, summing the
//! views of every redirect into its target.

pub mod aggregate;
pub mod app;
pub mod batch;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod json;
pub mod logging;
pub mod pageviews;
pub mod project;
pub mod rank;
pub mod report;
pub mod rows;
pub mod title;
pub mod utils;
