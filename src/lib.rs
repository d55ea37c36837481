//! Streaming quality control of GWAS summary statistics.
//!
//! Files are described by a script ([`script`]), validated ([`qc`]) and
//! analysed in a single pass ([`analyzer`]) by per-column accumulators
//! ([`meta`]). Region annotation ([`annotator`]) and genomic-control
//! formatting ([`formatter`]) are separate passes over the same inputs, and
//! [`nearest`] answers nearest-region and region-to-marker queries.

pub mod error;
pub mod logging;
pub mod types;

pub mod expression;
pub mod io;
pub mod parallel;
pub mod plot_utils;
pub mod plots;
pub mod qc;
pub mod schema;
pub mod script;
pub mod stats;

pub mod analyzer;
pub mod annotator;
pub mod dependency;
pub mod formatter;
pub mod interval_tree;
pub mod meta;
pub mod nearest;
pub mod report;
