//! # freqct-core
//!
//! **Two-dimensional frequency contingency tables.**
//!
//! A table cross-tabulates the values of two corpus attributes, e.g. word form
//! × part of speech. Every non-empty combination is a [`Cell`] with its
//! absolute frequency, its frequency per million tokens of the cell's domain,
//! and Wilson confidence intervals for both.
//!
//! ## Quick Start
//!
//! ```
//! use freqct_core::{Command, CtDataResponse, CtParams, CtableState};
//!
//! let resp: CtDataResponse = serde_json::from_str(r#"{
//!     "data": [["cat", "NN", 10, 1000], ["cat", "VB", 2, 1000]],
//!     "full_size": 2,
//!     "ctfreq_form_args": {"ctminfreq": "1", "ctminfreq_type": "abs"}
//! }"#).unwrap();
//!
//! let state = CtableState::new(CtParams::new("word", "tag"));
//! let (state, _effects) = state.reduce(Command::ImportData(resp));
//! assert_eq!(state.matrix.cell("cat", "NN").unwrap().ipm, Some(10000.0));
//! assert_eq!(state.flat.rows().len(), 2);
//! ```
//!
//! ## Architecture
//!
//! Response → [`MatrixProjection`] (import) → [`CtSnapshot`] → [`FlatProjection`]
//!
//! - The **matrix projection** holds the nested table, label visibility,
//!   per-dimension sorting, transposition and heatmap colors. It is the only
//!   projection that imports server data.
//! - The **flat projection** is rebuilt from every snapshot and sorts its rows
//!   on its own.
//! - [`CtableState`] owns both and is driven by [`Command`]s through a pure
//!   reducer. Network work is returned as [`Effect`]s for a controller to run.
//!
//! Cell math shared by both projections lives in [`base`] as plain functions.

pub mod base;
pub mod config;
pub mod error;
pub mod export;
pub mod flat;
pub mod form;
pub mod heatmap;
pub mod matrix;
pub mod model;
pub mod params;
pub mod state;
pub mod subcorpus;

pub use base::{
    MinFreqPredicate, calc_ipm, generate_pfilter, make_cell, min_freq_filter, pfilter_query,
    rank_map,
};
pub use config::{FreqctConfig, load_config_from_path};
pub use error::CtableError;
pub use export::{
    ExportPayload, FlatExport, FlatExportRow, GroupItem, MatrixExport, MatrixExportCell,
};
pub use flat::FlatProjection;
pub use form::{
    Alignment, CtFormModel, Position, decode_position, encode_position, validate_min_freq,
    validate_struct_attrs,
};
pub use freqct_stats::{AlphaLevel, wilson_conf_interval};
pub use heatmap::COLOR_RAMP;
pub use matrix::MatrixProjection;
pub use model::{
    Cell, ColorMapping, CtDataResponse, CtDataRow, CtFreqFormArgs, CtQuery, CtSnapshot,
    Dimension, FlatCell, FlatSortColumn, Label, MinFreqFilter, MinFreqType, Quantity,
    SortCriterion, Table, ViewMode,
};
pub use params::CtParams;
pub use state::{Command, CtableState, Effect, reduce};
pub use subcorpus::{
    AdHocSubcorpusDetector, NoSubcorpus, StaticSelection, adhoc_subcorpus_warning,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
