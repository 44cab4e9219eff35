//! Flat projection: one sortable row per cell.
//!
//! Holds the same cells as the matrix projection, received as a
//! [`CtSnapshot`], and filters and orders them on its own. It never imports
//! server data directly.

use std::cmp::Ordering;
use std::sync::Arc;

use freqct_stats::AlphaLevel;

use crate::base::{caseless_cmp, min_freq_filter, with_alpha};
use crate::error::CtableError;
use crate::export::{FlatExport, FlatExportRow};
use crate::model::{CtSnapshot, FlatCell, FlatSortColumn, MinFreqFilter, Quantity};
use crate::params::CtParams;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatProjection {
    params: CtParams,
    /// Every cell of the snapshot, in `orig_order`.
    origin: Vec<FlatCell>,
    /// Filtered and sorted rows.
    data: Vec<FlatCell>,
    sort_by: FlatSortColumn,
    sort_reversed: bool,
}

impl FlatProjection {
    pub fn new(params: CtParams) -> Self {
        Self {
            params,
            origin: Vec::new(),
            data: Vec::new(),
            sort_by: FlatSortColumn::default(),
            sort_reversed: false,
        }
    }

    /// Projection over `snapshot` with the default ordering.
    pub fn from_snapshot(snapshot: &Arc<CtSnapshot>) -> Self {
        Self::new(snapshot.params.clone()).with_snapshot(snapshot)
    }

    /// Replace the cells wholesale, keeping the current ordering.
    ///
    /// An ipm ordering falls back to abs when the new table has no ipm.
    pub fn with_snapshot(&self, snapshot: &Arc<CtSnapshot>) -> Self {
        let mut origin = snapshot.cells.clone();
        origin.sort_by_key(|c| c.cell.orig_order);
        let sort_by = if self.sort_by == FlatSortColumn::Ipm && !snapshot.params.has_ipm() {
            FlatSortColumn::Abs
        } else {
            self.sort_by
        };
        Self {
            params: snapshot.params.clone(),
            origin,
            data: Vec::new(),
            sort_by,
            sort_reversed: self.sort_reversed,
        }
        .refreshed()
    }

    pub fn params(&self) -> &CtParams {
        &self.params
    }

    /// Rows passing the filter, in display order.
    pub fn rows(&self) -> &[FlatCell] {
        &self.data
    }

    /// Every held cell regardless of the filter.
    pub fn cells(&self) -> &[FlatCell] {
        &self.origin
    }

    pub fn sort_by(&self) -> FlatSortColumn {
        self.sort_by
    }

    pub fn sort_reversed(&self) -> bool {
        self.sort_reversed
    }

    pub fn with_alpha_level(&self, level: AlphaLevel) -> Self {
        let mut params = self.params.clone();
        params.alpha_level = level;
        let origin = self
            .origin
            .iter()
            .map(|c| FlatCell {
                cell: with_alpha(&c.cell, level),
                ..c.clone()
            })
            .collect();
        Self {
            params,
            origin,
            ..self.clone()
        }
        .refreshed()
    }

    pub fn with_min_freq(&self, filter: MinFreqFilter) -> Result<Self, CtableError> {
        self.params.ensure_quantity(filter.kind.quantity())?;
        let mut params = self.params.clone();
        params.min_freq = filter;
        Ok(Self {
            params,
            ..self.clone()
        }
        .refreshed())
    }

    /// Order by `column`; picking the current column again flips the direction.
    pub fn sorted_by(&self, column: FlatSortColumn) -> Result<Self, CtableError> {
        let reversed = column == self.sort_by && !self.sort_reversed;
        self.with_sort(column, reversed)
    }

    pub fn with_sort(&self, column: FlatSortColumn, reversed: bool) -> Result<Self, CtableError> {
        if column == FlatSortColumn::Ipm {
            self.params.ensure_quantity(Quantity::Ipm)?;
        }
        let mut next = Self {
            sort_by: column,
            sort_reversed: reversed,
            ..self.clone()
        };
        next.sort_rows();
        Ok(next)
    }

    pub fn export_data(&self) -> FlatExport {
        let headings = [
            self.params.attr1.as_str(),
            self.params.attr2.as_str(),
            "abs lo",
            "abs",
            "abs hi",
            "ipm lo",
            "ipm",
            "ipm hi",
        ]
        .map(String::from)
        .to_vec();
        let data = self
            .data
            .iter()
            .map(|fc| {
                let c = &fc.cell;
                let (lo_abs, hi_abs) = c.abs_conf_interval;
                FlatExportRow(
                    fc.val1.clone(),
                    fc.val2.clone(),
                    lo_abs,
                    c.abs,
                    hi_abs,
                    c.ipm_conf_interval.map(|i| i.0),
                    c.ipm,
                    c.ipm_conf_interval.map(|i| i.1),
                )
            })
            .collect();
        FlatExport {
            headings,
            min_freq: self.params.min_freq.threshold,
            min_freq_type: self.params.min_freq.kind,
            alpha_level: self.params.alpha_level,
            data,
        }
    }

    fn refreshed(mut self) -> Self {
        let predicate = min_freq_filter(
            self.params.min_freq,
            self.params.full_size,
            self.origin.iter().map(|c| &c.cell),
        );
        self.data = self
            .origin
            .iter()
            .filter(|c| predicate.accepts(&c.cell))
            .cloned()
            .collect();
        self.sort_rows();
        self
    }

    fn sort_rows(&mut self) {
        let column = self.sort_by;
        let reversed = self.sort_reversed;
        self.data.sort_by(|a, b| {
            let primary = match column {
                FlatSortColumn::Attr1 => {
                    caseless_cmp(&a.val1, &b.val1).then_with(|| caseless_cmp(&a.val2, &b.val2))
                }
                FlatSortColumn::Abs => b.cell.abs.cmp(&a.cell.abs),
                FlatSortColumn::Ipm => b
                    .cell
                    .value(Quantity::Ipm)
                    .total_cmp(&a.cell.value(Quantity::Ipm)),
            };
            let primary = if reversed { primary.reverse() } else { primary };
            match primary {
                Ordering::Equal => a.cell.orig_order.cmp(&b.cell.orig_order),
                other => other,
            }
        });
    }
}
