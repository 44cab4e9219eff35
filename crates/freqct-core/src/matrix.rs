//! Matrix projection: the nested table behind the heatmap view.
//!
//! The projection owns the origin table (every imported cell), the filtered
//! table (cells passing the minimum-frequency filter, colored) and an ordered
//! label list per dimension. Every operation returns a new projection; a
//! failing operation leaves the receiver untouched.
//!
//! This is the only projection that imports server data. Each import yields a
//! [`CtSnapshot`] from which the flat projection is rebuilt.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use freqct_stats::AlphaLevel;

use crate::base::{caseless_cmp, make_cell, min_freq_filter, with_alpha};
use crate::error::CtableError;
use crate::export::{GroupItem, MatrixExport, MatrixExportCell};
use crate::heatmap::assign_colors;
use crate::model::{
    Cell, ColorMapping, CtDataResponse, CtSnapshot, Dimension, FlatCell, Label, MinFreqFilter,
    NO_COLOR, Quantity, SortCriterion, Table,
};
use crate::params::CtParams;

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixProjection {
    params: CtParams,
    origin: Table,
    data: Table,
    labels1: Vec<Label>,
    labels2: Vec<Label>,
    hide_empty_vectors: bool,
    display_quantity: Quantity,
    color_mapping: ColorMapping,
    sort1: Option<SortCriterion>,
    sort2: Option<SortCriterion>,
}

impl MatrixProjection {
    /// Empty projection for `params`.
    pub fn new(params: CtParams) -> Self {
        Self {
            params,
            origin: Table::new(),
            data: Table::new(),
            labels1: Vec::new(),
            labels2: Vec::new(),
            hide_empty_vectors: false,
            display_quantity: Quantity::Abs,
            color_mapping: ColorMapping::Linear,
            sort1: None,
            sort2: None,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn params(&self) -> &CtParams {
        &self.params
    }

    pub fn origin(&self) -> &Table {
        &self.origin
    }

    /// Cells passing the current minimum-frequency filter.
    pub fn data(&self) -> &Table {
        &self.data
    }

    pub fn labels(&self, dim: Dimension) -> &[Label] {
        match dim {
            Dimension::Rows => &self.labels1,
            Dimension::Columns => &self.labels2,
        }
    }

    /// Visible label values of `dim` in display order.
    pub fn visible_labels(&self, dim: Dimension) -> Vec<&str> {
        self.labels(dim)
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.value.as_str())
            .collect()
    }

    /// Filtered cell at `val1` × `val2`.
    pub fn cell(&self, val1: &str, val2: &str) -> Option<&Cell> {
        self.data.get(val1).and_then(|row| row.get(val2))
    }

    pub fn hide_empty_vectors(&self) -> bool {
        self.hide_empty_vectors
    }

    pub fn display_quantity(&self) -> Quantity {
        self.display_quantity
    }

    pub fn color_mapping(&self) -> ColorMapping {
        self.color_mapping
    }

    pub fn sort_criterion(&self, dim: Dimension) -> Option<SortCriterion> {
        match dim {
            Dimension::Rows => self.sort1,
            Dimension::Columns => self.sort2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_empty()
    }

    /// Number of imported cells.
    pub fn origin_len(&self) -> usize {
        self.origin.values().map(HashMap::len).sum()
    }

    // -- import ---------------------------------------------------------------

    /// Rebuild the projection from a fetch response.
    ///
    /// `requested` is the filter the fetch was issued with; the filter the
    /// server echoes back becomes `server_min_freq` when it parses. Display
    /// settings and stored sort criteria carry over.
    pub fn import_data(
        &self,
        resp: &CtDataResponse,
        requested: MinFreqFilter,
    ) -> (Self, Arc<CtSnapshot>) {
        let mut params = self.params.clone();
        let echo = &resp.ctfreq_form_args;
        if let Some(attr1) = &echo.ctattr1 {
            params.attr1 = attr1.clone();
        }
        if let Some(attr2) = &echo.ctattr2 {
            params.attr2 = attr2.clone();
        }
        if let Some(crit) = echo.ctfcrit1.as_deref().and_then(|c| c.parse().ok()) {
            params.ctfcrit1 = crit;
        }
        if let Some(crit) = echo.ctfcrit2.as_deref().and_then(|c| c.parse().ok()) {
            params.ctfcrit2 = crit;
        }
        params.min_freq = requested;
        params.server_min_freq = MinFreqFilter::new(
            echo.ctminfreq_type
                .as_deref()
                .and_then(|t| t.parse().ok())
                .unwrap_or(requested.kind),
            echo.ctminfreq.parse().unwrap_or(requested.threshold),
        );
        params.full_size = resp.full_size;

        let mut origin = Table::new();
        let mut labels1: Vec<Label> = Vec::new();
        let mut labels2: Vec<Label> = Vec::new();
        let mut seen1: HashSet<String> = HashSet::new();
        let mut seen2: HashSet<String> = HashSet::new();
        let mut cells = Vec::with_capacity(resp.data.len());

        for (orig_order, row) in resp.data.iter().enumerate() {
            let (val1, val2) = (&row.0, &row.1);
            if origin.get(val1).is_some_and(|r| r.contains_key(val2)) {
                warn!("duplicate cell {val1:?} x {val2:?} in response, keeping the first");
                continue;
            }
            for (seen, labels, value) in [
                (&mut seen1, &mut labels1, val1),
                (&mut seen2, &mut labels2, val2),
            ] {
                if seen.insert(value.clone()) {
                    let orig_order = labels.len();
                    labels.push(Label {
                        value: value.clone(),
                        visible: true,
                        orig_order,
                    });
                }
            }
            let cell = make_cell(&params, orig_order, val1, val2, row.2, row.3);
            cells.push(FlatCell {
                val1: val1.clone(),
                val2: val2.clone(),
                cell: cell.clone(),
            });
            origin
                .entry(val1.clone())
                .or_default()
                .insert(val2.clone(), cell);
        }
        debug!(
            "imported {} cells ({} x {} labels, full size {})",
            cells.len(),
            labels1.len(),
            labels2.len(),
            params.full_size
        );

        // A display quantity the new data cannot carry falls back to abs.
        let display_quantity = if params.has_ipm() {
            self.display_quantity
        } else {
            Quantity::Abs
        };
        let drop_ipm_sort = |s: Option<SortCriterion>| {
            s.filter(|s| params.has_ipm() || *s != SortCriterion::Ipm)
        };
        let next = Self {
            origin,
            data: Table::new(),
            labels1,
            labels2,
            display_quantity,
            sort1: drop_ipm_sort(self.sort1),
            sort2: drop_ipm_sort(self.sort2),
            params: params.clone(),
            ..self.clone()
        }
        .refreshed();

        (next, Arc::new(CtSnapshot { params, cells }))
    }

    /// Immutable copy of every imported cell in `orig_order`.
    pub fn snapshot(&self) -> Arc<CtSnapshot> {
        let mut cells: Vec<FlatCell> = self
            .origin
            .iter()
            .flat_map(|(val1, row)| {
                row.iter().map(move |(val2, cell)| FlatCell {
                    val1: val1.clone(),
                    val2: val2.clone(),
                    cell: cell.clone(),
                })
            })
            .collect();
        cells.sort_by_key(|c| c.cell.orig_order);
        Arc::new(CtSnapshot {
            params: self.params.clone(),
            cells,
        })
    }

    // -- transforms -----------------------------------------------------------

    /// Recompute every confidence interval at `level`.
    pub fn with_alpha_level(&self, level: AlphaLevel) -> Self {
        let origin = self
            .origin
            .iter()
            .map(|(val1, row)| {
                let row = row
                    .iter()
                    .map(|(val2, cell)| (val2.clone(), with_alpha(cell, level)))
                    .collect();
                (val1.clone(), row)
            })
            .collect();
        let mut params = self.params.clone();
        params.alpha_level = level;
        Self {
            params,
            origin,
            ..self.clone()
        }
        .refreshed()
    }

    /// Apply a minimum-frequency filter to the data already held.
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

    pub fn with_empty_vectors_hidden(&self, hide: bool) -> Self {
        Self {
            hide_empty_vectors: hide,
            ..self.clone()
        }
        .refreshed()
    }

    /// Recompute label visibility from the filtered table.
    pub fn remove_zero_vectors(&self) -> Self {
        let mut next = self.clone();
        next.update_visibility();
        next.recalc_colors();
        next
    }

    /// Swap the two dimensions. Cells keep their filter links and orig order.
    pub fn transposed(&self) -> Self {
        Self {
            params: self.params.transposed(),
            origin: transpose_table(&self.origin),
            data: transpose_table(&self.data),
            labels1: self.labels2.clone(),
            labels2: self.labels1.clone(),
            sort1: self.sort2,
            sort2: self.sort1,
            ..self.clone()
        }
    }

    /// Reorder the labels of `dim`; the criterion is kept for later refreshes.
    pub fn sorted_by_dimension(
        &self,
        dim: Dimension,
        criterion: SortCriterion,
    ) -> Result<Self, CtableError> {
        if criterion == SortCriterion::Ipm {
            self.params.ensure_quantity(Quantity::Ipm)?;
        }
        let mut next = self.clone();
        match dim {
            Dimension::Rows => next.sort1 = Some(criterion),
            Dimension::Columns => next.sort2 = Some(criterion),
        }
        next.sort_labels(dim, criterion);
        Ok(next)
    }

    pub fn with_display_quantity(&self, quantity: Quantity) -> Result<Self, CtableError> {
        self.params.ensure_quantity(quantity)?;
        let mut next = Self {
            display_quantity: quantity,
            ..self.clone()
        };
        next.recalc_colors();
        Ok(next)
    }

    pub fn with_color_mapping(&self, mapping: ColorMapping) -> Self {
        let mut next = Self {
            color_mapping: mapping,
            ..self.clone()
        };
        next.recalc_colors();
        next
    }

    /// Recolor the visible cells without touching filters or labels.
    pub fn recalc_heatmap(&self) -> Self {
        let mut next = self.clone();
        next.recalc_colors();
        next
    }

    // -- export ---------------------------------------------------------------

    /// Visible cells in display order, valued by the display quantity.
    pub fn export_data(&self) -> MatrixExport {
        let rows = self.visible_labels(Dimension::Rows);
        let cols = self.visible_labels(Dimension::Columns);
        let q = self.display_quantity;
        let data = rows
            .iter()
            .map(|val1| {
                cols.iter()
                    .map(|val2| {
                        self.cell(val1, val2).map(|c| {
                            let (lo, hi) = c.interval(q);
                            MatrixExportCell(lo, c.value(q), hi, c.bg_color.clone())
                        })
                    })
                    .collect()
            })
            .collect();
        MatrixExport {
            attr1: self.params.attr1.clone(),
            attr2: self.params.attr2.clone(),
            min_freq: self.params.min_freq.threshold,
            min_freq_type: self.params.min_freq.kind,
            alpha_level: self.params.alpha_level,
            labels1: rows.iter().map(|s| s.to_string()).collect(),
            labels2: cols.iter().map(|s| s.to_string()).collect(),
            data,
        }
    }

    /// Interval items of one row or column, highest midpoint first.
    ///
    /// Items carry ipm unless the table has none, in which case abs is used.
    pub fn export_group(&self, dim: Dimension, value: &str) -> Result<Vec<GroupItem>, CtableError> {
        if !self.labels(dim).iter().any(|l| l.value == value) {
            return Err(CtableError::UnknownValue {
                kind: "label",
                value: value.to_string(),
            });
        }
        let q = if self.params.has_ipm() {
            Quantity::Ipm
        } else {
            Quantity::Abs
        };
        let mut items: Vec<(usize, GroupItem)> = self
            .visible_labels(dim.opposite())
            .into_iter()
            .filter_map(|other| {
                let cell = match dim {
                    Dimension::Rows => self.cell(value, other),
                    Dimension::Columns => self.cell(other, value),
                }?;
                let (lo, hi) = cell.interval(q);
                Some((
                    cell.orig_order,
                    GroupItem {
                        label: other.to_string(),
                        lo,
                        mid: cell.value(q),
                        hi,
                    },
                ))
            })
            .collect();
        items.sort_by(|a, b| b.1.mid.total_cmp(&a.1.mid).then(a.0.cmp(&b.0)));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }

    /// Caption of an [`export_group`](Self::export_group) chart.
    pub fn export_group_label(&self, dim: Dimension, value: &str) -> String {
        let attr = match dim {
            Dimension::Rows => &self.params.attr1,
            Dimension::Columns => &self.params.attr2,
        };
        format!("{attr} = \"{value}\"")
    }

    // -- internals ------------------------------------------------------------

    /// Refilter, then recompute visibility, stored sorts and colors.
    fn refreshed(mut self) -> Self {
        let predicate = min_freq_filter(
            self.params.min_freq,
            self.params.full_size,
            self.origin.values().flat_map(HashMap::values),
        );
        self.data = self
            .origin
            .iter()
            .filter_map(|(val1, row)| {
                let row: HashMap<String, Cell> = row
                    .iter()
                    .filter(|(_, cell)| predicate.accepts(cell))
                    .map(|(val2, cell)| (val2.clone(), cell.clone()))
                    .collect();
                (!row.is_empty()).then(|| (val1.clone(), row))
            })
            .collect();
        self.update_visibility();
        if let Some(criterion) = self.sort1 {
            self.sort_labels(Dimension::Rows, criterion);
        }
        if let Some(criterion) = self.sort2 {
            self.sort_labels(Dimension::Columns, criterion);
        }
        self.recalc_colors();
        self
    }

    fn is_nonzero(&self, val1: &str, val2: &str) -> bool {
        self.cell(val1, val2).is_some_and(|c| c.abs > 0)
    }

    /// Rows are checked against every column first, then columns against the
    /// rows that stayed visible.
    fn update_visibility(&mut self) {
        for label in self.labels1.iter_mut().chain(self.labels2.iter_mut()) {
            label.visible = true;
        }
        if !self.hide_empty_vectors {
            return;
        }
        let row_visible: Vec<bool> = self
            .labels1
            .iter()
            .map(|r| self.labels2.iter().any(|c| self.is_nonzero(&r.value, &c.value)))
            .collect();
        for (label, visible) in self.labels1.iter_mut().zip(row_visible) {
            label.visible = visible;
        }
        let col_visible: Vec<bool> = self
            .labels2
            .iter()
            .map(|c| {
                self.labels1
                    .iter()
                    .filter(|r| r.visible)
                    .any(|r| self.is_nonzero(&r.value, &c.value))
            })
            .collect();
        for (label, visible) in self.labels2.iter_mut().zip(col_visible) {
            label.visible = visible;
        }
    }

    fn sort_labels(&mut self, dim: Dimension, criterion: SortCriterion) {
        let mut labels = self.labels(dim).to_vec();
        match criterion {
            SortCriterion::Attr => labels.sort_by(|a, b| {
                caseless_cmp(&a.value, &b.value).then(a.orig_order.cmp(&b.orig_order))
            }),
            SortCriterion::Abs | SortCriterion::Ipm => {
                let q = if criterion == SortCriterion::Abs {
                    Quantity::Abs
                } else {
                    Quantity::Ipm
                };
                let opposite = self.visible_labels(dim.opposite());
                let totals: HashMap<&str, f64> = labels
                    .iter()
                    .map(|l| {
                        let sum = opposite
                            .iter()
                            .filter_map(|other| match dim {
                                Dimension::Rows => self.cell(&l.value, other),
                                Dimension::Columns => self.cell(other, &l.value),
                            })
                            .map(|c| c.value(q))
                            .sum();
                        (l.value.as_str(), sum)
                    })
                    .collect();
                let mut keyed: Vec<(f64, Label)> = labels
                    .iter()
                    .map(|l| (totals[l.value.as_str()], l.clone()))
                    .collect();
                keyed.sort_by(|a, b| {
                    b.0.total_cmp(&a.0)
                        .then(a.1.orig_order.cmp(&b.1.orig_order))
                });
                labels = keyed.into_iter().map(|(_, l)| l).collect();
            }
        }
        match dim {
            Dimension::Rows => self.labels1 = labels,
            Dimension::Columns => self.labels2 = labels,
        }
    }

    fn recalc_colors(&mut self) {
        let visible1: Vec<String> = self
            .labels1
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.value.clone())
            .collect();
        let visible2: Vec<String> = self
            .labels2
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.value.clone())
            .collect();

        for row in self.data.values_mut() {
            for cell in row.values_mut() {
                cell.bg_color = NO_COLOR.to_string();
            }
        }
        let mut coords: Vec<(&str, &str)> = Vec::new();
        let mut items: Vec<(f64, usize)> = Vec::new();
        for val1 in &visible1 {
            for val2 in &visible2 {
                if let Some(cell) = self.cell(val1, val2) {
                    coords.push((val1, val2));
                    items.push((cell.value(self.display_quantity), cell.orig_order));
                }
            }
        }
        let colors = assign_colors(&items, self.color_mapping);
        let updates: Vec<(String, String, &'static str)> = coords
            .into_iter()
            .zip(colors)
            .map(|((v1, v2), color)| (v1.to_string(), v2.to_string(), color))
            .collect();
        for (val1, val2, color) in updates {
            if let Some(cell) = self.data.get_mut(&val1).and_then(|r| r.get_mut(&val2)) {
                cell.bg_color = color.to_string();
            }
        }
    }
}

fn transpose_table(table: &Table) -> Table {
    let mut out = Table::new();
    for (val1, row) in table {
        for (val2, cell) in row {
            out.entry(val2.clone())
                .or_default()
                .insert(val1.clone(), cell.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::COLOR_RAMP;
    use crate::model::{CtDataRow, CtFreqFormArgs, MinFreqType};

    fn response(rows: &[(&str, &str, u64, u64)]) -> CtDataResponse {
        CtDataResponse {
            data: rows
                .iter()
                .map(|&(a, b, abs, ds)| CtDataRow(a.into(), b.into(), abs, ds))
                .collect(),
            full_size: rows.len() as u64,
            ctfreq_form_args: CtFreqFormArgs {
                ctminfreq: "0".into(),
                ctminfreq_type: Some("abs".into()),
                ..CtFreqFormArgs::default()
            },
        }
    }

    fn no_filter() -> MinFreqFilter {
        MinFreqFilter::new(MinFreqType::Abs, 0.0)
    }

    fn load(rows: &[(&str, &str, u64, u64)]) -> MatrixProjection {
        MatrixProjection::new(CtParams::new("word", "tag"))
            .import_data(&response(rows), no_filter())
            .0
    }

    fn sample() -> MatrixProjection {
        load(&[
            ("cat", "NN", 10, 1000),
            ("dog", "NN", 4, 1000),
            ("dog", "VB", 4, 1000),
            ("run", "VB", 7, 1000),
            ("run", "NN", 1, 1000),
        ])
    }

    #[test]
    fn test_cat_example() {
        let m = load(&[("cat", "NN", 10, 1000), ("cat", "VB", 0, 1000)]);
        assert_eq!(m.cell("cat", "NN").unwrap().ipm, Some(10000.0));
        assert_eq!(m.visible_labels(Dimension::Columns), vec!["NN", "VB"]);

        let hidden = m.with_empty_vectors_hidden(true);
        assert_eq!(hidden.visible_labels(Dimension::Columns), vec!["NN"]);
        assert_eq!(hidden.visible_labels(Dimension::Rows), vec!["cat"]);
        assert_eq!(hidden.cell("cat", "VB").unwrap().bg_color, NO_COLOR);

        let shown = hidden.with_empty_vectors_hidden(false);
        assert_eq!(shown.visible_labels(Dimension::Columns), vec!["NN", "VB"]);
    }

    #[test]
    fn test_import_assigns_orig_order_and_labels() {
        let m = sample();
        assert_eq!(m.visible_labels(Dimension::Rows), vec!["cat", "dog", "run"]);
        assert_eq!(m.visible_labels(Dimension::Columns), vec!["NN", "VB"]);
        assert_eq!(m.cell("run", "NN").unwrap().orig_order, 4);
        assert_eq!(m.origin_len(), 5);
        assert_eq!(m.params().full_size, 5);
    }

    #[test]
    fn test_snapshot_matches_origin() {
        let (m, snap) = MatrixProjection::new(CtParams::new("word", "tag"))
            .import_data(&response(&[("a", "x", 1, 10), ("b", "y", 2, 10)]), no_filter());
        assert_eq!(snap.cells.len(), 2);
        assert_eq!(snap.cells[1].val1, "b");
        assert_eq!(*m.snapshot(), *snap);
    }

    #[test]
    fn test_duplicate_rows_keep_first() {
        let m = load(&[("a", "x", 1, 10), ("a", "x", 5, 10)]);
        assert_eq!(m.origin_len(), 1);
        assert_eq!(m.cell("a", "x").unwrap().abs, 1);
    }

    #[test]
    fn test_min_freq_filter_refilters_locally() {
        let m = sample()
            .with_min_freq(MinFreqFilter::new(MinFreqType::Abs, 5.0))
            .unwrap();
        assert!(m.cell("cat", "NN").is_some());
        assert!(m.cell("dog", "NN").is_none());
        assert_eq!(m.origin_len(), 5);
        // Server filter is unchanged by a local refilter.
        assert_eq!(m.params().server_min_freq, no_filter());
    }

    #[test]
    fn test_refilter_is_idempotent() {
        let filter = MinFreqFilter::new(MinFreqType::PercentileAbs, 40.0);
        let once = sample()
            .with_empty_vectors_hidden(true)
            .with_min_freq(filter)
            .unwrap();
        let twice = once.with_min_freq(filter).unwrap().recalc_heatmap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_transpose_is_involutive() {
        let m = sample()
            .with_empty_vectors_hidden(true)
            .sorted_by_dimension(Dimension::Rows, SortCriterion::Abs)
            .unwrap();
        let t = m.transposed();
        assert_eq!(t.params().attr1, "tag");
        assert_eq!(t.visible_labels(Dimension::Rows), vec!["NN", "VB"]);
        assert_eq!(
            t.cell("NN", "cat").unwrap().pfilter,
            m.cell("cat", "NN").unwrap().pfilter
        );
        assert_eq!(t.transposed(), m);
    }

    #[test]
    fn test_sort_by_attr_is_case_insensitive() {
        let m = load(&[("b", "x", 1, 10), ("A", "x", 1, 10), ("a", "x", 1, 10)])
            .sorted_by_dimension(Dimension::Rows, SortCriterion::Attr)
            .unwrap();
        assert_eq!(m.visible_labels(Dimension::Rows), vec!["A", "a", "b"]);
    }

    #[test]
    fn test_sort_by_abs_descending_and_stable() {
        let m = sample()
            .sorted_by_dimension(Dimension::Rows, SortCriterion::Abs)
            .unwrap();
        // cat 10, dog 8, run 8: dog precedes run by first appearance.
        assert_eq!(m.visible_labels(Dimension::Rows), vec!["cat", "dog", "run"]);
        let m = m
            .sorted_by_dimension(Dimension::Columns, SortCriterion::Abs)
            .unwrap();
        assert_eq!(m.visible_labels(Dimension::Columns), vec!["NN", "VB"]);

        let tie = load(&[("x", "c", 3, 10), ("y", "c", 5, 10), ("z", "c", 3, 10)])
            .sorted_by_dimension(Dimension::Rows, SortCriterion::Abs)
            .unwrap();
        assert_eq!(tie.visible_labels(Dimension::Rows), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_sort_kept_across_refilter() {
        let m = sample()
            .sorted_by_dimension(Dimension::Rows, SortCriterion::Abs)
            .unwrap()
            .with_min_freq(MinFreqFilter::new(MinFreqType::Abs, 5.0))
            .unwrap();
        // dog drops to 0 and falls behind run (7).
        assert_eq!(m.visible_labels(Dimension::Rows), vec!["cat", "run", "dog"]);
    }

    #[test]
    fn test_ipm_rejected_for_struct_pairs() {
        let m = MatrixProjection::new(CtParams::new("doc.genre", "text.year"))
            .import_data(&response(&[("news", "1990", 2, 10)]), no_filter())
            .0;
        assert!(matches!(
            m.sorted_by_dimension(Dimension::Rows, SortCriterion::Ipm),
            Err(CtableError::IpmUnavailable)
        ));
        assert!(m.with_display_quantity(Quantity::Ipm).is_err());
        assert!(
            m.with_min_freq(MinFreqFilter::new(MinFreqType::Ipm, 1.0))
                .is_err()
        );
        let items = m.export_group(Dimension::Rows, "news").unwrap();
        assert_eq!(items[0].mid, 2.0);
    }

    #[test]
    fn test_heatmap_linear() {
        let m = sample();
        assert_eq!(m.cell("cat", "NN").unwrap().bg_color, COLOR_RAMP[9]);
        assert_eq!(m.cell("run", "NN").unwrap().bg_color, COLOR_RAMP[0]);

        let flat = load(&[("a", "x", 3, 10), ("b", "x", 3, 10)]);
        assert_eq!(flat.cell("a", "x").unwrap().bg_color, COLOR_RAMP[0]);
        assert_eq!(flat.cell("b", "x").unwrap().bg_color, COLOR_RAMP[0]);
    }

    #[test]
    fn test_heatmap_percentile() {
        let m = sample().with_color_mapping(ColorMapping::Percentile);
        // Ascending: run/NN(1), dog/NN(4), dog/VB(4), run/VB(7), cat/NN(10).
        assert_eq!(m.cell("run", "NN").unwrap().bg_color, COLOR_RAMP[0]);
        assert_eq!(m.cell("dog", "NN").unwrap().bg_color, COLOR_RAMP[2]);
        assert_eq!(m.cell("dog", "VB").unwrap().bg_color, COLOR_RAMP[4]);
        assert_eq!(m.cell("cat", "NN").unwrap().bg_color, COLOR_RAMP[8]);
    }

    #[test]
    fn test_alpha_change_keeps_counts() {
        let m = sample();
        let wide = m.with_alpha_level(AlphaLevel::L0_001);
        let (a, b) = (m.cell("cat", "NN").unwrap(), wide.cell("cat", "NN").unwrap());
        assert_eq!(a.abs, b.abs);
        assert_eq!(a.ipm, b.ipm);
        assert!(b.abs_conf_interval.0 < a.abs_conf_interval.0);
        assert_eq!(wide.params().alpha_level, AlphaLevel::L0_001);
    }

    #[test]
    fn test_export_round_trip() {
        let rows = [("cat", "NN", 10, 1000), ("dog", "VB", 3, 500)];
        let m = load(&rows);
        let export = m.export_data();
        assert_eq!(export.labels1, vec!["cat", "dog"]);
        assert_eq!(export.labels2, vec!["NN", "VB"]);
        assert!(export.data[0][1].is_none());
        assert_eq!(export.data[1][1].as_ref().unwrap().1, 3.0);

        let ipm = m.with_display_quantity(Quantity::Ipm).unwrap().export_data();
        assert_eq!(ipm.data[0][0].as_ref().unwrap().1, 10000.0);
        assert_eq!(ipm.data[1][1].as_ref().unwrap().1, 6000.0);
    }

    #[test]
    fn test_export_group_sorted_by_mid() {
        let m = sample();
        let items = m.export_group(Dimension::Columns, "NN").unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["cat", "dog", "run"]);
        assert!(items.iter().all(|i| i.lo <= i.mid && i.mid <= i.hi));
        assert!(m.export_group(Dimension::Rows, "nope").is_err());
        assert_eq!(
            m.export_group_label(Dimension::Columns, "NN"),
            "tag = \"NN\""
        );
    }

    #[test]
    fn test_import_uses_server_echo() {
        let mut resp = response(&[("a", "x", 1, 10)]);
        resp.ctfreq_form_args.ctminfreq = "3".into();
        resp.full_size = 9;
        let (m, _) = MatrixProjection::new(CtParams::new("word", "tag"))
            .import_data(&resp, MinFreqFilter::new(MinFreqType::Abs, 3.0));
        assert_eq!(
            m.params().server_min_freq,
            MinFreqFilter::new(MinFreqType::Abs, 3.0)
        );
        assert_eq!(m.params().full_size, 9);
    }

    /// Abs and ipm order disagree: ipm is a/c/b/d ascending, abs d/b/c/a.
    fn ipm_sample() -> MatrixProjection {
        load(&[
            ("a", "X", 10, 100_000),
            ("b", "X", 2, 1000),
            ("c", "Y", 5, 10_000),
            ("d", "Y", 1, 100),
        ])
    }

    fn kept(m: &MatrixProjection) -> Vec<&'static str> {
        [("a", "X"), ("b", "X"), ("c", "Y"), ("d", "Y")]
            .into_iter()
            .filter(|(v1, v2)| m.cell(v1, v2).is_some())
            .map(|(v1, _)| v1)
            .collect()
    }

    #[test]
    fn test_ipm_filters_select_by_ipm() {
        let m = ipm_sample();
        let ipm = m
            .with_min_freq(MinFreqFilter::new(MinFreqType::Ipm, 1000.0))
            .unwrap();
        assert_eq!(kept(&ipm), vec!["b", "d"]);

        let pipm = m
            .with_min_freq(MinFreqFilter::new(MinFreqType::PercentileIpm, 50.0))
            .unwrap();
        assert_eq!(kept(&pipm), vec!["b", "d"]);

        let pabs = m
            .with_min_freq(MinFreqFilter::new(MinFreqType::PercentileAbs, 50.0))
            .unwrap();
        assert_eq!(kept(&pabs), vec!["a", "c"]);
    }
}
