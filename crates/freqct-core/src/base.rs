//! Cell math shared by both projections.
//!
//! Everything here is a pure function of its arguments: ipm normalization,
//! confidence intervals, percentile ranking, the minimum-frequency predicate
//! and the per-cell concordance filter link. The matrix and the flat
//! projection call into this module instead of sharing state.

use std::cmp::Ordering;
use std::collections::HashMap;

use freqct_stats::{AlphaLevel, wilson_conf_interval};

use crate::model::{Cell, MinFreqFilter, MinFreqType, NO_COLOR, Quantity, is_struct_attr};
use crate::params::CtParams;

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Instances per million, rounded to two decimals.
pub fn calc_ipm(abs: u64, domain_size: u64) -> f64 {
    if domain_size == 0 {
        return 0.0;
    }
    (abs as f64 / domain_size as f64 * 1e6 * 100.0).round() / 100.0
}

/// Wilson intervals of a cell scaled to absolute counts and, when
/// `with_ipm`, to instances per million.
pub fn conf_intervals(
    abs: u64,
    domain_size: u64,
    alpha: AlphaLevel,
    with_ipm: bool,
) -> ((f64, f64), Option<(f64, f64)>) {
    let (lo, hi) = wilson_conf_interval(abs, domain_size, alpha);
    let size = domain_size as f64;
    let abs_ci = (lo * size, hi * size);
    let ipm_ci = with_ipm.then(|| (round2(lo * 1e6), round2(hi * 1e6)));
    (abs_ci, ipm_ci)
}

/// Build a freshly imported cell.
pub fn make_cell(
    params: &CtParams,
    orig_order: usize,
    val1: &str,
    val2: &str,
    abs: u64,
    domain_size: u64,
) -> Cell {
    let with_ipm = params.has_ipm();
    let (abs_conf_interval, ipm_conf_interval) =
        conf_intervals(abs, domain_size, params.alpha_level, with_ipm);
    Cell {
        orig_order,
        abs,
        abs_conf_interval,
        ipm: with_ipm.then(|| calc_ipm(abs, domain_size)),
        ipm_conf_interval,
        domain_size,
        bg_color: NO_COLOR.to_string(),
        pfilter: generate_pfilter(params, val1, val2),
    }
}

/// Copy of `cell` with intervals recomputed at `alpha`; counts untouched.
pub fn with_alpha(cell: &Cell, alpha: AlphaLevel) -> Cell {
    let (abs_conf_interval, ipm_conf_interval) =
        conf_intervals(cell.abs, cell.domain_size, alpha, cell.ipm.is_some());
    Cell {
        abs_conf_interval,
        ipm_conf_interval,
        ..cell.clone()
    }
}

// ---------------------------------------------------------------------------
// Minimum-frequency filtering
// ---------------------------------------------------------------------------

/// Map `orig_order → rank`, 0-based and ascending by `quantity`; ties are
/// ranked by `orig_order`.
pub fn rank_map<'a>(
    cells: impl IntoIterator<Item = &'a Cell>,
    quantity: Quantity,
) -> HashMap<usize, usize> {
    let mut items: Vec<(f64, usize)> = cells
        .into_iter()
        .map(|c| (c.value(quantity), c.orig_order))
        .collect();
    items.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    items
        .into_iter()
        .enumerate()
        .map(|(rank, (_, orig_order))| (orig_order, rank))
        .collect()
}

/// Predicate deciding whether a cell passes the minimum-frequency filter.
#[derive(Debug, Clone)]
pub struct MinFreqPredicate {
    filter: MinFreqFilter,
    full_size: u64,
    ranks: HashMap<usize, usize>,
}

impl MinFreqPredicate {
    /// `ranks` is only consulted for percentile kinds.
    pub fn new(filter: MinFreqFilter, full_size: u64, ranks: HashMap<usize, usize>) -> Self {
        Self {
            filter,
            full_size,
            ranks,
        }
    }

    /// Share of cells the server dropped before sending the data.
    pub fn empty_items_ratio(&self) -> f64 {
        if self.full_size == 0 {
            return 0.0;
        }
        (1.0 - self.ranks.len() as f64 / self.full_size as f64).max(0.0)
    }

    pub fn accepts(&self, cell: &Cell) -> bool {
        match self.filter.kind {
            MinFreqType::Abs => cell.abs as f64 >= self.filter.threshold,
            MinFreqType::Ipm => cell.ipm.unwrap_or(0.0) >= self.filter.threshold,
            MinFreqType::PercentileAbs | MinFreqType::PercentileIpm => {
                if self.full_size == 0 {
                    return true;
                }
                let Some(&rank) = self.ranks.get(&cell.orig_order) else {
                    return false;
                };
                rank as f64 / self.full_size as f64 + self.empty_items_ratio()
                    >= self.filter.threshold / 100.0
            }
        }
    }
}

/// Predicate for `filter` over the given cell population.
pub fn min_freq_filter<'a>(
    filter: MinFreqFilter,
    full_size: u64,
    cells: impl IntoIterator<Item = &'a Cell>,
) -> MinFreqPredicate {
    let ranks = if filter.kind.is_percentile() {
        rank_map(cells, filter.kind.quantity())
    } else {
        HashMap::new()
    };
    MinFreqPredicate::new(filter, full_size, ranks)
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Label order used for attribute sorts: lowercase comparison with a
/// byte-order tie-break. No locale collation is applied.
pub fn caseless_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Concordance filter links
// ---------------------------------------------------------------------------

const REGEX_META: &str = r#"\.[]{}()*+?^$|""#;

/// Escape a positional attribute value for use inside a CQL regex.
pub fn escape_cql_regex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if REGEX_META.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

fn split_struct(attr: &str) -> (&str, &str) {
    attr.split_once('.').unwrap_or(("", attr))
}

/// CQL query selecting the concordance lines behind one cell.
pub fn pfilter_query(params: &CtParams, val1: &str, val2: &str) -> String {
    let (a1, a2) = (params.attr1.as_str(), params.attr2.as_str());
    match (is_struct_attr(a1), is_struct_attr(a2)) {
        (true, true) => {
            let (s1, sa1) = split_struct(a1);
            let (s2, sa2) = split_struct(a2);
            format!(
                "p0 0 1 [] within <{s1} {sa1}=\"{}\" /> within <{s2} {sa2}=\"{}\" />",
                escape_quotes(val1),
                escape_quotes(val2)
            )
        }
        (true, false) => {
            let (s1, sa1) = split_struct(a1);
            format!(
                "p0 0 1 [{a2}=\"{}\"] within <{s1} {sa1}=\"{}\" />",
                escape_cql_regex(val2),
                escape_quotes(val1)
            )
        }
        (false, true) => {
            let (s2, sa2) = split_struct(a2);
            format!(
                "p0 0 1 [{a1}=\"{}\"] within <{s2} {sa2}=\"{}\" />",
                escape_cql_regex(val1),
                escape_quotes(val2)
            )
        }
        (false, false) => {
            let o1 = params.ctfcrit1.offset;
            let o2 = params.ctfcrit2.offset;
            format!(
                "p{} {} 0 [{a1}=\"{}\" & {a2}=\"{}\"]",
                o1.min(o2),
                o1.max(o2),
                escape_cql_regex(val1),
                escape_cql_regex(val2)
            )
        }
    }
}

/// Positive-filter link for the concordance filter action.
pub fn generate_pfilter(params: &CtParams, val1: &str, val2: &str) -> String {
    let mut url = format!("{}?", params.quick_filter_action);
    for (key, value) in &params.conc_args {
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        url.push('&');
    }
    url.push_str("q2=");
    url.push_str(&urlencoding::encode(&pfilter_query(params, val1, val2)));
    url
}
