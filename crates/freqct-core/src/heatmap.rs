//! Heatmap coloring of visible matrix cells.

use crate::model::ColorMapping;

/// Ten-step sequential ramp, lightest first.
pub const COLOR_RAMP: [&str; 10] = [
    "#fff7f3", "#fde0dd", "#fcc5c0", "#fa9fb5", "#f768a1", "#dd3497", "#ae017e", "#7a0177",
    "#5c0066", "#49006a",
];

/// Ramp index for every `(value, orig_order)` item, in input order.
///
/// Linear mapping scales `(v - min) / (max - min)` onto the ramp; when all
/// values are equal every item gets index 0. Percentile mapping buckets the
/// ascending rank position evenly, ties ordered by `orig_order`.
pub fn color_indices(items: &[(f64, usize)], mapping: ColorMapping) -> Vec<usize> {
    if items.is_empty() {
        return Vec::new();
    }
    let last = COLOR_RAMP.len() - 1;
    match mapping {
        ColorMapping::Linear => {
            let min = items.iter().map(|i| i.0).fold(f64::INFINITY, f64::min);
            let max = items.iter().map(|i| i.0).fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            items
                .iter()
                .map(|&(v, _)| {
                    if span <= 0.0 {
                        0
                    } else {
                        (((v - min) / span * last as f64).floor() as usize).min(last)
                    }
                })
                .collect()
        }
        ColorMapping::Percentile => {
            let mut order: Vec<usize> = (0..items.len()).collect();
            order.sort_by(|&a, &b| {
                items[a]
                    .0
                    .total_cmp(&items[b].0)
                    .then(items[a].1.cmp(&items[b].1))
            });
            let n = items.len();
            let mut out = vec![0; n];
            for (pos, &idx) in order.iter().enumerate() {
                out[idx] = (pos * COLOR_RAMP.len() / n).min(last);
            }
            out
        }
    }
}

/// Colors for `items`, see [`color_indices`].
pub fn assign_colors(items: &[(f64, usize)], mapping: ColorMapping) -> Vec<&'static str> {
    color_indices(items, mapping)
        .into_iter()
        .map(|i| COLOR_RAMP[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_extremes() {
        let items = [(0.0, 0), (5.0, 1), (10.0, 2)];
        assert_eq!(color_indices(&items, ColorMapping::Linear), vec![0, 4, 9]);
    }

    #[test]
    fn test_linear_equal_values_map_to_first_color() {
        let items = [(7.0, 0), (7.0, 1), (7.0, 2)];
        assert_eq!(
            assign_colors(&items, ColorMapping::Linear),
            vec![COLOR_RAMP[0]; 3]
        );
    }

    #[test]
    fn test_percentile_buckets_evenly() {
        let items: Vec<(f64, usize)> = (0..20).map(|i| ((20 - i) as f64, i)).collect();
        let idx = color_indices(&items, ColorMapping::Percentile);
        // Largest value is first in the input and lands in the top bucket.
        assert_eq!(idx[0], 9);
        assert_eq!(idx[19], 0);
        for bucket in 0..10 {
            assert_eq!(idx.iter().filter(|&&i| i == bucket).count(), 2);
        }
    }

    #[test]
    fn test_percentile_ties_use_orig_order() {
        let items = [(1.0, 1), (1.0, 0)];
        assert_eq!(color_indices(&items, ColorMapping::Percentile), vec![5, 0]);
    }

    #[test]
    fn test_empty() {
        assert!(color_indices(&[], ColorMapping::Percentile).is_empty());
    }
}
