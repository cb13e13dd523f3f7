use crate::search::types::DataRange;

/// Splits `[0, total)` into `unit_count` contiguous chunks of
/// `ceil(total / unit_count)` records.
///
/// Trailing chunks may come out short or degenerate (`start == end`) when
/// the corpus is small relative to the unit count. No units, no ranges.
pub fn partition_ranges(total: usize, unit_count: usize) -> Vec<DataRange> {
    if unit_count == 0 {
        return Vec::new();
    }

    let chunk = total.div_ceil(unit_count);
    (0..unit_count)
        .map(|i| {
            let start = (i * chunk).min(total);
            let end = ((i + 1) * chunk).min(total);
            DataRange::new(start, end)
        })
        .collect()
}
