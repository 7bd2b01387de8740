//! Turns stored candidate features into the dense matrix the classifier expects.

use crate::models::candidate::FeatureMap;

/// Column order of the bundled classifier; artifacts may declare their own.
pub const DEFAULT_FEATURE_COLUMNS: [&str; 21] = [
    "koi_score",
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
    "koi_period",
    "koi_time0bk",
    "koi_impact",
    "koi_duration",
    "koi_depth",
    "koi_prad",
    "koi_teq",
    "koi_insol",
    "koi_model_snr",
    "koi_tce_plnt_num",
    "koi_steff",
    "koi_slogg",
    "koi_srad",
    "ra",
    "dec",
    "koi_kepmag",
];

fn is_flag_column(column: &str) -> bool {
    column.starts_with("koi_fpflag_")
}

/// Fallback when a column has no value anywhere in the batch.
pub fn default_value(column: &str) -> f64 {
    match column {
        "koi_period" => 10.0,
        "koi_time0bk" => 131.0,
        "koi_impact" => 0.5,
        "koi_duration" => 3.0,
        "koi_depth" => 100.0,
        "koi_prad" => 2.0,
        "koi_teq" => 1000.0,
        "koi_insol" => 1000.0,
        "koi_model_snr" => 10.0,
        "koi_tce_plnt_num" => 1.0,
        "koi_steff" => 5000.0,
        "koi_slogg" => 4.0,
        "koi_srad" => 1.0,
        "ra" => 180.0,
        "dec" => 0.0,
        "koi_kepmag" => 14.0,
        "koi_score" => 0.5,
        _ => 0.0,
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// One row per candidate, one value per entry in `columns`.
///
/// Flag columns fill with 0. Other gaps take the batch median of the column,
/// or `default_value` when the whole batch lacks it.
pub fn assemble(columns: &[String], batch: &[&FeatureMap]) -> Vec<Vec<f64>> {
    let fills: Vec<f64> = columns
        .iter()
        .map(|col| {
            if is_flag_column(col) {
                return 0.0;
            }
            let present: Vec<f64> = batch.iter().filter_map(|f| f.get(col).copied()).collect();
            median(present).unwrap_or_else(|| default_value(col))
        })
        .collect();

    batch
        .iter()
        .map(|features| {
            columns
                .iter()
                .zip(&fills)
                .map(|(col, fill)| features.get(col).copied().unwrap_or(*fill))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_present_values_pass_through_in_column_order() {
        let row = features(&[("koi_period", 9.5), ("ra", 291.9)]);
        let matrix = assemble(&cols(&["ra", "koi_period"]), &[&row]);
        assert_eq!(matrix, vec![vec![291.9, 9.5]]);
    }

    #[test]
    fn test_flags_default_to_zero() {
        let row = features(&[("koi_period", 9.5)]);
        let matrix = assemble(&cols(&["koi_fpflag_nt", "koi_fpflag_ec"]), &[&row]);
        assert_eq!(matrix, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_gap_takes_batch_median() {
        let a = features(&[("koi_teq", 700.0)]);
        let b = features(&[("koi_teq", 900.0)]);
        let c = features(&[("koi_teq", 1300.0)]);
        let d = features(&[]);
        let matrix = assemble(&cols(&["koi_teq"]), &[&a, &b, &c, &d]);
        assert_eq!(matrix[3], vec![900.0]);
    }

    #[test]
    fn test_even_count_median_averages() {
        let a = features(&[("koi_prad", 1.0)]);
        let b = features(&[("koi_prad", 3.0)]);
        let c = features(&[]);
        let matrix = assemble(&cols(&["koi_prad"]), &[&a, &b, &c]);
        assert_eq!(matrix[2], vec![2.0]);
    }

    #[test]
    fn test_column_absent_from_batch_uses_default() {
        let row = features(&[]);
        let matrix = assemble(&cols(&["koi_steff", "ra", "koi_score", "mystery"]), &[&row]);
        assert_eq!(matrix, vec![vec![5000.0, 180.0, 0.5, 0.0]]);
    }

    #[test]
    fn test_default_columns_cover_model_inputs() {
        assert_eq!(DEFAULT_FEATURE_COLUMNS.len(), 21);
        assert!(DEFAULT_FEATURE_COLUMNS.iter().all(|c| !c.ends_with("_err1")));
    }
}
