//! KOI column layout accepted by the CSV upload.

pub const REQUIRED_COLUMNS: &[&str] = &[
    "koi_period",
    "koi_depth",
    "koi_duration",
    "koi_impact",
    "koi_insol",
    "koi_model_snr",
    "koi_steff",
    "koi_slogg",
    "koi_srad",
    "ra",
    "dec",
    "koi_kepmag",
    "koi_score",
];

pub const OPTIONAL_COLUMNS: &[&str] = &[
    "kepid",
    "kepoi_name",
    "kepler_name",
    "koi_time0bk",
    "koi_prad",
    "koi_tce_plnt_num",
    "koi_disposition",
    "koi_pdisposition",
    "koi_teq",
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
];

/// Free-text optional columns; every other optional column except `kepid` is numeric.
pub const TEXT_COLUMNS: &[&str] = &[
    "kepoi_name",
    "kepler_name",
    "koi_disposition",
    "koi_pdisposition",
];

pub const ERROR_COLUMNS: &[&str] = &[
    "koi_period_err1",
    "koi_period_err2",
    "koi_time0bk_err1",
    "koi_time0bk_err2",
    "koi_impact_err1",
    "koi_impact_err2",
    "koi_duration_err1",
    "koi_duration_err2",
    "koi_depth_err1",
    "koi_depth_err2",
    "koi_prad_err1",
    "koi_prad_err2",
    "koi_teq_err1",
    "koi_teq_err2",
    "koi_insol_err1",
    "koi_insol_err2",
    "koi_steff_err1",
    "koi_steff_err2",
    "koi_slogg_err1",
    "koi_slogg_err2",
    "koi_srad_err1",
    "koi_srad_err2",
];

/// Plausible physical ranges. Values outside produce a warning, never a rejection.
pub struct RangeCheck {
    pub column: &'static str,
    pub min: f64,
    pub max: Option<f64>,
}

impl RangeCheck {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

pub const RANGE_CHECKS: &[RangeCheck] = &[
    RangeCheck { column: "koi_period", min: 0.0, max: Some(10_000.0) },
    RangeCheck { column: "koi_depth", min: 0.0, max: None },
    RangeCheck { column: "koi_teq", min: 0.0, max: Some(5_000.0) },
    RangeCheck { column: "koi_steff", min: 2_000.0, max: Some(10_000.0) },
    RangeCheck { column: "koi_srad", min: 0.0, max: Some(50.0) },
    RangeCheck { column: "ra", min: 0.0, max: Some(360.0) },
    RangeCheck { column: "dec", min: -90.0, max: Some(90.0) },
];

/// Empty share above which a required column triggers a warning.
pub const SPARSE_COLUMN_THRESHOLD: f64 = 0.5;

pub fn is_known_column(name: &str) -> bool {
    REQUIRED_COLUMNS.contains(&name)
        || OPTIONAL_COLUMNS.contains(&name)
        || ERROR_COLUMNS.contains(&name)
}

pub fn is_numeric_optional(name: &str) -> bool {
    OPTIONAL_COLUMNS.contains(&name) && name != "kepid" && !TEXT_COLUMNS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_classification() {
        assert!(is_known_column("koi_period"));
        assert!(is_known_column("koi_srad_err2"));
        assert!(!is_known_column("rowid"));
        assert!(is_numeric_optional("koi_teq"));
        assert!(!is_numeric_optional("kepoi_name"));
        assert!(!is_numeric_optional("kepid"));
    }

    #[test]
    fn test_open_ended_range() {
        let depth = RANGE_CHECKS.iter().find(|c| c.column == "koi_depth").unwrap();
        assert!(depth.contains(1e9));
        assert!(!depth.contains(-1.0));
    }
}
