//! `ParameterManager` — named behavioral-model parameter tables.
//!
//! Models look parameters up **by name** with a built-in default, so a
//! parameter file only needs to list overrides.  Values are stored as the
//! raw strings the MITSIM calibration files use ("10.00  7.90  5.60 …") and
//! parsed by the typed getters; a malformed override is a startup error, not
//! a silent fallback.
//!
//! The speed-indexed acceleration/deceleration tables use the MITSIM bucket
//! scheme: `speed_scaler = "nBuckets bucketWidth bucketWidth"` and an
//! `nBuckets`-element value vector.  [`SpeedIndexedTable`] expands that into
//! a per-integer-speed lookup so the hot path is a single index.

use rustc_hash::FxHashMap;

use crate::error::{CoreError, CoreResult};

// ── Built-in defaults ─────────────────────────────────────────────────────────

/// (name, value) pairs for every parameter the driving models consume.
///
/// Values are the MITSIM calibration defaults carried by the original
/// short-term implementation.
const DEFAULTS: &[(&str, &str)] = &[
    // Car-following.
    ("speed_scaler", "5 20 20"),
    ("max_acc_car1", "10.00  7.90  5.60  4.00  4.00"),
    ("normal_deceleration_car1", "7.8  6.7  4.8  4.8  4.8"),
    ("max_deceleration_car1", "16.0  14.5  13.0  11.0  10.0"),
    ("max_acceleration_scale", "0.6 0.7 0.8 0.9 1.0 1.1 1.2 1.3 1.4 1.5"),
    ("normal_deceleration_scale", "0.6 0.7 0.8 0.9 1.0 1.1 1.2 1.3 1.4 1.5"),
    ("max_deceleration_scale", "0.6 0.7 0.8 0.9 1.0 1.1 1.2 1.3 1.4 1.5"),
    ("acceleration_grade_factor", "0.305"),
    ("headway_buffer_lower", "0.8"),
    ("headway_buffer_upper", "1.6"),
    // Car-following regime coefficients: alpha beta gamma lambda rho stddev.
    ("cf_param_accelerating", "0.0400 0.7220 0.2420 0.6820 0.6000 0.8250"),
    ("cf_param_decelerating", "-0.0418 0.0000 0.1510 0.6840 0.6800 0.8020"),
    (
        "target_gap_acc_params",
        "0.604 0.385 0.323 0.0678 0.217 0.583 -0.596 -0.219 0.0832 -0.170 1.478 0.131 0.300",
    ),
    // Lane changing: scale alpha lambda beta0..beta4 stddev.
    ("LC_GAP_MODELS_0", "1.00, 0.0, 0.000, 0.508, 0.000, 0.000, -0.420, 0.000, 0.488"),
    ("LC_GAP_MODELS_1", "1.00, 0.0, 0.000, 2.020, 0.000, 0.000, 0.153, 0.188, 0.526"),
    ("LC_GAP_MODELS_2", "1.00, 0.0, 0.000, 0.384, 0.000, 0.000, 0.000, 0.000, 0.859"),
    ("LC_GAP_MODELS_3", "1.00, 0.0, 0.000, 0.587, 0.000, 0.000, 0.048, 0.356, 1.073"),
    ("LC_GAP_MODELS_4", "0.60, 0.0, 0.000, 0.384, 0.000, 0.000, 0.000, 0.000, 0.859"),
    ("LC_GAP_MODELS_5", "0.60, 0.0, 0.000, 0.587, 0.000, 0.000, 0.048, 0.356, 1.073"),
    ("LC_GAP_MODELS_6", "0.20, 0.0, 0.000, 0.384, 0.000, 0.000, 0.000, 0.000, 0.859"),
    ("LC_GAP_MODELS_7", "0.20, 0.0, 0.000, 0.587, 0.000, 0.000, 0.048, 0.356, 1.073"),
    // Target-gap utility rows: const dis2gap gap-size gap-vel dummy vn.
    ("GAP_PARAM_0", "-1.23, -0.482, 0.224, -0.0179, 2.10, 0.239"),
    ("GAP_PARAM_1", "0.00,   0.00,  0.224, -0.0179, 2.10, 0.000"),
    ("GAP_PARAM_2", "-0.772, -0.482, 0.224, -0.0179, 2.10, 0.675"),
    // feet_lowbound feet_delta lane_coeff congest_coeff lane_mintime.
    ("MLC_PARAMETERS", "1320.0  5280.0 0.5 1.0  1.0"),
    ("lane_shift_velocity_cms", "350"),
    ("dlc_satisfied_distance_m", "20.0"),
    // Intersection arbitration.
    ("int_separation_factor", "1.0"),
    ("int_separation_floor_s", "2.0"),
    ("int_turning_speed_mps", "10.0"),
    ("int_comfort_lat_acc", "1.5"),
];

// ── ParameterManager ──────────────────────────────────────────────────────────

/// Name → raw-string parameter store with typed parsing getters.
///
/// Construct with [`ParameterManager::with_defaults`] and layer file-loaded
/// overrides on top with [`ParameterManager::set`].
#[derive(Clone, Debug)]
pub struct ParameterManager {
    table: FxHashMap<String, String>,
}

impl ParameterManager {
    /// A manager pre-loaded with the MITSIM calibration defaults.
    pub fn with_defaults() -> Self {
        let mut table = FxHashMap::default();
        for (k, v) in DEFAULTS {
            table.insert((*k).to_owned(), (*v).to_owned());
        }
        Self { table }
    }

    /// Override (or add) a parameter by name.
    pub fn set(&mut self, name: &str, value: &str) {
        self.table.insert(name.to_owned(), value.to_owned());
    }

    /// Raw string value, if present.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }

    /// A single named f64.
    pub fn param_f64(&self, name: &str) -> CoreResult<f64> {
        let s = self.require(name)?;
        s.trim()
            .parse::<f64>()
            .map_err(|_| CoreError::Parse(format!("parameter {name}: cannot parse {s:?} as f64")))
    }

    /// A named vector of f64, split on whitespace and/or commas.
    pub fn param_vec(&self, name: &str) -> CoreResult<Vec<f64>> {
        let s = self.require(name)?;
        parse_f64_list(s)
            .map_err(|bad| CoreError::Parse(format!("parameter {name}: cannot parse {bad:?}")))
    }

    /// A named vector with an exact expected length.
    pub fn param_vec_exact(&self, name: &str, len: usize) -> CoreResult<Vec<f64>> {
        let v = self.param_vec(name)?;
        if v.len() != len {
            return Err(CoreError::Parse(format!(
                "parameter {name}: expected {len} values, got {}",
                v.len()
            )));
        }
        Ok(v)
    }

    /// Build the speed-indexed table named `values_name` using the shared
    /// `speed_scaler` bucket layout.
    pub fn speed_indexed_table(&self, values_name: &str) -> CoreResult<SpeedIndexedTable> {
        let scaler = self.param_vec_exact("speed_scaler", 3)?;
        let values = self.param_vec(values_name)?;
        SpeedIndexedTable::build(&scaler, &values)
            .map_err(|msg| CoreError::Parse(format!("parameter {values_name}: {msg}")))
    }

    fn require(&self, name: &str) -> CoreResult<&str> {
        self.raw(name)
            .ok_or_else(|| CoreError::Config(format!("missing parameter {name}")))
    }
}

fn parse_f64_list(s: &str) -> Result<Vec<f64>, String> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>().map_err(|_| t.to_owned()))
        .collect()
}

// ── SpeedIndexedTable ─────────────────────────────────────────────────────────

/// A per-integer-speed lookup expanded from an `nBuckets`-element vector.
///
/// `speed_scaler = [n, width, width]` means bucket `j` covers speeds
/// `[j*width, (j+1)*width)`; speeds at or above `width*(n-1)` use the last
/// bucket.  Lookup speeds are rounded to whole units and clamped into
/// `[0, upper_bound]`.
#[derive(Clone, Debug)]
pub struct SpeedIndexedTable {
    values: Vec<f64>,
    upper_bound: usize,
}

impl SpeedIndexedTable {
    fn build(scaler: &[f64], bucket_values: &[f64]) -> Result<Self, String> {
        let n = scaler[0] as usize;
        let width = scaler[1];
        if n == 0 || width <= 0.0 {
            return Err("speed_scaler buckets must be positive".into());
        }
        if bucket_values.len() < n {
            return Err(format!(
                "expected {n} bucket values, got {}",
                bucket_values.len()
            ));
        }
        let upper_bound = (width * (n as f64 - 1.0)).round() as usize;
        let values = (0..=upper_bound)
            .map(|speed| {
                let j = (speed as f64 / width) as usize;
                bucket_values[j.min(n - 1)]
            })
            .collect();
        Ok(Self { values, upper_bound })
    }

    /// Table value for a speed in whole units (m/s), clamped into range.
    #[inline]
    pub fn lookup(&self, speed: f64) -> f64 {
        let idx = (speed.round().max(0.0) as usize).min(self.upper_bound);
        self.values[idx]
    }

    #[inline]
    pub fn upper_bound(&self) -> usize {
        self.upper_bound
    }
}
