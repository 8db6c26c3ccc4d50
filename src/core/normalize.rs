//! Quantile-based rescaling of extracted images to [0, 1]

use crate::types::{GeoError, GeoResult};
use ndarray::Array2;
use num_traits::Float;

/// Linear quantile of sorted data (same convention as numpy's default)
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Rescale an image to [0, 1] between its `p` and `1-p` quantiles.
///
/// `p == 0` uses the image minimum and maximum. NaN pixels are left out of
/// the quantiles and stay NaN in the output.
pub fn normalize<T: Float>(image: &Array2<T>, p: f64) -> GeoResult<Array2<T>> {
    if !(0.0..0.5).contains(&p) {
        return Err(GeoError::InvalidParameter(format!(
            "Quantile clip {} must lie in [0, 0.5)",
            p
        )));
    }

    let mut values: Vec<f64> = image
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| !v.is_nan())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let (low, high) = match (quantile_sorted(&values, p), quantile_sorted(&values, 1.0 - p)) {
        (Some(low), Some(high)) => (low, high),
        _ => {
            return Err(GeoError::DegenerateRange {
                low: f64::NAN,
                high: f64::NAN,
            })
        }
    };

    let delta = high - low;
    if !delta.is_finite() || delta <= 0.0 {
        return Err(GeoError::DegenerateRange { low, high });
    }

    log::debug!("Normalizing {:?} image between {} and {}", image.dim(), low, high);

    Ok(image.mapv(|v| match v.to_f64() {
        Some(x) if !x.is_nan() => {
            let scaled = ((x - low) / delta).clamp(0.0, 1.0);
            T::from(scaled).unwrap_or_else(T::nan)
        }
        _ => T::nan(),
    }))
}
