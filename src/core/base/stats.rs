///////////////
// Constants //
///////////////

/// Scale factor to make the MAD a consistent estimator of the standard
/// deviation under normality (same default as R's `mad()`).
pub const MAD_CONSTANT: f64 = 1.4826;

/////////////////////
// Enums | Helpers //
/////////////////////

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutlierDirection {
    /// Check if outlier is below the threshold
    Below,
    /// Check if outlier is above the threshold
    Above,
}

/// Structure holding a MAD-based threshold
///
/// ### Fields
///
/// * `median` - The median of the values.
/// * `mad` - The (scaled) median absolute deviation around `median`.
/// * `threshold` - The resulting threshold, i.e., `median ± nmads * mad`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MadThreshold {
    pub median: f64,
    pub mad: f64,
    pub threshold: f64,
}

impl MadThreshold {
    /// Is the MAD collapsed to zero, i.e., the threshold sits on the median
    pub fn is_collapsed(&self) -> bool {
        self.mad == 0.0
    }
}

///////////////
// Functions //
///////////////

/// Get the median
///
/// NaNs are sorted last via `total_cmp`; callers are expected to hand over
/// finite values.
///
/// ### Params
///
/// * `x` - The slice for which to calculate the median for.
///
/// ### Results
///
/// The median (if the slice is not empty)
pub fn median(x: &[f64]) -> Option<f64> {
    if x.is_empty() {
        return None;
    }

    let mut data = x.to_vec();
    let len = data.len();

    if len % 2 == 0 {
        let (_, median1, right) = data.select_nth_unstable_by(len / 2 - 1, f64::total_cmp);
        let median1 = *median1;
        let median2 = right
            .iter()
            .copied()
            .min_by(f64::total_cmp)
            .unwrap_or(median1);
        Some((median1 + median2) / 2.0)
    } else {
        let (_, median, _) = data.select_nth_unstable_by(len / 2, f64::total_cmp);
        Some(*median)
    }
}

/// Calculate the MAD around a given centre
///
/// ### Params
///
/// * `x` - Slice for which to calculate the MAD for
/// * `center` - The centre to calculate the absolute deviations from. Usually
///   the median of `x`.
/// * `constant` - Scale factor applied to the raw median absolute deviation.
///   Use [`MAD_CONSTANT`] for the R convention or `1.0` for the raw value.
///
/// ### Results
///
/// The MAD of the slice (if the slice is not empty).
pub fn mad_with_center(x: &[f64], center: f64, constant: f64) -> Option<f64> {
    let deviations: Vec<f64> = x.iter().map(|&v| (v - center).abs()).collect();

    median(&deviations).map(|m| m * constant)
}

/// Calculate a one-sided MAD threshold
///
/// ### Params
///
/// * `x` - Slice of values to derive the threshold from.
/// * `nmads` - Number of MADs away from the median to accept as not being an
///   outlier.
/// * `direction` - Which side of the distribution the threshold is for.
///
/// ### Returns
///
/// The `MadThreshold` or `None` if `x` was empty.
pub fn mad_threshold(x: &[f64], nmads: f64, direction: OutlierDirection) -> Option<MadThreshold> {
    let median_val = median(x)?;
    let mad_val = mad_with_center(x, median_val, MAD_CONSTANT)?;
    let margin = nmads * mad_val;

    let threshold = match direction {
        OutlierDirection::Below => median_val - margin,
        OutlierDirection::Above => median_val + margin,
    };

    Some(MadThreshold {
        median: median_val,
        mad: mad_val,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mad_values() {
        // deviations from 3: [2, 1, 0, 1, 2] -> median 1
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mad_with_center(&x, 3.0, 1.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((mad_with_center(&x, 3.0, MAD_CONSTANT).unwrap() - MAD_CONSTANT).abs() < 1e-12);
        assert_eq!(mad_with_center(&[], 0.0, 1.0), None);
    }

    #[test]
    fn test_mad_threshold_collapsed() {
        let x = [2.0; 10];
        let thresh = mad_threshold(&x, 3.0, OutlierDirection::Above).unwrap();
        assert!(thresh.is_collapsed());
        assert_eq!(thresh.threshold, 2.0);
    }

    #[test]
    fn test_mad_threshold_directions() {
        // median 3, raw MAD 2
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0, -100.0];
        let above = mad_threshold(&x, 3.0, OutlierDirection::Above).unwrap();
        assert_eq!(above.median, 3.0);
        assert!((above.mad - 2.0 * MAD_CONSTANT).abs() < 1e-12);
        assert!((above.threshold - (3.0 + 6.0 * MAD_CONSTANT)).abs() < 1e-12);

        let below = mad_threshold(&x, 3.0, OutlierDirection::Below).unwrap();
        assert!((below.threshold - (3.0 - 6.0 * MAD_CONSTANT)).abs() < 1e-12);

        assert_eq!(mad_threshold(&[], 3.0, OutlierDirection::Above), None);
    }
}
