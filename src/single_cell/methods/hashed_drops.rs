#[cfg(feature = "r")]
use extendr_api::List;
use faer::MatRef;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use crate::assert_same_len;
use crate::core::base::stats::{mad_threshold, MadThreshold, OutlierDirection};
use crate::core::base::utils::{col_subset, row_medians};
use crate::core::data::hto_matrix::{validate_ambient, validate_counts, HtoCountMatrix};
use crate::utils::errors::{HashDemuxError, Result};

////////////////////////
// Params and results //
////////////////////////

/// Structure to store the hashedDrops parameters
///
/// ### Fields
///
/// * `pseudo_scale` - Lower bound of the per-barcode pseudo-count. The
///   pseudo-count itself is the mean scaled ambient abundance of the barcode.
/// * `nmads` - Number of MADs from the median to call doublets (above) and
///   confident singlets (below). Larger values are more lenient.
/// * `constant_ambient` - Shall the mean scaled ambient abundance be used as
///   the expected ambient contribution of the second HTO (instead of its own
///   scaled ambient abundance) for the LogFC2.
/// * `doublet_min` - Optional minimum LogFC2 for a doublet call.
/// * `confident_min` - Optional minimum LogFC for a confident call.
#[derive(Clone, Debug, PartialEq)]
pub struct HashedDropsParams {
    pub pseudo_scale: f64,
    pub nmads: f64,
    pub constant_ambient: bool,
    pub doublet_min: Option<f64>,
    pub confident_min: Option<f64>,
}

impl Default for HashedDropsParams {
    fn default() -> Self {
        Self {
            pseudo_scale: 1.0,
            nmads: 3.0,
            constant_ambient: false,
            doublet_min: None,
            confident_min: None,
        }
    }
}

impl HashedDropsParams {
    /// Generate HashedDropsParams from an R list
    ///
    /// Should values not be found within the List, the parameters will default
    /// to the values of `HashedDropsParams::default()`.
    ///
    /// ### Params
    ///
    /// * `r_list` - The list with the hashedDrops parameters.
    ///
    /// ### Returns
    ///
    /// The `HashedDropsParams` with all parameters set.
    #[cfg(feature = "r")]
    pub fn from_r_list(r_list: List) -> Self {
        let defaults = Self::default();
        let params_list = r_list.into_hashmap();

        let pseudo_scale = params_list
            .get("pseudo_scale")
            .and_then(|v| v.as_real())
            .unwrap_or(defaults.pseudo_scale);

        let nmads = params_list
            .get("nmads")
            .and_then(|v| v.as_real())
            .unwrap_or(defaults.nmads);

        let constant_ambient = params_list
            .get("constant_ambient")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.constant_ambient);

        let doublet_min = params_list.get("doublet_min").and_then(|v| v.as_real());

        let confident_min = params_list.get("confident_min").and_then(|v| v.as_real());

        Self {
            pseudo_scale,
            nmads,
            constant_ambient,
            doublet_min,
            confident_min,
        }
    }

    /// Check the parameters
    ///
    /// ### Returns
    ///
    /// An error if `pseudo_scale` is not a positive finite number or `nmads`
    /// is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.pseudo_scale.is_finite() || self.pseudo_scale <= 0.0 {
            return Err(HashDemuxError::InvalidParameter(format!(
                "pseudo_scale must be > 0, got {}",
                self.pseudo_scale
            )));
        }
        if !self.nmads.is_finite() || self.nmads < 0.0 {
            return Err(HashDemuxError::InvalidParameter(format!(
                "nmads must be >= 0, got {}",
                self.nmads
            )));
        }
        Ok(())
    }
}

/// Statistics of a single barcode
///
/// ### Fields
///
/// * `total` - Sum of the raw counts over the retained HTOs.
/// * `best` - Index (0-based, original HTO rows) of the most abundant HTO
///   after ambient removal.
/// * `second` - Index (0-based, original HTO rows) of the second most
///   abundant HTO.
/// * `log_fc` - log2 fold change between `best` and `second`.
/// * `log_fc2` - log2 fold change of `second` over its expected ambient
///   contribution.
/// * `scaling` - The ambient scaling factor of this barcode.
/// * `pseudo_count` - The pseudo-count added to the adjusted abundances.
/// * `doublet` - Is the barcode a likely doublet.
/// * `confident` - Is the barcode a confidently assigned singlet.
#[derive(Clone, Debug, PartialEq)]
pub struct PerBarcodeStats {
    pub total: f64,
    pub best: usize,
    pub second: usize,
    pub log_fc: f64,
    pub log_fc2: f64,
    pub scaling: f64,
    pub pseudo_count: f64,
    pub doublet: bool,
    pub confident: bool,
}

impl PerBarcodeStats {
    /// Neither a doublet nor a confident singlet
    pub fn is_ambiguous(&self) -> bool {
        !self.doublet && !self.confident
    }

    /// The assigned HTO; only confident singlets are assigned
    pub fn assigned_hto(&self) -> Option<usize> {
        self.confident.then_some(self.best)
    }
}

/// The population thresholds used for the classification
///
/// ### Fields
///
/// * `doublet` - Median, MAD and MAD-based upper threshold of the LogFC2.
/// * `confident` - Median, MAD and MAD-based lower threshold of the LogFC of
///   the non-doublets.
/// * `upper` - Applied LogFC2 threshold (after `doublet_min`).
/// * `lower` - Applied LogFC threshold (after `confident_min`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassificationThresholds {
    pub doublet: MadThreshold,
    pub confident: MadThreshold,
    pub upper: f64,
    pub lower: f64,
}

/// Results of hashedDrops
///
/// ### Fields
///
/// * `stats` - One `PerBarcodeStats` per barcode in input column order.
/// * `ambient` - The ambient profile used (supplied or estimated), one value
///   per original HTO.
/// * `retained_htos` - The original indices of the HTOs with non-zero ambient
///   abundance that were used.
/// * `thresholds` - The classification thresholds.
/// * `barcodes` - The barcodes, if the input carried them.
#[derive(Clone, Debug)]
pub struct HashedDropsRes {
    pub stats: Vec<PerBarcodeStats>,
    pub ambient: Vec<f64>,
    pub retained_htos: Vec<usize>,
    pub thresholds: ClassificationThresholds,
    pub barcodes: Option<Vec<String>>,
}

/// Summary of the assignments
///
/// ### Fields
///
/// * `confident_per_hto` - Number of confident singlets per original HTO.
/// * `n_confident` - Total number of confident singlets.
/// * `n_doublets` - Number of doublets.
/// * `n_ambiguous` - Number of barcodes that are neither.
#[derive(Clone, Debug, PartialEq)]
pub struct DemuxSummary {
    pub confident_per_hto: Vec<usize>,
    pub n_confident: usize,
    pub n_doublets: usize,
    pub n_ambiguous: usize,
}

impl HashedDropsRes {
    /// Number of barcodes
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Are there no barcodes
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Count the assignments per HTO
    ///
    /// ### Returns
    ///
    /// The `DemuxSummary`
    pub fn summary(&self) -> DemuxSummary {
        let mut confident_per_hto = vec![0_usize; self.ambient.len()];
        let mut n_doublets = 0;
        let mut n_ambiguous = 0;

        for stat in &self.stats {
            if let Some(hto) = stat.assigned_hto() {
                confident_per_hto[hto] += 1;
            } else if stat.doublet {
                n_doublets += 1;
            } else {
                n_ambiguous += 1;
            }
        }

        DemuxSummary {
            n_confident: confident_per_hto.iter().sum(),
            confident_per_hto,
            n_doublets,
            n_ambiguous,
        }
    }
}

/// Fold changes of a single barcode, indices relative to the retained HTOs
///
/// ### Fields
///
/// * `total` - Sum of the raw counts.
/// * `best` - Index of the most abundant HTO.
/// * `second` - Index of the second most abundant HTO.
/// * `log_fc` - log2 of best over second.
/// * `log_fc2` - log2 of second over its expected ambient contribution.
/// * `scaling` - The ambient scaling factor.
/// * `pseudo_count` - The applied pseudo-count.
#[derive(Clone, Debug, PartialEq)]
pub struct BarcodeFoldChanges {
    pub total: f64,
    pub best: usize,
    pub second: usize,
    pub log_fc: f64,
    pub log_fc2: f64,
    pub scaling: f64,
    pub pseudo_count: f64,
}

/// Ambient-corrected abundances of a single barcode
///
/// ### Fields
///
/// * `adjusted` - `max(0, count - scaled_ambient) + pseudo_count`.
/// * `scaled_ambient` - The ambient profile times the scaling factor.
/// * `pseudo_count` - The pseudo-count that was added.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjustedAbundance {
    pub adjusted: Vec<f64>,
    pub scaled_ambient: Vec<f64>,
    pub pseudo_count: f64,
}

/////////////
// Ambient //
/////////////

/// Estimate the ambient profile from the counts
///
/// Uses the median count of each HTO over all barcodes. This is only a
/// reasonable proxy with at least three HTOs of similar sample sizes.
///
/// ### Params
///
/// * `counts` - HTO x barcode count matrix.
///
/// ### Returns
///
/// One ambient abundance per HTO.
pub fn estimate_ambient(counts: MatRef<f64>) -> Vec<f64> {
    row_medians(counts)
}

/// Get the HTOs that can be used for the scaling
///
/// ### Params
///
/// * `ambient` - The ambient profile.
///
/// ### Returns
///
/// Indices of the HTOs with an ambient abundance different from zero.
pub fn retained_htos(ambient: &[f64]) -> Vec<usize> {
    ambient
        .iter()
        .enumerate()
        .filter(|(_, &a)| a != 0.0)
        .map(|(i, _)| i)
        .collect()
}

/////////////////
// Per barcode //
/////////////////

/// Estimate the ambient scaling factor of a barcode
///
/// The ratios of count over ambient abundance are ranked. The top two may be
/// driven by cells (singlet or doublet), so the third largest ratio is used;
/// with two HTOs only the second largest is left.
///
/// ### Params
///
/// * `counts` - Counts of the retained HTOs.
/// * `ambient` - Ambient abundances of the retained HTOs (all > 0).
///
/// ### Returns
///
/// The scaling factor
///
/// ### Panics
///
/// If `counts` and `ambient` differ in length or hold fewer than two HTOs.
pub fn contamination_scaling(counts: &[f64], ambient: &[f64]) -> f64 {
    assert_same_len!(counts, ambient);
    assert!(counts.len() >= 2, "Need at least two HTOs for the scaling");

    let mut ratios: Vec<f64> = counts
        .iter()
        .zip(ambient)
        .map(|(c, a)| c / a)
        .collect();
    let rank = if ratios.len() >= 3 { 2 } else { 1 };

    let (_, scaling, _) = ratios.select_nth_unstable_by(rank, |a, b| b.total_cmp(a));

    *scaling
}

/// Remove the scaled ambient contribution and add the pseudo-count
///
/// ### Params
///
/// * `counts` - Counts of the retained HTOs.
/// * `ambient` - Ambient abundances of the retained HTOs.
/// * `scaling` - Scaling factor of this barcode.
/// * `pseudo_scale` - Lower bound of the pseudo-count.
///
/// ### Returns
///
/// The `AdjustedAbundance`
pub fn subtract_ambient(
    counts: &[f64],
    ambient: &[f64],
    scaling: f64,
    pseudo_scale: f64,
) -> AdjustedAbundance {
    assert_same_len!(counts, ambient);

    let scaled_ambient: Vec<f64> = ambient.iter().map(|a| a * scaling).collect();
    let mean_scaled = scaled_ambient.iter().sum::<f64>() / scaled_ambient.len() as f64;
    let pseudo_count = pseudo_scale.max(mean_scaled);

    let adjusted = counts
        .iter()
        .zip(&scaled_ambient)
        .map(|(c, s)| (c - s).max(0.0) + pseudo_count)
        .collect();

    AdjustedAbundance {
        adjusted,
        scaled_ambient,
        pseudo_count,
    }
}

/// Find the two most abundant HTOs
///
/// Ties go to the lower index.
///
/// ### Params
///
/// * `adjusted` - Adjusted abundances (at least two values).
///
/// ### Returns
///
/// Tuple of `(best, second)`
///
/// ### Panics
///
/// If `adjusted` holds fewer than two values.
pub fn top_two(adjusted: &[f64]) -> (usize, usize) {
    assert!(adjusted.len() >= 2, "Need at least two HTOs for the top two");

    let mut best = 0;
    for (i, &v) in adjusted.iter().enumerate().skip(1) {
        if v > adjusted[best] {
            best = i;
        }
    }

    let mut second = if best == 0 { 1 } else { 0 };
    for (i, &v) in adjusted.iter().enumerate() {
        if i != best && v > adjusted[second] {
            second = i;
        }
    }

    (best, second)
}

/// Calculate the fold changes of a single barcode
///
/// ### Params
///
/// * `counts` - Counts of the retained HTOs.
/// * `ambient` - Ambient abundances of the retained HTOs (all > 0).
/// * `params` - The `HashedDropsParams`.
///
/// ### Returns
///
/// The `BarcodeFoldChanges` with indices relative to the retained HTOs.
pub fn barcode_fold_changes(
    counts: &[f64],
    ambient: &[f64],
    params: &HashedDropsParams,
) -> BarcodeFoldChanges {
    let scaling = contamination_scaling(counts, ambient);
    let abundance = subtract_ambient(counts, ambient, scaling, params.pseudo_scale);
    let (best, second) = top_two(&abundance.adjusted);

    let expected_second = if params.constant_ambient {
        abundance.scaled_ambient.iter().sum::<f64>() / abundance.scaled_ambient.len() as f64
    } else {
        abundance.scaled_ambient[second]
    };

    let fc = abundance.adjusted[best] / abundance.adjusted[second];
    let fc2 = abundance.adjusted[second] / (expected_second + abundance.pseudo_count);

    BarcodeFoldChanges {
        total: counts.iter().sum(),
        best,
        second,
        log_fc: fc.log2(),
        log_fc2: fc2.log2(),
        scaling,
        pseudo_count: abundance.pseudo_count,
    }
}

////////////////////
// Classification //
////////////////////

/// Classify barcodes into doublets and confident singlets
///
/// Doublets have a LogFC2 above `median + nmads * MAD`. The LogFC threshold
/// for confident singlets is then derived from the non-doublets only. A MAD
/// of zero puts the threshold on the median.
///
/// ### Params
///
/// * `log_fc` - LogFC of all barcodes.
/// * `log_fc2` - LogFC2 of all barcodes.
/// * `params` - The `HashedDropsParams`.
///
/// ### Returns
///
/// Tuple of `(doublet, confident, thresholds)`
pub fn classify_barcodes(
    log_fc: &[f64],
    log_fc2: &[f64],
    params: &HashedDropsParams,
) -> Result<(Vec<bool>, Vec<bool>, ClassificationThresholds)> {
    assert_same_len!(log_fc, log_fc2);

    let n = log_fc2.len();
    if n < 2 {
        return Err(HashDemuxError::InsufficientBarcodes(n));
    }

    let doublet_thresh = mad_threshold(log_fc2, params.nmads, OutlierDirection::Above)
        .ok_or(HashDemuxError::InsufficientBarcodes(n))?;
    if doublet_thresh.is_collapsed() {
        warn!("MAD of the LogFC2 is zero; doublet threshold equals the median");
    }
    let upper = params
        .doublet_min
        .map_or(doublet_thresh.threshold, |m| doublet_thresh.threshold.max(m));

    let doublet: Vec<bool> = log_fc2.par_iter().map(|&v| v > upper).collect();

    let singlet_log_fc: Vec<f64> = log_fc
        .iter()
        .zip(&doublet)
        .filter(|(_, &d)| !d)
        .map(|(&v, _)| v)
        .collect();

    let confident_thresh = mad_threshold(&singlet_log_fc, params.nmads, OutlierDirection::Below)
        .ok_or(HashDemuxError::InsufficientBarcodes(singlet_log_fc.len()))?;
    if confident_thresh.is_collapsed() {
        warn!("MAD of the LogFC of non-doublets is zero; confidence threshold equals the median");
    }
    let lower = params
        .confident_min
        .map_or(confident_thresh.threshold, |m| {
            confident_thresh.threshold.max(m)
        });

    let confident: Vec<bool> = log_fc
        .par_iter()
        .zip(doublet.par_iter())
        .map(|(&v, &d)| v > lower && !d)
        .collect();

    Ok((
        doublet,
        confident,
        ClassificationThresholds {
            doublet: doublet_thresh,
            confident: confident_thresh,
            upper,
            lower,
        },
    ))
}

//////////////
// Pipeline //
//////////////

/// Demultiplex cell hashing data
///
/// ### Params
///
/// * `counts` - HTO x barcode count matrix of the called cells.
/// * `ambient` - Optional ambient profile (one value per HTO). If not
///   provided, the per-HTO median over all barcodes is used.
/// * `params` - The `HashedDropsParams`.
///
/// ### Returns
///
/// The `HashedDropsRes` with one entry per barcode in column order.
pub fn hashed_drops(
    counts: MatRef<f64>,
    ambient: Option<&[f64]>,
    params: &HashedDropsParams,
) -> Result<HashedDropsRes> {
    let start_total = Instant::now();

    params.validate()?;
    validate_counts(counts)?;

    let n_htos = counts.nrows();
    let n_barcodes = counts.ncols();
    if n_barcodes < 2 {
        return Err(HashDemuxError::InsufficientBarcodes(n_barcodes));
    }

    let ambient = match ambient {
        Some(amb) => {
            validate_ambient(amb, n_htos)?;
            amb.to_vec()
        }
        None => {
            if n_htos < 3 {
                warn!(
                    "Estimating the ambient profile from {} HTOs; the median is a poor proxy with fewer than 3 HTOs",
                    n_htos
                );
            }
            estimate_ambient(counts)
        }
    };

    let retained = retained_htos(&ambient);
    if retained.len() < 2 {
        return Err(HashDemuxError::DegenerateAmbient {
            retained: retained.len(),
        });
    }
    if retained.len() < n_htos {
        debug!(
            "Removed {} HTO(s) with zero ambient abundance",
            n_htos - retained.len()
        );
    }
    if retained.len() == 2 {
        warn!("Only two HTOs available; doublet detection is unreliable");
    }

    let retained_ambient: Vec<f64> = retained.iter().map(|&i| ambient[i]).collect();

    let start_fc = Instant::now();

    let fold_changes: Vec<BarcodeFoldChanges> = (0..n_barcodes)
        .into_par_iter()
        .map(|j| {
            let col = col_subset(counts, j, &retained);
            barcode_fold_changes(&col, &retained_ambient, params)
        })
        .collect();

    info!(
        "Calculated fold changes for {} barcodes: {:.2?}",
        n_barcodes,
        start_fc.elapsed()
    );

    let log_fc: Vec<f64> = fold_changes.iter().map(|fc| fc.log_fc).collect();
    let log_fc2: Vec<f64> = fold_changes.iter().map(|fc| fc.log_fc2).collect();

    let (doublet, confident, thresholds) = classify_barcodes(&log_fc, &log_fc2, params)?;

    let stats: Vec<PerBarcodeStats> = fold_changes
        .into_iter()
        .zip(doublet)
        .zip(confident)
        .map(|((fc, doublet), confident)| PerBarcodeStats {
            total: fc.total,
            best: retained[fc.best],
            second: retained[fc.second],
            log_fc: fc.log_fc,
            log_fc2: fc.log_fc2,
            scaling: fc.scaling,
            pseudo_count: fc.pseudo_count,
            doublet,
            confident,
        })
        .collect();

    info!("Total run time hashedDrops: {:.2?}", start_total.elapsed());

    Ok(HashedDropsRes {
        stats,
        ambient,
        retained_htos: retained,
        thresholds,
        barcodes: None,
    })
}

/// Demultiplex a named HTO count matrix
///
/// Same as [`hashed_drops`], but the barcodes of the matrix are passed
/// through to the results.
///
/// ### Params
///
/// * `matrix` - The `HtoCountMatrix`.
/// * `ambient` - Optional ambient profile.
/// * `params` - The `HashedDropsParams`.
///
/// ### Returns
///
/// The `HashedDropsRes` with `barcodes` set from the matrix.
pub fn hashed_drops_named(
    matrix: &HtoCountMatrix,
    ambient: Option<&[f64]>,
    params: &HashedDropsParams,
) -> Result<HashedDropsRes> {
    let mut res = hashed_drops(matrix.counts.as_ref(), ambient, params)?;
    res.barcodes = matrix.barcodes.clone();

    Ok(res)
}
