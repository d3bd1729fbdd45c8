use extendr_api::prelude::*;

use crate::core::data::hto_matrix::HtoCountMatrix;
use crate::core::data::synthetic_data::*;
use crate::single_cell::methods::hashed_drops::*;
use crate::utils::r_rust_interface::*;

extendr_module! {
    mod r_hashed_drops;
    fn rs_hashed_drops;
    fn rs_synthetic_hashing;
}

/// Demultiplex cell hashing data
///
/// @description
/// Assigns every (already called) cell barcode to its most likely HTO and
/// flags likely doublets. The ambient contamination of each barcode is
/// estimated from its HTO counts, removed, and the two most abundant HTOs are
/// compared against each other and against the ambient expectation. Doublets
/// and confident singlets are called with MAD-based outlier thresholds.
///
/// @param counts Numeric matrix. HTOs x cells. Column names are returned as
/// the barcodes.
/// @param ambient Optional numeric vector. Ambient abundance per HTO. If
/// `NULL`, the per-HTO median over all cells is used.
/// @param hashed_drops_params List. Can contain `pseudo_scale`, `nmads`,
/// `constant_ambient`, `doublet_min` and `confident_min`; missing values
/// fall back to the defaults.
///
/// @return A list with the following elements
/// \itemize{
///   \item barcodes - The column names of `counts` (or `NULL`).
///   \item total - Total HTO counts per cell (retained HTOs).
///   \item best - Index (1-based) of the most abundant HTO.
///   \item second - Index (1-based) of the second most abundant HTO.
///   \item log_fc - log2 fold change of best over second.
///   \item log_fc2 - log2 fold change of second over the ambient expectation.
///   \item doublet - Boolean. Is the cell a likely doublet.
///   \item confident - Boolean. Is the cell a confident singlet.
///   \item ambient - The ambient profile used.
///   \item doublet_threshold - Applied LogFC2 threshold.
///   \item confident_threshold - Applied LogFC threshold.
/// }
///
/// @export
#[extendr]
fn rs_hashed_drops(
    counts: Robj,
    ambient: Robj,
    hashed_drops_params: List,
) -> extendr_api::Result<List> {
    let params = HashedDropsParams::from_r_list(hashed_drops_params);
    let barcodes = r_matrix_colnames(&counts);
    let counts = RMatrix::<f64>::try_from(&counts)?;
    let matrix = HtoCountMatrix::new(r_matrix_to_faer(&counts).to_owned(), None, barcodes)
        .map_err(to_r_error)?;

    let ambient: Option<&[f64]> = if ambient.is_null() {
        None
    } else {
        Some(
            ambient
                .as_real_slice()
                .ok_or_else(|| "ambient must be NULL or a numeric vector".to_string())?,
        )
    };

    let res = hashed_drops_named(&matrix, ambient, &params).map_err(to_r_error)?;

    let barcodes: Robj = match res.barcodes {
        Some(bcs) => bcs.into(),
        None => ().into(),
    };

    let best: Vec<usize> = res.stats.iter().map(|s| s.best).collect();
    let second: Vec<usize> = res.stats.iter().map(|s| s.second).collect();

    Ok(list!(
        barcodes = barcodes,
        total = res.stats.iter().map(|s| s.total).collect::<Vec<f64>>(),
        best = to_r_index(&best),
        second = to_r_index(&second),
        log_fc = res.stats.iter().map(|s| s.log_fc).collect::<Vec<f64>>(),
        log_fc2 = res.stats.iter().map(|s| s.log_fc2).collect::<Vec<f64>>(),
        doublet = res.stats.iter().map(|s| s.doublet).collect::<Vec<bool>>(),
        confident = res.stats.iter().map(|s| s.confident).collect::<Vec<bool>>(),
        ambient = res.ambient,
        doublet_threshold = res.thresholds.upper,
        confident_threshold = res.thresholds.lower
    ))
}

/// Generate synthetic cell hashing data
///
/// @description
/// Simulates Poisson HTO counts for balanced samples with ambient
/// contamination and a given proportion of doublets.
///
/// @param n_cells Integer. Number of cells.
/// @param n_htos Integer. Number of HTOs.
/// @param doublet_rate Numeric. Proportion of doublets.
/// @param cell_signal Numeric. Expected HTO counts of a stained cell.
/// @param ambient_level Numeric. Expected ambient counts per HTO.
/// @param seed Integer. Seed for reproducibility purposes.
///
/// @return A list with the following elements
/// \itemize{
///   \item counts - The HTOs x cells count matrix.
///   \item ambient - The true ambient profile.
///   \item true_hto - HTO (1-based) of the first cell per barcode.
///   \item doublet_partner - HTO (1-based) of the second cell; 0 for singlets.
/// }
///
/// @export
#[extendr]
fn rs_synthetic_hashing(
    n_cells: usize,
    n_htos: usize,
    doublet_rate: f64,
    cell_signal: f64,
    ambient_level: f64,
    seed: usize,
) -> extendr_api::Result<List> {
    let params = SyntheticHashingParams {
        n_cells,
        n_htos,
        doublet_rate,
        cell_signal,
        ambient_level,
        ..Default::default()
    };

    let data = generate_synthetic_hashing(&params, seed as u64).map_err(to_r_error)?;

    let partner: Vec<i32> = data
        .doublet_partner
        .iter()
        .map(|p| p.map_or(0, |x| (x + 1) as i32))
        .collect();

    Ok(list!(
        counts = faer_to_r_matrix(data.counts.as_ref()),
        ambient = data.ambient,
        true_hto = to_r_index(&data.true_hto),
        doublet_partner = partner
    ))
}
