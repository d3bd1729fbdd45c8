use faer::{Mat, MatRef};

use crate::utils::errors::{HashDemuxError, Result};

/////////////
// Helpers //
/////////////

/// Check that a count matrix is usable for demultiplexing
///
/// ### Params
///
/// * `counts` - HTO x barcode count matrix.
///
/// ### Returns
///
/// An error if there are fewer than two HTOs or if any entry is negative or
/// not finite.
pub fn validate_counts(counts: MatRef<f64>) -> Result<()> {
    if counts.nrows() < 2 {
        return Err(HashDemuxError::InputShape(format!(
            "count matrix needs at least 2 HTO rows, got {}",
            counts.nrows()
        )));
    }

    for j in 0..counts.ncols() {
        for i in 0..counts.nrows() {
            let val = counts[(i, j)];
            if !val.is_finite() || val < 0.0 {
                return Err(HashDemuxError::InvalidInput(format!(
                    "count at HTO {} / barcode {} is {}",
                    i, j, val
                )));
            }
        }
    }

    Ok(())
}

/// Check a supplied ambient profile against the count matrix
///
/// ### Params
///
/// * `ambient` - The ambient abundances, one per HTO.
/// * `n_htos` - Number of HTO rows in the count matrix.
///
/// ### Returns
///
/// An error on length mismatch or on negative / non-finite values. Zeros are
/// allowed.
pub fn validate_ambient(ambient: &[f64], n_htos: usize) -> Result<()> {
    if ambient.len() != n_htos {
        return Err(HashDemuxError::InputShape(format!(
            "ambient profile has length {}, but the count matrix has {} HTOs",
            ambient.len(),
            n_htos
        )));
    }

    if let Some((i, val)) = ambient
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(HashDemuxError::InvalidInput(format!(
            "ambient abundance of HTO {} is {}",
            i, val
        )));
    }

    Ok(())
}

////////////////
// Structures //
////////////////

/// HTO count matrix with optional names
///
/// The names are carried through the demultiplexing untouched, so results
/// can be reported against them.
///
/// ### Fields
///
/// * `counts` - The HTO x barcode counts (HTOs in rows, called cells in
///   columns).
/// * `hto_names` - Optional names of the HTOs (length = number of rows).
/// * `barcodes` - Optional cell barcodes (length = number of columns).
#[derive(Clone, Debug)]
pub struct HtoCountMatrix {
    pub counts: Mat<f64>,
    pub hto_names: Option<Vec<String>>,
    pub barcodes: Option<Vec<String>>,
}

impl HtoCountMatrix {
    /// Generate a new, validated HTO count matrix
    ///
    /// ### Params
    ///
    /// * `counts` - The HTO x barcode counts.
    /// * `hto_names` - Optional HTO names.
    /// * `barcodes` - Optional barcodes.
    ///
    /// ### Returns
    ///
    /// The `HtoCountMatrix` or an error if the counts or the names do not
    /// fit.
    pub fn new(
        counts: Mat<f64>,
        hto_names: Option<Vec<String>>,
        barcodes: Option<Vec<String>>,
    ) -> Result<Self> {
        validate_counts(counts.as_ref())?;

        if let Some(names) = &hto_names {
            if names.len() != counts.nrows() {
                return Err(HashDemuxError::InputShape(format!(
                    "{} HTO names for {} HTO rows",
                    names.len(),
                    counts.nrows()
                )));
            }
        }

        if let Some(bcs) = &barcodes {
            if bcs.len() != counts.ncols() {
                return Err(HashDemuxError::InputShape(format!(
                    "{} barcodes for {} columns",
                    bcs.len(),
                    counts.ncols()
                )));
            }
        }

        Ok(Self {
            counts,
            hto_names,
            barcodes,
        })
    }

    /// Generate the matrix from column-major data (as delivered by R)
    ///
    /// ### Params
    ///
    /// * `data` - Column-major values of length `n_htos * n_barcodes`.
    /// * `n_htos` - Number of rows.
    /// * `n_barcodes` - Number of columns.
    ///
    /// ### Returns
    ///
    /// The `HtoCountMatrix` without names.
    pub fn from_column_major(data: &[f64], n_htos: usize, n_barcodes: usize) -> Result<Self> {
        if data.len() != n_htos * n_barcodes {
            return Err(HashDemuxError::InputShape(format!(
                "{} values cannot form a {} x {} matrix",
                data.len(),
                n_htos,
                n_barcodes
            )));
        }

        let counts = MatRef::from_column_major_slice(data, n_htos, n_barcodes).to_owned();

        Self::new(counts, None, None)
    }

    /// Number of HTOs
    pub fn n_htos(&self) -> usize {
        self.counts.nrows()
    }

    /// Number of barcodes
    pub fn n_barcodes(&self) -> usize {
        self.counts.ncols()
    }

    /// Name of an HTO, defaulting to its 0-based index
    pub fn hto_name(&self, idx: usize) -> String {
        self.hto_names
            .as_ref()
            .and_then(|names| names.get(idx).cloned())
            .unwrap_or_else(|| idx.to_string())
    }
}
