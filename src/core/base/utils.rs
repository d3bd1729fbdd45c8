use faer::MatRef;
use rayon::prelude::*;

use crate::core::base::stats::median;

/// Calculates the row medians of a matrix
///
/// ### Params
///
/// * `mat` - The matrix for which to calculate the row-wise medians
///
/// ### Returns
///
/// Vector of the row medians. Matrices without columns yield `0.0` per row.
pub fn row_medians(mat: MatRef<f64>) -> Vec<f64> {
    let n_cols = mat.ncols();

    (0..mat.nrows())
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = (0..n_cols).map(|j| mat[(i, j)]).collect();
            median(&row).unwrap_or(0.0)
        })
        .collect()
}

/// Extract a subset of rows of a single column
///
/// ### Params
///
/// * `mat` - The matrix to extract the values from.
/// * `col` - Column index.
/// * `rows` - Row indices to extract (in that order).
///
/// ### Returns
///
/// The values `mat[(rows[k], col)]`.
pub fn col_subset(mat: MatRef<f64>, col: usize, rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&i| mat[(i, col)]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_row_medians() {
        let m = mat![[1.0, 5.0, 3.0], [0.0, 0.0, 7.0], [2.0, 4.0, 6.0]];
        assert_eq!(row_medians(m.as_ref()), vec![3.0, 0.0, 4.0]);
    }

    #[test]
    fn test_col_subset() {
        let m = mat![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0]];
        assert_eq!(col_subset(m.as_ref(), 1, &[2, 0]), vec![7.0, 5.0]);
    }
}
