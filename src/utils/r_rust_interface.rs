use extendr_api::prelude::*;
use faer::MatRef;

use crate::utils::errors::HashDemuxError;

/// Transform an R matrix to a Faer one
pub fn r_matrix_to_faer(x: &RMatrix<f64>) -> faer::MatRef<'_, f64> {
    let ncol = x.ncols();
    let nrow = x.nrows();
    let data = x.data();

    MatRef::from_column_major_slice(data, nrow, ncol)
}

/// Transform a crate error into an extendr error
pub fn to_r_error(err: HashDemuxError) -> extendr_api::Error {
    Error::Other(err.to_string())
}

/// Transform a faer into an R matrix
pub fn faer_to_r_matrix(x: faer::MatRef<f64>) -> extendr_api::RArray<f64, [usize; 2]> {
    let nrow = x.nrows();
    let ncol = x.ncols();

    RArray::new_matrix(nrow, ncol, |row, column| x[(row, column)])
}

/// Transform 0-based indices into 1-based R integers
pub fn to_r_index(x: &[usize]) -> Vec<i32> {
    x.iter().map(|&i| (i + 1) as i32).collect()
}

/// Get the column names of an R matrix, if it has any
pub fn r_matrix_colnames(x: &Robj) -> Option<Vec<String>> {
    let dimnames = x.get_attrib("dimnames")?.as_list()?;
    dimnames.elt(1).ok()?.as_string_vector()
}
