use faer::Mat;
use rand::prelude::*;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::utils::errors::{HashDemuxError, Result};

////////////////
// Structures //
////////////////

/// Parameters for the synthetic hashing data
///
/// ### Fields
///
/// * `n_cells` - Number of cell barcodes (columns).
/// * `n_htos` - Number of HTOs (rows).
/// * `doublet_rate` - Proportion of barcodes that are doublets of two
///   different samples.
/// * `cell_signal` - Expected HTO counts contributed by a stained cell.
/// * `ambient_level` - Expected ambient counts per HTO and barcode on average.
/// * `depth_shape` - Shape of the Gamma distribution for the per-barcode
///   capture efficiency (mean 1). Lower values give more variable depths.
#[derive(Clone, Debug)]
pub struct SyntheticHashingParams {
    pub n_cells: usize,
    pub n_htos: usize,
    pub doublet_rate: f64,
    pub cell_signal: f64,
    pub ambient_level: f64,
    pub depth_shape: f64,
}

impl Default for SyntheticHashingParams {
    fn default() -> Self {
        Self {
            n_cells: 1000,
            n_htos: 4,
            doublet_rate: 0.05,
            cell_signal: 500.0,
            ambient_level: 10.0,
            depth_shape: 10.0,
        }
    }
}

/// Structure for synthetic hashing data
///
/// ### Fields
///
/// * `counts` - The synthetic HTO x barcode counts.
/// * `ambient` - The true (unscaled) ambient profile that was used.
/// * `true_hto` - The HTO (0-indexed) of the first cell in each barcode.
/// * `doublet_partner` - For doublets, the HTO of the second cell.
#[derive(Clone, Debug)]
pub struct SyntheticHashingData {
    pub counts: Mat<f64>,
    pub ambient: Vec<f64>,
    pub true_hto: Vec<usize>,
    pub doublet_partner: Vec<Option<usize>>,
}

impl SyntheticHashingData {
    /// Indices of the simulated doublets
    pub fn doublet_indices(&self) -> Vec<usize> {
        self.doublet_partner
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|_| i))
            .collect()
    }
}

/////////////////////////////
// Synthetic hashing data //
/////////////////////////////

/// Generate synthetic HTO hashing data
///
/// Every barcode receives Poisson counts with an expectation of
/// `depth * (ambient[h] + signal)`, where the signal is only present for the
/// HTO(s) of the cell(s) in the droplet. Samples are balanced across HTOs.
///
/// ### Params
///
/// * `params` - The `SyntheticHashingParams`.
/// * `seed` - Seed for reproducibility purposes.
///
/// ### Returns
///
/// The `SyntheticHashingData`.
pub fn generate_synthetic_hashing(
    params: &SyntheticHashingParams,
    seed: u64,
) -> Result<SyntheticHashingData> {
    if params.n_htos < 2 {
        return Err(HashDemuxError::InvalidParameter(format!(
            "need at least 2 HTOs, got {}",
            params.n_htos
        )));
    }
    if !(0.0..=1.0).contains(&params.doublet_rate) {
        return Err(HashDemuxError::InvalidParameter(format!(
            "doublet_rate must be within [0, 1], got {}",
            params.doublet_rate
        )));
    }
    if params.ambient_level <= 0.0 || params.cell_signal < 0.0 {
        return Err(HashDemuxError::InvalidParameter(
            "ambient_level must be > 0 and cell_signal >= 0".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let depth_dist = Gamma::new(params.depth_shape, 1.0 / params.depth_shape)
        .map_err(|e| HashDemuxError::InvalidParameter(format!("depth_shape: {}", e)))?;

    // ambient proportions vary 2-fold across HTOs
    let raw_props: Vec<f64> = (0..params.n_htos)
        .map(|_| rng.random_range(0.5..1.5))
        .collect();
    let mean_prop = raw_props.iter().sum::<f64>() / params.n_htos as f64;
    let ambient: Vec<f64> = raw_props
        .iter()
        .map(|p| p / mean_prop * params.ambient_level)
        .collect();

    let mut counts = Mat::<f64>::zeros(params.n_htos, params.n_cells);
    let mut true_hto = Vec::with_capacity(params.n_cells);
    let mut doublet_partner = Vec::with_capacity(params.n_cells);

    for j in 0..params.n_cells {
        let first = j % params.n_htos;
        let partner = if rng.random::<f64>() < params.doublet_rate {
            let mut p = rng.random_range(0..params.n_htos - 1);
            if p >= first {
                p += 1;
            }
            Some(p)
        } else {
            None
        };

        let depth: f64 = depth_dist.sample(&mut rng);

        for (h, amb) in ambient.iter().enumerate() {
            let signal = if h == first || Some(h) == partner {
                params.cell_signal
            } else {
                0.0
            };
            let lambda = (depth * (amb + signal)).max(f64::MIN_POSITIVE);
            let poisson = Poisson::new(lambda)
                .map_err(|e| HashDemuxError::InvalidParameter(format!("poisson rate: {}", e)))?;
            counts[(h, j)] = poisson.sample(&mut rng);
        }

        true_hto.push(first);
        doublet_partner.push(partner);
    }

    Ok(SyntheticHashingData {
        counts,
        ambient,
        true_hto,
        doublet_partner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_dimensions() {
        let params = SyntheticHashingParams {
            n_cells: 200,
            n_htos: 5,
            ..Default::default()
        };
        let data = generate_synthetic_hashing(&params, 42).unwrap();

        assert_eq!(data.counts.nrows(), 5);
        assert_eq!(data.counts.ncols(), 200);
        assert_eq!(data.ambient.len(), 5);
        assert_eq!(data.true_hto.len(), 200);

        for (j, partner) in data.doublet_partner.iter().enumerate() {
            if let Some(p) = partner {
                assert_ne!(*p, data.true_hto[j]);
            }
        }
    }

    #[test]
    fn test_synthetic_reproducible() {
        let params = SyntheticHashingParams {
            n_cells: 50,
            ..Default::default()
        };
        let a = generate_synthetic_hashing(&params, 1).unwrap();
        let b = generate_synthetic_hashing(&params, 1).unwrap();

        for j in 0..a.counts.ncols() {
            for i in 0..a.counts.nrows() {
                assert_eq!(a.counts[(i, j)], b.counts[(i, j)]);
            }
        }
        assert_eq!(a.doublet_partner, b.doublet_partner);
    }

    #[test]
    fn test_synthetic_invalid_params() {
        let params = SyntheticHashingParams {
            n_htos: 1,
            ..Default::default()
        };
        assert!(generate_synthetic_hashing(&params, 1).is_err());

        let params = SyntheticHashingParams {
            doublet_rate: 1.5,
            ..Default::default()
        };
        assert!(generate_synthetic_hashing(&params, 1).is_err());
    }
}
