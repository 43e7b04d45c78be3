//! Minority oversampling (SMOTE)
//!
//! Synthetic minority rows are interpolated between a random minority row
//! and one of its k nearest minority neighbors, until both classes have
//! the same count. Synthetic rows are appended after the originals.

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{TrainError, TrainResult};
use crate::gbdt::FeatureRow;

pub const DEFAULT_NEIGHBORS: usize = 5;

fn squared_distance(a: &FeatureRow, b: &FeatureRow) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Balance `x`/`y` by oversampling the minority class.
///
/// Already balanced input is returned unchanged. A minority class with a
/// single row is oversampled by duplication. Input with only one class is
/// rejected.
pub fn oversample(
    x: &[FeatureRow],
    y: &[u8],
    k: usize,
    rng: &mut StdRng,
) -> TrainResult<(Vec<FeatureRow>, Vec<u8>)> {
    if x.len() != y.len() {
        return Err(TrainError::ShapeMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    if x.is_empty() {
        return Err(TrainError::EmptyTrainingSet);
    }

    let positives = y.iter().filter(|&&t| t == 1).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(TrainError::SingleClass);
    }

    let mut out_x = x.to_vec();
    let mut out_y = y.to_vec();
    if positives == negatives {
        return Ok((out_x, out_y));
    }

    let minority_class: u8 = if positives < negatives { 1 } else { 0 };
    let minority: Vec<FeatureRow> = x
        .iter()
        .zip(y)
        .filter(|&(_, &t)| t == minority_class)
        .map(|(row, _)| *row)
        .collect();
    let needed = positives.abs_diff(negatives);

    if minority.len() == 1 {
        for _ in 0..needed {
            out_x.push(minority[0]);
            out_y.push(minority_class);
        }
        return Ok((out_x, out_y));
    }

    let k = k.max(1).min(minority.len() - 1);
    let neighbors: Vec<Vec<usize>> = (0..minority.len())
        .map(|i| {
            let mut others: Vec<usize> = (0..minority.len()).filter(|&j| j != i).collect();
            others.sort_by(|&a, &b| {
                squared_distance(&minority[i], &minority[a])
                    .total_cmp(&squared_distance(&minority[i], &minority[b]))
            });
            others.truncate(k);
            others
        })
        .collect();

    for _ in 0..needed {
        let i = rng.random_range(0..minority.len());
        let nn = neighbors[i][rng.random_range(0..neighbors[i].len())];
        let gap: f64 = rng.random();
        let (base, other) = (&minority[i], &minority[nn]);
        let mut synthetic = [0.0; crate::gbdt::N_FEATURES];
        for (f, value) in synthetic.iter_mut().enumerate() {
            *value = base[f] + gap * (other[f] - base[f]);
        }
        out_x.push(synthetic);
        out_y.push(minority_class);
    }

    Ok((out_x, out_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_balances_classes() {
        let x = vec![[90.0, 0.9], [92.0, 0.8], [95.0, 0.85], [40.0, 0.2], [50.0, 0.3]];
        let y = vec![1, 1, 1, 0, 0];
        let (bx, by) = oversample(&x, &y, DEFAULT_NEIGHBORS, &mut rng()).unwrap();
        assert_eq!(bx.len(), 6);
        assert_eq!(by.iter().filter(|&&t| t == 1).count(), 3);
        assert_eq!(by.iter().filter(|&&t| t == 0).count(), 3);
        assert_eq!(&bx[..5], &x[..]);
    }

    #[test]
    fn test_synthetic_rows_between_minority_rows() {
        let x = vec![[10.0, 0.1], [20.0, 0.2], [90.0, 0.9], [91.0, 0.9], [92.0, 0.9], [93.0, 0.9]];
        let y = vec![0, 0, 1, 1, 1, 1];
        let (bx, by) = oversample(&x, &y, DEFAULT_NEIGHBORS, &mut rng()).unwrap();
        for (row, &t) in bx.iter().zip(&by).skip(x.len()) {
            assert_eq!(t, 0);
            assert!(row[0] >= 10.0 && row[0] <= 20.0);
            assert!(row[1] >= 0.1 && row[1] <= 0.2);
        }
    }

    #[test]
    fn test_single_minority_row_is_duplicated() {
        let x = vec![[10.0, 0.1], [90.0, 0.9], [91.0, 0.9], [92.0, 0.9]];
        let y = vec![0, 1, 1, 1];
        let (bx, by) = oversample(&x, &y, DEFAULT_NEIGHBORS, &mut rng()).unwrap();
        assert_eq!(bx.len(), 6);
        assert_eq!(bx[4], [10.0, 0.1]);
        assert_eq!(bx[5], [10.0, 0.1]);
        assert_eq!(&by[4..], &[0, 0]);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![[10.0, 0.1], [20.0, 0.2]];
        assert_eq!(
            oversample(&x, &[1, 1], DEFAULT_NEIGHBORS, &mut rng()),
            Err(TrainError::SingleClass)
        );
    }

    #[test]
    fn test_seeded_output_is_reproducible() {
        let x = vec![[90.0, 0.9], [92.0, 0.8], [95.0, 0.85], [97.0, 0.7], [40.0, 0.2], [50.0, 0.3]];
        let y = vec![1, 1, 1, 1, 0, 0];
        let a = oversample(&x, &y, DEFAULT_NEIGHBORS, &mut rng()).unwrap();
        let b = oversample(&x, &y, DEFAULT_NEIGHBORS, &mut rng()).unwrap();
        assert_eq!(a, b);
    }
}
