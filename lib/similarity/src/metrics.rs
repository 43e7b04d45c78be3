//! Log-loss and the seeded train/test split used by retraining

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const LOG_LOSS_EPS: f64 = 1e-15;

/// Mean binary cross-entropy; probabilities are clipped to
/// `[1e-15, 1 - 1e-15]`. Empty input yields `NaN`.
pub fn log_loss(y: &[u8], p: &[f64]) -> f64 {
    let n = y.len().min(p.len());
    if n == 0 {
        return f64::NAN;
    }
    let total: f64 = y
        .iter()
        .zip(p)
        .map(|(&t, &prob)| {
            let prob = prob.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            if t == 1 {
                -prob.ln()
            } else {
                -(1.0 - prob).ln()
            }
        })
        .sum();
    total / n as f64
}

/// Shuffled split of `0..n` into `(train, test)` indices.
///
/// The test side holds `ceil(n * test_fraction)` indices, at least one
/// when `n > 0`, and the train side keeps at least one when `n > 1`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = match n {
        0 | 1 => n,
        _ => ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1),
    };
    let train = indices.split_off(n_test);
    (train, indices)
}
