use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Proportions and seeds for the two-stage split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of all items held out for testing.
    pub test_size: f64,
    /// Share of the remaining items held out for validation.
    pub validation_size: f64,
    pub test_seed: u64,
    pub validation_seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.15,
            validation_size: 0.1,
            test_seed: 1338,
            validation_seed: 1337,
        }
    }
}

/// Shuffles `items` with a fixed seed and cuts the first `ceil(fraction * n)`
/// off as the held-out part. Returns `(kept, held_out)`.
fn holdout<T: Clone>(items: &[T], fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    // 0.15 * 100 is 15.000000000000002 in f64; keep that from rounding up.
    let n_out = ((fraction * n as f64 - 1e-9).ceil().max(0.0) as usize).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let held_out = order[..n_out].iter().map(|&i| items[i].clone()).collect();
    let kept = order[n_out..].iter().map(|&i| items[i].clone()).collect();
    (kept, held_out)
}

/// Partitions `items` into `(train, test, validation)`.
///
/// Test takes `test_size` of everything, validation takes `validation_size`
/// of what is left, train gets the rest. The result depends only on the input
/// order and the seeds.
pub fn train_test_validation_split<T: Clone>(
    items: &[T],
    config: &SplitConfig,
) -> (Vec<T>, Vec<T>, Vec<T>) {
    let (train_val, test) = holdout(items, config.test_size, config.test_seed);
    let (train, validation) = holdout(&train_val, config.validation_size, config.validation_seed);
    (train, test, validation)
}
