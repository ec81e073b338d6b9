use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Items partitioned into training and test sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

/// Number of items that go to the test set.
///
/// Computed in `f32` so that e.g. `5 * 0.2` lands on exactly `1.0`.
pub fn test_count(len: usize, test_size: f32) -> usize {
    ((len as f32 * test_size).ceil() as usize).min(len)
}

/// Shuffle `items` with a seeded RNG and move the first `test_count` of them
/// into the test set.
pub fn train_test_split<T>(
    mut items: Vec<T>,
    test_size: f32,
    seed: u64,
) -> anyhow::Result<Split<T>> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&test_size),
        "test_size must be within [0, 1], got {test_size}"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let n_test = test_count(items.len(), test_size);
    let test: Vec<T> = items.drain(..n_test).collect();
    Ok(Split { train: items, test })
}
