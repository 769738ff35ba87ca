//! Deterministic stratified train/test partitioning.

use super::LabeledFile;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Stratified split of labeled filenames into (train, test).
///
/// Pairs are grouped by label; each group is sorted by filename first (the
/// canonical base order, so arrival order never matters), shuffled with the
/// seeded generator, and its first `max(1, round(n * test_size))` entries go
/// to test. The floor guarantees every non-empty label at least one test
/// example, which sends singleton labels entirely to test; rare labels are
/// knowingly over-represented in test rather than absent from it.
///
/// Same (pairs, test_size, seed) always produces the same partition.
pub fn stratified_split(
    pairs: &[LabeledFile],
    test_size: f64,
    seed: u64,
) -> (Vec<LabeledFile>, Vec<LabeledFile>) {
    let mut by_label: BTreeMap<_, Vec<&str>> = BTreeMap::new();
    for (filename, label) in pairs {
        by_label.entry(*label).or_default().push(filename.as_str());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (label, mut group) in by_label {
        group.sort_unstable();
        group.shuffle(&mut rng);

        let take = ((group.len() as f64 * test_size).round() as usize)
            .max(1)
            .min(group.len());
        for (i, filename) in group.into_iter().enumerate() {
            let pair = (filename.to_string(), label);
            if i < take {
                test.push(pair);
            } else {
                train.push(pair);
            }
        }
    }
    (train, test)
}
