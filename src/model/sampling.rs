//! Seeded sampling for class balancing and train/test splits

use crate::error::{LakeError, LakeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn class_indices(labels: &[u8]) -> [Vec<usize>; 2] {
    let mut classes = [Vec::new(), Vec::new()];
    for (i, label) in labels.iter().enumerate() {
        if *label <= 1 {
            classes[*label as usize].push(i);
        }
    }
    classes
}

/// Require at least `minimum` examples of each class
pub fn require_both_classes(labels: &[u8], minimum: usize) -> LakeResult<()> {
    let [negatives, positives] = class_indices(labels);
    if negatives.len() < minimum || positives.len() < minimum {
        return Err(LakeError::Model(format!(
            "need at least {} examples of each class, found {} positive and {} negative",
            minimum,
            positives.len(),
            negatives.len()
        )));
    }
    Ok(())
}

/// Indices of an equal-size sample of each class
///
/// Both classes are sampled without replacement down to the size of the
/// smaller one. Positives come first, then negatives.
pub fn balance_classes(labels: &[u8], seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let [mut negatives, mut positives] = class_indices(labels);
    let n = negatives.len().min(positives.len());

    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);
    positives.truncate(n);
    negatives.truncate(n);

    positives.into_iter().chain(negatives).collect()
}

/// Stratified split into `(train, test)` index lists
///
/// Each class contributes `round(count * test_fraction)` test rows, at least
/// one and never all of them.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut class in class_indices(labels) {
        if class.is_empty() {
            continue;
        }
        class.shuffle(&mut rng);
        let n_test = if class.len() < 2 {
            0
        } else {
            ((class.len() as f64 * test_fraction).round() as usize).clamp(1, class.len() - 1)
        };
        test.extend_from_slice(&class[..n_test]);
        train.extend_from_slice(&class[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_balance_takes_minority_size() {
        let labels = [1, 0, 0, 0, 1, 0, 0];
        let picked = balance_classes(&labels, 7);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked.iter().filter(|i| labels[**i] == 1).count(), 2);
        assert_eq!(picked.iter().collect::<HashSet<_>>().len(), 4);
    }

    #[test]
    fn test_balance_is_seeded() {
        let labels: Vec<u8> = (0..50).map(|i| (i % 3 == 0) as u8).collect();
        assert_eq!(balance_classes(&labels, 42), balance_classes(&labels, 42));
    }

    #[test]
    fn test_stratified_split_keeps_class_ratio() {
        let labels: Vec<u8> = (0..100).map(|i| (i < 40) as u8).collect();
        let (train, test) = stratified_split(&labels, 0.2, 1234);

        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        assert_eq!(test.iter().filter(|i| labels[**i] == 1).count(), 8);
        let all: HashSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_split_is_deterministic() {
        let labels: Vec<u8> = (0..30).map(|i| (i % 2) as u8).collect();
        assert_eq!(stratified_split(&labels, 0.2, 1234), stratified_split(&labels, 0.2, 1234));
    }

    #[test]
    fn test_small_classes_keep_a_training_row() {
        let (train, test) = stratified_split(&[0, 0, 1, 1], 0.2, 1);
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 2);
    }

    #[test]
    fn test_require_both_classes() {
        assert!(require_both_classes(&[1, 1, 0], 2).is_err());
        assert!(require_both_classes(&[1, 1, 0, 0], 2).is_ok());
    }
}
