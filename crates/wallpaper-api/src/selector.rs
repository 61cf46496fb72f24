//! Random key selection

use rand::Rng;

/// Picks one key out of a non-empty index.
pub trait KeySelector: Send + Sync {
    /// Returns a position in `0..len`. Callers guarantee `len > 0`.
    fn pick(&self, len: usize) -> usize;

    fn select<'a>(&self, keys: &'a [String]) -> &'a str {
        &keys[self.pick(keys.len())]
    }
}

/// Uniform, non-cryptographic selection using the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl KeySelector for RandomSelector {
    fn pick(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key() {
        let keys = vec!["only.jpg".to_string()];
        assert_eq!(RandomSelector.select(&keys), "only.jpg");
    }

    #[test]
    fn test_selection_is_a_member() {
        let keys: Vec<String> = (0..7).map(|i| format!("pc_img/{}.jpg", i)).collect();
        for _ in 0..200 {
            let key = RandomSelector.select(&keys);
            assert!(keys.iter().any(|k| k == key));
        }
    }

    #[test]
    fn test_selection_is_uniform() {
        const K: usize = 4;
        const TRIALS: usize = 20_000;

        let keys: Vec<String> = (0..K).map(|i| i.to_string()).collect();
        let mut counts = [0usize; K];
        for _ in 0..TRIALS {
            let key = RandomSelector.select(&keys);
            counts[key.parse::<usize>().unwrap()] += 1;
        }

        // Expected 5000 each; sd is about 61, so 500 is over 8 sd
        let expected = TRIALS / K;
        for count in counts {
            assert!(count.abs_diff(expected) < 500, "{counts:?}");
        }
    }
}
