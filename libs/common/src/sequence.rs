use std::sync::atomic::{AtomicU64, Ordering};

/// Dense, gapless sequence generator.
///
/// The first value handed out is `1`; `0` is reserved to mean "nothing issued
/// yet" so cursors can start from zero. Values are never reused within the
/// lifetime of the generator.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    last: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next value.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn starts_at_one() {
        let seq = SequenceGenerator::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn concurrent_issue_is_gapless() {
        let seq = Arc::new(SequenceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = seq.clone();
                thread::spawn(move || (0..1000).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for v in h.join().unwrap() {
                assert!(seen.insert(v), "duplicate value {v}");
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(seq.next(), 4001);
        assert!((1..=4000).all(|v| seen.contains(&v)));
    }
}
