//! One-shot user guidance shared by concurrent writers

use std::sync::Once;

/// Runs an announcement at most once, however many writers ask
///
/// Create one per rendering pass and hand it to each writer.
#[derive(Debug)]
pub struct AnnounceOnce {
    once: Once,
}

impl Default for AnnounceOnce {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnounceOnce {
    pub fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Run `announce` unless this instance already ran one
    pub fn announce(&self, announce: impl FnOnce()) {
        self.once.call_once(announce);
    }

    pub fn has_announced(&self) -> bool {
        self.once.is_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn fires_once_across_threads() {
        let announce = AnnounceOnce::new();
        let fired = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..32 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        announce.announce(|| {
                            fired.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                });
            }
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(announce.has_announced());
    }

    #[test]
    fn separate_passes_announce_separately() {
        let first = AnnounceOnce::new();
        let second = AnnounceOnce::new();
        let mut count = 0;

        first.announce(|| count += 1);
        first.announce(|| count += 1);
        second.announce(|| count += 1);

        assert_eq!(count, 2);
    }
}
