//! Portable atomic `f64` addition.
//!
//! Not every target has a native double-precision atomic add, so pair
//! counts, word marginals, section counts, norm-squared accumulators, and
//! candidate dot products are all stored as `AtomicU64` bit patterns and
//! mutated through a compare-and-swap loop (spec §9, "Atomic float
//! addition"). This introduces no ordering surprises beyond a normal CAS
//! loop; it does not provide any ordering guarantee *between* distinct
//! addresses.

use core::sync::atomic::{AtomicU64, Ordering};

/// Atomically add `delta` to the `f64` stored (as bits) in `slot`, returning
/// the previous value.
#[inline]
pub fn atomic_add_f64(slot: &AtomicU64, delta: f64) -> f64 {
    let mut current = slot.load(Ordering::Relaxed);
    loop {
        let current_f = f64::from_bits(current);
        let new_f = current_f + delta;
        match slot.compare_exchange_weak(
            current,
            new_f.to_bits(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return current_f,
            Err(observed) => current = observed,
        }
    }
}

/// Read the `f64` currently stored (as bits) in `slot`.
#[inline]
pub fn load_f64(slot: &AtomicU64, order: Ordering) -> f64 {
    f64::from_bits(slot.load(order))
}

/// Store an `f64` (as bits) into `slot`.
#[inline]
pub fn store_f64(slot: &AtomicU64, value: f64, order: Ordering) {
    slot.store(value.to_bits(), order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_thread_add() {
        let slot = AtomicU64::new(0f64.to_bits());
        atomic_add_f64(&slot, 1.5);
        atomic_add_f64(&slot, 2.5);
        assert_eq!(load_f64(&slot, Ordering::Relaxed), 4.0);
    }

    #[test]
    fn concurrent_adds_commute() {
        let slot = Arc::new(AtomicU64::new(0f64.to_bits()));
        let threads = 8;
        let iterations = 10_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        atomic_add_f64(&slot, 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(
            load_f64(&slot, Ordering::Relaxed),
            (threads * iterations) as f64
        );
    }
}
