//! crates/deliberation_core/src/shuffle.rs
//!
//! Randomized presentation order for a comment snapshot.

use rand::Rng;

/// Returns a uniformly random permutation of `0..len` (Fisher-Yates).
pub fn presentation_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}
