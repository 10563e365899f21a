//! Vocabulary selection for generated stories.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::Item;

/// Whether `term` matches any requested term (either contains the other,
/// case-insensitively).
pub fn matches_requested(term: &str, requested: &[String]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    requested.iter().any(|r| {
        let r = r.trim().to_lowercase();
        !r.is_empty() && (term.contains(&r) || r.contains(&term))
    })
}

/// Pick up to `target` items: requested matches first, in pool order, then a
/// uniform random backfill from the rest of the pool.
pub fn select_targets<R: Rng + ?Sized>(
    pool: Vec<Item>,
    requested: &[String],
    target: usize,
    rng: &mut R,
) -> Vec<Item> {
    let (mut selected, mut rest): (Vec<Item>, Vec<Item>) = pool
        .into_iter()
        .partition(|item| matches_requested(&item.term, requested));
    selected.truncate(target);

    let remaining = target - selected.len();
    if remaining > 0 {
        rest.shuffle(rng);
        selected.extend(rest.into_iter().take(remaining));
    }
    selected
}
