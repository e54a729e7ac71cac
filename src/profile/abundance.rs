//src/profile/abundance.rs

use super::{Pass, ReferenceContig};

/// Length-normalized relative abundance of every reference for one pass.
///
/// Read share `count * 100 / total` is divided by reference length and
/// rescaled so the counted references sum to 100. References with no hits
/// in the pass (or zero length) get 0.
pub fn normalize_abundance(references: &mut [ReferenceContig], pass: Pass) {
    let total: u64 = references
        .iter()
        .filter(|r| r.length > 0)
        .map(|r| r.count(pass) as u64)
        .sum();

    let mut weighted = 0.0;
    for r in references.iter_mut() {
        let count = r.count(pass);
        let share = if count > 0 && r.length > 0 && total > 0 {
            count as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        *r.abundance_mut(pass) = share;
        if share > 0.0 {
            weighted += share / r.length as f64;
        }
    }

    if weighted == 0.0 {
        return;
    }
    for r in references.iter_mut() {
        let length = r.length as f64;
        let ab = r.abundance_mut(pass);
        if *ab > 0.0 {
            *ab = (*ab * 100.0) / (weighted * length);
        }
    }
}
