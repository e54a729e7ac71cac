//src/read.rs

use ahash::AHashSet;

/// All hits of one read against one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ref_idx: u32,
    /// Bin index of every hit, in arrival order. Repeats are kept.
    pub bins: Vec<u32>,
}

/// One query (or one mate of a pair) and everything it mapped to.
#[derive(Debug, Clone, Default)]
pub struct Read {
    pub targets: Vec<Target>,
    /// Query sequence length of the last record seen for this read.
    pub len: u32,
    /// Sum of the lengths of the references this read is counted against.
    pub sum_ref_lengths: u64,
}

impl Read {
    /// Record a hit in bin `bin` of reference `ref_idx`.
    pub fn add_target(&mut self, ref_idx: u32, bin: u32) {
        match self.targets.iter_mut().find(|t| t.ref_idx == ref_idx) {
            Some(t) => t.bins.push(bin),
            None => self.targets.push(Target {
                ref_idx,
                bins: vec![bin],
            }),
        }
    }

    /// True when the read hit at most one reference.
    pub fn is_unique(&self) -> bool {
        self.targets.len() <= 1
    }

    /// Distinct taxa among the targets whose taxon passes `accept`.
    fn distinct_taxa(&self, taxon_of: &[u32], accept: impl Fn(u32) -> bool) -> AHashSet<u32> {
        self.targets
            .iter()
            .map(|t| taxon_of[t.ref_idx as usize])
            .filter(|&taxid| accept(taxid))
            .collect()
    }

    /// True when all targets resolve to at most one taxon.
    pub fn is_taxon_unique(&self, taxon_of: &[u32]) -> bool {
        self.is_unique() || self.distinct_taxa(taxon_of, |_| true).len() <= 1
    }

    /// Like [`Read::is_taxon_unique`] but ignoring targets whose taxon is not in `valid_taxa`.
    pub fn is_unique_among(&self, taxon_of: &[u32], valid_taxa: &AHashSet<u32>) -> bool {
        self.is_unique() || self.distinct_taxa(taxon_of, |t| valid_taxa.contains(&t)).len() <= 1
    }

    /// Drop targets whose taxon is not in `valid_taxa`, taking their reference
    /// lengths back out of `sum_ref_lengths`.
    pub fn retarget(&mut self, taxon_of: &[u32], ref_lengths: &[u32], valid_taxa: &AHashSet<u32>) {
        let mut removed = 0u64;
        self.targets.retain(|t| {
            let keep = valid_taxa.contains(&taxon_of[t.ref_idx as usize]);
            if !keep {
                removed += ref_lengths[t.ref_idx as usize] as u64;
            }
            keep
        });
        self.sum_ref_lengths = self.sum_ref_lengths.saturating_sub(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_with(targets: &[(u32, u32)]) -> Read {
        let mut read = Read::default();
        for &(r, b) in targets {
            read.add_target(r, b);
        }
        read
    }

    #[test]
    fn hits_on_same_reference_share_a_target() {
        let read = read_with(&[(3, 1), (3, 1), (3, 7)]);
        assert_eq!(read.targets.len(), 1);
        assert_eq!(read.targets[0].bins, vec![1, 1, 7]);
        assert!(read.is_unique());
    }

    #[test]
    fn two_references_are_not_unique() {
        let read = read_with(&[(0, 1), (1, 4)]);
        assert!(!read.is_unique());
        assert!(Read::default().is_unique());
    }

    #[test]
    fn same_taxon_on_two_references_is_taxon_unique() {
        // refs 0 and 1 both belong to taxon 562
        let taxon_of = [562, 562, 1280];
        let valid: AHashSet<u32> = [562, 1280].into_iter().collect();
        let read = read_with(&[(0, 1), (1, 2)]);
        assert!(!read.is_unique());
        assert!(read.is_taxon_unique(&taxon_of));
        assert!(read.is_unique_among(&taxon_of, &valid));

        let read = read_with(&[(0, 1), (2, 2)]);
        assert!(!read.is_unique_among(&taxon_of, &valid));
    }

    #[test]
    fn invalid_taxa_are_ignored_for_uniqueness() {
        let taxon_of = [10, 20];
        let valid: AHashSet<u32> = [10].into_iter().collect();
        let read = read_with(&[(0, 0), (1, 0)]);
        assert!(!read.is_taxon_unique(&taxon_of));
        assert!(read.is_unique_among(&taxon_of, &valid));
    }

    #[test]
    fn retarget_drops_invalid_and_adjusts_length_sum() {
        let taxon_of = [10, 20, 30];
        let lengths = [1000, 2000, 4000];
        let valid: AHashSet<u32> = [10, 30].into_iter().collect();
        let mut read = read_with(&[(0, 0), (1, 0), (2, 5)]);
        read.sum_ref_lengths = 7000;
        read.retarget(&taxon_of, &lengths, &valid);
        let refs: Vec<u32> = read.targets.iter().map(|t| t.ref_idx).collect();
        assert_eq!(refs, vec![0, 2]);
        assert_eq!(read.sum_ref_lengths, 5000);
    }
}
