//src/profile/propagate.rs

use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

use super::RunContext;
use crate::taxdb::Taxonomy;

/// Credit every read still ambiguous after filtering to the LCA of its
/// remaining taxa, then push those counts up to every ancestor of the LCA.
pub fn assign_ambiguous_reads(ctx: &mut RunContext, taxonomy: &Taxonomy) {
    let mut lca_reads: AHashMap<u32, u32> = AHashMap::new();
    let mut lca_refs: AHashMap<u32, BTreeSet<u32>> = AHashMap::new();

    for read in ctx.reads.values() {
        if read.targets.is_empty() || read.is_unique_among(&ctx.taxon_of, &ctx.valid_taxa) {
            continue;
        }
        let taxa: AHashSet<u32> = read
            .targets
            .iter()
            .map(|t| ctx.taxon_of[t.ref_idx as usize])
            .collect();
        let Some(lca) = taxonomy.lca(&taxa, &ctx.valid_taxa) else {
            ctx.stats.unresolved_reads += 1;
            continue;
        };
        *lca_reads.entry(lca).or_insert(0) += 1;
        lca_refs
            .entry(lca)
            .or_default()
            .extend(read.targets.iter().map(|t| t.ref_idx));
    }

    let mut lcas: Vec<u32> = lca_reads.keys().copied().collect();
    lcas.sort_unstable();
    for lca in lcas {
        let count = lca_reads[&lca];
        let refs = &lca_refs[&lca];
        for taxid in taxonomy.lineage(lca) {
            *ctx.taxon_reads.entry(taxid).or_insert(0) += count;
            ctx.taxon_contributors
                .entry(taxid)
                .or_default()
                .extend(refs.iter().copied());
        }
    }

    if ctx.stats.unresolved_reads > 0 {
        log::warn!(
            "{} ambiguous reads have no common ancestor",
            ctx.stats.unresolved_reads
        );
    }
}

/// Add each reference's unique-pass-2 reads and abundance to its own taxon
/// and every ancestor.
///
/// Membership follows the same rule as retargeting: a reference on a valid
/// taxon contributes even when it failed the rules itself, since its pass-2
/// reads were kept on that taxon.
pub fn propagate_references(ctx: &mut RunContext, taxonomy: &Taxonomy) {
    for (idx, reference) in ctx.references.iter().enumerate() {
        if reference.uniq_reads2 == 0 || !ctx.valid_taxa.contains(&reference.tax_id) {
            continue;
        }
        for taxid in taxonomy.lineage(reference.tax_id) {
            *ctx.taxon_reads.entry(taxid).or_insert(0) += reference.uniq_reads2;
            *ctx.taxon_abundance.entry(taxid).or_insert(0.0) += reference.rel_abundance_uniq2;
            ctx.taxon_contributors
                .entry(taxid)
                .or_default()
                .insert(idx as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ReferenceContig;
    use crate::read::Read;

    /// genus 10 with species 100 and 101; genus 20 with species 200; root 1
    fn taxonomy() -> Taxonomy {
        let mut t = Taxonomy::new();
        t.insert(1, 1, "no rank", "root");
        t.insert(10, 1, "genus", "G1");
        t.insert(100, 10, "species", "G1 a");
        t.insert(101, 10, "species", "G1 b");
        t.insert(20, 1, "genus", "G2");
        t.insert(200, 20, "species", "G2 a");
        t
    }

    fn context() -> RunContext {
        let mut ctx = RunContext::new(vec![
            ReferenceContig::new("a", 100, 1000, 100),
            ReferenceContig::new("b", 101, 1000, 100),
            ReferenceContig::new("c", 200, 1000, 100),
        ]);
        ctx.valid_taxa = [100, 101, 200].into_iter().collect();
        ctx
    }

    fn read(targets: &[u32]) -> Read {
        let mut r = Read::default();
        for &t in targets {
            r.add_target(t, 0);
        }
        r
    }

    #[test]
    fn sibling_species_read_goes_to_genus() {
        let mut ctx = context();
        ctx.reads.insert("r".into(), read(&[0, 1]));
        assign_ambiguous_reads(&mut ctx, &taxonomy());
        assert_eq!(ctx.taxon_reads.get(&10), Some(&1));
        assert_eq!(ctx.taxon_reads.get(&1), Some(&1));
        assert_eq!(ctx.taxon_reads.get(&100), None);
        let refs: Vec<u32> = ctx.taxon_contributors[&10].iter().copied().collect();
        assert_eq!(refs, vec![0, 1]);
    }

    #[test]
    fn cross_genus_read_goes_to_root() {
        let mut ctx = context();
        ctx.reads.insert("r".into(), read(&[0, 2]));
        ctx.reads.insert("u".into(), read(&[2]));
        assign_ambiguous_reads(&mut ctx, &taxonomy());
        assert_eq!(ctx.taxon_reads.get(&1), Some(&1));
        assert_eq!(ctx.taxon_reads.get(&10), None);
        assert_eq!(ctx.taxon_reads.len(), 1);
    }

    #[test]
    fn disjoint_taxa_are_unresolved() {
        let mut ctx = context();
        let mut t = taxonomy();
        t.insert(300, 0, "species", "orphan");
        ctx.references.push(ReferenceContig::new("d", 300, 1000, 100));
        ctx.taxon_of.push(300);
        ctx.ref_lengths.push(1000);
        ctx.valid_taxa.insert(300);
        ctx.reads.insert("r".into(), read(&[0, 3]));
        assign_ambiguous_reads(&mut ctx, &t);
        assert_eq!(ctx.stats.unresolved_reads, 1);
        assert!(ctx.taxon_reads.is_empty());
    }

    #[test]
    fn references_on_valid_taxa_climb_with_their_abundance() {
        let mut ctx = context();
        for (i, (reads, ab)) in [(6, 60.0), (4, 40.0), (0, 0.0)].into_iter().enumerate() {
            ctx.references[i].is_valid = reads > 0;
            ctx.references[i].uniq_reads2 = reads;
            ctx.references[i].rel_abundance_uniq2 = ab;
        }
        propagate_references(&mut ctx, &taxonomy());
        assert_eq!(ctx.taxon_reads[&100], 6);
        assert_eq!(ctx.taxon_reads[&10], 10);
        assert_eq!(ctx.taxon_reads[&1], 10);
        assert!((ctx.taxon_abundance[&10] - 100.0).abs() < 1e-9);
        assert!(!ctx.taxon_reads.contains_key(&200));
        assert_eq!(ctx.taxon_contributors[&10].len(), 2);
    }

    #[test]
    fn failed_reference_of_valid_taxon_still_counts() {
        use crate::config::ProfileOptions;
        use crate::profile::aggregate::{consume_hit, count_first_pass};
        use crate::profile::filter::{count_second_pass, validate_references};
        use crate::sam::AlignmentHit;

        let hit = |name: String, ref_idx: u32, pos: u32| AlignmentHit {
            ref_idx,
            pos,
            query_name: name,
            query_len: 10,
            first_mate: false,
            last_mate: false,
        };
        // two references of species 100: ref 0 covers every bin, ref 1 one bin
        let mut ctx = RunContext::new(vec![
            ReferenceContig::new("a", 100, 1000, 100),
            ReferenceContig::new("b", 100, 1000, 100),
        ]);
        for i in 0..10 {
            consume_hit(&mut ctx, &hit(format!("a{i}"), 0, i * 100));
        }
        for i in 0..5 {
            consume_hit(&mut ctx, &hit(format!("b{i}"), 1, 0));
        }
        count_first_pass(&mut ctx);
        let options = ProfileOptions {
            coverage_quantile: 0.5,
            ..Default::default()
        };
        validate_references(&mut ctx, &options);
        count_second_pass(&mut ctx);
        assert!(!ctx.references[1].is_valid);
        assert_eq!(ctx.references[1].uniq_reads2, 5);

        propagate_references(&mut ctx, &taxonomy());
        let pass2_total: u32 = ctx.references.iter().map(|r| r.uniq_reads2).sum();
        assert_eq!(ctx.taxon_reads[&100], pass2_total);
        assert_eq!(ctx.taxon_reads[&10], 15);
        assert!((ctx.taxon_abundance[&100] - 100.0).abs() < 1e-9);
        assert_eq!(ctx.taxon_contributors[&100].len(), 2);
    }
}
