//src/profile/aggregate.rs

use super::abundance::normalize_abundance;
use super::{Pass, ReferenceContig, RunContext};
use crate::refmap::ReferenceMap;
use crate::sam::{AlignmentHit, SamReference};
use crate::taxdb::NO_TAXON;

/// Build the reference table for a run from the alignment header.
///
/// References whose taxon cannot be resolved get taxon 0 and are never
/// considered valid detections.
pub fn build_references(
    sam_refs: &[SamReference],
    ref_map: &ReferenceMap,
    bin_width: u32,
) -> Vec<ReferenceContig> {
    let mut unresolved = 0usize;
    let refs: Vec<ReferenceContig> = sam_refs
        .iter()
        .map(|r| {
            let tax_id = ref_map.resolve(&r.name).unwrap_or_else(|| {
                unresolved += 1;
                log::debug!("no taxon for reference {}", r.name);
                NO_TAXON
            });
            ReferenceContig::new(&r.name, tax_id, r.length, bin_width)
        })
        .collect();
    if unresolved > 0 {
        log::warn!("{unresolved} of {} references have no taxon ID", refs.len());
    }
    refs
}

/// Fold one alignment record into its read.
pub fn consume_hit(ctx: &mut RunContext, hit: &AlignmentHit) {
    let Some(reference) = ctx.references.get(hit.ref_idx as usize) else {
        ctx.stats.dropped_hits += 1;
        return;
    };
    let midpoint = hit.pos.saturating_add(hit.query_len / 2);
    let bin = reference.cov.bin_of(midpoint);

    let read = ctx.reads.entry(hit.read_name()).or_default();
    read.add_target(hit.ref_idx, bin);
    read.len = hit.query_len;
    ctx.stats.hits += 1;
}

/// First counting pass: raw and unique coverage, counts and abundances.
///
/// A read is unique here when all its targets belong to one taxon; its hits
/// then count for the raw and the unique pass on every target.
pub fn count_first_pass(ctx: &mut RunContext) {
    let mut concat_query_len = 0u64;

    for read in ctx.reads.values_mut() {
        concat_query_len += read.len as u64;
        let unique = read.is_taxon_unique(&ctx.taxon_of);
        if unique {
            ctx.stats.uniquely_matched += 1;
        }
        for target in &read.targets {
            let reference = &mut ctx.references[target.ref_idx as usize];
            read.sum_ref_lengths += reference.length as u64;
            for &bin in &target.bins {
                reference.record(Pass::Raw, bin);
                if unique {
                    reference.record(Pass::Unique, bin);
                    ctx.stats.unique_hits += 1;
                }
            }
        }
    }

    ctx.stats.matched_reads = ctx.reads.len() as u32;
    ctx.stats.avg_query_len = if ctx.reads.is_empty() {
        0
    } else {
        (concat_query_len / ctx.reads.len() as u64) as u32
    };
    for reference in ctx.references.iter().filter(|r| r.reads > 0) {
        ctx.stats.matched_refs += 1;
        ctx.stats.matched_refs_len += reference.length as u64;
    }

    normalize_abundance(&mut ctx.references, Pass::Raw);
    normalize_abundance(&mut ctx.references, Pass::Unique);

    log::info!(
        "{} hits from {} reads on {} references, {} reads taxon-unique",
        ctx.stats.hits,
        ctx.stats.matched_reads,
        ctx.stats.matched_refs,
        ctx.stats.uniquely_matched
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, ref_idx: u32, pos: u32) -> AlignmentHit {
        AlignmentHit {
            ref_idx,
            pos,
            query_name: name.to_string(),
            query_len: 100,
            first_mate: false,
            last_mate: false,
        }
    }

    fn context() -> RunContext {
        // refs 0 and 1 share taxon 10, ref 2 is taxon 20
        RunContext::new(vec![
            ReferenceContig::new("a", 10, 1000, 100),
            ReferenceContig::new("b", 10, 1000, 100),
            ReferenceContig::new("c", 20, 2000, 100),
        ])
    }

    #[test]
    fn hits_are_binned_by_midpoint() {
        let mut ctx = context();
        consume_hit(&mut ctx, &hit("r1", 0, 40));
        consume_hit(&mut ctx, &hit("r1", 0, 960));
        let read = &ctx.reads["r1"];
        assert_eq!(read.targets[0].bins, vec![0, 9]);
        assert_eq!(ctx.stats.hits, 2);
    }

    #[test]
    fn out_of_range_reference_is_dropped() {
        let mut ctx = context();
        consume_hit(&mut ctx, &hit("r1", 7, 0));
        assert!(ctx.reads.is_empty());
        assert_eq!(ctx.stats.dropped_hits, 1);
    }

    #[test]
    fn raw_counts_cover_every_hit() {
        let mut ctx = context();
        consume_hit(&mut ctx, &hit("u", 2, 0));
        consume_hit(&mut ctx, &hit("u", 2, 500));
        consume_hit(&mut ctx, &hit("same-taxon", 0, 0));
        consume_hit(&mut ctx, &hit("same-taxon", 1, 0));
        consume_hit(&mut ctx, &hit("multi", 0, 100));
        consume_hit(&mut ctx, &hit("multi", 2, 100));
        count_first_pass(&mut ctx);

        let raw: u64 = ctx.references.iter().map(|r| r.reads as u64).sum();
        assert_eq!(raw, ctx.stats.hits);
        assert_eq!(ctx.stats.uniquely_matched, 2);
        assert_eq!(ctx.stats.unique_hits, 4);
        assert_eq!(ctx.references[0].uniq_reads, 1);
        assert_eq!(ctx.references[1].uniq_reads, 1);
        assert_eq!(ctx.references[2].uniq_reads, 2);
        assert_eq!(ctx.references[2].reads, 3);
        assert_eq!(ctx.stats.matched_refs, 3);
        assert_eq!(ctx.stats.avg_query_len, 100);
        assert_eq!(ctx.reads["multi"].sum_ref_lengths, 3000);

        let total: f64 = ctx.references.iter().map(|r| r.rel_abundance).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unresolved_reference_gets_no_taxon() {
        let mut map = ReferenceMap::new();
        map.insert("known", 562);
        let refs = build_references(
            &[
                SamReference { name: "known".into(), length: 10 },
                SamReference { name: "other".into(), length: 10 },
            ],
            &map,
            5,
        );
        assert_eq!(refs[0].tax_id, 562);
        assert_eq!(refs[1].tax_id, NO_TAXON);
        assert_eq!(refs[0].cov.bin_count(), 2);
    }
}
