//src/profile/filter.rs

use super::abundance::normalize_abundance;
use super::{Cutoffs, Pass, ReferenceContig, RunContext};
use crate::config::{ProfileOptions, ValidityRule};
use crate::quantile::cutoff_by_quantile;
use crate::taxdb::NO_TAXON;

fn quantile_or_zero(what: &str, values: &[f64], q: f64) -> f64 {
    cutoff_by_quantile(values, q).unwrap_or_else(|| {
        log::warn!("no references to derive the {what} cutoff from, using 0");
        0.0
    })
}

/// Derive every cutoff from the first-pass distributions.
pub fn compute_cutoffs(references: &[ReferenceContig], q: f64) -> Cutoffs {
    let with_unique: Vec<&ReferenceContig> = references.iter().filter(|r| r.uniq_reads > 0).collect();

    let covs: Vec<f64> = with_unique.iter().map(|r| r.cov.percent_covered()).collect();
    let uniq_covs: Vec<f64> = with_unique.iter().map(|r| r.uniq_cov.percent_covered()).collect();
    let uniq_counts: Vec<f64> = with_unique.iter().map(|r| r.uniq_reads as f64).collect();
    let counts: Vec<f64> = references
        .iter()
        .filter(|r| r.reads > 0)
        .map(|r| r.reads as f64)
        .collect();

    Cutoffs {
        coverage: quantile_or_zero("coverage", &covs, q),
        unique_coverage: quantile_or_zero("unique coverage", &uniq_covs, q),
        read_count: quantile_or_zero("read count", &counts, q),
        unique_read_count: quantile_or_zero("unique read count", &uniq_counts, q),
    }
}

impl ValidityRule {
    /// Whether `reference` passes this rule.
    pub fn passes(self, reference: &ReferenceContig, cutoffs: &Cutoffs, options: &ProfileOptions) -> bool {
        match self {
            ValidityRule::UniqueCoverage => reference.uniq_cov.percent_covered() >= cutoffs.unique_coverage,
            ValidityRule::Coverage => reference.cov.percent_covered() >= cutoffs.coverage,
            ValidityRule::MinReads => reference.reads >= options.min_reads,
            ValidityRule::ReadCountQuantile => reference.reads as f64 >= cutoffs.read_count,
            ValidityRule::UniqueReadCountQuantile => reference.uniq_reads as f64 >= cutoffs.unique_read_count,
        }
    }
}

/// Mark references passing every configured rule and collect their taxa.
pub fn validate_references(ctx: &mut RunContext, options: &ProfileOptions) {
    let cutoffs = *ctx
        .cutoffs
        .get_or_insert_with(|| compute_cutoffs(&ctx.references, options.coverage_quantile));
    log::info!(
        "cutoffs: coverage {:.6}, unique coverage {:.6}, reads {}, unique reads {}",
        cutoffs.coverage,
        cutoffs.unique_coverage,
        cutoffs.read_count,
        cutoffs.unique_read_count
    );

    let mut failed_by: Vec<(ValidityRule, u32)> =
        options.validity_rules.iter().map(|&rule| (rule, 0)).collect();

    for reference in ctx.references.iter_mut() {
        reference.is_valid = false;
        if reference.reads == 0 || reference.tax_id == NO_TAXON {
            continue;
        }
        let mut valid = true;
        for (rule, failures) in failed_by.iter_mut() {
            if !rule.passes(reference, &cutoffs, options) {
                *failures += 1;
                valid = false;
            }
        }
        if valid {
            reference.is_valid = true;
            ctx.valid_taxa.insert(reference.tax_id);
        }
    }

    for (rule, failures) in &failed_by {
        log::info!("{failures} references failed by {}", rule.label());
    }
    log::info!("{} valid taxa", ctx.valid_taxa.len());
    ctx.stats.failed_by = failed_by;
}

/// Second counting pass: drop targets on invalid taxa and recount the reads
/// that are now unique to one valid taxon.
pub fn count_second_pass(ctx: &mut RunContext) {
    for read in ctx.reads.values_mut() {
        read.retarget(&ctx.taxon_of, &ctx.ref_lengths, &ctx.valid_taxa);
        if read.targets.is_empty() || !read.is_unique_among(&ctx.taxon_of, &ctx.valid_taxa) {
            continue;
        }
        ctx.stats.uniquely_matched2 += 1;
        for target in &read.targets {
            let reference = &mut ctx.references[target.ref_idx as usize];
            for &bin in &target.bins {
                reference.record(Pass::Unique2, bin);
                ctx.stats.unique_hits2 += 1;
            }
        }
    }
    normalize_abundance(&mut ctx.references, Pass::Unique2);
    log::info!(
        "{} reads unique to a valid taxon after filtering",
        ctx.stats.uniquely_matched2
    );
}
