//src/profile/report.rs

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::RunContext;
use crate::config::{ProfileOptions, Rank};
use crate::taxdb::{Taxonomy, NO_TAXON};
use crate::types::{AbundanceRow, FeatureRow};

pub const FEATURE_HEADER: &str = "No.\tCandidateName\tTaxid\tNoOfReads\tRelAbundance\tRelAbundanceUniq\tRelAbundanceUniq2\tGenomeLength\tNoOfUniqueReads\tNoOfUniqueReads2\tNoOfBins\tnoOfNonZeroBins\tnoOfNonZeroBinsUniq\tnoOfNonZeroBinsUniq2\tCoverageDepth\tUniqCoverageDepth\tUniqCoverageDepth2\tMappingError\tCoveragePercentage\tUniqueCoveragePercentage\tUniqueCoveragePercentage2\n";

pub const ABUNDANCE_HEADER: &str =
    "No.\tName\tTaxid\tNoOfReads\tRelativeAbundance\tRelativeAbundance2\tCoverage\tContributers\n";

/// One row per reference with at least one read, in reference order.
pub fn feature_rows(ctx: &RunContext, taxonomy: &Taxonomy) -> Vec<FeatureRow> {
    ctx.references
        .iter()
        .filter(|r| r.reads > 0)
        .enumerate()
        .map(|(i, r)| FeatureRow {
            no: i + 1,
            candidate_name: taxonomy
                .name(r.tax_id)
                .filter(|n| !n.is_empty())
                .unwrap_or(&r.name)
                .to_string(),
            tax_id: r.tax_id,
            reads: r.reads,
            rel_abundance: r.rel_abundance,
            rel_abundance_uniq: r.rel_abundance_uniq,
            rel_abundance_uniq2: r.rel_abundance_uniq2,
            genome_length: r.length,
            uniq_reads: r.uniq_reads,
            uniq_reads2: r.uniq_reads2,
            bins: r.cov.bin_count(),
            non_zero_bins: r.cov.non_zero_bins(),
            non_zero_bins_uniq: r.uniq_cov.non_zero_bins(),
            non_zero_bins_uniq2: r.uniq_cov2.non_zero_bins(),
            coverage_depth: r.cov.mean_depth(),
            uniq_coverage_depth: r.uniq_cov.mean_depth(),
            uniq_coverage_depth2: r.uniq_cov2.mean_depth(),
            coverage_pct: r.cov.percent_covered(),
            uniq_coverage_pct: r.uniq_cov.percent_covered(),
            uniq_coverage_pct2: r.uniq_cov2.percent_covered(),
        })
        .collect()
}

struct Clade {
    tax_id: u32,
    reads: u32,
    coverage: f64,
    abundance: f64,
    contributors: usize,
}

/// Rank-level abundance rows, sorted by abundance, followed by the unknown bucket.
///
/// Clade abundance is `reads / (mean contributor length * matched reads)`,
/// normalized together with the unassigned reads so that all rows sum to
/// 100. Clades with no abundance, or whose coverage is below the global
/// coverage cutoff, are folded into the unknown bucket.
pub fn abundance_rows(ctx: &RunContext, taxonomy: &Taxonomy, options: &ProfileOptions) -> Vec<AbundanceRow> {
    let rank = options.rank.label();
    let matched = ctx.stats.matched_reads as f64;
    let avg_query_len = ctx.stats.avg_query_len as f64;
    let coverage_cutoff = ctx.cutoffs.map(|c| c.coverage).unwrap_or(0.0);

    let mut at_rank: Vec<(u32, u32)> = ctx
        .taxon_reads
        .iter()
        .filter(|&(&taxid, _)| taxonomy.rank(taxid) == Some(rank))
        .map(|(&taxid, &reads)| (taxid, reads))
        .collect();
    at_rank.sort_unstable();

    let reads_at_rank: u32 = at_rank.iter().map(|&(_, reads)| reads).sum();
    let mut unknown_reads = ctx.stats.matched_reads.saturating_sub(reads_at_rank);

    let mut clades = Vec::with_capacity(at_rank.len());
    let mut total_abundance = 0.0;
    let mut total_len = 0.0;
    for (tax_id, reads) in at_rank {
        let refs = ctx.taxon_contributors.get(&tax_id);
        let contributors = refs.map(|s| s.len()).unwrap_or(0);
        let clade_len = match refs {
            Some(refs) if !refs.is_empty() => {
                let sum: u64 = refs.iter().map(|&i| ctx.ref_lengths[i as usize] as u64).sum();
                sum as f64 / refs.len() as f64
            }
            _ => 0.0,
        };
        if clade_len == 0.0 || matched == 0.0 {
            unknown_reads += reads;
            continue;
        }
        let abundance = reads as f64 / (clade_len * matched);
        total_abundance += abundance;
        total_len += clade_len;
        clades.push(Clade {
            tax_id,
            reads,
            coverage: reads as f64 * avg_query_len / clade_len,
            abundance,
            contributors,
        });
    }

    let avg_len = if clades.is_empty() { 0.0 } else { total_len / clades.len() as f64 };
    let unknown_raw = if avg_len > 0.0 && matched > 0.0 {
        unknown_reads as f64 / (avg_len * matched)
    } else {
        0.0
    };
    total_abundance += unknown_raw;

    let mut rows = Vec::with_capacity(clades.len() + 1);
    let mut unknown_rel = 0.0;
    let mut failed = 0usize;
    for clade in clades {
        let rel = if total_abundance > 0.0 { clade.abundance / total_abundance } else { 0.0 };
        if rel == 0.0 || clade.coverage < coverage_cutoff {
            unknown_reads += clade.reads;
            unknown_rel += rel;
            failed += 1;
            continue;
        }
        rows.push(AbundanceRow {
            no: 0,
            name: taxonomy
                .name(clade.tax_id)
                .filter(|n| !n.is_empty())
                .unwrap_or("Organism name not found")
                .to_string(),
            tax_id: clade.tax_id,
            reads: clade.reads,
            rel_abundance: rel * 100.0,
            rel_abundance2: ctx.taxon_abundance.get(&clade.tax_id).copied().unwrap_or(0.0),
            coverage: clade.coverage,
            contributors: clade.contributors,
        });
    }
    if total_abundance > 0.0 {
        unknown_rel += unknown_raw / total_abundance;
    } else if unknown_reads > 0 {
        unknown_rel = 1.0;
    }
    log::info!("{failed} {rank} clades below the coverage cutoff ({coverage_cutoff:.6})");

    rows.sort_by(|a, b| {
        b.rel_abundance
            .total_cmp(&a.rel_abundance)
            .then(a.tax_id.cmp(&b.tax_id))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.no = i + 1;
    }
    rows.push(AbundanceRow {
        no: rows.len() + 1,
        name: format!("unknown_{rank}(multiple)"),
        tax_id: NO_TAXON,
        reads: unknown_reads,
        rel_abundance: unknown_rel * 100.0,
        rel_abundance2: 0.0,
        coverage: 0.0,
        contributors: 0,
    });
    rows
}

pub fn feature_table_text(rows: &[FeatureRow]) -> String {
    let mut output = String::from(FEATURE_HEADER);
    for r in rows {
        let _ = writeln!(
            output,
            "{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\tNA\t{:.6}\t{:.6}\t{:.6}",
            r.no,
            r.candidate_name,
            r.tax_id,
            r.reads,
            r.rel_abundance,
            r.rel_abundance_uniq,
            r.rel_abundance_uniq2,
            r.genome_length,
            r.uniq_reads,
            r.uniq_reads2,
            r.bins,
            r.non_zero_bins,
            r.non_zero_bins_uniq,
            r.non_zero_bins_uniq2,
            r.coverage_depth,
            r.uniq_coverage_depth,
            r.uniq_coverage_depth2,
            r.coverage_pct,
            r.uniq_coverage_pct,
            r.uniq_coverage_pct2,
        );
    }
    output
}

pub fn abundance_table_text(rows: &[AbundanceRow]) -> String {
    let mut output = String::from(ABUNDANCE_HEADER);
    for r in rows {
        let _ = writeln!(
            output,
            "{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{}",
            r.no, r.name, r.tax_id, r.reads, r.rel_abundance, r.rel_abundance2, r.coverage, r.contributors
        );
    }
    output
}

/// Input file name without a trailing `.sam`, `.sam.gz` or `.bam`.
fn input_stem(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in [".sam.gz", ".sam", ".bam"] {
        if let Some(stem) = name.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    name
}

/// Paths of the feature table and the rank report for `input`.
///
/// `prefix` is prepended verbatim, so a directory prefix needs its trailing
/// separator.
pub fn output_paths(input: &Path, prefix: &str, rank: Rank) -> (PathBuf, PathBuf) {
    let stem = input_stem(input);
    let suffix = match rank {
        Rank::Species => "_sp_reported".to_string(),
        other => format!("_{other}_reported"),
    };
    (
        PathBuf::from(format!("{prefix}{stem}.tsv")),
        PathBuf::from(format!("{prefix}{stem}{suffix}.tsv")),
    )
}
