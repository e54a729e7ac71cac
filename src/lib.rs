// src/lib.rs
pub mod bam;
pub mod config;
pub mod coverage;
pub mod error;
pub mod io_util;
pub mod profile;
pub mod quantile;
pub mod read;
pub mod refmap;
pub mod sam;
pub mod taxdb;
pub mod types;

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{BinWidth, ProfileOptions, Rank};
use crate::error::Result;
use crate::profile::aggregate::{build_references, consume_hit, count_first_pass};
use crate::profile::filter::{count_second_pass, validate_references};
use crate::profile::propagate::{assign_ambiguous_reads, propagate_references};
use crate::profile::report::{
    abundance_rows, abundance_table_text, feature_rows, feature_table_text, output_paths,
};
use crate::profile::{Cutoffs, RunContext, RunStats};
use crate::refmap::ReferenceMap;
use crate::sam::{AlignmentHit, AlignmentReader, SamReference};
use crate::taxdb::Taxonomy;
use crate::types::{AbundanceRow, FeatureRow};

/// Outcome of profiling one alignment file.
/// Only structured rows are kept; the tables are rendered on demand.
#[derive(Debug, Clone)]
pub struct ProfileResults {
    /// One row per reference with at least one read.
    pub feature_rows: Vec<FeatureRow>,

    /// Rank-level rows, the unknown bucket last.
    pub abundance_rows: Vec<AbundanceRow>,

    pub rank: Rank,
    pub bin_width: u32,
    pub cutoffs: Cutoffs,
    pub stats: RunStats,
}

impl ProfileResults {
    /// Generate the per-reference feature table on demand
    pub fn feature_table_text(&self) -> String {
        feature_table_text(&self.feature_rows)
    }

    /// Generate the rank abundance table on demand
    pub fn abundance_table_text(&self) -> String {
        abundance_table_text(&self.abundance_rows)
    }

    pub fn write_reports(&self, features_path: &Path, abundance_path: &Path) -> Result<()> {
        fs::write(features_path, self.feature_table_text())?;
        fs::write(abundance_path, self.abundance_table_text())?;
        Ok(())
    }
}

/// Run every profiling stage over an already decoded stream of hits.
///
/// `sam_refs` is the reference table the hits' indices point into.
pub fn profile_hits<I>(
    sam_refs: &[SamReference],
    hits: I,
    taxonomy: &Taxonomy,
    ref_map: &ReferenceMap,
    bin_width: u32,
    options: &ProfileOptions,
) -> ProfileResults
where
    I: IntoIterator<Item = AlignmentHit>,
{
    let mut ctx = RunContext::new(build_references(sam_refs, ref_map, bin_width));
    for hit in hits {
        consume_hit(&mut ctx, &hit);
    }
    finish_run(ctx, taxonomy, bin_width, options)
}

/// Stages after every record has been folded into `ctx`.
fn finish_run(mut ctx: RunContext, taxonomy: &Taxonomy, bin_width: u32, options: &ProfileOptions) -> ProfileResults {
    // 1. Raw and unique counts
    count_first_pass(&mut ctx);

    // 2. Cutoffs, valid references, second unique pass
    validate_references(&mut ctx, options);
    count_second_pass(&mut ctx);

    // 3. Push counts up the taxonomy
    assign_ambiguous_reads(&mut ctx, taxonomy);
    propagate_references(&mut ctx, taxonomy);

    log::info!("expected coverage {:.6}", ctx.stats.expected_coverage());

    ProfileResults {
        feature_rows: feature_rows(&ctx, taxonomy),
        abundance_rows: abundance_rows(&ctx, taxonomy, options),
        rank: options.rank,
        bin_width,
        cutoffs: ctx.cutoffs.unwrap_or_default(),
        stats: ctx.stats,
    }
}

/// Profile a SAM (plain or gzipped) or BAM file.
///
/// Records are folded into reads as they are read. With an automatic bin
/// width the file is read twice: once to count mapped hits, once to
/// profile them.
pub fn profile_file<P: AsRef<Path>>(
    path: P,
    taxonomy: &Taxonomy,
    ref_map: &ReferenceMap,
    options: &ProfileOptions,
) -> Result<ProfileResults> {
    let path = path.as_ref();
    options.validate()?;

    let bin_width = match options.bin_width {
        BinWidth::Fixed(w) => w,
        auto => {
            let mut reader = AlignmentReader::open(path)?;
            let mut mapped = 0u64;
            for hit in reader.by_ref() {
                hit?;
                mapped += 1;
            }
            let total_len: u64 = reader.references().iter().map(|r| r.length as u64).sum();
            auto.resolve(total_len, mapped)
        }
    };
    log::info!("{}: bin width {bin_width}", path.display());

    let mut reader = AlignmentReader::open(path)?;
    let mut ctx = RunContext::new(build_references(reader.references(), ref_map, bin_width));
    for hit in reader.by_ref() {
        consume_hit(&mut ctx, &hit?);
    }
    if reader.skipped_malformed() > 0 {
        log::warn!(
            "{}: skipped {} malformed records",
            path.display(),
            reader.skipped_malformed()
        );
    }
    log::debug!(
        "{}: skipped {} unmapped records",
        path.display(),
        reader.skipped_unmapped()
    );

    Ok(finish_run(ctx, taxonomy, bin_width, options))
}

/// Profile one file and write both tables next to `output_prefix`.
/// Returns the paths written.
pub fn profile_and_write<P: AsRef<Path>>(
    path: P,
    output_prefix: &str,
    taxonomy: &Taxonomy,
    ref_map: &ReferenceMap,
    options: &ProfileOptions,
) -> Result<(PathBuf, PathBuf)> {
    let path = path.as_ref();
    let results = profile_file(path, taxonomy, ref_map, options)?;
    let (features_path, abundance_path) = output_paths(path, output_prefix, options.rank);
    results.write_reports(&features_path, &abundance_path)?;
    Ok((features_path, abundance_path))
}

/// Profile many files in parallel. Each file succeeds or fails on its own.
pub fn profile_batch(
    paths: &[PathBuf],
    output_prefix: &str,
    taxonomy: &Taxonomy,
    ref_map: &ReferenceMap,
    options: &ProfileOptions,
) -> Vec<(PathBuf, Result<(PathBuf, PathBuf)>)> {
    paths
        .par_iter()
        .map(|path| {
            let outcome = profile_and_write(path, output_prefix, taxonomy, ref_map, options);
            if let Err(e) = &outcome {
                log::error!("{}: {e}", path.display());
            }
            (path.clone(), outcome)
        })
        .collect()
}

/// Alignment files directly inside `dir`, sorted by name.
pub fn alignment_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.is_file() && sam::is_alignment_file(&path)).then_some(path)
        })
        .collect();
    files.sort();
    Ok(files)
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

    #[test]
    fn test_profile_hits_api() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert(1, 1, "no rank", "root");
        taxonomy.insert(10, 1, "genus", "Genus");
        taxonomy.insert(100, 10, "species", "Genus alpha");
        taxonomy.insert(101, 10, "species", "Genus beta");

        let mut ref_map = ReferenceMap::new();
        ref_map.insert("alpha", 100);
        ref_map.insert("beta", 101);
        let sam_refs = vec![
            SamReference { name: "alpha".into(), length: 1000 },
            SamReference { name: "beta".into(), length: 1000 },
        ];

        let mut hits = Vec::new();
        for i in 0..10 {
            hits.push(hit(&format!("a{i}"), 0, i * 100));
            hits.push(hit(&format!("b{i}"), 1, i * 100));
        }
        hits.push(hit("both", 0, 0));
        hits.push(hit("both", 1, 0));

        let options = ProfileOptions::default();
        let results = profile_hits(&sam_refs, hits, &taxonomy, &ref_map, 100, &options);

        assert_eq!(results.feature_rows.len(), 2);
        assert_eq!(results.feature_rows[0].candidate_name, "Genus alpha");
        assert_eq!(results.stats.matched_reads, 21);
        assert_eq!(results.stats.hits, 22);

        // each species holds 10 reads, the shared read is pushed to the genus
        let species: Vec<&AbundanceRow> =
            results.abundance_rows.iter().filter(|r| r.tax_id != 0).collect();
        assert_eq!(species.len(), 2);
        assert!(species.iter().all(|r| r.reads == 10));
        let unknown = results.abundance_rows.last().unwrap();
        assert_eq!(unknown.reads, 1);
        let total: f64 = results.abundance_rows.iter().map(|r| r.rel_abundance).sum();
        assert!((total - 100.0).abs() < 1e-6);

        let text = results.abundance_table_text();
        assert!(text.starts_with("No.\tName\tTaxid"));
    }
}
