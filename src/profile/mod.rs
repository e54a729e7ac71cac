//src/profile/mod.rs

pub mod abundance;
pub mod aggregate;
pub mod filter;
pub mod propagate;
pub mod report;

use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;

use crate::config::ValidityRule;
use crate::coverage::CoverageHistogram;
use crate::read::Read;

/// The three counting passes every reference is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Every hit of every read.
    Raw,
    /// Hits of reads unique to one taxon, before filtering.
    Unique,
    /// Hits of reads unique to one valid taxon, after filtering.
    Unique2,
}

/// One reference sequence and its per-pass measurements.
#[derive(Debug, Clone)]
pub struct ReferenceContig {
    pub name: String,
    pub tax_id: u32,
    pub length: u32,
    pub is_valid: bool,
    pub cov: CoverageHistogram,
    pub uniq_cov: CoverageHistogram,
    pub uniq_cov2: CoverageHistogram,
    pub reads: u32,
    pub uniq_reads: u32,
    pub uniq_reads2: u32,
    pub rel_abundance: f64,
    pub rel_abundance_uniq: f64,
    pub rel_abundance_uniq2: f64,
}

impl ReferenceContig {
    pub fn new(name: &str, tax_id: u32, length: u32, bin_width: u32) -> Self {
        Self {
            name: name.to_string(),
            tax_id,
            length,
            is_valid: false,
            cov: CoverageHistogram::new(length, bin_width),
            uniq_cov: CoverageHistogram::new(length, bin_width),
            uniq_cov2: CoverageHistogram::new(length, bin_width),
            reads: 0,
            uniq_reads: 0,
            uniq_reads2: 0,
            rel_abundance: 0.0,
            rel_abundance_uniq: 0.0,
            rel_abundance_uniq2: 0.0,
        }
    }

    pub fn count(&self, pass: Pass) -> u32 {
        match pass {
            Pass::Raw => self.reads,
            Pass::Unique => self.uniq_reads,
            Pass::Unique2 => self.uniq_reads2,
        }
    }

    /// Count one hit in `bin` for `pass`.
    pub fn record(&mut self, pass: Pass, bin: u32) {
        match pass {
            Pass::Raw => {
                self.reads += 1;
                self.cov.record(bin);
            }
            Pass::Unique => {
                self.uniq_reads += 1;
                self.uniq_cov.record(bin);
            }
            Pass::Unique2 => {
                self.uniq_reads2 += 1;
                self.uniq_cov2.record(bin);
            }
        }
    }

    pub fn abundance_mut(&mut self, pass: Pass) -> &mut f64 {
        match pass {
            Pass::Raw => &mut self.rel_abundance,
            Pass::Unique => &mut self.rel_abundance_uniq,
            Pass::Unique2 => &mut self.rel_abundance_uniq2,
        }
    }
}

/// Cutoffs derived from the pass-1 distributions, computed once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cutoffs {
    /// Over raw coverage percentage of references with unique reads.
    pub coverage: f64,
    /// Over unique coverage percentage of references with unique reads.
    pub unique_coverage: f64,
    /// Over raw read counts of references with reads.
    pub read_count: f64,
    /// Over unique read counts of references with unique reads.
    pub unique_read_count: f64,
}

/// Counters collected while a file is profiled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Mapped alignment records consumed.
    pub hits: u64,
    /// Distinct reads (mates counted separately).
    pub matched_reads: u32,
    /// Reads (not hits) whose targets share one taxon.
    pub uniquely_matched: u32,
    /// Reads (not hits) unique to one valid taxon after filtering.
    pub uniquely_matched2: u32,
    /// Hits of the reads counted in `uniquely_matched`.
    pub unique_hits: u64,
    /// Hits of the reads counted in `uniquely_matched2`.
    pub unique_hits2: u64,
    /// References with at least one read.
    pub matched_refs: u32,
    pub matched_refs_len: u64,
    pub avg_query_len: u32,
    /// Records pointing at a reference index outside the table.
    pub dropped_hits: u64,
    /// Failure count per validity rule.
    pub failed_by: Vec<(ValidityRule, u32)>,
    /// Ambiguous reads whose taxa share no ancestor.
    pub unresolved_reads: u32,
}

impl RunStats {
    /// Coverage expected if reads spread evenly over every matched reference.
    pub fn expected_coverage(&self) -> f64 {
        if self.matched_refs_len == 0 {
            return 0.0;
        }
        self.avg_query_len as f64 * self.matched_reads as f64 / self.matched_refs_len as f64
    }
}

/// All state for profiling one input file.
///
/// Created fresh per file; the taxonomy and options are borrowed by the
/// stage functions rather than stored here.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub references: Vec<ReferenceContig>,
    /// Reference index -> taxon ID.
    pub taxon_of: Vec<u32>,
    /// Reference index -> sequence length.
    pub ref_lengths: Vec<u32>,
    pub reads: AHashMap<String, Read>,
    pub cutoffs: Option<Cutoffs>,
    pub valid_taxa: AHashSet<u32>,
    pub taxon_reads: AHashMap<u32, u32>,
    pub taxon_abundance: AHashMap<u32, f64>,
    /// Taxon -> indices of the references contributing to it.
    pub taxon_contributors: AHashMap<u32, BTreeSet<u32>>,
    pub stats: RunStats,
}

impl RunContext {
    pub fn new(references: Vec<ReferenceContig>) -> Self {
        let taxon_of = references.iter().map(|r| r.tax_id).collect();
        let ref_lengths = references.iter().map(|r| r.length).collect();
        Self {
            references,
            taxon_of,
            ref_lengths,
            ..Default::default()
        }
    }
}
