//src/types.rs

/// One row of the per-reference feature table.
/// ```text
/// No.  CandidateName  Taxid  NoOfReads  RelAbundance  RelAbundanceUniq  RelAbundanceUniq2
/// GenomeLength  NoOfUniqueReads  NoOfUniqueReads2  NoOfBins  noOfNonZeroBins
/// noOfNonZeroBinsUniq  noOfNonZeroBinsUniq2  CoverageDepth  UniqCoverageDepth
/// UniqCoverageDepth2  MappingError  CoveragePercentage  UniqueCoveragePercentage
/// UniqueCoveragePercentage2
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub no: usize,
    pub candidate_name: String,
    pub tax_id: u32,
    pub reads: u32,
    pub rel_abundance: f64,
    pub rel_abundance_uniq: f64,
    pub rel_abundance_uniq2: f64,
    pub genome_length: u32,
    pub uniq_reads: u32,
    pub uniq_reads2: u32,
    pub bins: u32,
    pub non_zero_bins: u32,
    pub non_zero_bins_uniq: u32,
    pub non_zero_bins_uniq2: u32,
    pub coverage_depth: f64,
    pub uniq_coverage_depth: f64,
    pub uniq_coverage_depth2: f64,
    pub coverage_pct: f64,
    pub uniq_coverage_pct: f64,
    pub uniq_coverage_pct2: f64,
}

/// One row of the rank-level abundance report.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceRow {
    pub no: usize,
    pub name: String,
    pub tax_id: u32,
    pub reads: u32,
    /// Coverage-derived clade abundance, in percent.
    pub rel_abundance: f64,
    /// Sum of the normalized unique-pass-2 abundance of the clade's references.
    pub rel_abundance2: f64,
    pub coverage: f64,
    pub contributors: usize,
}
