//src/config.rs

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SlimmError};

/// Taxonomic ranks a report can be produced at, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Species,
    Genus,
    Family,
    Order,
    Class,
    Phylum,
    Superkingdom,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Species,
        Rank::Genus,
        Rank::Family,
        Rank::Order,
        Rank::Class,
        Rank::Phylum,
        Rank::Superkingdom,
    ];

    /// The label used for this rank in taxonomy dumps.
    pub fn label(self) -> &'static str {
        match self {
            Rank::Species => "species",
            Rank::Genus => "genus",
            Rank::Family => "family",
            Rank::Order => "order",
            Rank::Class => "class",
            Rank::Phylum => "phylum",
            Rank::Superkingdom => "superkingdom",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rank {
    type Err = SlimmError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Rank::ALL
            .iter()
            .copied()
            .find(|r| r.label() == wanted)
            .ok_or_else(|| SlimmError::Config(format!("unknown rank '{s}'")))
    }
}

/// How wide each coverage bin is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinWidth {
    Fixed(u32),
    /// Chosen so that, on average, `min_reads` hits land in each bin.
    Auto { min_reads: u32 },
}

impl BinWidth {
    /// Resolve the width for a run once the reference lengths and hit count are known.
    pub fn resolve(self, total_ref_len: u64, mapped_hits: u64) -> u32 {
        match self {
            BinWidth::Fixed(w) => w.max(1),
            BinWidth::Auto { min_reads } => {
                if mapped_hits == 0 {
                    return total_ref_len.clamp(1, u32::MAX as u64) as u32;
                }
                let w = (total_ref_len * min_reads as u64).div_ceil(mapped_hits);
                w.clamp(1, u32::MAX as u64) as u32
            }
        }
    }
}

/// Predicates deciding whether a reference with reads is a real detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidityRule {
    /// Unique-pass-1 coverage percentage >= the unique coverage cutoff.
    UniqueCoverage,
    /// Raw coverage percentage >= the raw coverage cutoff.
    Coverage,
    /// Raw read count >= the configured `min_reads`.
    MinReads,
    /// Raw read count >= the read count quantile cutoff.
    ReadCountQuantile,
    /// Unique-pass-1 read count >= the unique read count quantile cutoff.
    UniqueReadCountQuantile,
}

impl ValidityRule {
    pub fn label(self) -> &'static str {
        match self {
            ValidityRule::UniqueCoverage => "unique-coverage",
            ValidityRule::Coverage => "coverage",
            ValidityRule::MinReads => "min-reads",
            ValidityRule::ReadCountQuantile => "read-quantile",
            ValidityRule::UniqueReadCountQuantile => "unique-read-quantile",
        }
    }
}

impl FromStr for ValidityRule {
    type Err = SlimmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "unique-coverage" => Ok(ValidityRule::UniqueCoverage),
            "coverage" => Ok(ValidityRule::Coverage),
            "min-reads" => Ok(ValidityRule::MinReads),
            "read-quantile" => Ok(ValidityRule::ReadCountQuantile),
            "unique-read-quantile" => Ok(ValidityRule::UniqueReadCountQuantile),
            other => Err(SlimmError::Config(format!("unknown validity rule '{other}'"))),
        }
    }
}

/// Everything the profiling core reads from the command line.
#[derive(Debug, Clone)]
pub struct ProfileOptions {
    /// Mass fraction used by every quantile cutoff.
    pub coverage_quantile: f64,
    pub bin_width: BinWidth,
    /// Used only by `ValidityRule::MinReads`.
    pub min_reads: u32,
    pub rank: Rank,
    pub validity_rules: Vec<ValidityRule>,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            coverage_quantile: 0.99,
            bin_width: BinWidth::Auto { min_reads: 100 },
            min_reads: 100,
            rank: Rank::Species,
            validity_rules: vec![ValidityRule::UniqueCoverage],
        }
    }
}

impl ProfileOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.coverage_quantile > 0.0 && self.coverage_quantile <= 1.0) {
            return Err(SlimmError::Config(format!(
                "coverage quantile must be in (0, 1], got {}",
                self.coverage_quantile
            )));
        }
        if self.bin_width == BinWidth::Fixed(0) {
            return Err(SlimmError::Config("bin width must be positive".into()));
        }
        if let BinWidth::Auto { min_reads: 0 } = self.bin_width {
            return Err(SlimmError::Config("reads per bin must be positive".into()));
        }
        if self.validity_rules.is_empty() {
            return Err(SlimmError::Config("at least one validity rule is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_round_trips_through_label() {
        for rank in Rank::ALL {
            assert_eq!(rank.label().parse::<Rank>().unwrap(), rank);
        }
        assert_eq!("Genus".parse::<Rank>().unwrap(), Rank::Genus);
        assert!("kingdom".parse::<Rank>().is_err());
    }

    #[test]
    fn auto_bin_width_targets_reads_per_bin() {
        let w = BinWidth::Auto { min_reads: 10 }.resolve(10_000, 100);
        assert_eq!(w, 1000);
        // rounds up
        let w = BinWidth::Auto { min_reads: 1 }.resolve(10, 3);
        assert_eq!(w, 4);
        assert_eq!(BinWidth::Fixed(250).resolve(10_000, 100), 250);
    }

    #[test]
    fn validate_rejects_bad_quantile() {
        let mut opts = ProfileOptions::default();
        assert!(opts.validate().is_ok());
        opts.coverage_quantile = 0.0;
        assert!(opts.validate().is_err());
        opts.coverage_quantile = 1.5;
        assert!(opts.validate().is_err());
        opts.coverage_quantile = 1.0;
        assert!(opts.validate().is_ok());
        opts.validity_rules.clear();
        assert!(opts.validate().is_err());
    }
}
