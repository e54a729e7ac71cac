//src/taxdb.rs

use ahash::{AHashMap, AHashSet};
use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, SlimmError};
use crate::io_util::open_text;

/// Taxon ID used for "no taxon": unresolved references and the unknown bucket.
pub const NO_TAXON: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonNode {
    pub parent: u32,
    pub rank: String,
    pub name: String,
}

/// Parent-pointer taxonomy, loaded once and shared read-only by every run.
///
/// Climbing stops at a node without a parent: taxon 0, a node whose parent is
/// itself or 0, and a taxon missing from the table all count as roots.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    nodes: AHashMap<u32, TaxonNode>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, taxid: u32, parent: u32, rank: &str, name: &str) {
        if taxid == NO_TAXON {
            return;
        }
        self.nodes.insert(
            taxid,
            TaxonNode {
                parent,
                rank: rank.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The one termination test for every climb in the crate.
    pub fn parent(&self, taxid: u32) -> Option<u32> {
        let node = self.nodes.get(&taxid)?;
        if node.parent == NO_TAXON || node.parent == taxid {
            None
        } else {
            Some(node.parent)
        }
    }

    pub fn rank(&self, taxid: u32) -> Option<&str> {
        self.nodes.get(&taxid).map(|n| n.rank.as_str())
    }

    pub fn name(&self, taxid: u32) -> Option<&str> {
        self.nodes.get(&taxid).map(|n| n.name.as_str())
    }

    /// Strict ancestors of `taxid`, nearest first.
    pub fn ancestors(&self, taxid: u32) -> Ancestors<'_> {
        Ancestors {
            taxonomy: self,
            current: taxid,
            steps: 0,
        }
    }

    /// `taxid` followed by its ancestors.
    pub fn lineage(&self, taxid: u32) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(taxid).chain(self.ancestors(taxid))
    }

    /// Lowest taxon that is an ancestor-or-self of every candidate in `acceptable`.
    ///
    /// Candidates outside `acceptable` are ignored. Returns `None` when no
    /// candidate survives, or when the survivors sit in disjoint trees.
    pub fn lca(&self, candidates: &AHashSet<u32>, acceptable: &AHashSet<u32>) -> Option<u32> {
        let mut seeds: Vec<u32> = candidates
            .iter()
            .copied()
            .filter(|t| acceptable.contains(t))
            .collect();
        seeds.sort_unstable();

        let (&first, rest) = seeds.split_first()?;
        // nearest-first lineage of the first seed; the LCA is the first entry
        // shared with every other seed's lineage
        let mut path: Vec<u32> = self.lineage(first).collect();
        for &taxid in rest {
            let other: AHashSet<u32> = self.lineage(taxid).collect();
            let keep = path.iter().position(|t| other.contains(t))?;
            path.drain(..keep);
        }
        path.first().copied()
    }

    /// Parses a taxDB file in the format:
    /// ```text
    /// <taxid>\t<parentid>\t<taxname>\t<rank>
    /// ```
    /// Lines with fewer than four fields are skipped.
    pub fn from_taxdb<P: AsRef<Path>>(filepath: P) -> Result<Self> {
        let path = filepath.as_ref();
        let reader = open_text(path)?;
        let mut taxonomy = Taxonomy::new();

        for (i, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 4 {
                continue;
            }
            let taxid = parse_id(path, i + 1, parts[0])?;
            let parent = parse_id(path, i + 1, parts[1])?;
            taxonomy.insert(taxid, parent, parts[3].trim(), parts[2].trim());
        }
        log::info!("loaded {} taxa from {}", taxonomy.len(), path.display());
        Ok(taxonomy)
    }

    /// Loads an NCBI `nodes.dmp` / `names.dmp` pair, keeping scientific names only.
    pub fn from_ncbi_dump<P: AsRef<Path>, Q: AsRef<Path>>(nodes_path: P, names_path: Q) -> Result<Self> {
        let nodes_path = nodes_path.as_ref();
        let names_path = names_path.as_ref();

        let mut names: AHashMap<u32, String> = AHashMap::new();
        for (i, line_result) in open_text(names_path)?.lines().enumerate() {
            let line = line_result?;
            let fields = split_dmp(&line);
            if fields.len() < 4 || fields[3] != "scientific name" {
                continue;
            }
            let taxid = parse_id(names_path, i + 1, fields[0])?;
            names.insert(taxid, fields[1].to_string());
        }

        let mut taxonomy = Taxonomy::new();
        for (i, line_result) in open_text(nodes_path)?.lines().enumerate() {
            let line = line_result?;
            let fields = split_dmp(&line);
            if fields.len() < 3 {
                continue;
            }
            let taxid = parse_id(nodes_path, i + 1, fields[0])?;
            let parent = parse_id(nodes_path, i + 1, fields[1])?;
            let name = names.get(&taxid).map(String::as_str).unwrap_or("");
            taxonomy.insert(taxid, parent, fields[2], name);
        }
        log::info!(
            "loaded {} taxa from {} and {}",
            taxonomy.len(),
            nodes_path.display(),
            names_path.display()
        );
        Ok(taxonomy)
    }
}

/// Iterator returned by [`Taxonomy::ancestors`].
pub struct Ancestors<'a> {
    taxonomy: &'a Taxonomy,
    current: u32,
    steps: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        // a cycle longer than the table cannot be a real lineage
        if self.steps > self.taxonomy.len() {
            return None;
        }
        let parent = self.taxonomy.parent(self.current)?;
        self.current = parent;
        self.steps += 1;
        Some(parent)
    }
}

fn split_dmp(line: &str) -> Vec<&str> {
    line.trim_end_matches("\t|")
        .split("\t|\t")
        .map(str::trim)
        .collect()
}

fn parse_id(path: &Path, line: usize, field: &str) -> Result<u32> {
    field
        .trim()
        .parse()
        .map_err(|_| SlimmError::parse(path, line, format!("invalid taxon id '{}'", field.trim())))
}
