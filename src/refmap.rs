//src/refmap.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, SlimmError};
use crate::io_util::open_text;

/// Maps reference sequence names to taxon IDs.
///
/// Lookup order for a reference name: the explicit table (full name, then
/// the first token before whitespace or `|`), then a `ti|<taxid>` token
/// embedded in the name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    by_name: AHashMap<String, u32>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, taxid: u32) {
        self.by_name.insert(name.to_string(), taxid);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Loads `<name>\t<taxid>` lines, or the NCBI accession2taxid layout
    /// `<accession>\t<accession.version>\t<taxid>\t<gi>` (keyed by the
    /// versioned accession). A header line starting with `accession` and
    /// lines starting with `#` are skipped.
    pub fn from_file<P: AsRef<Path>>(filepath: P) -> Result<Self> {
        let path = filepath.as_ref();
        let mut map = ReferenceMap::new();
        for (i, line_result) in open_text(path)?.lines().enumerate() {
            let line = line_result?;
            if line.is_empty() || line.starts_with('#') || line.starts_with("accession") {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let (name, taxid) = match fields.len() {
                0 | 1 => continue,
                2 => (fields[0], fields[1]),
                _ => (fields[1], fields[2]),
            };
            let taxid: u32 = taxid.parse().map_err(|_| {
                SlimmError::parse(path, i + 1, format!("invalid taxon id '{taxid}'"))
            })?;
            map.insert(name, taxid);
        }
        log::info!("loaded {} reference mappings from {}", map.len(), path.display());
        Ok(map)
    }

    /// Taxon ID of a reference, if it can be resolved.
    pub fn resolve(&self, ref_name: &str) -> Option<u32> {
        if let Some(&taxid) = self.by_name.get(ref_name) {
            return Some(taxid);
        }
        let first = ref_name
            .split(|c: char| c.is_whitespace() || c == '|')
            .next()
            .unwrap_or(ref_name);
        if let Some(&taxid) = self.by_name.get(first) {
            return Some(taxid);
        }
        embedded_taxid(ref_name)
    }
}

/// Taxon ID written into a reference name as `...|ti|<taxid>|...`.
pub fn embedded_taxid(ref_name: &str) -> Option<u32> {
    let mut chunks = ref_name.split('|');
    while let Some(chunk) = chunks.next() {
        if chunk == "ti" {
            return chunks.next().and_then(|id| id.trim().parse().ok());
        }
    }
    None
}
