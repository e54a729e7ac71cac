//src/bam.rs

use noodles::bam;
use noodles::bgzf;
use noodles::sam::alignment::record::cigar::op::Kind;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::sam::{AlignmentHit, SamReference};

/// Streaming reader over a BAM file.
///
/// Yields the same hits [`crate::sam::SamReader`] yields for the equivalent
/// SAM text: mapped records only, with the same skip counters.
pub struct BamReader {
    path: PathBuf,
    reader: bam::io::Reader<bgzf::Reader<File>>,
    record: bam::Record,
    references: Vec<SamReference>,
    pub skipped_unmapped: u64,
    pub skipped_malformed: u64,
}

impl BamReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = bam::io::Reader::new(File::open(path)?);
        let header = reader.read_header()?;
        let references = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| SamReference {
                name: String::from_utf8_lossy(name).into_owned(),
                length: u32::try_from(usize::from(map.length())).unwrap_or(u32::MAX),
            })
            .collect();

        Ok(BamReader {
            path: path.to_path_buf(),
            reader,
            record: bam::Record::default(),
            references,
            skipped_unmapped: 0,
            skipped_malformed: 0,
        })
    }

    pub fn references(&self) -> &[SamReference] {
        &self.references
    }

    fn current_hit(&mut self) -> Option<AlignmentHit> {
        let record = &self.record;
        let flags = record.flags();
        if flags.is_unmapped() {
            self.skipped_unmapped += 1;
            return None;
        }
        let ref_idx = match record.reference_sequence_id() {
            Some(Ok(id)) if id < self.references.len() => id as u32,
            Some(Err(_)) => {
                self.skipped_malformed += 1;
                return None;
            }
            _ => {
                self.skipped_unmapped += 1;
                return None;
            }
        };
        let Some(Ok(start)) = record.alignment_start() else {
            self.skipped_malformed += 1;
            return None;
        };
        let query_len = match record.sequence().len() {
            0 => match cigar_query_len(record) {
                Ok(len) => len,
                Err(e) => {
                    log::debug!("{}: bad CIGAR: {e}", self.path.display());
                    self.skipped_malformed += 1;
                    return None;
                }
            },
            len => len as u32,
        };
        let query_name = record
            .name()
            .map(|n| String::from_utf8_lossy(n.as_ref()).into_owned())
            .unwrap_or_default();

        Some(AlignmentHit {
            ref_idx,
            pos: u32::try_from(usize::from(start) - 1).unwrap_or(u32::MAX),
            query_name,
            query_len,
            first_mate: flags.is_first_segment(),
            last_mate: flags.is_last_segment(),
        })
    }
}

impl Iterator for BamReader {
    type Item = Result<AlignmentHit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            if let Some(hit) = self.current_hit() {
                return Some(Ok(hit));
            }
        }
    }
}

/// Query bases consumed by the record's CIGAR (M, I, S, =, X).
fn cigar_query_len(record: &bam::Record) -> std::io::Result<u32> {
    let mut total = 0usize;
    for op in record.cigar().iter() {
        let op = op?;
        if matches!(
            op.kind(),
            Kind::Match | Kind::Insertion | Kind::SoftClip | Kind::SequenceMatch | Kind::SequenceMismatch
        ) {
            total += op.len();
        }
    }
    Ok(u32::try_from(total).unwrap_or(u32::MAX))
}
