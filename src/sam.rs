//src/sam.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::bam::BamReader;
use crate::error::{Result, SlimmError};
use crate::io_util::open_text;

const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_FIRST_MATE: u16 = 0x40;
const FLAG_LAST_MATE: u16 = 0x80;

/// One `@SQ` header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamReference {
    pub name: String,
    pub length: u32,
}

/// A mapped alignment record, reduced to what the profiler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentHit {
    pub ref_idx: u32,
    /// 0-based leftmost position.
    pub pos: u32,
    pub query_name: String,
    pub query_len: u32,
    pub first_mate: bool,
    pub last_mate: bool,
}

impl AlignmentHit {
    /// Query name with `.1` / `.2` appended for the first / last mate.
    pub fn read_name(&self) -> String {
        if self.first_mate {
            format!("{}.1", self.query_name)
        } else if self.last_mate {
            format!("{}.2", self.query_name)
        } else {
            self.query_name.clone()
        }
    }
}

/// Streaming reader over a SAM text file (plain or gzipped).
///
/// The header is consumed on open; iterating yields mapped records only.
/// Unmapped records, records on `*` or on references missing from the header,
/// and lines that do not parse are skipped and counted.
pub struct SamReader {
    path: PathBuf,
    lines: std::io::Lines<Box<dyn BufRead>>,
    line_no: usize,
    pending: Option<String>,
    references: Vec<SamReference>,
    ref_index: AHashMap<String, u32>,
    pub skipped_unmapped: u64,
    pub skipped_malformed: u64,
}

impl SamReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = SamReader {
            path: path.to_path_buf(),
            lines: open_text(path)?.lines(),
            line_no: 0,
            pending: None,
            references: Vec::new(),
            ref_index: AHashMap::new(),
            skipped_unmapped: 0,
            skipped_malformed: 0,
        };
        reader.read_header()?;
        Ok(reader)
    }

    pub fn references(&self) -> &[SamReference] {
        &self.references
    }

    fn read_header(&mut self) -> Result<()> {
        while let Some(line) = self.lines.next() {
            let line = line?;
            self.line_no += 1;
            if !line.starts_with('@') {
                self.pending = Some(line);
                break;
            }
            if !line.starts_with("@SQ") {
                continue;
            }
            let mut name = None;
            let mut length = None;
            for field in line.split('\t').skip(1) {
                if let Some(v) = field.strip_prefix("SN:") {
                    name = Some(v.to_string());
                } else if let Some(v) = field.strip_prefix("LN:") {
                    length = v.parse::<u32>().ok();
                }
            }
            match (name, length) {
                (Some(name), Some(length)) => {
                    self.ref_index.insert(name.clone(), self.references.len() as u32);
                    self.references.push(SamReference { name, length });
                }
                _ => {
                    return Err(SlimmError::parse(
                        &self.path,
                        self.line_no,
                        "@SQ line without SN/LN",
                    ))
                }
            }
        }
        Ok(())
    }

    fn parse_record(&mut self, line: &str) -> Option<AlignmentHit> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            self.skipped_malformed += 1;
            log::debug!("{}:{}: fewer than 11 fields", self.path.display(), self.line_no);
            return None;
        }
        let Ok(flag) = fields[1].parse::<u16>() else {
            self.skipped_malformed += 1;
            return None;
        };
        if flag & FLAG_UNMAPPED != 0 || fields[2] == "*" {
            self.skipped_unmapped += 1;
            return None;
        }
        let Some(&ref_idx) = self.ref_index.get(fields[2]) else {
            self.skipped_unmapped += 1;
            return None;
        };
        let Ok(pos) = fields[3].parse::<u32>() else {
            self.skipped_malformed += 1;
            return None;
        };
        let query_len = if fields[9] != "*" {
            fields[9].len() as u32
        } else {
            cigar_query_len(fields[5])
        };
        Some(AlignmentHit {
            ref_idx,
            pos: pos.saturating_sub(1),
            query_name: fields[0].to_string(),
            query_len,
            first_mate: flag & FLAG_FIRST_MATE != 0,
            last_mate: flag & FLAG_LAST_MATE != 0,
        })
    }
}

impl Iterator for SamReader {
    type Item = Result<AlignmentHit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.pending.take() {
                Some(line) => line,
                None => match self.lines.next()? {
                    Ok(line) => {
                        self.line_no += 1;
                        line
                    }
                    Err(e) => return Some(Err(e.into())),
                },
            };
            if line.is_empty() || line.starts_with('@') {
                continue;
            }
            if let Some(hit) = self.parse_record(&line) {
                return Some(Ok(hit));
            }
        }
    }
}

/// SAM or BAM input, chosen by file name.
pub enum AlignmentReader {
    Sam(SamReader),
    Bam(BamReader),
}

impl AlignmentReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if is_bam(path) {
            Ok(AlignmentReader::Bam(BamReader::open(path)?))
        } else {
            Ok(AlignmentReader::Sam(SamReader::open(path)?))
        }
    }

    pub fn references(&self) -> &[SamReference] {
        match self {
            AlignmentReader::Sam(r) => r.references(),
            AlignmentReader::Bam(r) => r.references(),
        }
    }

    pub fn skipped_unmapped(&self) -> u64 {
        match self {
            AlignmentReader::Sam(r) => r.skipped_unmapped,
            AlignmentReader::Bam(r) => r.skipped_unmapped,
        }
    }

    pub fn skipped_malformed(&self) -> u64 {
        match self {
            AlignmentReader::Sam(r) => r.skipped_malformed,
            AlignmentReader::Bam(r) => r.skipped_malformed,
        }
    }
}

impl Iterator for AlignmentReader {
    type Item = Result<AlignmentHit>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            AlignmentReader::Sam(r) => r.next(),
            AlignmentReader::Bam(r) => r.next(),
        }
    }
}

/// Query bases consumed by a CIGAR string (M, I, S, =, X). 0 for `*`.
fn cigar_query_len(cigar: &str) -> u32 {
    let mut total = 0u32;
    let mut n = 0u32;
    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            n = n.saturating_mul(10).saturating_add(d);
            continue;
        }
        if matches!(c, 'M' | 'I' | 'S' | '=' | 'X') {
            total = total.saturating_add(n);
        }
        n = 0;
    }
    total
}

pub fn is_bam(path: &Path) -> bool {
    path.extension().map(|e| e == "bam").unwrap_or(false)
}

/// Alignment files accepted for batch input: `.sam`, `.sam.gz` and `.bam`.
pub fn is_alignment_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    !name.starts_with('.')
        && (name.ends_with(".sam") || name.ends_with(".sam.gz") || name.ends_with(".bam"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAM: &str = "@HD\tVN:1.6\n\
@SQ\tSN:refA\tLN:1000\n\
@SQ\tSN:refB\tLN:500\n\
r1\t0\trefA\t11\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\n\
r3\t65\trefB\t1\t60\t2S3M\t*\t0\t0\t*\t*\n\
r4\t0\trefZ\t5\t60\t4M\t*\t0\t0\tACGT\tIIII\n\
bad line\n\
r5\t128\trefA\t900\t60\t4M\t*\t0\t0\tACGT\tIIII\n";

    fn write_sam(dir: &Path) -> PathBuf {
        let path = dir.join("sample.sam");
        std::fs::write(&path, SAM).unwrap();
        path
    }

    #[test]
    fn header_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = SamReader::open(write_sam(dir.path())).unwrap();
        assert_eq!(
            reader.references(),
            &[
                SamReference { name: "refA".into(), length: 1000 },
                SamReference { name: "refB".into(), length: 500 },
            ]
        );
        let hits: Vec<AlignmentHit> = reader.by_ref().map(|h| h.unwrap()).collect();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].pos, 10);
        assert_eq!(hits[0].read_name(), "r1");
        assert_eq!(hits[1].ref_idx, 1);
        assert_eq!(hits[1].query_len, 5);
        assert_eq!(hits[1].read_name(), "r3.1");
        assert_eq!(hits[2].read_name(), "r5.2");
        assert_eq!(reader.skipped_unmapped, 2);
        assert_eq!(reader.skipped_malformed, 1);
    }

    #[test]
    fn reader_is_chosen_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let reader = AlignmentReader::open(write_sam(dir.path())).unwrap();
        assert!(matches!(reader, AlignmentReader::Sam(_)));
        assert_eq!(reader.references().len(), 2);

        let bam = dir.path().join("x.bam");
        std::fs::write(&bam, SAM).unwrap();
        assert!(AlignmentReader::open(&bam).is_err());
    }

    #[test]
    fn alignment_file_names() {
        assert!(is_alignment_file(Path::new("/d/a.sam")));
        assert!(is_alignment_file(Path::new("/d/a.SAM.gz")));
        assert!(is_alignment_file(Path::new("a.bam")));
        assert!(!is_alignment_file(Path::new("/d/.hidden.sam")));
        assert!(!is_alignment_file(Path::new("a.tsv")));
    }

    #[test]
    fn cigar_lengths() {
        assert_eq!(cigar_query_len("10M2I3D5S"), 17);
        assert_eq!(cigar_query_len("*"), 0);
    }
}
