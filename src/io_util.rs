//src/io_util.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Open a text file, transparently decompressing it when the name ends in `.gz`.
pub fn open_text(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn reads_plain_and_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.txt");
        std::fs::write(&plain, "x\ny\n").unwrap();

        let gz = dir.path().join("a.txt.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b"x\ny\n").unwrap();
        enc.finish().unwrap();

        for p in [plain, gz] {
            let lines: Vec<String> = open_text(&p).unwrap().lines().map(|l| l.unwrap()).collect();
            assert_eq!(lines, vec!["x", "y"]);
        }
    }
}
