use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one [`CsvWriter::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub rejected: usize,
}

/// Writes fixture files into one directory. Files are headerless,
/// comma-delimited, and end without a trailing newline; writing to a
/// non-empty file appends after a newline.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    dir: PathBuf,
}

impl CsvWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> CsvWriter {
        CsvWriter {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Writes `rows` to `<dir>/<name>.csv`. Rows with an empty column are
    /// dropped and counted.
    pub fn write(&self, name: &str, rows: &[Vec<String>]) -> Result<WriteSummary> {
        let path = self.path(name);
        let (accepted, rejected): (Vec<&Vec<String>>, Vec<&Vec<String>>) =
            rows.iter().partition(|row| row.iter().all(|column| !column.is_empty()));
        if !rejected.is_empty() {
            warn!(file = name, rejected = rejected.len(), "rejecting rows with empty columns");
        }

        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for row in &accepted {
            encoder.write_record(row.iter())?;
        }
        let mut buffer = encoder
            .into_inner()
            .map_err(|e| Error::io(&path, e.into_error()))?;
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
        }

        let appending = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        if !buffer.is_empty() {
            if appending {
                file.write_all(b"\n").map_err(|e| Error::io(&path, e))?;
            }
            file.write_all(&buffer).map_err(|e| Error::io(&path, e))?;
        }

        if accepted.is_empty() {
            warn!(file = name, path = %path.display(), "no rows to write");
        } else {
            info!(file = name, rows = accepted.len(), path = %path.display(), "wrote rows");
        }
        Ok(WriteSummary {
            written: accepted.len(),
            rejected: rejected.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn write_works() {
        let dir = tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        let summary = writer
            .write("users", &rows(&[&["u1", "alice", "pw1"], &["u2", "bob", "pw2"]]))
            .unwrap();
        assert_eq!(summary, WriteSummary { written: 2, rejected: 0 });
        assert_eq!(
            fs::read_to_string(writer.path("users")).unwrap(),
            "u1,alice,pw1\nu2,bob,pw2"
        );
    }

    #[test]
    fn write_rejects_empty_columns_works() {
        let dir = tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        let summary = writer
            .write("users", &rows(&[&["u1", "", "pw1"], &["u2", "bob", "pw2"]]))
            .unwrap();
        assert_eq!(summary, WriteSummary { written: 1, rejected: 1 });
        assert_eq!(fs::read_to_string(writer.path("users")).unwrap(), "u2,bob,pw2");
    }

    #[test]
    fn write_appends_on_new_line_works() {
        let dir = tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        writer.write("terms", &rows(&[&["physics"]])).unwrap();
        writer.write("terms", &rows(&[])).unwrap();
        writer.write("terms", &rows(&[&["chemistry"], &["biology"]])).unwrap();
        assert_eq!(
            fs::read_to_string(writer.path("terms")).unwrap(),
            "physics\nchemistry\nbiology"
        );
    }

    #[test]
    fn write_creates_empty_file_works() {
        let dir = tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        assert_eq!(writer.write("nothing", &[]).unwrap(), WriteSummary::default());
        assert_eq!(fs::read_to_string(writer.path("nothing")).unwrap(), "");
    }

    #[test]
    fn write_to_missing_directory_works() {
        let dir = tempdir().unwrap();
        let writer = CsvWriter::new(dir.path().join("missing"));
        assert!(match writer.write("users", &rows(&[&["u1"]])) {
            Err(Error::Io { .. }) => true,
            _ => false,
        });
    }
}
