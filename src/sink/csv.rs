//! CSV row sink
//!
//! Header once at open, one line per row, fields escaped per RFC 4180.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{create_temp, publish, Cell, RecordSink, SinkError, SinkReport};

#[derive(Debug)]
pub struct CsvFileSink {
    header: Vec<String>,
    writer: BufWriter<File>,
    temp_path: PathBuf,
    target: PathBuf,
    rows: u64,
    write_failures: u64,
}

impl CsvFileSink {
    /// Open a temporary file in `dir` and write the header line
    pub fn create(dir: &Path, target: PathBuf, header: &[&str]) -> Result<Self, SinkError> {
        let (file, temp_path) = create_temp(dir, &target)?;
        let mut writer = BufWriter::new(file);
        let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        writeln!(writer, "{}", header.join(",")).map_err(|source| SinkError::Open {
            dir: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            header,
            writer,
            temp_path,
            target,
            rows: 0,
            write_failures: 0,
        })
    }

    /// Location of the not-yet-published content
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(row: &[Cell]) -> String {
        row.iter()
            .map(|cell| match cell {
                Cell::Text(text) => Self::escape_field(text),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl RecordSink for CsvFileSink {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        if row.len() != self.header.len() {
            return Err(SinkError::Arity {
                expected: self.header.len(),
                got: row.len(),
            });
        }
        match writeln!(self.writer, "{}", Self::format_row(row)) {
            Ok(()) => {
                self.rows += 1;
                Ok(())
            }
            Err(e) => {
                self.write_failures += 1;
                Err(SinkError::Write(e))
            }
        }
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }

    fn is_degraded(&self) -> bool {
        self.write_failures > 0
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn finalize(self: Box<Self>) -> Result<SinkReport, SinkError> {
        let Self {
            writer,
            temp_path,
            target,
            rows,
            write_failures,
            ..
        } = *self;
        let file = writer.into_inner().map_err(|e| SinkError::Finalize {
            target: target.clone(),
            source: e.into_error(),
        })?;
        publish(file, &temp_path, &target)?;
        tracing::debug!(path = %target.display(), rows, "published csv output");

        Ok(SinkReport {
            path: target,
            rows,
            write_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open(dir: &Path) -> CsvFileSink {
        CsvFileSink::create(dir, dir.join("gc_run.csv"), &["timestamp", "name", "value"]).unwrap()
    }

    #[test]
    fn test_csv_escape_field_simple() {
        assert_eq!(CsvFileSink::escape_field("hello"), "hello");
    }

    #[test]
    fn test_csv_escape_field_with_comma() {
        assert_eq!(CsvFileSink::escape_field("hello,world"), "\"hello,world\"");
    }

    #[test]
    fn test_csv_escape_field_with_quote() {
        assert_eq!(CsvFileSink::escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_format_row_mixed_cells() {
        let row = [
            Cell::from(12u64),
            Cell::from("java.util.HashMap$Node[]"),
            Cell::Empty,
        ];
        assert_eq!(CsvFileSink::format_row(&row), "12,java.util.HashMap$Node[],");

        let quoted = [Cell::from("a,b")];
        assert_eq!(CsvFileSink::format_row(&quoted), "\"a,b\"");
    }

    #[test]
    fn test_header_written_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let sink = open(dir.path());
        let temp = sink.temp_path().to_path_buf();
        drop(sink);
        let content = fs::read_to_string(temp).unwrap();
        assert_eq!(content, "timestamp,name,value\n");
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = open(dir.path());
        let err = sink.write_row(&[Cell::from(1u64)]).unwrap_err();
        assert!(matches!(err, SinkError::Arity { expected: 3, got: 1 }));
        assert_eq!(sink.rows_written(), 0);
        assert!(!sink.is_degraded());
    }

    #[test]
    fn test_finalize_publishes_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Box::new(open(dir.path()));
        sink.write_row(&[Cell::from(1u64), Cell::from("G1New"), Cell::from(2.5)])
            .unwrap();
        let temp = sink.temp_path().to_path_buf();

        let report = sink.finalize().unwrap();
        assert_eq!(report.rows, 1);
        assert!(!report.is_degraded());
        assert!(!temp.exists());
        assert_eq!(
            fs::read_to_string(&report.path).unwrap(),
            "timestamp,name,value\n1,G1New,2.500000\n"
        );
    }

    #[test]
    fn test_dropped_sink_leaves_only_temp() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = open(dir.path());
        sink.write_row(&[Cell::from(1u64), Cell::Empty, Cell::Empty])
            .unwrap();
        let temp = sink.temp_path().to_path_buf();
        let target = sink.target().to_path_buf();
        drop(sink);

        assert!(temp.exists());
        assert!(!target.exists());
    }
}
