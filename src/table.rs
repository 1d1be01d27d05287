use std::fs::File;
use std::path::{Path, PathBuf};

use crate::audio::features::FeatureRecord;
use crate::error::TableError;

/// Exclusive CSV writer for one run's output table.
///
/// Opening truncates any previous table. Every row is flushed as soon as it
/// is written, so the file on disk always ends on a row boundary.
pub struct TableWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: Vec<String>,
    rows: usize,
}

impl TableWriter {
    pub fn create(path: &Path) -> Result<Self, TableError> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|source| TableError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            columns: Vec::new(),
            rows: 0,
        })
    }

    pub fn write_header(&mut self, fieldnames: &[&str]) -> Result<(), TableError> {
        self.writer
            .write_record(fieldnames)
            .map_err(|source| self.write_error(source))?;
        self.flush()?;
        self.columns = fieldnames.iter().map(|s| s.to_string()).collect();
        Ok(())
    }

    /// Write one row in declared column order. The first column is the
    /// record's filename; every other declared column must be present.
    pub fn write_record(&mut self, record: &FeatureRecord) -> Result<(), TableError> {
        if self.columns.is_empty() {
            return Err(TableError::HeaderNotWritten);
        }

        let mut row = Vec::with_capacity(self.columns.len());
        row.push(record.filename.clone());
        for column in &self.columns[1..] {
            let value = record
                .fields
                .get(column)
                .ok_or_else(|| TableError::SchemaMismatch {
                    filename: record.filename.clone(),
                    field: column.clone(),
                })?;
            // Display for f64 is the shortest string that parses back to the same value
            row.push(value.to_string());
        }

        self.writer
            .write_record(&row)
            .map_err(|source| self.write_error(source))?;
        self.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close, returning the number of data rows written.
    pub fn finish(mut self) -> Result<usize, TableError> {
        self.flush()?;
        Ok(self.rows)
    }

    fn flush(&mut self) -> Result<(), TableError> {
        self.writer
            .flush()
            .map_err(|e| self.write_error(e.into()))
    }

    fn write_error(&self, source: csv::Error) -> TableError {
        TableError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
pub(crate) fn read_table(path: &Path) -> (Vec<String>, Vec<FeatureRecord>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.unwrap();
        let fields = header[1..]
            .iter()
            .zip(row.iter().skip(1))
            .map(|(name, value)| (name.clone(), value.parse::<f64>().unwrap()))
            .collect();
        records.push(FeatureRecord {
            filename: row[0].to_string(),
            fields,
        });
    }
    (header, records)
}
