use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Identity columns produced by the listing harvest, in canonical order.
pub const BASE_COLUMNS: [&str; 5] = [
    "company_name",
    "area",
    "battery_storage",
    "detail_url",
    "source_page",
];

/// Columns added by detail enrichment, appended after the base set.
pub const ENRICH_COLUMNS: [&str; 7] = [
    "website_url_primary",
    "website_domain_primary",
    "phone",
    "address",
    "website_count",
    "website_urls_all",
    "website_domains_all",
];

/// Store failures are fatal: the run must stop rather than risk the
/// checkpoint file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Flat tabular dataset backed by one CSV file.
///
/// Every row carries the full column set; a field a row never saw reads as
/// "". Rows are addressed by position, and by `detail_url` via [`find_by`].
///
/// [`find_by`]: RecordStore::find_by
pub struct RecordStore {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(path: P, columns: &[&str]) -> Self {
        Self {
            path: path.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|source| StoreError::Read { path: path.clone(), source })?;

        let columns: Vec<String> = rdr
            .headers()
            .map_err(|source| StoreError::Read { path: path.clone(), source })?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record =
                record.map_err(|source| StoreError::Read { path: path.clone(), source })?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { path, columns, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, row: usize, column: &str) -> &str {
        match self.column_index(column) {
            Some(c) => self.rows[row][c].as_str(),
            None => "",
        }
    }

    /// Set a field, introducing the column (backfilled with "") if new.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let c = self.ensure_column(column);
        self.rows[row][c] = value.into();
    }

    /// Append any missing columns in the given order.
    pub fn ensure_columns(&mut self, columns: &[&str]) {
        for column in columns {
            self.ensure_column(column);
        }
    }

    fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(c) = self.column_index(column) {
            return c;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Append a row from (column, value) pairs; unnamed fields stay "".
    pub fn push(&mut self, fields: &[(&str, String)]) -> usize {
        self.rows.push(vec![String::new(); self.columns.len()]);
        let row = self.rows.len() - 1;
        for (column, value) in fields {
            self.set(row, column, value.clone());
        }
        row
    }

    /// First row whose `column` equals `value` exactly.
    pub fn find_by(&self, column: &str, value: &str) -> Option<usize> {
        let c = self.column_index(column)?;
        self.rows.iter().position(|row| row[c] == value)
    }

    /// Indices of rows with an empty `column`, in store order.
    pub fn indices_missing(&self, column: &str) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.get(i, column).is_empty())
            .collect()
    }

    /// Stable sort by a numeric column; unparsable values sort first as 0.
    pub fn sort_by_numeric(&mut self, column: &str) {
        let Some(c) = self.column_index(column) else { return };
        self.rows
            .sort_by_key(|row| row[c].trim().parse::<i64>().unwrap_or(0));
    }

    /// Rewrite the backing file, going through a temp file in the same
    /// directory and renaming over the target so a crash mid-write can
    /// never leave a torn checkpoint.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_as(&self.path)
    }

    pub fn save_as(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let csv_err = |source: csv::Error| {
            write_err(std::io::Error::new(std::io::ErrorKind::Other, source))
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        {
            let mut w = csv::Writer::from_writer(tmp.as_file());
            w.write_record(&self.columns).map_err(csv_err)?;
            for row in &self.rows {
                w.write_record(row).map_err(csv_err)?;
            }
            w.flush().map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(dir: &Path) -> RecordStore {
        let mut store = RecordStore::new(dir.join("t.csv"), &BASE_COLUMNS);
        store.push(&[
            ("company_name", "Sunny Co".into()),
            ("area", "California".into()),
            ("detail_url", "https://dir.example/sunny".into()),
            ("source_page", "1".into()),
        ]);
        store.push(&[
            ("company_name", "Solar Two".into()),
            ("area", "Texas".into()),
            ("detail_url", "https://dir.example/two".into()),
            ("source_page", "2".into()),
        ]);
        store
    }

    #[test]
    fn round_trip_preserves_columns_and_values() {
        let dir = tempdir().unwrap();
        let mut store = sample(dir.path());
        store.set(0, "website_url_primary", "https://sunny.example");
        store.save().unwrap();

        let loaded = RecordStore::load(dir.path().join("t.csv")).unwrap();
        assert_eq!(loaded.columns(), store.columns());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0, "company_name"), "Sunny Co");
        assert_eq!(loaded.get(0, "website_url_primary"), "https://sunny.example");
        // Column was introduced store-wide; row 1 reads empty, not absent.
        assert_eq!(loaded.get(1, "website_url_primary"), "");
    }

    #[test]
    fn new_column_appends_after_existing() {
        let dir = tempdir().unwrap();
        let mut store = sample(dir.path());
        store.set(1, "phone", "555-1234");
        assert_eq!(store.columns().last().map(String::as_str), Some("phone"));
        assert_eq!(store.get(0, "phone"), "");
        assert_eq!(store.get(1, "phone"), "555-1234");
    }

    #[test]
    fn find_by_detail_url() {
        let dir = tempdir().unwrap();
        let store = sample(dir.path());
        assert_eq!(store.find_by("detail_url", "https://dir.example/two"), Some(1));
        assert_eq!(store.find_by("detail_url", "https://dir.example/nope"), None);
    }

    #[test]
    fn indices_missing_selects_empty_fields() {
        let dir = tempdir().unwrap();
        let mut store = sample(dir.path());
        store.ensure_columns(&ENRICH_COLUMNS);
        store.set(0, "website_url_primary", "https://sunny.example");
        assert_eq!(store.indices_missing("website_url_primary"), vec![1]);
    }

    #[test]
    fn sort_by_numeric_is_stable_with_fallback() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::new(dir.path().join("s.csv"), &BASE_COLUMNS);
        store.push(&[("company_name", "c".into()), ("source_page", "3".into())]);
        store.push(&[("company_name", "a".into()), ("source_page", "bogus".into())]);
        store.push(&[("company_name", "b".into()), ("source_page", "1".into())]);
        store.sort_by_numeric("source_page");
        let names: Vec<&str> = (0..3).map(|i| store.get(i, "company_name")).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn short_rows_load_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();
        let store = RecordStore::load(&path).unwrap();
        assert_eq!(store.get(0, "c"), "");
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(RecordStore::load(dir.path().join("absent.csv")).is_err());
    }
}
