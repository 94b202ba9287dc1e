// 📥 CSV Record Source - one `<table>.csv` export per legacy table

use crate::config::{LegacyTable, MigrationConfig};
use crate::error::ConfigError;
use anyhow::{bail, Context as AnyhowContext, Result};
use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvRecordSource {
    dir: PathBuf,
}

impl CsvRecordSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        CsvRecordSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, table: LegacyTable) -> PathBuf {
        self.dir.join(format!("{}.csv", table.name()))
    }

    /// Every table, in ingestion order. Each header is checked before any
    /// record is handed back.
    pub fn read_all(&self, config: &MigrationConfig) -> Result<Vec<(LegacyTable, Vec<StringRecord>)>> {
        let mut tables = Vec::with_capacity(LegacyTable::ALL.len());
        for table in LegacyTable::ALL {
            tables.push((table, self.read_table(table, config)?));
        }
        Ok(tables)
    }

    /// All rows of a table, header excluded.
    ///
    /// `bands.csv` must exist; the other exports read as empty when missing.
    /// A header narrower than the configured mapping is a configuration error.
    pub fn read_table(&self, table: LegacyTable, config: &MigrationConfig) -> Result<Vec<StringRecord>> {
        let path = self.path(table);
        if !path.exists() {
            if table == LegacyTable::Bands {
                bail!("Legacy bands export not found: {:?}", path);
            }
            warn!(table = table.name(), path = %path.display(), "no export found, treating as empty");
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path))?;

        let width = rdr
            .headers()
            .with_context(|| format!("Failed to read CSV header: {:?}", path))?
            .len();
        check_width(table, &config.indexed_columns(table), width)?;

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.with_context(|| format!("Failed to read CSV record: {:?}", path))?;
            records.push(record);
        }

        debug!(table = table.name(), records = records.len(), "read legacy table");
        Ok(records)
    }
}

fn check_width(table: LegacyTable, columns: &[(&str, usize)], width: usize) -> Result<(), ConfigError> {
    match columns.iter().find(|(_, index)| *index >= width) {
        Some(&(column, index)) => Err(ConfigError::ColumnOutOfRange {
            table: table.name().to_string(),
            column: column.to_string(),
            index,
            width,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_formats;
    use crate::model::LegacyRecord;
    use std::fs;

    fn config() -> MigrationConfig {
        MigrationConfig::from_json(&sample_formats().to_string()).unwrap()
    }

    #[test]
    fn test_read_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("connections.csv"),
            "band1,band2\n1,2\n3,\"4\"\n",
        )
        .unwrap();

        let source = CsvRecordSource::new(dir.path());
        let records = source.read_table(LegacyTable::Connections, &config()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].field(0), Some("3"));
        assert_eq!(records[1].field(1), Some("4"));
    }

    #[test]
    fn test_quoted_members_field() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pending_bands.csv"),
            "name,city,state,website,members\nQuasi,Portland,Oregon,,\"Sam Coomes, Janet Weiss\"\n",
        )
        .unwrap();

        let records = CsvRecordSource::new(dir.path())
            .read_table(LegacyTable::PendingBands, &config())
            .unwrap();
        assert_eq!(records[0].field(4), Some("Sam Coomes, Janet Weiss"));
    }

    #[test]
    fn test_missing_export_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = CsvRecordSource::new(dir.path())
            .read_table(LegacyTable::PendingBands, &config())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_bands_export_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvRecordSource::new(dir.path())
            .read_table(LegacyTable::Bands, &config())
            .unwrap_err();
        assert!(err.to_string().contains("bands export not found"));
    }

    #[test]
    fn test_read_all_checks_every_header_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bands.csv"),
            "id,name,city,state,click_count,website,members\n1,Quasi,Portland,Oregon,,,\n",
        )
        .unwrap();
        fs::write(dir.path().join("connections.csv"), "band1\n1\n").unwrap();

        let source = CsvRecordSource::new(dir.path());
        let err = source.read_all(&config()).unwrap_err();
        assert!(matches!(
            err.downcast::<ConfigError>().unwrap(),
            ConfigError::ColumnOutOfRange { .. }
        ));

        fs::write(dir.path().join("connections.csv"), "band1,band2\n1,1\n").unwrap();
        let tables = source.read_all(&config()).unwrap();
        let names: Vec<&str> = tables.iter().map(|(t, _)| t.name()).collect();
        assert_eq!(names, vec!["bands", "pending_bands", "connections"]);
        assert_eq!(tables[0].1.len(), 1);
        assert!(tables[1].1.is_empty());
    }

    #[test]
    fn test_narrow_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("connections.csv"), "band1\n1\n").unwrap();

        let err = CsvRecordSource::new(dir.path())
            .read_table(LegacyTable::Connections, &config())
            .unwrap_err();
        assert_eq!(
            err.downcast::<ConfigError>().unwrap(),
            ConfigError::ColumnOutOfRange {
                table: "connections".into(),
                column: "band2".into(),
                index: 1,
                width: 1
            }
        );
    }
}
