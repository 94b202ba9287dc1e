// ⚙️ Data Formats Configuration
//
// One JSON file declares the gazetteer, where each legacy column lives, and
// how the report is bounded. It is validated as a whole before any record
// is read.

use crate::error::ConfigError;
use crate::gazetteer::Gazetteer;
use crate::report::ReportSettings;
use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Legacy tables, in the order they are ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyTable {
    Bands,
    PendingBands,
    Connections,
}

impl LegacyTable {
    pub const ALL: [LegacyTable; 3] = [
        LegacyTable::Bands,
        LegacyTable::PendingBands,
        LegacyTable::Connections,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LegacyTable::Bands => "bands",
            LegacyTable::PendingBands => "pending_bands",
            LegacyTable::Connections => "connections",
        }
    }
}

type ColumnMap = BTreeMap<String, usize>;

// ============================================================================
// COLUMN MAPPINGS
// ============================================================================

/// Column positions for `bands` and `pending_bands` records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandColumns {
    /// Absent for pending bands
    pub id: Option<usize>,
    pub name: usize,
    pub members: usize,
    pub city: usize,
    pub state: usize,
    pub website: usize,
    pub click_count: Option<usize>,
}

impl BandColumns {
    fn from_map(table: LegacyTable, map: &ColumnMap) -> Result<Self, ConfigError> {
        let with_id = table == LegacyTable::Bands;
        check_unique_indices(table, map)?;

        Ok(BandColumns {
            id: if with_id { Some(required(table, map, "id")?) } else { None },
            name: required(table, map, "name")?,
            members: required(table, map, "members")?,
            city: required(table, map, "city")?,
            state: required(table, map, "state")?,
            website: required(table, map, "website")?,
            click_count: map.get("click_count").copied(),
        })
    }

    /// (column, index) pairs the ingestion reads
    pub fn indexed(&self) -> Vec<(&'static str, usize)> {
        let mut columns = Vec::with_capacity(7);
        if let Some(id) = self.id {
            columns.push(("id", id));
        }
        columns.extend([
            ("name", self.name),
            ("members", self.members),
            ("city", self.city),
            ("state", self.state),
            ("website", self.website),
        ]);
        if let Some(click_count) = self.click_count {
            columns.push(("click_count", click_count));
        }
        columns
    }
}

/// Column positions for `connections` records (legacy band ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionColumns {
    pub band1: usize,
    pub band2: usize,
}

impl ConnectionColumns {
    fn from_map(map: &ColumnMap) -> Result<Self, ConfigError> {
        let table = LegacyTable::Connections;
        check_unique_indices(table, map)?;
        Ok(ConnectionColumns {
            band1: required(table, map, "band1")?,
            band2: required(table, map, "band2")?,
        })
    }

    pub fn indexed(&self) -> Vec<(&'static str, usize)> {
        vec![("band1", self.band1), ("band2", self.band2)]
    }
}

fn required(table: LegacyTable, map: &ColumnMap, column: &str) -> Result<usize, ConfigError> {
    map.get(column).copied().ok_or_else(|| ConfigError::MissingColumn {
        table: table.name().to_string(),
        column: column.to_string(),
    })
}

fn check_unique_indices(table: LegacyTable, map: &ColumnMap) -> Result<(), ConfigError> {
    let mut seen: BTreeMap<usize, &str> = BTreeMap::new();
    for (column, &index) in map {
        if let Some(first) = seen.insert(index, column.as_str()) {
            return Err(ConfigError::DuplicateColumnIndex {
                table: table.name().to_string(),
                first: first.to_string(),
                second: column.clone(),
                index,
            });
        }
    }
    Ok(())
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// The data-formats file as written on disk
#[derive(Debug, Deserialize)]
struct DataFormats {
    countries_table: Option<Value>,
    input_col_index: Option<BTreeMap<String, ColumnMap>>,
    #[serde(default)]
    report: ReportSettings,
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub gazetteer: Gazetteer,
    pub bands: BandColumns,
    pub pending_bands: BandColumns,
    pub connections: ConnectionColumns,
    pub report: ReportSettings,
}

impl MigrationConfig {
    /// Load and validate a data-formats file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read(path.as_ref())
            .with_context(|| format!("Failed to read data formats file: {:?}", path.as_ref()))?;
        Self::from_slice(&contents)
    }

    pub fn from_slice(contents: &[u8]) -> Result<Self> {
        let formats: DataFormats =
            serde_json::from_slice(contents).context("Failed to parse data formats JSON")?;
        Ok(Self::validate(formats)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    fn validate(formats: DataFormats) -> Result<Self, ConfigError> {
        let table = formats
            .countries_table
            .ok_or_else(|| ConfigError::MissingSection("countries_table".to_string()))?;
        let gazetteer = Gazetteer::from_table(&table)?;

        let columns = formats
            .input_col_index
            .ok_or_else(|| ConfigError::MissingSection("input_col_index".to_string()))?;
        let mapping = |table: LegacyTable| {
            columns
                .get(table.name())
                .ok_or_else(|| ConfigError::MissingTable(table.name().to_string()))
        };

        let bands = BandColumns::from_map(LegacyTable::Bands, mapping(LegacyTable::Bands)?)?;
        let pending_bands =
            BandColumns::from_map(LegacyTable::PendingBands, mapping(LegacyTable::PendingBands)?)?;
        let connections = ConnectionColumns::from_map(mapping(LegacyTable::Connections)?)?;

        formats.report.validate()?;

        Ok(MigrationConfig {
            gazetteer,
            bands,
            pending_bands,
            connections,
            report: formats.report,
        })
    }

    /// The (column, index) pairs read from a table
    pub fn indexed_columns(&self, table: LegacyTable) -> Vec<(&'static str, usize)> {
        match table {
            LegacyTable::Bands => self.bands.indexed(),
            LegacyTable::PendingBands => self.pending_bands.indexed(),
            LegacyTable::Connections => self.connections.indexed(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
