// 🏗️ Data Model - ingests legacy tables into the registries
//
// Owns every registry, the connection set and the running report for one
// migration run. Records are processed strictly in input order; the first
// occurrence wins every dedup decision.

use crate::config::{BandColumns, LegacyTable, MigrationConfig};
use crate::connections::ConnectionSet;
use crate::entities::{Band, BandRef, Person, Registries, Website};
use crate::gazetteer::Gazetteer;
use crate::normalize::{normalize_band, normalize_person, normalize_website};
use crate::report::{FinalReport, MigrationReport};
use crate::resolver::CityStateResolver;
use tracing::{debug, info, warn};

/// Positional access to one legacy row
pub trait LegacyRecord {
    fn field(&self, index: usize) -> Option<&str>;
}

impl LegacyRecord for csv::StringRecord {
    fn field(&self, index: usize) -> Option<&str> {
        self.get(index)
    }
}

impl<S: AsRef<str>> LegacyRecord for [S] {
    fn field(&self, index: usize) -> Option<&str> {
        self.get(index).map(AsRef::as_ref)
    }
}

impl<S: AsRef<str>> LegacyRecord for Vec<S> {
    fn field(&self, index: usize) -> Option<&str> {
        self.as_slice().field(index)
    }
}

/// Missing trailing fields read as empty
fn text<R: LegacyRecord + ?Sized>(record: &R, index: usize) -> &str {
    record.field(index).unwrap_or("")
}

pub struct DataModel {
    config: MigrationConfig,
    pub registries: Registries,
    pub connections: ConnectionSet,
    pub report: MigrationReport,
}

impl DataModel {
    pub fn new(config: MigrationConfig) -> Self {
        let report = MigrationReport::new(config.report);
        Self::with_report(config, report)
    }

    pub fn with_report(config: MigrationConfig, report: MigrationReport) -> Self {
        DataModel {
            config,
            registries: Registries::new(),
            connections: ConnectionSet::new(),
            report,
        }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.config.gazetteer
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Route a table's records to the matching ingestion pass
    pub fn add_from_table<R, I>(&mut self, table: LegacyTable, records: I)
    where
        R: LegacyRecord,
        I: IntoIterator<Item = R>,
    {
        info!(table = table.name(), "organizing records");
        match table {
            LegacyTable::Bands => {
                let columns = self.config.bands;
                self.add_band_records(records, &columns);
            }
            LegacyTable::PendingBands => {
                let columns = self.config.pending_bands;
                self.add_band_records(records, &columns);
            }
            LegacyTable::Connections => self.add_connection_records(records),
        }
    }

    // ========================================================================
    // BANDS
    // ========================================================================

    pub fn add_band_records<R, I>(&mut self, records: I, columns: &BandColumns)
    where
        R: LegacyRecord,
        I: IntoIterator<Item = R>,
    {
        let before = self.report.bands.read;
        for record in records {
            self.add_band_record(&record, columns);
        }

        let bands = &self.report.bands;
        info!(
            read = bands.read - before,
            unique = self.registries.bands.len(),
            deduplicated = bands.deduplicated_count,
            people = self.registries.people.len(),
            cities = self.registries.cities.len(),
            websites = self.registries.websites.len(),
            "band records absorbed"
        );
    }

    fn add_band_record<R: LegacyRecord + ?Sized>(&mut self, record: &R, columns: &BandColumns) {
        self.report.bands.read += 1;

        let raw_name = text(record, columns.name);
        let name = normalize_band(raw_name);
        if name.is_empty() {
            self.report.bands.skipped_no_name += 1;
            warn!(row = self.report.bands.read, "skipping band record without a name");
            return;
        }
        if name != raw_name {
            self.report.bands.record_normalized(raw_name, &name);
        }

        let legacy_id = columns
            .id
            .map(|i| text(record, i).trim().to_string())
            .filter(|id| !id.is_empty());
        let click_count = columns
            .click_count
            .map(|i| parse_click_count(text(record, i), &name))
            .unwrap_or(0);

        let band = self.absorb_band(legacy_id, &name, click_count);
        self.absorb_members(band, text(record, columns.members));

        let resolver = CityStateResolver::new(&self.config.gazetteer);
        resolver.resolve(
            &mut self.registries,
            &mut self.report,
            band,
            text(record, columns.city),
            text(record, columns.state),
        );

        self.absorb_website(band, text(record, columns.website));
    }

    /// Existing band by legacy id or name, or a new one
    fn absorb_band(&mut self, legacy_id: Option<String>, name: &str, click_count: i64) -> BandRef {
        let bands = &mut self.registries.bands;
        match bands.find(legacy_id.as_deref(), name) {
            Some(existing) => {
                let existing_name = bands[existing].name.clone();
                self.report.bands.record_duplicate(&existing_name);
                if let Some(id) = &legacy_id {
                    bands.alias_legacy_id(id, existing);
                }
                debug!(band = %existing_name, "deduplicated band");
                existing
            }
            None => {
                self.report.bands.unique += 1;
                bands.insert(Band::new(legacy_id, name, click_count))
            }
        }
    }

    /// Comma-separated member names, linked both ways
    fn absorb_members(&mut self, band: BandRef, members: &str) {
        let band_name = self.registries.bands[band].name.clone();

        for raw in members.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            self.report.people.total_read += 1;

            let name = normalize_person(raw);
            if name != raw {
                self.report.people.record_normalized(raw, &name);
            }

            let people = &mut self.registries.people;
            let (person, created) = people.get_or_insert_with(&name, || Person::new(&name));
            if created {
                self.report.people.unique += 1;
            }
            people[person].add_band(&band_name);

            let person_name = people[person].name.clone();
            self.registries.bands.add_person(band, &person_name);
        }
    }

    fn absorb_website(&mut self, band: BandRef, raw_url: &str) {
        let url = normalize_website(raw_url);
        if url.is_empty() {
            return;
        }
        self.report.websites.total_read += 1;

        let websites = &mut self.registries.websites;
        let (site, created) = websites.get_or_insert_with(&url, || Website::new(&url));
        if created {
            self.report.websites.unique += 1;
        }
        websites[site].add_band(band);
    }

    // ========================================================================
    // CONNECTIONS
    // ========================================================================

    /// Pairs of legacy band ids. Must run after every band table.
    pub fn add_connection_records<R, I>(&mut self, records: I)
    where
        R: LegacyRecord,
        I: IntoIterator<Item = R>,
    {
        let columns = self.config.connections;
        let section_before = self.report.connections.clone();

        for record in records {
            let id1 = text(&record, columns.band1).trim();
            let id2 = text(&record, columns.band2).trim();
            self.add_connection(id1, id2);
        }

        let after = &self.report.connections;
        info!(
            read = after.read - section_before.read,
            unique = after.valid - section_before.valid,
            unknown = after.unknown_band_count - section_before.unknown_band_count,
            duplicates = after.duplicates - section_before.duplicates,
            "connection records absorbed"
        );
    }

    fn add_connection(&mut self, id1: &str, id2: &str) {
        let section = &mut self.report.connections;
        section.read += 1;

        let bands = &mut self.registries.bands;
        match (bands.by_legacy_id(id1), bands.by_legacy_id(id2)) {
            (Some(a), Some(b)) if a == b => {
                section.self_connection_count += 1;
                section
                    .self_connections
                    .push(format!("{} ({}), {} ({})", id1, bands[a].name, id2, bands[b].name));
            }
            (Some(a), Some(b)) => {
                if self.connections.connect(a, b, bands) {
                    section.valid += 1;
                } else {
                    section.duplicates += 1;
                }
            }
            (a, b) => {
                let label = |id: &str, band: Option<BandRef>| match band {
                    Some(band) => format!("{} ({})", id, bands[band].name),
                    None => format!("{} (null)", id),
                };
                section.unknown_band_count += 1;
                section
                    .unknown_band
                    .push(format!("({}, {})", label(id1, a), label(id2, b)));
            }
        }
    }

    // ========================================================================
    // FINISHING
    // ========================================================================

    /// Put connections in their final order. Safe to call more than once.
    pub fn finish(&mut self) {
        self.connections.sort(&self.registries.bands);
    }

    pub fn finalize_report(&self) -> serde_json::Result<FinalReport> {
        self.report.finalize(&self.registries, &self.connections)
    }
}

/// Legacy click counts are free text; anything unparseable counts as zero
fn parse_click_count(raw: &str, band: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    match raw.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            warn!(band, value = raw, "unparseable click count, using 0");
            0
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
