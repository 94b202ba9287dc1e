// 📊 Migration Report - counters and bounded samples for the audit log
//
// Every resolution step records what it did here. Nothing in the report is
// ever read back by the resolver.
//
// Section and key names are the labels operators see in the rendered JSON,
// so they are fixed through serde renames.

use crate::connections::ConnectionSet;
use crate::entities::Registries;
use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Marker standing in for entries cut by truncation
pub const ELLIPSIS: &str = "...";

pub const NOT_IN_LOOKUP: &str = "Not In Lookup Table (Won't Be Written)";
pub const ASSIGNED_BY_LOOKUP: &str = "Assigned A State/Country Through Lookup Table";
pub const STATES_NORMALIZED: &str = "Normalized (like 'Wa' => 'WA')";

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Most entries kept in any sample list
    pub sample_cap: usize,

    /// Entries per list/map in the truncated view, marker included
    pub max_entries: usize,

    /// Nesting depth at which truncation starts
    pub truncate_depth: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            sample_cap: 1000,
            max_entries: 5,
            truncate_depth: 2,
        }
    }
}

impl ReportSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_cap == 0 {
            return Err(ConfigError::InvalidReportSettings(
                "sample_cap must be at least 1".to_string(),
            ));
        }
        if self.max_entries < 2 {
            return Err(ConfigError::InvalidReportSettings(
                "max_entries must leave room for an entry and the marker".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// COLLECTORS
// ============================================================================

/// Insertion-ordered counter keyed by report entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence; returns the new count
    pub fn add(&mut self, key: impl Into<String>) -> u64 {
        self.add_n(key, 1)
    }

    pub fn add_n(&mut self, key: impl Into<String>, n: u64) -> u64 {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => {
                self.entries[i].1 += n;
                self.entries[i].1
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, n));
                n
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{"entry": "3 Times"}`
    pub fn as_times(&self) -> Value {
        let mut map = Map::new();
        for (key, n) in self.iter() {
            map.insert(key.to_string(), Value::String(format!("{} Times", n)));
        }
        Value::Object(map)
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, n) in &self.entries {
            map.serialize_entry(key, n)?;
        }
        map.end()
    }
}

/// Sample list that stops storing after `cap` entries but keeps counting
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    items: Vec<String>,
    cap: usize,
    seen: u64,
}

impl Samples {
    pub fn with_cap(cap: usize) -> Self {
        Samples {
            items: Vec::new(),
            cap,
            seen: 0,
        }
    }

    pub fn push(&mut self, item: impl Into<String>) {
        self.seen += 1;
        if self.items.len() < self.cap {
            self.items.push(item.into());
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn dropped(&self) -> u64 {
        self.seen - self.items.len() as u64
    }
}

impl Default for Samples {
    fn default() -> Self {
        Samples::with_cap(ReportSettings::default().sample_cap)
    }
}

impl Serialize for Samples {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dropped = self.dropped();
        let len = self.items.len() + usize::from(dropped > 0);
        let mut seq = serializer.serialize_seq(Some(len))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        if dropped > 0 {
            seq.serialize_element(&format!("{} ({} more not kept)", ELLIPSIS, dropped))?;
        }
        seq.end()
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct BandSection {
    #[serde(rename = "Read")]
    pub read: u64,
    #[serde(rename = "Unique")]
    pub unique: u64,
    #[serde(rename = "Skipped (No Name)")]
    pub skipped_no_name: u64,
    #[serde(rename = "Normalized Names Count")]
    pub normalized_count: u64,
    #[serde(rename = "Normalized Names")]
    pub normalized: Samples,
    #[serde(rename = "Deduplicated Count")]
    pub deduplicated_count: u64,
    #[serde(rename = "Deduplicated")]
    pub deduplicated: Tally,
}

impl BandSection {
    pub fn record_normalized(&mut self, raw: &str, normalized: &str) {
        self.normalized_count += 1;
        self.normalized.push(format!("'{}' => '{}'", raw, normalized));
    }

    pub fn record_duplicate(&mut self, name: &str) {
        self.deduplicated_count += 1;
        self.deduplicated.add(name);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PeopleSection {
    #[serde(rename = "Total Read")]
    pub total_read: u64,
    #[serde(rename = "Unique")]
    pub unique: u64,
    #[serde(rename = "Normalized Names Count")]
    pub normalized_count: u64,
    #[serde(rename = "Normalized Names")]
    pub normalized: Samples,
}

impl PeopleSection {
    pub fn record_normalized(&mut self, raw: &str, normalized: &str) {
        self.normalized_count += 1;
        self.normalized.push(format!("'{}' => '{}'", raw, normalized));
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CitySection {
    #[serde(rename = "Total Read")]
    pub total_read: u64,
    #[serde(rename = "Unique")]
    pub unique: u64,
    #[serde(rename = "Normalized Count")]
    pub normalized_count: u64,
    #[serde(rename = "Normalized")]
    pub normalized: Tally,
    #[serde(rename = "Assigned A State/Country Through Lookup Table Count")]
    pub assigned_count: u64,
    #[serde(rename = "Assigned A State/Country Through Lookup Table")]
    pub assigned: Tally,
    #[serde(rename = "Not In Lookup Table (Won't Be Written) Count")]
    pub unresolved_count: u64,
    #[serde(rename = "Not In Lookup Table (Won't Be Written)")]
    pub unresolved: Tally,
    #[serde(rename = "Orphans Merged Count")]
    pub orphans_merged_count: u64,
    #[serde(rename = "Orphans Merged")]
    pub orphans_merged: Samples,
}

impl CitySection {
    pub fn record_normalized(&mut self, raw: &str, normalized: &str) {
        self.normalized_count += 1;
        self.normalized.add(format!("'{}' => '{}'", raw, normalized));
    }

    pub fn record_assigned(&mut self, city: &str, fullname: &str) {
        self.assigned_count += 1;
        self.assigned.add(format!("{} => {}", city, fullname));
    }

    pub fn record_unresolved(&mut self, band: &str, city: &str, state: &str) {
        self.unresolved_count += 1;
        self.unresolved.add(format!(
            "Band: '{}', City: '{}', State: '{}'",
            band, city, state
        ));
    }

    pub fn record_orphan_merge(&mut self, city: &str, into: &str, bands: usize) {
        self.orphans_merged_count += 1;
        self.orphans_merged
            .push(format!("{} => {} ({} Bands)", city, into, bands));
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSection {
    #[serde(rename = "Total Read")]
    pub total_read: u64,
    #[serde(rename = "Unique")]
    pub unique: u64,
    #[serde(rename = "Normalized (like 'Wa' => 'WA') Count")]
    pub normalized_count: u64,
    #[serde(rename = "Normalized (like 'Wa' => 'WA')")]
    pub normalized: Tally,
    #[serde(rename = "Not In Lookup Table (Won't Be Written) Count")]
    pub unresolved_count: u64,
    #[serde(rename = "Not In Lookup Table (Won't Be Written)")]
    pub unresolved: Tally,
}

impl StateSection {
    pub fn record_normalized(&mut self, raw: &str, normalized: &str) {
        self.normalized_count += 1;
        self.normalized.add(format!("'{}' => '{}'", raw, normalized));
    }

    pub fn record_unresolved(&mut self, band: &str, state: &str) {
        self.unresolved_count += 1;
        self.unresolved
            .add(format!("Band: '{}', State: '{}'", band, state));
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountrySection {
    #[serde(rename = "Inferred From Lookup Table Count")]
    pub inferred_count: u64,
    #[serde(rename = "Inferred From Lookup Table")]
    pub inferred: Vec<String>,
    #[serde(rename = "Not In Lookup Table (Won't Be Written) Count")]
    pub synthesized_count: u64,
    #[serde(rename = "Not In Lookup Table (Won't Be Written)")]
    pub synthesized: Vec<String>,
}

impl CountrySection {
    /// Record a country reached through the lookup table; true the first time
    pub fn record_inferred(&mut self, name: &str) -> bool {
        if self.inferred.iter().any(|c| c == name) {
            return false;
        }
        self.inferred_count += 1;
        self.inferred.push(name.to_string());
        true
    }

    pub fn record_synthesized(&mut self, name: &str) -> bool {
        if self.synthesized.iter().any(|c| c == name) {
            return false;
        }
        self.synthesized_count += 1;
        self.synthesized.push(name.to_string());
        true
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebsiteSection {
    #[serde(rename = "Total Read")]
    pub total_read: u64,
    #[serde(rename = "Unique")]
    pub unique: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionSection {
    #[serde(rename = "Read")]
    pub read: u64,
    #[serde(rename = "Valid and Unique")]
    pub valid: u64,
    #[serde(rename = "Duplicates")]
    pub duplicates: u64,
    #[serde(rename = "Unknown Band Count")]
    pub unknown_band_count: u64,
    #[serde(rename = "Unknown Band")]
    pub unknown_band: Samples,
    #[serde(rename = "Self-Connections Count")]
    pub self_connection_count: u64,
    #[serde(rename = "Self-Connections")]
    pub self_connections: Samples,
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    #[serde(rename = "Run Id")]
    pub id: Uuid,
    #[serde(rename = "Started")]
    pub started: DateTime<Utc>,
    #[serde(rename = "Data Formats SHA-256", skip_serializing_if = "Option::is_none")]
    pub config_digest: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    #[serde(skip)]
    settings: ReportSettings,

    #[serde(rename = "Run")]
    pub run: RunInfo,
    #[serde(rename = "Bands")]
    pub bands: BandSection,
    #[serde(rename = "People")]
    pub people: PeopleSection,
    #[serde(rename = "Cities")]
    pub cities: CitySection,
    #[serde(rename = "States")]
    pub states: StateSection,
    #[serde(rename = "Countries")]
    pub countries: CountrySection,
    #[serde(rename = "Websites")]
    pub websites: WebsiteSection,
    #[serde(rename = "Connections")]
    pub connections: ConnectionSection,
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self::new(ReportSettings::default())
    }
}

impl MigrationReport {
    /// Fresh sections for one run
    pub fn new(settings: ReportSettings) -> Self {
        let samples = || Samples::with_cap(settings.sample_cap);
        MigrationReport {
            settings,
            run: RunInfo {
                id: Uuid::new_v4(),
                started: Utc::now(),
                config_digest: None,
            },
            bands: BandSection {
                normalized: samples(),
                ..Default::default()
            },
            people: PeopleSection {
                normalized: samples(),
                ..Default::default()
            },
            cities: CitySection {
                orphans_merged: samples(),
                ..Default::default()
            },
            states: StateSection::default(),
            countries: CountrySection::default(),
            websites: WebsiteSection::default(),
            connections: ConnectionSection {
                unknown_band: samples(),
                self_connections: samples(),
                ..Default::default()
            },
        }
    }

    /// Stamp the run with a digest of the data-formats file contents
    pub fn with_config_digest(mut self, contents: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(contents);
        self.run.config_digest = Some(format!("{:x}", hasher.finalize()));
        self
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Running counters plus aggregates computed from the finished registries.
    ///
    /// Leaves the running counters untouched, so it can be called repeatedly.
    pub fn finalize(
        &self,
        registries: &Registries,
        connections: &ConnectionSet,
    ) -> serde_json::Result<FinalReport> {
        let mut root = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let cap = self.settings.sample_cap;

        extend_section(&mut root, "Bands", band_aggregates(registries, cap));
        extend_section(&mut root, "People", people_aggregates(registries, cap));
        extend_section(&mut root, "Cities", self.city_aggregates(registries, cap));
        extend_section(&mut root, "States", self.state_aggregates(registries, cap));
        extend_section(&mut root, "Websites", website_aggregates(registries, cap));
        extend_section(
            &mut root,
            "Connections",
            connection_aggregates(registries, connections, cap),
        );

        Ok(FinalReport(Value::Object(root)))
    }

    fn city_aggregates(&self, registries: &Registries, cap: usize) -> Map<String, Value> {
        let mut band_count: Vec<(String, usize)> = Vec::new();
        let mut no_state: Vec<String> = Vec::new();
        let mut multiple: Map<String, Value> = Map::new();

        for (handle, city) in registries.cities.iter() {
            let fullname = registries.city_fullname(handle);
            band_count.push((fullname.clone(), city.bands.len()));
            if city.is_orphan() {
                no_state.push(fullname.clone());
            }
            if registries.cities.get_all(&city.name).len() > 1 {
                let entry = multiple
                    .entry(city.name.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(names) = entry {
                    names.push(Value::String(fullname));
                }
            }
        }

        let mut m = Map::new();
        m.insert("Band Count".into(), ranked(band_count, cap));
        m.insert("No State Count".into(), json!(no_state.len()));
        m.insert("No State".into(), capped(no_state, cap));
        m.insert("Multiple States/Countries Count".into(), json!(multiple.len()));
        m.insert("Multiple States/Countries".into(), Value::Object(multiple));
        m.insert("Normalized".into(), self.cities.normalized.as_times());
        m.insert(ASSIGNED_BY_LOOKUP.into(), self.cities.assigned.as_times());
        m.insert(NOT_IN_LOOKUP.into(), self.cities.unresolved.as_times());
        m
    }

    fn state_aggregates(&self, registries: &Registries, cap: usize) -> Map<String, Value> {
        let no_country: Vec<String> = registries
            .states
            .iter()
            .filter(|(_, s)| s.country.is_none())
            .map(|(handle, _)| registries.state_fullname(handle))
            .collect();

        let mut m = Map::new();
        m.insert(STATES_NORMALIZED.into(), self.states.normalized.as_times());
        m.insert(NOT_IN_LOOKUP.into(), self.states.unresolved.as_times());
        m.insert("No Country Count".into(), json!(no_country.len()));
        m.insert("No Country".into(), capped(no_country, cap));
        m
    }
}

fn band_aggregates(registries: &Registries, cap: usize) -> Map<String, Value> {
    let mut members: Vec<usize> = Vec::new();
    let mut members_only: Vec<usize> = Vec::new();
    let mut no_members: Vec<String> = Vec::new();
    let mut no_city: Vec<String> = Vec::new();
    let mut multiple_cities = Map::new();

    for (_, band) in registries.bands.iter() {
        members.push(band.people.len());
        if band.people.is_empty() {
            no_members.push(band.name.clone());
        } else {
            members_only.push(band.people.len());
        }

        if band.cities.is_empty() {
            no_city.push(band.name.clone());
        } else if band.cities.len() > 1 && multiple_cities.len() < cap {
            let names: Vec<String> = band
                .cities
                .iter()
                .map(|&c| registries.city_fullname(c))
                .collect();
            multiple_cities.insert(band.name.clone(), json!(names));
        }
    }
    let multiple_count = registries
        .bands
        .iter()
        .filter(|(_, b)| b.cities.len() > 1)
        .count();
    no_members.sort();

    let mut m = Map::new();
    m.insert("No Members Count".into(), json!(no_members.len()));
    m.insert("No Members".into(), capped(no_members, cap));
    m.insert("No City Count".into(), json!(no_city.len()));
    m.insert("No City".into(), capped(no_city, cap));
    m.insert("Multiple Cities Count".into(), json!(multiple_count));
    m.insert("Multiple Cities".into(), Value::Object(multiple_cities));
    m.insert("Average Members Per Band".into(), json!(average(&members)));
    m.insert(
        "Only Counting Bands With Members".into(),
        json!(average(&members_only)),
    );
    m
}

fn people_aggregates(registries: &Registries, cap: usize) -> Map<String, Value> {
    let mut per_person: Vec<usize> = Vec::new();
    let mut in_multiple: Vec<(String, usize)> = Vec::new();
    let mut distribution: BTreeMap<usize, usize> = BTreeMap::new();

    for (_, person) in registries.people.iter() {
        let count = person.bands.len();
        per_person.push(count);
        *distribution.entry(count).or_insert(0) += 1;
        if count > 1 {
            in_multiple.push((person.name.clone(), count));
        }
    }

    let mut how_many = Map::new();
    for (bands, people) in distribution {
        how_many.insert(
            format!("{} Bands", bands),
            Value::String(format!("{} People", people)),
        );
    }

    let mut m = Map::new();
    m.insert("In Multiple Bands Count".into(), json!(in_multiple.len()));
    m.insert("In Multiple Bands".into(), ranked(in_multiple, cap));
    m.insert("How Many Bands Are People In".into(), Value::Object(how_many));
    m.insert("Average Bands Per Person".into(), json!(average(&per_person)));
    m
}

fn website_aggregates(registries: &Registries, cap: usize) -> Map<String, Value> {
    let mut shared = Map::new();
    let mut count = 0;
    for (_, site) in registries.websites.iter() {
        if site.bands.len() < 2 {
            continue;
        }
        count += 1;
        if shared.len() < cap {
            let names: Vec<&str> = site
                .bands
                .iter()
                .map(|&b| registries.bands[b].name.as_str())
                .collect();
            shared.insert(
                format!("{} ({} Bands)", site.url, site.bands.len()),
                json!(names),
            );
        }
    }

    let mut m = Map::new();
    m.insert("Websites With Multiple Bands Count".into(), json!(count));
    m.insert("Websites With Multiple Bands".into(), Value::Object(shared));
    m
}

fn connection_aggregates(
    registries: &Registries,
    connections: &ConnectionSet,
    cap: usize,
) -> Map<String, Value> {
    let most_connected: Vec<(String, usize)> = registries
        .bands
        .iter()
        .filter(|(_, b)| b.connection_count > 0)
        .map(|(_, b)| (b.name.clone(), b.connection_count))
        .collect();

    let mut m = Map::new();
    m.insert("Stored".into(), json!(connections.len()));
    m.insert("Most Connected Bands".into(), ranked(most_connected, cap));
    m
}

fn extend_section(root: &mut Map<String, Value>, name: &str, extra: Map<String, Value>) {
    if let Some(Value::Object(section)) = root.get_mut(name) {
        section.extend(extra);
    }
}

/// Highest value first; equal values keep their first-seen order
fn ranked(mut entries: Vec<(String, usize)>, cap: usize) -> Value {
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    let mut map = Map::new();
    for (key, n) in entries.into_iter().take(cap) {
        map.insert(key, json!(n));
    }
    Value::Object(map)
}

fn capped(entries: Vec<String>, cap: usize) -> Value {
    Value::Array(entries.into_iter().take(cap).map(Value::String).collect())
}

/// Mean rounded to two decimals; 0 for no values
fn average(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<usize>() as f64 / values.len() as f64;
    (mean * 100.0).round() / 100.0
}

// ============================================================================
// FINAL VIEW
// ============================================================================

/// The finalized report as a JSON tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FinalReport(Value);

impl FinalReport {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.0.get(section)?.get(key)
    }

    /// Copy with list/map fan-out capped from `limit_depth` down
    pub fn truncated(&self, max_entries: usize, limit_depth: usize) -> Value {
        truncate(&self.0, max_entries, limit_depth, 0)
    }
}

/// At depth >= `limit_depth`, a list or map longer than `max_entries` keeps
/// `max_entries - 1` entries followed by the `"..."` marker.
pub fn truncate(value: &Value, max_entries: usize, limit_depth: usize, depth: usize) -> Value {
    let cut = |len: usize| depth >= limit_depth && len > max_entries;
    match value {
        Value::Object(map) => {
            let keep = if cut(map.len()) {
                max_entries.saturating_sub(1)
            } else {
                map.len()
            };
            let mut out = Map::new();
            for (k, v) in map.iter().take(keep) {
                out.insert(k.clone(), truncate(v, max_entries, limit_depth, depth + 1));
            }
            if cut(map.len()) {
                out.insert(ELLIPSIS.to_string(), Value::String(ELLIPSIS.to_string()));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let keep = if cut(items.len()) {
                max_entries.saturating_sub(1)
            } else {
                items.len()
            };
            let mut out: Vec<Value> = items
                .iter()
                .take(keep)
                .map(|v| truncate(v, max_entries, limit_depth, depth + 1))
                .collect();
            if cut(items.len()) {
                out.push(Value::String(ELLIPSIS.to_string()));
            }
            Value::Array(out)
        }
        other => other.clone(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Band, Person, Website};

    #[test]
    fn test_tally_keeps_first_seen_order() {
        let mut tally = Tally::new();
        tally.add("b");
        tally.add("a");
        assert_eq!(tally.add("b"), 2);

        let entries: Vec<(&str, u64)> = tally.iter().collect();
        assert_eq!(entries, vec![("b", 2), ("a", 1)]);
        assert_eq!(tally.as_times(), json!({"b": "2 Times", "a": "1 Times"}));
        assert_eq!(serde_json::to_value(&tally).unwrap(), json!({"b": 2, "a": 1}));
    }

    #[test]
    fn test_samples_are_bounded() {
        let mut samples = Samples::with_cap(2);
        for i in 0..5 {
            samples.push(format!("s{}", i));
        }

        assert_eq!(samples.items(), &["s0".to_string(), "s1".to_string()]);
        assert_eq!(samples.seen(), 5);
        assert_eq!(samples.dropped(), 3);
        assert_eq!(
            serde_json::to_value(&samples).unwrap(),
            json!(["s0", "s1", "... (3 more not kept)"])
        );
    }

    #[test]
    fn test_settings_validation() {
        assert!(ReportSettings::default().validate().is_ok());

        let no_room = ReportSettings {
            max_entries: 1,
            ..Default::default()
        };
        assert!(matches!(
            no_room.validate(),
            Err(ConfigError::InvalidReportSettings(_))
        ));
    }

    #[test]
    fn test_truncation_only_below_limit_depth() {
        let tree = json!({
            "Section": {
                "List": [1, 2, 3, 4, 5, 6, 7],
                "Short": [1, 2],
                "Map": {"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6}
            },
            "Top": {"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6}
        });

        let cut = truncate(&tree, 5, 2, 0);

        assert_eq!(cut["Section"]["List"], json!([1, 2, 3, 4, "..."]));
        assert_eq!(cut["Section"]["Short"], json!([1, 2]));
        let map = cut["Section"]["Map"].as_object().unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("..."), Some(&json!("...")));
        assert!(map.get("e").is_none());

        // Depth 1 is above the limit and stays whole
        assert_eq!(cut["Top"].as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_truncation_exactly_max_entries_untouched() {
        let tree = json!({"S": {"L": [1, 2, 3, 4, 5]}});
        assert_eq!(truncate(&tree, 5, 2, 0), tree);
    }

    #[test]
    fn test_config_digest() {
        let report = MigrationReport::default().with_config_digest(b"abc");
        assert_eq!(
            report.run.config_digest.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_finalize_aggregates() {
        let mut r = Registries::new();
        let quasi = r.bands.insert(Band::new(None, "Quasi", 0));
        let sk = r.bands.insert(Band::new(None, "Sleater-Kinney", 0));
        let lonely = r.bands.insert(Band::new(None, "Lonely", 0));

        for (band, name) in [(quasi, "Janet Weiss"), (sk, "Janet Weiss"), (quasi, "Sam Coomes")] {
            let (person, _) = r.people.get_or_insert_with(name, || Person::new(name));
            let band_name = r.bands[band].name.clone();
            r.people[person].add_band(&band_name);
            r.bands.add_person(band, name);
        }

        let (usa, _) = r.ensure_country("USA", true);
        let (oregon, _) = r.ensure_state("Oregon", Some(usa), true);
        let (portland, _) = r.ensure_city("Portland", Some(oregon), true);
        let (olympia, _) = r.ensure_city("Olympia", None, false);
        r.link_band_city(quasi, portland);
        r.link_band_city(sk, portland);
        r.link_band_city(sk, olympia);

        let (site, _) = r
            .websites
            .get_or_insert_with("http://kill-rock-stars.com", || {
                Website::new("http://kill-rock-stars.com")
            });
        r.websites[site].add_band(quasi);
        r.websites[site].add_band(sk);

        let mut report = MigrationReport::default();
        report.cities.record_unresolved("Lonely", "Nowhere", "");
        report.cities.record_unresolved("Lonely", "Nowhere", "");

        let connections = ConnectionSet::new();
        let f = report.finalize(&r, &connections).unwrap();

        assert_eq!(f.get("Bands", "No Members"), Some(&json!(["Lonely"])));
        assert_eq!(f.get("Bands", "No City"), Some(&json!(["Lonely"])));
        assert_eq!(f.get("Bands", "Multiple Cities Count"), Some(&json!(1)));
        assert_eq!(f.get("Bands", "Average Members Per Band"), Some(&json!(1.0)));
        assert_eq!(
            f.get("Bands", "Only Counting Bands With Members"),
            Some(&json!(1.5))
        );
        assert_eq!(
            f.get("People", "In Multiple Bands"),
            Some(&json!({"Janet Weiss": 2}))
        );
        assert_eq!(
            f.get("People", "How Many Bands Are People In"),
            Some(&json!({"1 Bands": "1 People", "2 Bands": "1 People"}))
        );
        assert_eq!(f.get("People", "Average Bands Per Person"), Some(&json!(1.5)));
        assert_eq!(
            f.get("Cities", "Band Count"),
            Some(&json!({"Portland, Oregon, USA": 2, "Olympia": 1}))
        );
        assert_eq!(f.get("Cities", "No State"), Some(&json!(["Olympia"])));
        assert_eq!(
            f.get("Cities", NOT_IN_LOOKUP),
            Some(&json!({"Band: 'Lonely', City: 'Nowhere', State: ''": "2 Times"}))
        );
        assert_eq!(
            f.get("Websites", "Websites With Multiple Bands"),
            Some(&json!({"http://kill-rock-stars.com (2 Bands)": ["Quasi", "Sleater-Kinney"]}))
        );
        assert!(f.get("Run", "Run Id").is_some());

        // Running counters are untouched
        assert_eq!(report.cities.unresolved.get("Band: 'Lonely', City: 'Nowhere', State: ''"), 2);
        assert_eq!(report.finalize(&r, &connections).unwrap().get("Bands", "No City"), f.get("Bands", "No City"));
    }

    #[test]
    fn test_averages_with_no_entities() {
        let f = MigrationReport::default()
            .finalize(&Registries::new(), &ConnectionSet::new())
            .unwrap();
        assert_eq!(f.get("Bands", "Average Members Per Band"), Some(&json!(0.0)));
        assert_eq!(f.get("People", "Average Bands Per Person"), Some(&json!(0.0)));
    }
}
