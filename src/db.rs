// 💾 SQLite Destination Store
//
// Writes a finished model into the destination schema in one transaction.
// Each insert hands its row id straight back to the registry (`bind_dest_id`)
// so later link tables can refer to it. Only gazetteer locations are written.

use crate::connections::ConnectionSet;
use crate::entities::{CityRef, CountryRef, StateRef};
use crate::model::DataModel;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, Params};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// The only role assigned to band members
pub const MEMBER_ROLE: &str = "Member";

const SCHEMA: [&str; 11] = [
    "CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS countries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS states (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        country_id INTEGER REFERENCES countries(id)
    )",
    "CREATE TABLE IF NOT EXISTS cities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        state_id INTEGER REFERENCES states(id)
    )",
    "CREATE TABLE IF NOT EXISTS info_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT UNIQUE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS bands (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        legacy_id TEXT,
        click_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS band_person_roles (
        band_id INTEGER NOT NULL REFERENCES bands(id),
        person_id INTEGER NOT NULL REFERENCES people(id),
        role_id INTEGER NOT NULL REFERENCES roles(id),
        PRIMARY KEY (band_id, person_id, role_id)
    )",
    "CREATE TABLE IF NOT EXISTS band_cities (
        band_id INTEGER NOT NULL REFERENCES bands(id),
        city_id INTEGER NOT NULL REFERENCES cities(id),
        PRIMARY KEY (band_id, city_id)
    )",
    "CREATE TABLE IF NOT EXISTS connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        band_1_id INTEGER NOT NULL REFERENCES bands(id),
        band_2_id INTEGER NOT NULL REFERENCES bands(id),
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS band_info_sources (
        band_id INTEGER NOT NULL REFERENCES bands(id),
        info_source_id INTEGER NOT NULL REFERENCES info_sources(id),
        PRIMARY KEY (band_id, info_source_id)
    )",
];

/// Destination tables, dependents last
const TABLES: [&str; 11] = [
    "roles",
    "people",
    "countries",
    "states",
    "cities",
    "info_sources",
    "bands",
    "band_person_roles",
    "band_cities",
    "connections",
    "band_info_sources",
];

/// Rows written per destination table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub roles: usize,
    pub people: usize,
    pub countries: usize,
    pub states: usize,
    pub cities: usize,
    pub info_sources: usize,
    pub bands: usize,
    pub band_person_roles: usize,
    pub band_cities: usize,
    pub connections: usize,
    pub band_info_sources: usize,
}

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Recreate the destination schema empty. A run always starts from scratch,
/// so rows left by an earlier or aborted run are dropped.
pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    for table in TABLES.iter().rev() {
        conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])
            .with_context(|| format!("Failed to drop table {}", table))?;
    }
    for statement in SCHEMA {
        conn.execute(statement, [])
            .context("Failed to create destination schema")?;
    }
    Ok(())
}

fn insert<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<i64> {
    conn.execute(sql, params)?;
    Ok(conn.last_insert_rowid())
}

/// Write every finished entity and bind its destination id.
///
/// Connections are written in their final sorted order with a
/// "Shared Members" description when the two bands share anyone.
pub fn write_model(conn: &mut Connection, model: &mut DataModel) -> Result<WriteSummary> {
    model.finish();

    let tx = conn.transaction().context("Failed to start write transaction")?;
    let mut summary = WriteSummary::default();
    let registries = &mut model.registries;

    // ==========================================================================
    // Roles and people
    // ==========================================================================
    let member_role = insert(&tx, "INSERT INTO roles (name) VALUES (?1)", params![MEMBER_ROLE])?;
    summary.roles = 1;

    for person in registries.people.unbound() {
        let id = insert(
            &tx,
            "INSERT INTO people (name) VALUES (?1)",
            params![registries.people[person].name],
        )?;
        registries.people.bind_dest_id(person, id);
        summary.people += 1;
    }

    // ==========================================================================
    // Locations (gazetteer entries only)
    // ==========================================================================
    let countries: Vec<CountryRef> = registries
        .countries
        .iter()
        .filter(|(_, c)| c.canonical && c.dest_id.is_none())
        .map(|(handle, _)| handle)
        .collect();
    for country in countries {
        let id = insert(
            &tx,
            "INSERT INTO countries (name) VALUES (?1)",
            params![registries.countries[country].name],
        )?;
        registries.countries.bind_dest_id(country, id);
        summary.countries += 1;
    }

    let states: Vec<StateRef> = registries
        .states
        .iter()
        .filter(|(_, s)| s.canonical && s.dest_id.is_none())
        .map(|(handle, _)| handle)
        .collect();
    for state in states {
        let country_id = registries.states[state]
            .country
            .and_then(|c| registries.countries[c].dest_id);
        let id = insert(
            &tx,
            "INSERT INTO states (name, country_id) VALUES (?1, ?2)",
            params![registries.states[state].name, country_id],
        )?;
        registries.states.bind_dest_id(state, id);
        summary.states += 1;
    }

    let cities: Vec<CityRef> = registries
        .cities
        .iter()
        .filter(|(_, c)| c.canonical && c.dest_id.is_none())
        .map(|(handle, _)| handle)
        .collect();
    for city in cities {
        let state_id = registries.cities[city]
            .state
            .and_then(|s| registries.states[s].dest_id);
        let id = insert(
            &tx,
            "INSERT INTO cities (name, state_id) VALUES (?1, ?2)",
            params![registries.cities[city].name, state_id],
        )?;
        registries.cities.bind_dest_id(city, id);
        summary.cities += 1;
    }

    // ==========================================================================
    // Websites and bands
    // ==========================================================================
    for site in registries.websites.unbound() {
        let id = insert(
            &tx,
            "INSERT INTO info_sources (url) VALUES (?1)",
            params![registries.websites[site].url],
        )?;
        registries.websites.bind_dest_id(site, id);
        summary.info_sources += 1;
    }

    for band in registries.bands.unbound() {
        let b = &registries.bands[band];
        let id = insert(
            &tx,
            "INSERT INTO bands (name, legacy_id, click_count) VALUES (?1, ?2, ?3)",
            params![b.name, b.legacy_id, b.click_count],
        )?;
        registries.bands.bind_dest_id(band, id);
        summary.bands += 1;
    }

    // ==========================================================================
    // Link tables
    // ==========================================================================
    let registries = &model.registries;
    for (_, band) in registries.bands.iter() {
        let band_id = band.dest_id;

        for name in &band.people {
            let person_id = registries
                .people
                .get(name)
                .and_then(|p| registries.people[p].dest_id);
            tx.execute(
                "INSERT OR IGNORE INTO band_person_roles (band_id, person_id, role_id) VALUES (?1, ?2, ?3)",
                params![band_id, person_id, member_role],
            )?;
            summary.band_person_roles += 1;
        }

        for city in band.cities.iter().filter_map(|&c| registries.cities[c].dest_id) {
            tx.execute(
                "INSERT OR IGNORE INTO band_cities (band_id, city_id) VALUES (?1, ?2)",
                params![band_id, city],
            )?;
            summary.band_cities += 1;
        }
    }

    for (_, site) in registries.websites.iter() {
        for &band in &site.bands {
            tx.execute(
                "INSERT OR IGNORE INTO band_info_sources (band_id, info_source_id) VALUES (?1, ?2)",
                params![registries.bands[band].dest_id, site.dest_id],
            )?;
            summary.band_info_sources += 1;
        }
    }

    for edge in model.connections.iter() {
        let description = ConnectionSet::describe(edge.band1, edge.band2, &registries.bands);
        tx.execute(
            "INSERT INTO connections (band_1_id, band_2_id, description) VALUES (?1, ?2, ?3)",
            params![
                registries.bands[edge.band1].dest_id,
                registries.bands[edge.band2].dest_id,
                description
            ],
        )?;
        summary.connections += 1;
    }

    tx.commit().context("Failed to commit migration")?;

    info!(
        people = summary.people,
        bands = summary.bands,
        cities = summary.cities,
        connections = summary.connections,
        "records written"
    );
    Ok(summary)
}

// ============================================================================
// TESTS
// ============================================================================
