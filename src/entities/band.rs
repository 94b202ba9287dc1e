// 🎸 Band Entity - the hub every other entity links to
//
// A band is keyed by its legacy id when it has one, otherwise by its
// normalized name. Name duplicates are folded into the first band seen.

use super::{BandRef, CityRef, Named, NamedRegistry};
use crate::normalize::normalize_band;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::{Deref, Index, IndexMut};

// ============================================================================
// BAND ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Band {
    /// Id from the legacy `bands` table (pending bands have none)
    pub legacy_id: Option<String>,

    /// Id assigned by the destination store
    pub dest_id: Option<i64>,

    /// Canonical name
    pub name: String,

    pub click_count: i64,

    /// Distinct stored connections touching this band
    pub connection_count: usize,

    /// Member names, deduplicated case-insensitively
    pub people: Vec<String>,

    pub cities: Vec<CityRef>,
}

impl Band {
    pub fn new(legacy_id: Option<String>, name: &str, click_count: i64) -> Self {
        Band {
            legacy_id,
            dest_id: None,
            name: normalize_band(name),
            click_count,
            connection_count: 0,
            people: Vec::new(),
            cities: Vec::new(),
        }
    }

    pub fn has_person(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.people.iter().any(|p| p.to_lowercase() == lower)
    }
}

impl Named for Band {
    fn name(&self) -> &str {
        &self.name
    }

    fn dest_id(&self) -> Option<i64> {
        self.dest_id
    }

    fn set_dest_id(&mut self, id: i64) {
        self.dest_id = Some(id);
    }
}

// ============================================================================
// BAND REGISTRY
// ============================================================================

/// Name registry plus a legacy id index for connection resolution
#[derive(Debug, Clone, Default)]
pub struct BandRegistry {
    inner: NamedRegistry<Band>,
    by_legacy_id: HashMap<String, BandRef>,
}

impl BandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite by name, indexing the legacy id if present
    pub fn insert(&mut self, band: Band) -> BandRef {
        let legacy_id = band.legacy_id.clone();
        let handle = self.inner.set(band);
        if let Some(id) = legacy_id {
            self.by_legacy_id.insert(id, handle);
        }
        handle
    }

    /// Legacy id first, then case-insensitive name
    pub fn find(&self, legacy_id: Option<&str>, name: &str) -> Option<BandRef> {
        legacy_id
            .and_then(|id| self.by_legacy_id.get(id).copied())
            .or_else(|| self.inner.get(name))
    }

    pub fn by_legacy_id(&self, id: &str) -> Option<BandRef> {
        self.by_legacy_id.get(id).copied()
    }

    /// Make a duplicate record's legacy id resolve to the surviving band
    pub fn alias_legacy_id(&mut self, id: &str, band: BandRef) {
        self.by_legacy_id.entry(id.to_string()).or_insert(band);
    }

    pub fn add_person(&mut self, band: BandRef, person: &str) -> bool {
        let band = &mut self.inner[band];
        if band.has_person(person) {
            return false;
        }
        band.people.push(person.to_string());
        true
    }

    pub fn add_city(&mut self, band: BandRef, city: CityRef) -> bool {
        let cities = &mut self.inner[band].cities;
        if cities.contains(&city) {
            return false;
        }
        cities.push(city);
        true
    }

    /// Swap `from` for `to` in the band's city list without duplicating `to`
    pub fn replace_city(&mut self, band: BandRef, from: CityRef, to: CityRef) {
        let cities = &mut self.inner[band].cities;
        let had_target = cities.contains(&to);
        if had_target {
            cities.retain(|&c| c != from);
        } else {
            for c in cities.iter_mut() {
                if *c == from {
                    *c = to;
                }
            }
        }
    }

    pub fn bump_connection_count(&mut self, band: BandRef) {
        self.inner[band].connection_count += 1;
    }

    pub fn set_connection_count(&mut self, band: BandRef, count: usize) {
        self.inner[band].connection_count = count;
    }

    pub fn bind_dest_id(&mut self, band: BandRef, id: i64) {
        self.inner.bind_dest_id(band, id);
    }
}

impl Deref for BandRegistry {
    type Target = NamedRegistry<Band>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Index<BandRef> for BandRegistry {
    type Output = Band;

    fn index(&self, band: BandRef) -> &Band {
        &self.inner[band]
    }
}

impl IndexMut<BandRef> for BandRegistry {
    fn index_mut(&mut self, band: BandRef) -> &mut Band {
        &mut self.inner[band]
    }
}

// ============================================================================
// TESTS
// ============================================================================
