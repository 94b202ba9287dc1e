// 📍 Location Entities - City → State → Country
//
// `canonical` marks locations that came from the gazetteer. Only those are
// written to the destination store; everything else is kept for linking and
// the audit report.

use super::{BandRef, CityRef, CountryRef, Named, StateRef};
use crate::normalize::{normalize_city, normalize_country, normalize_state};
use serde::Serialize;

// ============================================================================
// CITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct City {
    pub dest_id: Option<i64>,
    pub name: String,

    /// None for an orphan city awaiting a state
    pub state: Option<StateRef>,

    pub bands: Vec<BandRef>,
    pub canonical: bool,

    /// Set once an orphan has been folded into a state-qualified city
    pub merged_into: Option<CityRef>,
}

impl City {
    pub fn new(name: &str, state: Option<StateRef>, canonical: bool) -> Self {
        City {
            dest_id: None,
            name: normalize_city(name),
            state,
            bands: Vec::new(),
            canonical,
            merged_into: None,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.state.is_none()
    }
}

impl Named for City {
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
// STATE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub dest_id: Option<i64>,
    pub name: String,
    pub country: Option<CountryRef>,
    pub cities: Vec<CityRef>,
    pub canonical: bool,
}

impl State {
    pub fn new(name: &str, country: Option<CountryRef>, canonical: bool) -> Self {
        State {
            dest_id: None,
            name: normalize_state(name),
            country,
            cities: Vec::new(),
            canonical,
        }
    }
}

impl Named for State {
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
// COUNTRY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Country {
    pub dest_id: Option<i64>,
    pub name: String,
    pub states: Vec<StateRef>,
    pub canonical: bool,
}

impl Country {
    pub fn new(name: &str, canonical: bool) -> Self {
        Country {
            dest_id: None,
            name: normalize_country(name),
            states: Vec::new(),
            canonical,
        }
    }
}

impl Named for Country {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_names_normalized() {
        assert_eq!(City::new("st. louis ,", None, false).name, "St. Louis");
        assert_eq!(State::new("wa", None, false).name, "WA");
        assert_eq!(Country::new(" USA.", true).name, "USA");
    }

    #[test]
    fn test_orphan_city() {
        let orphan = City::new("Paris", None, false);
        let placed = City::new("Paris", Some(StateRef::new(0)), true);

        assert!(orphan.is_orphan());
        assert!(!placed.is_orphan());
        assert!(orphan.merged_into.is_none());
    }
}
