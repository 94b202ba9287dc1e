// 🗺️ Gazetteer - static country → state → city → alias reference table
//
// Built once from configuration and never mutated afterwards. Spelling
// variants declared as aliases all collapse onto one canonical city.
//
// Bare names that exist in several places ("Springfield") are resolved to
// the candidate with the most associations so far in the current run, which
// the gazetteer reads through `LinkCounts` rather than storing itself.

use crate::entities::NameMatrix;
use crate::error::ConfigError;
use crate::normalize::{normalize_city, normalize_country, normalize_state};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// How many associations each location has picked up during the run
pub trait LinkCounts {
    /// Bands linked to the city (name, state name)
    fn city_band_count(&self, city: &str, state: &str) -> usize;

    /// Cities placed under the state (name, country name) that the lookup
    /// table does not declare
    fn state_city_count(&self, state: &str, country: &str) -> usize;
}

// ============================================================================
// REFERENCE LOCATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GazetteerCountry {
    pub name: String,
    pub states: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GazetteerState {
    pub name: String,
    pub country: String,
    pub cities: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GazetteerCity {
    pub name: String,
    pub state: String,
    pub country: String,
    pub aliases: Vec<String>,
}

impl GazetteerCity {
    pub fn fullname(&self) -> String {
        format!("{}, {}, {}", self.name, self.state, self.country)
    }
}

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

// ============================================================================
// GAZETTEER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    countries: Vec<GazetteerCountry>,
    states: Vec<GazetteerState>,
    cities: Vec<GazetteerCity>,
    country_index: HashMap<String, usize>,

    /// (lower state, lower country) → state
    state_aliases: NameMatrix<usize>,

    /// (lower city or alias, lower state) → city
    city_aliases: NameMatrix<usize>,
}

impl Gazetteer {
    pub fn builder() -> GazetteerBuilder {
        GazetteerBuilder::default()
    }

    /// Build from the `countries_table` section of the data-formats file.
    ///
    /// Shape: `{country: {state: {city: [alias, ...] | null} | null}}`.
    pub fn from_table(table: &Value) -> Result<Self, ConfigError> {
        let countries = table
            .as_object()
            .ok_or_else(|| malformed("countries_table", "expected an object of countries"))?;
        if countries.is_empty() {
            return Err(malformed("countries_table", "no countries declared"));
        }

        let mut builder = Gazetteer::builder();

        for (country, states) in countries {
            builder = builder.country(country);
            let states = match states {
                Value::Null => continue,
                Value::Object(states) => states,
                _ => {
                    return Err(malformed(
                        &format!("countries_table.{}", country),
                        "expected an object of states or null",
                    ))
                }
            };

            for (state, cities) in states {
                builder = builder.state(country, state);
                let cities = match cities {
                    Value::Null => continue,
                    Value::Object(cities) => cities,
                    _ => {
                        return Err(malformed(
                            &format!("countries_table.{}.{}", country, state),
                            "expected an object of cities or null",
                        ))
                    }
                };

                for (city, aliases) in cities {
                    let path = format!("countries_table.{}.{}.{}", country, state, city);
                    let aliases = parse_aliases(aliases, &path)?;
                    let aliases: Vec<&str> = aliases.iter().map(String::as_str).collect();
                    builder = builder.city(country, state, city, &aliases);
                }
            }
        }

        let gazetteer = builder.build();
        debug!(
            countries = gazetteer.countries.len(),
            states = gazetteer.states.len(),
            cities = gazetteer.cities.len(),
            "gazetteer built"
        );
        Ok(gazetteer)
    }

    /// Exact match on (city or alias, state).
    ///
    /// With an empty state, every state holding a city of that name is a
    /// candidate and the one with the most linked bands wins; ties go to the
    /// first declared. With a non-empty state there is no fuzzy fallback.
    pub fn best_city_match<C: LinkCounts + ?Sized>(
        &self,
        city: &str,
        state: &str,
        counts: &C,
    ) -> Option<&GazetteerCity> {
        let city_key = key(city);
        let state_key = key(state);
        if city_key.is_empty() {
            return None;
        }

        if let Some(&i) = self.city_aliases.get(&city_key, &state_key) {
            return Some(&self.cities[i]);
        }
        if !state_key.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        for (_, &i) in self.city_aliases.get_all(&city_key) {
            let c = &self.cities[i];
            let linked = counts.city_band_count(&c.name, &c.state);
            match best {
                Some((_, top)) if linked <= top => {}
                _ => best = Some((i, linked)),
            }
        }
        best.map(|(i, _)| &self.cities[i])
    }

    /// All states sharing the name, across countries; most cities wins.
    ///
    /// A state's cities are its declared ones plus any the run has added.
    pub fn best_state_match<C: LinkCounts + ?Sized>(
        &self,
        state: &str,
        counts: &C,
    ) -> Option<&GazetteerState> {
        let state_key = key(state);
        if state_key.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        for (_, &i) in self.state_aliases.get_all(&state_key) {
            let s = &self.states[i];
            let linked = s.cities.len() + counts.state_city_count(&s.name, &s.country);
            match best {
                Some((_, top)) if linked <= top => {}
                _ => best = Some((i, linked)),
            }
        }
        best.map(|(i, _)| &self.states[i])
    }

    pub fn country(&self, name: &str) -> Option<&GazetteerCountry> {
        self.country_index.get(&key(name)).map(|&i| &self.countries[i])
    }

    pub fn countries(&self) -> &[GazetteerCountry] {
        &self.countries
    }

    pub fn states(&self) -> &[GazetteerState] {
        &self.states
    }

    pub fn cities(&self) -> &[GazetteerCity] {
        &self.cities
    }
}

fn malformed(path: &str, reason: &str) -> ConfigError {
    ConfigError::MalformedGazetteer {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_aliases(value: &Value, path: &str) -> Result<Vec<String>, ConfigError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed(path, "aliases must be strings"))
            })
            .collect(),
        _ => Err(malformed(path, "expected a list of aliases or null")),
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Declares reference locations in order. The first declaration of a
/// country, state, city or alias wins; repeats only add new aliases.
#[derive(Debug, Default)]
pub struct GazetteerBuilder {
    gazetteer: Gazetteer,
}

impl GazetteerBuilder {
    pub fn country(mut self, name: &str) -> Self {
        self.ensure_country(name);
        self
    }

    pub fn state(mut self, country: &str, state: &str) -> Self {
        self.ensure_state(country, state);
        self
    }

    pub fn city(mut self, country: &str, state: &str, city: &str, aliases: &[&str]) -> Self {
        let s = self.ensure_state(country, state);
        let g = &mut self.gazetteer;

        let name = normalize_city(city);
        let state_name = g.states[s].name.clone();
        let state_key = key(&state_name);

        let c = match g.city_aliases.get(&key(&name), &state_key) {
            Some(&existing) => existing,
            None => {
                g.cities.push(GazetteerCity {
                    name: name.clone(),
                    state: state_name,
                    country: g.states[s].country.clone(),
                    aliases: Vec::new(),
                });
                let c = g.cities.len() - 1;
                g.states[s].cities.push(c);
                g.city_aliases.insert(&key(&name), &state_key, c);
                c
            }
        };

        for alias in aliases {
            let alias_key = key(alias);
            if alias_key.is_empty() || g.city_aliases.contains(&alias_key, &state_key) {
                continue;
            }
            g.city_aliases.insert(&alias_key, &state_key, c);
            g.cities[c].aliases.push(alias.trim().to_string());
        }
        self
    }

    pub fn build(self) -> Gazetteer {
        self.gazetteer
    }

    fn ensure_country(&mut self, name: &str) -> usize {
        let g = &mut self.gazetteer;
        let name = normalize_country(name);
        if let Some(&i) = g.country_index.get(&key(&name)) {
            return i;
        }
        g.countries.push(GazetteerCountry {
            name: name.clone(),
            states: Vec::new(),
        });
        let i = g.countries.len() - 1;
        g.country_index.insert(key(&name), i);
        i
    }

    fn ensure_state(&mut self, country: &str, state: &str) -> usize {
        let c = self.ensure_country(country);
        let g = &mut self.gazetteer;

        let name = normalize_state(state);
        let country_name = g.countries[c].name.clone();
        if let Some(&i) = g.state_aliases.get(&key(&name), &key(&country_name)) {
            return i;
        }

        g.states.push(GazetteerState {
            name: name.clone(),
            country: country_name.clone(),
            cities: Vec::new(),
        });
        let i = g.states.len() - 1;
        g.countries[c].states.push(i);
        g.state_aliases.insert(&key(&name), &key(&country_name), i);
        i
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Band, Registries};
    use serde_json::json;

    /// Fixed association counts keyed by lower-cased (name, parent)
    #[derive(Default)]
    struct StubCounts {
        cities: HashMap<(String, String), usize>,
        states: HashMap<(String, String), usize>,
    }

    impl LinkCounts for StubCounts {
        fn city_band_count(&self, city: &str, state: &str) -> usize {
            *self.cities.get(&(key(city), key(state))).unwrap_or(&0)
        }

        fn state_city_count(&self, state: &str, country: &str) -> usize {
            *self.states.get(&(key(state), key(country))).unwrap_or(&0)
        }
    }

    fn springfields() -> Gazetteer {
        Gazetteer::builder()
            .city("USA", "Illinois", "Springfield", &[])
            .city("USA", "Missouri", "Springfield", &["Sgf"])
            .city("USA", "Oregon", "Portland", &["PDX", "Stumptown"])
            .city("USA", "Maine", "Portland", &[])
            .state("Australia", "Victoria")
            .state("Canada", "Victoria")
            .build()
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let g = springfields();
        let counts = StubCounts::default();

        let c = g.best_city_match("  springfield ", "MISSOURI", &counts).unwrap();
        assert_eq!(c.name, "Springfield");
        assert_eq!(c.state, "Missouri");
        assert_eq!(c.country, "USA");
    }

    #[test]
    fn test_alias_resolves_to_canonical_city() {
        let g = springfields();
        let counts = StubCounts::default();

        let c = g.best_city_match("stumptown", "oregon", &counts).unwrap();
        assert_eq!(c.fullname(), "Portland, Oregon, USA");

        let c = g.best_city_match("pdx", "", &counts).unwrap();
        assert_eq!(c.name, "Portland");
        assert_eq!(c.state, "Oregon");
    }

    #[test]
    fn test_no_fuzzy_fallback_when_state_given() {
        let g = springfields();
        let counts = StubCounts::default();

        assert!(g.best_city_match("Springfield", "Oregon", &counts).is_none());
        assert!(g.best_city_match("Qqzxnotreal", "", &counts).is_none());
        assert!(g.best_city_match("", "", &counts).is_none());
    }

    #[test]
    fn test_bare_city_ties_go_to_first_declared() {
        let g = springfields();
        let counts = StubCounts::default();

        let c = g.best_city_match("springfield", "", &counts).unwrap();
        assert_eq!(c.state, "Illinois");
    }

    #[test]
    fn test_bare_city_prefers_most_linked_bands() {
        let g = springfields();
        let mut counts = StubCounts::default();
        counts.cities.insert(("springfield".into(), "illinois".into()), 1);
        counts.cities.insert(("springfield".into(), "missouri".into()), 2);

        let c = g.best_city_match("springfield", "", &counts).unwrap();
        assert_eq!(c.state, "Missouri");
    }

    #[test]
    fn test_bare_city_counts_from_registries() {
        let g = springfields();
        let mut r = Registries::new();
        let (usa, _) = r.ensure_country("USA", true);
        let (mo, _) = r.ensure_state("Missouri", Some(usa), true);
        let (il, _) = r.ensure_state("Illinois", Some(usa), true);
        let (mo_city, _) = r.ensure_city("Springfield", Some(mo), true);
        let (il_city, _) = r.ensure_city("Springfield", Some(il), true);

        let a = r.bands.insert(Band::new(None, "A", 0));
        let b = r.bands.insert(Band::new(None, "B", 0));
        r.link_band_city(a, il_city);
        r.link_band_city(a, mo_city);
        r.link_band_city(b, mo_city);

        let c = g.best_city_match("Springfield", "", &r).unwrap();
        assert_eq!(c.state, "Missouri");
    }

    #[test]
    fn test_best_state_match() {
        let g = springfields();
        let mut counts = StubCounts::default();

        let s = g.best_state_match("victoria", &counts).unwrap();
        assert_eq!(s.country, "Australia");

        counts.states.insert(("victoria".into(), "canada".into()), 3);
        let s = g.best_state_match("Victoria", &counts).unwrap();
        assert_eq!(s.country, "Canada");

        assert!(g.best_state_match("Atlantis", &counts).is_none());
    }

    #[test]
    fn test_declared_dashed_city_keeps_its_case() {
        let g = Gazetteer::builder()
            .city("USA", "North Carolina", "Winston-Salem", &[])
            .build();
        let c = g.best_city_match("winston-salem", "", &StubCounts::default()).unwrap();
        assert_eq!(c.name, "Winston-Salem");
    }

    #[test]
    fn test_best_state_match_counts_declared_cities() {
        let g = Gazetteer::builder()
            .state("Georgia", "Georgia")
            .city("USA", "Georgia", "Atlanta", &[])
            .city("USA", "Georgia", "Savannah", &[])
            .build();

        let s = g.best_state_match("georgia", &Registries::new()).unwrap();
        assert_eq!(s.country, "USA");

        // Cities the run adds outside the lookup table count too
        let mut counts = StubCounts::default();
        counts.states.insert(("georgia".into(), "georgia".into()), 3);
        let s = g.best_state_match("georgia", &counts).unwrap();
        assert_eq!(s.country, "Georgia");
    }

    #[test]
    fn test_from_table_keeps_declared_order() {
        let table = json!({
            "USA": {
                "Oregon": { "Portland": ["PDX"], "Eugene": null },
                "Washington": null
            },
            "UK": { "England": { "London": null } },
            "Iceland": null
        });

        let g = Gazetteer::from_table(&table).unwrap();
        let names: Vec<&str> = g.countries().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["USA", "UK", "Iceland"]);
        assert_eq!(g.states().len(), 3);
        assert_eq!(g.cities().len(), 3);
        assert_eq!(g.cities()[0].aliases, vec!["PDX"]);
        assert!(g.country("uk").is_some());
    }

    #[test]
    fn test_from_table_rejects_bad_shapes() {
        assert!(matches!(
            Gazetteer::from_table(&json!([])),
            Err(ConfigError::MalformedGazetteer { .. })
        ));
        assert!(Gazetteer::from_table(&json!({})).is_err());
        assert!(Gazetteer::from_table(&json!({"USA": ["Oregon"]})).is_err());
        assert!(Gazetteer::from_table(&json!({"USA": {"Oregon": 3}})).is_err());

        let err = Gazetteer::from_table(&json!({"USA": {"Oregon": {"Portland": [1]}}}))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MalformedGazetteer {
                path: "countries_table.USA.Oregon.Portland".to_string(),
                reason: "aliases must be strings".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_declarations_first_wins() {
        let g = Gazetteer::builder()
            .city("USA", "Oregon", "Portland", &["PDX"])
            .city("usa", "oregon", "portland", &["Rose City", "pdx"])
            .build();

        assert_eq!(g.countries().len(), 1);
        assert_eq!(g.states().len(), 1);
        assert_eq!(g.cities().len(), 1);
        assert_eq!(g.cities()[0].aliases, vec!["PDX", "Rose City"]);
    }
}
