// 🧭 City/State Resolver - turns free-text location fields into linked entities
//
// One call handles one record's (city, state) text for one band. Delimited
// city text can yield several candidates; each is looked up in the
// gazetteer, falls back through the special cases, then gets materialized
// and linked. Every outcome is tallied in the report.

use crate::entities::{BandRef, CityRef, CountryRef, Registries, StateRef};
use crate::gazetteer::{Gazetteer, GazetteerCity, GazetteerState};
use crate::normalize::{normalize_city, normalize_state};
use crate::report::MigrationReport;
use tracing::{debug, trace};

/// Splits that may separate several places in one city field
const CANDIDATE_DELIMITERS: [&str; 6] = [",", "/", "\\", "&", " and ", " or "];

/// Wider set tried when a candidate has no direct match
const RETRY_DELIMITERS: [&str; 9] = [",", "/", "\\", "&", " and ", " or ", "+", " now ", " was "];

/// One resolved association for a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub city: Option<CityRef>,
    pub state: Option<StateRef>,
    pub country: Option<CountryRef>,
}

pub struct CityStateResolver<'a> {
    gazetteer: &'a Gazetteer,
}

impl<'a> CityStateResolver<'a> {
    pub fn new(gazetteer: &'a Gazetteer) -> Self {
        CityStateResolver { gazetteer }
    }

    /// Resolve one record's location text and link the results to `band`
    pub fn resolve(
        &self,
        registries: &mut Registries,
        report: &mut MigrationReport,
        band: BandRef,
        raw_city: &str,
        raw_state: &str,
    ) -> Vec<Placement> {
        let city = read_city(report, raw_city);
        let state = read_state(report, raw_state);

        let candidates = self.candidates(registries, raw_city, city, state);
        trace!(band = %registries.bands[band].name, ?candidates, "location candidates");

        candidates
            .iter()
            .filter_map(|(city, state)| {
                self.resolve_candidate(registries, report, band, raw_city, city, state)
            })
            .collect()
    }

    /// The unsplit pair first, then one pair per delimited part that matched
    fn candidates(
        &self,
        registries: &Registries,
        raw_city: &str,
        city: String,
        state: String,
    ) -> Vec<(String, String)> {
        let mut candidates = vec![(city, state)];

        for delimiter in CANDIDATE_DELIMITERS {
            if !raw_city.contains(delimiter) {
                continue;
            }
            for part in raw_city.split(delimiter) {
                let found = match self.gazetteer.best_city_match(part, "", registries) {
                    Some(c) => Some((c.name.clone(), c.state.clone())),
                    None => self
                        .gazetteer
                        .best_state_match(part, registries)
                        .map(|s| (String::new(), s.name.clone())),
                };
                if let Some(pair) = found {
                    if !candidates.contains(&pair) {
                        candidates.push(pair);
                    }
                }
            }
        }
        candidates
    }

    fn resolve_candidate(
        &self,
        registries: &mut Registries,
        report: &mut MigrationReport,
        band: BandRef,
        raw_city: &str,
        city_text: &str,
        state_text: &str,
    ) -> Option<Placement> {
        if city_text.is_empty() && state_text.is_empty() {
            return None;
        }

        let band_name = registries.bands[band].name.clone();
        let mut city_name = city_text.to_string();
        let mut state_name = state_text.to_string();
        let mut country_name: Option<String> = None;
        let mut state_resolved = false;

        // Direct lookup, then the split retry
        let mut matched = self
            .gazetteer
            .best_city_match(&city_name, &state_name, &*registries);
        let mut split_state = None;
        if matched.is_none() && !city_name.is_empty() {
            let (city, state) = self.split_retry(registries, raw_city);
            matched = city;
            split_state = state;
        }
        if let Some(c) = matched {
            if already_linked(registries, band, c) {
                return None;
            }
        }

        match (matched, split_state) {
            (Some(c), _) => {
                if state_name.is_empty() {
                    report.cities.record_assigned(&city_name, &c.fullname());
                }
                city_name = c.name.clone();
                state_name = c.state.clone();
                country_name = Some(c.country.clone());
                state_resolved = true;
            }
            (None, split_state) => {
                if !city_name.is_empty() {
                    report
                        .cities
                        .record_unresolved(&band_name, &city_name, &state_name);
                }
                if let Some(s) = split_state.filter(|_| state_name.is_empty()) {
                    state_name = s.name.clone();
                    country_name = Some(s.country.clone());
                    state_resolved = true;
                }
            }
        }

        if !state_resolved {
            if city_name.eq_ignore_ascii_case("england") {
                city_name.clear();
                state_name = "England".to_string();
            }
            if city_name.eq_ignore_ascii_case("uk") && state_name.is_empty() {
                city_name.clear();
                state_name = "UK".to_string();
            }

            if state_name.eq_ignore_ascii_case("uk") {
                state_name.clear();
                country_name = Some("UK".to_string());
            } else if !state_name.is_empty() {
                match self.gazetteer.best_state_match(&state_name, &*registries) {
                    Some(s) => {
                        state_name = s.name.clone();
                        country_name = Some(s.country.clone());
                        state_resolved = true;
                    }
                    None => {
                        report.states.record_unresolved(&band_name, &state_name);
                        state_name.clear();
                    }
                }
            }
        }

        let country = country_name.map(|name| self.register_country(registries, report, &name));

        let state = if state_resolved {
            let (state, created) = registries.ensure_state(&state_name, country, true);
            if created {
                report.states.unique += 1;
            }
            Some(state)
        } else {
            None
        };

        let city = if city_name.is_empty() {
            None
        } else if matched.is_some() {
            Some(registries.ensure_city(&city_name, state, true))
        } else if state.is_some() {
            // Unknown city in a known state: kept for linking, never written
            Some(registries.ensure_city(&city_name, state, false))
        } else if state_text.is_empty() {
            // Orphan, waiting for a record that names its state
            Some(registries.ensure_city(&city_name, None, false))
        } else {
            None
        };

        let city = city.map(|(city, created)| {
            if created {
                report.cities.unique += 1;
            }
            registries.link_band_city(band, city);
            if state.is_some() {
                self.absorb_orphan(registries, report, city);
            }
            city
        });

        if city.is_none() && state.is_none() && country.is_none() {
            return None;
        }
        Some(Placement {
            city,
            state,
            country,
        })
    }

    /// Retry on the wider delimiter set. A city in any piece wins outright;
    /// otherwise the first state seen is offered as a fallback.
    fn split_retry(
        &self,
        registries: &Registries,
        raw_city: &str,
    ) -> (Option<&'a GazetteerCity>, Option<&'a GazetteerState>) {
        let gazetteer = self.gazetteer;
        let mut state = None;

        for delimiter in RETRY_DELIMITERS {
            if !raw_city.contains(delimiter) {
                continue;
            }
            for piece in raw_city.split(delimiter) {
                if let Some(city) = gazetteer.best_city_match(piece, "", registries) {
                    return (Some(city), state);
                }
                if state.is_none() {
                    state = gazetteer.best_state_match(piece, registries);
                }
            }
        }
        (None, state)
    }

    /// Canonical when the gazetteer declares it, synthesized otherwise
    fn register_country(
        &self,
        registries: &mut Registries,
        report: &mut MigrationReport,
        name: &str,
    ) -> CountryRef {
        match self.gazetteer.country(name) {
            Some(declared) => {
                let (country, _) = registries.ensure_country(&declared.name, true);
                if report.countries.record_inferred(&declared.name) {
                    debug!(country = %declared.name, "country inferred from lookup table");
                }
                country
            }
            None => {
                let (country, _) = registries.ensure_country(name, false);
                report.countries.record_synthesized(name);
                country
            }
        }
    }

    fn absorb_orphan(&self, registries: &mut Registries, report: &mut MigrationReport, city: CityRef) {
        if let Some(moved) = registries.merge_orphan_city(city) {
            let name = registries.cities[city].name.clone();
            let fullname = registries.city_fullname(city);
            debug!(city = %fullname, bands = moved, "merged orphan city");
            report.cities.record_orphan_merge(&name, &fullname, moved);
        }
    }
}

fn read_city(report: &mut MigrationReport, raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    report.cities.total_read += 1;
    let city = normalize_city(raw);
    if city != raw {
        report.cities.record_normalized(raw, &city);
    }
    city
}

fn read_state(report: &mut MigrationReport, raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    report.states.total_read += 1;
    let state = normalize_state(raw);
    if state != raw {
        report.states.record_normalized(raw, &state);
    }
    state
}

fn already_linked(registries: &Registries, band: BandRef, city: &GazetteerCity) -> bool {
    registries
        .cities
        .get(&city.name, &city.state)
        .map_or(false, |c| registries.band_has_city(band, c))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Band;

    fn gazetteer() -> Gazetteer {
        Gazetteer::builder()
            .city("USA", "Oregon", "Portland", &["PDX"])
            .city("USA", "Oregon", "Eugene", &[])
            .city("USA", "Washington", "Olympia", &[])
            .city("USA", "Illinois", "Springfield", &[])
            .city("USA", "Missouri", "Springfield", &[])
            .city("UK", "England", "London", &[])
            .state("France", "France")
            .build()
    }

    struct Fixture {
        registries: Registries,
        report: MigrationReport,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                registries: Registries::new(),
                report: MigrationReport::default(),
            }
        }

        fn band(&mut self, name: &str) -> BandRef {
            self.registries.bands.insert(Band::new(None, name, 0))
        }

        fn resolve(&mut self, g: &Gazetteer, band: BandRef, city: &str, state: &str) -> Vec<Placement> {
            CityStateResolver::new(g).resolve(&mut self.registries, &mut self.report, band, city, state)
        }
    }

    #[test]
    fn test_exact_match_links_every_level() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Wipers");

        let placements = f.resolve(&g, band, "portland", "oregon");
        assert_eq!(placements.len(), 1);

        let p = placements[0];
        let city = p.city.unwrap();
        let state = p.state.unwrap();
        let country = p.country.unwrap();
        let r = &f.registries;

        assert_eq!(r.city_fullname(city), "Portland, Oregon, USA");
        assert!(r.cities[city].canonical);
        assert_eq!(r.cities[city].state, Some(state));
        assert_eq!(r.states[state].cities, vec![city]);
        assert_eq!(r.states[state].country, Some(country));
        assert_eq!(r.countries[country].states, vec![state]);
        assert_eq!(r.bands[band].cities, vec![city]);
        assert_eq!(r.cities[city].bands, vec![band]);

        assert_eq!(f.report.cities.normalized.get("'portland' => 'Portland'"), 1);
        assert_eq!(f.report.countries.inferred, vec!["USA"]);
        assert_eq!(f.report.cities.unique, 1);
        assert_eq!(f.report.states.unique, 1);
    }

    #[test]
    fn test_bare_alias_assigned_through_lookup() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Dead Moon");

        let p = f.resolve(&g, band, "PDX", "");
        assert_eq!(f.registries.city_fullname(p[0].city.unwrap()), "Portland, Oregon, USA");
        assert_eq!(f.report.cities.assigned_count, 1);
        assert_eq!(f.report.cities.assigned.get("Pdx => Portland, Oregon, USA"), 1);
        assert_eq!(f.report.cities.normalized.get("'PDX' => 'Pdx'"), 1);
        assert_eq!(f.report.cities.unresolved_count, 0);
    }

    #[test]
    fn test_delimited_city_links_each_place() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Quasi");

        let placements = f.resolve(&g, band, "Portland / Olympia", "");
        assert_eq!(placements.len(), 2);

        let names: Vec<String> = f.registries.bands[band]
            .cities
            .iter()
            .map(|&c| f.registries.city_fullname(c))
            .collect();
        assert_eq!(names, vec!["Portland, Oregon, USA", "Olympia, Washington, USA"]);
        assert_eq!(f.report.cities.unresolved_count, 0);
    }

    #[test]
    fn test_retry_delimiters_find_city() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Heatmiser");

        f.resolve(&g, band, "Eugene now Portland", "");

        let cities = &f.registries.bands[band].cities;
        assert_eq!(cities.len(), 1);
        assert_eq!(f.registries.city_fullname(cities[0]), "Eugene, Oregon, USA");
    }

    #[test]
    fn test_retry_state_fallback_when_state_empty() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Lost");

        f.resolve(&g, band, "Nowhereville now Oregon", "");

        let cities = &f.registries.bands[band].cities;
        assert_eq!(cities.len(), 1);
        let city = &f.registries.cities[cities[0]];
        assert!(!city.canonical);
        assert_eq!(city.state.map(|s| f.registries.states[s].name.as_str()), Some("Oregon"));
        assert_eq!(f.report.cities.unresolved_count, 1);
    }

    #[test]
    fn test_unresolvable_text_creates_no_city() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Ghosts");

        let placements = f.resolve(&g, band, "Qqzxnotreal", "Nowhereland");

        assert!(placements.is_empty());
        assert_eq!(f.report.cities.unresolved_count, 1);
        assert_eq!(
            f.report
                .cities
                .unresolved
                .get("Band: 'Ghosts', City: 'Qqzxnotreal', State: 'Nowhereland'"),
            1
        );
        assert_eq!(f.report.states.unresolved_count, 1);
        assert!(f.registries.cities.is_empty());
        assert!(f.registries.states.is_empty());
        assert!(f.registries.bands[band].cities.is_empty());
    }

    #[test]
    fn test_uk_city_becomes_country() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Wire");

        let placements = f.resolve(&g, band, "UK", "");

        assert_eq!(placements.len(), 1);
        let p = placements[0];
        assert_eq!(p.city, None);
        assert_eq!(p.state, None);
        let uk = p.country.unwrap();
        assert_eq!(f.registries.countries[uk].name, "UK");
        assert!(f.registries.countries[uk].canonical);
        assert!(f.registries.cities.is_empty());
        assert!(f.registries.states.is_empty());
    }

    #[test]
    fn test_uk_state_bypasses_state_lookup() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("The Fall");

        let placements = f.resolve(&g, band, "Leeds", "uk");

        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].state, None);
        assert_eq!(f.registries.countries[placements[0].country.unwrap()].name, "UK");
        assert_eq!(f.report.states.unresolved_count, 0);
        assert_eq!(f.report.cities.unresolved_count, 1);
        assert!(f.registries.bands[band].cities.is_empty());
    }

    #[test]
    fn test_uk_synthesized_when_not_declared() {
        let g = Gazetteer::builder().city("USA", "Oregon", "Portland", &[]).build();
        let mut f = Fixture::new();
        let band = f.band("Wire");

        let p = f.resolve(&g, band, "", "UK");

        let uk = p[0].country.unwrap();
        assert!(!f.registries.countries[uk].canonical);
        assert_eq!(f.report.countries.synthesized, vec!["UK"]);
        assert!(f.report.countries.inferred.is_empty());
    }

    #[test]
    fn test_england_city_becomes_state() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Joy Division");

        let p = f.resolve(&g, band, "England", "");

        assert_eq!(p[0].city, None);
        let state = p[0].state.unwrap();
        assert_eq!(f.registries.state_fullname(state), "England, UK");
        assert!(f.registries.cities.is_empty());
    }

    #[test]
    fn test_orphan_merged_once_state_is_known() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let first = f.band("Air");
        let second = f.band("Daft Punk");

        f.resolve(&g, first, "Paris", "");
        let orphan = f.registries.cities.get("Paris", "").unwrap();
        assert!(f.registries.cities[orphan].is_orphan());

        f.resolve(&g, second, "Paris", "France");

        let paris = f.registries.cities.get("Paris", "France").unwrap();
        assert_eq!(f.registries.cities[paris].bands, vec![second, first]);
        assert_eq!(f.registries.bands[first].cities, vec![paris]);
        assert_eq!(f.registries.bands[second].cities, vec![paris]);
        assert!(!f.registries.cities.contains("Paris", ""));
        assert_eq!(f.registries.cities.len(), 1);
        assert_eq!(f.report.cities.orphans_merged_count, 1);
    }

    #[test]
    fn test_chained_orphan_merge_moves_all_bands() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let a = f.band("A");
        let b = f.band("B");
        let c = f.band("C");

        f.resolve(&g, a, "Paris", "");
        f.resolve(&g, b, "paris", "");
        assert_eq!(f.registries.cities.len(), 1);

        f.resolve(&g, c, "Paris", "France");

        let paris = f.registries.cities.get("Paris", "France").unwrap();
        assert_eq!(f.registries.cities[paris].bands, vec![c, a, b]);
        for band in [a, b, c] {
            assert_eq!(f.registries.bands[band].cities, vec![paris]);
        }
        assert!(!f.registries.cities.contains("Paris", ""));
    }

    #[test]
    fn test_bare_city_follows_linked_bands() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let a = f.band("A");
        let b = f.band("B");

        f.resolve(&g, a, "Springfield", "Missouri");
        f.resolve(&g, b, "Springfield", "");

        let city = f.registries.bands[b].cities[0];
        assert_eq!(f.registries.city_fullname(city), "Springfield, Missouri, USA");
        assert_eq!(f.registries.cities[city].bands, vec![a, b]);
    }

    #[test]
    fn test_already_linked_city_is_skipped() {
        let g = gazetteer();
        let mut f = Fixture::new();
        let band = f.band("Wipers");

        assert_eq!(f.resolve(&g, band, "Portland", "Oregon").len(), 1);
        assert!(f.resolve(&g, band, "Portland", "Oregon").is_empty());

        assert_eq!(f.registries.bands[band].cities.len(), 1);
        assert_eq!(f.report.cities.total_read, 2);
    }
}
