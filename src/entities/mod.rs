// Entity Models - bands, people, locations, websites
//
// Each entity has:
// - A normalized name that doubles as its dedup key (case-insensitive)
// - An optional destination id, bound after the store inserts it
// - Links to related entities through typed handles into the owning registry

pub mod band;
pub mod location;
pub mod matrix;
pub mod person;
pub mod website;

pub use band::{Band, BandRegistry};
pub use location::{City, Country, State};
pub use matrix::NameMatrix;
pub use person::Person;
pub use website::Website;

use crate::gazetteer::LinkCounts;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

// ============================================================================
// TYPED HANDLES
// ============================================================================

/// Handle to an entity stored in a registry arena
pub struct Ref<T> {
    index: usize,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub fn new(index: usize) -> Self {
        Ref {
            index,
            _kind: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.index as u64)
    }
}

pub type BandRef = Ref<Band>;
pub type PersonRef = Ref<Person>;
pub type CityRef = Ref<City>;
pub type StateRef = Ref<State>;
pub type CountryRef = Ref<Country>;
pub type WebsiteRef = Ref<Website>;

/// Anything a registry can key and a store can assign an id to
pub trait Named {
    fn name(&self) -> &str;
    fn dest_id(&self) -> Option<i64>;
    fn set_dest_id(&mut self, id: i64);
}

// ============================================================================
// SINGLE-KEY REGISTRY
// ============================================================================

/// Case-insensitive dedup container keyed by normalized name
#[derive(Debug, Clone)]
pub struct NamedRegistry<T> {
    items: Vec<T>,
    by_name: HashMap<String, Ref<T>>,
    by_dest_id: HashMap<i64, Ref<T>>,
}

impl<T: Named> NamedRegistry<T> {
    pub fn new() -> Self {
        NamedRegistry {
            items: Vec::new(),
            by_name: HashMap::new(),
            by_dest_id: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<Ref<T>> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Create or overwrite the entry for the value's name.
    ///
    /// Overwriting keeps the existing handle so links stay valid.
    pub fn set(&mut self, value: T) -> Ref<T> {
        let key = value.name().to_lowercase();
        let dest_id = value.dest_id();

        let handle = match self.by_name.get(&key) {
            Some(&existing) => {
                self.items[existing.index] = value;
                existing
            }
            None => {
                self.items.push(value);
                let handle = Ref::new(self.items.len() - 1);
                self.by_name.insert(key, handle);
                handle
            }
        };

        if let Some(id) = dest_id {
            self.by_dest_id.insert(id, handle);
        }
        handle
    }

    /// Existing entry for `name`, or a new one built by `make`.
    /// The flag is true when the entry was created.
    pub fn get_or_insert_with<F>(&mut self, name: &str, make: F) -> (Ref<T>, bool)
    where
        F: FnOnce() -> T,
    {
        match self.get(name) {
            Some(existing) => (existing, false),
            None => (self.set(make()), true),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ref<T>, &T)> {
        self.items.iter().enumerate().map(|(i, v)| (Ref::new(i), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries still waiting for a destination id
    pub fn unbound(&self) -> Vec<Ref<T>> {
        self.iter()
            .filter(|(_, v)| v.dest_id().is_none())
            .map(|(r, _)| r)
            .collect()
    }

    pub fn bind_dest_id(&mut self, handle: Ref<T>, id: i64) {
        self.items[handle.index].set_dest_id(id);
        self.by_dest_id.insert(id, handle);
    }

    pub fn by_dest_id(&self, id: i64) -> Option<Ref<T>> {
        self.by_dest_id.get(&id).copied()
    }
}

impl<T: Named> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Ref<T>> for NamedRegistry<T> {
    type Output = T;

    fn index(&self, handle: Ref<T>) -> &T {
        &self.items[handle.index]
    }
}

impl<T> IndexMut<Ref<T>> for NamedRegistry<T> {
    fn index_mut(&mut self, handle: Ref<T>) -> &mut T {
        &mut self.items[handle.index]
    }
}

pub type PersonRegistry = NamedRegistry<Person>;
pub type CountryRegistry = NamedRegistry<Country>;
pub type WebsiteRegistry = NamedRegistry<Website>;

// ============================================================================
// TWO-LEVEL REGISTRY (cities under states, states under countries)
// ============================================================================

/// Dedup container keyed by (name, parent name), both case-insensitive.
///
/// Removed entries stay in the arena so outstanding handles remain valid,
/// but they are invisible to lookups and iteration.
#[derive(Debug, Clone)]
pub struct ScopedRegistry<T> {
    items: Vec<T>,
    live: Vec<bool>,
    index: NameMatrix<Ref<T>>,
    by_dest_id: HashMap<i64, Ref<T>>,
}

impl<T: Named> ScopedRegistry<T> {
    pub fn new() -> Self {
        ScopedRegistry {
            items: Vec::new(),
            live: Vec::new(),
            index: NameMatrix::new(),
            by_dest_id: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str, parent: &str) -> bool {
        self.get(name, parent).is_some()
    }

    pub fn get(&self, name: &str, parent: &str) -> Option<Ref<T>> {
        self.index
            .get(&name.to_lowercase(), &parent.to_lowercase())
            .copied()
    }

    /// Create or overwrite the entry at (value name, parent).
    pub fn set(&mut self, value: T, parent: &str) -> Ref<T> {
        let name = value.name().to_lowercase();
        let parent = parent.to_lowercase();

        if let Some(&existing) = self.index.get(&name, &parent) {
            self.items[existing.index] = value;
            return existing;
        }

        self.items.push(value);
        self.live.push(true);
        let handle = Ref::new(self.items.len() - 1);
        self.index.insert(&name, &parent, handle);
        handle
    }

    /// Every live entry sharing `name` under any parent
    pub fn get_all(&self, name: &str) -> Vec<Ref<T>> {
        self.index
            .get_all(&name.to_lowercase())
            .into_iter()
            .map(|(_, &r)| r)
            .collect()
    }

    /// Unkey an entry. Its handle still indexes the arena.
    pub fn remove(&mut self, name: &str, parent: &str) -> Option<Ref<T>> {
        let removed = self
            .index
            .remove(&name.to_lowercase(), &parent.to_lowercase())?;
        self.live[removed.index] = false;
        Some(removed)
    }

    pub fn is_live(&self, handle: Ref<T>) -> bool {
        self.live[handle.index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ref<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(i, _)| self.live[*i])
            .map(|(i, v)| (Ref::new(i), v))
    }

    pub fn len(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bind_dest_id(&mut self, handle: Ref<T>, id: i64) {
        self.items[handle.index].set_dest_id(id);
        self.by_dest_id.insert(id, handle);
    }

    pub fn by_dest_id(&self, id: i64) -> Option<Ref<T>> {
        self.by_dest_id.get(&id).copied()
    }
}

impl<T: Named> Default for ScopedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Ref<T>> for ScopedRegistry<T> {
    type Output = T;

    fn index(&self, handle: Ref<T>) -> &T {
        &self.items[handle.index]
    }
}

impl<T> IndexMut<Ref<T>> for ScopedRegistry<T> {
    fn index_mut(&mut self, handle: Ref<T>) -> &mut T {
        &mut self.items[handle.index]
    }
}

pub type CityRegistry = ScopedRegistry<City>;
pub type StateRegistry = ScopedRegistry<State>;

// ============================================================================
// ALL REGISTRIES
// ============================================================================

/// Every entity collected during a run, plus the cross-entity link operations
#[derive(Debug, Default)]
pub struct Registries {
    pub bands: BandRegistry,
    pub people: PersonRegistry,
    pub cities: CityRegistry,
    pub states: StateRegistry,
    pub countries: CountryRegistry,
    pub websites: WebsiteRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing country or a new one; true when created
    pub fn ensure_country(&mut self, name: &str, canonical: bool) -> (CountryRef, bool) {
        let (country, created) = self
            .countries
            .get_or_insert_with(name, || Country::new(name, canonical));
        if canonical {
            self.countries[country].canonical = true;
        }
        (country, created)
    }

    /// Existing state scoped by its country, or a new one linked to it
    pub fn ensure_state(
        &mut self,
        name: &str,
        country: Option<CountryRef>,
        canonical: bool,
    ) -> (StateRef, bool) {
        let country_name = country
            .map(|c| self.countries[c].name.clone())
            .unwrap_or_default();

        let (state, created) = match self.states.get(name, &country_name) {
            Some(existing) => (existing, false),
            None => {
                let state = State::new(name, country, canonical);
                (self.states.set(state, &country_name), true)
            }
        };

        if canonical {
            self.states[state].canonical = true;
        }
        if let Some(country) = country {
            let states = &mut self.countries[country].states;
            if !states.contains(&state) {
                states.push(state);
            }
        }
        (state, created)
    }

    /// Existing city scoped by its state, or a new one linked to it
    pub fn ensure_city(
        &mut self,
        name: &str,
        state: Option<StateRef>,
        canonical: bool,
    ) -> (CityRef, bool) {
        let state_name = state
            .map(|s| self.states[s].name.clone())
            .unwrap_or_default();

        let (city, created) = match self.cities.get(name, &state_name) {
            Some(existing) => (existing, false),
            None => {
                let city = City::new(name, state, canonical);
                (self.cities.set(city, &state_name), true)
            }
        };

        if canonical {
            self.cities[city].canonical = true;
        }
        if let Some(state) = state {
            let cities = &mut self.states[state].cities;
            if !cities.contains(&city) {
                cities.push(city);
            }
        }
        (city, created)
    }

    /// Link both directions; false if they were already linked
    pub fn link_band_city(&mut self, band: BandRef, city: CityRef) -> bool {
        let added = self.bands.add_city(band, city);
        let bands = &mut self.cities[city].bands;
        if !bands.contains(&band) {
            bands.push(band);
        }
        added
    }

    pub fn band_has_city(&self, band: BandRef, city: CityRef) -> bool {
        self.bands[band].cities.contains(&city)
    }

    /// Fold the state-less city sharing `into`'s name into `into`.
    ///
    /// Every band linked to the orphan is re-linked to `into`, then the orphan
    /// is removed. Returns the number of bands moved, or None when there was
    /// no orphan to merge.
    pub fn merge_orphan_city(&mut self, into: CityRef) -> Option<usize> {
        if self.cities[into].state.is_none() {
            return None;
        }

        let name = self.cities[into].name.clone();
        let orphan = self.cities.get(&name, "")?;
        if orphan == into {
            return None;
        }

        let moved = std::mem::take(&mut self.cities[orphan].bands);
        for &band in &moved {
            self.bands.replace_city(band, orphan, into);
            let bands = &mut self.cities[into].bands;
            if !bands.contains(&band) {
                bands.push(band);
            }
        }

        self.cities[orphan].merged_into = Some(into);
        self.cities.remove(&name, "");
        Some(moved.len())
    }

    /// "Portland, Oregon, USA"
    pub fn city_fullname(&self, city: CityRef) -> String {
        let city = &self.cities[city];
        match city.state {
            Some(state) => format!("{}, {}", city.name, self.state_fullname(state)),
            None => city.name.clone(),
        }
    }

    /// "Oregon, USA"
    pub fn state_fullname(&self, state: StateRef) -> String {
        let state = &self.states[state];
        match state.country {
            Some(country) => format!("{}, {}", state.name, self.countries[country].name),
            None => state.name.clone(),
        }
    }
}

impl LinkCounts for Registries {
    fn city_band_count(&self, city: &str, state: &str) -> usize {
        self.cities
            .get(city, state)
            .map(|c| self.cities[c].bands.len())
            .unwrap_or(0)
    }

    fn state_city_count(&self, state: &str, country: &str) -> usize {
        self.states
            .get(state, country)
            .map(|s| {
                self.states[s]
                    .cities
                    .iter()
                    .filter(|&&c| !self.cities[c].canonical)
                    .count()
            })
            .unwrap_or(0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
