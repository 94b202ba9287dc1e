// 🔗 Connection Set - undirected band-to-band edges in canonical order
//
// An edge is stored once, oriented (more connected band, less connected
// band), with a case-insensitive alphabetical tiebreak. Counts move while
// edges are added, so `sort` re-canonicalizes everything before ranking.

use crate::entities::{BandRef, BandRegistry};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Connection {
    pub band1: BandRef,
    pub band2: BandRef,
}

impl Connection {
    pub fn new(band1: BandRef, band2: BandRef) -> Self {
        Connection { band1, band2 }
    }

    pub fn reversed(self) -> Self {
        Connection::new(self.band2, self.band1)
    }
}

/// Case-insensitive name order, exact name as the final tiebreak
fn name_order(bands: &BandRegistry, a: BandRef, b: BandRef) -> Ordering {
    let (a, b) = (&bands[a].name, &bands[b].name);
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    edges: Vec<Connection>,
    stored: HashSet<Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orientation of the pair given the bands' current connection counts
    pub fn canonical(a: BandRef, b: BandRef, bands: &BandRegistry) -> Connection {
        let (count_a, count_b) = (bands[a].connection_count, bands[b].connection_count);
        match count_a.cmp(&count_b) {
            Ordering::Greater => Connection::new(a, b),
            Ordering::Less => Connection::new(b, a),
            Ordering::Equal => match name_order(bands, a, b) {
                Ordering::Less => Connection::new(a, b),
                _ => Connection::new(b, a),
            },
        }
    }

    /// Store the pair in canonical order, replacing a reverse-ordered copy.
    ///
    /// Returns true when the logical edge was not stored before.
    pub fn append(&mut self, a: BandRef, b: BandRef, bands: &BandRegistry) -> bool {
        let canonical = Self::canonical(a, b, bands);
        let reverse = canonical.reversed();
        let existed = self.contains(a, b);

        if reverse != canonical && self.stored.remove(&reverse) {
            self.edges.retain(|e| *e != reverse);
        }
        if self.stored.insert(canonical) {
            self.edges.push(canonical);
        }
        !existed
    }

    /// Append and credit both bands with the new edge
    pub fn connect(&mut self, a: BandRef, b: BandRef, bands: &mut BandRegistry) -> bool {
        let added = self.append(a, b, bands);
        if added {
            bands.bump_connection_count(a);
            bands.bump_connection_count(b);
        }
        added
    }

    pub fn contains(&self, a: BandRef, b: BandRef) -> bool {
        self.get(a, b).is_some()
    }

    /// The stored orientation of the pair, whichever way round it was asked
    pub fn get(&self, a: BandRef, b: BandRef) -> Option<Connection> {
        let forward = Connection::new(a, b);
        if self.stored.contains(&forward) {
            return Some(forward);
        }
        let reverse = forward.reversed();
        self.stored.contains(&reverse).then_some(reverse)
    }

    /// Re-canonicalize, then order most-connected first:
    /// first-band count desc, first-band name asc, second-band count desc.
    pub fn sort(&mut self, bands: &BandRegistry) {
        let old = std::mem::take(&mut self.edges);
        self.stored.clear();
        for edge in old {
            self.append(edge.band1, edge.band2, bands);
        }

        let count = |b: BandRef| bands[b].connection_count;
        self.edges.sort_by(|x, y| {
            count(y.band1)
                .cmp(&count(x.band1))
                .then_with(|| name_order(bands, x.band1, y.band1))
                .then_with(|| count(y.band2).cmp(&count(x.band2)))
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Members the two bands have in common, in the first band's order
    pub fn shared_members(a: BandRef, b: BandRef, bands: &BandRegistry) -> Vec<String> {
        let mut shared: Vec<String> = Vec::new();
        for person in &bands[a].people {
            if bands[b].has_person(person) && !shared.contains(person) {
                shared.push(person.clone());
            }
        }
        shared
    }

    /// "Shared Members: X, Y." or empty when nothing explains the edge
    pub fn describe(a: BandRef, b: BandRef, bands: &BandRegistry) -> String {
        let shared = Self::shared_members(a, b, bands);
        if shared.is_empty() {
            String::new()
        } else {
            format!("Shared Members: {}.", shared.join(", "))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
