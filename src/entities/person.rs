// 🧑 Person Entity - band members, linked to bands by name

use super::Named;
use crate::normalize::normalize_person;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub dest_id: Option<i64>,
    pub name: String,

    /// Names of the bands this person plays in
    pub bands: Vec<String>,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Person {
            dest_id: None,
            name: normalize_person(name),
            bands: Vec::new(),
        }
    }

    /// Record membership; false if already recorded
    pub fn add_band(&mut self, band: &str) -> bool {
        let lower = band.to_lowercase();
        if self.bands.iter().any(|b| b.to_lowercase() == lower) {
            return false;
        }
        self.bands.push(band.to_string());
        true
    }
}

impl Named for Person {
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
    fn test_person_bands_dedup() {
        let mut p = Person::new(" Janet Weiss ");
        assert_eq!(p.name, "Janet Weiss");

        assert!(p.add_band("Quasi"));
        assert!(p.add_band("Sleater-Kinney"));
        assert!(!p.add_band("quasi"));
        assert_eq!(p.bands.len(), 2);
    }
}
