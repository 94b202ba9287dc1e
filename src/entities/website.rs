// 🌐 Website Entity - a URL shared by one or more bands

use super::{BandRef, Named};
use crate::normalize::normalize_website;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Website {
    pub dest_id: Option<i64>,
    pub url: String,
    pub bands: Vec<BandRef>,
}

impl Website {
    pub fn new(url: &str) -> Self {
        Website {
            dest_id: None,
            url: normalize_website(url),
            bands: Vec::new(),
        }
    }

    pub fn add_band(&mut self, band: BandRef) -> bool {
        if self.bands.contains(&band) {
            return false;
        }
        self.bands.push(band);
        true
    }
}

impl Named for Website {
    fn name(&self) -> &str {
        &self.url
    }

    fn dest_id(&self) -> Option<i64> {
        self.dest_id
    }

    fn set_dest_id(&mut self, id: i64) {
        self.dest_id = Some(id);
    }
}
