use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::geo::Coordinate;

static ZIP_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("zipcode regex"));

/// Whether a string looks like a 5-digit US zipcode.
pub fn is_valid_zipcode_format(zip: &str) -> bool {
    ZIP_FORMAT.is_match(zip)
}

/// Look up city and state from a US zip code
pub fn lookup_zipcode(zip: &str) -> Option<(String, String)> {
    // Avoid zipcodes::matching to suppress debug_print output.
    let results =
        zipcodes::filter_by(vec![|z: &zipcodes::Zipcode| z.zip_code == zip], None).ok()?;
    let info = results.first()?;
    Some((info.city.clone(), info.state.clone()))
}

/// Format a zipcode for display, appending city/state when known.
///
/// "94124" becomes "94124 (San Francisco, CA)"; unknown zips pass through.
pub fn describe_zipcode(zip: &str) -> String {
    match lookup_zipcode(zip) {
        Some((city, state)) => format!("{} ({}, {})", zip, city, state),
        None => zip.to_string(),
    }
}

/// Immutable zipcode → coordinate lookup table.
///
/// Built once at startup from a JSON file shaped `{"94124": [lon, lat], ...}`
/// and injected wherever base coordinates need resolving. Never mutated after
/// construction, so sharing it across tasks needs no locking.
#[derive(Debug, Clone, Default)]
pub struct ZipcodeIndex {
    coords: HashMap<String, Coordinate>,
}

impl ZipcodeIndex {
    /// Load the reference table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read zipcode table {}", path.display()))?;
        let table: HashMap<String, [f64; 2]> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse zipcode table {}", path.display()))?;
        Ok(Self::from_entries(
            table
                .into_iter()
                .map(|(zip, [lon, lat])| (zip, Coordinate::new(lon, lat))),
        ))
    }

    /// Build an index from in-memory entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Coordinate)>) -> Self {
        Self {
            coords: entries.into_iter().collect(),
        }
    }

    /// Resolve a zipcode to its coordinates, `None` if unknown.
    pub fn resolve(&self, zip: &str) -> Option<Coordinate> {
        self.coords.get(zip).copied()
    }

    pub fn contains(&self, zip: &str) -> bool {
        self.coords.contains_key(zip)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}
