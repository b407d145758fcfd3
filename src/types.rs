use serde::Deserialize;

use crate::geo::Coordinate;

/// Per-state GeoJSON payload from the appointment feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// One appointment location as it arrives on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude]`; null or truncated for ungeocoded locations
    #[serde(default)]
    pub coordinates: Option<Vec<f64>>,
}

/// Feed properties, all optional. The upstream API omits or nulls fields
/// freely, so every one gets a defensive default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub provider_brand_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Whether the location can cover all required doses
    #[serde(default)]
    pub appointments_available_all_doses: Option<bool>,
}

/// A validated appointment record, the pipeline's input type.
///
/// Conversion from [`Feature`] never fails; malformed wire data degrades to
/// `None` coordinates or empty strings, which the filter stage then drops or
/// the renderer prints as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub coordinates: Option<Coordinate>,
    pub available: bool,
    pub provider: String,
    pub city: String,
    pub address: String,
    pub postal_code: String,
    pub booking_url: String,
}

impl Appointment {
    pub fn from_feature(feature: Feature) -> Self {
        let coordinates = feature
            .geometry
            .and_then(|g| g.coordinates)
            .and_then(|c| match c.as_slice() {
                [lon, lat] => Some(Coordinate::new(*lon, *lat)),
                _ => None,
            })
            .filter(Coordinate::is_valid);

        let p = feature.properties;
        Self {
            coordinates,
            available: p.appointments_available_all_doses.unwrap_or(false),
            provider: p.provider_brand_name.unwrap_or_default(),
            city: p.city.unwrap_or_default(),
            address: p.address.unwrap_or_default(),
            postal_code: p.postal_code.unwrap_or_default(),
            booking_url: p.url.unwrap_or_default(),
        }
    }
}

/// US state and territory codes the feed publishes
pub mod states {
    pub const ALL: &[&str] = &[
        "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
        "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
        "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "PR", "RI", "SC", "SD", "TN", "TX",
        "VI", "UT", "VT", "VA", "WA", "WV", "WI", "WY",
    ];

    pub fn is_valid(code: &str) -> bool {
        ALL.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_with_all_fields() {
        let json = r#"{
            "geometry": { "coordinates": [-122.41, 37.77] },
            "properties": {
                "provider_brand_name": "Walgreens",
                "city": "San Francisco",
                "address": "123 Mission St",
                "postal_code": "94105",
                "url": "https://example.com/book",
                "appointments_available_all_doses": true
            }
        }"#;
        let feature: Feature = serde_json::from_str(json).expect("parse feature");
        let appt = Appointment::from_feature(feature);
        assert!(appt.available);
        assert_eq!(appt.provider, "Walgreens");
        let coord = appt.coordinates.expect("valid coordinates");
        assert_eq!(coord.lon, -122.41);
        assert_eq!(coord.lat, 37.77);
    }

    #[test]
    fn test_feature_with_null_geometry() {
        let json = r#"{ "geometry": null, "properties": { "city": "Fresno" } }"#;
        let feature: Feature = serde_json::from_str(json).expect("parse feature");
        let appt = Appointment::from_feature(feature);
        assert!(appt.coordinates.is_none());
        assert!(!appt.available);
        assert_eq!(appt.city, "Fresno");
        assert_eq!(appt.provider, "");
    }

    #[test]
    fn test_zero_coordinates_dropped_at_conversion() {
        let json = r#"{ "geometry": { "coordinates": [0, 0] }, "properties": {} }"#;
        let feature: Feature = serde_json::from_str(json).expect("parse feature");
        assert!(Appointment::from_feature(feature).coordinates.is_none());
    }

    #[test]
    fn test_truncated_coordinate_array() {
        let json = r#"{ "geometry": { "coordinates": [-122.41] }, "properties": {} }"#;
        let feature: Feature = serde_json::from_str(json).expect("parse feature");
        assert!(Appointment::from_feature(feature).coordinates.is_none());
    }

    #[test]
    fn test_null_availability_means_unavailable() {
        let json = r#"{
            "geometry": { "coordinates": [-122.41, 37.77] },
            "properties": { "appointments_available_all_doses": null }
        }"#;
        let feature: Feature = serde_json::from_str(json).expect("parse feature");
        assert!(!Appointment::from_feature(feature).available);
    }

    #[test]
    fn test_state_codes() {
        assert!(states::is_valid("CA"));
        assert!(states::is_valid("PR"));
        assert!(!states::is_valid("ca"));
        assert!(!states::is_valid("XX"));
    }
}
