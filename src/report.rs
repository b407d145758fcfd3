//! Appointment filter → rank → render pipeline.
//!
//! Pure computation over an in-memory record list: no I/O, no shared state,
//! safe to run concurrently for any number of subscribers against the same
//! record set.

use std::cmp::Ordering;

use crate::geo::{self, Coordinate};
use crate::types::Appointment;
use crate::zipcode::{ZipcodeIndex, describe_zipcode};

/// Default cap on rendered appointments per report
pub const DEFAULT_MAX_RESULTS: usize = 15;
/// Default search radius for new subscribers
pub const DEFAULT_RADIUS_MILES: f64 = 50.0;
/// Default zipcode for new subscribers
pub const DEFAULT_ZIPCODE: &str = "94124";

/// A subscriber's search preference: radius in miles around a zipcode.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub radius_miles: f64,
    pub zipcode: String,
}

impl Query {
    pub fn new(radius_miles: f64, zipcode: impl Into<String>) -> Self {
        Self {
            radius_miles,
            zipcode: zipcode.into(),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS_MILES, DEFAULT_ZIPCODE)
    }
}

/// Builds appointment reports against an injected zipcode table.
#[derive(Debug, Clone)]
pub struct ReportBuilder<'a> {
    index: &'a ZipcodeIndex,
    max_results: usize,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(index: &'a ZipcodeIndex) -> Self {
        Self {
            index,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Render a Markdown report of the nearest available appointments.
    ///
    /// Unavailable records, records without usable coordinates, and records
    /// at or beyond the radius are dropped. Survivors are ranked nearest
    /// first (ties keep input order), capped at `max_results`, and formatted
    /// one entry per rank. An unknown zipcode yields a safe user-facing
    /// message rather than an error.
    pub fn build(&self, records: &[Appointment], query: &Query) -> String {
        let Some(base) = self.index.resolve(&query.zipcode) else {
            return format!("Sorry, zipcode {} is not supported.", query.zipcode);
        };

        let mut ranked = rank_within_radius(records, base, query.radius_miles);
        ranked.truncate(self.max_results);

        let location = describe_zipcode(&query.zipcode);
        if ranked.is_empty() {
            return format!(
                "no appointments available within {} mi of {}.",
                query.radius_miles, location
            );
        }

        let mut out = format!(
            "{} appointment(s) found within {} mi of {}.\n----------\n",
            ranked.len(),
            query.radius_miles,
            location
        );
        for (i, (appointment, distance)) in ranked.iter().enumerate() {
            out.push_str(&format_entry(i, appointment, *distance));
        }
        out
    }
}

/// Filter to available in-range records and sort ascending by distance.
///
/// The radius check is strict: a record exactly at the boundary is excluded.
/// The sort is stable, so equidistant records keep their feed order.
fn rank_within_radius(
    records: &[Appointment],
    base: Coordinate,
    radius_miles: f64,
) -> Vec<(&Appointment, f64)> {
    let mut ranked: Vec<(&Appointment, f64)> = records
        .iter()
        .filter(|r| r.available)
        .filter_map(|r| {
            let coord = r.coordinates?;
            let distance = geo::distance_miles(coord, base);
            (distance < radius_miles).then_some((r, distance))
        })
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    ranked
}

fn format_entry(index: usize, appointment: &Appointment, distance: f64) -> String {
    // parseInt-style truncation; a truncated 0 (or NaN) shows as "unknown",
    // matching the long-standing display quirk.
    let miles = distance as i64;
    let shown = if miles == 0 {
        "unknown".to_string()
    } else {
        miles.to_string()
    };
    format!(
        "*{}. {} - {} ({} mi)* [Check]({})\n{}, {}, {}\n",
        index + 1,
        appointment.provider,
        appointment.city,
        shown,
        appointment.booking_url,
        appointment.address,
        appointment.city,
        appointment.postal_code
    )
}
