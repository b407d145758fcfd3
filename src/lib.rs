pub mod client;
pub mod geo;
pub mod notify;
pub mod report;
pub mod store;
pub mod types;
pub mod zipcode;

pub use client::{FetchError, SpotterClient};
pub use geo::{Coordinate, distance_miles};
pub use notify::{BroadcastSummary, Notifier, NotifyError, TelegramNotifier, broadcast_reports};
pub use report::{DEFAULT_MAX_RESULTS, DEFAULT_RADIUS_MILES, DEFAULT_ZIPCODE, Query, ReportBuilder};
pub use store::{Subscriber, SubscriberStore};
pub use types::{Appointment, states};
pub use zipcode::{ZipcodeIndex, describe_zipcode, is_valid_zipcode_format, lookup_zipcode};
