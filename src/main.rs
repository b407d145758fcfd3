use std::env;

use anyhow::Result;
use vaxspot_rs::{
    DEFAULT_RADIUS_MILES, Query, ReportBuilder, SpotterClient, ZipcodeIndex,
    is_valid_zipcode_format, states,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <zipcode> [radius_mi] [state] [postal_codes.json]", args[0]);
        eprintln!("  zipcode: 5-digit US zipcode to search around");
        eprintln!("  radius_mi: search radius in miles (default: 50)");
        eprintln!("  state: two-letter state code for the feed (default: CA)");
        eprintln!("  postal_codes.json: zipcode coordinate table (default: ./postal_codes.json)");
        std::process::exit(1);
    }

    let zipcode = args[1].clone();
    if !is_valid_zipcode_format(&zipcode) {
        eprintln!("Error: '{}' is not a 5-digit zipcode", zipcode);
        std::process::exit(1);
    }

    let radius = args
        .get(2)
        .map(|s| match s.parse::<f64>() {
            Ok(r) if r > 0.0 => r,
            _ => {
                eprintln!("Invalid radius: {}. Using {} mi.", s, DEFAULT_RADIUS_MILES);
                DEFAULT_RADIUS_MILES
            }
        })
        .unwrap_or(DEFAULT_RADIUS_MILES);

    let state = args
        .get(3)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "CA".to_string());
    if !states::is_valid(&state) {
        eprintln!("Error: unsupported state code '{}'", state);
        std::process::exit(1);
    }

    let table_path = args
        .get(4)
        .cloned()
        .or_else(|| env::var("VAXSPOT_POSTAL_CODES").ok())
        .unwrap_or_else(|| "postal_codes.json".to_string());
    let index = ZipcodeIndex::load(&table_path)?;

    let client = SpotterClient::new()?;
    println!("Fetching appointments for {}...", state);
    let records = client.fetch_state(&state).await?;

    let report = ReportBuilder::new(&index).build(&records, &Query::new(radius, zipcode));
    println!("{}", report);

    Ok(())
}
