//! Example: Search and browse the Radio Browser directory
//!
//! Run with: cargo run -p pmoradiobrowser --example search_stations [name]

use pmoradiobrowser::{get_directory_client, StationQuery, DEFAULT_COUNTRY_CODE};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let name = std::env::args().nth(1).unwrap_or_default();

    let client = get_directory_client().await?;
    println!("Using {}\n", client.base_url());

    let query = StationQuery::new()
        .name(name.as_str())
        .country(DEFAULT_COUNTRY_CODE)
        .limit(10);
    let stations = client.search(&query).await?;

    println!("=== Stations ({}) ===", stations.len());
    for station in &stations {
        println!(
            "  {} [{}] {} votes",
            station.name,
            station.location(),
            station.votes
        );
        if !station.tags.is_empty() {
            println!("      tags: {}", station.tags.join(", "));
        }
    }

    println!("\n=== Top tags ===");
    for tag in client.tags(10).await? {
        println!("  {} ({})", tag.name, tag.station_count);
    }

    println!("\n=== Top countries ===");
    for country in client.countries().await?.iter().take(10) {
        println!("  {} {} ({})", country.code, country.name, country.station_count);
    }

    Ok(())
}
