//! Example: Discover Radio Browser servers and pick a healthy one
//!
//! Run with: cargo run -p pmoradiobrowser --example discover_server

use pmoradiobrowser::discovery::{candidate_servers, DEFAULT_FALLBACK_SERVERS};
use pmoradiobrowser::{DirectoryResolver, DnsDiscovery, ResolverSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Resolving Radio Browser servers...\n");

    let seeds: Vec<String> = DEFAULT_FALLBACK_SERVERS.iter().map(|s| s.to_string()).collect();
    let candidates = candidate_servers(&DnsDiscovery::default(), &seeds).await;

    println!("=== Candidates ({}) ===", candidates.len());
    for host in &candidates {
        println!("  {}", host);
    }

    let resolver = DirectoryResolver::from_settings(ResolverSettings::default())?;
    match resolver.resolve().await {
        Ok(endpoint) => println!("\nSelected: {} ({})", endpoint.host, endpoint.base_url),
        Err(e) => println!("\nNo server available: {}", e),
    }

    Ok(())
}
