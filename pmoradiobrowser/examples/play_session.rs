//! Example: Drive the playback session with a headless output
//!
//! Run with: cargo run -p pmoradiobrowser --example play_session [tag]
//!
//! Nothing is heard: the headless output only reports the events a real
//! sound device would emit. The volume is stored in the PMORadio config.

use pmoconfig::get_config;
use pmoradiobrowser::player::{event_channel, HeadlessOutput};
use pmoradiobrowser::{get_directory_client, SharedPlayer};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config();

    // Initialize logging (RUST_LOG wins over the configured level)
    let level = config.get_log_min_level()?.to_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},pmoradiobrowser=debug")));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let tag = std::env::args().nth(1).unwrap_or_else(|| "jazz".to_string());

    let client = get_directory_client().await?;
    let stations = client.stations_by_tag(&tag, 5).await?;
    let Some(station) = stations.into_iter().find(|s| s.is_playable()) else {
        println!("No playable station tagged '{}'", tag);
        return Ok(());
    };

    let (events, receiver) = event_channel();
    let player = SharedPlayer::from_parts(
        Box::new(HeadlessOutput::new(events)),
        Box::new(config),
    );
    player.spawn_event_pump(receiver);

    let mut updates = player.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            println!(
                "  phase={:?} spinner={} volume={:.2} muted={}",
                snapshot.phase(),
                snapshot.shows_spinner(),
                snapshot.volume,
                snapshot.is_muted
            );
        }
    });

    println!("Playing {} ({})", station.name, station.url_resolved);
    player.play_station(&station)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("Pausing");
    player.play_station(&station)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("Volume down and mute");
    player.set_volume(0.3);
    player.toggle_mute();
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("Clearing the selection");
    player.set_current_station(None)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(())
}
