//! Shared playback session
//!
//! One [`PlayerSession`] owns the process's only [`AudioOutput`]. Callers
//! reach it through a cloneable [`SharedPlayer`] handle; output events are
//! fed back by the task started with [`SharedPlayer::spawn_event_pump`].
//!
//! ```no_run
//! use pmoradiobrowser::player::{event_channel, HeadlessOutput, MemoryPreferences, SharedPlayer};
//! use pmoradiobrowser::Station;
//!
//! # async fn demo() -> pmoradiobrowser::Result<()> {
//! let (events, receiver) = event_channel();
//! let player = SharedPlayer::from_parts(
//!     Box::new(HeadlessOutput::new(events)),
//!     Box::new(MemoryPreferences::new()),
//! );
//! player.spawn_event_pump(receiver);
//!
//! player.set_current_station(Some(Station::new("id", "Radio", "https://radio.example/live")))?;
//! # Ok(())
//! # }
//! ```

pub mod output;
pub mod preferences;
pub mod session;

pub use output::{
    event_channel, AudioOutput, EventReceiver, EventSender, Generation, HeadlessOutput,
    OutputEvent, OutputEventKind,
};
pub use preferences::{MemoryPreferences, PreferenceStore, DEFAULT_VOLUME};
pub use session::{PlaybackPhase, PlayerSession, PlayerSnapshot};

use crate::error::Result;
use crate::models::Station;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cloneable handle on the single playback session
#[derive(Debug, Clone)]
pub struct SharedPlayer {
    inner: Arc<Mutex<PlayerSession>>,
}

impl SharedPlayer {
    pub fn new(session: PlayerSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn from_parts(output: Box<dyn AudioOutput>, preferences: Box<dyn PreferenceStore>) -> Self {
        Self::new(PlayerSession::new(output, preferences))
    }

    fn lock(&self) -> MutexGuard<'_, PlayerSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut PlayerSession) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_current_station(&self, station: Option<Station>) -> Result<()> {
        self.lock().set_current_station(station)
    }

    pub fn play_station(&self, station: &Station) -> Result<()> {
        self.lock().play_station(station)
    }

    pub fn toggle_play(&self) {
        self.lock().toggle_play()
    }

    pub fn set_volume(&self, volume: f32) {
        self.lock().set_volume(volume)
    }

    pub fn toggle_mute(&self) {
        self.lock().toggle_mute()
    }

    pub fn set_muted(&self, muted: bool) {
        self.lock().set_muted(muted)
    }

    pub fn handle_event(&self, event: OutputEvent) {
        self.lock().handle_event(event)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.lock().subscribe()
    }

    /// Deliver output events to the session until the output side closes
    pub fn spawn_event_pump(&self, mut events: EventReceiver) -> JoinHandle<()> {
        let player = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                player.handle_event(event);
            }
            debug!("Output event channel closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn headless_player() -> (SharedPlayer, JoinHandle<()>) {
        let (events, receiver) = event_channel();
        let player = SharedPlayer::from_parts(
            Box::new(HeadlessOutput::new(events)),
            Box::new(MemoryPreferences::new()),
        );
        let pump = player.spawn_event_pump(receiver);
        (player, pump)
    }

    #[tokio::test]
    async fn test_event_pump_settles_loading() {
        let (player, _pump) = headless_player();
        let mut rx = player.subscribe();

        player
            .set_current_station(Some(Station::new("a", "A", "https://a.stream/")))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.is_playing && !s.is_loading))
            .await
            .expect("session settled")
            .unwrap();
        assert_eq!(player.snapshot().phase(), PlaybackPhase::Playing);
    }

    #[tokio::test]
    async fn test_handles_share_one_session() {
        let (player, _pump) = headless_player();
        let other = player.clone();

        other.set_volume(0.2);
        player.toggle_mute();

        let snapshot = player.snapshot();
        assert_eq!(snapshot.volume, 0.2);
        assert!(snapshot.is_muted);
        assert_eq!(player.with(|s| s.snapshot()), other.snapshot());
    }
}
