//! Playback session state machine
//!
//! [`PlayerSession`] holds the listener's intent (selected station, wanting
//! to play, volume, mute) and keeps the owned [`AudioOutput`] in line with
//! it. Every mutation ends with a reconciliation pass; output events come
//! back through [`PlayerSession::handle_event`].
//!
//! Invariant, checked after every operation: `is_playing` implies a current
//! station with a non-empty stream URL.

use super::output::{AudioOutput, Generation, OutputEvent, OutputEventKind};
use super::preferences::{restored_volume, PreferenceStore};
use crate::error::{Error, Result};
use crate::models::{normalize_stream_url, Station};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coarse playback state, derived from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Read model of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub current_station: Option<Station>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub volume: f32,
    pub is_muted: bool,
    /// Last playback failure, cleared when playback starts again
    pub error: Option<String>,
}

impl PlayerSnapshot {
    fn initial(volume: f32) -> Self {
        Self {
            current_station: None,
            is_playing: false,
            is_loading: false,
            volume,
            is_muted: false,
            error: None,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.current_station.is_none() {
            PlaybackPhase::Idle
        } else if self.is_loading {
            PlaybackPhase::Loading
        } else if self.is_playing {
            PlaybackPhase::Playing
        } else if self.error.is_some() {
            PlaybackPhase::Idle
        } else {
            PlaybackPhase::Paused
        }
    }

    /// Whether `station` is the selected one (compared by id)
    pub fn is_current(&self, station: &Station) -> bool {
        self.current_station
            .as_ref()
            .is_some_and(|current| current.id == station.id)
    }

    /// Buffering indicator: loading while the listener wants sound
    pub fn shows_spinner(&self) -> bool {
        self.is_loading && self.is_playing
    }

    /// Muted, or volume at zero
    pub fn is_silent(&self) -> bool {
        self.is_muted || self.volume == 0.0
    }
}

/// The playback session and its single audio output
pub struct PlayerSession {
    output: Box<dyn AudioOutput>,
    preferences: Box<dyn PreferenceStore>,
    state: PlayerSnapshot,
    generation: Generation,
    notifier: watch::Sender<PlayerSnapshot>,
}

impl PlayerSession {
    /// Take ownership of `output`; the volume is restored from `preferences`
    pub fn new(output: Box<dyn AudioOutput>, preferences: Box<dyn PreferenceStore>) -> Self {
        let volume = restored_volume(preferences.as_ref());
        let state = PlayerSnapshot::initial(volume);
        let (notifier, _) = watch::channel(state.clone());

        let mut session = Self {
            output,
            preferences,
            state,
            generation: Generation::default(),
            notifier,
        };
        session.sync_volume();
        session
    }

    // ========================================================================
    // Read model
    // ========================================================================

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.clone()
    }

    /// Receiver updated after every state change
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.notifier.subscribe()
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.state.current_station.as_ref()
    }

    pub fn is_current(&self, station: &Station) -> bool {
        self.state.is_current(station)
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.phase()
    }

    /// Generation of the source currently assigned to the output
    pub fn generation(&self) -> Generation {
        self.generation
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Select a station (or clear the selection) and start it
    ///
    /// A station without a stream URL is rejected and the state is left
    /// untouched.
    pub fn set_current_station(&mut self, station: Option<Station>) -> Result<()> {
        if let Some(s) = &station {
            if !s.is_playable() {
                warn!(station = %s.name, "Refusing station without stream URL");
                return Err(Error::InvalidStation {
                    name: s.name.clone(),
                });
            }
        }

        match &station {
            Some(s) => info!(station = %s.name, url = %s.url_resolved, "Station selected"),
            None => info!("Station cleared"),
        }

        // Reselecting the current source raises `is_loading` without a
        // reload; the flag clears on the output's next Playing/CanPlay/Pause.
        let present = station.is_some();
        self.state.current_station = station;
        self.state.is_playing = present;
        self.state.is_loading = present;
        self.state.error = None;

        self.sync_playback();
        self.publish();
        Ok(())
    }

    /// Station-card action: toggle the current station, select any other
    pub fn play_station(&mut self, station: &Station) -> Result<()> {
        if self.is_current(station) {
            self.toggle_play();
            Ok(())
        } else {
            self.set_current_station(Some(station.clone()))
        }
    }

    /// Flip the playing intent; refused without a playable station
    pub fn toggle_play(&mut self) {
        let wanted = !self.state.is_playing;
        self.set_is_playing(wanted);
    }

    pub fn set_is_playing(&mut self, playing: bool) {
        if playing && !self.has_playable_station() {
            debug!("No playable station, ignoring play request");
            return;
        }
        if playing == self.state.is_playing {
            return;
        }

        self.state.is_playing = playing;
        if playing {
            self.state.error = None;
        }
        self.sync_playback();
        self.publish();
    }

    pub fn set_is_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
        self.publish();
    }

    /// Set the volume (clamped to `[0, 1]`) and persist it
    ///
    /// A positive volume unmutes; zero leaves the mute flag alone. The store
    /// is only written when the value changes.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return;
        }

        let volume = volume.clamp(0.0, 1.0);
        let changed = volume != self.state.volume;
        self.state.volume = volume;
        if volume > 0.0 && self.state.is_muted {
            self.state.is_muted = false;
        }

        if changed {
            if let Err(e) = self.preferences.save_volume(volume) {
                warn!(error = %e, "Failed to persist volume");
            }
        }

        self.sync_volume();
        self.publish();
    }

    pub fn toggle_mute(&mut self) {
        let muted = !self.state.is_muted;
        self.set_muted(muted);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.state.is_muted = muted;
        self.sync_volume();
        self.publish();
    }

    /// Fold an output event into the state
    ///
    /// Events of an older source generation are dropped.
    pub fn handle_event(&mut self, event: OutputEvent) {
        if event.generation != self.generation {
            debug!(
                event = ?event.kind,
                generation = event.generation.value(),
                current = self.generation.value(),
                "Ignoring stale output event"
            );
            return;
        }

        match event.kind {
            OutputEventKind::LoadStart | OutputEventKind::Waiting | OutputEventKind::Stalled => {
                self.state.is_loading = true;
            }
            OutputEventKind::Playing => {
                self.state.is_loading = false;
                self.state.error = None;
            }
            OutputEventKind::CanPlay => {
                if self.state.is_playing {
                    self.state.is_loading = false;
                }
            }
            OutputEventKind::Pause => {
                self.state.is_loading = false;
            }
            OutputEventKind::Error(msg) | OutputEventKind::PlayRejected(msg) => {
                let err = Error::PlaybackStartFailed(msg.clone());
                warn!(error = %err, "Playback stopped");
                self.state.is_loading = false;
                self.state.is_playing = false;
                self.state.error = Some(msg);
                self.sync_playback();
            }
        }

        self.publish();
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    fn has_playable_station(&self) -> bool {
        self.state
            .current_station
            .as_ref()
            .is_some_and(Station::is_playable)
    }

    fn sync_volume(&mut self) {
        self.output.set_volume(self.state.volume);
        self.output.set_muted(self.state.is_muted);
    }

    fn sync_playback(&mut self) {
        let Some(station) = &self.state.current_station else {
            if !self.output.is_paused() {
                self.output.pause();
            }
            return;
        };

        let target = station.normalized_stream_url();
        let current = self.output.source();
        let same_source = current
            .as_deref()
            .is_some_and(|src| normalize_stream_url(src) == target);

        if !same_source {
            self.output.pause();
            self.generation = self.generation.next();
            debug!(url = %station.url_resolved, generation = self.generation.value(), "Loading source");
            self.output.set_source(&station.url_resolved, self.generation);
            self.output.load();
            if self.state.is_playing {
                self.output.play();
            }
        } else if self.state.is_playing && self.output.is_paused() {
            self.output.play();
        } else if !self.state.is_playing && !self.output.is_paused() {
            self.output.pause();
        }
    }

    fn publish(&self) {
        debug_assert!(!self.state.is_playing || self.has_playable_station());
        let state = self.state.clone();
        self.notifier.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::preferences::{MemoryPreferences, DEFAULT_VOLUME};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SetSource(String, Generation),
        Load,
        Play,
        Pause,
        Volume(f32),
        Muted(bool),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        source: Option<String>,
        paused: bool,
    }

    /// Output recording every command; the test keeps a handle on the log
    #[derive(Clone)]
    struct RecordingOutput(Arc<Mutex<Recorder>>);

    impl RecordingOutput {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Recorder {
                paused: true,
                ..Recorder::default()
            })))
        }

        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().calls.clone()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        fn loads(&self) -> usize {
            self.count(&Call::Load)
        }

        fn clear(&self) {
            self.0.lock().unwrap().calls.clear();
        }
    }

    impl AudioOutput for RecordingOutput {
        fn source(&self) -> Option<String> {
            self.0.lock().unwrap().source.clone()
        }

        fn set_source(&mut self, url: &str, generation: Generation) {
            let mut r = self.0.lock().unwrap();
            r.source = Some(url.to_string());
            r.calls.push(Call::SetSource(url.to_string(), generation));
        }

        fn load(&mut self) {
            self.0.lock().unwrap().calls.push(Call::Load);
        }

        fn play(&mut self) {
            let mut r = self.0.lock().unwrap();
            r.paused = false;
            r.calls.push(Call::Play);
        }

        fn pause(&mut self) {
            let mut r = self.0.lock().unwrap();
            r.paused = true;
            r.calls.push(Call::Pause);
        }

        fn is_paused(&self) -> bool {
            self.0.lock().unwrap().paused
        }

        fn set_volume(&mut self, volume: f32) {
            self.0.lock().unwrap().calls.push(Call::Volume(volume));
        }

        fn set_muted(&mut self, muted: bool) {
            self.0.lock().unwrap().calls.push(Call::Muted(muted));
        }
    }

    /// Store counting its writes
    #[derive(Clone, Default)]
    struct CountingPreferences {
        inner: MemoryPreferences,
        saves: Arc<AtomicUsize>,
    }

    impl CountingPreferences {
        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl PreferenceStore for CountingPreferences {
        fn load_volume(&self) -> Option<f32> {
            self.inner.load_volume()
        }

        fn save_volume(&self, volume: f32) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_volume(volume)
        }
    }

    fn session() -> (PlayerSession, RecordingOutput, MemoryPreferences) {
        let output = RecordingOutput::new();
        let prefs = MemoryPreferences::new();
        let session = PlayerSession::new(Box::new(output.clone()), Box::new(prefs.clone()));
        (session, output, prefs)
    }

    fn station_a() -> Station {
        Station::new("a", "Station A", "https://a.stream/")
    }

    fn station_b() -> Station {
        Station::new("b", "Station B", "https://b.stream/live")
    }

    fn event(session: &PlayerSession, kind: OutputEventKind) -> OutputEvent {
        OutputEvent::new(session.generation(), kind)
    }

    fn assert_invariant(session: &PlayerSession) {
        let s = session.snapshot();
        if s.is_playing {
            let station = s.current_station.expect("playing without station");
            assert!(!station.url_resolved.trim().is_empty());
        }
    }

    #[test]
    fn test_initial_state_restores_volume() {
        let output = RecordingOutput::new();
        let session = PlayerSession::new(
            Box::new(output.clone()),
            Box::new(MemoryPreferences::with_volume(0.3)),
        );
        let s = session.snapshot();
        assert_eq!(s.volume, 0.3);
        assert!(!s.is_playing);
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        assert_eq!(output.calls(), vec![Call::Volume(0.3), Call::Muted(false)]);

        let (session, _, _) = self::session();
        assert_eq!(session.snapshot().volume, DEFAULT_VOLUME);
    }

    #[test]
    fn test_invalid_station_leaves_state_unchanged() {
        let (mut session, output, _) = session();
        session.set_current_station(Some(station_a())).unwrap();
        let before = session.snapshot();
        output.clear();

        for url in ["", "   "] {
            let broken = Station::new("x", "Broken", url);
            let err = session.set_current_station(Some(broken)).unwrap_err();
            assert!(matches!(err, Error::InvalidStation { ref name } if name == "Broken"));
        }

        assert_eq!(session.snapshot(), before);
        assert!(output.calls().is_empty());
    }

    #[test]
    fn test_invariant_holds_after_every_operation() {
        let (mut session, _, _) = session();
        let broken = Station::new("x", "Broken", "");

        session.toggle_play();
        assert_invariant(&session);
        assert!(!session.snapshot().is_playing);

        session.set_is_playing(true);
        assert_invariant(&session);

        let _ = session.set_current_station(Some(broken));
        assert_invariant(&session);

        session.set_current_station(Some(station_a())).unwrap();
        assert_invariant(&session);
        session.toggle_play();
        assert_invariant(&session);
        session.toggle_play();
        assert_invariant(&session);

        session.set_current_station(None).unwrap();
        assert_invariant(&session);
        assert!(!session.snapshot().is_playing);

        session.toggle_play();
        assert_invariant(&session);
        assert!(!session.snapshot().is_playing);
    }

    #[test]
    fn test_same_station_twice_does_not_reload() {
        let (mut session, output, _) = session();

        session.set_current_station(Some(station_a())).unwrap();
        assert_eq!(output.loads(), 1);

        session.set_current_station(Some(station_a())).unwrap();
        assert_eq!(output.loads(), 1);

        // Trailing slash differences are the same source
        let same = Station::new("a2", "Station A mirror", "https://a.stream");
        session.set_current_station(Some(same)).unwrap();
        assert_eq!(output.loads(), 1);
    }

    #[test]
    fn test_volume_and_mute_rules() {
        let (mut session, output, prefs) = session();

        session.set_muted(true);
        session.set_volume(0.5);
        let s = session.snapshot();
        assert!(!s.is_muted);
        assert_eq!(s.volume, 0.5);
        assert_eq!(prefs.load_volume(), Some(0.5));

        session.set_volume(0.0);
        let s = session.snapshot();
        assert!(!s.is_muted);
        assert!(s.is_silent());

        session.toggle_mute();
        session.set_volume(0.0);
        assert!(session.snapshot().is_muted);

        session.set_volume(3.0);
        assert_eq!(session.snapshot().volume, 1.0);
        assert!(!session.snapshot().is_muted);
        session.set_volume(-1.0);
        assert_eq!(session.snapshot().volume, 0.0);

        assert_eq!(
            output.calls()[output.calls().len() - 2..],
            [Call::Volume(0.0), Call::Muted(false)]
        );
        assert_eq!(output.loads(), 0);
    }

    #[test]
    fn test_unchanged_volume_is_not_persisted_again() {
        let prefs = CountingPreferences::default();
        let mut session =
            PlayerSession::new(Box::new(RecordingOutput::new()), Box::new(prefs.clone()));

        session.set_volume(DEFAULT_VOLUME);
        assert_eq!(prefs.saves(), 0);

        session.set_volume(0.5);
        session.set_volume(0.5);
        session.set_volume(0.5);
        assert_eq!(prefs.saves(), 1);
        assert_eq!(prefs.load_volume(), Some(0.5));

        // Clamping to an unchanged bound is not a change either
        session.set_volume(1.0);
        session.set_volume(4.0);
        assert_eq!(prefs.saves(), 2);
        assert_eq!(session.snapshot().volume, 1.0);

        // Unmuting still happens when the volume stays the same
        session.set_muted(true);
        session.set_volume(1.0);
        assert!(!session.snapshot().is_muted);
        assert_eq!(prefs.saves(), 2);
    }

    #[test]
    fn test_select_play_pause_resume_scenario() {
        let (mut session, output, _) = session();

        session.set_current_station(Some(station_a())).unwrap();
        let s = session.snapshot();
        assert_eq!(s.current_station, Some(station_a()));
        assert!(s.is_playing);
        assert!(s.is_loading);
        assert!(s.shows_spinner());
        assert_eq!(s.phase(), PlaybackPhase::Loading);

        let load_start = event(&session, OutputEventKind::LoadStart);
        session.handle_event(load_start);
        let playing = event(&session, OutputEventKind::Playing);
        session.handle_event(playing);
        assert!(!session.snapshot().is_loading);
        assert_eq!(session.phase(), PlaybackPhase::Playing);

        output.clear();
        session.toggle_play();
        assert!(!session.snapshot().is_playing);
        assert_eq!(output.calls(), vec![Call::Pause]);
        assert_eq!(session.phase(), PlaybackPhase::Paused);

        output.clear();
        session.toggle_play();
        assert!(session.snapshot().is_playing);
        assert_eq!(output.calls(), vec![Call::Play]);
        assert_eq!(output.loads(), 0);
    }

    #[test]
    fn test_reselecting_current_station_keeps_loading_until_next_event() {
        let (mut session, output, _) = session();
        session.set_current_station(Some(station_a())).unwrap();
        let playing = event(&session, OutputEventKind::Playing);
        session.handle_event(playing);
        assert_eq!(session.phase(), PlaybackPhase::Playing);
        let generation = session.generation();

        session.set_current_station(Some(station_a())).unwrap();
        let s = session.snapshot();
        assert!(s.is_loading);
        assert!(s.shows_spinner());
        assert_eq!(s.phase(), PlaybackPhase::Loading);
        assert_eq!(output.loads(), 1);
        assert_eq!(session.generation(), generation);

        // The output keeps playing the same source; its next event settles it
        let can_play = event(&session, OutputEventKind::CanPlay);
        session.handle_event(can_play);
        assert!(!session.snapshot().is_loading);
        assert_eq!(session.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn test_switch_station_ignores_stale_events() {
        let (mut session, output, _) = session();

        session.set_current_station(Some(station_a())).unwrap();
        let a_generation = session.generation();
        session.handle_event(OutputEvent::new(a_generation, OutputEventKind::Playing));
        assert!(!session.snapshot().is_loading);

        output.clear();
        session.set_current_station(Some(station_b())).unwrap();
        let b_generation = session.generation();
        assert_ne!(a_generation, b_generation);
        assert_eq!(
            output.calls(),
            vec![
                Call::Pause,
                Call::SetSource("https://b.stream/live".to_string(), b_generation),
                Call::Load,
                Call::Play,
            ]
        );

        session.handle_event(OutputEvent::new(a_generation, OutputEventKind::Playing));
        assert!(session.snapshot().is_loading);

        session.handle_event(OutputEvent::new(b_generation, OutputEventKind::Playing));
        assert!(!session.snapshot().is_loading);
    }

    #[test]
    fn test_playback_failure_stops_session() {
        let (mut session, output, _) = session();
        session.set_current_station(Some(station_a())).unwrap();

        output.clear();
        let rejected = event(&session, OutputEventKind::PlayRejected("autoplay blocked".into()));
        session.handle_event(rejected);

        let s = session.snapshot();
        assert!(!s.is_playing);
        assert!(!s.is_loading);
        assert_eq!(s.error.as_deref(), Some("autoplay blocked"));
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        assert_eq!(output.calls(), vec![Call::Pause]);

        session.toggle_play();
        let s = session.snapshot();
        assert!(s.is_playing);
        assert!(s.error.is_none());
    }

    #[test]
    fn test_can_play_only_clears_loading_when_playing() {
        let (mut session, _, _) = session();
        session.set_current_station(Some(station_a())).unwrap();
        session.set_is_playing(false);
        session.set_is_loading(true);

        let can_play = event(&session, OutputEventKind::CanPlay);
        session.handle_event(can_play);
        assert!(session.snapshot().is_loading);

        session.set_is_playing(true);
        let can_play = event(&session, OutputEventKind::CanPlay);
        session.handle_event(can_play);
        assert!(!session.snapshot().is_loading);

        let waiting = event(&session, OutputEventKind::Waiting);
        session.handle_event(waiting);
        assert!(session.snapshot().shows_spinner());
    }

    #[test]
    fn test_play_station_toggles_current() {
        let (mut session, _, _) = session();

        session.play_station(&station_a()).unwrap();
        assert!(session.is_current(&station_a()));
        assert!(session.snapshot().is_playing);

        session.play_station(&station_a()).unwrap();
        assert!(!session.snapshot().is_playing);

        session.play_station(&station_b()).unwrap();
        assert!(session.is_current(&station_b()));
        assert!(session.snapshot().is_playing);
    }

    #[test]
    fn test_clearing_station_pauses_output() {
        let (mut session, output, _) = session();
        session.set_current_station(Some(station_a())).unwrap();

        output.clear();
        session.set_current_station(None).unwrap();
        assert_eq!(output.calls(), vec![Call::Pause]);
        assert_eq!(session.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let (mut session, _, _) = session();
        let mut rx = session.subscribe();
        assert!(!rx.has_changed().unwrap());

        session.set_current_station(Some(station_a())).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_playing);

        // No-op mutations do not wake subscribers
        session.set_is_playing(true);
        assert!(!rx.has_changed().unwrap());
    }
}
