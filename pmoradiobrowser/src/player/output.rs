//! The audio output seam
//!
//! An [`AudioOutput`] is the single sink the session drives. Commands are
//! synchronous and never block on the network: the outcome of `play()` and
//! the progress of loading come back as [`OutputEvent`]s, each tagged with
//! the [`Generation`] of the source that produced it.

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identifies one `set_source` call
///
/// The session bumps the generation on every source change and ignores
/// events carrying an older one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Progress notifications emitted by an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEventKind {
    /// A new source started loading
    LoadStart,
    /// Playback stopped to buffer
    Waiting,
    /// Data stopped arriving
    Stalled,
    /// Audio is flowing
    Playing,
    /// Enough data to start playing
    CanPlay,
    /// Playback paused
    Pause,
    /// The source failed (network, decoding, unsupported format)
    Error(String),
    /// A `play()` request was refused
    PlayRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub generation: Generation,
    pub kind: OutputEventKind,
}

impl OutputEvent {
    pub fn new(generation: Generation, kind: OutputEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Channel end an output pushes its events into
pub type EventSender = mpsc::UnboundedSender<OutputEvent>;

/// Channel end the session's event pump reads from
pub type EventReceiver = mpsc::UnboundedReceiver<OutputEvent>;

/// Create the event channel shared by an output and its session
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A single audio sink
///
/// `is_paused` must reflect the last `play`/`pause` request immediately,
/// before any event confirms it.
pub trait AudioOutput: Send {
    /// Currently assigned source URL
    fn source(&self) -> Option<String>;

    /// Assign a new source; later events carry `generation`
    fn set_source(&mut self, url: &str, generation: Generation);

    /// Start fetching the assigned source
    fn load(&mut self);

    /// Request playback; success or refusal arrives as an event
    fn play(&mut self);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Volume in `[0.0, 1.0]`
    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);
}

/// Output without a sound device
///
/// Tracks the source and paused flag, logs every command, and reports an immediately successful stream
/// for every source (`LoadStart`, then `CanPlay`/`Playing` on `play()`).
/// Suits daemons that only relay the session state, and demos.
#[derive(Debug)]
pub struct HeadlessOutput {
    events: EventSender,
    source: Option<String>,
    generation: Generation,
    paused: bool,
}

impl HeadlessOutput {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            source: None,
            generation: Generation::default(),
            paused: true,
        }
    }

    fn emit(&self, kind: OutputEventKind) {
        // The session may already be gone at shutdown
        let _ = self.events.send(OutputEvent::new(self.generation, kind));
    }
}

impl AudioOutput for HeadlessOutput {
    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn set_source(&mut self, url: &str, generation: Generation) {
        info!(url, generation = generation.value(), "Output source changed");
        self.source = Some(url.to_string());
        self.generation = generation;
    }

    fn load(&mut self) {
        debug!("Output load");
        if self.source.is_some() {
            self.emit(OutputEventKind::LoadStart);
        }
    }

    fn play(&mut self) {
        debug!("Output play");
        self.paused = false;
        if self.source.is_some() {
            self.emit(OutputEventKind::CanPlay);
            self.emit(OutputEventKind::Playing);
        } else {
            self.emit(OutputEventKind::PlayRejected("no source".to_string()));
        }
    }

    fn pause(&mut self) {
        debug!("Output pause");
        if !self.paused {
            self.paused = true;
            self.emit(OutputEventKind::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_volume(&mut self, volume: f32) {
        debug!(volume, "Output volume");
    }

    fn set_muted(&mut self, muted: bool) {
        debug!(muted, "Output mute");
    }
}
