//! Speech capture and playback adapters.
//!
//! Both sides wrap an external program rather than doing any audio work in
//! process:
//! - Playback runs a text-to-speech program (espeak-ng by default)
//! - Capture runs a user-configured recognizer that prints one transcript

pub mod capture;
pub mod playback;

pub use capture::{CaptureSession, CaptureStop, CommandCapture, SpeechCapture, Transcript, UnsupportedCapture};
pub use playback::{EspeakPlayback, SpeechPlayback};

use crate::language::primary_subtag;

/// Identifies one `speak` call, increasing per playback adapter
pub type UtteranceId = u64;

/// Playback lifecycle, used to drive a "speaking" indicator.
///
/// A cancelled utterance still reports `Ended`, possibly after the utterance
/// that replaced it has `Started`, so consumers match on the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
    Errored(UtteranceId, String),
}

impl PlaybackEvent {
    pub fn utterance(&self) -> UtteranceId {
        match self {
            PlaybackEvent::Started(id) | PlaybackEvent::Ended(id) | PlaybackEvent::Errored(id, _) => *id,
        }
    }
}

/// A voice the TTS program can speak with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Value passed to the program to select this voice
    pub id: String,
    pub name: String,
    pub lang: String,
}

/// Pick a voice for `tag`: exact tag match first, then a voice whose language
/// starts with the primary subtag. `None` means use the program default.
pub fn select_voice<'a>(voices: &'a [Voice], tag: &str) -> Option<&'a Voice> {
    if let Some(voice) = voices.iter().find(|v| v.lang.eq_ignore_ascii_case(tag)) {
        return Some(voice);
    }

    let primary = primary_subtag(tag).to_ascii_lowercase();
    if primary.is_empty() {
        return None;
    }
    voices
        .iter()
        .find(|v| v.lang.to_ascii_lowercase().starts_with(&primary))
}
