use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{select_voice, PlaybackEvent, Voice};
use crate::error::SpeechError;

pub trait SpeechPlayback: Send + Sync {
    /// Start speaking `text`, cancelling anything already playing. Returns
    /// immediately; progress is reported as `PlaybackEvent`s.
    fn speak(&self, text: &str, lang: &str);

    fn cancel(&self);
}

/// Speaks through an espeak-compatible command line program
pub struct EspeakPlayback {
    program: String,
    voices: Vec<Voice>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    current: Mutex<Option<oneshot::Sender<()>>>,
    last_utterance: AtomicU64,
}

impl EspeakPlayback {
    /// Discover the program's voices. A program that cannot be run means the
    /// capability is missing.
    pub async fn new(
        program: &str,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<Self, SpeechError> {
        let output = Command::new(program)
            .arg("--voices")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    SpeechError::CapabilityMissing(format!("speech playback ({})", program))
                }
                _ => SpeechError::Spawn {
                    program: program.to_string(),
                    source: e,
                },
            })?;

        let voices = parse_voices(&String::from_utf8_lossy(&output.stdout));
        debug!(program, voices = voices.len(), "speech playback ready");
        Ok(Self::with_voices(program, voices, events))
    }

    pub fn with_voices(
        program: &str,
        voices: Vec<Voice>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        Self {
            program: program.to_string(),
            voices,
            events,
            current: Mutex::new(None),
            last_utterance: AtomicU64::new(0),
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }
}

impl SpeechPlayback for EspeakPlayback {
    fn speak(&self, text: &str, lang: &str) {
        self.cancel();
        let id = self.last_utterance.fetch_add(1, Ordering::Relaxed) + 1;

        let mut cmd = Command::new(&self.program);
        if let Some(voice) = select_voice(&self.voices, lang) {
            cmd.arg("-v").arg(&voice.id);
        }
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, program = %self.program, "failed to start speech playback");
                let _ = self.events.send(PlaybackEvent::Errored(id, e.to_string()));
                return;
            }
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel_tx);

        let events = self.events.clone();
        let _ = events.send(PlaybackEvent::Started(id));

        tokio::spawn(async move {
            let finished = tokio::select! {
                status = child.wait() => Some(status),
                Ok(()) = cancel_rx => None,
            };

            let event = match finished {
                None => {
                    let _ = child.kill().await;
                    PlaybackEvent::Ended(id)
                }
                Some(Ok(status)) if status.success() => PlaybackEvent::Ended(id),
                Some(Ok(status)) => PlaybackEvent::Errored(id, format!("speech program exited with {}", status)),
                Some(Err(e)) => PlaybackEvent::Errored(id, e.to_string()),
            };
            let _ = events.send(event);
        });
    }

    fn cancel(&self) {
        let previous = self.current.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = previous {
            let _ = tx.send(());
        }
    }
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 2)
/// ```
pub fn parse_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            Some(Voice {
                id: cols[1].to_string(),
                name: cols[3].to_string(),
                lang: cols[1].to_string(),
            })
        })
        .collect()
}
