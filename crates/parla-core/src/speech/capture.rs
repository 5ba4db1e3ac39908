use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SpeechError;

pub trait SpeechCapture: Send + Sync {
    /// Begin listening for one utterance in `lang`
    fn start(&self, lang: &str) -> Result<CaptureSession, SpeechError>;
}

/// A single-utterance recognition in progress
pub struct CaptureSession {
    pub stop: CaptureStop,
    pub transcript: Transcript,
}

/// Ends a capture early; no transcript is delivered afterwards
pub struct CaptureStop(Option<oneshot::Sender<()>>);

impl CaptureStop {
    pub fn stop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

pub struct Transcript(oneshot::Receiver<Option<String>>);

impl Transcript {
    /// Wait for the result. `None` if stopped, failed or nothing was heard.
    pub async fn recv(self) -> Option<String> {
        self.0.await.ok().flatten()
    }
}

/// Used when no recognizer is configured
pub struct UnsupportedCapture;

impl SpeechCapture for UnsupportedCapture {
    fn start(&self, _lang: &str) -> Result<CaptureSession, SpeechError> {
        Err(SpeechError::CapabilityMissing("speech recognition".to_string()))
    }
}

/// Runs an external recognizer and takes its stdout as the transcript
pub struct CommandCapture {
    argv: Vec<String>,
}

impl CommandCapture {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl SpeechCapture for CommandCapture {
    fn start(&self, lang: &str) -> Result<CaptureSession, SpeechError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SpeechError::CapabilityMissing("speech recognition".to_string()))?;

        let child = Command::new(program)
            .args(args.iter().map(|a| a.replace("{lang}", lang)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    SpeechError::CapabilityMissing(format!("speech recognition ({})", program))
                }
                _ => SpeechError::Spawn {
                    program: program.clone(),
                    source: e,
                },
            })?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();

        tokio::spawn(async move {
            // Dropping the output future drops the child, which kills it
            let transcript = tokio::select! {
                output = child.wait_with_output() => match output {
                    Ok(out) if out.status.success() => {
                        let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
                        (!text.is_empty()).then_some(text)
                    }
                    Ok(out) => {
                        warn!(status = %out.status, "speech recognizer failed");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "speech recognizer failed");
                        None
                    }
                },
                Ok(()) = stop_rx => {
                    debug!("speech capture stopped before a result");
                    None
                }
            };
            let _ = result_tx.send(transcript);
        });

        Ok(CaptureSession {
            stop: CaptureStop(Some(stop_tx)),
            transcript: Transcript(result_rx),
        })
    }
}
