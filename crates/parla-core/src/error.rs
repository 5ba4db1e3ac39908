use thiserror::Error;

/// Failures of the speech capture and playback adapters
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The platform has no way to do this (no recognizer configured, TTS
    /// program not installed). Shown to the user, the interaction is dropped.
    #[error("{0} is not available on this system")]
    CapabilityMissing(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    /// Another turn is still waiting on a collaborator
    #[error("a reply is still being prepared")]
    Busy,
}
