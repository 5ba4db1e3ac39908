pub mod ai;
pub mod availability;
pub mod config;
pub mod error;
pub mod language;
pub mod prompt;
pub mod speech;
pub mod state;
pub mod turn;

// Re-export main types for convenience
pub use ai::{Generator, GenerationRequest, ModelLister, MyMemoryClient, OllamaClient, Translator};
pub use availability::{Availability, AvailabilityPoller};
pub use config::Config;
pub use error::{SpeechError, TurnError};
pub use language::{Direction, Language, LANGUAGES};
pub use state::{ConversationState, IdSequence, Message, MessageId, Sender};
pub use turn::{RandomTemplatePicker, TemplatePicker, Turn, TurnOrchestrator, FALLBACK_TEMPLATES};
pub use speech::{PlaybackEvent, SpeechCapture, SpeechPlayback, UtteranceId};
