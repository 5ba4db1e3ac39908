use std::sync::Arc;
use anyhow::{Result, bail};
use clap::Parser;
use parla_core::language::{self, LANGUAGES};
use parla_core::speech::{CommandCapture, EspeakPlayback, UnsupportedCapture};
use parla_core::{
    AvailabilityPoller, Config, ConversationState, IdSequence, MyMemoryClient, OllamaClient,
    RandomTemplatePicker, SpeechCapture, SpeechPlayback, TurnOrchestrator,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "parla")]
#[command(about = "Practice a foreign language by chatting with a local LLM", version)]
struct Cli {
    /// Ollama server URL
    #[arg(long)]
    ollama_url: Option<String>,
    /// Translation service URL (MyMemory compatible)
    #[arg(long)]
    translate_url: Option<String>,
    /// Language you speak, e.g. zh-TW
    #[arg(short, long)]
    source: Option<String>,
    /// Language the bot replies in, e.g. ja-JP
    #[arg(short, long)]
    target: Option<String>,
    /// Seconds between Ollama availability checks
    #[arg(long)]
    poll_interval: Option<u64>,
    /// Don't speak replies aloud
    #[arg(long)]
    mute: bool,
}

impl Cli {
    /// Command-line flags win over the config file for this run only
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.ollama_url {
            config.ollama_url = url.clone();
        }
        if let Some(url) = &self.translate_url {
            config.translate_url = url.clone();
        }
        if let Some(source) = &self.source {
            config.source_lang = source.clone();
        }
        if let Some(target) = &self.target {
            config.target_lang = target.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
    }
}

fn check_language(code: &str) -> Result<()> {
    if language::find(code).is_none() {
        let supported: Vec<&str> = LANGUAGES.iter().map(|l| l.code).collect();
        bail!("Unknown language '{}'. Supported: {}", code, supported.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init()?;

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    cli.apply(&mut config);
    check_language(&config.source_lang)?;
    check_language(&config.target_lang)?;

    let ids = IdSequence::new();
    let ollama = Arc::new(OllamaClient::with_timeout(&config.ollama_url, config.request_timeout())?);
    let translator = Arc::new(MyMemoryClient::with_timeout(&config.translate_url, config.request_timeout())?);

    let availability = AvailabilityPoller::spawn(ollama.clone(), config.poll_interval());
    let orchestrator = Arc::new(TurnOrchestrator::new(
        ollama,
        translator,
        Arc::new(RandomTemplatePicker),
        ids.clone(),
    ));

    let mut events = EventHandler::new();

    let playback: Option<Arc<dyn SpeechPlayback>> = match (&config.tts_program, cli.mute) {
        (Some(program), false) => {
            let (tx, rx) = mpsc::unbounded_channel();
            match EspeakPlayback::new(program, tx).await {
                Ok(playback) => {
                    events.forward_playback(rx);
                    Some(Arc::new(playback) as Arc<dyn SpeechPlayback>)
                }
                Err(e) => {
                    warn!(error = %e, "speech playback disabled");
                    None
                }
            }
        }
        _ => None,
    };

    let capture: Arc<dyn SpeechCapture> = match config.capture_command.clone() {
        Some(argv) => Arc::new(CommandCapture::new(argv)),
        None => Arc::new(UnsupportedCapture),
    };

    let conversation = ConversationState::new(&config.source_lang, &config.target_lang, &ids);
    let mut app = App::new(conversation, orchestrator, availability, playback, capture);
    app.persist_languages = true;

    info!(
        source = %config.source_lang,
        target = %config.target_lang,
        ollama = %config.ollama_url,
        "starting parla"
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    if let Some(playback) = &app.playback {
        playback.cancel();
    }
    Ok(())
}
