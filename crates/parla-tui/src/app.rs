use std::sync::Arc;
use parla_core::config::Config;
use parla_core::language;
use parla_core::speech::CaptureStop;
use parla_core::{
    Availability, ConversationState, Message, PlaybackEvent, SpeechCapture, SpeechPlayback,
    Turn, TurnError, TurnOrchestrator, UtteranceId,
};
use ratatui::layout::Rect;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    User,
    Bot,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub conversation: ConversationState,
    /// Write the language pair to the config file when it changes
    pub persist_languages: bool,

    // Collaborators
    pub orchestrator: Arc<TurnOrchestrator>,
    pub availability: watch::Receiver<Availability>,
    pub playback: Option<Arc<dyn SpeechPlayback>>,
    pub capture: Arc<dyn SpeechCapture>,

    // Input line
    pub input: String,
    pub cursor: usize,

    // Background work
    pub turn_task: Option<JoinHandle<Result<Option<Turn>, TurnError>>>,
    pub pending_utterance: Option<String>,
    pub capture_task: Option<JoinHandle<Option<String>>>,
    pub capture_stop: Option<CaptureStop>,

    // Indicators
    pub is_listening: bool,
    /// Utterance currently playing, if any
    pub speaking: Option<UtteranceId>,
    pub notice: Option<String>,
    pub animation_frame: u8,

    // Panel geometry, filled in by the renderer
    pub user_scroll: u16,
    pub bot_scroll: u16,
    pub user_area: Option<Rect>,
    pub bot_area: Option<Rect>,
    pub user_panel_height: u16,
    pub user_panel_width: u16,
    pub bot_panel_height: u16,
    pub bot_panel_width: u16,
}

impl App {
    pub fn new(
        conversation: ConversationState,
        orchestrator: Arc<TurnOrchestrator>,
        availability: watch::Receiver<Availability>,
        playback: Option<Arc<dyn SpeechPlayback>>,
        capture: Arc<dyn SpeechCapture>,
    ) -> Self {
        Self {
            should_quit: false,
            conversation,
            persist_languages: false,

            orchestrator,
            availability,
            playback,
            capture,

            input: String::new(),
            cursor: 0,

            turn_task: None,
            pending_utterance: None,
            capture_task: None,
            capture_stop: None,

            is_listening: false,
            speaking: None,
            notice: None,
            animation_frame: 0,

            user_scroll: 0,
            bot_scroll: 0,
            user_area: None,
            bot_area: None,
            user_panel_height: 0,
            user_panel_width: 0,
            bot_panel_height: 0,
            bot_panel_width: 0,
        }
    }

    pub fn current_availability(&self) -> Availability {
        self.availability.borrow().clone()
    }

    pub fn is_thinking(&self) -> bool {
        self.turn_task.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    /// Send whatever is in the input line
    pub fn submit_input(&mut self) {
        if self.turn_task.is_some() {
            self.notice = Some("Still waiting for the previous reply".to_string());
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.submit(text);
    }

    /// Start a turn in the background. Blank input is ignored.
    pub fn submit(&mut self, utterance: String) {
        if utterance.trim().is_empty() {
            return;
        }
        if self.turn_task.is_some() {
            self.notice = Some("Still waiting for the previous reply".to_string());
            return;
        }

        let orchestrator = self.orchestrator.clone();
        let source = self.conversation.source_lang.clone();
        let target = self.conversation.target_lang.clone();
        let availability = self.current_availability();

        self.pending_utterance = Some(utterance.clone());
        self.scroll_to_bottom();

        self.turn_task = Some(tokio::spawn(async move {
            orchestrator
                .submit(&utterance, &source, &target, &availability)
                .await
        }));
    }

    /// Collect finished background tasks
    pub async fn poll_tasks(&mut self) {
        if self.turn_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.turn_task.take() {
                self.pending_utterance = None;
                match task.await {
                    Ok(Ok(Some(turn))) => self.finish_turn(turn),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => self.notice = Some(e.to_string()),
                    Err(e) => warn!(error = %e, "turn task failed"),
                }
            }
        }

        if self.capture_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.capture_task.take() {
                self.is_listening = false;
                self.capture_stop = None;
                match task.await {
                    Ok(Some(transcript)) => {
                        info!("speech transcript received");
                        self.submit(transcript);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "capture task failed"),
                }
            }
        }
    }

    /// Append both messages, then speak the reply
    pub fn finish_turn(&mut self, turn: Turn) {
        let reply = turn.bot.clone();
        self.conversation.apply_turn(turn);
        self.scroll_to_bottom();
        self.speak(&reply);
    }

    fn speak(&mut self, message: &Message) {
        if let Some(playback) = &self.playback {
            playback.speak(&message.text, &message.lang);
        }
    }

    /// Speak the most recent bot message again
    pub fn replay_last(&mut self) {
        match self.conversation.last_bot_message().cloned() {
            Some(message) if self.playback.is_some() => self.speak(&message),
            Some(_) => self.notice = Some("Speech playback is not available".to_string()),
            None => {}
        }
    }

    /// Events from a replaced utterance can arrive after its successor has
    /// started; only the current one may clear the indicator.
    pub fn on_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started(id) => self.speaking = Some(id),
            PlaybackEvent::Ended(id) => self.finish_speaking(id),
            PlaybackEvent::Errored(id, e) => {
                warn!(error = %e, utterance = id, "speech playback failed");
                self.finish_speaking(id);
            }
        }
    }

    fn finish_speaking(&mut self, id: UtteranceId) {
        if self.speaking == Some(id) {
            self.speaking = None;
        }
    }

    /// Start listening, or stop if already listening
    pub fn toggle_listening(&mut self) {
        if self.is_listening {
            if let Some(stop) = self.capture_stop.as_mut() {
                stop.stop();
            }
            self.is_listening = false;
            return;
        }

        match self.capture.start(&self.conversation.source_lang) {
            Ok(session) => {
                self.capture_stop = Some(session.stop);
                let transcript = session.transcript;
                self.capture_task = Some(tokio::spawn(async move { transcript.recv().await }));
                self.is_listening = true;
            }
            Err(e) => {
                warn!(error = %e, "speech capture unavailable");
                self.notice = Some(e.to_string());
            }
        }
    }

    pub fn swap_languages(&mut self) {
        self.conversation.swap_languages();
        self.languages_changed();
    }

    pub fn cycle_source(&mut self) {
        let next = language::next_code(&self.conversation.source_lang);
        self.conversation.set_source(next);
        self.languages_changed();
    }

    pub fn cycle_target(&mut self) {
        let next = language::next_code(&self.conversation.target_lang);
        self.conversation.set_target(next);
        self.languages_changed();
    }

    fn languages_changed(&mut self) {
        if !self.persist_languages {
            return;
        }
        if let Err(e) = Config::save_languages(
            &self.conversation.source_lang,
            &self.conversation.target_lang,
        ) {
            warn!(error = %e, "failed to save language selection");
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_thinking() || self.is_listening || self.is_speaking() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll(&mut self, pane: Pane, delta: i32) {
        let scroll = match pane {
            Pane::User => &mut self.user_scroll,
            Pane::Bot => &mut self.bot_scroll,
        };
        *scroll = if delta < 0 {
            scroll.saturating_sub(delta.unsigned_abs() as u16)
        } else {
            scroll.saturating_add(delta as u16)
        };
    }

    /// Scroll both panels so the newest message is visible
    pub fn scroll_to_bottom(&mut self) {
        // Panel sizes are unknown until the first render
        let (user_width, user_height) = panel_size(self.user_panel_width, self.user_panel_height);
        let (bot_width, bot_height) = panel_size(self.bot_panel_width, self.bot_panel_height);

        let mut user_lines = count_lines(self.conversation.user_messages(), user_width);
        if let Some(pending) = &self.pending_utterance {
            user_lines = user_lines.saturating_add(wrapped_height(pending, user_width));
        }
        let mut bot_lines = count_lines(self.conversation.bot_messages(), bot_width);
        if self.pending_utterance.is_some() {
            bot_lines = bot_lines.saturating_add(1); // "Thinking..."
        }

        self.user_scroll = scroll_offset(user_lines, user_height);
        self.bot_scroll = scroll_offset(bot_lines, bot_height);
    }
}

fn panel_size(width: u16, height: u16) -> (usize, usize) {
    let width = if width > 0 { width } else { 40 };
    let height = if height > 0 { height } else { 20 };
    (width as usize, height as usize)
}

fn scroll_offset(lines: usize, visible: usize) -> u16 {
    u16::try_from(lines.saturating_sub(visible)).unwrap_or(u16::MAX)
}

/// Rows needed to show `text` wrapped at `width` terminal cells
fn wrapped_height(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| {
            // Wide (CJK) characters take two cells and never straddle a row
            let mut rows = 1usize;
            let mut col = 0;
            for c in line.chars() {
                let w = c.width().unwrap_or(0);
                if col > 0 && col + w > width {
                    rows += 1;
                    col = 0;
                }
                col += w;
            }
            rows
        })
        .fold(0, usize::saturating_add)
        .max(1)
}

/// Each message takes its wrapped text plus a blank separator line
fn count_lines<'a>(messages: impl Iterator<Item = &'a Message>, width: usize) -> usize {
    messages
        .map(|m| wrapped_height(&m.text, width).saturating_add(1))
        .fold(0, usize::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use parla_core::speech::UnsupportedCapture;
    use parla_core::{
        GenerationRequest, Generator, IdSequence, Sender, TemplatePicker, Translator,
    };
    use std::sync::Mutex;

    struct OfflineGenerator;

    #[async_trait]
    impl Generator for OfflineGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            Err(anyhow!("offline"))
        }
    }

    struct UpperTranslator;

    #[async_trait]
    impl Translator for UpperTranslator {
        async fn translate(&self, text: &str, _from: &str, _to: &str) -> String {
            text.to_uppercase()
        }
    }

    struct FirstTemplate;

    impl TemplatePicker for FirstTemplate {
        fn pick(&self, _len: usize) -> usize {
            0
        }
    }

    #[derive(Default)]
    struct RecordingPlayback(Mutex<Vec<(String, String)>>);

    impl SpeechPlayback for RecordingPlayback {
        fn speak(&self, text: &str, lang: &str) {
            self.0.lock().unwrap().push((text.to_string(), lang.to_string()));
        }

        fn cancel(&self) {}
    }

    fn test_app(playback: Option<Arc<dyn SpeechPlayback>>) -> App {
        let ids = IdSequence::new();
        let orchestrator = Arc::new(TurnOrchestrator::new(
            Arc::new(OfflineGenerator),
            Arc::new(UpperTranslator),
            Arc::new(FirstTemplate),
            ids.clone(),
        ));
        let (_tx, rx) = watch::channel(Availability::Unavailable);
        App::new(
            ConversationState::new("en-US", "en-US", &ids),
            orchestrator,
            rx,
            playback,
            Arc::new(UnsupportedCapture),
        )
    }

    async fn settle(app: &mut App) {
        while app.turn_task.is_some() || app.capture_task.is_some() {
            tokio::task::yield_now().await;
            app.poll_tasks().await;
        }
    }

    #[tokio::test]
    async fn test_blank_input_does_nothing() {
        let mut app = test_app(None);
        app.input = "   ".to_string();
        app.submit_input();

        assert!(app.turn_task.is_none());
        assert_eq!(app.conversation.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_turn_appends_and_speaks() {
        let playback = Arc::new(RecordingPlayback::default());
        let mut app = test_app(Some(playback.clone() as Arc<dyn SpeechPlayback>));
        app.input = "hello".to_string();
        app.cursor = 5;

        app.submit_input();
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert_eq!(app.pending_utterance.as_deref(), Some("hello"));

        settle(&mut app).await;

        let messages = &app.conversation.messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[2].text, "HELLO? That is very interesting.");
        assert!(app.pending_utterance.is_none());

        let spoken = playback.0.lock().unwrap();
        assert_eq!(
            spoken.as_slice(),
            &[("HELLO? That is very interesting.".to_string(), "en-US".to_string())]
        );
    }

    #[tokio::test]
    async fn test_second_submit_while_pending_is_refused() {
        let mut app = test_app(None);
        app.submit("one".to_string());
        app.input = "two".to_string();
        app.submit_input();

        assert!(app.notice.is_some());
        assert_eq!(app.input, "two");

        settle(&mut app).await;
        assert_eq!(app.conversation.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_capture_shows_notice() {
        let mut app = test_app(None);
        app.toggle_listening();

        assert!(!app.is_listening);
        assert!(app.notice.as_deref().unwrap().contains("not available"));
        assert_eq!(app.conversation.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_replay_without_playback_shows_notice() {
        let mut app = test_app(None);
        app.replay_last();
        assert!(app.notice.is_some());
    }

    #[tokio::test]
    async fn test_playback_events_drive_indicator() {
        let mut app = test_app(None);
        app.on_playback(PlaybackEvent::Started(1));
        assert!(app.is_speaking());
        app.on_playback(PlaybackEvent::Errored(1, "boom".to_string()));
        assert!(!app.is_speaking());
    }

    #[tokio::test]
    async fn test_replay_during_playback_keeps_indicator() {
        let mut app = test_app(None);
        app.on_playback(PlaybackEvent::Started(1));

        // Replay cancels utterance 1; its end arrives after 2 has started
        app.on_playback(PlaybackEvent::Started(2));
        app.on_playback(PlaybackEvent::Ended(1));
        assert!(app.is_speaking());

        app.on_playback(PlaybackEvent::Ended(2));
        assert!(!app.is_speaking());
    }

    #[tokio::test]
    async fn test_language_cycling_and_swap() {
        let mut app = test_app(None);
        app.cycle_target();
        assert_eq!(app.conversation.target_lang, "ja-JP");

        app.swap_languages();
        app.swap_languages();
        assert_eq!(app.conversation.source_lang, "en-US");
        assert_eq!(app.conversation.target_lang, "ja-JP");
    }

    #[test]
    fn test_wrapped_height_counts_cells() {
        assert_eq!(wrapped_height("", 10), 1);
        assert_eq!(wrapped_height("hello", 5), 1);
        assert_eq!(wrapped_height("hello!", 5), 2);
        assert_eq!(wrapped_height("a\nb", 10), 2);
        // Two cells per character, two characters per row
        assert_eq!(wrapped_height("こんにちは", 10), 1);
        assert_eq!(wrapped_height("こんにちは", 5), 3);
        assert_eq!(wrapped_height("こんにちは", 4), 3);
    }

    #[test]
    fn test_long_log_does_not_overflow() {
        let long = "a".repeat(70_000);
        assert_eq!(wrapped_height(&long, 1), 70_000);
        assert_eq!(scroll_offset(usize::MAX, 10), u16::MAX);

        let ids = IdSequence::new();
        let messages: Vec<Message> = (0..3).map(|_| Message::bot(ids.next(), &long, "en-US")).collect();
        assert_eq!(count_lines(messages.iter(), 1), 3 * 70_001);
    }

    fn add_reply(app: &mut App, ids: &IdSequence, reply: &str) {
        app.conversation.apply_turn(Turn {
            user: Message::user(ids.next(), "q", "en-US"),
            bot: Message::bot(ids.next(), reply, "ja-JP"),
        });
    }

    fn screen_text(terminal: &ratatui::Terminal<ratatui::backend::TestBackend>) -> String {
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[tokio::test]
    async fn test_newest_cjk_reply_visible_after_scroll() {
        let mut app = test_app(None);
        let ids = IdSequence::new();
        for _ in 0..8 {
            add_reply(&mut app, &ids, "今日はとても良い天気ですね散歩");
        }
        add_reply(&mut app, &ids, "ZZLAST");

        let mut terminal = ratatui::Terminal::new(ratatui::backend::TestBackend::new(44, 20)).unwrap();
        terminal.draw(|frame| crate::ui::render(&mut app, frame)).unwrap();
        assert_eq!(app.bot_panel_width, 20);
        assert_eq!(app.bot_panel_height, 13);
        assert_eq!(app.user_panel_height, 10);

        app.scroll_to_bottom();
        terminal.draw(|frame| crate::ui::render(&mut app, frame)).unwrap();

        // Greeting and each reply wrap to two rows plus a separator
        assert_eq!(app.bot_scroll, (3 + 8 * 3 + 2) - 13);
        assert!(screen_text(&terminal).contains("ZZLAST"));
    }
}
