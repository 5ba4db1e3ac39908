//! Reply generation for one user utterance
//!
//! Tier A asks the local model for a reply in the target language. When the
//! model server is not available, or the single attempt fails, Tier B echoes
//! the utterance translated into the target language followed by a generic
//! filler line, also translated. Neither tier retries.

use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ai::{GenerationRequest, Generator, Translator};
use crate::availability::Availability;
use crate::error::TurnError;
use crate::language;
use crate::prompt;
pub use crate::state::Turn;
use crate::state::{IdSequence, Message};

/// Conversational fillers used by the fallback tier, written in English
pub const FALLBACK_TEMPLATES: &[&str] = &[
    "That is very interesting.",
    "I understand, please tell me more.",
    "Could you explain that in detail?",
    "That's a good point.",
];

/// Language the fallback templates are written in
const TEMPLATE_LANG: &str = "en-US";

/// Picks which fallback template to use
pub trait TemplatePicker: Send + Sync {
    /// Index in `0..len`; `len` is never zero
    fn pick(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTemplatePicker;

impl TemplatePicker for RandomTemplatePicker {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

pub struct TurnOrchestrator {
    generator: Arc<dyn Generator>,
    translator: Arc<dyn Translator>,
    picker: Arc<dyn TemplatePicker>,
    ids: IdSequence,
    in_flight: Mutex<()>,
}

impl TurnOrchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        translator: Arc<dyn Translator>,
        picker: Arc<dyn TemplatePicker>,
        ids: IdSequence,
    ) -> Self {
        Self {
            generator,
            translator,
            picker,
            ids,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one turn unless another is still in flight.
    ///
    /// Turns are serialized per orchestrator: while a previous call is
    /// waiting on a collaborator this returns `TurnError::Busy` immediately
    /// and produces no messages.
    pub async fn submit(
        &self,
        utterance: &str,
        source_lang: &str,
        target_lang: &str,
        availability: &Availability,
    ) -> Result<Option<Turn>, TurnError> {
        let _slot = self.in_flight.try_lock().map_err(|_| TurnError::Busy)?;
        Ok(self
            .produce_turn(utterance, source_lang, target_lang, availability)
            .await)
    }

    /// Produce the user message and the bot reply for `utterance`.
    ///
    /// Whitespace-only input yields `None`. Otherwise exactly one user and one
    /// bot message come back; collaborator failures only change which text the
    /// bot message carries.
    pub async fn produce_turn(
        &self,
        utterance: &str,
        source_lang: &str,
        target_lang: &str,
        availability: &Availability,
    ) -> Option<Turn> {
        if utterance.trim().is_empty() {
            return None;
        }

        let user = Message::user(self.ids.next(), utterance, source_lang);

        let reply = match self.generated_reply(utterance, target_lang, availability).await {
            Some(reply) => reply,
            None => self.fallback_reply(utterance, source_lang, target_lang).await,
        };

        let bot = Message::bot(self.ids.next(), &reply, target_lang);
        Some(Turn { user, bot })
    }

    /// Tier A. `None` means fall back.
    async fn generated_reply(
        &self,
        utterance: &str,
        target_lang: &str,
        availability: &Availability,
    ) -> Option<String> {
        let model = availability.model()?;
        let language_name = language::display_name(target_lang);

        let request = GenerationRequest {
            model: model.to_string(),
            prompt: prompt::user_prompt(utterance, language_name),
            system: prompt::system_instruction(language_name),
        };

        match self.generator.generate(&request).await {
            Ok(reply) if !reply.trim().is_empty() => {
                debug!(model, target_lang, "using generated reply");
                Some(reply)
            }
            Ok(_) => {
                warn!(model, "model returned an empty reply, falling back");
                None
            }
            Err(e) => {
                warn!(error = %e, model, "generation failed, falling back");
                None
            }
        }
    }

    /// Tier B: "{translated utterance}? {translated template}"
    async fn fallback_reply(&self, utterance: &str, source_lang: &str, target_lang: &str) -> String {
        let translated_input = self
            .translator
            .translate(utterance, source_lang, target_lang)
            .await;

        let idx = self.picker.pick(FALLBACK_TEMPLATES.len()) % FALLBACK_TEMPLATES.len();
        let template = FALLBACK_TEMPLATES[idx];

        let translated_template = if language::is_english(target_lang) {
            template.to_string()
        } else {
            self.translator
                .translate(template, TEMPLATE_LANG, target_lang)
                .await
        };

        debug!(target_lang, template, "using fallback reply");
        format!("{}? {}", translated_input, translated_template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Sender;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Returns a fixed result and records every request
    struct StubGenerator {
        reply: Result<String, String>,
        requests: StdMutex<Vec<GenerationRequest>>,
    }

    impl StubGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    /// Dictionary translator; unknown text passes through like a failed call
    #[derive(Default)]
    struct StubTranslator {
        table: HashMap<String, String>,
        calls: StdMutex<Vec<(String, String, String)>>,
    }

    impl StubTranslator {
        fn with(pairs: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                table: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Translator for StubTranslator {
        async fn translate(&self, text: &str, from: &str, to: &str) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), from.to_string(), to.to_string()));
            self.table.get(text).cloned().unwrap_or_else(|| text.to_string())
        }
    }

    struct FixedPicker(usize);

    impl TemplatePicker for FixedPicker {
        fn pick(&self, _len: usize) -> usize {
            self.0
        }
    }

    fn orchestrator(generator: Arc<StubGenerator>, translator: Arc<StubTranslator>) -> TurnOrchestrator {
        TurnOrchestrator::new(generator, translator, Arc::new(FixedPicker(0)), IdSequence::new())
    }

    fn available() -> Availability {
        Availability::Available { model: "llama3.2".to_string() }
    }

    #[tokio::test]
    async fn test_fallback_scenario_japanese() {
        let translator = StubTranslator::with(&[
            ("Hello", "こんにちは"),
            ("That is very interesting.", "なるほど"),
        ]);
        let orch = orchestrator(StubGenerator::failing(), translator.clone());

        let turn = orch
            .produce_turn("Hello", "en-US", "ja-JP", &Availability::Unavailable)
            .await
            .unwrap();

        assert_eq!(turn.bot.text, "こんにちは? なるほど");
        assert_eq!(turn.bot.lang, "ja-JP");
        assert_eq!(
            translator.calls(),
            vec![
                ("Hello".to_string(), "en-US".to_string(), "ja-JP".to_string()),
                ("That is very interesting.".to_string(), "en-US".to_string(), "ja-JP".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_generated_reply_used_verbatim() {
        let generator = StubGenerator::replying("元気ですか？");
        let translator = StubTranslator::with(&[("Hello", "こんにちは")]);
        let orch = orchestrator(generator.clone(), translator.clone());

        let turn = orch
            .produce_turn("Hello", "en-US", "ja-JP", &available())
            .await
            .unwrap();

        assert_eq!(turn.bot.text, "元気ですか？");
        assert!(translator.calls().is_empty());

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama3.2");
        assert!(requests[0].system.contains("Japanese"));
        assert!(requests[0].prompt.ends_with("Hello"));
    }

    #[tokio::test]
    async fn test_generation_error_falls_back_once() {
        let generator = StubGenerator::failing();
        let translator = StubTranslator::with(&[("Hello", "こんにちは")]);
        let orch = orchestrator(generator.clone(), translator);

        let turn = orch
            .produce_turn("Hello", "en-US", "ja-JP", &available())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(turn.bot.text, "こんにちは? That is very interesting.");
    }

    #[tokio::test]
    async fn test_blank_generation_falls_back() {
        let orch = orchestrator(StubGenerator::replying("  \n"), StubTranslator::with(&[]));

        let turn = orch
            .produce_turn("Bonjour", "fr-FR", "en-US", &available())
            .await
            .unwrap();

        assert_eq!(turn.bot.text, "Bonjour? That is very interesting.");
    }

    #[tokio::test]
    async fn test_unavailable_skips_generator() {
        let generator = StubGenerator::replying("should not be used");
        let orch = orchestrator(generator.clone(), StubTranslator::with(&[]));

        orch.produce_turn("Hi", "en-US", "ja-JP", &Availability::Unavailable).await;
        orch.produce_turn("Hi", "en-US", "ja-JP", &Availability::Checking).await;

        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_english_target_uses_template_verbatim() {
        let translator = StubTranslator::with(&[("你好", "Hello")]);
        let orch = TurnOrchestrator::new(
            StubGenerator::failing(),
            translator.clone(),
            Arc::new(FixedPicker(3)),
            IdSequence::new(),
        );

        let turn = orch
            .produce_turn("你好", "zh-TW", "en-US", &Availability::Unavailable)
            .await
            .unwrap();

        assert_eq!(turn.bot.text, "Hello? That's a good point.");
        assert_eq!(translator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_translation_failure_passes_through() {
        // An empty table behaves like a translator whose calls all failed
        let orch = orchestrator(StubGenerator::failing(), StubTranslator::with(&[]));

        let turn = orch
            .produce_turn("Hello", "en-US", "ja-JP", &Availability::Unavailable)
            .await
            .unwrap();

        assert_eq!(turn.bot.text, "Hello? That is very interesting.");
    }

    #[tokio::test]
    async fn test_blank_utterance_produces_nothing() {
        let translator = StubTranslator::with(&[]);
        let orch = orchestrator(StubGenerator::replying("hi"), translator.clone());

        assert!(orch.produce_turn("", "en-US", "ja-JP", &available()).await.is_none());
        assert!(orch.produce_turn(" \t\n", "en-US", "ja-JP", &available()).await.is_none());
        assert!(translator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_turn_has_one_user_and_one_bot_message() {
        let orch = orchestrator(StubGenerator::replying("はい"), StubTranslator::with(&[]));

        let turn = orch
            .produce_turn("  Hello  ", "en-US", "ja-JP", &available())
            .await
            .unwrap();

        assert_eq!(turn.user.sender, Sender::User);
        assert_eq!(turn.user.text, "  Hello  ");
        assert_eq!(turn.user.lang, "en-US");
        assert_eq!(turn.bot.sender, Sender::Bot);
        assert!(turn.user.id < turn.bot.id);
    }

    #[tokio::test]
    async fn test_template_always_from_fixed_set() {
        let orch = TurnOrchestrator::new(
            StubGenerator::failing(),
            StubTranslator::with(&[]),
            Arc::new(RandomTemplatePicker),
            IdSequence::new(),
        );

        for _ in 0..20 {
            let turn = orch
                .produce_turn("Hi", "ja-JP", "en-US", &Availability::Unavailable)
                .await
                .unwrap();
            let template = turn.bot.text.strip_prefix("Hi? ").unwrap();
            assert!(FALLBACK_TEMPLATES.contains(&template));
        }
    }

    /// Generator that blocks until told to answer
    struct GatedGenerator(tokio::sync::Notify);

    #[async_trait]
    impl Generator for GatedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            self.0.notified().await;
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_reentrant_turn() {
        let gate = Arc::new(GatedGenerator(tokio::sync::Notify::new()));
        let orch = Arc::new(TurnOrchestrator::new(
            gate.clone(),
            StubTranslator::with(&[]),
            Arc::new(FixedPicker(0)),
            IdSequence::new(),
        ));

        let first = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.submit("one", "en-US", "ja-JP", &available()).await
            })
        };

        // Let the first turn reach the generator
        while orch.in_flight.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        let second = orch.submit("two", "en-US", "ja-JP", &available()).await;
        assert_eq!(second, Err(TurnError::Busy));

        gate.0.notify_one();
        let turn = first.await.unwrap().unwrap().unwrap();
        assert_eq!(turn.bot.text, "done");

        // Slot is free again
        gate.0.notify_one();
        let third = orch.submit("three", "en-US", "ja-JP", &available()).await;
        assert!(matches!(third, Ok(Some(_))));
    }
}
