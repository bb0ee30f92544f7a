//! Templated fallback replies.
//!
//! Used whenever the generation backend is absent, slow, failing, or its
//! circuit is open. The inbound text is lowercased and trimmed, then matched
//! against keyword categories top to bottom; the first hit picks the
//! template set. `{name}` in a template is replaced by the sender's display
//! name.

use rand::Rng;

/// Keyword category of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCategory {
    Greeting,
    HowAreYou,
    HelpRequest,
    Thanks,
    WorkAffairs,
    Question,
    Statement,
}

// Plain substring keywords, checked in order. "hi" deliberately also matches
// inside words such as "this" and "which"; do not add word boundaries.
const RULES: &[(ReplyCategory, &[&str])] = &[
    (ReplyCategory::Greeting, &["привет", "hi", "hello"]),
    (ReplyCategory::HowAreYou, &["как дела", "как ты"]),
    (ReplyCategory::HelpRequest, &["помощь", "help"]),
    (ReplyCategory::Thanks, &["спасибо", "thanks"]),
    (ReplyCategory::WorkAffairs, &["работа", "дела"]),
    (ReplyCategory::Question, &["?"]),
];

const GREETING: &[&str] = &[
    "Привет, {name}! Как дела? 😊",
    "Здравствуй, {name}! Чем могу помочь?",
    "Привет! Рад тебя видеть, {name}!",
];

const HOW_ARE_YOU: &[&str] = &[
    "Спасибо что спросил, {name}! Дела отлично, изучаю новое и готов к интересным задачам! А у тебя как?",
];

const HELP_REQUEST: &[&str] =
    &["Конечно, {name}! Я готов помочь. Что конкретно тебя интересует?"];

const THANKS: &[&str] = &["Пожалуйста, {name}! Рад был помочь! 👍"];

const WORK_AFFAIRS: &[&str] = &[
    "Понимаю, {name}. Работа бывает разной. Если нужна помощь или совет - обращайся!",
];

const QUESTION: &[&str] = &[
    "Интересный вопрос, {name}! Дай-ка подумаю... Это зависит от контекста, но я готов обсудить это с тобой.",
];

const STATEMENT: &[&str] = &[
    "Понятно, {name}! Расскажи подробнее, что думаешь об этом?",
    "Интересно, {name}! Я слушаю.",
    "{name}, это любопытно. Какие у тебя мысли на этот счет?",
    "Понял тебя, {name}. А что ты об этом думаешь?",
    "{name}, давай разберем это вместе!",
];

impl ReplyCategory {
    /// Classify lowercased, trimmed `text`.
    pub fn classify(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(ReplyCategory::Statement)
    }

    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            ReplyCategory::Greeting => GREETING,
            ReplyCategory::HowAreYou => HOW_ARE_YOU,
            ReplyCategory::HelpRequest => HELP_REQUEST,
            ReplyCategory::Thanks => THANKS,
            ReplyCategory::WorkAffairs => WORK_AFFAIRS,
            ReplyCategory::Question => QUESTION,
            ReplyCategory::Statement => STATEMENT,
        }
    }
}

/// Deterministic-by-category, random-within-category reply generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Reply to `text` from `name` using the thread-local RNG.
    pub fn generate(&self, text: &str, name: &str) -> String {
        self.generate_with(text, name, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, text: &str, name: &str, rng: &mut R) -> String {
        let templates = ReplyCategory::classify(text).templates();
        let template = templates[rng.gen_range(0..templates.len())];
        let name = if name.trim().is_empty() {
            crate::bus::message::UNKNOWN_SENDER_NAME
        } else {
            name
        };
        template.replace("{name}", name)
    }
}
