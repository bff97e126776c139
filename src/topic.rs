use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Conversational categories that can be answered without generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Greeting,
    Farewell,
    Thanks,
    About,
}

impl Topic {
    /// Canonical order. When a query matches phrases of several topics the
    /// earliest topic in this list wins.
    pub const ALL: [Topic; 4] = [Topic::Greeting, Topic::Farewell, Topic::Thanks, Topic::About];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Greeting => "greeting",
            Topic::Farewell => "farewell",
            Topic::Thanks => "thanks",
            Topic::About => "about",
        }
    }

    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            Topic::Greeting => GREETING_PHRASES,
            Topic::Farewell => FAREWELL_PHRASES,
            Topic::Thanks => THANKS_PHRASES,
            Topic::About => ABOUT_PHRASES,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const GREETING_PHRASES: &[&str] = &[
    "afternoon", "bonjour", "ciao", "evening", "good afternoon", "good day", "good evening",
    "good night", "greetings", "guten tag", "hello", "hello afternoon", "hello evening", "hey",
    "hey afternoon", "hey evening", "hey there", "hi", "hi there", "hola", "howdy",
    "is anyone there?", "konnichiwa", "namaste", "night", "ola", "salut", "sawubona",
];

const FAREWELL_PHRASES: &[&str] = &[
    "adios", "au revoir", "bye", "bye then", "catch you later", "ciao", "fare thee well",
    "farewell", "good night", "goodbye", "goodnight", "hello night", "hey night", "later",
    "night", "ok bye", "sayonara", "see you", "see you later", "so long", "take care",
    "until next time",
];

const THANKS_PHRASES: &[&str] = &[
    "thanks", "thank you", "that's helpful", "thanks for the help", "thank you very much",
    "appreciate it", "cheers", "gracias", "much obliged", "you're the best", "thanks a bunch",
    "you rock",
];

const ABOUT_PHRASES: &[&str] = &[
    "who are you?", "what are you?", "who you are?", "tell me more about yourself.",
    "what is your name?", "what should i call you?", "what's your name?", "tell me about yourself",
    "introduce yourself", "what can you do?", "what's your purpose?", "explain yourself",
    "what do you do?", "what's your function?", "who created you?",
];

lazy_static! {
    static ref TOPIC_PATTERNS: Vec<(Topic, Regex)> = Topic::ALL
        .iter()
        .map(|&topic| {
            let alternatives: Vec<String> =
                topic.phrases().iter().map(|phrase| phrase_pattern(phrase)).collect();
            let regex = Regex::new(&format!("(?:{})", alternatives.join("|")))
                .expect("topic phrase patterns are valid");
            (topic, regex)
        })
        .collect();
}

/// Build a whole-phrase pattern for one trigger phrase.
///
/// Word boundaries are only required at edges that are word characters;
/// a phrase ending in "?" or "." still matches at the end of the query.
fn phrase_pattern(phrase: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let mut pattern = String::new();
    if is_word(phrase.chars().next()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(phrase));
    if is_word(phrase.chars().last()) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn normalize(query: &str) -> String {
    query.nfc().collect::<String>().to_lowercase().trim().to_string()
}

/// Classify a query into a conversational topic.
///
/// Returns `None` for substantive questions, including the empty query.
pub fn classify(query: &str) -> Option<Topic> {
    let normalized = normalize(query);
    if normalized.is_empty() {
        return None;
    }

    TOPIC_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(&normalized))
        .map(|(topic, _)| *topic)
}
