//! Layered heuristic scope classifier.
//!
//! Labels a question as [`ScopeDecision::SafetyOverride`],
//! [`ScopeDecision::Greeting`], [`ScopeDecision::InScope`] or
//! [`ScopeDecision::OutOfScope`]. Layers are evaluated in priority order and
//! the first one that fires wins:
//!
//! | Layer | Fires when | Decision |
//! |-------|-----------|----------|
//! | 1. Safety | any crisis phrase is present | `SafetyOverride` |
//! | 2. Greeting | a greeting pattern matches, or ≤ 3 words equal a short greeting token | `Greeting(kind)` |
//! | 3. School | any school term matches on word boundaries | `InScope` |
//! | 4a. Arithmetic | bare arithmetic / `what is N op N` | `OutOfScope` |
//! | 4b. Unrelated | an unrelated topic term or pattern | `OutOfScope` |
//! | 4c. Homework | a solve-this pattern without a policy/schedule qualifier | `OutOfScope` |
//! | default | nothing above | `InScope` |
//!
//! Layer 4 is only reached when no school term matched, so its checks are
//! implicitly "without school context".
//!
//! The classifier is a pure, total function: every string (including the
//! empty string) gets a decision.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use crate::models::{GreetingKind, ScopeDecision};
use crate::text::{contains_term, normalize, word_count};

static GREETING_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b(hi|hello|hey|greetings|howdy)\b",
        r"\bwhat'?s\s+up\b",
        r"\bhow\s+are\s+you\b",
        r"\bhow\s+do\s+you\s+do\b",
        r"\bgood\s+(morning|afternoon|evening|day)\b",
        r"\bnice\s+to\s+meet\s+you\b",
    ])
    .expect("greeting patterns are valid")
});

static HOW_ARE_YOU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bhow\s+(are\s+you|do\s+you\s+do)\b").expect("pattern is valid")
});

static WHATS_UP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(what'?s\s+up|sup)\b").expect("pattern is valid"));

static ARITHMETIC_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bwhat\s+is\s+-?\d+(\.\d+)?\s*([-+*/×÷^x]|plus|minus|times|divided\s+by)\s*-?\d+",
        r"\b\d+(\.\d+)?\s*[+*/×÷^]\s*\d+",
        r"^[\s\d.()+\-*/×÷^=?]*\d\s*[-+*/×÷^]\s*\d[\s\d.()+\-*/×÷^=?]*$",
    ])
    .expect("arithmetic patterns are valid")
});

/// School-year ranges such as `2025/2026`, `2024-25`. Removed before the
/// arithmetic check.
static YEAR_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(19|20)\d{2}\s*[-/–]\s*((19|20)\d{2}|\d{2})\b")
        .expect("year range pattern is valid")
});

static UNRELATED_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^\s*who\s+(is|was|were|invented|discovered)\b",
        r"\bwhat\s+(is|are)\s+(the\s+)?(photosynthesis|gravity|evolution|atoms?|molecules?|dna|rna|speed\s+of\s+light|meaning\s+of\s+life)\b",
        r"\b(law|theory|formula)\s+(of|for)\b",
    ])
    .expect("unrelated patterns are valid")
});

static HOMEWORK_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bsolve\s+(this|that|the|my)\s+(problem|equation|question)",
        r"\b(calculate|compute|evaluate)\s+",
        r"\banswer\s+(this|that|the)\s+(question|problem)",
        r"\bhelp\s+me\s+(solve|with|do)\s+(this|my|the)\s+(homework|assignment|problem|worksheet)",
        r"\bwhat\s+is\s+the\s+answer\s+to\b",
        r"\bhow\s+do\s+i\s+(solve|calculate|find)\b",
        r"\bexplain\s+(how|why)\s+to\s+(solve|calculate)\b",
        r"\b(test|quiz|exam)\s+(question|answer)s?\b",
        r"\b(homework|assignment|worksheet)\s+(help|question|problem|answer)s?\b",
        r"\bwrite\s+(my|an?)\s+(essay|paper)\b",
    ])
    .expect("homework patterns are valid")
});

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Keyword lists driving the classifier. Tunable without touching the
/// layer logic; the regex pattern sets are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRules {
    /// Substring match. Any hit forces `SafetyOverride`.
    pub crisis_phrases: Vec<String>,
    /// Whole-message greeting tokens for messages of ≤ 3 words.
    pub short_greetings: Vec<String>,
    /// Word-boundary match. Any hit means `InScope`.
    pub school_terms: Vec<String>,
    /// Word-boundary match. Any hit (with no school term) means `OutOfScope`.
    pub unrelated_terms: Vec<String>,
    /// Qualifiers that turn a homework-looking question into a policy question.
    pub homework_qualifiers: Vec<String>,
}

impl Default for ScopeRules {
    fn default() -> Self {
        Self {
            crisis_phrases: owned(&[
                "kill myself",
                "killing myself",
                "suicide",
                "suicidal",
                "end my life",
                "end it all",
                "want to die",
                "wanna die",
                "self harm",
                "self-harm",
                "hurt myself",
                "hurting myself",
                "cut myself",
                "cutting myself",
                "no reason to live",
                "better off dead",
                "overdose",
            ]),
            short_greetings: owned(&["hi", "hello", "hey", "sup", "yo", "hiya"]),
            school_terms: owned(&[
                // school vocabulary
                "school",
                "high school",
                "academic",
                "course",
                "class",
                "grade",
                "gpa",
                "credit",
                "graduation",
                "graduate",
                "diploma",
                "transcript",
                "curriculum",
                "requirement",
                "prerequisite",
                "elective",
                "honors",
                "ap",
                "advanced placement",
                "semester",
                "schedule",
                "school year",
                "final exam",
                "end of course",
                "eoc",
                "freshman",
                "freshmen",
                "sophomore",
                "junior",
                "senior",
                "teacher",
                "student",
                "counselor",
                "counseling",
                "principal",
                "registration",
                "enroll",
                "enrollment",
                "attendance",
                "club",
                "extracurricular",
                "athletic",
                "athletics",
                "sport",
                "tryout",
                "varsity",
                "scholarship",
                "application",
                "admission",
                "college",
                "university",
                "major",
                "career",
                "pathway",
                "dual enrollment",
                "career and college promise",
                "ccp",
                // named entities
                "wcpss",
                "wake county",
                "wake tech",
                // subjects
                "math",
                "algebra",
                "geometry",
                "calculus",
                "statistics",
                "science",
                "biology",
                "chemistry",
                "physics",
                "english",
                "history",
                "social studies",
                "spanish",
                "french",
                "latin",
                "world language",
                "art",
                "band",
                "orchestra",
                "chorus",
                "cte",
                "physical education",
                // planning intent
                "plan my",
                "planning",
                "should i take",
                "what should i take",
                "how's school",
                "how is school",
                "help with school",
            ]),
            unrelated_terms: owned(&[
                "weather",
                "forecast",
                "recipe",
                "cooking",
                "movie",
                "tv show",
                "netflix",
                "celebrity",
                "gossip",
                "politics",
                "religion",
                "dating",
                "boyfriend",
                "girlfriend",
                "shopping",
                "restaurant",
                "travel",
                "vacation",
                "video game",
                "sports score",
                "sports team",
                "fortnite",
                "minecraft",
                "nfl",
                "nba",
                "mlb",
                "nhl",
                "super bowl",
                "football game",
                "stock market",
                "bitcoin",
                "crypto",
                "horoscope",
                "lyrics",
                "capital of",
                "president of",
                "population of",
                "who invented",
                "when was",
                "trivia",
                "fun fact",
                "joke",
            ]),
            homework_qualifiers: owned(&[
                "policy",
                "schedule",
                "due date",
                "deadline",
                "when is",
                "late",
                "make up",
                "makeup",
                "calendar",
            ]),
        }
    }
}

impl ScopeRules {
    /// Add school name aliases (e.g. `"green level"`, `"glhs"`) to the
    /// school term list.
    pub fn with_aliases<S: AsRef<str>>(mut self, aliases: &[S]) -> Self {
        self.school_terms
            .extend(aliases.iter().map(|a| normalize(a.as_ref())).filter(|a| !a.is_empty()));
        self
    }

    fn normalized(self) -> Self {
        let norm = |v: Vec<String>| -> Vec<String> {
            v.iter()
                .map(|s| normalize(s))
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            crisis_phrases: norm(self.crisis_phrases),
            short_greetings: norm(self.short_greetings),
            school_terms: norm(self.school_terms),
            unrelated_terms: norm(self.unrelated_terms),
            homework_qualifiers: norm(self.homework_qualifiers),
        }
    }
}

/// Which layer decided, and on what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Crisis(String),
    GreetingPattern,
    ShortGreeting,
    SchoolTerm(String),
    Arithmetic,
    UnrelatedTerm(String),
    UnrelatedPattern,
    Homework,
    PermissiveDefault,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Crisis(p) => write!(f, "crisis phrase {p:?}"),
            Reason::GreetingPattern => f.write_str("greeting pattern"),
            Reason::ShortGreeting => f.write_str("short greeting token"),
            Reason::SchoolTerm(t) => write!(f, "school term {t:?}"),
            Reason::Arithmetic => f.write_str("arithmetic without school context"),
            Reason::UnrelatedTerm(t) => write!(f, "unrelated topic {t:?}"),
            Reason::UnrelatedPattern => f.write_str("general-knowledge question"),
            Reason::Homework => f.write_str("homework or test solving"),
            Reason::PermissiveDefault => f.write_str("no signal; permissive default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeClassifier {
    rules: ScopeRules,
}

impl Default for ScopeClassifier {
    fn default() -> Self {
        Self::new(ScopeRules::default())
    }
}

impl ScopeClassifier {
    pub fn new(rules: ScopeRules) -> Self {
        Self {
            rules: rules.normalized(),
        }
    }

    pub fn classify(&self, text: &str) -> ScopeDecision {
        self.classify_with_reason(text).0
    }

    pub fn classify_with_reason(&self, text: &str) -> (ScopeDecision, Reason) {
        let text = normalize(text);

        if let Some(p) = self.rules.crisis_phrases.iter().find(|p| text.contains(p.as_str())) {
            return (ScopeDecision::SafetyOverride, Reason::Crisis(p.clone()));
        }

        if GREETING_PATTERNS.is_match(&text) {
            return (ScopeDecision::Greeting(greeting_kind(&text)), Reason::GreetingPattern);
        }
        if self.is_short_greeting(&text) {
            return (ScopeDecision::Greeting(greeting_kind(&text)), Reason::ShortGreeting);
        }

        let unrelated: Vec<&String> = self
            .rules
            .unrelated_terms
            .iter()
            .filter(|u| contains_term(&text, u))
            .collect();

        // A school term only counts outside the unrelated phrases that
        // contain it ("sport" in "sports score").
        if let Some(t) = self.rules.school_terms.iter().find(|t| {
            contains_term(&text, t) && !unrelated.iter().any(|u| contains_term(u, t))
        }) {
            return (ScopeDecision::InScope, Reason::SchoolTerm(t.clone()));
        }

        if ARITHMETIC_PATTERNS.is_match(&YEAR_RANGE.replace_all(&text, " ")) {
            return (ScopeDecision::OutOfScope, Reason::Arithmetic);
        }
        if let Some(t) = unrelated.first() {
            return (ScopeDecision::OutOfScope, Reason::UnrelatedTerm((*t).clone()));
        }
        if UNRELATED_PATTERNS.is_match(&text) {
            return (ScopeDecision::OutOfScope, Reason::UnrelatedPattern);
        }
        if HOMEWORK_PATTERNS.is_match(&text)
            && !self
                .rules
                .homework_qualifiers
                .iter()
                .any(|q| contains_term(&text, q))
        {
            return (ScopeDecision::OutOfScope, Reason::Homework);
        }

        (ScopeDecision::InScope, Reason::PermissiveDefault)
    }

    fn is_short_greeting(&self, text: &str) -> bool {
        if word_count(text) > 3 {
            return false;
        }
        let bare = text.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        self.rules.short_greetings.iter().any(|g| g == bare)
    }
}

fn greeting_kind(text: &str) -> GreetingKind {
    if HOW_ARE_YOU.is_match(text) {
        GreetingKind::HowAreYou
    } else if WHATS_UP.is_match(text) {
        GreetingKind::WhatsUp
    } else {
        GreetingKind::Default
    }
}
