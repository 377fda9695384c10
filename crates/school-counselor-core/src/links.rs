//! Supplementary link attachment.
//!
//! Runs after the model answered an in-scope question and appends at most
//! one link. Club questions get the club directory. Questions about an
//! external program (dual enrollment, credit transfer, …) get the
//! best-scoring candidate link, and only when the retrieved chunks include
//! that link's source material.
//!
//! # Scoring
//!
//! ```text
//! score(candidate) = Σ tier.weight × |distinct tier keywords in question + retrieved text|
//! ```
//!
//! Candidates whose source material was not retrieved are skipped before
//! ranking. The best remaining candidate must reach `min_score`. Ties go to
//! the earlier candidate.

use serde::{Deserialize, Serialize};

use crate::models::{Chunk, META_CATEGORY, META_SOURCE_FILE};
use crate::text::{contains_any, count_matches, normalize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTier {
    pub weight: u32,
    pub keywords: Vec<String>,
}

/// A link that may be attached to program questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub label: String,
    pub url: String,
    /// Substring of a retrieved chunk's `source_file` or `category` that
    /// proves the link's material was retrieved.
    pub source_tag: String,
    #[serde(default)]
    pub tiers: Vec<KeywordTier>,
}

impl LinkCandidate {
    pub fn score(&self, haystack: &str) -> u32 {
        self.tiers
            .iter()
            .map(|t| {
                let hits = u32::try_from(count_matches(haystack, &t.keywords)).unwrap_or(u32::MAX);
                t.weight.saturating_mul(hits)
            })
            .fold(0, u32::saturating_add)
    }

    fn backed_by(&self, chunks: &[Chunk]) -> bool {
        let tag = normalize(&self.source_tag);
        !tag.is_empty()
            && chunks.iter().any(|c| {
                [META_SOURCE_FILE, META_CATEGORY]
                    .iter()
                    .filter_map(|k| c.meta(k))
                    .any(|v| normalize(&v).contains(&tag))
            })
    }

    fn link(&self) -> Link {
        Link {
            label: self.label.clone(),
            url: self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRules {
    pub club_keywords: Vec<String>,
    pub club_directory: Option<Link>,
    pub program_keywords: Vec<String>,
    pub candidates: Vec<LinkCandidate>,
    pub min_score: u32,
}

impl Default for LinkRules {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            club_keywords: owned(&["club", "extracurricular", "student organization"]),
            club_directory: None,
            program_keywords: owned(&[
                "wake tech",
                "career and college promise",
                "ccp",
                "dual enrollment",
                "college credit",
                "transfer credit",
                "community college",
            ]),
            candidates: Vec::new(),
            min_score: 3,
        }
    }
}

impl LinkRules {
    /// Lowercase every keyword so configured lists match normalized text.
    pub fn normalized(mut self) -> Self {
        let lower = |v: &mut Vec<String>| v.iter_mut().for_each(|k| *k = normalize(k));
        lower(&mut self.club_keywords);
        lower(&mut self.program_keywords);
        for candidate in &mut self.candidates {
            for tier in &mut candidate.tiers {
                lower(&mut tier.keywords);
            }
        }
        self
    }

    /// The link to append for this question, if any.
    pub fn select(&self, question: &str, retrieved: &[Chunk]) -> Option<Link> {
        let q = normalize(question);
        if contains_any(&q, &self.club_keywords) {
            return self.club_directory.clone();
        }
        if !contains_any(&q, &self.program_keywords) {
            return None;
        }

        let mut haystack = q;
        for chunk in retrieved {
            haystack.push('\n');
            haystack.push_str(&normalize(&chunk.text));
        }

        let mut best: Option<(&LinkCandidate, u32)> = None;
        for candidate in self.candidates.iter().filter(|c| c.backed_by(retrieved)) {
            let score = candidate.score(&haystack);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }

        let (candidate, score) = best?;
        (score >= self.min_score).then(|| candidate.link())
    }
}

/// `answer` followed by a blank line and `label: url`.
pub fn append_link(answer: &str, link: &Link) -> String {
    format!("{}\n\n{}: {}", answer.trim_end(), link.label, link.url)
}
