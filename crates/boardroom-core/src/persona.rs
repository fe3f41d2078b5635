//! Personas and the keyword router.
//!
//! `Persona` is the fixed enumeration of answering profiles; `RoutingDecision`
//! is what the classifier produces for one request. Classification is a
//! deterministic keyword scan — no scoring, no learned model. The committee
//! keywords override any single-persona match; among single personas the
//! first match in a fixed scan order (CTO, PM, VC) wins; no match falls back
//! to the mentor.

use crate::error::CoreError;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A single answering profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// General startup mentor; the default when nothing matches.
    Mentor,
    Pm,
    Cto,
    Vc,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Mentor => "mentor",
            Persona::Pm => "pm",
            Persona::Cto => "cto",
            Persona::Vc => "vc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mentor" => Some(Persona::Mentor),
            "pm" => Some(Persona::Pm),
            "cto" => Some(Persona::Cto),
            "vc" => Some(Persona::Vc),
            _ => None,
        }
    }

    /// Section heading used when committee replies are merged.
    pub fn label(&self) -> &'static str {
        match self {
            Persona::Mentor => "Mentor",
            Persona::Pm => "Product (PM)",
            Persona::Cto => "Technology (CTO)",
            Persona::Vc => "Investment (VC)",
        }
    }
}

/// Which persona(s) must answer one request. Derived per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    Single(Persona),
    /// Fan out to the three expert personas and merge their independent answers.
    Committee,
}

/// Committee membership and merge order.
pub const COMMITTEE_MEMBERS: [Persona; 3] = [Persona::Pm, Persona::Cto, Persona::Vc];

impl RoutingDecision {
    /// Personas to invoke, in call order.
    pub fn personas(&self) -> Vec<Persona> {
        match self {
            RoutingDecision::Single(p) => vec![*p],
            RoutingDecision::Committee => COMMITTEE_MEMBERS.to_vec(),
        }
    }

    /// Resolved route name reported back to the client as `phase`.
    pub fn phase(&self) -> &'static str {
        match self {
            RoutingDecision::Single(p) => p.as_str(),
            RoutingDecision::Committee => "committee",
        }
    }

    /// Parse an explicit persona hint from the request. Hints bypass the
    /// classifier entirely; an unknown hint is a client error.
    pub fn from_hint(s: &str) -> Result<Self, CoreError> {
        if s.trim().eq_ignore_ascii_case("committee") {
            return Ok(RoutingDecision::Committee);
        }
        Persona::from_str(s)
            .map(RoutingDecision::Single)
            .ok_or_else(|| CoreError::UnknownPersona(s.trim().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Keyword classifier
// ---------------------------------------------------------------------------

// Single-word entries match whole words only (so "shipment" never selects PM);
// multi-word entries match as substrings of the lowercased message.
const COMMITTEE_KEYWORDS: &[&str] = &["committee", "boardroom", "advisory board"];

const SCAN_ORDER: [(Persona, &[&str]); 3] = [
    (Persona::Cto, &["cto", "chief technology officer"]),
    (Persona::Pm, &["pm", "product manager", "product management"]),
    (Persona::Vc, &["vc", "investor", "investors", "venture capital"]),
];

fn keyword_matches(lowered: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') {
        lowered.contains(keyword)
    } else {
        words.iter().any(|w| *w == keyword)
    }
}

/// Classify a user message into a routing decision.
pub fn classify_message(message: &str) -> RoutingDecision {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if COMMITTEE_KEYWORDS
        .iter()
        .any(|k| keyword_matches(&lowered, &words, k))
    {
        return RoutingDecision::Committee;
    }

    for (persona, keywords) in SCAN_ORDER {
        if keywords
            .iter()
            .any(|k| keyword_matches(&lowered, &words, k))
        {
            return RoutingDecision::Single(persona);
        }
    }

    RoutingDecision::Single(Persona::Mentor)
}

// ---------------------------------------------------------------------------
// PersonaLibrary: instruction texts, loaded once at startup
// ---------------------------------------------------------------------------

/// Static instruction text per persona. Built once at process start from the
/// compiled-in defaults plus an optional JSON override file; immutable after.
#[derive(Debug, Clone)]
pub struct PersonaLibrary {
    mentor: String,
    pm: String,
    cto: String,
    vc: String,
    committee: String,
}

impl Default for PersonaLibrary {
    fn default() -> Self {
        Self {
            mentor: prompts::MENTOR_PROMPT.to_string(),
            pm: prompts::PM_PROMPT.to_string(),
            cto: prompts::CTO_PROMPT.to_string(),
            vc: prompts::VC_PROMPT.to_string(),
            committee: prompts::COMMITTEE_PROMPT.to_string(),
        }
    }
}

impl PersonaLibrary {
    /// Build the library, applying overrides from a JSON file when given.
    /// The file is a flat map of persona name to instruction text; personas
    /// it does not name keep their built-in defaults. A missing file is an
    /// error only when a path was explicitly configured.
    pub fn load(override_file: Option<&Path>) -> Result<Self, CoreError> {
        let mut lib = Self::default();
        let Some(path) = override_file else {
            return Ok(lib);
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("prompts file {}: {}", path.display(), e)))?;
        let overrides: HashMap<String, String> = serde_json::from_str(&raw)?;
        for (name, text) in overrides {
            match name.trim().to_lowercase().as_str() {
                "mentor" => lib.mentor = text,
                "pm" => lib.pm = text,
                "cto" => lib.cto = text,
                "vc" => lib.vc = text,
                "committee" => lib.committee = text,
                other => {
                    tracing::warn!(target: "boardroom::persona", persona = other, "ignoring unknown persona in prompts file");
                }
            }
        }
        Ok(lib)
    }

    pub fn instruction(&self, persona: Persona) -> &str {
        match persona {
            Persona::Mentor => &self.mentor,
            Persona::Pm => &self.pm,
            Persona::Cto => &self.cto,
            Persona::Vc => &self.vc,
        }
    }

    /// Shared framing text appended for committee turns.
    pub fn committee_framing(&self) -> &str {
        &self.committee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cto_keyword_selects_cto() {
        let d = classify_message("What does the CTO think about scalability?");
        assert_eq!(d, RoutingDecision::Single(Persona::Cto));
    }

    #[test]
    fn pm_and_vc_keywords() {
        assert_eq!(
            classify_message("Should our product manager own pricing?"),
            RoutingDecision::Single(Persona::Pm)
        );
        assert_eq!(
            classify_message("How do I pitch an investor?"),
            RoutingDecision::Single(Persona::Vc)
        );
    }

    #[test]
    fn committee_overrides_single_match() {
        let d = classify_message("Get committee advice on what the CTO and VC think.");
        assert_eq!(d, RoutingDecision::Committee);
        assert_eq!(d.personas(), vec![Persona::Pm, Persona::Cto, Persona::Vc]);
    }

    #[test]
    fn no_keyword_falls_back_to_mentor() {
        assert_eq!(
            classify_message("How do I find my first ten customers?"),
            RoutingDecision::Single(Persona::Mentor)
        );
    }

    #[test]
    fn short_keywords_need_word_boundaries() {
        // "shipment" contains "pm", "vector" contains "vc" surrounded by letters
        assert_eq!(
            classify_message("The shipment arrived late again."),
            RoutingDecision::Single(Persona::Mentor)
        );
    }

    #[test]
    fn scan_order_breaks_ties() {
        // Both PM and CTO keywords present, no committee keyword: CTO scans first
        assert_eq!(
            classify_message("Should the pm or the cto decide this?"),
            RoutingDecision::Single(Persona::Cto)
        );
    }

    #[test]
    fn hint_parses_and_rejects() {
        assert_eq!(
            RoutingDecision::from_hint("CTO").unwrap(),
            RoutingDecision::Single(Persona::Cto)
        );
        assert_eq!(
            RoutingDecision::from_hint("committee").unwrap(),
            RoutingDecision::Committee
        );
        assert!(matches!(
            RoutingDecision::from_hint("oracle"),
            Err(CoreError::UnknownPersona(_))
        ));
    }

    #[test]
    fn library_override_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personas.json");
        std::fs::write(&path, r#"{"cto": "Terse CTO."}"#).unwrap();
        let lib = PersonaLibrary::load(Some(&path)).unwrap();
        assert_eq!(lib.instruction(Persona::Cto), "Terse CTO.");
        assert_eq!(lib.instruction(Persona::Mentor), prompts::MENTOR_PROMPT);
    }
}
