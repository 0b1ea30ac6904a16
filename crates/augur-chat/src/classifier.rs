//! Conversation mode classifier.
//!
//! Ordered pattern sets, first match wins:
//! meta-feedback, then suggestion, then clarification (only while an
//! uncommitted probe is open), then the `explanation` default.

use std::sync::LazyLock;

use augur_core::types::{ConversationMode, Session, SessionSuggestion};
use chrono::Utc;
use regex::Regex;

// =============================================================================
// Compiled regex sets
// =============================================================================

struct ModePatterns {
    meta_feedback: Vec<Regex>,
    suggestion: Vec<Regex>,
    clarification: Vec<Regex>,
    resonance_words: Regex,
}

static MODE_PATTERNS: LazyLock<ModePatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid mode regex"))
            .collect()
    };

    ModePatterns {
        // Complaints about the assistant itself
        meta_feedback: mk(&[
            r"(?i)\b(this|your)\s+(system|app|build|code|program|programming)\b.*\b(broken|bug|issue|problem|stuck|loop|failing)\b",
            r"(?i)\bpoetic brain\b.*\b(stuck|loop|broken)\b",
            r"(?i)\bresonance check\b.*\b(stop|turn off|stuck)\b",
            r"(?i)\b(stop|quit)\b.*\b(poetry|metaphor|lyric)",
            r"(?i)\brespond\b.*\bplain(ly)?\b",
            r"(?i)\bno more\b.*\b(poetry|metaphor)",
            r"(?i)\bfrustrated\b.*\bwith\b.*\byou\b",
            r"(?i)\bwhy are you\b.*\bdoing\b.*\b(this|that)\b",
            r"(?i)\byour programming\b",
            r"(?i)\bthis feels like a loop\b",
            r"(?i)\bmeta feedback\b",
            r"(?i)\bdebug\b",
        ]),
        // Feature requests and ideas
        suggestion: mk(&[
            r"(?i)\b(feature|product|app) suggestion\b",
            r"(?i)\bhere'?s an idea\b",
            r"(?i)\bmaybe you could\b",
            r"(?i)\bi (recommend|suggest)\b",
            r"(?i)\bit would help if\b",
            r"(?i)\bcan you (add|change|update|adjust|stop)\b",
            r"(?i)\bshould (we|you)\b.*\b(instead|maybe)\b",
            r"(?i)\bwould it be possible to\b",
        ]),
        clarification: mk(&[
            r"(?i)\bcan you clarify\b",
            r"(?i)\bcan you explain\b",
            r"(?i)\bwhat do you mean\b",
            r"(?i)\bi don'?t (quite\s+)?understand\b",
            r"(?i)\bthat (doesn'?t|does not) (fit|land|make sense)\b",
            r"(?i)\bhelp me understand\b",
            r"(?i)\bso you'?re saying\b",
            r"(?i)\bdoes that mean\b",
        ]),
        resonance_words: Regex::new(r"(?i)\b(resonate|land|fit|accurate|familiar)\b")
            .expect("Invalid mode regex"),
    }
});

fn any_match(patterns: &[Regex], input: &str) -> bool {
    patterns.iter().any(|re| re.is_match(input))
}

/// Categorise one incoming turn.
pub fn classify(text: &str, session: &Session) -> ConversationMode {
    let input = text.trim().replace('\u{2019}', "'");
    if input.is_empty() {
        return ConversationMode::Explanation;
    }

    let p = &*MODE_PATTERNS;
    if any_match(&p.meta_feedback, &input) {
        return ConversationMode::MetaFeedback;
    }
    if any_match(&p.suggestion, &input) {
        return ConversationMode::Suggestion;
    }

    let looks_like_clarification =
        any_match(&p.clarification, &input) || p.resonance_words.is_match(&input);
    if looks_like_clarification && session.open_probe().is_some() {
        return ConversationMode::Clarification;
    }

    ConversationMode::Explanation
}

/// Closing question used when a response that must end in a question
/// came back without one.
pub fn fallback_probe(mode: ConversationMode) -> &'static str {
    match mode {
        ConversationMode::Explanation => {
            "Where in your days right now do you notice this pattern the most?"
        }
        ConversationMode::Clarification => {
            "How could I put this so it sits closer to what you actually live?"
        }
        ConversationMode::Suggestion => {
            "What would make this suggestion most useful to you going forward?"
        }
        ConversationMode::MetaFeedback => {
            "What one change would make this more useful for you right now?"
        }
    }
}

/// Store a suggestion once per distinct trimmed text.
///
/// Returns true when a new record was appended.
pub fn record_suggestion(session: &mut Session, text: &str) -> bool {
    let normalized = text.trim();
    if normalized.is_empty() {
        return false;
    }
    if session.suggestions.iter().any(|s| s.text == normalized) {
        return false;
    }
    session.suggestions.push(SessionSuggestion {
        text: normalized.to_string(),
        acknowledged: true,
        created_at: Utc::now(),
    });
    true
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use augur_core::types::SstProbe;

    fn session_with_open_probe() -> Session {
        let mut session = Session::new("s");
        session.probes.push(SstProbe {
            id: "p1".into(),
            text: "Does this land?".into(),
            tag: None,
            committed: false,
            created_at: Utc::now(),
            committed_at: None,
            source: None,
        });
        session
    }

    // ---- Meta feedback ----

    #[test]
    fn test_loop_complaint_is_meta_feedback() {
        let session = Session::new("s");
        assert_eq!(
            classify("this feels like a loop, your programming is broken", &session),
            ConversationMode::MetaFeedback
        );
    }

    #[test]
    fn test_plain_language_request_is_meta_feedback() {
        let session = Session::new("s");
        assert_eq!(
            classify("Please respond plainly for once", &session),
            ConversationMode::MetaFeedback
        );
        assert_eq!(
            classify("no more metaphors please", &session),
            ConversationMode::MetaFeedback
        );
    }

    #[test]
    fn test_meta_feedback_beats_suggestion() {
        let session = Session::new("s");
        assert_eq!(
            classify("maybe you could debug this", &session),
            ConversationMode::MetaFeedback
        );
    }

    // ---- Suggestion ----

    #[test]
    fn test_suggestion_patterns() {
        let session = Session::new("s");
        for input in [
            "Here's an idea: show the transits first",
            "maybe you could add a summary",
            "I suggest a shorter intro",
            "Would it be possible to export as text?",
            "should you maybe start with the houses instead",
        ] {
            assert_eq!(classify(input, &session), ConversationMode::Suggestion, "{input}");
        }
    }

    // ---- Clarification ----

    #[test]
    fn test_clarification_requires_open_probe() {
        let without = Session::new("s");
        assert_eq!(
            classify("what do you mean by that?", &without),
            ConversationMode::Explanation
        );
        let with = session_with_open_probe();
        assert_eq!(
            classify("what do you mean by that?", &with),
            ConversationMode::Clarification
        );
    }

    #[test]
    fn test_resonance_word_counts_as_clarification() {
        let session = session_with_open_probe();
        assert_eq!(
            classify("it doesn't really fit", &session),
            ConversationMode::Clarification
        );
    }

    #[test]
    fn test_committed_probe_does_not_enable_clarification() {
        let mut session = session_with_open_probe();
        session.probes[0].committed = true;
        assert_eq!(
            classify("can you explain that again", &session),
            ConversationMode::Explanation
        );
    }

    #[test]
    fn test_curly_apostrophe_normalised() {
        let session = session_with_open_probe();
        assert_eq!(
            classify("I don\u{2019}t understand", &session),
            ConversationMode::Clarification
        );
    }

    // ---- Default ----

    #[test]
    fn test_empty_and_plain_default_to_explanation() {
        let session = Session::new("s");
        assert_eq!(classify("   ", &session), ConversationMode::Explanation);
        assert_eq!(
            classify("tell me about my chart", &session),
            ConversationMode::Explanation
        );
    }

    // ---- Suggestions ledger ----

    #[test]
    fn test_record_suggestion_dedupes_trimmed_text() {
        let mut session = Session::new("s");
        assert!(record_suggestion(&mut session, "  add dark mode "));
        assert!(!record_suggestion(&mut session, "add dark mode"));
        assert!(!record_suggestion(&mut session, "   "));
        assert_eq!(session.suggestions.len(), 1);
        assert!(session.suggestions[0].acknowledged);
        assert_eq!(session.suggestions[0].text, "add dark mode");
    }

    #[test]
    fn test_fallback_probes_are_questions() {
        for mode in [
            ConversationMode::Explanation,
            ConversationMode::Clarification,
            ConversationMode::Suggestion,
            ConversationMode::MetaFeedback,
        ] {
            assert!(fallback_probe(mode).ends_with('?'));
        }
    }
}
