//! Resonance probe ledger.
//!
//! Probes are created uncommitted, tagged exactly once (WB, ABE or OSR),
//! and scored per session. Commit is a pure transform: callers replace the
//! stored probe with the returned value.

use std::sync::LazyLock;

use augur_core::types::{QuerentRole, Session, SstProbe, SstSource, SstTag};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::ChatError;

/// Longest line accepted as a trailing probe question.
const MAX_PROBE_CHARS: usize = 200;

/// Weight of a confirmation given by the subject themselves.
const SELF_WEIGHT: f64 = 1.0;
/// Observer confirmations support the map but never stand in for
/// first-person experience.
const OBSERVER_WEIGHT: f64 = 0.6;

/// Build a fresh, uncommitted probe. A missing id gets a v4 uuid.
pub fn create_probe(text: &str, id: Option<String>) -> SstProbe {
    SstProbe {
        id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        text: text.trim().to_string(),
        tag: None,
        committed: false,
        created_at: Utc::now(),
        committed_at: None,
        source: None,
    }
}

/// Return a committed copy of `probe`.
///
/// A probe is tagged once; committing it again fails with
/// [`ChatError::ProbeAlreadyCommitted`].
pub fn commit_probe(
    probe: &SstProbe,
    tag: SstTag,
    source: Option<SstSource>,
) -> Result<SstProbe, ChatError> {
    if probe.committed {
        return Err(ChatError::ProbeAlreadyCommitted(probe.id.clone()));
    }
    Ok(SstProbe {
        tag: Some(tag),
        committed: true,
        committed_at: Some(Utc::now()),
        source,
        ..probe.clone()
    })
}

/// Provenance of a tag given the querent's role at commit time.
pub fn source_for_role(role: QuerentRole) -> Option<SstSource> {
    match role {
        QuerentRole::Observer => Some(SstSource::Observer),
        QuerentRole::Unconfirmed => None,
        QuerentRole::SelfA | QuerentRole::SelfB | QuerentRole::Both => Some(SstSource::SelfReport),
    }
}

/// Untracked provenance counts as first-person.
pub fn provenance_weight(source: Option<SstSource>) -> f64 {
    match source {
        Some(SstSource::Observer) => OBSERVER_WEIGHT,
        Some(SstSource::SelfReport) | None => SELF_WEIGHT,
    }
}

/// Commit the probe `probe_id` in `session`, deriving the source from the
/// session's current querent role.
pub fn commit_in_session(
    session: &mut Session,
    probe_id: &str,
    tag: SstTag,
) -> Result<SstProbe, ChatError> {
    let source = source_for_role(session.gate.querent_role);
    let slot = session
        .probes
        .iter_mut()
        .find(|p| p.id == probe_id)
        .ok_or_else(|| ChatError::ProbeNotFound(probe_id.to_string()))?;
    let committed = commit_probe(slot, tag, source)?;
    *slot = committed.clone();
    session.updated_at = Utc::now();
    debug!(session_id = %session.id, probe_id, ?tag, "Probe committed");
    Ok(committed)
}

// =============================================================================
// Scoring
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagCounts {
    #[serde(rename = "WB")]
    pub wb: usize,
    #[serde(rename = "ABE")]
    pub abe: usize,
    #[serde(rename = "OSR")]
    pub osr: usize,
    pub untagged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScores {
    pub accuracy: f64,
    pub edge_capture: f64,
    /// Fixed at 1.0 until a real clarity signal exists.
    pub clarity: f64,
    /// Accuracy with observer tags weighted below self-reports.
    pub weighted_accuracy: f64,
    pub counts: TagCounts,
}

/// Score the session's committed probes.
pub fn score_session(session: &Session) -> SessionScores {
    let mut counts = TagCounts::default();
    let mut weighted_hits = 0.0;
    let mut weighted_total = 0.0;

    for probe in &session.probes {
        let tag = match (probe.committed, probe.tag) {
            (true, Some(tag)) => tag,
            _ => {
                counts.untagged += 1;
                continue;
            }
        };
        let weight = provenance_weight(probe.source);
        weighted_total += weight;
        match tag {
            SstTag::WB => {
                counts.wb += 1;
                weighted_hits += weight;
            }
            SstTag::ABE => counts.abe += 1,
            SstTag::OSR => counts.osr += 1,
        }
    }

    let tagged = counts.wb + counts.abe + counts.osr;
    SessionScores {
        accuracy: counts.wb as f64 / tagged.max(1) as f64,
        edge_capture: counts.abe as f64 / (counts.wb + counts.abe).max(1) as f64,
        clarity: 1.0,
        weighted_accuracy: if weighted_total > 0.0 {
            weighted_hits / weighted_total
        } else {
            0.0
        },
        counts,
    }
}

// =============================================================================
// Probe extraction
// =============================================================================

/// Pull the closing resonance question out of generated text.
///
/// Prefers the last non-empty line that ends in `?`; otherwise the last
/// sentence ending in `?`.
pub fn extract_probe_from_response(text: &str) -> Option<String> {
    let by_line = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .rev()
        .find(|l| l.ends_with('?') && l.chars().count() <= MAX_PROBE_CHARS);
    if let Some(line) = by_line {
        return Some(line.to_string());
    }

    let end = text.rfind('?')?;
    let head = &text[..end];
    let start = head
        .rfind(['.', '?', '!', '\n'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let sentence = text[start..=end].trim();
    let len = sentence.chars().count();
    (4..=MAX_PROBE_CHARS + 1)
        .contains(&len)
        .then(|| sentence.to_string())
}

// =============================================================================
// Free-text replies to an open probe
// =============================================================================

/// How a free-text reply answers the open probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseClass {
    ClearWb,
    PartialAbe,
    Osr,
    Unclear,
}

impl ResponseClass {
    pub fn tag(&self) -> Option<SstTag> {
        match self {
            ResponseClass::ClearWb => Some(SstTag::WB),
            ResponseClass::PartialAbe => Some(SstTag::ABE),
            ResponseClass::Osr => Some(SstTag::OSR),
            ResponseClass::Unclear => None,
        }
    }
}

struct ReplyPatterns {
    misses: Regex,
    partial: Regex,
    start_reading: Regex,
    affirm: Regex,
    repetition: Regex,
}

static REPLY_PATTERNS: LazyLock<ReplyPatterns> = LazyLock::new(|| {
    let mk = |p: &str| Regex::new(p).expect("Invalid reply regex");
    ReplyPatterns {
        misses: mk(
            r"(?i)\b(doesn'?t resonate|no resonance|signal void|non-ping|outside symbolic range|doesn'?t match (my |lived )?experience|not recogni[sz]able in (my )?life|doesn'?t ring true|outside my experience|not grounded in reality|metaphor without lived grounding|symbolic speculation|no behavio(u)?ral evidence|misses the mark|no connection to (my )?actual life|unrecogni[sz]able|not (really )?(me|true|right|correct)|that'?s not me)\b",
        ),
        partial: mk(
            r"(?i)\b(sort of|kind of|partly|partially|somewhat|maybe|i think so|possibly|in a way|to some extent)\b",
        ),
        start_reading: mk(
            r"(?i)\b((give|show) me the (reading|mirror)|(start|begin|continue with) the (reading|mirror)|(start|give me|show me) (mirror flow|symbolic weather)|let'?s (begin|start)|please continue|go ahead)\b",
        ),
        affirm: mk(
            r"(?i)(^yes\b|\b(within boundary|wb|resonates with (my )?lived experience|recogni[sz]able in (my )?life|that'?s exactly what happens|matches my experience|grounded in reality|lived truth|that'?s me|yes it is|yes that is|that'?s right|correct|true|spot on)\b)",
        ),
        repetition: mk(
            r"(?i)\b(you (already )?asked|you are asking again|why are you asking|i (already|just) said|as i said|what i had just explained|repeating myself|asked again|repeat the question|i literally just|already confirmed|i'?ve already answered)\b",
        ),
    }
});

/// Classify a free-text reply to an open probe.
///
/// Ordered, first match wins: misses, partial, reading-start requests,
/// affirmations. Misses come first because several of them contain an
/// affirming word ("doesn't ring true").
pub fn classify_user_response(text: &str) -> ResponseClass {
    let input = text.trim().replace('\u{2019}', "'");
    if input.is_empty() {
        return ResponseClass::Unclear;
    }
    let p = &*REPLY_PATTERNS;
    if p.misses.is_match(&input) {
        ResponseClass::Osr
    } else if p.partial.is_match(&input) {
        ResponseClass::PartialAbe
    } else if p.start_reading.is_match(&input) || p.affirm.is_match(&input) {
        ResponseClass::ClearWb
    } else {
        ResponseClass::Unclear
    }
}

/// The reply complains about being asked again rather than answering.
pub fn is_repetition_complaint(text: &str) -> bool {
    REPLY_PATTERNS
        .repetition
        .is_match(&text.replace('\u{2019}', "'"))
}

// =============================================================================
// Tests
// =============================================================================
