//! Shared domain types for augur sessions.
//!
//! Everything here is owned by exactly one [`Session`]; the session store
//! is the only process-wide structure and lives in `augur-chat`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};

// =============================================================================
// Context gate
// =============================================================================

/// Who the human in the conversation is, relative to the chart subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerentRole {
    #[default]
    Unconfirmed,
    SelfA,
    SelfB,
    Both,
    Observer,
}

impl QuerentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuerentRole::Unconfirmed => "unconfirmed",
            QuerentRole::SelfA => "self_a",
            QuerentRole::SelfB => "self_b",
            QuerentRole::Both => "both",
            QuerentRole::Observer => "observer",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        !matches!(self, QuerentRole::Unconfirmed)
    }
}

impl fmt::Display for QuerentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sure an identity match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Consent recorded for a session whose subjects are not all present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Mutual,
    SingleSided,
    Anonymized,
}

/// Validate a querent role transition.
///
/// Valid transitions:
/// - Unconfirmed -> SelfA | SelfB | Both | Observer
///
/// A confirmed role is sticky. Leaving it requires
/// [`ContextGateState::reset_for_conflict`].
pub fn validate_role_transition(from: QuerentRole, to: QuerentRole) -> Result<()> {
    if from == QuerentRole::Unconfirmed && to.is_confirmed() {
        Ok(())
    } else {
        Err(AugurError::InvalidRoleTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Identity state of the querent within one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextGateState {
    pub querent_role: QuerentRole,
    /// Subject names found in the chart data (0, 1 or 2 entries).
    pub session_subjects: Vec<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub querent_name: Option<String>,
    pub consent_status: Option<ConsentStatus>,
    pub relationship_tier: Option<String>,
    /// Subjects of a conflicting upload, waiting for the querent's answer.
    #[serde(default)]
    pub pending_subjects: Option<Vec<String>>,
    /// Subjects of an upload the querent chose not to switch to.
    #[serde(default)]
    pub declined_subjects: Option<Vec<String>>,
}

fn same_names(a: &[String], b: &[String]) -> bool {
    let norm = |names: &[String]| -> BTreeSet<String> {
        names.iter().map(|s| s.trim().to_lowercase()).collect()
    };
    norm(a) == norm(b)
}

impl ContextGateState {
    pub fn new(session_subjects: Vec<String>) -> Self {
        Self {
            session_subjects,
            ..Self::default()
        }
    }

    /// True while the querent has not yet been identified.
    pub fn needs_gate(&self) -> bool {
        !self.querent_role.is_confirmed()
    }

    /// Record a resolved role and stamp the confirmation time.
    pub fn confirm(&mut self, role: QuerentRole, querent_name: Option<String>) -> Result<()> {
        validate_role_transition(self.querent_role, role)?;
        self.querent_role = role;
        self.querent_name = querent_name;
        self.confirmed_at = Some(Utc::now());
        Ok(())
    }

    /// Park a conflicting upload until the querent answers. Subjects and
    /// role stay as they are.
    pub fn hold_conflict(&mut self, uploaded: Vec<String>) {
        self.pending_subjects = Some(uploaded);
    }

    /// The querent chose the current subjects. The parked upload is
    /// remembered so resending it does not ask again.
    pub fn keep_current(&mut self) {
        self.declined_subjects = self.pending_subjects.take();
    }

    /// The querent chose the new upload: adopt its subjects and drop back
    /// to `Unconfirmed`.
    pub fn reset_for_conflict(&mut self, new_subjects: Vec<String>) {
        self.querent_role = QuerentRole::Unconfirmed;
        self.session_subjects = new_subjects;
        self.confirmed_at = None;
        self.querent_name = None;
        self.pending_subjects = None;
        self.declined_subjects = None;
    }

    /// Whether `uploaded` names the same people as a declined upload.
    pub fn is_declined(&self, uploaded: &[String]) -> bool {
        self.declined_subjects
            .as_deref()
            .is_some_and(|declined| same_names(declined, uploaded))
    }
}

// =============================================================================
// Resonance probes
// =============================================================================

/// Three-way resonance classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SstTag {
    /// Within Boundary: clear fit.
    WB,
    /// At Boundary Edge: partial fit.
    ABE,
    /// Outside Symbolic Range: no fit.
    OSR,
}

impl SstTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WB" => Some(SstTag::WB),
            "ABE" => Some(SstTag::ABE),
            "OSR" => Some(SstTag::OSR),
            _ => None,
        }
    }
}

/// Who confirmed a resonance tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SstSource {
    #[serde(rename = "self")]
    SelfReport,
    Observer,
}

/// A falsifiable follow-up probe attached to one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SstProbe {
    pub id: String,
    pub text: String,
    pub tag: Option<SstTag>,
    pub committed: bool,
    pub created_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
    pub source: Option<SstSource>,
}

// =============================================================================
// Conversation
// =============================================================================

/// Category of one incoming turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Explanation,
    Clarification,
    Suggestion,
    MetaFeedback,
}

impl ConversationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::Explanation => "explanation",
            ConversationMode::Clarification => "clarification",
            ConversationMode::Suggestion => "suggestion",
            ConversationMode::MetaFeedback => "meta_feedback",
        }
    }
}

/// How a two-subject upload should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationalMode {
    Relational,
    Parallel,
}

/// A feature request or idea captured from the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSuggestion {
    pub text: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Narrator,
}

/// One entry in the bounded history window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub speaker: Speaker,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// State of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered turn history, oldest dropped beyond the configured window.
    pub history: Vec<SessionTurn>,
    pub turn_count: u64,
    pub gate: ContextGateState,
    pub probes: Vec<SstProbe>,
    pub suggestions: Vec<SessionSuggestion>,
    /// Upload-context id -> chosen relational mode.
    pub relational_modes: BTreeMap<String, RelationalMode>,
    /// Upload-context ids whose generation already failed.
    pub failed_contexts: BTreeSet<String>,
    /// Context id waiting for a relational-vs-parallel answer.
    pub pending_choice: Option<String>,
    pub last_mode: Option<ConversationMode>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            turn_count: 0,
            gate: ContextGateState::default(),
            probes: Vec::new(),
            suggestions: Vec::new(),
            relational_modes: BTreeMap::new(),
            failed_contexts: BTreeSet::new(),
            pending_choice: None,
            last_mode: None,
        }
    }

    /// Append a turn and trim the history to `window` entries.
    pub fn push_turn(&mut self, speaker: Speaker, content: impl Into<String>, window: usize) {
        let now = Utc::now();
        self.history.push(SessionTurn {
            speaker,
            content: content.into(),
            at: now,
        });
        if self.history.len() > window {
            let excess = self.history.len() - window;
            self.history.drain(..excess);
        }
        self.updated_at = now;
    }

    /// Most recent probe that has not been tagged yet.
    pub fn open_probe(&self) -> Option<&SstProbe> {
        self.probes.iter().rev().find(|p| !p.committed)
    }
}
