//! Turn orchestrator: central coordinator for one conversation turn.
//!
//! A `generate` turn runs classifier, context gate, planner and validator
//! against the session, then streams frames to the caller: one `meta`
//! frame, zero or more `delta` frames and an optional trailing `probe`.
//! The per-session lock is held for the whole turn, narrator stream
//! included.

use std::sync::Arc;

use augur_core::config::{AugurConfig, SessionConfig};
use augur_core::types::{
    ConversationMode, Session, SessionSuggestion, SessionTurn, Speaker, SstProbe, SstTag,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::classifier::{classify, fallback_probe, record_suggestion};
use crate::context_gate::{
    detect_querent_identity, detect_subject_conflict, gate_question, resolve_conflict_answer,
    voice_instructions, ConflictChoice,
};
use crate::error::ChatError;
use crate::narrator::{NarrationRequest, Narrator};
use crate::payload::{MirrorPayload, UploadContext};
use crate::planner::{
    clear_failures, derive_plan, is_retry_request, parse_relational_choice, record_failure,
    relational_choice_question, uploaded_subjects, AutoExecutionPlan, OsrReason, PlanStatus,
};
use crate::probe::{
    classify_user_response, commit_in_session, create_probe, extract_probe_from_response,
    is_repetition_complaint, score_session, SessionScores,
};
use crate::store::{SessionHandle, SessionStore, SessionSummary};
use crate::validator::{validate_value, DowngradeMode, ValidationOptions};

/// Frames buffered between the turn task and the caller.
const FRAME_BUFFER: usize = 32;

const GENERATION_FALLBACK: &str = "I couldn't finish that reading just now. Say \"retry\" whenever you'd like me to try again, or ask me something else.";

/// Option keys that are turn plumbing, not report fields.
const NON_REPORT_OPTIONS: [&str; 3] = ["reportContexts", "probeId", "tag"];

const REPORT_TYPE_KEYS: [&str; 4] = ["report_type", "reportType", "reportStructure", "report_kind"];

// =============================================================================
// Requests and responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnAction {
    Generate,
    Export,
    Close,
    Feedback,
}

/// One turn-processing request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub action: TurnAction,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl TurnRequest {
    pub fn new(action: TurnAction, input: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            action,
            input: input.into(),
            session_id,
            options: Map::new(),
        }
    }

    /// Upload contexts attached under `options.reportContexts`.
    pub fn report_contexts(&self) -> Result<Vec<UploadContext>, ChatError> {
        match self.options.get("reportContexts") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => Ok(serde_json::from_value(v.clone())?),
        }
    }

    fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Text streamed from the narrator.
    Narrator,
    /// Text composed by the core (questions, apologies, refusals).
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub source: ReplySource,
    pub plan: PlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downgrade: Option<DowngradeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<OsrReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,
}

impl Provenance {
    fn local(plan: PlanStatus) -> Self {
        Self {
            source: ReplySource::Local,
            plan,
            downgrade: None,
            reason: None,
            narrator: None,
        }
    }
}

/// One frame of a `generate` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnFrame {
    Meta {
        intent: ConversationMode,
        #[serde(rename = "sessionId")]
        session_id: String,
        provenance: Provenance,
    },
    Delta {
        delta: String,
    },
    Probe {
        probe: SstProbe,
    },
}

impl TurnFrame {
    pub fn event_name(&self) -> &'static str {
        match self {
            TurnFrame::Meta { .. } => "meta",
            TurnFrame::Delta { .. } => "delta",
            TurnFrame::Probe { .. } => "probe",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub session_id: String,
    pub scores: SessionScores,
    pub probe: SstProbe,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub session_id: String,
    pub scores: SessionScores,
    pub log: Vec<SessionTurn>,
    pub suggestions: Vec<SessionSuggestion>,
    pub probes: Vec<SstProbe>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub session_id: String,
    pub closed: bool,
}

enum StreamOutcome {
    Done,
    Cancelled,
    Failed(ChatError),
}

async fn send(tx: &mpsc::Sender<TurnFrame>, frame: TurnFrame) -> bool {
    tx.send(frame).await.is_ok()
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs turns against the shared session store.
#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Arc<SessionStore>,
    narrator: Arc<dyn Narrator>,
    session_config: SessionConfig,
    validation: ValidationOptions,
}

impl TurnOrchestrator {
    pub fn new(store: Arc<SessionStore>, narrator: Arc<dyn Narrator>, config: &AugurConfig) -> Self {
        Self {
            store,
            narrator,
            session_config: config.session.clone(),
            validation: ValidationOptions::from_config(&config.validation),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start a `generate` turn.
    ///
    /// Input checks run before anything is recorded. The turn itself runs
    /// on a spawned task; frames arrive on the returned receiver, and
    /// dropping the receiver cancels the narrator stream.
    pub async fn generate(
        &self,
        request: TurnRequest,
    ) -> Result<(String, mpsc::Receiver<TurnFrame>), ChatError> {
        if !self.session_config.enabled {
            return Err(ChatError::Disabled);
        }
        let input = request.input.trim().to_string();
        if input.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.session_config.max_message_length;
        if input.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        let contexts = request.report_contexts()?;

        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let (handle, created) = self.store.get_or_create(Some(&session_id))?;
        debug!(session_id = %session_id, created, contexts = contexts.len(), "Turn accepted");

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let this = self.clone();
        let options = request.options;
        tokio::spawn(async move {
            let mut session = handle.lock_owned().await;
            this.run_turn(&mut session, input, contexts, &options, &tx).await;
        });
        Ok((session_id, rx))
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        input: String,
        mut contexts: Vec<UploadContext>,
        options: &Map<String, Value>,
        tx: &mpsc::Sender<TurnFrame>,
    ) {
        let window = self.session_config.history_window;
        session.push_turn(Speaker::User, input.as_str(), window);
        session.turn_count += 1;

        let mode = classify(&input, session);
        session.last_mode = Some(mode);
        if mode == ConversationMode::Suggestion && record_suggestion(session, &input) {
            debug!(session_id = %session.id, "Suggestion recorded");
        }
        if session.gate.pending_subjects.is_none() {
            tag_open_probe(session, &input);
        }

        if let Some(context_id) = session.pending_choice.clone() {
            if let Some(choice) = parse_relational_choice(&input) {
                info!(session_id = %session.id, context_id = %context_id, ?choice, "Relational choice resolved");
                session.relational_modes.insert(context_id, choice);
                session.pending_choice = None;
            }
        }
        if is_retry_request(&input) {
            let cleared = clear_failures(session, &contexts);
            if cleared > 0 {
                info!(session_id = %session.id, cleared, "Failed contexts cleared for retry");
            }
        }

        // Context gate
        if let Some(pending) = session.gate.pending_subjects.clone() {
            let text = resolve_pending_conflict(session, &input, pending);
            self.reply_local(session, tx, mode, Provenance::local(PlanStatus::None), text)
                .await;
            return;
        }
        let uploaded = uploaded_subjects(&contexts);
        if !uploaded.is_empty() {
            if session.gate.session_subjects.is_empty() {
                session.gate.session_subjects = uploaded;
            } else if session.gate.is_declined(&uploaded) {
                debug!(session_id = %session.id, "Declined upload ignored");
                contexts.clear();
            } else if let Some(conflict) =
                detect_subject_conflict(&session.gate.session_subjects, &uploaded)
            {
                warn!(session_id = %session.id, kind = ?conflict.kind, "Subject conflict");
                session.gate.hold_conflict(uploaded);
                self.reply_local(session, tx, mode, Provenance::local(PlanStatus::None), conflict.message)
                    .await;
                return;
            }
        }

        let subjects = session.gate.session_subjects.clone();
        if session.gate.needs_gate() && !subjects.is_empty() {
            match detect_querent_identity(&input, &subjects) {
                Some(found) => match session.gate.confirm(found.role, found.name) {
                    Ok(()) => info!(
                        session_id = %session.id,
                        role = found.role.as_str(),
                        confidence = ?found.confidence,
                        "Querent confirmed"
                    ),
                    Err(e) => warn!(session_id = %session.id, error = %e, "Gate confirmation rejected"),
                },
                None => {
                    self.reply_local(
                        session,
                        tx,
                        mode,
                        Provenance::local(PlanStatus::None),
                        gate_question(&subjects),
                    )
                    .await;
                    return;
                }
            }
        }

        // Planning
        let plan = derive_plan(&contexts, session);
        info!(session_id = %session.id, mode = mode.as_str(), plan = plan.status.as_str(), "Turn planned");

        match plan.status {
            PlanStatus::Osr => {
                let reason = plan.reason.unwrap_or(OsrReason::InvalidJson);
                let provenance = Provenance {
                    reason: Some(reason),
                    ..Provenance::local(plan.status)
                };
                let text = reason.apology(plan.context_name.as_deref());
                self.reply_local(session, tx, mode, provenance, text).await;
            }
            PlanStatus::RelationalChoice => {
                session.pending_choice = plan.context_id.clone();
                let text = relational_choice_question(
                    plan.person_a_name.as_deref().unwrap_or("Person A"),
                    plan.person_b_name.as_deref().unwrap_or("Person B"),
                );
                self.reply_local(session, tx, mode, Provenance::local(plan.status), text)
                    .await;
            }
            PlanStatus::None => {
                self.narrate(session, tx, mode, &plan, input, contexts, None, false)
                    .await;
            }
            _ => {
                let value = validation_value(&plan, options);
                let result = validate_value(&value, &self.validation);
                debug!(session_id = %session.id, summary = %result.summary, "Validation finished");

                if !result.valid {
                    let text = format!(
                        "I can't run this reading yet. The report failed these checks: {}.",
                        result.error_codes().join(", ")
                    );
                    self.reply_local(session, tx, mode, Provenance::local(plan.status), text)
                        .await;
                    return;
                }
                let downgrade = result.explicit_downgrade_mode;
                if downgrade == Some(DowngradeMode::MathOnly) {
                    let provenance = Provenance {
                        downgrade,
                        ..Provenance::local(plan.status)
                    };
                    self.reply_local(session, tx, mode, provenance, math_only_reply(&plan))
                        .await;
                    return;
                }
                self.narrate(
                    session,
                    tx,
                    mode,
                    &plan,
                    input,
                    contexts,
                    downgrade,
                    result.force_generic_symbolic_read,
                )
                .await;
            }
        }
    }

    /// Send a locally composed reply and record it in the history.
    async fn reply_local(
        &self,
        session: &mut Session,
        tx: &mpsc::Sender<TurnFrame>,
        mode: ConversationMode,
        provenance: Provenance,
        text: String,
    ) {
        let meta = TurnFrame::Meta {
            intent: mode,
            session_id: session.id.clone(),
            provenance,
        };
        if send(tx, meta).await {
            let _ = send(tx, TurnFrame::Delta { delta: text.clone() }).await;
        }
        session.push_turn(Speaker::Narrator, text, self.session_config.history_window);
    }

    #[allow(clippy::too_many_arguments)]
    async fn narrate(
        &self,
        session: &mut Session,
        tx: &mpsc::Sender<TurnFrame>,
        mode: ConversationMode,
        plan: &AutoExecutionPlan,
        input: String,
        contexts: Vec<UploadContext>,
        downgrade: Option<DowngradeMode>,
        generic_symbolic: bool,
    ) {
        let window = self.session_config.history_window;
        let meta = TurnFrame::Meta {
            intent: mode,
            session_id: session.id.clone(),
            provenance: Provenance {
                source: ReplySource::Narrator,
                plan: plan.status,
                downgrade,
                reason: None,
                narrator: Some(self.narrator.name().to_string()),
            },
        };
        if !send(tx, meta).await {
            debug!(session_id = %session.id, "Receiver dropped before generation");
            return;
        }

        let request = NarrationRequest {
            session_id: session.id.clone(),
            input,
            mode,
            querent_role: session.gate.querent_role,
            instructions: plan.instructions.clone().unwrap_or_default(),
            voice: voice_instructions(session.gate.querent_role, &session.gate.session_subjects),
            history: session.history.clone(),
            contexts,
            force_question: plan.force_question,
            generic_symbolic,
        };

        let mut text = String::new();
        let outcome = match self.narrator.narrate(request).await {
            Err(e) => StreamOutcome::Failed(e),
            Ok(mut stream) => {
                let mut outcome = StreamOutcome::Done;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(delta) => {
                            text.push_str(&delta);
                            if !send(tx, TurnFrame::Delta { delta }).await {
                                outcome = StreamOutcome::Cancelled;
                                break;
                            }
                        }
                        Err(e) => {
                            outcome = StreamOutcome::Failed(e);
                            break;
                        }
                    }
                }
                outcome
            }
        };

        match outcome {
            StreamOutcome::Cancelled => {
                info!(session_id = %session.id, partial_chars = text.len(), "Turn cancelled by receiver");
                if !text.is_empty() {
                    session.push_turn(Speaker::Narrator, text, window);
                }
            }
            StreamOutcome::Failed(e) => {
                warn!(
                    session_id = %session.id,
                    narrator = self.narrator.name(),
                    plan = plan.status.as_str(),
                    error = %e,
                    "Narrator failed"
                );
                if plan.status.is_auto() {
                    record_failure(session, plan);
                }
                let _ = send(
                    tx,
                    TurnFrame::Delta {
                        delta: GENERATION_FALLBACK.to_string(),
                    },
                )
                .await;
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(GENERATION_FALLBACK);
                session.push_turn(Speaker::Narrator, text, window);
            }
            StreamOutcome::Done => {
                let probe = plan.force_question.then(|| {
                    let probe_text = extract_probe_from_response(&text)
                        .unwrap_or_else(|| fallback_probe(mode).to_string());
                    create_probe(&probe_text, None)
                });
                session.push_turn(Speaker::Narrator, text, window);
                if let Some(probe) = probe {
                    debug!(session_id = %session.id, probe_id = %probe.id, "Probe created");
                    session.probes.push(probe.clone());
                    let _ = send(tx, TurnFrame::Probe { probe }).await;
                }
            }
        }
    }

    fn require_session(&self, request: &TurnRequest) -> Result<SessionHandle, ChatError> {
        let id = request
            .session_id
            .as_deref()
            .ok_or_else(|| ChatError::SessionNotFound("(none)".to_string()))?;
        self.store
            .get(id)?
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
    }

    /// Tag a probe. `options.probeId` and `options.tag` are required.
    pub async fn feedback(&self, request: &TurnRequest) -> Result<FeedbackResponse, ChatError> {
        let handle = self.require_session(request)?;
        let probe_id = request
            .option_str("probeId")
            .ok_or_else(|| ChatError::ParseError("options.probeId is required".to_string()))?;
        let raw_tag = request
            .option_str("tag")
            .ok_or_else(|| ChatError::ParseError("options.tag is required".to_string()))?;
        let tag = SstTag::parse(raw_tag)
            .ok_or_else(|| ChatError::ParseError(format!("unknown tag: {}", raw_tag)))?;

        let mut session = handle.lock().await;
        let probe = commit_in_session(&mut session, probe_id, tag)?;
        Ok(FeedbackResponse {
            session_id: session.id.clone(),
            scores: score_session(&session),
            probe,
        })
    }

    pub async fn export(&self, request: &TurnRequest) -> Result<ExportResponse, ChatError> {
        let handle = self.require_session(request)?;
        let session = handle.lock().await;
        Ok(ExportResponse {
            session_id: session.id.clone(),
            scores: score_session(&session),
            log: session.history.clone(),
            suggestions: session.suggestions.clone(),
            probes: session.probes.clone(),
        })
    }

    /// Delete the session. A turn still holding it finishes on its own copy.
    pub async fn close(&self, request: &TurnRequest) -> Result<CloseResponse, ChatError> {
        let handle = self.require_session(request)?;
        let session_id = handle.lock().await.id.clone();
        let closed = self.store.delete(&session_id)?;
        Ok(CloseResponse { session_id, closed })
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        self.store.summaries().await
    }
}

/// Tag the open probe from a free-text reply. Complaints about being asked
/// again and unclear replies leave it open.
fn tag_open_probe(session: &mut Session, input: &str) {
    let Some(probe_id) = session.open_probe().map(|p| p.id.clone()) else {
        return;
    };
    if is_repetition_complaint(input) {
        debug!(session_id = %session.id, probe_id = %probe_id, "Repetition complaint, probe left open");
        return;
    }
    let class = classify_user_response(input);
    let Some(tag) = class.tag() else {
        return;
    };
    match commit_in_session(session, &probe_id, tag) {
        Ok(_) => info!(session_id = %session.id, probe_id = %probe_id, ?class, "Probe tagged from reply"),
        Err(e) => warn!(session_id = %session.id, error = %e, "Reply tagging failed"),
    }
}

/// Apply the querent's answer to a parked subject conflict and return the
/// reply. Without a clear answer the conflict question is asked again.
fn resolve_pending_conflict(session: &mut Session, input: &str, pending: Vec<String>) -> String {
    let current = session.gate.session_subjects.clone();
    match resolve_conflict_answer(input, &current, &pending) {
        Some(ConflictChoice::Switch) => {
            info!(session_id = %session.id, subjects = ?pending, "Switched to uploaded subjects");
            let question = gate_question(&pending);
            session.gate.reset_for_conflict(pending);
            question
        }
        Some(ConflictChoice::Keep) => {
            info!(session_id = %session.id, subjects = ?current, "Kept current subjects");
            session.gate.keep_current();
            format!("Understood, we'll stay with {}.", current.join(" and "))
        }
        None => detect_subject_conflict(&current, &pending)
            .map(|c| c.message)
            .unwrap_or_else(|| gate_question(&current)),
    }
}

/// Report fields for validation: the mirror payload, its resolved
/// subjects at the root, then the request's report options on top.
fn validation_value(plan: &AutoExecutionPlan, options: &Map<String, Value>) -> Value {
    let payload: Option<&MirrorPayload> = plan.payload.as_ref();
    let mut obj = payload
        .and_then(|p| p.raw.as_object().cloned())
        .unwrap_or_default();

    if let Some(p) = payload {
        for (key, subject) in [("person_a", &p.person_a), ("person_b", &p.person_b)] {
            if let Some(s) = subject {
                obj.entry(key).or_insert_with(|| s.raw.clone());
            }
        }
    }
    for (key, value) in options {
        if !NON_REPORT_OPTIONS.contains(&key.as_str()) {
            obj.insert(key.clone(), value.clone());
        }
    }
    if plan.status == PlanStatus::RelationalAuto
        && !REPORT_TYPE_KEYS.iter().any(|k| obj.contains_key(*k))
    {
        obj.insert("report_type".to_string(), Value::from("relational"));
    }
    Value::Object(obj)
}

fn math_only_reply(plan: &AutoExecutionPlan) -> String {
    let names: Vec<&str> = [&plan.person_a_name, &plan.person_b_name]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    format!(
        "Relationship context wasn't provided, so this stays math-only: numeric geometry for {} with no narrative. Add relationship context for a full relational reading.",
        names.join(" and ")
    )
}

// =============================================================================
// Tests
// =============================================================================
