//! Session orchestration core for the reading assistant.
//!
//! Resolves who is speaking, decides which generation mode a turn should
//! run, validates report requests, and keeps the per-session resonance
//! ledger.

pub mod classifier;
pub mod context_gate;
pub mod error;
pub mod narrator;
pub mod orchestrator;
pub mod payload;
pub mod planner;
pub mod probe;
pub mod store;
pub mod validator;

pub use classifier::{classify, fallback_probe, record_suggestion};
pub use context_gate::{
    detect_querent_identity, detect_subject_conflict, gate_question, resolve_conflict_answer,
    voice_instructions, ConflictChoice, ConflictKind, IdentityMatch, SubjectConflict,
};
pub use error::ChatError;
pub use narrator::{narrator_from_config, EchoNarrator, NarrationRequest, NarrationStream, Narrator};
pub use orchestrator::{
    CloseResponse, ExportResponse, FeedbackResponse, Provenance, ReplySource, TurnAction,
    TurnFrame, TurnOrchestrator, TurnRequest,
};
pub use payload::{ContextLayer, MirrorContract, MirrorPayload, Subject, UploadContext};
pub use planner::{
    derive_plan, is_retry_request, parse_relational_choice, relational_choice_question,
    AutoExecutionPlan, OsrReason, PlanStatus,
};
pub use probe::{
    classify_user_response, commit_probe, create_probe, extract_probe_from_response,
    is_repetition_complaint, score_session, ResponseClass, SessionScores, TagCounts,
};
pub use store::{SessionHandle, SessionStore, SessionSummary};
pub use validator::{
    is_canonical_relocation_mode, normalize_relocation_mode, validate, validate_api_request,
    DowngradeMode, IssueCode, RelocationMode, ValidationOptions, ValidationRequest,
    ValidationResult,
};
