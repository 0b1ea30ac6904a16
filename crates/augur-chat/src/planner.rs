//! Auto-execution planner.
//!
//! Given the turn's upload contexts and the session, decide which
//! generation mode to run, or whether to ask first. The decision tree is
//! evaluated top to bottom and the first match wins:
//!
//! 1. no contexts: `none`
//! 2. mirror context already failed this session: `none`
//! 3. unparseable content: `osr` / `invalid_json`
//! 4. primary subject incomplete: `osr` / `missing_person_a`
//! 5. second subject required but incomplete: `osr` / `missing_required_subject_b`
//! 6. two complete subjects: stored or contract-derived mode, else ask
//! 7. contextual layers present: `contextual_auto`
//! 8. otherwise: `solo_auto`

use std::sync::LazyLock;

use augur_core::types::{RelationalMode, Session};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::payload::{parse_content, ContextLayer, MirrorPayload, UploadContext};

// =============================================================================
// Plan types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    None,
    Osr,
    SoloAuto,
    RelationalAuto,
    ParallelAuto,
    ContextualAuto,
    RelationalChoice,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::None => "none",
            PlanStatus::Osr => "osr",
            PlanStatus::SoloAuto => "solo_auto",
            PlanStatus::RelationalAuto => "relational_auto",
            PlanStatus::ParallelAuto => "parallel_auto",
            PlanStatus::ContextualAuto => "contextual_auto",
            PlanStatus::RelationalChoice => "relational_choice",
        }
    }

    /// Statuses that generate immediately without asking.
    pub fn is_auto(&self) -> bool {
        matches!(
            self,
            PlanStatus::SoloAuto
                | PlanStatus::RelationalAuto
                | PlanStatus::ParallelAuto
                | PlanStatus::ContextualAuto
        )
    }
}

/// Why a context fell outside what can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OsrReason {
    InvalidJson,
    MissingPersonA,
    MissingRequiredSubjectB,
}

impl OsrReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsrReason::InvalidJson => "invalid_json",
            OsrReason::MissingPersonA => "missing_person_a",
            OsrReason::MissingRequiredSubjectB => "missing_required_subject_b",
        }
    }

    /// Plain apology shown instead of a reading.
    pub fn apology(&self, context_name: Option<&str>) -> String {
        let name = context_name.unwrap_or("the uploaded report");
        match self {
            OsrReason::InvalidJson => format!(
                "Sorry, I couldn't read {}. It doesn't look like valid report data. Could you export it again and re-upload?",
                name
            ),
            OsrReason::MissingPersonA => format!(
                "Sorry, {} doesn't include complete chart data for the primary person, so I can't read it yet.",
                name
            ),
            OsrReason::MissingRequiredSubjectB => format!(
                "Sorry, {} is set up for two people but the second person's chart data is missing.",
                name
            ),
        }
    }
}

/// The planner's decision for one turn. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoExecutionPlan {
    pub status: PlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
    pub force_question: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_a_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_b_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_layers: Vec<ContextLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<OsrReason>,
    /// The normalised mirror payload, kept for request validation.
    #[serde(skip)]
    pub payload: Option<MirrorPayload>,
}

impl AutoExecutionPlan {
    pub fn none() -> Self {
        Self {
            status: PlanStatus::None,
            context_id: None,
            context_name: None,
            instructions: None,
            force_question: false,
            person_a_name: None,
            person_b_name: None,
            context_layers: Vec::new(),
            reason: None,
            payload: None,
        }
    }

    fn for_context(status: PlanStatus, ctx: &UploadContext) -> Self {
        Self {
            status,
            context_id: Some(ctx.id.clone()),
            context_name: ctx.name.clone(),
            ..Self::none()
        }
    }

    fn osr(ctx: &UploadContext, reason: OsrReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::for_context(PlanStatus::Osr, ctx)
        }
    }
}

// =============================================================================
// Instruction templates
// =============================================================================

fn solo_instructions(a: &str) -> Vec<String> {
    vec![
        format!("Auto-run: solo reading for {}.", a),
        "Open with the strongest patterns, each tied to the chart factor behind it.".to_string(),
        "Name the main tensions as pairs, in conditional language.".to_string(),
        "Close with exactly one falsifiable resonance question.".to_string(),
    ]
}

fn relational_instructions(a: &str, b: &str) -> Vec<String> {
    vec![
        format!("Auto-run: relational reading for {} and {}.", a, b),
        "Describe the dynamics between them, keeping both equally visible.".to_string(),
        "Do not cast either person as the problem.".to_string(),
        "Close with exactly one falsifiable resonance question.".to_string(),
    ]
}

fn parallel_instructions(a: &str, b: &str) -> Vec<String> {
    vec![
        format!("Auto-run: parallel readings for {} and {}.", a, b),
        "Read each chart separately; hold any synthesis until the end.".to_string(),
        "Close with exactly one falsifiable resonance question.".to_string(),
    ]
}

fn contextual_instructions(a: &str, layers: &[ContextLayer]) -> Vec<String> {
    let labels: Vec<&str> = layers.iter().map(|l| l.label()).collect();
    vec![
        format!("Auto-run: contextual reading for {}.", a),
        format!("Integrate the {} into the reading.", labels.join(", ")),
        "Close with exactly one context-aware resonance question.".to_string(),
    ]
}

// =============================================================================
// Planning
// =============================================================================

/// Pick the authoritative context: the last `mirror` context, else the last.
fn select_mirror_context(contexts: &[UploadContext]) -> Option<(usize, &UploadContext)> {
    contexts
        .iter()
        .enumerate()
        .rev()
        .find(|(_, c)| c.is_mirror())
        .or_else(|| contexts.iter().enumerate().last())
}

/// Normalise the authoritative payload and fill gaps from companions.
fn merged_payload(contexts: &[UploadContext], index: usize, value: &serde_json::Value) -> MirrorPayload {
    let mut payload = MirrorPayload::from_value(value);
    for (i, companion) in contexts.iter().enumerate() {
        if i == index {
            continue;
        }
        if let Ok(v) = parse_content(&companion.content) {
            payload.merge_companion(&MirrorPayload::from_value(&v));
        }
    }
    payload
}

/// Names of the complete subjects in this turn's authoritative context.
/// Empty when there is no context or it does not parse.
pub fn uploaded_subjects(contexts: &[UploadContext]) -> Vec<String> {
    let Some((index, ctx)) = select_mirror_context(contexts) else {
        return Vec::new();
    };
    match parse_content(&ctx.content) {
        Ok(value) => merged_payload(contexts, index, &value).subject_names(),
        Err(_) => Vec::new(),
    }
}

/// Decide how to proceed with this turn's contexts.
pub fn derive_plan(contexts: &[UploadContext], session: &Session) -> AutoExecutionPlan {
    let Some((index, ctx)) = select_mirror_context(contexts) else {
        return AutoExecutionPlan::none();
    };

    if session.failed_contexts.contains(&ctx.id) {
        debug!(context_id = %ctx.id, "Skipping previously failed context");
        return AutoExecutionPlan::none();
    }

    let value = match parse_content(&ctx.content) {
        Ok(v) => v,
        Err(e) => {
            debug!(context_id = %ctx.id, error = %e, "Context is not valid JSON");
            return AutoExecutionPlan::osr(ctx, OsrReason::InvalidJson);
        }
    };

    let payload = merged_payload(contexts, index, &value);

    debug!(
        context_id = %ctx.id,
        person_a = payload.person_a_complete(),
        person_b = payload.person_b_complete(),
        "Resolved subjects"
    );

    if !payload.person_a_complete() {
        return AutoExecutionPlan::osr(ctx, OsrReason::MissingPersonA);
    }
    if payload.requires_person_b() && !payload.person_b_complete() {
        return AutoExecutionPlan::osr(ctx, OsrReason::MissingRequiredSubjectB);
    }

    let a_name = payload
        .person_a
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Person A".to_string());

    if payload.person_b_complete() {
        let b_name = payload
            .person_b
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Person B".to_string());

        let mode = session.relational_modes.get(&ctx.id).copied().or_else(|| {
            if payload.contract.implies_relational(payload.template_hint.as_deref()) {
                Some(RelationalMode::Relational)
            } else if payload.contract.implies_parallel() {
                Some(RelationalMode::Parallel)
            } else {
                None
            }
        });

        let (status, instructions) = match mode {
            Some(RelationalMode::Relational) => (
                PlanStatus::RelationalAuto,
                Some(relational_instructions(&a_name, &b_name)),
            ),
            Some(RelationalMode::Parallel) => (
                PlanStatus::ParallelAuto,
                Some(parallel_instructions(&a_name, &b_name)),
            ),
            None => (PlanStatus::RelationalChoice, None),
        };
        debug!(context_id = %ctx.id, status = status.as_str(), "Two-subject plan");
        return AutoExecutionPlan {
            force_question: status.is_auto(),
            instructions,
            person_a_name: Some(a_name),
            person_b_name: Some(b_name),
            payload: Some(payload),
            ..AutoExecutionPlan::for_context(status, ctx)
        };
    }

    if !payload.layers.is_empty() {
        return AutoExecutionPlan {
            force_question: true,
            instructions: Some(contextual_instructions(&a_name, &payload.layers)),
            context_layers: payload.layers.clone(),
            person_a_name: Some(a_name),
            payload: Some(payload),
            ..AutoExecutionPlan::for_context(PlanStatus::ContextualAuto, ctx)
        };
    }

    AutoExecutionPlan {
        force_question: true,
        instructions: Some(solo_instructions(&a_name)),
        person_a_name: Some(a_name),
        payload: Some(payload),
        ..AutoExecutionPlan::for_context(PlanStatus::SoloAuto, ctx)
    }
}

// =============================================================================
// Relational choice and retries
// =============================================================================

static RELATIONAL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(relational|together|both|synastry|relationship|combined|shared)\b")
        .expect("Invalid choice regex")
});

static PARALLEL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(parallel|separate|separately|individual|individually|solo|each)\b")
        .expect("Invalid choice regex")
});

static RETRY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(retry|try\s+again)\b").expect("Invalid retry regex")
});

/// The literal question asked for a `relational_choice` plan.
pub fn relational_choice_question(a: &str, b: &str) -> String {
    format!(
        "I have complete charts for {} and {}. Should I read them together as a relationship, or separately side by side?",
        a, b
    )
}

/// Interpret the answer to [`relational_choice_question`].
///
/// Relational words are checked first, so a reply naming both modes
/// ("both of us, separately") resolves to relational.
pub fn parse_relational_choice(text: &str) -> Option<RelationalMode> {
    let input = text.trim();
    if input.is_empty() {
        return None;
    }
    if RELATIONAL_WORDS.is_match(input) {
        Some(RelationalMode::Relational)
    } else if PARALLEL_WORDS.is_match(input) {
        Some(RelationalMode::Parallel)
    } else {
        None
    }
}

/// Whether the user explicitly asked to retry a failed reading.
pub fn is_retry_request(text: &str) -> bool {
    RETRY_WORDS.is_match(text)
}

/// Memoise a failed generation so the next plan for it short-circuits.
pub fn record_failure(session: &mut Session, plan: &AutoExecutionPlan) {
    if let Some(id) = &plan.context_id {
        session.failed_contexts.insert(id.clone());
    }
}

/// Forget failures for the given contexts. Returns how many were cleared.
pub fn clear_failures(session: &mut Session, contexts: &[UploadContext]) -> usize {
    contexts
        .iter()
        .filter(|c| session.failed_contexts.remove(&c.id))
        .count()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(id: &str, kind: Option<&str>, content: serde_json::Value) -> UploadContext {
        UploadContext {
            id: id.into(),
            name: Some(format!("{id}.json")),
            kind: kind.map(str::to_string),
            content: content.to_string(),
            summary: None,
        }
    }

    fn subject(name: &str) -> serde_json::Value {
        json!({"name": name, "chart": {"planets": [{"name": "Sun"}]}})
    }

    #[test]
    fn test_no_contexts_is_none() {
        let plan = derive_plan(&[], &Session::new("s"));
        assert_eq!(plan.status, PlanStatus::None);
        assert!(!plan.force_question);
    }

    #[test]
    fn test_invalid_json_is_osr() {
        let c = UploadContext {
            id: "c1".into(),
            name: None,
            kind: Some("mirror".into()),
            content: "{not json".into(),
            summary: None,
        };
        let plan = derive_plan(&[c], &Session::new("s"));
        assert_eq!(plan.status, PlanStatus::Osr);
        assert_eq!(plan.reason, Some(OsrReason::InvalidJson));
        assert_eq!(plan.context_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_missing_person_a_is_osr() {
        let plan = derive_plan(
            &[ctx("c1", Some("mirror"), json!({"person_a": {"name": "Ada"}}))],
            &Session::new("s"),
        );
        assert_eq!(plan.reason, Some(OsrReason::MissingPersonA));
    }

    #[test]
    fn test_missing_required_subject_b_is_osr() {
        let plan = derive_plan(
            &[ctx(
                "c1",
                Some("mirror"),
                json!({"person_a": subject("Ada"), "_required_sections": ["personB"]}),
            )],
            &Session::new("s"),
        );
        assert_eq!(plan.reason, Some(OsrReason::MissingRequiredSubjectB));
    }

    #[test]
    fn test_solo_auto() {
        let plan = derive_plan(
            &[ctx("c1", Some("mirror"), json!({"person_a": subject("Ada")}))],
            &Session::new("s"),
        );
        assert_eq!(plan.status, PlanStatus::SoloAuto);
        assert!(plan.force_question);
        assert_eq!(plan.person_a_name.as_deref(), Some("Ada"));
        assert!(plan.instructions.unwrap()[0].contains("Ada"));
    }

    #[test]
    fn test_contextual_auto_names_layers() {
        let plan = derive_plan(
            &[ctx(
                "c1",
                None,
                json!({"person_a": subject("Ada"), "dream_log": [], "transit_context": {}}),
            )],
            &Session::new("s"),
        );
        assert_eq!(plan.status, PlanStatus::ContextualAuto);
        assert_eq!(
            plan.context_layers,
            vec![ContextLayer::Dream, ContextLayer::SymbolicWeather]
        );
        let joined = plan.instructions.unwrap().join(" ");
        assert!(joined.contains("dream payload, symbolic weather overlay"));
    }

    #[test]
    fn test_two_subjects_without_mode_asks() {
        let plan = derive_plan(
            &[ctx(
                "c1",
                Some("mirror"),
                json!({"person_a": subject("Ada"), "person_b": subject("Grace")}),
            )],
            &Session::new("s"),
        );
        assert_eq!(plan.status, PlanStatus::RelationalChoice);
        assert!(!plan.force_question);
        assert!(plan.instructions.is_none());
        assert_eq!(plan.person_b_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_stored_choice_resolves_relational_auto() {
        let mut session = Session::new("s");
        let contexts = [ctx(
            "c1",
            Some("mirror"),
            json!({"person_a": subject("Ada"), "person_b": subject("Grace")}),
        )];
        assert_eq!(
            derive_plan(&contexts, &session).status,
            PlanStatus::RelationalChoice
        );

        let choice = parse_relational_choice("let's do it together").unwrap();
        session.relational_modes.insert("c1".into(), choice);
        let plan = derive_plan(&contexts, &session);
        assert_eq!(plan.status, PlanStatus::RelationalAuto);
        assert!(plan.force_question);
    }

    #[test]
    fn test_contract_flags_pick_mode() {
        let relational = derive_plan(
            &[ctx(
                "c1",
                None,
                json!({
                    "person_a": subject("Ada"),
                    "person_b": subject("Grace"),
                    "mirror_contract": {"report_kind": "composite"}
                }),
            )],
            &Session::new("s"),
        );
        assert_eq!(relational.status, PlanStatus::RelationalAuto);

        let parallel = derive_plan(
            &[ctx(
                "c1",
                None,
                json!({
                    "person_a": subject("Ada"),
                    "person_b": subject("Grace"),
                    "contract": {"mode": "parallel_diagnostics"}
                }),
            )],
            &Session::new("s"),
        );
        assert_eq!(parallel.status, PlanStatus::ParallelAuto);
    }

    #[test]
    fn test_last_mirror_context_is_authoritative() {
        let contexts = [
            ctx("c1", Some("mirror"), json!({"person_a": subject("Ada")})),
            ctx("c2", Some("mirror"), json!({"person_a": subject("Grace")})),
            ctx("c3", Some("note"), json!({"text": "hello"})),
        ];
        let plan = derive_plan(&contexts, &Session::new("s"));
        assert_eq!(plan.context_id.as_deref(), Some("c2"));
        assert_eq!(plan.person_a_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_companion_context_fills_missing_subject() {
        let contexts = [
            ctx("c1", None, json!({"person_b": subject("Grace")})),
            ctx(
                "c2",
                Some("mirror"),
                json!({"person_a": subject("Ada"), "_required_sections": ["person_b"]}),
            ),
        ];
        let plan = derive_plan(&contexts, &Session::new("s"));
        assert_eq!(plan.status, PlanStatus::RelationalChoice);
        assert_eq!(plan.person_b_name.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_failed_context_short_circuits_until_cleared() {
        let mut session = Session::new("s");
        let contexts = [ctx("c1", Some("mirror"), json!({"person_a": subject("Ada")}))];
        let plan = derive_plan(&contexts, &session);
        assert_eq!(plan.status, PlanStatus::SoloAuto);

        record_failure(&mut session, &plan);
        assert_eq!(derive_plan(&contexts, &session).status, PlanStatus::None);

        assert_eq!(clear_failures(&mut session, &contexts), 1);
        assert_eq!(derive_plan(&contexts, &session).status, PlanStatus::SoloAuto);
    }

    #[test]
    fn test_uploaded_subjects() {
        let contexts = [ctx(
            "c1",
            Some("mirror"),
            json!({"person_a": subject("Ada"), "person_b": {"name": "Grace"}}),
        )];
        assert_eq!(uploaded_subjects(&contexts), vec!["Ada".to_string()]);
        assert!(uploaded_subjects(&[]).is_empty());
    }

    #[test]
    fn test_parse_relational_choice() {
        assert_eq!(parse_relational_choice("together"), Some(RelationalMode::Relational));
        assert_eq!(
            parse_relational_choice("Synastry please"),
            Some(RelationalMode::Relational)
        );
        assert_eq!(
            parse_relational_choice("separately is fine"),
            Some(RelationalMode::Parallel)
        );
        assert_eq!(
            parse_relational_choice("one at a time, individually"),
            Some(RelationalMode::Parallel)
        );
        assert_eq!(parse_relational_choice("hmm not sure"), None);
        assert_eq!(parse_relational_choice(""), None);
    }

    #[test]
    fn test_relational_words_win_over_parallel() {
        assert_eq!(
            parse_relational_choice("read both of us separately"),
            Some(RelationalMode::Relational)
        );
        assert_eq!(
            parse_relational_choice("each of us, but shared"),
            Some(RelationalMode::Relational)
        );
        assert_eq!(
            parse_relational_choice("each one on their own"),
            Some(RelationalMode::Parallel)
        );
    }

    #[test]
    fn test_retry_detection() {
        assert!(is_retry_request("retry"));
        assert!(is_retry_request("Can you try again?"));
        assert!(!is_retry_request("tell me more"));
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let plan = derive_plan(
            &[ctx("c1", Some("mirror"), json!({"person_a": subject("Ada")}))],
            &Session::new("s"),
        );
        let v = serde_json::to_value(&plan).unwrap();
        assert_eq!(v["status"], "solo_auto");
        assert_eq!(v["contextId"], "c1");
        assert_eq!(v["forceQuestion"], true);
        assert!(v.get("payload").is_none());
        assert!(v.get("reason").is_none());
    }
}
