//! Schema adapters for uploaded report payloads.
//!
//! Uploaded contexts arrive in several shapes (flat, `unified_output`,
//! nested under `context`, `subjects`, `profiles` or `people`, snake or
//! camel keys). [`MirrorPayload::from_value`] normalises every recognised
//! shape into one canonical record so the planner and validator never
//! chase aliases themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

// =============================================================================
// Upload contexts
// =============================================================================

/// One uploaded piece of context attached to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadContext {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Raw payload text, normally JSON.
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl UploadContext {
    pub fn is_mirror(&self) -> bool {
        self.kind.as_deref() == Some("mirror")
    }
}

/// Parse an uploaded payload as JSON.
pub fn parse_content(raw: &str) -> Result<Value, ChatError> {
    serde_json::from_str(raw).map_err(|e| ChatError::ParseError(e.to_string()))
}

// =============================================================================
// JSON helpers
// =============================================================================

/// Walk `path` through nested objects.
pub(crate) fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.as_object()?.get(*key))
}

/// First non-null value among the given keys of an object.
pub(crate) fn first_key<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

pub(crate) fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    get_path(value, path)?.as_str()
}

fn non_empty_array(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty())
}

fn non_empty_object(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_object)
        .is_some_and(|o| !o.is_empty())
}

// =============================================================================
// Subjects
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSlot {
    A,
    B,
}

impl SubjectSlot {
    fn keys(self) -> [&'static str; 2] {
        match self {
            SubjectSlot::A => ["person_a", "personA"],
            SubjectSlot::B => ["person_b", "personB"],
        }
    }

    fn fallback_name(self) -> &'static str {
        match self {
            SubjectSlot::A => "Person A",
            SubjectSlot::B => "Person B",
        }
    }
}

/// Candidate containers probed for a subject, in priority order.
fn subject_sources(payload: &Value) -> Vec<&Value> {
    let mut sources = Vec::new();
    if let Some(v) = get_path(payload, &["unified_output"]) {
        sources.push(v);
    }
    sources.push(payload);
    if let Some(ctx) = get_path(payload, &["context"]) {
        sources.push(ctx);
        for key in ["unified_output", "subjects"] {
            if let Some(v) = get_path(ctx, &[key]) {
                sources.push(v);
            }
        }
    }
    for key in ["subjects", "profiles", "people"] {
        if let Some(v) = get_path(payload, &[key]) {
            sources.push(v);
        }
    }
    sources.retain(|v| v.is_object());
    sources
}

/// Locate the raw subject object for `slot`.
pub fn resolve_subject(payload: &Value, slot: SubjectSlot) -> Option<&Value> {
    subject_sources(payload)
        .into_iter()
        .find_map(|source| first_key(source, &slot.keys()).filter(|v| v.is_object()))
}

/// Whether a subject carries usable chart data.
pub fn has_complete_subject(subject: &Value) -> bool {
    if !subject.is_object() {
        return false;
    }
    let chart = get_path(subject, &["unified_output", "person_a", "chart"])
        .or_else(|| get_path(subject, &["unified_output", "personA", "chart"]))
        .or_else(|| get_path(subject, &["unified_output", "chart"]))
        .or_else(|| {
            first_key(
                subject,
                &[
                    "chart",
                    "chart_natal",
                    "chartNatal",
                    "geometry",
                    "natal_chart",
                    "blueprint",
                ],
            )
        });

    let populated_chart = chart.is_some_and(|c| match c {
        Value::Object(o) => !o.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => false,
    });
    let aspects = non_empty_array(get_path(subject, &["aspects"]))
        || chart.is_some_and(|c| non_empty_array(get_path(c, &["aspects"])));
    let placements = non_empty_array(get_path(subject, &["placements"]));
    let natal_section = non_empty_object(get_path(subject, &["_natal_section"]));

    populated_chart || aspects || placements || natal_section
}

/// Display name of a subject, or `fallback`.
pub fn extract_subject_name(subject: &Value, fallback: &str) -> String {
    const NAME_PATHS: &[&[&str]] = &[
        &["name"],
        &["details", "name"],
        &["profile", "name"],
        &["meta", "name"],
        &["identity", "name"],
        &["person", "name"],
    ];
    NAME_PATHS
        .iter()
        .find_map(|path| get_path(subject, path).filter(|v| !v.is_null()))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// A resolved chart subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub name: String,
    pub complete: bool,
    pub raw: Value,
}

impl Subject {
    fn resolve(payload: &Value, slot: SubjectSlot) -> Option<Self> {
        let raw = resolve_subject(payload, slot)?;
        Some(Self {
            name: extract_subject_name(raw, slot.fallback_name()),
            complete: has_complete_subject(raw),
            raw: raw.clone(),
        })
    }
}

// =============================================================================
// Context layers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLayer {
    Relationship,
    Dream,
    Field,
    SymbolicWeather,
}

impl ContextLayer {
    pub fn label(&self) -> &'static str {
        match self {
            ContextLayer::Relationship => "relationship context",
            ContextLayer::Dream => "dream payload",
            ContextLayer::Field => "field map",
            ContextLayer::SymbolicWeather => "symbolic weather overlay",
        }
    }

    fn markers(&self) -> &'static [&'static str] {
        match self {
            ContextLayer::Relationship => &[
                "relationship_context",
                "relationship",
                "relationship_scope",
                "relationship_profile",
            ],
            ContextLayer::Dream => &["dream", "dream_context", "dream_log"],
            ContextLayer::Field => &["field", "field_context", "fieldmap", "wm_fieldmap", "field_map"],
            ContextLayer::SymbolicWeather => &[
                "symbolic_weather",
                "symbolic_weather_context",
                "weather_overlay",
                "transit_context",
                "symbolic_weather_package",
                "weather_package",
            ],
        }
    }
}

const ALL_LAYERS: [ContextLayer; 4] = [
    ContextLayer::Relationship,
    ContextLayer::Dream,
    ContextLayer::Field,
    ContextLayer::SymbolicWeather,
];

/// Contextual layers present at the payload root or under `context`,
/// `metadata` or `meta`.
pub fn detect_context_layers(payload: &Value) -> Vec<ContextLayer> {
    let targets: Vec<&serde_json::Map<String, Value>> = [
        Some(payload),
        get_path(payload, &["context"]),
        get_path(payload, &["metadata"]),
        get_path(payload, &["meta"]),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_object)
    .collect();

    ALL_LAYERS
        .into_iter()
        .filter(|layer| {
            targets.iter().any(|obj| {
                layer.markers().iter().any(|m| obj.contains_key(*m))
                    || (*layer == ContextLayer::Relationship
                        && obj
                            .get("mirror_contract")
                            .and_then(|c| c.get("relationship_type"))
                            .is_some_and(|v| !v.is_null() && v != &Value::Bool(false)))
            })
        })
        .collect()
}

// =============================================================================
// Mirror contract
// =============================================================================

/// Report flags that decide between relational and parallel readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorContract {
    pub is_relational: bool,
    /// Lower-cased report kind.
    pub report_kind: Option<String>,
    pub mode: Option<String>,
}

impl MirrorContract {
    fn extract(payload: &Value) -> Self {
        let contract = ["mirror_contract", "contract"]
            .iter()
            .find_map(|k| get_path(payload, &[*k]).filter(|v| v.is_object()))
            .or_else(|| {
                ["mirror_contract", "contract"]
                    .iter()
                    .find_map(|k| get_path(payload, &["context", *k]).filter(|v| v.is_object()))
            });

        let report_kind = contract
            .and_then(|c| str_at(c, &["report_kind"]))
            .or_else(|| str_at(payload, &["report_kind"]))
            .or_else(|| str_at(payload, &["report", "kind"]))
            .or_else(|| str_at(payload, &["context", "report_kind"]))
            .map(str::to_lowercase);

        let is_relational = contract.is_some_and(|c| {
            c.get("is_relational") == Some(&Value::Bool(true))
                || c.get("relational") == Some(&Value::Bool(true))
        });

        Self {
            is_relational,
            report_kind,
            mode: contract.and_then(|c| str_at(c, &["mode"])).map(str::to_string),
        }
    }

    /// Relational flag, relational report kind, or a `relational_pair` hint.
    pub fn implies_relational(&self, template_hint: Option<&str>) -> bool {
        self.is_relational
            || self.report_kind.as_deref().is_some_and(|k| {
                ["relational", "synastry", "composite"]
                    .iter()
                    .any(|w| k.contains(w))
            })
            || template_hint == Some("relational_pair")
    }

    pub fn implies_parallel(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("parallel"))
            || self
                .report_kind
                .as_deref()
                .is_some_and(|k| k.contains("parallel"))
    }
}

// =============================================================================
// Canonical payload
// =============================================================================

/// Canonical view of one mirror payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPayload {
    pub person_a: Option<Subject>,
    pub person_b: Option<Subject>,
    pub template_hint: Option<String>,
    pub required_sections: Vec<String>,
    pub contract: MirrorContract,
    pub layers: Vec<ContextLayer>,
    pub raw: Value,
}

impl MirrorPayload {
    pub fn from_value(value: &Value) -> Self {
        let required_sections = get_path(value, &["_required_sections"])
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            person_a: Subject::resolve(value, SubjectSlot::A),
            person_b: Subject::resolve(value, SubjectSlot::B),
            template_hint: str_at(value, &["_template_hint"]).map(str::to_string),
            required_sections,
            contract: MirrorContract::extract(value),
            layers: detect_context_layers(value),
            raw: value.clone(),
        }
    }

    /// Fill incomplete subjects from a companion payload of the same turn.
    ///
    /// Only a complete companion subject replaces an incomplete one;
    /// complete subjects are never overwritten.
    pub fn merge_companion(&mut self, companion: &MirrorPayload) {
        for (mine, theirs) in [
            (&mut self.person_a, &companion.person_a),
            (&mut self.person_b, &companion.person_b),
        ] {
            let needs = !mine.as_ref().is_some_and(|s| s.complete);
            if needs {
                if let Some(candidate) = theirs.as_ref().filter(|s| s.complete) {
                    *mine = Some(candidate.clone());
                }
            }
        }
    }

    pub fn person_a_complete(&self) -> bool {
        self.person_a.as_ref().is_some_and(|s| s.complete)
    }

    pub fn person_b_complete(&self) -> bool {
        self.person_b.as_ref().is_some_and(|s| s.complete)
    }

    pub fn requires_person_b(&self) -> bool {
        self.required_sections
            .iter()
            .any(|s| s == "person_b" || s == "personB")
    }

    /// Names of the complete subjects, A first.
    pub fn subject_names(&self) -> Vec<String> {
        [&self.person_a, &self.person_b]
            .into_iter()
            .flatten()
            .filter(|s| s.complete)
            .map(|s| s.name.clone())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
