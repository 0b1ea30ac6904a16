//! Structural integrity validator for report requests.
//!
//! Every rule runs independently and results accumulate. Only `Error`
//! issues make a request invalid. A relational request without
//! relationship context is never guessed at: it either fails or carries a
//! named, visible downgrade.

use augur_core::config::ValidationConfig;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::payload::{first_key, get_path, resolve_subject, str_at, SubjectSlot};

// =============================================================================
// Result types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    InvalidRequestBody,
    MissingPersonA,
    RelationalMissingPersonB,
    RelationalGenericSymbolicDowngrade,
    RelationalMathOnlyExplicit,
    RelationalMathOnlyFallback,
    RelationalInvariantViolation,
    InvalidRelocationMode,
    RelocationWithoutBirthTime,
    WindowTooLarge,
    TemplateHintMismatch,
    BalanceMeterOutOfRange,
    WeatherFlagMismatch,
    CoordsMismatch,
    TimezoneMismatch,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            IssueCode::MissingPersonA => "MISSING_PERSON_A",
            IssueCode::RelationalMissingPersonB => "RELATIONAL_MISSING_PERSON_B",
            IssueCode::RelationalGenericSymbolicDowngrade => "RELATIONAL_GENERIC_SYMBOLIC_DOWNGRADE",
            IssueCode::RelationalMathOnlyExplicit => "RELATIONAL_MATH_ONLY_EXPLICIT",
            IssueCode::RelationalMathOnlyFallback => "RELATIONAL_MATH_ONLY_FALLBACK",
            IssueCode::RelationalInvariantViolation => "RELATIONAL_INVARIANT_VIOLATION",
            IssueCode::InvalidRelocationMode => "INVALID_RELOCATION_MODE",
            IssueCode::RelocationWithoutBirthTime => "RELOCATION_WITHOUT_BIRTH_TIME",
            IssueCode::WindowTooLarge => "WINDOW_TOO_LARGE",
            IssueCode::TemplateHintMismatch => "TEMPLATE_HINT_MISMATCH",
            IssueCode::BalanceMeterOutOfRange => "BALANCE_METER_OUT_OF_RANGE",
            IssueCode::WeatherFlagMismatch => "WEATHER_FLAG_MISMATCH",
            IssueCode::CoordsMismatch => "COORDS_MISMATCH",
            IssueCode::TimezoneMismatch => "TIMEZONE_MISMATCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Named lower-information generation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradeMode {
    /// Symbolic narrative without relationship-specific framing.
    GenericSymbolic,
    /// Numbers only, no narrative.
    MathOnly,
}

impl DowngradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DowngradeMode::GenericSymbolic => "generic_symbolic",
            DowngradeMode::MathOnly => "math_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub infos: Vec<ValidationIssue>,
    pub explicit_downgrade_mode: Option<DowngradeMode>,
    pub force_generic_symbolic_read: bool,
    pub summary: String,
}

impl ValidationResult {
    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    pub fn error_codes(&self) -> Vec<&'static str> {
        self.errors.iter().map(|i| i.code.as_str()).collect()
    }
}

#[derive(Default)]
struct Issues {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    infos: Vec<ValidationIssue>,
}

impl Issues {
    fn push(
        &mut self,
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        path: Option<&str>,
        context: Option<Value>,
    ) {
        let issue = ValidationIssue {
            code,
            message: message.into(),
            severity,
            path: path.map(str::to_string),
            context,
        };
        match severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Info => self.infos.push(issue),
        }
    }
}

// =============================================================================
// Relocation modes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelocationMode {
    #[serde(rename = "A_local")]
    ALocal,
    #[serde(rename = "B_local")]
    BLocal,
    #[serde(rename = "both_local")]
    BothLocal,
    #[serde(rename = "event")]
    Event,
    #[serde(rename = "none")]
    NoRelocation,
}

impl RelocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelocationMode::ALocal => "A_local",
            RelocationMode::BLocal => "B_local",
            RelocationMode::BothLocal => "both_local",
            RelocationMode::Event => "event",
            RelocationMode::NoRelocation => "none",
        }
    }
}

/// Case-insensitive alias lookup. Unrecognised modes (`midpoint`,
/// `custom`, `manual`, ...) yield `None`.
pub fn normalize_relocation_mode(raw: &str) -> Option<RelocationMode> {
    match raw.trim().to_lowercase().as_str() {
        "a_local" | "a-local" | "alocal" | "person_a" | "person-a" => Some(RelocationMode::ALocal),
        "b_local" | "b-local" | "blocal" | "person_b" | "person-b" => Some(RelocationMode::BLocal),
        "both_local" | "both-local" | "both" | "dual_local" | "dual-local" | "shared_local"
        | "shared" => Some(RelocationMode::BothLocal),
        "event" => Some(RelocationMode::Event),
        "none" | "off" | "natal" | "default" => Some(RelocationMode::NoRelocation),
        _ => None,
    }
}

/// Whether `mode` is already one of the canonical spellings (or absent).
pub fn is_canonical_relocation_mode(mode: Option<&str>) -> bool {
    match mode {
        None => true,
        Some(m) => matches!(
            m.to_lowercase().as_str(),
            "a_local" | "b_local" | "both_local" | "event" | "none"
        ),
    }
}

// =============================================================================
// Request adapter
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BalanceMeter {
    pub magnitude: Option<f64>,
    pub directional_bias: Option<f64>,
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateWindow {
    pub start: String,
    pub end: String,
}

/// Canonical view of a report request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRequest {
    pub person_a: Option<Value>,
    pub person_b: Option<Value>,
    /// Lower-cased report type.
    pub report_type: Option<String>,
    pub relationship_context: Option<Value>,
    pub relocation_mode: Option<String>,
    pub relocation_applies: bool,
    pub window: Option<DateWindow>,
    pub template_hint: Option<String>,
    pub balance_meter: BalanceMeter,
    pub contains_weather_data: Option<bool>,
    pub has_weather_data: bool,
    pub include_symbolic_read: Option<bool>,
    pub math_only: bool,
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ValidationRequest {
    /// Normalise any recognised request shape.
    pub fn from_value(value: &Value) -> Self {
        let person_a = resolve_subject(value, SubjectSlot::A).cloned();
        let person_b = resolve_subject(value, SubjectSlot::B).cloned();

        let report_type = first_key(
            value,
            &["report_type", "reportType", "reportStructure", "report_kind"],
        )
        .and_then(Value::as_str)
        .or_else(|| str_at(value, &["mirror_contract", "report_kind"]))
        .or_else(|| str_at(value, &["contract", "report_kind"]))
        .map(str::to_lowercase);

        let relocation_raw = match get_path(value, &["translocation"]) {
            Some(Value::String(s)) => Some(Value::String(s.clone())),
            Some(obj) if obj.is_object() => first_key(obj, &["mode", "method"]).cloned(),
            _ => None,
        }
        .or_else(|| {
            [
                &["context", "translocation", "method"][..],
                &["provenance", "relocation_mode"][..],
                &["_meta", "relocation_mode"][..],
                &["relocation_mode"][..],
            ]
            .iter()
            .find_map(|p| get_path(value, p).filter(|v| !v.is_null()).cloned())
        });
        let relocation_mode = relocation_raw
            .as_ref()
            .filter(|v| truthy(Some(*v)))
            .map(value_to_string);

        let relocation_applies = get_path(value, &["translocation", "applies"])
            == Some(&Value::Bool(true))
            || relocation_mode
                .as_deref()
                .and_then(normalize_relocation_mode)
                .is_some_and(|m| m != RelocationMode::NoRelocation);

        let window = get_path(value, &["window"]).and_then(|w| {
            let start = str_at(w, &["start"])?;
            let end = str_at(w, &["end"])?;
            Some(DateWindow {
                start: start.to_string(),
                end: end.to_string(),
            })
        });

        let mut balance_meter = BalanceMeter::default();
        let meter_sources = [
            get_path(value, &["balance_meter_frontstage"]),
            get_path(value, &["balance_meter"]),
            person_a.as_ref().and_then(|a| get_path(a, &["summary"])),
            get_path(value, &["summary"]),
        ];
        for source in meter_sources.into_iter().flatten() {
            let num = |k: &str| source.get(k).and_then(Value::as_f64);
            balance_meter.magnitude = balance_meter.magnitude.or_else(|| num("magnitude"));
            balance_meter.directional_bias = balance_meter
                .directional_bias
                .or_else(|| num("directional_bias"));
            balance_meter.volatility = balance_meter.volatility.or_else(|| num("volatility"));
        }

        let has_daily_readings = get_path(value, &["daily_readings"])
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty());
        let has_symbolic_weather = truthy(get_path(value, &["symbolic_weather_context"]))
            || truthy(get_path(value, &["woven_map", "symbolic_weather"]));

        Self {
            person_a,
            person_b,
            report_type,
            relationship_context: first_key(value, &["relationship_context", "relationship"])
                .cloned(),
            relocation_mode,
            relocation_applies,
            window,
            template_hint: str_at(value, &["_template_hint"]).map(str::to_string),
            balance_meter,
            contains_weather_data: get_path(value, &["_contains_weather_data"])
                .and_then(Value::as_bool),
            has_weather_data: has_daily_readings || has_symbolic_weather,
            include_symbolic_read: get_path(value, &["include_symbolic_read"])
                .and_then(Value::as_bool),
            math_only: get_path(value, &["math_only"]) == Some(&Value::Bool(true)),
        }
    }

    fn is_relational(&self) -> bool {
        matches!(self.report_type.as_deref(), Some("relational" | "synastry"))
    }

    /// Relationship context counts only when it names a scope or type.
    fn has_relationship_context(&self) -> bool {
        self.relationship_context.as_ref().is_some_and(|c| {
            c.is_object() && (truthy(c.get("scope")) || truthy(c.get("type")))
        })
    }
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
    pub requests_symbolic_read: bool,
    pub allow_math_only_fallback: bool,
    pub max_window_days: i64,
    pub coordinate_tolerance: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl ValidationOptions {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            requests_symbolic_read: true,
            allow_math_only_fallback: config.allow_math_only_fallback,
            max_window_days: config.max_window_days,
            coordinate_tolerance: config.coordinate_tolerance,
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Inclusive span in days, rounding partial days up.
fn window_days(window: &DateWindow) -> Option<i64> {
    let start = parse_instant(&window.start)?;
    let end = parse_instant(&window.end)?;
    let secs = (end - start).num_seconds();
    Some(-((-secs).div_euclid(86_400)) + 1)
}

/// Birth-time check used before any relocation is applied.
fn has_valid_birth_time(person: &Value) -> bool {
    let data = first_key(person, &["birth_data", "details"]).unwrap_or(person);
    if first_key(data, &["birth_time_known", "birthTimeKnown"]) == Some(&Value::Bool(false)) {
        return false;
    }
    let hour = first_key(data, &["hour", "birth_hour"]).and_then(Value::as_f64);
    let minute = first_key(data, &["minute", "birth_minute"]).and_then(Value::as_f64);
    if let (Some(h), Some(m)) = (hour, minute) {
        return (0.0..=23.0).contains(&h) && (0.0..=59.0).contains(&m);
    }
    first_key(data, &["birth_time", "birthTime"])
        .and_then(Value::as_str)
        .map(str::trim)
        .is_some_and(|t| {
            let mut parts = t.splitn(2, ':');
            let h = parts.next().unwrap_or("");
            let m = parts.next().unwrap_or("");
            (1..=2).contains(&h.len())
                && h.chars().all(|c| c.is_ascii_digit())
                && m.len() >= 2
                && m.chars().take(2).all(|c| c.is_ascii_digit())
        })
}

const BALANCE_RANGES: [(&str, &str, f64, f64); 3] = [
    ("magnitude", "Magnitude", 0.0, 5.0),
    ("directional_bias", "Directional bias", -5.0, 5.0),
    ("volatility", "Volatility", 0.0, 5.0),
];

/// Returns the downgrade applied, and whether a generic voice is forced.
fn check_relational(
    req: &ValidationRequest,
    opts: &ValidationOptions,
    issues: &mut Issues,
) -> (Option<DowngradeMode>, bool) {
    if !req.is_relational() {
        return (None, false);
    }
    if req.person_b.is_none() {
        issues.push(
            Severity::Error,
            IssueCode::RelationalMissingPersonB,
            "Relational report requires a second subject",
            Some("person_b"),
            None,
        );
        return (None, false);
    }
    if req.has_relationship_context() {
        return (None, false);
    }

    let math_only_requested = req.include_symbolic_read == Some(false) || req.math_only;
    let symbolic_requested =
        opts.requests_symbolic_read && req.include_symbolic_read != Some(false);

    if math_only_requested {
        issues.push(
            Severity::Info,
            IssueCode::RelationalMathOnlyExplicit,
            "relationship_context not provided; returning math_only output as requested",
            Some("relationship_context"),
            Some(json!({"downgradeMode": "math_only", "reason": "explicit_request"})),
        );
        (Some(DowngradeMode::MathOnly), false)
    } else if symbolic_requested {
        issues.push(
            Severity::Info,
            IssueCode::RelationalGenericSymbolicDowngrade,
            "relationship_context missing for relational report; downgraded to a generic symbolic read with no role assumptions",
            Some("relationship_context"),
            Some(json!({
                "downgradeMode": "generic_symbolic",
                "reason": "structural_invariant_violation",
                "hint": "provide relationship_context with a scope or type"
            })),
        );
        (Some(DowngradeMode::GenericSymbolic), true)
    } else if opts.allow_math_only_fallback {
        issues.push(
            Severity::Info,
            IssueCode::RelationalMathOnlyFallback,
            "relationship_context not provided and no symbolic read requested; downgraded to math_only",
            Some("relationship_context"),
            Some(json!({"downgradeMode": "math_only", "reason": "structural_invariant_violation"})),
        );
        (Some(DowngradeMode::MathOnly), false)
    } else {
        issues.push(
            Severity::Error,
            IssueCode::RelationalInvariantViolation,
            "Relational report with two subjects requires relationship_context",
            Some("relationship_context"),
            Some(json!({"kind": req.report_type, "hasPersonB": true, "hasRelationshipContext": false})),
        );
        (None, false)
    }
}

fn check_relocation(req: &ValidationRequest, issues: &mut Issues) {
    if let Some(raw) = req.relocation_mode.as_deref() {
        if normalize_relocation_mode(raw).is_none() {
            issues.push(
                Severity::Error,
                IssueCode::InvalidRelocationMode,
                format!(
                    "Relocation mode \"{}\" is not canonical. Allowed: A_local, B_local, both_local, event, none",
                    raw
                ),
                Some("translocation.mode"),
                Some(json!({"received": raw})),
            );
        }
    }

    if !req.relocation_applies {
        return;
    }
    for (slot, person) in [("person_a", &req.person_a), ("person_b", &req.person_b)] {
        if let Some(person) = person {
            if !has_valid_birth_time(person) {
                issues.push(
                    Severity::Error,
                    IssueCode::RelocationWithoutBirthTime,
                    format!("Cannot apply relocation for {}: birth time is unknown or invalid", slot),
                    Some(&format!("{}.birth_time", slot)),
                    None,
                );
            }
        }
    }
}

fn check_window(req: &ValidationRequest, opts: &ValidationOptions, issues: &mut Issues) {
    let Some(window) = &req.window else { return };
    let Some(days) = window_days(window) else { return };
    if days > opts.max_window_days {
        issues.push(
            Severity::Error,
            IssueCode::WindowTooLarge,
            format!(
                "Window of {} days exceeds maximum of {} days",
                days, opts.max_window_days
            ),
            Some("window"),
            Some(json!({"days": days, "max": opts.max_window_days})),
        );
    }
}

fn check_template_hint(req: &ValidationRequest, issues: &mut Issues) {
    match (req.template_hint.as_deref(), req.person_b.is_some()) {
        (Some("relational_pair"), false) => issues.push(
            Severity::Error,
            IssueCode::TemplateHintMismatch,
            "_template_hint is \"relational_pair\" but person_b is missing",
            Some("_template_hint"),
            None,
        ),
        (Some("solo_mirror"), true) => issues.push(
            Severity::Warning,
            IssueCode::TemplateHintMismatch,
            "_template_hint is \"solo_mirror\" but person_b is present",
            Some("_template_hint"),
            None,
        ),
        _ => {}
    }
}

fn check_balance_meter(req: &ValidationRequest, issues: &mut Issues) {
    let meter = &req.balance_meter;
    let values = [meter.magnitude, meter.directional_bias, meter.volatility];
    for ((field, label, min, max), value) in BALANCE_RANGES.iter().zip(values) {
        let Some(v) = value else { continue };
        if v < *min || v > *max {
            issues.push(
                Severity::Error,
                IssueCode::BalanceMeterOutOfRange,
                format!("{} {} is outside valid range [{}, {}]", label, v, min, max),
                Some(&format!("balance_meter.{}", field)),
                Some(json!({"value": v, "range": [min, max]})),
            );
        }
    }
}

fn check_weather(req: &ValidationRequest, issues: &mut Issues) {
    match (req.contains_weather_data, req.has_weather_data) {
        (Some(false), true) => issues.push(
            Severity::Warning,
            IssueCode::WeatherFlagMismatch,
            "_contains_weather_data is false but weather data is present",
            Some("_contains_weather_data"),
            None,
        ),
        (Some(true), false) => issues.push(
            Severity::Warning,
            IssueCode::WeatherFlagMismatch,
            "_contains_weather_data is true but no weather data found",
            Some("_contains_weather_data"),
            None,
        ),
        _ => {}
    }
}

fn check_coordinates(req: &ValidationRequest, opts: &ValidationOptions, issues: &mut Issues) {
    let Some(person) = &req.person_a else { return };
    let (Some(birth), Some(chart)) = (
        get_path(person, &["birth_data"]),
        get_path(person, &["chart"]),
    ) else {
        return;
    };

    let pairs = [
        (
            "latitude",
            birth.get("latitude").and_then(Value::as_f64),
            first_key(chart, &["lat", "latitude"]).and_then(Value::as_f64),
        ),
        (
            "longitude",
            birth.get("longitude").and_then(Value::as_f64),
            first_key(chart, &["lng", "lon", "longitude"]).and_then(Value::as_f64),
        ),
    ];
    for (axis, declared, charted) in pairs {
        if let (Some(d), Some(c)) = (declared, charted) {
            if (d - c).abs() > opts.coordinate_tolerance {
                issues.push(
                    Severity::Warning,
                    IssueCode::CoordsMismatch,
                    format!("person_a birth {} ({}) differs from chart {} ({})", axis, d, axis, c),
                    Some(&format!("person_a.chart.{}", axis)),
                    Some(json!({"birth": d, "chart": c, "tolerance": opts.coordinate_tolerance})),
                );
            }
        }
    }

    let declared_tz = birth.get("timezone").and_then(Value::as_str);
    let chart_tz = first_key(chart, &["tz_str", "timezone"]).and_then(Value::as_str);
    if let (Some(d), Some(c)) = (declared_tz, chart_tz) {
        if !d.is_empty() && !c.is_empty() && d != c {
            issues.push(
                Severity::Warning,
                IssueCode::TimezoneMismatch,
                format!("person_a birth timezone ({}) differs from chart timezone ({})", d, c),
                Some("person_a.chart.tz_str"),
                Some(json!({"birth": d, "chart": c})),
            );
        }
    }
}

fn summarize(issues: &Issues, downgrade: Option<DowngradeMode>, generic: bool) -> String {
    let mut parts = Vec::new();
    if !issues.errors.is_empty() {
        parts.push(format!("{} error(s)", issues.errors.len()));
    }
    if !issues.warnings.is_empty() {
        parts.push(format!("{} warning(s)", issues.warnings.len()));
    }
    if !issues.infos.is_empty() {
        parts.push(format!("{} info(s)", issues.infos.len()));
    }
    if generic {
        parts.push("generic symbolic read mode".to_string());
    }
    if let Some(mode) = downgrade {
        parts.push(format!("downgrade: {}", mode.as_str()));
    }
    if parts.is_empty() {
        "Valid".to_string()
    } else {
        parts.join(", ")
    }
}

/// Run every structural rule over `req`.
pub fn validate(req: &ValidationRequest, opts: &ValidationOptions) -> ValidationResult {
    let mut issues = Issues::default();

    if req.person_a.is_none() {
        issues.push(
            Severity::Error,
            IssueCode::MissingPersonA,
            "Request must include a primary subject",
            Some("person_a"),
            None,
        );
    }
    let (downgrade, generic) = check_relational(req, opts, &mut issues);
    check_relocation(req, &mut issues);
    check_window(req, opts, &mut issues);
    check_template_hint(req, &mut issues);
    check_balance_meter(req, &mut issues);
    check_weather(req, &mut issues);
    check_coordinates(req, opts, &mut issues);

    let summary = summarize(&issues, downgrade, generic);
    ValidationResult {
        valid: issues.errors.is_empty(),
        errors: issues.errors,
        warnings: issues.warnings,
        infos: issues.infos,
        explicit_downgrade_mode: downgrade,
        force_generic_symbolic_read: generic,
        summary,
    }
}

/// Validate a raw request body with default options.
pub fn validate_api_request(payload: &Value) -> ValidationResult {
    validate_value(payload, &ValidationOptions::default())
}

/// Validate a raw request body.
pub fn validate_value(payload: &Value, opts: &ValidationOptions) -> ValidationResult {
    if !payload.is_object() {
        let mut issues = Issues::default();
        issues.push(
            Severity::Error,
            IssueCode::InvalidRequestBody,
            "Request body must be a JSON object",
            None,
            None,
        );
        return ValidationResult {
            valid: false,
            summary: summarize(&issues, None, false),
            errors: issues.errors,
            warnings: issues.warnings,
            infos: issues.infos,
            explicit_downgrade_mode: None,
            force_generic_symbolic_read: true,
        };
    }
    validate(&ValidationRequest::from_value(payload), opts)
}

// =============================================================================
// Tests
// =============================================================================
