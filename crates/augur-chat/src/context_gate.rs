//! Context gate: who is the human talking, relative to the chart subjects.
//!
//! Detection is a pure function over the input text and the known subject
//! names. Persisting the resolved role is the caller's job, through
//! [`ContextGateState::confirm`](augur_core::types::ContextGateState::confirm).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use augur_core::types::{Confidence, QuerentRole};
use regex::Regex;
use serde::Serialize;

/// A resolved identity signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityMatch {
    pub role: QuerentRole,
    pub confidence: Confidence,
    /// The subject name the querent identified as, when a name matched.
    pub name: Option<String>,
}

impl IdentityMatch {
    fn new(role: QuerentRole, confidence: Confidence) -> Self {
        Self {
            role,
            confidence,
            name: None,
        }
    }
}

// =============================================================================
// Direct role phrases
// =============================================================================

static DIRECT_PATTERNS: LazyLock<Vec<(Regex, QuerentRole)>> = LazyLock::new(|| {
    let table: &[(&str, QuerentRole)] = &[
        // "I'm a ..." is ordinary speech, so a bare letter must end the reply
        (
            r"(?i)^(i'?m|i\s+am)\s+(person\s+a\b|a\s*[.!]*$)",
            QuerentRole::SelfA,
        ),
        (
            r"(?i)^(i'?m|i\s+am)\s+(person\s+b\b|b\s*[.!]*$)",
            QuerentRole::SelfB,
        ),
        (r"(?i)^we('re|\s+are)\s+(both\s+)?here", QuerentRole::Both),
        (r"(?i)^both\s+of\s+us\b", QuerentRole::Both),
        (r"(?i)^(i'?m|i\s+am)\s+(an?\s+)?observer", QuerentRole::Observer),
        (r"(?i)^(i'?m|i\s+am)\s+asking\s+about\s+them", QuerentRole::Observer),
        (
            r"(?i)^(this|the\s+chart)\s+is\s+(for|about)\s+(someone\s+else|them|another)",
            QuerentRole::Observer,
        ),
        (r"(?i)^third\s+party", QuerentRole::Observer),
    ];
    table
        .iter()
        .map(|(p, role)| (Regex::new(p).expect("Invalid identity regex"), *role))
        .collect()
});

static SINGLE_AFFIRMATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(yes[,.!]?\s*)?((it'?s|that'?s)\s+me|me|yes|yep|yeah)[.!]*$")
        .expect("Invalid identity regex")
});

static COLLECTIVE_AFFIRMATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(yes[,.!]?\s*)?(both(\s+of\s+us)?|we(\s+both)?|us|together|the\s+two\s+of\s+us)[.!]*$",
    )
    .expect("Invalid identity regex")
});

/// Openers that may precede a subject name in a self identification
/// ("I'm", "this is", "hi, it's", ...). The trailing whitespace is part of
/// the match, so the name starts right at the match end.
static NAME_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:i'?m|i\s+am|this\s+is|my\s+name\s+is|it'?s|yes,?|(?:hi|hey|hello)[,!]?(?:\s+(?:it'?s|i'?m))?)\s+",
    )
    .expect("Invalid identity regex")
});

/// What may follow a bare name at the start of a reply.
static BARE_NAME_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:$|\s+(?:here|speaking)\b)").expect("Invalid identity regex")
});

/// Replies at most this many words that mention a subject name count as a
/// medium-confidence match.
const SHORT_REPLY_WORDS: usize = 4;

fn normalize(input: &str) -> String {
    input
        .trim()
        .replace('\u{2019}', "'")
        .trim_end_matches(['.', '!'])
        .trim()
        .to_lowercase()
}

/// Full name plus first name when it differs.
fn name_variants(name: &str) -> Vec<String> {
    let full = name.trim().to_lowercase();
    if full.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![full.clone()];
    if let Some(first) = full.split_whitespace().next() {
        if first != full && first.chars().count() >= 2 {
            variants.push(first.to_string());
        }
    }
    variants
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `variant` at the start of `rest`, not followed by a word character.
fn leads_with_name(rest: &str, variant: &str) -> bool {
    rest.strip_prefix(variant)
        .is_some_and(|tail| !tail.chars().next().is_some_and(is_word_char))
}

/// High-confidence forms: an opener then the name, or the bare name
/// optionally followed by "here" / "speaking".
fn names_self(text: &str, variant: &str) -> bool {
    if let Some(m) = NAME_OPENER.find(text) {
        if leads_with_name(&text[m.end()..], variant) {
            return true;
        }
    }
    text.strip_prefix(variant)
        .is_some_and(|tail| BARE_NAME_TAIL.is_match(tail))
}

/// `variant` appears in `text` as a whole word sequence.
fn mentions(text: &str, variant: &str) -> bool {
    text.match_indices(variant).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + variant.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn role_for_index(index: usize) -> QuerentRole {
    if index == 0 {
        QuerentRole::SelfA
    } else {
        QuerentRole::SelfB
    }
}

/// Resolve the querent's identity from free text.
///
/// Returns `None` when no identity signal is found; the caller keeps the
/// gate unconfirmed and asks again.
pub fn detect_querent_identity(input: &str, subjects: &[String]) -> Option<IdentityMatch> {
    let text = normalize(input);
    if text.is_empty() {
        return None;
    }

    // 1. Direct role phrases. Person B and "both" need a second subject.
    for (re, role) in DIRECT_PATTERNS.iter() {
        if !re.is_match(&text) {
            continue;
        }
        if matches!(role, QuerentRole::SelfB | QuerentRole::Both) && subjects.len() < 2 {
            return None;
        }
        return Some(IdentityMatch::new(*role, Confidence::High));
    }

    // 2. Names
    let mut mentioned: Option<(usize, &String)> = None;
    for (index, subject) in subjects.iter().enumerate().take(2) {
        for variant in name_variants(subject) {
            if names_self(&text, &variant) {
                return Some(IdentityMatch {
                    role: role_for_index(index),
                    confidence: Confidence::High,
                    name: Some(subject.clone()),
                });
            }
            if mentioned.is_none() && mentions(&text, &variant) {
                mentioned = Some((index, subject));
            }
        }
    }
    if let Some((index, subject)) = mentioned {
        if text.split_whitespace().count() <= SHORT_REPLY_WORDS {
            return Some(IdentityMatch {
                role: role_for_index(index),
                confidence: Confidence::Medium,
                name: Some(subject.clone()),
            });
        }
    }

    // 3. Single-subject affirmations
    if subjects.len() == 1 && SINGLE_AFFIRMATION.is_match(&text) {
        return Some(IdentityMatch {
            role: QuerentRole::SelfA,
            confidence: Confidence::Medium,
            name: Some(subjects[0].clone()),
        });
    }

    // 4. Two-subject collective affirmations
    if subjects.len() == 2 && COLLECTIVE_AFFIRMATION.is_match(&text) {
        return Some(IdentityMatch::new(QuerentRole::Both, Confidence::High));
    }

    None
}

// =============================================================================
// Subject conflicts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// No name in common.
    Disjoint,
    /// Some names shared, but the sets differ.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectConflict {
    pub kind: ConflictKind,
    pub message: String,
}

/// Compare the session's subjects with a new upload's subjects.
///
/// Names compare case-insensitively after trimming. An empty side never
/// conflicts. This only signals; switching is always the caller's
/// decision after asking the querent.
pub fn detect_subject_conflict(current: &[String], uploaded: &[String]) -> Option<SubjectConflict> {
    if current.is_empty() || uploaded.is_empty() {
        return None;
    }
    let norm = |names: &[String]| -> BTreeSet<String> {
        names.iter().map(|s| s.trim().to_lowercase()).collect()
    };
    let current_set = norm(current);
    let uploaded_set = norm(uploaded);
    let overlap = current_set.intersection(&uploaded_set).count();

    if overlap == 0 {
        return Some(SubjectConflict {
            kind: ConflictKind::Disjoint,
            message: format!(
                "The uploaded report is for {}, but this session is about {}. Which one should we talk about?",
                uploaded.join(" and "),
                current.join(" and ")
            ),
        });
    }
    if overlap < current_set.len().max(uploaded_set.len()) {
        return Some(SubjectConflict {
            kind: ConflictKind::Partial,
            message: "The uploaded report names different people than this session. Should I switch to the new chart, or stay with the current one?".to_string(),
        });
    }
    None
}

/// The querent's answer to a subject conflict question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChoice {
    /// Adopt the newly uploaded subjects.
    Switch,
    /// Stay with the session's current subjects.
    Keep,
}

static SWITCH_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(new|newer|switch|change|swap|other|upload(ed)?)\b").expect("Invalid conflict regex")
});

static KEEP_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(keep|stay|current|old|same|original|previous)\b").expect("Invalid conflict regex")
});

fn names_any(text: &str, names: &[String], exclude: &[String]) -> bool {
    names
        .iter()
        .filter(|n| !exclude.iter().any(|e| e.trim().eq_ignore_ascii_case(n.trim())))
        .flat_map(|n| name_variants(n))
        .any(|variant| mentions(text, &variant))
}

/// Read the answer to a subject conflict question.
///
/// Switch words or a name only in `pending` point to the new upload; keep
/// words or a name only in `current` point to the current subjects.
/// Signals for both sides, or none at all, give `None` and the caller asks
/// again.
pub fn resolve_conflict_answer(
    input: &str,
    current: &[String],
    pending: &[String],
) -> Option<ConflictChoice> {
    let text = normalize(input);
    if text.is_empty() {
        return None;
    }
    let switch = SWITCH_WORDS.is_match(&text) || names_any(&text, pending, current);
    let keep = KEEP_WORDS.is_match(&text) || names_any(&text, current, pending);
    match (switch, keep) {
        (true, false) => Some(ConflictChoice::Switch),
        (false, true) => Some(ConflictChoice::Keep),
        _ => None,
    }
}

/// Voice framing for a confirmed querent role. `None` while unconfirmed.
pub fn voice_instructions(role: QuerentRole, subjects: &[String]) -> Option<String> {
    let subject = |index: usize, fallback: &str| {
        subjects
            .get(index)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };
    let text = match role {
        QuerentRole::Unconfirmed => return None,
        QuerentRole::SelfA | QuerentRole::SelfB => {
            let name = if role == QuerentRole::SelfA {
                subject(0, "Person A")
            } else {
                subject(1, "Person B")
            };
            format!(
                "Voice: first-person reflective mode for {}.\n\
                 - Speak to them as \"you\" and offer patterns as invitations to recognise.\n\
                 - Keep language conditional: \"this chart suggests you may...\", never \"you will...\".",
                name
            )
        }
        QuerentRole::Both => format!(
            "Voice: relational mirror mode, {} and {} are both present.\n\
             - Speak in terms of \"between you\" and \"when the two of you...\".\n\
             - Take no sides and keep both people equally visible.",
            subject(0, "Person A"),
            subject(1, "Person B")
        ),
        QuerentRole::Observer => "Voice: observer mode, the querent is asking about someone else.\n\
             - Use conditional third-person phrasing only: \"this chart suggests this person may tend to...\".\n\
             - Make no claims about the inner experience of someone who is not present.\n\
             - Give no prescriptive advice about people who are not in the conversation."
            .to_string(),
    };
    Some(text)
}

/// The literal opening question asked while the gate is unconfirmed.
pub fn gate_question(subjects: &[String]) -> String {
    match subjects {
        [] => "Before we begin, who am I speaking with right now?".to_string(),
        [name] => format!(
            "Before we begin, am I speaking with {}, or are you someone asking about their chart?",
            name
        ),
        [a, b, ..] => format!(
            "Before we begin, who am I speaking with right now? Are you {}, {}, both of you together, or someone else asking about them?",
            a, b
        ),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn role_of(input: &str, subjects: &[String]) -> Option<(QuerentRole, Confidence)> {
        detect_querent_identity(input, subjects).map(|m| (m.role, m.confidence))
    }

    // ---- Direct phrases ----

    #[test]
    fn test_direct_person_phrases() {
        let s = names(&["Ada", "Grace"]);
        assert_eq!(role_of("I'm Person A", &s), Some((QuerentRole::SelfA, Confidence::High)));
        assert_eq!(role_of("i am person b", &s), Some((QuerentRole::SelfB, Confidence::High)));
        assert_eq!(role_of("I'm A.", &s), Some((QuerentRole::SelfA, Confidence::High)));
    }

    #[test]
    fn test_im_a_bit_is_not_self_a() {
        let s = names(&["Ada"]);
        assert_eq!(role_of("I'm a bit lost today", &s), None);
    }

    #[test]
    fn test_direct_both_and_observer() {
        let s = names(&["Ada", "Grace"]);
        assert_eq!(role_of("We're both here", &s), Some((QuerentRole::Both, Confidence::High)));
        assert_eq!(role_of("both of us", &s), Some((QuerentRole::Both, Confidence::High)));
        assert_eq!(
            role_of("I'm an observer", &s),
            Some((QuerentRole::Observer, Confidence::High))
        );
        assert_eq!(
            role_of("This is for someone else", &s),
            Some((QuerentRole::Observer, Confidence::High))
        );
        assert_eq!(
            role_of("third party here", &s),
            Some((QuerentRole::Observer, Confidence::High))
        );
    }

    #[test]
    fn test_direct_phrase_beats_name() {
        let s = names(&["Observer"]);
        assert_eq!(
            role_of("I'm an observer", &s),
            Some((QuerentRole::Observer, Confidence::High))
        );
    }

    // ---- Names ----

    #[test]
    fn test_name_templates_high_confidence() {
        let s = names(&["Ada Lovelace", "Grace Hopper"]);
        for input in [
            "I'm Ada",
            "this is Ada Lovelace",
            "Ada here",
            "it's Ada",
            "Ada speaking",
            "yes, Ada",
            "Hi, it's Ada",
            "ada",
        ] {
            let m = detect_querent_identity(input, &s).unwrap();
            assert_eq!(m.role, QuerentRole::SelfA, "{input}");
            assert_eq!(m.confidence, Confidence::High, "{input}");
            assert_eq!(m.name.as_deref(), Some("Ada Lovelace"));
        }
        assert_eq!(
            role_of("I'm Grace", &s),
            Some((QuerentRole::SelfB, Confidence::High))
        );
    }

    #[test]
    fn test_short_reply_with_name_is_medium() {
        let s = names(&["Ada", "Grace"]);
        assert_eq!(
            role_of("probably Grace, yes", &s),
            Some((QuerentRole::SelfB, Confidence::Medium))
        );
    }

    #[test]
    fn test_long_sentence_with_name_is_not_identity() {
        let s = names(&["Ada", "Grace"]);
        assert_eq!(role_of("I was wondering what Grace is like at work", &s), None);
    }

    #[test]
    fn test_name_with_punctuation() {
        let s = names(&["J.R. (Bob)"]);
        assert_eq!(
            role_of("I'm j.r. (bob)", &s),
            Some((QuerentRole::SelfA, Confidence::High))
        );
    }

    // ---- Affirmations ----

    #[test]
    fn test_single_subject_affirmations_medium() {
        let s = names(&["Ada"]);
        for input in ["me", "yes", "it's me", "Yes, it's me!", "that\u{2019}s me"] {
            assert_eq!(
                role_of(input, &s),
                Some((QuerentRole::SelfA, Confidence::Medium)),
                "{input}"
            );
        }
    }

    #[test]
    fn test_affirmation_ignored_with_two_subjects() {
        let s = names(&["Ada", "Grace"]);
        assert_eq!(role_of("it's me", &s), None);
    }

    #[test]
    fn test_two_subject_collective_high() {
        let s = names(&["Ada", "Grace"]);
        for input in ["both", "we", "together", "Both!"] {
            assert_eq!(
                role_of(input, &s),
                Some((QuerentRole::Both, Confidence::High)),
                "{input}"
            );
        }
    }

    #[test]
    fn test_collective_ignored_with_one_subject() {
        let s = names(&["Ada"]);
        assert_eq!(role_of("both", &s), None);
    }

    #[test]
    fn test_person_b_and_both_need_two_subjects() {
        let s = names(&["Ada"]);
        assert_eq!(role_of("I'm Person B", &s), None);
        assert_eq!(role_of("i am b", &s), None);
        assert_eq!(role_of("We're both here", &s), None);
        assert_eq!(role_of("both of us", &s), None);
        assert_eq!(role_of("I'm Person A", &s), Some((QuerentRole::SelfA, Confidence::High)));
    }

    #[test]
    fn test_name_prefix_of_longer_word_is_not_a_match() {
        let s = names(&["Ada"]);
        assert_eq!(role_of("I'm Adam", &s), None);
        assert_eq!(role_of("adamant", &s), None);
        assert_eq!(role_of("hello adaline", &s), None);
    }

    #[test]
    fn test_bare_name_tail_forms() {
        let s = names(&["Ada"]);
        assert_eq!(role_of("Ada here!", &s), Some((QuerentRole::SelfA, Confidence::High)));
        assert_eq!(role_of("hey ada", &s), Some((QuerentRole::SelfA, Confidence::High)));
        assert_eq!(role_of("my name is Ada", &s), Some((QuerentRole::SelfA, Confidence::High)));
        // mentioned in a short reply, but not as a self identification
        assert_eq!(role_of("ada maybe", &s), Some((QuerentRole::SelfA, Confidence::Medium)));
    }

    #[test]
    fn test_no_signal_returns_none() {
        assert_eq!(role_of("tell me about Saturn", &names(&["Ada"])), None);
        assert_eq!(role_of("   ", &names(&["Ada"])), None);
    }

    // ---- Conflicts ----

    #[test]
    fn test_conflict_empty_side_never_conflicts() {
        assert!(detect_subject_conflict(&[], &names(&["Ada"])).is_none());
        assert!(detect_subject_conflict(&names(&["Ada"]), &[]).is_none());
    }

    #[test]
    fn test_conflict_disjoint() {
        let c = detect_subject_conflict(&names(&["Ada"]), &names(&["Grace"])).unwrap();
        assert_eq!(c.kind, ConflictKind::Disjoint);
        assert!(c.message.contains("Grace"));
        assert!(c.message.contains("Ada"));
    }

    #[test]
    fn test_conflict_partial_overlap() {
        let c = detect_subject_conflict(&names(&["Ada"]), &names(&["Ada", "Grace"])).unwrap();
        assert_eq!(c.kind, ConflictKind::Partial);
        let c = detect_subject_conflict(&names(&["Ada", "Grace"]), &names(&["Ada"])).unwrap();
        assert_eq!(c.kind, ConflictKind::Partial);
    }

    #[test]
    fn test_same_subjects_no_conflict_case_insensitive() {
        assert!(detect_subject_conflict(
            &names(&["Ada", "Grace"]),
            &names(&[" grace ", "ADA"])
        )
        .is_none());
    }

    // ---- Conflict answers ----

    #[test]
    fn test_conflict_answer_keep() {
        let (cur, new) = (names(&["Ada"]), names(&["Grace"]));
        for input in ["Let's stay with Ada please", "keep the current one", "Ada", "same as before"] {
            assert_eq!(
                resolve_conflict_answer(input, &cur, &new),
                Some(ConflictChoice::Keep),
                "{input}"
            );
        }
    }

    #[test]
    fn test_conflict_answer_switch() {
        let (cur, new) = (names(&["Ada"]), names(&["Grace"]));
        for input in ["switch to the new one", "Grace", "let\u{2019}s talk about grace", "the uploaded chart"] {
            assert_eq!(
                resolve_conflict_answer(input, &cur, &new),
                Some(ConflictChoice::Switch),
                "{input}"
            );
        }
    }

    #[test]
    fn test_conflict_answer_ambiguous() {
        let (cur, new) = (names(&["Ada"]), names(&["Grace"]));
        assert_eq!(resolve_conflict_answer("hmm, not sure", &cur, &new), None);
        assert_eq!(resolve_conflict_answer("Ada or Grace?", &cur, &new), None);
        assert_eq!(resolve_conflict_answer("   ", &cur, &new), None);
    }

    #[test]
    fn test_conflict_answer_shared_name_is_no_signal() {
        let (cur, new) = (names(&["Ada"]), names(&["Ada", "Grace"]));
        assert_eq!(resolve_conflict_answer("ada", &cur, &new), None);
        assert_eq!(
            resolve_conflict_answer("add grace", &cur, &new),
            Some(ConflictChoice::Switch)
        );
    }

    // ---- Voice ----

    #[test]
    fn test_voice_unconfirmed_is_none() {
        assert!(voice_instructions(QuerentRole::Unconfirmed, &names(&["Ada"])).is_none());
    }

    #[test]
    fn test_voice_self_names_subject() {
        let s = names(&["Ada", "Grace"]);
        let a = voice_instructions(QuerentRole::SelfA, &s).unwrap();
        assert!(a.contains("first-person reflective mode for Ada"));
        let b = voice_instructions(QuerentRole::SelfB, &s).unwrap();
        assert!(b.contains("for Grace"));
        let fallback = voice_instructions(QuerentRole::SelfB, &names(&["Ada"])).unwrap();
        assert!(fallback.contains("for Person B"));
    }

    #[test]
    fn test_voice_both_and_observer() {
        let s = names(&["Ada", "Grace"]);
        let both = voice_instructions(QuerentRole::Both, &s).unwrap();
        assert!(both.contains("Ada and Grace are both present"));
        assert!(both.contains("between you"));
        let observer = voice_instructions(QuerentRole::Observer, &s).unwrap();
        assert!(observer.contains("third-person"));
        assert!(observer.contains("this person may tend to"));
    }

    // ---- Gate question ----

    #[test]
    fn test_gate_question_variants() {
        assert_eq!(
            gate_question(&[]),
            "Before we begin, who am I speaking with right now?"
        );
        assert!(gate_question(&names(&["Ada"])).contains("am I speaking with Ada"));
        let two = gate_question(&names(&["Ada", "Grace"]));
        assert!(two.contains("Are you Ada, Grace, both of you together"));
    }
}
