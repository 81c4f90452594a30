// crates/reelgraph-core/src/runtime/condition.rs
// ============================================================================
// Module: Reelgraph Condition Evaluator
// Description: Tri-state evaluation of condition clauses against resolved
//              artifact payloads.
// Purpose: Decide whether a connection's condition is satisfied at the
//          current job's dimension indices, built on `reelgraph-logic`'s
//          requirement-tree algebra rather than re-deriving And/Or/Unknown
//          combination next to the comparator logic.
// Dependencies: bigdecimal, reelgraph-logic, regex, serde_json, time
// ============================================================================

//! ## Overview
//! A condition clause compares a resolved artifact's JSON payload against a
//! literal, at a path that may reference the job's own dimension indices
//! (`[segment]`). Each clause is a leaf in a [`reelgraph_logic::Requirement`]
//! tree; groups combine clauses with `all` (AND) or `any` (OR) — an implicit
//! array is AND — and the tree is evaluated under
//! [`reelgraph_logic::KleeneLogic`] to a [`TriState`]. For the purpose of
//! deciding whether to materialize a job input, `Unknown` is treated as not
//! satisfied — the engine fails closed rather than guessing.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use reelgraph_logic::KleeneLogic;
use reelgraph_logic::Requirement;
use reelgraph_logic::RequirementTrace;
pub use reelgraph_logic::TriState;
use reelgraph_logic::TriStateConditionEval;
use regex::Regex;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::blueprint::ConditionClause;
use crate::core::blueprint::ConditionExpr;
use crate::core::error::ConditionError;

/// The outcome of evaluating a full condition expression, with a reason when
/// it is not satisfied.
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// The tri-state result.
    pub state: TriState,
    /// Human-readable reason, present when `state != True`.
    pub reason: Option<String>,
}

/// Evaluates a condition expression against resolved artifact payloads.
///
/// `resolved_artifacts` is keyed by the bare two-segment artifact kind
/// (`"Producer.Artifact"`, no prefix, no brackets) — the same key produced by
/// [`crate::core::ids::extract_kind`] for an artifact id.
///
/// # Errors
///
/// Returns [`ConditionError`] when a `matches` clause carries an invalid
/// regular expression.
pub fn evaluate(
    expr: &ConditionExpr,
    dim_indices: &BTreeMap<String, u32>,
    resolved_artifacts: &BTreeMap<String, Value>,
) -> Result<EvalOutcome, ConditionError> {
    validate_regexes(expr)?;

    let requirement = to_requirement(expr);
    let reader = ClauseContext { dim_indices, resolved_artifacts };
    let mut trace = ReasonTrace { dim_indices, resolved_artifacts, reason: None };
    let state = requirement.eval_tristate_with_trace(&reader, 0, &KleeneLogic, &mut trace);

    Ok(EvalOutcome { state, reason: if state.is_true() { None } else { trace.reason } })
}

/// Walks `expr` checking every `matches` clause's pattern compiles, since
/// [`TriStateConditionEval::eval_row_tristate`] cannot itself return a
/// `Result` once folded into a [`Requirement`] tree.
fn validate_regexes(expr: &ConditionExpr) -> Result<(), ConditionError> {
    match expr {
        ConditionExpr::Clause(clause) => {
            if let Some(pattern) = &clause.matches {
                Regex::new(pattern).map_err(|err| ConditionError {
                    when: clause.when.clone(),
                    reason: format!("invalid regex {pattern:?}: {err}"),
                })?;
            }
            Ok(())
        }
        ConditionExpr::ImplicitAll(clauses) | ConditionExpr::All { all: clauses } => {
            clauses.iter().try_for_each(validate_regexes)
        }
        ConditionExpr::Any { any } => any.iter().try_for_each(validate_regexes),
    }
}

/// Converts a declarative [`ConditionExpr`] tree into the
/// [`reelgraph_logic::Requirement`] tree it evaluates as.
fn to_requirement(expr: &ConditionExpr) -> Requirement<ClauseLeaf> {
    match expr {
        ConditionExpr::Clause(clause) => {
            Requirement::condition(ClauseLeaf { clause: clause.clone() })
        }
        ConditionExpr::ImplicitAll(clauses) | ConditionExpr::All { all: clauses } => {
            Requirement::and(clauses.iter().map(to_requirement).collect())
        }
        ConditionExpr::Any { any } => Requirement::or(any.iter().map(to_requirement).collect()),
    }
}

/// The reading context a [`ClauseLeaf`] evaluates against: the job's
/// dimension indices (for `[name]` placeholder substitution) and the
/// resolved artifact payloads it reads from.
struct ClauseContext<'a> {
    /// The job's dimension indices.
    dim_indices: &'a BTreeMap<String, u32>,
    /// Resolved artifact payloads, keyed by bare two-segment kind.
    resolved_artifacts: &'a BTreeMap<String, Value>,
}

/// One comparator clause, the leaf condition type of the requirement tree
/// built from a [`ConditionExpr`].
#[derive(Debug, Clone)]
struct ClauseLeaf {
    /// The clause being evaluated.
    clause: ConditionClause,
}

impl TriStateConditionEval for ClauseLeaf {
    type Reader<'a> = ClauseContext<'a>;

    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, _row: usize) -> TriState {
        evaluate_clause_value(&self.clause, reader.dim_indices, reader.resolved_artifacts).0
    }
}

/// Recomputes the reason for the first non-`True` leaf a [`Requirement`]
/// tree reaches, since [`reelgraph_logic::RequirementTrace`] only carries a
/// leaf and its [`TriState`], not a free-form diagnostic.
struct ReasonTrace<'a> {
    /// The job's dimension indices, for recomputing a leaf's reason.
    dim_indices: &'a BTreeMap<String, u32>,
    /// Resolved artifact payloads, for recomputing a leaf's reason.
    resolved_artifacts: &'a BTreeMap<String, Value>,
    /// The first non-`True` leaf's reason encountered so far, if any.
    reason: Option<String>,
}

impl RequirementTrace<ClauseLeaf> for ReasonTrace<'_> {
    fn on_condition_evaluated(&mut self, condition: &ClauseLeaf, result: TriState) {
        if self.reason.is_some() || result.is_true() {
            return;
        }
        self.reason =
            evaluate_clause_value(&condition.clause, self.dim_indices, self.resolved_artifacts).1;
    }
}

/// Evaluates one clause to a `(TriState, reason)` pair. Kept independent of
/// [`reelgraph_logic::Requirement`]'s trace plumbing so it can be called
/// both for the leaf's own verdict and, lazily, for its reason.
fn evaluate_clause_value(
    clause: &ConditionClause,
    dim_indices: &BTreeMap<String, u32>,
    resolved_artifacts: &BTreeMap<String, Value>,
) -> (TriState, Option<String>) {
    let resolved_path = substitute_dim_placeholders(&clause.when, dim_indices);
    let (artifact_key, sub_path) = split_artifact_path(&resolved_path);

    let Some(root) = resolved_artifacts.get(&artifact_key) else {
        return (TriState::Unknown, Some(format!("artifact {artifact_key} not resolved")));
    };

    let target = sub_path.as_deref().and_then(|path| walk_json_path(root, path));

    if let Some(expected) = clause.exists {
        let actual = target.is_some_and(|value| !value.is_null());
        let state = TriState::from(actual == expected);
        return (
            state,
            (!state.is_true()).then(|| format!("exists({expected}) at {resolved_path}")),
        );
    }

    let Some(target) = target else {
        return (TriState::Unknown, Some(format!("path not found at {resolved_path}")));
    };

    if let Some(expected) = &clause.is {
        return bool_outcome(values_equal(target, expected), &resolved_path, "is");
    }
    if let Some(expected) = &clause.is_not {
        return bool_outcome(!values_equal(target, expected), &resolved_path, "isNot");
    }
    if let Some(expected) = &clause.contains {
        return bool_outcome(value_contains(target, expected), &resolved_path, "contains");
    }
    if let Some(expected) = &clause.greater_than {
        return ordering_outcome(target, expected, &resolved_path, "greaterThan", |o| {
            o == std::cmp::Ordering::Greater
        });
    }
    if let Some(expected) = &clause.less_than {
        return ordering_outcome(target, expected, &resolved_path, "lessThan", |o| {
            o == std::cmp::Ordering::Less
        });
    }
    if let Some(expected) = &clause.greater_or_equal {
        return ordering_outcome(target, expected, &resolved_path, "greaterOrEqual", |o| {
            o != std::cmp::Ordering::Less
        });
    }
    if let Some(expected) = &clause.less_or_equal {
        return ordering_outcome(target, expected, &resolved_path, "lessOrEqual", |o| {
            o != std::cmp::Ordering::Greater
        });
    }
    if let Some(pattern) = &clause.matches {
        return match Regex::new(pattern) {
            Ok(regex) => {
                let text = match target {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                bool_outcome(regex.is_match(&text), &resolved_path, "matches")
            }
            // `validate_regexes` rejects an invalid pattern before a
            // requirement tree is built; reached only if that check is
            // ever bypassed, so this fails closed rather than panicking.
            Err(_) => (TriState::Unknown, Some(format!("invalid regex at {resolved_path}"))),
        };
    }

    (TriState::Unknown, Some(format!("clause at {resolved_path} carries no comparator")))
}

fn bool_outcome(satisfied: bool, path: &str, operator: &str) -> (TriState, Option<String>) {
    let state = TriState::from(satisfied);
    (state, (!satisfied).then(|| format!("{operator} failed at {path}")))
}

fn ordering_outcome(
    actual: &Value,
    expected: &Value,
    path: &str,
    operator: &str,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> (TriState, Option<String>) {
    match compare_values(actual, expected) {
        Some(ordering) => bool_outcome(accept(ordering), path, operator),
        None => (TriState::Unknown, Some(format!("{operator} not comparable at {path}"))),
    }
}

/// Replaces `[dimName]` placeholders with the current dimension indices.
fn substitute_dim_placeholders(when: &str, dim_indices: &BTreeMap<String, u32>) -> String {
    let mut out = String::with_capacity(when.len());
    let mut chars = when.char_indices().peekable();
    let bytes = when.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close) = when[i..].find(']') {
                let name = &when[i + 1..i + close];
                if let Some(value) = dim_indices.get(name) {
                    out.push_str(&value.to_string());
                    i += close + 1;
                    continue;
                }
            }
        }
        let ch = when[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = chars.peek();
    out
}

/// Splits a resolved path into its first two dotted segments (the artifact
/// key) and the remaining JSON sub-path, if any.
fn split_artifact_path(path: &str) -> (String, Option<String>) {
    let mut seen_dots = 0;
    for (idx, ch) in path.char_indices() {
        if ch == '.' {
            seen_dots += 1;
            if seen_dots == 2 {
                return (path[..idx].to_string(), Some(path[idx..].to_string()));
            }
        }
    }
    (path.to_string(), None)
}

/// Walks a dot/bracket JSON sub-path such as `.Segments[0].Script`.
fn walk_json_path<'a>(root: &'a Value, sub_path: &str) -> Option<&'a Value> {
    let mut current = root;
    for raw_segment in sub_path.split('.') {
        if raw_segment.is_empty() {
            continue;
        }
        let (name, indices) = split_bracket_indices(raw_segment);
        if !name.is_empty() {
            current = current.as_object()?.get(name)?;
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

fn split_bracket_indices(segment: &str) -> (&str, Vec<usize>) {
    let Some(first_bracket) = segment.find('[') else {
        return (segment, Vec::new());
    };
    let (name, mut rest) = segment.split_at(first_bracket);
    let mut indices = Vec::new();
    while let Some(close) = rest.find(']') {
        if let Ok(index) = rest[1..close].parse::<usize>() {
            indices.push(index);
        }
        rest = &rest[close + 1..];
    }
    (name, indices)
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (decimal_from_value(actual), decimal_from_value(expected)) {
        return a == b;
    }
    actual == expected
}

fn value_contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::String(s) => {
            if let Value::String(needle) = expected { s.contains(needle.as_str()) } else { false }
        }
        Value::Object(map) => {
            if let Value::String(key) = expected { map.contains_key(key) } else { false }
        }
        _ => false,
    }
}

fn compare_values(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (decimal_from_value(actual), decimal_from_value(expected)) {
        return Some(a.cmp(&b));
    }
    if let (Value::String(a), Value::String(b)) = (actual, expected) {
        if let (Ok(a), Ok(b)) =
            (OffsetDateTime::parse(a, &Rfc3339), OffsetDateTime::parse(b, &Rfc3339))
        {
            return Some(a.cmp(&b));
        }
        return Some(a.cmp(b));
    }
    None
}

fn decimal_from_value(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
