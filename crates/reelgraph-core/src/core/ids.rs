// crates/reelgraph-core/src/core/ids.rs
// ============================================================================
// Module: Reelgraph Canonical Identifiers
// Description: Canonical opaque identifiers for inputs, artifacts, and jobs.
// Purpose: Parse/format the `Input:`/`Artifact:`/`Producer:` wire forms used
//          throughout blueprints, the event log, and manifests.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! Canonical identifiers have three disjoint kinds: `Input:<dotted-name>`,
//! `Artifact:<dotted-name>[dim=i][dim2=j]...<jsonPath>`, and
//! `Producer:<dotted-name>[dim=i]...`. The dotted name is a `.`-separated
//! namespace path plus a leaf name; bracket groups are either all-ordinal
//! (`[0]`) or all-named (`[segment=2]`) within one identifier, never mixed.
//! `jsonPath` is everything following the last contiguous bracket group (or
//! following the dotted name when no bracket group is present).

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing a canonical identifier.
///
/// # Invariants
/// - `code` is always `"INVALID_CANONICAL_ID"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid canonical id at byte {position}: {message} (in {input:?})")]
pub struct InvalidCanonicalId {
    /// Human-readable description of the failure.
    pub message: String,
    /// Byte offset into `input` where parsing failed.
    pub position: usize,
    /// The original input string.
    pub input: String,
}

impl InvalidCanonicalId {
    /// Stable error code for this failure category.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "INVALID_CANONICAL_ID"
    }

    fn at(input: &str, position: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position,
            input: input.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Name Path
// ============================================================================

/// A `.`-separated namespace path plus leaf name.
///
/// # Invariants
/// - `segments` is never empty.
/// - Every segment matches `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamePath {
    segments: Vec<String>,
}

impl NamePath {
    /// Builds a name path from pre-validated segments.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCanonicalId`] if `segments` is empty or any segment
    /// is not a valid identifier.
    pub fn new(segments: Vec<String>) -> Result<Self, InvalidCanonicalId> {
        if segments.is_empty() {
            return Err(InvalidCanonicalId::at("", 0, "name path must not be empty"));
        }
        for segment in &segments {
            if !is_valid_segment(segment) {
                return Err(InvalidCanonicalId::at(
                    segment,
                    0,
                    format!("invalid name segment {segment:?}"),
                ));
            }
        }
        Ok(Self { segments })
    }

    /// Returns the namespace path (all segments but the last).
    #[must_use]
    pub fn namespace(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Returns the leaf (last) segment.
    #[must_use]
    pub fn base_name(&self) -> &str {
        // `new` enforces non-empty `segments`.
        &self.segments[self.segments.len() - 1]
    }

    /// Returns all segments, namespace path plus leaf.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// SECTION: Dimension Indices
// ============================================================================

/// Dimension selector indices attached to an artifact or job identifier.
///
/// # Invariants
/// - A single identifier's bracket groups are either all ordinal or all
///   named; the two variants are never mixed within one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimIndices {
    /// Ordinal bracket groups, e.g. `[0][1]`, in declaration order.
    Ordinal(Vec<u32>),
    /// Named bracket groups, e.g. `[segment=2][image=3]`, merged by key.
    Named(BTreeMap<String, u32>),
}

impl DimIndices {
    /// Returns true when no dimension selectors are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ordinal(values) => values.is_empty(),
            Self::Named(map) => map.is_empty(),
        }
    }

    /// An identifier with no dimension selectors.
    #[must_use]
    pub const fn none() -> Self {
        Self::Ordinal(Vec::new())
    }
}

impl fmt::Display for DimIndices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(values) => {
                for value in values {
                    write!(f, "[{value}]")?;
                }
                Ok(())
            }
            Self::Named(map) => {
                for (key, value) in map {
                    write!(f, "[{key}={value}]")?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Canonical Identifier
// ============================================================================

/// A parsed canonical identifier.
///
/// # Invariants
/// - `Input` carries no dimension selectors and no JSON sub-path.
/// - `Artifact` may carry dimension selectors and an optional JSON sub-path.
/// - `Job` may carry dimension selectors but never a JSON sub-path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalId {
    /// `Input:<dotted-name>`
    Input {
        /// Dotted name path.
        name: NamePath,
    },
    /// `Artifact:<dotted-name>[dims]...<jsonPath>`
    Artifact {
        /// Dotted name path.
        name: NamePath,
        /// Dimension selectors.
        dims: DimIndices,
        /// Optional JSON sub-path, including its leading separator.
        json_path: Option<String>,
    },
    /// `Producer:<dotted-name>[dims]...`
    Job {
        /// Dotted name path.
        name: NamePath,
        /// Dimension selectors.
        dims: DimIndices,
    },
}

impl CanonicalId {
    /// Parses a canonical identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCanonicalId`] when `input` does not match the
    /// `Input:`/`Artifact:`/`Producer:` grammar.
    pub fn parse(input: &str) -> Result<Self, InvalidCanonicalId> {
        if let Some(rest) = input.strip_prefix("Input:") {
            let name = parse_name_path(input, rest, "Input:".len())?;
            if name.1.is_some() {
                return Err(InvalidCanonicalId::at(
                    input,
                    "Input:".len(),
                    "Input identifiers cannot carry dimension selectors or a JSON sub-path",
                ));
            }
            return Ok(Self::Input { name: name.0 });
        }
        if let Some(rest) = input.strip_prefix("Artifact:") {
            let (name, tail) = parse_name_path(input, rest, "Artifact:".len())?;
            let (dims, json_path) = match tail {
                Some((dims, json_path)) => (dims, json_path),
                None => (DimIndices::none(), None),
            };
            return Ok(Self::Artifact { name, dims, json_path });
        }
        if let Some(rest) = input.strip_prefix("Producer:") {
            let (name, tail) = parse_name_path(input, rest, "Producer:".len())?;
            let dims = match tail {
                Some((dims, Some(json_path))) => {
                    return Err(InvalidCanonicalId::at(
                        input,
                        input.len() - json_path.len(),
                        "Producer identifiers cannot carry a JSON sub-path",
                    ));
                }
                Some((dims, None)) => dims,
                None => DimIndices::none(),
            };
            return Ok(Self::Job { name, dims });
        }
        Err(InvalidCanonicalId::at(
            input,
            0,
            "missing Input:/Artifact:/Producer: prefix",
        ))
    }

    /// Formats the identifier back to its canonical wire form.
    #[must_use]
    pub fn format(&self) -> String {
        match self {
            Self::Input { name } => format!("Input:{name}"),
            Self::Artifact { name, dims, json_path } => {
                let mut out = format!("Artifact:{name}{dims}");
                if let Some(json_path) = json_path {
                    out.push_str(json_path);
                }
                out
            }
            Self::Job { name, dims } => format!("Producer:{name}{dims}"),
        }
    }

    /// Drops the prefix and bracket groups, returning the bare dotted name.
    #[must_use]
    pub fn extract_kind(&self) -> String {
        match self {
            Self::Input { name } | Self::Artifact { name, .. } | Self::Job { name, .. } => {
                name.to_string()
            }
        }
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Drops the prefix and bracket groups from a raw identifier string.
///
/// # Errors
///
/// Returns [`InvalidCanonicalId`] when `id` fails to parse.
pub fn extract_kind(id: &str) -> Result<String, InvalidCanonicalId> {
    Ok(CanonicalId::parse(id)?.extract_kind())
}

/// Formats a canonical artifact identifier from its parts.
#[must_use]
pub fn format_canonical_artifact_id(
    namespace_path: &[String],
    name: &str,
    indices: Option<&DimIndices>,
    json_path: Option<&str>,
) -> String {
    let mut segments: Vec<String> = namespace_path.to_vec();
    segments.push(name.to_string());
    let joined = segments.join(".");
    let mut out = format!("Artifact:{joined}");
    if let Some(indices) = indices {
        out.push_str(&indices.to_string());
    }
    if let Some(json_path) = json_path {
        out.push_str(json_path);
    }
    out
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Parses a dotted name path, then any contiguous bracket groups, returning
/// the remainder (dims plus an optional JSON sub-path) when present.
#[allow(clippy::type_complexity, reason = "parser helper, kept local to this module")]
fn parse_name_path(
    full_input: &str,
    rest: &str,
    prefix_len: usize,
) -> Result<(NamePath, Option<(DimIndices, Option<String>)>), InvalidCanonicalId> {
    let bytes = rest.as_bytes();
    let mut pos = 0usize;
    let mut segments = Vec::new();

    loop {
        let seg_start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        if pos == seg_start {
            return Err(InvalidCanonicalId::at(
                full_input,
                prefix_len + seg_start,
                "expected an identifier segment",
            ));
        }
        segments.push(rest[seg_start..pos].to_string());
        if pos < bytes.len() && bytes[pos] == b'.' {
            pos += 1;
            continue;
        }
        break;
    }

    let name = NamePath::new(segments)
        .map_err(|_| InvalidCanonicalId::at(full_input, prefix_len, "invalid name segment"))?;

    if pos >= bytes.len() {
        return Ok((name, None));
    }

    if bytes[pos] != b'[' {
        let json_path = rest[pos..].to_string();
        return Ok((name, Some((DimIndices::none(), Some(json_path)))));
    }

    let mut ordinals: Vec<u32> = Vec::new();
    let mut named: BTreeMap<String, u32> = BTreeMap::new();
    let mut saw_ordinal = false;
    let mut saw_named = false;

    while pos < bytes.len() && bytes[pos] == b'[' {
        let close = rest[pos..].find(']').map(|offset| pos + offset).ok_or_else(|| {
            InvalidCanonicalId::at(full_input, prefix_len + pos, "unterminated bracket group")
        })?;
        let body = &rest[pos + 1..close];
        if body.is_empty() {
            return Err(InvalidCanonicalId::at(
                full_input,
                prefix_len + pos,
                "empty bracket group",
            ));
        }
        if body.contains('=') {
            saw_named = true;
            for pair in body.split('&') {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    InvalidCanonicalId::at(
                        full_input,
                        prefix_len + pos,
                        format!("malformed dimension pair {pair:?}"),
                    )
                })?;
                if !is_valid_segment(key) {
                    return Err(InvalidCanonicalId::at(
                        full_input,
                        prefix_len + pos,
                        format!("invalid dimension name {key:?}"),
                    ));
                }
                let value: u32 = value.parse().map_err(|_| {
                    InvalidCanonicalId::at(
                        full_input,
                        prefix_len + pos,
                        format!("invalid dimension index {value:?}"),
                    )
                })?;
                named.insert(key.to_string(), value);
            }
        } else {
            saw_ordinal = true;
            let value: u32 = body.parse().map_err(|_| {
                InvalidCanonicalId::at(
                    full_input,
                    prefix_len + pos,
                    format!("invalid ordinal index {body:?}"),
                )
            })?;
            ordinals.push(value);
        }
        pos = close + 1;
    }

    if saw_ordinal && saw_named {
        return Err(InvalidCanonicalId::at(
            full_input,
            prefix_len,
            "dimension selectors must be all-ordinal or all-named",
        ));
    }

    let dims = if saw_named { DimIndices::Named(named) } else { DimIndices::Ordinal(ordinals) };
    let json_path = if pos < bytes.len() { Some(rest[pos..].to_string()) } else { None };
    Ok((name, Some((dims, json_path))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_input_id() {
        let id = CanonicalId::parse("Input:ImagePromptGenerator.NumOfImagesPerNarrative").unwrap();
        assert_eq!(id.format(), "Input:ImagePromptGenerator.NumOfImagesPerNarrative");
    }

    #[test]
    fn round_trips_ordinal_artifact_id() {
        let id = CanonicalId::parse("Artifact:P.X[0][1]").unwrap();
        assert_eq!(id.format(), "Artifact:P.X[0][1]");
        match &id {
            CanonicalId::Artifact { dims, .. } => {
                assert_eq!(*dims, DimIndices::Ordinal(vec![0, 1]));
            }
            _ => panic!("expected artifact id"),
        }
    }

    #[test]
    fn round_trips_named_artifact_id() {
        let id = CanonicalId::parse("Artifact:P.X[dim=0][dim2=1]").unwrap();
        match &id {
            CanonicalId::Artifact { dims, .. } => {
                let mut expected = BTreeMap::new();
                expected.insert("dim".to_string(), 0);
                expected.insert("dim2".to_string(), 1);
                assert_eq!(*dims, DimIndices::Named(expected));
            }
            _ => panic!("expected artifact id"),
        }
    }

    #[test]
    fn parses_json_path_with_brackets_as_tail() {
        let id =
            CanonicalId::parse("Artifact:DocProducer.VideoScript.Segments[0].Script").unwrap();
        match &id {
            CanonicalId::Artifact { name, dims, json_path } => {
                assert_eq!(name.to_string(), "DocProducer.VideoScript.Segments");
                assert_eq!(*dims, DimIndices::Ordinal(vec![0]));
                assert_eq!(json_path.as_deref(), Some(".Script"));
            }
            _ => panic!("expected artifact id"),
        }
    }

    #[test]
    fn rejects_mixed_ordinal_and_named() {
        let err = CanonicalId::parse("Artifact:P.X[0][dim=1]").unwrap_err();
        assert_eq!(err.code(), "INVALID_CANONICAL_ID");
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = CanonicalId::parse("P.X").unwrap_err();
        assert_eq!(err.code(), "INVALID_CANONICAL_ID");
    }

    #[test]
    fn extracts_bare_kind() {
        let kind = extract_kind("Artifact:P.X[0][1]").unwrap();
        assert_eq!(kind, "P.X");
    }

    #[test]
    fn rejects_input_with_dims() {
        let err = CanonicalId::parse("Input:P.X[0]").unwrap_err();
        assert_eq!(err.code(), "INVALID_CANONICAL_ID");
    }
}
