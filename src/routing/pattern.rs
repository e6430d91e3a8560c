//! Path pattern compilation.
//!
//! # Responsibilities
//! - Parse a pattern such as `/users/[id]/files/[...path?]` into segments
//! - Compile the segments into an anchored regex
//! - Compute the specificity score used to order competing routes
//! - Extract decoded params from a path and build paths from params
//!
//! # Segment Grammar
//! ```text
//! static        users         +100
//! required      [id]          +10
//! optional      [id?]         +5
//! catch-all     [...rest]     +2   (must be last)
//! opt catch-all [...rest?]    +1   (must be last)
//! ```
//!
//! # Design Decisions
//! - Every syntax error surfaces from [`compile`], never while matching
//! - `/` matches only `/`; every other pattern accepts one trailing slash
//! - Each captured segment is percent-decoded independently

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use thiserror::Error;

/// Characters escaped when writing one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub const STATIC_SCORE: u32 = 100;
pub const REQUIRED_PARAM_SCORE: u32 = 10;
pub const OPTIONAL_PARAM_SCORE: u32 = 5;
pub const CATCH_ALL_SCORE: u32 = 2;
pub const OPTIONAL_CATCH_ALL_SCORE: u32 = 1;

/// Errors raised while compiling a pattern or building a path from one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("pattern `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("pattern `{pattern}` has a malformed segment `{segment}`")]
    MalformedSegment { pattern: String, segment: String },

    #[error("pattern `{pattern}` uses `{name}`, which is not a valid parameter name")]
    InvalidParamName { pattern: String, name: String },

    #[error("pattern `{pattern}` declares parameter `{name}` more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern `{0}` has a catch-all segment that is not last")]
    CatchAllNotLast(String),

    #[error("pattern `{pattern}` failed to compile: {message}")]
    Regex { pattern: String, message: String },

    #[error("missing required parameter `{name}` for `{pattern}`")]
    MissingParam { pattern: String, name: String },
}

/// The kind of one pattern segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Static,
    Required,
    Optional,
    CatchAll,
    OptionalCatchAll,
}

impl SegmentKind {
    /// Specificity contribution of this segment kind.
    pub fn score(self) -> u32 {
        match self {
            SegmentKind::Static => STATIC_SCORE,
            SegmentKind::Required => REQUIRED_PARAM_SCORE,
            SegmentKind::Optional => OPTIONAL_PARAM_SCORE,
            SegmentKind::CatchAll => CATCH_ALL_SCORE,
            SegmentKind::OptionalCatchAll => OPTIONAL_CATCH_ALL_SCORE,
        }
    }

    fn is_catch_all(self) -> bool {
        matches!(self, SegmentKind::CatchAll | SegmentKind::OptionalCatchAll)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param { name: String, kind: SegmentKind },
}

impl Segment {
    fn kind(&self) -> SegmentKind {
        match self {
            Segment::Static(_) => SegmentKind::Static,
            Segment::Param { kind, .. } => *kind,
        }
    }
}

/// A named parameter declared by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: SegmentKind,
}

/// A compiled path pattern. Immutable once built.
#[derive(Clone)]
pub struct CompiledPattern {
    pattern: String,
    regex: Regex,
    segments: Vec<Segment>,
    params: Vec<ParamSpec>,
    score: u32,
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .field("score", &self.score)
            .finish()
    }
}

/// Compile one pattern string.
pub fn compile(pattern: &str) -> Result<CompiledPattern, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
    }

    let body = pattern.trim_end_matches('/');
    let segments = if body.is_empty() {
        Vec::new()
    } else {
        body[1..]
            .split('/')
            .map(|raw| parse_segment(pattern, raw))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut params: Vec<ParamSpec> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        if let Segment::Param { name, kind } = segment {
            if kind.is_catch_all() && index + 1 != segments.len() {
                return Err(PatternError::CatchAllNotLast(pattern.to_string()));
            }
            if params.iter().any(|p| &p.name == name) {
                return Err(PatternError::DuplicateParam {
                    pattern: pattern.to_string(),
                    name: name.clone(),
                });
            }
            params.push(ParamSpec {
                name: name.clone(),
                kind: *kind,
            });
        }
    }

    let source = regex_source(&segments);
    let regex = Regex::new(&source).map_err(|e| PatternError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let score = segments.iter().map(|s| s.kind().score()).sum();

    Ok(CompiledPattern {
        pattern: pattern.to_string(),
        regex,
        segments,
        params,
        score,
    })
}

fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, PatternError> {
    if raw.is_empty() {
        return Err(PatternError::EmptySegment(pattern.to_string()));
    }

    let malformed = || PatternError::MalformedSegment {
        pattern: pattern.to_string(),
        segment: raw.to_string(),
    };

    let Some(inner) = raw.strip_prefix('[') else {
        if raw.contains('[') || raw.contains(']') {
            return Err(malformed());
        }
        return Ok(Segment::Static(raw.to_string()));
    };
    let inner = inner.strip_suffix(']').ok_or_else(malformed)?;

    let (inner, catch_all) = match inner.strip_prefix("...") {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    let (name, optional) = match inner.strip_suffix('?') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };

    if !is_identifier(name) {
        return Err(PatternError::InvalidParamName {
            pattern: pattern.to_string(),
            name: name.to_string(),
        });
    }

    let kind = match (catch_all, optional) {
        (false, false) => SegmentKind::Required,
        (false, true) => SegmentKind::Optional,
        (true, false) => SegmentKind::CatchAll,
        (true, true) => SegmentKind::OptionalCatchAll,
    };
    Ok(Segment::Param {
        name: name.to_string(),
        kind,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn regex_source(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "^/$".to_string();
    }

    let mut source = String::from("^");
    for segment in segments {
        match segment {
            Segment::Static(literal) => {
                source.push('/');
                source.push_str(&regex::escape(literal));
            }
            Segment::Param { kind, .. } => source.push_str(match kind {
                SegmentKind::Required => "/([^/]+)",
                SegmentKind::Optional => "(?:/([^/]+))?",
                SegmentKind::CatchAll => "/(.+?)",
                SegmentKind::OptionalCatchAll => "(?:/(.*?))?",
                SegmentKind::Static => unreachable!("static segments are handled above"),
            }),
        }
    }
    source.push_str("/?$");
    source
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

impl CompiledPattern {
    /// The source pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The anchored regex this pattern compiled to.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Declared parameters in pattern order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Parameter names in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Specificity score; higher wins.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Returns true if `path` matches this pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return decoded params, or `None` when it does not match.
    ///
    /// Absent optional params are omitted from the map.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut params = HashMap::with_capacity(self.params.len());

        for (index, spec) in self.params.iter().enumerate() {
            let Some(raw) = caps.get(index + 1).map(|m| m.as_str()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let value = if spec.kind.is_catch_all() {
                raw.split('/').map(decode).collect::<Vec<_>>().join("/")
            } else {
                decode(raw)
            };
            params.insert(spec.name.clone(), value);
        }
        Some(params)
    }

    /// Build a concrete path from `params`.
    pub fn build(&self, params: &HashMap<String, String>) -> Result<String, PatternError> {
        let mut path = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Static(literal) => {
                    path.push('/');
                    path.push_str(literal);
                }
                Segment::Param { name, kind } => {
                    // Empty catch-all pieces ("a/", "a//b") cannot survive a
                    // capture, so they are dropped here.
                    let value = params
                        .get(name)
                        .map(|v| {
                            if kind.is_catch_all() {
                                v.split('/').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("/")
                            } else {
                                v.clone()
                            }
                        })
                        .filter(|v| !v.is_empty());
                    match (value.as_deref(), kind) {
                        (Some(value), k) if k.is_catch_all() => {
                            for piece in value.split('/') {
                                path.push('/');
                                path.push_str(&encode(piece));
                            }
                        }
                        (Some(value), _) => {
                            path.push('/');
                            path.push_str(&encode(value));
                        }
                        (None, SegmentKind::Optional | SegmentKind::OptionalCatchAll) => {}
                        (None, _) => {
                            return Err(PatternError::MissingParam {
                                pattern: self.pattern.clone(),
                                name: name.clone(),
                            });
                        }
                    }
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}
