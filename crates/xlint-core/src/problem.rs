//! Problem model
//!
//! Every checker reports located, platform-attributed problems in this shape.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::Location;

/// Problem taxonomy; the discriminant is the wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ProblemType {
    CssParseError = 0,
    CssPropertyNotSupported = 1,
    CssValueNotSupported = 2,
    CssPropertyPartiallySupported = 3,
    CssValuePartiallySupported = 4,
    HtmlParseError = 20,
    HtmlTagNotSupported = 21,
    HtmlAttrNotSupported = 22,
    HtmlValueNotSupported = 23,
    MediaFormatNotSupported = 40,
}

impl ProblemType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_parse_error(self) -> bool {
        matches!(self, ProblemType::CssParseError | ProblemType::HtmlParseError)
    }
}

impl Serialize for ProblemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Problem severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ProblemLevel {
    Advice = 0,
    Warning = 1,
    Error = 2,
}

impl Serialize for ProblemLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Platforms a problem applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platforms {
    /// Every platform; used for parse errors
    All,
    List(Vec<String>),
}

impl Platforms {
    pub fn none() -> Self {
        Platforms::List(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Platforms::All => false,
            Platforms::List(ids) => ids.is_empty(),
        }
    }

    pub fn contains(&self, platform_id: &str) -> bool {
        match self {
            Platforms::All => true,
            Platforms::List(ids) => ids.iter().any(|id| id == platform_id),
        }
    }

    /// Append a platform id, ignoring duplicates
    pub fn push(&mut self, platform_id: &str) {
        if let Platforms::List(ids) = self
            && !ids.iter().any(|id| id == platform_id)
        {
            ids.push(platform_id.to_string());
        }
    }

    pub fn remove(&mut self, platform_id: &str) {
        if let Platforms::List(ids) = self {
            ids.retain(|id| id != platform_id);
        }
    }

    pub fn ids(&self) -> &[String] {
        match self {
            Platforms::All => &[],
            Platforms::List(ids) => ids,
        }
    }
}

impl Serialize for Platforms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Platforms::All => serializer.serialize_str("all"),
            Platforms::List(ids) => {
                let mut seq = serializer.serialize_seq(Some(ids.len()))?;
                for id in ids {
                    seq.serialize_element(id)?;
                }
                seq.end()
            }
        }
    }
}

/// The declaration a CSS problem was raised for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationInfo {
    pub property: String,
    pub value: String,
}

/// A compatibility problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: ProblemType,
    pub level: ProblemLevel,
    pub reason: String,
    pub evidence: Option<String>,
    /// 1-based line, -1 when unknown
    pub line: i64,
    /// 1-based column, -1 when unknown
    pub column: i64,
    /// Char offset, -1 when unknown
    pub position: i64,
    pub influenced_platforms: Platforms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<DeclarationInfo>,
}

impl Problem {
    /// An error-level problem with no location and no platforms yet
    pub fn error(kind: ProblemType, reason: impl Into<String>) -> Self {
        Self {
            kind,
            level: ProblemLevel::Error,
            reason: reason.into(),
            evidence: None,
            line: -1,
            column: -1,
            position: -1,
            influenced_platforms: Platforms::none(),
            context: None,
            info: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Set line, column and position from a location
    pub fn located(mut self, loc: Location) -> Self {
        self.line = loc.line as i64;
        self.column = loc.column as i64;
        self.position = loc.position as i64;
        self
    }

    /// Set line and column only; position stays -1
    pub fn at_line(mut self, line: usize, column: usize) -> Self {
        self.line = line as i64;
        self.column = column as i64;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_info(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.info = Some(DeclarationInfo {
            property: property.into(),
            value: value.into(),
        });
        self
    }

    pub fn for_platforms(mut self, platforms: Platforms) -> Self {
        self.influenced_platforms = platforms;
        self
    }
}

/// Outcome of checking one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub problems: Vec<Problem>,
}

impl CheckResult {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Number of problems at `level`
    pub fn count(&self, level: ProblemLevel) -> usize {
        self.problems.iter().filter(|p| p.level == level).count()
    }

    /// Problems of one type
    pub fn of_type(&self, kind: ProblemType) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(move |p| p.kind == kind)
    }
}
