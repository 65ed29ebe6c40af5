//! RFC 9457 problem details, shared by every HTTP surface.

use serde::{Deserialize, Serialize};

/// Media type for problem responses.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Prefix for the `type` URI of every problem document.
const TYPE_PREFIX: &str = "urn:cynodeai:error:";

/// Error kinds that appear in the problem `type` URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    PayloadTooLarge,
    Internal,
}

impl ProblemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::Validation => "validation",
            ProblemKind::Authentication => "authentication",
            ProblemKind::Authorization => "authorization",
            ProblemKind::NotFound => "not_found",
            ProblemKind::Conflict => "conflict",
            ProblemKind::RateLimit => "rate_limit",
            ProblemKind::PayloadTooLarge => "payload_too_large",
            ProblemKind::Internal => "internal",
        }
    }

    /// HTTP status code paired with this kind.
    pub fn status(self) -> u16 {
        match self {
            ProblemKind::Validation => 400,
            ProblemKind::Authentication => 401,
            ProblemKind::Authorization => 403,
            ProblemKind::NotFound => 404,
            ProblemKind::Conflict => 409,
            ProblemKind::PayloadTooLarge => 413,
            ProblemKind::RateLimit => 429,
            ProblemKind::Internal => 500,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ProblemKind::Validation => "Validation Error",
            ProblemKind::Authentication => "Authentication Required",
            ProblemKind::Authorization => "Forbidden",
            ProblemKind::NotFound => "Not Found",
            ProblemKind::Conflict => "Conflict",
            ProblemKind::RateLimit => "Too Many Requests",
            ProblemKind::PayloadTooLarge => "Payload Too Large",
            ProblemKind::Internal => "Internal Server Error",
        }
    }
}

/// A `application/problem+json` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Problem {
    pub fn new(kind: ProblemKind, detail: impl Into<Option<String>>) -> Self {
        Self {
            kind: format!("{TYPE_PREFIX}{}", kind.as_str()),
            title: kind.title().to_string(),
            status: kind.status(),
            detail: detail.into(),
            instance: None,
        }
    }
}
