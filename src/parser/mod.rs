//! Response parser: turns noisy model output into reasoning text and decisions.
//!
//! Parsing never fails outright. When no decision JSON can be recovered the
//! parser yields a single `wait` decision for every symbol, so a model that
//! forgets its JSON block makes the bot do nothing rather than crash.

pub mod extract;
pub mod json_guard;
pub mod normalize;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{fragment, ParseError};
use crate::models::Decision;

/// Tunables for the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Characters of model text kept in a fallback decision's reasoning
    pub fallback_summary_chars: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            fallback_summary_chars: 240,
        }
    }
}

/// Result of parsing one model response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResponse {
    pub reasoning: String,

    pub decisions: Vec<Decision>,

    /// Why the decision JSON was discarded, if it was
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub parse_error: Option<ParseError>,

    /// True when `decisions` is the synthesized wait decision
    pub used_fallback: bool,
}

fn serialize_error<S>(err: &Option<ParseError>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match err {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Outcome of locating and decoding the decision JSON.
struct Extraction {
    /// Normalized text the JSON was searched in
    json_part: String,

    /// `None` when no candidate array exists at all
    decisions: Result<Option<Vec<Decision>>, ParseError>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    config: ParserConfig,
}

impl ResponseParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a response, degrading to the wait fallback on any JSON problem.
    pub fn parse(&self, raw: &str) -> ParsedResponse {
        let reasoning = self.extract_reasoning(raw);
        let extraction = self.extract(raw);

        match extraction.decisions {
            Ok(Some(decisions)) => ParsedResponse {
                reasoning,
                decisions,
                parse_error: None,
                used_fallback: false,
            },
            Ok(None) => ParsedResponse {
                reasoning,
                decisions: vec![self.fallback_decision(&extraction.json_part)],
                parse_error: None,
                used_fallback: true,
            },
            Err(err) => {
                warn!(error = %err, "Discarding malformed decision JSON, falling back to wait");
                ParsedResponse {
                    reasoning,
                    decisions: vec![self.fallback_decision(&extraction.json_part)],
                    parse_error: Some(err),
                    used_fallback: true,
                }
            }
        }
    }

    /// Reasoning trace, by priority: `<reasoning>` tag, text before
    /// `<decision>`, text before the first `[`, then the whole response.
    pub fn extract_reasoning(&self, raw: &str) -> String {
        let text = normalize::strip_invisible(raw);

        if let Some(content) = extract::tag_content(&text, "reasoning") {
            debug!("Reasoning taken from <reasoning> tag");
            return content.trim().to_string();
        }

        if let Some(idx) = extract::tag_start(&text, "decision").filter(|&i| i > 0) {
            debug!("Reasoning taken from text before <decision>");
            return text[..idx].trim().to_string();
        }

        if let Some(idx) = text.find('[').filter(|&i| i > 0) {
            debug!("Reasoning taken from text before first '[' (legacy format)");
            return text[..idx].trim().to_string();
        }

        text.trim().to_string()
    }

    /// Strict decision extraction.
    ///
    /// A response with no decision array at all still yields the wait
    /// fallback; a candidate that fails shape checks or deserialization is
    /// an error.
    pub fn extract_decisions(&self, raw: &str) -> Result<Vec<Decision>, ParseError> {
        let extraction = self.extract(raw);
        match extraction.decisions? {
            Some(decisions) => Ok(decisions),
            None => Ok(vec![self.fallback_decision(&extraction.json_part)]),
        }
    }

    fn extract(&self, raw: &str) -> Extraction {
        let text = normalize::normalize(raw.trim());

        let json_part = match extract::tag_content(&text, "decision") {
            Some(content) => {
                debug!("Decision JSON searched inside <decision> tag");
                content.trim().to_string()
            }
            None => {
                debug!("No <decision> tag, searching whole response for JSON");
                text.clone()
            }
        };

        let candidate = extract::fenced_json_array(&json_part)
            .map(|c| {
                debug!("Decision JSON taken from ```json fence");
                c
            })
            .or_else(|| extract::first_object_array(&json_part));

        let decisions = match candidate {
            Some(candidate) => decode(candidate).map(Some),
            None => {
                warn!("Model emitted no decision JSON, entering safe wait");
                Ok(None)
            }
        };

        Extraction {
            json_part,
            decisions,
        }
    }

    fn fallback_decision(&self, text: &str) -> Decision {
        let limit = self.config.fallback_summary_chars;
        let summary = match text.char_indices().nth(limit) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        };
        Decision::wait_all(summary)
    }
}

/// Shape-check and deserialize one candidate array.
fn decode(candidate: &str) -> Result<Vec<Decision>, ParseError> {
    let json = json_guard::compact_array_open(candidate);
    json_guard::validate_json_format(&json)?;
    serde_json::from_str(&json).map_err(|e| ParseError::Deserialize {
        message: e.to_string(),
        fragment: fragment(&json),
    })
}
