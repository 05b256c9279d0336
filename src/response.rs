//! Extracts the verdict and cited sources from a `generateContent` response.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub const NO_SOURCES_MESSAGE: &str =
    "No specific web sources were directly cited to ground this response.";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    /// Kept untyped so one odd attribution cannot sink the verdict.
    grounding_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl Source {
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub verdict_text: String,
    pub sources: Vec<Source>,
}

impl AnalysisOutcome {
    /// Rendered source lines, or the single "no sources" line.
    pub fn source_lines(&self) -> Vec<String> {
        if self.sources.is_empty() {
            vec![NO_SOURCES_MESSAGE.to_string()]
        } else {
            self.sources.iter().map(Source::label).collect()
        }
    }
}

pub fn interpret(raw: &str) -> Result<AnalysisOutcome> {
    let response: GenerateResponse = serde_json::from_str(raw)
        .map_err(|e| Error::MalformedResponse(format!("Error processing response: {}", e)))?;

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        Error::MalformedResponse("the response contained no candidates".to_string())
    })?;

    let verdict_text = candidate
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            Error::MalformedResponse(
                "this often happens if the claim is too vague or the file upload was unsuccessful"
                    .to_string(),
            )
        })?;

    let attributions = candidate
        .grounding_metadata
        .as_ref()
        .and_then(|m| m.get("groundingAttributions"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(AnalysisOutcome {
        verdict_text,
        sources: collect_sources(attributions),
    })
}

/// Keep attributions carrying both uri and title, first occurrence of each uri.
fn collect_sources(attributions: &[Value]) -> Vec<Source> {
    let mut seen = HashSet::new();
    attributions
        .iter()
        .filter_map(|a| {
            let web = a.get("web")?;
            let uri = web.get("uri").and_then(Value::as_str)?;
            let title = web.get("title").and_then(Value::as_str)?;
            if uri.is_empty() || title.is_empty() {
                return None;
            }
            Some(Source {
                uri: uri.to_string(),
                title: title.to_string(),
            })
        })
        .filter(|s| seen.insert(s.uri.clone()))
        .collect()
}
