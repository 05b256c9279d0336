//! `generateContent` request payload.

use serde::Serialize;

use crate::asset::UploadedAsset;

pub const SYSTEM_INSTRUCTION: &str = "You are a dedicated and impartial fact-checking AI. Your task is to analyze the content provided (text claim or image/text combination) using the provided Google Search results (grounding). Based ONLY on the evidence, determine the accuracy of the content.
    1. State your final assessment clearly (e.g., \"VERIFIED\", \"UNVERIFIED\", \"MISLEADING\", \"FALSE\", or \"VISUAL ASSESSMENT\").
    2. If an image is provided, first describe the image content and comment on any visual anomalies that suggest manipulation.
    3. Provide a concise explanation of *why* you reached that conclusion, referencing the evidence found.
    4. Do not introduce outside knowledge not present in the search results.
    5. Format your response in clear paragraphs.";

pub const IMAGE_INSTRUCTION: &str = "Analyze this image for signs of manipulation, visual inconsistencies, and provide a grounded assessment of its original context or any claims associated with it.";

fn claim_instruction(claim: &str) -> String {
    format!("Analyze the accuracy of the following claim:\n\nCLAIM: \"{}\"", claim)
}

fn image_claim_instruction(claim: &str) -> String {
    format!(
        "Also, specifically check the following text claim in relation to the image: \"{}\"",
        claim
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::Inline {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<ContentPart>,
}

/// One analysis request. Built fresh per submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
    pub system_instruction: SystemInstruction,
}

impl AnalysisRequest {
    pub fn parts(&self) -> &[ContentPart] {
        self.contents
            .first()
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    pub fn retrieval_enabled(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Assemble the payload for a claim and an optional staged image.
pub fn build(claim: &str, asset: &UploadedAsset) -> AnalysisRequest {
    let claim = claim.trim();
    let mut parts = Vec::with_capacity(3);

    match asset.inline() {
        Some((mime_type, data)) => {
            parts.push(ContentPart::text(IMAGE_INSTRUCTION));
            parts.push(ContentPart::inline(mime_type, data));
            if !claim.is_empty() {
                parts.push(ContentPart::text(image_claim_instruction(claim)));
            }
        }
        None => parts.push(ContentPart::text(claim_instruction(claim))),
    }

    AnalysisRequest {
        contents: vec![Content { parts }],
        tools: vec![Tool {
            google_search: GoogleSearch::default(),
        }],
        system_instruction: SystemInstruction {
            parts: vec![ContentPart::text(SYSTEM_INSTRUCTION)],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> UploadedAsset {
        UploadedAsset::image("image/jpeg", "/9j/4AAQ", "cat.jpg")
    }

    #[test]
    fn test_image_without_claim_has_two_parts() {
        let request = build("", &image());
        assert_eq!(
            request.parts(),
            &[
                ContentPart::text(IMAGE_INSTRUCTION),
                ContentPart::inline("image/jpeg", "/9j/4AAQ"),
            ]
        );
    }

    #[test]
    fn test_image_with_claim_has_three_parts() {
        let request = build("  This is the president  ", &image());
        let parts = request.parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], ContentPart::text(IMAGE_INSTRUCTION));
        assert_eq!(parts[1], ContentPart::inline("image/jpeg", "/9j/4AAQ"));
        assert_eq!(
            parts[2],
            ContentPart::text(
                "Also, specifically check the following text claim in relation to the image: \"This is the president\""
            )
        );
    }

    #[test]
    fn test_text_only_has_one_part() {
        let request = build("Water boils at 50C at sea level", &UploadedAsset::absent());
        assert_eq!(
            request.parts(),
            &[ContentPart::text(
                "Analyze the accuracy of the following claim:\n\nCLAIM: \"Water boils at 50C at sea level\""
            )]
        );
        assert!(request.retrieval_enabled());
    }

    #[test]
    fn test_wire_format() {
        let request = build("", &image());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{
                    "parts": [
                        { "text": IMAGE_INSTRUCTION },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "/9j/4AAQ" } }
                    ]
                }],
                "tools": [{ "google_search": {} }],
                "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] }
            })
        );
    }
}
