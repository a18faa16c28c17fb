use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub error: Option<ApiError>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated. `None` when blank.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.as_ref()?.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<u16>,
    pub message: Option<String>,
}
