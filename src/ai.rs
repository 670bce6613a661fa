//! Design suggestions from a generative model.
//!
//! The model looks at the QR destination (and the logo, when there is one) and
//! proposes a palette, a short caption, and a tone.  Callers never see a
//! failure: [`suggest_or_fallback`] swaps any error for [`Suggestion::fallback`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::color::Color;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// What the model is asked about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuggestionRequest {
    /// The QR destination (usually a URL).
    pub content: String,
    /// Raw logo as PNG bytes.
    pub logo_png: Option<Vec<u8>>,
}

/// A palette / caption / tone proposal.  Field names match the JSON schema
/// the model is asked to fill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub suggested_colors: Vec<String>,
    pub suggested_description: String,
    pub brand_tone: String,
}

impl Suggestion {
    /// Returned whenever the remote call fails in any way.
    pub fn fallback() -> Self {
        Self {
            suggested_colors: vec![
                "#000000".to_string(),
                "#ffffff".to_string(),
                "#3b82f6".to_string(),
            ],
            suggested_description: "Scan to visit".to_string(),
            brand_tone: "Neutral".to_string(),
        }
    }

    /// First suggested color, if there is one and it parses.
    pub fn primary_color(&self) -> Option<Color> {
        self.suggested_colors.first().and_then(|c| Color::parse_hex(c).ok())
    }
}

/// Why a suggestion could not be obtained.
#[derive(Debug)]
pub enum SuggestError {
    MissingApiKey,
    Network(String),
    Status { code: u16, body: String },
    EmptyResponse,
    Parse(String),
}

impl std::fmt::Display for SuggestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestError::MissingApiKey => write!(f, "no API key configured"),
            SuggestError::Network(e) => write!(f, "network error: {}", e),
            SuggestError::Status { code, body } => write!(f, "API error {}: {}", code, body),
            SuggestError::EmptyResponse => write!(f, "response contained no text"),
            SuggestError::Parse(e) => write!(f, "malformed suggestion: {}", e),
        }
    }
}

impl std::error::Error for SuggestError {}

impl From<reqwest::Error> for SuggestError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_decode() {
            SuggestError::Parse(e.to_string())
        } else {
            SuggestError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SuggestError {
    fn from(e: serde_json::Error) -> Self {
        SuggestError::Parse(e.to_string())
    }
}

/// Anything that can turn a request into a suggestion.
pub trait SuggestionProvider: Send + Sync {
    fn suggest(&self, request: &SuggestionRequest) -> Result<Suggestion, SuggestError>;
}

/// Ask `provider`, substituting [`Suggestion::fallback`] on any error.
pub fn suggest_or_fallback(provider: &dyn SuggestionProvider, request: &SuggestionRequest) -> Suggestion {
    match provider.suggest(request) {
        Ok(suggestion) => {
            log_info!(
                "suggestion received: {} colors, tone '{}'",
                suggestion.suggested_colors.len(),
                suggestion.brand_tone
            );
            suggestion
        }
        Err(e) => {
            log_err!("AI analysis failed: {}", e);
            Suggestion::fallback()
        }
    }
}

/// Parse the model's JSON answer.  Missing fields or wrong types are errors.
pub fn parse_suggestion(text: &str) -> Result<Suggestion, SuggestError> {
    Ok(serde_json::from_str(text.trim())?)
}

// ============================================================================
// Gemini provider
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, SuggestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// Endpoint URL.  The key goes in the `x-goog-api-key` header, never here.
    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl SuggestionProvider for GeminiProvider {
    fn suggest(&self, request: &SuggestionRequest) -> Result<Suggestion, SuggestError> {
        if self.config.api_key.trim().is_empty() {
            return Err(SuggestError::MissingApiKey);
        }

        let body = build_request(request);
        log_info!(
            "requesting suggestion from {} (logo attached: {})",
            self.config.model,
            request.logo_png.is_some()
        );

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SuggestError::Status { code: status.as_u16(), body });
        }

        let api_response: GenerateContentResponse = response.json()?;
        let text = first_text(&api_response).ok_or(SuggestError::EmptyResponse)?;
        parse_suggestion(text)
    }
}

fn prompt_for(content: &str) -> String {
    format!(
        "Analyze this URL: {}. Suggest a professional color palette (hex codes), a short catchy \
         title for a QR code display, and a brand tone. If an image is provided, ensure the \
         colors complement the logo.",
        content
    )
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "suggestedColors": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Array of 3 hex color codes that represent the brand"
            },
            "suggestedDescription": {
                "type": "STRING",
                "description": "A short slogan or title for the QR code"
            },
            "brandTone": {
                "type": "STRING",
                "description": "The mood or tone of the design (e.g. Modern, Playful, Corporate)"
            }
        },
        "required": ["suggestedColors", "suggestedDescription", "brandTone"]
    })
}

fn build_request(request: &SuggestionRequest) -> GenerateContentRequest {
    let mut parts = vec![RequestPart::Text { text: prompt_for(&request.content) }];
    if let Some(png) = &request.logo_png {
        parts.push(RequestPart::Inline {
            inline_data: InlineData {
                mime_type: "image/png".to_string(),
                data: BASE64.encode(png),
            },
        });
    }

    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
        },
    }
}

fn first_text(response: &GenerateContentResponse) -> Option<&str> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
}

// --- Gemini wire types ------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl SuggestionProvider for Failing {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<Suggestion, SuggestError> {
            Err(SuggestError::Network("connection reset".to_string()))
        }
    }

    struct Garbled;

    impl SuggestionProvider for Garbled {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<Suggestion, SuggestError> {
            parse_suggestion("{\"suggestedColors\": \"red\"}")
        }
    }

    #[test]
    fn fallback_contract_is_exact() {
        let fallback = Suggestion::fallback();
        assert_eq!(fallback.suggested_colors, vec!["#000000", "#ffffff", "#3b82f6"]);
        assert_eq!(fallback.suggested_description, "Scan to visit");
        assert_eq!(fallback.brand_tone, "Neutral");
    }

    #[test]
    fn failures_degrade_to_fallback() {
        let request = SuggestionRequest { content: "https://example.com".into(), logo_png: None };
        assert_eq!(suggest_or_fallback(&Failing, &request), Suggestion::fallback());
        assert_eq!(suggest_or_fallback(&Garbled, &request), Suggestion::fallback());
    }

    #[test]
    fn parses_model_json() {
        let text = r##"
            {"suggestedColors": ["#FF5500", "#111111", "#fafafa"],
             "suggestedDescription": "Order ahead",
             "brandTone": "Playful"}
        "##;
        let s = parse_suggestion(text).unwrap();
        assert_eq!(s.suggested_colors.len(), 3);
        assert_eq!(s.brand_tone, "Playful");
        assert_eq!(s.primary_color(), Some(Color::rgb(0xff, 0x55, 0x00)));
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let err = parse_suggestion(r#"{"suggestedColors": [], "brandTone": "x"}"#).unwrap_err();
        assert!(matches!(err, SuggestError::Parse(_)));
    }

    #[test]
    fn primary_color_ignores_unparsable_entries() {
        let s = Suggestion { suggested_colors: vec!["teal".into()], ..Suggestion::fallback() };
        assert_eq!(s.primary_color(), None);
        let empty = Suggestion { suggested_colors: vec![], ..Suggestion::fallback() };
        assert_eq!(empty.primary_color(), None);
    }

    #[test]
    fn request_body_carries_prompt_schema_and_logo() {
        let request = SuggestionRequest {
            content: "https://example.com".into(),
            logo_png: Some(vec![1, 2, 3]),
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("https://example.com"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"],
            serde_json::json!(["suggestedColors", "suggestedDescription", "brandTone"])
        );
    }

    #[test]
    fn extracts_first_text_part() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{}"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_text(&response), Some("{}"));

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_text(&empty), None);
    }

    #[test]
    fn missing_key_short_circuits() {
        let provider = GeminiProvider::new(GeminiConfig::new("")).unwrap();
        let err = provider.suggest(&SuggestionRequest::default()).unwrap_err();
        assert!(matches!(err, SuggestError::MissingApiKey));
    }

    #[test]
    fn unreachable_endpoint_falls_back() {
        let mut config = GeminiConfig::new("test-key");
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_secs(2);
        let provider = GeminiProvider::new(config).unwrap();
        let request = SuggestionRequest { content: "https://example.com".into(), logo_png: None };
        assert_eq!(suggest_or_fallback(&provider, &request), Suggestion::fallback());
    }

    #[test]
    fn api_key_stays_out_of_urls_and_errors() {
        let mut config = GeminiConfig::new("SECRET-KEY-123");
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_secs(2);
        let provider = GeminiProvider::new(config).unwrap();
        assert!(!provider.api_url().contains("SECRET-KEY-123"));

        let request = SuggestionRequest { content: "https://example.com".into(), logo_png: None };
        let err = provider.suggest(&request).unwrap_err();
        assert!(matches!(err, SuggestError::Network(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    }
}
