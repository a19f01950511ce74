use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{
    truncate_chars, Article, MAX_ARTICLE_TITLE, MAX_FULL_SUMMARY, MAX_SHORT_DESCRIPTION,
};

pub const FALLBACK_IMAGE_URL: &str = "https://picsum.photos/1200/675";
pub const FALLBACK_IMAGE_PROMPT: &str = "Tech innovation";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEXT_MODEL: &str = "gemini-3-flash-preview";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    #[error("Gemini API key is missing")]
    MissingApiKey,
    #[error("Failed to reach the generation service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Generation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Could not understand the generation response: {0}")]
    InvalidResponse(String),
    #[error("Generated article is missing its {0}")]
    EmptyField(&'static str),
}

/// Text fields produced for a curated URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArticle {
    pub title: String,
    pub short_description: String,
    pub full_summary: String,
    pub category: String,
}

/// External summarisation and illustration service
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate_article(
        &self,
        url: &str,
        raw_text: &str,
    ) -> Result<GeneratedArticle, CurationError>;

    /// A `data:` URL for the generated image, or `None` if no image came back
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, CurationError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }
}

/// Gemini `generateContent` REST client
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CurationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CurationError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self { client, api_key })
    }

    async fn generate(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateResponse, CurationError> {
        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_BASE, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(CurationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| CurationError::InvalidResponse(e.to_string()))
    }
}

fn article_prompt(url: &str, raw_text: &str) -> String {
    format!(
        "Analyze the following content from URL ({}): {}. \n    \
        Provide a title, a short 1-sentence description, a detailed summary (3 paragraphs), and a category.",
        url, raw_text
    )
}

fn image_prompt(topic: &str) -> String {
    format!(
        "Create a minimalist, high-quality, conceptual editorial illustration for an article about: {}. \
        Style: Clean, modern, soft lighting, 16:9 aspect ratio.",
        topic
    )
}

fn article_request(url: &str, raw_text: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": article_prompt(url, raw_text) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "shortDescription": { "type": "STRING" },
                    "fullSummary": { "type": "STRING" },
                    "category": { "type": "STRING" }
                },
                "required": ["title", "shortDescription", "fullSummary", "category"]
            }
        }
    })
}

fn image_request(topic: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [{ "text": image_prompt(topic) }] }],
        "generationConfig": {
            "imageConfig": { "aspectRatio": "16:9" }
        }
    })
}

fn parse_article_response(response: &GenerateResponse) -> Result<GeneratedArticle, CurationError> {
    let text = response
        .parts()
        .find_map(|p| p.text.as_deref())
        .ok_or_else(|| CurationError::InvalidResponse("no text in response".to_string()))?;
    serde_json::from_str(text).map_err(|e| CurationError::InvalidResponse(e.to_string()))
}

fn extract_inline_image(response: &GenerateResponse) -> Option<String> {
    response.parts().find_map(|p| {
        p.inline_data.as_ref().map(|img| {
            format!(
                "data:{};base64,{}",
                img.mime_type.as_deref().unwrap_or("image/png"),
                img.data
            )
        })
    })
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn generate_article(
        &self,
        url: &str,
        raw_text: &str,
    ) -> Result<GeneratedArticle, CurationError> {
        let response = self.generate(TEXT_MODEL, article_request(url, raw_text)).await?;
        parse_article_response(&response)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, CurationError> {
        let response = self.generate(IMAGE_MODEL, image_request(prompt)).await?;
        Ok(extract_inline_image(&response))
    }
}

/// Turns a URL into a complete [`Article`]
pub struct Curator<G: GenerativeService> {
    service: G,
}

impl<G: GenerativeService> Curator<G> {
    pub fn new(service: G) -> Self {
        Self { service }
    }

    pub async fn curate(&self, url: &str, raw_text: &str) -> Result<Article, CurationError> {
        let generated = validate(self.service.generate_article(url, raw_text).await?)?;

        let prompt = if generated.title.is_empty() {
            FALLBACK_IMAGE_PROMPT
        } else {
            generated.title.as_str()
        };
        let image_url = self
            .service
            .generate_image(prompt)
            .await?
            .unwrap_or_else(|| {
                tracing::warn!(url, "No image returned, using stock image");
                FALLBACK_IMAGE_URL.to_string()
            });

        Ok(Article {
            id: new_article_id(),
            url: url.to_string(),
            title: generated.title,
            short_description: generated.short_description,
            full_summary: generated.full_summary,
            image_url,
            date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            category: generated.category,
        })
    }
}

/// Reject blank fields and clamp lengths to the article limits
fn validate(article: GeneratedArticle) -> Result<GeneratedArticle, CurationError> {
    let fields = [
        ("title", &article.title),
        ("short description", &article.short_description),
        ("summary", &article.full_summary),
        ("category", &article.category),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(CurationError::EmptyField(*name));
    }

    Ok(GeneratedArticle {
        title: truncate_chars(article.title.trim(), MAX_ARTICLE_TITLE).to_string(),
        short_description: truncate_chars(article.short_description.trim(), MAX_SHORT_DESCRIPTION)
            .to_string(),
        full_summary: truncate_chars(article.full_summary.trim(), MAX_FULL_SUMMARY).to_string(),
        category: article.category.trim().to_string(),
    })
}

fn new_article_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeService {
        article: GeneratedArticle,
        image: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn new(image: Option<&str>) -> Self {
            Self {
                article: GeneratedArticle {
                    title: "Clean energy reshapes cities".to_string(),
                    short_description: "Cities adopt new grids.".to_string(),
                    full_summary: "Long summary.".to_string(),
                    category: "Energy".to_string(),
                },
                image: image.map(String::from),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeService for FakeService {
        async fn generate_article(
            &self,
            _url: &str,
            _raw_text: &str,
        ) -> Result<GeneratedArticle, CurationError> {
            Ok(self.article.clone())
        }

        async fn generate_image(&self, prompt: &str) -> Result<Option<String>, CurationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.image.clone())
        }
    }

    struct FailingService;

    #[async_trait]
    impl GenerativeService for FailingService {
        async fn generate_article(
            &self,
            _url: &str,
            _raw_text: &str,
        ) -> Result<GeneratedArticle, CurationError> {
            Err(CurationError::Api {
                status: 403,
                body: "API key not valid".to_string(),
            })
        }

        async fn generate_image(&self, _prompt: &str) -> Result<Option<String>, CurationError> {
            Ok(None)
        }
    }

    // ==================== Curator Tests ====================

    #[tokio::test]
    async fn test_curate_assembles_article() {
        let curator = Curator::new(FakeService::new(Some("data:image/png;base64,AAAA")));
        let article = curator.curate("https://news.example/a", "text").await.unwrap();

        assert_eq!(article.url, "https://news.example/a");
        assert_eq!(article.title, "Clean energy reshapes cities");
        assert_eq!(article.image_url, "data:image/png;base64,AAAA");
        assert_eq!(article.id.len(), 9);
        assert!(crate::models::parse_edition_date(&article.date).is_some());
        assert_eq!(
            curator.service.prompts.lock().unwrap().as_slice(),
            ["Clean energy reshapes cities".to_string()]
        );
    }

    #[tokio::test]
    async fn test_curate_falls_back_to_stock_image() {
        let curator = Curator::new(FakeService::new(None));
        let article = curator.curate("https://news.example/a", "text").await.unwrap();
        assert_eq!(article.image_url, FALLBACK_IMAGE_URL);
    }

    #[tokio::test]
    async fn test_curate_surfaces_service_errors() {
        let curator = Curator::new(FailingService);
        let err = curator.curate("https://news.example/a", "text").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_curate_rejects_blank_fields() {
        let mut service = FakeService::new(None);
        service.article.category = "  ".to_string();
        let err = Curator::new(service).curate("u", "t").await.unwrap_err();
        assert!(matches!(err, CurationError::EmptyField("category")));
    }

    #[test]
    fn test_validate_truncates_long_fields() {
        let article = validate(GeneratedArticle {
            title: "t".repeat(200),
            short_description: "s".repeat(200),
            full_summary: "f".repeat(900),
            category: " AI ".to_string(),
        })
        .unwrap();

        assert_eq!(article.title.len(), MAX_ARTICLE_TITLE);
        assert_eq!(article.short_description.len(), MAX_SHORT_DESCRIPTION);
        assert_eq!(article.full_summary.len(), MAX_FULL_SUMMARY);
        assert_eq!(article.category, "AI");
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn test_parse_article_response() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{
                "text": "{\"title\":\"T\",\"shortDescription\":\"S\",\"fullSummary\":\"F\",\"category\":\"C\"}"
            }]}}]
        }))
        .unwrap();

        let article = parse_article_response(&response).unwrap();
        assert_eq!(article.short_description, "S");
    }

    #[test]
    fn test_parse_article_response_without_text() {
        let response: GenerateResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(
            parse_article_response(&response),
            Err(CurationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_extract_inline_image() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "QUJD" } }
            ]}}]
        }))
        .unwrap();
        assert_eq!(
            extract_inline_image(&response).as_deref(),
            Some("data:image/jpeg;base64,QUJD")
        );

        let empty: GenerateResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [] } }] })).unwrap();
        assert_eq!(extract_inline_image(&empty), None);
    }

    #[test]
    fn test_requests_carry_schema_and_aspect_ratio() {
        let req = article_request("https://a", "body");
        assert_eq!(
            req["generationConfig"]["responseSchema"]["required"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
        let img = image_request("Solar");
        assert_eq!(img["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert!(img["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("about: Solar."));
    }

    #[test]
    fn test_gemini_client_requires_key() {
        assert!(matches!(GeminiClient::new(" "), Err(CurationError::MissingApiKey)));
    }
}
