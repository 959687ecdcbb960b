//! AI product generator.
//!
//! Turns a product name plus a few hints into draft catalog copy using
//! Claude. Models do not always answer with clean JSON, so the reply is read
//! in order as:
//!
//! 1. the whole body as JSON,
//! 2. the first fenced `json` code block,
//! 3. the first balanced `{...}` object in the text,
//! 4. plain prose used as the description.

use std::collections::{BTreeMap, HashSet};

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use emporium_core::CurrencyCode;

use crate::claude::{ClaudeClient, ClaudeError, Message};

const MAX_NAME_LEN: usize = 200;
const SEO_TITLE_LEN: usize = 60;
const SEO_DESCRIPTION_LEN: usize = 160;
const SHORT_DESCRIPTION_LEN: usize = 200;
const DEFAULT_TONE: &str = "friendly and professional";

const SYSTEM_PROMPT: &str = "You write product listings for an online shop. \
Reply with a single JSON object and nothing else.";

/// Errors from product generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// No API key configured.
    #[error("AI generator is not configured")]
    NotConfigured,

    /// The request itself is unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The Claude API call failed.
    #[error("Claude error: {0}")]
    Claude(#[from] ClaudeError),
}

impl GeneratorError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Claude(ClaudeError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Claude(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Claude(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NotConfigured => self.to_string(),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Claude(ClaudeError::RateLimited(secs)) => {
                format!("AI service is busy, try again in {secs} seconds")
            }
            Self::Claude(e) if e.is_transient() => "AI service is unavailable, try again shortly".to_string(),
            Self::Claude(_) => "AI service error".to_string(),
        }
    }
}

/// What to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated keywords.
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

impl GenerateRequest {
    fn validate(&self) -> Result<&str, GeneratorError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(GeneratorError::InvalidRequest("name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(GeneratorError::InvalidRequest(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        Ok(name)
    }

    fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn hint(value: Option<&String>) -> Option<&str> {
        value.map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// Draft product copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProduct {
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub suggested_price: Option<Decimal>,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub seo_title: String,
    pub seo_description: String,
}

/// Generates product copy with Claude.
#[derive(Clone)]
pub struct ProductGenerator {
    client: Option<ClaudeClient>,
    currency: CurrencyCode,
}

impl ProductGenerator {
    /// Create a generator. `None` leaves it unconfigured.
    #[must_use]
    pub const fn new(client: Option<ClaudeClient>, currency: CurrencyCode) -> Self {
        Self { client, currency }
    }

    /// Whether an API key is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Model ID in use, if configured.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.client.as_ref().map(ClaudeClient::model)
    }

    /// Generate draft copy for `request`.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::NotConfigured` without an API key,
    /// `InvalidRequest` for a blank or overlong name, and `Claude` when the
    /// API call fails.
    #[tracing::instrument(skip(self), fields(name = %request.name))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedProduct, GeneratorError> {
        let client = self.client.as_ref().ok_or(GeneratorError::NotConfigured)?;
        request.validate()?;

        let prompt = build_prompt(request, self.currency);
        let response = client
            .chat(vec![Message::user(prompt)], Some(SYSTEM_PROMPT.to_string()))
            .await?;

        let product = parse_generated(&response.text(), request);
        tracing::info!(
            tags = product.tags.len(),
            has_price = product.suggested_price.is_some(),
            "Product copy generated"
        );
        Ok(product)
    }
}

fn build_prompt(request: &GenerateRequest, currency: CurrencyCode) -> String {
    let mut prompt = format!("Write a product listing for \"{}\".\n", request.name.trim());
    if let Some(category) = GenerateRequest::hint(request.category.as_ref()) {
        prompt.push_str(&format!("Category: {category}\n"));
    }
    let keywords = request.keyword_list();
    if !keywords.is_empty() {
        prompt.push_str(&format!("Keywords: {}\n", keywords.join(", ")));
    }
    let tone = GenerateRequest::hint(request.tone.as_ref()).unwrap_or(DEFAULT_TONE);
    prompt.push_str(&format!("Tone: {tone}\n\n"));
    prompt.push_str(&format!(
        "Return JSON with these keys:\n\
         - name: polished product name\n\
         - description: 2-3 paragraphs\n\
         - short_description: one sentence\n\
         - suggested_price: decimal number in {currency}, or null\n\
         - tags: array of lowercase strings\n\
         - attributes: object of attribute name to value, e.g. {{\"material\": \"oak\"}}\n\
         - seo_title: at most {SEO_TITLE_LEN} characters\n\
         - seo_description: at most {SEO_DESCRIPTION_LEN} characters\n"
    ));
    prompt
}

// =============================================================================
// Response parsing
// =============================================================================

/// Loosely typed model output.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    name: Option<String>,
    description: Option<String>,
    short_description: Option<String>,
    suggested_price: Option<serde_json::Value>,
    tags: Vec<serde_json::Value>,
    attributes: BTreeMap<String, serde_json::Value>,
    seo_title: Option<String>,
    seo_description: Option<String>,
}

impl RawProduct {
    /// Parse `text` as a product object with a description.
    fn from_json(text: &str) -> Option<Self> {
        let raw: Self = serde_json::from_str(text.trim()).ok()?;
        non_blank(raw.description.as_deref()).is_some().then_some(raw)
    }
}

/// Read the model's reply. Never fails; prose becomes the description.
#[must_use]
pub fn parse_generated(text: &str, request: &GenerateRequest) -> GeneratedProduct {
    let raw = RawProduct::from_json(text)
        .or_else(|| fenced_json(text).and_then(RawProduct::from_json))
        .or_else(|| first_object(text).and_then(RawProduct::from_json));

    match raw {
        Some(raw) => normalize(raw, request),
        None => fallback(text, request),
    }
}

fn normalize(raw: RawProduct, request: &GenerateRequest) -> GeneratedProduct {
    let name = non_blank(raw.name.as_deref())
        .unwrap_or_else(|| request.name.trim())
        .to_string();
    let description = raw.description.unwrap_or_default().trim().to_string();
    let short_description = non_blank(raw.short_description.as_deref())
        .map_or_else(|| first_sentence(&description), str::to_string);

    let mut tags: Vec<String> = raw
        .tags
        .iter()
        .filter_map(|t| t.as_str())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        tags = request.keyword_list();
    }
    let mut seen = HashSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));

    let attributes = raw
        .attributes
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let key = key.trim().to_string();
            (!key.is_empty() && !value.trim().is_empty()).then(|| (key, value.trim().to_string()))
        })
        .collect();

    GeneratedProduct {
        seo_title: non_blank(raw.seo_title.as_deref())
            .map_or_else(|| truncate(&name, SEO_TITLE_LEN), |t| truncate(t, SEO_TITLE_LEN)),
        seo_description: non_blank(raw.seo_description.as_deref()).map_or_else(
            || truncate(&short_description, SEO_DESCRIPTION_LEN),
            |d| truncate(d, SEO_DESCRIPTION_LEN),
        ),
        suggested_price: raw.suggested_price.as_ref().and_then(parse_price),
        name,
        description,
        short_description,
        tags,
        attributes,
    }
}

fn fallback(text: &str, request: &GenerateRequest) -> GeneratedProduct {
    let name = request.name.trim().to_string();
    let description = text.trim().to_string();
    let short_description = first_sentence(&description);
    GeneratedProduct {
        seo_title: truncate(&name, SEO_TITLE_LEN),
        seo_description: truncate(&short_description, SEO_DESCRIPTION_LEN),
        name,
        description,
        short_description,
        suggested_price: None,
        tags: request.keyword_list(),
        attributes: BTreeMap::new(),
    }
}

/// Body of the first ```` ```json ```` block.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = text.get(start..)?;
    let end = rest.find("```")?;
    rest.get(..end)
}

/// First balanced `{...}` substring, ignoring braces inside JSON strings.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.get(start..)?.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..=start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s
            .trim()
            .trim_start_matches(['$', '€', '£'])
            .replace(',', ""),
        _ => return None,
    };
    let price: Decimal = text.trim().parse().ok()?;
    (price >= Decimal::ZERO).then(|| price.round_dp(2))
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && text
                    .get(i + c.len_utf8()..)
                    .is_none_or(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        })
        .map_or(text.len(), |(i, c)| i + c.len_utf8());
    truncate(text.get(..end).unwrap_or(text), SHORT_DESCRIPTION_LEN)
}

/// At most `max` characters, cut at a word boundary when possible.
fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(space) if space > max / 2 => cut.get(..space).unwrap_or(&cut).trim_end().to_string(),
        _ => cut,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClaudeConfig;

    fn request() -> GenerateRequest {
        GenerateRequest {
            name: "Oak Desk Lamp".to_string(),
            category: Some("Lighting".to_string()),
            keywords: Some("Oak, reading, warm light".to_string()),
            tone: None,
        }
    }

    const JSON_REPLY: &str = r#"{
        "name": "Oak Desk Lamp",
        "description": "A solid oak lamp. Warm light for late reading.",
        "short_description": "Solid oak lamp with warm light.",
        "suggested_price": 79.5,
        "tags": ["Lighting", "oak"],
        "attributes": {"material": "oak", "wattage": 8, "dimmable": true, "color": null},
        "seo_title": "Oak Desk Lamp | Warm Reading Light",
        "seo_description": "Hand-finished oak desk lamp."
    }"#;

    #[test]
    fn test_parses_whole_body_json() {
        let product = parse_generated(JSON_REPLY, &request());
        assert_eq!(product.name, "Oak Desk Lamp");
        assert_eq!(product.suggested_price, Some(Decimal::new(7950, 2)));
        assert_eq!(product.tags, vec!["lighting", "oak"]);
        assert_eq!(product.attributes["wattage"], "8");
        assert_eq!(product.attributes["dimmable"], "true");
        assert!(!product.attributes.contains_key("color"));
    }

    #[test]
    fn test_tags_deduplicated_in_order() {
        let text = r#"{"description": "Lamp.", "tags": ["oak", "Lamp", "OAK", " lamp ", "desk"]}"#;
        let product = parse_generated(text, &request());
        assert_eq!(product.tags, vec!["oak", "lamp", "desk"]);
    }

    #[test]
    fn test_parses_fenced_block() {
        let text = format!("Here you go:\n```json\n{JSON_REPLY}\n```\nEnjoy!");
        let product = parse_generated(&text, &request());
        assert_eq!(product.short_description, "Solid oak lamp with warm light.");
    }

    #[test]
    fn test_parses_first_balanced_object() {
        let text = r#"Sure! {"description": "Lamp with a {curly} name. Bright.", "tags": []} Hope that helps."#;
        let product = parse_generated(text, &request());
        assert_eq!(product.description, "Lamp with a {curly} name. Bright.");
        assert_eq!(product.short_description, "Lamp with a {curly} name.");
        assert_eq!(product.tags, vec!["oak", "reading", "warm light"]);
        assert_eq!(product.name, "Oak Desk Lamp");
    }

    #[test]
    fn test_falls_back_to_prose() {
        let text = "This lamp is made of oak! It glows warmly on any desk.";
        let product = parse_generated(text, &request());
        assert_eq!(product.description, text);
        assert_eq!(product.short_description, "This lamp is made of oak!");
        assert_eq!(product.seo_title, "Oak Desk Lamp");
        assert_eq!(product.suggested_price, None);
        assert!(product.attributes.is_empty());
    }

    #[test]
    fn test_object_without_description_falls_through() {
        let text = "Use {size} and {color} placeholders.";
        let product = parse_generated(text, &request());
        assert_eq!(product.description, text);
    }

    #[test]
    fn test_first_object_handles_escaped_quotes() {
        let text = r#"x {"a": "quote \" and } brace", "b": {"c": 1}} y"#;
        assert_eq!(
            first_object(text),
            Some(r#"{"a": "quote \" and } brace", "b": {"c": 1}}"#)
        );
        assert_eq!(first_object("no braces"), None);
        assert_eq!(first_object("{ unclosed"), None);
    }

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price(&serde_json::json!("$1,299.99")), Some(Decimal::new(129_999, 2)));
        assert_eq!(parse_price(&serde_json::json!(12)), Some(Decimal::new(12, 0)));
        assert_eq!(parse_price(&serde_json::json!(-5)), None);
        assert_eq!(parse_price(&serde_json::json!("call us")), None);
        assert_eq!(parse_price(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_first_sentence_ignores_decimal_points() {
        assert_eq!(first_sentence("Holds 2.5 liters. Dishwasher safe."), "Holds 2.5 liters.");
        assert_eq!(first_sentence("No terminator"), "No terminator");
    }

    #[test]
    fn test_truncate_cuts_at_word_boundary() {
        let text = "An exceptionally well made walnut serving board for every kitchen";
        let cut = truncate(text, 30);
        assert!(cut.chars().count() <= 30);
        assert!(!cut.ends_with(' '));
        assert!(text.starts_with(&cut));
    }

    #[test]
    fn test_prompt_mentions_hints() {
        let prompt = build_prompt(&request(), CurrencyCode::EUR);
        assert!(prompt.contains("\"Oak Desk Lamp\""));
        assert!(prompt.contains("Category: Lighting"));
        assert!(prompt.contains("Keywords: oak, reading, warm light"));
        assert!(prompt.contains(DEFAULT_TONE));
        assert!(prompt.contains("decimal number in EUR, or null"));
    }

    fn generator(server: &MockServer) -> ProductGenerator {
        let config = ClaudeConfig {
            api_key: SecretString::from("sk-ant-REDACTED"),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: Url::parse(&format!("{}/", server.uri())).unwrap(),
        };
        ProductGenerator::new(Some(ClaudeClient::new(&config).unwrap()), CurrencyCode::USD)
    }

    #[tokio::test]
    async fn test_generate_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "model": "claude-sonnet-4-20250514",
                "stop_reason": "end_turn",
                "content": [{"type": "text", "text": format!("```json\n{JSON_REPLY}\n```")}],
                "usage": {"input_tokens": 120, "output_tokens": 300}
            })))
            .mount(&server)
            .await;

        let product = generator(&server).generate(&request()).await.unwrap();
        assert_eq!(product.seo_title, "Oak Desk Lamp | Warm Reading Light");
    }

    #[tokio::test]
    async fn test_generate_unauthorized_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = generator(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Claude(ClaudeError::Unauthorized(_))));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "AI service error");
    }

    #[tokio::test]
    async fn test_generate_overloaded_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let err = generator(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Claude(ClaudeError::Overloaded)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_generate_without_key() {
        let generator = ProductGenerator::new(None, CurrencyCode::USD);
        assert!(!generator.is_configured());
        let err = generator.generate(&request()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.public_message(), "AI generator is not configured");
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_calling_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate(&GenerateRequest {
                name: "   ".to_string(),
                ..GenerateRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidRequest(_)));
    }
}
