use html_escape::decode_html_entities;

use crate::language::Language;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(u16),
    #[error("translation rejected ({status}): {message}")]
    Rejected { status: i64, message: String },
    #[error("translation service returned no text")]
    Empty,
}

/// A single text translation call. No batching is assumed: callers issue one call per field.
#[allow(async_fn_in_trait)]
pub trait Translator {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslateError>;
}

#[derive(Clone, Debug)]
pub struct TranslatorConfig {
    pub endpoint: String,
}

pub fn translator_config() -> TranslatorConfig {
    #[cfg(feature = "local-translator")]
    let endpoint = "http://localhost:5000/get";
    #[cfg(not(feature = "local-translator"))]
    let endpoint = "https://api.mymemory.translated.net/get";

    TranslatorConfig {
        endpoint: endpoint.to_string(),
    }
}

/// Talks to a MyMemory-compatible `GET ?q=<text>&langpair=<src>|<dst>` endpoint.
#[derive(Clone, Debug)]
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint,
        }
    }
}

impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslateError> {
        let langpair = format!("{}|{}", source.iso_639_1(), target.iso_639_1());
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let value: serde_json::Value = response.json().await?;
        parse_response(&value)
    }
}

fn parse_response(value: &serde_json::Value) -> Result<String, TranslateError> {
    // the service reports its own status in the body, as a number or a numeric string
    let status = match &value["responseStatus"] {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(200);

    if status != 200 {
        return Err(TranslateError::Rejected {
            status,
            message: value["responseDetails"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        });
    }

    let translated = value["responseData"]["translatedText"]
        .as_str()
        .unwrap_or("")
        .trim();
    if translated.is_empty() {
        return Err(TranslateError::Empty);
    }
    Ok(decode_html_entities(translated).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success_decodes_entities() {
        let value = json!({
            "responseData": { "translatedText": "¿Qu&eacute; hace chmod 755?", "match": 1 },
            "responseStatus": 200,
            "responseDetails": ""
        });
        assert_eq!(parse_response(&value).unwrap(), "¿Qué hace chmod 755?");
    }

    #[test]
    fn test_parse_rejected_with_string_status() {
        let value = json!({
            "responseData": { "translatedText": "" },
            "responseStatus": "403",
            "responseDetails": "INVALID LANGUAGE PAIR"
        });
        match parse_response(&value) {
            Err(TranslateError::Rejected { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "INVALID LANGUAGE PAIR");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_text() {
        let value = json!({ "responseData": { "translatedText": "  " }, "responseStatus": 200 });
        assert!(matches!(parse_response(&value), Err(TranslateError::Empty)));
        assert!(matches!(parse_response(&json!({})), Err(TranslateError::Empty)));
    }

    #[test]
    fn test_default_endpoint() {
        #[cfg(not(feature = "local-translator"))]
        assert_eq!(
            translator_config().endpoint,
            "https://api.mymemory.translated.net/get"
        );
        #[cfg(feature = "local-translator")]
        assert_eq!(translator_config().endpoint, "http://localhost:5000/get");
    }
}
