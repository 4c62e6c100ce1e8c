//! Translation/analysis collaborator.
//!
//! The service itself lives elsewhere; this module holds the client contract,
//! an HTTP client for it, and the static table used when it is unreachable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_settings::TranslationSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TranslationError};
use crate::heuristics::{DefaultHeuristics, VocabHeuristics};
use crate::word::normalize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Translation {
    Found(String),
    NotFound,
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, word: &str, source_language: &str) -> Result<Translation>;

    /// Difficulty estimate on the 1–5 scale.
    async fn estimate_difficulty(&self, word: &str, language: &str) -> Result<u8>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    word: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translation: Option<String>,
}

#[derive(Serialize)]
struct DifficultyRequest<'a> {
    word: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct DifficultyResponse {
    difficulty: u8,
}

/// JSON-over-HTTP client: `POST {endpoint}/translate` and
/// `POST {endpoint}/difficulty`.
#[derive(Clone, Debug)]
pub struct HttpTranslationService {
    client: reqwest::Client,
    endpoint: String,
    target_language: String,
}

impl HttpTranslationService {
    pub fn new(
        endpoint: impl Into<String>,
        target_language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            target_language: target_language.into(),
        })
    }

    /// `None` when no endpoint is configured.
    pub fn from_settings(settings: &TranslationSettings) -> Result<Option<Self>> {
        settings
            .endpoint
            .as_deref()
            .map(|endpoint| {
                Self::new(
                    endpoint,
                    settings.native_language.clone(),
                    Duration::from_millis(settings.timeout_ms),
                )
            })
            .transpose()
    }
}

#[async_trait]
impl TranslationService for HttpTranslationService {
    async fn translate(&self, word: &str, source_language: &str) -> Result<Translation> {
        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&TranslateRequest {
                word,
                source_language,
                target_language: &self.target_language,
            })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Translation::NotFound);
        }
        let body: TranslateResponse = response.error_for_status()?.json().await?;
        Ok(match body.translation {
            Some(text) if !text.trim().is_empty() => Translation::Found(text),
            _ => Translation::NotFound,
        })
    }

    async fn estimate_difficulty(&self, word: &str, language: &str) -> Result<u8> {
        let body: DifficultyResponse = self
            .client
            .post(format!("{}/difficulty", self.endpoint))
            .json(&DifficultyRequest { word, language })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.difficulty.clamp(1, 5))
    }
}

/// Small built-in glossary keyed by `(language, word)`.
#[derive(Clone, Debug, Default)]
pub struct StaticLookup {
    entries: HashMap<(String, String), String>,
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("fr", "bonjour", "hello"),
    ("fr", "merci", "thank you"),
    ("fr", "maison", "house"),
    ("fr", "travail", "work"),
    ("fr", "marché", "market"),
    ("fr", "problème", "problem"),
    ("fr", "système", "system"),
    ("fr", "difficile", "difficult"),
    ("fr", "voyage", "trip"),
    ("fr", "argent", "money"),
    ("es", "hola", "hello"),
    ("es", "gracias", "thank you"),
    ("es", "casa", "house"),
    ("es", "trabajo", "work"),
    ("es", "mercado", "market"),
    ("es", "problema", "problem"),
    ("es", "difícil", "difficult"),
    ("es", "dinero", "money"),
];

impl StaticLookup {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (language, word, translation) in BUILTIN {
            table.insert(language, word, translation);
        }
        table
    }

    pub fn insert(&mut self, language: &str, word: &str, translation: &str) {
        self.entries
            .insert((normalize(language), normalize(word)), translation.to_string());
    }

    pub fn lookup(&self, word: &str, language: &str) -> Translation {
        self.entries
            .get(&(normalize(language), normalize(word)))
            .cloned()
            .map_or(Translation::NotFound, Translation::Found)
    }
}

/// Remote service when configured and reachable, static table otherwise.
///
/// Never returns an error: service failures fall back to the table for
/// translations and to the local heuristic for difficulty.
pub struct FallbackTranslator {
    primary: Option<Arc<dyn TranslationService>>,
    table: StaticLookup,
    heuristics: DefaultHeuristics,
}

impl FallbackTranslator {
    pub fn new(primary: Option<Arc<dyn TranslationService>>, table: StaticLookup) -> Self {
        Self {
            primary,
            table,
            heuristics: DefaultHeuristics::default(),
        }
    }

    /// Static table only.
    pub fn offline() -> Self {
        Self::new(None, StaticLookup::builtin())
    }

    pub fn from_settings(settings: &TranslationSettings) -> Result<Self> {
        let primary = HttpTranslationService::from_settings(settings)?
            .map(|svc| Arc::new(svc) as Arc<dyn TranslationService>);
        Ok(Self::new(primary, StaticLookup::builtin()))
    }
}

#[async_trait]
impl TranslationService for FallbackTranslator {
    async fn translate(&self, word: &str, source_language: &str) -> Result<Translation> {
        if let Some(primary) = &self.primary {
            match primary.translate(word, source_language).await {
                Ok(found) => return Ok(found),
                Err(e) => info!(word, error = %e, "translation service failed, using static lookup"),
            }
        }
        let result = self.table.lookup(word, source_language);
        debug!(word, found = matches!(result, Translation::Found(_)), "static lookup");
        Ok(result)
    }

    async fn estimate_difficulty(&self, word: &str, language: &str) -> Result<u8> {
        if let Some(primary) = &self.primary {
            match primary.estimate_difficulty(word, language).await {
                Ok(difficulty) => return Ok(difficulty),
                Err(e) => info!(word, error = %e, "difficulty service failed, using heuristic"),
            }
        }
        Ok(self.heuristics.difficulty(&normalize(word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn analysis_router() -> Router {
        Router::new()
            .route(
                "/translate",
                post(|Json(body): Json<Value>| async move {
                    let translation = match body["word"].as_str() {
                        Some("chat") => Some("cat"),
                        _ => None,
                    };
                    assert_eq!(body["targetLanguage"], "en");
                    Json(json!({ "translation": translation }))
                }),
            )
            .route(
                "/difficulty",
                post(|Json(_): Json<Value>| async move { Json(json!({ "difficulty": 9 })) }),
            )
    }

    #[tokio::test]
    async fn http_service_translates_and_estimates() {
        let endpoint = serve(analysis_router()).await;
        let svc = HttpTranslationService::new(format!("{endpoint}/"), "en", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            svc.translate("chat", "fr").await.unwrap(),
            Translation::Found("cat".into())
        );
        assert_eq!(svc.translate("zzz", "fr").await.unwrap(), Translation::NotFound);
        assert_eq!(svc.estimate_difficulty("chat", "fr").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let router = Router::new().route(
            "/translate",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let endpoint = serve(router).await;
        let svc = HttpTranslationService::new(endpoint, "en", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            svc.translate("chat", "fr").await,
            Err(TranslationError::Http { status: 500 })
        ));
    }

    #[tokio::test]
    async fn fallback_uses_table_when_service_is_down() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let settings = TranslationSettings {
            endpoint: Some(format!("http://127.0.0.1:{port}")),
            timeout_ms: 500,
            ..TranslationSettings::default()
        };
        let translator = FallbackTranslator::from_settings(&settings).unwrap();
        assert_eq!(
            translator.translate("Merci", "fr").await.unwrap(),
            Translation::Found("thank you".into())
        );
        assert_eq!(translator.translate("ordinateur", "fr").await.unwrap(), Translation::NotFound);
        assert_eq!(translator.estimate_difficulty("chat", "fr").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fallback_prefers_reachable_service() {
        let endpoint = serve(analysis_router()).await;
        let svc: Arc<dyn TranslationService> =
            Arc::new(HttpTranslationService::new(endpoint, "en", Duration::from_secs(5)).unwrap());
        let translator = FallbackTranslator::new(Some(svc), StaticLookup::builtin());
        assert_eq!(
            translator.translate("chat", "fr").await.unwrap(),
            Translation::Found("cat".into())
        );
        // service answered "not found"; the table is not consulted
        assert_eq!(translator.translate("merci", "fr").await.unwrap(), Translation::NotFound);
    }

    #[test]
    fn offline_translator_has_no_service() {
        let translator = FallbackTranslator::offline();
        assert!(translator.primary.is_none());
        assert_eq!(
            translator.table.lookup("HOLA", "es"),
            Translation::Found("hello".into())
        );
    }
}
