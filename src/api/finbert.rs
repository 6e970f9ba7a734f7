// ============================================================================
// API Client : Hugging Face Inference (modèle FinBERT)
// ============================================================================
// Implémente SentimentModel en appelant le modèle ProsusAI/finbert hébergé
//
// Requête  : POST {base}/models/{model}   {"inputs": ["texte 1", "texte 2"]}
// Réponse  : [[{"label":"positive","score":0.93}, ...], ...]  (un tableau par texte)
//
// CONCEPTS RUST :
// 1. #[serde(untagged)] : accepte plusieurs formes de réponse
// 2. Arc<dyn Trait> : le loader retourne un modèle partageable
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::api::{http_client, BoxFuture};
use crate::config::{redact, AppConfig};
use crate::error::{DashboardError, Result};
use crate::models::{RawLabel, SentimentScores};
use crate::sentiment::{ModelLoader, SentimentModel};

const PROVIDER: &str = "huggingface";

/// Texte envoyé au chargement pour vérifier que le modèle répond
const WARMUP_TEXT: &str = "Stocks were flat today.";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Formes de réponse acceptées
///
/// CONCEPT RUST : serde(untagged)
/// - serde essaie chaque variant dans l'ordre
/// - Un seul texte peut revenir sous forme de liste plate
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

/// Modèle FinBERT servi par l'API d'inférence Hugging Face
#[derive(Clone)]
pub struct FinBertModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    token: Option<String>,
}

impl fmt::Debug for FinBertModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinBertModel")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("token", &redact(&self.token))
            .finish()
    }
}

impl FinBertModel {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let base = config.hf_inference_url.trim_end_matches('/');
        Ok(Self {
            client: http_client(PROVIDER, config.http_timeout)?,
            endpoint: format!("{}/models/{}", base, config.sentiment_model),
            model: config.sentiment_model.clone(),
            token: config.hf_api_token.clone(),
        })
    }

    /// Envoie les textes au modèle et retourne une distribution par texte
    ///
    /// # Erreurs
    /// * `ModelUnavailable` - modèle introuvable (404) ou en cours de chargement (503)
    /// * `AuthenticationError` - token refusé (401/403)
    /// * `ProviderError` - réseau, autre statut, réponse mal formée
    #[instrument(skip(self, texts), fields(model = %self.model, texts = texts.len()))]
    pub async fn infer(&self, texts: &[String], wait_for_model: bool) -> Result<Vec<SentimentScores>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&InferenceRequest { inputs: texts });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if wait_for_model {
            request = request.header("x-wait-for-model", "true");
        }

        debug!(endpoint = %self.endpoint, "Sending inference request");
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
                error!(error = %e, "Inference request failed");
            DashboardError::provider(PROVIDER, format!("échec de la requête HTTP : {}", e))
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            warn!(status = %status, "Sentiment model is not available");
            return Err(DashboardError::ModelUnavailable(format!(
                "{} (HTTP {})",
                self.model, status
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(status = %status, "Inference API rejected the token");
            return Err(DashboardError::authentication(
                PROVIDER,
                format!("token refusé (HTTP {})", status),
            ));
        }

        if !status.is_success() {
            error!(status = %status, "Inference API returned error status");
            return Err(DashboardError::provider(
                PROVIDER,
                format!("l'API d'inférence a retourné une erreur : HTTP {}", status),
            ));
        }

        let body = response.text().await.map_err(|e| {
            let e = e.without_url();
            DashboardError::provider(PROVIDER, format!("échec de lecture de la réponse : {}", e))
        })?;

        parse_inference_body(&body, texts.len())
    }
}

impl SentimentModel for FinBertModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn score<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<SentimentScores>>> {
        Box::pin(self.infer(texts, false))
    }
}

/// Chargeur du modèle FinBERT
///
/// Le "chargement" construit le client puis envoie un texte de test
/// en demandant à l'API d'attendre que le modèle soit prêt.
#[derive(Debug, Clone)]
pub struct FinBertLoader {
    config: AppConfig,
}

impl FinBertLoader {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for FinBertLoader {
    fn load<'a>(&'a self) -> BoxFuture<'a, Result<Arc<dyn SentimentModel>>> {
        Box::pin(async move {
            let model = FinBertModel::new(&self.config)
                .map_err(|e| DashboardError::ModelUnavailable(e.to_string()))?;

            info!(model = %model.model, "Loading sentiment model");
            let warmup = [WARMUP_TEXT.to_string()];
            model.infer(&warmup, true).await.map_err(|e| match e {
                DashboardError::ModelUnavailable(_) | DashboardError::AuthenticationError { .. } => e,
                other => DashboardError::ModelUnavailable(other.to_string()),
            })?;

            info!(model = %model.model, "Sentiment model ready");
            Ok(Arc::new(model) as Arc<dyn SentimentModel>)
        })
    }
}

/// Parse la réponse d'inférence en une distribution normalisée par texte
fn parse_inference_body(body: &str, expected: usize) -> Result<Vec<SentimentScores>> {
    let response: InferenceResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Unexpected inference payload");
        DashboardError::provider(PROVIDER, format!("réponse inattendue : {}", e))
    })?;

    let batches = match response {
        InferenceResponse::Batch(batches) => batches,
        InferenceResponse::Single(labels) => vec![labels],
    };

    if batches.len() != expected {
        return Err(DashboardError::provider(
            PROVIDER,
            format!("{} distributions reçues pour {} textes", batches.len(), expected),
        ));
    }

    batches.into_iter().map(scores_from_labels).collect()
}

fn scores_from_labels(labels: Vec<LabelScore>) -> Result<SentimentScores> {
    let mut scores = SentimentScores::default();
    let mut known = 0;

    for entry in labels {
        let Some(label) = RawLabel::parse(&entry.label) else {
            debug!(label = %entry.label, "Ignoring unknown label");
            continue;
        };
        let score = if entry.score.is_finite() { entry.score.max(0.0) } else { 0.0 };
        match label {
            RawLabel::Positive => scores.positive = score,
            RawLabel::Neutral => scores.neutral = score,
            RawLabel::Negative => scores.negative = score,
        }
        known += 1;
    }

    if known == 0 {
        return Err(DashboardError::provider(
            PROVIDER,
            "aucun label positive/neutral/negative dans la réponse",
        ));
    }

    Ok(scores.normalized())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_response() {
        let body = r#"[
            [{"label":"positive","score":0.90},{"label":"neutral","score":0.08},{"label":"negative","score":0.02}],
            [{"label":"negative","score":0.70},{"label":"neutral","score":0.20},{"label":"positive","score":0.10}]
        ]"#;
        let scores = parse_inference_body(body, 2).unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].top_label(), RawLabel::Positive);
        assert_eq!(scores[1].top_label(), RawLabel::Negative);
        assert!((scores[1].negative - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_parse_flat_response_and_renormalize() {
        let body = r#"[{"label":"Positive","score":2.0},{"label":"Neutral","score":1.0},{"label":"Negative","score":1.0}]"#;
        let scores = parse_inference_body(body, 1).unwrap();

        assert!((scores[0].total() - 1.0).abs() < 1e-12);
        assert!((scores[0].positive - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_count_mismatch_is_provider_error() {
        let body = r#"[[{"label":"neutral","score":1.0}]]"#;
        assert!(matches!(
            parse_inference_body(body, 3),
            Err(DashboardError::ProviderError { .. })
        ));
    }

    #[test]
    fn test_parse_error_payload_is_provider_error() {
        let body = r#"{"error":"Model ProsusAI/finbert is currently loading","estimated_time":20.0}"#;
        assert!(matches!(
            parse_inference_body(body, 1),
            Err(DashboardError::ProviderError { .. })
        ));
    }

    #[test]
    fn test_unknown_labels_rejected() {
        let body = r#"[[{"label":"LABEL_0","score":0.9}]]"#;
        assert!(parse_inference_body(body, 1).is_err());
    }

    #[tokio::test]
    async fn test_loader_unreachable_endpoint_is_model_unavailable() {
        let config = AppConfig {
            hf_inference_url: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        };
        let loader = FinBertLoader::new(config);

        let result = loader.load().await;
        assert!(matches!(result, Err(DashboardError::ModelUnavailable(_))));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = AppConfig {
            hf_api_token: Some("hf_secret_token".to_string()),
            ..AppConfig::default()
        };
        let model = FinBertModel::new(&config).unwrap();
        let loader = FinBertLoader::new(config);

        assert!(!format!("{:?}", model).contains("hf_secret_token"));
        assert!(!format!("{:?}", loader).contains("hf_secret_token"));
    }
}
