// ============================================================================
// Configuration : variables d'environnement
// ============================================================================
// Toute la configuration vient de l'environnement (aucun fichier persistant).
// Seule FINNHUB_API_KEY est nécessaire, et seulement pour le module news.
// ============================================================================

use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io";
pub const DEFAULT_HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_SENTIMENT_MODEL: &str = "ProsusAI/finbert";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Configuration de l'application
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub yahoo_base_url: String,
    pub finnhub_base_url: String,
    /// Clé Finnhub ; None => AuthenticationError au premier fetch de news
    pub finnhub_api_key: Option<String>,
    pub hf_inference_url: String,
    /// Token Hugging Face (optionnel, l'API publique accepte les appels anonymes)
    pub hf_api_token: Option<String>,
    pub sentiment_model: String,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
            finnhub_api_key: None,
            hf_inference_url: DEFAULT_HF_INFERENCE_URL.to_string(),
            hf_api_token: None,
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Lit la configuration depuis l'environnement du processus
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construit la configuration à partir d'une fonction de lookup
    ///
    /// CONCEPT RUST : Closures génériques
    /// - `F: Fn(&str) -> Option<String>` : n'importe quelle source clé/valeur
    /// - Les tests passent une HashMap au lieu de modifier l'environnement global
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Une variable vide est traitée comme absente
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        let http_timeout = read("HTTP_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Self {
            yahoo_base_url: read("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            finnhub_base_url: read("FINNHUB_BASE_URL").unwrap_or(defaults.finnhub_base_url),
            finnhub_api_key: read("FINNHUB_API_KEY"),
            hf_inference_url: read("HF_INFERENCE_URL").unwrap_or(defaults.hf_inference_url),
            hf_api_token: read("HF_API_TOKEN"),
            sentiment_model: read("SENTIMENT_MODEL").unwrap_or(defaults.sentiment_model),
            http_timeout,
        }
    }

    pub fn has_news_credentials(&self) -> bool {
        self.finnhub_api_key.is_some()
    }
}

/// Valeur affichée à la place d'un secret
pub(crate) fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

/// CONCEPT RUST : Debug manuel
/// - Les secrets ne sortent jamais via {:?} (logs, structures englobantes)
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("yahoo_base_url", &self.yahoo_base_url)
            .field("finnhub_base_url", &self.finnhub_base_url)
            .field("finnhub_api_key", &redact(&self.finnhub_api_key))
            .field("hf_inference_url", &self.hf_inference_url)
            .field("hf_api_token", &redact(&self.hf_api_token))
            .field("sentiment_model", &self.sentiment_model)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config, AppConfig::default());
        assert!(!config.has_news_credentials());
        assert_eq!(config.sentiment_model, "ProsusAI/finbert");
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = config_from(&[
            ("FINNHUB_API_KEY", "  "),
            ("FINNHUB_BASE_URL", "http://localhost:8080"),
            ("HTTP_TIMEOUT_SECS", "3"),
        ]);

        assert_eq!(config.finnhub_api_key, None);
        assert_eq!(config.finnhub_base_url, "http://localhost:8080");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = config_from(&[("HTTP_TIMEOUT_SECS", "abc")]);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[
            ("FINNHUB_API_KEY", "finnhub-secret"),
            ("HF_API_TOKEN", "hf-secret"),
        ]);

        let debug = format!("{:?}", config);
        assert!(!debug.contains("finnhub-secret"));
        assert!(!debug.contains("hf-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(format!("{:?}", AppConfig::default()).contains("<unset>"));
    }
}
