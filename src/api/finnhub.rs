// ============================================================================
// API Client : Finnhub (NewsFetcher)
// ============================================================================
// Récupère les news d'une entreprise via l'endpoint company-news
//
// Contrat :
// - Clé API absente → AuthenticationError, sans appel réseau
// - Aucune news → liste vide (pas une erreur)
// - Résultat trié du plus récent au plus ancien, tronqué à `limit`
// ============================================================================

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{http_client, BoxFuture};
use crate::config::{redact, AppConfig};
use crate::error::{DashboardError, Result};
use crate::models::news::{NO_LINK, NO_SUMMARY, NO_TITLE, UNKNOWN_PUBLISHER};
use crate::models::NewsItem;

const PROVIDER: &str = "finnhub";

/// Fenêtre utilisée par `fetch` quand l'appelant ne précise pas de dates
/// Header d'authentification Finnhub
const TOKEN_HEADER: &str = "X-Finnhub-Token";

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Article tel que retourné par Finnhub
///
/// Tous les champs sont optionnels : Finnhub omet parfois summary ou source
#[derive(Debug, Deserialize)]
struct FinnhubArticle {
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
    /// Timestamp Unix en secondes (0 si inconnu)
    #[serde(default)]
    datetime: Option<i64>,
}

/// Source de news pour un ticker
pub trait NewsProvider: Send + Sync {
    /// News publiées entre `from` et `to` inclus, les plus récentes d'abord
    fn fetch_range<'a>(
        &'a self,
        ticker: &'a str,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<NewsItem>>>;

    /// News récentes (30 derniers jours), les plus récentes d'abord
    fn fetch<'a>(&'a self, ticker: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<NewsItem>>> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(DEFAULT_LOOKBACK_DAYS);
        self.fetch_range(ticker, from, to, limit)
    }
}

/// Client HTTP pour l'API Finnhub
#[derive(Clone)]
pub struct FinnhubClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for FinnhubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinnhubClient")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl FinnhubClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(PROVIDER, config.http_timeout)?,
            base_url: config.finnhub_base_url.trim_end_matches('/').to_string(),
            api_key: config.finnhub_api_key.clone(),
        })
    }

    /// Appelle GET /api/v1/company-news
    ///
    /// # Erreurs
    /// * `AuthenticationError` - clé absente (aucun appel) ou refusée (401/403)
    /// * `ProviderError` - réseau, statut HTTP inattendu, JSON mal formé
    ///
    /// CONCEPT : skip(self)
    /// - self contient la clé API, elle ne doit jamais apparaître dans les logs
    #[instrument(skip(self))]
    pub async fn company_news(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("FINNHUB_API_KEY is not set, skipping news request");
            return Err(DashboardError::authentication(
                PROVIDER,
                "FINNHUB_API_KEY n'est pas définie",
            ));
        };

        let symbol = ticker.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DashboardError::InvalidInput("le ticker est vide".to_string()));
        }

        let url = format!("{}/api/v1/company-news", self.base_url);
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        debug!(url = %url, from = %from, to = %to, "Sending HTTP request to Finnhub");

        let response = self
            .client
            .get(&url)
            // Clé dans un header : l'URL apparaît dans les erreurs et les logs
            .header(TOKEN_HEADER, api_key)
            .query(&[
                ("symbol", symbol.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Finnhub request failed");
                DashboardError::provider(PROVIDER, format!("échec de la requête HTTP : {}", e))
            })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(status = %status, "Finnhub rejected the API key");
            return Err(DashboardError::authentication(
                PROVIDER,
                format!("clé API refusée (HTTP {})", status),
            ));
        }

        if !status.is_success() {
            error!(status = %status, "Finnhub returned error status");
            return Err(DashboardError::provider(
                PROVIDER,
                format!("Finnhub a retourné une erreur : HTTP {}", status),
            ));
        }

        let body = response.text().await.map_err(|e| {
            let e = e.without_url();
            DashboardError::provider(PROVIDER, format!("échec de lecture de la réponse : {}", e))
        })?;

        let items = parse_news_body(&body, limit)?;
        info!(articles = items.len(), "Successfully fetched news");
        Ok(items)
    }
}

impl NewsProvider for FinnhubClient {
    fn fetch_range<'a>(
        &'a self,
        ticker: &'a str,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<NewsItem>>> {
        Box::pin(self.company_news(ticker, from, to, limit))
    }
}

/// Parse la liste d'articles, normalise les champs manquants, trie et tronque
fn parse_news_body(body: &str, limit: usize) -> Result<Vec<NewsItem>> {
    let articles: Vec<FinnhubArticle> = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Unexpected Finnhub payload");
        DashboardError::provider(PROVIDER, format!("réponse inattendue : {}", e))
    })?;

    let total = articles.len();
    let mut items: Vec<NewsItem> = articles.into_iter().map(normalize_article).collect();

    // CONCEPT RUST : sort_by avec Option
    // - None < Some(_) : les articles sans date finissent en dernier
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);

    debug!(received = total, kept = items.len(), "Parsed Finnhub articles");
    Ok(items)
}

fn normalize_article(article: FinnhubArticle) -> NewsItem {
    // Une chaîne vide est traitée comme absente
    let text = |value: Option<String>, placeholder: &str| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| placeholder.to_string())
    };

    NewsItem {
        headline: text(article.headline, NO_TITLE),
        summary: text(article.summary, NO_SUMMARY),
        source: text(article.source, UNKNOWN_PUBLISHER),
        url: text(article.url, NO_LINK),
        published_at: article
            .datetime
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Component, ComponentFailure};

    const SAMPLE: &str = r#"[
        {"category":"company","datetime":1717000000,"headline":"Apple unveils new chips","id":1,
         "image":"","related":"AAPL","source":"Reuters","summary":"Faster and cheaper.","url":"https://example.com/a"},
        {"category":"company","datetime":1717100000,"headline":"Apple shares climb","id":2,
         "image":"","related":"AAPL","source":"Bloomberg","summary":"","url":"https://example.com/b"},
        {"category":"company","datetime":0,"headline":"","id":3,
         "image":"","related":"AAPL","source":"","summary":"Undated item","url":""}
    ]"#;

    fn closed_port_config(api_key: Option<&str>) -> AppConfig {
        AppConfig {
            finnhub_base_url: "http://127.0.0.1:9".to_string(),
            finnhub_api_key: api_key.map(str::to_string),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_parse_sorts_newest_first() {
        let items = parse_news_body(SAMPLE, 10).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].headline, "Apple shares climb");
        assert_eq!(items[1].headline, "Apple unveils new chips");
        assert!(items[0].published_at > items[1].published_at);
        assert!(items[2].published_at.is_none());
    }

    #[test]
    fn test_parse_truncates_to_limit() {
        let items = parse_news_body(SAMPLE, 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Bloomberg");
    }

    #[test]
    fn test_parse_placeholders() {
        let items = parse_news_body(SAMPLE, 10).unwrap();
        let undated = &items[2];

        assert_eq!(undated.headline, NO_TITLE);
        assert_eq!(undated.source, UNKNOWN_PUBLISHER);
        assert_eq!(undated.url, NO_LINK);
        assert_eq!(items[0].summary, NO_SUMMARY);
    }

    #[test]
    fn test_parse_empty_list_is_not_an_error() {
        assert!(parse_news_body("[]", 5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_object_is_provider_error() {
        let err = parse_news_body(r#"{"error":"Invalid API key"}"#, 5).unwrap_err();
        assert!(matches!(err, DashboardError::ProviderError { provider: "finnhub", .. }));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        // Un appel réseau vers le port fermé donnerait ProviderError
        let client = FinnhubClient::new(&closed_port_config(None)).unwrap();

        let result = client.fetch("AAPL", 5).await;
        assert!(matches!(
            result,
            Err(DashboardError::AuthenticationError { provider: "finnhub", .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_provider_error() {
        let client = FinnhubClient::new(&closed_port_config(Some("demo"))).unwrap();

        let result = client.fetch("AAPL", 5).await;
        assert!(matches!(result, Err(DashboardError::ProviderError { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_api_key() {
        let client = FinnhubClient::new(&closed_port_config(Some("SUPERSECRETKEY123"))).unwrap();

        let error = client.fetch("AAPL", 5).await.unwrap_err();
        let failure = ComponentFailure::new(Component::NewsFetcher, error);

        let message = failure.to_string();
        assert!(message.starts_with("Market News"));
        assert!(!message.contains("SUPERSECRETKEY123"));
        assert!(!format!("{:?}", failure).contains("SUPERSECRETKEY123"));
    }
}
