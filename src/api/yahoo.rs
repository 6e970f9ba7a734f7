// ============================================================================
// API Client : Yahoo Finance (DataFetcher)
// ============================================================================
// Récupère l'historique OHLCV d'un ticker depuis l'API chart de Yahoo
//
// CONCEPTS RUST AVANCÉS :
// 1. async/await : programmation asynchrone (non-bloquante)
// 2. Result<T, DashboardError> : erreurs typées, converties à la frontière
// 3. Serde : désérialisation JSON automatique
// 4. Trait object : MarketDataProvider utilisable en Arc<dyn ...>
// ============================================================================

use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{http_client, BoxFuture};
use crate::config::AppConfig;
use crate::error::{DashboardError, Result};
use crate::models::{Interval, Period, PriceSeries, OHLC};

const PROVIDER: &str = "yahoo";

/// Devise utilisée quand Yahoo ne la fournit pas
pub const UNKNOWN_CURRENCY: &str = "UNKNOWN";

// ============================================================================
// Structures pour parser la réponse JSON de Yahoo Finance
// ============================================================================
// Yahoo retourne un JSON imbriqué, on définit des structures qui matchent
// la structure JSON pour que serde puisse désérialiser automatiquement
//
// CONCEPT RUST : #[serde(default)]
// - Un ticker inconnu renvoie {"chart":{"result":null,"error":{...}}}
// - Option<...> + default évite un échec de parsing dans ce cas
// ============================================================================

/// Réponse complète de l'API Yahoo Finance
#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl YahooError {
    fn message(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(description)) => format!("{} ({})", description, code),
            (None, Some(description)) => description.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "erreur sans description".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

/// Métadonnées du ticker
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")] // Convertit automatiquement snake_case -> camelCase
struct Meta {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Données OHLCV (Open, High, Low, Close, Volume)
#[derive(Debug, Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

// ============================================================================
// Trait : source de cours
// ============================================================================

/// Source de l'historique de prix d'un ticker
///
/// CONCEPT RUST : Lifetime 'a sur la future
/// - La future emprunte &self et ticker
/// - Elle ne peut pas vivre plus longtemps qu'eux
pub trait MarketDataProvider: Send + Sync {
    fn fetch<'a>(
        &'a self,
        ticker: &'a str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'a, Result<PriceSeries>>;
}

/// Client HTTP pour l'API chart de Yahoo Finance
#[derive(Debug, Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(PROVIDER, config.http_timeout)?,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Récupère les données d'un ticker depuis Yahoo Finance
    ///
    /// # Arguments
    /// * `ticker` - Symbole du ticker (ex: "AAPL", "TSLA", "BTC-USD")
    /// * `period` - Période totale (paramètre `range`)
    /// * `interval` - Granularité des chandelles
    ///
    /// # Erreurs
    /// * `InvalidInput` - ticker vide ou combinaison non supportée (aucun appel réseau)
    /// * `DataUnavailable` - ticker inconnu ou aucune ligne exploitable
    /// * `ProviderError` - réseau, statut HTTP inattendu, JSON mal formé
    ///
    /// CONCEPT RUST : #[instrument]
    /// - Macro tracing qui ajoute automatiquement un span
    /// - Tous les logs à l'intérieur auront le contexte ticker + period + interval
    #[instrument(skip(self, period, interval), fields(period = %period, interval = %interval))]
    pub async fn fetch_series(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries> {
        let symbol = validate_request(ticker, period, interval)?;

        let url = build_yahoo_url(&self.base_url, &symbol);
        debug!(url = %url, "Built Yahoo Finance API URL");

        debug!("Sending HTTP request to Yahoo Finance");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", period.to_yahoo_string()),
                ("interval", interval.to_yahoo_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Yahoo Finance request failed");
                DashboardError::provider(PROVIDER, format!("échec de la requête HTTP : {}", e))
            })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        // Yahoo répond 404 pour un ticker inconnu
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(symbol = %symbol, "Unknown ticker");
            return Err(DashboardError::DataUnavailable(format!(
                "ticker inconnu '{}'",
                symbol
            )));
        }

        // Vérifie que la réponse est un succès HTTP (200-299)
        if !status.is_success() {
            error!(status = %status, "Yahoo Finance returned error status");
            return Err(DashboardError::provider(
                PROVIDER,
                format!("Yahoo Finance a retourné une erreur : HTTP {}", status),
            ));
        }

        debug!("Parsing JSON response");
        let body = response.text().await.map_err(|e| {
            let e = e.without_url();
            DashboardError::provider(PROVIDER, format!("échec de lecture de la réponse : {}", e))
        })?;

        let series = parse_yahoo_body(&body, &symbol, period, interval)?;

        info!(candles = series.len(), currency = %series.currency, "Successfully fetched ticker data");
        Ok(series)
    }
}

impl MarketDataProvider for YahooClient {
    fn fetch<'a>(
        &'a self,
        ticker: &'a str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'a, Result<PriceSeries>> {
        Box::pin(self.fetch_series(ticker, period, interval))
    }
}

/// Normalise le ticker et refuse les requêtes impossibles avant tout appel réseau
pub fn validate_request(ticker: &str, period: Period, interval: Interval) -> Result<String> {
    let symbol = ticker.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(DashboardError::InvalidInput("le ticker est vide".to_string()));
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err(DashboardError::InvalidInput(format!(
            "ticker invalide '{}'",
            symbol
        )));
    }
    if !interval.supports(period) {
        return Err(DashboardError::InvalidInput(format!(
            "l'intervalle {} n'est pas disponible sur la période {}",
            interval, period
        )));
    }
    Ok(symbol)
}

/// Construit l'URL de l'API chart (range et interval sont passés en query)
fn build_yahoo_url(base_url: &str, symbol: &str) -> String {
    format!("{}/v8/finance/chart/{}", base_url, symbol)
}

/// Parse le corps JSON de Yahoo et le convertit en PriceSeries
fn parse_yahoo_body(
    body: &str,
    symbol: &str,
    period: Period,
    interval: Interval,
) -> Result<PriceSeries> {
    let yahoo_response: YahooResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Unexpected Yahoo payload");
        DashboardError::provider(PROVIDER, format!("échec du parsing JSON : {}", e))
    })?;
    parse_yahoo_response(yahoo_response, symbol, period, interval)
}

/// Convertit la réponse Yahoo en PriceSeries
///
/// CONCEPT RUST : Ownership et borrowing
/// - yahoo_response est "moved" (pas de &), on en devient propriétaire
/// - symbol est borrowed (&str), on ne le copie pas
/// - period et interval sont Copy (enums simples), donc copiés automatiquement
fn parse_yahoo_response(
    yahoo_response: YahooResponse,
    symbol: &str,
    period: Period,
    interval: Interval,
) -> Result<PriceSeries> {
    if let Some(err) = yahoo_response.chart.error {
        warn!(error = %err.message(), "Yahoo returned a chart error");
        return Err(DashboardError::DataUnavailable(format!(
            "{} : {}",
            symbol,
            err.message()
        )));
    }

    // Récupère le premier résultat
    let result = yahoo_response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| {
            DashboardError::DataUnavailable(format!("aucune donnée retournée pour {}", symbol))
        })?;

    let currency = result
        .meta
        .currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string());
    let symbol = result.meta.symbol.unwrap_or_else(|| symbol.to_string());

    let timestamps = result.timestamp.unwrap_or_default();
    debug!(timestamp_count = timestamps.len(), "Received timestamps from Yahoo");

    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(DashboardError::DataUnavailable(format!(
            "pas de données OHLC pour {}",
            symbol
        )));
    };

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    // CONCEPT RUST : Iterators + Option chaining
    // - get(i) : None si le tableau est plus court que les timestamps
    // - and_then(|&v| v) : aplatit Option<&Option<f64>>
    let mut candles = Vec::with_capacity(timestamps.len());
    let mut skipped_count = 0;
    for (i, &timestamp) in timestamps.iter().enumerate() {
        let values = (
            opens.get(i).and_then(|&v| v),
            highs.get(i).and_then(|&v| v),
            lows.get(i).and_then(|&v| v),
            closes.get(i).and_then(|&v| v),
            DateTime::from_timestamp(timestamp, 0),
        );

        // Skip cette chandelle si une valeur manque
        let (Some(open), Some(high), Some(low), Some(close), Some(datetime)) = values else {
            skipped_count += 1;
            continue;
        };

        // Clôture nulle ou négative : donnée corrompue, même traitement qu'une valeur manquante
        if !close.is_finite() || close <= 0.0 {
            skipped_count += 1;
            continue;
        }

        let volume = volumes.get(i).and_then(|&v| v).unwrap_or(0);
        candles.push(OHLC::new(datetime, open, high, low, close, volume));
    }

    // Log des statistiques de parsing
    if skipped_count > 0 {
        warn!(
            skipped = skipped_count,
            total = timestamps.len(),
            "Skipped candles with missing data"
        );
    }

    if candles.is_empty() {
        error!("No valid OHLC data found");
        return Err(DashboardError::DataUnavailable(format!(
            "aucune donnée OHLC valide trouvée pour {}",
            symbol
        )));
    }

    let series = PriceSeries::new(symbol, currency, period, interval, candles);
    debug!(
        parsed = series.len(),
        total = timestamps.len(),
        skipped = skipped_count,
        "Finished parsing OHLC data"
    );

    Ok(series)
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "currency": "USD", "regularMarketPrice": 190.5},
                "timestamp": [1704153600, 1704240000, 1704326400, 1704412800],
                "indicators": {"quote": [{
                    "open":   [187.1, 184.2, null, 181.9],
                    "high":   [188.4, 185.8, 183.0, 182.7],
                    "low":    [183.8, 183.4, 180.8, 180.1],
                    "close":  [185.6, 184.2, 181.9, 181.1],
                    "volume": [82488700, null, 62379700, 71983600]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_build_yahoo_url() {
        let url = build_yahoo_url("https://query1.finance.yahoo.com", "AAPL");
        assert_eq!(url, "https://query1.finance.yahoo.com/v8/finance/chart/AAPL");
    }

    #[test]
    fn test_parse_skips_missing_rows() {
        let series = parse_yahoo_body(SAMPLE, "AAPL", Period::OneMonth, Interval::D1).unwrap();

        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.currency, "USD");
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![185.6, 184.2, 181.1]);
        // Volume manquant → 0
        assert_eq!(series.candles()[1].volume, 0);
    }

    #[test]
    fn test_parse_skips_non_positive_close() {
        let body = SAMPLE.replace("[185.6, 184.2, 181.9, 181.1]", "[185.6, 0.0, 181.9, -1.0]");
        let series = parse_yahoo_body(&body, "AAPL", Period::OneMonth, Interval::D1).unwrap();

        assert_eq!(series.closes(), vec![185.6]);
    }

    #[test]
    fn test_parse_missing_currency() {
        let body = SAMPLE.replace(r#""currency": "USD", "#, "");
        let series = parse_yahoo_body(&body, "AAPL", Period::OneMonth, Interval::D1).unwrap();
        assert_eq!(series.currency, UNKNOWN_CURRENCY);
    }

    #[test]
    fn test_parse_chart_error_is_data_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_yahoo_body(body, "ZZZZ", Period::OneMonth, Interval::D1).unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable(_)));
    }

    #[test]
    fn test_parse_no_rows_is_data_unavailable() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let err = parse_yahoo_body(body, "AAPL", Period::OneMonth, Interval::D1).unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable(_)));
    }

    #[test]
    fn test_parse_malformed_is_provider_error() {
        let err = parse_yahoo_body("<html>", "AAPL", Period::OneMonth, Interval::D1).unwrap_err();
        assert!(matches!(err, DashboardError::ProviderError { provider: "yahoo", .. }));
    }

    #[test]
    fn test_validate_request() {
        assert_eq!(
            validate_request(" aapl ", Period::OneMonth, Interval::D1).unwrap(),
            "AAPL"
        );
        assert!(matches!(
            validate_request("   ", Period::OneMonth, Interval::D1),
            Err(DashboardError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_request("AAPL", Period::OneYear, Interval::M1),
            Err(DashboardError::InvalidInput(_))
        ));
    }

    // CONCEPT RUST : #[tokio::test]
    // - Macro qui setup un runtime tokio pour le test
    // - Permet d'utiliser .await dans les tests
    #[tokio::test]
    async fn test_invalid_request_rejected_before_network() {
        // Port fermé : un appel réseau donnerait ProviderError, pas InvalidInput
        let config = AppConfig {
            yahoo_base_url: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        };
        let client = YahooClient::new(&config).unwrap();

        let result = client.fetch("", Period::OneMonth, Interval::D1).await;
        assert!(matches!(result, Err(DashboardError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_provider_error() {
        let config = AppConfig {
            yahoo_base_url: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        };
        let client = YahooClient::new(&config).unwrap();

        let result = client.fetch("AAPL", Period::OneMonth, Interval::D1).await;
        assert!(matches!(result, Err(DashboardError::ProviderError { .. })));
    }
}
