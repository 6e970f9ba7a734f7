// ============================================================================
// Session : orchestration d'une requête du tableau de bord
// ============================================================================
// Enchaîne les composants dans l'ordre :
//   cours (cache) → KPIs → graphiques → news (cache) → sentiment
//
// Chaque section du rapport est Ready / Failed / Skipped / Disabled.
// Une erreur d'un composant devient une ComponentFailure et n'empêche pas
// les sections indépendantes de s'exécuter (les news ne dépendent pas des cours).
//
// CONCEPT : Contexte explicite
// - La Session possède les caches et le classifieur (modèle chargé à la demande)
// - Créée au démarrage, détruite à la fin : pas d'état global
// ============================================================================

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use crate::api::yahoo::validate_request;
use crate::api::{FinBertLoader, FinnhubClient, MarketDataProvider, NewsProvider, YahooClient};
use crate::cache::{CacheKey, SessionCache};
use crate::charts::{ChartRenderer, ChartSet};
use crate::config::AppConfig;
use crate::error::{Component, ComponentFailure, DashboardError, Result};
use crate::kpi::KpiEngine;
use crate::models::{
    Interval, MetricsSeries, MetricsSummary, NewsItem, Period, PriceSeries, SentimentResult,
};
use crate::sentiment::{ModelLoader, SentimentClassifier};

pub const MIN_NEWS_LIMIT: usize = 1;
pub const MAX_NEWS_LIMIT: usize = 20;
pub const DEFAULT_NEWS_LIMIT: usize = 5;

const OP_FETCH_PRICES: &str = "fetch_prices";
const OP_FETCH_NEWS: &str = "fetch_news";

// ============================================================================
// Requête
// ============================================================================

/// Modules affichés (cases à cocher du formulaire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleToggles {
    pub market_data: bool,
    pub key_metrics: bool,
    pub charts: bool,
    pub news: bool,
    pub sentiment: bool,
}

impl Default for ModuleToggles {
    fn default() -> Self {
        Self {
            market_data: true,
            key_metrics: true,
            charts: true,
            news: true,
            sentiment: true,
        }
    }
}

/// Paramètres saisis par l'utilisateur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub news_limit: usize,
    pub modules: ModuleToggles,
}

impl DashboardRequest {
    pub fn new(ticker: impl Into<String>, period: Period, interval: Interval) -> Self {
        Self {
            ticker: ticker.into(),
            period,
            interval,
            news_limit: DEFAULT_NEWS_LIMIT,
            modules: ModuleToggles::default(),
        }
    }

    /// Nombre d'articles, borné à [1, 20]
    pub fn with_news_limit(mut self, limit: usize) -> Self {
        self.news_limit = limit.clamp(MIN_NEWS_LIMIT, MAX_NEWS_LIMIT);
        self
    }

    pub fn with_modules(mut self, modules: ModuleToggles) -> Self {
        self.modules = modules;
        self
    }
}

// ============================================================================
// Rapport
// ============================================================================

/// État d'une section du tableau de bord
///
/// CONCEPT RUST : Enum générique
/// - Même enum pour toutes les sections, T = le contenu de la section
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome<T> {
    Ready(T),
    Failed(ComponentFailure),
    /// Non exécutée car une section amont a échoué ou est désactivée
    Skipped(String),
    Disabled,
}

impl<T> SectionOutcome<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            SectionOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SectionOutcome::Ready(_))
    }

    pub fn failure(&self) -> Option<&ComponentFailure> {
        match self {
            SectionOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Nom court pour les logs
    pub fn status(&self) -> &'static str {
        match self {
            SectionOutcome::Ready(_) => "ready",
            SectionOutcome::Failed(_) => "failed",
            SectionOutcome::Skipped(_) => "skipped",
            SectionOutcome::Disabled => "disabled",
        }
    }

    fn from_result(component: Component, result: Result<T>) -> Self {
        match result {
            Ok(value) => SectionOutcome::Ready(value),
            Err(error) => {
                let failure = ComponentFailure::new(component, error);
                warn!(
                    component = %failure.component,
                    kind = failure.error.kind(),
                    error = %failure.error,
                    "Component failed"
                );
                SectionOutcome::Failed(failure)
            }
        }
    }
}

/// Résumé + table des KPIs
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMetrics {
    pub summary: MetricsSummary,
    pub series: MetricsSeries,
}

/// Résultat complet d'une requête
#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub request: DashboardRequest,
    /// Ticker normalisé (majuscules)
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub prices: SectionOutcome<Arc<PriceSeries>>,
    pub metrics: SectionOutcome<KeyMetrics>,
    pub charts: SectionOutcome<ChartSet>,
    pub news: SectionOutcome<Arc<Vec<NewsItem>>>,
    pub sentiment: SectionOutcome<SentimentResult>,
}

impl DashboardReport {
    /// Tous les échecs, dans l'ordre du pipeline
    pub fn failures(&self) -> Vec<&ComponentFailure> {
        [
            self.prices.failure(),
            self.metrics.failure(),
            self.charts.failure(),
            self.news.failure(),
            self.sentiment.failure(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl fmt::Display for DashboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} / {}] prices={} metrics={} charts={} news={} sentiment={}",
            self.symbol,
            self.request.period,
            self.request.interval,
            self.prices.status(),
            self.metrics.status(),
            self.charts.status(),
            self.news.status(),
            self.sentiment.status()
        )
    }
}

// ============================================================================
// Session
// ============================================================================

/// Contexte d'une session utilisateur
pub struct Session {
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
    kpi: KpiEngine,
    renderer: ChartRenderer,
    classifier: SentimentClassifier,
    price_cache: SessionCache<PriceSeries>,
    news_cache: SessionCache<Vec<NewsItem>>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            market,
            news,
            kpi: KpiEngine::default(),
            renderer: ChartRenderer::new(),
            classifier: SentimentClassifier::new(loader),
            price_cache: SessionCache::new(),
            news_cache: SessionCache::new(),
            started_at: Utc::now(),
        }
    }

    /// Session branchée sur Yahoo, Finnhub et Hugging Face
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let market = YahooClient::new(config)?;
        let news = FinnhubClient::new(config)?;
        let loader = FinBertLoader::new(config.clone());
        info!(
            news_credentials = config.has_news_credentials(),
            model = %config.sentiment_model,
            "Session created"
        );
        Ok(Self::new(Arc::new(market), Arc::new(news), Arc::new(loader)))
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Nombre d'entrées en cache (cours, news)
    pub fn cache_sizes(&self) -> (usize, usize) {
        (self.price_cache.len(), self.news_cache.len())
    }

    pub fn sentiment_model_loaded(&self) -> bool {
        self.classifier.is_loaded()
    }

    /// Exécute une requête complète
    #[instrument(skip(self, request), fields(ticker = %request.ticker, period = %request.period, interval = %request.interval))]
    pub async fn run(&mut self, request: &DashboardRequest) -> DashboardReport {
        let modules = request.modules;
        let symbol = request.ticker.trim().to_uppercase();
        info!(news_limit = request.news_limit, "Running dashboard request");

        // === Cours ===
        let prices = if modules.market_data {
            SectionOutcome::from_result(Component::DataFetcher, self.fetch_prices(request).await)
        } else {
            SectionOutcome::Disabled
        };

        // === KPIs (dépend des cours) ===
        let metrics = match (&prices, modules.key_metrics) {
            (_, false) => SectionOutcome::Disabled,
            (SectionOutcome::Ready(series), true) => SectionOutcome::from_result(
                Component::KpiEngine,
                self.kpi
                    .compute(series)
                    .map(|(summary, series)| KeyMetrics { summary, series }),
            ),
            (_, true) => SectionOutcome::Skipped(upstream_reason(Component::DataFetcher, &prices)),
        };

        // === Graphiques (dépend des KPIs) ===
        let charts = match (&prices, &metrics, modules.charts) {
            (_, _, false) => SectionOutcome::Disabled,
            (SectionOutcome::Ready(series), SectionOutcome::Ready(key), true) => {
                SectionOutcome::from_result(
                    Component::ChartRenderer,
                    self.renderer.render(series, &key.series),
                )
            }
            (_, _, true) => SectionOutcome::Skipped(upstream_reason(Component::KpiEngine, &metrics)),
        };

        // === News (indépendant des cours) ===
        let news = if modules.news {
            SectionOutcome::from_result(Component::NewsFetcher, self.fetch_news(request).await)
        } else {
            SectionOutcome::Disabled
        };

        // === Sentiment (dépend des news) ===
        let sentiment = match (&news, modules.sentiment) {
            (_, false) => SectionOutcome::Disabled,
            (SectionOutcome::Ready(items), true) => SectionOutcome::from_result(
                Component::SentimentClassifier,
                self.classifier.classify_articles(items).await,
            ),
            (_, true) => SectionOutcome::Skipped(upstream_reason(Component::NewsFetcher, &news)),
        };

        let report = DashboardReport {
            request: request.clone(),
            symbol,
            generated_at: Utc::now(),
            prices,
            metrics,
            charts,
            news,
            sentiment,
        };

        info!(
            report = %report,
            failures = report.failures().len(),
            cache_hits = self.price_cache.hits() + self.news_cache.hits(),
            "Dashboard request finished"
        );
        report
    }

    /// Cours via le cache ; la validation précède le cache et le réseau
    async fn fetch_prices(&mut self, request: &DashboardRequest) -> Result<Arc<PriceSeries>> {
        let symbol = validate_request(&request.ticker, request.period, request.interval)?;
        let key = CacheKey::new(
            OP_FETCH_PRICES,
            [
                symbol.clone(),
                request.period.to_string(),
                request.interval.to_string(),
            ],
        );

        let market = Arc::clone(&self.market);
        let (period, interval) = (request.period, request.interval);
        self.price_cache
            .get_or_compute(key, || market.fetch(&symbol, period, interval))
            .await
    }

    /// News via le cache, sur la fenêtre [aujourd'hui - période, aujourd'hui]
    async fn fetch_news(&mut self, request: &DashboardRequest) -> Result<Arc<Vec<NewsItem>>> {
        let symbol = request.ticker.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DashboardError::InvalidInput("le ticker est vide".to_string()));
        }

        let limit = request.news_limit.clamp(MIN_NEWS_LIMIT, MAX_NEWS_LIMIT);
        let key = CacheKey::new(
            OP_FETCH_NEWS,
            [symbol.clone(), request.period.to_string(), limit.to_string()],
        );

        let today = Utc::now().date_naive();
        let from = today - Duration::days(request.period.lookback_days(today));

        let news = Arc::clone(&self.news);
        self.news_cache
            .get_or_compute(key, || news.fetch_range(&symbol, from, today, limit))
            .await
    }

    /// Fin de session : vide les caches (le modèle est libéré avec la Session)
    pub fn clear(&mut self) {
        info!(
            prices = self.price_cache.len(),
            news = self.news_cache.len(),
            "Clearing session"
        );
        self.price_cache.clear();
        self.news_cache.clear();
    }
}

/// Raison affichée pour une section non exécutée
fn upstream_reason<T>(upstream: Component, outcome: &SectionOutcome<T>) -> String {
    match outcome {
        SectionOutcome::Disabled => format!("{} est désactivé", upstream),
        SectionOutcome::Skipped(reason) => reason.clone(),
        SectionOutcome::Failed(failure) => format!("{} a échoué", failure.component),
        SectionOutcome::Ready(_) => format!("{} indisponible", upstream),
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BoxFuture;
    use crate::models::{SentimentScores, Signal, OHLC};
    use crate::sentiment::SentimentModel;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // --- Stubs ---

    struct StubMarket {
        calls: AtomicUsize,
        rows: usize,
        error: Option<DashboardError>,
    }

    impl StubMarket {
        fn with_rows(rows: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rows,
                error: None,
            })
        }

        fn failing(error: DashboardError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rows: 0,
                error: Some(error),
            })
        }
    }

    impl MarketDataProvider for StubMarket {
        fn fetch<'a>(
            &'a self,
            ticker: &'a str,
            period: Period,
            interval: Interval,
        ) -> BoxFuture<'a, Result<PriceSeries>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(error) = &self.error {
                    return Err(error.clone());
                }
                let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
                let candles = (0..self.rows)
                    .map(|i| {
                        let close = 100.0 + i as f64;
                        OHLC::new(start + Duration::days(i as i64), close, close, close, close, 1)
                    })
                    .collect();
                Ok(PriceSeries::new(
                    ticker.to_string(),
                    "USD".to_string(),
                    period,
                    interval,
                    candles,
                ))
            })
        }
    }

    struct StubNews {
        calls: AtomicUsize,
        headlines: Vec<&'static str>,
        error: Option<DashboardError>,
    }

    impl StubNews {
        fn with(headlines: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                headlines,
                error: None,
            })
        }

        fn failing(error: DashboardError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                headlines: Vec::new(),
                error: Some(error),
            })
        }
    }

    impl NewsProvider for StubNews {
        fn fetch_range<'a>(
            &'a self,
            _ticker: &'a str,
            _from: NaiveDate,
            _to: NaiveDate,
            limit: usize,
        ) -> BoxFuture<'a, Result<Vec<NewsItem>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(error) = &self.error {
                    return Err(error.clone());
                }
                Ok(self
                    .headlines
                    .iter()
                    .take(limit)
                    .map(|h| NewsItem {
                        headline: h.to_string(),
                        summary: "No summary available".to_string(),
                        source: "Reuters".to_string(),
                        published_at: None,
                        url: "No link available".to_string(),
                    })
                    .collect())
            })
        }
    }

    struct UpbeatModel;

    impl SentimentModel for UpbeatModel {
        fn name(&self) -> &str {
            "upbeat"
        }

        fn score<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<SentimentScores>>> {
            Box::pin(async move {
                Ok(texts.iter().map(|_| SentimentScores::new(0.7, 0.2, 0.1)).collect())
            })
        }
    }

    struct StubLoader;

    impl ModelLoader for StubLoader {
        fn load<'a>(&'a self) -> BoxFuture<'a, Result<Arc<dyn SentimentModel>>> {
            Box::pin(async { Ok(Arc::new(UpbeatModel) as Arc<dyn SentimentModel>) })
        }
    }

    fn request() -> DashboardRequest {
        DashboardRequest::new("aapl", Period::ThreeMonths, Interval::D1)
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_full_run_all_sections_ready() {
        let market = StubMarket::with_rows(60);
        let news = StubNews::with(vec!["Strong iPhone sales", "Record services revenue"]);
        let mut session = Session::new(market.clone(), news.clone(), Arc::new(StubLoader));

        let report = session.run(&request()).await;

        assert_eq!(report.symbol, "AAPL");
        assert!(report.failures().is_empty());
        assert_eq!(report.prices.ready().unwrap().len(), 60);
        let metrics = report.metrics.ready().unwrap();
        assert!(metrics.summary.latest_sma_long.is_some());
        assert!(report.charts.is_ready());
        assert_eq!(report.news.ready().unwrap().len(), 2);

        let sentiment = report.sentiment.ready().unwrap();
        assert_eq!(sentiment.signal, Signal::Buy);
        assert_eq!(sentiment.counts.buy, 2);
    }

    #[tokio::test]
    async fn test_repeated_request_hits_cache() {
        let market = StubMarket::with_rows(10);
        let news = StubNews::with(vec!["Headline"]);
        let mut session = Session::new(market.clone(), news.clone(), Arc::new(StubLoader));

        session.run(&request()).await;
        session.run(&request()).await;
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);
        assert_eq!(news.calls.load(Ordering::SeqCst), 1);

        // Autre période : nouvelle entrée
        let other = DashboardRequest::new("AAPL", Period::OneYear, Interval::D1);
        session.run(&other).await;
        assert_eq!(market.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.cache_sizes(), (2, 2));

        session.clear();
        assert_eq!(session.cache_sizes(), (0, 0));
    }

    #[tokio::test]
    async fn test_price_failure_skips_downstream_but_not_news() {
        let market = StubMarket::failing(DashboardError::DataUnavailable("ZZZZ".into()));
        let news = StubNews::with(vec!["Headline"]);
        let mut session = Session::new(market, news, Arc::new(StubLoader));

        let report = session.run(&request()).await;

        let failure = report.prices.failure().unwrap();
        assert_eq!(failure.component, Component::DataFetcher);
        assert!(failure.to_string().starts_with("Market Data"));
        assert!(matches!(report.metrics, SectionOutcome::Skipped(_)));
        assert!(matches!(report.charts, SectionOutcome::Skipped(_)));
        assert!(report.news.is_ready());
        assert!(report.sentiment.is_ready());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_resubmit() {
        let market = StubMarket::failing(DashboardError::provider("yahoo", "timeout"));
        let mut session = Session::new(market.clone(), StubNews::with(vec![]), Arc::new(StubLoader));

        session.run(&request()).await;
        session.run(&request()).await;
        assert_eq!(market.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_news_auth_failure_skips_sentiment() {
        let news = StubNews::failing(DashboardError::authentication("finnhub", "clé absente"));
        let mut session = Session::new(StubMarket::with_rows(5), news, Arc::new(StubLoader));

        let report = session.run(&request()).await;

        let failure = report.news.failure().unwrap();
        assert_eq!(failure.component, Component::NewsFetcher);
        assert!(matches!(failure.error, DashboardError::AuthenticationError { .. }));
        assert!(matches!(report.sentiment, SectionOutcome::Skipped(_)));
        assert!(report.prices.is_ready());
        assert!(!session.sentiment_model_loaded());
    }

    #[tokio::test]
    async fn test_empty_news_gives_neutral_hold() {
        let mut session = Session::new(
            StubMarket::with_rows(5),
            StubNews::with(vec![]),
            Arc::new(StubLoader),
        );

        let report = session.run(&request()).await;
        let sentiment = report.sentiment.ready().unwrap();

        assert!(report.news.ready().unwrap().is_empty());
        assert_eq!(sentiment.signal, Signal::Hold);
        assert_eq!(sentiment.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_single_row_is_insufficient_data() {
        let mut session = Session::new(
            StubMarket::with_rows(1),
            StubNews::with(vec![]),
            Arc::new(StubLoader),
        );

        let report = session.run(&request()).await;

        let failure = report.metrics.failure().unwrap();
        assert_eq!(failure.component, Component::KpiEngine);
        assert!(matches!(failure.error, DashboardError::InsufficientData { .. }));
        assert!(matches!(report.charts, SectionOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_provider() {
        let market = StubMarket::with_rows(5);
        let mut session = Session::new(market.clone(), StubNews::with(vec![]), Arc::new(StubLoader));

        let request = DashboardRequest::new("AAPL", Period::FiveYears, Interval::M5);
        let report = session.run(&request).await;

        assert!(matches!(
            report.prices.failure().map(|f| &f.error),
            Some(DashboardError::InvalidInput(_))
        ));
        assert_eq!(market.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_modules() {
        let market = StubMarket::with_rows(5);
        let news = StubNews::with(vec!["Headline"]);
        let mut session = Session::new(market.clone(), news.clone(), Arc::new(StubLoader));

        let modules = ModuleToggles {
            market_data: false,
            news: false,
            ..ModuleToggles::default()
        };
        let report = session.run(&request().with_modules(modules)).await;

        assert_eq!(report.prices, SectionOutcome::Disabled);
        assert!(matches!(report.metrics, SectionOutcome::Skipped(_)));
        assert_eq!(report.news, SectionOutcome::Disabled);
        assert!(matches!(report.sentiment, SectionOutcome::Skipped(_)));
        assert_eq!(market.calls.load(Ordering::SeqCst), 0);
        assert_eq!(news.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_news_limit_clamped() {
        assert_eq!(request().news_limit, 5);
        assert_eq!(request().with_news_limit(0).news_limit, 1);
        assert_eq!(request().with_news_limit(50).news_limit, 20);
    }
}
