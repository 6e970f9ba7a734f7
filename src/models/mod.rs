// ============================================================================
// Module : models
// ============================================================================
// Structures de données partagées par tous les composants
// ============================================================================

pub mod metrics;   // Résultats du KpiEngine
pub mod news;      // Articles de presse
pub mod ohlc;      // Cours OHLCV, périodes et intervalles
pub mod sentiment; // Signal BUY/HOLD/SELL

// Re-exports pour simplifier les imports
pub use metrics::{MetricsRow, MetricsSeries, MetricsSummary};
pub use news::NewsItem;
pub use ohlc::{Interval, Period, PriceSeries, OHLC};
pub use sentiment::{
    ArticleSentiment, RawLabel, SentimentResult, SentimentScores, Signal, SignalCounts,
};
