// ============================================================================
// Module : api
// ============================================================================
// Clients des services externes :
// - Yahoo Finance (cours OHLCV)
// - Finnhub (news d'entreprise)
// - Hugging Face Inference (modèle FinBERT)
//
// CONCEPT RUST : Traits "object-safe" avec futures boxées
// - Un trait avec `async fn` n'est pas utilisable en `dyn Trait`
// - On retourne donc Pin<Box<dyn Future>> : la Session peut stocker
//   un Arc<dyn MarketDataProvider> et les tests lui passer un stub
// ============================================================================

use std::future::Future;
use std::pin::Pin;

pub mod finbert; // Client Hugging Face (SentimentModel)
pub mod finnhub; // Client API Finnhub
pub mod yahoo;   // Client API Yahoo Finance

/// Future boxée retournée par les traits de fournisseurs
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Re-export des types principaux
pub use finbert::{FinBertLoader, FinBertModel};
pub use finnhub::{FinnhubClient, NewsProvider};
pub use yahoo::{MarketDataProvider, YahooClient};

/// Construit le client HTTP partagé par les fournisseurs
///
/// Le User-Agent navigateur évite le blocage par Yahoo.
pub(crate) fn http_client(
    provider: &'static str,
    timeout: std::time::Duration,
) -> crate::error::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .timeout(timeout)
        .build()
        .map_err(|e| {
            crate::error::DashboardError::provider(
                provider,
                format!("échec de la création du client HTTP : {}", e),
            )
        })
}
