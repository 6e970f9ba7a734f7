// ============================================================================
// MarketMetrics - Library
// ============================================================================
// Expose les composants du tableau de bord pour le binaire et les tests
// ============================================================================

pub mod api;       // Fournisseurs : Yahoo Finance, Finnhub, FinBERT
pub mod app;       // État de l'application TUI
pub mod cache;     // Mémoïsation par session
pub mod charts;    // Figures Price / SMA / Returns
pub mod cli;       // Arguments clap
pub mod config;    // Variables d'environnement
pub mod error;     // DashboardError, ComponentFailure
pub mod kpi;       // SMA, rendements, volatilité
pub mod models;    // Structures de données
pub mod report;    // Rapport texte
pub mod sentiment; // Classifieur et agrégation BUY / HOLD / SELL
pub mod session;   // Orchestrateur d'une requête
pub mod ui;        // Interface utilisateur
