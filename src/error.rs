// ============================================================================
// Erreurs : taxonomie du tableau de bord
// ============================================================================
// Chaque composant (fetchers, KPIs, graphiques, sentiment) retourne
// Result<T, DashboardError>. L'orchestrateur (session.rs) attrape ces erreurs
// et les transforme en ComponentFailure affichée à l'utilisateur.
//
// CONCEPTS RUST :
// 1. thiserror : dérive Display + std::error::Error à partir d'attributs
// 2. Enums avec données : chaque variant porte le contexte de l'échec
// 3. Pas de retry : une erreur remonte telle quelle jusqu'à l'UI
// ============================================================================

use std::fmt;

use thiserror::Error;

/// Erreurs retournées par les composants de la bibliothèque
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DashboardError {
    /// Ticker inconnu ou aucune ligne retournée par le fournisseur
    #[error("aucune donnée disponible : {0}")]
    DataUnavailable(String),

    /// Échec réseau, statut HTTP inattendu ou réponse mal formée
    #[error("erreur du fournisseur {provider} : {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
    },

    /// Clé API absente ou refusée
    #[error("authentification refusée par {provider} : {message}")]
    AuthenticationError {
        provider: &'static str,
        message: String,
    },

    /// Pas assez d'observations pour calculer les rendements
    #[error("données insuffisantes : {observations} observation(s), minimum {required}")]
    InsufficientData { observations: usize, required: usize },

    /// Entrées du rendu vides ou incohérentes, ou export impossible
    #[error("rendu impossible : {0}")]
    RenderError(String),

    /// Le modèle de sentiment n'a pas pu être chargé
    #[error("modèle de sentiment indisponible : {0}")]
    ModelUnavailable(String),

    /// Paramètres refusés avant tout appel externe (ticker vide, combinaison période/intervalle)
    #[error("requête invalide : {0}")]
    InvalidInput(String),
}

impl DashboardError {
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
        }
    }

    pub fn authentication(provider: &'static str, message: impl Into<String>) -> Self {
        Self::AuthenticationError {
            provider,
            message: message.into(),
        }
    }

    /// Nom court du variant, utilisé comme champ structuré dans les logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "DataUnavailable",
            Self::ProviderError { .. } => "ProviderError",
            Self::AuthenticationError { .. } => "AuthenticationError",
            Self::InsufficientData { .. } => "InsufficientData",
            Self::RenderError(_) => "RenderError",
            Self::ModelUnavailable(_) => "ModelUnavailable",
            Self::InvalidInput(_) => "InvalidInput",
        }
    }
}

/// Composants du pipeline, pour nommer la source d'un échec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    DataFetcher,
    KpiEngine,
    ChartRenderer,
    NewsFetcher,
    SentimentClassifier,
}

impl Component {
    pub fn label(&self) -> &'static str {
        match self {
            Component::DataFetcher => "Market Data",
            Component::KpiEngine => "Key Metrics",
            Component::ChartRenderer => "Technical Analysis",
            Component::NewsFetcher => "Market News",
            Component::SentimentClassifier => "Market Sentiment",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Échec d'un composant tel qu'affiché par l'orchestrateur
///
/// CONCEPT : Frontière d'erreur
/// - Les composants ne savent pas comment leurs erreurs seront affichées
/// - L'orchestrateur ajoute le nom du composant fautif
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{component} : {error}")]
pub struct ComponentFailure {
    pub component: Component,
    pub error: DashboardError,
}

impl ComponentFailure {
    pub fn new(component: Component, error: DashboardError) -> Self {
        Self { component, error }
    }
}

/// Alias pratique pour les composants de la bibliothèque
pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_failure_names_component() {
        let failure = ComponentFailure::new(
            Component::NewsFetcher,
            DashboardError::authentication("finnhub", "FINNHUB_API_KEY manquante"),
        );

        let message = failure.to_string();
        assert!(message.starts_with("Market News"));
        assert!(message.contains("FINNHUB_API_KEY"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(DashboardError::RenderError("vide".into()).kind(), "RenderError");
        assert_eq!(
            DashboardError::InsufficientData { observations: 1, required: 2 }.kind(),
            "InsufficientData"
        );
    }
}
