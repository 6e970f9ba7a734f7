// ============================================================================
// Structures : MetricsSummary, MetricsRow, MetricsSeries
// ============================================================================
// Résultats du KpiEngine : un résumé scalaire + une table alignée sur les cours
//
// CONCEPT RUST : Option<f64> pour "pas de valeur"
// - Une SMA dont la fenêtre n'est pas pleine vaut None (pas NaN, pas 0)
// - Le compilateur force l'appelant à gérer l'absence de valeur
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Une ligne de la table des métriques, alignée sur une chandelle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    /// Rendement journalier (None pour la première ligne)
    pub daily_return: Option<f64>,
    /// SMA courte (None tant que la fenêtre n'est pas pleine)
    pub sma_short: Option<f64>,
    /// SMA longue (None tant que la fenêtre n'est pas pleine)
    pub sma_long: Option<f64>,
}

/// Table des métriques, même longueur et mêmes dates que la PriceSeries source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSeries {
    pub short_window: usize,
    pub long_window: usize,
    pub rows: Vec<MetricsRow>,
}

impl MetricsSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&MetricsRow> {
        self.rows.last()
    }

    /// Rendements définis uniquement
    pub fn defined_returns(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().filter_map(|row| row.daily_return)
    }
}

/// Résumé scalaire des KPIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub short_window: usize,
    pub long_window: usize,
    pub latest_sma_short: Option<f64>,
    pub latest_sma_long: Option<f64>,
    /// Volatilité annualisée (écart-type des rendements × √périodes/an)
    pub volatility: Option<f64>,
    /// Écart-type des rendements, non annualisé
    pub daily_volatility: Option<f64>,
    pub avg_close: f64,
    pub max_close: f64,
    pub min_close: f64,
    pub last_close: f64,
    pub last_return: Option<f64>,
    /// Variation totale sur la période (last / first - 1)
    pub total_return: Option<f64>,
}

impl MetricsSummary {
    /// Retourne les métriques sous forme de paires (nom, valeur)
    ///
    /// CONCEPT : Vue "mapping nom → valeur"
    /// - Les métriques non définies sont omises
    /// - Les noms des SMA incluent la taille de fenêtre (ex: "sma_20")
    pub fn entries(&self) -> Vec<(String, f64)> {
        let entries = vec![
            ("avg_close".to_string(), Some(self.avg_close)),
            ("max_close".to_string(), Some(self.max_close)),
            ("min_close".to_string(), Some(self.min_close)),
            ("last_close".to_string(), Some(self.last_close)),
            ("last_return".to_string(), self.last_return),
            ("total_return".to_string(), self.total_return),
            (format!("sma_{}", self.short_window), self.latest_sma_short),
            (format!("sma_{}", self.long_window), self.latest_sma_long),
            ("volatility".to_string(), self.volatility),
            ("daily_volatility".to_string(), self.daily_volatility),
        ];

        entries
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect()
    }

    /// Cherche une métrique par son nom
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
