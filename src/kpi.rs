// ============================================================================
// KpiEngine : indicateurs techniques
// ============================================================================
// Calcule à partir d'une PriceSeries :
// - le rendement journalier   r_t = close_t / close_{t-1} - 1
// - deux moyennes mobiles simples (SMA 20 et SMA 50 par défaut)
// - la volatilité annualisée (écart-type des rendements × √périodes/an)
// - moyenne / max / min des clôtures
//
// Les valeurs non définies (première ligne, fenêtre incomplète) valent None :
// pas de backfill, pas d'extrapolation.
// ============================================================================

use tracing::{debug, instrument};

use crate::error::{DashboardError, Result};
use crate::models::{MetricsRow, MetricsSeries, MetricsSummary, PriceSeries};

pub const DEFAULT_SHORT_WINDOW: usize = 20;
pub const DEFAULT_LONG_WINDOW: usize = 50;

/// Moteur de calcul des KPIs
///
/// CONCEPT RUST : Struct "config" Copy
/// - Ne contient que les tailles de fenêtres
/// - compute() ne modifie rien : &self suffit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiEngine {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for KpiEngine {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
        }
    }
}

impl KpiEngine {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window,
            long_window,
        }
    }

    /// Calcule le résumé et la table des métriques
    ///
    /// # Erreurs
    /// * `InsufficientData` - moins de 2 observations (aucun rendement calculable)
    /// * `InvalidInput` - fenêtre de taille 0, ou clôture <= 0
    #[instrument(skip(self, series), fields(symbol = %series.symbol, rows = series.len()))]
    pub fn compute(&self, series: &PriceSeries) -> Result<(MetricsSummary, MetricsSeries)> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(DashboardError::InvalidInput(
                "la taille d'une fenêtre SMA doit être >= 1".to_string(),
            ));
        }

        if series.len() < 2 {
            return Err(DashboardError::InsufficientData {
                observations: series.len(),
                required: 2,
            });
        }

        let closes = series.closes();

        // Une clôture nulle ou négative rendrait un rendement indéfini au milieu de la série
        if let Some(bad) = closes.iter().find(|c| !c.is_finite() || **c <= 0.0) {
            return Err(DashboardError::InvalidInput(format!(
                "prix de clôture invalide : {} (doit être > 0)",
                bad
            )));
        }

        let returns = daily_returns(&closes);
        let sma_short = simple_moving_average(&closes, self.short_window);
        let sma_long = simple_moving_average(&closes, self.long_window);

        // CONCEPT RUST : zip de plusieurs itérateurs
        // - Toutes les colonnes ont la longueur de la série source
        let rows: Vec<MetricsRow> = series
            .candles()
            .iter()
            .zip(returns.iter())
            .zip(sma_short.iter().zip(sma_long.iter()))
            .map(|((candle, &daily_return), (&short, &long))| MetricsRow {
                timestamp: candle.timestamp,
                close: candle.close,
                daily_return,
                sma_short: short,
                sma_long: long,
            })
            .collect();

        let defined_returns: Vec<f64> = returns.iter().filter_map(|r| *r).collect();
        let daily_volatility = sample_std_dev(&defined_returns);
        let volatility = daily_volatility.map(|std| std * series.interval.periods_per_year().sqrt());

        let n = closes.len() as f64;
        let avg_close = closes.iter().sum::<f64>() / n;
        let max_close = closes.iter().copied().fold(f64::MIN, f64::max);
        let min_close = closes.iter().copied().fold(f64::MAX, f64::min);

        let first_close = closes[0];
        let last_close = closes[closes.len() - 1];
        let total_return = if first_close != 0.0 {
            Some(last_close / first_close - 1.0)
        } else {
            None
        };

        let summary = MetricsSummary {
            short_window: self.short_window,
            long_window: self.long_window,
            latest_sma_short: sma_short.last().copied().flatten(),
            latest_sma_long: sma_long.last().copied().flatten(),
            volatility,
            daily_volatility,
            avg_close,
            max_close,
            min_close,
            last_close,
            last_return: returns.last().copied().flatten(),
            total_return,
        };

        debug!(
            volatility = ?summary.volatility,
            sma_short = ?summary.latest_sma_short,
            sma_long = ?summary.latest_sma_long,
            "KPIs computed"
        );

        let metrics = MetricsSeries {
            short_window: self.short_window,
            long_window: self.long_window,
            rows,
        };

        Ok((summary, metrics))
    }
}

/// Rendements journaliers ; None pour la première observation
///
/// Une clôture précédente à 0 donne aussi None (compute() refuse ces séries en amont).
pub fn daily_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return returns;
    }

    returns.push(None);
    returns.extend(closes.windows(2).map(|pair| {
        if pair[0] == 0.0 {
            None
        } else {
            Some(pair[1] / pair[0] - 1.0)
        }
    }));
    returns
}

/// Moyenne mobile simple sur `window` observations (None tant que la fenêtre n'est pas pleine)
pub fn simple_moving_average(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|t| {
            if window == 0 || t + 1 < window {
                None
            } else {
                let slice = &closes[t + 1 - window..=t];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

/// Écart-type d'échantillon (n - 1) ; None avec moins de 2 valeurs
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

// ============================================================================
// Tests unitaires
// ============================================================================
