// ============================================================================
// ChartRenderer : préparation des trois graphiques
// ============================================================================
// Transforme PriceSeries + MetricsSeries en figures statiques :
// - price   : clôture + SMA courte + SMA longue
// - sma     : SMA courte + SMA longue seules
// - returns : rendement journalier
//
// Une figure ne contient que des points (x = index de ligne, y = valeur),
// des bornes avec 5% de marge et des labels de dates. Le dessin est fait
// par ui::chart (ratatui), l'export par serde_json.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{DashboardError, Result};
use crate::models::{MetricsSeries, PriceSeries};

/// Marge ajoutée autour des valeurs extrêmes (5%)
const MARGIN_RATIO: f64 = 0.05;

/// Type de figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Price,
    Sma,
    Returns,
}

impl ChartKind {
    pub fn all() -> [ChartKind; 3] {
        [ChartKind::Price, ChartKind::Sma, ChartKind::Returns]
    }

    /// Nom du fichier d'export
    pub fn file_name(&self) -> &'static str {
        match self {
            ChartKind::Price => "price.json",
            ChartKind::Sma => "sma.json",
            ChartKind::Returns => "returns.json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Price => "Price",
            ChartKind::Sma => "Moving Averages",
            ChartKind::Returns => "Daily Returns",
        }
    }
}

/// Rôle d'une série (l'UI choisit la couleur en fonction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesRole {
    Close,
    SmaShort,
    SmaLong,
    DailyReturn,
}

/// Une courbe d'une figure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureSeries {
    pub name: String,
    pub role: SeriesRole,
    /// Points (index de ligne, valeur) ; les valeurs non définies sont omises
    pub points: Vec<(f64, f64)>,
}

/// Figure prête à dessiner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFigure {
    pub kind: ChartKind,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    /// Dates affichées sous l'axe X (première, milieu, dernière)
    pub x_labels: Vec<String>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub series: Vec<FigureSeries>,
}

impl ChartFigure {
    /// true si au moins une courbe a des points
    pub fn has_points(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }

    /// Labels de l'axe Y (min, milieu, max)
    pub fn y_labels(&self, precision: usize) -> [String; 3] {
        let [min, max] = self.y_bounds;
        [
            format!("{:.*}", precision, min),
            format!("{:.*}", precision, (min + max) / 2.0),
            format!("{:.*}", precision, max),
        ]
    }
}

/// Les trois figures d'une requête
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    pub price: ChartFigure,
    pub sma: ChartFigure,
    pub returns: ChartFigure,
}

impl ChartSet {
    pub fn get(&self, kind: ChartKind) -> &ChartFigure {
        match kind {
            ChartKind::Price => &self.price,
            ChartKind::Sma => &self.sma,
            ChartKind::Returns => &self.returns,
        }
    }

    /// Écrit chaque figure en JSON dans `dir` et retourne les chemins écrits
    ///
    /// # Erreurs
    /// * `RenderError` - création du dossier, sérialisation ou écriture impossible
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| {
            DashboardError::RenderError(format!(
                "impossible de créer le dossier {} : {}",
                dir.display(),
                e
            ))
        })?;

        let mut written = Vec::with_capacity(3);
        for kind in ChartKind::all() {
            let path = dir.join(kind.file_name());
            let json = serde_json::to_string_pretty(self.get(kind)).map_err(|e| {
                DashboardError::RenderError(format!("sérialisation de {:?} : {}", kind, e))
            })?;
            fs::write(&path, json).map_err(|e| {
                DashboardError::RenderError(format!(
                    "écriture de {} impossible : {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(path = %path.display(), "Exported chart");
            written.push(path);
        }

        info!(files = written.len(), "Charts exported");
        Ok(written)
    }
}

/// Prépare les figures à partir des cours et des métriques
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Construit les trois figures
    ///
    /// # Erreurs
    /// * `RenderError` - série vide ou métriques non alignées sur les cours
    #[instrument(skip(self, series, metrics), fields(symbol = %series.symbol, rows = series.len()))]
    pub fn render(&self, series: &PriceSeries, metrics: &MetricsSeries) -> Result<ChartSet> {
        if series.is_empty() || metrics.is_empty() {
            return Err(DashboardError::RenderError(
                "aucune donnée à afficher".to_string(),
            ));
        }

        if series.len() != metrics.len() {
            return Err(DashboardError::RenderError(format!(
                "{} lignes de métriques pour {} cours",
                metrics.len(),
                series.len()
            )));
        }

        // CONCEPT RUST : Iterator::all + zip
        // - Vérifie l'alignement ligne à ligne sans allocation
        let aligned = series
            .candles()
            .iter()
            .zip(metrics.rows.iter())
            .all(|(candle, row)| candle.timestamp == row.timestamp);
        if !aligned {
            return Err(DashboardError::RenderError(
                "les dates des métriques ne correspondent pas aux cours".to_string(),
            ));
        }

        let x_labels = date_labels(series);
        let x_bounds = [0.0, (series.len().max(2) - 1) as f64];
        let currency = series.currency.as_str();

        let close = FigureSeries {
            name: format!("{} Close", series.symbol),
            role: SeriesRole::Close,
            points: collect_points(metrics.rows.iter().map(|row| Some(row.close))),
        };
        let sma_short = FigureSeries {
            name: format!("SMA {}", metrics.short_window),
            role: SeriesRole::SmaShort,
            points: collect_points(metrics.rows.iter().map(|row| row.sma_short)),
        };
        let sma_long = FigureSeries {
            name: format!("SMA {}", metrics.long_window),
            role: SeriesRole::SmaLong,
            points: collect_points(metrics.rows.iter().map(|row| row.sma_long)),
        };
        let returns = FigureSeries {
            name: "Daily Return".to_string(),
            role: SeriesRole::DailyReturn,
            points: collect_points(metrics.rows.iter().map(|row| row.daily_return)),
        };

        let price_series = vec![close, sma_short.clone(), sma_long.clone()];
        let price = ChartFigure {
            kind: ChartKind::Price,
            title: format!("{} Closing Price", series.symbol),
            x_title: "Date".to_string(),
            y_title: format!("Price ({})", currency),
            x_labels: x_labels.clone(),
            x_bounds,
            y_bounds: value_bounds(&price_series, true),
            series: price_series,
        };

        let sma_series = vec![sma_short, sma_long];
        let sma = ChartFigure {
            kind: ChartKind::Sma,
            title: format!(
                "{} SMA {} / SMA {}",
                series.symbol, metrics.short_window, metrics.long_window
            ),
            x_title: "Date".to_string(),
            y_title: format!("Price ({})", currency),
            x_labels: x_labels.clone(),
            x_bounds,
            y_bounds: value_bounds(&sma_series, true),
            series: sma_series,
        };

        let returns_series = vec![returns];
        let returns = ChartFigure {
            kind: ChartKind::Returns,
            title: format!("{} Daily Returns", series.symbol),
            x_title: "Date".to_string(),
            y_title: "Return".to_string(),
            x_labels,
            x_bounds,
            y_bounds: value_bounds(&returns_series, false),
            series: returns_series,
        };

        debug!(
            price_points = price.series[0].points.len(),
            returns_points = returns.series[0].points.len(),
            "Charts prepared"
        );

        Ok(ChartSet { price, sma, returns })
    }
}

/// Convertit une colonne en points (index, valeur), en sautant les None
fn collect_points<I>(values: I) -> Vec<(f64, f64)>
where
    I: Iterator<Item = Option<f64>>,
{
    values
        .enumerate()
        .filter_map(|(i, value)| value.map(|v| (i as f64, v)))
        .collect()
}

/// Bornes Y avec 5% de marge
///
/// `non_negative` : un prix ne descend pas sous 0 (un rendement si).
fn value_bounds(series: &[FigureSeries], non_negative: bool) -> [f64; 2] {
    // Calcule min et max en un seul passage
    let (min, max) = series
        .iter()
        .flat_map(|s| s.points.iter())
        .fold((f64::MAX, f64::MIN), |(min, max), &(_x, y)| {
            (min.min(y), max.max(y))
        });

    if min > max {
        return [0.0, 1.0];
    }

    let spread = max - min;
    let margin = if spread > 0.0 {
        spread * MARGIN_RATIO
    } else if min != 0.0 {
        min.abs() * MARGIN_RATIO
    } else {
        1.0
    };

    let lower = if non_negative {
        (min - margin).max(0.0)
    } else {
        min - margin
    };
    [lower, max + margin]
}

/// Labels de dates : première, milieu, dernière chandelle
fn date_labels(series: &PriceSeries) -> Vec<String> {
    let candles = series.candles();
    let format = series.interval.date_format();
    let mut indices = vec![0, candles.len() / 2, candles.len().saturating_sub(1)];
    indices.dedup();

    indices
        .into_iter()
        .filter_map(|i| candles.get(i))
        .map(|c| c.timestamp.format(format).to_string())
        .collect()
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::KpiEngine;
    use crate::models::{Interval, Period, OHLC};
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OHLC::new(start + Duration::days(i as i64), c, c, c, c, 10))
            .collect();
        PriceSeries::new(
            "MSFT".to_string(),
            "USD".to_string(),
            Period::ThreeMonths,
            Interval::D1,
            candles,
        )
    }

    fn render(closes: &[f64]) -> ChartSet {
        let series = series(closes);
        let (_, metrics) = KpiEngine::default().compute(&series).unwrap();
        ChartRenderer::new().render(&series, &metrics).unwrap()
    }

    #[test]
    fn test_three_figures_with_expected_series() {
        let closes: Vec<f64> = (1..=60).map(f64::from).collect();
        let charts = render(&closes);

        assert_eq!(charts.price.series.len(), 3);
        assert_eq!(charts.sma.series.len(), 2);
        assert_eq!(charts.returns.series.len(), 1);

        // Close : 60 points, SMA 20 : 41 points, SMA 50 : 11 points
        assert_eq!(charts.price.series[0].points.len(), 60);
        assert_eq!(charts.price.series[1].points.len(), 41);
        assert_eq!(charts.price.series[2].points.len(), 11);
        assert_eq!(charts.returns.series[0].points.len(), 59);
        assert_eq!(charts.returns.series[0].points[0].0, 1.0);
        assert_eq!(charts.price.x_bounds, [0.0, 59.0]);
    }

    #[test]
    fn test_bounds_have_margin() {
        let charts = render(&[100.0, 110.0, 120.0]);
        let [low, high] = charts.price.y_bounds;

        assert!((low - 99.0).abs() < 1e-9);
        assert!((high - 121.0).abs() < 1e-9);
        assert!(charts.returns.y_bounds[0] < charts.returns.y_bounds[1]);
    }

    #[test]
    fn test_short_series_has_empty_sma_figure() {
        let charts = render(&[10.0, 11.0, 12.0]);
        assert!(!charts.sma.has_points());
        assert_eq!(charts.sma.y_bounds, [0.0, 1.0]);
        assert!(charts.price.has_points());
    }

    #[test]
    fn test_date_labels() {
        let charts = render(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(
            charts.price.x_labels,
            vec!["2024-03-01", "2024-03-03", "2024-03-05"]
        );
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let long = series(&[1.0, 2.0, 3.0, 4.0]);
        let short = series(&[1.0, 2.0, 3.0]);
        let (_, metrics) = KpiEngine::default().compute(&short).unwrap();

        let result = ChartRenderer::new().render(&long, &metrics);
        assert!(matches!(result, Err(DashboardError::RenderError(_))));
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty = series(&[]);
        let metrics = MetricsSeries {
            short_window: 20,
            long_window: 50,
            rows: Vec::new(),
        };
        assert!(matches!(
            ChartRenderer::new().render(&empty, &metrics),
            Err(DashboardError::RenderError(_))
        ));
    }

    #[test]
    fn test_export_writes_three_files() {
        let charts = render(&[1.0, 2.0, 3.0, 2.5]);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("charts");

        let written = charts.export(&target).unwrap();

        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists());
        }
        let json = std::fs::read_to_string(target.join("price.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "price");
        assert_eq!(value["series"][0]["role"], "close");
    }
}
