// ============================================================================
// Structures : Period, Interval, OHLC, PriceSeries
// ============================================================================
// Représente les données de cours retournées par le DataFetcher
//
// CONCEPTS RUST :
// 1. DateTime<Utc> : type de chrono pour dates avec timezone UTC
// 2. f64 : floating point 64 bits pour les prix (précision suffisante)
// 3. u64 : unsigned 64 bits pour le volume (toujours positif)
// 4. Champs privés : PriceSeries est immuable une fois construite
// ============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// Période totale demandée au fournisseur (paramètre `range` de Yahoo)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl Period {
    /// Convertit la période en string pour l'API Yahoo Finance
    pub fn to_yahoo_string(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }

    /// Retourne le label pour l'affichage
    pub fn label(&self) -> &'static str {
        match self {
            Period::OneDay => "1 Day",
            Period::FiveDays => "5 Days",
            Period::OneMonth => "1 Month",
            Period::ThreeMonths => "3 Months",
            Period::SixMonths => "6 Months",
            Period::OneYear => "1 Year",
            Period::TwoYears => "2 Years",
            Period::FiveYears => "5 Years",
            Period::TenYears => "10 Years",
            Period::YearToDate => "Year to Date",
            Period::Max => "Max",
        }
    }

    /// Durée maximale couverte, en jours calendaires
    ///
    /// Sert à valider les combinaisons période/intervalle acceptées par Yahoo.
    pub fn max_span_days(&self) -> u32 {
        match self {
            Period::OneDay => 1,
            Period::FiveDays => 5,
            Period::OneMonth => 31,
            Period::ThreeMonths => 92,
            Period::SixMonths => 183,
            Period::OneYear => 366,
            Period::TwoYears => 731,
            Period::FiveYears => 1827,
            Period::TenYears => 3653,
            Period::YearToDate => 366,
            Period::Max => u32::MAX,
        }
    }

    /// Nombre de jours en arrière pour la fenêtre de news
    ///
    /// CONCEPT : Fenêtre de news alignée sur la période des cours
    /// - 5d → 5 jours, 1mo → 30 jours, ..., max → 10 ans
    /// - ytd dépend de la date du jour (jours écoulés depuis le 1er janvier)
    pub fn lookback_days(&self, today: NaiveDate) -> i64 {
        match self {
            Period::OneDay => 1,
            Period::FiveDays => 5,
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
            Period::TwoYears => 730,
            Period::FiveYears => 1825,
            Period::TenYears | Period::Max => 3650,
            Period::YearToDate => i64::from(today.ordinal0()).max(1),
        }
    }

    /// Retourne toutes les périodes disponibles (pour UI de sélection)
    pub fn all() -> [Period; 11] {
        [
            Period::OneDay,
            Period::FiveDays,
            Period::OneMonth,
            Period::ThreeMonths,
            Period::SixMonths,
            Period::OneYear,
            Period::TwoYears,
            Period::FiveYears,
            Period::TenYears,
            Period::YearToDate,
            Period::Max,
        ]
    }

    /// Retourne la période suivante (cycle)
    pub fn next(&self) -> Period {
        let all = Self::all();
        let index = all.iter().position(|p| p == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }

    /// Retourne la période précédente (cycle)
    pub fn previous(&self) -> Period {
        let all = Self::all();
        let index = all.iter().position(|p| p == self).unwrap_or(0);
        all[(index + all.len() - 1) % all.len()]
    }
}

impl Default for Period {
    /// Période par défaut : 1 mois
    fn default() -> Self {
        Period::OneMonth
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_yahoo_string())
    }
}

impl FromStr for Period {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.to_yahoo_string().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DashboardError::InvalidInput(format!("période inconnue '{}'", value)))
    }
}

/// Intervalle de temps entre les chandelles
///
/// CONCEPT : Intervalle vs Période
/// - Interval : granularité des chandelles (5m, 1h, 1d, etc.)
/// - Period : période totale demandée (5 jours, 1 mois, etc.)
/// - Yahoo limite l'historique disponible pour les intervalles intraday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1 minute
    M1,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 30 minutes
    M30,
    /// 1 heure
    H1,
    /// 1 jour (daily)
    D1,
    /// 1 semaine (weekly)
    W1,
    /// 1 mois (monthly)
    Mo1,
}

impl Interval {
    /// Convertit l'intervalle en string pour l'API Yahoo Finance
    ///
    /// CONCEPT RUST : &'static str
    /// - Retourne une string littérale (dans le binaire)
    /// - Lifetime 'static : vit pendant toute l'exécution
    pub fn to_yahoo_string(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::D1 => "1d",
            Interval::W1 => "1wk",
            Interval::Mo1 => "1mo",
        }
    }

    /// Retourne le label pour l'affichage
    pub fn label(&self) -> &'static str {
        match self {
            Interval::M1 => "1 Minute",
            Interval::M5 => "5 Minutes",
            Interval::M15 => "15 Minutes",
            Interval::M30 => "30 Minutes",
            Interval::H1 => "1 Hour",
            Interval::D1 => "1 Day",
            Interval::W1 => "1 Week",
            Interval::Mo1 => "1 Month",
        }
    }

    /// Durée d'une chandelle intraday en minutes (None pour D1/W1/Mo1)
    fn intraday_minutes(&self) -> Option<u32> {
        match self {
            Interval::M1 => Some(1),
            Interval::M5 => Some(5),
            Interval::M15 => Some(15),
            Interval::M30 => Some(30),
            Interval::H1 => Some(60),
            Interval::D1 | Interval::W1 | Interval::Mo1 => None,
        }
    }

    /// Retourne true si l'intervalle est intraday
    pub fn is_intraday(&self) -> bool {
        self.intraday_minutes().is_some()
    }

    /// Nombre de périodes de cotation par an, pour annualiser la volatilité
    ///
    /// CONCEPT : Annualisation
    /// - Daily : 252 jours de bourse par an
    /// - Weekly : 52, Monthly : 12
    /// - Intraday : 252 jours × 390 minutes de séance (9h30-16h) / durée de la chandelle
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Interval::D1 => 252.0,
            Interval::W1 => 52.0,
            Interval::Mo1 => 12.0,
            _ => {
                let minutes = self.intraday_minutes().unwrap_or(390);
                252.0 * 390.0 / f64::from(minutes)
            }
        }
    }

    /// Historique maximal accepté par Yahoo pour cet intervalle (None = illimité)
    ///
    /// Limitations Yahoo Finance :
    /// - 1m : 7 jours par requête
    /// - < 1h : 60 derniers jours
    /// - 1h : 730 jours
    fn max_span_days(&self) -> Option<u32> {
        match self {
            Interval::M1 => Some(7),
            Interval::M5 | Interval::M15 | Interval::M30 => Some(60),
            Interval::H1 => Some(731),
            Interval::D1 | Interval::W1 | Interval::Mo1 => None,
        }
    }

    /// Vérifie que la combinaison période/intervalle est acceptée par le fournisseur
    pub fn supports(&self, period: Period) -> bool {
        match self.max_span_days() {
            Some(max) => period.max_span_days() <= max,
            None => true,
        }
    }

    /// Format des dates pour les labels de l'axe X
    pub fn date_format(&self) -> &'static str {
        if self.is_intraday() {
            "%d/%m %H:%M"
        } else {
            "%Y-%m-%d"
        }
    }

    /// Retourne tous les intervalles disponibles (pour UI de sélection)
    pub fn all() -> [Interval; 8] {
        [
            Interval::M1,
            Interval::M5,
            Interval::M15,
            Interval::M30,
            Interval::H1,
            Interval::D1,
            Interval::W1,
            Interval::Mo1,
        ]
    }

    /// Retourne l'intervalle suivant (cycle)
    pub fn next(&self) -> Interval {
        let all = Self::all();
        let index = all.iter().position(|i| i == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }

    /// Retourne l'intervalle précédent (cycle)
    pub fn previous(&self) -> Interval {
        let all = Self::all();
        let index = all.iter().position(|i| i == self).unwrap_or(0);
        all[(index + all.len() - 1) % all.len()]
    }
}

impl Default for Interval {
    /// Intervalle par défaut : 1 jour
    fn default() -> Self {
        Interval::D1
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_yahoo_string())
    }
}

impl FromStr for Interval {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // "60m" est l'alias Yahoo de "1h"
        if value.eq_ignore_ascii_case("60m") {
            return Ok(Interval::H1);
        }
        Self::all()
            .into_iter()
            .find(|i| i.to_yahoo_string().eq_ignore_ascii_case(value))
            .ok_or_else(|| DashboardError::InvalidInput(format!("intervalle inconnu '{}'", value)))
    }
}

/// Une observation OHLCV (une chandelle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OHLC {
    /// Timestamp de la chandelle
    pub timestamp: DateTime<Utc>,

    /// Prix d'ouverture (Open)
    pub open: f64,

    /// Prix le plus haut (High)
    pub high: f64,

    /// Prix le plus bas (Low)
    pub low: f64,

    /// Prix de clôture (Close)
    pub close: f64,

    /// Volume échangé
    pub volume: u64,
}

impl OHLC {
    /// Constructeur : crée une nouvelle chandelle OHLC
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Série de cours d'un ticker, triée par timestamp strictement croissant
///
/// CONCEPT RUST : Encapsulation
/// - `candles` est privé : on ne peut pas casser l'ordre après construction
/// - Lecture via candles() qui retourne une slice (&[OHLC])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Symbole du ticker
    pub symbol: String,

    /// Devise de cotation (ex: "USD"), "UNKNOWN" si le fournisseur ne la donne pas
    pub currency: String,

    /// Période demandée
    pub period: Period,

    /// Intervalle entre les chandelles
    pub interval: Interval,

    candles: Vec<OHLC>,
}

impl PriceSeries {
    /// Construit une série en garantissant l'invariant d'ordre
    ///
    /// CONCEPT : Normalisation à la construction
    /// - Tri stable par timestamp
    /// - Doublons : on garde la dernière observation reçue
    pub fn new(
        symbol: String,
        currency: String,
        period: Period,
        interval: Interval,
        mut candles: Vec<OHLC>,
    ) -> Self {
        candles.sort_by_key(|c| c.timestamp);

        let mut unique: Vec<OHLC> = Vec::with_capacity(candles.len());
        for candle in candles {
            match unique.last_mut() {
                Some(last) if last.timestamp == candle.timestamp => *last = candle,
                _ => unique.push(candle),
            }
        }

        Self {
            symbol,
            currency,
            period,
            interval,
            candles: unique,
        }
    }

    /// Chandelles triées par date croissante
    pub fn candles(&self) -> &[OHLC] {
        &self.candles
    }

    /// Prix de clôture, dans l'ordre chronologique
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Retourne le nombre de chandelles
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Vérifie si la série est vide
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&OHLC> {
        self.candles.first()
    }

    /// Retourne la chandelle la plus récente
    pub fn last(&self) -> Option<&OHLC> {
        self.candles.last()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_price_series_sorts_and_dedups() {
        let candles = vec![
            OHLC::new(day(2), 3.0, 3.0, 3.0, 3.0, 0),
            OHLC::new(day(0), 1.0, 1.0, 1.0, 1.0, 0),
            OHLC::new(day(1), 2.0, 2.0, 2.0, 2.0, 0),
            OHLC::new(day(1), 2.5, 2.5, 2.5, 2.5, 0),
        ];
        let series = PriceSeries::new(
            "AAPL".to_string(),
            "USD".to_string(),
            Period::OneMonth,
            Interval::D1,
            candles,
        );

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        assert!(series
            .candles()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_interval_yahoo_string() {
        assert_eq!(Interval::M30.to_yahoo_string(), "30m");
        assert_eq!(Interval::H1.to_yahoo_string(), "1h");
        assert_eq!(Interval::D1.to_yahoo_string(), "1d");
        assert_eq!(Interval::W1.to_yahoo_string(), "1wk");
        assert_eq!("60m".parse::<Interval>().unwrap(), Interval::H1);
        assert!("2h".parse::<Interval>().is_err());
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("1MO".parse::<Period>().unwrap(), Period::OneMonth);
        assert_eq!("ytd".parse::<Period>().unwrap(), Period::YearToDate);
        assert!("3w".parse::<Period>().is_err());
    }

    #[test]
    fn test_supported_combinations() {
        assert!(Interval::M1.supports(Period::FiveDays));
        assert!(!Interval::M1.supports(Period::OneMonth));
        assert!(Interval::M15.supports(Period::OneMonth));
        assert!(!Interval::M15.supports(Period::ThreeMonths));
        assert!(Interval::H1.supports(Period::TwoYears));
        assert!(!Interval::H1.supports(Period::FiveYears));
        assert!(Interval::D1.supports(Period::Max));
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(Interval::D1.periods_per_year(), 252.0);
        assert_eq!(Interval::W1.periods_per_year(), 52.0);
        assert_eq!(Interval::M30.periods_per_year(), 252.0 * 13.0);
    }

    #[test]
    fn test_lookback_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Period::OneMonth.lookback_days(today), 30);
        assert_eq!(Period::Max.lookback_days(today), 3650);
        assert_eq!(Period::YearToDate.lookback_days(today), 60);
    }

    #[test]
    fn test_cycles() {
        assert_eq!(Interval::M1.previous(), Interval::Mo1);
        assert_eq!(Interval::Mo1.next(), Interval::M1);
        assert_eq!(Period::Max.next(), Period::OneDay);
        assert_eq!(Period::OneDay.previous(), Period::Max);
    }
}
