// ============================================================================
// Structures : Signal, SentimentScores, SentimentResult
// ============================================================================
// Sortie du SentimentClassifier : un signal BUY/HOLD/SELL + confiance
//
// CONCEPTS RUST :
// 1. Enums Copy : Signal et RawLabel sont de simples tags
// 2. serde(rename_all) : "BUY" / "positive" tels que le modèle les écrit
// ============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommandation qualitative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
            Signal::Sell => "SELL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label brut du modèle FinBERT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLabel {
    Positive,
    Neutral,
    Negative,
}

impl RawLabel {
    /// Mapping label du modèle → recommandation
    pub fn signal(&self) -> Signal {
        match self {
            RawLabel::Positive => Signal::Buy,
            RawLabel::Neutral => Signal::Hold,
            RawLabel::Negative => Signal::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RawLabel::Positive => "positive",
            RawLabel::Neutral => "neutral",
            RawLabel::Negative => "negative",
        }
    }

    /// Parse un label tel que retourné par l'API d'inférence (insensible à la casse)
    pub fn parse(label: &str) -> Option<RawLabel> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(RawLabel::Positive),
            "neutral" => Some(RawLabel::Neutral),
            "negative" => Some(RawLabel::Negative),
            _ => None,
        }
    }
}

/// Distribution de probabilité positive/neutre/négative pour un texte
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl SentimentScores {
    pub fn new(positive: f64, neutral: f64, negative: f64) -> Self {
        Self {
            positive,
            neutral,
            negative,
        }
    }

    /// Distribution neutre certaine (texte vide)
    pub fn neutral_only() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    pub fn total(&self) -> f64 {
        self.positive + self.neutral + self.negative
    }

    /// Ramène la somme à 1 ; une distribution nulle devient neutre
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return Self::neutral_only();
        }
        Self::new(self.positive / total, self.neutral / total, self.negative / total)
    }

    /// Score net dans [-1, 1]
    pub fn net(&self) -> f64 {
        self.positive - self.negative
    }

    /// Masse de probabilité associée à un label
    pub fn mass(&self, label: RawLabel) -> f64 {
        match label {
            RawLabel::Positive => self.positive,
            RawLabel::Neutral => self.neutral,
            RawLabel::Negative => self.negative,
        }
    }

    /// Label le plus probable (égalité : neutre, puis positif)
    pub fn top_label(&self) -> RawLabel {
        let mut best = RawLabel::Neutral;
        for label in [RawLabel::Positive, RawLabel::Negative] {
            if self.mass(label) > self.mass(best) {
                best = label;
            }
        }
        best
    }

    /// Moyenne arithmétique d'un ensemble de distributions
    pub fn mean(scores: &[SentimentScores]) -> Option<SentimentScores> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let sum = scores.iter().fold(SentimentScores::default(), |acc, s| {
            SentimentScores::new(
                acc.positive + s.positive,
                acc.neutral + s.neutral,
                acc.negative + s.negative,
            )
        });
        Some(SentimentScores::new(sum.positive / n, sum.neutral / n, sum.negative / n))
    }
}

/// Sentiment d'un article individuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSentiment {
    pub headline: String,
    pub published_at: Option<DateTime<Utc>>,
    pub signal: Signal,
    pub raw_label: RawLabel,
    /// Probabilité du label le plus probable
    pub confidence: f64,
}

/// Répartition des articles par signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalCounts {
    pub buy: usize,
    pub hold: usize,
    pub sell: usize,
}

impl SignalCounts {
    pub fn record(&mut self, signal: Signal) {
        match signal {
            Signal::Buy => self.buy += 1,
            Signal::Hold => self.hold += 1,
            Signal::Sell => self.sell += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.buy + self.hold + self.sell
    }

    /// Pourcentage entier (division entière, comme l'affichage du tableau de bord)
    pub fn percent(&self, signal: Signal) -> usize {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let count = match signal {
            Signal::Buy => self.buy,
            Signal::Hold => self.hold,
            Signal::Sell => self.sell,
        };
        100 * count / total
    }
}

/// Résultat agrégé du classifieur
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub signal: Signal,
    /// Masse de probabilité agrégée du label choisi, dans [0, 1]
    pub confidence: f64,
    /// positive - negative de la distribution moyenne
    pub score: f64,
    pub aggregate: SentimentScores,
    pub texts_analyzed: usize,
    pub articles: Vec<ArticleSentiment>,
    pub counts: SignalCounts,
}

impl SentimentResult {
    /// Résultat neutre documenté pour une entrée vide
    pub fn neutral() -> Self {
        Self {
            signal: Signal::Hold,
            confidence: 0.0,
            score: 0.0,
            aggregate: SentimentScores::default(),
            texts_analyzed: 0,
            articles: Vec::new(),
            counts: SignalCounts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_net() {
        let mean = SentimentScores::mean(&[
            SentimentScores::new(0.8, 0.1, 0.1),
            SentimentScores::new(0.2, 0.3, 0.5),
        ])
        .unwrap();

        assert!((mean.positive - 0.5).abs() < 1e-12);
        assert!((mean.negative - 0.3).abs() < 1e-12);
        assert!((mean.net() - 0.2).abs() < 1e-12);
        assert!(SentimentScores::mean(&[]).is_none());
    }

    #[test]
    fn test_normalized_and_top_label() {
        let scores = SentimentScores::new(2.0, 1.0, 1.0).normalized();
        assert!((scores.total() - 1.0).abs() < 1e-12);
        assert_eq!(scores.top_label(), RawLabel::Positive);
        assert_eq!(SentimentScores::default().normalized(), SentimentScores::neutral_only());
        assert_eq!(
            SentimentScores::new(0.4, 0.4, 0.2).top_label(),
            RawLabel::Neutral
        );
    }

    #[test]
    fn test_signal_counts_percent() {
        let mut counts = SignalCounts::default();
        counts.record(Signal::Buy);
        counts.record(Signal::Buy);
        counts.record(Signal::Sell);

        assert_eq!(counts.total(), 3);
        assert_eq!(counts.percent(Signal::Buy), 66);
        assert_eq!(counts.percent(Signal::Hold), 0);
    }

    #[test]
    fn test_raw_label_parse() {
        assert_eq!(RawLabel::parse("Positive"), Some(RawLabel::Positive));
        assert_eq!(RawLabel::parse("LABEL_0"), None);
        assert_eq!(RawLabel::Negative.signal(), Signal::Sell);
    }
}
