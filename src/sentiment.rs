// ============================================================================
// SentimentClassifier : textes → signal BUY / HOLD / SELL
// ============================================================================
// Règle d'agrégation :
// 1. Chaque texte non vide → distribution {positive, neutral, negative}
// 2. Distribution agrégée = moyenne arithmétique des distributions
// 3. Score net = positive - negative  (dans [-1, 1])
// 4. score <= -0.15 → SELL, score >= 0.15 → BUY, sinon HOLD
// 5. Confiance = masse agrégée du label choisi
//
// Le modèle est chargé au premier texte à classer puis gardé pour la session.
// Un échec de chargement n'est pas mémorisé : la requête suivante réessaie.
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::api::BoxFuture;
use crate::error::{DashboardError, Result};
use crate::models::{
    ArticleSentiment, NewsItem, RawLabel, SentimentResult, SentimentScores, Signal, SignalCounts,
};

/// Seuil SELL / HOLD (score net)
pub const SELL_THRESHOLD: f64 = -0.15;
/// Seuil HOLD / BUY (score net)
pub const BUY_THRESHOLD: f64 = 0.15;

/// Modèle de sentiment chargé
///
/// CONCEPT RUST : Trait object-safe
/// - score() retourne une future boxée : utilisable via Arc<dyn SentimentModel>
pub trait SentimentModel: Send + Sync {
    fn name(&self) -> &str;

    /// Une distribution par texte, dans le même ordre que `texts`
    fn score<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<SentimentScores>>>;
}

/// Chargement (coûteux) d'un modèle
pub trait ModelLoader: Send + Sync {
    fn load<'a>(&'a self) -> BoxFuture<'a, Result<Arc<dyn SentimentModel>>>;
}

/// Convertit un score net en signal selon les deux seuils fixes
pub fn signal_for_score(score: f64) -> Signal {
    if score <= SELL_THRESHOLD {
        Signal::Sell
    } else if score >= BUY_THRESHOLD {
        Signal::Buy
    } else {
        Signal::Hold
    }
}

/// Label de la distribution agrégée correspondant à un signal
fn label_for_signal(signal: Signal) -> RawLabel {
    match signal {
        Signal::Buy => RawLabel::Positive,
        Signal::Hold => RawLabel::Neutral,
        Signal::Sell => RawLabel::Negative,
    }
}

/// Classifieur de sentiment avec modèle chargé paresseusement
///
/// CONCEPT : Contexte explicite
/// - Le modèle appartient au classifieur, lui-même possédé par la Session
/// - Pas de singleton global : la fin de session libère le modèle
pub struct SentimentClassifier {
    loader: Arc<dyn ModelLoader>,
    model: Option<Arc<dyn SentimentModel>>,
}

impl SentimentClassifier {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Retourne le modèle, en le chargeant au premier appel
    async fn model(&mut self) -> Result<Arc<dyn SentimentModel>> {
        if let Some(model) = &self.model {
            return Ok(Arc::clone(model));
        }

        info!("Loading sentiment model (first use in this session)");
        let model = self.loader.load().await.map_err(|e| {
            warn!(error = %e, "Sentiment model failed to load");
            match e {
                DashboardError::ModelUnavailable(_) => e,
                other => DashboardError::ModelUnavailable(other.to_string()),
            }
        })?;
        info!(model = %model.name(), "Sentiment model loaded");

        self.model = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Score chaque texte non vide ; les textes vides sont ignorés
    async fn score_texts(&mut self, texts: &[String]) -> Result<Vec<SentimentScores>> {
        let model = self.model().await?;
        let scores = model.score(texts).await?;
        if scores.len() != texts.len() {
            return Err(DashboardError::provider(
                "sentiment",
                format!("{} distributions pour {} textes", scores.len(), texts.len()),
            ));
        }
        Ok(scores.into_iter().map(|s| s.normalized()).collect())
    }

    /// Classe une liste de textes
    ///
    /// Liste vide (ou uniquement des textes vides) → HOLD, confiance 0,
    /// sans charger le modèle.
    #[instrument(skip(self, texts), fields(texts = texts.len()))]
    pub async fn classify(&mut self, texts: &[String]) -> Result<SentimentResult> {
        let texts: Vec<String> = texts
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if texts.is_empty() {
            debug!("No text to classify, returning neutral result");
            return Ok(SentimentResult::neutral());
        }

        let scores = self.score_texts(&texts).await?;
        Ok(aggregate(&scores, Vec::new()))
    }

    /// Classe des articles : texte = "titre. résumé"
    ///
    /// En plus du signal agrégé, retourne le label de chaque article
    /// (label le plus probable) et la répartition BUY/HOLD/SELL.
    #[instrument(skip(self, items), fields(articles = items.len()))]
    pub async fn classify_articles(&mut self, items: &[NewsItem]) -> Result<SentimentResult> {
        let (items, texts): (Vec<&NewsItem>, Vec<String>) = items
            .iter()
            .map(|item| (item, item.sentiment_text()))
            .filter(|(_, text)| !text.is_empty())
            .unzip();

        if texts.is_empty() {
            debug!("No article to classify, returning neutral result");
            return Ok(SentimentResult::neutral());
        }

        let scores = self.score_texts(&texts).await?;

        let articles = items
            .iter()
            .zip(scores.iter())
            .map(|(item, scores)| {
                let raw_label = scores.top_label();
                ArticleSentiment {
                    headline: item.headline.clone(),
                    published_at: item.published_at,
                    signal: raw_label.signal(),
                    raw_label,
                    confidence: scores.mass(raw_label),
                }
            })
            .collect();

        Ok(aggregate(&scores, articles))
    }
}

/// Agrège des distributions normalisées en un SentimentResult
fn aggregate(scores: &[SentimentScores], articles: Vec<ArticleSentiment>) -> SentimentResult {
    let Some(mean) = SentimentScores::mean(scores) else {
        return SentimentResult::neutral();
    };

    let score = mean.net();
    let signal = signal_for_score(score);
    let confidence = mean.mass(label_for_signal(signal)).clamp(0.0, 1.0);

    let mut counts = SignalCounts::default();
    for article in &articles {
        counts.record(article.signal);
    }

    info!(
        signal = %signal,
        confidence = confidence,
        score = score,
        texts = scores.len(),
        "Sentiment classified"
    );

    SentimentResult {
        signal,
        confidence,
        score,
        aggregate: mean,
        texts_analyzed: scores.len(),
        articles,
        counts,
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Modèle de test : "good" → positif, "bad" → négatif, sinon neutre
    struct KeywordModel;

    impl SentimentModel for KeywordModel {
        fn name(&self) -> &str {
            "keyword"
        }

        fn score<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<SentimentScores>>> {
            Box::pin(async move {
                Ok(texts
                    .iter()
                    .map(|t| {
                        if t.contains("good") {
                            SentimentScores::new(0.8, 0.15, 0.05)
                        } else if t.contains("bad") {
                            SentimentScores::new(0.05, 0.15, 0.8)
                        } else {
                            SentimentScores::new(0.1, 0.8, 0.1)
                        }
                    })
                    .collect())
            })
        }
    }

    /// Loader qui compte ses appels et échoue les `failures` premières fois
    struct CountingLoader {
        calls: AtomicUsize,
        failures: usize,
    }

    impl CountingLoader {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
            })
        }
    }

    impl ModelLoader for CountingLoader {
        fn load<'a>(&'a self) -> BoxFuture<'a, Result<Arc<dyn SentimentModel>>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    return Err(DashboardError::ModelUnavailable("téléchargement impossible".into()));
                }
                Ok(Arc::new(KeywordModel) as Arc<dyn SentimentModel>)
            })
        }
    }

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(signal_for_score(-0.15), Signal::Sell);
        assert_eq!(signal_for_score(-0.14), Signal::Hold);
        assert_eq!(signal_for_score(0.0), Signal::Hold);
        assert_eq!(signal_for_score(0.15), Signal::Buy);
        assert_eq!(signal_for_score(0.9), Signal::Buy);
    }

    #[tokio::test]
    async fn test_empty_input_is_hold_without_loading() {
        let loader = CountingLoader::new(0);
        let mut classifier = SentimentClassifier::new(loader.clone());

        let result = classifier.classify(&[]).await.unwrap();
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.confidence, 0.0);

        let blank = classifier.classify(&texts(&["  ", ""])).await.unwrap();
        assert_eq!(blank.signal, Signal::Hold);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
        assert!(!classifier.is_loaded());
    }

    #[tokio::test]
    async fn test_mean_aggregation() {
        let mut classifier = SentimentClassifier::new(CountingLoader::new(0));

        let buy = classifier
            .classify(&texts(&["good quarter", "good outlook", "flat"]))
            .await
            .unwrap();
        // moyenne positive = (0.8 + 0.8 + 0.1) / 3, négative = (0.05 + 0.05 + 0.1) / 3
        assert_eq!(buy.signal, Signal::Buy);
        assert!((buy.score - 0.5).abs() < 1e-9);
        assert!((buy.confidence - 1.7 / 3.0).abs() < 1e-9);
        assert_eq!(buy.texts_analyzed, 3);

        let hold = classifier
            .classify(&texts(&["good quarter", "bad guidance"]))
            .await
            .unwrap();
        assert_eq!(hold.signal, Signal::Hold);
        assert!(hold.score.abs() < 1e-9);
        assert!((hold.confidence - 0.15).abs() < 1e-9);

        let sell = classifier.classify(&texts(&["bad guidance"])).await.unwrap();
        assert_eq!(sell.signal, Signal::Sell);
        assert!((0.0..=1.0).contains(&sell.confidence));
    }

    #[tokio::test]
    async fn test_model_loaded_once() {
        let loader = CountingLoader::new(0);
        let mut classifier = SentimentClassifier::new(loader.clone());

        classifier.classify(&texts(&["good"])).await.unwrap();
        classifier.classify(&texts(&["bad"])).await.unwrap();

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(classifier.is_loaded());
    }

    #[tokio::test]
    async fn test_load_failure_is_retried() {
        let loader = CountingLoader::new(1);
        let mut classifier = SentimentClassifier::new(loader.clone());

        let first = classifier.classify(&texts(&["good"])).await;
        assert!(matches!(first, Err(DashboardError::ModelUnavailable(_))));
        assert!(!classifier.is_loaded());

        let second = classifier.classify(&texts(&["good"])).await.unwrap();
        assert_eq!(second.signal, Signal::Buy);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_classify_articles_counts() {
        let mut classifier = SentimentClassifier::new(CountingLoader::new(0));
        let item = |headline: &str| NewsItem {
            headline: headline.to_string(),
            summary: "No summary available".to_string(),
            source: "Reuters".to_string(),
            published_at: None,
            url: "No link available".to_string(),
        };

        let result = classifier
            .classify_articles(&[item("good results"), item("good demand"), item("bad recall")])
            .await
            .unwrap();

        assert_eq!(result.articles.len(), 3);
        assert_eq!(result.articles[2].signal, Signal::Sell);
        assert_eq!(result.articles[2].raw_label, RawLabel::Negative);
        assert!((result.articles[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(result.counts.buy, 2);
        assert_eq!(result.counts.sell, 1);
        assert_eq!(result.counts.percent(Signal::Buy), 66);
    }
}
