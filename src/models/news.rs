// ============================================================================
// Structure : NewsItem
// ============================================================================
// Un article de presse, déjà normalisé à la frontière du NewsFetcher
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title available";
pub const NO_SUMMARY: &str = "No summary available";
pub const UNKNOWN_PUBLISHER: &str = "Unknown publisher";
pub const NO_LINK: &str = "No link available";

/// Article de news pour un ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub summary: String,
    /// Éditeur (ex: "Reuters")
    pub source: String,
    /// None si le fournisseur ne donne pas de date
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl NewsItem {
    /// Texte envoyé au modèle de sentiment : "titre. résumé"
    pub fn sentiment_text(&self) -> String {
        format!("{}. {}", self.headline, self.summary).trim().to_string()
    }

    /// Date formatée pour l'affichage ("Unknown date" si absente)
    pub fn published_label(&self) -> String {
        match self.published_at {
            Some(date) => date.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Unknown date".to_string(),
        }
    }

    /// Titre tronqué pour les listes (50 caractères + ellipse)
    pub fn short_headline(&self) -> String {
        if self.headline.chars().count() <= 50 {
            self.headline.clone()
        } else {
            let truncated: String = self.headline.chars().take(50).collect();
            format!("{}…", truncated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(headline: &str) -> NewsItem {
        NewsItem {
            headline: headline.to_string(),
            summary: "Sales beat expectations".to_string(),
            source: "Reuters".to_string(),
            published_at: None,
            url: NO_LINK.to_string(),
        }
    }

    #[test]
    fn test_sentiment_text() {
        assert_eq!(
            item("Apple rallies").sentiment_text(),
            "Apple rallies. Sales beat expectations"
        );
    }

    #[test]
    fn test_short_headline() {
        let long = "x".repeat(80);
        assert_eq!(item(&long).short_headline().chars().count(), 51);
        assert_eq!(item("court").short_headline(), "court");
        assert_eq!(item("court").published_label(), "Unknown date");
    }
}
