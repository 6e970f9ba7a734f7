// ============================================================================
// CLI : arguments de la ligne de commande
// ============================================================================
// - Sans sous-commande : lance la TUI, le formulaire est prérempli
// - `report` : exécute une requête et écrit le rapport sur stdout
//
// CONCEPT RUST : clap derive
// - Les types du domaine (Period, Interval) implémentent FromStr + Display
// - clap les parse directement, les erreurs de saisie sont affichées par clap
// ============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::{FormState, DEFAULT_TICKER};
use crate::models::{Interval, Period};
use crate::session::{DashboardRequest, ModuleToggles, DEFAULT_NEWS_LIMIT};

/// 📈 MarketMetrics - tableau de bord boursier en terminal
#[derive(Debug, Parser)]
#[command(
    name = "marketmetrics",
    version,
    about = "Terminal market dashboard: prices, KPIs, charts, news and sentiment"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exécute une requête sans TUI et affiche le rapport
    ///
    ///   marketmetrics report --ticker MSFT --period 6mo --interval 1d
    Report(ReportArgs),
}

/// Paramètres d'une requête
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Ticker (ex: AAPL, MSFT, BTC-USD)
    #[arg(long, short = 't', default_value = DEFAULT_TICKER)]
    pub ticker: String,

    /// Période : 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max
    #[arg(long, short = 'p', default_value_t = Period::OneMonth)]
    pub period: Period,

    /// Intervalle : 1m, 5m, 15m, 30m, 1h, 1d, 1wk, 1mo
    #[arg(long, short = 'i', default_value_t = Interval::D1)]
    pub interval: Interval,

    /// Nombre d'articles (1 à 20)
    #[arg(long, short = 'n', default_value_t = DEFAULT_NEWS_LIMIT)]
    pub news_limit: usize,

    /// Désactive Market News (et donc Market Sentiment)
    #[arg(long, default_value_t = false)]
    pub no_news: bool,

    /// Désactive Market Sentiment
    #[arg(long, default_value_t = false)]
    pub no_sentiment: bool,

    /// Désactive Technical Analysis
    #[arg(long, default_value_t = false)]
    pub no_charts: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Répertoire où écrire les figures en JSON (price.json, sma.json, returns.json)
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl QueryArgs {
    pub fn modules(&self) -> ModuleToggles {
        ModuleToggles {
            charts: !self.no_charts,
            news: !self.no_news,
            sentiment: !self.no_sentiment,
            ..ModuleToggles::default()
        }
    }

    pub fn request(&self) -> DashboardRequest {
        DashboardRequest::new(self.ticker.clone(), self.period, self.interval)
            .with_news_limit(self.news_limit)
            .with_modules(self.modules())
    }

    /// Formulaire TUI prérempli avec ces arguments
    pub fn form(&self) -> FormState {
        let request = self.request();
        FormState {
            ticker: request.ticker.trim().to_uppercase(),
            period: request.period,
            interval: request.interval,
            news_limit: request.news_limit,
            modules: request.modules,
            ..FormState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_launch_tui() {
        let cli = Cli::try_parse_from(["marketmetrics"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.query.ticker, "AAPL");
        assert_eq!(cli.query.period, Period::OneMonth);
        assert_eq!(cli.query.interval, Interval::D1);
        assert_eq!(cli.query.form(), FormState::default());
    }

    #[test]
    fn test_report_subcommand() {
        let cli = Cli::try_parse_from([
            "marketmetrics",
            "report",
            "--ticker",
            "msft",
            "--period",
            "6mo",
            "--interval",
            "1h",
            "-n",
            "50",
            "--no-sentiment",
            "--export",
            "out",
        ])
        .unwrap();

        let Some(Command::Report(args)) = cli.command else {
            panic!("expected report subcommand");
        };
        let request = args.query.request();
        assert_eq!(request.period, Period::SixMonths);
        assert_eq!(request.interval, Interval::H1);
        assert_eq!(request.news_limit, 20);
        assert!(!request.modules.sentiment);
        assert!(request.modules.news);
        assert_eq!(args.export, Some(PathBuf::from("out")));
        assert_eq!(args.query.form().ticker, "MSFT");
    }

    #[test]
    fn test_unknown_period_rejected() {
        assert!(Cli::try_parse_from(["marketmetrics", "--period", "3w"]).is_err());
    }
}
