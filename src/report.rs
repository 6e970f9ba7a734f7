// ============================================================================
// Report : mise en forme texte d'un DashboardReport
// ============================================================================
// Utilisé par la sous-commande `report` (stdout) et par la TUI (libellés KPIs)
//
// CONCEPT RUST : fmt::Write
// - writeln!() sur une String ne peut pas échouer en pratique
// - On propage quand même fmt::Result pour rester honnête sur le type
// ============================================================================

use std::fmt::{self, Write};

use crate::models::Signal;
use crate::session::{DashboardReport, SectionOutcome};

/// Libellé lisible d'une métrique de MetricsSummary::entries()
pub fn metric_label(name: &str) -> String {
    match name {
        "avg_close" => "Average close".to_string(),
        "max_close" => "Highest close".to_string(),
        "min_close" => "Lowest close".to_string(),
        "last_close" => "Last close".to_string(),
        "last_return" => "Last return".to_string(),
        "total_return" => "Total return".to_string(),
        "volatility" => "Volatility (annualized)".to_string(),
        "daily_volatility" => "Volatility (per period)".to_string(),
        other => match other.strip_prefix("sma_") {
            Some(window) => format!("SMA {}", window),
            None => other.to_string(),
        },
    }
}

/// true pour les métriques exprimées en fraction (affichées en %)
pub fn is_ratio_metric(name: &str) -> bool {
    matches!(
        name,
        "last_return" | "total_return" | "volatility" | "daily_volatility"
    )
}

/// Valeur formatée : "12.34%" pour les ratios, "123.45" pour les prix
pub fn format_metric(name: &str, value: f64) -> String {
    if is_ratio_metric(name) {
        format!("{:.2}%", value * 100.0)
    } else {
        format!("{:.2}", value)
    }
}

/// Message pour une section non prête, None si Ready
pub fn outcome_reason<T>(outcome: &SectionOutcome<T>) -> Option<String> {
    match outcome {
        SectionOutcome::Ready(_) => None,
        SectionOutcome::Failed(failure) => Some(failure.to_string()),
        SectionOutcome::Skipped(reason) => Some(format!("skipped : {}", reason)),
        SectionOutcome::Disabled => Some("disabled".to_string()),
    }
}

/// Indicateur visuel d'un signal
pub fn signal_badge(signal: Signal) -> &'static str {
    match signal {
        Signal::Buy => "▲ BUY",
        Signal::Hold => "● HOLD",
        Signal::Sell => "▼ SELL",
    }
}

/// Rapport complet en texte brut
pub fn text_report(report: &DashboardReport) -> String {
    let mut out = String::new();
    // Écrire dans une String ne peut pas échouer
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &DashboardReport) -> fmt::Result {
    writeln!(
        out,
        "=== {} | {} / {} | {} ===",
        report.symbol,
        report.request.period.label(),
        report.request.interval.label(),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    writeln!(out, "\n[Market Data]")?;
    match &report.prices {
        SectionOutcome::Ready(series) => {
            writeln!(out, "  {} observations ({})", series.len(), series.currency)?;
            if let (Some(first), Some(last)) = (series.first(), series.last()) {
                writeln!(
                    out,
                    "  {} → {}",
                    first.timestamp.format("%Y-%m-%d"),
                    last.timestamp.format("%Y-%m-%d")
                )?;
            }
        }
        other => writeln!(out, "  {}", outcome_reason(other).unwrap_or_default())?,
    }

    writeln!(out, "\n[Key Metrics]")?;
    match &report.metrics {
        SectionOutcome::Ready(metrics) => {
            for (name, value) in metrics.summary.entries() {
                writeln!(out, "  {:<26}{}", metric_label(&name), format_metric(&name, value))?;
            }
        }
        other => writeln!(out, "  {}", outcome_reason(other).unwrap_or_default())?,
    }

    writeln!(out, "\n[Technical Analysis]")?;
    match &report.charts {
        SectionOutcome::Ready(charts) => {
            writeln!(out, "  {}", charts.price.title)?;
            writeln!(out, "  {}", charts.sma.title)?;
            writeln!(out, "  {}", charts.returns.title)?;
        }
        other => writeln!(out, "  {}", outcome_reason(other).unwrap_or_default())?,
    }

    writeln!(out, "\n[Market News]")?;
    match &report.news {
        SectionOutcome::Ready(items) if items.is_empty() => writeln!(out, "  No recent news")?,
        SectionOutcome::Ready(items) => {
            for (index, item) in items.iter().enumerate() {
                writeln!(out, "  {}. {}", index + 1, item.headline)?;
                writeln!(out, "     {} | {}", item.source, item.published_label())?;
                writeln!(out, "     {}", item.url)?;
            }
        }
        other => writeln!(out, "  {}", outcome_reason(other).unwrap_or_default())?,
    }

    writeln!(out, "\n[Market Sentiment]")?;
    match &report.sentiment {
        SectionOutcome::Ready(result) => {
            writeln!(
                out,
                "  Signal : {}  (confidence {:.1}%, score {:+.3}, {} texts)",
                signal_badge(result.signal),
                result.confidence * 100.0,
                result.score,
                result.texts_analyzed
            )?;
            for signal in [Signal::Buy, Signal::Hold, Signal::Sell] {
                let count = match signal {
                    Signal::Buy => result.counts.buy,
                    Signal::Hold => result.counts.hold,
                    Signal::Sell => result.counts.sell,
                };
                writeln!(
                    out,
                    "  {:<5} {:>3} ({}%)",
                    signal.as_str(),
                    count,
                    result.counts.percent(signal)
                )?;
            }
            for article in &result.articles {
                writeln!(
                    out,
                    "  - [{}] {:.0}%  {}",
                    article.signal,
                    article.confidence * 100.0,
                    article.headline
                )?;
            }
        }
        other => writeln!(out, "  {}", outcome_reason(other).unwrap_or_default())?,
    }

    let failures = report.failures();
    if !failures.is_empty() {
        writeln!(out, "\n[Errors]")?;
        for failure in failures {
            writeln!(out, "  {}", failure)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Component, ComponentFailure, DashboardError};
    use crate::models::{Interval, Period};
    use crate::session::DashboardRequest;
    use chrono::Utc;
    use std::sync::Arc;

    fn failed_report() -> DashboardReport {
        DashboardReport {
            request: DashboardRequest::new("ZZZZ", Period::OneMonth, Interval::D1),
            symbol: "ZZZZ".to_string(),
            generated_at: Utc::now(),
            prices: SectionOutcome::Failed(ComponentFailure::new(
                Component::DataFetcher,
                DashboardError::DataUnavailable("no rows for ZZZZ".to_string()),
            )),
            metrics: SectionOutcome::Skipped("Market Data unavailable".to_string()),
            charts: SectionOutcome::Skipped("Market Data unavailable".to_string()),
            news: SectionOutcome::Ready(Arc::new(Vec::new())),
            sentiment: SectionOutcome::Disabled,
        }
    }

    #[test]
    fn test_metric_labels_and_values() {
        assert_eq!(metric_label("sma_20"), "SMA 20");
        assert_eq!(metric_label("avg_close"), "Average close");
        assert_eq!(format_metric("total_return", 0.1234), "12.34%");
        assert_eq!(format_metric("last_close", 101.5), "101.50");
    }

    #[test]
    fn test_outcome_reason() {
        let ready: SectionOutcome<u32> = SectionOutcome::Ready(1);
        assert!(outcome_reason(&ready).is_none());
        assert_eq!(
            outcome_reason(&SectionOutcome::<u32>::Disabled).as_deref(),
            Some("disabled")
        );
    }

    #[test]
    fn test_text_report_lists_failures() {
        let text = text_report(&failed_report());

        assert!(text.starts_with("=== ZZZZ"));
        assert!(text.contains("No recent news"));
        assert!(text.contains("[Errors]"));
        assert!(text.contains("Market Data : "));
        assert!(text.contains("skipped : Market Data unavailable"));
    }
}
