// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// Dessine le formulaire de requête et les cinq sections du rapport
//
// CONCEPTS RUST :
// 1. Emprunts : &App en lecture seule, le rendu ne modifie jamais l'état
// 2. Pattern matching : une branche par état de section (SectionOutcome)
// 3. Builder pattern : construction fluide des widgets
//
// CONCEPTS RATATUI :
// 1. Layout : header / contenu / footer, puis colonnes
// 2. Tabs : onglets Overview / Charts / News / Sentiment
// 3. Gauge : répartition BUY / HOLD / SELL
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, FormField, ResultsTab, Screen};
use crate::models::Signal;
use crate::report::{format_metric, is_ratio_metric, metric_label, outcome_reason, signal_badge};
use crate::session::{DashboardReport, SectionOutcome};
use crate::ui::chart;

// ============================================================================
// Fonction principale de rendu
// ============================================================================

/// Dessine l'interface complète
///
/// CONCEPT RUST : Routing avec match sur enum
/// - Le compilateur garantit que chaque écran est géré
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    match app.current_screen {
        Screen::Form => {
            render_form(frame, app, chunks[1]);
            render_footer(frame, app, chunks[2]);
        }
        Screen::Results => {
            render_results(frame, app, chunks[1]);
            render_footer(frame, app, chunks[2]);
        }
        Screen::InputMode => {
            render_form(frame, app, chunks[1]);
            render_input_footer(frame, app, chunks[2]);
        }
    }
}

/// Crée le layout principal (header, content, footer)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area)
        .to_vec()
}

/// Colonnes gauche / droite
fn split_columns(area: Rect, left: u16) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(left), Constraint::Percentage(100 - left)])
        .split(area)
        .to_vec()
}

fn key_style(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn signal_color(signal: Signal) -> Color {
    match signal {
        Signal::Buy => Color::Green,
        Signal::Hold => Color::Yellow,
        Signal::Sell => Color::Red,
    }
}

// ============================================================================
// Header
// ============================================================================

/// Titre + statut (chargement, dernier message)
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" MarketMetrics ")
        .title_alignment(Alignment::Center);

    let line = if app.is_loading_data() {
        let message = app
            .loading_message
            .clone()
            .unwrap_or_else(|| "Chargement...".to_string());
        Line::from(Span::styled(
            format!("⏳ {}", message),
            key_style(Color::Yellow),
        ))
    } else if let Some(status) = &app.status_message {
        Line::from(Span::styled(status.clone(), Style::default().fg(Color::White)))
    } else {
        Line::from(Span::styled(
            "📈 Prix, KPIs, graphiques, news et sentiment",
            key_style(Color::Green),
        ))
    };

    let paragraph = Paragraph::new(vec![line])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Formulaire
// ============================================================================

/// Champs à gauche, aide et dernier rapport à droite
fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let columns = split_columns(area, 50);
    render_form_fields(frame, app, columns[0]);
    render_form_help(frame, app, columns[1]);
}

/// Valeur affichée d'un champ
fn field_value(app: &App, field: FormField) -> String {
    let form = &app.form;
    match field {
        FormField::Ticker => form.ticker.clone(),
        FormField::Period => form.period.label().to_string(),
        FormField::Interval => form.interval.label().to_string(),
        FormField::NewsLimit => form.news_limit.to_string(),
        toggle => match form.toggle_value(toggle) {
            Some(true) => "[x]".to_string(),
            _ => "[ ]".to_string(),
        },
    }
}

fn render_form_fields(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 🔎 Requête ");

    let mut items: Vec<ListItem> = FormField::all()
        .iter()
        .map(|field| {
            let line = format!(" {:<20} {}", field.label(), field_value(app, *field));
            let style = if *field == app.form.focus {
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::REVERSED)
            } else if field.is_toggle() {
                Style::default().fg(Color::Gray)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(line).style(style)
        })
        .collect();

    if !app.is_combination_supported() {
        items.push(ListItem::new(""));
        items.push(
            ListItem::new(format!(
                " ⚠ Intervalle {} indisponible sur {}",
                app.form.interval.label(),
                app.form.period.label()
            ))
            .style(Style::default().fg(Color::Red)),
        );
    }

    frame.render_widget(List::new(items).block(block), area);
}

fn render_form_help(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" ℹ Modules ");

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Market Data        ", key_style(Color::Cyan)),
            Span::raw("cours OHLCV (Yahoo Finance)"),
        ]),
        Line::from(vec![
            Span::styled("Key Metrics        ", key_style(Color::Cyan)),
            Span::raw("SMA, rendements, volatilité"),
        ]),
        Line::from(vec![
            Span::styled("Technical Analysis ", key_style(Color::Cyan)),
            Span::raw("graphiques Price / SMA / Returns"),
        ]),
        Line::from(vec![
            Span::styled("Market News        ", key_style(Color::Cyan)),
            Span::raw("articles récents (Finnhub)"),
        ]),
        Line::from(vec![
            Span::styled("Market Sentiment   ", key_style(Color::Cyan)),
            Span::raw("signal BUY / HOLD / SELL (FinBERT)"),
        ]),
        Line::from(""),
    ];

    if let Some(report) = &app.report {
        lines.push(Line::from(Span::styled(
            format!(
                "Dernier rapport : {} ({})",
                report.symbol,
                report.generated_at.format("%H:%M:%S")
            ),
            key_style(Color::White),
        )));
        for failure in report.failures() {
            lines.push(Line::from(Span::styled(
                format!("  ✗ {}", failure),
                Style::default().fg(Color::Red),
            )));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Résultats
// ============================================================================

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let Some(report) = app.report.as_ref() else {
        let paragraph = Paragraph::new("Aucun rapport : [Enter] sur le formulaire")
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    render_tabs(frame, app, report, chunks[0]);

    match app.results_tab {
        ResultsTab::Overview => render_overview(frame, report, chunks[1]),
        ResultsTab::Charts => chart::render_chart(frame, app, chunks[1]),
        ResultsTab::News => render_news(frame, app, report, chunks[1]),
        ResultsTab::Sentiment => render_sentiment(frame, app, report, chunks[1]),
    }
}

fn render_tabs(frame: &mut Frame, app: &App, report: &DashboardReport, area: Rect) {
    let titles: Vec<Line> = ResultsTab::all()
        .iter()
        .map(|tab| Line::from(tab.label()))
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(format!(
                    " {} · {} / {} ",
                    report.symbol,
                    report.request.period.label(),
                    report.request.interval.label()
                )),
        )
        .select(app.results_tab.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(key_style(Color::Yellow));

    frame.render_widget(tabs, area);
}

/// Ligne d'explication pour une section absente
fn outcome_line<T>(outcome: &SectionOutcome<T>) -> Line<'static> {
    let color = match outcome {
        SectionOutcome::Failed(_) => Color::Red,
        _ => Color::Gray,
    };
    Line::from(Span::styled(
        outcome_reason(outcome).unwrap_or_default(),
        Style::default().fg(color),
    ))
}

/// Market Data + Key Metrics à gauche, erreurs et signal à droite
fn render_overview(frame: &mut Frame, report: &DashboardReport, area: Rect) {
    let columns = split_columns(area, 55);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(columns[0]);

    render_market_data(frame, report, left[0]);
    render_key_metrics(frame, report, left[1]);
    render_status_panel(frame, report, columns[1]);
}

fn render_market_data(frame: &mut Frame, report: &DashboardReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 📊 Market Data ");

    let lines = match &report.prices {
        SectionOutcome::Ready(series) => {
            let mut lines = vec![Line::from(vec![
                Span::styled(format!("{} ", series.symbol), key_style(Color::White)),
                Span::raw(format!("{} observations · {}", series.len(), series.currency)),
            ])];
            if let (Some(first), Some(last)) = (series.first(), series.last()) {
                let change = last.close / first.close - 1.0;
                let color = if change >= 0.0 { Color::Green } else { Color::Red };
                let arrow = if change >= 0.0 { "▲" } else { "▼" };
                lines.push(Line::from(format!(
                    "{} → {}",
                    first.timestamp.format(series.interval.date_format()),
                    last.timestamp.format(series.interval.date_format())
                )));
                lines.push(Line::from(vec![
                    Span::raw("Close: "),
                    Span::styled(format!("{:.2}", last.close), key_style(color)),
                    Span::styled(
                        format!("  {} {:+.2}%", arrow, change * 100.0),
                        Style::default().fg(color),
                    ),
                ]));
            }
            lines
        }
        other => vec![outcome_line(other)],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Cartes KPI : une ligne par métrique définie
fn render_key_metrics(frame: &mut Frame, report: &DashboardReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 🧮 Key Metrics ");

    let metrics = match &report.metrics {
        SectionOutcome::Ready(metrics) => metrics,
        other => {
            frame.render_widget(Paragraph::new(vec![outcome_line(other)]).block(block), area);
            return;
        }
    };

    let items: Vec<ListItem> = metrics
        .summary
        .entries()
        .into_iter()
        .map(|(name, value)| {
            let color = if is_ratio_metric(&name) && name.ends_with("return") {
                if value >= 0.0 {
                    Color::Green
                } else {
                    Color::Red
                }
            } else {
                Color::White
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {:<26}", metric_label(&name)),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(format_metric(&name, value), key_style(color)),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

/// Échecs de composants + résumé du signal
fn render_status_panel(frame: &mut Frame, report: &DashboardReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 🩺 Statut ");

    let mut lines = Vec::new();

    if let SectionOutcome::Ready(result) = &report.sentiment {
        lines.push(Line::from(vec![
            Span::raw("Signal : "),
            Span::styled(signal_badge(result.signal), key_style(signal_color(result.signal))),
            Span::raw(format!("  ({:.1}%)", result.confidence * 100.0)),
        ]));
        lines.push(Line::from(""));
    }

    if let SectionOutcome::Ready(items) = &report.news {
        lines.push(Line::from(format!("{} article(s) récents", items.len())));
        lines.push(Line::from(""));
    }

    let failures = report.failures();
    if failures.is_empty() {
        lines.push(Line::from(Span::styled(
            "✓ Tous les modules actifs ont répondu",
            Style::default().fg(Color::Green),
        )));
    } else {
        for failure in failures {
            lines.push(Line::from(Span::styled(
                format!("✗ {}", failure),
                Style::default().fg(Color::Red),
            )));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

// ============================================================================
// News
// ============================================================================

/// Liste des articles + détail de l'article sélectionné
fn render_news(frame: &mut Frame, app: &App, report: &DashboardReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 📰 Market News ");

    let items = match &report.news {
        SectionOutcome::Ready(items) => items,
        other => {
            frame.render_widget(Paragraph::new(vec![outcome_line(other)]).block(block), area);
            return;
        }
    };

    if items.is_empty() {
        let paragraph = Paragraph::new("No recent news")
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let columns = split_columns(area, 50);

    let list_items: Vec<ListItem> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let line = format!(" {:<52} {}", item.short_headline(), item.source);
            let style = if index == app.news_index {
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(line).style(style)
        })
        .collect();

    frame.render_widget(List::new(list_items).block(block), columns[0]);

    if let Some(item) = items.get(app.news_index) {
        let detail = vec![
            Line::from(Span::styled(item.headline.clone(), key_style(Color::White))),
            Line::from(Span::styled(
                format!("{} · {}", item.source, item.published_label()),
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from(item.summary.clone()),
            Line::from(""),
            Line::from(Span::styled(item.url.clone(), Style::default().fg(Color::Blue))),
        ];

        let paragraph = Paragraph::new(detail)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(" Détail "),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, columns[1]);
    }
}

// ============================================================================
// Sentiment
// ============================================================================

/// Signal global, répartition, puis un signal par article
fn render_sentiment(frame: &mut Frame, app: &App, report: &DashboardReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" 🧠 Market Sentiment ");

    let result = match &report.sentiment {
        SectionOutcome::Ready(result) => result,
        other => {
            frame.render_widget(Paragraph::new(vec![outcome_line(other)]).block(block), area);
            return;
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Signal global
            Constraint::Length(3), // BUY
            Constraint::Length(3), // HOLD
            Constraint::Length(3), // SELL
            Constraint::Min(0),    // Articles
        ])
        .split(area);

    let summary = vec![
        Line::from(vec![
            Span::raw("Signal : "),
            Span::styled(signal_badge(result.signal), key_style(signal_color(result.signal))),
            Span::raw(format!(
                "   confiance {:.1}%   score {:+.3}",
                result.confidence * 100.0,
                result.score
            )),
        ]),
        Line::from(Span::styled(
            format!("{} texte(s) analysé(s)", result.texts_analyzed),
            Style::default().fg(Color::Gray),
        )),
    ];
    frame.render_widget(Paragraph::new(summary).block(block), chunks[0]);

    // CONCEPT RATATUI : Gauge
    // - percent() attend un u16 entre 0 et 100
    for (signal, chunk) in [Signal::Buy, Signal::Hold, Signal::Sell]
        .into_iter()
        .zip([chunks[1], chunks[2], chunks[3]])
    {
        let count = match signal {
            Signal::Buy => result.counts.buy,
            Signal::Hold => result.counts.hold,
            Signal::Sell => result.counts.sell,
        };
        let percent = result.counts.percent(signal);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", signal)))
            .gauge_style(Style::default().fg(signal_color(signal)))
            .percent(percent.min(100) as u16)
            .label(format!("{} article(s) · {}%", count, percent));
        frame.render_widget(gauge, chunk);
    }

    let items: Vec<ListItem> = result
        .articles
        .iter()
        .enumerate()
        .map(|(index, article)| {
            let mut style = Style::default().fg(signal_color(article.signal));
            if index == app.news_index {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(format!(
                " {:<5} {:>5.1}%  {}",
                article.signal.as_str(),
                article.confidence * 100.0,
                article.headline
            ))
            .style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Articles "),
    );
    frame.render_widget(list, chunks[4]);
}

// ============================================================================
// Footer : Instructions
// ============================================================================

/// Dessine le footer avec les raccourcis clavier
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        // CONCEPT : Style avec BLINK pour attirer l'attention
        Line::from(vec![
            Span::styled("⚠  Appuyez sur ", key_style(Color::Yellow)),
            Span::styled(
                "[q]",
                key_style(Color::Red).add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                key_style(Color::Yellow),
            ),
        ])
    } else if app.is_on_results() {
        Line::from(vec![
            Span::styled("[q]", key_style(Color::Yellow)),
            Span::raw(" Quit  "),
            Span::styled("[Tab]", key_style(Color::Yellow)),
            Span::raw(" Section  "),
            Span::styled("[h l]", key_style(Color::Yellow)),
            Span::raw(" Chart  "),
            Span::styled("[↑↓ / j k]", key_style(Color::Yellow)),
            Span::raw(" Article  "),
            Span::styled("[Enter]", key_style(Color::Green)),
            Span::raw(" Refresh  "),
            Span::styled("[ESC / f]", key_style(Color::Yellow)),
            Span::raw(" Form"),
        ])
    } else {
        Line::from(vec![
            Span::styled("[q]", key_style(Color::Yellow)),
            Span::raw(" Quit  "),
            Span::styled("[↑↓ / j k]", key_style(Color::Yellow)),
            Span::raw(" Field  "),
            Span::styled("[h l]", key_style(Color::Yellow)),
            Span::raw(" Change  "),
            Span::styled("[Space]", key_style(Color::Yellow)),
            Span::raw(" Toggle  "),
            Span::styled("[e]", key_style(Color::Yellow)),
            Span::raw(" Ticker  "),
            Span::styled("[Enter]", key_style(Color::Green)),
            Span::raw(" Run  "),
            Span::styled("[r]", key_style(Color::Yellow)),
            Span::raw(" Results  "),
            Span::styled("[c]", key_style(Color::Red)),
            Span::raw(" Clear cache"),
        ])
    };

    let paragraph = Paragraph::new(vec![shortcuts])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Input Mode : Saisie du ticker
// ============================================================================

/// Footer en mode input : prompt + buffer + curseur
fn render_input_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(" [Enter] Confirm  [ESC] Cancel ");

    let input_line = Line::from(vec![
        Span::styled(app.input_prompt.as_str(), key_style(Color::Cyan)),
        Span::styled(app.input_buffer.as_str(), Style::default().fg(Color::White)),
        Span::styled(
            "█",
            Style::default().fg(Color::White).add_modifier(Modifier::SLOW_BLINK),
        ),
    ]);

    let paragraph = Paragraph::new(vec![input_line])
        .block(block)
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Notes pédagogiques
// ============================================================================
//
// CONCEPTS RATATUI APPRIS :
//
// 1. Layout imbriqués
//    - Vertical pour header / contenu / footer
//    - Horizontal pour les colonnes d'une section
//
// 2. Widgets
//    - Tabs : onglets avec sélection
//    - Gauge : pourcentage visuel
//    - Paragraph + Wrap : texte long (résumés d'articles)
//
// CONCEPTS RUST APPRIS :
//
// 1. Fonctions génériques sur SectionOutcome<T>
//    - outcome_line() sert à toutes les sections
//
// ============================================================================
