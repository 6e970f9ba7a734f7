// ============================================================================
// Chart - Rendu des figures de l'analyse technique
// ============================================================================
// Dessine une ChartFigure (Price, SMA, Returns) avec le widget Chart
//
// CONCEPTS RUST :
// 1. Emprunts : les Dataset empruntent les points de la figure (pas de copie)
// 2. Match exhaustif : une couleur par SeriesRole
//
// CONCEPTS RATATUI :
// 1. Tabs : sélection du graphique affiché
// 2. Dataset / Axis : séries et axes déjà calculés par le ChartRenderer
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Tabs},
    Frame,
};

use crate::app::App;
use crate::charts::{ChartFigure, ChartKind, SeriesRole};
use crate::session::SectionOutcome;

/// Dessine l'onglet Charts du rapport courant
pub fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let Some(report) = app.report.as_ref() else {
        render_no_data(frame, area, "Aucun rapport");
        return;
    };

    let charts = match &report.charts {
        SectionOutcome::Ready(charts) => charts,
        SectionOutcome::Failed(failure) => {
            render_no_data(frame, area, &failure.to_string());
            return;
        }
        SectionOutcome::Skipped(reason) => {
            render_no_data(frame, area, reason);
            return;
        }
        SectionOutcome::Disabled => {
            render_no_data(frame, area, "Technical Analysis désactivé");
            return;
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    render_chart_tabs(frame, app.chart_kind, chunks[0]);
    render_figure(frame, charts.get(app.chart_kind), chunks[1]);
}

/// Sélecteur Price / SMA / Returns
fn render_chart_tabs(frame: &mut Frame, selected: ChartKind, area: Rect) {
    let kinds = ChartKind::all();
    let titles: Vec<Line> = kinds.iter().map(|k| Line::from(k.label())).collect();
    let index = kinds.iter().position(|k| *k == selected).unwrap_or(0);

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" [h/l] Graphique "),
        )
        .select(index)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

/// Couleur d'une courbe selon son rôle
fn role_color(role: SeriesRole) -> Color {
    match role {
        SeriesRole::Close => Color::Cyan,
        SeriesRole::SmaShort => Color::Yellow,
        SeriesRole::SmaLong => Color::Magenta,
        SeriesRole::DailyReturn => Color::Green,
    }
}

/// Précision des labels de l'axe Y
fn y_precision(kind: ChartKind) -> usize {
    match kind {
        ChartKind::Price | ChartKind::Sma => 2,
        ChartKind::Returns => 4,
    }
}

/// Dessine une figure
///
/// CONCEPT RATATUI : Marker::Dot + GraphType::Line
/// - Les points successifs sont reliés
/// - Une courbe vide (SMA non définie) est simplement ignorée
pub fn render_figure(frame: &mut Frame, figure: &ChartFigure, area: Rect) {
    if !figure.has_points() {
        let message = format!("Pas assez de données pour {}", figure.kind.label());
        render_no_data(frame, area, &message);
        return;
    }

    let datasets: Vec<Dataset> = figure
        .series
        .iter()
        .filter(|s| !s.points.is_empty())
        .map(|s| {
            Dataset::default()
                .name(s.name.clone())
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(role_color(s.role)))
                .data(&s.points)
        })
        .collect();

    let x_axis = Axis::default()
        .title(figure.x_title.clone())
        .style(Style::default().fg(Color::Gray))
        .bounds(figure.x_bounds)
        .labels(figure.x_labels.iter().cloned().map(Span::raw).collect());

    let y_axis = Axis::default()
        .title(figure.y_title.clone())
        .style(Style::default().fg(Color::Gray))
        .bounds(figure.y_bounds)
        .labels(
            figure
                .y_labels(y_precision(figure.kind))
                .into_iter()
                .map(Span::raw)
                .collect(),
        );

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", figure.title)),
        )
        .x_axis(x_axis)
        .y_axis(y_axis);

    frame.render_widget(chart, area);
}

/// Message à la place d'un graphique
pub fn render_no_data(frame: &mut Frame, area: Rect, message: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" ⚠ Graphique indisponible ");

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )),
    ];

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Notes pédagogiques
// ============================================================================
//
// CONCEPTS RATATUI APPRIS :
//
// 1. Figures pré-calculées
//    - Bornes et labels viennent du ChartRenderer (testables sans terminal)
//    - Le widget ne fait que dessiner
//
// 2. Tabs
//    - select(index) + highlight_style pour l'onglet actif
//
// CONCEPTS RUST APPRIS :
//
// 1. let-else
//    - Sortie anticipée quand il n'y a pas de rapport
//
// ============================================================================
