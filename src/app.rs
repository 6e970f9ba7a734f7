// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état de l'application TUI : formulaire, dernier rapport, navigation
//
// CONCEPTS RUST :
// 1. State Management : centraliser l'état dans une seule structure
// 2. Mutabilité contrôlée : &mut self pour modifier l'état
// 3. Enums pour state machines : Screen, FormField, ResultsTab
//
// PATTERN : "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Toutes les modifications passent par les méthodes de App
// - Le worker thread ne touche jamais App : il renvoie des messages
// ============================================================================

use crate::charts::ChartKind;
use crate::models::{Interval, Period};
use crate::session::{
    DashboardReport, DashboardRequest, ModuleToggles, DEFAULT_NEWS_LIMIT, MAX_NEWS_LIMIT,
    MIN_NEWS_LIMIT,
};

pub const DEFAULT_TICKER: &str = "AAPL";

// ============================================================================
// Enums de navigation
// ============================================================================

/// Écrans de l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Formulaire : ticker, période, intervalle, news, modules
    Form,

    /// Résultats du dernier rapport
    Results,

    /// Mode saisie du ticker
    /// CONCEPT : Modal input mode (Vim-like)
    /// - Capture les touches pour construire un buffer
    /// - Enter valide, ESC annule
    InputMode,
}

/// Champs du formulaire, dans l'ordre d'affichage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Ticker,
    Period,
    Interval,
    NewsLimit,
    MarketData,
    KeyMetrics,
    Charts,
    News,
    Sentiment,
}

impl FormField {
    pub fn all() -> [FormField; 9] {
        [
            FormField::Ticker,
            FormField::Period,
            FormField::Interval,
            FormField::NewsLimit,
            FormField::MarketData,
            FormField::KeyMetrics,
            FormField::Charts,
            FormField::News,
            FormField::Sentiment,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Ticker => "Ticker",
            FormField::Period => "Period",
            FormField::Interval => "Interval",
            FormField::NewsLimit => "News articles",
            FormField::MarketData => "Market Data",
            FormField::KeyMetrics => "Key Metrics",
            FormField::Charts => "Technical Analysis",
            FormField::News => "Market News",
            FormField::Sentiment => "Market Sentiment",
        }
    }

    /// true pour les cases à cocher des modules
    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            FormField::MarketData
                | FormField::KeyMetrics
                | FormField::Charts
                | FormField::News
                | FormField::Sentiment
        )
    }
}

/// Onglets de la vue résultats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsTab {
    Overview,
    Charts,
    News,
    Sentiment,
}

impl ResultsTab {
    pub fn all() -> [ResultsTab; 4] {
        [
            ResultsTab::Overview,
            ResultsTab::Charts,
            ResultsTab::News,
            ResultsTab::Sentiment,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResultsTab::Overview => "Overview",
            ResultsTab::Charts => "Charts",
            ResultsTab::News => "News",
            ResultsTab::Sentiment => "Sentiment",
        }
    }

    pub fn index(&self) -> usize {
        Self::all().iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> ResultsTab {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> ResultsTab {
        let all = Self::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}

// ============================================================================
// Formulaire
// ============================================================================

/// Valeurs saisies dans le formulaire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub news_limit: usize,
    pub modules: ModuleToggles,
    pub focus: FormField,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            ticker: DEFAULT_TICKER.to_string(),
            period: Period::default(),
            interval: Interval::default(),
            news_limit: DEFAULT_NEWS_LIMIT,
            modules: ModuleToggles::default(),
            focus: FormField::Ticker,
        }
    }
}

impl FormState {
    /// Valeur d'une case à cocher
    pub fn toggle_value(&self, field: FormField) -> Option<bool> {
        match field {
            FormField::MarketData => Some(self.modules.market_data),
            FormField::KeyMetrics => Some(self.modules.key_metrics),
            FormField::Charts => Some(self.modules.charts),
            FormField::News => Some(self.modules.news),
            FormField::Sentiment => Some(self.modules.sentiment),
            _ => None,
        }
    }

    fn flip(&mut self, field: FormField) {
        let modules = &mut self.modules;
        match field {
            FormField::MarketData => modules.market_data = !modules.market_data,
            FormField::KeyMetrics => modules.key_metrics = !modules.key_metrics,
            FormField::Charts => modules.charts = !modules.charts,
            FormField::News => modules.news = !modules.news,
            FormField::Sentiment => modules.sentiment = !modules.sentiment,
            _ => {}
        }
    }
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Écran actuellement affiché
    pub current_screen: Screen,

    /// Formulaire de requête
    pub form: FormState,

    /// Dernier rapport reçu du worker
    pub report: Option<DashboardReport>,

    /// Onglet actif de la vue résultats
    pub results_tab: ResultsTab,

    /// Graphique affiché dans l'onglet Charts
    pub chart_kind: ChartKind,

    /// Article sélectionné dans les onglets News / Sentiment
    pub news_index: usize,

    /// Two-step quit pour éviter les sorties accidentelles
    /// - Première pression de 'q' : confirm_quit = true
    /// - Deuxième pression de 'q' : running = false (quit réel)
    /// - N'importe quelle autre touche : confirm_quit = false (annulation)
    pub confirm_quit: bool,

    /// Une requête est en cours dans le worker
    pub is_loading: bool,

    /// Message de chargement optionnel
    pub loading_message: Option<String>,

    /// Dernier message de statut (erreur ou info)
    pub status_message: Option<String>,

    /// Buffer de saisie pour le mode Input
    pub input_buffer: String,

    /// Prompt affiché en mode Input
    pub input_prompt: String,
}

impl App {
    pub fn new() -> Self {
        Self::with_form(FormState::default())
    }

    /// Crée une App avec un formulaire prérempli (arguments CLI)
    pub fn with_form(form: FormState) -> Self {
        Self {
            running: true,
            current_screen: Screen::Form,
            form,
            report: None,
            results_tab: ResultsTab::Overview,
            chart_kind: ChartKind::Price,
            news_index: 0,
            confirm_quit: false,
            is_loading: false,
            loading_message: None,
            status_message: None,
            input_buffer: String::new(),
            input_prompt: String::new(),
        }
    }

    /// Quitte l'application
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Vérifie si l'application doit continuer
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ========================================================================
    // Formulaire
    // ========================================================================

    /// Focus sur le champ précédent
    pub fn focus_previous(&mut self) {
        let fields = FormField::all();
        let index = fields.iter().position(|f| *f == self.form.focus).unwrap_or(0);
        self.form.focus = fields[index.saturating_sub(1)];
    }

    /// Focus sur le champ suivant
    pub fn focus_next(&mut self) {
        let fields = FormField::all();
        let index = fields.iter().position(|f| *f == self.form.focus).unwrap_or(0);
        self.form.focus = fields[(index + 1).min(fields.len() - 1)];
    }

    /// Valeur suivante pour le champ actif (l / →)
    pub fn increase_field(&mut self) {
        match self.form.focus {
            FormField::Period => self.form.period = self.form.period.next(),
            FormField::Interval => self.form.interval = self.form.interval.next(),
            FormField::NewsLimit => {
                self.form.news_limit = (self.form.news_limit + 1).min(MAX_NEWS_LIMIT)
            }
            field if field.is_toggle() => self.form.flip(field),
            _ => {}
        }
    }

    /// Valeur précédente pour le champ actif (h / ←)
    pub fn decrease_field(&mut self) {
        match self.form.focus {
            FormField::Period => self.form.period = self.form.period.previous(),
            FormField::Interval => self.form.interval = self.form.interval.previous(),
            FormField::NewsLimit => {
                self.form.news_limit = self.form.news_limit.saturating_sub(1).max(MIN_NEWS_LIMIT)
            }
            field if field.is_toggle() => self.form.flip(field),
            _ => {}
        }
    }

    /// Coche / décoche le module actif (Espace)
    pub fn toggle_focused(&mut self) {
        let field = self.form.focus;
        if field.is_toggle() {
            self.form.flip(field);
        }
    }

    /// Construit la requête à partir du formulaire
    pub fn request(&self) -> DashboardRequest {
        DashboardRequest::new(self.form.ticker.clone(), self.form.period, self.form.interval)
            .with_news_limit(self.form.news_limit)
            .with_modules(self.form.modules)
    }

    /// true si la combinaison période / intervalle est acceptée
    pub fn is_combination_supported(&self) -> bool {
        self.form.interval.supports(self.form.period)
    }

    // ========================================================================
    // Résultats
    // ========================================================================

    /// Enregistre un rapport et affiche la vue résultats
    pub fn set_report(&mut self, report: DashboardReport) {
        let failures = report.failures().len();
        self.status_message = Some(if failures == 0 {
            format!("{} : rapport prêt", report.symbol)
        } else {
            format!("{} : {} module(s) en échec", report.symbol, failures)
        });
        self.report = Some(report);
        self.news_index = 0;
        self.current_screen = Screen::Results;
    }

    pub fn show_form(&mut self) {
        self.current_screen = Screen::Form;
    }

    pub fn show_results(&mut self) {
        if self.report.is_some() {
            self.current_screen = Screen::Results;
        }
    }

    pub fn is_on_form(&self) -> bool {
        self.current_screen == Screen::Form
    }

    pub fn is_on_results(&self) -> bool {
        self.current_screen == Screen::Results
    }

    pub fn next_tab(&mut self) {
        self.results_tab = self.results_tab.next();
    }

    pub fn previous_tab(&mut self) {
        self.results_tab = self.results_tab.previous();
    }

    /// Cycle Price → SMA → Returns
    pub fn next_chart(&mut self) {
        let all = ChartKind::all();
        let index = all.iter().position(|k| *k == self.chart_kind).unwrap_or(0);
        self.chart_kind = all[(index + 1) % all.len()];
    }

    pub fn previous_chart(&mut self) {
        let all = ChartKind::all();
        let index = all.iter().position(|k| *k == self.chart_kind).unwrap_or(0);
        self.chart_kind = all[(index + all.len() - 1) % all.len()];
    }

    /// Nombre d'articles du rapport courant
    pub fn news_count(&self) -> usize {
        self.report
            .as_ref()
            .and_then(|r| r.news.ready())
            .map(|items| items.len())
            .unwrap_or(0)
    }

    /// CONCEPT RUST : Saturating arithmetic
    /// - saturating_sub() : ne descend pas en dessous de 0
    pub fn news_up(&mut self) {
        self.news_index = self.news_index.saturating_sub(1);
    }

    pub fn news_down(&mut self) {
        let max_index = self.news_count().saturating_sub(1);
        self.news_index = (self.news_index + 1).min(max_index);
    }

    // ========================================================================
    // Quit / chargement
    // ========================================================================

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    pub fn start_loading(&mut self, message: Option<String>) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    pub fn is_loading_data(&self) -> bool {
        self.is_loading
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    // ========================================================================
    // Input Mode Management
    // ========================================================================

    /// Entre en mode input, prérempli avec le ticker actuel
    pub fn start_input(&mut self, prompt: String) {
        self.current_screen = Screen::InputMode;
        self.input_buffer = self.form.ticker.clone();
        self.input_prompt = prompt;
    }

    /// Annule le mode input et retourne au formulaire
    pub fn cancel_input(&mut self) {
        self.current_screen = Screen::Form;
        self.input_buffer.clear();
        self.input_prompt.clear();
    }

    /// Valide la saisie : le ticker est normalisé en majuscules
    pub fn submit_input(&mut self) -> String {
        let value = self.input_buffer.trim().to_uppercase();
        if !value.is_empty() {
            self.form.ticker = value.clone();
        }
        self.current_screen = Screen::Form;
        self.input_buffer.clear();
        self.input_prompt.clear();
        value
    }

    pub fn append_char(&mut self, c: char) {
        self.input_buffer.push(c);
    }

    pub fn backspace(&mut self) {
        self.input_buffer.pop();
    }

    pub fn is_in_input_mode(&self) -> bool {
        self.current_screen == Screen::InputMode
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_creation() {
        let app = App::new();
        assert!(app.is_running());
        assert!(app.is_on_form());
        assert_eq!(app.form.ticker, "AAPL");
        assert_eq!(app.form.period, Period::OneMonth);
        assert_eq!(app.form.interval, Interval::D1);
        assert_eq!(app.form.news_limit, 5);
    }

    #[test]
    fn test_app_quit() {
        let mut app = App::new();
        app.request_quit();
        assert!(app.is_awaiting_quit_confirmation());
        app.cancel_quit();
        assert!(!app.is_awaiting_quit_confirmation());

        app.quit();
        assert!(!app.is_running());
    }

    #[test]
    fn test_form_navigation_is_bounded() {
        let mut app = App::new();

        app.focus_previous();
        assert_eq!(app.form.focus, FormField::Ticker);

        for _ in 0..20 {
            app.focus_next();
        }
        assert_eq!(app.form.focus, FormField::Sentiment);
    }

    #[test]
    fn test_news_limit_bounds() {
        let mut app = App::new();
        app.form.focus = FormField::NewsLimit;

        for _ in 0..30 {
            app.increase_field();
        }
        assert_eq!(app.form.news_limit, 20);

        for _ in 0..30 {
            app.decrease_field();
        }
        assert_eq!(app.form.news_limit, 1);
    }

    #[test]
    fn test_toggle_module() {
        let mut app = App::new();
        app.form.focus = FormField::Sentiment;

        app.toggle_focused();
        assert!(!app.form.modules.sentiment);
        assert!(!app.request().modules.sentiment);

        // Espace sur un champ non-case : aucun effet
        app.form.focus = FormField::Period;
        app.toggle_focused();
        assert_eq!(app.form.period, Period::OneMonth);
    }

    #[test]
    fn test_ticker_input() {
        let mut app = App::new();
        app.start_input("Ticker: ".to_string());
        assert!(app.is_in_input_mode());
        assert_eq!(app.input_buffer, "AAPL");

        app.input_buffer.clear();
        for c in "msft".chars() {
            app.append_char(c);
        }
        assert_eq!(app.submit_input(), "MSFT");
        assert_eq!(app.form.ticker, "MSFT");
        assert!(app.is_on_form());
    }

    #[test]
    fn test_request_from_form() {
        let mut app = App::new();
        app.form.focus = FormField::Interval;
        app.decrease_field();

        let request = app.request();
        assert_eq!(request.interval, Interval::H1);
        assert_eq!(request.ticker, "AAPL");
        assert!(app.is_combination_supported());
    }

    #[test]
    fn test_tab_and_chart_cycles() {
        let mut app = App::new();
        app.previous_tab();
        assert_eq!(app.results_tab, ResultsTab::Sentiment);
        app.next_tab();
        assert_eq!(app.results_tab, ResultsTab::Overview);

        app.previous_chart();
        assert_eq!(app.chart_kind, ChartKind::Returns);
        app.next_chart();
        assert_eq!(app.chart_kind, ChartKind::Price);
    }
}
