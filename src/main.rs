// ============================================================================
// MarketMetrics - Point d'entrée
// ============================================================================
// Tableau de bord boursier : cours, KPIs, graphiques, news et sentiment
// - Sans argument : TUI interactive (formulaire + résultats)
// - `report` : une requête, rapport texte sur stdout
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop : boucle qui gère événements et rendering
// 3. Async dans sync : le worker thread possède un runtime tokio
// 4. Message passing : l'UI et le worker ne partagent aucun état
// ============================================================================

use std::io;
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info, warn};

use marketmetrics::app::{App, ResultsTab};
use marketmetrics::cli::{Cli, Command, ReportArgs};
use marketmetrics::config::AppConfig;
use marketmetrics::report::text_report;
use marketmetrics::session::{DashboardReport, DashboardRequest, SectionOutcome, Session};
use marketmetrics::ui::events::{Event, EventHandler};
use marketmetrics::ui::render;

// ============================================================================
// AppCommand / AppResult : messages entre l'UI et le worker
// ============================================================================
// CONCEPT RUST : Command pattern avec channels
// - L'event loop envoie des commandes au worker thread
// - Le worker possède la Session (caches + modèle) et exécute l'async
// - Il renvoie des résultats que l'event loop applique à App
// ============================================================================

/// Commandes envoyées au worker thread
#[derive(Debug, Clone)]
enum AppCommand {
    /// Exécuter le pipeline complet pour une requête
    RunDashboard(DashboardRequest),

    /// Vider les caches de la session
    ClearCache,
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
enum AppResult {
    /// Rapport prêt (les échecs de composants sont dans le rapport)
    ReportReady(Box<DashboardReport>),

    CacheCleared,

    /// Le worker n'a pas pu démarrer (runtime ou client HTTP)
    WorkerFailed(String),
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// CONCEPT : Logging dans une app TUI
// - Les println! ne fonctionnent pas une fois le TUI lancé
// - On log vers un fichier avec rotation quotidienne
// ============================================================================

/// Répertoire des logs
///
/// - Linux : ~/.local/share/marketmetrics/logs
/// - macOS : ~/Library/Application Support/marketmetrics/logs
/// - Windows : %LOCALAPPDATA%\marketmetrics\logs
/// - Sinon : ./logs
fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("marketmetrics").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Initialise le système de logging vers fichier
///
/// ```bash
/// tail -f ~/.local/share/marketmetrics/logs/marketmetrics.log.*
/// RUST_LOG=marketmetrics=trace marketmetrics
/// ```
fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "marketmetrics.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            // Par défaut : debug pour marketmetrics, info pour les dépendances
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketmetrics=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!("MarketMetrics starting up");
    let config = AppConfig::from_env();
    if !config.has_news_credentials() {
        warn!("FINNHUB_API_KEY not set, Market News will fail with an authentication error");
    }

    match cli.command {
        Some(Command::Report(args)) => run_report(&config, &args),
        None => run_tui(config, App::with_form(cli.query.form())),
    }
}

// ============================================================================
// Mode report : une requête, sortie texte
// ============================================================================

fn run_report(config: &AppConfig, args: &ReportArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;
    let mut session = Session::from_config(config).context("Échec de la création de la session")?;

    let request = args.query.request();
    info!(ticker = %request.ticker, "Running report");
    let report = runtime.block_on(session.run(&request));
    info!(report = %report, "Report finished");

    print!("{}", text_report(&report));

    if let Some(dir) = &args.export {
        match &report.charts {
            SectionOutcome::Ready(charts) => {
                let paths = charts
                    .export(dir)
                    .with_context(|| format!("Échec de l'export vers {}", dir.display()))?;
                println!("\n[Export]");
                for path in paths {
                    println!("  ✓ {}", path.display());
                }
            }
            _ => {
                warn!(dir = %dir.display(), "No charts to export");
                eprintln!("⚠️  Aucune figure à exporter");
            }
        }
    }

    session.clear();
    Ok(())
}

// ============================================================================
// Mode TUI
// ============================================================================

fn run_tui(config: AppConfig, mut app: App) -> Result<()> {
    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    // CONCEPT RUST : mpsc channels
    // - command_tx/rx : UI → worker
    // - result_tx/rx : worker → UI
    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    let worker = spawn_background_worker(command_rx, result_tx, config);

    let events = EventHandler::new();

    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &events, command_tx, result_rx);

    // Restaure le terminal (même en cas d'erreur)
    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    // command_tx a été consommé par run() : le worker sort de sa boucle
    if worker.join().is_err() {
        error!("Worker thread panicked");
    }

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// CONCEPT : Worker Thread Pattern
// - Thread dédié aux appels réseau et à l'inférence
// - Possède la Session : les caches vivent aussi longtemps que la TUI
// - block_on() bloque le worker, jamais l'UI
// ============================================================================

fn spawn_background_worker(
    command_rx: mpsc::Receiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
    config: AppConfig,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = ?e, "Failed to create tokio runtime");
                let _ = result_tx.send(AppResult::WorkerFailed(format!("runtime tokio : {}", e)));
                return;
            }
        };

        let mut session = match Session::from_config(&config) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to create session");
                let _ = result_tx.send(AppResult::WorkerFailed(e.to_string()));
                return;
            }
        };

        // Channel fermé = l'UI a quitté
        while let Ok(command) = command_rx.recv() {
            info!(?command, "Worker received command");

            match command {
                AppCommand::RunDashboard(request) => {
                    let report = runtime.block_on(session.run(&request));
                    let (prices, news) = session.cache_sizes();
                    info!(
                        report = %report,
                        cached_prices = prices,
                        cached_news = news,
                        model_loaded = session.sentiment_model_loaded(),
                        "Dashboard report ready"
                    );
                    if result_tx.send(AppResult::ReportReady(Box::new(report))).is_err() {
                        break;
                    }
                }
                AppCommand::ClearCache => {
                    session.clear();
                    let _ = result_tx.send(AppResult::CacheCleared);
                }
            }
        }

        session.clear();
        info!(started_at = %session.started_at(), "Worker thread exiting (channel closed)");
    })
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// À chaque itération :
//   0. Appliquer les résultats du worker
//   1. Dessiner l'interface
//   2. Traiter un événement (ou un tick)
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    command_tx: mpsc::Sender<AppCommand>,
    result_rx: mpsc::Receiver<AppResult>,
) -> Result<()> {
    let mut worker_alive = true;

    while app.is_running() {
        // CONCEPT : Non-blocking receive avec try_recv
        // - On vide le channel avant de dessiner
        while worker_alive {
            match result_rx.try_recv() {
                Ok(result) => apply_result(app, result),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    error!("Worker thread disconnected");
                    worker_alive = false;
                    app.stop_loading();
                    app.set_status("⚠ Worker arrêté : relancez l'application");
                }
            }
        }

        terminal.draw(|frame| render(frame, app))?;

        match events.next() {
            Ok(event) => handle_event(app, event, &command_tx),
            Err(e) => debug!(error = ?e, "Failed to read terminal event"),
        }
    }

    Ok(())
}

/// Applique un résultat du worker à l'état de l'application
fn apply_result(app: &mut App, result: AppResult) {
    match result {
        AppResult::ReportReady(report) => {
            app.stop_loading();
            for failure in report.failures() {
                warn!(failure = %failure, "Component failure shown to user");
            }
            app.set_report(*report);
        }
        AppResult::CacheCleared => {
            app.set_status("Cache de session vidé");
        }
        AppResult::WorkerFailed(message) => {
            app.stop_loading();
            app.set_status(format!("⚠ {}", message));
        }
    }
}

/// Envoie une requête au worker et active l'indicateur de chargement
fn submit_request(app: &mut App, request: DashboardRequest, command_tx: &mpsc::Sender<AppCommand>) {
    if app.is_loading_data() {
        debug!("Request ignored, worker busy");
        return;
    }

    info!(ticker = %request.ticker, period = %request.period, interval = %request.interval, "User submitted request");
    app.start_loading(Some(format!(
        "Analyse de {} ({} / {})...",
        request.ticker.trim().to_uppercase(),
        request.period.label(),
        request.interval.label()
    )));

    if command_tx.send(AppCommand::RunDashboard(request)).is_err() {
        app.stop_loading();
        app.set_status("⚠ Worker arrêté : relancez l'application");
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

/// Traite un événement et met à jour l'état de l'application
///
/// CONCEPT RUST : Pattern matching avec guards
/// - L'ordre des bras compte : le mode input capture les caractères d'abord
/// - Navigation contextuelle selon l'écran actuel
fn handle_event(app: &mut App, event: Event, command_tx: &mpsc::Sender<AppCommand>) {
    use marketmetrics::ui::events::{
        get_char_from_event, is_backspace_event, is_backtab_event, is_clear_cache_event,
        is_down_event, is_edit_event, is_enter_event, is_escape_event, is_form_event,
        is_left_event, is_quit_event, is_results_event, is_right_event, is_space_event,
        is_tab_event, is_ticker_char_event, is_up_event,
    };

    match event {
        // ========================================
        // Input Mode : saisie du ticker
        // ========================================
        Event::Key(_) if is_escape_event(&event) && app.is_in_input_mode() => {
            info!("User cancelled input");
            app.cancel_input();
        }
        Event::Key(_) if is_enter_event(&event) && app.is_in_input_mode() => {
            let ticker = app.submit_input();
            if ticker.is_empty() {
                debug!("Empty ticker, keeping previous value");
            } else {
                info!(ticker = %ticker, "User set ticker");
            }
        }
        Event::Key(_) if is_backspace_event(&event) && app.is_in_input_mode() => {
            app.backspace();
        }
        Event::Key(_) if is_ticker_char_event(&event) && app.is_in_input_mode() => {
            if let Some(c) = get_char_from_event(&event) {
                app.append_char(c);
            }
        }
        Event::Key(_) if app.is_in_input_mode() => {}

        // Two-step quit
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        // ========================================
        // Formulaire
        // ========================================
        Event::Key(_) if is_up_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.focus_previous();
        }
        Event::Key(_) if is_down_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.focus_next();
        }
        Event::Key(_) if is_right_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.increase_field();
            debug!(field = ?app.form.focus, "User changed field value");
        }
        Event::Key(_) if is_left_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.decrease_field();
            debug!(field = ?app.form.focus, "User changed field value");
        }
        Event::Key(_) if is_space_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.toggle_focused();
        }
        Event::Key(_) if is_edit_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.start_input("Ticker: ".to_string());
        }
        Event::Key(_) if is_enter_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            let request = app.request();
            submit_request(app, request, command_tx);
        }
        Event::Key(_) if is_results_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            app.show_results();
        }
        Event::Key(_) if is_clear_cache_event(&event) && app.is_on_form() => {
            app.cancel_quit();
            if command_tx.send(AppCommand::ClearCache).is_err() {
                app.set_status("⚠ Worker arrêté : relancez l'application");
            }
        }

        // ========================================
        // Résultats
        // ========================================
        Event::Key(_) if is_tab_event(&event) && app.is_on_results() => {
            app.cancel_quit();
            app.next_tab();
        }
        Event::Key(_) if is_backtab_event(&event) && app.is_on_results() => {
            app.cancel_quit();
            app.previous_tab();
        }
        Event::Key(_)
            if is_right_event(&event)
                && app.is_on_results()
                && app.results_tab == ResultsTab::Charts =>
        {
            app.cancel_quit();
            app.next_chart();
        }
        Event::Key(_)
            if is_left_event(&event)
                && app.is_on_results()
                && app.results_tab == ResultsTab::Charts =>
        {
            app.cancel_quit();
            app.previous_chart();
        }
        Event::Key(_) if is_up_event(&event) && app.is_on_results() => {
            app.cancel_quit();
            app.news_up();
        }
        Event::Key(_) if is_down_event(&event) && app.is_on_results() => {
            app.cancel_quit();
            app.news_down();
        }
        Event::Key(_) if is_enter_event(&event) && app.is_on_results() => {
            // Même requête : les caches de la session répondent
            app.cancel_quit();
            if let Some(request) = app.report.as_ref().map(|r| r.request.clone()) {
                submit_request(app, request, command_tx);
            }
        }
        Event::Key(_)
            if (is_escape_event(&event) || is_form_event(&event)) && app.is_on_results() =>
        {
            app.cancel_quit();
            debug!("User returned to form");
            app.show_form();
        }

        Event::Tick => {}

        Event::Key(_) => {
            // Toute autre touche : annule la confirmation si active
            app.cancel_quit();
        }

        Event::Error => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================
// IMPORTANT : Toujours restaurer le terminal avant de quitter !
// ============================================================================

/// Configure le terminal en mode TUI (raw mode + alternate screen)
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Échec de l'activation du raw mode")?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Échec de la création du terminal")
}

/// Restaure le terminal dans son état initial
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
