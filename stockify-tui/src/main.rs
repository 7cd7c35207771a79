mod app;
mod ui;

use app::{Action, App};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{error::Error, fs::File, io, sync::Arc, sync::Mutex, time::Duration};
use stockify_data::{
    LiveSession,
    config::{GatewayConfig, PollerConfig, SessionConfig},
    gateway::{HttpGateway, MarketGateway},
};
use tracing::{error, info};

/// Log file used when `STOCKIFY_LOG_FILE` is not set.
const DEFAULT_LOG_FILE: &str = "stockify-tui.log";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let gateway = Arc::new(HttpGateway::new(GatewayConfig::from_env()?)?);
    info!(base_url = %gateway.config().base_url, "connecting to backend");

    let session = LiveSession::start(gateway, &SessionConfig::from_env(), PollerConfig::from_env());
    let mut app = App::new(session, app::symbols_from_env());

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run TUI
    let res = tokio::task::block_in_place(|| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.into_session().shutdown().await;

    if let Err(error) = &res {
        error!(%error, "terminal loop failed");
    }
    res.map_err(Into::into)
}

/// Logs go to a file so they do not corrupt the terminal.
fn init_logging() -> Result<(), Box<dyn Error>> {
    let path = std::env::var("STOCKIFY_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let file = File::options().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn run_app<B, Gateway>(terminal: &mut Terminal<B>, app: &mut App<Gateway>) -> io::Result<()>
where
    B: ratatui::backend::Backend,
    Gateway: MarketGateway + 'static,
{
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = std::time::Instant::now();

    loop {
        app.set_visible_rows(ui::chain_row_budget(terminal.size()?.height));
        terminal.draw(|f| ui::ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                let history_open = app.session().history_panel().is_open();
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = Action::from_key(key, history_open) {
                        app.handle(action);
                    }
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = std::time::Instant::now();
        }
    }
}
