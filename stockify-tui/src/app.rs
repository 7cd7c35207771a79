use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use smol_str::SmolStr;
use std::sync::Arc;
use stockify_data::{
    LiveSession, LiveSnapshot, OptionSide, Strike,
    chain::{ChainView, DEFAULT_STRIKE_DEPTH},
    gateway::MarketGateway,
};
use tracing::info;

/// Symbols offered when `STOCKIFY_SYMBOLS` is not set.
pub const DEFAULT_SYMBOLS: &str = "NIFTY,BANKNIFTY,FINNIFTY,MIDCPNIFTY";

/// Get the symbol rotation from the STOCKIFY_SYMBOLS env var.
pub fn symbols_from_env() -> Vec<SmolStr> {
    parse_symbols(
        &std::env::var("STOCKIFY_SYMBOLS").unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string()),
    )
}

fn parse_symbols(raw: &str) -> Vec<SmolStr> {
    raw.split(',')
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .map(SmolStr::from)
        .collect()
}

/// User intent decoded from a key press.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Action {
    Quit,
    CloseHistory,
    ToggleReversed,
    ToggleHighlighting,
    TogglePolling,
    PreviousExpiry,
    NextExpiry,
    NextSymbol,
    SelectUp,
    SelectDown,
    WidenWindow,
    NarrowWindow,
    ToggleFullLadder,
    OpenHistory(OptionSide),
}

impl Action {
    pub fn from_key(key: KeyEvent, history_open: bool) -> Option<Self> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        match key.code {
            KeyCode::Esc if history_open => Some(Action::CloseHistory),
            KeyCode::Esc | KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::ToggleReversed),
            KeyCode::Char('h') => Some(Action::ToggleHighlighting),
            KeyCode::Char('p') => Some(Action::TogglePolling),
            KeyCode::Char('[') => Some(Action::PreviousExpiry),
            KeyCode::Char(']') => Some(Action::NextExpiry),
            KeyCode::Char('s') => Some(Action::NextSymbol),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::SelectUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::SelectDown),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::WidenWindow),
            KeyCode::Char('-') => Some(Action::NarrowWindow),
            KeyCode::Char('a') => Some(Action::ToggleFullLadder),
            KeyCode::Char('c') => Some(Action::OpenHistory(OptionSide::Call)),
            KeyCode::Char('x') => Some(Action::OpenHistory(OptionSide::Put)),
            _ => None,
        }
    }
}

/// Terminal application state wrapped around a running [`LiveSession`].
pub struct App<Gateway> {
    session: LiveSession<Gateway>,
    symbols: Vec<SmolStr>,
    /// Cursor strike. Falls back to the strike nearest spot.
    selected: Option<Strike>,
    /// Strike rows the chain table can draw this frame.
    visible_rows: usize,
    pub should_quit: bool,
}

impl<Gateway> App<Gateway>
where
    Gateway: MarketGateway + 'static,
{
    pub fn new(session: LiveSession<Gateway>, symbols: Vec<SmolStr>) -> Self {
        Self {
            session,
            symbols,
            selected: None,
            visible_rows: usize::MAX,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &LiveSession<Gateway> {
        &self.session
    }

    pub fn into_session(self) -> LiveSession<Gateway> {
        self.session
    }

    pub fn set_visible_rows(&mut self, rows: usize) {
        self.visible_rows = rows;
    }

    /// Snapshot and chain view for the current render pass, narrowed to the drawable rows.
    pub fn view(&self) -> Option<(Arc<LiveSnapshot>, ChainView)> {
        let snapshot = self.session.store().snapshot()?;
        let options = self.session.store().view_options().fit_rows(self.visible_rows);
        let view = ChainView::build(&snapshot, options)?;
        Some((snapshot, view))
    }

    /// Cursor strike, if it is among the displayed rows.
    pub fn selected_strike(&self, view: &ChainView) -> Option<Strike> {
        self.selected
            .filter(|strike| view.rows.iter().any(|row| row.strike == *strike))
            .or(view.stratification.pivot)
            .or(view.stratification.nearest_strike)
    }

    pub fn handle(&mut self, action: Action) {
        let store = self.session.store().clone();

        match action {
            Action::Quit => self.should_quit = true,
            Action::CloseHistory => self.session.close_history(),
            Action::ToggleReversed => store.set_reversed(!store.is_reversed()),
            Action::ToggleHighlighting => store.set_highlighting(!store.is_highlighting()),
            Action::TogglePolling => {
                store.set_polling_enabled(!store.is_polling_enabled());
            }
            Action::PreviousExpiry => {
                store.step_expiry(-1);
            }
            Action::NextExpiry => {
                store.step_expiry(1);
            }
            Action::NextSymbol => {
                let current = store.symbol();
                if let Some(next) = next_symbol(&self.symbols, &current) {
                    self.selected = None;
                    store.set_symbol(next.clone());
                }
            }
            Action::SelectUp => self.move_selection(-1),
            Action::SelectDown => self.move_selection(1),
            Action::WidenWindow | Action::NarrowWindow => {
                let depth = store.view_options().depth.unwrap_or(DEFAULT_STRIKE_DEPTH);
                let depth = match action {
                    Action::WidenWindow => depth.saturating_add(1),
                    _ => depth.saturating_sub(1).max(1),
                };
                store.set_strike_depth(Some(depth));
            }
            Action::ToggleFullLadder => {
                let depth = match store.view_options().depth {
                    Some(_) => None,
                    None => Some(DEFAULT_STRIKE_DEPTH),
                };
                store.set_strike_depth(depth);
            }
            Action::OpenHistory(side) => {
                let Some(strike) = self.view().and_then(|(_, view)| self.selected_strike(&view))
                else {
                    return;
                };
                info!(%strike, %side, "opening strike history");
                self.session.open_history(strike, side);
            }
        }
    }

    fn move_selection(&mut self, offset: isize) {
        let Some((_, view)) = self.view() else {
            return;
        };
        let Some(current) = self.selected_strike(&view) else {
            return;
        };

        self.selected = view
            .rows
            .iter()
            .position(|row| row.strike == current)
            .map(|index| {
                let last = view.rows.len().saturating_sub(1);
                index.saturating_add_signed(offset).min(last)
            })
            .map(|index| view.rows[index].strike);
    }
}

/// Symbol following `current` in the rotation, wrapping around.
fn next_symbol<'a>(symbols: &'a [SmolStr], current: &str) -> Option<&'a SmolStr> {
    let next = symbols
        .iter()
        .position(|symbol| symbol == current)
        .map(|index| (index + 1) % symbols.len())
        .unwrap_or(0);

    symbols.get(next).filter(|symbol| *symbol != current)
}
