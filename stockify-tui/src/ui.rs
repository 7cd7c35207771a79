use crate::app::App;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Sparkline, Table},
};
use stockify_data::{
    LiveSnapshot, OptionSide, Strike,
    chain::{ChainView, Metric, Moneyness},
    gateway::MarketGateway,
    history::{HistorySeries, HistoryView},
    poller::PollerState,
    snapshot::OptionLeg,
};
use std::rc::Rc;

const BACKGROUND: Color = Color::Rgb(15, 15, 25);
const ACCENT: Color = Color::Rgb(100, 149, 237);
const MUTED: Color = Color::Rgb(128, 128, 150);
const GAIN: Color = Color::Rgb(0, 255, 127);
const LOSS: Color = Color::Rgb(255, 69, 58);
const GOLD: Color = Color::Rgb(255, 215, 0);
const ITM_BACKGROUND: Color = Color::Rgb(38, 34, 18);
const HOT_BACKGROUND: Color = Color::Rgb(120, 40, 40);

/// Call columns, left to right. Put columns mirror them around the strike.
const CALL_COLUMNS: [Column; 5] = [
    Column::Metric(Metric::OpenInterest),
    Column::Metric(Metric::OiChange),
    Column::Metric(Metric::Volume),
    Column::Metric(Metric::ImpliedVolatility),
    Column::Ltp,
];

#[derive(Debug, Copy, Clone)]
enum Column {
    Metric(Metric),
    Ltp,
}

impl Column {
    fn label(&self) -> &'static str {
        match self {
            Column::Metric(metric) => metric.label(),
            Column::Ltp => "LTP",
        }
    }

    fn format(&self, leg: Option<&OptionLeg>) -> String {
        let Some(leg) = leg else {
            return "-".to_string();
        };

        match self {
            Column::Metric(Metric::OpenInterest) | Column::Metric(Metric::Volume) => {
                format_quantity(self.value(leg))
            }
            Column::Metric(Metric::OiChange) => format_percent(self.value(leg)),
            Column::Metric(Metric::ImpliedVolatility) | Column::Ltp => {
                format_price(self.value(leg))
            }
        }
    }

    fn value(&self, leg: &OptionLeg) -> Option<f64> {
        match self {
            Column::Metric(metric) => metric.value(leg),
            Column::Ltp => leg.ltp,
        }
    }
}

const HEADER_HEIGHT: u16 = 4;
const FOOTER_HEIGHT: u16 = 3;
/// Chain block borders plus the column header row.
const CHAIN_CHROME_HEIGHT: u16 = 3;

/// Strike rows the chain table can draw in a terminal `height` lines tall.
pub fn chain_row_budget(height: u16) -> usize {
    height.saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT + CHAIN_CHROME_HEIGHT) as usize
}

fn layout(area: Rect) -> Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area)
}

pub fn ui<Gateway>(f: &mut Frame, app: &App<Gateway>)
where
    Gateway: MarketGateway + 'static,
{
    let chunks = layout(f.area());

    let view = app.view();

    render_header(f, chunks[0], app, view.as_ref().map(|(snapshot, _)| &**snapshot));

    match &view {
        Some((snapshot, view)) => render_chain(f, chunks[1], app, snapshot, view),
        None => render_waiting(f, chunks[1], app),
    }

    render_footer(f, chunks[2], view.as_ref().map(|(_, view)| view));

    let panel = app.session().history_panel().view();
    if panel != HistoryView::Closed {
        render_history(f, f.area(), &panel);
    }
}

fn render_header<Gateway>(
    f: &mut Frame,
    area: Rect,
    app: &App<Gateway>,
    snapshot: Option<&LiveSnapshot>,
) where
    Gateway: MarketGateway + 'static,
{
    let store = app.session().store();

    let (status_symbol, status_text, status_color) = match app.session().poller_state() {
        PollerState::Fetching => ("●", "FETCHING", GOLD),
        PollerState::Scheduled => ("●", "LIVE", GAIN),
        PollerState::Idle if !store.is_polling_enabled() => ("○", "PAUSED", LOSS),
        PollerState::Idle => ("○", "WAITING", MUTED),
    };

    let expiry = store
        .expiry()
        .and_then(|expiry| expiry.datetime())
        .map(|datetime| datetime.format("%d %b %Y").to_string())
        .unwrap_or_else(|| "-".to_string());

    let updated = store
        .snapshot_time()
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let top = Line::from(vec![
        Span::styled(
            format!(" {status_symbol} {status_text} "),
            Style::default()
                .fg(status_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", store.symbol()),
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" exp {expiry} "), Style::default().fg(Color::White)),
        Span::styled(format!(" ⏱  {updated} "), Style::default().fg(ACCENT)),
    ]);

    let bottom = match snapshot {
        Some(snapshot) => {
            let spot = &snapshot.spot;
            let options = &snapshot.options;
            let change_color = match spot.change {
                Some(change) if change > 0.0 => GAIN,
                Some(change) if change < 0.0 => LOSS,
                _ => MUTED,
            };

            Line::from(vec![
                Span::styled(
                    format!(" Spot {} ", format_price(spot.ltp)),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(
                        "{} ({}) ",
                        format_price(spot.change),
                        format_percent(spot.percent_change)
                    ),
                    Style::default().fg(change_color),
                ),
                Span::styled(
                    format!(
                        " ATM IV {} ({}) ",
                        format_price(options.atm_iv),
                        format_percent(options.iv_change_percent)
                    ),
                    Style::default().fg(ACCENT),
                ),
                Span::styled(
                    format!(" PCR {} ", format_ratio(options.put_call_ratio)),
                    Style::default().fg(ACCENT),
                ),
                Span::styled(
                    format!(" DTE {} ", format_quantity(options.days_to_expiry)),
                    Style::default().fg(MUTED),
                ),
                Span::styled(
                    format!(" Lot {} ", format_quantity(options.lot_size)),
                    Style::default().fg(MUTED),
                ),
            ])
        }
        None => Line::from(Span::styled(
            " Waiting for first snapshot... ",
            Style::default().fg(MUTED).add_modifier(Modifier::ITALIC),
        )),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)))
        .title_top(
            Line::from(Span::styled(
                " ◆ STOCKIFY OPTION CHAIN ◆ ",
                Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
        )
        .style(Style::default().bg(Color::Rgb(18, 18, 28)));

    let paragraph = Paragraph::new(vec![top, bottom])
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_waiting<Gateway>(f: &mut Frame, area: Rect, app: &App<Gateway>)
where
    Gateway: MarketGateway + 'static,
{
    let message = match app.session().store().instrument() {
        Some(instrument) => format!("⏳ Waiting for {instrument} chain..."),
        None => "⏳ Resolving expiries...".to_string(),
    };

    let waiting = Paragraph::new(Text::from(vec![
        Line::from(""),
        Line::from(Span::styled(
            message,
            Style::default().fg(MUTED).add_modifier(Modifier::ITALIC),
        )),
    ]))
    .block(chain_block())
    .alignment(Alignment::Center);

    f.render_widget(waiting, area);
}

fn chain_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT))
        .title_top(
            Line::from(vec![
                Span::styled(" CALLS ", Style::default().fg(GAIN).add_modifier(Modifier::BOLD)),
                Span::styled(" │ ", Style::default().fg(MUTED)),
                Span::styled(" PUTS ", Style::default().fg(LOSS).add_modifier(Modifier::BOLD)),
            ])
            .alignment(Alignment::Center),
        )
        .style(Style::default().bg(BACKGROUND))
}

fn render_chain<Gateway>(
    f: &mut Frame,
    area: Rect,
    app: &App<Gateway>,
    snapshot: &LiveSnapshot,
    view: &ChainView,
) where
    Gateway: MarketGateway + 'static,
{
    let selected = app.selected_strike(view);

    let header_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let header = Row::new(
        CALL_COLUMNS
            .iter()
            .map(Column::label)
            .chain(std::iter::once("Strike"))
            .chain(CALL_COLUMNS.iter().rev().map(Column::label))
            .map(|label| Cell::from(label).style(header_style)),
    )
    .height(1);

    let body_rows = view
        .rows
        .iter()
        .map(|row| {
            let (call, put) = view.legs(snapshot, &row.strike);

            let cells = CALL_COLUMNS
                .iter()
                .map(|column| leg_cell(view, row.strike, OptionSide::Call, *column, row.moneyness, call))
                .chain(std::iter::once(strike_cell(row.strike, row.moneyness)))
                .chain(CALL_COLUMNS.iter().rev().map(|column| {
                    leg_cell(view, row.strike, OptionSide::Put, *column, row.moneyness, put)
                }))
                .collect::<Vec<_>>();

            let row_style = if Some(row.strike) == selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };

            Row::new(cells).style(row_style).height(1)
        });

    let widths = [Constraint::Ratio(1, 11); 11];
    let table = Table::new(body_rows, widths)
        .header(header)
        .block(chain_block());

    f.render_widget(table, area);
}

fn leg_cell(
    view: &ChainView,
    strike: Strike,
    side: OptionSide,
    column: Column,
    moneyness: Moneyness,
    leg: Option<&OptionLeg>,
) -> Cell<'static> {
    let mut style = Style::default().fg(Color::White);
    if moneyness.for_side(side) == Moneyness::InTheMoney {
        style = style.bg(ITM_BACKGROUND);
    }

    if let (Column::Metric(Metric::OiChange), Some(value)) =
        (column, leg.and_then(|leg| column.value(leg)))
    {
        if value > 0.0 {
            style = style.fg(GAIN);
        } else if value < 0.0 {
            style = style.fg(LOSS);
        }
    }

    if let Column::Metric(metric) = column {
        if view.is_hot(&strike, side, metric) {
            style = style.bg(HOT_BACKGROUND).fg(GOLD).add_modifier(Modifier::BOLD);
        }
    }

    Cell::from(Text::from(column.format(leg)).alignment(Alignment::Right)).style(style)
}

fn strike_cell(strike: Strike, moneyness: Moneyness) -> Cell<'static> {
    let style = match moneyness {
        Moneyness::AtTheMoney => Style::default()
            .fg(Color::Black)
            .bg(GOLD)
            .add_modifier(Modifier::BOLD),
        _ => Style::default()
            .fg(Color::Rgb(100, 200, 255))
            .add_modifier(Modifier::BOLD),
    };

    Cell::from(Text::from(strike.to_string()).alignment(Alignment::Center)).style(style)
}

fn render_footer(f: &mut Frame, area: Rect, view: Option<&ChainView>) {
    let totals = match view {
        Some(view) => {
            let totals = &view.totals;
            vec![
                Span::styled(
                    format!(
                        " CE OI {}  Vol {} ",
                        format_quantity(Some(totals.call_oi)),
                        format_quantity(Some(totals.call_volume))
                    ),
                    Style::default().fg(GAIN),
                ),
                Span::styled(
                    format!(
                        " PE OI {}  Vol {} ",
                        format_quantity(Some(totals.put_oi)),
                        format_quantity(Some(totals.put_volume))
                    ),
                    Style::default().fg(LOSS),
                ),
                Span::styled(
                    format!(" OI PCR {} ", format_ratio(totals.oi_put_call_ratio())),
                    Style::default().fg(ACCENT),
                ),
            ]
        }
        None => Vec::new(),
    };

    let help = Span::styled(
        " [Q] Quit [R] Reverse [H] Highlight [P] Poll [ [ ] ] Expiry [S] Symbol [↑↓] Select [C/X] History [+/-/A] Depth ",
        Style::default().fg(MUTED),
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(MUTED))
        .style(Style::default().bg(BACKGROUND));

    let paragraph = Paragraph::new(Line::from(totals.into_iter().chain([help]).collect::<Vec<_>>()))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_history(f: &mut Frame, area: Rect, panel: &HistoryView) {
    let popup = centered_rect(70, 60, area);
    f.render_widget(Clear, popup);

    let title = match panel {
        HistoryView::Loading { request } | HistoryView::Failed { request, .. } => {
            format!(" {} {} HISTORY ", request.strike, request.side)
        }
        HistoryView::Loaded(series) => format!(" {} {} HISTORY ", series.strike, series.side),
        HistoryView::Closed => String::new(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(GOLD))
        .title_top(
            Line::from(Span::styled(
                title,
                Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
        )
        .title_bottom(Line::from(Span::styled(" [Esc] Close ", Style::default().fg(MUTED))).alignment(Alignment::Center))
        .style(Style::default().bg(BACKGROUND));

    match panel {
        HistoryView::Loaded(series) if !series.is_empty() => {
            let inner = block.inner(popup);
            f.render_widget(block, popup);
            render_series(f, inner, series);
        }
        HistoryView::Loaded(_) => {
            let empty = Paragraph::new(Span::styled(
                "No intraday history for this strike",
                Style::default().fg(MUTED).add_modifier(Modifier::ITALIC),
            ))
            .block(block)
            .alignment(Alignment::Center);
            f.render_widget(empty, popup);
        }
        HistoryView::Loading { .. } => {
            let loading = Paragraph::new(Span::styled(
                "⏳ Loading...",
                Style::default().fg(MUTED).add_modifier(Modifier::ITALIC),
            ))
            .block(block)
            .alignment(Alignment::Center);
            f.render_widget(loading, popup);
        }
        HistoryView::Failed { message, .. } => {
            let failed = Paragraph::new(Span::styled(
                format!("✖ {message}"),
                Style::default().fg(LOSS).add_modifier(Modifier::BOLD),
            ))
            .block(block)
            .alignment(Alignment::Center);
            f.render_widget(failed, popup);
        }
        HistoryView::Closed => {}
    }
}

fn render_series(f: &mut Frame, area: Rect, series: &HistorySeries) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let (time, oi, oi_change, volume) = match series.latest() {
        Some((timestamp, oi, oi_change, volume)) => (
            series
                .datetimes()
                .last()
                .flatten()
                .map(|datetime| datetime.format("%H:%M").to_string())
                .unwrap_or_else(|| timestamp.to_string()),
            oi,
            oi_change,
            volume,
        ),
        None => return,
    };

    let summary = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {time} "), Style::default().fg(ACCENT)),
        Span::styled(
            format!(" {} samples ", series.len()),
            Style::default().fg(MUTED),
        ),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(summary, chunks[0]);

    let panes = [
        ("OI", &series.oi, format_quantity(Some(oi)), ACCENT),
        ("OI CHG", &series.oi_change, format_quantity(Some(oi_change)), GOLD),
        ("VOLUME", &series.volume, format_quantity(Some(volume)), GAIN),
    ];

    for ((label, values, latest, color), area) in panes.into_iter().zip(chunks.iter().skip(1)) {
        let data = sparkline_data(values);
        let sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(MUTED))
                    .title(Span::styled(
                        format!(" {label} {latest} "),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    )),
            )
            .data(&data)
            .style(Style::default().fg(color))
            .max(SPARKLINE_SCALE);

        f.render_widget(sparkline, *area);
    }
}

/// Popup area centred in `area`, sized as a percentage of it.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

const SPARKLINE_SCALE: u64 = 100;

/// Rescale a series onto `0..=SPARKLINE_SCALE`, shifting by its minimum so negative values
/// (OI change) still render. Non-finite samples become zero-height bars.
pub fn sparkline_data(values: &[f64]) -> Vec<u64> {
    let finite = values.iter().copied().filter(|value| value.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    });

    let range = max - min;
    values
        .iter()
        .map(|value| {
            if !value.is_finite() {
                0
            } else if range > 0.0 {
                (((value - min) / range) * SPARKLINE_SCALE as f64).round() as u64
            } else {
                SPARKLINE_SCALE / 2
            }
        })
        .collect()
}

/// Quantity in Indian units (L = lakh, Cr = crore).
pub fn format_quantity(value: Option<f64>) -> String {
    match value.filter(|value| value.is_finite()) {
        None => "-".to_string(),
        Some(value) if value.abs() >= 1e7 => format!("{:.2}Cr", value / 1e7),
        Some(value) if value.abs() >= 1e5 => format!("{:.2}L", value / 1e5),
        Some(value) => format!("{value:.0}"),
    }
}

pub fn format_price(value: Option<f64>) -> String {
    match value.filter(|value| value.is_finite()) {
        Some(value) => format!("{value:.2}"),
        None => "-".to_string(),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|value| value.is_finite()) {
        Some(value) => format!("{value:+.2}%"),
        None => "-".to_string(),
    }
}

pub fn format_ratio(value: Option<f64>) -> String {
    match value.filter(|value| value.is_finite()) {
        Some(value) => format!("{value:.2}"),
        None => "-".to_string(),
    }
}
