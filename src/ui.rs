// 🖥️ Review TUI - browse a reconciled sales table
//
// Pages: Marketplaces (per-marketplace totals) │ Ledger (MSKU rows) │ Views (filters)

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use sku_reconcile::{Marketplace, ReconciledRecord};
use std::collections::BTreeMap;
use std::io;

const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Marketplaces,
    Ledger,
    Views,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Marketplaces => Page::Ledger,
            Page::Ledger => Page::Views,
            Page::Views => Page::Marketplaces,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Marketplaces => Page::Views,
            Page::Ledger => Page::Marketplaces,
            Page::Views => Page::Ledger,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Marketplaces => "Marketplaces",
            Page::Ledger => "Reconciled Ledger",
            Page::Views => "Views",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    ByMarketplace(Marketplace),
    Undated,
    /// Rows whose MSKU appears under more than one marketplace
    CrossListed,
}

impl Filter {
    fn label(&self) -> String {
        match self {
            Filter::All => "All".to_string(),
            Filter::ByMarketplace(m) => m.name().to_string(),
            Filter::Undated => "Undated".to_string(),
            Filter::CrossListed => "Cross-listed".to_string(),
        }
    }
}

/// One line of the Marketplaces page
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceRow {
    pub marketplace: Marketplace,
    pub rows: usize,
    pub distinct_mskus: usize,
    pub quantity: f64,
}

pub struct App {
    pub source: String,
    pub records: Vec<ReconciledRecord>,
    pub visible: Vec<ReconciledRecord>,
    pub state: TableState,
    pub summary_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub filter: Filter,
}

impl App {
    pub fn new(records: Vec<ReconciledRecord>, source: String) -> Self {
        let mut state = TableState::default();
        if !records.is_empty() {
            state.select(Some(0));
        }

        let mut summary_state = TableState::default();
        summary_state.select(Some(0));

        Self {
            source,
            visible: records.clone(),
            records,
            state,
            summary_state,
            current_page: Page::Ledger,
            show_detail: false,
            filter: Filter::All,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected(&self) -> Option<&ReconciledRecord> {
        self.state.selected().and_then(|i| self.visible.get(i))
    }

    /// Records matching `filter`, in file order.
    pub fn matching(&self, filter: &Filter) -> Vec<ReconciledRecord> {
        match filter {
            Filter::All => self.records.clone(),
            Filter::ByMarketplace(m) => self
                .records
                .iter()
                .filter(|r| &r.marketplace == m)
                .cloned()
                .collect(),
            Filter::Undated => self
                .records
                .iter()
                .filter(|r| r.date.is_none())
                .cloned()
                .collect(),
            Filter::CrossListed => {
                let mut seen: BTreeMap<&str, Vec<&Marketplace>> = BTreeMap::new();
                for r in &self.records {
                    let markets = seen.entry(r.sku.as_str()).or_default();
                    if !markets.contains(&&r.marketplace) {
                        markets.push(&r.marketplace);
                    }
                }
                self.records
                    .iter()
                    .filter(|r| seen.get(r.sku.as_str()).map_or(false, |m| m.len() > 1))
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn apply_filter(&mut self, filter: Filter) {
        self.visible = self.matching(&filter);
        self.filter = filter;

        // Reset selection to first item
        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(Filter::All);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    /// Per-marketplace totals over all records, busiest first.
    pub fn marketplace_summary(&self) -> Vec<MarketplaceRow> {
        let mut by_market: BTreeMap<&Marketplace, (usize, Vec<&str>, f64)> = BTreeMap::new();
        for r in &self.records {
            let entry = by_market.entry(&r.marketplace).or_insert((0, Vec::new(), 0.0));
            entry.0 += 1;
            if !entry.1.contains(&r.sku.as_str()) {
                entry.1.push(r.sku.as_str());
            }
            entry.2 += r.quantity;
        }

        let mut rows: Vec<MarketplaceRow> = by_market
            .into_iter()
            .map(|(marketplace, (rows, skus, quantity))| MarketplaceRow {
                marketplace: marketplace.clone(),
                rows,
                distinct_mskus: skus.len(),
                quantity,
            })
            .collect();

        rows.sort_by(|a, b| b.rows.cmp(&a.rows));
        rows
    }

    pub fn undated_count(&self) -> usize {
        self.records.iter().filter(|r| r.date.is_none()).count()
    }

    pub fn total_quantity(&self) -> f64 {
        self.records.iter().map(|r| r.quantity).sum()
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self
            .state
            .selected()
            .map_or(0, |i| (i + PAGE_STEP).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(PAGE_STEP));
        self.state.select(Some(i));
    }

    pub fn last(&mut self) {
        if !self.visible.is_empty() {
            self.state.select(Some(self.visible.len() - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            let view = match key.code {
                KeyCode::Char('1') => Some(Filter::All),
                KeyCode::Char('2') => Some(Filter::ByMarketplace(Marketplace::Flipkart)),
                KeyCode::Char('3') => Some(Filter::ByMarketplace(Marketplace::Amazon)),
                KeyCode::Char('4') => Some(Filter::Undated),
                KeyCode::Char('5') => Some(Filter::CrossListed),
                _ => None,
            };
            if let (Some(filter), Page::Views) = (view, app.current_page) {
                app.apply_filter(filter);
                app.current_page = Page::Ledger;
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Ledger;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Ledger {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);

        render_ledger(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Marketplaces => render_marketplaces(f, chunks[1], app),
            Page::Ledger => render_ledger(f, chunks[1], app),
            Page::Views => render_views(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn marketplace_color(marketplace: &Marketplace) -> Color {
    match marketplace {
        Marketplace::Flipkart => Color::Yellow,
        Marketplace::Amazon => Color::Cyan,
        Marketplace::Other(_) => Color::Magenta,
    }
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Marketplaces, Page::Ledger, Page::Views];

    let mut spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Rows: {}", app.records.len()),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Qty: {:.2}", app.total_quantity()),
        Style::default().fg(Color::Green),
    ));
    let undated = app.undated_count();
    if undated > 0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("⚠ {} undated", undated),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", app.source)),
    );

    f.render_widget(header, area);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["MSKU", "Quantity", "Date", "Marketplace"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.visible.iter().map(|r| {
        let date = if r.date.is_some() {
            Cell::from(r.date_text())
        } else {
            Cell::from("-").style(Style::default().fg(Color::Red))
        };
        Row::new(vec![
            Cell::from(truncate(&r.sku, 36)),
            Cell::from(format!("{:>10.3}", r.quantity)),
            date,
            Cell::from(r.marketplace.name().to_string())
                .style(Style::default().fg(marketplace_color(&r.marketplace))),
        ])
        .height(1)
    });

    let title = match app.filter {
        Filter::All => " MSKU Rows ".to_string(),
        ref other => format!(" MSKU Rows - {} ", other.label()),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(38),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_marketplaces(f: &mut Frame, area: Rect, app: &mut App) {
    let summary = app.marketplace_summary();

    let header = Row::new(
        ["Marketplace", "Rows", "Distinct MSKUs", "Total Quantity"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = summary.iter().map(|m| {
        Row::new(vec![
            Cell::from(m.marketplace.name().to_string())
                .style(Style::default().fg(marketplace_color(&m.marketplace))),
            Cell::from(m.rows.to_string()),
            Cell::from(m.distinct_mskus.to_string()),
            Cell::from(format!("{:.2}", m.quantity)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Summary by Marketplace "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.summary_state);
}

fn view_line(key: char, label: &str, count: usize, active: bool, color: Color) -> Line<'static> {
    let marker = if active {
        Span::styled("→", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Span::raw(" ")
    };
    Line::from(vec![
        Span::raw("  "),
        marker,
        Span::styled(key.to_string(), Style::default().fg(Color::Yellow)),
        Span::raw(format!(". {:<24}", label)),
        Span::styled(format!("{:>7} rows", count), Style::default().fg(color)),
    ])
}

fn render_views(f: &mut Frame, area: Rect, app: &App) {
    let count_for = |m: &Marketplace| app.records.iter().filter(|r| &r.marketplace == m).count();
    let flipkart = Filter::ByMarketplace(Marketplace::Flipkart);
    let amazon = Filter::ByMarketplace(Marketplace::Amazon);

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Quick Views",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        view_line('1', "All rows", app.records.len(), app.filter == Filter::All, Color::White),
        view_line(
            '2',
            "Flipkart",
            count_for(&Marketplace::Flipkart),
            app.filter == flipkart,
            marketplace_color(&Marketplace::Flipkart),
        ),
        view_line(
            '3',
            "Amazon",
            count_for(&Marketplace::Amazon),
            app.filter == amazon,
            marketplace_color(&Marketplace::Amazon),
        ),
        view_line('4', "Undated", app.undated_count(), app.filter == Filter::Undated, Color::Red),
        view_line(
            '5',
            "Cross-listed MSKUs",
            app.matching(&Filter::CrossListed).len(),
            app.filter == Filter::CrossListed,
            Color::Magenta,
        ),
        Line::from(""),
        Line::from(Span::styled(
            "  Press 1-5 to filter, c to clear",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Views "),
    );

    f.render_widget(paragraph, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Row Details ");

    let Some(r) = app.selected() else {
        f.render_widget(Paragraph::new("No row selected").block(block), area);
        return;
    };

    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let same_msku: Vec<&ReconciledRecord> = app.records.iter().filter(|o| o.sku == r.sku).collect();
    let msku_total: f64 = same_msku.iter().map(|o| o.quantity).sum();

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  MSKU: "), Span::raw(r.sku.clone())]),
        Line::from(""),
        Line::from(vec![label("  Quantity: "), Span::raw(r.quantity_text())]),
        Line::from(""),
        Line::from(vec![
            label("  Date: "),
            if r.date.is_some() {
                Span::raw(r.date_text())
            } else {
                Span::styled("unparseable in source", Style::default().fg(Color::Red))
            },
        ]),
        Line::from(""),
        Line::from(vec![
            label("  Marketplace: "),
            Span::styled(
                r.marketplace.name().to_string(),
                Style::default().fg(marketplace_color(&r.marketplace)),
            ),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(Span::styled(
            "  THIS MSKU",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
        Line::from(vec![label("  Rows: "), Span::raw(same_msku.len().to_string())]),
        Line::from(vec![label("  Total quantity: "), Span::raw(format!("{:.3}", msku_total))]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.filter != Filter::All {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", app.filter.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    status_spans.extend([
        Span::raw(" | "),
        key("Enter"),
        Span::raw(" Details | "),
        key("Tab"),
        Span::raw(" Page | "),
        key("1-5"),
        Span::raw(" Views | "),
        key("↑/↓"),
        Span::raw(" Nav | "),
        key("PgUp/PgDn"),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ]);

    let status = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(status, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
