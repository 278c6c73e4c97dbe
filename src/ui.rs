use anyhow::Result;
use collection_tracker::{
    CatalogEntry, CatalogStore, FilterState, GroupSelection, OwnershipState, OwnershipTracker,
    QueryEvaluator, SelectionNavigator, WeightBucket, ROTATIONS, TYPES,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

// ============================================================================
// FACET MENUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Type,
    Rotation,
    Weight,
    Ownership,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Facet::Type, Facet::Rotation, Facet::Weight, Facet::Ownership];

    pub fn title(&self) -> &'static str {
        match self {
            Facet::Type => "Type",
            Facet::Rotation => "Rotation",
            Facet::Weight => "Poids",
            Facet::Ownership => "Etat",
        }
    }

    pub fn key(&self) -> char {
        match self {
            Facet::Type => 't',
            Facet::Rotation => 'r',
            Facet::Weight => 'w',
            Facet::Ownership => 'o',
        }
    }

    pub fn options(&self) -> Vec<&'static str> {
        match self {
            Facet::Type => TYPES.to_vec(),
            Facet::Rotation => ROTATIONS.to_vec(),
            Facet::Weight => WeightBucket::ALL.iter().map(|b| b.label()).collect(),
            Facet::Ownership => OwnershipState::ALL.iter().map(|s| s.label()).collect(),
        }
    }

    pub fn is_selected(&self, filter: &FilterState, option: &str) -> bool {
        match self {
            Facet::Type => filter.types.contains(option),
            Facet::Rotation => filter.rotations.contains(option),
            Facet::Weight => option
                .parse::<WeightBucket>()
                .map(|b| filter.weights.contains(&b))
                .unwrap_or(false),
            Facet::Ownership => option
                .parse::<OwnershipState>()
                .map(|s| filter.ownership.contains(&s))
                .unwrap_or(false),
        }
    }

    pub fn toggle(&self, filter: &mut FilterState, option: &str) {
        match self {
            Facet::Type => {
                filter.toggle_type(option);
            }
            Facet::Rotation => {
                filter.toggle_rotation(option);
            }
            Facet::Weight => {
                if let Ok(bucket) = option.parse::<WeightBucket>() {
                    filter.toggle_weight(bucket);
                }
            }
            Facet::Ownership => {
                if let Ok(state) = option.parse::<OwnershipState>() {
                    filter.toggle_ownership(state);
                }
            }
        }
    }

    /// Selected values, for the sidebar summary
    pub fn selected_labels(&self, filter: &FilterState) -> Vec<String> {
        self.options()
            .into_iter()
            .filter(|o| self.is_selected(filter, o))
            .map(|o| o.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetMenu {
    pub facet: Facet,
    pub highlighted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App {
    pub catalog: CatalogStore,
    pub tracker: OwnershipTracker,
    pub groups: Vec<String>,
    pub filter: FilterState,
    pub navigator: SelectionNavigator,
    pub table_state: TableState,
    pub input_mode: InputMode,
    pub menu: Option<FacetMenu>,
    pub show_detail: bool,
    pub message: Option<String>,
}

impl App {
    pub fn new(catalog: CatalogStore, tracker: OwnershipTracker, groups: Vec<String>) -> Self {
        Self {
            catalog,
            tracker,
            groups,
            filter: FilterState::new(),
            navigator: SelectionNavigator::new(),
            table_state: TableState::default(),
            input_mode: InputMode::Normal,
            menu: None,
            show_detail: true,
            message: None,
        }
    }

    /// Current result list, recomputed on every call
    pub fn results(&self) -> Vec<&CatalogEntry> {
        QueryEvaluator::evaluate(&self.catalog, &self.filter, &self.tracker)
    }

    pub fn selected_entry(&self) -> Option<&CatalogEntry> {
        let results = self.results();
        self.navigator.selected_entry(&results)
    }

    pub fn next(&mut self) {
        let results = QueryEvaluator::evaluate(&self.catalog, &self.filter, &self.tracker);
        self.navigator.select_next(&results);
    }

    pub fn previous(&mut self) {
        let results = QueryEvaluator::evaluate(&self.catalog, &self.filter, &self.tracker);
        self.navigator.select_previous(&results);
    }

    fn group_choices(&self) -> Vec<GroupSelection> {
        let mut choices = vec![GroupSelection::All];
        choices.extend(self.groups.iter().map(|g| GroupSelection::Only(g.clone())));
        choices
    }

    fn shift_group(&mut self, forward: bool) {
        let choices = self.group_choices();
        let len = choices.len();
        let current = choices
            .iter()
            .position(|c| *c == self.filter.group)
            .unwrap_or(0);
        let target = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.filter.set_group(choices[target].clone());
    }

    pub fn next_group(&mut self) {
        self.shift_group(true);
    }

    pub fn previous_group(&mut self) {
        self.shift_group(false);
    }

    /// Flip the selected entry's flag for the channel at `index`.
    /// Only a selection inside the current results can be toggled.
    pub fn toggle_channel(&mut self, index: usize) {
        let channel = match self.tracker.channels().get(index) {
            Some(c) => c.clone(),
            None => return,
        };
        let name = match self.selected_entry().map(|entry| entry.name.clone()) {
            Some(name) => name,
            None => {
                self.message = Some("Nothing selected".to_string());
                return;
            }
        };

        self.message = match self.tracker.toggle(&name, &channel) {
            Ok(true) => Some(format!("{}: {} ✓", name, channel)),
            Ok(false) => Some(format!("{}: {} ✗", name, channel)),
            Err(e) => Some(e.to_string()),
        };
    }

    pub fn open_menu(&mut self, facet: Facet) {
        self.menu = Some(FacetMenu {
            facet,
            highlighted: 0,
        });
    }

    fn move_menu(&mut self, forward: bool) {
        if let Some(menu) = self.menu.as_mut() {
            let len = menu.facet.options().len();
            menu.highlighted = if forward {
                (menu.highlighted + 1) % len
            } else {
                (menu.highlighted + len - 1) % len
            };
        }
    }

    fn toggle_highlighted(&mut self) {
        if let Some(menu) = self.menu {
            if let Some(option) = menu.facet.options().get(menu.highlighted) {
                menu.facet.toggle(&mut self.filter, option);
            }
        }
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
        self.menu = None;
    }

    /// Apply one key press. Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.input_mode == InputMode::Search {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.input_mode = InputMode::Normal,
                KeyCode::Backspace => {
                    self.filter.search.pop();
                }
                KeyCode::Char(c) => self.filter.search.push(c),
                _ => {}
            }
            return false;
        }

        if self.menu.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.menu = None,
                KeyCode::Down | KeyCode::Char('j') => self.move_menu(true),
                KeyCode::Up | KeyCode::Char('k') => self.move_menu(false),
                KeyCode::Char(' ') => self.toggle_highlighted(),
                KeyCode::Char(c) => {
                    if let Some(facet) = Facet::ALL.iter().find(|f| f.key() == c) {
                        self.open_menu(*facet);
                    }
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_group();
                } else {
                    self.next_group();
                }
            }
            KeyCode::BackTab => self.previous_group(),
            KeyCode::Enter => self.show_detail = !self.show_detail,
            KeyCode::Char('/') => self.input_mode = InputMode::Search,
            KeyCode::Char('c') => self.clear_filters(),
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                let index = c.to_digit(10).unwrap_or(1) as usize - 1;
                self.toggle_channel(index);
            }
            KeyCode::Char(c) => {
                if let Some(facet) = Facet::ALL.iter().find(|f| f.key() == c) {
                    self.open_menu(*facet);
                }
            }
            _ => {}
        }

        false
    }
}

// ============================================================================
// TERMINAL LOOP
// ============================================================================

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

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let constraints = if app.show_detail {
        vec![
            Constraint::Length(30),
            Constraint::Percentage(50),
            Constraint::Min(30),
        ]
    } else {
        vec![Constraint::Length(30), Constraint::Min(0)]
    };
    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(chunks[1]);

    render_sidebar(f, content[0], app);
    render_table(f, content[1], app);
    if app.show_detail {
        render_detail_panel(f, content[2], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let all = app.tracker.count_owned(&app.catalog, |_| true);

    let mut spans = vec![
        Span::styled(
            "Ma collection",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Possédées: {}", all),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Groupe: {}", app.filter.group.label()),
            Style::default().fg(Color::Cyan),
        ),
    ];

    if !app.filter.search.is_empty() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("\"{}\"", app.filter.search),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_sidebar(f: &mut Frame, area: Rect, app: &App) {
    let summary = app.tracker.summary(&app.catalog, &app.groups);
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let marker = |active: bool| {
        if active {
            Span::styled("→ ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            Span::raw("  ")
        }
    };

    let mut lines = vec![Line::from(Span::styled(" Groupes", heading))];
    lines.push(Line::from(vec![
        marker(app.filter.group == GroupSelection::All),
        Span::raw(format!("{} ({})", GroupSelection::All.label(), summary.all)),
    ]));
    for (group, count) in &summary.groups {
        let active = matches!(&app.filter.group, GroupSelection::Only(g) if g == group);
        lines.push(Line::from(vec![
            marker(active),
            Span::raw(format!("{} ({})", group, count)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Filtre", heading)));
    for facet in Facet::ALL {
        let selected = facet.selected_labels(&app.filter);
        let value = if selected.is_empty() {
            "-".to_string()
        } else {
            selected.join(", ")
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" [{}] ", facet.key()), Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}: ", facet.title())),
            Span::styled(value, Style::default().fg(Color::White)),
        ]));

        if let Some(menu) = app.menu.filter(|m| m.facet == facet) {
            for (i, option) in facet.options().iter().enumerate() {
                let check = if facet.is_selected(&app.filter, option) { "[x]" } else { "[ ]" };
                let style = if i == menu.highlighted {
                    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(format!("     {} {}", check, option), style)));
            }
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Rechercher", heading)));
    let cursor = if app.input_mode == InputMode::Search { "▏" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            format!("{}{}", app.filter.search, cursor),
            Style::default().fg(Color::White),
        ),
    ]));

    let sidebar = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(sidebar, area);
}

fn type_color(kind: &str) -> Color {
    match kind {
        "Attaque" => Color::Blue,
        "Défense" => Color::Green,
        "Endurance" => Color::Yellow,
        "Équilibre" => Color::Red,
        _ => Color::White,
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let results = QueryEvaluator::evaluate(&app.catalog, &app.filter, &app.tracker);
    let position = app
        .navigator
        .selected()
        .and_then(|name| results.iter().position(|e| e.name == name));
    app.table_state.select(position);

    let mut headers = vec!["Nom".to_string(), "Type".to_string(), "Rotation".to_string(), "Poids".to_string()];
    headers.extend(app.tracker.channels().iter().cloned());
    let header_cells = headers.into_iter().map(|h| {
        Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let tracker = &app.tracker;
    let rows = results.iter().map(|entry| {
        let mut cells = vec![
            Cell::from(truncate(&entry.name, 28)),
            Cell::from(entry.kind.clone()).style(Style::default().fg(type_color(&entry.kind))),
            Cell::from(entry.rotation.clone()),
            Cell::from(format!("{}g", entry.weight)),
        ];
        for channel in tracker.channels() {
            let mark = if tracker.has(&entry.name, channel) { "✓" } else { "·" };
            cells.push(Cell::from(mark).style(Style::default().fg(Color::Green)));
        }
        Row::new(cells).height(1)
    });

    let mut widths = vec![
        Constraint::Length(30),
        Constraint::Length(11),
        Constraint::Length(9),
        Constraint::Length(7),
    ];
    widths.extend(tracker.channels().iter().map(|_| Constraint::Length(8)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Toupies ({}) ", results.len())),
        )
        .highlight_style(Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Détails ");

    let entry = match app.selected_entry() {
        Some(e) => e,
        None => {
            let hint = Paragraph::new("Sélectionne une toupie pour voir les détails").block(block);
            f.render_widget(hint, area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(Span::styled(
            format!("  {}", entry.name),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![Span::styled("  Groupe: ", label), Span::raw(&entry.group)]),
        Line::from(vec![
            Span::styled("  Type: ", label),
            Span::styled(&entry.kind, Style::default().fg(type_color(&entry.kind))),
        ]),
        Line::from(vec![Span::styled("  Rotation: ", label), Span::raw(&entry.rotation)]),
        Line::from(vec![
            Span::styled("  Poids: ", label),
            Span::raw(format!("{}g", entry.weight)),
        ]),
        Line::from(""),
    ];

    for (i, channel) in app.tracker.channels().iter().enumerate() {
        let owned = app.tracker.has(&entry.name, channel);
        content.push(Line::from(vec![
            Span::styled(format!("  [{}] ", i + 1), Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}: ", channel)),
            if owned {
                Span::styled("possédée", Style::default().fg(Color::Green))
            } else {
                Span::styled("non possédée", Style::default().fg(Color::DarkGray))
            },
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from("  ─────────────────────────────────────"));
    content.push(Line::from(Span::styled(
        format!("  {}", entry.description),
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    )));

    if let Some(url) = &entry.more_info_url {
        content.push(Line::from(""));
        content.push(Line::from(vec![
            Span::styled("  En apprendre plus: ", label),
            Span::styled(url.as_str(), Style::default().fg(Color::Blue)),
        ]));
    }

    let detail = Paragraph::new(content).block(block).wrap(Wrap { trim: false });
    f.render_widget(detail, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let results = app.results();
    let position = app
        .navigator
        .selected()
        .and_then(|name| results.iter().position(|e| e.name == name))
        .map(|i| i + 1)
        .unwrap_or(0);

    let key = Style::default().fg(Color::Yellow);
    let mut spans = vec![Span::styled(
        format!(" {}/{} ", position, results.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.as_str(), Style::default().fg(Color::Green)));
    }

    spans.push(Span::raw(" | "));
    spans.push(Span::styled("↑/↓", key));
    spans.push(Span::raw(" Nav | "));
    spans.push(Span::styled("Tab", key));
    spans.push(Span::raw(" Groupe | "));
    spans.push(Span::styled("t/r/w/o", key));
    spans.push(Span::raw(" Filtres | "));
    spans.push(Span::styled("/", key));
    spans.push(Span::raw(" Recherche | "));
    spans.push(Span::styled("1-9", key));
    spans.push(Span::raw(" Possédée | "));
    spans.push(Span::styled("c", key));
    spans.push(Span::raw(" Effacer | "));
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quitter"));

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
