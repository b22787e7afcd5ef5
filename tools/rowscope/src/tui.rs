use crate::errors::RowscopeError;
use crate::rich::{Attr, RichLine};
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;

/// Everything needed to draw one refresh of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableView {
    pub tabs: Vec<String>,
    pub active_tab: usize,
    pub header: RichLine,
    pub lines: Vec<RichLine>,
    pub status: Option<String>,
    pub coloring: bool,
}

pub fn style_for(attr: Attr, coloring: bool) -> Style {
    if !coloring {
        return match attr {
            Attr::HeaderFocus | Attr::SelectionFocus => Style::default().add_modifier(Modifier::REVERSED),
            Attr::Highlight => Style::default().add_modifier(Modifier::BOLD),
            _ => Style::default(),
        };
    }
    match attr {
        Attr::Normal => Style::default(),
        Attr::Shadow => Style::default().fg(Color::DarkGray),
        Attr::Megabytes => Style::default().fg(Color::Cyan),
        Attr::Gigabytes => Style::default().fg(Color::Green),
        Attr::LargeNumber => Style::default().fg(Color::Red),
        Attr::Highlight => Style::default().add_modifier(Modifier::BOLD),
        Attr::HeaderFocus => Style::default().fg(Color::Black).bg(Color::Green),
        Attr::SelectionFocus => Style::default().fg(Color::Black).bg(Color::Cyan),
        Attr::Tagged => Style::default().fg(Color::Yellow),
        Attr::New => Style::default().fg(Color::Black).bg(Color::Green),
        Attr::Tomb => Style::default().fg(Color::Black).bg(Color::Red),
        Attr::Tree => Style::default().fg(Color::Cyan),
    }
}

pub fn to_line(line: &RichLine, coloring: bool) -> Line<'static> {
    Line::from(
        line.segments()
            .iter()
            .map(|segment| Span::styled(segment.text.clone(), style_for(segment.attr, coloring)))
            .collect::<Vec<_>>(),
    )
}

fn tab_line(view: &TableView) -> Line<'static> {
    let mut spans = Vec::new();
    for (index, tab) in view.tabs.iter().enumerate() {
        let attr = if index == view.active_tab {
            Attr::SelectionFocus
        } else {
            Attr::Normal
        };
        spans.push(Span::styled(format!("[{tab}]"), style_for(attr, view.coloring)));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

/// Draws the view off-screen and returns the character grid, one line per row.
pub fn render_table(view: &TableView, width: u16, height: u16) -> Result<String, RowscopeError> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| RowscopeError::Io(e.to_string()))?;
    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),
                    Constraint::Length(1),
                    Constraint::Min(0),
                    Constraint::Length(1),
                ])
                .split(frame.area());

            frame.render_widget(Paragraph::new(tab_line(view)), chunks[0]);
            frame.render_widget(Paragraph::new(to_line(&view.header, view.coloring)), chunks[1]);

            let body = view
                .lines
                .iter()
                .map(|line| to_line(line, view.coloring))
                .collect::<Vec<_>>();
            frame.render_widget(Paragraph::new(body), chunks[2]);

            if let Some(status) = &view.status {
                frame.render_widget(
                    Paragraph::new(Span::styled(status.clone(), style_for(Attr::Highlight, view.coloring))),
                    chunks[3],
                );
            }
        })
        .map_err(|e| RowscopeError::Io(e.to_string()))?;

    let mut out = String::new();
    let buffer = terminal.backend().buffer();
    for y in 0..height {
        let mut row = String::new();
        for x in 0..width {
            row.push_str(buffer[(x, y)].symbol());
        }
        out.push_str(row.trim_end());
        out.push('\n');
    }
    Ok(out)
}
