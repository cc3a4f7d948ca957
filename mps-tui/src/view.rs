use crate::styles;
use anyhow::Result;
use mps_panel::snapshot::{CardSnapshot, PaneSnapshot};
use mps_panel::PanelSnapshot;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::io::Stdout;
use textwrap::wrap;

pub struct ViewSnap {
    pub panel: Option<PanelSnapshot>,
    pub input: String,
    pub input_cursor: usize,
    pub selected: usize,
    pub online: bool,
    pub status: Option<String>,
}

pub fn draw(term: &mut Terminal<CrosstermBackend<Stdout>>, snap: &ViewSnap) -> Result<()> {
    term.draw(|frame| {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        let connectivity = if snap.online {
            Span::styled("online", styles::online())
        } else {
            Span::styled("offline", styles::error())
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled(" Status Panel ", styles::title()),
            Span::raw(" "),
            connectivity,
        ]));
        frame.render_widget(header, layout[0]);

        match &snap.panel {
            None => {
                let loading = Paragraph::new(Span::styled("Loading…", styles::dim()))
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(loading, layout[2]);
            }
            Some(panel) => {
                draw_buttons(frame, layout[1], panel);
                match (&panel.pane, panel.placeholder) {
                    (Some(pane), _) => draw_pane(frame, layout[2], pane, snap),
                    (None, placeholder) => {
                        let text = placeholder.unwrap_or_default();
                        let body = Paragraph::new(text)
                            .wrap(Wrap { trim: true })
                            .block(Block::default().borders(Borders::ALL));
                        frame.render_widget(body, layout[2]);
                    }
                }
            }
        }

        let status = match &snap.status {
            Some(message) => Line::from(Span::styled(format!(" {message}"), styles::error())),
            None => Line::from(Span::styled(
                " Enter post • Tab service • ↑↓ card • ^R reply • ^T retweet • ^L location • ^O online • ^X retire • ^Q quit",
                styles::dim(),
            )),
        };
        frame.render_widget(Paragraph::new(status), layout[3]);
    })?;

    Ok(())
}

fn draw_buttons(frame: &mut Frame, area: Rect, panel: &PanelSnapshot) {
    let mut titles: Vec<Line> = panel
        .buttons
        .iter()
        .map(|b| Line::from(b.service.clone()))
        .collect();
    titles.push(Line::from(Span::styled(panel.add_service_label, styles::dim())));
    let active = panel.buttons.iter().position(|b| b.active);
    let mut tabs = Tabs::new(titles)
        .highlight_style(styles::label())
        .block(Block::default().borders(Borders::ALL).title(" Services "));
    if let Some(index) = active {
        tabs = tabs.select(index);
    }
    frame.render_widget(tabs, area);
}

fn draw_pane(frame: &mut Frame, area: Rect, pane: &PaneSnapshot, snap: &ViewSnap) {
    let location_h = if pane.location_row_visible { 1 } else { 0 };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(location_h),
            Constraint::Min(3),
        ])
        .split(area);

    if pane.composer_visible {
        let (text, style) = if snap.input.is_empty() && !pane.showing_geotag {
            (pane.composer_hint.to_string(), styles::dim())
        } else if pane.showing_geotag {
            (pane.composer_text.clone(), styles::dim())
        } else {
            (snap.input.clone(), styles::content())
        };
        let composer = Paragraph::new(Span::styled(text, style))
            .block(Block::default().borders(Borders::ALL).title(" Update "));
        frame.render_widget(Clear, layout[0]);
        frame.render_widget(composer, layout[0]);
        if !pane.showing_geotag {
            frame.set_cursor_position(Position {
                x: layout[0].x + 1 + visual_caret_col(&snap.input, snap.input_cursor),
                y: layout[0].y + 1,
            });
        }
    } else {
        let fallback = Paragraph::new(Span::styled(
            pane.fallback_text.unwrap_or_default(),
            styles::error(),
        ))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(fallback, layout[0]);
    }

    if pane.location_row_visible {
        let row = Paragraph::new(Line::from(vec![
            Span::styled(pane.location_label.clone(), styles::content()),
            Span::styled("  [Change: ^L]", styles::dim()),
        ]));
        frame.render_widget(row, layout[1]);
    }

    if pane.showing_geotag {
        let picker = Paragraph::new(vec![
            Line::from(Span::styled(pane.location_label.clone(), styles::label())),
            Line::from(""),
            Line::from("Type \"<latitude> <longitude>\" and press Enter to share it."),
            Line::from("Press Esc to stop sharing your location."),
            Line::from(""),
            Line::from(Span::styled(format!("> {}", snap.input), styles::content())),
        ])
        .block(Block::default().borders(Borders::ALL).title(" Location "));
        frame.render_widget(picker, layout[2]);
        return;
    }

    if let Some(error) = &pane.feed_error {
        let body = Paragraph::new(Span::styled(format!("Feed unavailable: {error}"), styles::error()))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Feed "));
        frame.render_widget(body, layout[2]);
        return;
    }

    let width = layout[2].width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = pane.cards.iter().map(|card| card_item(card, width)).collect();
    let mut state = ListState::default();
    if !pane.cards.is_empty() {
        state.select(Some(snap.selected.min(pane.cards.len() - 1)));
    }
    let list = List::new(items)
        .highlight_style(styles::selected())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", pane.service)),
        );
    frame.render_stateful_widget(list, layout[2], &mut state);
}

fn card_item(card: &CardSnapshot, width: usize) -> ListItem<'static> {
    let (author, content) = split_markup(&card.markup);
    let mut lines = vec![Line::from(Span::styled(author, styles::author()))];
    for segment in wrap(&content, width.max(1)) {
        lines.push(Line::from(Span::styled(segment.into_owned(), styles::content())));
    }
    lines.push(Line::from(Span::styled(card.avatar.clone(), styles::dim())));
    ListItem::new(lines)
}

/// Split `<b>author</b> content` card markup into unescaped author and content.
pub fn split_markup(markup: &str) -> (String, String) {
    let Some(rest) = markup.strip_prefix("<b>") else {
        return (String::new(), unescape(markup));
    };
    match rest.split_once("</b>") {
        Some((author, content)) => (
            unescape(author),
            unescape(content.strip_prefix(' ').unwrap_or(content)),
        ),
        None => (unescape(rest), String::new()),
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn visual_caret_col(input: &str, cursor: usize) -> u16 {
    use unicode_width::UnicodeWidthStr;
    UnicodeWidthStr::width(&input[..cursor]) as u16
}
