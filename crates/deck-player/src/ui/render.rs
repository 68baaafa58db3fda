use std::time::Duration;

use deck_core::PipelineFactory;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph},
};

use super::app::App;

const KEYS: &str =
    "keys: o open | Space play/pause | ←/→ seek | r restart | +/- volume | l logs | q quit";

pub(crate) fn draw<F: PipelineFactory>(f: &mut ratatui::Frame, app: &mut App<F>) {
    let outer = Block::default().title("deck-player").borders(Borders::ALL);
    let area = outer.inner(f.area());
    f.render_widget(outer, f.area());

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let display = app.display();
    f.render_widget(
        Paragraph::new(Line::from(display.file_label.clone()))
            .block(Block::default().title("File").borders(Borders::ALL)),
        rows[0],
    );

    let state = if app.session.is_playing() {
        "playing"
    } else if app.session.has_pipeline() {
        "paused"
    } else {
        "stopped"
    };
    let step = app.seek_step_secs;
    f.render_widget(
        Paragraph::new(Line::from(format!(
            "{}  [{state}]    ← −{step}s   → +{step}s   r restart",
            display.play_pause_glyph()
        )))
        .block(Block::default().title("Transport").borders(Borders::ALL)),
        rows[1],
    );

    let progress = Block::default().title("Progress").borders(Borders::ALL);
    match (app.session.position(), app.session.duration()) {
        (Some(pos), Some(total)) if !total.is_zero() => {
            let ratio = (pos.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0);
            let gauge = Gauge::default()
                .block(progress)
                .ratio(ratio)
                .label(format!(
                    "{} / {}",
                    format_duration(pos),
                    format_duration(total)
                ))
                .gauge_style(Style::default().fg(Color::White).bg(Color::Black));
            f.render_widget(gauge, rows[2]);
        }
        _ => f.render_widget(Paragraph::new("-").block(progress), rows[2]),
    }

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(display.volume_label.clone())
                .borders(Borders::ALL),
        )
        .percent(u16::from(app.volume.min(100)))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black));
    f.render_widget(gauge, rows[3]);

    f.render_widget(
        Paragraph::new(Line::from(format!("status: {}", app.status))),
        rows[5],
    );
    f.render_widget(
        Paragraph::new(Line::from(KEYS)).alignment(Alignment::Left),
        rows[6],
    );

    if let Some(chooser) = app.chooser.as_mut() {
        let area = centered_rect(70, 70, f.area());
        f.render_widget(Clear, area);
        let items: Vec<ListItem> = if chooser.entries.is_empty() {
            vec![ListItem::new("<empty>")]
        } else {
            chooser
                .entries
                .iter()
                .map(|e| ListItem::new(e.label()))
                .collect()
        };
        let title = format!("Open {} (Enter select, Esc cancel)", chooser.dir.display());
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, area, &mut chooser.state);
    }

    if app.logs_open {
        let area = centered_rect(90, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Logs (Esc to close, ↑/↓ scroll)");
        let inner = block.inner(area);
        let height = inner.height as usize;
        let total = app.logs.len();
        let end = total.saturating_sub(app.logs_scroll);
        let start = end.saturating_sub(height);
        let mut items = Vec::new();
        for line in app.logs.iter().skip(start).take(end.saturating_sub(start)) {
            items.push(ListItem::new(line.clone()));
        }
        if items.is_empty() {
            items.push(ListItem::new("<no logs>"));
        }
        f.render_widget(List::new(items).block(block), area);
    }
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{mins}:{secs:02}")
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_as_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3_600)), "60:00");
    }

    #[test]
    fn centered_rect_is_inside_parent() {
        let parent = Rect::new(0, 0, 100, 50);
        let r = centered_rect(70, 70, parent);
        assert!(r.x >= parent.x && r.right() <= parent.right());
        assert!(r.y >= parent.y && r.bottom() <= parent.bottom());
        assert_eq!(r.width, 70);
    }
}
