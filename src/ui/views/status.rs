use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

/// Progress of the first-time load
pub fn draw_loading(frame: &mut Frame, area: Rect, progress: u8) {
  let area = centered(area, 60, 3);

  let gauge = Gauge::default()
    .block(
      Block::default()
        .title(" Downloading cities ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue)),
    )
    .gauge_style(Style::default().fg(Color::Cyan))
    .percent(u16::from(progress.min(100)))
    .label(format!("{}%", progress));

  frame.render_widget(gauge, area);
}

/// Load failure with a retry hint
pub fn draw_error(frame: &mut Frame, area: Rect, message: &str) {
  let area = centered(area, 70, 7);

  let lines = vec![
    Line::from(Span::styled(
      "Could not load cities",
      Style::default().fg(Color::Red).bold(),
    )),
    Line::from(""),
    Line::from(message.to_string()),
    Line::from(""),
    Line::from(vec![
      Span::styled("<r>", Style::default().fg(Color::Cyan)),
      Span::styled(" retry", Style::default().fg(Color::DarkGray)),
    ]),
  ];

  let paragraph = Paragraph::new(lines)
    .block(
      Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red)),
    )
    .wrap(Wrap { trim: true });

  frame.render_widget(paragraph, area);
}

/// A `width`-percent wide, `height`-rows tall rect centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = (u32::from(area.width) * u32::from(width) / 100) as u16;
  let width = width.max(20).min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}
