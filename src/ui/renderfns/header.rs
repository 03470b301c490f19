use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with name, result count, filter state and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  shown: usize,
  max_results: usize,
  favorites_only: bool,
) {
  let mut spans = vec![
    Span::styled(" cityscope ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", shown_label(shown, max_results)),
      Style::default().fg(Color::White),
    ),
  ];

  if favorites_only {
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      " ★ favorites ",
      Style::default().fg(Color::Yellow).bold(),
    ));
  }

  spans.extend([
    Span::raw("  "),
    // Shortcuts - keys highlighted, descriptions dimmed
    Span::styled("</>", Style::default().fg(Color::Cyan)),
    Span::styled(" search", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<f>", Style::default().fg(Color::Cyan)),
    Span::styled(" favorite", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<F>", Style::default().fg(Color::Cyan)),
    Span::styled(" favorites only", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" quit", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// A full page means more cities may match than are listed
fn shown_label(shown: usize, max_results: usize) -> String {
  let noun = if shown == 1 { "city" } else { "cities" };
  if shown > 0 && shown >= max_results {
    format!("first {} {}", shown, noun)
  } else {
    format!("{} {}", shown, noun)
  }
}
