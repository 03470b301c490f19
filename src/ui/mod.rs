pub mod components;
mod renderfns;
mod views;

use crate::app::{App, LoadStatus};
use crate::cache::CityStore;
use crate::source::CitySource;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw<S: CityStore + 'static, R: CitySource + 'static>(frame: &mut Frame, app: &App<S, R>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(3), // Search bar
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  let results = app.results();

  renderfns::draw_header(
    frame,
    chunks[0],
    results.len(),
    app.max_results(),
    app.favorites_only(),
  );
  app.search().render(frame, chunks[1]);

  match app.status() {
    LoadStatus::Loading => views::status::draw_loading(frame, chunks[2], app.load_progress()),
    LoadStatus::Failed(message) => views::status::draw_error(frame, chunks[2], message),
    LoadStatus::Loaded => {
      let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);

      views::city_list::draw_city_list(
        frame,
        panes[0],
        &results,
        app.selected(),
        app.favorites_only(),
      );
      views::city_detail::draw_city_detail(frame, panes[1], results.get(app.selected()));
    }
  }

  draw_status_bar(frame, chunks[3], app);
}

fn draw_status_bar<S: CityStore + 'static, R: CitySource + 'static>(
  frame: &mut Frame,
  area: Rect,
  app: &App<S, R>,
) {
  let (content, style) = if let Some(message) = app.message() {
    (format!(" {}", message), Style::default().fg(Color::Red))
  } else if app.search().is_active() {
    (
      " type to filter  Enter:done  Esc:clear".to_string(),
      Style::default().fg(Color::Cyan),
    )
  } else {
    (
      " /search  j/k:nav  f:favorite  F:favorites only  q:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    )
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
