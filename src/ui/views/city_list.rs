use crate::city::City;
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_city_list(
  frame: &mut Frame,
  area: Rect,
  cities: &[City],
  selected: usize,
  favorites_only: bool,
) {
  let title = format!(" Cities ({}) ", cities.len());

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if cities.is_empty() {
    let content = if favorites_only {
      "No favorite cities match. Press F to show all cities."
    } else {
      "No cities found."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = cities
    .iter()
    .map(|city| {
      let star = if city.is_favorite {
        Span::styled("★ ", Style::default().fg(Color::Yellow))
      } else {
        Span::styled("☆ ", Style::default().fg(Color::DarkGray))
      };

      let line = Line::from(vec![
        star,
        Span::raw(truncate(&city.display_title(), 48)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
