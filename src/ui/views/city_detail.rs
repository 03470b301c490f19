use crate::city::City;
use ratatui::prelude::*;
use ratatui::widgets::canvas::{Canvas, Map, MapResolution};
use ratatui::widgets::{Block, Borders, Paragraph};

/// Draw the selected city's details above a world map with its position marked
pub fn draw_city_detail(frame: &mut Frame, area: Rect, city: Option<&City>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(5), Constraint::Min(3)])
    .split(area);

  let block = Block::default()
    .title(" City ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let Some(city) = city else {
    let paragraph = Paragraph::new("No city selected.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  };

  let favorite = if city.is_favorite {
    Span::styled("★ favorite", Style::default().fg(Color::Yellow))
  } else {
    Span::styled("not a favorite", Style::default().fg(Color::DarkGray))
  };

  let lines = vec![
    Line::from(Span::styled(
      city.display_title(),
      Style::default().fg(Color::Cyan).bold(),
    )),
    Line::from(vec![
      Span::styled("coordinates: ", Style::default().fg(Color::DarkGray)),
      Span::raw(city.coordinates_label()),
    ]),
    Line::from(favorite),
  ];
  frame.render_widget(Paragraph::new(lines).block(block), chunks[0]);

  let (lon, lat) = (city.coord.lon, city.coord.lat);
  let map = Canvas::default()
    .block(
      Block::default()
        .title(" Map ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue)),
    )
    .x_bounds([-180.0, 180.0])
    .y_bounds([-90.0, 90.0])
    .paint(move |ctx| {
      ctx.draw(&Map {
        color: Color::DarkGray,
        resolution: MapResolution::High,
      });
      ctx.layer();
      ctx.print(lon, lat, Span::styled("●", Style::default().fg(Color::Red)));
    });
  frame.render_widget(map, chunks[1]);
}
