use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Events emitted by the search bar that the parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search term changed (each keystroke, empty string on cancel)
  Changed(String),
}

/// Search bar that stays on screen and takes focus with `/`
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if the search bar has focus
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Get the current search term
  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Handle a key event
  /// Call this regardless of focus - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.active = true;
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Changed => KeyResult::Event(SearchEvent::Changed(self.query().to_string())),
      InputResult::Moved => KeyResult::Handled,
      InputResult::Submitted => {
        // Keep the term, hand focus back to the list
        self.active = false;
        KeyResult::Handled
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Render the search bar
  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let border_color = if self.active {
      Color::Yellow
    } else {
      Color::DarkGray
    };

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color))
      .title(" Search cities ");

    let line = if self.query().is_empty() && !self.active {
      Line::from(Span::styled(
        "press / to search",
        Style::default().fg(Color::DarkGray),
      ))
    } else {
      let (before, after) = self.input.split_at_cursor();
      let mut spans = vec![
        Span::styled("/", Style::default().fg(Color::Yellow)),
        Span::raw(before.to_string()),
      ];
      if self.active {
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      spans.push(Span::raw(after.to_string()));
      Line::from(spans)
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
  }
}
