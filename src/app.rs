use crate::cache::{CityCache, CityStore};
use crate::city::City;
use crate::event::{Event, EventHandler, LoadEvent};
use crate::source::CitySource;
use crate::ui;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// What the main area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
  Loading,
  Loaded,
  Failed(String),
}

/// Selection movement in the result list
#[derive(Debug, Clone, Copy)]
enum Step {
  Up,
  Down,
}

/// Main application state
pub struct App<S: CityStore + 'static, R: CitySource + 'static> {
  cache: Arc<CityCache<S, R>>,

  /// Search bar
  search: SearchInput,

  /// Index into the current results
  selected: usize,

  status: LoadStatus,

  /// Transient message for the status bar
  message: Option<String>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl<S: CityStore + 'static, R: CitySource + 'static> App<S, R> {
  pub fn new(cache: Arc<CityCache<S, R>>) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();

    Self {
      cache,
      search: SearchInput::new(),
      selected: 0,
      status: LoadStatus::Loading,
      message: None,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    self.load_cities();
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    let mut updates = self.cache.subscribe();

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      tokio::select! {
        event = events.next() => match event {
          Some(event) => self.handle_event(event),
          None => break,
        },
        // Redraw on new results or load progress
        changed = updates.changed() => {
          if changed.is_err() {
            break;
          }
          self.clamp_selection();
        }
      }
    }

    Ok(())
  }

  /// Run the bootstrap in the background, reporting back through the event channel
  fn load_cities(&mut self) {
    self.status = LoadStatus::Loading;
    self.message = None;

    let cache = Arc::clone(&self.cache);
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let event = match cache.ensure_loaded().await {
        Ok(()) => LoadEvent::Finished,
        Err(e) => LoadEvent::Failed(e.to_string()),
      };
      let _ = tx.send(Event::Load(event));
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Load(load) => self.handle_load_event(load),
    }
  }

  fn handle_load_event(&mut self, event: LoadEvent) {
    match event {
      LoadEvent::Finished => {
        info!("cities ready");
        self.status = LoadStatus::Loaded;
        // Searches and filter toggles during the load were ignored, apply them now
        self.cache.search(self.search.query());
        self.clamp_selection();
      }
      LoadEvent::Failed(msg) => {
        error!(error = %msg, "loading cities failed");
        self.status = LoadStatus::Failed(msg);
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(term)) => {
        self.cache.search(&term);
        self.selected = 0;
        return;
      }
      KeyResult::Handled => return,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('q') => self.should_quit = true,

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(Step::Up),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(Step::Down),

      KeyCode::Char('f') => self.toggle_favorite(),
      KeyCode::Char('F') => self.toggle_favorites_only(),
      KeyCode::Char('r') if matches!(self.status, LoadStatus::Failed(_)) => self.load_cities(),

      _ => {}
    }
  }

  fn toggle_favorite(&mut self) {
    let Some(city) = self.selected_city() else {
      return;
    };

    match self.cache.set_favorite(&city, !city.is_favorite) {
      Ok(()) => {
        self.message = None;
        self.clamp_selection();
      }
      Err(e) => self.message = Some(format!("Could not save favorite: {}", e)),
    }
  }

  fn toggle_favorites_only(&mut self) {
    let value = !self.cache.show_only_favorites();
    self.cache.set_show_only_favorites(value);
    self.selected = 0;
  }

  fn move_selection(&mut self, step: Step) {
    let len = self.cache.results().len();
    if len == 0 {
      return;
    }
    let current = self.selected.min(len - 1);
    self.selected = match step {
      Step::Up => (current + len - 1) % len,
      Step::Down => (current + 1) % len,
    };
  }

  fn clamp_selection(&mut self) {
    let len = self.cache.results().len();
    self.selected = self.selected.min(len.saturating_sub(1));
  }

  // Accessors for UI rendering
  pub fn results(&self) -> Vec<City> {
    self.cache.results()
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn selected_city(&self) -> Option<City> {
    self.cache.results().get(self.selected).cloned()
  }

  pub fn status(&self) -> &LoadStatus {
    &self.status
  }

  pub fn load_progress(&self) -> u8 {
    self.cache.load_progress()
  }

  pub fn max_results(&self) -> usize {
    self.cache.max_results()
  }

  pub fn favorites_only(&self) -> bool {
    self.cache.show_only_favorites()
  }

  pub fn search(&self) -> &SearchInput {
    &self.search
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }
}
