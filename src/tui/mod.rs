//! TUI module - workout mode checklist with ratatui

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
};
use std::io::{Stdout, stdout};

use crate::session::WorkoutTracker;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// How the user left the checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Save,
    Quit,
}

/// App state for TUI
pub struct App {
    tracker: WorkoutTracker,
    keys: Vec<String>,
    selected: usize,
    exit: Option<Exit>,
}

impl App {
    pub fn new(tracker: WorkoutTracker) -> Self {
        let keys = tracker.exercises().iter().map(|e| e.key()).collect();
        Self {
            tracker,
            keys,
            selected: 0,
            exit: None,
        }
    }

    pub fn tracker(&self) -> &WorkoutTracker {
        &self.tracker
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<Exit> {
        let mut terminal = init_terminal()?;

        let result = self.event_loop(&mut terminal);

        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<Exit> {
        loop {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
            if let Some(exit) = self.exit {
                return Ok(exit);
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let header = Paragraph::new(format!("Rutina - Entrenamiento de {}", self.tracker.day()))
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        // Exercise checklist
        let rows: Vec<Row> = self
            .tracker
            .exercises()
            .iter()
            .map(|e| {
                let done = self.tracker.is_completed(&e.key());
                let style = if done {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(if done { "[x]" } else { "[ ]" }),
                    Cell::from(e.group.display_name()),
                    Cell::from(e.name.clone()),
                    Cell::from(e.detail.to_string()),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Length(12),
                Constraint::Length(36),
                Constraint::Min(20),
            ],
        )
        .header(Row::new(vec!["", "Grupo", "Ejercicio", "Detalle"]).style(Style::default().bold()))
        .row_highlight_style(Style::default().reversed())
        .block(Block::default().borders(Borders::ALL).title("Hoy"));

        let mut state = TableState::default().with_selected(if self.keys.is_empty() {
            None
        } else {
            Some(self.selected)
        });
        frame.render_stateful_widget(table, chunks[1], &mut state);

        // Progress
        let progress = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progreso"))
            .gauge_style(Style::default().fg(Color::Green))
            .percent(u16::from(self.tracker.progress_percentage()))
            .label(format!(
                "{}/{} ({}%)",
                self.tracker.completed_count(),
                self.tracker.total_exercises(),
                self.tracker.progress_percentage()
            ));
        frame.render_widget(progress, chunks[2]);

        // Footer
        let footer = Paragraph::new("q: salir | espacio: marcar | s: guardar y salir")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key(key.code);
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.exit = Some(Exit::Quit),
            KeyCode::Char('s') => self.exit = Some(Exit::Save),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.keys.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(key) = self.keys.get(self.selected) {
                    self.tracker.toggle(key);
                }
            }
            _ => {}
        }
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ExerciseCatalog;
    use crate::plan::{MuscleGroup, Plan, Weekday};

    fn app() -> App {
        let mut plan = Plan::empty();
        plan.schedule.days.insert(MuscleGroup::Biceps, vec![Weekday::Lunes]);
        plan.selected_exercises.insert(
            MuscleGroup::Biceps,
            vec!["Curl martillo".to_string(), "Curl araña".to_string()],
        );
        let catalog = ExerciseCatalog::builtin().unwrap();
        App::new(WorkoutTracker::new(&plan, Weekday::Lunes, &catalog))
    }

    #[test]
    fn test_space_toggles_selected_row() {
        let mut app = app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.tracker().completed_count(), 1);
        // catalog order: Curl araña comes before Curl martillo
        assert!(app.tracker().is_completed("Biceps-Curl martillo"));
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut app = app();
        app.handle_key(KeyCode::Up);
        assert_eq!(app.selected, 0);
        for _ in 0..5 {
            app.handle_key(KeyCode::Down);
        }
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn test_exit_keys() {
        let mut saving = app();
        saving.handle_key(KeyCode::Char('s'));
        assert_eq!(saving.exit, Some(Exit::Save));

        let mut quitting = app();
        quitting.handle_key(KeyCode::Esc);
        assert_eq!(quitting.exit, Some(Exit::Quit));
    }
}
