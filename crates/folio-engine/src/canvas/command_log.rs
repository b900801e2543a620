//! # Command Log
//!
//! Linear undo/redo history of canvas commands.
//!
//! - Pushing a command clears the redo stack (no branching)
//! - Undo reverses the newest command against the given scene and moves it to
//!   the redo stack; redo re-applies it and moves it back
//! - The log never owns the scene; callers pass the current one in and keep
//!   the returned one
//! - A failed undo/redo leaves both stacks unchanged

use crate::canvas::{Command, CommandError, Scene};

/// Default number of undo levels kept
pub const DEFAULT_MAX_LEVELS: usize = 100;

#[derive(Debug)]
pub struct CommandLog {
    /// Applied commands (most recent last)
    undo_stack: Vec<Command>,

    /// Undone commands (most recent last)
    redo_stack: Vec<Command>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_MAX_LEVELS)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Record a command that has already been applied
    pub fn push(&mut self, command: Command) {
        self.undo_stack.push(command);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Apply `command` to `scene` and record it
    pub fn execute(&mut self, command: Command, scene: &Scene) -> Result<Scene, CommandError> {
        let next = command.apply(scene)?;
        self.push(command);
        Ok(next)
    }

    /// Reverse the most recent command. `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self, scene: &Scene) -> Result<Option<Scene>, CommandError> {
        let Some(command) = self.undo_stack.last() else {
            return Ok(None);
        };
        let previous = command.reverse(scene)?;
        if let Some(command) = self.undo_stack.pop() {
            self.redo_stack.push(command);
        }
        Ok(Some(previous))
    }

    /// Re-apply the most recently undone command. `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, scene: &Scene) -> Result<Option<Scene>, CommandError> {
        let Some(command) = self.redo_stack.last() else {
            return Ok(None);
        };
        let next = command.apply(scene)?;
        if let Some(command) = self.redo_stack.pop() {
            self.undo_stack.push(command);
        }
        Ok(Some(next))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop all history, e.g. when another document is loaded
    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(Command::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(Command::description)
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasObject, Point};
    use pretty_assertions::assert_eq;

    fn circle() -> CanvasObject {
        CanvasObject::circle(Point::new(10.0, 10.0), 5.0)
    }

    #[test]
    fn test_log_creation() {
        let log = CommandLog::new();
        assert_eq!(log.undo_levels(), 0);
        assert_eq!(log.redo_levels(), 0);
        assert!(!log.can_undo());
        assert!(!log.can_redo());
        assert_eq!(log.max_levels(), DEFAULT_MAX_LEVELS);
    }

    #[test]
    fn test_add_circle_undo_redo() {
        let mut log = CommandLog::new();
        let start = Scene::new();

        let after = log.execute(Command::add(vec![circle()]), &start).unwrap();
        assert!(log.can_undo());

        let undone = log.undo(&after).unwrap().unwrap();
        assert_eq!(undone, start);
        assert!(log.can_redo());

        let redone = log.redo(&undone).unwrap().unwrap();
        assert_eq!(redone, after);
        assert!(!log.can_redo());
    }

    #[test]
    fn test_empty_log_is_noop() {
        let mut log = CommandLog::new();
        assert_eq!(log.undo(&Scene::new()), Ok(None));
        assert_eq!(log.redo(&Scene::new()), Ok(None));
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut log = CommandLog::new();
        let scene = log.execute(Command::add(vec![circle()]), &Scene::new()).unwrap();
        let scene = log.undo(&scene).unwrap().unwrap();
        assert_eq!(log.redo_levels(), 1);

        log.execute(Command::add(vec![circle()]), &scene).unwrap();

        assert_eq!(log.redo_levels(), 0);
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut log = CommandLog::with_max_levels(2);
        let mut scene = Scene::new();

        for _ in 0..3 {
            scene = log.execute(Command::add(vec![circle()]), &scene).unwrap();
        }

        assert_eq!(log.undo_levels(), 2);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn test_unlimited_levels() {
        let mut log = CommandLog::with_max_levels(0);
        let mut scene = Scene::new();

        for _ in 0..150 {
            scene = log.execute(Command::add(vec![circle()]), &scene).unwrap();
        }

        assert_eq!(log.undo_levels(), 150);
    }

    #[test]
    fn test_failed_undo_keeps_stacks() {
        let mut log = CommandLog::new();
        log.execute(Command::add(vec![circle()]), &Scene::new()).unwrap();

        // Scene the command was never applied to
        let result = log.undo(&Scene::new());

        assert!(matches!(result, Err(CommandError::UnknownObject(_))));
        assert_eq!(log.undo_levels(), 1);
        assert_eq!(log.redo_levels(), 0);
    }

    #[test]
    fn test_failed_execute_is_not_recorded() {
        let mut log = CommandLog::new();
        let object = circle();
        let scene = Scene::from_objects(vec![object.clone()]);

        let result = log.execute(Command::add(vec![object]), &scene);

        assert!(matches!(result, Err(CommandError::DuplicateObject(_))));
        assert!(!log.can_undo());
    }

    #[test]
    fn test_descriptions_and_reset() {
        let mut log = CommandLog::new();
        let scene = log.execute(Command::add(vec![circle()]), &Scene::new()).unwrap();
        let scene = log.execute(Command::clear(&scene), &scene).unwrap();
        assert_eq!(log.undo_description().as_deref(), Some("Clear canvas"));

        log.undo(&scene).unwrap();
        assert_eq!(log.redo_description().as_deref(), Some("Clear canvas"));
        assert_eq!(log.undo_description().as_deref(), Some("Add circle"));

        log.reset();
        assert!(!log.can_undo());
        assert!(!log.can_redo());
    }
}
