// src/command/sequence.rs

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::command::{Command, CommandKind};
use crate::config::JobSection;
use crate::errors::Result;

/// Which safety commands to add around the file's own commands.
///
/// A pen-up is always prepended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyOptions {
    pub pen_up_at_end: bool,
    /// Move here at the end, if set.
    pub home: Option<(f64, f64)>,
}

impl SafetyOptions {
    pub fn from_job(job: &JobSection) -> Self {
        Self {
            pen_up_at_end: job.pen_up_at_end,
            home: job.home_at_end.then(|| (job.home[0], job.home[1])),
        }
    }
}

impl Default for SafetyOptions {
    fn default() -> Self {
        Self::from_job(&JobSection::default())
    }
}

/// Ordered list of commands for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSequence {
    commands: Vec<Command>,
}

impl CommandSequence {
    /// Build a sequence from raw lines without injecting anything. Blank lines
    /// are dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = lines
            .into_iter()
            .filter(|l| !l.as_ref().trim().is_empty())
            .map(|l| Command::parse(l.as_ref()))
            .collect();
        Self { commands }
    }

    /// Build a sequence from file contents with safety commands injected.
    pub fn from_text(text: &str, safety: SafetyOptions) -> Self {
        let mut commands = vec![Command::pen_up()];
        commands.extend(Self::from_lines(text.lines()).commands);
        if safety.pen_up_at_end {
            commands.push(Command::pen_up());
        }
        if let Some((x, y)) = safety.home {
            commands.push(Command::move_to(x, y));
        }
        Self { commands }
    }

    /// Read a command file and inject safety commands.
    pub fn load(path: impl AsRef<Path>, safety: SafetyOptions) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading command file {}", path.display()))?;
        Ok(Self::from_text(&text, safety))
    }

    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    /// Total number of commands, comments included.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn count_of(&self, kind: CommandKind) -> usize {
        self.commands.iter().filter(|c| c.kind() == kind).count()
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
