//! Static command dispatch tables
//!
//! Each family exposes one [`CommandTable`] mapping command names to plain
//! functions over the family's handler state. Composite commands call other
//! entries and concatenate their frames.

use crate::buffer::Frame;
use crate::error::{EncodingError, RobotError};
use crate::params::Params;

/// Encoder of one named command
pub type CommandFn<S> = fn(&mut S, &Params) -> Result<Vec<Frame>, EncodingError>;

/// Name → encoder table of one family
pub struct CommandTable<S: 'static> {
    pub family: &'static str,
    pub entries: &'static [(&'static str, CommandFn<S>)],
}

impl<S> CommandTable<S> {
    pub fn lookup(&self, name: &str) -> Option<CommandFn<S>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// Encode `name`, failing with `UnsupportedCommand` for unknown names
    pub fn encode(&self, state: &mut S, name: &str, params: &Params) -> Result<Vec<Frame>, RobotError> {
        let command = self
            .lookup(name)
            .ok_or_else(|| RobotError::UnsupportedCommand {
                family: self.family.to_string(),
                command: name.to_string(),
            })?;
        Ok(command(state, params)?)
    }
}
