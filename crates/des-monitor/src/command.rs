//! Console commands.

use std::fmt;
use std::str::FromStr;

use crate::{MonitorError, MonitorResult};

/// One console command.  Matching is case-insensitive on the first word of
/// the line; anything after it is ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// `x` — end this console session.  The scheduler keeps running.
    Exit,
    /// `de` — total events delivered.
    DispatchedEvents,
    /// `ql` — current queue length.
    QueueLength,
    /// `mql` — maximum queue length so far.
    MaxQueueLength,
    /// `terminate` — terminate the scheduler.
    Terminate,
    /// `?` — usage.
    Help,
    /// `h` — usage.
    Help2,
}

impl Command {
    /// Every command, in help order.
    pub const ALL: [Command; 7] = [
        Command::Exit,
        Command::DispatchedEvents,
        Command::QueueLength,
        Command::MaxQueueLength,
        Command::Terminate,
        Command::Help,
        Command::Help2,
    ];

    /// The word that invokes the command.
    pub const fn word(self) -> &'static str {
        match self {
            Command::Exit             => "x",
            Command::DispatchedEvents => "de",
            Command::QueueLength      => "ql",
            Command::MaxQueueLength   => "mql",
            Command::Terminate        => "terminate",
            Command::Help             => "?",
            Command::Help2            => "h",
        }
    }

    /// One-line description shown by help.
    pub const fn usage(self) -> &'static str {
        match self {
            Command::Exit => "<x> (exit) exits the monitor",
            Command::DispatchedEvents => {
                "<de> (dispatched events) returns the total number of events dispatched by the scheduler"
            }
            Command::QueueLength => "<ql> (queue length) returns the current length of the event queue",
            Command::MaxQueueLength => "<mql> (maximum queue length) returns the maximum length of the event queue",
            Command::Terminate => {
                "<terminate> (terminate) terminates the run() method of the scheduler, discarding all queued events"
            }
            Command::Help | Command::Help2 => "<?>/<h> (help) print usage information for each command",
        }
    }

    /// Parse a console line.
    ///
    /// Blank lines give `Ok(None)`.  An unrecognized first word gives
    /// [`MonitorError::UnknownCommand`] carrying the trimmed line.
    pub fn parse(line: &str) -> MonitorResult<Option<Command>> {
        let line = line.trim();
        let Some(word) = line.split_whitespace().next() else {
            return Ok(None);
        };
        word.parse()
            .map(Some)
            .map_err(|_| MonitorError::UnknownCommand(line.to_owned()))
    }
}

impl FromStr for Command {
    type Err = MonitorError;

    fn from_str(word: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.word().eq_ignore_ascii_case(word))
            .ok_or_else(|| MonitorError::UnknownCommand(word.to_owned()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}
