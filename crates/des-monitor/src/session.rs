//! `Session` — the prompt/read/execute loop of one console connection.

use std::io::{BufRead, Write};

use des_sched::Scheduler;
use tracing::debug;

use crate::{Command, MonitorError, MonitorResult};

/// Printed when a session ends, whatever the reason.
pub const EXITING: &str = "EXITING";

/// One console conversation with a scheduler.
///
/// Prompts with `"<scheduler name> > "`, reads a line, executes it, and
/// repeats until end-of-input or `x`.  Unknown input is reported on the
/// output and the session carries on.
///
/// ```rust,ignore
/// let input = std::io::Cursor::new("ql\nx\n");
/// let mut out = Vec::new();
/// Session::new(es.clone(), input, &mut out).run()?;
/// ```
pub struct Session<R, W> {
    scheduler: Scheduler,
    input:     R,
    output:    W,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(scheduler: Scheduler, input: R, output: W) -> Self {
        Self { scheduler, input, output }
    }

    /// Run the session to completion.
    ///
    /// # Errors
    ///
    /// [`MonitorError::Io`] if reading input or writing output fails.
    pub fn run(mut self) -> MonitorResult<()> {
        debug!(scheduler = %self.scheduler, "console session opened");
        self.serve()?;
        writeln!(self.output, "{EXITING}")?;
        self.output.flush()?;
        debug!(scheduler = %self.scheduler, "console session closed");
        Ok(())
    }

    fn serve(&mut self) -> MonitorResult<()> {
        let mut line = String::new();
        loop {
            write!(self.output, "{} > ", self.scheduler.name())?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(());
            }

            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Exit)) => {
                    writeln!(self.output, "Exiting the monitor.")?;
                    return Ok(());
                }
                Ok(Some(cmd)) => self.execute(cmd)?,
                Err(MonitorError::UnknownCommand(text)) => {
                    writeln!(self.output, "Unknown command or illegal arguments: <{text}>")?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn execute(&mut self, cmd: Command) -> MonitorResult<()> {
        let es = &self.scheduler;
        match cmd {
            Command::DispatchedEvents => writeln!(self.output, "{}", es.total_events_delivered())?,
            Command::QueueLength => writeln!(self.output, "{}", es.queue_length())?,
            Command::MaxQueueLength => writeln!(self.output, "{}", es.max_queue_length())?,
            Command::Terminate => {
                writeln!(self.output, "Terminating the scheduler")?;
                es.terminate();
            }
            Command::Help | Command::Help2 => {
                writeln!(self.output, "The command parser for the {es} scheduler. Commands:")?;
                for c in Command::ALL {
                    writeln!(self.output, "\t{}", c.usage())?;
                }
            }
            // Handled by the loop.
            Command::Exit => {}
        }
        Ok(())
    }
}
