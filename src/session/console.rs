//! Terminal I/O for the session drivers
//!
//! Wraps an async line reader, a writer, and the Ctrl-C channel so the
//! drivers can be run against real stdio or in-memory buffers.

use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

/// Line-oriented console
pub struct Console<R, W> {
    input: R,
    output: W,
    interrupts: broadcast::Receiver<()>,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Create a console; `interrupts` fires on each Ctrl-C
    pub fn new(input: R, output: W, interrupts: broadcast::Receiver<()>) -> Self {
        Self {
            input,
            output,
            interrupts,
        }
    }

    /// Write a line
    pub fn println(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{}", line)?;
        self.output.flush()
    }

    /// Write an empty line
    pub fn blank(&mut self) -> io::Result<()> {
        self.println("")
    }

    /// Show `prompt` and read one line
    ///
    /// Returns `None` on end of input or when interrupted while waiting.
    /// Ctrl-C presses from before the prompt appeared are discarded.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.clear_interrupts();
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let input = &mut self.input;
        let interrupts = &mut self.interrupts;
        let mut buf = String::new();

        tokio::select! {
            read = input.read_line(&mut buf) => {
                if read? == 0 {
                    Ok(None)
                } else {
                    Ok(Some(buf))
                }
            }
            _ = wait_for_interrupt(interrupts) => {
                // Leave the prompt line
                writeln!(self.output)?;
                Ok(None)
            }
        }
    }

    /// Resolve on the next Ctrl-C
    pub async fn interrupted(&mut self) {
        wait_for_interrupt(&mut self.interrupts).await
    }

    /// Drop interrupts queued while nobody was listening
    fn clear_interrupts(&mut self) {
        loop {
            match self.interrupts.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    /// Consume the console, returning the writer
    pub fn into_output(self) -> W {
        self.output
    }
}

/// Wait for an interrupt; never resolves once the sender is gone
async fn wait_for_interrupt(rx: &mut broadcast::Receiver<()>) {
    loop {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
