//! [`CommandSource`] over any buffered async reader: stdin or a script file.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::trace;

use super::{parse_command, CommandError, CommandSource};
use crate::application::inject::Command;

/// Reads one command per line.
#[derive(Debug)]
pub struct LineCommandSource<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: AsyncBufRead + Unpin + Send> LineCommandSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl LineCommandSource<BufReader<Stdin>> {
    /// Commands typed or piped on standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl LineCommandSource<BufReader<File>> {
    /// Commands from a script file.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Io`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, CommandError> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CommandSource for LineCommandSource<R> {
    async fn next_command(&mut self) -> Result<Option<Command>, CommandError> {
        while let Some(text) = self.lines.next_line().await? {
            self.line += 1;
            if let Some(command) = parse_command(&text)? {
                trace!(line = self.line, ?command, "command read");
                return Ok(Some(command));
            }
        }
        Ok(None)
    }

    fn line_number(&self) -> usize {
        self.line
    }
}
