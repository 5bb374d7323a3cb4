//! FILENAME: core/matrix-engine/src/stream.rs
//! Streams a matrix through an external program, one line per cell.
//!
//! Every cell is rendered with `Cell::to_short_string` and written to the
//! child's stdin from a writer thread while its stdout is read back line by
//! line through the caller's parser. A non-zero exit fails the call; there is
//! no retry.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, warn};
use model::Cell;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::matrix::Matrix;

/// External program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl StreamCommand {
    pub fn new(program: impl Into<String>) -> Self {
        StreamCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("child {} unavailable", name))
}

/// Parses the child's output line by line. Bytes that are not valid UTF-8
/// are replaced. A read failure stops reading and is handed back so that
/// the caller still reaps the child; the pipe is closed on return.
fn read_cells<R, P>(stdout: R, parser: &P) -> (Vec<Cell>, Option<io::Error>)
where
    R: Read,
    P: Fn(&str) -> Option<Cell>,
{
    let mut reader = BufReader::new(stdout);
    let mut cells = Vec::new();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => return (cells, None),
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&buffer);
                let line: &str = &decoded;
                let line = line.strip_suffix('\n').unwrap_or(line);
                let line = line.strip_suffix('\r').unwrap_or(line);
                if let Some(cell) = parser(line) {
                    cells.push(cell);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (cells, Some(e)),
        }
    }
}

impl Matrix {
    /// Pipes every cell through `command`. Output lines for which `parser`
    /// returns `None` are skipped. The child is always waited on, even when
    /// its output cannot be read.
    pub fn stream<P>(&self, command: &StreamCommand, separator: &str, parser: P) -> Result<Matrix>
    where
        P: Fn(&str) -> Option<Cell>,
    {
        let lines: Vec<String> = self.cells().iter().map(|c| c.to_short_string(separator)).collect();
        debug!("stream: {} lines through '{}'", lines.len(), command.program);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let writer = thread::spawn(move || -> io::Result<()> {
            let mut stdin = BufWriter::new(stdin);
            for line in lines {
                writeln!(stdin, "{}", line)?;
            }
            stdin.flush()
        });

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let (cells, read_error) = read_cells(stdout, &parser);

        let status = child.wait()?;
        let written = writer.join();
        if !status.success() {
            warn!("stream: '{}' exited with {}", command.program, status);
            return Err(EngineError::StreamFailed {
                program: command.program.clone(),
                code: status.code(),
            });
        }
        if let Some(e) = read_error {
            return Err(e.into());
        }
        match written {
            Ok(Ok(())) => {}
            // The program may stop reading before all input is written.
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked").into()),
        }
        self.derived(cells)
    }
}
