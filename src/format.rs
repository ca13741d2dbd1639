use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatterError {
    #[error("formatter `{program}` could not be launched: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("formatter exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("formatter timed out after {0:?}")]
    Timeout(Duration),

    #[error("formatter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("formatter produced non-UTF-8 output")]
    Decode,
}

/// External code formatter collaborator.
///
/// On error the caller keeps the pre-format text; a formatter failure must
/// never lose a text change the user asked for.
pub trait Formatter: Send {
    fn format(&self, text: &str) -> Result<String, FormatterError>;
}

/// Passes text through unchanged. Used for `--no-format` runs and tests.
#[derive(Debug, Clone, Default)]
pub struct IdentityFormatter;

impl Formatter for IdentityFormatter {
    fn format(&self, text: &str) -> Result<String, FormatterError> {
        Ok(text.to_string())
    }
}

/// Runs an external formatting program as a subprocess: candidate text on
/// stdin, formatted result on stdout. Non-zero exit or timeout is an error.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

impl CommandFormatter {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
            timeout,
        }
    }

    fn run(&self, input: &str) -> Result<String, FormatterError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FormatterError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Drain stdout/stderr on dedicated threads so a chatty child never
        // deadlocks on a full pipe while we poll for exit.
        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let out_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });
        let err_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        {
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin.write_all(input.as_bytes())?;
            // Dropping stdin closes the pipe and lets the child finish.
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FormatterError::Timeout(self.timeout));
                }
                None => thread::sleep(WAIT_POLL_INTERVAL),
            }
        };

        let stdout_bytes = out_reader
            .join()
            .map_err(|_| std::io::Error::other("stdout reader panicked"))??;
        let stderr_bytes = err_reader
            .join()
            .map_err(|_| std::io::Error::other("stderr reader panicked"))??;

        if !status.success() {
            return Err(FormatterError::NonZeroExit {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
            });
        }

        String::from_utf8(stdout_bytes).map_err(|_| FormatterError::Decode)
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, text: &str) -> Result<String, FormatterError> {
        self.run(text)
    }
}

/// Pre-format cleanup applied before the external formatter: strip outer
/// whitespace and drop trailing semicolons. Runs unconditionally, so a
/// formatter failure still leaves cleaned text behind.
pub fn preclean(text: &str) -> String {
    let stripped = text.trim();
    let mut lines: Vec<String> = Vec::new();
    for line in stripped.lines() {
        let trimmed = line.trim_end();
        if let Some(no_semi) = trimmed.strip_suffix(';') {
            lines.push(no_semi.trim_end().to_string());
        } else {
            lines.push(line.to_string());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_formatter_is_transparent() {
        let text = "def f():\n    pass\n";
        assert_eq!(IdentityFormatter.format(text).unwrap(), text);
    }

    #[test]
    fn preclean_strips_trailing_semicolons() {
        let input = "\nx = 1;\ny = 2 ;  \nz = 'a;b'\n";
        assert_eq!(preclean(input), "x = 1\ny = 2\nz = 'a;b'");
    }

    #[test]
    fn preclean_trims_outer_whitespace() {
        assert_eq!(preclean("\n\n  x = 1\n\n"), "x = 1");
    }

    #[test]
    #[cfg(unix)]
    fn command_formatter_round_trip() {
        let fmt = CommandFormatter::new(
            "cat",
            Vec::<String>::new(),
            Duration::from_secs(5),
        );
        assert_eq!(fmt.format("x = 1\n").unwrap(), "x = 1\n");
    }

    #[test]
    #[cfg(unix)]
    fn command_formatter_reports_nonzero_exit() {
        let fmt = CommandFormatter::new(
            "false",
            Vec::<String>::new(),
            Duration::from_secs(5),
        );
        assert!(matches!(
            fmt.format("x = 1\n"),
            Err(FormatterError::NonZeroExit { .. })
        ));
    }

    #[test]
    fn command_formatter_reports_missing_program() {
        let fmt = CommandFormatter::new(
            "definitely-not-a-real-formatter",
            Vec::<String>::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            fmt.format("x = 1\n"),
            Err(FormatterError::Launch { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn command_formatter_times_out() {
        let fmt = CommandFormatter::new(
            "sleep",
            ["5".to_string()],
            Duration::from_millis(100),
        );
        assert!(matches!(
            fmt.format(""),
            Err(FormatterError::Timeout(_))
        ));
    }
}
