use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use thiserror::Error;

/// How often a running converter is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long the error output is awaited after the converter exited.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);
/// Directory of the office profile inside the output directory.
const PROFILE_DIR: &str = "profile";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` did not finish within {} seconds", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("`{program}` exited with {status}: {output}")]
    Failed { program: String, status: String, output: String },
    #[error("the converter did not produce `{}`", path.display())]
    MissingOutput { path: PathBuf },
}

/// Converts a spreadsheet into another format.
pub trait Converter {
    /// Converts `input` and places the result in `output_dir`, returning the
    /// path of the converted file.
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionError>;
}

/// The office suite in headless mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soffice {
    program: String,
    format: String,
    timeout: Duration,
}

impl Soffice {
    pub const DEFAULT_PROGRAM: &'static str = "soffice";
    pub const DEFAULT_FORMAT: &'static str = "pdf";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(program: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    fn command(&self, input: &Path, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            // a profile of its own, running instances would swallow the request
            .arg(format!(
                "-env:UserInstallation={}",
                file_url(&output_dir.join(PROFILE_DIR))
            ))
            .arg("--headless")
            .arg("--convert-to")
            .arg(&self.format)
            .arg(input)
            .arg("--outdir")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        command
    }
}

/// A `file://` URL of an absolute path.
fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/").replace(' ', "%20");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

impl Default for Soffice {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, Self::DEFAULT_FORMAT, Self::DEFAULT_TIMEOUT)
    }
}

impl Converter for Soffice {
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionError> {
        let program = self.program.clone();
        debug!(
            "converting {} to {} with `{}`",
            input.display(),
            self.format,
            program
        );

        let mut child = self
            .command(input, output_dir)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: program.clone(),
                source,
            })?;

        // the pipe has to be drained while the converter runs, a full pipe
        // would block it until the deadline
        let (sender, receiver) = mpsc::channel();
        if let Some(mut stderr) = child.stderr.take() {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = stderr.read_to_end(&mut buffer);
                let _ = sender.send(String::from_utf8_lossy(&buffer).into_owned());
            });
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    // the process is stuck, it must not outlive the request
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConversionError::Timeout {
                        program,
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(ConversionError::Spawn { program, source });
                }
            }
        };

        if !status.success() {
            // helpers of the converter may keep the pipe open after it exited
            let output = receiver.recv_timeout(OUTPUT_GRACE).unwrap_or_default();

            return Err(ConversionError::Failed {
                program,
                status: status.to_string(),
                output: output.trim().to_string(),
            });
        }

        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let path = output_dir.join(format!("{}.{}", stem, self.format));
        if !path.is_file() {
            return Err(ConversionError::MissingOutput { path });
        }

        trace!("converted to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_program() {
        let converter = Soffice::new(
            "this-converter-does-not-exist",
            "pdf",
            Duration::from_secs(1),
        );
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            converter.convert(&dir.path().join("a.xlsx"), dir.path()),
            Err(ConversionError::Spawn { .. })
        ));
    }

    #[test]
    fn test_default() {
        let converter = Soffice::default();

        assert_eq!(converter.format(), "pdf");
        assert_eq!(converter.timeout, Duration::from_secs(60));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_without_output() {
        // `true` accepts any arguments and succeeds without writing anything
        let converter = Soffice::new("true", "pdf", Duration::from_secs(10));
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            converter.convert(&dir.path().join("Jane Doe.xlsx"), dir.path()),
            Err(ConversionError::MissingOutput { path }) if path.ends_with("Jane Doe.pdf")
        ));
    }

    #[test]
    fn test_own_profile() {
        let converter = Soffice::default();
        let dir = Path::new("/tmp/work dir");
        let command = converter.command(&dir.join("Jane Doe.xlsx"), dir);

        assert_eq!(
            command.get_args().next().map(|arg| arg.to_string_lossy().into_owned()),
            Some("-env:UserInstallation=file:///tmp/work%20dir/profile".to_string())
        );
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("convert.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn test_stuck_program_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Soffice::new(
            script(dir.path(), "exec sleep 30"),
            "pdf",
            Duration::from_secs(1),
        );

        let started = Instant::now();
        let result = converter.convert(&dir.path().join("a.xlsx"), dir.path());

        assert!(
            matches!(result, Err(ConversionError::Timeout { timeout, .. }) if timeout == Duration::from_secs(1)),
            "{:?}",
            result
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_large_error_output() {
        let dir = tempfile::tempdir().unwrap();
        // far more than a pipe buffer holds
        let converter = Soffice::new(
            script(
                dir.path(),
                "head -c 200000 /dev/zero | tr '\\0' x >&2\necho broken >&2\nexit 3",
            ),
            "pdf",
            Duration::from_secs(30),
        );

        let started = Instant::now();
        let result = converter.convert(&dir.path().join("a.xlsx"), dir.path());

        match result {
            Err(ConversionError::Failed { output, .. }) => {
                assert!(output.ends_with("broken"));
                assert!(output.len() > 200_000);
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let converter = Soffice::new("false", "pdf", Duration::from_secs(10));
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            converter.convert(&dir.path().join("a.xlsx"), dir.path()),
            Err(ConversionError::Failed { .. })
        ));
    }
}
