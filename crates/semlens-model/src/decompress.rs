//! Block decompression of the model blob.
//!
//! The `DataModel` archive entry is compressed with a proprietary block
//! codec that this workspace does not implement. Decompression is an
//! injected capability:
//!
//! - `BlockDecompressor` trait: async interface used by the loader
//! - `Passthrough`: for entries that are already decompressed
//! - `ExternalCommand`: pipes the entry through an external program
//!
//! This is the only suspension point of a load.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use semlens_common::{LensError, LensResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Boxed future returned by [`BlockDecompressor::decompress`].
pub type DecompressFuture<'a> = Pin<Box<dyn Future<Output = LensResult<Vec<u8>>> + Send + 'a>>;

/// Trait for block codec implementations.
///
/// Failures must be reported as `LensError::Decompression`; they are never
/// retried.
pub trait BlockDecompressor: Send + Sync {
    /// Decompresses a whole entry.
    fn decompress<'a>(&'a self, input: &'a [u8]) -> DecompressFuture<'a>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl BlockDecompressor for Passthrough {
    fn decompress<'a>(&'a self, input: &'a [u8]) -> DecompressFuture<'a> {
        Box::pin(async move { Ok(input.to_vec()) })
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Runs an external program that reads the compressed entry on stdin and
/// writes the decompressed blob to stdout.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Creates a decompressor for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parses a shell-like command line (whitespace separated, no quoting).
    ///
    /// Returns `None` for an empty line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }

    async fn run(&self, input: &[u8]) -> LensResult<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LensError::decompression(format!(
                    "failed to start '{}': {e}",
                    self.program.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LensError::internal("child stdin not captured"))?;

        // Feed stdin while draining stdout so neither pipe fills up.
        let feed = async move {
            let result = stdin.write_all(input).await;
            drop(stdin);
            result
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| LensError::decompression(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LensError::decompression(format!(
                "'{}' exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        // A codec may stop reading once it has rejected the input; only
        // report the broken pipe when the program claims success.
        fed.map_err(|e| LensError::decompression(format!("writing input: {e}")))?;

        debug!(
            program = %self.program.display(),
            input_bytes = input.len(),
            output_bytes = output.stdout.len(),
            "external decompression finished"
        );
        Ok(output.stdout)
    }
}

impl BlockDecompressor for ExternalCommand {
    fn decompress<'a>(&'a self, input: &'a [u8]) -> DecompressFuture<'a> {
        Box::pin(self.run(input))
    }

    fn name(&self) -> &str {
        "external"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semlens_common::ErrorCode;

    #[tokio::test]
    async fn test_passthrough() {
        let out = Passthrough.decompress(b"blob").await.unwrap();
        assert_eq!(out, b"blob");
    }

    #[test]
    fn test_command_line_parsing() {
        let cmd = ExternalCommand::from_command_line("xpress9 -d --stdio").unwrap();
        assert_eq!(cmd.program, PathBuf::from("xpress9"));
        assert_eq!(cmd.args, vec!["-d", "--stdio"]);
        assert!(ExternalCommand::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_cat() {
        let cmd = ExternalCommand::new("cat");
        let out = cmd.decompress(b"hello codec").await.unwrap();
        assert_eq!(out, b"hello codec");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_failure_is_decompression_error() {
        let cmd = ExternalCommand::new("sh").arg("-c").arg("echo bad block >&2; exit 3");
        let err = cmd.decompress(b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Decompression);
        assert!(err.to_string().contains("bad block"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let cmd = ExternalCommand::new("/nonexistent/semlens-codec");
        let err = cmd.decompress(b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Decompression);
    }
}
