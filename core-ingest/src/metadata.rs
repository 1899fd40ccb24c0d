//! Metadata editing capability and its `exiftool` implementation.

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, trace};

/// EXIF tag holding the original capture date
const CAPTURE_DATE_TAG: &str = "-EXIF:DateTimeOriginal";

/// Read and rewrite embedded image metadata.
#[async_trait]
pub trait MetadataEditor: Send + Sync {
    /// Rebuild the metadata block in place, dropping corrupt structures while
    /// keeping every readable tag and the ICC profile.
    async fn repair(&self, path: &Path) -> Result<()>;

    /// Raw `DateTimeOriginal` value, `None` when absent or zeroed.
    async fn capture_date(&self, path: &Path) -> Result<Option<String>>;

    /// Set all date tags to an EXIF datetime (`YYYY:MM:DD HH:MM:SS`),
    /// keeping the file's modification time.
    async fn write_capture_date(&self, path: &Path, exif_datetime: &str) -> Result<()>;

    /// Copy all tags and the ICC profile from `from` onto `to`.
    async fn copy_metadata(&self, from: &Path, to: &Path) -> Result<()>;
}

/// [`MetadataEditor`] that shells out to `exiftool`.
#[derive(Debug, Clone)]
pub struct ExifToolEditor {
    program: PathBuf,
}

impl ExifToolEditor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, operation: &'static str, path: &Path, args: Vec<OsString>) -> Result<String> {
        trace!(program = ?self.program, ?args, "Running exiftool");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    IngestError::ToolUnavailable(self.program.display().to_string())
                }
                _ => IngestError::Metadata {
                    operation,
                    path: path.to_path_buf(),
                    message: e.to_string(),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(IngestError::Metadata {
                operation,
                path: path.to_path_buf(),
                message: if stderr.is_empty() {
                    format!("exiftool exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ExifToolEditor {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

fn args<const N: usize>(flags: [&str; N], tail: &[&Path]) -> Vec<OsString> {
    flags
        .iter()
        .map(OsString::from)
        .chain(tail.iter().map(|p| p.as_os_str().to_os_string()))
        .collect()
}

/// Interpret `-s3` output for a date tag.
fn parse_capture_date(stdout: &str) -> Option<String> {
    let value = stdout.lines().next()?.trim();
    if value.is_empty() || value.starts_with("0000:00:00") {
        None
    } else {
        Some(value.to_string())
    }
}

#[async_trait]
impl MetadataEditor for ExifToolEditor {
    async fn repair(&self, path: &Path) -> Result<()> {
        self.run(
            "repair",
            path,
            args(
                [
                    "-overwrite_original",
                    "-all=",
                    "-tagsfromfile",
                    "@",
                    "-all:all",
                    "-unsafe",
                    "-icc_profile",
                ],
                &[path],
            ),
        )
        .await?;
        debug!(path = ?path, "Repaired metadata");
        Ok(())
    }

    async fn capture_date(&self, path: &Path) -> Result<Option<String>> {
        let stdout = self
            .run("read date", path, args(["-s3", CAPTURE_DATE_TAG], &[path]))
            .await?;
        Ok(parse_capture_date(&stdout))
    }

    async fn write_capture_date(&self, path: &Path, exif_datetime: &str) -> Result<()> {
        let all_dates = format!("-AllDates={}", exif_datetime);
        self.run(
            "write date",
            path,
            args(["-overwrite_original", "-P", all_dates.as_str()], &[path]),
        )
        .await?;
        debug!(path = ?path, date = exif_datetime, "Wrote capture date");
        Ok(())
    }

    async fn copy_metadata(&self, from: &Path, to: &Path) -> Result<()> {
        let mut argv = args(["-overwrite_original", "-tagsfromfile"], &[from]);
        argv.extend(args(["-all:all", "-unsafe", "-icc_profile"], &[to]));
        self.run("copy", to, argv).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_date() {
        assert_eq!(
            parse_capture_date("2023:05:01 12:00:00\n").as_deref(),
            Some("2023:05:01 12:00:00")
        );
        assert_eq!(parse_capture_date(""), None);
        assert_eq!(parse_capture_date("\n"), None);
        assert_eq!(parse_capture_date("0000:00:00 00:00:00\n"), None);
    }

    #[test]
    fn test_args_order() {
        let argv = args(["-s3", CAPTURE_DATE_TAG], &[Path::new("/tmp/a.jpg")]);
        assert_eq!(
            argv,
            vec![
                OsString::from("-s3"),
                OsString::from("-EXIF:DateTimeOriginal"),
                OsString::from("/tmp/a.jpg"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_unavailable() {
        let editor = ExifToolEditor::new("/nonexistent/bin/exiftool-missing");
        let result = editor.repair(Path::new("/tmp/whatever.jpg")).await;
        assert!(matches!(result, Err(IngestError::ToolUnavailable(_))));
    }
}
