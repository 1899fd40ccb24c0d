use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// `LoggerSink` appending one JSON object per line to a file.
///
/// The file is created on the first entry and always opened in append mode,
/// so several runs can share it and an external rotator may truncate it.
pub struct JsonLinesLogSink {
    path: PathBuf,
    min_level: LogLevel,
    file: Mutex<Option<File>>,
}

impl JsonLinesLogSink {
    pub fn new(path: impl AsRef<Path>, min_level: LogLevel) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            min_level,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LoggerSink for JsonLinesLogSink {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| BridgeError::OperationFailed(format!("log entry encoding: {}", e)))?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line).await?;
            file.flush().await?;
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
