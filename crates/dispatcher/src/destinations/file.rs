//! FileDestination - appends events to a JSON Lines file

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{
    AnalyticsEvent, ContractError, Delivery, DestinationMetadata, EventContext, Settings,
};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

pub const FILE_DESTINATION_TYPE: &str = "file";

/// One line of output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord<'a> {
    received_at: DateTime<Utc>,
    session_id: &'a str,
    event: &'a AnalyticsEvent,
}

/// Destination that appends one JSON object per event to a file
///
/// Settings: `path` (required).
#[derive(Debug, Default)]
pub struct FileDestination {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl FileDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn open(path: &Path) -> std::io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new().create(true).append(true).open(path).await
    }

    #[instrument(
        name = "file_destination_deliver",
        skip(self, event, ctx),
        fields(event_type = %event.event_type())
    )]
    async fn deliver(
        &self,
        event: &AnalyticsEvent,
        ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        let record = FileRecord {
            received_at: Utc::now(),
            session_id: &ctx.session_id,
            event,
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| ContractError::delivery(FILE_DESTINATION_TYPE, e.to_string()))?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| ContractError::delivery(FILE_DESTINATION_TYPE, "file not open"))?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(bytes = line.len(), "Event appended");
        Ok(Delivery::Delivered)
    }
}

forward_event_handlers!(FileDestination => deliver {
    fn destination_type(&self) -> &str {
        FILE_DESTINATION_TYPE
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata {
            name: "File".to_string(),
            description: "Appends events to a JSON Lines file".to_string(),
            category: Some("storage".to_string()),
            website: None,
        }
    }

    async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError> {
        let path = settings
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                ContractError::invalid_settings(FILE_DESTINATION_TYPE, "missing 'path' setting")
            })?;

        let file = Self::open(&path).await.map_err(|e| {
            ContractError::initialization(
                FILE_DESTINATION_TYPE,
                format!("cannot open '{}': {e}", path.display()),
            )
        })?;

        debug!(path = %path.display(), "FileDestination opened");
        *self.file.get_mut() = Some(file);
        self.path = Some(path);
        Ok(())
    }

    async fn test_connection(&self) -> Result<bool, ContractError> {
        Ok(self.file.lock().await.is_some())
    }

    async fn destroy(&self) -> Result<(), ContractError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
        }
        debug!("FileDestination closed");
        Ok(())
    }
});
