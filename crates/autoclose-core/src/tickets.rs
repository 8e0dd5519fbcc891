//! File-backed view of the host ticket table.
//!
//! The host ticket system owns `threads.json`; we only look up open threads
//! and stamp the scheduled-close columns that its close job reads. Fields we
//! do not know about are carried through untouched on rewrite.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{
    domain::{ChannelId, ThreadId},
    errors::Error,
    ports::{CloseScheduler, ScheduledClose, Thread, ThreadDirectory},
    Result,
};

/// Status value of a ticket that is still open.
pub const STATUS_OPEN: &str = "open";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRow {
    pub id: String,
    pub channel_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_close_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_close_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_close_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub struct JsonTicketTable {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonTicketTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn rows(&self) -> Result<Vec<TicketRow>> {
        let txt = match tokio::fs::read_to_string(&self.path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&txt)?)
    }

    async fn write_rows(&self, rows: &[TicketRow]) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(rows)?;
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ThreadDirectory for JsonTicketTable {
    async fn find_open_thread_by_channel_id(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Option<Thread>> {
        let rows = self.rows().await?;
        Ok(rows
            .into_iter()
            .find(|r| r.status == STATUS_OPEN && r.channel_id == channel_id.as_str())
            .map(|r| Thread {
                id: ThreadId(r.id),
                channel_id: channel_id.clone(),
            }))
    }
}

#[async_trait]
impl CloseScheduler for JsonTicketTable {
    async fn schedule_close(&self, close: ScheduledClose) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut rows = self.rows().await?;
        let Some(row) = rows.iter_mut().find(|r| r.id == close.thread_id.0) else {
            return Err(Error::External(format!(
                "ticket {} not found in {}",
                close.thread_id,
                self.path.display()
            )));
        };
        row.scheduled_close_at = Some(close.close_at);
        row.scheduled_close_id = Some(close.actor_id);
        row.scheduled_close_name = Some(close.actor_name);

        self.write_rows(&rows).await
    }
}
