//! CSV report writer.
//!
//! A single blocking task owns the file; workers send finished records over
//! a channel, so rows never interleave. Each row is flushed as it arrives.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One report row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionRecord {
    pub name: String,
    pub size: usize,
    pub mime_type: String,
    pub id: String,
    pub description: String,
}

const CHANNEL_CAPACITY: usize = 64;

pub struct ReportWriter {
    tx: mpsc::Sender<DescriptionRecord>,
    handle: JoinHandle<usize>,
}

impl ReportWriter {
    /// Create (truncate) the report file. Failure here is fatal to the run.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create CSV file {}", path.display()))?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        let (tx, mut rx) = mpsc::channel::<DescriptionRecord>(CHANNEL_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || {
            let mut csv = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer);
            let mut written = 0;
            while let Some(record) = rx.blocking_recv() {
                let result = csv.serialize(&record).and_then(|()| {
                    csv.flush()?;
                    Ok(())
                });
                match result {
                    Ok(()) => written += 1,
                    Err(e) => tracing::error!("failed to write to CSV: {}", e),
                }
            }
            written
        });
        Self { tx, handle }
    }

    pub fn sender(&self) -> mpsc::Sender<DescriptionRecord> {
        self.tx.clone()
    }

    /// Close the channel, wait for queued rows to land, and return how many
    /// rows were written.
    pub async fn finish(self) -> anyhow::Result<usize> {
        drop(self.tx);
        self.handle.await.context("report writer task failed")
    }
}
