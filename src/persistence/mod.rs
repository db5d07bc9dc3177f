//! CSV Persistence Module
//!
//! Journals every price and state notification for audit and analysis.
//! The journal is write-mostly; the feed never restores its state from it.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::types::FeedEvent;

/// One journal row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub timestamp: i64,
    /// PRICE_UPDATED or STATE_CHANGED
    pub event: String,
    /// New state for STATE_CHANGED rows
    pub state: Option<String>,
    /// Previous state for STATE_CHANGED rows
    pub previous_state: Option<String>,
    /// Raw 18-digit integer for PRICE_UPDATED rows
    pub price_raw: Option<String>,
    /// Human-readable price for PRICE_UPDATED rows
    pub price: Option<String>,
}

impl JournalRecord {
    pub fn from_event(timestamp: i64, event: &FeedEvent) -> Self {
        match event {
            FeedEvent::PriceUpdated { price } => Self {
                timestamp,
                event: event.kind().to_string(),
                state: None,
                previous_state: None,
                price_raw: Some(price.raw().to_string()),
                price: Some(price.to_string()),
            },
            FeedEvent::StateChanged { from, to } => Self {
                timestamp,
                event: event.kind().to_string(),
                state: Some(to.to_string()),
                previous_state: Some(from.to_string()),
                price_raw: None,
                price: None,
            },
        }
    }
}

struct DayWriter {
    date: NaiveDate,
    writer: csv::Writer<std::fs::File>,
}

/// Daily-rotated CSV journal of feed events
pub struct FeedJournal {
    dir: PathBuf,
    current: AsyncMutex<Option<DayWriter>>,
}

impl FeedJournal {
    pub fn new(data_dir: &str) -> Result<Self> {
        let dir = PathBuf::from(data_dir).join("journal");
        fs::create_dir_all(&dir).context("Failed to create journal directory")?;
        info!(dir = %dir.display(), "Feed journal ready");
        Ok(Self {
            dir,
            current: AsyncMutex::new(None),
        })
    }

    fn file_name(date: NaiveDate) -> String {
        format!("feed_{}.csv", date.format("%Y-%m-%d"))
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    /// Append one event, stamped with the current time
    pub async fn record(&self, event: &FeedEvent) -> Result<()> {
        let now = Utc::now();
        self.record_at(now.timestamp(), now.date_naive(), event).await
    }

    /// Append one event to the file for `date`
    pub async fn record_at(&self, timestamp: i64, date: NaiveDate, event: &FeedEvent) -> Result<()> {
        let mut current = self.current.lock().await;

        let rotate = current.as_ref().map(|w| w.date != date).unwrap_or(true);
        if rotate {
            let writer = Self::create_writer(&self.dir, &Self::file_name(date))?;
            *current = Some(DayWriter { date, writer });
        }

        if let Some(day) = current.as_mut() {
            day.writer
                .serialize(JournalRecord::from_event(timestamp, event))
                .context("Failed to write journal record")?;
            day.writer.flush().context("Failed to flush journal writer")?;
        }
        Ok(())
    }

    /// Read back every record journaled on `date`
    pub fn load_day(&self, date: NaiveDate) -> Result<Vec<JournalRecord>> {
        let path = self.dir.join(Self::file_name(date));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: JournalRecord = result.context("Failed to deserialize journal record")?;
            records.push(record);
        }
        Ok(records)
    }
}
