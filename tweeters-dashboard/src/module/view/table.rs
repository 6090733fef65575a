//! Message table rows, columns and the browser-side table operations
//! (filter, sort, paging) done on the server

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tweeters_common::{ColumnDef, MessageColumn, MessageRecord, MessageSnapshot, DATE_TIME_DISPLAY_FORMAT};

pub const PAGE_SIZE: usize = 10;

/// One displayed row, keyed by the five column headers when serialized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "Event Num")]
    pub event_num: i64,
    #[serde(rename = "Date Time")]
    pub date_time: String,
    #[serde(rename = "Message Type")]
    pub message_type: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Image Name")]
    pub image_name: String,
}

impl TableRow {
    pub fn cell(&self, column: MessageColumn) -> String {
        match column {
            MessageColumn::EventNum => self.event_num.to_string(),
            MessageColumn::DateTime => self.date_time.clone(),
            MessageColumn::MessageType => self.message_type.clone(),
            MessageColumn::Message => self.message.clone(),
            MessageColumn::ImageName => self.image_name.clone(),
        }
    }

    fn compare(&self, other: &Self, column: MessageColumn) -> Ordering {
        match column {
            MessageColumn::EventNum => self.event_num.cmp(&other.event_num),
            // Display format sorts chronologically as text
            _ => self.cell(column).cmp(&other.cell(column)),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        MessageColumn::ALL
            .iter()
            .any(|column| self.cell(*column).to_lowercase().contains(needle))
    }
}

impl From<&MessageRecord> for TableRow {
    fn from(record: &MessageRecord) -> Self {
        Self {
            event_num: record.event_num,
            date_time: record.date_time.format(DATE_TIME_DISPLAY_FORMAT).to_string(),
            message_type: record.message_type.clone(),
            message: record.message.clone(),
            image_name: record.image_name.clone(),
        }
    }
}

/// Rows in loader order (already filtered and newest first)
pub fn table_rows(messages: &MessageSnapshot) -> Vec<TableRow> {
    messages.records.iter().map(TableRow::from).collect()
}

pub fn table_columns() -> Vec<ColumnDef> {
    MessageColumn::ALL.iter().map(MessageColumn::definition).collect()
}

/// Filter/sort/page request from the browser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    /// Case-insensitive substring matched against every cell
    pub filter: Option<String>,
    pub sort: Option<MessageColumn>,
    pub desc: bool,
    /// Zero-based page number
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<TableRow>,
    pub page: usize,
    pub page_count: usize,
    /// Rows matching the filter, across all pages
    pub total_rows: usize,
}

impl TableQuery {
    pub fn apply(&self, rows: &[TableRow]) -> TablePage {
        let needle = self
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let mut selected: Vec<&TableRow> = rows
            .iter()
            .filter(|row| needle.as_deref().is_none_or(|n| row.matches(n)))
            .collect();

        if let Some(column) = self.sort {
            selected.sort_by(|a, b| {
                let ordering = a.compare(b, column);
                if self.desc { ordering.reverse() } else { ordering }
            });
        }

        let total_rows = selected.len();
        let page_count = total_rows.div_ceil(PAGE_SIZE).max(1);
        let page = self.page.min(page_count - 1);

        TablePage {
            columns: table_columns(),
            rows: selected
                .into_iter()
                .skip(page * PAGE_SIZE)
                .take(PAGE_SIZE)
                .cloned()
                .collect(),
            page,
            page_count,
            total_rows,
        }
    }
}
