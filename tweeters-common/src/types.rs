use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Message types shown in the table; everything else is device chatter
pub const MESSAGE_TYPE_ALLOW_LIST: [&str; 2] = ["spotted", "possible"];

/// Display format for timestamps in table cells
pub const DATE_TIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The two CSV datasets published by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    #[serde(rename = "messages")]
    Messages,
    #[serde(rename = "occurrences")]
    Occurrences,
}

impl DatasetKind {
    /// File name suffix appended to a date prefix to locate the remote CSV
    pub fn suffix(&self) -> &'static str {
        match self {
            DatasetKind::Messages => "webstream.csv",
            DatasetKind::Occurrences => "web_occurrences.csv",
        }
    }

    /// Remote object name for this dataset under `prefix`
    pub fn object_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.suffix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Messages => "messages",
            DatasetKind::Occurrences => "occurrences",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "messages" | "webstream" => Ok(DatasetKind::Messages),
            "occurrences" | "web_occurrences" => Ok(DatasetKind::Occurrences),
            _ => Err(format!("Unknown dataset kind: {}", s)),
        }
    }
}

/// How a table column is presented to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Text,
    Markdown,
}

/// The five displayed message columns, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageColumn {
    #[serde(rename = "Event Num")]
    EventNum,
    #[serde(rename = "Date Time")]
    DateTime,
    #[serde(rename = "Message Type")]
    MessageType,
    #[serde(rename = "Message")]
    Message,
    #[serde(rename = "Image Name")]
    ImageName,
}

impl MessageColumn {
    pub const ALL: [MessageColumn; 5] = [
        MessageColumn::EventNum,
        MessageColumn::DateTime,
        MessageColumn::MessageType,
        MessageColumn::Message,
        MessageColumn::ImageName,
    ];

    /// Header text, identical to the CSV header the device writes
    pub fn header(&self) -> &'static str {
        match self {
            MessageColumn::EventNum => "Event Num",
            MessageColumn::DateTime => "Date Time",
            MessageColumn::MessageType => "Message Type",
            MessageColumn::Message => "Message",
            MessageColumn::ImageName => "Image Name",
        }
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            MessageColumn::ImageName => Presentation::Markdown,
            _ => Presentation::Text,
        }
    }

    /// Column definition handed to the table renderer
    pub fn definition(&self) -> ColumnDef {
        ColumnDef {
            id: self.header().to_string(),
            name: self.header().to_string(),
            presentation: self.presentation(),
        }
    }
}

impl std::fmt::Display for MessageColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

impl std::str::FromStr for MessageColumn {
    type Err = String;

    /// Accepts either the header text or a compact form like `event_num`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "eventnum" => Ok(MessageColumn::EventNum),
            "datetime" => Ok(MessageColumn::DateTime),
            "messagetype" => Ok(MessageColumn::MessageType),
            "message" => Ok(MessageColumn::Message),
            "imagename" => Ok(MessageColumn::ImageName),
            _ => Err(format!("Unknown message column: {}", s)),
        }
    }
}

/// Column metadata as published alongside table rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub id: String,
    pub name: String,
    pub presentation: Presentation,
}

/// One row of the device message stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub event_num: i64,
    pub date_time: NaiveDateTime,
    pub message_type: String,
    pub message: String,
    /// Image reference; may be a bare object name or pre-rendered markup
    pub image_name: String,
}

impl MessageRecord {
    /// Whether this record belongs in the displayed table
    pub fn is_displayable(&self) -> bool {
        self.event_num != 0 && MESSAGE_TYPE_ALLOW_LIST.contains(&self.message_type.as_str())
    }

    /// Cell text for `column`
    pub fn cell(&self, column: MessageColumn) -> String {
        match column {
            MessageColumn::EventNum => self.event_num.to_string(),
            MessageColumn::DateTime => self.date_time.format(DATE_TIME_DISPLAY_FORMAT).to_string(),
            MessageColumn::MessageType => self.message_type.clone(),
            MessageColumn::Message => self.message.clone(),
            MessageColumn::ImageName => self.image_name.clone(),
        }
    }
}

/// One bird detection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    /// Raw label, e.g. "3. Larus argentatus (Herring Gull)"
    pub species: String,
    pub date_time: NaiveDateTime,
    /// Fractional hour of day, `H + M/60`
    pub hour: f64,
    pub common_name: String,
}

/// Row types that can live in a [`Snapshot`]
pub trait Record {
    const KIND: DatasetKind;

    /// Column names of the dataset, in order
    fn columns() -> Vec<String>;
}

impl Record for MessageRecord {
    const KIND: DatasetKind = DatasetKind::Messages;

    fn columns() -> Vec<String> {
        MessageColumn::ALL.iter().map(|c| c.header().to_string()).collect()
    }
}

impl Record for OccurrenceRecord {
    const KIND: DatasetKind = DatasetKind::Occurrences;

    fn columns() -> Vec<String> {
        ["Species", "Date Time", "Hour", "Common Name"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}

/// An immutable table produced by one load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<R> {
    pub kind: DatasetKind,
    /// Date prefix the snapshot was loaded from (None when the store had no dates)
    pub prefix: Option<String>,
    pub columns: Vec<String>,
    pub records: Vec<R>,
}

impl<R: Record> Snapshot<R> {
    pub fn new(prefix: Option<String>, records: Vec<R>) -> Self {
        Self {
            kind: R::KIND,
            prefix,
            columns: R::columns(),
            records,
        }
    }

    /// Zero rows, correct schema
    pub fn empty(prefix: Option<String>) -> Self {
        Self::new(prefix, Vec::new())
    }
}

impl<R> Snapshot<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub type MessageSnapshot = Snapshot<MessageRecord>;
pub type OccurrenceSnapshot = Snapshot<OccurrenceRecord>;
