//! CSV parsing and normalization for the two device datasets

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::Deserialize;
use tweeters_common::{MessageRecord, OccurrenceRecord};

use super::loader::LoadError;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Message row as written by the device. Unnamed index columns and any
/// other extra columns are ignored.
#[derive(Debug, Deserialize)]
struct RawMessageRow {
    #[serde(rename = "Event Num")]
    event_num: String,
    #[serde(rename = "Message Type")]
    message_type: String,
    #[serde(rename = "Date Time")]
    date_time: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Image Name")]
    image_name: String,
}

#[derive(Debug, Deserialize)]
struct RawOccurrenceRow {
    #[serde(rename = "Species")]
    species: String,
    #[serde(rename = "Date Time")]
    date_time: String,
}

/// Parse a timestamp in any of the layouts the device has written.
///
/// Offsets, when present, are dropped: the wall-clock time as recorded is
/// what the hour-of-day chart wants.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .ok()
        .map(|dt| dt.naive_local())
}

/// Fractional hour of day, `H + M/60`; seconds are ignored
pub fn hour_of_day(date_time: &NaiveDateTime) -> f64 {
    date_time.hour() as f64 + date_time.minute() as f64 / 60.0
}

/// Extract the common name from a species label.
///
/// "3. Larus argentatus (Herring Gull)" -> "Herring Gull". The leading index
/// is everything up to the first space. Without parentheses the label minus
/// its index is returned; a label without spaces is returned unchanged.
pub fn common_name(label: &str) -> String {
    let name = match label.find(' ') {
        Some(pos) => &label[pos + 1..],
        None => label,
    };

    match name.find('(') {
        Some(open) => {
            let inner = &name[open + 1..];
            match inner.find(')') {
                Some(close) => inner[..close].to_string(),
                None => inner.to_string(),
            }
        }
        None => name.to_string(),
    }
}

/// Pandas writes integer columns holding NaN as floats ("3.0")
fn parse_event_num(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

fn reader(body: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(body.as_bytes())
}

/// Decode a message stream CSV, rows in file order
pub fn parse_messages(name: &str, body: &str) -> Result<Vec<MessageRecord>, LoadError> {
    let mut records = Vec::new();

    for (index, result) in reader(body).deserialize::<RawMessageRow>().enumerate() {
        let row_number = index + 1;
        let raw = result.map_err(|source| LoadError::Csv {
            name: name.to_string(),
            source,
        })?;

        let event_num = parse_event_num(&raw.event_num).ok_or_else(|| LoadError::Value {
            name: name.to_string(),
            row: row_number,
            message: format!("invalid event number '{}'", raw.event_num),
        })?;
        let date_time = parse_timestamp(&raw.date_time).ok_or_else(|| LoadError::Value {
            name: name.to_string(),
            row: row_number,
            message: format!("invalid timestamp '{}'", raw.date_time),
        })?;

        records.push(MessageRecord {
            event_num,
            date_time,
            message_type: raw.message_type.trim().to_string(),
            message: raw.message,
            image_name: raw.image_name.trim().to_string(),
        });
    }

    Ok(records)
}

/// Newest first, informational rows and unlisted message types removed
pub fn normalize_messages(mut records: Vec<MessageRecord>) -> Vec<MessageRecord> {
    // Stable sort keeps file order among equal timestamps
    records.sort_by(|a, b| b.date_time.cmp(&a.date_time));
    records.retain(MessageRecord::is_displayable);
    records
}

/// Decode an occurrence CSV and derive hour and common name per row
pub fn parse_occurrences(name: &str, body: &str) -> Result<Vec<OccurrenceRecord>, LoadError> {
    let mut records = Vec::new();

    for (index, result) in reader(body).deserialize::<RawOccurrenceRow>().enumerate() {
        let raw = result.map_err(|source| LoadError::Csv {
            name: name.to_string(),
            source,
        })?;

        let date_time = parse_timestamp(&raw.date_time).ok_or_else(|| LoadError::Value {
            name: name.to_string(),
            row: index + 1,
            message: format!("invalid timestamp '{}'", raw.date_time),
        })?;

        records.push(OccurrenceRecord {
            hour: hour_of_day(&date_time),
            common_name: common_name(&raw.species),
            species: raw.species,
            date_time,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const MESSAGES_CSV: &str = "\
,Event Num,Message Type,Date Time,Message,Image Name
0,0,start,2023-01-01 05:00:00.000001,Starting up,
1,1,spotted,2023-01-01 06:30:00.5,Northern Cardinal,2023-01-01-06-30-00.jpg
2,1,inconclusive,2023-01-01 06:31:00,Maybe a bird,
3,2,possible,2023-01-01 14:00:00,Blue Jay,2023-01-01-14-00-00.jpg
4,3,spotted,2023-01-01 09:15:00,Herring Gull,2023-01-01-09-15-00.gif
";

    #[test]
    fn test_common_name_examples() {
        assert_eq!(common_name("3. Larus argentatus (Herring Gull)"), "Herring Gull");
        assert_eq!(common_name("12. Genus species_Common Name"), "Genus species_Common Name");
        assert_eq!(common_name("Cardinal"), "Cardinal");
        assert_eq!(common_name("7. Cardinalis cardinalis (Northern Cardinal"), "Northern Cardinal");
        assert_eq!(common_name("1.(Robin)"), "Robin");
    }

    #[test]
    fn test_hour_of_day() {
        let dt = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(6, 30, 59)
            .unwrap();
        assert_eq!(hour_of_day(&dt), 6.5);

        let late = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let hour = hour_of_day(&late);
        assert!(hour >= 0.0 && hour < 24.0);
        assert_eq!(hour, 23.0 + 59.0 / 60.0);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2023-01-01 06:30:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2023-01-01T06:30:00 "), Some(expected));
        assert_eq!(parse_timestamp("2023-01-01 06:30"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-01T06:30:00-06:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-01 06:30:00-06:00"), Some(expected));
        assert!(parse_timestamp("06:30").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_event_num() {
        assert_eq!(parse_event_num("12"), Some(12));
        assert_eq!(parse_event_num(" 3.0 "), Some(3));
        assert_eq!(parse_event_num("3.5"), None);
        assert_eq!(parse_event_num("nan"), None);
        assert_eq!(parse_event_num(""), None);
    }

    #[test]
    fn test_messages_filtered_and_sorted() {
        let records = normalize_messages(parse_messages("m.csv", MESSAGES_CSV).unwrap());
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["Blue Jay", "Herring Gull", "Northern Cardinal"]);

        for pair in records.windows(2) {
            assert!(pair[0].date_time >= pair[1].date_time);
        }
        assert!(records.iter().all(|r| r.event_num != 0));
        assert!(records.iter().all(|r| r.message_type == "spotted" || r.message_type == "possible"));
    }

    #[test]
    fn test_event_zero_excluded_even_when_spotted() {
        let csv = "Event Num,Message Type,Date Time,Message,Image Name\n0,spotted,2023-01-01 06:30:00,x,\n";
        let records = normalize_messages(parse_messages("m.csv", csv).unwrap());
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_column_is_csv_error() {
        let csv = "Event Num,Date Time\n1,2023-01-01 06:30:00\n";
        let err = parse_messages("m.csv", csv).unwrap_err();
        assert!(matches!(err, LoadError::Csv { .. }));
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let csv = "Species,Date Time\n1. A b (C),2023-01-01 06:30:00\n2. D e (F),yesterday\n";
        match parse_occurrences("o.csv", csv).unwrap_err() {
            LoadError::Value { row, .. } => assert_eq!(row, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_occurrences_derives_fields() {
        let csv = "\
,Species,Date Time
0,7. Cardinalis cardinalis (Northern Cardinal),2023-01-01 06:30:12
1,3. Larus argentatus (Herring Gull),2023-01-01 14:00:00
";
        let records = parse_occurrences("o.csv", csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].common_name, "Northern Cardinal");
        assert_eq!(records[0].hour, 6.5);
        assert_eq!(records[1].common_name, "Herring Gull");
        assert_eq!(records[1].hour, 14.0);
    }

    #[test]
    fn test_header_only_is_empty() {
        let records = parse_occurrences("o.csv", "Species,Date Time\n").unwrap();
        assert!(records.is_empty());
    }
}
