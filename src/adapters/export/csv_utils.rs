//! Serialize chat records as CSV or JSON. Uses the `csv` crate for quoting.

use crate::domain::ChatRecord;

/// Convert records to a CSV string. The header row comes from the record fields.
///
/// Titles are written as-is; the csv writer quotes commas, quotes and newlines.
pub fn records_to_csv(records: &[ChatRecord]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    if records.is_empty() {
        wtr.write_record(HEADER)?;
    }
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

/// Pretty-printed JSON array.
pub fn records_to_json(records: &[ChatRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Header for an empty export (serialize only emits it with the first row).
const HEADER: [&str; 10] = [
    "id",
    "type",
    "title",
    "username",
    "members",
    "is_deleted",
    "is_bot",
    "is_scam",
    "is_fake",
    "is_verified",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, title: &str) -> ChatRecord {
        ChatRecord {
            id,
            chat_type: "user".into(),
            title: title.into(),
            username: None,
            members: None,
            is_deleted: true,
            is_bot: false,
            is_scam: false,
            is_fake: false,
            is_verified: false,
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let csv = records_to_csv(&[record(1, "Alice"), record(2, "Bob")]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "1,user,Alice,,,true,false,false,false,false");
    }

    #[test]
    fn csv_quotes_special_characters() {
        let csv = records_to_csv(&[record(1, "Hello, \"world\"")]).unwrap();
        assert!(csv.contains("\"Hello, \"\"world\"\"\""));
    }

    #[test]
    fn empty_csv_still_has_header() {
        let csv = records_to_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), HEADER.join(","));
    }

    #[test]
    fn json_uses_type_key() {
        let json = records_to_json(&[record(7, "Zed")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["id"], 7);
        assert_eq!(value[0]["type"], "user");
        assert!(value[0]["username"].is_null());
    }
}
