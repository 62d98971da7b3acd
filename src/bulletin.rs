use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::error::ReadError;
use crate::models::BulletinRow;

/// Spreadsheet token meaning "yes" in the Approved and Sent columns.
const TRUE_TOKEN: &str = "TRUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Section,
    Approved,
    Sent,
    EmailContact,
    ApplyLink,
    FurtherInfoLink,
    FacebookLink,
}

/// Source header, canonical field name, field.
const COLUMNS: [(&str, &str, Field); 8] = [
    ("Title", "Title", Field::Title),
    ("Section", "Section", Field::Section),
    ("Approved", "Approved", Field::Approved),
    ("Sent", "Sent", Field::Sent),
    ("\"Email contact\" address", "Email_contact_address", Field::EmailContact),
    ("\"Apply now\" link", "Apply_now_link", Field::ApplyLink),
    ("\"Further information\" link", "Further_information_link", Field::FurtherInfoLink),
    ("\"Facebook\" link", "Facebook_link", Field::FacebookLink),
];

/// Canonical template field name for a spreadsheet header.
pub fn canonical_field_name(header: &str) -> String {
    header.trim().replace(' ', "_").replace('"', "")
}

/// Where each column of the file ends up.
struct Layout {
    fixed: Vec<(Field, usize)>,
    extra: Vec<(String, usize)>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ReadError> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut fixed = Vec::new();
        let mut extra = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            let trimmed = header.trim();
            if trimmed.is_empty() {
                return Err(ReadError::BlankHeader(idx + 1));
            }

            let canonical = canonical_field_name(trimmed);
            if let Some(first) = seen.insert(canonical.clone(), trimmed.to_string()) {
                return Err(ReadError::DuplicateColumn {
                    first,
                    second: trimmed.to_string(),
                    field: canonical,
                });
            }

            match COLUMNS.iter().find(|(source, _, _)| *source == trimmed) {
                Some((_, _, field)) => fixed.push((*field, idx)),
                None => extra.push((canonical, idx)),
            }
        }

        for (source, _, field) in COLUMNS.iter() {
            if !fixed.iter().any(|(f, _)| f == field) {
                return Err(ReadError::MissingColumn(*source));
            }
        }

        Ok(Layout { fixed, extra })
    }

    fn row(&self, record: &csv::StringRecord) -> BulletinRow {
        let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();
        let mut row = BulletinRow::default();

        for (field, idx) in &self.fixed {
            let value = cell(*idx);
            match field {
                Field::Title => row.title = value,
                Field::Section => row.section = value,
                Field::Approved => row.approved = value == TRUE_TOKEN,
                Field::Sent => row.sent = value == TRUE_TOKEN,
                Field::EmailContact => row.email_contact = value,
                Field::ApplyLink => row.apply_link = value,
                Field::FurtherInfoLink => row.further_info_link = value,
                Field::FacebookLink => row.facebook_link = value,
            }
        }

        row.extra = self
            .extra
            .iter()
            .map(|(name, idx)| (name.clone(), cell(*idx)))
            .collect();

        row
    }
}

/// Read bulletins from any CSV source, keeping rows that are approved and not yet sent.
pub fn read_bulletins<R: Read>(source: R) -> Result<Vec<BulletinRow>, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let layout = Layout::from_headers(reader.headers()?)?;

    let mut total = 0usize;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        total += 1;

        let row = layout.row(&record);
        if row.approved && !row.sent {
            rows.push(row);
        } else {
            debug!(
                "Skipping bulletin {:?} (approved: {}, sent: {})",
                row.title, row.approved, row.sent
            );
        }
    }

    info!("{} of {} bulletins are approved and unsent", rows.len(), total);
    Ok(rows)
}

pub fn read_bulletins_file(path: &Path) -> Result<Vec<BulletinRow>, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_bulletins(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"Timestamp,Title,Section,Approved,Sent,"""Email contact"" address","""Apply now"" link","""Further information"" link","""Facebook"" link",Description"#;

    fn csv_with(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_only_approved_unsent_rows_are_kept() {
        let data = csv_with(&[
            "t1,Wine tasting,College,TRUE,FALSE,a@b.com,,,,Lovely",
            "t2,Old news,College,TRUE,TRUE,,,,,",
            "t3,Pending,Jobs,FALSE,FALSE,,,,,",
            "t4,Lowercase true,Jobs,true,FALSE,,,,,",
            "t5,Sent but unapproved,Jobs,FALSE,TRUE,,,,,",
        ]);

        let rows = read_bulletins(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Wine tasting");
        assert_eq!(rows[0].email_contact, "a@b.com");
        assert!(rows.iter().all(|r| !r.sent));
    }

    #[test]
    fn test_missing_links_become_empty_and_extras_are_kept() {
        let data = csv_with(&["t1,Formal,College,TRUE,,,,,"]);

        let rows = read_bulletins(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.apply_link, "");
        assert_eq!(row.facebook_link, "");
        assert_eq!(
            row.extra,
            vec![
                ("Timestamp".to_string(), "t1".to_string()),
                ("Description".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_missing_column_fails() {
        let data = "Title,Section,Approved,Sent\nA,College,TRUE,FALSE";
        let err = read_bulletins(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ReadError::MissingColumn("\"Email contact\" address")));
    }

    #[test]
    fn test_colliding_headers_fail() {
        let data = format!("{},Further information link\n", HEADER);
        let err = read_bulletins(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ReadError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_blank_header_fails() {
        let data = format!("{},\n", HEADER);
        let err = read_bulletins(data.as_bytes()).unwrap_err();
        assert!(matches!(err, ReadError::BlankHeader(11)));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = read_bulletins_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ReadError::Open { .. }));
    }

    #[test]
    fn test_canonical_field_name() {
        assert_eq!(canonical_field_name("\"Email contact\" address"), "Email_contact_address");
        assert_eq!(canonical_field_name(" Event date "), "Event_date");
    }

    #[test]
    fn test_column_table_matches_normalization() {
        for (source, canonical, _) in COLUMNS {
            assert_eq!(canonical_field_name(source), canonical);
        }
    }
}
