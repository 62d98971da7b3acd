use chrono::NaiveDate;
use serde::Serialize;

/// The three fixed newsletter sections, in numbering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    College,
    Cambridge,
    Jobs,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::College, Section::Cambridge, Section::Jobs];

    pub fn name(self) -> &'static str {
        match self {
            Section::College => "College",
            Section::Cambridge => "Cambridge",
            Section::Jobs => "Jobs",
        }
    }
}

/// One approved, unsent spreadsheet record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulletinRow {
    pub title: String,
    pub section: String,
    pub approved: bool,
    pub sent: bool,
    pub email_contact: String,
    pub apply_link: String,
    pub further_info_link: String,
    pub facebook_link: String,
    /// Columns outside the fixed table, keyed by canonical field name, in file order.
    pub extra: Vec<(String, String)>,
}

/// A labelled external link, rendered as a Word hyperlink run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hyperlink {
    pub label: String,
    pub target: String,
}

impl Hyperlink {
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}

/// A bulletin entry ready for the template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub row: BulletinRow,
    pub email_link: Hyperlink,
    pub apply_now_link: Hyperlink,
    pub further_information_link: Hyperlink,
    pub facebook_link: Hyperlink,
}

impl TemplateEntry {
    pub fn section(&self) -> &str {
        &self.row.section
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventView {
    pub name: String,
    pub location: String,
    pub when: String,
}

/// Events sharing a calendar day, labelled like `Monday 3rd June`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    #[serde(skip)]
    pub date: NaiveDate,
    pub day: String,
    pub events: Vec<EventView>,
}

/// A synthetic entry summarising a week of one calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSection {
    pub title: String,
    pub days: Vec<DayGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// Holds a number already used by a previous issue.
    Placeholder,
    Calendar(CalendarSection),
    Bulletin(TemplateEntry),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsletterEntry {
    pub number: u32,
    pub kind: EntryKind,
}

impl NewsletterEntry {
    pub fn new(kind: EntryKind) -> Self {
        Self { number: 0, kind }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsletterDocument {
    pub college: Vec<NewsletterEntry>,
    pub cambridge: Vec<NewsletterEntry>,
    pub jobs: Vec<NewsletterEntry>,
}

impl NewsletterDocument {
    /// All entries in numbering order.
    pub fn entries(&self) -> impl Iterator<Item = &NewsletterEntry> {
        self.college
            .iter()
            .chain(self.cambridge.iter())
            .chain(self.jobs.iter())
    }
}
