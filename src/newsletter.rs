use log::{debug, warn};

use crate::models::{
    CalendarSection, EntryKind, NewsletterDocument, NewsletterEntry, Section, TemplateEntry,
};

/// Entries whose trimmed Section equals `section` exactly, in their original order.
pub fn filter_entries(entries: &[TemplateEntry], section: Section) -> Vec<TemplateEntry> {
    entries
        .iter()
        .filter(|e| e.section().trim() == section.name())
        .cloned()
        .collect()
}

/// Bulletin entries split into the three sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
    pub college: Vec<TemplateEntry>,
    pub cambridge: Vec<TemplateEntry>,
    pub jobs: Vec<TemplateEntry>,
}

impl Sections {
    pub fn partition(entries: &[TemplateEntry]) -> Self {
        for dropped in entries
            .iter()
            .filter(|e| !Section::ALL.iter().any(|s| e.section().trim() == s.name()))
        {
            warn!(
                "Dropping bulletin {:?}: unknown section {:?}",
                dropped.row.title,
                dropped.section()
            );
        }

        Self {
            college: filter_entries(entries, Section::College),
            cambridge: filter_entries(entries, Section::Cambridge),
            jobs: filter_entries(entries, Section::Jobs),
        }
    }
}

/// Build the final three lists and number every entry.
///
/// College gets `start_num - 1` placeholders, then the events and sports sections
/// when present, then its bulletins. Numbering runs 1.. across college, cambridge, jobs.
pub fn assemble(
    sections: Sections,
    start_num: u32,
    events: Option<CalendarSection>,
    sports: Option<CalendarSection>,
) -> NewsletterDocument {
    let placeholders = start_num.saturating_sub(1) as usize;

    let mut college: Vec<NewsletterEntry> =
        Vec::with_capacity(placeholders + sections.college.len() + 2);
    college.extend((0..placeholders).map(|_| NewsletterEntry::new(EntryKind::Placeholder)));
    college.extend(
        [events, sports]
            .into_iter()
            .flatten()
            .map(|section| NewsletterEntry::new(EntryKind::Calendar(section))),
    );
    college.extend(bulletin_entries(sections.college));

    let mut doc = NewsletterDocument {
        college,
        cambridge: bulletin_entries(sections.cambridge).collect(),
        jobs: bulletin_entries(sections.jobs).collect(),
    };

    let mut number = 0;
    for entry in doc
        .college
        .iter_mut()
        .chain(doc.cambridge.iter_mut())
        .chain(doc.jobs.iter_mut())
    {
        number += 1;
        entry.number = number;
    }
    debug!(
        "Numbered {} entries ({} college, {} cambridge, {} jobs)",
        number,
        doc.college.len(),
        doc.cambridge.len(),
        doc.jobs.len()
    );

    doc
}

fn bulletin_entries(entries: Vec<TemplateEntry>) -> impl Iterator<Item = NewsletterEntry> {
    entries
        .into_iter()
        .map(|e| NewsletterEntry::new(EntryKind::Bulletin(e)))
}
