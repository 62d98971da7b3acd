use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};
use minijinja::{Value, context};

use crate::docx::{DocxTemplate, hyperlink_xml};
use crate::error::RenderError;
use crate::models::{CalendarSection, EntryKind, Hyperlink, NewsletterDocument, NewsletterEntry, TemplateEntry};

fn link_value(template: &mut DocxTemplate, link: &Hyperlink) -> Value {
    let id = template.build_url_id(&link.target);
    Value::from_safe_string(hyperlink_xml(&id, &link.label))
}

fn bulletin_fields(
    template: &mut DocxTemplate,
    entry: &TemplateEntry,
    fields: &mut BTreeMap<String, Value>,
) {
    let row = &entry.row;
    for (name, value) in &row.extra {
        fields.insert(name.clone(), Value::from(value.as_str()));
    }
    fields.insert("Title".into(), Value::from(row.title.as_str()));
    fields.insert("Section".into(), Value::from(row.section.as_str()));
    fields.insert("Approved".into(), Value::from(row.approved));
    fields.insert("Sent".into(), Value::from(row.sent));
    fields.insert("Email_contact_address".into(), Value::from(row.email_contact.as_str()));
    fields.insert("Apply_now_link".into(), Value::from(row.apply_link.as_str()));
    fields.insert("Further_information_link".into(), Value::from(row.further_info_link.as_str()));
    fields.insert("Facebook_link".into(), Value::from(row.facebook_link.as_str()));

    fields.insert("Email_link_rt".into(), link_value(template, &entry.email_link));
    fields.insert("Apply_now_link_rt".into(), link_value(template, &entry.apply_now_link));
    fields.insert(
        "Further_information_link_rt".into(),
        link_value(template, &entry.further_information_link),
    );
    fields.insert("Facebook_link_rt".into(), link_value(template, &entry.facebook_link));
}

fn calendar_fields(section: &CalendarSection, fields: &mut BTreeMap<String, Value>) {
    fields.insert("Title".into(), Value::from(section.title.as_str()));
    fields.insert("events".into(), Value::from_serialize(&section.days));
}

fn entry_value(template: &mut DocxTemplate, entry: &NewsletterEntry) -> Value {
    let mut fields = BTreeMap::new();
    match &entry.kind {
        EntryKind::Placeholder => {}
        EntryKind::Calendar(section) => calendar_fields(section, &mut fields),
        EntryKind::Bulletin(bulletin) => bulletin_fields(template, bulletin, &mut fields),
    }
    fields.insert("number".into(), Value::from(entry.number));
    Value::from(fields)
}

fn entries_value(template: &mut DocxTemplate, entries: &[NewsletterEntry]) -> Value {
    let values: Vec<Value> = entries.iter().map(|e| entry_value(template, e)).collect();
    Value::from(values)
}

/// Template context with `college_entries`, `cambridge_entries` and `job_entries`.
///
/// Registers a document relationship for every hyperlink target on the way.
pub fn build_context(template: &mut DocxTemplate, doc: &NewsletterDocument) -> Value {
    context! {
        college_entries => entries_value(template, &doc.college),
        cambridge_entries => entries_value(template, &doc.cambridge),
        job_entries => entries_value(template, &doc.jobs),
    }
}

/// Render `doc` into the template at `template_path`, returning the finished package.
pub fn render_newsletter(
    template_path: &Path,
    doc: &NewsletterDocument,
) -> Result<Vec<u8>, RenderError> {
    let mut template = DocxTemplate::open(template_path)?;
    debug!("Opened template {}", template_path.display());

    let context = build_context(&mut template, doc);
    template.render(context)?;

    let bytes = template.to_bytes()?;
    info!(
        "Rendered {} entries ({} bytes)",
        doc.entries().count(),
        bytes.len()
    );
    Ok(bytes)
}
