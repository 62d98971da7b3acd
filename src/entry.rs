use crate::models::{BulletinRow, Hyperlink, TemplateEntry};
use crate::utils::title_case;

/// Turn an approved bulletin row into a template entry. Blank links keep an empty target.
pub fn bulletin_to_template_entry(mut row: BulletinRow) -> TemplateEntry {
    row.title = title_case(&row.title);

    let email_link = Hyperlink::new(
        row.email_contact.clone(),
        format!("mailto:{}", row.email_contact),
    );
    let apply_now_link = Hyperlink::new("Apply now", row.apply_link.clone());
    let further_information_link =
        Hyperlink::new("Further information", row.further_info_link.clone());
    let facebook_link = Hyperlink::new("Facebook", row.facebook_link.clone());

    TemplateEntry {
        row,
        email_link,
        apply_now_link,
        further_information_link,
        facebook_link,
    }
}

pub fn bulletins_to_template_entries(rows: Vec<BulletinRow>) -> Vec<TemplateEntry> {
    rows.into_iter().map(bulletin_to_template_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str) -> BulletinRow {
        BulletinRow {
            title: title.to_string(),
            section: "College".to_string(),
            approved: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_links_and_title() {
        let entry = bulletin_to_template_entry(BulletinRow {
            email_contact: "social@mcr.example".to_string(),
            apply_link: "https://forms.example/apply".to_string(),
            further_info_link: "https://mcr.example/info".to_string(),
            facebook_link: "https://facebook.com/events/1".to_string(),
            ..row("boat club taster session")
        });

        assert_eq!(entry.row.title, "Boat Club Taster Session");
        assert_eq!(
            entry.email_link,
            Hyperlink::new("social@mcr.example", "mailto:social@mcr.example")
        );
        assert_eq!(entry.apply_now_link.label, "Apply now");
        assert_eq!(entry.apply_now_link.target, "https://forms.example/apply");
        assert_eq!(entry.further_information_link.label, "Further information");
        assert_eq!(entry.further_information_link.target, "https://mcr.example/info");
        assert_eq!(entry.facebook_link.label, "Facebook");
        assert_eq!(entry.facebook_link.target, "https://facebook.com/events/1");
    }

    #[test]
    fn test_blank_links_give_empty_targets() {
        let entry = bulletin_to_template_entry(row("quiet week"));
        assert_eq!(entry.email_link, Hyperlink::new("", "mailto:"));
        assert_eq!(entry.apply_now_link.target, "");
        assert_eq!(entry.further_information_link.target, "");
        assert_eq!(entry.facebook_link.target, "");
    }

    #[test]
    fn test_one_entry_per_row() {
        let rows: Vec<BulletinRow> = (0..5).map(|i| row(&format!("event {i}"))).collect();
        let entries = bulletins_to_template_entries(rows);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[4].row.title, "Event 4");
    }
}
