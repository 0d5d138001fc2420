use anyhow::Result;
use civic_core::db::{MeetingRow, list_meetings};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;

pub struct VaultPaths {
    pub root: PathBuf,
    pub index_dir: PathBuf,
    pub meetings_dir: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_dir: root.join("00_Index"),
            meetings_dir: root.join("Meetings"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.index_dir)?;
        fs::create_dir_all(&self.meetings_dir)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSummary {
    pub meetings: usize,
    pub agencies: usize,
}

pub fn build_vault(conn: &Connection, vault_root: &Path) -> Result<VaultSummary> {
    let paths = VaultPaths::new(vault_root);
    paths.ensure()?;

    let meetings = list_meetings(conn)?;
    let generated = generated_stamp();

    // 1) Meeting notes + meeting MOC
    let mut meeting_index = index_header("MOC - Meetings", &generated);
    let mut agency_counts: BTreeMap<String, usize> = BTreeMap::new();

    for m in &meetings {
        let note = note_name(&m.id);
        write_meeting_note(&paths, &note, m)?;
        meeting_index.push(format!("- [[Meetings/{note}|{}]]", index_title(m)));
        *agency_counts.entry(m.agency.clone()).or_insert(0) += 1;
    }
    if meetings.is_empty() {
        meeting_index.push("_No meetings stored._".to_string());
    }
    fs::write(
        paths.index_dir.join("MOC - Meetings.md"),
        meeting_index.join("\n"),
    )?;

    // 2) Agency MOC
    let mut agency_lines = index_header("MOC - Agencies", &generated);
    if agency_counts.is_empty() {
        agency_lines.push("_No agencies found._".to_string());
    } else {
        for (agency, count) in &agency_counts {
            agency_lines.push(format!("- {agency} ({count})"));
        }
    }
    fs::write(
        paths.index_dir.join("MOC - Agencies.md"),
        agency_lines.join("\n"),
    )?;

    let summary = VaultSummary {
        meetings: meetings.len(),
        agencies: agency_counts.len(),
    };
    info!(
        root = %paths.root.display(),
        meetings = summary.meetings,
        agencies = summary.agencies,
        "vault written"
    );
    Ok(summary)
}

fn index_header(title: &str, generated: &str) -> Vec<String> {
    vec![
        format!("# {title}"),
        String::new(),
        format!("This index is generated ({generated}). Do not edit manually."),
        String::new(),
    ]
}

fn generated_stamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| "unknown time".to_string())
}

/// Meeting ids contain `/`, which Obsidian would read as folders.
pub fn note_name(id: &str) -> String {
    id.replace('/', "__")
}

fn index_title(m: &MeetingRow) -> String {
    match &m.start {
        Some(start) => format!("{} ({start})", m.title),
        None => m.title.clone(),
    }
}

fn write_meeting_note(paths: &VaultPaths, note: &str, m: &MeetingRow) -> Result<()> {
    let note_path = paths.meetings_dir.join(format!("{note}.md"));

    let mut md = String::new();
    md.push_str("---\n");
    md.push_str(&format!("id: {}\n", m.id));
    md.push_str(&format!("agency: {}\n", m.agency));
    md.push_str(&format!("classification: {}\n", m.classification));
    if let Some(start) = &m.start {
        md.push_str(&format!("start: {start}\n"));
    }
    md.push_str(&format!("status: {}\n", m.status));
    md.push_str("source: |\n");
    md.push_str(&indent_yaml_block(&m.source));
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", m.title));

    md.push_str("## When & Where\n");
    match &m.start {
        Some(start) => md.push_str(&format!("- Start: `{start}`\n")),
        None => md.push_str("- Start: _unknown_\n"),
    }
    md.push_str(&format!("- Status: `{}`\n", m.status));
    md.push_str(&format!(
        "- Location: {}, {}\n\n",
        m.location.name, m.location.address
    ));

    md.push_str("## Links\n");
    if m.links.is_empty() {
        md.push_str("_No links published._\n");
    } else {
        for link in &m.links {
            md.push_str(&format!("- [{}]({})\n", link.title, link.href));
        }
    }
    md.push_str(&format!("\nSource: {}\n", m.source));

    fs::write(note_path, md)?;
    Ok(())
}

fn indent_yaml_block(s: &str) -> String {
    let mut out = String::new();
    for line in s.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::agency::default_location;
    use civic_core::db::{open_in_memory, upsert_meeting};
    use civic_core::schema::{Classification, Link, Meeting, MeetingStatus};
    use time::macros::datetime;

    fn meeting(id: &str, links: Vec<Link>) -> Meeting {
        Meeting {
            id: id.to_string(),
            title: "City Council Meeting".to_string(),
            description: String::new(),
            classification: Classification::CityCouncil,
            start: Some(datetime!(2026-01-12 17:30)),
            end: None,
            all_day: false,
            time_notes: String::new(),
            location: default_location(),
            links,
            source: "https://thedalles-oregon.ompnetwork.org/sessions/332148".to_string(),
            status: MeetingStatus::Tentative,
        }
    }

    #[test]
    fn writes_notes_and_indexes() {
        let conn = open_in_memory().unwrap();
        let links = vec![Link {
            href: "https://cdn.example/agenda.pdf".to_string(),
            title: "Agenda".to_string(),
        }];
        upsert_meeting(
            &conn,
            "colgo_dalles_city_council",
            &meeting("colgo_dalles_city_council/202601121730/x/city_council_meeting", links),
        )
        .unwrap();
        upsert_meeting(
            &conn,
            "colgo_dalles_urban_renewal",
            &meeting("colgo_dalles_urban_renewal/202601121730/x/city_council_meeting", vec![]),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let summary = build_vault(&conn, dir.path()).unwrap();
        assert_eq!(summary, VaultSummary { meetings: 2, agencies: 2 });

        let note = fs::read_to_string(
            dir.path()
                .join("Meetings")
                .join("colgo_dalles_city_council__202601121730__x__city_council_meeting.md"),
        )
        .unwrap();
        assert!(note.contains("status: tentative"));
        assert!(note.contains("- [Agenda](https://cdn.example/agenda.pdf)"));
        assert!(note.contains("313 Court St, The Dalles, OR 97058"));

        let agencies =
            fs::read_to_string(dir.path().join("00_Index").join("MOC - Agencies.md")).unwrap();
        assert!(agencies.contains("- colgo_dalles_city_council (1)"));
        assert!(agencies.contains("- colgo_dalles_urban_renewal (1)"));

        let index =
            fs::read_to_string(dir.path().join("00_Index").join("MOC - Meetings.md")).unwrap();
        assert!(index.contains("[[Meetings/colgo_dalles_urban_renewal__202601121730__x__city_council_meeting|"));
    }

    #[test]
    fn empty_database_still_writes_indexes() {
        let conn = open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let summary = build_vault(&conn, dir.path()).unwrap();
        assert_eq!(summary.meetings, 0);
        let index =
            fs::read_to_string(dir.path().join("00_Index").join("MOC - Meetings.md")).unwrap();
        assert!(index.contains("_No meetings stored._"));
    }
}
