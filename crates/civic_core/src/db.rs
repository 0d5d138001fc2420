use crate::error::BoxError;
use crate::fetch::MeetingSink;
use crate::schema::{Link, Location, Meeting, naive_datetime};
use anyhow::Result;
use rusqlite::{Connection, params};

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meetings (
          id TEXT PRIMARY KEY,
          agency TEXT NOT NULL,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          classification TEXT NOT NULL,
          start_at TEXT,
          end_at TEXT,
          all_day INTEGER NOT NULL,
          time_notes TEXT NOT NULL,
          location_json TEXT NOT NULL,
          links_json TEXT NOT NULL,
          source TEXT NOT NULL,
          status TEXT NOT NULL,
          raw_json TEXT NOT NULL,
          inserted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_meetings_start ON meetings(start_at);
        CREATE INDEX IF NOT EXISTS idx_meetings_agency ON meetings(agency);
        "#,
    )?;
    Ok(())
}

/// Re-ingesting a meeting refreshes every derived column, status included.
pub fn upsert_meeting(conn: &Connection, agency: &str, meeting: &Meeting) -> Result<()> {
    let location_json = serde_json::to_string(&meeting.location)?;
    let links_json = serde_json::to_string(&meeting.links)?;
    let raw_json = serde_json::to_string(meeting)?;

    conn.execute(
        r#"
        INSERT INTO meetings (
          id, agency, title, description, classification, start_at, end_at,
          all_day, time_notes, location_json, links_json, source, status, raw_json
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
          agency=excluded.agency,
          title=excluded.title,
          description=excluded.description,
          classification=excluded.classification,
          start_at=excluded.start_at,
          end_at=excluded.end_at,
          all_day=excluded.all_day,
          time_notes=excluded.time_notes,
          location_json=excluded.location_json,
          links_json=excluded.links_json,
          source=excluded.source,
          status=excluded.status,
          raw_json=excluded.raw_json
        "#,
        params![
            meeting.id,
            agency,
            meeting.title,
            meeting.description,
            meeting.classification.as_str(),
            meeting.start.as_ref().map(naive_datetime::format),
            meeting.end.as_ref().map(naive_datetime::format),
            meeting.all_day,
            meeting.time_notes,
            location_json,
            links_json,
            meeting.source,
            meeting.status.as_str(),
            raw_json
        ],
    )?;

    Ok(())
}

/// A stored meeting as read back for exports.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingRow {
    pub id: String,
    pub agency: String,
    pub title: String,
    pub classification: String,
    pub start: Option<String>,
    pub status: String,
    pub source: String,
    pub location: Location,
    pub links: Vec<Link>,
}

/// Newest first; meetings without a start sort last.
pub fn list_meetings(conn: &Connection) -> Result<Vec<MeetingRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, agency, title, classification, start_at, status, source, location_json, links_json
        FROM meetings
        ORDER BY start_at IS NULL, start_at DESC, id
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut meetings = Vec::new();
    for r in rows {
        let (id, agency, title, classification, start, status, source, location_json, links_json) =
            r?;
        meetings.push(MeetingRow {
            id,
            agency,
            title,
            classification,
            start,
            status,
            source,
            location: serde_json::from_str(&location_json)?,
            links: serde_json::from_str(&links_json)?,
        });
    }
    Ok(meetings)
}

/// Writes each emitted meeting straight through to SQLite.
pub struct DbSink<'c> {
    conn: &'c Connection,
}

impl<'c> DbSink<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl MeetingSink for DbSink<'_> {
    fn emit(&mut self, agency: &str, meeting: Meeting) -> std::result::Result<(), BoxError> {
        upsert_meeting(self.conn, agency, &meeting).map_err(BoxError::from)
    }
}
