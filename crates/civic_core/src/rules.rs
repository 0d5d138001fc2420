use crate::schema::{Meeting, MeetingStatus};
use regex::Regex;
use std::sync::LazyLock;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const CANCELLED_WORDS: [&str; 3] = ["cancel", "rescheduled", "postpone"];
const NO_START: &str = "000000000000";
const ID_START_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute]");

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9^]+").expect("static regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static CANCELLED_NOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\s:-]{1,3})?(cancel\w+|rescheduled)([\s:-]{1,3})?").expect("static regex")
});

/// Cancellation wording wins over timing; meetings without a start stay tentative.
pub fn status(meeting: &Meeting, now: PrimitiveDateTime) -> MeetingStatus {
    let text = format!("{} {}", meeting.title, meeting.description).to_lowercase();
    if CANCELLED_WORDS.iter().any(|word| text.contains(word)) {
        return MeetingStatus::Cancelled;
    }
    match meeting.start {
        Some(start) if start < now => MeetingStatus::Passed,
        _ => MeetingStatus::Tentative,
    }
}

/// `{spider}/{YYYYMMDDHHMM}/x/{title_slug}`, with cancellation wording dropped
/// from the title so a meeting keeps its id once it is cancelled.
pub fn meeting_id(spider_name: &str, meeting: &Meeting) -> String {
    let start = meeting
        .start
        .and_then(|start| start.format(ID_START_FORMAT).ok())
        .unwrap_or_else(|| NO_START.to_string());
    format!("{spider_name}/{start}/x/{}", title_slug(&id_title(&meeting.title)))
}

fn id_title(title: &str) -> String {
    CANCELLED_NOTE.replace_all(title, "").trim().to_string()
}

pub fn title_slug(title: &str) -> String {
    let spaced = NON_WORD.replace_all(title, " ");
    let underscored = WHITESPACE.replace_all(&spaced, "_");
    underscored.to_lowercase().trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agency::default_location;
    use crate::schema::Classification;
    use time::macros::datetime;

    fn meeting(title: &str, start: Option<PrimitiveDateTime>) -> Meeting {
        Meeting {
            id: String::new(),
            title: title.to_string(),
            description: String::new(),
            classification: Classification::CityCouncil,
            start,
            end: None,
            all_day: false,
            time_notes: String::new(),
            location: default_location(),
            links: Vec::new(),
            source: String::new(),
            status: MeetingStatus::Tentative,
        }
    }

    #[test]
    fn slug_collapses_punctuation_and_whitespace() {
        assert_eq!(
            title_slug("City Council Meeting January 12, 2026 - Live Stream"),
            "city_council_meeting_january_12_2026_live_stream"
        );
        assert_eq!(title_slug("  (Special) Session!  "), "special_session");
        assert_eq!(title_slug("Budget^Committee"), "budget^committee");
    }

    #[test]
    fn id_includes_spider_and_start() {
        let m = meeting(
            "City Council Meeting January 12, 2026 - Live Stream",
            Some(datetime!(2026-01-12 17:30)),
        );
        assert_eq!(
            meeting_id("colgo_dalles_city_council", &m),
            "colgo_dalles_city_council/202601121730/x/city_council_meeting_january_12_2026_live_stream"
        );
    }

    #[test]
    fn id_without_start_uses_placeholder() {
        let m = meeting("Work Session", None);
        assert_eq!(
            meeting_id("colgo_dalles_city_council", &m),
            "colgo_dalles_city_council/000000000000/x/work_session"
        );
    }

    #[test]
    fn id_survives_cancellation() {
        let start = Some(datetime!(2026-01-12 17:30));
        let scheduled = meeting_id("colgo_dalles_city_council", &meeting("City Council Meeting", start));
        assert_eq!(
            scheduled,
            "colgo_dalles_city_council/202601121730/x/city_council_meeting"
        );
        for title in [
            "City Council Meeting - CANCELLED",
            "CANCELED: City Council Meeting",
            "City Council Meeting (Rescheduled)",
        ] {
            assert_eq!(
                meeting_id("colgo_dalles_city_council", &meeting(title, start)),
                scheduled,
                "{title}"
            );
        }
    }

    #[test]
    fn status_by_time() {
        let now = datetime!(2025-12-16 0:00);
        assert_eq!(
            status(&meeting("Council", Some(datetime!(2026-01-12 17:30))), now),
            MeetingStatus::Tentative
        );
        assert_eq!(
            status(&meeting("Council", Some(datetime!(2025-08-25 17:30))), now),
            MeetingStatus::Passed
        );
        assert_eq!(status(&meeting("Council", None), now), MeetingStatus::Tentative);
    }

    #[test]
    fn status_cancelled_wording_wins() {
        let now = datetime!(2025-12-16 0:00);
        assert_eq!(
            status(&meeting("CANCELLED - Council", Some(datetime!(2025-08-25 17:30))), now),
            MeetingStatus::Cancelled
        );
        assert_eq!(
            status(&meeting("Council (Postponed)", Some(datetime!(2026-01-12 17:30))), now),
            MeetingStatus::Cancelled
        );
        let mut m = meeting("Council", Some(datetime!(2026-01-12 17:30)));
        m.description = "Rescheduled to Friday".to_string();
        assert_eq!(status(&m, now), MeetingStatus::Cancelled);
    }
}
