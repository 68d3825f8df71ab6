//! Meetings capability: a small command grammar over the shared store.
//!
//! ```text
//! list meetings
//! create meeting <title> on <YYYY-MM-DD> [agenda <text>]
//! edit meeting <id> <title|date|agenda|notes> <value>
//! ```
//!
//! Keywords are matched case-insensitively. Titles, agendas and notes keep the
//! casing the user typed.

use crate::config::AgentSettings;
use crate::phrasing::Phraser;
use crate::ui;
use async_trait::async_trait;
use chrono::NaiveDate;
use conduit_common::{
    Capability, CapabilityName, ConduitError, NodeUpdate, RequestSession, Result,
};
use conduit_llm::LlmClient;
use conduit_memory::{Meeting, MeetingId, MeetingPatch, MeetingStore, NewMeeting};
use std::sync::Arc;
use tracing::info;

pub const HELP_TEXT: &str = "I can manage meetings. Try commands like 'list meetings', \
     'create meeting Team Sync on 2026-02-20 agenda Discuss progress', \
     'edit meeting 1 agenda New agenda' or 'edit meeting 1 notes New notes'.";

pub const NO_MEETINGS: &str = "There are no meetings scheduled.";

pub const MISSING_ID: &str = "Please specify the meeting ID to edit.";

const UNTITLED: &str = "Untitled meeting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingField {
    Title,
    Date,
    Agenda,
    Notes,
}

impl MeetingField {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "title" => Some(Self::Title),
            "date" => Some(Self::Date),
            "agenda" => Some(Self::Agenda),
            "notes" => Some(Self::Notes),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::Agenda => "agenda",
            Self::Notes => "notes",
        }
    }
}

/// A parsed meetings request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingCommand {
    List,
    Create(NewMeeting),
    Edit { id: MeetingId, patch: MeetingPatch, field: MeetingField },
    MissingId,
    Help,
}

/// One whitespace-separated word with its lower-cased, punctuation-free key.
struct Word<'a> {
    raw: &'a str,
    key: String,
}

fn words(text: &str) -> Vec<Word<'_>> {
    text.split_whitespace()
        .map(|raw| Word {
            raw,
            key: raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase(),
        })
        .collect()
}

fn join(words: &[Word<'_>]) -> String {
    words.iter().map(|w| w.raw).collect::<Vec<_>>().join(" ")
}

fn is_meeting(key: &str) -> bool {
    key == "meeting" || key == "meetings"
}

fn parse_date(word: &Word<'_>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&word.key, "%Y-%m-%d").ok()
}

pub fn parse_command(text: &str) -> MeetingCommand {
    let words = words(text);
    let Some(meeting_at) = words.iter().position(|w| is_meeting(&w.key)) else {
        return MeetingCommand::Help;
    };
    let rest = &words[meeting_at + 1..];

    // The earliest verb decides, so a title such as "list review" is not
    // mistaken for a listing.
    let verb = words
        .iter()
        .map(|w| w.key.as_str())
        .find(|k| matches!(*k, "list" | "create" | "edit"));
    match verb {
        Some("list") => MeetingCommand::List,
        Some("create") => parse_create(rest),
        Some("edit") => parse_edit(rest),
        _ => MeetingCommand::Help,
    }
}

fn parse_create(rest: &[Word<'_>]) -> MeetingCommand {
    let (head, agenda) = match rest.iter().position(|w| w.key == "agenda") {
        Some(i) => (&rest[..i], join(&rest[i + 1..])),
        None => (rest, String::new()),
    };

    // The first "on" followed by a valid date separates title from date, so
    // titles may contain "on" themselves.
    let date_at = head
        .windows(2)
        .position(|pair| pair[0].key == "on" && parse_date(&pair[1]).is_some());
    let Some(on_at) = date_at else {
        return MeetingCommand::Help;
    };
    let Some(date) = parse_date(&head[on_at + 1]) else {
        return MeetingCommand::Help;
    };

    let title = join(&head[..on_at]);
    let title = if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    };

    MeetingCommand::Create(NewMeeting::new(title, date).with_agenda(agenda))
}

fn parse_edit(rest: &[Word<'_>]) -> MeetingCommand {
    let Some(id_at) = rest.iter().position(|w| w.key.parse::<MeetingId>().is_ok()) else {
        return MeetingCommand::MissingId;
    };
    let Ok(id) = rest[id_at].key.parse::<MeetingId>() else {
        return MeetingCommand::MissingId;
    };

    let after_id = &rest[id_at + 1..];
    let Some((field_at, field)) = after_id
        .iter()
        .enumerate()
        .find_map(|(i, w)| MeetingField::parse(&w.key).map(|f| (i, f)))
    else {
        return MeetingCommand::Help;
    };
    let value_words = &after_id[field_at + 1..];
    let value = join(value_words);

    let mut patch = MeetingPatch::default();
    match field {
        MeetingField::Title if value.is_empty() => return MeetingCommand::Help,
        MeetingField::Title => patch.title = Some(value),
        MeetingField::Date => match value_words.first().and_then(parse_date) {
            Some(date) if value_words.len() == 1 => patch.date = Some(date),
            _ => return MeetingCommand::Help,
        },
        MeetingField::Agenda => patch.agenda = Some(value),
        MeetingField::Notes => patch.notes = Some(value),
    }
    MeetingCommand::Edit { id, patch, field }
}

/// `"<id>. <title> on <date> – agenda: <agenda>; notes: <notes|None>"`
pub fn format_meeting(m: &Meeting) -> String {
    let notes = if m.notes.is_empty() { "None" } else { &m.notes };
    format!(
        "{}. {} on {} – agenda: {}; notes: {}",
        m.id, m.title, m.date, m.agenda, notes
    )
}

pub struct MeetingsAgent {
    store: Arc<MeetingStore>,
    phraser: Phraser,
}

impl MeetingsAgent {
    pub fn new(store: Arc<MeetingStore>, phraser: Phraser) -> Self {
        Self { store, phraser }
    }

    pub fn from_config(
        store: Arc<MeetingStore>,
        llm: Option<Arc<dyn LlmClient>>,
        settings: &AgentSettings,
    ) -> Self {
        Self::new(store, Phraser::new(llm, settings))
    }

    fn reply(text: impl Into<String>) -> NodeUpdate {
        let text = text.into();
        let panel = ui::panel("Meetings", &text, &[]);
        NodeUpdate::text(text).with_a2ui(panel)
    }
}

#[async_trait]
impl Capability for MeetingsAgent {
    fn name(&self) -> CapabilityName {
        CapabilityName::MeetingsAgent
    }

    fn description(&self) -> &str {
        "Lists, creates and edits meetings (title, date, agenda, notes)"
    }

    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate> {
        let command = parse_command(session.request().message());

        match command {
            MeetingCommand::List => {
                let meetings = self.store.list();
                if meetings.is_empty() {
                    return Ok(Self::reply(NO_MEETINGS));
                }
                let raw = meetings
                    .iter()
                    .map(format_meeting)
                    .collect::<Vec<_>>()
                    .join("\n");
                let prompt = format!("Format these meeting entries for a user:\n\n{raw}");
                let output = self.phraser.phrase(session, prompt, raw.clone()).await?;
                Ok(NodeUpdate::text(output).with_a2ui(ui::panel("Meetings", &raw, &[])))
            }
            MeetingCommand::Create(meeting) => {
                if session.is_cancelled() {
                    return Err(ConduitError::SessionCancelled);
                }
                let (title, date) = (meeting.title.clone(), meeting.date);
                let id = self.store.create(meeting);
                info!(session_id = %session.id(), meeting_id = id, "Meeting created");
                Ok(Self::reply(format!("Created meeting {id}: {title} on {date}.")))
            }
            MeetingCommand::Edit { id, patch, field } => {
                if session.is_cancelled() {
                    return Err(ConduitError::SessionCancelled);
                }
                match self.store.edit(id, patch) {
                    Ok(_) => {
                        info!(session_id = %session.id(), meeting_id = id, field = field.as_str(), "Meeting updated");
                        Ok(Self::reply(format!(
                            "Updated {} for meeting {id}.",
                            field.as_str()
                        )))
                    }
                    Err(ConduitError::NotFound(_)) => {
                        Ok(Self::reply(format!("Meeting {id} not found.")))
                    }
                    Err(e) => Err(e),
                }
            }
            MeetingCommand::MissingId => Ok(NodeUpdate::text(MISSING_ID)),
            MeetingCommand::Help => Ok(Self::reply(HELP_TEXT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_command("List meetings"), MeetingCommand::List);
        assert_eq!(parse_command("please list all my meetings?"), MeetingCommand::List);
    }

    #[test]
    fn test_parse_create_keeps_casing() {
        let cmd = parse_command("create meeting Kickoff on 2026-02-01 agenda Plan Q1");
        assert_eq!(
            cmd,
            MeetingCommand::Create(NewMeeting::new("Kickoff", date("2026-02-01")).with_agenda("Plan Q1"))
        );
    }

    #[test]
    fn test_parse_create_title_containing_on() {
        let cmd = parse_command("Create Meeting Catch up on Roadmap on 2026-03-04");
        assert_eq!(
            cmd,
            MeetingCommand::Create(NewMeeting::new("Catch up on Roadmap", date("2026-03-04")))
        );
    }

    #[test]
    fn test_parse_create_without_title() {
        let cmd = parse_command("create meeting on 2026-02-01");
        assert_eq!(
            cmd,
            MeetingCommand::Create(NewMeeting::new("Untitled meeting", date("2026-02-01")))
        );
    }

    #[test]
    fn test_parse_create_bad_date_is_help() {
        assert_eq!(parse_command("create meeting Sync on tuesday"), MeetingCommand::Help);
        assert_eq!(parse_command("create meeting Sync on 2026-13-40"), MeetingCommand::Help);
        assert_eq!(parse_command("create meeting Sync"), MeetingCommand::Help);
    }

    #[test]
    fn test_parse_edit() {
        let cmd = parse_command("edit meeting 3 notes Ship It");
        assert_eq!(
            cmd,
            MeetingCommand::Edit {
                id: 3,
                patch: MeetingPatch {
                    notes: Some("Ship It".into()),
                    ..Default::default()
                },
                field: MeetingField::Notes,
            }
        );

        let cmd = parse_command("edit meeting 1 date 2026-05-05");
        assert!(matches!(
            cmd,
            MeetingCommand::Edit { id: 1, field: MeetingField::Date, .. }
        ));
    }

    #[test]
    fn test_parse_edit_without_id() {
        assert_eq!(parse_command("edit meeting agenda new"), MeetingCommand::MissingId);
    }

    #[test]
    fn test_parse_edit_unknown_field_is_help() {
        assert_eq!(parse_command("edit meeting 1 colour blue"), MeetingCommand::Help);
        assert_eq!(parse_command("edit meeting 1 date someday"), MeetingCommand::Help);
    }

    #[test]
    fn test_first_verb_wins() {
        assert!(matches!(
            parse_command("create meeting list review on 2026-02-01"),
            MeetingCommand::Create(_)
        ));
    }

    #[test]
    fn test_unrelated_text_is_help() {
        assert_eq!(parse_command("hello there"), MeetingCommand::Help);
        assert_eq!(parse_command("meeting"), MeetingCommand::Help);
    }

    #[test]
    fn test_format_meeting() {
        let meeting = Meeting {
            id: 1,
            title: "Kickoff".into(),
            date: date("2026-02-01"),
            agenda: "Plan".into(),
            notes: String::new(),
        };
        assert_eq!(
            format_meeting(&meeting),
            "1. Kickoff on 2026-02-01 – agenda: Plan; notes: None"
        );
    }
}
