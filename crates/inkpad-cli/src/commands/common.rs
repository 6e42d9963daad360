use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{NaiveDate, Utc};
use inkpad_core::content::plain_text;
use inkpad_core::gateway::{RemoteGateway, SupabaseGateway};
use inkpad_core::models::{Group, GroupId, Note, NoteId, TodoItem};
use inkpad_core::views::{note_badge, DropTarget, UNGROUPED_ZONE};
use inkpad_core::{NoteStore, StoreOptions, SyncHandle};
use serde::Serialize;

use crate::auth::session_manager;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub note_type: String,
    pub group: Option<String>,
    pub preview: String,
    pub badge: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

/// A signed-in store bound to one CLI profile.
pub struct Workspace {
    pub profile_name: String,
    pub store: NoteStore<SupabaseGateway>,
    pub sync: Option<SyncHandle>,
}

impl Workspace {
    /// Restore the profile's session and load its notes and groups.
    pub async fn open(
        global_profile: Option<&str>,
        options: StoreOptions,
    ) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(global_profile);
        let backend = config.backend_config(&profile_name)?;

        let sessions = session_manager(&profile_name, &backend)?;
        sessions.restore().await?;
        let session = sessions.ensure_fresh().await?;
        if !session.is_signed_in() {
            return Err(CliError::NotSignedIn(profile_name));
        }

        let gateway = SupabaseGateway::new(backend)?;
        let store = NoteStore::with_options(gateway, session, options);
        let sync = match store.initialize().await {
            Ok(sync) => sync,
            Err(error) => {
                let error = CliError::from(error);
                return Err(if error.is_unauthorized() {
                    CliError::SessionExpired(profile_name)
                } else {
                    error
                });
            }
        };
        tracing::debug!("Opened workspace for profile '{}'", profile_name);

        Ok(Self {
            profile_name,
            store,
            sync,
        })
    }

    /// One-shot commands load once and open no change feeds.
    pub async fn open_once(global_profile: Option<&str>) -> Result<Self, CliError> {
        Self::open(
            global_profile,
            StoreOptions {
                live: false,
                ..StoreOptions::default()
            },
        )
        .await
    }

    /// Wait for background writes and report a session the backend rejected.
    pub async fn finish(self) -> Result<(), CliError> {
        self.store.flush().await;
        if let Some(sync) = self.sync {
            sync.shutdown().await;
        }
        if self.store.session().await.is_signed_in() {
            Ok(())
        } else {
            Err(CliError::SessionExpired(self.profile_name))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

fn ambiguous(kind: &str, query: &str, ids: &[String]) -> CliError {
    let options = ids
        .iter()
        .take(3)
        .map(String::as_str)
        .map(short_id)
        .collect::<Vec<_>>()
        .join(", ");
    CliError::AmbiguousId(format!(
        "{kind} prefix '{query}' is ambiguous; matches: {options}"
    ))
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_ascii_lowercase())
    }
}

/// Resolve a full note id or unique id prefix.
pub fn resolve_note_id(notes: &[Note], query: &str) -> Result<NoteId, CliError> {
    let query = normalize_identifier(query)?;
    if let Ok(id) = query.parse::<NoteId>() {
        if notes.iter().any(|note| note.id == id) {
            return Ok(id);
        }
    }

    let matching = notes
        .iter()
        .filter(|note| note.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();
    match matching.as_slice() {
        [] => Err(CliError::NoteNotFound(query)),
        [note] => Ok(note.id),
        _ => Err(ambiguous(
            "Note ID",
            &query,
            &matching
                .iter()
                .map(|note| note.id.as_str())
                .collect::<Vec<_>>(),
        )),
    }
}

pub async fn resolve_note<G: RemoteGateway>(
    store: &NoteStore<G>,
    query: &str,
) -> Result<Note, CliError> {
    let notes = store.notes().await;
    let id = resolve_note_id(&notes, query)?;
    notes
        .into_iter()
        .find(|note| note.id == id)
        .ok_or_else(|| CliError::NoteNotFound(query.to_string()))
}

/// Resolve a group by id, unique id prefix or case-insensitive name.
pub fn resolve_group_id(groups: &[Group], query: &str) -> Result<GroupId, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CliError::GroupNotFound(query.to_string()));
    }

    let by_name = groups
        .iter()
        .filter(|group| group.name.eq_ignore_ascii_case(trimmed))
        .collect::<Vec<_>>();
    if let [group] = by_name.as_slice() {
        return Ok(group.id);
    }

    let lowered = trimmed.to_ascii_lowercase();
    let by_id = groups
        .iter()
        .filter(|group| group.id.as_str().starts_with(&lowered))
        .collect::<Vec<_>>();
    match (by_id.as_slice(), by_name.len()) {
        ([group], _) => Ok(group.id),
        ([], 0) => Err(CliError::GroupNotFound(trimmed.to_string())),
        ([], _) => Err(ambiguous(
            "Group name",
            trimmed,
            &by_name
                .iter()
                .map(|group| group.id.as_str())
                .collect::<Vec<_>>(),
        )),
        (many, _) => Err(ambiguous(
            "Group ID",
            trimmed,
            &many.iter().map(|group| group.id.as_str()).collect::<Vec<_>>(),
        )),
    }
}

/// Resolve a move target: a group or the ungrouped section.
pub fn resolve_drop_target(groups: &[Group], query: &str) -> Result<DropTarget, CliError> {
    if query.trim().eq_ignore_ascii_case(UNGROUPED_ZONE) {
        return Ok(DropTarget::Ungrouped);
    }
    resolve_group_id(groups, query).map(DropTarget::Group)
}

/// Resolve a task by 1-based position or unique id prefix.
pub fn resolve_task(note: &Note, query: &str) -> Result<TodoItem, CliError> {
    let trimmed = query.trim();
    if let Ok(position) = trimmed.parse::<usize>() {
        if let Some(todo) = position.checked_sub(1).and_then(|index| note.todos.get(index)) {
            return Ok(todo.clone());
        }
    }

    let lowered = trimmed.to_ascii_lowercase();
    let matching = note
        .todos
        .iter()
        .filter(|todo| !lowered.is_empty() && todo.id.as_str().starts_with(&lowered))
        .collect::<Vec<_>>();
    match matching.as_slice() {
        [] => Err(CliError::TaskNotFound(trimmed.to_string())),
        [todo] => Ok((*todo).clone()),
        _ => Err(ambiguous(
            "Task ID",
            trimmed,
            &matching
                .iter()
                .map(|todo| todo.id.as_str())
                .collect::<Vec<_>>(),
        )),
    }
}

/// Parse a `YYYY-MM-DD` date; an empty value means "no date".
pub fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CliError::InvalidInput(format!("'{trimmed}' is not a YYYY-MM-DD date")))
}

pub fn group_name(groups: &[Group], id: Option<GroupId>) -> Option<String> {
    let id = id?;
    groups
        .iter()
        .find(|group| group.id == id)
        .map(|group| group.name.clone())
}

pub fn format_note_line(note: &Note, now_ms: i64) -> String {
    let short_id = short_id(&note.id.as_str());
    let title = truncate(note.display_title(), 32);
    let relative_time = format_relative_time(note.updated_at, now_ms);
    let badge = note_badge(note).unwrap_or_default();

    format!(
        "{short_id:<13}  {:<8}  {title:<32}  {relative_time:<10}  {badge}",
        note.note_type.as_str()
    )
    .trim_end()
    .to_string()
}

pub fn note_to_list_item(note: &Note, groups: &[Group]) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.display_title().to_string(),
        note_type: note.note_type.to_string(),
        group: group_name(groups, note.group_id),
        preview: note_preview(note, 80),
        badge: note_badge(note),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let text = plain_text(note.note_type, &note.content);
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    truncate(first_line, max_chars)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Joined arguments, or piped stdin when no arguments were given.
pub fn resolve_content_input(parts: &[String]) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&parts.join(" ")) {
        return Ok(Some(content));
    }
    read_piped_stdin()
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
    extension: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path(extension);
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path(extension: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!(
        "inkpad-note-{}-{now}.{extension}",
        std::process::id()
    ))
}
