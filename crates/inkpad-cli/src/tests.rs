use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use clap_complete::Shell;
use inkpad_core::auth::{AuthSession, AuthUser, SessionState};
use inkpad_core::gateway::{GatewayOp, MemoryGateway};
use inkpad_core::models::{Group, Note, NotePatch, NoteType, Priority, TodoItem, View};
use inkpad_core::util::unix_timestamp_now;
use inkpad_core::views::{Dashboard, DropTarget};
use inkpad_core::{NoteStore, StoreOptions, StoreState};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, ExportFormat, GroupCommands, NoteKind, TaskCommands};
use crate::commands::common::{
    default_editor, format_relative_time, normalize_content, note_preview, parse_due_date,
    resolve_drop_target, resolve_group_id, resolve_note_id, resolve_task,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{mask_secret, merge_profile, ProfileInput};
use crate::commands::dashboard::format_dashboard_lines;
use crate::commands::export::run_export;
use crate::commands::notes::{initial_patch, run_new, run_upload};
use crate::commands::run_store_command;
use crate::commands::tasks::build_task;
use crate::commands::watch::describe_changes;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const USER: &str = "cli-user";

fn session() -> AuthSession {
    AuthSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: unix_timestamp_now() + 3600,
        user: AuthUser {
            id: USER.to_string(),
            email: Some("cli@example.com".to_string()),
        },
    }
}

async fn loaded_store() -> (NoteStore<MemoryGateway>, MemoryGateway) {
    let gateway = MemoryGateway::new();
    let store = NoteStore::with_options(
        gateway.clone(),
        SessionState::SignedIn(session()),
        StoreOptions {
            live: false,
            ..StoreOptions::default()
        },
    );
    store.initialize().await.unwrap();
    (store, gateway)
}

fn unique_temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    std::env::temp_dir().join(format!("inkpad-cli-{}-{nanos}-{name}", std::process::id()))
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("inkpad").chain(args.iter().copied())).unwrap()
}

#[test]
fn parses_new_todo_note_with_global_profile() {
    let cli = parse(&["new", "--type", "todo", "--group", "Work", "buy milk", "--profile", "home"]);
    assert_eq!(cli.profile.as_deref(), Some("home"));
    match cli.command {
        Commands::New {
            kind,
            group,
            content,
            title,
        } => {
            assert_eq!(kind, NoteKind::Todo);
            assert_eq!(group.as_deref(), Some("Work"));
            assert_eq!(content, vec!["buy milk".to_string()]);
            assert_eq!(title, None);
        }
        _ => panic!("expected new command"),
    }
}

#[test]
fn parses_richtext_alias_and_task_set() {
    let cli = parse(&["add", "-t", "html"]);
    assert!(matches!(
        cli.command,
        Commands::New {
            kind: NoteKind::Richtext,
            ..
        }
    ));

    let cli = parse(&["tasks", "set", "abc", "2", "--due", "", "--done", "true"]);
    match cli.command {
        Commands::Tasks {
            command: TaskCommands::Set { due, done, .. },
        } => {
            assert_eq!(due.as_deref(), Some(""));
            assert_eq!(done, Some(true));
        }
        _ => panic!("expected tasks set"),
    }
}

#[test]
fn parses_watch_and_completions() {
    assert!(matches!(
        parse(&["watch", "--refetch"]).command,
        Commands::Watch { refetch: true }
    ));
    assert!(matches!(
        parse(&["completions", "zsh"]).command,
        Commands::Completions {
            shell: Shell::Zsh,
            ..
        }
    ));
    assert!(Cli::try_parse_from(["inkpad", "new", "--type", "spreadsheet"]).is_err());
}

#[test]
fn group_add_defaults_color() {
    match parse(&["group", "add", "Work"]).command {
        Commands::Group {
            command: GroupCommands::Add { name, color },
        } => {
            assert_eq!(name, "Work");
            assert_eq!(color, "#3b82f6");
        }
        _ => panic!("expected group add"),
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn note_preview_strips_markup_and_truncates() {
    let mut note = Note::new(NoteType::RichText, None);
    note.content = "<p>This is a very long sentence that should be shortened</p>".to_string();
    assert_eq!(note_preview(&note, 20), "This is a very lo...");
}

#[test]
fn resolve_note_id_supports_exact_and_prefix() {
    let notes = vec![
        Note::new(NoteType::Markdown, None),
        Note::new(NoteType::Todo, None),
    ];
    let full = notes[1].id.to_string();
    assert_eq!(resolve_note_id(&notes, &full).unwrap(), notes[1].id);
    assert_eq!(
        resolve_note_id(&notes, &full.to_uppercase()).unwrap(),
        notes[1].id
    );

    let unique_prefix = &full[..full.len() - 2];
    assert_eq!(resolve_note_id(&notes, unique_prefix).unwrap(), notes[1].id);
}

#[test]
fn resolve_note_id_rejects_ambiguous_missing_and_empty() {
    let notes = vec![
        Note::new(NoteType::Markdown, None),
        Note::new(NoteType::Markdown, None),
    ];
    assert!(matches!(
        resolve_note_id(&notes, "  "),
        Err(CliError::EmptyNoteId)
    ));
    assert!(matches!(
        resolve_note_id(&notes, "zzzz"),
        Err(CliError::NoteNotFound(_))
    ));

    // v7 ids created back to back share their timestamp prefix.
    let shared = notes[0].id.to_string()[..4].to_string();
    assert!(matches!(
        resolve_note_id(&notes, &shared),
        Err(CliError::AmbiguousId(_))
    ));
}

#[test]
fn resolve_group_by_name_or_prefix() {
    let groups = vec![Group::new("Work", "#ff0000"), Group::new("Home", "#00ff00")];
    assert_eq!(resolve_group_id(&groups, "work").unwrap(), groups[0].id);
    let id = groups[1].id.to_string();
    assert_eq!(resolve_group_id(&groups, &id).unwrap(), groups[1].id);
    assert!(matches!(
        resolve_group_id(&groups, "Errands"),
        Err(CliError::GroupNotFound(_))
    ));

    assert_eq!(
        resolve_drop_target(&groups, "Ungrouped").unwrap(),
        DropTarget::Ungrouped
    );
    assert_eq!(
        resolve_drop_target(&groups, "Home").unwrap(),
        DropTarget::Group(groups[1].id)
    );
}

#[test]
fn resolve_task_by_position_or_prefix() {
    let mut note = Note::new(NoteType::Todo, None);
    note.todos = vec![TodoItem::new("first"), TodoItem::new("second")];

    assert_eq!(resolve_task(&note, "2").unwrap().text, "second");
    let id = note.todos[0].id.to_string();
    assert_eq!(resolve_task(&note, &id).unwrap().text, "first");
    assert!(matches!(
        resolve_task(&note, "3"),
        Err(CliError::TaskNotFound(_))
    ));
}

#[test]
fn parse_due_date_accepts_iso_and_empty() {
    assert_eq!(parse_due_date("").unwrap(), None);
    assert_eq!(
        parse_due_date("2026-03-01").unwrap().map(|date| date.to_string()),
        Some("2026-03-01".to_string())
    );
    assert!(matches!(
        parse_due_date("03/01/2026"),
        Err(CliError::InvalidInput(_))
    ));
}

#[test]
fn initial_patch_splits_todo_lines() {
    let patch = initial_patch(NoteType::Todo, None, Some("milk\n\n eggs ".to_string())).unwrap();
    let texts = patch
        .todos
        .unwrap()
        .into_iter()
        .map(|todo| todo.text)
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["milk".to_string(), "eggs".to_string()]);
    assert_eq!(patch.content, None);

    let patch = initial_patch(
        NoteType::Markdown,
        Some(" Plan ".to_string()),
        Some("# Plan".to_string()),
    )
    .unwrap();
    assert_eq!(patch.title.as_deref(), Some("Plan"));
    assert_eq!(patch.content.as_deref(), Some("# Plan"));

    assert!(initial_patch(NoteType::Markdown, Some("  ".to_string()), None).is_none());
}

#[test]
fn build_task_defaults_to_placeholder() {
    let todo = build_task(&[], None, None).unwrap();
    assert_eq!(todo.text, "New task");
    assert!(todo.due_date.is_some());

    let todo = build_task(
        &["call".to_string(), "mom".to_string()],
        Some(""),
        Some(Priority::High),
    )
    .unwrap();
    assert_eq!(todo.text, "call mom");
    assert_eq!(todo.due_date, None);
    assert_eq!(todo.priority, Priority::High);
}

#[tokio::test]
async fn new_note_lands_in_group_and_backend() {
    let (store, gateway) = loaded_store().await;
    let group = store.add_group("Work", "#123456").await;

    run_new(
        &store,
        NoteType::Markdown,
        Some("Standup".to_string()),
        Some("work"),
        Some("notes".to_string()),
    )
    .await
    .unwrap();
    store.flush().await;

    let remote = gateway.notes_for(USER);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].title, "Standup");
    assert_eq!(remote[0].content, "notes");
    assert_eq!(remote[0].group_id, Some(group.id));
    assert_eq!(store.active_note().await.map(|note| note.id), Some(remote[0].id));
    assert_eq!(store.view().await, View::Notes);
}

#[tokio::test]
async fn task_commands_update_embedded_todos() {
    let (store, gateway) = loaded_store().await;
    let note = store.add_note(NoteType::Todo, None).await;
    let id = note.id.to_string();

    for text in ["milk", "eggs"] {
        run_store_command(
            &store,
            Commands::Tasks {
                command: TaskCommands::Add {
                    note: id.clone(),
                    text: vec![text.to_string()],
                    due: None,
                    priority: None,
                },
            },
        )
        .await
        .unwrap();
    }
    run_store_command(
        &store,
        Commands::Tasks {
            command: TaskCommands::Toggle {
                note: id.clone(),
                task: "1".to_string(),
            },
        },
    )
    .await
    .unwrap();
    run_store_command(
        &store,
        Commands::Tasks {
            command: TaskCommands::Remove {
                note: id.clone(),
                task: "2".to_string(),
            },
        },
    )
    .await
    .unwrap();
    store.flush().await;

    let remote = gateway.notes_for(USER);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].todos.len(), 1);
    assert_eq!(remote[0].todos[0].text, "milk");
    assert!(remote[0].todos[0].done);
}

#[tokio::test]
async fn group_delete_detaches_notes() {
    let (store, gateway) = loaded_store().await;
    let group = store.add_group("Errands", "#00ff00").await;
    let note = store.add_note(NoteType::Markdown, Some(group.id)).await;
    store.flush().await;

    run_store_command(
        &store,
        Commands::Group {
            command: GroupCommands::Delete {
                group: "errands".to_string(),
            },
        },
    )
    .await
    .unwrap();

    assert!(store.groups().await.is_empty());
    assert_eq!(store.note(note.id).await.unwrap().group_id, None);
    assert!(gateway.groups_for(USER).is_empty());
    assert_eq!(gateway.notes_for(USER)[0].group_id, None);
}

#[tokio::test]
async fn failed_group_delete_reports_error_and_keeps_group() {
    let (store, gateway) = loaded_store().await;
    store.add_group("Keep", "#00ff00").await;
    store.flush().await;
    gateway.fail(GatewayOp::DeleteGroup);

    let result = run_store_command(
        &store,
        Commands::Group {
            command: GroupCommands::Delete {
                group: "Keep".to_string(),
            },
        },
    )
    .await;

    assert!(matches!(result, Err(CliError::Gateway(_))));
    assert_eq!(store.groups().await.len(), 1);
}

#[tokio::test]
async fn move_to_ungrouped_clears_group() {
    let (store, _gateway) = loaded_store().await;
    let group = store.add_group("Work", "#123456").await;
    let note = store.add_note(NoteType::Markdown, Some(group.id)).await;

    run_store_command(
        &store,
        Commands::Move {
            id: note.id.to_string(),
            target: "ungrouped".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(store.note(note.id).await.unwrap().group_id, None);
}

#[tokio::test]
async fn delete_and_move_reach_the_backend() {
    let (store, gateway) = loaded_store().await;
    let group = store.add_group("Inbox", "#123456").await;
    let kept = store.add_note(NoteType::Markdown, None).await;
    let dropped = store.add_note(NoteType::Markdown, None).await;
    store.flush().await;

    for command in [
        Commands::Move {
            id: kept.id.to_string(),
            target: "inbox".to_string(),
        },
        Commands::Delete {
            id: dropped.id.to_string(),
        },
    ] {
        run_store_command(&store, command).await.unwrap();
    }
    store.flush().await;

    let remote = gateway.notes_for(USER);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].id, kept.id);
    assert_eq!(remote[0].group_id, Some(group.id));
    assert_eq!(store.active_note().await, None);
}

#[tokio::test]
async fn unauthorized_backend_is_reported_as_expired() {
    let (store, gateway) = loaded_store().await;
    store.add_group("Gone", "#000000").await;
    store.flush().await;
    gateway.revoke_sessions(true);

    let result = run_store_command(
        &store,
        Commands::Group {
            command: GroupCommands::Delete {
                group: "Gone".to_string(),
            },
        },
    )
    .await;

    assert!(result.is_err_and(|error| error.is_unauthorized()));
    assert!(!store.session().await.is_signed_in());
}

#[tokio::test]
async fn upload_appends_image_to_markdown_note() {
    let (store, gateway) = loaded_store().await;
    let note = store.add_note(NoteType::Markdown, None).await;
    store
        .update_note(note.id, NotePatch::content("Trip"))
        .await;

    let path = unique_temp_path("photo.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
    run_upload(&store, &note.id.to_string(), &path).await.unwrap();
    let _ = std::fs::remove_file(&path);

    let content = store.note(note.id).await.unwrap().content;
    assert!(content.starts_with("Trip\n!["));
    assert!(content.contains("photo.png](memory://notes-images/cli-user/"));
    assert!(content.ends_with(".png)\n"));
    assert_eq!(gateway.object_keys().len(), 1);
}

#[tokio::test]
async fn upload_rejects_unsupported_and_failed_files() {
    let (store, gateway) = loaded_store().await;
    let note = store.add_note(NoteType::RichText, None).await;
    let id = note.id.to_string();

    let text_path = unique_temp_path("notes.txt");
    std::fs::write(&text_path, "plain").unwrap();
    let result = run_upload(&store, &id, &text_path).await;
    let _ = std::fs::remove_file(&text_path);
    assert!(matches!(result, Err(CliError::UnsupportedImage(_))));

    gateway.fail(GatewayOp::Upload);
    let image_path = unique_temp_path("cat.gif");
    std::fs::write(&image_path, b"GIF89a").unwrap();
    let result = run_upload(&store, &id, &image_path).await;
    let _ = std::fs::remove_file(&image_path);
    assert!(matches!(result, Err(CliError::UploadFailed)));
    assert_eq!(store.note(note.id).await.unwrap().content, "");
}

#[tokio::test]
async fn run_export_writes_json_file() {
    let (store, _gateway) = loaded_store().await;
    let group = store.add_group("Work", "#123456").await;
    let note = store.add_note(NoteType::Markdown, Some(group.id)).await;

    let path = unique_temp_path("export.json");
    run_export(&store, ExportFormat::Json, Some(&path))
        .await
        .unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let exported: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(exported[0]["id"], note.id.to_string());
    assert_eq!(exported[0]["group"], "Work");
}

#[test]
fn dashboard_lines_list_pending_then_completed() {
    let mut note = Note::new(NoteType::Todo, None);
    note.title = "Groceries".to_string();
    let mut done = TodoItem::new("bread");
    done.done = true;
    note.todos = vec![TodoItem::new("milk"), done];

    let lines = format_dashboard_lines(&Dashboard::build(&[note]));
    assert_eq!(lines[0], "1 pending, 1 completed");
    assert!(lines[2].ends_with("Groceries"));
    assert_eq!(lines[3], "  [ ] milk [medium]");
    assert_eq!(lines[4], "  [x] bread");
}

#[test]
fn describe_changes_reports_notes_groups_and_expiry() {
    let kept = Note::new(NoteType::Markdown, None);
    let removed = Note::new(NoteType::Markdown, None);
    let before = StoreState {
        notes: vec![kept.clone(), removed],
        session: SessionState::SignedIn(session()),
        ..StoreState::default()
    };

    let mut edited = kept;
    edited.apply(&NotePatch::title("Edited"));
    let added = Group::new("New", "#abcdef");
    let after = StoreState {
        notes: vec![edited],
        groups: vec![added.clone()],
        ..StoreState::default()
    };

    let lines = describe_changes(&before, &after);
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("~ note") && lines[0].contains("Edited"));
    assert!(lines[1].starts_with("- note"));
    assert_eq!(lines[2], format!("+ group {}", added.name));
    assert_eq!(lines[3], "! session expired");
}

#[test]
fn merge_profile_prefers_explicit_then_env_then_existing() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        image_bucket: Some("old-bucket".to_string()),
    };
    let merged = merge_profile(
        &existing,
        ProfileInput {
            supabase_url: Some("https://new.supabase.co/".to_string()),
            ..ProfileInput::default()
        },
        |key| (key == "SUPABASE_ANON_KEY").then(|| "env-key".to_string()),
    );

    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://new.supabase.co".to_string()),
            supabase_anon_key: Some("env-key".to_string()),
            image_bucket: Some("old-bucket".to_string()),
        }
    );
}

#[test]
fn mask_secret_hides_middle() {
    assert_eq!(mask_secret("abcdefghijkl"), "abcd...ijkl");
    assert_eq!(mask_secret("short"), "*****");
}

#[test]
fn run_completions_writes_bash_script_file() {
    let path = unique_temp_path("inkpad.bash");
    run_completions(Shell::Bash, Some(&path)).unwrap();
    let script = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(script.contains("inkpad"));
}
