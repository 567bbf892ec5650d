pub mod args;
pub mod config;
pub mod due;
pub mod error;
pub mod filter;
pub mod formatting;
pub mod markers;
pub mod note;
pub mod queue;
pub mod recommend;
pub mod shared;
pub mod store;
pub mod sync;
pub mod tags;
pub mod workspace;

pub use due::{Urgency, format_due_date, format_short_due_date, urgency_bucket};
pub use markers::{DueMarker, Markers, extract_markers};
pub use note::{Note, Progress, hashtags};
pub use recommend::{Pick, RecommendationEngine};
pub use store::{MergeReport, NoteDraft, NotePatch, NoteStore, StoreEvent};
pub use sync::{RemoteStore, SyncCoordinator, SyncStatus, SyncTrigger};
pub use workspace::{SharedWorkspace, Workspace};

use std::cmp::Ordering;
use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::args::{ArgParser, SortField, parse_edit_flags, parse_list_flags};
use crate::config::{DEFAULT_LOG_FILTER, LOG_VAR, Settings, ensure_dir};
use crate::due::local_today;
use crate::formatting::{FormatContext, TimeFormatter, time_ago};
use crate::queue::{MAX_TASKS, QueueOutcome};
use crate::shared::table::{render_table, terminal_columns, truncate_with_ellipsis};
use crate::store::FileStorage;
use crate::sync::DirRemote;

const NO_REMOTE: &str = "No remote configured; set VAATA_MIND_REMOTE to a directory";

pub fn entry() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_help();
        return Ok(());
    }

    let cmd = args.remove(0);
    let settings = Settings::from_env()?;
    ensure_dir(&settings.notes_dir)?;

    match cmd.as_str() {
        "add" => add_note(args, &settings)?,
        "show" | "view" => show_note(args, &settings)?,
        "edit" => edit_note(args, &settings)?,
        "progress" => set_progress(args, &settings)?,
        "delete" | "rm" => delete_notes(args, &settings)?,
        "list" | "ls" => list_notes(args, &settings)?,
        "tags" => list_tags(&settings)?,
        "recommend" => recommend(args, &settings)?,
        "export" => export_notes(args, &settings)?,
        "import" => import_notes(args, &settings)?,
        "sync" => sync_command(args, &settings)?,
        "path" => println!("{}", settings.notes_dir.display()),
        "help" | "-h" | "--help" => print_help(),
        other => {
            return Err(format!("Unknown command: {other} (see `vm help`)").into());
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_help() {
    println!(
        "\
Vaata Mind
Usage:
  vm add <text...>                Add a note; markers: !today !tomorrow !nextweek
                                  !nextmonth due:D/M/YYYY !noDueDate !important
  vm show <id>                    Show a note (ids may be shortened to a unique prefix)
  vm edit <id> [text...] [-p <progress>] [--important|--not-important]
          [--due <D/M/YYYY|today|tomorrow|nextweek|nextmonth>|--no-due]
                                  Change a note; new text is parsed for markers
  vm progress <id> <state>        Set progress: not-started|in-progress|done
  vm delete <ids...>              Delete notes
  vm list [-s <text>] [-t <tag>] [-p <progress>] [-i all|important|normal]
          [-d all|none|overdue|today|tomorrow|week|later] [--all]
          [--sort updated|created|due] [--asc|--desc] [-r|--relative]
                                  List notes (done notes hidden unless --all or -p)
  vm tags                         List hashtags with note counts
  vm recommend [--seed N]         Interactive resurfacing: accept, reject, skip, quit
  vm export [file]                Write all notes as JSON (stdout by default)
  vm import <file|->              Replace all notes from an export file
  vm sync [on|off|status|--watch] Sync with the remote directory
  vm path                         Show the notes directory
  vm help                         Show this message

Environment:
  VAATA_MIND_DIR                  Notes directory (default: ~/.vaata_mind)
  VAATA_MIND_REMOTE               Remote directory used by sync
  VAATA_MIND_SYNC_MINUTES         Periodic sync interval for --watch (default: 5)
  VAATA_MIND_LOG                  Log filter, e.g. debug (default: warn)
  NO_COLOR                        Disable colors
"
    );
}

fn open_workspace(settings: &Settings) -> Workspace {
    Workspace::open(FileStorage::in_dir(&settings.notes_dir))
}

fn runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

fn coordinator(settings: &Settings, ws: Workspace) -> Option<SyncCoordinator> {
    let remote_dir = settings.remote_dir.as_ref()?;
    let remote: Arc<dyn RemoteStore> = Arc::new(DirRemote::new(remote_dir));
    Some(SyncCoordinator::new(ws.into_shared(), remote))
}

/// Forward this command's mutations to the remote when sync is on. Push
/// failures are logged; the local change already stands.
fn push_pending(
    settings: &Settings,
    ws: Workspace,
    mut events: mpsc::UnboundedReceiver<StoreEvent>,
) {
    if !ws.store().sync_enabled() {
        return;
    }
    let pending: Vec<StoreEvent> =
        std::iter::from_fn(|| events.try_recv().ok()).collect();
    if pending.is_empty() {
        return;
    }
    let Some(coordinator) = coordinator(settings, ws) else {
        tracing::warn!("Sync is on but {NO_REMOTE}");
        return;
    };
    match runtime() {
        Ok(rt) => rt.block_on(async {
            for event in pending {
                coordinator.handle_event(event).await;
            }
        }),
        Err(e) => tracing::warn!("Could not start sync runtime: {e}"),
    }
}

/// Exact id, or a unique id prefix.
fn resolve_id(store: &NoteStore, input: &str) -> Result<String, Box<dyn Error>> {
    if store.contains(input) {
        return Ok(input.to_string());
    }
    let matches: Vec<&Note> = if input.is_empty() {
        Vec::new()
    } else {
        store.notes().iter().filter(|n| n.id.starts_with(input)).collect()
    };
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(format!("Note {input} not found").into()),
        many => Err(format!(
            "Id prefix {input} matches {} notes; use more characters",
            many.len()
        )
        .into()),
    }
}

fn add_note(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    if args.is_empty() {
        return Err("Provide the note text, e.g. `vm add \"Buy milk #errand !tomorrow\"`".into());
    }
    let markers = extract_markers(&args.join(" "));
    let mut ws = open_workspace(settings);
    let events = ws.subscribe();
    let note = ws.add(NoteDraft::from_markers(&markers));

    let ctx = FormatContext::new(settings.use_color);
    let mut line = format!("Added note {}", ctx.format_id(&note.id));
    if let Some(due) = &note.due_date {
        line.push_str(&format!(" ({})", ctx.format_due(due, local_today())));
    }
    if note.important {
        line.push_str(" [important]");
    }
    println!("{line}");

    push_pending(settings, ws, events);
    Ok(())
}

fn show_note(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let input = args.first().ok_or("Usage: vm show <id>")?;
    let ws = open_workspace(settings);
    let id = resolve_id(ws.store(), input)?;
    let note = ws.store().get_by_id(&id).ok_or_else(|| format!("Note {id} not found"))?;

    let ctx = FormatContext::new(settings.use_color);
    let today = local_today();
    let times = TimeFormatter::new(false, chrono::Utc::now());
    println!("{}", ctx.format_header(&note.id));
    println!("Progress:  {} {}", ctx.format_progress(note.progress), note.progress);
    if note.important {
        println!("Important: yes");
    }
    if let Some(due) = &note.due_date {
        println!("Due:       {}", ctx.format_due(due, today));
    }
    let tags = note.hashtags();
    if !tags.is_empty() {
        println!("Tags:      {}", ctx.format_tags(&tags));
    }
    println!("Created:   {}", ctx.format_timestamp(&times.format(&note.created_at)));
    println!("Updated:   {}", ctx.format_timestamp(&times.format(&note.updated_at)));
    println!();
    println!("{}", note.content);
    Ok(())
}

fn edit_note(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut parser = ArgParser::new(args, "edit");
    let input = parser.next().ok_or("Usage: vm edit <id> [text...] [flags]")?;
    let flags = parse_edit_flags(parser, local_today())?;
    if flags.is_empty() {
        return Err("Nothing to change; give new text or a flag (see `vm help`)".into());
    }

    let mut ws = open_workspace(settings);
    let events = ws.subscribe();
    let id = resolve_id(ws.store(), &input)?;

    let mut patch = if flags.text.is_empty() {
        NotePatch::new()
    } else {
        NotePatch::from_markers(&extract_markers(&flags.text.join(" ")))
    };
    if let Some(progress) = flags.progress {
        patch = patch.progress(progress);
    }
    if let Some(important) = flags.important {
        patch = patch.important(important);
    }
    if let Some(due) = flags.due {
        patch.due_date = Some(due);
    }

    let note = ws.update(&id, patch)?;
    println!("Updated {}", note.id);
    push_pending(settings, ws, events);
    Ok(())
}

fn set_progress(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let [input, state] = args.as_slice() else {
        return Err("Usage: vm progress <id> <not-started|in-progress|done>".into());
    };
    let progress: Progress = state.parse()?;
    let mut ws = open_workspace(settings);
    let events = ws.subscribe();
    let id = resolve_id(ws.store(), input)?;
    let note = ws.update(&id, NotePatch::new().progress(progress))?;
    println!("{} is now {}", note.id, note.progress);
    push_pending(settings, ws, events);
    Ok(())
}

fn delete_notes(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    if args.is_empty() {
        return Err("Usage: vm delete <ids...>".into());
    }
    let mut ws = open_workspace(settings);
    let events = ws.subscribe();
    let mut deleted = 0;
    for input in &args {
        match resolve_id(ws.store(), input) {
            Ok(id) if ws.delete(&id) => {
                println!("Deleted {id}");
                deleted += 1;
            }
            Ok(id) => println!("Note {id} not found"),
            Err(e) => println!("{e}"),
        }
    }
    if deleted == 0 {
        println!("No notes deleted.");
    }
    push_pending(settings, ws, events);
    Ok(())
}

fn list_notes(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let flags = parse_list_flags(args)?;
    let ws = open_workspace(settings);
    if ws.store().is_empty() {
        println!("No notes yet. Try `vm add \"text\"`.");
        return Ok(());
    }

    let today = local_today();
    let mut notes = flags.filter.apply(ws.store().notes(), today);
    if notes.is_empty() {
        println!("No notes match the current filters.");
        return Ok(());
    }

    let ascending = flags.ascending();
    let directed = |ord: Ordering| if ascending { ord } else { ord.reverse() };
    notes.sort_by(|a, b| match flags.sort_field {
        SortField::Updated => directed(a.updated_at.cmp(&b.updated_at)),
        SortField::Created => directed(a.created_at.cmp(&b.created_at)),
        // Notes without a due date always go last.
        SortField::Due => match (&a.due_date, &b.due_date) {
            (Some(x), Some(y)) => directed(x.cmp(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    });

    let ctx = FormatContext::new(settings.use_color);
    let times = TimeFormatter::new(flags.relative_time, chrono::Utc::now());
    let preview_width = terminal_columns()
        .unwrap_or(120)
        .saturating_sub(80)
        .clamp(24, 80);
    let headers: Vec<String> = ["ID", "P", "!", "Due", "Updated", "Note", "Tags"]
        .iter()
        .map(|h| ctx.format_header(h))
        .collect();
    let rows: Vec<Vec<String>> = notes
        .iter()
        .map(|n| {
            let preview = truncate_with_ellipsis(n.preview(), preview_width);
            vec![
                ctx.format_id(&n.id),
                ctx.format_progress(n.progress),
                ctx.format_important(n.important),
                ctx.format_short_due(n.due_date.as_ref(), today),
                ctx.format_timestamp(&times.format(&n.updated_at)),
                ctx.highlight_match(&preview, flags.filter.text.as_deref()),
                ctx.format_tags(&n.hashtags()),
            ]
        })
        .collect();
    println!("{}", render_table(&headers, &rows));
    Ok(())
}

fn list_tags(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let ws = open_workspace(settings);
    let tags = ws.store().all_hashtags();
    if tags.is_empty() {
        println!("No tags found.");
        return Ok(());
    }
    let tagged: Vec<Vec<String>> =
        ws.store().notes().iter().map(Note::hashtags).collect();

    let ctx = FormatContext::new(settings.use_color);
    let headers = vec![ctx.format_header("Tag"), ctx.format_header("Notes")];
    let rows: Vec<Vec<String>> = tags
        .iter()
        .map(|tag| {
            let count = tagged.iter().filter(|t| t.contains(tag)).count();
            vec![ctx.format_tag(tag), count.to_string()]
        })
        .collect();
    println!("{}", render_table(&headers, &rows));
    Ok(())
}

fn recommend(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut parser = ArgParser::new(args, "recommend");
    let mut seed: Option<u64> = None;
    while let Some(arg) = parser.next() {
        match arg.as_str() {
            "--seed" => seed = Some(parser.extract_parsed::<u64>(&arg)?),
            other => return Err(parser.unknown_flag(other)),
        }
    }
    let engine = seed.map_or_else(RecommendationEngine::new, RecommendationEngine::with_seed);
    let store = NoteStore::open(FileStorage::in_dir(&settings.notes_dir));
    let mut ws = Workspace::new(store, engine);
    let ctx = FormatContext::new(settings.use_color);

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_recommendations(&mut ws, stdin.lock(), stdout.lock(), &ctx)?;
    Ok(())
}

/// One recommendation session driven by line input: a(ccept), r(eject),
/// s(kip) or q(uit). Ends on quit, end of input, or when nothing is left.
fn run_recommendations(
    ws: &mut Workspace,
    input: impl BufRead,
    mut out: impl Write,
    ctx: &FormatContext,
) -> io::Result<()> {
    ws.begin_session();
    let today = local_today();
    let mut lines = input.lines();
    let mut just_reshuffled = false;

    loop {
        let note = match ws.pick_on(today) {
            Pick::Note(note) => note,
            Pick::Empty => {
                writeln!(out, "No notes available to recommend.")?;
                break;
            }
            Pick::Exhausted if just_reshuffled => {
                writeln!(out, "Nothing left to recommend.")?;
                break;
            }
            Pick::Exhausted => {
                writeln!(out, "All notes viewed. Reshuffling...")?;
                ws.reshuffle();
                just_reshuffled = true;
                continue;
            }
        };
        just_reshuffled = false;

        writeln!(out)?;
        writeln!(
            out,
            "{} {} {}",
            ctx.format_progress(note.progress),
            ctx.format_important(note.important),
            ctx.format_id(&note.id)
        )?;
        writeln!(out, "{}", note.content)?;
        if let Some(due) = &note.due_date {
            writeln!(out, "{}", ctx.format_due(due, today))?;
        }
        write!(out, "[a]ccept [r]eject [s]kip [q]uit > ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        match line?.trim() {
            "a" | "accept" => match ws.accept(&note.id) {
                Some(QueueOutcome::Added) => writeln!(
                    out,
                    "Added to task list ({})",
                    ctx.format_load(ws.queue().len(), MAX_TASKS)
                )?,
                Some(QueueOutcome::Duplicate) => {
                    writeln!(out, "This task is already in your list")?
                }
                Some(QueueOutcome::Full) => {
                    writeln!(out, "Cannot add more than {MAX_TASKS} tasks!")?
                }
                None => writeln!(out, "That note no longer exists")?,
            },
            "r" | "reject" => {
                ws.reject(&note.id);
            }
            "s" | "skip" | "" => {}
            "q" | "quit" => break,
            other => writeln!(out, "Unknown choice {other:?}; skipping")?,
        }
    }

    let queued = ws.queued_notes();
    if !queued.is_empty() {
        writeln!(
            out,
            "\nTask list ({}):",
            ctx.format_load(queued.len(), MAX_TASKS)
        )?;
        for (i, note) in queued.iter().enumerate() {
            writeln!(
                out,
                "  {}. {} {}",
                i + 1,
                ctx.format_id(&note.id),
                note.preview()
            )?;
        }
    }
    Ok(())
}

fn export_notes(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let ws = open_workspace(settings);
    let data = ws.export_to()?;
    match args.first() {
        Some(path) => {
            fs::write(path, data)?;
            println!("Exported {} notes to {path}", ws.store().len());
        }
        None => println!("{data}"),
    }
    Ok(())
}

fn import_notes(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let path = args.first().ok_or("Usage: vm import <file|->")?;
    let data = if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };

    let mut ws = open_workspace(settings);
    let events = ws.subscribe();
    let count = ws.import_from(&data)?;
    println!("Imported {count} notes");
    push_pending(settings, ws, events);
    Ok(())
}

fn sync_command(args: Vec<String>, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mut ws = open_workspace(settings);
    match args.first().map(String::as_str) {
        None => run_sync(settings, ws, SyncTrigger::Manual),
        Some("on") => {
            ws.set_sync_enabled(true);
            println!("Sync is on");
            if settings.remote_dir.is_some() {
                run_sync(settings, ws, SyncTrigger::Enabled)
            } else {
                println!("{NO_REMOTE} to start syncing.");
                Ok(())
            }
        }
        Some("off") => {
            ws.set_sync_enabled(false);
            println!("Sync is off");
            Ok(())
        }
        Some("status") => {
            let state = if ws.store().sync_enabled() { "on" } else { "off" };
            println!("Sync:   {state}");
            match &settings.remote_dir {
                Some(dir) => println!("Remote: {}", dir.display()),
                None => println!("Remote: not configured"),
            }
            Ok(())
        }
        Some("--watch") => watch_sync(settings, ws),
        Some(other) => Err(format!("Unknown sync option: {other}").into()),
    }
}

fn run_sync(
    settings: &Settings,
    ws: Workspace,
    trigger: SyncTrigger,
) -> Result<(), Box<dyn Error>> {
    if !ws.store().sync_enabled() {
        println!("Sync is off. Enable it with `vm sync on`.");
        return Ok(());
    }
    let coordinator = coordinator(settings, ws).ok_or(NO_REMOTE)?;
    let status = runtime()?.block_on(coordinator.sync_now(trigger));
    report_sync(&status, &coordinator)
}

fn report_sync(
    status: &SyncStatus,
    coordinator: &SyncCoordinator,
) -> Result<(), Box<dyn Error>> {
    match status {
        SyncStatus::Synced {
            inserted,
            updated,
            skipped,
            pushed,
            failed,
        } => {
            println!(
                "Synced: {inserted} new, {updated} updated, {pushed} pushed (last sync: {})",
                time_ago(coordinator.last_sync(), chrono::Utc::now())
            );
            if *skipped > 0 {
                println!("Skipped {skipped} malformed remote notes");
            }
            if *failed > 0 {
                println!("{failed} notes failed to push; they will be retried next sync");
            }
            Ok(())
        }
        SyncStatus::Skipped => {
            println!("A sync is already running");
            Ok(())
        }
        SyncStatus::Disabled => {
            println!("Sync is off. Enable it with `vm sync on`.");
            Ok(())
        }
        SyncStatus::Failed(reason) => Err(format!("Sync failed: {reason}").into()),
    }
}

fn watch_sync(settings: &Settings, mut ws: Workspace) -> Result<(), Box<dyn Error>> {
    if !ws.store().sync_enabled() {
        println!("Sync is off. Enable it with `vm sync on`.");
        return Ok(());
    }
    let events = ws.subscribe();
    let coordinator = coordinator(settings, ws).ok_or(NO_REMOTE)?;
    let minutes = settings.sync_interval.as_secs() / 60;
    println!("Syncing every {minutes} min; press Ctrl-C to stop.");

    runtime()?.block_on(async {
        tokio::select! {
            _ = coordinator.run(events, settings.sync_interval) => {}
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::warn!("Could not listen for Ctrl-C: {e}");
                }
            }
        }
    });
    println!(
        "Stopped (last sync: {})",
        time_ago(coordinator.last_sync(), chrono::Utc::now())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    fn workspace_with(contents: &[&str]) -> Workspace {
        let mut ws = Workspace::new(
            NoteStore::open(MemoryStorage::new()),
            RecommendationEngine::with_seed(11),
        );
        for c in contents {
            ws.add(*c);
        }
        ws
    }

    fn session(ws: &mut Workspace, input: &str) -> String {
        let mut out = Vec::new();
        let ctx = FormatContext::new(false);
        run_recommendations(ws, input.as_bytes(), &mut out, &ctx).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_resolve_id_by_prefix() {
        let ws = workspace_with(&["one"]);
        let id = ws.store().notes()[0].id.clone();
        assert_eq!(resolve_id(ws.store(), &id).unwrap(), id);
        assert_eq!(resolve_id(ws.store(), &id[..id.len() - 3]).unwrap(), id);
        assert!(resolve_id(ws.store(), "zzz").is_err());
        assert!(resolve_id(ws.store(), "").is_err());
    }

    #[test]
    fn test_resolve_id_ambiguous_prefix() {
        let ws = workspace_with(&["one", "two"]);
        assert!(resolve_id(ws.store(), "n-").is_err());
    }

    #[test]
    fn test_session_accepts_into_task_list() {
        let mut ws = workspace_with(&["only task #x"]);
        let out = session(&mut ws, "a\n");
        assert!(out.contains("only task #x"));
        assert!(out.contains("Added to task list (1/7)"));
        assert!(out.contains("Nothing left to recommend."));
        assert!(out.contains("Task list (1/7):"));
    }

    #[test]
    fn test_session_reshuffles_after_rejects() {
        let mut ws = workspace_with(&["first", "second"]);
        let out = session(&mut ws, "r\nr\nq\n");
        assert!(out.contains("All notes viewed. Reshuffling..."));
        assert!(!out.contains("Task list"));
    }

    #[test]
    fn test_session_without_notes() {
        let mut ws = workspace_with(&[]);
        let out = session(&mut ws, "");
        assert_eq!(out.trim(), "No notes available to recommend.");
    }

    #[test]
    fn test_session_ends_on_eof() {
        let mut ws = workspace_with(&["a", "b"]);
        let out = session(&mut ws, "s\n");
        assert_eq!(out.matches("[a]ccept").count(), 2);
    }
}
