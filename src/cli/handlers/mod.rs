mod admin;
mod focus;
mod tasks;

use std::error::Error;
use std::path::PathBuf;

use crate::cli::commands::*;
use crate::io::kv::{FileKvStore, KvStore};
use crate::io::lock::DataLock;
use crate::model::config::AppConfig;
use crate::ops::focus::{FocusMachine, reconcile_session};
use crate::ops::store::TaskStore;

type CmdResult = Result<(), Box<dyn Error>>;

/// Everything a handler needs besides its own arguments
pub struct Ctx {
    pub dir: PathBuf,
    pub json: bool,
    pub config: AppConfig,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, dir: PathBuf, config: AppConfig) -> CmdResult {
    let ctx = Ctx {
        dir,
        json: cli.json,
        config,
    };
    tracing::debug!(dir = %ctx.dir.display(), "data directory");

    match cli.command {
        // Tasks
        Commands::Add(args) => tasks::cmd_add(&ctx, args),
        Commands::Ls(args) => tasks::cmd_ls(&ctx, args),
        Commands::Show(args) => tasks::cmd_show(&ctx, args),
        Commands::Done(args) => tasks::cmd_done(&ctx, args),
        Commands::Edit(args) => tasks::cmd_edit(&ctx, args),
        Commands::Rm(args) => tasks::cmd_rm(&ctx, args),
        Commands::Mv(args) => tasks::cmd_mv(&ctx, args),
        Commands::Reorder(args) => tasks::cmd_reorder(&ctx, args),
        Commands::Note(args) => tasks::cmd_note(&ctx, args),

        // Lists and view
        Commands::Lists => tasks::cmd_lists(&ctx),
        Commands::List(args) => tasks::cmd_list(&ctx, args),
        Commands::Search(args) => tasks::cmd_search(&ctx, args),
        Commands::Sort(args) => tasks::cmd_sort(&ctx, args),
        Commands::Completed => tasks::cmd_completed(&ctx),
        Commands::Theme(args) => tasks::cmd_theme(&ctx, args),

        // Data
        Commands::Clear(args) => admin::cmd_clear(&ctx, args),
        Commands::Recovery(args) => admin::cmd_recovery(&ctx, args),
        Commands::Config(args) => admin::cmd_config(&ctx, args),

        // Focus and reminders
        Commands::Focus(args) => focus::cmd_focus(&ctx, args),
        Commands::Remind(args) => focus::cmd_remind(&ctx, args),

        // Command interpreter
        Commands::Apply(args) => admin::cmd_apply(&ctx, args),
        Commands::Confirm => admin::cmd_confirm(&ctx),
        Commands::Cancel => admin::cmd_cancel(&ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl Ctx {
    fn kv(&self) -> Result<FileKvStore, Box<dyn Error>> {
        FileKvStore::open(&self.dir)
            .map_err(|e| format!("cannot open data directory {}: {}", self.dir.display(), e).into())
    }

    fn store(&self) -> Result<TaskStore<FileKvStore>, Box<dyn Error>> {
        Ok(TaskStore::load(self.kv()?))
    }

    /// Take the cross-process write lock. Hold it across load + mutate.
    fn lock(&self) -> Result<DataLock, Box<dyn Error>> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(DataLock::acquire_default(&self.dir)?)
    }
}

/// Not-found targets are expected (another process may have won the race),
/// so they warn and succeed.
fn not_found(kind: &str, query: &str) -> CmdResult {
    eprintln!("warning: no {} matching '{}'", kind, query);
    Ok(())
}

/// Resolve a user-typed id against `ids`: exact match first, then a unique
/// prefix. `Ok(None)` means nothing matched.
fn resolve_prefix<'a>(
    ids: impl Iterator<Item = &'a str>,
    query: &str,
    kind: &str,
) -> Result<Option<String>, Box<dyn Error>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }
    let mut matches = Vec::new();
    for id in ids {
        if id == query {
            return Ok(Some(id.to_string()));
        }
        if id.starts_with(query) {
            matches.push(id);
        }
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0].to_string())),
        n => Err(format!("ambiguous {} id '{}' matches {} {}s", kind, query, n, kind).into()),
    }
}

fn resolve_task<K: KvStore>(store: &TaskStore<K>, query: &str) -> Result<Option<String>, Box<dyn Error>> {
    resolve_prefix(store.tasks().iter().map(|t| t.id.as_str()), query, "task")
}

/// Lists resolve by id, id prefix, or (case-insensitive) name.
fn resolve_list<K: KvStore>(store: &TaskStore<K>, query: &str) -> Result<Option<String>, Box<dyn Error>> {
    if let Some(list) = store
        .lists()
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(query.trim()))
    {
        return Ok(Some(list.id.clone()));
    }
    resolve_prefix(store.lists().iter().map(|l| l.id.as_str()), query, "list")
}

/// Stop a focus session left pointing at a deleted task
fn reconcile_focus<K: KvStore + Clone>(store: &TaskStore<K>) {
    let mut focus = FocusMachine::load(store.kv().clone());
    if reconcile_session(&mut focus, store) {
        eprintln!("focus session stopped: its task no longer exists");
    }
}

/// Apply the list-switch rule after the active list or a task's list changed
fn focus_follow_active_list<K: KvStore + Clone>(store: &TaskStore<K>) {
    let mut focus = FocusMachine::load(store.kv().clone());
    if focus.on_active_list_changed(store) {
        eprintln!("focus session stopped: its task is not in this list");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
