use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tn", about = concat!("ticknote v", env!("CARGO_PKG_VERSION"), " - tasks, lists and focus timers"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Log debug output to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task (goes to the top)
    Add(AddArgs),
    /// List tasks in the current view
    Ls(LsArgs),
    /// Show task details and notes
    Show(IdArg),
    /// Toggle a task between done and not done
    Done(IdArg),
    /// Change task fields
    Edit(EditArgs),
    /// Delete a task
    Rm(IdArg),
    /// Move a task to a position in the current view
    Mv(MvArgs),
    /// Reorder tasks: the given ids keep their slots, in the new order
    Reorder(ReorderArgs),
    /// Add, edit or remove task notes
    Note(NoteCmd),
    /// List all lists
    Lists,
    /// Create, delete or switch lists
    List(ListCmd),
    /// Set the search filter (no query clears it)
    Search(SearchArgs),
    /// Set the sort mode
    Sort(SortArgs),
    /// Toggle showing completed tasks
    Completed,
    /// Show, set or toggle the theme
    Theme(ThemeArgs),
    /// Erase all tasks and custom lists
    Clear(ClearArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
    /// Show or edit config.toml
    Config(ConfigCmd),
    /// Focus timer
    Focus(FocusCmd),
    /// Send due-date reminders
    Remind(RemindArgs),
    /// Apply command-interpreter actions (JSON)
    Apply(ApplyArgs),
    /// Run the pending destructive action
    Confirm,
    /// Discard the pending destructive action
    Cancel,
}

// ---------------------------------------------------------------------------
// Task args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArg {
    /// Task id (any unique prefix)
    pub id: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// List id or name (default: the active list)
    #[arg(short, long)]
    pub list: Option<String>,
    /// low, medium or high
    #[arg(short, long)]
    pub priority: Option<String>,
    /// Due date: YYYY-MM-DD, "YYYY-MM-DD HH:MM" or RFC 3339
    #[arg(long)]
    pub due: Option<String>,
    /// Longer description
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Show this list instead of the active one
    #[arg(short, long)]
    pub list: Option<String>,
    /// Override the sort mode for this listing
    #[arg(long)]
    pub sort: Option<String>,
    /// Include completed tasks for this listing
    #[arg(short = 'a', long)]
    pub all: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task id (any unique prefix)
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    /// low, medium or high
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    /// Move to another list
    #[arg(long)]
    pub list: Option<String>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task id (any unique prefix)
    pub id: String,
    /// New 1-based position within the current view
    pub position: usize,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Task ids in the desired order
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct NoteCmd {
    #[command(subcommand)]
    pub action: NoteAction,
}

#[derive(Subcommand)]
pub enum NoteAction {
    /// Attach a note to a task
    Add { id: String, text: String },
    /// Replace a note's text
    Edit {
        id: String,
        note_id: String,
        text: String,
    },
    /// Delete a note
    Rm { id: String, note_id: String },
}

// ---------------------------------------------------------------------------
// List and view args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListCmd {
    #[command(subcommand)]
    pub action: ListAction,
}

#[derive(Subcommand)]
pub enum ListAction {
    /// Create a list and switch to it
    Add {
        name: String,
        /// Color name (default: first unused palette color)
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a custom list and all of its tasks
    Rm { id: String },
    /// Make a list the active one
    Use { id: String },
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: Option<String>,
}

#[derive(Args)]
pub struct SortArgs {
    /// manual, time-asc, time-desc or priority
    pub mode: String,
}

#[derive(Args)]
pub struct ThemeArgs {
    /// light or dark (omit to toggle)
    pub theme: Option<String>,
}

// ---------------------------------------------------------------------------
// Data args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ClearArgs {
    /// Required: confirm the erase
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Show at most this many entries
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries (older than 30 days)
    Prune {
        /// Remove every entry
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a value, e.g. `focus.default_minutes 60`
    Set { key: String, value: String },
}

// ---------------------------------------------------------------------------
// Focus, reminders, interpreter
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FocusCmd {
    #[command(subcommand)]
    pub action: FocusAction,
}

#[derive(Subcommand)]
pub enum FocusAction {
    /// Prepare a session on a task (starts paused)
    Start {
        /// Task id (any unique prefix)
        task: String,
        /// Session length (default from config)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        minutes: Option<u32>,
    },
    /// Pause the running session
    Pause,
    /// Resume the session
    Resume,
    /// End the session
    Stop,
    /// Show the session
    Status,
    /// Drive the timer in the foreground until the session ends
    Run {
        /// Resume the session before running
        #[arg(long)]
        resume: bool,
    },
}

#[derive(Args)]
pub struct RemindArgs {
    /// Keep polling (interval from config)
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// JSON action array or object; `-` reads stdin
    pub input: String,
}
