use std::io::Write;
use std::time::Duration;

use chrono::Utc;

use super::*;
use crate::cli::output::*;
use crate::io::state::{LISTS_KEY, TASKS_KEY, VIEW_KEY};
use crate::io::watcher::DataWatcher;
use crate::model::session::{BREAK_WARNING_SECS, SessionState};
use crate::ops::focus::{FocusRunner, TickEvent, now_millis};
use crate::ops::reminders::{Notifier, Reminder, run_reminder_pass};

/// How often `focus run` advances the timer
const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Upper bound on how long `focus run` waits before checking for changes
const WAIT_SLICE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Focus
// ---------------------------------------------------------------------------

pub(super) fn cmd_focus(ctx: &Ctx, args: FocusCmd) -> CmdResult {
    match args.action {
        FocusAction::Start { task, minutes } => focus_start(ctx, &task, minutes),
        FocusAction::Pause => focus_pause(ctx),
        FocusAction::Resume => focus_resume(ctx),
        FocusAction::Stop => focus_stop(ctx),
        FocusAction::Status => focus_status(ctx),
        FocusAction::Run { resume } => focus_run(ctx, resume),
    }
}

fn no_session() -> CmdResult {
    eprintln!("warning: no focus session (start one with `tn focus start <task>`)");
    Ok(())
}

fn task_title<'a, K: KvStore>(store: &'a TaskStore<K>, task_id: &str) -> Option<&'a str> {
    store.task(task_id).map(|t| t.title.as_str())
}

fn print_session<K: KvStore>(ctx: &Ctx, store: &TaskStore<K>, focus: &FocusMachine<K>) -> CmdResult {
    let session = focus.session();
    if ctx.json {
        let json = session.map(|s| session_to_json(s, task_title(store, &s.task_id)));
        return print_json(&json);
    }
    match session {
        Some(s) => println!("{}", format_session(s, task_title(store, &s.task_id))),
        None => println!("no focus session"),
    }
    Ok(())
}

fn focus_start(ctx: &Ctx, query: &str, minutes: Option<u32>) -> CmdResult {
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let Some(task_id) = resolve_task(&store, query)? else {
        return not_found("task", query);
    };
    let minutes = minutes.unwrap_or(ctx.config.focus.default_minutes).max(1);
    let color = store.task_color(&task_id).map(str::to_string);

    let mut focus = FocusMachine::load(store.kv().clone());
    focus.start_session(&task_id, color, minutes, now_millis());
    if !ctx.json {
        eprintln!("session ready and paused; `tn focus resume` or `tn focus run --resume` starts the clock");
    }
    print_session(ctx, &store, &focus)
}

fn focus_pause(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let mut focus = FocusMachine::load(store.kv().clone());
    // bank the time run so far before freezing the clock
    match focus.tick(now_millis()) {
        TickEvent::Expired => {
            eprintln!("focus session expired");
            return Ok(());
        }
        TickEvent::Completed => {
            eprintln!("focus session complete");
            return Ok(());
        }
        _ => {}
    }
    if !focus.pause_session() {
        return no_session();
    }
    print_session(ctx, &store, &focus)
}

fn focus_resume(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let mut focus = FocusMachine::load(store.kv().clone());
    if reconcile_session(&mut focus, &store) {
        eprintln!("focus session stopped: its task no longer exists");
        return Ok(());
    }
    if !focus.resume_session(now_millis()) {
        return no_session();
    }
    if focus.on_active_list_changed(&store) {
        eprintln!("focus session stopped: its task is not in this list");
        return Ok(());
    }
    print_session(ctx, &store, &focus)
}

fn focus_stop(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let mut focus = FocusMachine::load(store.kv().clone());
    if focus.session().is_none() {
        return no_session();
    }
    focus.stop_session();
    println!("focus session stopped");
    Ok(())
}

fn focus_status(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let mut focus = FocusMachine::load(store.kv().clone());
    if reconcile_session(&mut focus, &store) {
        eprintln!("focus session stopped: its task no longer exists");
    }
    // catch the snapshot up with the time that passed since the last tick
    match focus.tick(now_millis()) {
        TickEvent::Expired => eprintln!("focus session expired"),
        TickEvent::Completed => eprintln!("focus session complete"),
        _ => {}
    }
    print_session(ctx, &store, &focus)
}

/// Foreground timer: ticks once a second while the session runs, follows
/// pause/resume/stop from other `tn` processes, and exits when the session
/// ends.
fn focus_run(ctx: &Ctx, resume: bool) -> CmdResult {
    let mut store;
    let mut runner = {
        let _lock = ctx.lock()?;
        store = ctx.store()?;
        let mut focus = FocusMachine::load(store.kv().clone());
        if reconcile_session(&mut focus, &store) {
            eprintln!("focus session stopped: its task no longer exists");
        }
        if resume {
            focus.resume_session(now_millis());
        }
        if focus.on_active_list_changed(&store) {
            eprintln!("focus session stopped: its task is not in this list");
        }
        FocusRunner::new(focus, TICK_PERIOD)
    };
    if runner.machine().session().is_none() {
        return no_session();
    }
    if !runner.machine().is_active() && !ctx.json {
        eprintln!("paused; waiting for `tn focus resume`");
    }

    let watcher = match DataWatcher::start(&ctx.dir) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "not watching the data directory, polling instead");
            None
        }
    };

    loop {
        let due = runner.wait_tick(WAIT_SLICE);

        match &watcher {
            Some(w) => {
                let changed = w.poll();
                if !changed.is_empty() {
                    let _lock = ctx.lock()?;
                    if changed
                        .iter()
                        .any(|k| k == TASKS_KEY || k == LISTS_KEY || k == VIEW_KEY)
                    {
                        store = ctx.store()?;
                    }
                    // a resume or a task moved to another list re-checks the rule too
                    runner.reload();
                    if runner.on_active_list_changed(&store) {
                        report_stop(ctx, "its task is not in the active list");
                    }
                    if runner.reconcile(&store) {
                        report_stop(ctx, "its task no longer exists");
                    }
                }
            }
            None => {
                runner.reload();
            }
        }

        if due {
            let _lock = ctx.lock()?;
            runner.reload();
            let event = runner.tick();
            report_tick(ctx, &store, &runner, event)?;
        }

        if runner.machine().session().is_none() {
            break;
        }
    }
    if !ctx.json {
        println!();
    }
    Ok(())
}

fn report_stop(ctx: &Ctx, why: &str) {
    if ctx.json {
        println!("{{\"event\":\"stopped\"}}");
    } else {
        println!("\nfocus session stopped: {}", why);
    }
}

fn report_tick<K: KvStore>(
    ctx: &Ctx,
    store: &TaskStore<K>,
    runner: &FocusRunner<K>,
    event: TickEvent,
) -> CmdResult {
    if event == TickEvent::Idle {
        return Ok(());
    }
    let session = runner.machine().session();
    let mut out = std::io::stdout().lock();

    if ctx.json {
        let line = FocusEventJson {
            event: event_name(event),
            session: session.map(|s| session_to_json(s, task_title(store, &s.task_id))),
        };
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
        return Ok(());
    }

    let bell = if event.chime().is_some() { "\x07" } else { "" };
    let message = match event {
        TickEvent::Counting | TickEvent::Idle => None,
        TickEvent::PhaseChanged(SessionState::Break(n)) => Some(format!("break time (cycle {})", n)),
        TickEvent::PhaseChanged(SessionState::Working(n)) => Some(format!("back to work (cycle {})", n)),
        TickEvent::PhaseChanged(SessionState::Idle) => None,
        TickEvent::Warning => Some(format!("break ends in {} seconds", BREAK_WARNING_SECS)),
        TickEvent::Completed => Some("focus session complete".to_string()),
        TickEvent::Expired => Some("focus session expired".to_string()),
    };
    if let Some(message) = message {
        writeln!(out, "\r\x1b[K{}{}", message, bell)?;
    }
    if let Some(s) = session {
        write!(out, "\r\x1b[K{}", format_session(s, task_title(store, &s.task_id)))?;
    }
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

/// Prints reminders to the terminal; JSON mode collects them instead
struct TerminalNotifier {
    json: bool,
    sent: Vec<Reminder>,
}

impl Notifier for TerminalNotifier {
    fn notify(&mut self, reminder: &Reminder) -> bool {
        if !self.json {
            println!("\x07{}\n  {}", reminder.title, reminder.body);
        }
        self.sent.push(reminder.clone());
        true
    }
}

fn reminder_pass(ctx: &Ctx, notifier: &mut TerminalNotifier) -> Result<usize, Box<dyn Error>> {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    Ok(run_reminder_pass(&mut store, notifier, Utc::now()))
}

pub(super) fn cmd_remind(ctx: &Ctx, args: RemindArgs) -> CmdResult {
    let mut notifier = TerminalNotifier {
        json: ctx.json,
        sent: Vec::new(),
    };

    if !args.watch {
        let n = reminder_pass(ctx, &mut notifier)?;
        if ctx.json {
            let sent: Vec<ReminderJson> = notifier.sent.iter().map(reminder_to_json).collect();
            return print_json(&sent);
        }
        if n == 0 {
            println!("nothing due");
        }
        return Ok(());
    }

    let interval = Duration::from_secs(ctx.config.reminders.poll_seconds.max(1));
    tracing::info!(seconds = interval.as_secs(), "watching for due tasks");
    loop {
        reminder_pass(ctx, &mut notifier)?;
        if ctx.json {
            for reminder in notifier.sent.drain(..) {
                println!("{}", serde_json::to_string(&reminder_to_json(&reminder))?);
            }
        } else {
            notifier.sent.clear();
        }
        std::thread::sleep(interval);
    }
}
