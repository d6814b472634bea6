use chrono::Local;
use indexmap::IndexMap;

use super::*;
use crate::cli::output::*;
use crate::model::list::ALL_LIST_ID;
use crate::model::prefs::SortOption;
use crate::model::task::{TaskPatch, parse_due_date};
use crate::ops::view::{ViewFilter, move_in_view, visible_tasks};
use crate::util::unicode::display_width;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub(super) fn cmd_add(ctx: &Ctx, args: AddArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;

    let list_id = match &args.list {
        Some(q) => resolve_list(&store, q)?.ok_or_else(|| format!("list not found: {}", q))?,
        None => store.active_list_id().to_string(),
    };
    let priority = args
        .priority
        .as_deref()
        .map(parse_priority)
        .transpose()?
        .unwrap_or_default();
    let due = args
        .due
        .as_deref()
        .map(|d| parse_due_date(d).ok_or_else(|| format!("could not read due date '{}'", d)))
        .transpose()?;

    let Some(id) = store.add_task(&args.title, &list_id, priority, due) else {
        eprintln!("warning: empty title, nothing added");
        return Ok(());
    };
    if let Some(desc) = args.description.filter(|d| !d.trim().is_empty()) {
        store.update_task(
            &id,
            TaskPatch {
                description: Some(Some(desc)),
                ..Default::default()
            },
        );
    }

    if ctx.json {
        if let Some(task) = store.task(&id) {
            let list_name = store.list(&task.list_id).map(|l| l.name.as_str());
            return print_json(&task_to_json(task, list_name));
        }
    }
    println!("{}", id);
    Ok(())
}

pub(super) fn cmd_ls(ctx: &Ctx, args: LsArgs) -> CmdResult {
    let store = ctx.store()?;

    let list_id = match &args.list {
        Some(q) => resolve_list(&store, q)?.ok_or_else(|| format!("list not found: {}", q))?,
        None => store.active_list_id().to_string(),
    };
    let sort_by = match &args.sort {
        Some(s) => parse_sort(s)?,
        None => store.sort_by(),
    };
    let filter = ViewFilter {
        active_list_id: &list_id,
        search_query: store.search_query(),
        sort_by,
        show_completed: args.all || store.show_completed(),
    };
    let shown = visible_tasks(store.tasks(), &filter);
    let list_name = store
        .list(&list_id)
        .map(|l| l.name.clone())
        .unwrap_or_else(|| list_id.clone());
    // only the catch-all view mixes lists
    let name_of = |list: &str| -> Option<&str> {
        if list_id == ALL_LIST_ID {
            store.list(list).map(|l| l.name.as_str())
        } else {
            None
        }
    };

    if ctx.json {
        return print_json(&ListingJson {
            list_id: list_id.clone(),
            list_name,
            sort: sort_by,
            search: filter.search_query.to_string(),
            show_completed: filter.show_completed,
            tasks: shown
                .iter()
                .map(|t| task_to_json(t, store.list(&t.list_id).map(|l| l.name.as_str())))
                .collect(),
        });
    }

    println!(
        "{}",
        format_listing_header(&list_name, sort_by, filter.search_query, filter.show_completed)
    );
    if shown.is_empty() {
        println!("(no tasks)");
    }
    for task in shown {
        println!("{}", format_task_line(task, name_of(&task.list_id), &Local));
    }
    Ok(())
}

pub(super) fn cmd_show(ctx: &Ctx, args: IdArg) -> CmdResult {
    let store = ctx.store()?;
    let Some(id) = resolve_task(&store, &args.id)? else {
        return not_found("task", &args.id);
    };
    let Some(task) = store.task(&id) else {
        return not_found("task", &args.id);
    };
    let list_name = store.list(&task.list_id).map(|l| l.name.as_str());

    if ctx.json {
        return print_json(&task_to_json(task, list_name));
    }
    for line in format_task_detail(task, list_name, &Local) {
        println!("{}", line);
    }
    Ok(())
}

pub(super) fn cmd_done(ctx: &Ctx, args: IdArg) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let Some(id) = resolve_task(&store, &args.id)? else {
        return not_found("task", &args.id);
    };
    if !store.toggle_task(&id) {
        return not_found("task", &args.id);
    }
    let completed = store.task(&id).is_some_and(|t| t.completed);
    println!(
        "{} {}",
        short_id(&id),
        if completed { "done" } else { "not done" }
    );
    Ok(())
}

pub(super) fn cmd_edit(ctx: &Ctx, args: EditArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let Some(id) = resolve_task(&store, &args.id)? else {
        return not_found("task", &args.id);
    };

    let mut patch = TaskPatch {
        title: args.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
        ..Default::default()
    };
    if args.clear_description {
        patch.description = Some(None);
    } else if let Some(desc) = args.description {
        patch.description = Some(Some(desc));
    }
    if args.clear_due {
        patch.due_date = Some(None);
    } else if let Some(due) = args.due.as_deref() {
        let parsed = parse_due_date(due).ok_or_else(|| format!("could not read due date '{}'", due))?;
        patch.due_date = Some(Some(parsed));
    }
    if let Some(q) = &args.list {
        let list_id = resolve_list(&store, q)?.ok_or_else(|| format!("list not found: {}", q))?;
        if list_id == ALL_LIST_ID {
            return Err("tasks can't be moved to the catch-all list".into());
        }
        patch.list_id = Some(list_id);
    }
    if patch.is_empty() {
        return Err("nothing to change (see `tn edit --help`)".into());
    }

    let moved = patch.list_id.is_some();
    if !store.update_task(&id, patch) {
        return not_found("task", &args.id);
    }
    if moved {
        focus_follow_active_list(&store);
    }
    println!("updated {}", short_id(&id));
    Ok(())
}

pub(super) fn cmd_rm(ctx: &Ctx, args: IdArg) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let Some(id) = resolve_task(&store, &args.id)? else {
        return not_found("task", &args.id);
    };
    if !store.delete_task(&id) {
        return not_found("task", &args.id);
    }
    reconcile_focus(&store);
    println!("deleted {}", short_id(&id));
    Ok(())
}

/// Drag-equivalent: move within the current (manual) view, then apply the
/// new view order through the partial reorder.
pub(super) fn cmd_mv(ctx: &Ctx, args: MvArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    if store.sort_by() != SortOption::Manual {
        return Err(format!(
            "mv works in manual order only (current sort: {}); run `tn sort manual`",
            store.sort_by().as_str()
        )
        .into());
    }
    let Some(id) = resolve_task(&store, &args.id)? else {
        return not_found("task", &args.id);
    };

    let view: Vec<String> = store.visible_tasks().iter().map(|t| t.id.clone()).collect();
    let Some(from) = view.iter().position(|v| *v == id) else {
        eprintln!("warning: task {} is not in the current view", short_id(&id));
        return Ok(());
    };
    let to = args.position.max(1) - 1;
    let new_order = move_in_view(&view, from, to);
    store.reorder_tasks(&new_order);
    println!("moved {} to position {}", short_id(&id), to.min(view.len() - 1) + 1);
    Ok(())
}

pub(super) fn cmd_reorder(ctx: &Ctx, args: ReorderArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;

    let mut ids = Vec::with_capacity(args.ids.len());
    for q in &args.ids {
        // unknown ids pass through so the reorder fails closed
        ids.push(resolve_task(&store, q)?.unwrap_or_else(|| q.clone()));
    }
    if !store.reorder_tasks(&ids) {
        eprintln!("warning: order unchanged (unknown or repeated task id)");
        return Ok(());
    }
    println!("reordered {} task(s)", ids.len());
    Ok(())
}

pub(super) fn cmd_note(ctx: &Ctx, args: NoteCmd) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;

    match args.action {
        NoteAction::Add { id, text } => {
            let Some(task_id) = resolve_task(&store, &id)? else {
                return not_found("task", &id);
            };
            match store.add_note(&task_id, &text) {
                Some(note_id) => println!("{}", note_id),
                None => eprintln!("warning: empty note, nothing added"),
            }
        }
        NoteAction::Edit { id, note_id, text } => {
            let Some((task_id, note_id)) = resolve_note(&store, &id, &note_id)? else {
                return Ok(());
            };
            if !store.edit_note(&task_id, &note_id, &text) {
                eprintln!("warning: empty note, nothing changed");
                return Ok(());
            }
            println!("updated note {}", short_id(&note_id));
        }
        NoteAction::Rm { id, note_id } => {
            let Some((task_id, note_id)) = resolve_note(&store, &id, &note_id)? else {
                return Ok(());
            };
            store.delete_note(&task_id, &note_id);
            println!("deleted note {}", short_id(&note_id));
        }
    }
    Ok(())
}

/// Resolve task and note prefixes, warning when either is missing
fn resolve_note<K: KvStore>(
    store: &TaskStore<K>,
    task_query: &str,
    note_query: &str,
) -> Result<Option<(String, String)>, Box<dyn Error>> {
    let Some(task) = resolve_task(store, task_query)?.and_then(|id| store.task(&id)) else {
        not_found("task", task_query)?;
        return Ok(None);
    };
    let Some(note_id) = resolve_prefix(task.notes.iter().map(|n| n.id.as_str()), note_query, "note")? else {
        not_found("note", note_query)?;
        return Ok(None);
    };
    Ok(Some((task.id.clone(), note_id)))
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

pub(super) fn cmd_lists(ctx: &Ctx) -> CmdResult {
    let store = ctx.store()?;

    // (open, done) per list, in list order
    let mut counts: IndexMap<&str, (usize, usize)> =
        store.lists().iter().map(|l| (l.id.as_str(), (0, 0))).collect();
    for task in store.tasks() {
        for key in [task.list_id.as_str(), ALL_LIST_ID] {
            if let Some((open, done)) = counts.get_mut(key) {
                if task.completed {
                    *done += 1;
                } else {
                    *open += 1;
                }
            }
        }
    }

    if ctx.json {
        let lists: Vec<ListJson> = store
            .lists()
            .iter()
            .map(|l| {
                let (open, done) = counts.get(l.id.as_str()).copied().unwrap_or_default();
                ListJson {
                    id: l.id.clone(),
                    name: l.name.clone(),
                    slug: l.slug,
                    color: l.color.clone(),
                    builtin: l.is_builtin(),
                    active: l.id == store.active_list_id(),
                    open,
                    done,
                }
            })
            .collect();
        return print_json(&lists);
    }

    let name_width = store
        .lists()
        .iter()
        .map(|l| display_width(&l.name))
        .max()
        .unwrap_or(0);
    for list in store.lists() {
        let (open, done) = counts.get(list.id.as_str()).copied().unwrap_or_default();
        let active = list.id == store.active_list_id();
        println!("{}", format_list_row(list, active, open, done, name_width));
    }
    Ok(())
}

pub(super) fn cmd_list(ctx: &Ctx, args: ListCmd) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;

    match args.action {
        ListAction::Add { name, color } => {
            let color = color.or_else(|| store.next_list_color(&ctx.config.palette.colors));
            let Some(id) = store.add_list(&name, color.as_deref()) else {
                eprintln!("warning: empty name, nothing added");
                return Ok(());
            };
            focus_follow_active_list(&store);
            println!("{}", id);
        }
        ListAction::Rm { id } => {
            let Some(list_id) = resolve_list(&store, &id)? else {
                return not_found("list", &id);
            };
            if store.list(&list_id).is_some_and(|l| l.is_builtin()) {
                eprintln!("warning: built-in list '{}' can't be deleted", list_id);
                return Ok(());
            }
            store.delete_list(&list_id);
            reconcile_focus(&store);
            println!("deleted list {}", short_id(&list_id));
        }
        ListAction::Use { id } => {
            let Some(list_id) = resolve_list(&store, &id)? else {
                return not_found("list", &id);
            };
            store.set_active_list(&list_id);
            focus_follow_active_list(&store);
            let name = store.list(&list_id).map(|l| l.name.as_str()).unwrap_or(&list_id);
            println!("active list: {}", name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

fn print_view<K: KvStore>(ctx: &Ctx, store: &TaskStore<K>, text: String) -> CmdResult {
    if ctx.json {
        return print_json(&ViewJson {
            active_list: store.active_list_id().to_string(),
            search: store.search_query().to_string(),
            sort: store.sort_by(),
            show_completed: store.show_completed(),
            theme: store.theme(),
        });
    }
    println!("{}", text);
    Ok(())
}

pub(super) fn cmd_search(ctx: &Ctx, args: SearchArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let query = args.query.unwrap_or_default();
    store.set_search_query(query.trim());
    let text = if store.search_query().is_empty() {
        "search cleared".to_string()
    } else {
        format!("search: \"{}\"", store.search_query())
    };
    print_view(ctx, &store, text)
}

pub(super) fn cmd_sort(ctx: &Ctx, args: SortArgs) -> CmdResult {
    let sort_by = parse_sort(&args.mode)?;
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    store.set_sort_by(sort_by);
    print_view(ctx, &store, format!("sort: {}", sort_by.as_str()))
}

pub(super) fn cmd_completed(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let shown = store.toggle_show_completed();
    let text = format!("completed tasks {}", if shown { "shown" } else { "hidden" });
    print_view(ctx, &store, text)
}

pub(super) fn cmd_theme(ctx: &Ctx, args: ThemeArgs) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let theme = match args.theme.as_deref() {
        Some(t) => {
            let theme = parse_theme(t)?;
            store.set_theme(theme);
            theme
        }
        None => store.toggle_theme(),
    };
    print_view(ctx, &store, format!("theme: {}", theme.as_str()))
}
