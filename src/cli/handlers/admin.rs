use std::io::Read;

use super::*;
use crate::cli::output::*;
use crate::io::config_io::{config_path, set_config_value};
use crate::io::recovery::{prune_recovery, read_recovery_entries};
use crate::ops::interpret::{Effect, Interpreter};

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

pub(super) fn cmd_clear(ctx: &Ctx, args: ClearArgs) -> CmdResult {
    if !args.yes {
        return Err("this erases every task and custom list; pass --yes to confirm".into());
    }
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    store.clear_all_data();
    reconcile_focus(&store);
    println!("all tasks and custom lists erased (copies kept in the recovery log)");
    Ok(())
}

pub(super) fn cmd_recovery(ctx: &Ctx, args: RecoveryCmd) -> CmdResult {
    if let Some(RecoveryAction::Prune { all }) = args.action {
        let _lock = ctx.lock()?;
        let removed = prune_recovery(&ctx.dir, None, all)?;
        if ctx.json {
            return print_json(&serde_json::json!({ "removed": removed }));
        }
        println!("removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
        return Ok(());
    }

    let entries = read_recovery_entries(&ctx.dir, args.limit);
    if ctx.json {
        let json: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
        return print_json(&json);
    }
    if entries.is_empty() {
        println!("recovery log is empty");
        return Ok(());
    }
    for entry in &entries {
        print!("{}", entry.to_display_markdown());
    }
    Ok(())
}

pub(super) fn cmd_config(ctx: &Ctx, args: ConfigCmd) -> CmdResult {
    match args.action {
        ConfigAction::Show => {
            if ctx.json {
                return print_json(&ctx.config);
            }
            println!("# {}", config_path(&ctx.dir).display());
            print!("{}", toml::to_string_pretty(&ctx.config)?);
        }
        ConfigAction::Set { key, value } => {
            let _lock = ctx.lock()?;
            let config = set_config_value(&ctx.dir, &key, &value)?;
            tracing::info!(key = %key, "config updated");
            if ctx.json {
                return print_json(&config);
            }
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command interpreter
// ---------------------------------------------------------------------------

fn read_input(input: &str) -> Result<String, Box<dyn Error>> {
    if input != "-" {
        return Ok(input.to_string());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn print_effects(ctx: &Ctx, effects: &[Effect]) -> CmdResult {
    if ctx.json {
        return print_json(&effects);
    }
    for effect in effects {
        match effect {
            Effect::Advisory { message } => eprintln!("warning: {}", message),
            other => println!("{}", format_effect(other)),
        }
    }
    Ok(())
}

pub(super) fn cmd_apply(ctx: &Ctx, args: ApplyArgs) -> CmdResult {
    let input = read_input(&args.input)?;
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let mut interpreter = Interpreter::load(store.kv().clone(), ctx.config.palette.colors.clone());

    let effects = interpreter.apply(&mut store, &input)?;
    if effects.iter().any(|e| matches!(e, Effect::ListCreated { .. })) {
        focus_follow_active_list(&store);
    }
    if effects.iter().any(|e| matches!(e, Effect::TasksDeleted { .. })) {
        reconcile_focus(&store);
    }
    print_effects(ctx, &effects)
}

pub(super) fn cmd_confirm(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let mut interpreter = Interpreter::load(store.kv().clone(), ctx.config.palette.colors.clone());

    let Some(effect) = interpreter.confirm(&mut store) else {
        eprintln!("warning: nothing is waiting for confirmation");
        return Ok(());
    };
    reconcile_focus(&store);
    print_effects(ctx, &[effect])
}

pub(super) fn cmd_cancel(ctx: &Ctx) -> CmdResult {
    let _lock = ctx.lock()?;
    let kv = ctx.kv()?;
    let mut interpreter = Interpreter::load(kv, ctx.config.palette.colors.clone());

    let Some(pending) = interpreter.cancel() else {
        eprintln!("warning: nothing is waiting for confirmation");
        return Ok(());
    };
    if ctx.json {
        return print_json(&pending);
    }
    println!("cancelled: {}", pending.message);
    Ok(())
}
