use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::calc::{self, DurationEntry};
use crate::cli::{CalendarArgs, Command, EventCommand, NoteCommand, TimerCommand};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::parse_date_expr;
use crate::grid::{MonthSpec, build_grid, parse_week_start};
use crate::notify;
use crate::record::{Event, Note, Timer, marker_dates};
use crate::render::Renderer;

/// Services a command runs against; built once in `run` and passed down.
pub struct Session<'a> {
    pub store: &'a DataStore,
    pub cfg: &'a Config,
    pub renderer: &'a mut Renderer,
    pub now: DateTime<Utc>,
}

#[instrument(skip(ctx, command))]
pub fn dispatch(ctx: &mut Session<'_>, command: Option<Command>) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Timers);
    let tz = *ctx.renderer.timezone();
    let now = ctx.now;
    debug!(?command, timezone = %tz, "dispatching command");

    match command {
        Command::Timer(TimerCommand::Add {
            title,
            when,
            up,
            mode,
            notify,
        }) => {
            let target = parse_when(&when, now, &tz)?;
            let mut timer = Timer::new(title, target, now);
            timer.counting_up = up;
            timer.mode = mode;
            timer.notify = notify;
            cmd_add_timer(ctx, timer)
        }
        Command::Timers => cmd_timers(ctx),
        Command::Event(EventCommand::Add { title, when, notify }) => {
            let at = parse_when(&when, now, &tz)?;
            let mut event = Event::new(title, at, now);
            event.notify = notify;
            cmd_add_event(ctx, event)
        }
        Command::Note(NoteCommand::Add {
            title,
            when,
            body,
            repeat,
            notify,
        }) => {
            let at = parse_when(&when, now, &tz)?;
            let mut note = Note::new(title, at, now);
            note.body = body;
            note.notify = notify;
            note.repeat_dates = repeat
                .iter()
                .map(|raw| parse_when(raw, now, &tz))
                .collect::<anyhow::Result<Vec<_>>>()?;
            note.repeat_dates.sort();
            cmd_add_note(ctx, note)
        }
        Command::Remove { uuid } => cmd_remove(ctx, uuid),
        Command::Calendar(args) => cmd_calendar(ctx, &args),
        Command::Sum { entries } => cmd_sum(&entries),
        Command::Upcoming { hours } => cmd_upcoming(ctx, hours),
        Command::Show => cmd_show(ctx.cfg),
    }
}

fn parse_when(raw: &str, now: DateTime<Utc>, tz: &Tz) -> anyhow::Result<DateTime<Utc>> {
    parse_date_expr(raw, now, tz).with_context(|| format!("invalid date: {raw}"))
}

#[instrument(skip(ctx, timer), fields(uuid = %timer.uuid))]
fn cmd_add_timer(ctx: &mut Session<'_>, timer: Timer) -> anyhow::Result<()> {
    info!("command timer add");
    let uuid = timer.uuid;
    let timers = ctx.store.add_timer(timer)?;
    debug!(count = timers.len(), "timer added");
    println!("Created timer {uuid}.");
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_timers(ctx: &mut Session<'_>) -> anyhow::Result<()> {
    info!("command timers");
    let timers = ctx.store.load_timers()?;
    if timers.is_empty() {
        println!("No timers.");
        return Ok(());
    }
    ctx.renderer.print_timer_table(&timers, ctx.now)
}

#[instrument(skip(ctx, event), fields(uuid = %event.uuid))]
fn cmd_add_event(ctx: &mut Session<'_>, event: Event) -> anyhow::Result<()> {
    info!("command event add");
    let uuid = event.uuid;
    ctx.store.add_event(event)?;
    println!("Created event {uuid}.");
    Ok(())
}

#[instrument(skip(ctx, note), fields(uuid = %note.uuid))]
fn cmd_add_note(ctx: &mut Session<'_>, note: Note) -> anyhow::Result<()> {
    info!(repeats = note.repeat_dates.len(), "command note add");
    let uuid = note.uuid;
    ctx.store.add_note(note)?;
    println!("Created note {uuid}.");
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_remove(ctx: &mut Session<'_>, uuid: Uuid) -> anyhow::Result<()> {
    info!("command remove");
    if ctx.store.remove(uuid)? {
        println!("Removed {uuid}.");
        Ok(())
    } else {
        Err(anyhow!("no timer, event or note with uuid {uuid}"))
    }
}

#[instrument(skip(ctx, args))]
fn cmd_calendar(ctx: &mut Session<'_>, args: &CalendarArgs) -> anyhow::Result<()> {
    info!(offset = args.offset, "command calendar");
    let week_start = match args.week_start.as_deref() {
        Some(raw) => parse_week_start(raw).context("invalid --week-start")?,
        None => ctx.cfg.week_start()?,
    };

    let tz = *ctx.renderer.timezone();
    let today = ctx.now.with_timezone(&tz).date_naive();
    let spec = MonthSpec::from_offset(today, args.offset, week_start)
        .with_context(|| format!("cannot navigate {} months from {today}", args.offset))?;

    let events = ctx.store.load_events()?;
    let notes = ctx.store.load_notes()?;
    let grid = build_grid(spec, marker_dates(&events, &notes, &tz));

    ctx.renderer.print_month_grid(&grid, args.pad, ctx.now)
}

#[instrument(skip(entries))]
fn cmd_sum(entries: &[String]) -> anyhow::Result<()> {
    info!(count = entries.len(), "command sum");
    let parsed = entries
        .iter()
        .map(|raw| raw.parse::<DurationEntry>())
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", calc::total(&parsed));
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_upcoming(ctx: &mut Session<'_>, hours: Option<u64>) -> anyhow::Result<()> {
    info!("command upcoming");
    let hours = match hours {
        Some(hours) => hours,
        None => ctx.cfg.get_u64("notify.horizon_hours")?.unwrap_or(24),
    };
    let horizon = i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .ok_or_else(|| anyhow!("notification horizon too large: {hours}h"))?;

    let requests = notify::plan(
        &ctx.store.load_timers()?,
        &ctx.store.load_events()?,
        &ctx.store.load_notes()?,
        ctx.now,
        horizon,
    );
    ctx.renderer.print_plan(&requests)
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries = cfg.iter().collect::<Vec<_>>();
    entries.sort();
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}
