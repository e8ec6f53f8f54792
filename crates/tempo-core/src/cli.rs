use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::delta::DisplayMode;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tempo",
    version,
    about = "Tempo: countdown timers, events and notes with a month calendar",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage countdown and from-date timers.
    #[command(subcommand)]
    Timer(TimerCommand),
    /// List timers with their current display.
    Timers,
    /// Manage calendar events.
    #[command(subcommand)]
    Event(EventCommand),
    /// Manage notes.
    #[command(subcommand)]
    Note(NoteCommand),
    /// Delete a timer, event or note by uuid.
    Remove { uuid: uuid::Uuid },
    /// Print a month grid with event markers.
    Calendar(CalendarArgs),
    /// Total signed [+|-]H:M:S entries.
    Sum {
        #[arg(required = true, allow_hyphen_values = true)]
        entries: Vec<String>,
    },
    /// Show the notifications an alarm service should schedule.
    Upcoming {
        #[arg(long)]
        hours: Option<u64>,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TimerCommand {
    Add {
        title: String,
        when: String,
        /// Count up from `when` instead of down to it.
        #[arg(long)]
        up: bool,
        #[arg(long, default_value_t = DisplayMode::Auto)]
        mode: DisplayMode,
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventCommand {
    Add {
        title: String,
        when: String,
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum NoteCommand {
    Add {
        title: String,
        when: String,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long = "repeat", action = ArgAction::Append)]
        repeat: Vec<String>,
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// Months away from the current one.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
    #[arg(long = "week-start")]
    pub week_start: Option<String>,
    /// Fill the last week row with blanks.
    #[arg(long)]
    pub pad: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` and `rc.key:value` positional overrides out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{CalendarArgs, Command, GlobalCli, TimerCommand, preprocess_args};
    use crate::delta::DisplayMode;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&[
            "tempo",
            "rc.calendar.week_start:sunday",
            "calendar",
            "rc.color=off",
        ]))
        .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["tempo", "calendar"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.calendar.week_start".to_string(), "sunday".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn parses_timer_add_with_mode() {
        let cli = GlobalCli::parse_from([
            "tempo", "-vv", "timer", "add", "launch", "2026-03-01", "--mode", "days", "--notify",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Timer(TimerCommand::Add {
                title,
                mode,
                up,
                notify,
                ..
            })) => {
                assert_eq!(title, "launch");
                assert_eq!(mode, DisplayMode::Days);
                assert!(!up);
                assert!(notify);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn calendar_accepts_negative_offset() {
        let cli = GlobalCli::parse_from(["tempo", "calendar", "--offset", "-3", "--pad"]);
        match cli.command {
            Some(Command::Calendar(CalendarArgs { offset, pad, .. })) => {
                assert_eq!(offset, -3);
                assert!(pad);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sum_accepts_negative_entries() {
        let cli = GlobalCli::parse_from(["tempo", "sum", "1:0:0", "-0:30:0"]);
        match cli.command {
            Some(Command::Sum { entries }) => {
                assert_eq!(entries, vec!["1:0:0".to_string(), "-0:30:0".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
