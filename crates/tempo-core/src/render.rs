use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_local;
use crate::delta::TIMES_UP;
use crate::grid::{DayCell, MonthGrid, same_day, weekday_labels};
use crate::notify::NotificationRequest;
use crate::record::Timer;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color, tz })
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    #[tracing::instrument(skip(self, timers, now))]
    pub fn print_timer_table(&mut self, timers: &[Timer], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = self.timer_rows(timers, now);
        write_table(
            &mut out,
            vec![
                "UUID".to_string(),
                "Title".to_string(),
                "Target".to_string(),
                "Mode".to_string(),
                "Remaining".to_string(),
            ],
            rows,
        )
    }

    fn timer_rows(&self, timers: &[Timer], now: DateTime<Utc>) -> Vec<Vec<String>> {
        timers
            .iter()
            .map(|timer| {
                let display = timer.display(now, &self.tz);
                let display = if display == TIMES_UP {
                    self.paint(&display, "31")
                } else {
                    display
                };
                let arrow = if timer.counting_up { "since" } else { "until" };
                vec![
                    self.paint(&timer.uuid.to_string(), "33"),
                    timer.title.clone(),
                    format!("{arrow} {}", format_local(&timer.target, &self.tz)),
                    timer.mode.to_string(),
                    display,
                ]
            })
            .collect()
    }

    #[tracing::instrument(skip(self, grid, now))]
    pub fn print_month_grid(&mut self, grid: &MonthGrid, pad: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let today = now.with_timezone(&self.tz).date_naive();
        write_month_grid(&mut out, grid, pad, today, |text, code| self.paint(text, code))
    }

    #[tracing::instrument(skip(self, requests))]
    pub fn print_plan(&mut self, requests: &[NotificationRequest]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if requests.is_empty() {
            writeln!(out, "No notifications scheduled.")?;
            return Ok(());
        }

        let rows = requests
            .iter()
            .map(|req| {
                vec![
                    format_local(&req.fire_at, &self.tz),
                    req.title.clone(),
                    req.body.clone(),
                    req.id.clone(),
                ]
            })
            .collect();
        write_table(
            &mut out,
            vec![
                "Fires".to_string(),
                "Title".to_string(),
                "Body".to_string(),
                "Id".to_string(),
            ],
            rows,
        )
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Marked days get a trailing `*`, today is bracketed.
fn write_month_grid<W, P>(
    mut writer: W,
    grid: &MonthGrid,
    pad: bool,
    today: NaiveDate,
    paint: P,
) -> anyhow::Result<()>
where
    W: Write,
    P: Fn(&str, &str) -> String,
{
    let title = grid.spec.title();
    writeln!(writer, "{title:^34}")?;

    let labels = weekday_labels(grid.spec.first_weekday())
        .into_iter()
        .map(|label| format!("{label:^4}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", labels.trim_end())?;

    let cells = if pad { grid.padded_cells() } else { grid.cells.clone() };
    for week in cells.chunks(7) {
        let line = week
            .iter()
            .map(|cell| match cell {
                DayCell::Blank => "    ".to_string(),
                DayCell::Day(date) => {
                    let day = date.day();
                    match (same_day(date, &today), grid.has_marker(date)) {
                        (true, true) => paint(&format!("[{day:>2}*"), "36"),
                        (true, false) => format!("[{day:>2}]"),
                        (false, true) => paint(&format!(" {day:>2}*"), "36"),
                        (false, false) => format!(" {day:>2} "),
                    }
                }
            })
            .map(|text| {
                let width = UnicodeWidthStr::width(strip_ansi(&text).as_str());
                format!("{text}{}", " ".repeat(4usize.saturating_sub(width)))
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
