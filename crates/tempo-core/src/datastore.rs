use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::record::{Event, Note, Timer};

/// JSON-lines files under one data directory, one file per record kind.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub timers_path: PathBuf,
    pub events_path: PathBuf,
    pub notes_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let timers_path = data_dir.join("timers.data");
        let events_path = data_dir.join("events.data");
        let notes_path = data_dir.join("notes.data");

        for path in [&timers_path, &events_path, &notes_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            timers = %timers_path.display(),
            events = %events_path.display(),
            notes = %notes_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            timers_path,
            events_path,
            notes_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_timers(&self) -> anyhow::Result<Vec<Timer>> {
        load_jsonl(&self.timers_path).context("failed to load timers.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_notes(&self) -> anyhow::Result<Vec<Note>> {
        load_jsonl(&self.notes_path).context("failed to load notes.data")
    }

    #[tracing::instrument(skip(self, timers))]
    pub fn save_timers(&self, timers: &[Timer]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.timers_path, timers).context("failed to save timers.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[Event]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn save_notes(&self, notes: &[Note]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.notes_path, notes).context("failed to save notes.data")
    }

    #[tracing::instrument(skip(self, timer), fields(uuid = %timer.uuid))]
    pub fn add_timer(&self, timer: Timer) -> anyhow::Result<Vec<Timer>> {
        let mut timers = self.load_timers()?;
        timers.push(timer);
        timers.sort_by_key(|t| t.target);
        self.save_timers(&timers)?;
        Ok(timers)
    }

    #[tracing::instrument(skip(self, event), fields(uuid = %event.uuid))]
    pub fn add_event(&self, event: Event) -> anyhow::Result<Vec<Event>> {
        let mut events = self.load_events()?;
        events.push(event);
        events.sort_by_key(|e| e.at);
        self.save_events(&events)?;
        Ok(events)
    }

    #[tracing::instrument(skip(self, note), fields(uuid = %note.uuid))]
    pub fn add_note(&self, note: Note) -> anyhow::Result<Vec<Note>> {
        let mut notes = self.load_notes()?;
        notes.push(note);
        notes.sort_by_key(|n| n.at);
        self.save_notes(&notes)?;
        Ok(notes)
    }

    /// Deletes the record with `uuid` from whichever file holds it.
    #[tracing::instrument(skip(self), fields(uuid = %uuid))]
    pub fn remove(&self, uuid: Uuid) -> anyhow::Result<bool> {
        let mut timers = self.load_timers()?;
        let before = timers.len();
        timers.retain(|t| t.uuid != uuid);
        if timers.len() != before {
            self.save_timers(&timers)?;
            info!("removed timer");
            return Ok(true);
        }

        let mut events = self.load_events()?;
        let before = events.len();
        events.retain(|e| e.uuid != uuid);
        if events.len() != before {
            self.save_events(&events)?;
            info!("removed event");
            return Ok(true);
        }

        let mut notes = self.load_notes()?;
        let before = notes.len();
        notes.retain(|n| n.uuid != uuid);
        if notes.len() != before {
            self.save_notes(&notes)?;
            info!("removed note");
            return Ok(true);
        }

        debug!("no record matched");
        Ok(false)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
