//! Works out which reminders an OS alarm
//! service should hold. Nothing here talks
//! to that service.

use chrono::{
  DateTime,
  Duration,
  Utc
};
use serde::Serialize;

use crate::delta::TIMES_UP;
use crate::record::{
  Event,
  Note,
  Timer
};

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct NotificationRequest {
  pub id:      String,
  pub title:   String,
  pub body:    String,
  pub fire_at: DateTime<Utc>
}

#[tracing::instrument(skip(
  timers, events, notes
))]
pub fn plan(
  timers: &[Timer],
  events: &[Event],
  notes: &[Note],
  now: DateTime<Utc>,
  horizon: Duration
) -> Vec<NotificationRequest> {
  let until = now
    .checked_add_signed(horizon)
    .unwrap_or(DateTime::<Utc>::MAX_UTC);
  let in_window = |at: &DateTime<Utc>| {
    *at > now && *at <= until
  };

  let mut out = Vec::new();

  // From-date timers have nothing to
  // announce.
  for timer in timers.iter().filter(|t| {
    t.notify && !t.counting_up
  }) {
    if in_window(&timer.target) {
      out.push(NotificationRequest {
        id:      timer.uuid.to_string(),
        title:   timer.title.clone(),
        body:    TIMES_UP.to_string(),
        fire_at: timer.target
      });
    }
  }

  for event in
    events.iter().filter(|e| e.notify)
  {
    if in_window(&event.at) {
      out.push(NotificationRequest {
        id:      event.uuid.to_string(),
        title:   event.title.clone(),
        body:    "Event starting"
          .to_string(),
        fire_at: event.at
      });
    }
  }

  for note in
    notes.iter().filter(|n| n.notify)
  {
    for (idx, at) in
      note.occurrences().enumerate()
    {
      if !in_window(&at) {
        continue;
      }
      let id = if idx == 0 {
        note.uuid.to_string()
      } else {
        format!("{}#{idx}", note.uuid)
      };
      out.push(NotificationRequest {
        id,
        title: note.title.clone(),
        body: note.body.clone(),
        fire_at: at
      });
    }
  }

  out.sort_by(|a, b| {
    a.fire_at
      .cmp(&b.fire_at)
      .then_with(|| a.id.cmp(&b.id))
  });
  tracing::debug!(
    count = out.len(),
    "planned notifications"
  );
  out
}
