//! Decision events iterator
//!
//! Carves a flat, possibly paginated history into one batch per decision task.
//! A batch runs from the current position through the closing
//! `DecisionTaskCompleted`/`Failed`/`TimedOut` event, and also takes the run of
//! decision events that immediately follows a completion (the events the
//! orchestrator wrote for the decisions that task returned).

use super::event::{EventAttributes, EventType, HistoryEvent};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::trace;

/// The events belonging to one decision task.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEvents {
    /// Every event from the start of the batch through its closing event.
    pub events: Vec<HistoryEvent>,
    /// Events recorded for the decisions this task returned.
    pub decision_events: Vec<HistoryEvent>,
    /// `MarkerRecorded` events found in either list.
    pub markers: Vec<HistoryEvent>,
    /// False only for the batch of the task being processed and anything after it.
    pub replay: bool,
    /// Timestamp of the batch's `DecisionTaskStarted` event, or of its
    /// closing event when the started event precedes the supplied history.
    pub replay_current_time: DateTime<Utc>,
    pub task_started_event_id: i64,
    /// `None` when the live batch was closed by the end of history.
    pub closing_event_type: Option<EventType>,
}

impl DecisionEvents {
    /// Whether the orchestrator accepted the decisions of this batch's task.
    pub fn is_completed(&self) -> bool {
        self.closing_event_type == Some(EventType::DecisionTaskCompleted)
    }

    pub fn last_event_id(&self) -> Option<i64> {
        self.decision_events
            .last()
            .or_else(|| self.events.last())
            .map(|e| e.event_id)
    }
}

/// Result of asking for the next batch.
#[derive(Debug, Clone, PartialEq)]
pub enum NextBatch {
    Ready(DecisionEvents),
    /// Buffered events do not form a closed batch yet.
    Incomplete,
    /// Nothing buffered and no pages pending.
    Exhausted,
}

/// Forward-only batch producer for a single decision task.
#[derive(Debug)]
pub struct DecisionEventsIterator {
    started_event_id: i64,
    buffer: VecDeque<HistoryEvent>,
    last_event_id: i64,
    more_pages: bool,
    live_reached: bool,
}

impl DecisionEventsIterator {
    pub fn new(started_event_id: i64) -> Self {
        Self {
            started_event_id,
            buffer: VecDeque::new(),
            last_event_id: 0,
            more_pages: false,
            live_reached: false,
        }
    }

    /// Iterator over a fully paged history.
    pub fn from_history(events: Vec<HistoryEvent>, started_event_id: i64) -> CoreResult<Self> {
        let mut iterator = Self::new(started_event_id);
        iterator.push_page(events, false)?;
        Ok(iterator)
    }

    /// Append a page of history. `more_pages_pending` tells the iterator
    /// whether the history source still has pages after this one.
    pub fn push_page(
        &mut self,
        events: Vec<HistoryEvent>,
        more_pages_pending: bool,
    ) -> CoreResult<()> {
        for event in &events {
            if event.event_id <= self.last_event_id {
                return Err(CoreError::MalformedHistory(format!(
                    "event id {} does not follow {}",
                    event.event_id, self.last_event_id
                )));
            }
            self.last_event_id = event.event_id;
        }
        self.buffer.extend(events);
        self.more_pages = more_pages_pending;
        Ok(())
    }

    pub fn started_event_id(&self) -> i64 {
        self.started_event_id
    }

    pub fn has_buffered_events(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn more_pages_pending(&self) -> bool {
        self.more_pages
    }

    /// Produce the next batch if the buffered history contains one.
    pub fn poll(&mut self) -> NextBatch {
        if self.buffer.is_empty() {
            return if self.more_pages {
                NextBatch::Incomplete
            } else {
                NextBatch::Exhausted
            };
        }

        let mut task_started: Option<(i64, DateTime<Utc>)> = None;
        let mut closing: Option<(usize, EventType)> = None;
        for (index, event) in self.buffer.iter().enumerate() {
            let event_type = event.event_type();
            if event_type.is_decision_task_started() {
                task_started = Some((event.event_id, event.timestamp));
            } else if event_type.is_decision_task_closing() {
                closing = Some((index, event_type));
                break;
            }
        }

        let (events, decision_events, closing_event_type) = match closing {
            Some((index, event_type)) => {
                let mut end = index + 1;
                if event_type == EventType::DecisionTaskCompleted {
                    while end < self.buffer.len()
                        && self.buffer[end].event_type().is_decision_event()
                    {
                        end += 1;
                    }
                    if end == self.buffer.len() && self.more_pages {
                        return NextBatch::Incomplete;
                    }
                }
                let mut events: Vec<HistoryEvent> = self.buffer.drain(..end).collect();
                let decision_events = events.split_off(index + 1);
                (events, decision_events, Some(event_type))
            }
            None => {
                let is_live = task_started
                    .map(|(id, _)| id >= self.started_event_id)
                    .unwrap_or(false);
                if self.more_pages || !is_live {
                    return NextBatch::Incomplete;
                }
                (self.buffer.drain(..).collect(), Vec::new(), None)
            }
        };

        // Sticky history starts at the closing event of the previous task, so
        // the started event is not in the buffer. Its id comes from the
        // closing event and the clock from the closing event's timestamp.
        let (task_started_event_id, replay_current_time) = match task_started {
            Some(started) => started,
            None => {
                let closing_event = &events[events.len() - 1];
                let started_event_id = match &closing_event.attributes {
                    EventAttributes::DecisionTaskCompleted(attrs) => attrs.started_event_id,
                    EventAttributes::DecisionTaskFailed(attrs) => attrs.started_event_id,
                    EventAttributes::DecisionTaskTimedOut(attrs) => attrs.started_event_id,
                    _ => closing_event.event_id,
                };
                (started_event_id, closing_event.timestamp)
            }
        };

        let replay = !self.live_reached && task_started_event_id < self.started_event_id;
        if !replay {
            self.live_reached = true;
        }

        let markers = events
            .iter()
            .chain(decision_events.iter())
            .filter(|e| e.is_marker())
            .cloned()
            .collect();

        trace!(
            task_started_event_id,
            events = events.len(),
            decision_events = decision_events.len(),
            replay,
            "Produced decision events batch"
        );

        NextBatch::Ready(DecisionEvents {
            events,
            decision_events,
            markers,
            replay,
            replay_current_time,
            task_started_event_id,
            closing_event_type,
        })
    }
}

impl Iterator for DecisionEventsIterator {
    type Item = DecisionEvents;

    fn next(&mut self) -> Option<Self::Item> {
        match self.poll() {
            NextBatch::Ready(batch) => Some(batch),
            NextBatch::Incomplete | NextBatch::Exhausted => None,
        }
    }
}
