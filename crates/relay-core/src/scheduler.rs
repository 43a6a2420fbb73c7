//! Cron-driven trigger registry.
//!
//! The engine owns a set of triggers, each a parsed cron expression plus a
//! callback. While the engine is running every trigger has its own timer task
//! on the tokio runtime; when the task wakes at a matching time it hands the
//! callback to the blocking pool and goes back to sleep. Stopping the engine
//! aborts the timer tasks, so nothing fires until the next `start()`.
//!
//! ```text
//!   register(expr, cb) ──► Trigger { schedule, cb }
//!                               │  start()
//!                               ▼
//!                    timer task: sleep until next match
//!                               │
//!                               ▼
//!                    spawn_blocking(cb)   (fire-and-forget)
//! ```
//!
//! Expressions use standard 5-field cron syntax (`min hour dom month dow`,
//! Sunday = 0 or 7) at minute granularity, or 6/7-field syntax with a
//! leading seconds field (and optional trailing year) at second granularity.
//! Numeric days of the week mean the same in both forms. When both
//! day-of-month and day-of-week are restricted, a time matching either one
//! fires, as in standard cron.
//!
//! Timers re-read the wall clock every time they wake. If the clock jumped
//! forward past several matches the trigger fires once and the missed runs
//! are skipped; if it stepped back the timer sleeps again.

use crate::error::{RelayError, Result};
use chrono::{DateTime, Local, TimeZone};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Callback invoked each time a trigger fires.
pub type TriggerFn = Arc<dyn Fn() + Send + Sync>;

/// Wall-clock source for trigger timers.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// Identifies one registered trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(u64);

/// A parsed trigger expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    /// Matching times are the union of these schedules' matches.
    alternatives: Vec<cron::Schedule>,
}

impl CronSchedule {
    /// The first matching time strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.alternatives
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }
}

struct Trigger {
    expression: String,
    schedule: CronSchedule,
    callback: TriggerFn,
    timer: Option<JoinHandle<()>>,
}

pub struct ScheduleEngine {
    runtime: Handle,
    clock: Clock,
    triggers: Vec<Trigger>,
    state: EngineState,
    next_handle: u64,
}

impl ScheduleEngine {
    /// Create a stopped engine whose timers run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self::with_clock(runtime, Arc::new(Local::now))
    }

    /// Like [`ScheduleEngine::new`], reading wall-clock time from `clock`.
    pub fn with_clock(runtime: Handle, clock: Clock) -> Self {
        Self {
            runtime,
            clock,
            triggers: Vec::new(),
            state: EngineState::Stopped,
            next_handle: 0,
        }
    }

    /// Parse a cron expression into a schedule.
    pub fn parse(expression: &str) -> Result<CronSchedule> {
        let invalid = |reason: String| RelayError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        };
        let alternatives = normalize_expression(expression)
            .map_err(invalid)?
            .iter()
            .map(|normalized| {
                cron::Schedule::from_str(normalized).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CronSchedule { alternatives })
    }

    /// Add a trigger. If the engine is running the trigger is armed at once.
    pub fn register(&mut self, expression: &str, callback: TriggerFn) -> Result<TriggerHandle> {
        let schedule = Self::parse(expression)?;
        let handle = TriggerHandle(self.next_handle);
        self.next_handle += 1;

        let mut trigger = Trigger {
            expression: expression.to_string(),
            schedule,
            callback,
            timer: None,
        };
        if self.state == EngineState::Running {
            trigger.timer = Some(self.arm(&trigger));
        }
        tracing::debug!(expression, handle = handle.0, "trigger registered");
        self.triggers.push(trigger);
        Ok(handle)
    }

    /// Remove every trigger.
    pub fn clear(&mut self) {
        for trigger in self.triggers.drain(..) {
            if let Some(timer) = trigger.timer {
                timer.abort();
            }
        }
    }

    pub fn start(&mut self) {
        if self.state == EngineState::Running {
            return;
        }
        for idx in 0..self.triggers.len() {
            let timer = self.arm(&self.triggers[idx]);
            self.triggers[idx].timer = Some(timer);
        }
        self.state = EngineState::Running;
        tracing::info!(triggers = self.triggers.len(), "schedule engine started");
    }

    pub fn stop(&mut self) {
        for trigger in &mut self.triggers {
            if let Some(timer) = trigger.timer.take() {
                timer.abort();
            }
        }
        if self.state == EngineState::Running {
            tracing::info!("schedule engine stopped");
        }
        self.state = EngineState::Stopped;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Expressions of all registered triggers, in registration order.
    pub fn expressions(&self) -> Vec<String> {
        self.triggers.iter().map(|t| t.expression.clone()).collect()
    }

    fn arm(&self, trigger: &Trigger) -> JoinHandle<()> {
        let schedule = trigger.schedule.clone();
        let callback = trigger.callback.clone();
        let expression = trigger.expression.clone();
        let clock = self.clock.clone();
        self.runtime.spawn(async move {
            let mut after = clock();
            loop {
                let Some(next) = schedule.next_after(&after) else {
                    tracing::debug!(expression = %expression, "trigger has no further matches");
                    return;
                };

                let mut now = clock();
                while now < next {
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(wait).await;
                    now = clock();
                }
                if now - next > chrono::Duration::seconds(1) {
                    tracing::warn!(
                        expression = %expression,
                        due = %next,
                        %now,
                        "clock jumped ahead, skipping missed runs"
                    );
                }
                // Strictly after both: one fire per match, none for the gap.
                after = now.max(next);

                tracing::debug!(expression = %expression, at = %next, "trigger fired");
                let callback = callback.clone();
                tokio::task::spawn_blocking(move || callback());
            }
        })
    }
}

impl Drop for ScheduleEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Expression normalization
// ---------------------------------------------------------------------------

/// Rewrite an expression into the seconds-first form(s) the `cron` crate
/// parses, with numeric days of the week (0/7 = Sunday) turned into names.
///
/// `cron` requires day-of-month AND day-of-week to match, so when both are
/// restricted the expression is split in two, one per field, and the
/// resulting schedules are OR-ed.
fn normalize_expression(expression: &str) -> std::result::Result<Vec<String>, String> {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return Ok(vec![trimmed.to_string()]);
    }
    let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
    match fields.len() {
        5 => fields.insert(0, "0".to_string()),
        6 | 7 => {}
        n => return Err(format!("expected 5, 6 or 7 fields, found {n}")),
    }
    fields[5] = translate_day_of_week(&fields[5])?;

    let restricted = |field: &str| field != "*" && field != "?";
    if restricted(&fields[3]) && restricted(&fields[5]) {
        let mut by_day_of_month = fields.clone();
        by_day_of_month[5] = "*".to_string();
        let mut by_day_of_week = fields;
        by_day_of_week[3] = "*".to_string();
        Ok(vec![by_day_of_month.join(" "), by_day_of_week.join(" ")])
    } else {
        Ok(vec![fields.join(" ")])
    }
}

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn day_name(number: usize) -> &'static str {
    DAY_NAMES[number % 7]
}

fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut parts = Vec::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        let (start, end) = match base.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (base, None),
        };
        // Names, `*` and `?` read the same to both dialects.
        let Some(first) = day_number(start)? else {
            parts.push(item.to_string());
            continue;
        };
        let last = match end {
            Some(end) => day_number(end)?
                .ok_or_else(|| format!("day-of-week range '{base}' mixes numbers and names"))?,
            None if step.is_some() => 6,
            None => first,
        };

        match step {
            // Stepped ranges become explicit lists, so a range ending on
            // Sunday-as-7 needs no special casing.
            Some(step) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| format!("invalid day-of-week step '{step}'"))?;
                let mut days: Vec<&str> = Vec::new();
                for day in (first..=last).step_by(step).map(day_name) {
                    if !days.contains(&day) {
                        days.push(day);
                    }
                }
                if days.is_empty() {
                    return Err(format!("day-of-week range '{base}' is empty"));
                }
                parts.push(days.join(","));
            }
            None if end.is_none() => parts.push(day_name(first).to_string()),
            None => parts.push(translate_range(first, last)),
        }
    }
    Ok(parts.join(","))
}

fn translate_range(first: usize, last: usize) -> String {
    match (first, last) {
        (0, 7) => "Sun-Sat".to_string(),
        (7, 7) => "Sun".to_string(),
        // Sunday-as-7 cannot close a range that starts the week on Sunday.
        (first, 7) => format!("{}-Sat,Sun", day_name(first)),
        (first, last) => format!("{}-{}", day_name(first), day_name(last)),
    }
}

fn day_number(token: &str) -> std::result::Result<Option<usize>, String> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match token.parse::<usize>() {
        Ok(n) if n <= 7 => Ok(Some(n)),
        _ => Err(format!("day of week '{token}' out of range 0-7")),
    }
}
