// Slayer task correlation.
//
// A task turn-in is spread over up to three chat lines: an optional boss
// task line, the "You have completed your task!" line and the points line.
// The label accretes until the points line completes it.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::{assembler, is_enabled, Notifier, NotifierContext, PendingSlot};
use crate::core::model::{NotificationExtra, NotificationType, SlayerNotificationData};

/// Ticks a partial task may stay pending before it is discarded.
pub const MAX_BAD_TICKS: i32 = 1;

lazy_static! {
    static ref BOSS_REGEX: Regex = Regex::new(
        r"You are granted .+ Slayer XP for completing your boss task against(?: the)? (?P<name>.+)\.$"
    )
    .expect("Invalid slayer boss regex");
    static ref TASK_REGEX: Regex =
        Regex::new(r"You have completed your task! You killed (?P<task>[\d,]+ [^.]+)\..*")
            .expect("Invalid slayer task regex");
    static ref COMPLETE_REGEX: Regex = Regex::new(
        r"You've completed (?:at least )?(?P<taskCount>[\d,]+) (?:Wilderness )?tasks?(?: and received (?P<points>[\d,]+) points, giving you a total of [\d,]+|\.You'll be eligible to earn reward points if you complete tasks from a more advanced Slayer Master\.| and reached the maximum amount of Slayer points \((?P<points2>[\d,]+)\))?"
    )
    .expect("Invalid slayer completion regex");
}

/// One classified slayer chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlayerLine {
    Boss(String),
    Task(String),
    Completed { task_count: String, points: String },
}

pub fn parse_boss(message: &str) -> Option<SlayerLine> {
    let caps = BOSS_REGEX.captures(message)?;
    let name = &caps["name"];
    let name = name.strip_suffix(" boss").unwrap_or(name);
    Some(SlayerLine::Boss(name.to_string()))
}

pub fn parse_task(message: &str) -> Option<SlayerLine> {
    TASK_REGEX
        .captures(message)
        .map(|caps| SlayerLine::Task(caps["task"].to_string()))
}

/// Points fall back to the maximum-points form, then to "0" when the
/// master awards none.
pub fn parse_completed(message: &str) -> Option<SlayerLine> {
    let caps = COMPLETE_REGEX.captures(message)?;
    let points = caps
        .name("points")
        .or_else(|| caps.name("points2"))
        .map_or("0", |m| m.as_str());
    Some(SlayerLine::Completed {
        task_count: caps["taskCount"].to_string(),
        points: points.to_string(),
    })
}

/// Prefix a boss label with the kill count from the task line:
/// "3 Kraken" onto "Kraken" gives "3 Kraken".
fn splice(old: &str, task: &str) -> String {
    if old.is_empty() {
        return task.to_string();
    }
    let count = task.split(' ').next().unwrap_or(task);
    format!("{} {}", count, old)
}

pub struct SlayerNotifier {
    ctx: Arc<NotifierContext>,
    task: PendingSlot<String>,
    bad_ticks: AtomicI32,
}

impl SlayerNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            task: PendingSlot::new(),
            bad_ticks: AtomicI32::new(0),
        }
    }

    pub fn pending_task(&self) -> String {
        self.task.get()
    }

    pub fn on_chat_message(&self, message: &str) {
        if !self.enabled() {
            return;
        }

        if let Some(SlayerLine::Boss(name)) = parse_boss(message) {
            // only the first label of a turn-in is kept
            self.task.update(|old| {
                if old.is_empty() {
                    name.clone()
                } else {
                    old.clone()
                }
            });
            return;
        }

        if let Some(SlayerLine::Task(task)) = parse_task(message) {
            self.task.update(|old| splice(old, &task));
            return;
        }

        if self.task.get().is_empty() {
            return;
        }

        if let Some(SlayerLine::Completed { task_count, points }) = parse_completed(message) {
            self.handle(&points, &task_count);
        }
    }

    pub fn on_tick(&self) {
        if !self.task.get().is_empty() {
            self.bad_ticks.fetch_add(1, Ordering::AcqRel);
        }
        if self.bad_ticks.load(Ordering::Acquire) > MAX_BAD_TICKS {
            log::debug!("Discarding partial slayer task {:?}", self.task.get());
            self.reset();
        }
    }

    fn handle(&self, points: &str, task_count: &str) {
        let task = self.task.take();
        self.bad_ticks.store(0, Ordering::Release);
        if task.is_empty() || points.is_empty() || task_count.is_empty() {
            return;
        }

        let settings = self.ctx.settings();
        let config = &settings.slayer;
        if config.point_threshold > 0 {
            match points.replace(',', "").parse::<i32>() {
                Ok(value) if value >= config.point_threshold => {}
                Ok(value) => {
                    log::debug!(
                        "Skipping slayer task with {} points below threshold {}",
                        value,
                        config.point_threshold
                    );
                    return;
                }
                Err(e) => {
                    log::debug!("Failed to parse slayer points [{}]: {}", points, e);
                    return;
                }
            }
        }

        let player = self.ctx.player_name();
        let notification = assembler::assemble(
            NotificationType::Slayer,
            &config.message,
            &[
                ("%USERNAME%", player.as_str()),
                ("%TASK%", task.as_str()),
                ("%TASKCOUNT%", task_count),
                ("%POINTS%", points),
            ],
            NotificationExtra::Slayer(SlayerNotificationData {
                slayer_task: task.clone(),
                slayer_completed: task_count.to_string(),
                slayer_points: points.to_string(),
            }),
        )
        .with_player_name(player.clone());

        self.ctx.send(notification, config.send_image, &config.webhook);
    }
}

impl Notifier for SlayerNotifier {
    fn name(&self) -> &'static str {
        "slayer"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        is_enabled(&settings, settings.slayer.enabled)
    }

    fn reset(&self) {
        self.task.set(String::new());
        self.bad_ticks.store(0, Ordering::Release);
    }
}
