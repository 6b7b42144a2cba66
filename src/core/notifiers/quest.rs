// Quest completion. The completion interface opens before the client has
// applied the new quest counters, so the notification waits one tick.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::{assembler, is_enabled, Notifier, NotifierContext, PendingSlot};
use crate::core::model::{NotificationExtra, NotificationType, QuestNotificationData};

pub const COMPLETED_VARBIT: i32 = 6347;
pub const TOTAL_VARBIT: i32 = 11877;
pub const QP_TOTAL_VARBIT: i32 = 1782;
pub const QUEST_POINTS_VARP: i32 = 101;

lazy_static! {
    static ref TITLE_REGEX: Regex = Regex::new(
        r"^You have (?:completed|achieved) (?:the )?(?P<quest>.+?)(?: [Qq]uest)?[!.]?$"
    )
    .expect("Invalid quest title regex");
}

/// Quest name from the completion interface title.
pub fn parse_quest_title(title: &str) -> Option<String> {
    let caps = TITLE_REGEX.captures(title.trim())?;
    let quest = caps["quest"].trim();
    (!quest.is_empty()).then(|| quest.to_string())
}

fn valid_pair(value: i32, total: i32) -> (Option<i32>, Option<i32>) {
    if value > 0 && total > 0 {
        (Some(value), Some(total))
    } else {
        (None, None)
    }
}

pub struct QuestNotifier {
    ctx: Arc<NotifierContext>,
    deferred: PendingSlot<Vec<String>>,
}

impl QuestNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            deferred: PendingSlot::new(),
        }
    }

    pub fn on_quest_completed(&self, title: &str) {
        if !self.enabled() {
            return;
        }
        let title = title.to_string();
        self.deferred.update(|queue| {
            let mut next = queue.clone();
            next.push(title.clone());
            next
        });
    }

    pub fn on_tick(&self) {
        for title in self.deferred.take() {
            self.handle(&title);
        }
    }

    fn handle(&self, title: &str) {
        let Some(quest) = parse_quest_title(title) else {
            log::debug!("Could not parse quest name from {:?}", title);
            return;
        };

        let client = self.ctx.client();
        let (completed_quests, total_quests) = valid_pair(
            client.varbit_value(COMPLETED_VARBIT),
            client.varbit_value(TOTAL_VARBIT),
        );
        let (quest_points, total_quest_points) = valid_pair(
            client.varp_value(QUEST_POINTS_VARP),
            client.varbit_value(QP_TOTAL_VARBIT),
        );

        let settings = self.ctx.settings();
        let config = &settings.quest;
        let player = self.ctx.player_name();
        let notification = assembler::assemble(
            NotificationType::Quest,
            &config.message,
            &[("%USERNAME%", player.as_str()), ("%QUEST%", quest.as_str())],
            NotificationExtra::Quest(QuestNotificationData {
                quest_name: quest.clone(),
                completed_quests,
                total_quests,
                quest_points,
                total_quest_points,
            }),
        )
        .with_player_name(player.clone());

        self.ctx.send(notification, config.send_image, &config.webhook);
    }
}

impl Notifier for QuestNotifier {
    fn name(&self) -> &'static str {
        "quest"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        is_enabled(&settings, settings.quest.enabled)
    }

    fn reset(&self) {
        self.deferred.set(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::core::testing::{harness, Harness, PLAYER_NAME};

    fn setup() -> (Harness, QuestNotifier) {
        let mut settings = Settings::default();
        settings.quest.enabled = true;
        let h = harness(settings);
        let notifier = QuestNotifier::new(h.ctx.clone());
        (h, notifier)
    }

    fn quest_extra(h: &Harness) -> QuestNotificationData {
        match &h.dispatcher.sent()[0].notification.extra {
            NotificationExtra::Quest(data) => data.clone(),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_quest_title() {
        assert_eq!(
            parse_quest_title("You have completed Dragon Slayer I!").as_deref(),
            Some("Dragon Slayer I")
        );
        assert_eq!(
            parse_quest_title("You have completed the Restless Ghost Quest!").as_deref(),
            Some("Restless Ghost")
        );
        assert_eq!(
            parse_quest_title("You have achieved Alfred Grimhand's Barcrawl!").as_deref(),
            Some("Alfred Grimhand's Barcrawl")
        );
        assert_eq!(parse_quest_title("Well done!"), None);
    }

    #[test]
    fn test_waits_one_tick_for_counters() {
        let (h, notifier) = setup();
        notifier.on_quest_completed("You have completed Dragon Slayer I!");
        assert_eq!(h.dispatcher.count(), 0);

        h.client.set_varbit(COMPLETED_VARBIT, 120);
        h.client.set_varbit(TOTAL_VARBIT, 156);
        h.client.set_varp(QUEST_POINTS_VARP, 250);
        h.client.set_varbit(QP_TOTAL_VARBIT, 300);
        notifier.on_tick();

        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(
            h.dispatcher.sent()[0].notification.text,
            format!("{} has completed a quest: Dragon Slayer I", PLAYER_NAME)
        );
        let data = quest_extra(&h);
        assert_eq!(data.completed_quests, Some(120));
        assert_eq!(data.total_quests, Some(156));
        assert_eq!(data.quest_points, Some(250));
        assert_eq!(data.total_quest_points, Some(300));
    }

    #[test]
    fn test_missing_counters_are_unknown() {
        let (h, notifier) = setup();
        h.client.set_varbit(COMPLETED_VARBIT, 120);
        notifier.on_quest_completed("You have completed Dragon Slayer I!");
        notifier.on_tick();

        let data = quest_extra(&h);
        assert_eq!(data.completed_quests, None);
        assert_eq!(data.total_quests, None);
        assert_eq!(data.quest_points, None);
    }

    #[test]
    fn test_unparseable_title_dropped() {
        let (h, notifier) = setup();
        notifier.on_quest_completed("Well done!");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[test]
    fn test_reset_drops_deferred() {
        let (h, notifier) = setup();
        notifier.on_quest_completed("You have completed Dragon Slayer I!");
        notifier.reset();
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0);
    }
}
