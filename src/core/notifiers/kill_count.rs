// Kill count correlation.
//
// A boss kill is reported as two lines: "Your X kill count is: N" and a fight
// duration (optionally flagged as a personal best). They arrive in either
// order and possibly on different ticks. Both halves are merged into one
// pending record; the record is flushed at the end of the tick in which the
// boss name is known.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use super::assembler::{self, npc_image_url};
use super::{is_enabled, Notifier, NotifierContext, PendingSlot};
use crate::core::config::KillCountConfig;
use crate::core::model::{BossNotificationData, Embed, NotificationExtra, NotificationType};
use crate::core::time;

/// Varbit for the in-game "filter out boss kill-count with spam-filter" option.
pub const KILL_COUNT_SPAM_FILTER: i32 = 4930;
pub const SPAM_WARNING: &str = "Kill Count Notifier requires disabling the in-game setting: Filter out boss kill-count with spam-filter";

/// Ticks to hold a fight duration while waiting for the boss name. Not
/// applied the other way: a boss name is flushed without waiting for a
/// duration.
pub const MAX_BAD_TICKS: i32 = 10;

const PRECISE_TIMING_VARBIT: i32 = 11866;
const RAID_COMPLETE_PREFIX: &str = "Congratulations - your raid is complete!";

lazy_static! {
    static ref PRIMARY_REGEX: Regex = Regex::new(
        r"Your (?P<key>.+)\s(?P<type>kill|chest|completion)\s?count is: (?P<value>\d+)\b"
    )
    .expect("Invalid primary kill count regex");
    static ref SECONDARY_REGEX: Regex =
        Regex::new(r"Your (?:completed|subdued) (?P<key>.+) count is: (?P<value>\d+)\b")
            .expect("Invalid secondary kill count regex");
    static ref TIME_REGEX: Regex =
        Regex::new(r"(?i)(?:Duration|time|Subdued in):? (?P<time>[\d:]+(.\d+)?)\.?")
            .expect("Invalid fight duration regex");
}

/// Partially known kill. Every field may still be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBossRecord {
    pub boss: Option<String>,
    pub count: Option<i32>,
    pub game_message: Option<String>,
    pub time: Option<Duration>,
    pub personal_best: Option<bool>,
}

impl PendingBossRecord {
    /// Null-coalescing merge: keep every field already known, fill the gaps
    /// from `update`. Never turns a known field back into unknown.
    pub fn merge(&self, update: &PendingBossRecord) -> PendingBossRecord {
        PendingBossRecord {
            boss: self.boss.clone().or_else(|| update.boss.clone()),
            count: self.count.or(update.count),
            game_message: self
                .game_message
                .clone()
                .or_else(|| update.game_message.clone()),
            time: self.time.or(update.time),
            personal_best: self.personal_best.or(update.personal_best),
        }
    }

    fn is_empty(&self) -> bool {
        *self == PendingBossRecord::default()
    }
}

/// Classify one line of text into a partial kill record.
pub fn parse(message: &str) -> Option<PendingBossRecord> {
    if let Some((boss, count)) = parse_boss(message) {
        return Some(PendingBossRecord {
            boss: Some(boss),
            count: Some(count),
            game_message: Some(message.to_string()),
            ..PendingBossRecord::default()
        });
    }
    parse_time(message).map(|(time, personal_best)| PendingBossRecord {
        time: Some(time),
        personal_best: Some(personal_best),
        ..PendingBossRecord::default()
    })
}

fn parse_time(message: &str) -> Option<(Duration, bool)> {
    let caps = TIME_REGEX.captures(message)?;
    let token = caps.name("time")?.as_str();
    let Some(duration) = time::parse_time(token) else {
        log::debug!("Failed to parse fight duration [{}]", token);
        return None;
    };
    let personal_best = message.to_lowercase().contains("(new personal best)");
    Some((duration, personal_best))
}

/// Boss name and count from a kill count line. Names outside the known
/// chest/completion/raid forms are rejected.
pub fn parse_boss(message: &str) -> Option<(String, i32)> {
    if let Some(caps) = PRIMARY_REGEX.captures(message) {
        let boss = primary_boss(&caps["key"], &caps["type"]);
        return resolve(boss, &caps["value"]);
    }
    if let Some(caps) = SECONDARY_REGEX.captures(message) {
        let boss = secondary_boss(&caps["key"]);
        return resolve(boss, &caps["value"]);
    }
    None
}

fn resolve(boss: Option<String>, count: &str) -> Option<(String, i32)> {
    let boss = boss?;
    match count.parse::<i32>() {
        Ok(count) => Some((boss, count)),
        Err(e) => {
            log::debug!("Failed to parse kill count [{}] for boss [{}]: {}", count, boss, e);
            None
        }
    }
}

fn primary_boss(key: &str, kind: &str) -> Option<String> {
    match kind {
        "chest" if key.eq_ignore_ascii_case("Barrows") => Some(key.to_string()),
        "completion" if key.eq_ignore_ascii_case("Gauntlet") => {
            Some("Crystalline Hunllef".to_string())
        }
        "completion" if key.eq_ignore_ascii_case("Corrupted Gauntlet") => {
            Some("Corrupted Hunllef".to_string())
        }
        "kill" => Some(key.to_string()),
        _ => None,
    }
}

fn secondary_boss(key: &str) -> Option<String> {
    if key.eq_ignore_ascii_case("Wintertodt") {
        return Some(key.to_string());
    }

    // "Theatre of Blood: Hard Mode" keeps its mode suffix
    let raid = match key.rfind(':') {
        Some(idx) if idx > 0 => &key[..idx],
        _ => key,
    };
    let allowed = [
        "Theatre of Blood",
        "Tombs of Amascut",
        "Chambers of Xeric",
        "Chambers of Xeric Challenge Mode",
    ];
    allowed
        .iter()
        .any(|name| raid.eq_ignore_ascii_case(name))
        .then(|| key.to_string())
}

/// Interval gate: personal bests and first kills may bypass the interval.
pub fn should_notify(config: &KillCountConfig, count: i32, personal_best: Option<bool>) -> bool {
    if personal_best == Some(true) && config.notify_best_time {
        return true;
    }
    if count == 1 && config.notify_initial {
        return true;
    }
    config.interval <= 1 || count % config.interval == 0
}

pub struct KillCountNotifier {
    ctx: Arc<NotifierContext>,
    data: PendingSlot<PendingBossRecord>,
    bad_ticks: AtomicI32,
}

impl KillCountNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            data: PendingSlot::new(),
            bad_ticks: AtomicI32::new(0),
        }
    }

    /// Partial record still waiting for its other half.
    pub fn pending(&self) -> PendingBossRecord {
        self.data.get()
    }

    pub fn on_game_message(&self, message: &str) {
        if !self.enabled() {
            return;
        }
        if let Some(update) = parse(message) {
            self.data.update(|old| old.merge(&update));
        }
    }

    /// Chambers of Xeric reports its duration through the friends chat.
    pub fn on_friends_chat_notification(&self, message: &str) {
        if message.starts_with(RAID_COMPLETE_PREFIX) {
            self.on_game_message(message);
        }
    }

    pub fn on_varbit_changed(&self, id: i32, value: i32) {
        if id == KILL_COUNT_SPAM_FILTER && value == 1 && self.enabled() {
            log::warn!("{}", SPAM_WARNING);
        }
    }

    pub fn on_tick(&self) {
        if let Some(data) = self.data.take_if(|d| d.boss.is_some()) {
            // boss name known: notify at tick end even if the duration never arrives
            self.bad_ticks.store(0, Ordering::Release);
            self.handle_kill(&data);
        } else if !self.data.get().is_empty()
            && self.bad_ticks.fetch_add(1, Ordering::AcqRel) + 1 > MAX_BAD_TICKS
        {
            log::debug!("Discarding fight duration without a boss name");
            self.reset();
        }
    }

    fn handle_kill(&self, data: &PendingBossRecord) {
        let (Some(boss), Some(count)) = (data.boss.as_ref(), data.count) else {
            return;
        };

        let settings = self.ctx.settings();
        let config = &settings.kill_count;
        if !should_notify(config, count, data.personal_best) {
            log::debug!("Skipping {} kill {} outside notification interval", boss, count);
            return;
        }

        let is_pb = data.personal_best == Some(true);
        let player = self.ctx.player_name();
        let precise = self.ctx.client().varbit_value(PRECISE_TIMING_VARBIT) > 0;
        let time = time::format_time(data.time, precise);
        let count_text = count.to_string();
        let template = if is_pb {
            &config.best_time_message
        } else {
            &config.message
        };

        let extra = NotificationExtra::Boss(BossNotificationData {
            boss: boss.clone(),
            count,
            game_message: data.game_message.clone(),
            time: data.time,
            is_personal_best: data.personal_best,
        });
        let mut notification = assembler::assemble(
            NotificationType::KillCount,
            template,
            &[
                ("%USERNAME%", player.as_str()),
                ("%BOSS%", boss.as_str()),
                ("%COUNT%", count_text.as_str()),
                ("%TIME%", time.as_str()),
            ],
            extra,
        )
        .with_player_name(player.clone());

        let screenshot = config.send_image;
        if !screenshot {
            let embed = self
                .ctx
                .client()
                .nearby_npcs()
                .into_iter()
                .find(|npc| npc.name.eq_ignore_ascii_case(boss))
                .map(|npc| Embed::of_image(npc_image_url(npc.id)));
            notification = notification.with_embeds(embed.into_iter().collect());
        }

        self.ctx.send(notification, screenshot, &config.webhook);
    }
}

impl Notifier for KillCountNotifier {
    fn name(&self) -> &'static str {
        "kill_count"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        is_enabled(&settings, settings.kill_count.enabled)
    }

    fn reset(&self) {
        self.data.set(PendingBossRecord::default());
        self.bad_ticks.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::NpcInfo;
    use crate::core::config::Settings;
    use crate::core::testing::{harness, Harness, PLAYER_NAME, PRIMARY_WEBHOOK};

    fn setup(configure: impl FnOnce(&mut KillCountConfig)) -> (Harness, KillCountNotifier) {
        let mut settings = Settings::default();
        settings.kill_count.enabled = true;
        settings.kill_count.interval = 1;
        settings.kill_count.message = "%USERNAME% has defeated %BOSS% with a completion count of %COUNT%".to_string();
        settings.kill_count.best_time_message = "%USERNAME% has defeated %BOSS% with a new personal best time of %TIME% and a completion count of %COUNT%".to_string();
        configure(&mut settings.kill_count);
        let h = harness(settings);
        let notifier = KillCountNotifier::new(h.ctx.clone());
        (h, notifier)
    }

    fn boss_extra(h: &Harness, index: usize) -> BossNotificationData {
        match &h.dispatcher.sent()[index].notification.extra {
            NotificationExtra::Boss(data) => data.clone(),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_primary_kill() {
        assert_eq!(
            parse_boss("Your Zulrah kill count is: 5"),
            Some(("Zulrah".to_string(), 5))
        );
    }

    #[test]
    fn test_parse_chest_and_completion_aliases() {
        assert_eq!(
            parse_boss("Your Barrows chest count is: 42."),
            Some(("Barrows".to_string(), 42))
        );
        assert_eq!(
            parse_boss("Your Gauntlet completion count is: 3."),
            Some(("Crystalline Hunllef".to_string(), 3))
        );
        assert_eq!(
            parse_boss("Your Corrupted Gauntlet completion count is: 7."),
            Some(("Corrupted Hunllef".to_string(), 7))
        );
        assert_eq!(parse_boss("Your Sandstone chest count is: 1."), None);
    }

    #[test]
    fn test_parse_secondary_allow_list() {
        assert_eq!(
            parse_boss("Your completed Theatre of Blood: Hard Mode count is: 12."),
            Some(("Theatre of Blood: Hard Mode".to_string(), 12))
        );
        assert_eq!(
            parse_boss("Your subdued Wintertodt count is: 300."),
            Some(("Wintertodt".to_string(), 300))
        );
        assert_eq!(
            parse_boss("Your completed Chambers of Xeric Challenge Mode count is: 2."),
            Some(("Chambers of Xeric Challenge Mode".to_string(), 2))
        );
        assert_eq!(parse_boss("Your completed Fight Caves count is: 2."), None);
    }

    #[test]
    fn test_parse_count_overflow_is_dropped() {
        assert_eq!(parse_boss("Your Zulrah kill count is: 99999999999"), None);
        assert_eq!(parse("Your Zulrah kill count is: 99999999999"), None);
    }

    #[test]
    fn test_parse_duration_and_pb() {
        let record = parse("Fight duration: 1:23.40 (new personal best)").unwrap();
        assert_eq!(record.time, Some(Duration::from_millis(83_400)));
        assert_eq!(record.personal_best, Some(true));
        assert!(record.boss.is_none());

        let record = parse("Duration: 1:23.40").unwrap();
        assert_eq!(record.personal_best, Some(false));
    }

    #[test]
    fn test_merge_never_regresses() {
        let boss = parse("Your Zulrah kill count is: 5").unwrap();
        let time = parse("Duration: 1:23.40").unwrap();
        let forward = boss.merge(&time);
        let backward = time.merge(&boss);
        assert_eq!(forward, backward);
        assert_eq!(forward.merge(&PendingBossRecord::default()), forward);
    }

    #[test]
    fn test_interval_gate() {
        let mut config = KillCountConfig::default();
        config.interval = 10;
        config.notify_initial = false;
        config.notify_best_time = false;
        assert!(should_notify(&config, 20, None));
        assert!(!should_notify(&config, 21, None));
        assert!(!should_notify(&config, 1, None));
        assert!(!should_notify(&config, 21, Some(true)));

        config.notify_initial = true;
        config.notify_best_time = true;
        assert!(should_notify(&config, 1, None));
        assert!(should_notify(&config, 21, Some(true)));

        config.interval = 0;
        assert!(should_notify(&config, 21, None));
    }

    #[test]
    fn test_scenario_boss_then_duration() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_game_message("Duration: 1:23.40");
        notifier.on_tick();

        assert_eq!(h.dispatcher.count(), 1);
        let sent = &h.dispatcher.sent()[0];
        assert_eq!(sent.destination, PRIMARY_WEBHOOK);
        assert_eq!(
            sent.notification.text,
            format!("{} has defeated Zulrah with a completion count of 5", PLAYER_NAME)
        );
        let data = boss_extra(&h, 0);
        assert_eq!(data.boss, "Zulrah");
        assert_eq!(data.count, 5);
        assert_eq!(data.time, Some(Duration::from_millis(83_400)));
        assert_eq!(data.is_personal_best, Some(false));
    }

    #[test]
    fn test_duration_first_then_boss_next_tick() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Challenge duration: 1:23.40 (new personal best)");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0);

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();

        assert_eq!(h.dispatcher.count(), 1);
        let data = boss_extra(&h, 0);
        assert_eq!(data.boss, "Zulrah");
        assert_eq!(data.is_personal_best, Some(true));
        assert!(h.dispatcher.sent()[0]
            .notification
            .text
            .contains("new personal best time of 1:23"));
    }

    #[test]
    fn test_boss_without_duration_flushes_same_tick() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Your Vorkath kill count is: 100");
        notifier.on_tick();

        assert_eq!(h.dispatcher.count(), 1);
        let data = boss_extra(&h, 0);
        assert_eq!(data.time, None);
        assert_eq!(data.is_personal_best, None);

        // nothing left over for later ticks
        notifier.on_game_message("Duration: 2:00");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[test]
    fn test_duration_abandoned_after_max_bad_ticks() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Duration: 1:23.40");
        for _ in 0..=MAX_BAD_TICKS {
            notifier.on_tick();
        }
        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();

        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(boss_extra(&h, 0).time, None, "stale duration must not leak");
    }

    #[test]
    fn test_duration_on_next_tick_is_not_joined() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(boss_extra(&h, 0).time, None);

        notifier.on_game_message("Duration: 1:23.40");
        let pending = notifier.pending();
        assert!(pending.boss.is_none());
        assert_eq!(pending.time, Some(Duration::from_millis(83_400)));

        for _ in 0..MAX_BAD_TICKS {
            notifier.on_tick();
        }
        assert!(!notifier.pending().is_empty());
        notifier.on_tick();
        assert!(notifier.pending().is_empty());
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[test]
    fn test_oversized_duration_is_ignored() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Duration: 99999999999999999");
        notifier.on_game_message("Duration: 1:1:1:1:1:1:1:1:1:1:1:1:1");
        assert!(notifier.pending().is_empty());

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();
        assert_eq!(boss_extra(&h, 0).time, None);
    }

    #[test]
    fn test_duration_within_budget_is_kept() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Duration: 1:23.40");
        for _ in 0..MAX_BAD_TICKS {
            notifier.on_tick();
        }
        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();

        assert_eq!(boss_extra(&h, 0).time, Some(Duration::from_millis(83_400)));
    }

    #[test]
    fn test_interval_suppresses() {
        let (h, notifier) = setup(|c| {
            c.interval = 10;
            c.notify_initial = false;
        });

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0);

        notifier.on_game_message("Your Zulrah kill count is: 10");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[test]
    fn test_raid_duration_from_friends_chat() {
        let (h, notifier) = setup(|_| {});

        notifier.on_friends_chat_notification(
            "Congratulations - your raid is complete! Team size: Solo Duration: 28:14 (new personal best)",
        );
        notifier.on_friends_chat_notification("Duration: 1:00");
        notifier.on_game_message("Your completed Chambers of Xeric count is: 57.");
        notifier.on_tick();

        let data = boss_extra(&h, 0);
        assert_eq!(data.boss, "Chambers of Xeric");
        assert_eq!(data.time, Some(Duration::from_secs(28 * 60 + 14)));
        assert_eq!(data.is_personal_best, Some(true));
    }

    #[test]
    fn test_npc_embed_when_not_screenshotting() {
        let (h, notifier) = setup(|c| c.send_image = false);
        h.client.with_state(|s| {
            s.npcs.push(NpcInfo {
                id: 2042,
                name: "Zulrah".to_string(),
                combat_level: 725,
                is_dead: true,
                attackable: true,
                interacting_with_local: false,
            });
        });

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();

        let sent = &h.dispatcher.sent()[0];
        assert!(!sent.screenshot);
        assert_eq!(
            sent.notification.embeds,
            vec![Embed::of_image(npc_image_url(2042))]
        );
    }

    #[test]
    fn test_disabled_ignores_text() {
        let (h, notifier) = setup(|c| c.enabled = false);

        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[test]
    fn test_reset_between_halves_drops_pending() {
        let (h, notifier) = setup(|_| {});

        notifier.on_game_message("Duration: 1:23.40");
        notifier.reset();
        notifier.on_game_message("Your Zulrah kill count is: 5");
        notifier.on_tick();

        assert_eq!(boss_extra(&h, 0).time, None);
    }
}
