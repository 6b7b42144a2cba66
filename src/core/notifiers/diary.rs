// Achievement diary correlation.
//
// Completions are reported twice: by a varbit rising and by a message box
// naming the tier and area. Progress is seeded from the client a few ticks
// after login, and a short cooldown after each notification swallows the
// second report of the same completion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use regex::Regex;

use super::{assembler, count_down, Notifier, NotifierContext};
use crate::core::diaries::{self, Diary, Difficulty, DIARIES};
use crate::core::model::{DiaryNotificationData, LoginState, NotificationExtra, NotificationType};

/// Ticks to wait after login before reading every diary varbit.
pub const INIT_DELAY_TICKS: i32 = 4;
/// Ticks after a notification during which further completions are dropped.
pub const COOLDOWN_TICKS: i32 = 2;

lazy_static! {
    static ref COMPLETION_REGEX: Regex = Regex::new(
        r"Congratulations! You have completed all of the (?P<difficulty>.+) tasks in the (?P<area>.+) area"
    )
    .expect("Invalid diary completion regex");
}

/// Difficulty and area text from a completion message box.
pub fn parse_completion(message: &str) -> Option<(String, String)> {
    let caps = COMPLETION_REGEX.captures(message)?;
    Some((
        caps["difficulty"].to_string(),
        caps["area"].trim().to_string(),
    ))
}

enum VarbitOutcome {
    Ignore,
    Reset,
    Completed(Diary),
}

pub struct DiaryNotifier {
    ctx: Arc<NotifierContext>,
    progress: Mutex<HashMap<i32, i32>>,
    init_delay: AtomicI32,
    cooldown: AtomicI32,
}

impl DiaryNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            progress: Mutex::new(HashMap::new()),
            init_delay: AtomicI32::new(0),
            cooldown: AtomicI32::new(0),
        }
    }

    fn progress(&self) -> MutexGuard<'_, HashMap<i32, i32>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracking(&self) -> bool {
        self.ctx.settings().enabled
    }

    pub fn on_login_state(&self, state: LoginState) {
        if state != LoginState::LoggedIn {
            self.reset();
        }
    }

    pub fn on_tick(&self) {
        if self.ctx.client().login_state() != LoginState::LoggedIn {
            return;
        }

        count_down(&self.cooldown);
        let ticks = count_down(&self.init_delay);
        if ticks > 0 {
            if ticks == 1 {
                self.seed_progress();
            }
        } else if self.progress().len() < DIARIES.len() && self.tracking() {
            self.init_delay.store(INIT_DELAY_TICKS, Ordering::Release);
        }
    }

    pub fn on_message_box(&self, message: &str) {
        if !self.enabled() {
            return;
        }
        let Some((difficulty_text, area)) = parse_completion(message) else {
            return;
        };
        let Some(difficulty) = Difficulty::from_name(&difficulty_text) else {
            log::warn!("Failed to match diary difficulty: {}", difficulty_text);
            return;
        };
        let Some((id, diary)) = diaries::find_by_area(&area, difficulty) else {
            log::warn!("Failed to match diary area: {}", area);
            return;
        };

        let completed_value = if diaries::is_complete(id, 1) { 1 } else { 2 };
        self.progress().insert(id, completed_value);
        if self.meets_difficulty(diary.difficulty) {
            self.handle(diary);
        }
    }

    pub fn on_varbit_changed(&self, id: i32, value: i32) {
        let Some(diary) = diaries::lookup(id) else {
            return;
        };
        if !self.tracking() {
            return;
        }

        let outcome = {
            let mut progress = self.progress();
            if progress.is_empty() {
                if self.ctx.client().login_state() == LoginState::LoggedIn
                    && diaries::is_complete(id, value)
                {
                    log::info!(
                        "Skipping {} {} diary completion that occurred before map initialization",
                        diary.difficulty,
                        diary.area
                    );
                }
                return;
            }

            match progress.get(&id).copied() {
                None => {
                    log::warn!(
                        "Resetting since {} {} diary was not initialized; received new value of {}",
                        diary.difficulty,
                        diary.area,
                        value
                    );
                    VarbitOutcome::Reset
                }
                Some(previous) if value < previous => {
                    log::info!(
                        "Resetting since {} {} diary lost progress from {}; received new value of {}",
                        diary.difficulty,
                        diary.area,
                        previous,
                        value
                    );
                    VarbitOutcome::Reset
                }
                Some(previous) if value > previous => {
                    progress.insert(id, value);
                    if diaries::is_complete(id, value) {
                        VarbitOutcome::Completed(diary)
                    } else {
                        log::info!(
                            "Skipping {} {} diary start (not a completion with value {})",
                            diary.difficulty,
                            diary.area,
                            value
                        );
                        VarbitOutcome::Ignore
                    }
                }
                Some(_) => VarbitOutcome::Ignore,
            }
        };

        match outcome {
            VarbitOutcome::Reset => self.reset(),
            VarbitOutcome::Completed(diary) => {
                if self.enabled() && self.meets_difficulty(diary.difficulty) {
                    self.handle(diary);
                } else {
                    log::debug!(
                        "Skipping {} {} diary due to low difficulty",
                        diary.difficulty,
                        diary.area
                    );
                }
            }
            VarbitOutcome::Ignore => {}
        }
    }

    fn meets_difficulty(&self, difficulty: Difficulty) -> bool {
        difficulty >= self.ctx.settings().diary.min_difficulty
    }

    fn total_completed(&self) -> usize {
        self.progress()
            .iter()
            .filter(|(id, value)| diaries::is_complete(**id, **value))
            .count()
    }

    fn seed_progress(&self) {
        if !self.tracking() {
            return;
        }
        let client = self.ctx.client();
        let seeded: Vec<(i32, i32)> = DIARIES
            .keys()
            .map(|&id| (id, client.varbit_value(id)))
            .filter(|&(_, value)| value >= 0)
            .collect();
        let size = {
            let mut progress = self.progress();
            progress.extend(seeded);
            progress.len()
        };
        log::debug!(
            "Finished initializing current diary completions: {} out of {}",
            self.total_completed(),
            size
        );
    }

    fn handle(&self, diary: Diary) {
        if self.cooldown.swap(COOLDOWN_TICKS, Ordering::AcqRel) > 0 {
            log::debug!(
                "Skipping diary completion during cooldown: {} {}",
                diary.difficulty,
                diary.area
            );
            return;
        }

        let settings = self.ctx.settings();
        let config = &settings.diary;
        let total = self.total_completed();
        let player = self.ctx.player_name();
        let difficulty = diary.difficulty.to_string();
        let total_text = total.to_string();

        let notification = assembler::assemble(
            NotificationType::AchievementDiary,
            &config.message,
            &[
                ("%USERNAME%", player.as_str()),
                ("%DIFFICULTY%", difficulty.as_str()),
                ("%AREA%", diary.area),
                ("%TOTAL%", total_text.as_str()),
            ],
            NotificationExtra::Diary(DiaryNotificationData {
                area: diary.area.to_string(),
                difficulty: diary.difficulty,
                total,
            }),
        )
        .with_player_name(player.clone());

        self.ctx.send(notification, config.send_image, &config.webhook);
    }
}

impl Notifier for DiaryNotifier {
    fn name(&self) -> &'static str {
        "diary"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        super::is_enabled(&settings, settings.diary.enabled)
    }

    fn reset(&self) {
        self.progress().clear();
        self.init_delay.store(0, Ordering::Release);
        self.cooldown.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DiaryConfig, Settings};
    use crate::core::testing::{harness, Harness, PLAYER_NAME};

    const KARAMJA_EASY: i32 = 3578;
    const ARDOUGNE_EASY: i32 = 4458;
    const ARDOUGNE_HARD: i32 = 4460;

    fn setup(configure: impl FnOnce(&mut DiaryConfig)) -> (Harness, DiaryNotifier) {
        let mut settings = Settings::default();
        settings.diary.enabled = true;
        configure(&mut settings.diary);
        let h = harness(settings);
        let notifier = DiaryNotifier::new(h.ctx.clone());
        (h, notifier)
    }

    /// Run the post-login ticks until progress is seeded.
    fn seed(notifier: &DiaryNotifier) {
        for _ in 0..=INIT_DELAY_TICKS {
            notifier.on_tick();
        }
        assert_eq!(notifier.progress().len(), DIARIES.len());
    }

    fn varbit(h: &Harness, notifier: &DiaryNotifier, id: i32, value: i32) {
        h.client.set_varbit(id, value);
        notifier.on_varbit_changed(id, value);
    }

    fn diary_extra(h: &Harness, index: usize) -> DiaryNotificationData {
        match &h.dispatcher.sent()[index].notification.extra {
            NotificationExtra::Diary(data) => data.clone(),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_parse_completion() {
        assert_eq!(
            parse_completion(
                "Congratulations! You have completed all of the hard tasks in the Ardougne area. Speak to Two-pints to claim your reward."
            ),
            Some(("hard".to_string(), "Ardougne".to_string()))
        );
        assert_eq!(parse_completion("Congratulations!"), None);
    }

    #[test]
    fn test_seeding_waits_for_init_delay() {
        let (h, notifier) = setup(|_| {});
        h.client.set_varbit(ARDOUGNE_EASY, 1);

        for _ in 0..INIT_DELAY_TICKS {
            notifier.on_tick();
        }
        assert!(notifier.progress().is_empty());

        notifier.on_tick();
        assert_eq!(notifier.progress().get(&ARDOUGNE_EASY), Some(&1));
        assert_eq!(notifier.total_completed(), 1);
    }

    #[test]
    fn test_scenario_karamja_three_state() {
        let (h, notifier) = setup(|c| c.min_difficulty = Difficulty::Easy);
        seed(&notifier);

        varbit(&h, &notifier, KARAMJA_EASY, 1);
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 0, "started is not completed");

        varbit(&h, &notifier, KARAMJA_EASY, 2);
        notifier.on_tick();
        assert_eq!(h.dispatcher.count(), 1);

        let data = diary_extra(&h, 0);
        assert_eq!(data.area, "Karamja");
        assert_eq!(data.difficulty, Difficulty::Easy);
        assert_eq!(data.total, 1);
        assert_eq!(
            h.dispatcher.sent()[0].notification.text,
            format!(
                "{} has completed the Easy Karamja Achievement Diary, for a total of 1 diaries completed",
                PLAYER_NAME
            )
        );
    }

    #[test]
    fn test_binary_diary_completes_on_one() {
        let (h, notifier) = setup(|_| {});
        seed(&notifier);

        varbit(&h, &notifier, ARDOUGNE_EASY, 1);
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[test]
    fn test_decrease_resets_everything() {
        let (h, notifier) = setup(|_| {});
        h.client.set_varbit(ARDOUGNE_EASY, 1);
        seed(&notifier);

        varbit(&h, &notifier, ARDOUGNE_EASY, 0);
        assert!(notifier.progress().is_empty());
        assert_eq!(h.dispatcher.count(), 0);

        // unseeded: completions are ignored until the map is rebuilt
        varbit(&h, &notifier, ARDOUGNE_HARD, 1);
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[test]
    fn test_ignored_before_seeding() {
        let (h, notifier) = setup(|_| {});
        varbit(&h, &notifier, ARDOUGNE_EASY, 1);
        assert_eq!(h.dispatcher.count(), 0);
        assert!(notifier.progress().is_empty());
    }

    #[test]
    fn test_min_difficulty() {
        let (h, notifier) = setup(|c| c.min_difficulty = Difficulty::Hard);
        seed(&notifier);

        varbit(&h, &notifier, ARDOUGNE_EASY, 1);
        assert_eq!(h.dispatcher.count(), 0);

        varbit(&h, &notifier, ARDOUGNE_HARD, 1);
        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(diary_extra(&h, 0).difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_cooldown_suppresses_corroborating_message() {
        let (h, notifier) = setup(|_| {});
        seed(&notifier);

        varbit(&h, &notifier, ARDOUGNE_HARD, 1);
        notifier.on_message_box(
            "Congratulations! You have completed all of the hard tasks in the Ardougne area.",
        );
        assert_eq!(h.dispatcher.count(), 1);

        notifier.on_tick();
        notifier.on_tick();
        varbit(&h, &notifier, ARDOUGNE_EASY, 1);
        assert_eq!(h.dispatcher.count(), 2);
    }

    #[test]
    fn test_message_box_first() {
        let (h, notifier) = setup(|_| {});
        seed(&notifier);

        notifier.on_message_box(
            "Congratulations! You have completed all of the easy tasks in the Karamja area.",
        );
        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(notifier.progress().get(&KARAMJA_EASY), Some(&2));

        // the varbit catches up on the same tick; value unchanged so nothing happens
        varbit(&h, &notifier, KARAMJA_EASY, 2);
        assert_eq!(h.dispatcher.count(), 1);
        assert_eq!(diary_extra(&h, 0).total, 1);
    }

    #[test]
    fn test_unknown_area_or_difficulty_dropped() {
        let (h, notifier) = setup(|_| {});
        seed(&notifier);

        notifier.on_message_box(
            "Congratulations! You have completed all of the legendary tasks in the Ardougne area.",
        );
        notifier.on_message_box(
            "Congratulations! You have completed all of the easy tasks in the Atlantis area.",
        );
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[test]
    fn test_logout_resets() {
        let (h, notifier) = setup(|_| {});
        seed(&notifier);

        h.client.with_state(|s| s.login_state = LoginState::LoginScreen);
        notifier.on_login_state(LoginState::LoginScreen);
        assert!(notifier.progress().is_empty());

        // no seeding while logged out
        notifier.on_tick();
        notifier.on_tick();
        assert_eq!(notifier.init_delay.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_globally_disabled_does_not_seed() {
        let (h, notifier) = setup(|_| {});
        let mut settings = (*h.ctx.settings()).clone();
        settings.enabled = false;
        h.ctx.update_settings(settings);

        for _ in 0..10 {
            notifier.on_tick();
        }
        assert!(notifier.progress().is_empty());
    }
}
