use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::diaries::Difficulty;
use super::error::Result;

/// Notifier settings, persisted in settings.json.
/// Values are supplied by the host; the notifiers only read them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Master switch applied on top of every per-notifier flag.
    pub enabled: bool,
    /// Destination used when a notifier has no webhook override.
    pub primary_webhook: String,
    pub kill_count: KillCountConfig,
    pub diary: DiaryConfig,
    pub collection: CollectionConfig,
    pub slayer: SlayerConfig,
    pub quest: QuestConfig,
    pub death: DeathConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_webhook: String::new(),
            kill_count: KillCountConfig::default(),
            diary: DiaryConfig::default(),
            collection: CollectionConfig::default(),
            slayer: SlayerConfig::default(),
            quest: QuestConfig::default(),
            death: DeathConfig::default(),
        }
    }
}

impl Settings {
    /// Pick the per-notifier webhook, falling back to the primary one.
    pub fn destination(&self, override_url: &str) -> String {
        if override_url.trim().is_empty() {
            self.primary_webhook.clone()
        } else {
            override_url.to_string()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KillCountConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    /// Notify every n-th kill; values <= 1 notify on every kill.
    pub interval: i32,
    pub notify_initial: bool,
    pub notify_best_time: bool,
    pub message: String,
    pub best_time_message: String,
}

impl Default for KillCountConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            interval: 1,
            notify_initial: true,
            notify_best_time: true,
            message: "%USERNAME% has defeated %BOSS% with a completion count of %COUNT%"
                .to_string(),
            best_time_message: "%USERNAME% has defeated %BOSS% with a new personal best time of %TIME% and a completion count of %COUNT%".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DiaryConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    pub min_difficulty: Difficulty,
    pub message: String,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            min_difficulty: Difficulty::Easy,
            message: "%USERNAME% has completed the %DIFFICULTY% %AREA% Achievement Diary, for a total of %TOTAL% diaries completed".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    pub message: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            message: "%USERNAME% has added %ITEM% to their collection".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SlayerConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    /// Minimum points for a notification; values <= 0 always notify.
    pub point_threshold: i32,
    pub message: String,
}

impl Default for SlayerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            point_threshold: 0,
            message: "%USERNAME% has completed a slayer task: %TASK%, getting %POINTS% points and making that %TASKCOUNT% tasks completed".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QuestConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    pub message: String,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            message: "%USERNAME% has completed a quest: %QUEST%".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeathConfig {
    pub enabled: bool,
    pub webhook: String,
    pub send_image: bool,
    /// Deaths outside safe zones losing less than this are skipped.
    pub min_value: i64,
    pub ignore_safe: bool,
    pub embed_kept_items: bool,
    pub pvp_enabled: bool,
    pub message: String,
    pub pvp_message: String,
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: String::new(),
            send_image: true,
            min_value: 0,
            ignore_safe: true,
            embed_kept_items: true,
            pvp_enabled: true,
            message: "%USERNAME% has died...".to_string(),
            pvp_message: "%USERNAME% has been PKed by %PKER% for %VALUELOST% gp".to_string(),
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("settings.json"),
        }
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load(&self) -> Settings {
        if !self.config_path.exists() {
            return Settings::default();
        }
        match self.try_load() {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable settings at {:?}: {}",
                    self.config_path,
                    e
                );
                Settings::default()
            }
        }
    }

    pub fn try_load(&self) -> Result<Settings> {
        let content = fs::read_to_string(&self.config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }
}
