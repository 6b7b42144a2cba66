// Event feed and notification types shared by every notifier.
//
// Feed types derive Deserialize so the replay script can carry them directly.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::diaries::Difficulty;
use super::time;

/// Classification of a line of game text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextCategory {
    GameMessage,
    MessageBox,
    FriendsChatNotification,
    ClanMessage,
}

/// The two flavors of server-synchronized keyed integer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VarKind {
    Varbit,
    Varp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LoginState {
    #[default]
    LoginScreen,
    Loading,
    LoggedIn,
    Hopping,
    ConnectionLost,
}

/// An actor referenced by death and interaction events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Actor {
    LocalPlayer,
    Player { name: String },
    Npc { id: i32, name: String },
}

/// Everything the event feed can deliver to the notifier layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GameEvent {
    /// Fixed-cadence pulse (~0.6s). All text and variable events of a cycle
    /// are delivered before the cycle's tick.
    Tick,
    Text {
        category: TextCategory,
        text: String,
    },
    VarChange {
        #[serde(rename = "var")]
        var_kind: VarKind,
        id: i32,
        value: i32,
    },
    LoginStateChanged {
        state: LoginState,
    },
    UsernameChanged,
    /// The quest completion interface opened with the given title text.
    QuestCompleted {
        title: String,
    },
    ActorDeath {
        actor: Actor,
    },
    InteractingChanged {
        source: Actor,
        target: Option<Actor>,
    },
}

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]*>").expect("Invalid tag regex");
}

/// Strip markup tags, collapse non-breaking spaces and trim, the way chat
/// lines are normalized before classification.
pub fn normalize_text(raw: &str) -> String {
    let with_breaks = raw.replace("<br>", "\n");
    TAG_REGEX
        .replace_all(&with_breaks, "")
        .replace('\u{00A0}', " ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Death,
    /// Produced by loot tracking outside this layer; listed so downstream
    /// consumers share one type vocabulary.
    Loot,
    Collection,
    Quest,
    KillCount,
    Slayer,
    AchievementDiary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embed {
    pub image_url: String,
}

impl Embed {
    pub fn of_image(url: impl Into<String>) -> Self {
        Self {
            image_url: url.into(),
        }
    }
}

/// A fully assembled notification, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub extra: NotificationExtra,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

/// Structured payload, one variant per notification type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NotificationExtra {
    Boss(BossNotificationData),
    Diary(DiaryNotificationData),
    Collection(CollectionNotificationData),
    Slayer(SlayerNotificationData),
    Quest(QuestNotificationData),
    Death(DeathNotificationData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BossNotificationData {
    pub boss: String,
    pub count: i32,
    pub game_message: Option<String>,
    #[serde(serialize_with = "time::serialize_iso_opt")]
    pub time: Option<Duration>,
    pub is_personal_best: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryNotificationData {
    pub area: String,
    pub difficulty: Difficulty,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionNotificationData {
    pub item_name: String,
    pub item_id: Option<i32>,
    pub price: Option<i64>,
    pub completed_entries: Option<i32>,
    pub total_entries: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlayerNotificationData {
    pub slayer_task: String,
    pub slayer_completed: String,
    pub slayer_points: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestNotificationData {
    pub quest_name: String,
    pub completed_quests: Option<i32>,
    pub total_quests: Option<i32>,
    pub quest_points: Option<i32>,
    pub total_quest_points: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathNotificationData {
    pub value_lost: i64,
    pub is_pvp: bool,
    pub pker: Option<String>,
    pub killer_name: Option<String>,
    pub killer_npc_id: Option<i32>,
    pub kept_items: Vec<SerializedItemStack>,
    pub lost_items: Vec<SerializedItemStack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedItemStack {
    pub id: i32,
    pub quantity: i32,
    pub price_each: i64,
    pub name: String,
}

impl SerializedItemStack {
    pub fn total_price(&self) -> i64 {
        self.price_each * i64::from(self.quantity)
    }
}
