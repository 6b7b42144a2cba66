// Read-only view of the game session the notifiers consult while correlating.

use serde::{Deserialize, Serialize};

use super::model::LoginState;

/// A tile in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

impl WorldPoint {
    pub fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// 64x64 map region containing this tile.
    pub fn region_id(&self) -> i32 {
        ((self.x >> 6) << 8) | (self.y >> 6)
    }
}

/// An item stack carried by the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub id: i32,
    pub quantity: i32,
}

/// Another player currently loaded near the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub name: String,
    pub combat_level: i32,
    pub interacting_with_local: bool,
}

/// An NPC currently loaded near the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcInfo {
    pub id: i32,
    pub name: String,
    pub combat_level: i32,
    pub is_dead: bool,
    /// Offers an "Attack" option and is not a follower.
    pub attackable: bool,
    pub interacting_with_local: bool,
}

/// Identity/session provider. Implementations must be cheap to query; the
/// notifiers call into them from inside event handlers.
pub trait GameClient: Send + Sync {
    fn login_state(&self) -> LoginState;
    fn player_name(&self) -> Option<String>;
    fn player_location(&self) -> WorldPoint;
    fn is_in_wilderness(&self) -> bool;
    fn is_pvp_world(&self) -> bool;
    fn is_skulled(&self) -> bool;
    fn is_protect_item_active(&self) -> bool;

    fn varbit_value(&self, id: i32) -> i32;
    fn varp_value(&self, id: i32) -> i32;

    /// Inventory and worn equipment.
    fn carried_items(&self) -> Vec<ItemStack>;
    fn item_price(&self, id: i32) -> i64;
    fn item_name(&self, id: i32) -> String;
    fn find_item_id(&self, name: &str) -> Option<i32>;

    fn nearby_players(&self) -> Vec<PlayerInfo>;
    fn nearby_npcs(&self) -> Vec<NpcInfo>;
}
