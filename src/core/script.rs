//! JSON-lines event scripts and the in-memory client they drive.
//!
//! Each line is either a feed event (`{"kind":"tick"}`) or a client setup
//! patch (`{"setup":{"playerName":"Zezima","varbits":{"4930":0}}}`).

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use super::client::{GameClient, ItemStack, NpcInfo, PlayerInfo, WorldPoint};
use super::error::{Error, Result};
use super::hub::NotifierHub;
use super::model::{GameEvent, LoginState, VarKind};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub name: String,
    pub price: i64,
}

/// Session state served by [`ScriptedClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub login_state: LoginState,
    pub player_name: Option<String>,
    pub location: WorldPoint,
    pub in_wilderness: bool,
    pub pvp_world: bool,
    pub skulled: bool,
    pub protect_item: bool,
    pub varbits: HashMap<i32, i32>,
    pub varps: HashMap<i32, i32>,
    pub items: Vec<ItemStack>,
    pub item_definitions: HashMap<i32, ItemDefinition>,
    pub players: Vec<PlayerInfo>,
    pub npcs: Vec<NpcInfo>,
}

/// Partial update of [`ClientState`]; absent fields are left untouched and
/// map entries are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientPatch {
    pub login_state: Option<LoginState>,
    pub player_name: Option<String>,
    pub location: Option<WorldPoint>,
    pub in_wilderness: Option<bool>,
    pub pvp_world: Option<bool>,
    pub skulled: Option<bool>,
    pub protect_item: Option<bool>,
    pub varbits: HashMap<i32, i32>,
    pub varps: HashMap<i32, i32>,
    pub items: Option<Vec<ItemStack>>,
    pub item_definitions: HashMap<i32, ItemDefinition>,
    pub players: Option<Vec<PlayerInfo>>,
    pub npcs: Option<Vec<NpcInfo>>,
}

impl ClientState {
    pub fn apply(&mut self, patch: ClientPatch) {
        if let Some(state) = patch.login_state {
            self.login_state = state;
        }
        if patch.player_name.is_some() {
            self.player_name = patch.player_name;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(flag) = patch.in_wilderness {
            self.in_wilderness = flag;
        }
        if let Some(flag) = patch.pvp_world {
            self.pvp_world = flag;
        }
        if let Some(flag) = patch.skulled {
            self.skulled = flag;
        }
        if let Some(flag) = patch.protect_item {
            self.protect_item = flag;
        }
        self.varbits.extend(patch.varbits);
        self.varps.extend(patch.varps);
        if let Some(items) = patch.items {
            self.items = items;
        }
        self.item_definitions.extend(patch.item_definitions);
        if let Some(players) = patch.players {
            self.players = players;
        }
        if let Some(npcs) = patch.npcs {
            self.npcs = npcs;
        }
    }
}

/// A [`GameClient`] backed by mutable in-memory state.
#[derive(Default)]
pub struct ScriptedClient {
    state: Mutex<ClientState>,
}

impl ScriptedClient {
    pub fn new(state: ClientState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn apply(&self, patch: ClientPatch) {
        self.lock().apply(patch);
    }

    pub fn set_varbit(&self, id: i32, value: i32) {
        self.lock().varbits.insert(id, value);
    }

    pub fn set_varp(&self, id: i32, value: i32) {
        self.lock().varps.insert(id, value);
    }

    /// Mirror an event's side effects into the served state, as the real
    /// client would have done before the event is observed.
    pub fn observe(&self, event: &GameEvent) {
        match event {
            GameEvent::VarChange {
                var_kind: VarKind::Varbit,
                id,
                value,
            } => self.set_varbit(*id, *value),
            GameEvent::VarChange {
                var_kind: VarKind::Varp,
                id,
                value,
            } => self.set_varp(*id, *value),
            GameEvent::LoginStateChanged { state } => self.lock().login_state = *state,
            _ => {}
        }
    }
}

impl GameClient for ScriptedClient {
    fn login_state(&self) -> LoginState {
        self.lock().login_state
    }

    fn player_name(&self) -> Option<String> {
        self.lock().player_name.clone()
    }

    fn player_location(&self) -> WorldPoint {
        self.lock().location
    }

    fn is_in_wilderness(&self) -> bool {
        self.lock().in_wilderness
    }

    fn is_pvp_world(&self) -> bool {
        self.lock().pvp_world
    }

    fn is_skulled(&self) -> bool {
        self.lock().skulled
    }

    fn is_protect_item_active(&self) -> bool {
        self.lock().protect_item
    }

    fn varbit_value(&self, id: i32) -> i32 {
        self.lock().varbits.get(&id).copied().unwrap_or(0)
    }

    fn varp_value(&self, id: i32) -> i32 {
        self.lock().varps.get(&id).copied().unwrap_or(0)
    }

    fn carried_items(&self) -> Vec<ItemStack> {
        self.lock().items.clone()
    }

    fn item_price(&self, id: i32) -> i64 {
        self.lock()
            .item_definitions
            .get(&id)
            .map(|d| d.price)
            .unwrap_or(0)
    }

    fn item_name(&self, id: i32) -> String {
        self.lock()
            .item_definitions
            .get(&id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("Item {}", id))
    }

    fn find_item_id(&self, name: &str) -> Option<i32> {
        self.lock()
            .item_definitions
            .iter()
            .filter(|(_, d)| d.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
            .min()
    }

    fn nearby_players(&self) -> Vec<PlayerInfo> {
        self.lock().players.clone()
    }

    fn nearby_npcs(&self) -> Vec<NpcInfo> {
        self.lock().npcs.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Setup { setup: ClientPatch },
    Event(GameEvent),
}

/// Feed every line of a script through the hub. Blank lines and lines
/// starting with `#` are skipped. Returns the number of events delivered.
pub fn run_script(
    reader: impl BufRead,
    client: &ScriptedClient,
    hub: &NotifierHub,
) -> Result<usize> {
    let mut delivered = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let step: ScriptStep = serde_json::from_str(trimmed).map_err(|source| Error::Script {
            line: index + 1,
            source,
        })?;

        match step {
            ScriptStep::Setup { setup } => client.apply(setup),
            ScriptStep::Event(event) => {
                client.observe(&event);
                hub.handle(&event);
                delivered += 1;
            }
        }
    }

    log::info!("Replayed {} events", delivered);
    Ok(delivered)
}
