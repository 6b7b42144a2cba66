// Death and PK attribution for the local player.

use std::sync::Arc;

use super::assembler::{self, item_image_url};
use super::{is_enabled, Notifier, NotifierContext, PendingSlot};
use crate::core::client::{GameClient, WorldPoint};
use crate::core::model::{
    Actor, DeathNotificationData, Embed, NotificationExtra, NotificationType, SerializedItemStack,
};

/// Item slots kept on an unskulled death.
pub const BASE_KEPT_SLOTS: usize = 3;

/// Map regions where dying costs nothing.
const SAFE_REGIONS: &[(i32, &str)] = &[
    (9520, "Castle Wars"),
    (9620, "Castle Wars"),
    (8493, "Soul Wars"),
    (8749, "Soul Wars"),
    (9005, "Soul Wars"),
    (10536, "Pest Control"),
    (9551, "TzHaar Fight Cave"),
    (9043, "Inferno"),
    (13658, "Last Man Standing"),
    (13659, "Last Man Standing"),
    (13660, "Last Man Standing"),
];

pub fn is_safe_zone(location: WorldPoint) -> bool {
    let region = location.region_id();
    SAFE_REGIONS.iter().any(|(id, _)| *id == region)
}

pub fn kept_slots(skulled: bool, protect_item: bool) -> usize {
    let base = if skulled { 0 } else { BASE_KEPT_SLOTS };
    base + usize::from(protect_item)
}

/// Split stacks into (kept, lost): most valuable first, the first
/// `keep` stacks are kept. Ties keep carried order.
pub fn partition_items(
    mut stacks: Vec<SerializedItemStack>,
    keep: usize,
) -> (Vec<SerializedItemStack>, Vec<SerializedItemStack>) {
    stacks.sort_by(|a, b| b.total_price().cmp(&a.total_price()));
    let lost = stacks.split_off(keep.min(stacks.len()));
    (stacks, lost)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Killer {
    name: Option<String>,
    npc_id: Option<i32>,
    pvp: bool,
}

pub struct DeathNotifier {
    ctx: Arc<NotifierContext>,
    /// Player currently in combat with the local player, cleared when the
    /// fight ends or a death is handled.
    last_opponent: PendingSlot<Option<String>>,
}

impl DeathNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            last_opponent: PendingSlot::new(),
        }
    }

    pub fn on_interaction(&self, source: &Actor, target: Option<&Actor>) {
        match (source, target) {
            (Actor::Player { name }, Some(Actor::LocalPlayer))
            | (Actor::LocalPlayer, Some(Actor::Player { name })) => {
                self.last_opponent.set(Some(name.clone()));
            }
            // the tracked player turned away or stopped fighting
            (Actor::Player { name }, _) => {
                self.last_opponent
                    .take_if(|tracked| tracked.as_deref() == Some(name.as_str()));
            }
            _ => {}
        }
    }

    pub fn on_actor_death(&self, actor: &Actor) {
        if *actor != Actor::LocalPlayer {
            return;
        }
        // an opponent is only blamed for the death that follows the fight
        let opponent = self.last_opponent.take();
        if !self.enabled() {
            return;
        }

        let settings = self.ctx.settings();
        let config = &settings.death;
        let client = self.ctx.client();

        let safe = is_safe_zone(client.player_location());
        if safe && config.ignore_safe {
            log::debug!("Skipping death in safe zone");
            return;
        }

        let stacks = carried_stacks(client);
        let (kept, lost) = if safe {
            (sort_by_value(stacks), Vec::new())
        } else {
            partition_items(
                stacks,
                kept_slots(client.is_skulled(), client.is_protect_item_active()),
            )
        };

        let value_lost: i64 = lost.iter().map(SerializedItemStack::total_price).sum();
        if !safe && value_lost < config.min_value {
            log::debug!(
                "Skipping death losing {} gp, below minimum {}",
                value_lost,
                config.min_value
            );
            return;
        }

        let killer = identify_killer(client, opponent);
        let player = self.ctx.player_name();
        let value_text = value_lost.to_string();
        let pker = killer.name.clone().unwrap_or_default();
        let template = if killer.pvp && config.pvp_enabled {
            &config.pvp_message
        } else {
            &config.message
        };

        let embeds = if config.embed_kept_items && !config.send_image {
            kept.iter()
                .map(|stack| Embed::of_image(item_image_url(stack.id)))
                .collect()
        } else {
            Vec::new()
        };

        let notification = assembler::assemble(
            NotificationType::Death,
            template,
            &[
                ("%USERNAME%", player.as_str()),
                ("%VALUELOST%", value_text.as_str()),
                ("%PKER%", pker.as_str()),
            ],
            NotificationExtra::Death(DeathNotificationData {
                value_lost,
                is_pvp: killer.pvp,
                pker: killer.pvp.then(|| pker.clone()),
                killer_name: killer.name,
                killer_npc_id: killer.npc_id,
                kept_items: kept,
                lost_items: lost,
            }),
        )
        .with_player_name(player.clone())
        .with_embeds(embeds);

        self.ctx.send(notification, config.send_image, &config.webhook);
    }
}

fn identify_killer(client: &dyn GameClient, opponent: Option<String>) -> Killer {
    if client.is_in_wilderness() || client.is_pvp_world() {
        let pker = opponent.or_else(|| {
            client
                .nearby_players()
                .into_iter()
                .find(|p| p.interacting_with_local)
                .map(|p| p.name)
        });
        if let Some(name) = pker {
            return Killer {
                name: Some(name),
                npc_id: None,
                pvp: true,
            };
        }
    }

    client
        .nearby_npcs()
        .into_iter()
        .find(|npc| npc.interacting_with_local && !npc.is_dead && npc.attackable)
        .map(|npc| Killer {
            name: Some(npc.name),
            npc_id: Some(npc.id),
            pvp: false,
        })
        .unwrap_or_default()
}

fn carried_stacks(client: &dyn GameClient) -> Vec<SerializedItemStack> {
    client
        .carried_items()
        .into_iter()
        .filter(|item| item.quantity > 0)
        .map(|item| SerializedItemStack {
            id: item.id,
            quantity: item.quantity,
            price_each: client.item_price(item.id),
            name: client.item_name(item.id),
        })
        .collect()
}

fn sort_by_value(mut stacks: Vec<SerializedItemStack>) -> Vec<SerializedItemStack> {
    stacks.sort_by(|a, b| b.total_price().cmp(&a.total_price()));
    stacks
}

impl Notifier for DeathNotifier {
    fn name(&self) -> &'static str {
        "death"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        is_enabled(&settings, settings.death.enabled)
    }

    fn reset(&self) {
        self.last_opponent.set(None);
    }
}
