//! Message template rendering and notification packaging.

use crate::core::model::{Embed, Notification, NotificationExtra, NotificationType};

/// Substitute every placeholder in a single pass. Replacement values are
/// never rescanned, so a player named "%BOSS%" stays literal.
pub fn render(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while !rest.is_empty() {
        for (placeholder, value) in replacements {
            if !placeholder.is_empty() && rest.starts_with(placeholder) {
                out.push_str(value);
                rest = &rest[placeholder.len()..];
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}

/// Build a notification from a template and its structured payload.
pub fn assemble(
    kind: NotificationType,
    template: &str,
    replacements: &[(&str, &str)],
    extra: NotificationExtra,
) -> Notification {
    Notification {
        text: render(template, replacements),
        kind,
        extra,
        thumbnail_url: None,
        embeds: Vec::new(),
        player_name: None,
    }
}

impl Notification {
    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn with_embeds(mut self, embeds: Vec<Embed>) -> Self {
        self.embeds = embeds;
        self
    }
}

pub fn item_image_url(item_id: i32) -> String {
    format!("https://static.runelite.net/cache/item/icon/{}.png", item_id)
}

pub fn npc_image_url(npc_id: i32) -> String {
    format!("https://chisel.weirdgloop.org/static/img/osrs-npc/{}_128.png", npc_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SlayerNotificationData;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let text = render(
            "%USERNAME% got %COUNT%; well done %USERNAME%",
            &[("%USERNAME%", "Zezima"), ("%COUNT%", "5")],
        );
        assert_eq!(text, "Zezima got 5; well done Zezima");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let text = render(
            "%USERNAME% killed %BOSS%",
            &[("%USERNAME%", "%BOSS%"), ("%BOSS%", "Zulrah")],
        );
        assert_eq!(text, "%BOSS% killed Zulrah");
    }

    #[test]
    fn test_render_handles_multibyte_text() {
        let text = render("ünïcödé %X% ✓", &[("%X%", "ok")]);
        assert_eq!(text, "ünïcödé ok ✓");
    }

    #[test]
    fn test_assemble() {
        let n = assemble(
            NotificationType::Slayer,
            "%TASK% done",
            &[("%TASK%", "Hillfiends")],
            NotificationExtra::Slayer(SlayerNotificationData {
                slayer_task: "Hillfiends".to_string(),
                slayer_completed: "1".to_string(),
                slayer_points: "0".to_string(),
            }),
        )
        .with_player_name("Zezima");
        assert_eq!(n.text, "Hillfiends done");
        assert_eq!(n.player_name.as_deref(), Some("Zezima"));
        assert!(n.embeds.is_empty());
    }
}
