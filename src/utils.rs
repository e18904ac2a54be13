use std::sync::LazyLock;

use rand::seq::SliceRandom;
use regex::Regex;

pub const CAPTCHA_WORDS: &[&str] = &[
    "ALPHA", "BRAVO", "CHARLIE", "DELTA", "ECHO", "FOXTROT", "GOLF", "HOTEL", "INDIA", "JULIET",
    "KILO", "LIMA", "MIKE", "NOVEMBER", "OSCAR", "PAPA", "QUEBEC", "ROMEO", "SIERRA", "TANGO",
    "UNIFORM", "VICTOR", "WHISKEY", "XRAY", "YANKEE", "ZULU", "PHOENIX", "DRAGON", "THUNDER",
    "SHADOW",
];

static PLAYER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+#[0-9]{8}$").expect("player id pattern"));
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?([0-9]+)>").expect("mention pattern"));
static TEAM_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{1,6}$").expect("team tag pattern"));

pub fn captcha_word() -> &'static str {
    CAPTCHA_WORDS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("ALPHA")
}

/// Strips every `[`/`]` and uppercases. Idempotent.
pub fn normalize_team_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect::<String>()
        .to_uppercase()
}

/// Returns the normalized tag, or `None` if it is not 1-6 of `A-Z0-9`.
pub fn parse_team_tag(tag: &str) -> Option<String> {
    let tag = normalize_team_tag(tag);
    TEAM_TAG.is_match(&tag).then_some(tag)
}

/// `<name>#<exactly 8 ASCII digits>`
pub fn is_valid_player_id(uid: &str) -> bool {
    PLAYER_ID.is_match(uid)
}

/// User ids of every `<@id>` / `<@!id>` mention, in message order.
pub fn parse_mentions(text: &str) -> Vec<i64> {
    MENTION
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}

/// Roster body for one lobby; `teams` are `(tag, name)` in check-in order.
pub fn format_slot_list(teams: &[(String, String)], lobby_number: i32, capacity: i64) -> String {
    let mut s = format!("**🏆 Lobby {} - Slot List**\n\n", lobby_number);
    for (i, (tag, name)) in teams.iter().enumerate() {
        s.push_str(&format!("{}. [{}] {}\n", i + 1, tag, name));
    }
    s.push_str(&format!("\n**Total Teams: {}/{}**", teams.len(), capacity));
    s
}

pub fn lobby_role_name(lobby_number: i32) -> String {
    format!("Lobby-{}", lobby_number)
}

pub fn lobby_channel_name(lobby_number: i32) -> String {
    format!("lobby-{}", lobby_number)
}
