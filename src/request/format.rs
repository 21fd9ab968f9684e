//! Text of forwarded requests.

use crate::beatmap::BeatmapInfo;
use crate::chat::ChatMessage;

/// Render a drain length as `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_length(seconds: u64) -> String {
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Uppercase the first character, lowercase the rest (`ranked` -> `Ranked`).
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Role prefix of the requester, at most one: MOD, then SUB, then VIP.
fn role_prefix(message: &ChatMessage) -> &'static str {
    if message.is_mod {
        "[MOD] "
    } else if message.is_subscriber {
        "[SUB] "
    } else if message.is_vip {
        "[VIP] "
    } else {
        ""
    }
}

/// Acknowledgement posted to the source chat.
pub fn echo_line(beatmap: &BeatmapInfo) -> String {
    format!("{} - Request sent!", beatmap.display_title())
}

/// Request line delivered to the player in game.
///
/// `[MOD] viewer -> [Ranked] [https://osu.ppy.sh/b/1 A - T [V]] (180 BPM, 5.27*, 1:35) +HD + USED POINTS`
pub fn in_game_line(message: &ChatMessage, beatmap: &BeatmapInfo, mods: &str) -> String {
    let mut line = format!(
        "{}{} -> [{}] [https://osu.ppy.sh/b/{} {}] ({} BPM, {:.2}*, {})",
        role_prefix(message),
        message.author,
        capitalize(&beatmap.status),
        beatmap.id,
        beatmap.display_title(),
        beatmap.bpm,
        beatmap.rating,
        format_length(beatmap.length),
    );
    if !mods.is_empty() {
        line.push(' ');
        line.push_str(mods);
    }
    if message.redeemed_with_points() {
        line.push_str(" + USED POINTS");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::POINTS_TAG;
    use std::collections::BTreeSet;

    fn message() -> ChatMessage {
        ChatMessage {
            channel: "streamer".into(),
            author: "viewer".into(),
            author_id: "42".into(),
            text: String::new(),
            is_mod: false,
            is_subscriber: false,
            is_vip: false,
            tags: BTreeSet::new(),
        }
    }

    fn beatmap() -> BeatmapInfo {
        BeatmapInfo {
            id: 2778999,
            artist: "Camellia".into(),
            title: "Exit This Earth's Atomosphere".into(),
            version: "Evolution".into(),
            bpm: 185.0,
            length: 95,
            status: "ranked".into(),
            rating: 7.123,
        }
    }

    #[test]
    fn test_lengths() {
        assert_eq!(format_length(0), "0:00");
        assert_eq!(format_length(95), "1:35");
        assert_eq!(format_length(3599), "59:59");
        assert_eq!(format_length(3600), "1:00:00");
        assert_eq!(format_length(3725), "1:02:05");
    }

    #[test]
    fn test_plain_line() {
        assert_eq!(
            in_game_line(&message(), &beatmap(), ""),
            "viewer -> [Ranked] [https://osu.ppy.sh/b/2778999 Camellia - Exit This Earth's Atomosphere [Evolution]] (185 BPM, 7.12*, 1:35)"
        );
    }

    #[test]
    fn test_mods_and_points_suffix() {
        let mut msg = message();
        msg.tags.insert(POINTS_TAG.to_string());
        let line = in_game_line(&msg, &beatmap(), "+HDHR");
        assert!(line.ends_with("(185 BPM, 7.12*, 1:35) +HDHR + USED POINTS"), "{line}");
    }

    #[test]
    fn test_prefix_priority() {
        let mut msg = message();
        msg.is_vip = true;
        assert!(in_game_line(&msg, &beatmap(), "").starts_with("[VIP] viewer"));
        msg.is_subscriber = true;
        assert!(in_game_line(&msg, &beatmap(), "").starts_with("[SUB] viewer"));
        msg.is_mod = true;
        assert!(in_game_line(&msg, &beatmap(), "").starts_with("[MOD] viewer"));
    }

    #[test]
    fn test_status_capitalized() {
        let mut map = beatmap();
        map.status = "LOVED".into();
        assert!(in_game_line(&message(), &map, "").contains("-> [Loved] "));
    }

    #[test]
    fn test_echo_line() {
        assert_eq!(
            echo_line(&beatmap()),
            "Camellia - Exit This Earth's Atomosphere [Evolution] - Request sent!"
        );
    }
}
