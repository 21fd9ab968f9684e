//! Beatmap link recognition.
//!
//! Single-difficulty forms are tried before beatmapset forms, each list in
//! priority order:
//!
//! | kind   | form                                              |
//! |--------|---------------------------------------------------|
//! | map    | `osu.ppy.sh/beatmapsets/<set>#<mode>/<id>`        |
//! | map    | `osu.ppy.sh/beatmaps/<id>`                        |
//! | map    | `osu.ppy.sh/b/<id>` (also `old.ppy.sh`)           |
//! | map    | `osu.ppy.sh/p/beatmap?b=<id>&m=<mode>`            |
//! | mapset | `osu.ppy.sh/beatmapsets/<id>`                     |
//! | mapset | `osu.ppy.sh/s/<id>` (also `old.ppy.sh`)           |
//! | mapset | `osu.ppy.sh/p/beatmap?s=<id>&m=<mode>`            |

use super::mods::mods_after_link;
use super::{BeatmapKind, BeatmapReference};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// How the id is pulled out of a matched link.
enum IdSource {
    /// First capture group is the id.
    Capture,
    /// First capture group is a query string; the id is the named parameter.
    Query(&'static str),
}

struct LinkForm {
    name: &'static str,
    pattern: Regex,
    source: IdSource,
}

impl LinkForm {
    fn new(name: &'static str, pattern: &str, source: IdSource) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("link pattern is valid"),
            source,
        }
    }

    fn extract(&self, link: &str) -> Option<u64> {
        let caps = self.pattern.captures(link)?;
        let group = caps.get(1)?.as_str();
        match self.source {
            IdSource::Capture => group.parse().ok(),
            IdSource::Query(key) => query_param(group, key)?.parse().ok(),
        }
    }
}

static MAP_FORMS: LazyLock<Vec<LinkForm>> = LazyLock::new(|| {
    vec![
        LinkForm::new(
            "official",
            r"https?://osu\.ppy\.sh/beatmapsets/[0-9]+#(?:osu|taiko|fruits|mania)/([0-9]+)",
            IdSource::Capture,
        ),
        LinkForm::new(
            "official_alt",
            r"https?://osu\.ppy\.sh/beatmaps/([0-9]+)",
            IdSource::Capture,
        ),
        LinkForm::new(
            "legacy",
            r"https?://(?:osu|old)\.ppy\.sh/b/([0-9]+)",
            IdSource::Capture,
        ),
        LinkForm::new(
            "legacy_query",
            r"https?://(?:osu|old)\.ppy\.sh/p/beatmap\?(.+)",
            IdSource::Query("b"),
        ),
    ]
});

static MAPSET_FORMS: LazyLock<Vec<LinkForm>> = LazyLock::new(|| {
    vec![
        LinkForm::new(
            "official",
            r"https?://osu\.ppy\.sh/beatmapsets/([0-9]+)",
            IdSource::Capture,
        ),
        LinkForm::new(
            "legacy",
            r"https?://(?:osu|old)\.ppy\.sh/s/([0-9]+)",
            IdSource::Capture,
        ),
        LinkForm::new(
            "legacy_query",
            r"https?://(?:osu|old)\.ppy\.sh/p/beatmap\?(.+)",
            IdSource::Query("s"),
        ),
    ]
});

/// Look up `key` in an `a=1&b=2` query string.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Resolve a single link (with any `+mods` suffix already removed).
pub fn parse_link(link: &str) -> Option<(u64, BeatmapKind)> {
    for form in MAP_FORMS.iter() {
        if let Some(id) = form.extract(link) {
            debug!(form = form.name, id, "matched beatmap link");
            return Some((id, BeatmapKind::Map));
        }
    }
    for form in MAPSET_FORMS.iter() {
        if let Some(id) = form.extract(link) {
            debug!(form = form.name, id, "matched beatmapset link");
            return Some((id, BeatmapKind::Mapset));
        }
    }
    None
}

/// Find the first beatmap request in a chat message.
///
/// Tokens are inspected in order and the first one matching any link form
/// wins. Mods are read from the original text following that link. Returns
/// `None` when the message carries no beatmap link.
pub fn parse_message(content: &str) -> Option<BeatmapReference> {
    for token in content.split_whitespace() {
        let link = token.split('+').next().unwrap_or(token);
        if link.is_empty() {
            continue;
        }
        if let Some((id, kind)) = parse_link(link) {
            return Some(BeatmapReference {
                id,
                kind,
                mods: mods_after_link(content, link),
            });
        }
    }
    None
}
