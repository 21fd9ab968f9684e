//! IRC line parsing and the chat message model.
//!
//! Twitch chat speaks IRC with IRCv3 tags. Only the subset the relay needs is
//! modeled: tags, source prefix, command and parameters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag present when a message was sent through a channel points reward.
pub const POINTS_TAG: &str = "custom-reward-id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineParseError {
    #[error("empty line")]
    Empty,
    #[error("missing command")]
    MissingCommand,
}

/// A parsed inbound IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    pub tags: Vec<(String, Option<String>)>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

/// Undo IRCv3 tag value escaping.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

fn parse_tags(raw: &str) -> Vec<(String, Option<String>)> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => (key.to_owned(), Some(unescape_tag_value(value))),
            None => (tag.to_owned(), None),
        })
        .collect()
}

impl FromStr for IrcLine {
    type Err = LineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(LineParseError::Empty);
        }

        let mut tags = Vec::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
            tags = parse_tags(raw);
            rest = tail.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (raw, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
            prefix = Some(raw.to_owned());
            rest = tail.trim_start();
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(LineParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_owned());
            rest = tail;
        }

        Ok(IrcLine {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }
}

impl IrcLine {
    /// Value of a tag, if present with a value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Nickname portion of the source prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// Last parameter, which carries free text for PRIVMSG/NOTICE.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

/// Outbound commands the relay issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pass(String),
    Nick(String),
    CapReq(Vec<String>),
    Join(String),
    Part(String),
    Privmsg { target: String, text: String },
    Pong(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(pass) => write!(f, "PASS {pass}"),
            Self::Nick(nick) => write!(f, "NICK {nick}"),
            Self::CapReq(caps) => write!(f, "CAP REQ :{}", caps.join(" ")),
            Self::Join(channel) => write!(f, "JOIN #{channel}"),
            Self::Part(channel) => write!(f, "PART #{channel}"),
            // Line breaks would smuggle extra commands onto the wire.
            Self::Privmsg { target, text } => {
                write!(f, "PRIVMSG {target} :{}", text.replace(['\r', '\n'], " "))
            }
            Self::Pong(token) => write!(f, "PONG :{token}"),
        }
    }
}

/// A chat message received in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel name without `#`, lowercase.
    pub channel: String,
    /// Author login, lowercase.
    pub author: String,
    /// Platform user id of the author (falls back to the login).
    pub author_id: String,
    pub text: String,
    pub is_mod: bool,
    pub is_subscriber: bool,
    pub is_vip: bool,
    /// Keys of the tags attached to the message.
    pub tags: BTreeSet<String>,
}

fn has_badge(badges: Option<&str>, name: &str) -> bool {
    badges
        .unwrap_or("")
        .split(',')
        .any(|badge| badge.split('/').next() == Some(name))
}

impl ChatMessage {
    /// Build a chat message from a channel `PRIVMSG` line.
    ///
    /// Returns `None` for other commands and for private messages.
    pub fn from_line(line: &IrcLine) -> Option<Self> {
        if line.command != "PRIVMSG" {
            return None;
        }
        let channel = line.param(0)?.strip_prefix('#')?.to_lowercase();
        let author = line.nick()?.to_lowercase();
        let text = line.trailing()?.to_owned();
        if line.params.len() < 2 {
            return None;
        }

        let badges = line.tag("badges");
        let flag = |key: &str| line.tag(key) == Some("1");
        let is_mod = flag("mod") || has_badge(badges, "moderator") || has_badge(badges, "broadcaster");
        let is_subscriber = flag("subscriber") || has_badge(badges, "subscriber");
        let is_vip = line.tags.iter().any(|(k, _)| k == "vip") || has_badge(badges, "vip");

        Some(ChatMessage {
            channel,
            author_id: line.tag("user-id").unwrap_or(&author).to_owned(),
            author,
            text,
            is_mod,
            is_subscriber,
            is_vip,
            tags: line
                .tags
                .iter()
                .filter(|(_, v)| v.as_deref().is_some_and(|v| !v.is_empty()))
                .map(|(k, _)| k.clone())
                .collect(),
        })
    }

    /// Whether the message was sent by redeeming channel points.
    pub fn redeemed_with_points(&self) -> bool {
        self.tags.contains(POINTS_TAG)
    }

    pub fn is_broadcaster(&self) -> bool {
        self.author == self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_privmsg() {
        let raw = "@badges=subscriber/12,vip/1;display-name=Viewer;mod=0;subscriber=1;user-id=42;custom-reward-id=abc \
                   :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :https://osu.ppy.sh/b/1 +HD";
        let line: IrcLine = raw.parse().unwrap();
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.nick(), Some("viewer"));
        assert_eq!(line.tag("display-name"), Some("Viewer"));

        let msg = ChatMessage::from_line(&line).unwrap();
        assert_eq!(msg.channel, "streamer");
        assert_eq!(msg.author, "viewer");
        assert_eq!(msg.author_id, "42");
        assert_eq!(msg.text, "https://osu.ppy.sh/b/1 +HD");
        assert!(!msg.is_mod);
        assert!(msg.is_subscriber);
        assert!(msg.is_vip);
        assert!(msg.redeemed_with_points());
        assert!(!msg.is_broadcaster());
    }

    #[test]
    fn test_broadcaster_badge_counts_as_mod() {
        let raw = "@badges=broadcaster/1;mod=0 :streamer!streamer@host PRIVMSG #streamer :hi";
        let msg = ChatMessage::from_line(&raw.parse().unwrap()).unwrap();
        assert!(msg.is_mod);
        assert!(msg.is_broadcaster());
        assert!(!msg.redeemed_with_points());
    }

    #[test]
    fn test_empty_tag_values_are_not_in_tag_set() {
        let raw = "@custom-reward-id=;user-id=7 :a!a@h PRIVMSG #b :text";
        let msg = ChatMessage::from_line(&raw.parse().unwrap()).unwrap();
        assert!(!msg.redeemed_with_points());
        assert!(msg.tags.contains("user-id"));
    }

    #[test]
    fn test_private_message_is_not_chat() {
        let line: IrcLine = ":someone!someone@ppy.sh PRIVMSG bot :!help".parse().unwrap();
        assert!(ChatMessage::from_line(&line).is_none());
        assert_eq!(line.trailing(), Some("!help"));
    }

    #[test]
    fn test_parse_ping_and_numeric() {
        let ping: IrcLine = "PING :tmi.twitch.tv\r\n".parse().unwrap();
        assert_eq!(ping.command, "PING");
        assert_eq!(ping.trailing(), Some("tmi.twitch.tv"));

        let welcome: IrcLine = ":tmi.twitch.tv 001 bot :Welcome, GLHF!".parse().unwrap();
        assert_eq!(welcome.command, "001");
        assert_eq!(welcome.params, vec!["bot", "Welcome, GLHF!"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<IrcLine>(), Err(LineParseError::Empty));
        assert_eq!("@a=b :prefix".parse::<IrcLine>(), Err(LineParseError::MissingCommand));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_tag_value(r"a\sb\:c\\d"), r"a b;c\d");
    }

    #[test]
    fn test_command_serialization() {
        assert_eq!(Command::Join("streamer".into()).to_string(), "JOIN #streamer");
        assert_eq!(
            Command::CapReq(vec!["twitch.tv/tags".into(), "twitch.tv/commands".into()]).to_string(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands"
        );
        assert_eq!(
            Command::Privmsg { target: "#c".into(), text: "a\r\nQUIT".into() }.to_string(),
            "PRIVMSG #c :a  QUIT"
        );
    }
}
