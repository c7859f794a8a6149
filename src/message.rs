//! Classification of free-text on-air messages.
//!
//! Only two shapes matter to the sequencer: a CQ soliciting any caller and
//! a directed reply between two stations. Everything else (reports, RR73,
//! contest exchanges) is ignored.
use once_cell::sync::Lazy;
use regex::Regex;

// A directed call: "<to> <from> ...". The leading token must not be a CQ.
static REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<to>\w+)(?:/\w+)? (?P<call>\w+)(?:/\w+)? .*").unwrap()
});

// A well-formed CQ: optional doubled CQ or extra tag, callsign, 4-char grid.
static CQ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CQ\s(?:CQ\s|(?P<extra>[\S.]+)\s|)(?P<call>\w+(?:/\w+)?)\s(?P<grid>[A-Z]{2}[0-9]{2})")
        .unwrap()
});

// A CQ without a grid, from stations that do not announce their locator.
static BROKEN_CQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CQ\s(?P<call>\w+(?:/\w+)?)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `call` is replying to `to`.
    Reply { to: String, call: String },
    /// `call` is soliciting contacts, optionally tagged (DX, POTA, a
    /// continent) and optionally announcing a grid.
    Cq {
        call: String,
        extra: Option<String>,
        grid: Option<String>,
    },
}

/// Classify a decoded message; patterns are tried in order and the first
/// match wins. Unrecognized messages return None.
pub fn parse(message: &str) -> Option<Message> {
    if let Some(caps) = REPLY.captures(message) {
        let to = caps["to"].to_string();
        // the regex cannot express "token not starting with CQ"
        if !to.starts_with("CQ") {
            return Some(Message::Reply {
                to,
                call: caps["call"].to_string(),
            });
        }
    }
    if let Some(caps) = CQ.captures(message) {
        return Some(Message::Cq {
            call: caps["call"].to_string(),
            extra: caps.name("extra").map(|m| m.as_str().to_string()),
            grid: Some(caps["grid"].to_string()),
        });
    }
    if let Some(caps) = BROKEN_CQ.captures(message) {
        return Some(Message::Cq {
            call: caps["call"].to_string(),
            extra: None,
            grid: None,
        });
    }
    None
}
