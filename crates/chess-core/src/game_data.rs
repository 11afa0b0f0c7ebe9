use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The four canonical game termination markers.
pub const TERMINATION_MARKERS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Marker used when the result is unknown.
pub const UNKNOWN_RESULT: &str = "*";

/// Ply -> strings spliced right after that ply's move token.
/// Ply 0 is the slot before the first movetext token.
pub type InjectionMap = BTreeMap<usize, Vec<String>>;

/// One movetext token. Text is kept verbatim so the record can be re-emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Token {
    /// "12." or "12..."
    MoveNumber(String),
    /// A move, or any malformed fragment absorbed as one.
    San(String),
    /// Body of a `{...}` comment, without the braces.
    Comment(String),
    /// One of [`TERMINATION_MARKERS`].
    Result(String),
}

impl Token {
    pub fn is_san(&self) -> bool {
        matches!(self, Token::San(_))
    }

    /// Text as it appears in PGN.
    pub fn render(&self) -> String {
        match self {
            Token::MoveNumber(s) | Token::San(s) | Token::Result(s) => s.clone(),
            Token::Comment(body) => format!("{{{body}}}"),
        }
    }
}

/// Ordered PGN tag pairs. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value in place if the key exists, otherwise append.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A parsed game: headers plus the ordered movetext tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub headers: Headers,
    pub tokens: Vec<Token>,
}

impl GameRecord {
    /// SAN tokens that count as plies (everything before the first result marker).
    pub fn moves(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .take_while(|t| !matches!(t, Token::Result(_)))
            .filter_map(|t| match t {
                Token::San(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn result_token(&self) -> Option<&str> {
        self.tokens.iter().find_map(|t| match t {
            Token::Result(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.set("Event", "Casual");
        headers.set("White", "A");
        headers.set("Event", "Club");

        let keys: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Event", "White"]);
        assert_eq!(headers.get("Event"), Some("Club"));
    }

    #[test]
    fn test_moves_stop_at_result() {
        let record = GameRecord {
            headers: Headers::new(),
            tokens: vec![
                Token::MoveNumber("1.".into()),
                Token::San("e4".into()),
                Token::Comment("best by test".into()),
                Token::San("e5".into()),
                Token::Result("*".into()),
                Token::San("Nf3".into()),
            ],
        };
        assert_eq!(record.moves(), vec!["e4", "e5"]);
        assert_eq!(record.result_token(), Some("*"));
    }
}
