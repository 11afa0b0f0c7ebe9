//! PGN text model: a lossless lexer for headers and movetext, and a serializer
//! that re-emits the tokens with per-ply insertions spliced in.

use regex::Regex;

use crate::game_data::{GameRecord, Headers, InjectionMap, Token, TERMINATION_MARKERS, UNKNOWN_RESULT};

const HEADER_PATTERN: &str = r#"\[\s*(\w+)\s+"((?:[^"\\]|\\.)*)"\s*\]"#;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// The seven tag roster, with the defaults used when a tag is missing.
pub const REQUIRED_HEADERS: [(&str, &str); 7] = [
    ("Event", "?"),
    ("Site", "?"),
    ("Date", "????.??.??"),
    ("Round", "?"),
    ("White", "?"),
    ("Black", "?"),
    ("Result", UNKNOWN_RESULT),
];

/// Parse raw PGN into headers and movetext tokens. Never fails: anything the
/// lexer does not recognise becomes a `Token::San`.
pub fn parse_pgn(raw: &str) -> GameRecord {
    let (header_block, movetext) = split_sections(raw);
    GameRecord {
        headers: parse_headers(header_block),
        tokens: tokenize(movetext),
    }
}

/// Split at the header/movetext boundary. The header block is the run of
/// leading `[...]` lines; it ends at the first blank line or the first line
/// that is not a tag pair.
fn split_sections(raw: &str) -> (&str, &str) {
    let body = strip_bom(raw).trim_start();
    if !body.starts_with('[') {
        return ("", body);
    }

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || !trimmed.starts_with('[') {
            break;
        }
        offset += line.len();
    }
    (&body[..offset], &body[offset..])
}

/// Drop a leading UTF-8 byte order mark, as written by some Windows exporters.
pub fn strip_bom(raw: &str) -> &str {
    raw.strip_prefix(BYTE_ORDER_MARK).unwrap_or(raw)
}

/// Tag pairs in block order. A line may hold several pairs.
fn parse_headers(block: &str) -> Headers {
    let mut headers = Headers::new();
    let Ok(header_re) = Regex::new(HEADER_PATTERN) else {
        return headers;
    };

    for line in block.lines() {
        let mut found = false;
        for cap in header_re.captures_iter(line) {
            headers.set(&cap[1], &cap[2]);
            found = true;
        }
        if !found {
            tracing::debug!(line = line.trim(), "Skipping malformed header line");
        }
    }
    headers
}

/// Lex movetext. In priority order: `{...}` comments (not nested), move
/// numbers (`12.` / `12...`), termination markers, and otherwise runs up to
/// the next whitespace or comment.
pub fn tokenize(movetext: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = movetext;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if let Some(body) = rest.strip_prefix('{') {
            if let Some(end) = body.find('}') {
                tokens.push(Token::Comment(body[..end].to_string()));
                rest = &body[end + 1..];
                continue;
            }
        }

        // An unterminated brace is absorbed as part of a move-like run.
        let run_end = if rest.starts_with('{') {
            rest.find(char::is_whitespace)
        } else {
            rest.find(|c: char| c.is_whitespace() || c == '{')
        }
        .unwrap_or(rest.len());
        let run = &rest[..run_end];

        if let Some(len) = move_number_len(run) {
            tokens.push(Token::MoveNumber(run[..len].to_string()));
            rest = &rest[len..];
            continue;
        }

        if TERMINATION_MARKERS.contains(&run) {
            tokens.push(Token::Result(run.to_string()));
        } else {
            tokens.push(Token::San(run.to_string()));
        }
        rest = &rest[run_end..];
    }

    tokens
}

/// Length of a leading `<digits>.` or `<digits>...` marker, if any.
fn move_number_len(run: &str) -> Option<usize> {
    let digits = run.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let tail = &run[digits..];
    if tail.starts_with("...") {
        Some(digits + 3)
    } else if tail.starts_with('.') {
        Some(digits + 1)
    } else {
        None
    }
}

/// Guarantee the required header set, then apply overrides. Existing keys keep
/// their position; new keys are appended.
pub fn ensure_headers(headers: &Headers, overrides: &[(&str, &str)]) -> Headers {
    let mut ensured = headers.clone();
    for (key, default) in REQUIRED_HEADERS {
        if !ensured.contains(key) {
            ensured.set(key, default);
        }
    }
    for (key, value) in overrides {
        ensured.set(key, value);
    }
    ensured
}

/// Re-emit movetext with insertions. Ply counts SAN tokens up to the first
/// result marker; tokens after it are still emitted, just not counted.
/// Entries under ply 0 go before the first token.
pub fn reconstruct(tokens: &[Token], injections: &InjectionMap) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(tokens.len());
    if let Some(leading) = injections.get(&0) {
        parts.extend(leading.iter().cloned());
    }

    let mut ply = 0;
    let mut counting = true;
    for token in tokens {
        parts.push(token.render());
        match token {
            Token::San(_) if counting => {
                ply += 1;
                if let Some(extra) = injections.get(&ply) {
                    parts.extend(extra.iter().cloned());
                }
            }
            Token::Result(_) => counting = false,
            _ => {}
        }
    }

    parts.join(" ")
}

pub fn render_headers(headers: &Headers) -> String {
    headers
        .iter()
        .map(|(key, value)| format!("[{key} \"{value}\"]\n"))
        .collect()
}

/// Full PGN text for a record plus insertions.
pub fn write_pgn(record: &GameRecord, injections: &InjectionMap) -> String {
    let movetext = reconstruct(&record.tokens, injections);
    if record.headers.is_empty() {
        format!("{movetext}\n")
    } else {
        format!("{}\n{movetext}\n", render_headers(&record.headers))
    }
}

/// Make sure the text ends with a termination marker, preferring the value
/// of its own `Result` header.
pub fn ensure_trailing_result(text: &str) -> String {
    let trimmed = text.trim_end();
    let last_run = trimmed.rsplit(char::is_whitespace).next().unwrap_or("");
    if TERMINATION_MARKERS.contains(&last_run) {
        return text.to_string();
    }

    let (header_block, _) = split_sections(text);
    let marker = parse_headers(header_block)
        .get("Result")
        .filter(|value| TERMINATION_MARKERS.contains(value))
        .unwrap_or(UNKNOWN_RESULT)
        .to_string();

    if trimmed.is_empty() {
        format!("{marker}\n")
    } else {
        format!("{trimmed} {marker}\n")
    }
}
