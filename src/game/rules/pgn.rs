//! PGN import and export
//!
//! Import accepts the common subset of the PGN standard: tag pairs, move
//! numbers, comments (`{...}` and `;`), recursive variations (skipped), NAGs
//! and result tokens. Moves are validated one by one with `shakmaty`; the
//! first illegal SAN aborts the import.
//!
//! Export writes the seven-tag roster (plus `SetUp`/`FEN` for non-standard
//! starts) and movetext wrapped at 80 columns.

use super::shakmaty_oracle::{parse_position, play};
use super::{AppliedMove, STARTING_FEN};
use crate::game::error::{RulesError, RulesResult};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use shakmaty::san::SanPlus;

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];
const MAX_LINE: usize = 80;

/// A parsed game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgnGame {
    /// Tag pairs in file order
    pub headers: Vec<(String, String)>,
    /// `FEN` tag or the standard start
    pub initial_fen: String,
    pub moves: Vec<AppliedMove>,
    /// Result token from the movetext or `Result` tag
    pub result: Option<String>,
}

impl PgnGame {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Position after the last move
    pub fn final_fen(&self) -> &str {
        self.moves
            .last()
            .map(|m| m.fen.as_str())
            .unwrap_or(&self.initial_fen)
    }
}

/// Parse PGN text
pub fn parse_pgn(text: &str) -> RulesResult<PgnGame> {
    let mut headers = Vec::new();
    let mut movetext = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            headers.push(parse_tag(trimmed)?);
        } else if !trimmed.starts_with('%') {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }

    let initial_fen = headers
        .iter()
        .find(|(k, _)| k == "FEN")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| STARTING_FEN.to_string());

    let mut pos = parse_position(&initial_fen).map_err(|e| RulesError::InvalidPgn {
        message: e.to_string(),
    })?;

    let tokens = tokenize(&movetext)?;
    if headers.is_empty() && tokens.is_empty() {
        return Err(RulesError::InvalidPgn {
            message: "no tags or moves".to_string(),
        });
    }

    let mut moves = Vec::new();
    let mut result = headers
        .iter()
        .find(|(k, _)| k == "Result")
        .map(|(_, v)| v.clone());

    for token in tokens {
        if RESULT_TOKENS.contains(&token.as_str()) {
            result = Some(token);
            break;
        }

        let ply = moves.len() + 1;
        let illegal = || RulesError::IllegalSan {
            san: token.clone(),
            ply,
        };
        let san: SanPlus = token.parse().map_err(|_| illegal())?;
        let m = san.san.to_move(&pos).map_err(|_| illegal())?;

        let applied = play(pos.clone(), m);
        pos = parse_position(&applied.fen)?;
        moves.push(applied);
    }

    Ok(PgnGame {
        headers,
        initial_fen,
        moves,
        result,
    })
}

/// `[Key "Value"]`
fn parse_tag(line: &str) -> RulesResult<(String, String)> {
    let malformed = || RulesError::InvalidPgn {
        message: format!("malformed tag: {}", line),
    };

    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(malformed)?
        .trim();
    let (key, value) = inner.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let value = value
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(malformed)?;

    Ok((key.to_string(), value.replace("\\\"", "\"")))
}

/// Split movetext into SAN and result tokens
fn tokenize(movetext: &str) -> RulesResult<Vec<String>> {
    let mut cleaned = String::with_capacity(movetext.len());
    let mut chars = movetext.chars();
    let mut variation_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(RulesError::InvalidPgn {
                        message: "unterminated comment".to_string(),
                    });
                }
                cleaned.push(' ');
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                cleaned.push(' ');
            }
            '(' => variation_depth += 1,
            ')' => {
                variation_depth = variation_depth.checked_sub(1).ok_or_else(|| {
                    RulesError::InvalidPgn {
                        message: "unbalanced variation".to_string(),
                    }
                })?;
                cleaned.push(' ');
            }
            _ if variation_depth > 0 => {}
            _ => cleaned.push(c),
        }
    }

    if variation_depth > 0 {
        return Err(RulesError::InvalidPgn {
            message: "unterminated variation".to_string(),
        });
    }

    Ok(cleaned
        .split_whitespace()
        .filter(|t| !t.starts_with('$'))
        .filter_map(|t| {
            if RESULT_TOKENS.contains(&t) {
                return Some(t.to_string());
            }
            // "12." / "12..." / "12.e4"
            let t = t.trim_start_matches(|c: char| c.is_ascii_digit());
            let t = t.trim_start_matches('.');
            let t = t.trim_end_matches(|c| c == '!' || c == '?');
            (!t.is_empty()).then(|| t.to_string())
        })
        .collect())
}

/// Seven-tag roster for export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnMeta {
    pub event: String,
    pub site: String,
    pub date: NaiveDate,
    pub round: String,
    pub white: String,
    pub black: String,
    pub result: String,
}

impl Default for PgnMeta {
    fn default() -> Self {
        Self {
            event: "XFChess Analysis".to_string(),
            site: "XFChess".to_string(),
            date: Local::now().date_naive(),
            round: "-".to_string(),
            white: "?".to_string(),
            black: "?".to_string(),
            result: "*".to_string(),
        }
    }
}

/// Render a game as PGN text
pub fn export_pgn(meta: &PgnMeta, initial_fen: &str, sans: &[String]) -> String {
    let mut out = String::new();
    let tags = [
        ("Event", meta.event.clone()),
        ("Site", meta.site.clone()),
        ("Date", meta.date.format("%Y.%m.%d").to_string()),
        ("Round", meta.round.clone()),
        ("White", meta.white.clone()),
        ("Black", meta.black.clone()),
        ("Result", meta.result.clone()),
    ];
    for (key, value) in tags {
        out.push_str(&format!("[{} \"{}\"]\n", key, value.replace('"', "\\\"")));
    }
    if initial_fen != STARTING_FEN {
        out.push_str("[SetUp \"1\"]\n");
        out.push_str(&format!("[FEN \"{}\"]\n", initial_fen));
    }
    out.push('\n');

    let mut fields = initial_fen.split_whitespace();
    let mut white_to_move = fields.nth(1) != Some("b");
    let mut move_number: u32 = fields.nth(3).and_then(|n| n.parse().ok()).unwrap_or(1);

    let mut tokens = Vec::with_capacity(sans.len() * 3 / 2 + 1);
    for (i, san) in sans.iter().enumerate() {
        if white_to_move {
            tokens.push(format!("{}.", move_number));
        } else if i == 0 {
            tokens.push(format!("{}...", move_number));
        }
        tokens.push(san.clone());
        if !white_to_move {
            move_number += 1;
        }
        white_to_move = !white_to_move;
    }
    tokens.push(meta.result.clone());

    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > MAX_LINE {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        out.push_str(&token);
    }
    out.push('\n');
    out
}
