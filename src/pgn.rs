// Multi-game PGN reader. The stream is finite and single-pass: games are cut out of
// the text by a two-state line machine (headers vs moves), then each block is
// finalized into a `PgnGame` with engine-stamped FENs.

use std::collections::HashMap;

use log::warn;
use thiserror::Error;
use time::{Date, Month};

use crate::board::TurnError;
use crate::force::Force;
use crate::game::{GameHeader, GameResult, MoveRecord, PgnGame};
use crate::once_cell_regex;
use crate::state::GameState;


#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ParseError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
    #[error("ply {ply}: cannot apply move {san:?}: {source}")]
    InvalidMove {
        ply: u32,
        san: String,
        #[source]
        source: TurnError,
    },
}


// Decodes PGN bytes. Valid UTF-8 passes through unchanged; otherwise the text is
// rewritten keeping only ASCII printable characters plus tab/newline/carriage-return.
pub fn sanitize_pgn_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => bytes
            .iter()
            .copied()
            .filter(|&b| matches!(b, b'\t' | b'\n' | b'\r') || (0x20..=0x7e).contains(&b))
            .map(char::from)
            .collect(),
    }
}

pub fn parse_games(text: &str) -> GameStream<'_> {
    GameStream { lines: text.lines(), pending_header_line: None, done: false }
}


pub struct GameStream<'a> {
    lines: std::str::Lines<'a>,
    // Header line that announced the next game while we were still inside the
    // previous block's move text.
    pending_header_line: Option<&'a str>,
    done: bool,
}

impl<'a> Iterator for GameStream<'a> {
    type Item = Result<PgnGame, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut block: Vec<&'a str> = Vec::new();
        let mut in_moves = false;
        if let Some(line) = self.pending_header_line.take() {
            block.push(line);
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.done = true;
                break;
            };
            if line.trim().is_empty() {
                // Blank lines separate headers from moves and games from each other,
                // but never change the machine state on their own.
                continue;
            }
            if line.trim_start().starts_with('[') {
                if in_moves {
                    self.pending_header_line = Some(line);
                    break;
                }
                block.push(line);
            } else {
                in_moves = true;
                block.push(line);
            }
        }
        if block.is_empty() { None } else { Some(finalize_block(&block)) }
    }
}


fn header_map(block: &[&str]) -> HashMap<String, String> {
    let header_re = once_cell_regex!(r#"^\[\s*(\w+)\s+"(.*)"\s*\]\s*$"#);
    let mut headers = HashMap::new();
    for line in block {
        if !line.trim_start().starts_with('[') {
            continue;
        }
        match header_re.captures(line) {
            Some(cap) => {
                headers.insert(
                    cap.get(1).unwrap().as_str().to_ascii_lowercase(),
                    cap.get(2).unwrap().as_str().to_owned(),
                );
            }
            None => warn!("Skipping malformed PGN header line: {line}"),
        }
    }
    headers
}

fn parse_pgn_date(s: &str) -> Option<Date> {
    if s.contains('?') {
        return None;
    }
    let mut parts = s.split('.');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn build_header(headers: &HashMap<String, String>) -> Result<GameHeader, ParseError> {
    let get = |tag: &str| headers.get(tag).map(String::as_str);
    let non_empty = |tag: &str| get(tag).filter(|v| !v.is_empty()).map(str::to_owned);
    let white_name =
        non_empty("white").ok_or(ParseError::MissingHeader("White"))?;
    let black_name =
        non_empty("black").ok_or(ParseError::MissingHeader("Black"))?;
    Ok(GameHeader {
        white_name,
        black_name,
        white_fide_id: get("whitefideid").and_then(|v| v.parse().ok()),
        black_fide_id: get("blackfideid").and_then(|v| v.parse().ok()),
        event: non_empty("event"),
        site: non_empty("site"),
        game_date: get("date").and_then(parse_pgn_date),
        round: non_empty("round").filter(|v| v.as_str() != "?"),
        eco: non_empty("eco"),
        opening: non_empty("opening"),
        white_elo: get("whiteelo").and_then(|v| v.parse().ok()),
        black_elo: get("blackelo").and_then(|v| v.parse().ok()),
        result: get("result").and_then(GameResult::from_str).unwrap_or(GameResult::Unknown),
        termination: non_empty("termination"),
    })
}


enum Token {
    Comment(String),
    Variation(String),
    Nag(u16),
    Word(String),
}

// Cuts move text into comments, variations, NAGs and plain words. Variations nest;
// comments do not (per the PGN standard a `}` always closes the comment).
fn tokenize_movetext(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '{' => {
                let mut comment = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    comment.push(c);
                }
                tokens.push(Token::Comment(comment.trim().to_owned()));
            }
            '(' => {
                let mut variation = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    variation.push(c);
                }
                tokens.push(Token::Variation(variation.trim().to_owned()));
            }
            '$' => {
                let mut digits = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Ok(nag) = digits.parse() {
                    tokens.push(Token::Nag(nag));
                }
            }
            _ => {
                let mut word = String::from(ch);
                while let Some(c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '(' | '$') {
                        break;
                    }
                    word.push(*c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

// Peels a `12.` / `12...` prefix off a word. Returns the SAN remainder, if any.
// Castling `0-0` must survive: the prefix is only a number when dots follow it.
fn strip_move_number(word: &str) -> Option<&str> {
    let number_re = once_cell_regex!(r"^(\d+\.+)?([^.]*)$");
    let cap = number_re.captures(word)?;
    let rest = cap.get(2).map_or("", |m| m.as_str());
    if rest.is_empty() || rest.chars().all(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(rest)
    }
}

fn finalize_block(block: &[&str]) -> Result<PgnGame, ParseError> {
    let source_pgn = block.join("\n");
    let headers = header_map(block);
    let header = build_header(&headers)?;

    let movetext = block
        .iter()
        .filter(|line| !line.trim_start().starts_with('['))
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let mut moves: Vec<MoveRecord> = Vec::new();
    let mut pending_comments: Vec<String> = Vec::new();
    let mut pending_variations: Vec<String> = Vec::new();
    let mut pending_nags: Vec<u16> = Vec::new();
    let mut state = GameState::initial();
    let mut ply: u32 = 0;

    for token in tokenize_movetext(&movetext) {
        match token {
            Token::Comment(comment) => match moves.last_mut() {
                Some(mv) => mv.comments_after.push(comment),
                None => pending_comments.push(comment),
            },
            Token::Variation(variation) => match moves.last_mut() {
                Some(mv) => mv.variations.push(variation),
                None => pending_variations.push(variation),
            },
            Token::Nag(nag) => match moves.last_mut() {
                Some(mv) => mv.nags.push(nag),
                None => pending_nags.push(nag),
            },
            Token::Word(word) => {
                if GameResult::from_str(&word).is_some() {
                    continue;
                }
                let Some(san) = strip_move_number(&word) else {
                    continue;
                };
                ply += 1;
                let side_to_move =
                    if ply % 2 == 1 { Force::White } else { Force::Black };
                let fen_before = state.to_fen(side_to_move);
                let applied = state.apply(san, side_to_move).map_err(|source| {
                    ParseError::InvalidMove { ply, san: san.to_owned(), source }
                })?;
                let fen_after = state.to_fen(side_to_move.opponent());
                moves.push(MoveRecord {
                    ply_number: ply,
                    side_to_move,
                    san: san.to_owned(),
                    uci: Some(applied.uci),
                    fen_before,
                    fen_after,
                    is_capture: applied.captured.is_some(),
                    is_check: applied.is_check,
                    is_mate: applied.is_mate,
                    comments_before: std::mem::take(&mut pending_comments),
                    comments_after: Vec::new(),
                    variations: std::mem::take(&mut pending_variations),
                    nags: std::mem::take(&mut pending_nags),
                });
            }
        }
    }

    Ok(PgnGame { header, moves, source_pgn })
}


#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_all(text: &str) -> Vec<Result<PgnGame, ParseError>> {
        parse_games(text).collect()
    }

    #[test]
    fn single_game() {
        let games = parse_all(indoc! {r#"
            [White "A"]
            [Black "B"]
            [Result "*"]

            1. e4 e5 2. Nf3 Nc6 *
        "#});
        let [game] = games.as_slice() else { panic!("expected one game") };
        let game = game.as_ref().unwrap();
        assert_eq!(game.header.white_name, "A");
        assert_eq!(game.header.result, GameResult::Unknown);
        assert_eq!(game.moves.len(), 4);
        assert_eq!(game.moves[3].san, "Nc6");
        assert_eq!(
            game.moves[3].fen_after,
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
        );
    }

    #[test]
    fn two_games_without_blank_line_between() {
        // A header line in move context starts a new game.
        let games = parse_all(indoc! {r#"
            [White "A"]
            [Black "B"]
            1. e4 e5 *
            [White "C"]
            [Black "D"]
            1. d4 d5 *
        "#});
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].as_ref().unwrap().header.white_name, "C");
    }

    #[test]
    fn empty_input_yields_no_games() {
        assert!(parse_all("").is_empty());
        assert!(parse_all("\n\n  \n").is_empty());
    }

    #[test]
    fn missing_required_header() {
        let games = parse_all("[White \"A\"]\n1. e4 *\n");
        assert_eq!(games.len(), 1);
        assert_eq!(games[0], Err(ParseError::MissingHeader("Black")));
    }

    #[test]
    fn comments_variations_and_nags() {
        let games = parse_all(indoc! {r#"
            [White "A"]
            [Black "B"]
            {Pre-game remark} 1. e4 {best by test} $1 e5 (1... c5 2. Nf3) 2. Nf3 *
        "#});
        let game = games[0].as_ref().unwrap();
        assert_eq!(game.moves[0].comments_before, vec!["Pre-game remark".to_owned()]);
        assert_eq!(game.moves[0].comments_after, vec!["best by test".to_owned()]);
        assert_eq!(game.moves[0].nags, vec![1]);
        assert_eq!(game.moves[1].variations, vec!["1... c5 2. Nf3".to_owned()]);
    }

    #[test]
    fn invalid_move_aborts_the_game() {
        let games = parse_all("[White \"A\"]\n[Black \"B\"]\n1. e4 Qh1 *\n");
        match &games[0] {
            Err(ParseError::InvalidMove { ply, san, .. }) => {
                assert_eq!(*ply, 2);
                assert_eq!(san, "Qh1");
            }
            other => panic!("expected InvalidMove, got {other:?}"),
        }
    }

    #[test]
    fn date_and_elo_headers() {
        let games = parse_all(indoc! {r#"
            [White "A"]
            [Black "B"]
            [Date "2021.09.03"]
            [WhiteElo "2750"]
            [BlackElo "?"]
            1. e4 *
        "#});
        let header = &games[0].as_ref().unwrap().header;
        assert_eq!(
            header.game_date,
            Some(Date::from_calendar_date(2021, Month::September, 3).unwrap())
        );
        assert_eq!(header.white_elo, Some(2750));
        assert_eq!(header.black_elo, None);
    }

    #[test]
    fn unknown_date_is_tolerated() {
        assert_eq!(parse_pgn_date("????.??.??"), None);
        assert_eq!(parse_pgn_date("2021.??.??"), None);
    }

    #[test]
    fn sanitization_keeps_ascii() {
        let mut bytes = b"[White \"A\"]\n".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"[Black \"B\"]\n1. e4 *\n");
        let text = sanitize_pgn_bytes(&bytes);
        assert!(text.is_ascii());
        let games = parse_all(&text);
        assert_eq!(games[0].as_ref().unwrap().moves.len(), 1);
    }

    #[test]
    fn move_number_stripping() {
        assert_eq!(strip_move_number("12."), None);
        assert_eq!(strip_move_number("12..."), None);
        assert_eq!(strip_move_number("1.e4"), Some("e4"));
        assert_eq!(strip_move_number("0-0"), Some("0-0"));
        assert_eq!(strip_move_number("e4"), Some("e4"));
    }

    #[test]
    fn glued_move_numbers() {
        let games = parse_all("[White \"A\"]\n[Black \"B\"]\n1.e4 e5 2.Nf3 *\n");
        let game = games[0].as_ref().unwrap();
        let sans: Vec<_> = game.moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "e5", "Nf3"]);
    }
}
