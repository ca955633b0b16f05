// Shared fixtures and helpers for tests. Not compiled into release binaries in any
// meaningful way, but kept public so integration tests and the console crate's
// tests can use the same canned games.

use crate::board::TurnError;
use crate::force::Force;
use crate::game::MoveRecord;
use crate::state::GameState;


// Applies a whitespace-separated SAN log ("1.e4 e5 2.Nf3 ...") to a fresh game.
// Returns the final state and the force to move next.
pub fn replay_san_log(log: &str) -> Result<(GameState, Force), TurnError> {
    let mut state = GameState::initial();
    let mut force = Force::White;
    for token in log.split_whitespace() {
        let san = if token.starts_with(|c: char| c.is_ascii_digit()) && token.contains('.') {
            token.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        } else {
            token
        };
        if san.is_empty() {
            continue;
        }
        state.apply(san, force)?;
        force = force.opponent();
    }
    Ok((state, force))
}

// A move record with just enough context for detector tests.
pub fn stub_move(
    ply_number: u32, side_to_move: Force, san: &str, fen_before: &str, fen_after: &str,
) -> MoveRecord {
    MoveRecord {
        ply_number,
        side_to_move,
        san: san.to_owned(),
        uci: None,
        fen_before: fen_before.to_owned(),
        fen_after: fen_after.to_owned(),
        is_capture: san.contains('x'),
        is_check: san.ends_with('+'),
        is_mate: san.ends_with('#'),
        comments_before: Vec::new(),
        comments_after: Vec::new(),
        variations: Vec::new(),
        nags: Vec::new(),
    }
}


pub const TINY_GAME_PGN: &str = r#"[White "A"]
[Black "B"]
[Result "*"]

1. e4 e5 2. Nf3 Nc6 *
"#;

// Two games with no blank line between them: the second header line must start a
// new game.
pub const TWO_GAMES_GLUED_PGN: &str = r#"[White "A"]
[Black "B"]
[Result "1-0"]
1. e4 e5 1-0
[White "C"]
[Black "D"]
[Result "0-1"]
1. d4 d5 0-1
"#;

// White trades off Black's c-pawn, obtains the a-c majority and rolls it forward.
pub const QUEENSIDE_MAJORITY_PGN: &str = r#"[Event "Fixture Cup"]
[Site "Budapest HUN"]
[Date "2024.03.10"]
[Round "1"]
[White "Petrov, Anton"]
[Black "Molnar, Denes"]
[Result "1-0"]
[WhiteElo "2450"]
[BlackElo "2380"]
[ECO "A45"]

1. d4 c5 2. e3 cxd4 3. exd4 a6 4. b4 e6 5. a4 Be7 6. Nf3 Nf6 7. Be2 O-O
8. O-O g6 9. b5 Kh8 10. bxa6 Kg7 1-0
"#;

// Textbook greek gift: bishop takes h7, knight follows to g5, queen joins.
pub const GREEK_GIFT_PGN: &str = r#"[White "Attacker"]
[Black "Defender"]
[Result "1-0"]

1. e4 e6 2. d4 d5 3. Bd3 Nf6 4. e5 Nfd7 5. Nf3 Be7 6. O-O O-O
7. Bxh7+ Kxh7 8. Ng5+ Kg8 9. Qh5 1-0
"#;
