use chessbuddy::fen::{fen_to_game_state, game_state_to_fen};
use chessbuddy::test_util::replay_san_log;
use chessbuddy::{Coord, Force, GameState, Piece, PieceKind, TurnError};
use pretty_assertions::assert_eq;


fn at(state: &GameState, sq: &str) -> Option<Piece> {
    state.board[Coord::from_algebraic(sq).unwrap()]
}

fn piece(kind: PieceKind, force: Force) -> Option<Piece> { Some(Piece::new(kind, force)) }


#[test]
fn italian_opening_plies() {
    let (state, next) = replay_san_log("1.e4 e5 2.Nf3 Nc6").unwrap();
    assert_eq!(next, Force::White);
    assert_eq!(at(&state, "e4"), piece(PieceKind::Pawn, Force::White));
    assert_eq!(at(&state, "e5"), piece(PieceKind::Pawn, Force::Black));
    assert_eq!(at(&state, "f3"), piece(PieceKind::Knight, Force::White));
    assert_eq!(at(&state, "c6"), piece(PieceKind::Knight, Force::Black));
    assert_eq!(
        state.to_fen(next),
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
    );
}

#[test]
fn castling_rights_decay_after_short_castle() {
    let (state, _) = replay_san_log("1.e4 e5 2.Nf3 Nc6 3.Bb5 a6 4.Ba4 Nf6 5.O-O").unwrap();
    // White lost both rights; Black still has both.
    assert_eq!(state.castling_rights.to_fen(), "kq");
    assert_eq!(at(&state, "g1"), piece(PieceKind::King, Force::White));
    assert_eq!(at(&state, "f1"), piece(PieceKind::Rook, Force::White));
}

#[test]
fn rook_moves_decay_one_side_only() {
    let (state, _) = replay_san_log("1.a4 h5 2.Ra3 Rh6").unwrap();
    assert_eq!(state.castling_rights.to_fen(), "Kq");
}

#[test]
fn capture_on_rook_home_square_decays_opponent_rights() {
    // The white h1 rook is captured at home along the long diagonal.
    let (state, _) = replay_san_log("1.Nf3 b6 2.g3 Bb7 3.Ng5 Bxh1").unwrap();
    assert_eq!(at(&state, "h1"), piece(PieceKind::Bishop, Force::Black));
    assert_eq!(state.castling_rights.to_fen(), "Qkq");
}

#[test]
fn en_passant_capture_removes_the_victim() {
    let (mut state, force) =
        fen_to_game_state("rnbqkbnr/pppp1ppp/8/3Pp3/8/8/PPP1PPPP/RNBQKBNR w KQkq e6 0 3")
            .unwrap();
    assert_eq!(force, Force::White);
    let applied = state.apply("dxe6", force).unwrap();
    assert_eq!(applied.captured, piece(PieceKind::Pawn, Force::Black));
    assert_eq!(at(&state, "e6"), piece(PieceKind::Pawn, Force::White));
    assert_eq!(at(&state, "e5"), None);
    assert_eq!(state.en_passant_target, None);
    assert!(state.to_fen(force.opponent()).contains(" b KQkq - 0 3"));
}

#[test]
fn full_square_disambiguation() {
    // Three white queens able to reach d4; only the h4 one is meant.
    let (mut state, _) =
        fen_to_game_state("4k3/8/8/8/Q6Q/8/8/Q3K3 w - - 0 40").unwrap();
    assert_eq!(
        state.clone().apply("Qd4", Force::White).unwrap_err(),
        TurnError::AmbiguousNotation
    );
    // A file disambiguator is not enough: both a-file queens reach d4.
    assert_eq!(
        state.clone().apply("Qad4", Force::White).unwrap_err(),
        TurnError::AmbiguousNotation
    );
    state.apply("Qh4d4", Force::White).unwrap();
    assert_eq!(at(&state, "d4"), piece(PieceKind::Queen, Force::White));
    assert_eq!(at(&state, "h4"), None);
}

#[test]
fn fen_round_trip_through_play() {
    let (state, next) = replay_san_log("1.d4 d5 2.c4 e6 3.Nc3 Nf6 4.Bg5 Be7").unwrap();
    let fen = state.to_fen(next);
    let (reparsed, reparsed_next) = fen_to_game_state(&fen).unwrap();
    assert_eq!(reparsed, state);
    assert_eq!(reparsed_next, next);
    assert_eq!(game_state_to_fen(&reparsed, reparsed_next), fen);
}

#[test]
fn unreachable_moves_are_rejected() {
    let mut state = GameState::initial();
    assert_eq!(state.apply("Qh5", Force::White).unwrap_err(), TurnError::Unreachable);
    assert_eq!(state.apply("zz9", Force::White).unwrap_err(), TurnError::InvalidNotation);
}
