use chessbuddy::patterns::{
    GreekGiftSacrifice, LucenaPosition, Outcome, PatternDetector, PhilidorPosition,
    QueensideMajorityAttack,
};
use chessbuddy::pgn::parse_games;
use chessbuddy::test_util::{
    GREEK_GIFT_PGN, QUEENSIDE_MAJORITY_PGN, TINY_GAME_PGN, stub_move,
};
use chessbuddy::{Force, GameResult, MoveRecord, PgnGame};
use pretty_assertions::assert_eq;


fn only_game(text: &str) -> PgnGame {
    let mut games: Vec<_> = parse_games(text).map(|game| game.unwrap()).collect();
    assert_eq!(games.len(), 1);
    games.pop().unwrap()
}

#[test]
fn queenside_majority_is_detected_for_white() {
    let game = only_game(QUEENSIDE_MAJORITY_PGN);
    let detector = QueensideMajorityAttack;
    let detection = detector.detect(&game.moves, game.header.result);
    assert!(detection.detected);
    assert_eq!(detection.initiating_color, Some(Force::White));
    assert!(detection.confidence >= 0.55, "confidence {}", detection.confidence);
    assert!(detection.start_ply.is_some());
    assert!(detection.end_ply >= detection.start_ply);

    let (success, outcome) = detector.classify_success(&detection, game.header.result);
    assert!(success);
    assert_eq!(outcome, Some(Outcome::Victory));
}

#[test]
fn quiet_opening_triggers_nothing() {
    let game = only_game(TINY_GAME_PGN);
    for detector in chessbuddy::patterns::PatternRegistry::standard().all() {
        let detection = detector.detect(&game.moves, game.header.result);
        assert!(!detection.detected, "{} fired on 1.e4 e5 2.Nf3 Nc6", detector.pattern_id());
    }
}

#[test]
fn greek_gift_with_follow_up() {
    let game = only_game(GREEK_GIFT_PGN);
    let detector = GreekGiftSacrifice;
    let detection = detector.detect(&game.moves, game.header.result);
    assert!(detection.detected);
    assert_eq!(detection.initiating_color, Some(Force::White));
    assert_eq!(detection.start_ply, Some(13));
    assert!(detection.confidence > 0.8, "confidence {}", detection.confidence);
    assert_eq!(detection.metadata["knight_follow_up"], true);
    assert_eq!(detection.metadata["king_recaptured"], true);
}

#[test]
fn lucena_shape_is_recognized() {
    let moves: Vec<MoveRecord> = vec![stub_move(
        80,
        Force::White,
        "Rc1",
        "1K6/1P1k4/8/8/8/8/r7/R7 b - - 11 60",
        "1K6/1P1k4/8/8/8/8/r7/2R5 b - - 12 60",
    )];
    let detector = LucenaPosition;
    let detection = detector.detect(&moves, GameResult::WhiteWins);
    assert!(detection.detected);
    assert_eq!(detection.initiating_color, Some(Force::White));
    assert_eq!(detection.metadata["pawn_square"], "b7");
    let (success, outcome) = detector.classify_success(&detection, GameResult::WhiteWins);
    assert!(success);
    assert_eq!(outcome, Some(Outcome::Victory));
}

#[test]
fn philidor_defense_counts_a_draw_as_success() {
    let moves: Vec<MoveRecord> = vec![stub_move(
        90,
        Force::Black,
        "Ra6",
        "4k3/8/r7/4P3/4K3/8/8/3R4 w - - 10 50",
        "4k3/8/r7/4P3/4K3/8/8/3R4 w - - 11 50",
    )];
    let detector = PhilidorPosition;
    let detection = detector.detect(&moves, GameResult::Draw);
    assert!(detection.detected);
    assert_eq!(detection.initiating_color, Some(Force::Black));
    let (success, outcome) = detector.classify_success(&detection, GameResult::Draw);
    // The override: holding the draw is the defender's success.
    assert!(success);
    assert_eq!(outcome, Some(Outcome::DrawNeutral));
}

#[test]
fn philidor_losing_the_endgame_is_a_defeat() {
    let moves: Vec<MoveRecord> = vec![stub_move(
        90,
        Force::Black,
        "Ra6",
        "4k3/8/r7/4P3/4K3/8/8/3R4 w - - 10 50",
        "4k3/8/r7/4P3/4K3/8/8/3R4 w - - 11 50",
    )];
    let detector = PhilidorPosition;
    let detection = detector.detect(&moves, GameResult::WhiteWins);
    let (success, outcome) = detector.classify_success(&detection, GameResult::WhiteWins);
    assert!(!success);
    assert_eq!(outcome, Some(Outcome::Defeat));
}
