#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{ArgMatches, Command, arg};
use log::error;
use time::Date;
use time::macros::format_description;
use uuid::Uuid;

use chessbuddy::Force;
use chessbuddy::patterns::PatternRegistry;
use chessbuddy_console::config::{DEFAULT_BATCH_LABEL, resolve_db_config};
use chessbuddy_console::database::SqlxDatabase;
use chessbuddy_console::embedder::FenHashEmbedder;
use chessbuddy_console::ingest::{ingest_pgn_file, inspect_pgn, sync_players_from_pgn};
use chessbuddy_console::persistence::{
    ChessReader, DEFAULT_HEALTH_EXTENSIONS, PatternGameFilter,
};
use chessbuddy_console::retrieve;


fn main() -> ExitCode {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .filter_module("sqlx::query", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let matches = Command::new("ChessBuddy")
        .version(clap::crate_version!())
        .about("PGN ingestion and position-similarity console")
        .subcommand_required(true)
        .arg(arg!(--db [URI] "Postgres connection string (or CHESSBUDDY_DB_URI / DATABASE_URL)").global(true))
        .arg(arg!(--"max-pool-size" [N] "Connection pool size").global(true))
        .subcommand(
            Command::new("ingest")
                .about("Ingest a PGN archive into the database")
                .arg(arg!(<pgn> "Path to the PGN file"))
                .arg(arg!(--"batch-label" [LABEL] "Label for the ingestion batch"))
                .arg(arg!(--"dry-run" "Parse and report without touching the database")),
        )
        .subcommand(
            Command::new("batches")
                .about("Inspect ingestion batches")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List all batches"))
                .subcommand(
                    Command::new("show")
                        .about("Show one batch with its counts")
                        .arg(arg!(<batch_id> "Batch id")),
                ),
        )
        .subcommand(
            Command::new("players")
                .about("Player maintenance")
                .subcommand_required(true)
                .subcommand(
                    Command::new("sync")
                        .about("Register the players of a PGN file without ingesting games")
                        .arg(arg!(<pgn> "Path to the PGN file")),
                ),
        )
        .subcommand(
            Command::new("health")
                .about("Database diagnostics")
                .subcommand_required(true)
                .subcommand(Command::new("check").about("Report server and extension status")),
        )
        .subcommand(
            Command::new("retrieve")
                .about("Read queries over ingested data")
                .subcommand_required(true)
                .subcommand(
                    Command::new("similar")
                        .about("Positions closest to a FEN by cosine distance")
                        .arg(arg!(<fen> "Full FEN string"))
                        .arg(arg!(--limit [N] "Number of neighbours")),
                )
                .subcommand(
                    Command::new("game")
                        .about("One game with its detections")
                        .arg(arg!(<game_id> "Game id")),
                )
                .subcommand(
                    Command::new("games")
                        .about("Recently ingested games")
                        .arg(arg!(--limit [N]))
                        .arg(arg!(--offset [N])),
                )
                .subcommand(
                    Command::new("fen")
                        .about("Stored details of a FEN")
                        .arg(arg!(<fen> "Full FEN string")),
                )
                .subcommand(
                    Command::new("player")
                        .about("Players matching a name fragment")
                        .arg(arg!(<name> "Case-insensitive substring")),
                )
                .subcommand(
                    Command::new("batch")
                        .about("Summary of one batch")
                        .arg(arg!(<batch_id> "Batch id")),
                )
                .subcommand(
                    Command::new("pattern")
                        .about("Games with matching pattern detections")
                        .arg(arg!(--pattern [ID] ... "Pattern id (repeatable)"))
                        .arg(arg!(--"detected-by" [COLOR] "white or black"))
                        .arg(arg!(--success [BOOL] "true or false"))
                        .arg(arg!(--"min-confidence" [X]))
                        .arg(arg!(--"max-confidence" [X]))
                        .arg(arg!(--eco [PREFIX] "ECO code prefix"))
                        .arg(arg!(--opening [TEXT] "Opening name substring"))
                        .arg(arg!(--"min-white-elo" [N]))
                        .arg(arg!(--"max-white-elo" [N]))
                        .arg(arg!(--"min-black-elo" [N]))
                        .arg(arg!(--"max-black-elo" [N]))
                        .arg(arg!(--"min-rating-difference" [N] "White Elo minus Black Elo"))
                        .arg(arg!(--"min-moves" [N]))
                        .arg(arg!(--"max-moves" [N]))
                        .arg(arg!(--from [DATE] "Earliest game date, YYYY-MM-DD"))
                        .arg(arg!(--to [DATE] "Latest game date, YYYY-MM-DD"))
                        .arg(arg!(--white [TEXT] "White player name substring"))
                        .arg(arg!(--black [TEXT] "Black player name substring"))
                        .arg(arg!(--result [RESULT] "1-0, 0-1, 1/2-1/2 or *"))
                        .arg(arg!(--limit [N]))
                        .arg(arg!(--offset [N])),
                )
                .subcommand(
                    Command::new("export")
                        .about("Print the stored PGN of a game")
                        .arg(arg!(<game_id> "Game id")),
                ),
        )
        .get_matches();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn connect(matches: &ArgMatches) -> anyhow::Result<SqlxDatabase> {
    let config = resolve_db_config(
        matches.get_one::<String>("db").map(String::as_str),
        matches.get_one::<String>("max-pool-size").map(String::as_str),
    )?;
    SqlxDatabase::connect(&config.db_uri, config.max_pool_size).await
}

fn parse_uuid(value: &str, what: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| anyhow::anyhow!("invalid {what}: {value:?}"))
}

fn parse_date(value: &str) -> anyhow::Result<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|_| anyhow::anyhow!("invalid date (expected YYYY-MM-DD): {value:?}"))
}

fn parse_number<T: std::str::FromStr>(
    matches: &ArgMatches, name: &str,
) -> anyhow::Result<Option<T>> {
    match matches.get_one::<String>(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("invalid value for --{name}: {value:?}")),
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("ingest", sub)) => {
            let pgn_path = PathBuf::from(sub.get_one::<String>("pgn").unwrap());
            if sub.get_flag("dry-run") {
                let report = inspect_pgn(&pgn_path)?;
                println!(
                    "total_games={} total_moves={} unique_players={}",
                    report.total_games, report.total_moves, report.unique_players
                );
                for player in &report.players {
                    println!("player {player}");
                }
                return Ok(());
            }
            let batch_label = sub
                .get_one::<String>("batch-label")
                .map(String::as_str)
                .unwrap_or(DEFAULT_BATCH_LABEL);
            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = Arc::clone(&stop);
                ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
            }
            async_std::task::block_on(async {
                let db = connect(sub).await?;
                let registry = PatternRegistry::standard();
                let report = ingest_pgn_file(
                    &db,
                    &FenHashEmbedder,
                    None,
                    &registry,
                    &pgn_path,
                    batch_label,
                    &stop,
                )
                .await?;
                println!(
                    "batch={} games={} failed={} positions={} embeddings={} detections={}",
                    report.batch_id,
                    report.games_ingested,
                    report.games_failed,
                    report.positions_recorded,
                    report.embeddings_computed,
                    report.detections_recorded,
                );
                Ok(())
            })
        }
        Some(("batches", sub)) => async_std::task::block_on(async {
            let db = connect(sub).await?;
            match sub.subcommand() {
                Some(("list", _)) => {
                    for batch in db.list_batches().await? {
                        println!(
                            "{} {} label={:?} checksum={}",
                            batch.batch_id, batch.ingested_at, batch.label, batch.checksum
                        );
                    }
                    Ok(())
                }
                Some(("show", show)) => {
                    let batch_id =
                        parse_uuid(show.get_one::<String>("batch_id").unwrap(), "batch id")?;
                    match db.get_batch_summary(batch_id).await? {
                        None => anyhow::bail!("no such batch: {batch_id}"),
                        Some(summary) => {
                            println!(
                                "{} source={} label={:?}",
                                summary.batch.batch_id,
                                summary.batch.source_path,
                                summary.batch.label,
                            );
                            println!(
                                "games={} positions={} players={} detections={} dates={:?}..{:?}",
                                summary.game_count,
                                summary.position_count,
                                summary.player_count,
                                summary.detection_count,
                                summary.earliest_game,
                                summary.latest_game,
                            );
                            Ok(())
                        }
                    }
                }
                _ => unreachable!("subcommand required"),
            }
        }),
        Some(("players", sub)) => match sub.subcommand() {
            Some(("sync", sync)) => {
                let pgn_path = PathBuf::from(sync.get_one::<String>("pgn").unwrap());
                async_std::task::block_on(async {
                    let db = connect(sub).await?;
                    let count = sync_players_from_pgn(&db, &pgn_path).await?;
                    println!("players_synced={count}");
                    Ok(())
                })
            }
            _ => unreachable!("subcommand required"),
        },
        Some(("health", sub)) => match sub.subcommand() {
            Some(("check", _)) => async_std::task::block_on(async {
                let db = connect(sub).await?;
                let report = db.health_check(DEFAULT_HEALTH_EXTENSIONS).await?;
                println!("server_version={}", report.server_version);
                println!("database={}", report.database);
                for (name, available) in &report.extensions {
                    println!("extension {name}={}", if *available { "ok" } else { "missing" });
                }
                Ok(())
            }),
            _ => unreachable!("subcommand required"),
        },
        Some(("retrieve", sub)) => async_std::task::block_on(run_retrieve(sub)),
        _ => unreachable!("subcommand required"),
    }
}

async fn run_retrieve(matches: &ArgMatches) -> anyhow::Result<()> {
    let db = connect(matches).await?;
    match matches.subcommand() {
        Some(("similar", sub)) => {
            let fen = sub.get_one::<String>("fen").unwrap();
            let limit = parse_number(sub, "limit")?.unwrap_or(10);
            for similar in retrieve::similar_positions(&db, fen, limit).await? {
                println!(
                    "{:.6} usage={} {}",
                    similar.distance, similar.usage_count, similar.fen_text
                );
            }
            Ok(())
        }
        Some(("game", sub)) => {
            let game_id = parse_uuid(sub.get_one::<String>("game_id").unwrap(), "game id")?;
            match db.get_game_detail(game_id).await? {
                None => anyhow::bail!("no such game: {game_id}"),
                Some(detail) => {
                    let game = &detail.game;
                    println!(
                        "{} {} vs {} {} moves={} date={:?}",
                        game.game_id,
                        game.white_name,
                        game.black_name,
                        game.result,
                        detail.move_count,
                        game.game_date,
                    );
                    for detection in &detail.detections {
                        println!(
                            "detection {} by={} success={} confidence={:.2} outcome={:?}",
                            detection.pattern_id,
                            detection.detected_by_color,
                            detection.success,
                            detection.confidence,
                            detection.outcome,
                        );
                    }
                    Ok(())
                }
            }
        }
        Some(("games", sub)) => {
            let limit = parse_number(sub, "limit")?.unwrap_or(20);
            let offset = parse_number(sub, "offset")?.unwrap_or(0);
            for game in db.list_games(limit, offset).await? {
                println!(
                    "{} {} vs {} {} date={:?}",
                    game.game_id, game.white_name, game.black_name, game.result, game.game_date
                );
            }
            Ok(())
        }
        Some(("fen", sub)) => {
            let fen = sub.get_one::<String>("fen").unwrap();
            match db.get_fen_details(fen).await? {
                None => anyhow::bail!("FEN not found: {fen}"),
                Some(details) => {
                    println!(
                        "{} side={} castling={} material={}",
                        details.fen.fen_id,
                        details.fen.side_to_move,
                        details.fen.castling_rights,
                        details.fen.material_signature,
                    );
                    println!(
                        "usage_count={} embedding_version={:?}",
                        details.usage_count, details.embedding_version
                    );
                    Ok(())
                }
            }
        }
        Some(("player", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            for player in db.search_players(name, 50).await? {
                println!(
                    "{} {:?} fide_id={:?}",
                    player.player_id, player.full_name, player.fide_id
                );
            }
            Ok(())
        }
        Some(("batch", sub)) => {
            let batch_id = parse_uuid(sub.get_one::<String>("batch_id").unwrap(), "batch id")?;
            match db.get_batch_summary(batch_id).await? {
                None => anyhow::bail!("no such batch: {batch_id}"),
                Some(summary) => {
                    println!(
                        "{} games={} positions={} players={} detections={}",
                        summary.batch.batch_id,
                        summary.game_count,
                        summary.position_count,
                        summary.player_count,
                        summary.detection_count,
                    );
                    Ok(())
                }
            }
        }
        Some(("pattern", sub)) => {
            let filter = pattern_filter_from_args(sub)?;
            let (rows, summary) = retrieve::pattern_query(&db, &filter).await?;
            for row in &rows {
                println!(
                    "{} {} vs {} {} pattern={} by={} success={} confidence={:.2} moves={} metadata={}",
                    row.game.game_id,
                    row.game.white_name,
                    row.game.black_name,
                    row.game.result,
                    row.pattern_id,
                    row.detected_by_color,
                    row.success,
                    row.confidence,
                    row.move_count,
                    row.metadata,
                );
            }
            println!(
                "total={} avg_confidence={:.3} white={} black={} dates={:?}..{:?}",
                summary.total,
                summary.avg_confidence,
                summary.white_count,
                summary.black_count,
                summary.earliest,
                summary.latest,
            );
            Ok(())
        }
        Some(("export", sub)) => {
            let game_id = parse_uuid(sub.get_one::<String>("game_id").unwrap(), "game id")?;
            match db.get_game_pgn(game_id).await? {
                None => anyhow::bail!("no such game: {game_id}"),
                Some(pgn) => {
                    println!("{pgn}");
                    Ok(())
                }
            }
        }
        _ => unreachable!("subcommand required"),
    }
}

fn pattern_filter_from_args(matches: &ArgMatches) -> anyhow::Result<PatternGameFilter> {
    let detected_by = match matches.get_one::<String>("detected-by").map(String::as_str) {
        None => None,
        Some("white") => Some(Force::White),
        Some("black") => Some(Force::Black),
        Some(other) => anyhow::bail!("invalid --detected-by (white or black): {other:?}"),
    };
    let success = match matches.get_one::<String>("success").map(String::as_str) {
        None => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(other) => anyhow::bail!("invalid --success (true or false): {other:?}"),
    };
    let mut filter = PatternGameFilter {
        pattern_ids: matches
            .get_many::<String>("pattern")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        detected_by,
        success,
        min_confidence: parse_number(matches, "min-confidence")?,
        max_confidence: parse_number(matches, "max-confidence")?,
        eco_prefix: matches.get_one::<String>("eco").cloned(),
        opening_substring: matches.get_one::<String>("opening").cloned(),
        min_white_elo: parse_number(matches, "min-white-elo")?,
        max_white_elo: parse_number(matches, "max-white-elo")?,
        min_black_elo: parse_number(matches, "min-black-elo")?,
        max_black_elo: parse_number(matches, "max-black-elo")?,
        min_rating_difference: parse_number(matches, "min-rating-difference")?,
        min_move_count: parse_number(matches, "min-moves")?,
        max_move_count: parse_number(matches, "max-moves")?,
        start_date: None,
        end_date: None,
        white_name_substring: matches.get_one::<String>("white").cloned(),
        black_name_substring: matches.get_one::<String>("black").cloned(),
        result_filter: matches.get_one::<String>("result").cloned(),
        ..PatternGameFilter::default()
    };
    if let Some(value) = matches.get_one::<String>("from") {
        filter.start_date = Some(parse_date(value)?);
    }
    if let Some(value) = matches.get_one::<String>("to") {
        filter.end_date = Some(parse_date(value)?);
    }
    if let Some(limit) = parse_number(matches, "limit")? {
        filter.limit = limit;
    }
    if let Some(offset) = parse_number(matches, "offset")? {
        filter.offset = offset;
    }
    Ok(filter)
}
