//! Plinko Drop entry point
//!
//! The browser build is driven from JS through `plinko_drop::wasm`. Natively
//! this binary is a tool for checking the landing guarantee:
//!
//! ```text
//! plinko-drop audit [TRIALS] [SEED] [--width W] [--height H] [--max-fallback-rate 0.05] [--tuning file.json]
//! plinko-drop demo [SEED]
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::{Args, Parser, Subcommand};
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use plinko_drop::sim::{Board, BucketIndex, Trajectory, synthesize, trajectory::speed_ceiling};
    use plinko_drop::{Session, SessionEvent, Tuning};

    const DEFAULT_SEED: u64 = 0x5EED;
    const CANVAS: (f32, f32) = (800.0, 1040.0);
    const FRAME_MS: f64 = 1000.0 / 60.0;

    #[derive(Debug, Parser)]
    #[command(
        name = "plinko-drop",
        about = "Audit and demo tool for outcome-constrained plinko drops",
        version
    )]
    pub struct Cli {
        /// Tuning overrides as (partial) JSON
        #[arg(long, global = true)]
        pub tuning: Option<PathBuf>,

        #[command(subcommand)]
        pub command: Commands,
    }

    #[derive(Debug, Subcommand)]
    pub enum Commands {
        /// Synthesize many drops per bucket and check every landing.
        Audit(AuditArgs),

        /// Play one drop per bucket through a session at 60 fps.
        Demo {
            #[arg(default_value_t = DEFAULT_SEED)]
            seed: u64,
        },
    }

    #[derive(Debug, Clone, Args)]
    pub struct AuditArgs {
        /// Drops per bucket
        #[arg(default_value_t = 1000)]
        pub trials: u32,

        #[arg(default_value_t = DEFAULT_SEED)]
        pub seed: u64,

        #[arg(long, default_value_t = CANVAS.0)]
        pub width: f32,

        #[arg(long, default_value_t = CANVAS.1)]
        pub height: f32,

        /// Largest share of drops per bucket allowed to use the fallback curve
        #[arg(long = "max-fallback-rate", default_value_t = 0.05)]
        pub max_fallback_rate: f64,
    }

    fn load_tuning(path: Option<&PathBuf>) -> Result<Tuning, String> {
        let Some(path) = path else {
            return Ok(Tuning::default());
        };
        let shown = path.display();
        let json = std::fs::read_to_string(path).map_err(|e| format!("{shown}: {e}"))?;
        let tuning = Tuning::from_json(&json).map_err(|e| format!("{shown}: {e}"))?;
        log::info!("Loaded tuning from {shown}");
        Ok(tuning)
    }

    /// Same start distribution a session uses
    fn start_position(board: &Board, tuning: &Tuning, rng: &mut impl Rng) -> Vec2 {
        let jitter = rng.random_range(-1.0..=1.0) * tuning.session.start_jitter * board.spacing;
        Vec2::new(
            board.width * 0.5 + jitter,
            board.height * tuning.session.start_height_ratio,
        )
    }

    /// Guarantee violations of one delivered trajectory
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    struct DropCheck {
        /// Ends outside the target span minus the safety margin
        missed: bool,
        too_fast: bool,
    }

    fn check_drop(trajectory: &Trajectory, board: &Board, tuning: &Tuning) -> DropCheck {
        let ceiling = speed_ceiling(board, tuning.synthesis.max_keyframe_speed);
        DropCheck {
            missed: !trajectory.lands_in_target(board, tuning.synthesis.landing_margin_ratio),
            too_fast: trajectory.max_speed() > ceiling,
        }
    }

    #[derive(Debug, Default)]
    struct BucketAudit {
        misses: u32,
        too_fast: u32,
        fallbacks: u32,
        attempts: u64,
    }

    impl BucketAudit {
        fn fallback_rate(&self, trials: u32) -> f64 {
            f64::from(self.fallbacks) / f64::from(trials.max(1))
        }
    }

    /// Synthesize `trials` drops per bucket. Clean when every drop lands
    /// inside its bucket's margin, none exceeds the speed ceiling and no
    /// bucket falls back more often than allowed.
    fn audit(args: &AuditArgs, tuning: &Tuning) -> bool {
        let board = Board::layout(args.width, args.height, &tuning.board);
        let mut rng = Pcg32::seed_from_u64(args.seed);
        let mut clean = true;

        println!(
            "Auditing {} drops per bucket on {}x{} (seed {:#x})",
            args.trials, board.width, board.height, args.seed
        );
        println!("bucket  misses  too-fast  fallback%  mean-attempts");

        for target in BucketIndex::all() {
            let mut result = BucketAudit::default();
            for _ in 0..args.trials {
                let start = start_position(&board, tuning, &mut rng);
                let synthesis = synthesize(start, target, &board, tuning, &mut rng);
                let check = check_drop(&synthesis.trajectory, &board, tuning);

                if check.missed {
                    result.misses += 1;
                    log::error!(
                        "Bucket {target}: landed at x={:.1}",
                        synthesis.trajectory.last().pos.x
                    );
                }
                if check.too_fast {
                    result.too_fast += 1;
                }
                if synthesis.report.used_fallback {
                    result.fallbacks += 1;
                }
                result.attempts += u64::from(synthesis.report.attempts);
            }

            let rate = result.fallback_rate(args.trials);
            println!(
                "{:>6}  {:>6}  {:>8}  {:>8.2}%  {:>13.2}",
                target.get(),
                result.misses,
                result.too_fast,
                100.0 * rate,
                result.attempts as f64 / f64::from(args.trials.max(1))
            );
            if rate > args.max_fallback_rate {
                eprintln!(
                    "Bucket {target}: fallback rate {:.2}% above {:.2}%",
                    100.0 * rate,
                    100.0 * args.max_fallback_rate
                );
                clean = false;
            }
            clean &= result.misses == 0 && result.too_fast == 0;
        }

        clean
    }

    /// Drive a session through one drop per bucket at 60 fps
    fn demo(seed: u64, tuning: Tuning) -> Result<(), String> {
        let mut session = Session::with_tuning(CANVAS.0, CANVAS.1, tuning, Some(seed))
            .map_err(|e| e.to_string())?;
        let mut now = 0.0;

        for target in BucketIndex::all() {
            session
                .request_drop(target.get(), now)
                .map_err(|e| e.to_string())?;
            loop {
                now += FRAME_MS;
                session.tick(now);
                let events = session.drain_events();
                for event in &events {
                    println!(
                        "{:>9.1} ms  {}",
                        now,
                        serde_json::to_string(event).map_err(|e| e.to_string())?
                    );
                }
                if events
                    .iter()
                    .any(|e| matches!(e, SessionEvent::BallCleared { .. }))
                {
                    break;
                }
            }
        }

        let diagnostics = session.diagnostics().to_json().map_err(|e| e.to_string())?;
        println!("{diagnostics}");
        Ok(())
    }

    pub fn run(cli: Cli) -> Result<bool, String> {
        let tuning = load_tuning(cli.tuning.as_ref())?;
        match cli.command {
            Commands::Audit(args) => Ok(audit(&args, &tuning)),
            Commands::Demo { seed } => demo(seed, tuning).map(|_| true),
        }
    }

    pub fn run_from_env() -> ExitCode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

        match run(Cli::parse()) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => {
                eprintln!("Landing guarantee violated");
                ExitCode::FAILURE
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::from(2)
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use plinko_drop::sim::{Keyframe, TrajectoryOrigin};

        fn board() -> Board {
            Board::layout(CANVAS.0, CANVAS.1, &Tuning::default().board)
        }

        fn ending_at(x: f32, board: &Board) -> Trajectory {
            Trajectory::new(
                vec![
                    Keyframe::new(Vec2::new(400.0, 30.0), 0.0),
                    Keyframe::new(Vec2::new(x, board.bucket_top()), 3000.0),
                ],
                BucketIndex::new(1).unwrap(),
                TrajectoryOrigin::Fallback,
            )
            .unwrap()
        }

        #[test]
        fn test_check_counts_margin_landing_as_miss() {
            let board = board();
            let tuning = Tuning::default();
            // Inside bucket 1 (0..160) but within its 10% margin
            assert!(check_drop(&ending_at(8.0, &board), &board, &tuning).missed);
            assert!(check_drop(&ending_at(152.0, &board), &board, &tuning).missed);
            assert_eq!(check_drop(&ending_at(80.0, &board), &board, &tuning), DropCheck::default());
        }

        #[test]
        fn test_fallback_rate_threshold_fails_audit() {
            let tuning = Tuning {
                synthesis: plinko_drop::tuning::SynthesisTuning {
                    max_steps: 2,
                    max_attempts: 1,
                    ..Default::default()
                },
                ..Default::default()
            };
            let args = AuditArgs {
                trials: 5,
                seed: 1,
                width: CANVAS.0,
                height: CANVAS.1,
                max_fallback_rate: 0.5,
            };
            assert!(!audit(&args, &tuning));
        }

        #[test]
        fn test_cli_parses_commands() {
            let cli = Cli::try_parse_from(["plinko-drop", "audit", "200", "7"]).unwrap();
            match cli.command {
                Commands::Audit(args) => {
                    assert_eq!(args.trials, 200);
                    assert_eq!(args.seed, 7);
                    assert_eq!(args.max_fallback_rate, 0.05);
                }
                other => panic!("unexpected command {other:?}"),
            }

            let cli = Cli::try_parse_from(["plinko-drop", "demo", "--tuning", "t.json"]).unwrap();
            assert_eq!(cli.tuning, Some(PathBuf::from("t.json")));
            assert!(matches!(cli.command, Commands::Demo { seed: DEFAULT_SEED }));
        }

        #[test]
        fn test_cli_rejects_missing_tuning_path() {
            assert!(Cli::try_parse_from(["plinko-drop", "audit", "--tuning"]).is_err());
            assert!(Cli::try_parse_from(["plinko-drop"]).is_err());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    native::run_from_env()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser entry point is `plinko_drop::wasm::start`
}
