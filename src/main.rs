use arcade::config::{ArcadeConfig, DEFAULT_HEIGHT, DEFAULT_WIDTH, GAME_NAMES};
use arcade::scores::Leaderboard;
use arcade::{CliRenderer, Engine, TermInput};
use std::cell::Cell;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

// The per-tick constants assume a 60 Hz display
const FRAME_TIME: Duration = Duration::from_micros(16_667);

fn load_config() -> Result<ArcadeConfig, Box<dyn Error>> {
    match std::env::var_os("ARCADE_CONFIG") {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            log::info!("loaded config from {:?}", path);
            Ok(ArcadeConfig::from_json(&json)?)
        }
        None => Ok(ArcadeConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(name) = std::env::args().nth(1) else {
        eprintln!("usage: arcade-cli <{}>", GAME_NAMES.join("|"));
        std::process::exit(2);
    };

    let config = load_config()?;
    let game = config.build_game(&name, DEFAULT_WIDTH, DEFAULT_HEIGHT)?;

    let outcome: Rc<Cell<Option<(u64, u32)>>> = Rc::new(Cell::new(None));
    let mut engine = Engine::new(game);
    let sink = outcome.clone();
    engine.on_game_end(move |score, level| sink.set(Some((score, level))));

    let mut renderer = CliRenderer::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)?;
    renderer.init()?;

    let clock = Instant::now();
    engine.start(&mut renderer);
    'frames: while engine.wants_frame() {
        let frame_start = Instant::now();

        for input in renderer.poll_input()? {
            match input {
                TermInput::Quit => break 'frames,
                TermInput::Key { key, code, pressed: true } => {
                    engine.handle_key_down(&key, &code);
                }
                TermInput::Key { key, code, pressed: false } => {
                    engine.handle_key_up(&key, &code);
                }
            }
        }

        engine.frame(clock.elapsed().as_secs_f64() * 1000.0, &mut renderer);

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - elapsed);
        }
    }

    if outcome.get().is_some() {
        // Leave the final frame up until the player dismisses it
        renderer.wait_for_key()?;
    }
    engine.destroy();
    renderer.cleanup()?;

    let Some((score, level)) = outcome.get() else {
        return Ok(());
    };
    println!("{}: final score {} at level {}", name, score, level);

    let path = std::env::var_os("ARCADE_SCORES").map(PathBuf::from);
    let mut board = match &path {
        Some(path) => Leaderboard::load_from(path)?,
        None => Leaderboard::new(),
    };
    if let Some(rank) = board.record(&name, score, level) {
        println!("New high score, rank {}", rank);
    }
    if let Some(path) = &path {
        board.save_to(path)?;
    }
    Ok(())
}
