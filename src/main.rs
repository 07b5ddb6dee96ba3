/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use log::{info, warn};

use config::GameConfig;
use sim::highscore::HighscoreStore;
use sim::level;
use sim::world::{Phase, TitleAction, WorldState};
use ui::input::{InputState, KEYS_DOWN, KEYS_LEFT, KEYS_RIGHT, KEYS_UP};
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const PAGE: isize = 10;

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_BACK: &[KeyCode] = &[KeyCode::Esc, KeyCode::Backspace];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];

fn main() {
    init_logging();
    let config = GameConfig::load();

    let highscores = match HighscoreStore::load(&config.highscore_file) {
        Ok(hs) => hs,
        Err(e) => {
            // Play on with an empty table; the next save overwrites the file.
            warn!("{e}; starting with empty highscores");
            HighscoreStore::new(Some(config.highscore_file.clone()))
        }
    };

    let catalog = level::level_catalog(&config.levels_dir);
    info!("{} level(s) available", catalog.len());
    let mut world = WorldState::new(catalog, highscores, config.timing.clone());

    // Optional map file on the command line: play it directly.
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        match level::load_map_file(&path) {
            Ok(def) => world.start_level(def),
            Err(e) => {
                eprintln!("{e}");
                world.report_load_error(&e);
            }
        }
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut world, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }
}

/// Log to `sokoban.log` in the data dir (stderr would scribble over the
/// board). `RUST_LOG` overrides the default `warn` filter.
fn init_logging() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    let log_path = config::data_dir().join("sokoban.log");
    match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("cannot open {}: {e}; logging to stderr", log_path.display()),
    }
    builder.init();
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let tick_rate = Duration::from_millis(config.timing.tick_rate_ms);
    let mut last_tick = Instant::now();

    loop {
        kb.drain_events();
        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_input(world, &kb) {
            break;
        }

        let since = last_tick.elapsed();
        if since >= tick_rate {
            world.tick(since);
            last_tick = Instant::now();
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Route this frame's keys by phase. Returns true to quit.
fn handle_input(world: &mut WorldState, kb: &InputState) -> bool {
    match world.phase {
        Phase::Title => {
            if kb.any_pressed(KEYS_UP) { world.title_move(false); }
            if kb.any_pressed(KEYS_DOWN) { world.title_move(true); }
            if kb.any_pressed(KEYS_CONFIRM) && world.title_select() == TitleAction::Quit {
                return true;
            }
            if kb.was_pressed(KeyCode::Char('q')) || kb.was_pressed(KeyCode::Esc) {
                return true;
            }
        }
        Phase::LevelSelect => {
            if kb.any_pressed(KEYS_UP) { world.select_move(-1); }
            if kb.any_pressed(KEYS_DOWN) { world.select_move(1); }
            if kb.was_pressed(KeyCode::PageUp) { world.select_move(-PAGE); }
            if kb.was_pressed(KeyCode::PageDown) { world.select_move(PAGE); }
            if kb.any_pressed(KEYS_CONFIRM) {
                world.start_selected();
            } else if kb.any_pressed(KEYS_BACK) {
                world.phase = Phase::Title;
            }
        }
        Phase::Playing => {
            // No-op once the countdown is running.
            if kb.was_pressed(KeyCode::Enter) {
                world.begin_session();
            }
            for dir in kb.directions() {
                world.handle_direction(dir);
                if world.phase != Phase::Playing { return false; }
            }
            if kb.any_pressed(KEYS_RESTART) {
                world.restart();
            } else if kb.was_pressed(KeyCode::Esc) {
                world.leave_level();
            } else if kb.was_pressed(KeyCode::Char('h'))
                && world.session.as_ref().and_then(|s| s.outcome()).is_some()
            {
                let map = world.session.as_ref().map(|s| s.map_info().clone());
                world.open_highscores(map);
            }
        }
        Phase::NameEntry => {
            for key in &kb.raw_events {
                match key.code {
                    KeyCode::Enter => {
                        world.submit_name();
                        break;
                    }
                    KeyCode::Esc => {
                        world.skip_name();
                        break;
                    }
                    KeyCode::Backspace => world.name_pop(),
                    KeyCode::Char(c) => world.name_push(c),
                    _ => {}
                }
            }
        }
        Phase::Highscores => {
            if kb.any_pressed(KEYS_LEFT) { world.highscores_cycle(false); }
            if kb.any_pressed(KEYS_RIGHT) { world.highscores_cycle(true); }
            if kb.any_pressed(KEYS_BACK) || kb.any_pressed(KEYS_CONFIRM) {
                world.close_highscores();
            }
        }
    }
    false
}
