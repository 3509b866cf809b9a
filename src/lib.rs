pub mod audio;
pub mod collector;
pub mod config;
pub mod crossing;
pub mod defender;
pub mod engine;
pub mod entity;
pub mod error;
pub mod input;
pub mod renderer;
pub mod scores;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli_renderer;

#[cfg(target_arch = "wasm32")]
pub mod web_renderer;
#[cfg(target_arch = "wasm32")]
pub mod web_main;

pub use audio::Melody;
pub use collector::CollectorGame;
pub use config::ArcadeConfig;
pub use crossing::CrossingGame;
pub use defender::DefenderGame;
pub use engine::{Engine, EngineState, FrameContext, Game, GameEvent, LoopStep};
pub use entity::{Direction, Position, Rect};
pub use error::{GameError, GameResult};
pub use input::{Action, InputState};
pub use renderer::{HeadlessSurface, Surface};
pub use scores::Leaderboard;

#[cfg(not(target_arch = "wasm32"))]
pub use cli_renderer::{CliRenderer, TermInput};

#[cfg(target_arch = "wasm32")]
pub use web_main::ArcadeHandle;
