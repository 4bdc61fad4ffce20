use wasm_bindgen::prelude::*;

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod message;
pub mod opponent;
pub mod piles;
pub mod protocol;
pub mod solver;
pub mod store;
pub mod types;
pub mod wasm;

pub use config::{Config, OpponentMode};
pub use controller::{Controller, Event};
pub use piles::Piles;
pub use store::{MemoryStore, SlotStore, StateStore};
pub use types::{FirstMover, GameState, SessionView};

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}
