pub mod orchestrator;
pub mod poller;

pub use orchestrator::{GameStatus, GameView, OrchestrationError, Orchestrator};
pub use poller::{ViewPoller, ViewStore};
