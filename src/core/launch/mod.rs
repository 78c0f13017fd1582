pub mod command;
pub mod orchestrator;
pub mod task;

pub use command::{is_ready_line, IoContract, LaunchCommand};
pub use orchestrator::{LaunchRequest, ProcessOrchestrator};
pub use task::{ConsoleLine, ConsoleSink, ConsoleStream, ExitReport, LaunchOutcome, RunningServer};
