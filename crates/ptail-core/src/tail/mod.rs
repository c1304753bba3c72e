//! Live tailing of discovered logs.

pub mod filter;
pub mod orchestrator;
pub mod tailer;

pub use filter::{highlight, Columns, FilterSet, LineRules};
pub use orchestrator::{RefreshOutcome, ShowFormat, TailOptions, TailOrchestrator};
pub use tailer::{LineTailer, TailError, TailerConfig};
