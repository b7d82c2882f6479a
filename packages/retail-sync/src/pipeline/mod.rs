pub mod extract;
pub mod ledger;
pub mod orchestrator;
pub mod pagination;

pub use extract::{Extraction, Extractor};
pub use ledger::DedupLedger;
pub use orchestrator::Orchestrator;
pub use pagination::{CursorRun, OffsetCursor, PageSource, RetryPolicy, StopReason, TimePartitioned};
