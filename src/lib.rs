//! mediashelf - an anime download classifier and library organizer
//!
//! This library classifies media files found in an inbox folder (episodes,
//! specials, OVAs, movies and extras), plans where each belongs in a
//! media-server library, moves them with a JSONL log that can be rolled back,
//! and reclaims the empty folders left behind. An optional remote classifier
//! refines filename heuristics, behind a persistent cache and a call budget.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod executor;
pub mod gateway;
pub mod naming;
pub mod output;
pub mod planner;
pub mod remote;
pub mod scanner;
pub mod status;
pub mod undo;

pub use classifier::{Decision, DecisionKind, classify};
pub use config::{CompiledFilters, Config, ConfigError};
pub use executor::{ExecutorError, LogRecord, MoveExecutor, OperationLog};
pub use gateway::{ClassifierGateway, ExternalClassifier, ExternalResult, GatewayError};
pub use planner::{Operation, plan};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Command, run_cli};
