//! Core engines of the SwiftChain system.
//!
//! This crate holds the business logic shared by the HTTP service and the
//! CLI: INR conversion with fees, the bank fee comparison, the step-by-step
//! transfer flow, status polling of submitted transfers and the local
//! transaction history. The builder assembles them from configuration.

pub mod builder;
pub mod comparison;
pub mod conversion;
pub mod engine;
pub mod flow;
pub mod history;
pub mod monitoring;

pub use builder::{BuilderError, SwiftChainBuilder, SwiftChainFactories};
pub use comparison::FeeComparisonEngine;
pub use conversion::{ConversionEngine, ConversionError};
pub use engine::{LookupError, SwiftChainEngine};
pub use flow::{FlowError, FlowStep, ReviewSummary, TransferContext, TransferFlow};
pub use history::{HistoryError, HistoryFilter, HistorySummary, TransactionHistory};
pub use monitoring::{PollHandle, PollOutcome, PollReport, PollerConfig, StatusPoller};
