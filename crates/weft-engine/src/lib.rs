pub mod config;
pub mod context;
pub mod driver;
pub mod interpreter;
pub mod knowledge;
pub mod library;
pub mod oracle;
pub mod report;
pub mod resolver;

pub use config::{ConfigLoader, WeftConfig};
pub use context::ExecutionContext;
pub use driver::{DriverError, PageDriver};
pub use interpreter::{FlowInterpreter, FlowReport, FlowStatus, StepStatus};
pub use knowledge::{KnowledgeBase, KnowledgeStore};
pub use library::FlowLibrary;
pub use oracle::{HttpOracle, SelectorOracle};
pub use resolver::{ResolutionTier, StrategyResolver};
