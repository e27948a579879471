pub mod flow;
pub mod knowledge;
pub mod page;
pub mod selector;
pub mod substitution;

pub use flow::{FlowDefinition, Priority, Step, StepAction, VerifyChecks};
pub use knowledge::{PageContext, Solution, SolutionFate, epoch_ms, solution_id};
pub use page::PageType;
pub use selector::normalize_selector;
pub use substitution::{ParamMap, mask_value, substitute};
