/// The in-page helper bundle. Injected into each execution context and
/// re-injected after navigation wipes it.
pub const HELPER_JS: &str = include_str!("helper.js");
