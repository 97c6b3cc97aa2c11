//! Control entities: script runner, conditionals, loop and pause.

mod condition;
mod looping;
mod pause;
mod run_script;

pub use condition::{Branching, Conditional};
pub use looping::Loop;
pub use pause::Pause;
pub use run_script::RunScript;
