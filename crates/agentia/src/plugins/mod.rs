//! Built-in plugins.

mod calc;
mod clock;
mod memory;

use agentia_core::AgentBuilder;

pub use calc::CalculatorPlugin;
pub use clock::ClockPlugin;
pub use memory::MemoryPlugin;

/// Adds every built-in plugin to the agent.
pub fn with_builtin_plugins(builder: AgentBuilder) -> AgentBuilder {
    builder
        .with_plugin(ClockPlugin)
        .with_plugin(CalculatorPlugin)
        .with_plugin(MemoryPlugin::new())
}
