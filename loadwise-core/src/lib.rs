//! # loadwise-core — Resource Viability & Optimization Advisor
//!
//! A deterministic, explainable approximation of what a fine-tuning or
//! multi-agent configuration will cost, whether it fits the learner's hardware,
//! and which single-parameter changes would help.
//!
//! The pipeline runs one way:
//! 1. **Cost model** ([`cost`]) — model/task → VRAM, RAM and time
//! 2. **Aggregation** ([`aggregate`]) — per-agent costs → one estimate
//! 3. **Viability** ([`viability`]) — estimate vs. capacity → verdict
//! 4. **Suggestions** ([`suggest`]) — verdict → ranked alternatives
//!
//! Nothing here performs I/O apart from [`config::load_config`]; every other call
//! is a pure function of its arguments.

pub mod advisor;
pub mod aggregate;
pub mod config;
pub mod cost;
pub mod error;
pub mod model;
pub mod suggest;
pub mod viability;

pub use advisor::{Advisor, AdvisorReport};
pub use config::{AdvisorConfig, load_config};
pub use cost::{CostModel, CostTables, GIB, MIB};
pub use error::{AdvisorError, ConfigError, Result};
pub use model::{
    AdapterConfig, AgentProfile, AvailableResources, ConfigChange, ExecutionMode, FineTuneTask,
    HardwareTier, ModelProfile, MultiAgentTask, Quantization, ResourceEstimate, TaskConfig,
    TaskKind, TimeEstimate,
};
pub use suggest::{BalanceTable, Impact, OptimizationSuggestion, SuggestionGenerator, SuggestionKind};
pub use viability::{PerformanceCategory, ViabilityVerdict, evaluate_viability};

/// Estimate a single model with the default calibration.
pub fn estimate_single(
    model: &ModelProfile,
    adapter: Option<&AdapterConfig>,
    hardware: HardwareTier,
) -> Result<ResourceEstimate> {
    CostModel::default().estimate_single(model, adapter, hardware)
}

/// Estimate a multi-agent run with the default calibration.
pub fn estimate_multi_agent(
    agents: &[AgentProfile],
    mode: ExecutionMode,
    max_concurrent: Option<u32>,
) -> Result<ResourceEstimate> {
    let mut task = MultiAgentTask::new(agents.to_vec(), mode);
    task.max_concurrent = max_concurrent;
    CostModel::default().estimate_multi_agent(&task)
}

/// Generate suggestions with the default calibration and balance table.
pub fn generate_suggestions(
    task: &TaskConfig,
    estimate: &ResourceEstimate,
    verdict: &ViabilityVerdict,
    available: &AvailableResources,
) -> Result<Vec<OptimizationSuggestion>> {
    Advisor::default().suggest(task, estimate, verdict, available)
}
