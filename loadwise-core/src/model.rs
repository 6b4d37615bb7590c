//! Plain data records exchanged with the advisor.
//!
//! Everything here is an immutable, serializable value: model and adapter
//! descriptions coming in from the learner's form, hardware capacities coming in
//! from the metrics collaborator, and the estimates the engine hands back.
//! Byte quantities are always raw integers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::error::{AdvisorError, Result};

/// Context length assumed when a profile does not specify one.
pub const DEFAULT_CONTEXT_LENGTH: u32 = 4096;
/// Interaction rounds assumed for a multi-agent run.
pub const DEFAULT_INTERACTION_ROUNDS: u32 = 3;
/// Tokens generated by one agent in one interaction.
pub const DEFAULT_TOKENS_PER_INTERACTION: u32 = 1000;

/// Weight precision format.
///
/// Parsing never fails: unrecognized labels degrade to [`Quantization::F32`], the
/// most expensive entry, so a half-typed label over-estimates instead of blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantization {
    Q4,
    Q5,
    Q8,
    F16,
    F32,
}

impl Quantization {
    pub const ALL: [Quantization; 5] = [
        Quantization::Q4,
        Quantization::Q5,
        Quantization::Q8,
        Quantization::F16,
        Quantization::F32,
    ];

    /// Lossy parse of a learner- or collaborator-supplied label.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "q4" | "4bit" | "4-bit" | "int4" | "q4_0" | "q4_k_m" => Quantization::Q4,
            "q5" | "5bit" | "5-bit" | "q5_k_m" => Quantization::Q5,
            "q8" | "8bit" | "8-bit" | "int8" | "q8_0" => Quantization::Q8,
            "fp16" | "f16" | "bf16" | "16bit" | "16-bit" => Quantization::F16,
            "fp32" | "f32" | "32bit" | "32-bit" => Quantization::F32,
            other => {
                tracing::debug!(label = other, "Unrecognized quantization, assuming fp32");
                Quantization::F32
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quantization::Q4 => "q4",
            Quantization::Q5 => "q5",
            Quantization::Q8 => "q8",
            Quantization::F16 => "fp16",
            Quantization::F32 => "fp32",
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            Quantization::Q4 => 4,
            Quantization::Q5 => 5,
            Quantization::Q8 => 8,
            Quantization::F16 => 16,
            Quantization::F32 => 32,
        }
    }

    /// The next cheaper level a learner would realistically pick.
    ///
    /// 5-bit is a side step, not a rung: 8-bit goes straight to 4-bit.
    pub fn step_down(&self) -> Option<Quantization> {
        match self {
            Quantization::F32 => Some(Quantization::F16),
            Quantization::F16 => Some(Quantization::Q8),
            Quantization::Q8 | Quantization::Q5 => Some(Quantization::Q4),
            Quantization::Q4 => None,
        }
    }
}

impl std::fmt::Display for Quantization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Quantization {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Quantization {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Quantization::from_label(&label))
    }
}

/// Coarse accelerator class used to pick a throughput baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum HardwareTier {
    /// Integrated graphics or CPU-only; the conservative fallback.
    Integrated,
    /// GTX/RTX class consumer cards.
    #[default]
    ConsumerGpu,
    /// Workstation and datacenter accelerators.
    ProfessionalGpu,
}

impl HardwareTier {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "consumer" | "consumer_gpu" | "nvidia_consumer" => HardwareTier::ConsumerGpu,
            "professional" | "professional_gpu" | "nvidia_professional" => {
                HardwareTier::ProfessionalGpu
            }
            "integrated" => HardwareTier::Integrated,
            other => {
                tracing::debug!(label = other, "Unrecognized hardware tier, assuming integrated");
                HardwareTier::Integrated
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HardwareTier::Integrated => "integrated",
            HardwareTier::ConsumerGpu => "consumer_gpu",
            HardwareTier::ProfessionalGpu => "professional_gpu",
        }
    }
}

impl std::fmt::Display for HardwareTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for HardwareTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for HardwareTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(HardwareTier::from_label(&label))
    }
}

/// A base model as described by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Parameter count in billions.
    pub size_billions: f64,
    pub quantization: Quantization,
    #[serde(default = "default_context_length")]
    pub context_length: u32,
}

fn default_context_length() -> u32 {
    DEFAULT_CONTEXT_LENGTH
}

impl ModelProfile {
    pub fn new(size_billions: f64, quantization: Quantization) -> Self {
        Self {
            size_billions,
            quantization,
            context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }

    pub fn with_context_length(mut self, context_length: u32) -> Self {
        self.context_length = context_length;
        self
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.size_billions.is_finite() || self.size_billions <= 0.0 {
            return Err(AdvisorError::invalid(
                "size_billions",
                format!("must be a positive number, got {}", self.size_billions),
            ));
        }
        if self.context_length == 0 {
            return Err(AdvisorError::invalid(
                "context_length",
                "must be at least 1 token",
            ));
        }
        Ok(())
    }
}

/// LoRA-style adapter and training-loop settings for a fine-tuning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub rank: u32,
    pub alpha: u32,
    pub batch_size: u32,
    pub max_seq_length: u32,
    pub epochs: u32,
    /// Number of training samples.
    pub dataset_size: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            rank: 16,
            alpha: 32,
            batch_size: 4,
            max_seq_length: 512,
            epochs: 3,
            dataset_size: 1000,
        }
    }
}

impl AdapterConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rank", self.rank),
            ("alpha", self.alpha),
            ("batch_size", self.batch_size),
            ("max_seq_length", self.max_seq_length),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(AdvisorError::invalid(field, "must be at least 1"));
            }
        }
        Ok(())
    }
}

/// One agent in a multi-agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    pub model: ModelProfile,
}

impl AgentProfile {
    pub fn new(role: impl Into<String>, model: ModelProfile) -> Self {
        Self {
            role: role.into(),
            model,
        }
    }
}

/// How a multi-agent run schedules its agents.
///
/// Parsing is strict: an unknown label is [`AdvisorError::UnknownExecutionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One agent holds resources at a time.
    Sequential,
    /// Agents run concurrently, up to the configured bound.
    #[default]
    Parallel,
}

impl ExecutionMode {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExecutionMode {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            _ => Err(AdvisorError::UnknownExecutionMode {
                value: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for ExecutionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// Declared hardware capacity, supplied by the metrics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailableResources {
    pub vram_bytes: u64,
    pub ram_bytes: u64,
}

impl AvailableResources {
    pub fn new(vram_bytes: u64, ram_bytes: u64) -> Self {
        Self {
            vram_bytes,
            ram_bytes,
        }
    }
}

/// Wall-clock estimate with a best/worst-case spread.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub min_secs: f64,
    pub expected_secs: f64,
    pub max_secs: f64,
}

impl TimeEstimate {
    /// Lower bound as a fraction of the expected time.
    pub const MIN_FACTOR: f64 = 0.7;
    /// Upper bound as a multiple of the expected time.
    pub const MAX_FACTOR: f64 = 1.5;

    pub fn zero() -> Self {
        Self::default()
    }

    /// A point estimate with no spread.
    pub fn exact(secs: f64) -> Self {
        Self {
            min_secs: secs,
            expected_secs: secs,
            max_secs: secs,
        }
    }

    /// Spread an expected time into a `{min, expected, max}` triple.
    pub fn spread(expected_secs: f64) -> Self {
        Self {
            min_secs: expected_secs * Self::MIN_FACTOR,
            expected_secs,
            max_secs: expected_secs * Self::MAX_FACTOR,
        }
    }
}

/// Estimated cost of running a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub vram_bytes: u64,
    pub ram_bytes: u64,
    pub time: TimeEstimate,
}

impl ResourceEstimate {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Expected wall-clock seconds.
    pub fn time_secs(&self) -> f64 {
        self.time.expected_secs
    }
}

/// Which of the two supported task shapes a configuration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FineTuning,
    MultiAgent,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::FineTuning => write!(f, "fine-tuning"),
            TaskKind::MultiAgent => write!(f, "multi-agent"),
        }
    }
}

/// Single-model fine-tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuneTask {
    pub model: ModelProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterConfig>,
    #[serde(default)]
    pub hardware: HardwareTier,
}

/// Multi-agent orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentTask {
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Concurrency bound for parallel mode; `None` means all agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
    #[serde(default = "default_interaction_rounds")]
    pub interaction_rounds: u32,
    #[serde(default = "default_tokens_per_interaction")]
    pub tokens_per_interaction: u32,
    #[serde(default)]
    pub hardware: HardwareTier,
}

fn default_interaction_rounds() -> u32 {
    DEFAULT_INTERACTION_ROUNDS
}

fn default_tokens_per_interaction() -> u32 {
    DEFAULT_TOKENS_PER_INTERACTION
}

impl MultiAgentTask {
    pub fn new(agents: Vec<AgentProfile>, mode: ExecutionMode) -> Self {
        Self {
            agents,
            mode,
            max_concurrent: None,
            interaction_rounds: DEFAULT_INTERACTION_ROUNDS,
            tokens_per_interaction: DEFAULT_TOKENS_PER_INTERACTION,
            hardware: HardwareTier::default(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    /// Concurrency bound actually in effect, clamped to the agent count.
    pub fn effective_concurrency(&self) -> usize {
        let count = self.agents.len();
        self.max_concurrent
            .map_or(count, |bound| (bound as usize).min(count))
    }
}

/// A complete configuration submitted for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskConfig {
    FineTuning(FineTuneTask),
    MultiAgent(MultiAgentTask),
}

impl TaskConfig {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskConfig::FineTuning(_) => TaskKind::FineTuning,
            TaskConfig::MultiAgent(_) => TaskKind::MultiAgent,
        }
    }

    /// Produce the configuration that results from applying `change`.
    pub fn apply(&self, change: &ConfigChange) -> Result<TaskConfig> {
        let inapplicable = || AdvisorError::InapplicableChange {
            change: change.to_string(),
            task: self.kind().to_string(),
        };

        match (self, change) {
            (TaskConfig::FineTuning(task), ConfigChange::Quantization { to }) => {
                let mut next = task.clone();
                next.model.quantization = *to;
                Ok(TaskConfig::FineTuning(next))
            }
            (TaskConfig::FineTuning(task), ConfigChange::ModelSize { to_billions }) => {
                let mut next = task.clone();
                next.model.size_billions = *to_billions;
                Ok(TaskConfig::FineTuning(next))
            }
            (TaskConfig::FineTuning(task), ConfigChange::AdapterRank { to }) => {
                let mut next = task.clone();
                next.adapter.as_mut().ok_or_else(inapplicable)?.rank = *to;
                Ok(TaskConfig::FineTuning(next))
            }
            (TaskConfig::FineTuning(task), ConfigChange::BatchSize { to }) => {
                let mut next = task.clone();
                next.adapter.as_mut().ok_or_else(inapplicable)?.batch_size = *to;
                Ok(TaskConfig::FineTuning(next))
            }
            (TaskConfig::MultiAgent(task), ConfigChange::ExecutionMode { to }) => {
                let mut next = task.clone();
                next.mode = *to;
                Ok(TaskConfig::MultiAgent(next))
            }
            (TaskConfig::MultiAgent(task), ConfigChange::AgentQuantization { from, to }) => {
                let mut next = task.clone();
                for agent in next.agents.iter_mut() {
                    if agent.model.quantization == *from {
                        agent.model.quantization = *to;
                    }
                }
                Ok(TaskConfig::MultiAgent(next))
            }
            (TaskConfig::MultiAgent(task), ConfigChange::MaxConcurrent { to }) => {
                let mut next = task.clone();
                next.max_concurrent = Some(*to);
                Ok(TaskConfig::MultiAgent(next))
            }
            _ => Err(inapplicable()),
        }
    }
}

/// A single-parameter edit proposed by a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "parameter", rename_all = "snake_case")]
pub enum ConfigChange {
    Quantization { to: Quantization },
    AdapterRank { to: u32 },
    BatchSize { to: u32 },
    ModelSize { to_billions: f64 },
    ExecutionMode { to: ExecutionMode },
    AgentQuantization { from: Quantization, to: Quantization },
    MaxConcurrent { to: u32 },
}

impl std::fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigChange::Quantization { to } => write!(f, "quantization -> {to}"),
            ConfigChange::AdapterRank { to } => write!(f, "adapter rank -> {to}"),
            ConfigChange::BatchSize { to } => write!(f, "batch size -> {to}"),
            ConfigChange::ModelSize { to_billions } => write!(f, "model size -> {to_billions}B"),
            ConfigChange::ExecutionMode { to } => write!(f, "execution mode -> {to}"),
            ConfigChange::AgentQuantization { from, to } => {
                write!(f, "agent quantization {from} -> {to}")
            }
            ConfigChange::MaxConcurrent { to } => write!(f, "max concurrent agents -> {to}"),
        }
    }
}
