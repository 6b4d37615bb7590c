//! Suggestion generation: propose single-parameter changes that lower VRAM and
//! tag each with its assumed effect on the learner's cognitive load.
//!
//! Each quantified rule re-runs the cost model on a modified copy of the task and
//! is only emitted when the candidate is strictly cheaper than the original.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cost::CostModel;
use crate::error::Result;
use crate::model::{
    AvailableResources, ConfigChange, ExecutionMode, FineTuneTask, MultiAgentTask, Quantization,
    ResourceEstimate, TaskConfig,
};
use crate::viability::{PerformanceCategory, ViabilityVerdict};

/// VRAM utilization above which a smaller base model is proposed.
pub const DOWNSIZE_UTILIZATION: f64 = 0.8;
/// Models at or above this size (billions) count as large.
pub const LARGE_MODEL_BILLIONS: f64 = 13.0;
/// Size proposed for models that are already at the large threshold.
pub const FALLBACK_MODEL_BILLIONS: f64 = 7.0;
/// Adapter rank never drops below this.
pub const MIN_ADAPTER_RANK: u32 = 4;
/// Adapter ranks at or below this are left alone.
pub const RANK_REDUCTION_THRESHOLD: u32 = 8;
/// Parallel runs are never limited below this many concurrent agents.
pub const MIN_CONCURRENT_AGENTS: u32 = 2;

/// The rule that produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    LowerQuantization,
    ReduceAdapterRank,
    ReduceBatchSize,
    UseSmallerModel,
    SwitchToSequential,
    QuantizeAgents,
    LimitConcurrentAgents,
    DownsizeLargeAgents,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 8] = [
        SuggestionKind::LowerQuantization,
        SuggestionKind::ReduceAdapterRank,
        SuggestionKind::ReduceBatchSize,
        SuggestionKind::UseSmallerModel,
        SuggestionKind::SwitchToSequential,
        SuggestionKind::QuantizeAgents,
        SuggestionKind::LimitConcurrentAgents,
        SuggestionKind::DownsizeLargeAgents,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SuggestionKind::LowerQuantization => "lower_quantization",
            SuggestionKind::ReduceAdapterRank => "reduce_adapter_rank",
            SuggestionKind::ReduceBatchSize => "reduce_batch_size",
            SuggestionKind::UseSmallerModel => "use_smaller_model",
            SuggestionKind::SwitchToSequential => "switch_to_sequential",
            SuggestionKind::QuantizeAgents => "quantize_agents",
            SuggestionKind::LimitConcurrentAgents => "limit_concurrent_agents",
            SuggestionKind::DownsizeLargeAgents => "downsize_large_agents",
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// How much a suggestion is expected to move the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Low => write!(f, "low"),
            Impact::Medium => write!(f, "medium"),
            Impact::High => write!(f, "high"),
        }
    }
}

/// Which suggestion kinds are believed to cut computational load without adding
/// cognitive load.
///
/// This is a working hypothesis carried over from the course material, not a
/// measured property; it lives in data so it can be revisited without touching
/// the rules. Kinds missing from the table are reported as unbalanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceTable {
    flags: BTreeMap<SuggestionKind, bool>,
}

impl Default for BalanceTable {
    fn default() -> Self {
        Self {
            flags: BTreeMap::from([
                // Lower precision raises verification effort even as it saves memory.
                (SuggestionKind::LowerQuantization, false),
                (SuggestionKind::ReduceAdapterRank, true),
                (SuggestionKind::ReduceBatchSize, true),
                (SuggestionKind::UseSmallerModel, true),
                (SuggestionKind::SwitchToSequential, true),
                (SuggestionKind::QuantizeAgents, false),
                (SuggestionKind::LimitConcurrentAgents, true),
                (SuggestionKind::DownsizeLargeAgents, true),
            ]),
        }
    }
}

impl BalanceTable {
    pub fn is_balanced(&self, kind: SuggestionKind) -> bool {
        self.flags.get(&kind).copied().unwrap_or(false)
    }

    pub fn set(&mut self, kind: SuggestionKind, balanced: bool) {
        self.flags.insert(kind, balanced);
    }
}

/// A proposed alternative configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    #[serde(rename = "id")]
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    pub impact: Impact,
    /// VRAM saved, in bytes; `None` when the saving depends on an unchosen model.
    pub reduction_bytes: Option<u64>,
    /// `reduction_bytes` as a percentage of the original VRAM estimate.
    pub savings_pct: Option<f64>,
    pub balanced: bool,
    /// The edit to apply with [`TaskConfig::apply`]; `None` for informational hints.
    pub change: Option<ConfigChange>,
    pub candidate: Option<ResourceEstimate>,
    /// Whether the candidate alone fits the available VRAM.
    pub fits_vram: Option<bool>,
}

/// Text and classification for a quantified rule, before it is costed.
struct Proposal {
    kind: SuggestionKind,
    impact: Impact,
    title: String,
    description: String,
    change: ConfigChange,
}

/// Runs the suggestion rules for one analysis.
pub struct SuggestionGenerator<'a> {
    cost: &'a CostModel,
    balance: &'a BalanceTable,
}

impl<'a> SuggestionGenerator<'a> {
    pub fn new(cost: &'a CostModel, balance: &'a BalanceTable) -> Self {
        Self { cost, balance }
    }

    /// Produce suggestions ordered by impact tier, then by decreasing reduction.
    ///
    /// Returns an empty list when the configuration is already optimal.
    pub fn generate(
        &self,
        task: &TaskConfig,
        estimate: &ResourceEstimate,
        verdict: &ViabilityVerdict,
        available: &AvailableResources,
    ) -> Result<Vec<OptimizationSuggestion>> {
        if verdict.performance_category == PerformanceCategory::Optimal {
            return Ok(Vec::new());
        }

        let proposals = match task {
            TaskConfig::FineTuning(ft) => fine_tune_proposals(ft, verdict),
            TaskConfig::MultiAgent(ma) => multi_agent_proposals(ma),
        };

        let mut suggestions = Vec::with_capacity(proposals.len() + 1);
        for proposal in proposals {
            if let Some(suggestion) = self.cost_proposal(task, proposal, estimate, available)? {
                suggestions.push(suggestion);
            }
        }

        if let TaskConfig::MultiAgent(ma) = task {
            if let Some(hint) = self.large_agent_hint(ma) {
                suggestions.push(hint);
            }
        }

        suggestions.sort_by(|a, b| {
            b.impact
                .cmp(&a.impact)
                .then_with(|| b.reduction_bytes.cmp(&a.reduction_bytes))
        });

        tracing::debug!(
            task = %task.kind(),
            category = %verdict.performance_category,
            count = suggestions.len(),
            "Generated suggestions"
        );

        Ok(suggestions)
    }

    fn cost_proposal(
        &self,
        task: &TaskConfig,
        proposal: Proposal,
        original: &ResourceEstimate,
        available: &AvailableResources,
    ) -> Result<Option<OptimizationSuggestion>> {
        let candidate_task = task.apply(&proposal.change)?;
        let candidate = self.cost.estimate_task(&candidate_task)?;

        if candidate.vram_bytes >= original.vram_bytes {
            tracing::trace!(rule = %proposal.kind, "Candidate does not reduce VRAM, skipping");
            return Ok(None);
        }

        let reduction = original.vram_bytes - candidate.vram_bytes;
        let savings_pct = reduction as f64 / original.vram_bytes as f64 * 100.0;

        Ok(Some(OptimizationSuggestion {
            kind: proposal.kind,
            title: proposal.title,
            description: format!("{} (about {savings_pct:.1}% less VRAM)", proposal.description),
            impact: proposal.impact,
            reduction_bytes: Some(reduction),
            savings_pct: Some(savings_pct),
            balanced: self.balance.is_balanced(proposal.kind),
            change: Some(proposal.change),
            candidate: Some(candidate),
            fits_vram: Some(available.vram_bytes > 0 && candidate.vram_bytes <= available.vram_bytes),
        }))
    }

    fn large_agent_hint(&self, task: &MultiAgentTask) -> Option<OptimizationSuggestion> {
        let large = task
            .agents
            .iter()
            .filter(|a| a.model.size_billions >= LARGE_MODEL_BILLIONS)
            .count();
        if large == 0 {
            return None;
        }

        let kind = SuggestionKind::DownsizeLargeAgents;
        Some(OptimizationSuggestion {
            kind,
            title: format!("Consider smaller models for {large} agent(s)"),
            description: format!(
                "Replacing {LARGE_MODEL_BILLIONS}B+ agents with {FALLBACK_MODEL_BILLIONS}B \
                 alternatives often keeps quality while freeing memory"
            ),
            impact: Impact::Medium,
            reduction_bytes: None,
            savings_pct: None,
            balanced: self.balance.is_balanced(kind),
            change: None,
            candidate: None,
            fits_vram: None,
        })
    }
}

fn fine_tune_proposals(task: &FineTuneTask, verdict: &ViabilityVerdict) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    let model = &task.model;

    if let Some(lower) = model.quantization.step_down() {
        proposals.push(Proposal {
            kind: SuggestionKind::LowerQuantization,
            impact: Impact::High,
            title: format!(
                "Use {lower} quantization instead of {}",
                model.quantization
            ),
            description: "Lower precision cuts weight memory but may make outputs less \
                          stable to verify"
                .to_string(),
            change: ConfigChange::Quantization { to: lower },
        });
    }

    if let Some(adapter) = &task.adapter {
        if adapter.rank > RANK_REDUCTION_THRESHOLD {
            let to = (adapter.rank / 2).max(MIN_ADAPTER_RANK);
            proposals.push(Proposal {
                kind: SuggestionKind::ReduceAdapterRank,
                impact: Impact::Medium,
                title: format!("Reduce adapter rank from {} to {to}", adapter.rank),
                description: "A smaller rank shrinks adapter and optimizer state with a \
                              moderate effect on quality"
                    .to_string(),
                change: ConfigChange::AdapterRank { to },
            });
        }

        if adapter.batch_size > 1 {
            let to = (adapter.batch_size / 2).max(1);
            proposals.push(Proposal {
                kind: SuggestionKind::ReduceBatchSize,
                impact: Impact::Medium,
                title: format!("Reduce batch size from {} to {to}", adapter.batch_size),
                description: "Smaller batches need less activation memory but lengthen \
                              training"
                    .to_string(),
                change: ConfigChange::BatchSize { to },
            });
        }
    }

    if model.size_billions >= LARGE_MODEL_BILLIONS && verdict.vram_utilization > DOWNSIZE_UTILIZATION
    {
        let to_billions = if model.size_billions > LARGE_MODEL_BILLIONS {
            LARGE_MODEL_BILLIONS
        } else {
            FALLBACK_MODEL_BILLIONS
        };
        proposals.push(Proposal {
            kind: SuggestionKind::UseSmallerModel,
            impact: Impact::High,
            title: format!(
                "Consider a {to_billions}B model instead of {}B",
                model.size_billions
            ),
            description: "A smaller base model keeps good quality for many tasks".to_string(),
            change: ConfigChange::ModelSize { to_billions },
        });
    }

    proposals
}

fn multi_agent_proposals(task: &MultiAgentTask) -> Vec<Proposal> {
    let mut proposals = Vec::new();

    if task.mode == ExecutionMode::Parallel {
        proposals.push(Proposal {
            kind: SuggestionKind::SwitchToSequential,
            impact: Impact::High,
            title: "Run agents sequentially".to_string(),
            description: "Only one agent holds memory at a time, at the cost of a longer \
                          total run"
                .to_string(),
            change: ConfigChange::ExecutionMode {
                to: ExecutionMode::Sequential,
            },
        });
    }

    let q8_agents = task
        .agents
        .iter()
        .filter(|a| a.model.quantization == Quantization::Q8)
        .count();
    if q8_agents > 0 {
        proposals.push(Proposal {
            kind: SuggestionKind::QuantizeAgents,
            impact: Impact::High,
            title: format!("Quantize {q8_agents} agent(s) from q8 to q4"),
            description: "4-bit agents need roughly half the weight memory, with a possible \
                          rise in review effort"
                .to_string(),
            change: ConfigChange::AgentQuantization {
                from: Quantization::Q8,
                to: Quantization::Q4,
            },
        });
    }

    if task.mode == ExecutionMode::Parallel && task.agents.len() > 2 {
        let current = task.effective_concurrency() as u32;
        let to = (current / 2).max(MIN_CONCURRENT_AGENTS);
        proposals.push(Proposal {
            kind: SuggestionKind::LimitConcurrentAgents,
            impact: Impact::Medium,
            title: format!("Limit to {to} concurrent agents"),
            description: "Fewer agents resident at once lowers peak memory".to_string(),
            change: ConfigChange::MaxConcurrent { to },
        });
    }

    proposals
}
