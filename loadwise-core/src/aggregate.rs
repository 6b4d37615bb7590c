//! Multi-agent aggregation: combine per-agent costs under sequential or parallel
//! execution.

use crate::cost::CostModel;
use crate::error::{AdvisorError, Result};
use crate::model::{
    AgentProfile, ExecutionMode, MultiAgentTask, ResourceEstimate, TimeEstimate,
};

/// Per-agent figures used during aggregation.
#[derive(Debug, Clone, Copy)]
struct AgentCost {
    vram_bytes: u64,
    ram_bytes: u64,
    interaction_secs: f64,
}

impl CostModel {
    /// Estimate a multi-agent run.
    ///
    /// Parallel runs charge memory for the heaviest agents that can be resident at
    /// once; sequential runs charge only the heaviest single agent but pay for
    /// every agent's turn in time. An empty collection is a zero estimate.
    pub fn estimate_multi_agent(&self, task: &MultiAgentTask) -> Result<ResourceEstimate> {
        if task.max_concurrent == Some(0) {
            return Err(AdvisorError::invalid(
                "max_concurrent",
                "must be at least 1 when set",
            ));
        }

        let costs = task
            .agents
            .iter()
            .map(|agent| self.agent_cost(agent, task))
            .collect::<Result<Vec<_>>>()?;

        if costs.is_empty() {
            return Ok(ResourceEstimate::zero());
        }

        let rounds = task.interaction_rounds as f64;
        let estimate = match task.mode {
            ExecutionMode::Parallel => {
                let concurrency = task.effective_concurrency();

                let mut by_vram = costs.clone();
                by_vram.sort_by(|a, b| b.vram_bytes.cmp(&a.vram_bytes));
                let resident = &by_vram[..concurrency];

                let vram_bytes = resident
                    .iter()
                    .fold(0u64, |acc, c| acc.saturating_add(c.vram_bytes));
                let ram_bytes = resident
                    .iter()
                    .fold(0u64, |acc, c| acc.saturating_add(c.ram_bytes));

                let slowest = costs
                    .iter()
                    .map(|c| c.interaction_secs)
                    .fold(0.0_f64, f64::max);
                let groups = costs.len().div_ceil(concurrency) as f64;

                ResourceEstimate {
                    vram_bytes,
                    ram_bytes,
                    time: TimeEstimate::spread(slowest * rounds * groups),
                }
            }
            ExecutionMode::Sequential => {
                let vram_bytes = costs.iter().map(|c| c.vram_bytes).max().unwrap_or(0);
                let ram_bytes = costs.iter().map(|c| c.ram_bytes).max().unwrap_or(0);
                let per_round: f64 = costs.iter().map(|c| c.interaction_secs).sum();

                ResourceEstimate {
                    vram_bytes,
                    ram_bytes,
                    time: TimeEstimate::spread(per_round * rounds),
                }
            }
        };

        tracing::debug!(
            agents = task.agents.len(),
            mode = %task.mode,
            concurrency = task.effective_concurrency(),
            vram_bytes = estimate.vram_bytes,
            ram_bytes = estimate.ram_bytes,
            expected_secs = estimate.time.expected_secs,
            "Aggregated multi-agent estimate"
        );

        Ok(estimate)
    }

    /// The agent with the largest VRAM footprint and its own estimate.
    ///
    /// This is the memory a sequential run needs; ties resolve to the earliest agent.
    pub fn heaviest_agent<'a>(
        &self,
        task: &'a MultiAgentTask,
    ) -> Result<(&'a AgentProfile, ResourceEstimate)> {
        let mut heaviest: Option<(&AgentProfile, ResourceEstimate)> = None;
        for agent in &task.agents {
            let estimate = self.estimate_single(&agent.model, None, task.hardware)?;
            let heavier = heaviest
                .as_ref()
                .is_none_or(|(_, best)| estimate.vram_bytes > best.vram_bytes);
            if heavier {
                heaviest = Some((agent, estimate));
            }
        }
        heaviest.ok_or(AdvisorError::EmptyAgents)
    }

    fn agent_cost(&self, agent: &AgentProfile, task: &MultiAgentTask) -> Result<AgentCost> {
        agent.model.validate().map_err(|err| match err {
            AdvisorError::InvalidInput { field, reason } => AdvisorError::InvalidInput {
                field: format!("agents[{}].{}", agent.role, field),
                reason,
            },
            other => other,
        })?;
        let single = self.estimate_single(&agent.model, None, task.hardware)?;
        Ok(AgentCost {
            vram_bytes: single.vram_bytes,
            ram_bytes: single.ram_bytes,
            interaction_secs: self.interaction_time_secs(
                &agent.model,
                task.tokens_per_interaction,
                task.hardware,
            ),
        })
    }
}
