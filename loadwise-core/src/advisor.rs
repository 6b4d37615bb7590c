//! One-call analysis: estimate, classify and suggest for a task.

use serde::{Deserialize, Serialize};

use crate::config::AdvisorConfig;
use crate::cost::CostModel;
use crate::error::Result;
use crate::model::{AvailableResources, ResourceEstimate, TaskConfig, TaskKind};
use crate::suggest::{BalanceTable, OptimizationSuggestion, SuggestionGenerator};
use crate::viability::{ViabilityVerdict, evaluate_viability};

/// Everything the presentation layer needs for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReport {
    pub task_kind: TaskKind,
    pub estimate: ResourceEstimate,
    pub verdict: ViabilityVerdict,
    pub suggestions: Vec<OptimizationSuggestion>,
}

/// The advisor engine with its calibration tables.
///
/// Holds no mutable state; share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Advisor {
    cost: CostModel,
    balance: BalanceTable,
}

impl Advisor {
    /// Build an advisor from loaded configuration, rejecting unusable tables.
    pub fn new(config: AdvisorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cost: CostModel::new(config.tables),
            balance: config.balance,
        })
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    pub fn balance(&self) -> &BalanceTable {
        &self.balance
    }

    pub fn estimate(&self, task: &TaskConfig) -> Result<ResourceEstimate> {
        self.cost.estimate_task(task)
    }

    pub fn suggest(
        &self,
        task: &TaskConfig,
        estimate: &ResourceEstimate,
        verdict: &ViabilityVerdict,
        available: &AvailableResources,
    ) -> Result<Vec<OptimizationSuggestion>> {
        SuggestionGenerator::new(&self.cost, &self.balance).generate(
            task, estimate, verdict, available,
        )
    }

    /// Run the whole pipeline for `task` against `available`.
    pub fn analyze(
        &self,
        task: &TaskConfig,
        available: &AvailableResources,
    ) -> Result<AdvisorReport> {
        let estimate = self.estimate(task)?;
        let verdict = evaluate_viability(&estimate, available);
        let suggestions = self.suggest(task, &estimate, &verdict, available)?;

        tracing::info!(
            task = %task.kind(),
            vram_bytes = estimate.vram_bytes,
            category = %verdict.performance_category,
            suggestions = suggestions.len(),
            "Analyzed configuration"
        );

        Ok(AdvisorReport {
            task_kind: task.kind(),
            estimate,
            verdict,
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::GIB;
    use crate::error::AdvisorError;
    use crate::model::{AdapterConfig, FineTuneTask, HardwareTier, ModelProfile, Quantization};
    use crate::viability::PerformanceCategory;

    fn task(size: f64, q: Quantization) -> TaskConfig {
        TaskConfig::FineTuning(FineTuneTask {
            model: ModelProfile::new(size, q),
            adapter: Some(AdapterConfig::default()),
            hardware: HardwareTier::ConsumerGpu,
        })
    }

    #[test]
    fn test_analyze_optimal() {
        let advisor = Advisor::default();
        let report = advisor
            .analyze(
                &task(3.0, Quantization::Q4),
                &AvailableResources::new(24 * GIB, 64 * GIB),
            )
            .unwrap();
        assert_eq!(report.task_kind, TaskKind::FineTuning);
        assert_eq!(
            report.verdict.performance_category,
            PerformanceCategory::Optimal
        );
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_analyze_nonviable_has_suggestions() {
        let advisor = Advisor::default();
        let report = advisor
            .analyze(
                &task(30.0, Quantization::F16),
                &AvailableResources::new(24 * GIB, 64 * GIB),
            )
            .unwrap();
        assert!(!report.verdict.viable);
        assert!(!report.suggestions.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_tables() {
        let mut config = AdvisorConfig::default();
        config.tables.fallback_bytes_per_parameter = -5.0;
        let err = Advisor::new(config).unwrap_err();
        assert!(matches!(err, AdvisorError::Config(_)));
    }

    #[test]
    fn test_report_serializes() {
        let advisor = Advisor::default();
        let report = advisor
            .analyze(
                &task(13.0, Quantization::Q8),
                &AvailableResources::new(8 * GIB, 64 * GIB),
            )
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["task_kind"], "fine_tuning");
        assert_eq!(json["verdict"]["performance_category"], "nonviable");
        let ids: Vec<_> = json["suggestions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap().to_string())
            .collect();
        assert!(ids.contains(&"lower_quantization".to_string()));
        assert!(ids.contains(&"use_smaller_model".to_string()));
    }

    #[test]
    fn test_advisor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Advisor>();
    }
}
