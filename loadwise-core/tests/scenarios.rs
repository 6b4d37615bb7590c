//! End-to-end scenarios for the advisor pipeline.
//!
//! Each test drives the public API the way the dashboard does on a form edit:
//! estimate, evaluate against declared capacity, then ask for suggestions.

use loadwise_core::{
    AdapterConfig, Advisor, AgentProfile, AvailableResources, ExecutionMode, FineTuneTask, GIB,
    HardwareTier, ModelProfile, MultiAgentTask, PerformanceCategory, Quantization,
    ResourceEstimate, SuggestionKind, TaskConfig, estimate_multi_agent, estimate_single,
    evaluate_viability, generate_suggestions,
};
use pretty_assertions::assert_eq;

fn tight_fine_tune() -> TaskConfig {
    TaskConfig::FineTuning(FineTuneTask {
        model: ModelProfile::new(13.0, Quantization::Q8).with_context_length(4096),
        adapter: Some(AdapterConfig {
            rank: 32,
            alpha: 64,
            batch_size: 8,
            max_seq_length: 4096,
            epochs: 3,
            dataset_size: 5000,
        }),
        hardware: HardwareTier::ConsumerGpu,
    })
}

fn three_large_agents() -> Vec<AgentProfile> {
    ["planner", "researcher", "writer"]
        .into_iter()
        .map(|role| AgentProfile::new(role, ModelProfile::new(13.0, Quantization::Q8)))
        .collect()
}

// --- Fine-tuning: tight fit ---

#[test]
fn test_fine_tune_tight_fit_is_risky_but_viable() {
    let advisor = Advisor::default();
    let task = tight_fine_tune();
    let available = AvailableResources::new(16 * GIB, 64 * GIB);

    let report = advisor.analyze(&task, &available).unwrap();

    assert!(report.verdict.viable);
    assert_eq!(
        report.verdict.performance_category,
        PerformanceCategory::Risky
    );
    assert!(report.verdict.vram_utilization > 0.9);
    assert!(report.verdict.vram_utilization <= 1.0);
}

#[test]
fn test_fine_tune_tight_fit_suggests_four_bit() {
    let advisor = Advisor::default();
    let task = tight_fine_tune();
    let available = AvailableResources::new(16 * GIB, 64 * GIB);

    let report = advisor.analyze(&task, &available).unwrap();
    let four_bit = report
        .suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::LowerQuantization)
        .expect("expected a lower-quantization suggestion");

    assert!(four_bit.reduction_bytes.unwrap() > 0);
    assert!(!four_bit.balanced);
    assert_eq!(
        four_bit.change,
        Some(loadwise_core::ConfigChange::Quantization {
            to: Quantization::Q4
        })
    );
    assert_eq!(four_bit.fits_vram, Some(true));
}

#[test]
fn test_applying_suggestion_improves_category() {
    let advisor = Advisor::default();
    let task = tight_fine_tune();
    let available = AvailableResources::new(16 * GIB, 64 * GIB);

    let report = advisor.analyze(&task, &available).unwrap();
    let change = report
        .suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::LowerQuantization)
        .and_then(|s| s.change)
        .unwrap();

    let next = advisor.analyze(&task.apply(&change).unwrap(), &available).unwrap();
    assert!(next.verdict.performance_category < report.verdict.performance_category);
    assert!(next.estimate.vram_bytes < report.estimate.vram_bytes);
}

// --- Multi-agent: infeasible parallel ---

#[test]
fn test_three_large_agents_in_parallel_do_not_fit() {
    let agents = three_large_agents();
    let available = AvailableResources::new(12 * GIB, 128 * GIB);

    let parallel = estimate_multi_agent(&agents, ExecutionMode::Parallel, None).unwrap();
    let verdict = evaluate_viability(&parallel, &available);
    assert!(!verdict.viable);
    assert_eq!(verdict.performance_category, PerformanceCategory::Nonviable);
}

#[test]
fn test_sequential_reduces_to_largest_agent() {
    let agents = three_large_agents();

    let parallel = estimate_multi_agent(&agents, ExecutionMode::Parallel, None).unwrap();
    let sequential = estimate_multi_agent(&agents, ExecutionMode::Sequential, None).unwrap();
    let largest = estimate_single(&agents[0].model, None, HardwareTier::default()).unwrap();

    assert_eq!(sequential.vram_bytes, largest.vram_bytes);
    assert_eq!(parallel.vram_bytes, 3 * largest.vram_bytes);
    assert!(sequential.time.expected_secs > parallel.time.expected_secs);
}

#[test]
fn test_parallel_run_suggests_sequential_first() {
    let agents = three_large_agents();
    let task = TaskConfig::MultiAgent(MultiAgentTask::new(agents, ExecutionMode::Parallel));
    let available = AvailableResources::new(12 * GIB, 128 * GIB);

    let report = Advisor::default().analyze(&task, &available).unwrap();
    assert_eq!(report.suggestions[0].kind, SuggestionKind::SwitchToSequential);
    assert!(
        report
            .suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::DownsizeLargeAgents && s.reduction_bytes.is_none())
    );
}

// --- Zero-resource guard ---

#[test]
fn test_zero_resources_are_nonviable_without_error() {
    let estimate =
        estimate_single(&ModelProfile::new(7.0, Quantization::Q4), None, HardwareTier::Integrated)
            .unwrap();
    let verdict = evaluate_viability(&estimate, &AvailableResources::new(0, 0));

    assert!(!verdict.viable);
    assert!(verdict.vram_utilization.is_infinite());
    assert!(verdict.ram_utilization.is_infinite());
    assert_eq!(verdict.performance_category, PerformanceCategory::Nonviable);
}

// --- Aggregation edge cases ---

#[test]
fn test_empty_parallel_is_zero() {
    let estimate = estimate_multi_agent(&[], ExecutionMode::Parallel, None).unwrap();
    assert_eq!(estimate, ResourceEstimate::zero());
}

#[test]
fn test_single_agent_sequential_matches_single() {
    let model = ModelProfile::new(8.0, Quantization::F16).with_context_length(8192);
    let agents = vec![AgentProfile::new("solo", model.clone())];

    let aggregate = estimate_multi_agent(&agents, ExecutionMode::Sequential, None).unwrap();
    let single = estimate_single(&model, None, HardwareTier::default()).unwrap();

    assert_eq!(aggregate, single);
}

// --- Category boundaries ---

#[test]
fn test_category_boundaries() {
    let cases = [
        (70_000, PerformanceCategory::Optimal),
        (70_001, PerformanceCategory::High),
        (90_000, PerformanceCategory::High),
        (90_001, PerformanceCategory::Risky),
    ];
    for (vram, expected) in cases {
        let estimate = ResourceEstimate {
            vram_bytes: vram,
            ram_bytes: 0,
            ..Default::default()
        };
        let verdict = evaluate_viability(&estimate, &AvailableResources::new(100_000, 100_000));
        assert_eq!(verdict.performance_category, expected, "vram = {vram}");
    }
}

#[test]
fn test_optimal_configuration_gets_no_suggestions() {
    let task = TaskConfig::FineTuning(FineTuneTask {
        model: ModelProfile::new(1.0, Quantization::Q4),
        adapter: Some(AdapterConfig::default()),
        hardware: HardwareTier::ProfessionalGpu,
    });
    let available = AvailableResources::new(80 * GIB, 256 * GIB);
    let estimate = Advisor::default().estimate(&task).unwrap();
    let verdict = evaluate_viability(&estimate, &available);

    assert_eq!(verdict.performance_category, PerformanceCategory::Optimal);
    assert!(
        generate_suggestions(&task, &estimate, &verdict, &available)
            .unwrap()
            .is_empty()
    );
}

// --- Invalid input ---

#[test]
fn test_invalid_input_names_field() {
    let err = estimate_single(
        &ModelProfile::new(7.0, Quantization::Q4),
        Some(&AdapterConfig {
            batch_size: 0,
            ..Default::default()
        }),
        HardwareTier::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("batch_size"));

    let err = "swarm".parse::<ExecutionMode>().unwrap_err();
    assert!(err.to_string().contains("swarm"));
}

#[test]
fn test_task_file_round_trip() {
    let task = tight_fine_tune();
    let text = serde_json::to_string_pretty(&task).unwrap();
    let parsed: TaskConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, task);
}
