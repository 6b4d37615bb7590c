//! Parametric cost model: model/task description -> VRAM, RAM and wall-clock time.
//!
//! Every coefficient lives in [`CostTables`], which is handed to [`CostModel`]
//! rather than read from globals, so callers and tests can substitute their own
//! calibration. All formulas are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use crate::model::{
    AdapterConfig, DEFAULT_INTERACTION_ROUNDS, DEFAULT_TOKENS_PER_INTERACTION, FineTuneTask, HardwareTier, ModelProfile, Quantization, ResourceEstimate,
    TaskConfig, TimeEstimate,
};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

const PARAMS_PER_BILLION: f64 = 1_000_000_000.0;

/// LoRA-style adapter overhead coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraCoefficients {
    /// MiB per unit of rank per billion parameters.
    pub rank_mib: f64,
    /// MiB per unit of alpha per billion parameters.
    pub alpha_mib: f64,
    /// Bytes per activation element for the batch/sequence term.
    pub activation_bytes: f64,
    /// Multiplier applied on top of the batch/sequence term. Over-estimates on purpose.
    pub activation_safety_factor: f64,
    /// MiB of optimizer state per unit of rank per billion parameters.
    pub optimizer_mib: f64,
}

impl Default for LoraCoefficients {
    fn default() -> Self {
        Self {
            rank_mib: 0.1,
            alpha_mib: 0.01,
            activation_bytes: 4.0,
            activation_safety_factor: 4.0,
            optimizer_mib: 0.2,
        }
    }
}

/// Calibration tables for the cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTables {
    /// Resident bytes per parameter during a run, by quantization.
    pub bytes_per_parameter: BTreeMap<Quantization, f64>,
    /// Used for any quantization missing from `bytes_per_parameter`.
    pub fallback_bytes_per_parameter: f64,
    /// KV-cache growth in bytes per context token per billion parameters.
    pub kv_bytes_per_token_per_billion: f64,
    /// Buffers and scratch space independent of model size.
    pub system_overhead_bytes: u64,
    pub lora: LoraCoefficients,
    /// Host-side runtime overhead (interpreter, framework, loaders).
    pub process_overhead_bytes: u64,
    /// Host RAM per batch element per billion parameters.
    pub ram_per_batch_per_billion_bytes: f64,
    /// Baseline tokens/s for a 7B reference model, by tier and quantization.
    pub tokens_per_second: BTreeMap<HardwareTier, BTreeMap<Quantization, f64>>,
    /// Used when neither the requested tier nor the integrated tier has an entry.
    pub fallback_tokens_per_second: f64,
    /// Model size the throughput table is calibrated against.
    pub reference_size_billions: f64,
    /// Cap on the speed bonus granted to models smaller than the reference.
    pub max_size_speedup: f64,
    /// Fixed seconds per optimizer step.
    pub step_overhead_secs: f64,
    /// Additional seconds per optimizer step per billion parameters.
    pub step_overhead_secs_per_billion: f64,
}

impl Default for CostTables {
    fn default() -> Self {
        let bytes_per_parameter = BTreeMap::from([
            (Quantization::Q4, 0.7),
            (Quantization::Q5, 0.85),
            (Quantization::Q8, 1.2),
            (Quantization::F16, 2.2),
            (Quantization::F32, 4.4),
        ]);

        let tokens_per_second = BTreeMap::from([
            (
                HardwareTier::Integrated,
                BTreeMap::from([
                    (Quantization::Q4, 7.0),
                    (Quantization::Q8, 4.0),
                    (Quantization::F16, 2.0),
                ]),
            ),
            (
                HardwareTier::ConsumerGpu,
                BTreeMap::from([
                    (Quantization::Q4, 20.0),
                    (Quantization::Q8, 12.0),
                    (Quantization::F16, 8.0),
                ]),
            ),
            (
                HardwareTier::ProfessionalGpu,
                BTreeMap::from([
                    (Quantization::Q4, 50.0),
                    (Quantization::Q8, 30.0),
                    (Quantization::F16, 20.0),
                ]),
            ),
        ]);

        Self {
            bytes_per_parameter,
            fallback_bytes_per_parameter: 5.0,
            kv_bytes_per_token_per_billion: 12.0,
            system_overhead_bytes: 300 * MIB,
            lora: LoraCoefficients::default(),
            process_overhead_bytes: 2 * GIB,
            ram_per_batch_per_billion_bytes: 0.3 * GIB as f64,
            tokens_per_second,
            fallback_tokens_per_second: 2.0,
            reference_size_billions: 7.0,
            max_size_speedup: 1.5,
            step_overhead_secs: 0.1,
            step_overhead_secs_per_billion: 0.05,
        }
    }
}

impl CostTables {
    /// Reject tables that would produce negative, infinite or NaN estimates.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut scalars = vec![
            ("fallback_bytes_per_parameter", self.fallback_bytes_per_parameter),
            (
                "kv_bytes_per_token_per_billion",
                self.kv_bytes_per_token_per_billion,
            ),
            (
                "ram_per_batch_per_billion_bytes",
                self.ram_per_batch_per_billion_bytes,
            ),
            ("lora.rank_mib", self.lora.rank_mib),
            ("lora.alpha_mib", self.lora.alpha_mib),
            ("lora.activation_bytes", self.lora.activation_bytes),
            (
                "lora.activation_safety_factor",
                self.lora.activation_safety_factor,
            ),
            ("lora.optimizer_mib", self.lora.optimizer_mib),
            ("step_overhead_secs", self.step_overhead_secs),
            (
                "step_overhead_secs_per_billion",
                self.step_overhead_secs_per_billion,
            ),
        ];
        scalars.extend(
            self.bytes_per_parameter
                .values()
                .map(|v| ("bytes_per_parameter", *v)),
        );
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }

        let mut rates = vec![
            ("fallback_tokens_per_second", self.fallback_tokens_per_second),
            ("reference_size_billions", self.reference_size_billions),
            ("max_size_speedup", self.max_size_speedup),
        ];
        rates.extend(
            self.tokens_per_second
                .values()
                .flat_map(|row| row.values())
                .map(|v| ("tokens_per_second", *v)),
        );
        for (name, value) in rates {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be a positive number, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Round a fractional byte count up so estimates never under-report.
fn to_bytes(value: f64) -> u64 {
    value.max(0.0).ceil() as u64
}

/// Estimates the cost of a single model, with or without an adapter.
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    tables: CostTables,
}

impl CostModel {
    pub fn new(tables: CostTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &CostTables {
        &self.tables
    }

    pub fn bytes_per_parameter(&self, quantization: Quantization) -> f64 {
        self.tables
            .bytes_per_parameter
            .get(&quantization)
            .copied()
            .unwrap_or(self.tables.fallback_bytes_per_parameter)
    }

    /// Baseline throughput for the reference model size.
    ///
    /// Unknown (tier, quantization) pairs fall back to the integrated tier, then to
    /// the table-wide floor.
    pub fn tokens_per_second(&self, tier: HardwareTier, quantization: Quantization) -> f64 {
        let lookup = |tier: HardwareTier| {
            self.tables
                .tokens_per_second
                .get(&tier)
                .and_then(|row| row.get(&quantization))
                .copied()
        };
        lookup(tier)
            .or_else(|| lookup(HardwareTier::Integrated))
            .unwrap_or(self.tables.fallback_tokens_per_second)
    }

    /// Throughput corrected for model size: smaller models get a capped bonus.
    pub fn adjusted_tokens_per_second(&self, tier: HardwareTier, model: &ModelProfile) -> f64 {
        let size_adjustment = (self.tables.reference_size_billions / model.size_billions)
            .min(self.tables.max_size_speedup);
        self.tokens_per_second(tier, model.quantization) * size_adjustment
    }

    /// Weights + KV cache + fixed system overhead, in fractional bytes.
    fn model_vram(&self, model: &ModelProfile) -> f64 {
        let weights = model.size_billions
            * PARAMS_PER_BILLION
            * self.bytes_per_parameter(model.quantization);
        let kv_cache = model.context_length as f64
            * model.size_billions
            * self.tables.kv_bytes_per_token_per_billion;
        weights + kv_cache + self.tables.system_overhead_bytes as f64
    }

    fn adapter_vram(&self, model: &ModelProfile, adapter: &AdapterConfig) -> f64 {
        let lora = &self.tables.lora;
        let mib = MIB as f64;
        let size = model.size_billions;

        let rank = size * adapter.rank as f64 * lora.rank_mib * mib;
        let alpha = size * adapter.alpha as f64 * lora.alpha_mib * mib;
        let activations = adapter.batch_size as f64
            * adapter.max_seq_length as f64
            * size
            * lora.activation_bytes
            * lora.activation_safety_factor;
        let optimizer = adapter.rank as f64 * size * lora.optimizer_mib * mib;

        rank + alpha + activations + optimizer
    }

    /// Total training time in seconds for one fine-tuning run.
    pub fn training_time_secs(
        &self,
        model: &ModelProfile,
        adapter: &AdapterConfig,
        tier: HardwareTier,
    ) -> f64 {
        let tokens_per_second = self.adjusted_tokens_per_second(tier, model);
        let steps_per_epoch = adapter.dataset_size.div_ceil(adapter.batch_size as u64);
        let total_steps = steps_per_epoch.saturating_mul(adapter.epochs as u64);

        let tokens_per_step = adapter.batch_size as f64 * adapter.max_seq_length as f64;
        let step_overhead = self.tables.step_overhead_secs
            + self.tables.step_overhead_secs_per_billion * model.size_billions;
        let secs_per_step = tokens_per_step / tokens_per_second + step_overhead;

        total_steps as f64 * secs_per_step
    }

    /// Seconds for one agent to produce one interaction's worth of tokens.
    pub fn interaction_time_secs(
        &self,
        model: &ModelProfile,
        tokens_per_interaction: u32,
        tier: HardwareTier,
    ) -> f64 {
        tokens_per_interaction as f64 / self.adjusted_tokens_per_second(tier, model)
    }

    /// Inference time for one agent over a session of `rounds` interactions.
    pub fn session_time(
        &self,
        model: &ModelProfile,
        rounds: u32,
        tokens_per_interaction: u32,
        tier: HardwareTier,
    ) -> TimeEstimate {
        TimeEstimate::spread(
            self.interaction_time_secs(model, tokens_per_interaction, tier) * rounds as f64,
        )
    }

    /// Estimate a single model, optionally fine-tuned through an adapter.
    ///
    /// With an adapter the time is the training run. Without one it is an inference
    /// session of [`DEFAULT_INTERACTION_ROUNDS`] interactions of
    /// [`DEFAULT_TOKENS_PER_INTERACTION`] tokens, the same session a lone agent runs.
    pub fn estimate_single(
        &self,
        model: &ModelProfile,
        adapter: Option<&AdapterConfig>,
        tier: HardwareTier,
    ) -> Result<ResourceEstimate> {
        model.validate()?;
        if let Some(adapter) = adapter {
            adapter.validate()?;
        }

        let mut vram = self.model_vram(model);
        if let Some(adapter) = adapter {
            vram += self.adapter_vram(model, adapter);
        }
        let vram_bytes = to_bytes(vram);

        let batch_size = adapter.map_or(1, |a| a.batch_size);
        let batch_ram =
            batch_size as f64 * model.size_billions * self.tables.ram_per_batch_per_billion_bytes;
        let ram_bytes = vram_bytes
            .saturating_add(self.tables.process_overhead_bytes)
            .saturating_add(to_bytes(batch_ram));

        let time = match adapter {
            Some(adapter) => TimeEstimate::exact(self.training_time_secs(model, adapter, tier)),
            None => self.session_time(
                model,
                DEFAULT_INTERACTION_ROUNDS,
                DEFAULT_TOKENS_PER_INTERACTION,
                tier,
            ),
        };

        tracing::trace!(
            size_billions = model.size_billions,
            quantization = %model.quantization,
            has_adapter = adapter.is_some(),
            vram_bytes,
            ram_bytes,
            time_secs = time.expected_secs,
            "Estimated single model"
        );

        Ok(ResourceEstimate {
            vram_bytes,
            ram_bytes,
            time,
        })
    }

    pub fn estimate_fine_tune(&self, task: &FineTuneTask) -> Result<ResourceEstimate> {
        self.estimate_single(&task.model, task.adapter.as_ref(), task.hardware)
    }

    /// Estimate any task shape.
    pub fn estimate_task(&self, task: &TaskConfig) -> Result<ResourceEstimate> {
        match task {
            TaskConfig::FineTuning(task) => self.estimate_fine_tune(task),
            TaskConfig::MultiAgent(task) => self.estimate_multi_agent(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvisorError;

    fn model(size: f64, q: Quantization) -> ModelProfile {
        ModelProfile::new(size, q)
    }

    #[test]
    fn test_base_vram_formula() {
        let cost = CostModel::default();
        let m = model(7.0, Quantization::Q4).with_context_length(2048);
        let estimate = cost
            .estimate_single(&m, None, HardwareTier::ConsumerGpu)
            .unwrap();

        let expected = 7.0e9 * 0.7 + 2048.0 * 7.0 * 12.0 + (300 * MIB) as f64;
        assert_eq!(estimate.vram_bytes, expected.ceil() as u64);
    }

    #[test]
    fn test_ram_includes_process_and_batch_overhead() {
        let cost = CostModel::default();
        let m = model(7.0, Quantization::Q8);
        let estimate = cost
            .estimate_single(&m, None, HardwareTier::ConsumerGpu)
            .unwrap();

        let batch = (7.0 * (0.3 * GIB as f64)).ceil() as u64;
        assert_eq!(estimate.ram_bytes, estimate.vram_bytes + 2 * GIB + batch);
    }

    #[test]
    fn test_adapter_adds_overhead() {
        let cost = CostModel::default();
        let m = model(13.0, Quantization::Q8);
        let adapter = AdapterConfig::default();

        let base = cost
            .estimate_single(&m, None, HardwareTier::ConsumerGpu)
            .unwrap();
        let tuned = cost
            .estimate_single(&m, Some(&adapter), HardwareTier::ConsumerGpu)
            .unwrap();

        assert!(tuned.vram_bytes > base.vram_bytes);
        assert!(tuned.time_secs() > 0.0);
        assert_ne!(tuned.time, base.time);
    }

    #[test]
    fn test_no_adapter_time_is_default_session() {
        let cost = CostModel::default();
        let m = model(7.0, Quantization::Q8);
        let estimate = cost
            .estimate_single(&m, None, HardwareTier::ConsumerGpu)
            .unwrap();

        // 1000 tokens at 12 tok/s, 3 rounds
        let expected = 1000.0 / 12.0 * 3.0;
        assert!((estimate.time.expected_secs - expected).abs() < 1e-9);
        assert!((estimate.time.min_secs - expected * 0.7).abs() < 1e-9);
        assert!((estimate.time.max_secs - expected * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_huge_dataset_saturates_instead_of_overflowing() {
        let cost = CostModel::default();
        let adapter = AdapterConfig {
            dataset_size: u64::MAX,
            batch_size: 1,
            epochs: u32::MAX,
            ..Default::default()
        };
        let secs = cost.training_time_secs(
            &model(7.0, Quantization::Q4),
            &adapter,
            HardwareTier::ConsumerGpu,
        );
        assert!(secs.is_finite());
        assert!(secs > 0.0);
    }

    #[test]
    fn test_adapter_overhead_terms() {
        let cost = CostModel::default();
        let m = model(10.0, Quantization::Q4);
        let adapter = AdapterConfig {
            rank: 8,
            alpha: 16,
            batch_size: 2,
            max_seq_length: 1024,
            epochs: 1,
            dataset_size: 10,
        };
        let mib = MIB as f64;
        let expected = 10.0 * 8.0 * 0.1 * mib
            + 10.0 * 16.0 * 0.01 * mib
            + 2.0 * 1024.0 * 10.0 * 16.0
            + 8.0 * 10.0 * 0.2 * mib;
        let actual = cost.adapter_vram(&m, &adapter);
        assert!((actual - expected).abs() < 1e-6);
    }

    #[test]
    fn test_missing_table_entry_uses_fallback() {
        let mut tables = CostTables::default();
        tables.bytes_per_parameter.remove(&Quantization::Q5);
        let cost = CostModel::new(tables);
        assert_eq!(cost.bytes_per_parameter(Quantization::Q5), 5.0);
        assert_eq!(cost.bytes_per_parameter(Quantization::Q4), 0.7);
    }

    #[test]
    fn test_tokens_per_second_fallbacks() {
        let cost = CostModel::default();
        assert_eq!(
            cost.tokens_per_second(HardwareTier::ProfessionalGpu, Quantization::Q4),
            50.0
        );
        // q5 is not calibrated on any tier
        assert_eq!(
            cost.tokens_per_second(HardwareTier::ConsumerGpu, Quantization::Q5),
            2.0
        );

        let mut tables = CostTables::default();
        tables
            .tokens_per_second
            .get_mut(&HardwareTier::ConsumerGpu)
            .unwrap()
            .remove(&Quantization::Q8);
        let cost = CostModel::new(tables);
        assert_eq!(
            cost.tokens_per_second(HardwareTier::ConsumerGpu, Quantization::Q8),
            4.0
        );
    }

    #[test]
    fn test_size_adjustment_is_capped() {
        let cost = CostModel::default();
        let small = model(1.0, Quantization::Q4);
        let reference = model(7.0, Quantization::Q4);
        let large = model(14.0, Quantization::Q4);
        let tier = HardwareTier::ConsumerGpu;

        assert_eq!(cost.adjusted_tokens_per_second(tier, &small), 30.0);
        assert_eq!(cost.adjusted_tokens_per_second(tier, &reference), 20.0);
        assert_eq!(cost.adjusted_tokens_per_second(tier, &large), 10.0);
    }

    #[test]
    fn test_training_time_formula() {
        let cost = CostModel::default();
        let m = model(7.0, Quantization::Q4);
        let adapter = AdapterConfig {
            rank: 16,
            alpha: 32,
            batch_size: 4,
            max_seq_length: 512,
            epochs: 2,
            dataset_size: 10,
        };
        // ceil(10 / 4) * 2 = 6 steps, 2048 tokens at 20 tok/s + 0.45s overhead
        let expected = 6.0 * (2048.0 / 20.0 + 0.1 + 0.05 * 7.0);
        let actual = cost.training_time_secs(&m, &adapter, HardwareTier::ConsumerGpu);
        assert!((actual - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_dataset_means_zero_time() {
        let cost = CostModel::default();
        let adapter = AdapterConfig {
            dataset_size: 0,
            ..Default::default()
        };
        let estimate = cost
            .estimate_single(
                &model(7.0, Quantization::Q4),
                Some(&adapter),
                HardwareTier::Integrated,
            )
            .unwrap();
        assert_eq!(estimate.time_secs(), 0.0);
        assert!(estimate.vram_bytes > 0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let cost = CostModel::default();
        let err = cost
            .estimate_single(&model(-1.0, Quantization::Q4), None, HardwareTier::Integrated)
            .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidInput { .. }));

        let adapter = AdapterConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = cost
            .estimate_single(
                &model(7.0, Quantization::Q4),
                Some(&adapter),
                HardwareTier::Integrated,
            )
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_estimates_are_deterministic() {
        let cost = CostModel::default();
        let m = model(13.0, Quantization::Q8);
        let adapter = AdapterConfig::default();
        let a = cost
            .estimate_single(&m, Some(&adapter), HardwareTier::ConsumerGpu)
            .unwrap();
        let b = cost
            .estimate_single(&m, Some(&adapter), HardwareTier::ConsumerGpu)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.time.expected_secs.to_bits(), b.time.expected_secs.to_bits());
    }

    #[test]
    fn test_default_tables_are_valid() {
        assert!(CostTables::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut tables = CostTables::default();
        tables.bytes_per_parameter.insert(Quantization::Q4, -1.0);
        assert!(tables.validate().is_err());

        let mut tables = CostTables::default();
        tables.fallback_tokens_per_second = 0.0;
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_tables_toml_round_trip() {
        let tables = CostTables::default();
        let text = toml::to_string(&tables).unwrap();
        let parsed: CostTables = toml::from_str(&text).unwrap();
        assert_eq!(parsed, tables);
    }
}
