//! Port coverage statistics and source-model synthesis.
//!
//! A co-simulation mesh needs every input port of the target model fed by
//! some output. This module counts ports per storage category, works out
//! which target inputs the already-wired FMUs do not cover, and
//! synthesizes a generator ("source") model whose outputs make up the
//! difference. The synthesized model is an ordinary interchange document;
//! producing its FMU is a normal generation run against a source template.

use std::fmt;

use crate::model::{
    AUTO_VALUE_REF, Causality, Initial, ModelSpec, ScalarVariable, VarType, Variability,
};

/// Variable counts for one direction, split by storage category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCount {
    pub real: usize,
    pub boolean: usize,
    pub integer: usize,
    pub string: usize,
}

impl PortCount {
    fn add(&mut self, var_type: VarType) {
        match var_type {
            VarType::Real => self.real += 1,
            VarType::Boolean => self.boolean += 1,
            VarType::Integer => self.integer += 1,
            VarType::String => self.string += 1,
        }
    }

    /// Add another count category-wise.
    pub fn accumulate(&mut self, other: &PortCount) {
        self.real += other.real;
        self.boolean += other.boolean;
        self.integer += other.integer;
        self.string += other.string;
    }

    /// Category-wise count of ports in `self` not covered by `provided`.
    /// Surplus in a category never compensates a deficit in another.
    pub fn saturating_sub(&self, provided: &PortCount) -> PortCount {
        PortCount {
            real: self.real.saturating_sub(provided.real),
            boolean: self.boolean.saturating_sub(provided.boolean),
            integer: self.integer.saturating_sub(provided.integer),
            string: self.string.saturating_sub(provided.string),
        }
    }

    pub fn total(&self) -> usize {
        self.real + self.boolean + self.integer + self.string
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for PortCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "real={} boolean={} integer={} string={}",
            self.real, self.boolean, self.integer, self.string
        )
    }
}

/// Input and output port counts of one model. Parameters and locals are
/// not ports and do not count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    pub inputs: PortCount,
    pub outputs: PortCount,
}

impl PortStats {
    pub fn of(model: &ModelSpec) -> Self {
        let mut stats = Self::default();
        for var in &model.variables {
            match var.causality {
                Causality::Input => stats.inputs.add(var.var_type),
                Causality::Output => stats.outputs.add(var.var_type),
                _ => {}
            }
        }
        stats
    }
}

/// Target inputs not covered by the outputs of the provided models.
pub fn uncovered_inputs(target: &ModelSpec, provided: &[ModelSpec]) -> PortCount {
    let needed = PortStats::of(target).inputs;
    let mut available = PortCount::default();
    for model in provided {
        available.accumulate(&PortStats::of(model).outputs);
    }
    needed.saturating_sub(&available)
}

/// Synthesize the source model whose outputs cover every target input the
/// provided FMUs leave unfed.
///
/// Outputs are named `output1..outputN` and emitted in the fixed category
/// order boolean, real, integer, string; all are continuous, carry the
/// automatic value-reference sentinel and start at `"1"`. An empty
/// variable list means the target is already fully covered.
pub fn synthesize_source_model(
    model_name: &str,
    target: &ModelSpec,
    provided: &[ModelSpec],
) -> ModelSpec {
    let uncovered = uncovered_inputs(target, provided);
    let categories = [
        (VarType::Boolean, uncovered.boolean),
        (VarType::Real, uncovered.real),
        (VarType::Integer, uncovered.integer),
        (VarType::String, uncovered.string),
    ];

    let mut variables = Vec::with_capacity(uncovered.total());
    let mut index = 1usize;
    for (var_type, count) in categories {
        for _ in 0..count {
            variables.push(source_output(&format!("output{}", index), var_type));
            index += 1;
        }
    }

    ModelSpec {
        model_name: model_name.to_string(),
        description: String::new(),
        variables,
    }
}

fn source_output(name: &str, var_type: VarType) -> ScalarVariable {
    ScalarVariable {
        name: name.to_string(),
        value_ref: AUTO_VALUE_REF,
        variability: Variability::Continuous,
        causality: Causality::Output,
        initial: Some(Initial::Approx),
        var_type,
        start_value: "1".to_string(),
        description: String::new(),
        unit: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, causality: Causality, var_type: VarType) -> ScalarVariable {
        ScalarVariable {
            name: name.to_string(),
            value_ref: AUTO_VALUE_REF,
            variability: Variability::Continuous,
            causality,
            initial: None,
            var_type,
            start_value: "0".to_string(),
            description: String::new(),
            unit: String::new(),
        }
    }

    fn model(name: &str, variables: Vec<ScalarVariable>) -> ModelSpec {
        ModelSpec {
            model_name: name.to_string(),
            description: String::new(),
            variables,
        }
    }

    #[test]
    fn test_port_stats_split_by_direction_and_category() {
        let m = model(
            "plant",
            vec![
                var("a", Causality::Input, VarType::Real),
                var("b", Causality::Input, VarType::Real),
                var("c", Causality::Input, VarType::Boolean),
                var("d", Causality::Output, VarType::Integer),
                var("e", Causality::Parameter, VarType::Real),
                var("f", Causality::Local, VarType::String),
            ],
        );
        let stats = PortStats::of(&m);
        assert_eq!(stats.inputs.real, 2);
        assert_eq!(stats.inputs.boolean, 1);
        assert_eq!(stats.inputs.total(), 3);
        assert_eq!(stats.outputs.integer, 1);
        assert_eq!(stats.outputs.total(), 1);
    }

    #[test]
    fn test_uncovered_saturates_per_category() {
        let target = model(
            "plant",
            vec![
                var("a", Causality::Input, VarType::Real),
                var("b", Causality::Input, VarType::Boolean),
            ],
        );
        // provides a surplus integer output and covers the boolean input;
        // the surplus must not pay for the real deficit
        let provided = model(
            "feeder",
            vec![
                var("x", Causality::Output, VarType::Boolean),
                var("y", Causality::Output, VarType::Integer),
                var("z", Causality::Output, VarType::Integer),
            ],
        );
        let uncovered = uncovered_inputs(&target, &[provided]);
        assert_eq!(uncovered.real, 1);
        assert_eq!(uncovered.boolean, 0);
        assert_eq!(uncovered.integer, 0);
        assert_eq!(uncovered.string, 0);
    }

    #[test]
    fn test_uncovered_sums_all_provided_models() {
        let target = model(
            "plant",
            vec![
                var("a", Causality::Input, VarType::Real),
                var("b", Causality::Input, VarType::Real),
                var("c", Causality::Input, VarType::Real),
            ],
        );
        let one = model("one", vec![var("x", Causality::Output, VarType::Real)]);
        let two = model("two", vec![var("y", Causality::Output, VarType::Real)]);
        let uncovered = uncovered_inputs(&target, &[one, two]);
        assert_eq!(uncovered.real, 1);
    }

    #[test]
    fn test_synthesized_outputs_follow_category_order() {
        let target = model(
            "plant",
            vec![
                var("r", Causality::Input, VarType::Real),
                var("s", Causality::Input, VarType::String),
                var("i", Causality::Input, VarType::Integer),
                var("b", Causality::Input, VarType::Boolean),
            ],
        );
        let source = synthesize_source_model("source", &target, &[]);
        assert_eq!(source.model_name, "source");
        let kinds: Vec<(String, VarType)> = source
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.var_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("output1".to_string(), VarType::Boolean),
                ("output2".to_string(), VarType::Real),
                ("output3".to_string(), VarType::Integer),
                ("output4".to_string(), VarType::String),
            ]
        );
    }

    #[test]
    fn test_synthesized_variable_shape() {
        let target = model("plant", vec![var("a", Causality::Input, VarType::Real)]);
        let source = synthesize_source_model("source", &target, &[]);
        let out = &source.variables[0];
        assert_eq!(out.causality, Causality::Output);
        assert_eq!(out.variability, Variability::Continuous);
        assert_eq!(out.initial, Some(Initial::Approx));
        assert_eq!(out.value_ref, AUTO_VALUE_REF);
        assert_eq!(out.start_value, "1");
        source.validate().unwrap();
    }

    #[test]
    fn test_fully_covered_target_yields_empty_model() {
        let target = model("plant", vec![var("a", Causality::Input, VarType::Real)]);
        let provided = model("feeder", vec![var("x", Causality::Output, VarType::Real)]);
        let source = synthesize_source_model("source", &target, &[provided]);
        assert!(source.variables.is_empty());
        assert!(uncovered_inputs(&target, &[]).total() > 0);
    }

    #[test]
    fn test_port_count_display() {
        let count = PortCount {
            real: 2,
            boolean: 0,
            integer: 1,
            string: 0,
        };
        assert_eq!(count.to_string(), "real=2 boolean=0 integer=1 string=0");
    }
}
