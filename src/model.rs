// src/model.rs

//! Variable model and interchange format
//!
//! A model is a named collection of scalar variables, each mapped onto one
//! of the four FMI 2.0 scalar kinds. Models arrive as JSON documents, are
//! validated against C-identifier rules, and are written back verbatim as
//! the recovery/input file next to the generated archive. Serialization is
//! value-preserving: parse followed by serialize yields an equal model.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};

/// Sentinel for "allocate this value reference automatically".
pub const AUTO_VALUE_REF: i32 = -1;

/// Scalar kind of a variable, matching the FMI 2.0 type element names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
pub enum VarType {
    Real,
    Integer,
    Boolean,
    String,
}

impl VarType {
    /// Prefix of the member storage map the generated source keeps values in
    /// (`m_realVar`, `m_boolVar`, `m_integerVar`, `m_stringVar`).
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            VarType::Real => "real",
            VarType::Boolean => "bool",
            VarType::Integer => "integer",
            VarType::String => "string",
        }
    }

    /// Prefix of the exchange-function argument map for this kind.
    ///
    /// String variables have no exchange map: the double-based wire buffer
    /// cannot carry them.
    pub fn arg_prefix(&self) -> Option<&'static str> {
        match self {
            VarType::Real => Some("real"),
            VarType::Boolean => Some("bool"),
            VarType::Integer => Some("int"),
            VarType::String => None,
        }
    }

    /// C++ declaration type for local copies of a variable of this kind.
    pub fn cpp_type(&self) -> &'static str {
        match self {
            VarType::Real => "double",
            VarType::Boolean => "bool",
            VarType::Integer => "int",
            VarType::String => "const std::string &",
        }
    }

    /// C++ cast applied when a buffer slot is narrowed back to this kind.
    pub fn buffer_cast(&self) -> Option<&'static str> {
        match self {
            VarType::Real => Some("double"),
            VarType::Boolean => Some("bool"),
            VarType::Integer => Some("int"),
            VarType::String => None,
        }
    }
}

/// FMI causality of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Causality {
    Parameter,
    CalculatedParameter,
    Input,
    Output,
    Local,
    Independent,
}

impl Causality {
    /// Prefix family of the `#define` emitted into generated source.
    ///
    /// Both parameter causalities share the `PARA` family. Independent
    /// variables have no family: generated code never refers to them and
    /// they get no define at all.
    pub fn define_prefix(&self) -> Option<&'static str> {
        match self {
            Causality::Input => Some("INPUT"),
            Causality::Output => Some("OUTPUT"),
            Causality::Parameter | Causality::CalculatedParameter => Some("PARA"),
            Causality::Local => Some("LOCAL"),
            Causality::Independent => None,
        }
    }
}

/// FMI variability of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Variability {
    Constant,
    Fixed,
    Tunable,
    Discrete,
    Continuous,
}

/// FMI initial attribute of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum Initial {
    Exact,
    Approx,
    Calculated,
}

/// One scalar variable of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarVariable {
    pub name: String,
    /// Positive integer, or [`AUTO_VALUE_REF`] to request allocation.
    pub value_ref: i32,
    /// An empty string in the interchange document means `continuous`.
    #[serde(deserialize_with = "deserialize_variability")]
    pub variability: Variability,
    pub causality: Causality,
    /// Absent initial round-trips as the empty string.
    #[serde(with = "optional_initial")]
    pub initial: Option<Initial>,
    #[serde(rename = "typeID", deserialize_with = "deserialize_var_type")]
    pub var_type: VarType,
    /// Kept as text: the descriptor and the generated source both embed it
    /// verbatim, so no numeric interpretation happens here.
    pub start_value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
}

impl ScalarVariable {
    /// The `#define` name for this variable in generated source,
    /// e.g. `INPUT_level` or `PARA_gain`. `None` for independent variables.
    pub fn define_name(&self) -> Option<String> {
        self.causality
            .define_prefix()
            .map(|prefix| format!("{}_{}", prefix, self.name))
    }

    /// The member storage cell for this variable,
    /// e.g. `m_realVar[INPUT_level]`. `None` for independent variables.
    pub fn storage_cell(&self) -> Option<String> {
        self.define_name()
            .map(|name| format!("m_{}Var[{}]", self.var_type.storage_prefix(), name))
    }
}

/// A complete variable model as read from (and written to) the
/// JSON interchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub model_name: String,
    pub description: String,
    pub variables: Vec<ScalarVariable>,
}

impl ModelSpec {
    /// Parse a model from its JSON interchange representation.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::MalformedInput(e.to_string()))
    }

    /// Load a model from a `.json` or `.input` file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize back to the interchange representation.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::MalformedInput(e.to_string()))
    }

    /// Write the interchange representation to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Check every structural rule that must hold before generation:
    /// identifier validity, name uniqueness, and value reference sanity.
    pub fn validate(&self) -> Result<()> {
        validate_model_name(&self.model_name)?;

        let mut names = HashSet::new();
        let mut refs = HashSet::new();
        for var in &self.variables {
            validate_variable_name(&var.name)?;
            if !names.insert(var.name.as_str()) {
                return Err(Error::DuplicateVariable(var.name.clone()));
            }
            if var.value_ref != AUTO_VALUE_REF {
                if var.value_ref < 1 {
                    return Err(Error::InvalidValueReference {
                        name: var.name.clone(),
                        value: var.value_ref,
                    });
                }
                if !refs.insert(var.value_ref) {
                    return Err(Error::DuplicateValueReference(var.value_ref));
                }
            }
        }
        Ok(())
    }

    /// Variables with `input` causality, in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &ScalarVariable> {
        self.variables
            .iter()
            .filter(|v| v.causality == Causality::Input)
    }

    /// Variables with `output` causality, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &ScalarVariable> {
        self.variables
            .iter()
            .filter(|v| v.causality == Causality::Output)
    }

    pub fn input_count(&self) -> usize {
        self.inputs().count()
    }

    pub fn output_count(&self) -> usize {
        self.outputs().count()
    }
}

/// Check a variable name against the C-identifier rules: a letter or
/// underscore first, then letters, digits and underscores.
pub fn validate_variable_name(name: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidIdentifier {
        kind: "variable",
        name: name.to_string(),
        reason,
    };

    let first = name
        .chars()
        .next()
        .ok_or_else(|| invalid("name is empty".to_string()))?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid(
            "must start with a letter or underscore".to_string(),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(invalid(format!("contains invalid character '{}'", c)));
    }
    Ok(())
}

/// Check a model name. Stricter than variable names because the name also
/// becomes a file and archive stem: no leading digit or underscore, and no
/// trailing underscore.
pub fn validate_model_name(name: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidIdentifier {
        kind: "model",
        name: name.to_string(),
        reason,
    };

    let first = name
        .chars()
        .next()
        .ok_or_else(|| invalid("name is empty".to_string()))?;
    if !first.is_ascii_alphabetic() {
        return Err(invalid("must start with a letter".to_string()));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(invalid(format!("contains invalid character '{}'", c)));
    }
    if name.ends_with('_') {
        return Err(invalid("must not end with an underscore".to_string()));
    }
    Ok(())
}

fn deserialize_variability<'de, D>(deserializer: D) -> std::result::Result<Variability, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Ok(Variability::Continuous);
    }
    s.parse()
        .map_err(|_| serde::de::Error::custom(format!("unknown variability '{}'", s)))
}

fn deserialize_var_type<'de, D>(deserializer: D) -> std::result::Result<VarType, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(|_| {
        serde::de::Error::custom(format!(
            "unknown variable type '{}' (expected Real, Integer, Boolean or String)",
            s
        ))
    })
}

mod optional_initial {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Initial;

    pub fn serialize<S>(
        value: &Option<Initial>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(initial) => serializer.serialize_str(&initial.to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Initial>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(None);
        }
        s.parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("unknown initial '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "modelName": "tank",
            "description": "water tank",
            "variables": [
                {
                    "name": "level",
                    "valueRef": -1,
                    "variability": "continuous",
                    "causality": "input",
                    "initial": "exact",
                    "typeID": "Real",
                    "startValue": "1.5",
                    "description": "fill level",
                    "unit": "m"
                },
                {
                    "name": "overflow",
                    "valueRef": 3,
                    "variability": "",
                    "causality": "output",
                    "initial": "",
                    "typeID": "Boolean",
                    "startValue": ""
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_sample() {
        let model = ModelSpec::from_json_str(sample_json()).unwrap();
        assert_eq!(model.model_name, "tank");
        assert_eq!(model.variables.len(), 2);

        let level = &model.variables[0];
        assert_eq!(level.value_ref, AUTO_VALUE_REF);
        assert_eq!(level.var_type, VarType::Real);
        assert_eq!(level.initial, Some(Initial::Exact));
        assert_eq!(level.unit, "m");

        let overflow = &model.variables[1];
        assert_eq!(overflow.variability, Variability::Continuous);
        assert_eq!(overflow.initial, None);
        assert_eq!(overflow.description, "");
        assert_eq!(overflow.unit, "");
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let model = ModelSpec::from_json_str(sample_json()).unwrap();
        let text = model.to_json_string().unwrap();
        let again = ModelSpec::from_json_str(&text).unwrap();
        assert_eq!(model, again);
    }

    #[test]
    fn test_absent_initial_serializes_as_empty_string() {
        let model = ModelSpec::from_json_str(sample_json()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&model.to_json_string().unwrap()).unwrap();
        assert_eq!(value["variables"][1]["initial"], "");
        assert_eq!(value["variables"][0]["initial"], "exact");
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = ModelSpec::from_json_str(r#"{"modelName": "m", "variables": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn test_unknown_type_is_reported_by_name() {
        let text = sample_json().replace("\"Real\"", "\"Enumeration\"");
        let err = ModelSpec::from_json_str(&text).unwrap_err();
        assert!(err.to_string().contains("Enumeration"));
    }

    #[test]
    fn test_variable_name_rules() {
        assert!(validate_variable_name("level").is_ok());
        assert!(validate_variable_name("_hidden").is_ok());
        assert!(validate_variable_name("x2_b").is_ok());
        assert!(validate_variable_name("").is_err());
        assert!(validate_variable_name("2x").is_err());
        assert!(validate_variable_name("a-b").is_err());
        assert!(validate_variable_name("a b").is_err());
    }

    #[test]
    fn test_model_name_rules() {
        assert!(validate_model_name("tank").is_ok());
        assert!(validate_model_name("Tank_2").is_ok());
        assert!(validate_model_name("_tank").is_err());
        assert!(validate_model_name("2tank").is_err());
        assert!(validate_model_name("tank_").is_err());
        assert!(validate_model_name("tank.x").is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut model = ModelSpec::from_json_str(sample_json()).unwrap();
        model.variables[1].name = "level".to_string();
        assert!(matches!(
            model.validate(),
            Err(Error::DuplicateVariable(name)) if name == "level"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_value_refs() {
        let mut model = ModelSpec::from_json_str(sample_json()).unwrap();
        model.variables[0].value_ref = 0;
        assert!(matches!(
            model.validate(),
            Err(Error::InvalidValueReference { value: 0, .. })
        ));

        model.variables[0].value_ref = -4;
        assert!(model.validate().is_err());

        model.variables[0].value_ref = 3; // collides with overflow
        assert!(matches!(
            model.validate(),
            Err(Error::DuplicateValueReference(3))
        ));
    }

    #[test]
    fn test_causality_filters() {
        let model = ModelSpec::from_json_str(sample_json()).unwrap();
        assert_eq!(model.input_count(), 1);
        assert_eq!(model.output_count(), 1);
        assert_eq!(model.inputs().next().unwrap().name, "level");
        assert_eq!(model.outputs().next().unwrap().name, "overflow");
    }

    #[test]
    fn test_define_and_cell_names() {
        let model = ModelSpec::from_json_str(sample_json()).unwrap();
        assert_eq!(model.variables[0].define_name().as_deref(), Some("INPUT_level"));
        assert_eq!(
            model.variables[0].storage_cell().as_deref(),
            Some("m_realVar[INPUT_level]")
        );
        assert_eq!(model.variables[1].define_name().as_deref(), Some("OUTPUT_overflow"));
        assert_eq!(
            model.variables[1].storage_cell().as_deref(),
            Some("m_boolVar[OUTPUT_overflow]")
        );
    }

    #[test]
    fn test_parameter_families_share_prefix() {
        assert_eq!(Causality::Parameter.define_prefix(), Some("PARA"));
        assert_eq!(Causality::CalculatedParameter.define_prefix(), Some("PARA"));
        assert_eq!(Causality::Local.define_prefix(), Some("LOCAL"));
        assert_eq!(Causality::Independent.define_prefix(), None);
    }

    #[test]
    fn test_independent_variable_has_no_define_name() {
        let mut model = ModelSpec::from_json_str(sample_json()).unwrap();
        model.variables[0].causality = Causality::Independent;
        assert_eq!(model.variables[0].define_name(), None);
        assert_eq!(model.variables[0].storage_cell(), None);
    }

    #[test]
    fn test_type_mapping_table() {
        assert_eq!(VarType::Real.cpp_type(), "double");
        assert_eq!(VarType::Integer.cpp_type(), "int");
        assert_eq!(VarType::Boolean.cpp_type(), "bool");
        assert_eq!(VarType::String.cpp_type(), "const std::string &");

        assert_eq!(VarType::Integer.storage_prefix(), "integer");
        assert_eq!(VarType::Integer.arg_prefix(), Some("int"));
        assert_eq!(VarType::String.arg_prefix(), None);
        assert_eq!(VarType::Boolean.buffer_cast(), Some("bool"));
        assert_eq!(VarType::String.buffer_cast(), None);
    }

    #[test]
    fn test_causality_strings() {
        assert_eq!(Causality::CalculatedParameter.to_string(), "calculatedParameter");
        assert_eq!("calculatedParameter".parse::<Causality>().unwrap(), Causality::CalculatedParameter);
        assert_eq!(Initial::Calculated.to_string(), "calculated");
        assert_eq!(Variability::Continuous.to_string(), "continuous");
    }
}
