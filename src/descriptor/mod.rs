// src/descriptor/mod.rs

//! Descriptor synthesis
//!
//! The descriptor template carries identity placeholders plus two large
//! generated sub-documents: the variable table and the output dependency
//! table. This module renders both tables as text rows and bundles them
//! with the identity metadata into the [`TokenValues`] for the descriptor
//! substitution pass. Structural post-build editing of the finished
//! descriptor lives in [`postedit`].

pub mod postedit;

use chrono::Local;
use quick_xml::escape::escape;
use uuid::Uuid;

use crate::model::{Causality, Initial, ModelSpec, VarType};
use crate::template::{Token, TokenValues};

/// File name of the descriptor, both inside the template project's `data/`
/// directory and at the root of the packaged archive.
pub const DESCRIPTOR_FILE_NAME: &str = "modelDescription.xml";

/// Timestamp layout written into the descriptor. Twelve-hour clock,
/// matching the stamps existing downstream tooling expects.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%I:%M:%SZ";

/// Identity metadata stamped into one generated package.
///
/// The GUID ties the descriptor to the compiled binary: both embed the
/// same value, and importers cross-check them at load time.
#[derive(Debug, Clone)]
pub struct PackageIdentity {
    pub guid: String,
    pub timestamp: String,
    pub version: String,
    pub author: String,
    pub copyright: String,
    pub license: String,
}

impl PackageIdentity {
    /// Fresh identity with a random GUID and the current local time.
    pub fn generate(
        version: impl Into<String>,
        author: impl Into<String>,
        copyright: impl Into<String>,
        license: impl Into<String>,
    ) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            version: version.into(),
            author: author.into(),
            copyright: copyright.into(),
            license: license.into(),
        }
    }
}

/// Token table for the descriptor substitution pass.
pub fn descriptor_values(model: &ModelSpec, identity: &PackageIdentity) -> TokenValues {
    TokenValues::new()
        .with(Token::DateAndTime, identity.timestamp.as_str())
        .with(Token::Guid, identity.guid.as_str())
        .with(Token::Description, escape(&model.description).into_owned())
        .with(Token::ModelName, model.model_name.as_str())
        .with(Token::Version, escape(&identity.version).into_owned())
        .with(Token::Author, escape(&identity.author).into_owned())
        .with(Token::Copyright, escape(&identity.copyright).into_owned())
        .with(Token::License, escape(&identity.license).into_owned())
        .with(Token::ScalarVariables, scalar_variable_rows(model))
        .with(Token::OutputDependencies, output_dependency_rows(model))
}

/// Render the variable table, one entry per variable in declaration order.
///
/// Rows carry the 1-based index as a comment, the attribute block, and the
/// nested type element. The `start` attribute is omitted exactly when
/// `initial` is `calculated`; a `unit` only appears on non-empty Real
/// units. Indentation matches the two-tab depth of the `ModelVariables`
/// element in the descriptor template.
fn scalar_variable_rows(model: &ModelSpec) -> String {
    let mut rows = String::new();
    for (i, var) in model.variables.iter().enumerate() {
        let index = i + 1;

        rows.push_str(&format!(
            "\n\n\t\t<!-- Index of variable = \"{}\" -->",
            index
        ));
        rows.push_str("\n\t\t<ScalarVariable");
        rows.push_str(&format!("\n\t\t\tname=\"{}\"", var.name));
        if !var.description.is_empty() {
            rows.push_str(&format!(
                "\n            description=\"{}\"",
                escape(&var.description)
            ));
        }
        rows.push_str(&format!("\n\t\t\tvalueReference=\"{}\"", var.value_ref));
        rows.push_str(&format!("\n\t\t\tvariability=\"{}\"", var.variability));
        rows.push_str(&format!("\n\t\t\tcausality=\"{}\"", var.causality));
        match var.initial {
            Some(initial) => rows.push_str(&format!("\n\t\t\tinitial=\"{}\">", initial)),
            None => rows.push('>'),
        }

        rows.push_str(&format!("\n\t\t\t<{}", var.var_type));
        if var.initial != Some(Initial::Calculated) {
            rows.push_str(&format!(" start=\"{}\"", escape(&var.start_value)));
        }
        if var.var_type == VarType::Real && !var.unit.is_empty() {
            rows.push_str(&format!(" unit=\"{}\"", escape(&var.unit)));
        }
        rows.push_str("/>");
        rows.push_str("\n\t\t</ScalarVariable>\n\t\t");
    }
    rows
}

/// Render the output dependency table: one `Unknown` entry per output
/// variable, each listing the indices of every input variable.
///
/// Listing all inputs for every output is deliberate; the generator does
/// no per-output dependency analysis.
fn output_dependency_rows(model: &ModelSpec) -> String {
    let depend_list = model
        .variables
        .iter()
        .enumerate()
        .filter(|(_, v)| v.causality == Causality::Input)
        .map(|(i, _)| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let mut rows = String::new();
    for (i, var) in model.variables.iter().enumerate() {
        if var.causality != Causality::Output {
            continue;
        }
        rows.push_str(&format!(
            "\n\t\t\t<Unknown index=\"{}\" dependencies=\"{}\"/>\n\t\t",
            i + 1,
            depend_list
        ));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScalarVariable, Variability};
    use crate::template::Template;

    fn var(name: &str, causality: Causality, var_type: VarType) -> ScalarVariable {
        ScalarVariable {
            name: name.to_string(),
            value_ref: 0,
            variability: Variability::Continuous,
            causality,
            initial: Some(Initial::Exact),
            var_type,
            start_value: "1".to_string(),
            description: String::new(),
            unit: String::new(),
        }
    }

    fn identity() -> PackageIdentity {
        PackageIdentity {
            guid: "11111111-2222-3333-4444-555555555555".to_string(),
            timestamp: "2024-01-01T01:02:03Z".to_string(),
            version: "1.0.0".to_string(),
            author: "not specified".to_string(),
            copyright: "not specified".to_string(),
            license: "not specified".to_string(),
        }
    }

    #[test]
    fn test_row_carries_index_and_attributes() {
        let mut a = var("level", Causality::Input, VarType::Real);
        a.value_ref = 1;
        a.unit = "m".to_string();
        a.description = "fill level".to_string();
        let model = ModelSpec {
            model_name: "tank".to_string(),
            description: String::new(),
            variables: vec![a],
        };

        let rows = scalar_variable_rows(&model);
        assert!(rows.contains("<!-- Index of variable = \"1\" -->"));
        assert!(rows.contains("name=\"level\""));
        assert!(rows.contains("description=\"fill level\""));
        assert!(rows.contains("valueReference=\"1\""));
        assert!(rows.contains("variability=\"continuous\""));
        assert!(rows.contains("causality=\"input\""));
        assert!(rows.contains("initial=\"exact\">"));
        assert!(rows.contains("<Real start=\"1\" unit=\"m\"/>"));
    }

    #[test]
    fn test_start_omitted_for_calculated() {
        let mut v = var("torque", Causality::Output, VarType::Real);
        v.initial = Some(Initial::Calculated);
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![v],
        };

        let rows = scalar_variable_rows(&model);
        assert!(rows.contains("<Real/>"));
        assert!(!rows.contains("start="));
    }

    #[test]
    fn test_empty_start_is_kept_verbatim() {
        let mut v = var("count", Causality::Input, VarType::Integer);
        v.start_value = String::new();
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![v],
        };

        assert!(scalar_variable_rows(&model).contains("<Integer start=\"\"/>"));
    }

    #[test]
    fn test_unit_only_on_real() {
        let mut v = var("count", Causality::Input, VarType::Integer);
        v.unit = "items".to_string();
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![v],
        };

        assert!(!scalar_variable_rows(&model).contains("unit="));
    }

    #[test]
    fn test_absent_initial_omits_attribute() {
        let mut v = var("aux", Causality::Local, VarType::Real);
        v.initial = None;
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![v],
        };

        let rows = scalar_variable_rows(&model);
        assert!(!rows.contains("initial="));
        assert!(rows.contains("causality=\"local\">"));
    }

    #[test]
    fn test_description_is_escaped() {
        let mut v = var("x", Causality::Input, VarType::Real);
        v.description = "a & b < c".to_string();
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![v],
        };

        assert!(scalar_variable_rows(&model).contains("description=\"a &amp; b &lt; c\""));
    }

    #[test]
    fn test_dependency_rows_list_all_inputs() {
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![
                var("a", Causality::Input, VarType::Real),
                var("b", Causality::Input, VarType::Real),
                var("c", Causality::Output, VarType::Real),
            ],
        };

        let rows = output_dependency_rows(&model);
        assert!(rows.contains("<Unknown index=\"3\" dependencies=\"1 2\"/>"));
    }

    #[test]
    fn test_dependency_rows_one_per_output() {
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![
                var("out1", Causality::Output, VarType::Real),
                var("p", Causality::Parameter, VarType::Real),
                var("in1", Causality::Input, VarType::Real),
                var("out2", Causality::Output, VarType::Boolean),
            ],
        };

        let rows = output_dependency_rows(&model);
        assert!(rows.contains("<Unknown index=\"1\" dependencies=\"3\"/>"));
        assert!(rows.contains("<Unknown index=\"4\" dependencies=\"3\"/>"));
        assert_eq!(rows.matches("<Unknown").count(), 2);
    }

    #[test]
    fn test_no_outputs_means_empty_table() {
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![var("a", Causality::Input, VarType::Real)],
        };
        assert_eq!(output_dependency_rows(&model), "");
    }

    #[test]
    fn test_no_inputs_means_empty_dependency_list() {
        let model = ModelSpec {
            model_name: "m".to_string(),
            description: String::new(),
            variables: vec![var("c", Causality::Output, VarType::Real)],
        };
        assert!(output_dependency_rows(&model).contains("dependencies=\"\""));
    }

    #[test]
    fn test_descriptor_values_cover_template() {
        let model = ModelSpec {
            model_name: "tank".to_string(),
            description: "demo <model>".to_string(),
            variables: vec![var("a", Causality::Input, VarType::Real)],
        };
        let values = descriptor_values(&model, &identity());

        let template = Template::compile(concat!(
            "<fmiModelDescription guid=\"$$GUID$$\" generationDateAndTime=\"$$dateandtime$$\"\n",
            "  modelName=\"$$modelName$$\" description=\"$$description$$\" version=\"$$version$$\"\n",
            "  author=\"$$author$$\" copyright=\"$$copyright$$\" license=\"$$license$$\">\n",
            "  <ModelVariables>$$scalarVariables$$</ModelVariables>\n",
            "  <ModelStructure><Outputs>$$outputDependencies$$</Outputs></ModelStructure>\n",
            "</fmiModelDescription>\n"
        ))
        .unwrap();

        let rendered = template.render(&values).unwrap();
        assert!(rendered.contains("guid=\"11111111-2222-3333-4444-555555555555\""));
        assert!(rendered.contains("description=\"demo &lt;model&gt;\""));
        assert!(!rendered.contains("$$"));
    }
}
