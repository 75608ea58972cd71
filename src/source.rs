// src/source.rs

//! C++ source fragment generation
//!
//! The source template exposes one exchange function plus per-variable
//! scaffolding, all driven by placeholders. This module computes every
//! fragment from the model: the `#define` table, initialization blocks,
//! accessor and mutator lines, the two marshalling blocks for the double
//! wire buffer, and the conditional exchange-function signatures.
//!
//! Two counters run through the marshalling blocks: the global variable
//! index (used by the descriptor) and an independent per-causality buffer
//! position. They are deliberately separate; a buffer slot is consumed by
//! every input or output in declaration order, including String variables
//! that produce no marshalling line.

use crate::model::{Causality, ModelSpec, ScalarVariable, VarType};
use crate::template::{Token, TokenValues};

/// Token table for the source substitution pass.
///
/// The GUID is the same one stamped into the descriptor; importers verify
/// the pair matches.
pub fn source_values(model: &ModelSpec, guid: &str) -> TokenValues {
    let (send_block, recv_block, usage) = buffer_blocks(model);
    let (func_args, func_args2) = exchange_signatures(&usage);

    TokenValues::new()
        .with(Token::Guid, guid)
        .with(Token::ModelName, model.model_name.as_str())
        .with(Token::Variables, define_block(model))
        .with(Token::Initialization, initialization_block(model))
        .with(Token::FuncArgs, func_args)
        .with(Token::FuncArgs2, func_args2)
        .with(Token::SendBufferSection, send_block)
        .with(Token::RecvBufferSection, recv_block)
        .with(Token::InputNumber, model.input_count().to_string())
        .with(Token::OutputNumber, model.output_count().to_string())
        .with(Token::InitialStatesMe, "")
        .with(Token::InitialStatesCs, "")
        .with(Token::GetInputVars, getter_block(model))
        .with(Token::SetOutputVars, setter_block(model))
}

/// One `#define` per variable, binding its causality-scoped name to the
/// allocated value reference. Independent variables get none; generated
/// code never refers to them.
fn define_block(model: &ModelSpec) -> String {
    let mut block = String::new();
    for var in &model.variables {
        if let Some(name) = var.define_name() {
            block.push_str(&format!("#define {} {}\n", name, var.value_ref));
        }
    }
    block
}

/// Start value as written into generated code: non-String kinds default to
/// `0` when the model left the start value empty.
fn effective_start(var: &ScalarVariable) -> &str {
    if var.start_value.is_empty() {
        "0"
    } else {
        &var.start_value
    }
}

/// Assignment statements seeding the storage maps, split into an
/// input/parameter block and an output/local block, each with its own
/// header comment.
fn initialization_block(model: &ModelSpec) -> String {
    let mut inputs = String::new();
    for var in &model.variables {
        if !matches!(var.causality, Causality::Input | Causality::Parameter) {
            continue;
        }
        let Some(cell) = var.storage_cell() else {
            continue;
        };
        let line = match var.var_type {
            VarType::String => format!("\t{} = \"{}\";", cell, var.start_value),
            _ => format!("\t{} = {};", cell, effective_start(var)),
        };
        inputs.push_str(&line);
        inputs.push('\n');
    }
    if !inputs.is_empty() {
        inputs = format!("\t// initialize input variables and/or parameters\n{}\n", inputs);
    }

    let mut outputs = String::new();
    for var in &model.variables {
        if !matches!(var.causality, Causality::Output | Causality::Local) {
            continue;
        }
        let Some(cell) = var.storage_cell() else {
            continue;
        };
        let line = match var.var_type {
            VarType::String => format!("\t\t{} = \"{}\";", cell, var.start_value),
            _ => format!("\t{} = {};", cell, effective_start(var)),
        };
        outputs.push_str(&line);
        outputs.push('\n');
    }
    if !outputs.is_empty() {
        outputs = format!("\t// initialize output variables\n{}\n", outputs);
    }

    inputs + &outputs
}

/// Read-accessor lines for everything user code consumes: inputs,
/// parameters and locals, each bound to a typed local.
fn getter_block(model: &ModelSpec) -> String {
    let mut block = String::new();
    for var in &model.variables {
        if !matches!(
            var.causality,
            Causality::Input | Causality::Parameter | Causality::Local
        ) {
            continue;
        }
        let Some(cell) = var.storage_cell() else {
            continue;
        };
        block.push_str(&format!(
            "\t{} {} = {};\n",
            var.var_type.cpp_type(),
            var.name,
            cell
        ));
    }
    block
}

/// Mutator skeleton lines for outputs and calculated parameters. Each is
/// emitted commented out; filling them in is the user's part of the
/// generated scaffold.
fn setter_block(model: &ModelSpec) -> String {
    let mut block = String::new();
    for var in &model.variables {
        if !matches!(
            var.causality,
            Causality::Output | Causality::CalculatedParameter
        ) {
            continue;
        }
        let Some(cell) = var.storage_cell() else {
            continue;
        };
        let value = match var.var_type {
            VarType::String => "\"\"",
            _ => "0",
        };
        block.push_str(&format!(
            "//\t{} = {}; // TODO : store your results here\n",
            cell,
            value
        ));
    }
    block
}

/// Which numeric storage categories the exchange function must carry.
#[derive(Debug, Default, Clone, Copy)]
struct CategoryUse {
    real: bool,
    boolean: bool,
    integer: bool,
}

impl CategoryUse {
    fn mark(&mut self, var_type: VarType) {
        match var_type {
            VarType::Real => self.real = true,
            VarType::Boolean => self.boolean = true,
            VarType::Integer => self.integer = true,
            VarType::String => {}
        }
    }
}

/// Pack and unpack blocks for the flat double buffer, plus the category
/// usage the signature fragments depend on.
///
/// The buffer position advances for every input (pack) or output (unpack)
/// variable in declaration order, whether or not a line is emitted for it.
fn buffer_blocks(model: &ModelSpec) -> (String, String, CategoryUse) {
    let mut send = String::new();
    let mut recv = String::new();
    let mut usage = CategoryUse::default();

    let mut input_position = 0usize;
    let mut output_position = 0usize;
    for var in &model.variables {
        match var.causality {
            Causality::Input => {
                if let (Some(prefix), Some(name)) =
                    (var.var_type.arg_prefix(), var.define_name())
                {
                    usage.mark(var.var_type);
                    send.push_str(&format!(
                        "\tsend_buffer[{}] = (double)({}_var[{}]);\n",
                        input_position, prefix, name
                    ));
                }
                input_position += 1;
            }
            Causality::Output => {
                if let (Some(prefix), Some(cast), Some(name)) = (
                    var.var_type.arg_prefix(),
                    var.var_type.buffer_cast(),
                    var.define_name(),
                ) {
                    usage.mark(var.var_type);
                    recv.push_str(&format!(
                        "\t\tmemcpy(&temp, recv_buffer + {} * sizeof(double), sizeof(double));\n",
                        output_position
                    ));
                    recv.push_str(&format!(
                        "\t\t{}_var[{}] = ({})temp;\n",
                        prefix, name, cast
                    ));
                    recv.push_str(&format!(
                        "\t\tstd::cout << \"{}\" <<\": \"<< {}_var[{}] << std::endl;\n",
                        var.name, prefix, name
                    ));
                }
                output_position += 1;
            }
            _ => {}
        }
    }

    (send, recv, usage)
}

/// Exchange-function signature fragments: the typed argument list and the
/// matching member-map argument list, one entry per used category.
fn exchange_signatures(usage: &CategoryUse) -> (String, String) {
    let mut args = Vec::new();
    let mut members = Vec::new();
    if usage.real {
        args.push("std::map<int, double>& real_var");
        members.push("m_realVar");
    }
    if usage.boolean {
        args.push("std::map<int, int>& bool_var");
        members.push("m_boolVar");
    }
    if usage.integer {
        args.push("std::map<int, int>& int_var");
        members.push("m_integerVar");
    }
    (args.join(", "), members.join(", "))
}
