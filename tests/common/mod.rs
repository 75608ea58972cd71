// tests/common/mod.rs

//! Shared fixtures for generation and introspection tests: a sample
//! variable model, an on-disk template project, and fake external tools.

use std::path::{Path, PathBuf};

use fmuforge::forge::toolchain::{BuildTool, CheckTool};
use fmuforge::{
    AUTO_VALUE_REF, Causality, Error, Forge, ForgeConfig, Initial, ModelSpec, Platform, Result,
    ScalarVariable, VarType, Variability,
};

/// Base name of the on-disk template project fixture.
pub const TEMPLATE_BASE: &str = "FMI_template";

const DESCRIPTOR_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription
	fmiVersion="2.0"
	modelName="$$modelName$$"
	description="$$description$$"
	guid="$$GUID$$"
	generationDateAndTime="$$dateandtime$$"
	version="$$version$$"
	author="$$author$$"
	copyright="$$copyright$$"
	license="$$license$$"
	numberOfEventIndicators="0">
	<ModelExchange
		modelIdentifier="$$modelName$$"/>
	<CoSimulation
		modelIdentifier="$$modelName$$"
		canHandleVariableCommunicationStepSize="true"/>
	<DefaultExperiment startTime="0.0" stopTime="10.0"/>
	<ModelVariables>$$scalarVariables$$</ModelVariables>
	<ModelStructure>
		<Outputs>$$outputDependencies$$</Outputs>
	</ModelStructure>
</fmiModelDescription>
"#;

const SOURCE_TEMPLATE: &str = r#"// FMI_template.cpp
// TCP exchange model scaffold. Generated sections are rendered per model.

#include "FMI_template.h"

#include <cstring>
#include <iostream>

#define MODEL_IDENTIFIER "$$modelName$$"
#define MODEL_GUID "$$GUID$$"
#define N_INPUT $$input_number$$
#define N_OUTPUT $$output_number$$

$$variables$$

void FMI_template::initialize()
{
$$initialization$$}

void FMI_template::exchange($$funcArgs$$)
{
	double send_buffer[N_INPUT > 0 ? N_INPUT : 1];
	char recv_buffer[sizeof(double) * (N_OUTPUT > 0 ? N_OUTPUT : 1)];
	double temp = 0;

$$sendBufferSection$$
	transport(send_buffer, recv_buffer);
	{
$$recvBufferSection$$	}
}

void FMI_template::doStep()
{
	exchange($$funcArgs2$$);
$$initialStatesME$$$$initialStatesCS$$}

void FMI_template::updateOutputs()
{
$$getInputVars$$
$$setOutputVars$$}
"#;

const HEADER_TEMPLATE: &str = r#"// FMI_template.h

#pragma once

#include <map>
#include <string>

class FMI_template
{
public:
	void initialize();
	void doStep();
	void updateOutputs();

private:
	std::map<int, double> m_realVar;
	std::map<int, int> m_boolVar;
	std::map<int, int> m_integerVar;
	std::map<int, std::string> m_stringVar;
};
"#;

const CMAKE_TEMPLATE: &str = r#"cmake_minimum_required(VERSION 3.10)
project(FMI_template)

set(CMAKE_CXX_STANDARD 11)

add_library(FMI_template SHARED
	src/FMI_template.cpp
	src/FMI_template.h
)

set_target_properties(FMI_template PROPERTIES PREFIX "")
"#;

/// Write the template project fixture below `root` and return its path.
pub fn write_template_tree(root: &Path) -> PathBuf {
    let template = root.join(TEMPLATE_BASE);
    std::fs::create_dir_all(template.join("data")).unwrap();
    std::fs::create_dir_all(template.join("src")).unwrap();
    std::fs::write(
        template.join("data").join("modelDescription.xml"),
        DESCRIPTOR_TEMPLATE,
    )
    .unwrap();
    std::fs::write(
        template.join("src").join("FMI_template.cpp"),
        SOURCE_TEMPLATE,
    )
    .unwrap();
    std::fs::write(template.join("src").join("FMI_template.h"), HEADER_TEMPLATE).unwrap();
    std::fs::write(template.join("CMakeLists.txt"), CMAKE_TEMPLATE).unwrap();
    template
}

/// A five-variable model covering both causalities, three scalar kinds,
/// one explicit value reference and four automatic ones.
///
/// Allocation assigns speed=1, enable=2, torque=4, flag=5 around the
/// pinned gain=3.
pub fn sample_model() -> ModelSpec {
    ModelSpec {
        model_name: "tank".to_string(),
        description: "water tank test rig".to_string(),
        variables: vec![
            ScalarVariable {
                name: "speed".to_string(),
                value_ref: AUTO_VALUE_REF,
                variability: Variability::Continuous,
                causality: Causality::Input,
                initial: Some(Initial::Exact),
                var_type: VarType::Real,
                start_value: "0.5".to_string(),
                description: "pump speed".to_string(),
                unit: "m/s".to_string(),
            },
            ScalarVariable {
                name: "enable".to_string(),
                value_ref: AUTO_VALUE_REF,
                variability: Variability::Discrete,
                causality: Causality::Input,
                initial: Some(Initial::Exact),
                var_type: VarType::Boolean,
                start_value: "0".to_string(),
                description: String::new(),
                unit: String::new(),
            },
            ScalarVariable {
                name: "gain".to_string(),
                value_ref: 3,
                variability: Variability::Fixed,
                causality: Causality::Parameter,
                initial: Some(Initial::Exact),
                var_type: VarType::Real,
                start_value: "2.0".to_string(),
                description: String::new(),
                unit: String::new(),
            },
            ScalarVariable {
                name: "torque".to_string(),
                value_ref: AUTO_VALUE_REF,
                variability: Variability::Continuous,
                causality: Causality::Output,
                initial: Some(Initial::Approx),
                var_type: VarType::Real,
                start_value: "0".to_string(),
                description: String::new(),
                unit: String::new(),
            },
            ScalarVariable {
                name: "flag".to_string(),
                value_ref: AUTO_VALUE_REF,
                variability: Variability::Discrete,
                causality: Causality::Output,
                initial: Some(Initial::Approx),
                var_type: VarType::Boolean,
                start_value: "0".to_string(),
                description: String::new(),
                unit: String::new(),
            },
        ],
    }
}

/// Build tool fake that fabricates a binary where CMake would leave one.
pub struct FakeBuild;

impl BuildTool for FakeBuild {
    fn build(&self, project_dir: &Path, model_name: &str) -> Result<PathBuf> {
        let out_dir = project_dir.join("new").join("Debug");
        std::fs::create_dir_all(&out_dir).unwrap();
        let binary = out_dir.join(format!("{}.dll", model_name));
        std::fs::write(&binary, b"fake shared library").unwrap();
        Ok(binary)
    }
}

/// Build tool fake that always fails, for abort-path tests.
#[allow(dead_code)]
pub struct FailingBuild;

impl BuildTool for FailingBuild {
    fn build(&self, _project_dir: &Path, _model_name: &str) -> Result<PathBuf> {
        Err(Error::ExternalProcess {
            tool: "cmake build".to_string(),
            reason: "exit code 2: compiler not found".to_string(),
        })
    }
}

/// Check tool fake returning a canned log.
#[allow(dead_code)]
pub struct FakeCheck {
    pub log: String,
}

impl CheckTool for FakeCheck {
    fn check(&self, _fmu_path: &Path) -> Result<String> {
        Ok(self.log.clone())
    }
}

/// A forge targeting win64, wired to the fake build tool and no checker.
pub fn forge_with_fakes(template_dir: &Path) -> Forge {
    let config = ForgeConfig {
        template_dir: template_dir.to_path_buf(),
        platform: Platform::Win64,
        ..ForgeConfig::default()
    };
    Forge::with_tools(config, Box::new(FakeBuild), None)
}
