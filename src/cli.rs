// src/cli.rs
//! CLI definitions for the fmuforge FMU generator
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fmuforge")]
#[command(author = "fmuforge Project")]
#[command(version)]
#[command(about = "Generates TCP co-simulation FMUs from tabular variable models", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an FMU from a model input file
    Generate {
        /// Path to the model input file (JSON interchange document)
        model: String,

        /// Directory the project tree and finished archive are written to
        #[arg(short, long)]
        target: String,

        /// Override the model name from the input file
        #[arg(long)]
        model_name: Option<String>,

        /// Template project directory
        #[arg(long, default_value = "FMI_template")]
        template: String,

        /// Target platform: win32, win64, linux32, linux64, darwin64
        /// (default: host platform)
        #[arg(long)]
        platform: Option<String>,

        /// Package version written into the descriptor
        #[arg(long, default_value = "1.0.0")]
        model_version: String,

        /// Author written into the descriptor
        #[arg(long, default_value = "not specified")]
        author: String,

        /// Copyright notice written into the descriptor
        #[arg(long, default_value = "not specified")]
        copyright: String,

        /// License notice written into the descriptor
        #[arg(long, default_value = "not specified")]
        license: String,

        /// Wall-clock budget for each external tool invocation, in seconds
        #[arg(long, default_value_t = 600)]
        tool_timeout: u64,

        /// Skip the external FMU checker after packaging
        #[arg(long)]
        no_check: bool,

        /// Skip writing the TCP endpoint file (addr.config)
        #[arg(long)]
        no_endpoint: bool,

        /// Port the generated binary listens on
        #[arg(long, default_value_t = 12000)]
        local_port: u16,

        /// Address of the remote simulator peer
        #[arg(long, default_value = "127.0.0.1")]
        remote_ip: String,

        /// Port of the remote simulator peer
        #[arg(long, default_value_t = 5500)]
        remote_port: u16,
    },

    /// List the ports of an existing FMU
    Inspect {
        /// Path to the .fmu archive
        fmu: String,

        /// Print the model as interchange JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Synthesize a source model covering target inputs no FMU feeds
    Complement {
        /// Path to the target model input file
        model: String,

        /// Existing FMU archive already wired into the mesh (repeatable)
        #[arg(long = "fmu")]
        fmus: Vec<String>,

        /// Name of the synthesized model
        #[arg(long, default_value = "source")]
        name: String,

        /// Where the synthesized input file is written
        /// (default: <name>.input in the current directory)
        #[arg(short, long)]
        output: Option<String>,
    },
}
