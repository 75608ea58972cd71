// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Generate {
            model,
            target,
            model_name,
            template,
            platform,
            model_version,
            author,
            copyright,
            license,
            tool_timeout,
            no_check,
            no_endpoint,
            local_port,
            remote_ip,
            remote_port,
        }) => commands::cmd_generate(
            &model,
            &target,
            model_name.as_deref(),
            &template,
            platform.as_deref(),
            &model_version,
            &author,
            &copyright,
            &license,
            tool_timeout,
            no_check,
            no_endpoint,
            local_port,
            &remote_ip,
            remote_port,
        ),
        Some(Commands::Inspect { fmu, json }) => commands::cmd_inspect(&fmu, json),
        Some(Commands::Complement {
            model,
            fmus,
            name,
            output,
        }) => commands::cmd_complement(&model, &fmus, &name, output.as_deref()),
        None => {
            // No command provided, show help
            println!("fmuforge FMU Generator v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'fmuforge --help' for usage information");
            Ok(())
        }
    }
}
