use aed::cli::{self, Args};
use aed::logging::{self, LoggingSettings};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let workspace = match args.workspace.clone() {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(err) => {
                eprintln!("Error: cannot determine current directory: {}", err);
                return ExitCode::from(2);
            }
        },
    };

    let settings = LoggingSettings {
        workspace_root: Some(workspace.clone()),
        console_output: args.log_output,
        level: args.log_level.clone(),
    };
    let _guard = match logging::init(&settings) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::from(2);
        }
    };

    match cli::run(args, workspace).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "command failed");
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}
