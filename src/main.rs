// src/main.rs

use std::process::ExitCode;

use rebundle::{Finished, cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(finished) if finished.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("rebundle error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<Finished> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
