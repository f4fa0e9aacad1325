use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use browser_task_runner::chrome::ChromeBackend;
use browser_task_runner::quiz::{Question, render_quiz};
use browser_task_runner::{
    Credential, JobManager, ModelId, RunOutcome, RunnerConfig, TaskRequest, TaskRunner, server,
};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "task-runner", about = "Run LLM-driven browser automation tasks")]
struct Cli {
    #[command(flatten)]
    runner: RunnerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one task and print the extracted content
    Run {
        /// What the agent should do
        #[arg(default_value = "What is Langchain?")]
        task: String,

        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
        api_key: String,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, env = "TASK_RUNNER_PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Print a generated quiz (JSON list of questions) as text
    Quiz {
        file: PathBuf,

        #[arg(long)]
        answers: bool,
    },
}

#[derive(Args)]
struct RunnerArgs {
    /// Abort a run after this many seconds
    #[arg(long, global = true, env = "TASK_RUNNER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "TASK_RUNNER_MAX_STEPS", default_value_t = 25)]
    max_steps: usize,

    /// Debug only: show the browser window instead of running headless
    #[arg(long, global = true, hide_short_help = true)]
    headed: bool,

    #[arg(long, global = true, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Concurrent runs when serving
    #[arg(long, global = true, env = "TASK_RUNNER_WORKERS", default_value_t = 2)]
    workers: usize,
}

impl RunnerArgs {
    fn config(&self) -> RunnerConfig {
        RunnerConfig::default()
            .with_run_timeout(self.timeout_secs.map(Duration::from_secs))
            .with_max_steps(self.max_steps)
            .with_headless(!self.headed)
            .with_chrome_path(self.chrome_path.clone())
            .with_llm_base_url(self.llm_base_url.clone())
            .with_workers(self.workers)
    }
}

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.runner.config();

    match cli.command {
        Command::Run {
            task,
            model,
            api_key,
        } => {
            let model: ModelId = model.parse()?;
            let runner = TaskRunner::new(ChromeBackend::new(&config), config);
            let request = TaskRequest::new(task, model, Credential::new(api_key));
            let outcome = runner.execute_blocking(request)?;
            print_outcome(&outcome);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Serve { port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let runner = TaskRunner::new(ChromeBackend::new(&config), config);
                server::serve(server::router(JobManager::new(runner)), port).await
            })?;
        }
        Command::Quiz { file, answers } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let questions: Vec<Question> =
                serde_json::from_str(&raw).context("quiz file is not a list of questions")?;
            print!("{}", render_quiz(&questions, answers));
        }
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    if outcome.success {
        println!("Agent task completed successfully!");
        if outcome.has_content() {
            println!("### Extracted Content:\n{}", outcome.aggregated_text);
        } else {
            println!("No content extracted from the actions.");
        }
    } else if let Some(ref err) = outcome.error {
        eprintln!("An error occurred: {}", err);
    }
    println!("Browser closed.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_headless_unless_overridden() {
        let cli = Cli::try_parse_from(["task-runner", "run"]).unwrap();
        assert!(cli.runner.config().headless);

        let cli = Cli::try_parse_from(["task-runner", "run", "--headed"]).unwrap();
        assert!(!cli.runner.config().headless);
    }
}
