use std::{env, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use subject_plan::{
    config::{Overrides, PlanConfig},
    error::{self, PipelineError},
    pipeline,
};

#[derive(Parser, Debug)]
#[command(name = "subject-plan", version, about = "Generate a subject plan document with an OpenAI assistant")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the reference files, ask the assistant for the plan and save it as .docx
    Generate {
        #[command(flatten)]
        plan: PlanArgs,

        /// Directory whose files are uploaded as reference material
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Existing directory that receives `<subject>.docx`
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the request that would be sent, without contacting the service
    Prompt {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// TOML file with the plan configuration
    #[arg(short, long, env = "SUBJECT_PLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Subject name
    #[arg(long)]
    subject: Option<String>,

    /// Lesson title; give it exactly five times to replace the configured lessons
    #[arg(long = "lesson", value_name = "TITLE")]
    lessons: Vec<String>,
}

impl PlanArgs {
    fn load(self, source_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<PlanConfig, PipelineError> {
        let config = PlanConfig::load_or_default(self.config.as_deref())?;
        Ok(config.apply(Overrides {
            subject: self.subject,
            lessons: self.lessons,
            source_dir,
            output_dir,
        }))
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_prompt(plan: PlanArgs) -> Result<(), PipelineError> {
    let config = plan.load(None, None)?;
    config.validate_prompt()?;

    println!("{}", config.prompt()?);
    Ok(())
}

async fn generate(config: PlanConfig) -> Result<(), PipelineError> {
    let plan = pipeline::generate(&config, |name| env::var(name).ok()).await?;
    println!("{}", plan.text);
    log::info!(
        "Plan for {} written to {} (assistant {}, vector store {}, thread {}, run {})",
        config.subject(),
        plan.output_path.display(),
        plan.assistant_id,
        plan.vector_store_id,
        plan.thread_id,
        plan.run_id
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Generate {
            plan,
            source_dir,
            output_dir,
        } => match plan.load(source_dir, output_dir) {
            Ok(config) => generate(config).await,
            Err(err) => Err(err),
        },
        Command::Prompt { plan } => print_prompt(plan),
    };

    match result {
        Ok(()) => ExitCode::from(error::EXIT_SUCCESS),
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
