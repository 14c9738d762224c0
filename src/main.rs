extern crate tsung_planner;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tracing::info;
use tsung_planner::batch::generate_fixtures;
use tsung_planner::config::{Answers, DataConfig, DEFAULT_CLI_MAX_USERS};
use tsung_planner::suite::{build_suite_plan, load_suite};
use tsung_planner::{Plan, PlanConfig};

#[derive(Debug, StructOpt)]
#[structopt(name = "tsung-planner", about = "Builds Tsung load-test plans and their fixture data")]
struct Opt {
    /// Log at debug level regardless of RUST_LOG
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Renders a Tsung XML plan from an answers file and session scripts
    Plan {
        /// JSON answers: suite, clients, servers and arrival phases
        #[structopt(long, parse(from_os_str))]
        answers: PathBuf,

        /// Suite file; defaults to `<scripts-dir>/<suite>.suite` named by the answers
        #[structopt(long, parse(from_os_str))]
        suite: Option<PathBuf>,

        /// Directory holding one `<test case>.session` script per test case
        #[structopt(long, parse(from_os_str))]
        scripts_dir: PathBuf,

        /// JSON file servers, random generators and uploadable files
        #[structopt(long, parse(from_os_str))]
        data_config: Option<PathBuf>,

        #[structopt(short, long, parse(from_os_str))]
        output_dir: Option<PathBuf>,

        /// Location of the Tsung DTD
        #[structopt(long)]
        dtd: Option<String>,

        #[structopt(long, default_value = "10000")]
        max_users: u32,
    },

    /// Generates the CSV fixtures the plan's file servers read
    Fixtures {
        /// Directory holding users/, groups/, content/, discussions/ and generatedIds/
        #[structopt(long, parse(from_os_str))]
        source_dir: PathBuf,

        #[structopt(long, default_value = "1")]
        batches: u32,

        #[structopt(short, long, parse(from_os_str))]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_logging(opt.verbose);

    match opt.command {
        Command::Plan {
            answers,
            suite,
            scripts_dir,
            data_config,
            output_dir,
            dtd,
            max_users,
        } => {
            let output_dir = output_dir.unwrap_or_else(default_output_dir);
            plan(
                &answers,
                suite.as_deref(),
                &scripts_dir,
                data_config.as_deref(),
                &output_dir,
                dtd,
                max_users,
            )
        }
        Command::Fixtures {
            source_dir,
            batches,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(default_output_dir).join("data");
            generate_fixtures(&source_dir, batches, &output_dir).with_context(|| {
                format!("failed to generate fixtures from {}", source_dir.display())
            })?;
            info!(dir = %output_dir.display(), batches, "fixtures written");
            Ok(())
        }
    }
}

fn plan(
    answers_path: &Path,
    suite_path: Option<&Path>,
    scripts_dir: &Path,
    data_config_path: Option<&Path>,
    output_dir: &Path,
    dtd: Option<String>,
    max_users: u32,
) -> Result<()> {
    let answers = Answers::load(answers_path)
        .with_context(|| format!("failed to read answers from {}", answers_path.display()))?;

    let mut config = PlanConfig::default();
    if let Some(dtd) = dtd {
        config.dtd_location = dtd;
    }
    let mut plan = Plan::new(config);
    answers.apply(&mut plan, max_users)?;

    if let Some(path) = data_config_path {
        DataConfig::load(path)
            .and_then(|data| data.apply(&mut plan))
            .with_context(|| format!("failed to apply data configuration {}", path.display()))?;
    }

    let suite_path = match (suite_path, &answers.suite) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(name)) => scripts_dir.join(format!("{}.suite", name)),
        (None, None) => {
            anyhow::bail!("no suite given: pass --suite or name one in the answers file")
        }
    };
    let cases = load_suite(&suite_path)
        .with_context(|| format!("failed to load suite {}", suite_path.display()))?;
    build_suite_plan(&mut plan, &cases, scripts_dir)?;

    let xml = plan.render()?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join("tsung.xml");
    fs::write(&path, xml).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), test_cases = cases.len(), "plan written");
    Ok(())
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(format!("tsung-{}", chrono::Utc::now().timestamp_millis()))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
