mod config;
mod http_reasoner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::PlannerConfig;
use hitl_gateway::transport::{
    self, ApplyHumanDecisionsRequest, FinalizeRequest, SubmitRequest,
};
use hitl_gateway::{
    Decision, FormationStep, GatewayConfig, HeuristicReasoner, HitlPipeline, HumanDecision, Issue,
    JsonFileStore, PolicyReasoner, Project, SharedDecisionStore, SharedPipeline, StructuredError,
};
use http_reasoner::HttpReasoner;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "capital-planner")]
#[command(about = "Municipal capital-project approval with human review")]
#[command(version)]
struct Args {
    /// Gateway config file (overrides HITL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State directory for runs and records (overrides HITL_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Reasoning service URL (overrides HITL_REASONER_URL)
    #[arg(long, global = true)]
    reasoner_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run governance over a project (or issue) list
    Submit {
        #[arg(long)]
        input: PathBuf,
        /// Input holds citizen issues; form projects first
        #[arg(long)]
        issues: bool,
        /// Total budget in whole dollars
        #[arg(long)]
        budget: u64,
    },
    /// List projects awaiting human review
    Pending {
        #[arg(long)]
        run: String,
    },
    /// Record a human decision for one escalated project
    Decide {
        #[arg(long)]
        run: String,
        #[arg(long)]
        project: String,
        #[arg(long, value_enum)]
        decision: DecisionArg,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Merge decisions and schedule approved projects
    Finalize {
        #[arg(long)]
        run: String,
    },
    /// Print the results of a completed run
    Results {
        #[arg(long)]
        run: String,
    },
    /// Submit, review and schedule in one go
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        issues: bool,
        #[arg(long)]
        budget: u64,
        /// Confirm every escalated project with the policy recommendation
        #[arg(long)]
        auto_confirm: bool,
    },
    /// Print JSON schemas of the transport requests
    Schema,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for Decision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Approve => Decision::Approve,
            DecisionArg::Reject => Decision::Reject,
        }
    }
}

/// Collaborators shared by every pipeline this process opens
struct Runtime {
    gateway: GatewayConfig,
    reasoner: Arc<dyn PolicyReasoner>,
    store: SharedDecisionStore,
}

impl Runtime {
    fn new(config: &PlannerConfig) -> Result<Self> {
        let gateway = config.load_gateway_config()?;
        let reasoner: Arc<dyn PolicyReasoner> = match &config.reasoner {
            Some(endpoint) => {
                info!(url = %endpoint.url, model = %endpoint.model, "Using HTTP reasoner");
                Arc::new(HttpReasoner::new(endpoint.clone()).context("Failed to build HTTP client")?)
            }
            None => Arc::new(HeuristicReasoner::new()),
        };
        let store = JsonFileStore::open(config.state_dir.clone()).with_context(|| {
            format!("Failed to open state directory {}", config.state_dir.display())
        })?;
        Ok(Self {
            gateway,
            reasoner,
            store: Arc::new(store),
        })
    }

    fn new_run(&self) -> SharedPipeline {
        transport::create_shared_pipeline(HitlPipeline::new(
            &self.gateway,
            self.reasoner.clone(),
            self.store.clone(),
        ))
    }

    fn open_run(&self, run_id: &str) -> Result<SharedPipeline> {
        let pipeline = HitlPipeline::resume_run(
            run_id,
            &self.gateway,
            self.reasoner.clone(),
            self.store.clone(),
        )
        .with_context(|| format!("Failed to resume run {run_id}"))?;
        Ok(transport::create_shared_pipeline(pipeline))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capital_planner=info,hitl_gateway=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PlannerConfig::default();
    if let Some(path) = args.config {
        config.config_path = path;
    }
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }
    if let Some(url) = args.reasoner_url {
        config = config.with_reasoner_url(url);
    }

    if let Command::Schema = args.command {
        return print_json(&transport::request_schemas());
    }

    let ctx = Runtime::new(&config)?;

    match args.command {
        Command::Submit {
            input,
            issues,
            budget,
        } => {
            let projects = read_projects(&input, issues)?;
            let state = ctx.new_run();
            let outcome = transport::submit(&state, SubmitRequest { projects, budget }).await;
            if let Ok(outcome) = &outcome {
                info!(run_id = %outcome.run_id, phase = %outcome.phase, "Run submitted");
            }
            emit(outcome)
        }
        Command::Pending { run } => {
            let state = ctx.open_run(&run)?;
            print_json(&transport::pending_reviews(&state).await)
        }
        Command::Decide {
            run,
            project,
            decision,
            reason,
        } => {
            let state = ctx.open_run(&run)?;
            let mut human = HumanDecision::new(project, decision.into());
            human.reason = reason;
            emit(
                transport::apply_human_decisions(
                    &state,
                    ApplyHumanDecisionsRequest {
                        decisions: vec![human],
                    },
                )
                .await,
            )
        }
        Command::Finalize { run } => {
            let state = ctx.open_run(&run)?;
            finalize(&state).await
        }
        Command::Results { run } => {
            let state = ctx.open_run(&run)?;
            emit(transport::get_results(&state).await)
        }
        Command::Run {
            input,
            issues,
            budget,
            auto_confirm,
        } => {
            let projects = read_projects(&input, issues)?;
            let state = ctx.new_run();
            let outcome = match transport::submit(&state, SubmitRequest { projects, budget }).await
            {
                Ok(outcome) => outcome,
                Err(e) => return emit::<()>(Err(e)),
            };

            if !outcome.pending.is_empty() {
                if !auto_confirm {
                    eprintln!(
                        "{} project(s) need review; decide them with `capital-planner decide --run {}`",
                        outcome.pending.len(),
                        outcome.run_id
                    );
                    return print_json(&outcome);
                }
                let decisions = outcome
                    .pending
                    .iter()
                    .map(|p| {
                        HumanDecision::new(&p.project_id, p.recommended_decision)
                            .with_reason("auto-confirmed policy recommendation")
                    })
                    .collect();
                if let Err(e) = transport::apply_human_decisions(
                    &state,
                    ApplyHumanDecisionsRequest { decisions },
                )
                .await
                {
                    return emit::<()>(Err(e));
                }
            }

            if let Err(e) = transport::finalize_and_schedule(&state, FinalizeRequest::default()).await
            {
                return emit::<()>(Err(e));
            }
            emit(transport::get_results(&state).await)
        }
        Command::Schema => Ok(()),
    }
}

async fn finalize(state: &SharedPipeline) -> Result<()> {
    let response = transport::finalize_and_schedule(
        state,
        FinalizeRequest {
            include_gantt: true,
        },
    )
    .await;
    match response {
        Ok(mut response) => {
            if let Some(gantt) = response.gantt.take() {
                eprintln!("{gantt}");
            }
            print_json(&response)
        }
        Err(e) => emit::<()>(Err(e)),
    }
}

fn read_projects(path: &Path, issues: bool) -> Result<Vec<Project>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if issues {
        let issues: Vec<Issue> =
            serde_json::from_str(&text).context("Failed to parse issue list JSON")?;
        Ok(FormationStep::new().form(&issues))
    } else {
        serde_json::from_str(&text).context("Failed to parse project list JSON")
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a transport result; structured errors go to stdout too, then fail
fn emit<T: Serialize>(result: Result<T, StructuredError>) -> Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&e)?;
            Err(anyhow::Error::new(e))
        }
    }
}
