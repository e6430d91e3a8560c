use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use state_router::config::{load_config, RouterConfig};
use state_router::navigation::{NavigateOptions, Navigator};
use state_router::observability::{logging, metrics};
use state_router::routing::{ComponentLoader, ComponentRegistry, RouteMatch, RouteMatcher};
use state_router::state::{AppState, StateMachine};

#[derive(Parser)]
#[command(name = "route-check")]
#[command(about = "Validate and exercise state-router route tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a route config
    Validate { config: PathBuf },
    /// Resolve one path against one state
    Match {
        config: PathBuf,
        #[arg(short, long)]
        state: String,
        path: String,
    },
    /// Run the navigation pipeline over a sequence of steps.
    ///
    /// A step is a path to navigate to, or `@state` to switch state and
    /// navigate to wherever that state leads.
    Navigate {
        config: PathBuf,
        #[arg(short, long)]
        state: Option<String>,
        #[arg(required = true)]
        steps: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            let matcher = build_matcher(&config)?;
            for warning in matcher.warnings() {
                eprintln!("warning: {}", warning);
            }
            let states: Vec<_> = config
                .states
                .iter()
                .map(|s| json!({ "state": s.name, "routes": s.routes.len() }))
                .collect();
            print_json(&json!({ "valid": true, "states": states }))?;
        }
        Commands::Match {
            config,
            state,
            path,
        } => {
            let config = load_config(&config)?;
            let matcher = build_matcher(&config)?;
            let result = match matcher.match_path(&path, &AppState::new(state)) {
                Some(RouteMatch::Matched(hit)) => json!({
                    "matched": hit.route.path,
                    "state": hit.state,
                    "params": hit.params,
                    "score": hit.score,
                    "layout": hit.route.layout,
                }),
                Some(RouteMatch::Redirect(to)) => json!({ "redirect": to }),
                Some(RouteMatch::StateMismatch(mismatch)) => json!({
                    "state_mismatch": {
                        "requested_state": mismatch.requested_state,
                        "available_in_state": mismatch.available_in_state,
                    }
                }),
                None => Value::Null,
            };
            print_json(&result)?;
        }
        Commands::Navigate {
            config,
            state,
            steps,
        } => {
            let config = load_config(&config)?;
            logging::init_logging(&config.observability);
            metrics::set_enabled(config.navigation.metrics_enabled);

            let initial = state
                .as_deref()
                .or_else(|| config.initial_state())
                .ok_or("config declares no states")?
                .to_string();
            let states = Arc::new(StateMachine::new(initial));
            let navigator = Navigator::builder(build_matcher(&config)?, states.clone())
                .config(config.navigation.clone())
                .build();

            let mut failed = false;
            for step in steps {
                let outcome = match step.strip_prefix('@') {
                    Some(next) => {
                        states.set_state(next);
                        navigator
                            .navigate_after_state_change(next, None)
                            .await
                            .map(|n| json!(n))
                    }
                    None => navigator
                        .navigate(&step, NavigateOptions::default())
                        .await
                        .map(|n| json!(n)),
                };
                let record = match outcome {
                    Ok(navigated) => json!({ "step": step, "navigated": navigated }),
                    Err(e) => {
                        failed = true;
                        json!({ "step": step, "error": e, "message": e.to_string() })
                    }
                };
                print_json(&record)?;
            }
            print_json(&json!({ "page": navigator.page_state() }))?;

            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Bind every component name in the config to a placeholder loader.
fn build_matcher(config: &RouterConfig) -> Result<RouteMatcher, Box<dyn std::error::Error>> {
    let mut registry = ComponentRegistry::new();
    for route in config.states.iter().flat_map(|s| &s.routes) {
        registry.register(
            route.component.clone(),
            ComponentLoader::ready(route.component.clone()),
        );
    }
    Ok(RouteMatcher::from_config(config, &registry)?)
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
