//! Subcommand handlers. Everything here prints to stdout; diagnostics go
//! through tracing to stderr.

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};
use weft_common::ParamMap;
use weft_engine::report::{format_flow_report, format_suite_summary};
use weft_engine::{
    FlowInterpreter, FlowLibrary, FlowStatus, HttpOracle, KnowledgeStore, PageDriver,
    SelectorOracle, WeftConfig,
};
use weft_headless::HeadlessDriver;

use crate::{KbCommand, RunArgs};

/// Run the selected flows end to end. Returns whether every flow passed.
pub async fn run(mut config: WeftConfig, args: RunArgs) -> anyhow::Result<bool> {
    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if let Some(glob) = &args.flows {
        config.flows = glob.clone();
    }
    if let Some(path) = &args.knowledge {
        config.knowledge_path = path.clone();
    }
    if let Some(email) = &args.email {
        config
            .credentials
            .insert("email".to_string(), email.clone());
    }
    if let Some(password) = &args.password {
        config
            .credentials
            .insert("password".to_string(), password.clone());
    }

    let params = parse_params(&args.params)?;

    let library = FlowLibrary::load_glob(&config.flows).await?;
    let selected = select_flows(&library, &args)?;

    let oracle: Option<Arc<dyn SelectorOracle>> = if args.no_oracle {
        info!("Oracle tier disabled on request");
        None
    } else {
        HttpOracle::from_config(&config.oracle).map(|o| Arc::new(o) as Arc<dyn SelectorOracle>)
    };

    let store = KnowledgeStore::new(&config.knowledge_path);
    let mut knowledge = store.load().await;

    let mut driver = HeadlessDriver::new();
    driver
        .launch(!args.headed)
        .await
        .context("Failed to launch browser")?;

    let mut interpreter = FlowInterpreter::new(config, oracle);
    let mut reports = Vec::new();
    let mut fatal = None;

    for path in &selected {
        match interpreter
            .run_path(&mut driver, &library, path, &params, &mut knowledge)
            .await
        {
            Ok(report) => {
                println!("{}", format_flow_report(&report));
                reports.push(report);
            }
            Err(e) => {
                fatal = Some(anyhow::anyhow!("Flow {} could not run: {}", path, e));
                break;
            }
        }
    }

    // Learned selectors survive even when a later flow aborts the run.
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser: {}", e);
    }
    store
        .save(&knowledge)
        .await
        .context("Failed to save knowledge base")?;

    if let Some(e) = fatal {
        return Err(e);
    }

    if reports.len() > 1 {
        println!();
        println!("{}", format_suite_summary(&reports));
    }

    Ok(reports.iter().all(|r| r.status == FlowStatus::Passed))
}

pub async fn list_flows(config: &WeftConfig) -> anyhow::Result<()> {
    let library = FlowLibrary::load_glob(&config.flows).await?;
    if library.is_empty() {
        println!("No flows found under '{}'", config.flows);
        return Ok(());
    }

    for flow in library.all() {
        match &flow.description {
            Some(description) => println!(
                "{:<32} [{}] {} steps - {}",
                flow.name,
                flow.priority,
                flow.steps.len(),
                description
            ),
            None => println!(
                "{:<32} [{}] {} steps",
                flow.name,
                flow.priority,
                flow.steps.len()
            ),
        }
    }
    Ok(())
}

pub async fn check(config: &WeftConfig) -> anyhow::Result<()> {
    let outcome = FlowLibrary::check_glob(&config.flows).await?;
    println!(
        "Checked {} file(s), {} flow(s) parsed",
        outcome.files, outcome.flows
    );

    if outcome.problems.is_empty() {
        println!("No problems found");
        return Ok(());
    }
    for problem in &outcome.problems {
        println!("  {}", problem);
    }
    bail!("{} problem(s) found", outcome.problems.len());
}

pub async fn kb(config: WeftConfig, command: KbCommand) -> anyhow::Result<()> {
    let store = KnowledgeStore::new(&config.knowledge_path);
    let mut knowledge = store.load().await;

    match command {
        KbCommand::Show => {
            if knowledge.is_empty() {
                println!("Knowledge base at {} is empty", store.path().display());
                return Ok(());
            }
            println!(
                "{} learned solution(s) in {}",
                knowledge.len(),
                store.path().display()
            );
            let mut solutions: Vec<_> = knowledge.solutions().collect();
            solutions.sort_by(|a, b| a.id.cmp(&b.id));
            for s in solutions {
                println!(
                    "  {:<28} {:.2}  {:>3}+ {:>3}-  [{:?}] {} -> {}",
                    s.id,
                    s.confidence,
                    s.success_count,
                    s.failure_count,
                    s.page_context.page_type,
                    s.original_selector,
                    s.learned_selector
                );
            }
        }
        KbCommand::Prune { below } => {
            let removed = knowledge.prune_below(below);
            store.save(&knowledge).await?;
            println!("Removed {} solution(s) below {:.2}", removed, below);
        }
        KbCommand::Forget { id } => match knowledge.remove(&id) {
            Some(solution) => {
                store.save(&knowledge).await?;
                println!(
                    "Forgot {} ({} -> {})",
                    id, solution.original_selector, solution.learned_selector
                );
            }
            None => bail!("No solution with id '{}'", id),
        },
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> anyhow::Result<ParamMap> {
    let mut params = ParamMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("Invalid --param '{}', expected key=value", entry);
        };
        params.insert(key.trim().to_string(), value.to_string());
    }
    Ok(params)
}

fn select_flows(library: &FlowLibrary, args: &RunArgs) -> anyhow::Result<Vec<String>> {
    if args.all {
        let flows: Vec<String> = library.all().iter().map(|f| f.name.clone()).collect();
        if flows.is_empty() {
            bail!("No flows discovered");
        }
        return Ok(flows);
    }
    if let Some(category) = &args.category {
        let flows: Vec<String> = library
            .category(category)
            .iter()
            .map(|f| f.name.clone())
            .collect();
        if flows.is_empty() {
            bail!("No flows in category '{}'", category);
        }
        return Ok(flows);
    }
    match &args.flow {
        Some(path) => Ok(vec![path.clone()]),
        None => bail!("Pass a flow path, --category, or --all ('weft flows' lists them)"),
    }
}
