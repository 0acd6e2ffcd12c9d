//! `check` and `wait` command implementations

use anyhow::Result;
use colored::Colorize;
use kube::Client;
use kube::core::GroupVersionKind;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::bundle::installed_condition;
use crate::config::Settings;
use crate::config::settings::WaitSettings;
use crate::health::{AggregatedError, Evaluator, ObjectReference, Strategy};
use crate::k8s::{KstatusOracle, KubeFetcher, KubeReadyChecker, client, manifest};
use crate::utils::{CliError, WaitProgress};

/// Output format for `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Which objects to check and how; unset fields fall back to the settings
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    pub files: Vec<PathBuf>,
    pub strategy: Option<Strategy>,
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub target: TargetOptions,
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub target: TargetOptions,
    pub timeout_secs: Option<u64>,
    pub interval_secs: Option<u64>,
}

/// Timing for repeated passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub pass_timeout: Duration,
}

impl WaitPolicy {
    pub fn from_settings(settings: &WaitSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            interval: Duration::from_secs(settings.interval_secs),
            pass_timeout: Duration::from_secs(settings.pass_timeout_secs),
        }
    }
}

/// The bundle never became healthy before the deadline
#[derive(Debug, thiserror::Error)]
#[error("not ready after {passes} pass(es): {last}")]
pub struct WaitTimedOut {
    pub passes: u32,
    pub last: String,
}

struct Prepared {
    evaluator: Evaluator,
    objects: Vec<ObjectReference>,
}

/// Run a single readiness pass. Returns whether the bundle is healthy.
pub async fn check(opts: CheckOptions, settings: &Settings) -> Result<bool> {
    let prepared = prepare(&opts.target, settings).await?;
    crate::log_info!(
        "Checking {} object(s) with the {} strategy",
        prepared.objects.len(),
        prepared.evaluator.strategy()
    );

    let result = prepared.evaluator.evaluate(&prepared.objects).await;
    let healthy = result.is_ok();

    match opts.output {
        OutputFormat::Text => println!("{}", render_text(&result, prepared.objects.len())),
        OutputFormat::Json => {
            let condition = installed_condition(&result, None);
            println!("{}", serde_json::to_string_pretty(&condition)?);
        }
    }

    Ok(healthy)
}

/// Repeat passes until the bundle is healthy or the timeout expires
pub async fn wait(opts: WaitOptions, settings: &Settings) -> Result<()> {
    let prepared = prepare(&opts.target, settings).await?;

    let mut policy = WaitPolicy::from_settings(&settings.wait);
    if let Some(secs) = opts.timeout_secs {
        policy.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = opts.interval_secs {
        policy.interval = Duration::from_secs(secs);
    }

    let subject = format!("{} object(s)", prepared.objects.len());
    let progress = WaitProgress::new(&subject);

    match wait_until_ready(&prepared.evaluator, &prepared.objects, policy, &progress).await {
        Ok(passes) => {
            crate::log_info!("Bundle healthy after {} pass(es)", passes);
            Ok(())
        }
        Err(err) => {
            progress.finish_error(&format!("{} pass(es)", err.passes));
            eprintln!("{}", err.last);
            Err(CliError::timed_out(&subject, policy.timeout.as_secs()).into())
        }
    }
}

/// Poll `evaluator` until a pass succeeds.
///
/// A pass that exceeds `pass_timeout` is abandoned and counts as not ready.
/// A timeout too large to represent as an instant means no deadline.
/// Returns the number of passes run.
pub async fn wait_until_ready(
    evaluator: &Evaluator,
    objects: &[ObjectReference],
    policy: WaitPolicy,
    progress: &WaitProgress,
) -> Result<u32, WaitTimedOut> {
    let deadline = Instant::now().checked_add(policy.timeout);
    let mut passes = 0;

    loop {
        passes += 1;
        let last = match tokio::time::timeout(policy.pass_timeout, evaluator.evaluate(objects)).await {
            Ok(Ok(())) => {
                progress.finish_success();
                return Ok(passes);
            }
            Ok(Err(err)) => {
                progress.update(passes, &pass_summary(&err));
                crate::log_debug!("Pass {} not ready: {}", passes, err);
                err.to_string()
            }
            Err(_) => {
                let message = format!("pass timed out after {}s", policy.pass_timeout.as_secs_f64());
                progress.update(passes, &message);
                crate::log_warn!("Pass {}: {}", passes, message);
                message
            }
        };

        if let Some(deadline) = deadline
            && Instant::now().checked_add(policy.interval).is_none_or(|next| next >= deadline)
        {
            return Err(WaitTimedOut { passes, last });
        }
        tokio::time::sleep(policy.interval).await;
    }
}

async fn prepare(target: &TargetOptions, settings: &Settings) -> Result<Prepared> {
    let kubeconfig = target
        .kubeconfig
        .clone()
        .or_else(|| settings.defaults.kubeconfig.as_ref().map(PathBuf::from));
    let client = client::connect(kubeconfig.as_deref()).await?;

    let namespace = target
        .namespace
        .clone()
        .or_else(|| settings.defaults.namespace.clone())
        .unwrap_or_else(|| client.default_namespace().to_string());

    let mut objects = manifest::load_files(&target.files)?;
    if objects.is_empty() {
        return Err(CliError::no_objects().into());
    }
    let namespaced = namespaced_kinds(&KubeFetcher::new(client.clone()), &objects).await;
    manifest::apply_default_namespace(&mut objects, &namespace, |gvk| namespaced.contains(gvk));

    let strategy = target.strategy.unwrap_or(settings.defaults.strategy);
    let concurrency = target.concurrency.unwrap_or(settings.defaults.concurrency);
    let evaluator = build_evaluator(strategy, client).with_concurrency(concurrency);

    Ok(Prepared { evaluator, objects })
}

/// Namespaced kinds among references that name no namespace.
///
/// A kind discovery cannot resolve is treated as namespaced; checking it
/// will report the discovery failure.
async fn namespaced_kinds(fetcher: &KubeFetcher, objects: &[ObjectReference]) -> HashSet<GroupVersionKind> {
    let unresolved: HashSet<&GroupVersionKind> = objects
        .iter()
        .filter(|o| o.namespace().is_none())
        .map(|o| &o.gvk)
        .collect();

    let mut namespaced = HashSet::new();
    for gvk in unresolved {
        match fetcher.is_namespaced(gvk).await {
            Ok(false) => {}
            Ok(true) => {
                namespaced.insert(gvk.clone());
            }
            Err(err) => {
                crate::log_debug!("Scope of {}/{} unknown: {}", gvk.group, gvk.kind, err);
                namespaced.insert(gvk.clone());
            }
        }
    }
    namespaced
}

/// Wire the cluster collaborators for `strategy`
pub fn build_evaluator(strategy: Strategy, client: Client) -> Evaluator {
    let fetcher = Arc::new(KubeFetcher::new(client.clone()));
    match strategy {
        Strategy::KindAware => Evaluator::kind_aware(fetcher, Arc::new(KubeReadyChecker::new(client))),
        Strategy::Status => Evaluator::status(fetcher, Arc::new(KstatusOracle)),
    }
}

/// Short progress line for a failed pass
fn pass_summary(err: &AggregatedError) -> String {
    let not_ready: usize = err.not_ready().iter().map(|(_, names)| names.len()).sum();
    let failed = err.errors().len();
    match (failed, not_ready) {
        (0, n) => format!("{} not ready", n),
        (f, 0) => format!("{} failing", f),
        (f, n) => format!("{} failing, {} not ready", f, n),
    }
}

fn render_text(result: &Result<(), AggregatedError>, total: usize) -> String {
    match result {
        Ok(()) => format!("{} {} object(s) ready", "✓".green(), total),
        Err(err) => format!("{} bundle not ready\n{}", "✗".red().bold(), err),
    }
}
