//! batchctl - command line front end for the batch job manager
//!
//! Thin wrapper around `BatchJobManager`: every subcommand maps to one
//! manager operation.

#![allow(missing_docs)]

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use litellm_batch::utils::logging::init_tracing;
use litellm_batch::{
    BatchError, BatchJob, BatchJobManager, BatchStatus, CollectionReport, Config, JobFilter,
    JobScope, build_info, build_manager,
};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "batchctl", version, about = "Manage asynchronous LLM batch jobs")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "BATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a new batch job for the items in scope
    Submit(SubmitArgs),
    /// Refresh a job's status from the remote service
    Status { job_id: String },
    /// Dispatch the results of a finished job
    Collect { job_id: String },
    /// List known jobs
    List(ListArgs),
    /// Cancel a running job
    Cancel { job_id: String },
    /// Delete a job record and its cached artifacts
    Remove {
        job_id: String,
        /// Skip the confirmation prompt for jobs that are still running
        #[arg(long)]
        force: bool,
    },
    /// Print build information
    Version,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// Processor that will consume the results
    #[arg(long)]
    processor: String,
    #[arg(long)]
    org: String,
    #[arg(long)]
    repo: Option<String>,
    /// Single item number; requires --repo
    #[arg(long, requires = "repo")]
    item: Option<u64>,
    /// Override the configured model
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<BatchStatus>,
    #[arg(long)]
    org: Option<String>,
    #[arg(long)]
    repo: Option<String>,
    /// Only records whose submission was never confirmed
    #[arg(long)]
    orphaned: bool,
}

impl SubmitArgs {
    fn scope(&self) -> JobScope {
        match (&self.repo, self.item) {
            (Some(repo), Some(item)) => JobScope::item(self.org.clone(), repo.clone(), item),
            (Some(repo), None) => JobScope::repository(self.org.clone(), repo.clone()),
            _ => JobScope::organization(self.org.clone()),
        }
    }
}

impl ListArgs {
    fn filter(&self) -> JobFilter {
        let mut filter = JobFilter::new();
        if let Some(status) = self.status {
            filter = filter.with_status(status);
        }
        if let Some(org) = &self.org {
            filter = filter.with_organization(org.clone());
        }
        if let Some(repo) = &self.repo {
            filter = filter.with_repository(repo.clone());
        }
        if self.orphaned {
            filter = filter.orphaned();
        }
        filter
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Display keeps the remote error text intact
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Command::Version = cli.command {
        println!("{}", build_info());
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(cli.config.as_deref())
        .await
        .context("loading configuration")?;
    init_tracing(&config.logging)?;
    let manager = build_manager(&config).await?;
    let output = Output { json: cli.json };

    match cli.command {
        Command::Submit(args) => {
            let mut model = config.model.to_model_config();
            if let Some(name) = &args.model {
                model.model = name.clone();
            }
            let job = manager
                .create_batch_job(&args.processor, &args.scope(), &model)
                .await?;
            output.job(&job)?;
        }
        Command::Status { job_id } => {
            let job = manager.check_job_status(&job_id).await?;
            output.job(&job)?;
        }
        Command::Collect { job_id } => {
            let report = manager.collect_results(&job_id).await?;
            output.report(&report)?;
            if let Err(e) = report.ensure_complete() {
                eprintln!("Error: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::List(args) => {
            let jobs = manager.list_jobs(&args.filter()).await?;
            output.jobs(&jobs)?;
        }
        Command::Cancel { job_id } => {
            let job = manager.cancel_job(&job_id).await?;
            output.job(&job)?;
        }
        Command::Remove { job_id, force } => {
            let job = remove(&manager, &job_id, force).await?;
            output.removed(&job)?;
        }
        Command::Version => {}
    }
    Ok(ExitCode::SUCCESS)
}

/// Remove, asking on stdin when the job is still live
async fn remove(manager: &BatchJobManager, job_id: &str, force: bool) -> anyhow::Result<BatchJob> {
    match manager.remove_job(job_id, force).await {
        Err(BatchError::RequiresConfirmation { job_id, status }) => {
            if !confirm(&format!(
                "Job {} is still {}; the remote batch will keep running. Remove anyway? [y/N] ",
                job_id, status
            ))? {
                bail!("removal of job {} aborted", job_id);
            }
            Ok(manager.remove_job(&job_id, true).await?)
        }
        other => Ok(other?),
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn job(&self, job: &BatchJob) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(job);
        }
        println!("job:        {}", job.job_id);
        println!(
            "remote id:  {}",
            job.provider_batch_id.as_deref().unwrap_or("-")
        );
        println!("status:     {}", job.status);
        println!("scope:      {}", job.scope);
        println!("processor:  {}", job.processor_type);
        println!("model:      {}", job.model);
        println!(
            "progress:   {}/{} completed, {} failed",
            job.completed_count, job.item_count, job.failed_count
        );
        for error in &job.remote_errors {
            println!("error:      {}", error);
        }
        if job.collected {
            println!("collected:  yes");
        }
        Ok(())
    }

    fn jobs(&self, jobs: &[BatchJob]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(jobs);
        }
        if jobs.is_empty() {
            println!("no jobs");
            return Ok(());
        }
        for job in jobs {
            println!(
                "{:<40} {:<12} {:>6}/{:<6} {}{}",
                job.job_id,
                job.status.as_str(),
                job.completed_count,
                job.item_count,
                job.scope,
                if job.is_orphaned() { " (orphaned)" } else { "" }
            );
        }
        Ok(())
    }

    fn report(&self, report: &CollectionReport) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(report);
        }
        println!("job:              {}", report.job_id);
        println!("dispatched:       {}", report.dispatched.len());
        println!("item errors:      {}", report.item_errors.len());
        println!("decode failures:  {}", report.decode_failures.len());
        for error in &report.item_errors {
            println!("  {} {}: {}", error.item, error.code, error.message);
        }
        for failure in &report.decode_failures {
            println!("  {} ({}): {}", failure.key, failure.artifact, failure.reason);
        }
        Ok(())
    }

    fn removed(&self, job: &BatchJob) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(job);
        }
        println!("removed {} ({})", job.job_id, job.status);
        Ok(())
    }
}
