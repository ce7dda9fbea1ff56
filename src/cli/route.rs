//! CLI route: single route table and run context.

use crate::cli::builtin::builtin_workflow;
use crate::cli::parse::{Commands, ConfigCommands, JobCommands, QueueCommands};
use crate::cli::presentation::{
    format_job_json, format_job_list_text, format_job_text, format_run_summary,
};
use crate::config::{ConfigLoader, RuntimeConfig};
use crate::error::{RuntimeError, StoreError};
use crate::queue::SledJobQueue;
use crate::runtime::{RuntimeContext, WorkerPool};
use crate::store::persistence::to_store_io;
use crate::store::{JobDocument, SledJobStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Everything a command needs: effective config, the job store and the
/// persistent queue, both backed by one sled database.
pub struct RunContext {
    config: RuntimeConfig,
    store_path: PathBuf,
    store: Arc<SledJobStore>,
    queue: SledJobQueue,
}

impl RunContext {
    /// Load config (from `config_path` if given, otherwise the layered
    /// workspace sources), validate it and open the store.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, RuntimeError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.check()?;
        Self::from_config(&workspace_root, config)
    }

    pub fn from_config(workspace_root: &Path, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let store_path = if config.store.path.is_absolute() {
            config.store.path.clone()
        } else {
            workspace_root.join(&config.store.path)
        };
        std::fs::create_dir_all(&store_path).map_err(StoreError::Io)?;

        let db = sled::open(&store_path).map_err(to_store_io)?;
        let store = SledJobStore::shared(db.clone())?;
        let queue = SledJobQueue::new(db, &config.queue.tree, config.queue.poll_interval())?;

        info!(store_path = %store_path.display(), "Job store opened");
        Ok(Self {
            config,
            store_path,
            store,
            queue,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn store(&self) -> &Arc<SledJobStore> {
        &self.store
    }

    pub fn queue(&self) -> &SledJobQueue {
        &self.queue
    }

    /// Execute a CLI command via the route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, RuntimeError> {
        match command {
            Commands::Job { command } => self.handle_job(command),
            Commands::Queue { command } => self.handle_queue(command),
            Commands::Config { command } => self.handle_config(command),
            Commands::Run { workers, workflow } => self.handle_run(*workers, workflow).await,
        }
    }

    fn handle_job(&self, command: &JobCommands) -> Result<String, RuntimeError> {
        match command {
            JobCommands::Create {
                id,
                workflow,
                args,
                enqueue,
            } => {
                let args = parse_args(args)?;
                let mut job = JobDocument::new(id.clone(), args);
                if let Some(workflow) = workflow {
                    job = job.with_workflow(workflow.clone());
                }
                self.store.insert_job(&job)?;
                if *enqueue {
                    self.queue.push(id.clone())?;
                    Ok(format!("Created job {} and queued it", id))
                } else {
                    Ok(format!("Created job {}", id))
                }
            }
            JobCommands::Show { id, format } => {
                let job = self
                    .store
                    .get_job(id)?
                    .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
                match format.as_str() {
                    "json" => format_job_json(&job),
                    "text" => Ok(format_job_text(&job)),
                    other => Err(RuntimeError::Input(format!(
                        "unknown format '{}' (expected text or json)",
                        other
                    ))),
                }
            }
            JobCommands::List => Ok(format_job_list_text(&self.store.list_jobs()?)),
            JobCommands::Delete { id } => {
                if !self.store.delete_job(id)? {
                    return Err(StoreError::JobNotFound(id.clone()).into());
                }
                Ok(format!("Deleted job {}", id))
            }
        }
    }

    fn handle_queue(&self, command: &QueueCommands) -> Result<String, RuntimeError> {
        match command {
            QueueCommands::Push { ids } => {
                for id in ids {
                    self.queue.push(id.clone())?;
                }
                Ok(format!("Queued {} job(s)", ids.len()))
            }
            QueueCommands::Len => Ok(self.queue.len().to_string()),
        }
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, RuntimeError> {
        match command {
            ConfigCommands::Show => self
                .config
                .to_toml()
                .map_err(|e| RuntimeError::Config(format!("Failed to render config: {}", e))),
            ConfigCommands::Validate => {
                self.config.check()?;
                Ok("Configuration is valid".to_string())
            }
        }
    }

    async fn handle_run(&self, workers: Option<usize>, workflow: &str) -> Result<String, RuntimeError> {
        let definition = builtin_workflow(workflow)
            .ok_or_else(|| RuntimeError::Input(format!("unknown workflow '{}'", workflow)))?;

        let mut worker_config = self.config.workers.clone();
        if let Some(count) = workers {
            worker_config.count = count;
        }

        let ctx = RuntimeContext::new(self.store.clone());
        let pool = WorkerPool::new(Arc::new(definition), ctx, worker_config);
        pool.start(|_| self.queue.clone())?;

        info!(workflow, "Waiting for jobs, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;

        pool.stop().await;
        self.store.flush()?;
        Ok(format_run_summary(workflow, &pool.stats()))
    }
}

fn parse_args(raw: &str) -> Result<Value, RuntimeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| RuntimeError::Input(format!("--args is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(RuntimeError::Input("--args must be a JSON object".to_string()));
    }
    Ok(value)
}
