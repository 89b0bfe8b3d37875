use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};

use cadence_lib::config::{default_config_path, default_data_dir};
use cadence_lib::resolver::TextResolver;
use cadence_lib::state::title_key;
use cadence_lib::suggest::PoolSuggester;
use cadence_lib::{CadenceConfig, HostItem, JsonTaskHost, Scheduler, Stage, StateStore, TaskHost};

/// Shared application state for CLI commands
pub struct App {
    pub config: CadenceConfig,
    pub store: StateStore,
    pub host: JsonTaskHost,
    pub resolver: TextResolver,
    pub suggester: PoolSuggester,
}

impl App {
    /// Load config and open the state and host files, falling back to the
    /// default locations for anything not given
    pub fn new(
        config_path: Option<&Path>,
        state_path: Option<&Path>,
        host_path: Option<&Path>,
    ) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path().context("Failed to locate config directory")?,
        };
        let config = CadenceConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let data_dir = default_data_dir().context("Failed to get data directory")?;
        let state_path = resolve_path(state_path, &data_dir, "state.json");
        let host_path = resolve_path(host_path, &data_dir, "host.json");

        let store = StateStore::new(state_path.clone())
            .with_context(|| format!("Failed to open state at {}", state_path.display()))?;
        let host = JsonTaskHost::new(host_path.clone())
            .with_context(|| format!("Failed to open host at {}", host_path.display()))?;
        let resolver = TextResolver::from_config(&config, &data_dir);
        let suggester = PoolSuggester::new(config.intake.suggestion_pool.clone());

        log::debug!(
            "Using state {} and host {} (providers: {:?})",
            state_path.display(),
            host_path.display(),
            resolver.provider_names()
        );

        Ok(Self {
            config,
            store,
            host,
            resolver,
            suggester,
        })
    }

    pub fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(&self.host, &self.store, &self.resolver, &self.config)
            .with_suggester(&self.suggester)
    }

    /// Local wall-clock time
    pub fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Host collection name for a stage name
    pub fn collection(&self, stage: &str) -> Result<String> {
        let stage = match stage.trim().to_lowercase().as_str() {
            "backlog" => Stage::Backlog,
            "daily" => Stage::Daily,
            "weekly" => Stage::Weekly,
            "monthly" => Stage::Monthly,
            "mastered" => Stage::Mastered,
            other => bail!(
                "Unknown stage '{}'. Expected backlog, daily, weekly, monthly or mastered",
                other
            ),
        };
        Ok(self.config.collections.for_stage(stage).to_string())
    }

    /// Find a host item by title across all collections
    pub fn find_item(&self, title: &str) -> Result<(String, HostItem)> {
        let key = title_key(title);
        for stage in [Stage::Backlog, Stage::Daily, Stage::Weekly, Stage::Monthly, Stage::Mastered] {
            let collection = self.config.collections.for_stage(stage);
            let items = self
                .host
                .list_items(collection)
                .with_context(|| format!("Failed to list {}", collection))?;
            if let Some(item) = items.into_iter().find(|i| title_key(&i.title) == key) {
                return Ok((collection.to_string(), item));
            }
        }
        bail!("No item titled '{}' in any collection", title)
    }
}

fn resolve_path(given: Option<&Path>, data_dir: &Path, file_name: &str) -> PathBuf {
    given
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(file_name))
}
