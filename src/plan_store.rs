//! Daily revenue plans persisted as a JSON file.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, rename, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use common::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub type SharedPlanStore = Arc<Mutex<PlanStore>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlanState {
    /// Target revenue in roubles keyed by local date.
    plans: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug)]
pub struct PlanStore {
    path: PathBuf,
    state: PlanState,
}

impl PlanStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unparseable one is moved aside to `<name>.corrupt` and the store
    /// starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let mut store = Self {
            path,
            state: PlanState::default(),
        };
        if !store.path.exists() {
            return Ok(store);
        }

        let raw = std::fs::read_to_string(&store.path)?;
        match serde_json::from_str::<PlanState>(&raw) {
            Ok(state) => store.state = state,
            Err(e) => {
                let aside = store.sibling_path("corrupt");
                warn!(
                    "Plan store {} is not valid JSON ({}), moving it to {} and starting empty",
                    store.path.display(),
                    e,
                    aside.display()
                );
                rename(&store.path, &aside)?;
            }
        }
        Ok(store)
    }

    pub fn shared(self) -> SharedPlanStore {
        Arc::new(Mutex::new(self))
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.state.plans.get(&date).copied()
    }

    pub fn set(&mut self, date: NaiveDate, amount: f64) -> Result<(), Error> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::Other(format!(
                "plan amount must be a non-negative number, got {amount}"
            )));
        }
        let mut next = self.state.clone();
        next.plans.insert(date, amount);
        self.persist(&next)?;
        self.state = next;
        info!("Revenue plan for {} set to {:.2}", date, amount);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<store file>.<suffix>` in the same directory.
    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Write `state` beside the store, then rename it over the store file.
    fn persist(&self, state: &PlanState) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(state)?;
        let temp_path = self.sibling_path("tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        drop(file);
        rename(&temp_path, &self.path)?;
        Ok(())
    }
}
