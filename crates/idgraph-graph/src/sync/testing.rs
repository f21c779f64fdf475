//! Scriptable in-process [`EntitySource`] for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use idgraph_core::{EntitySource, IdGraphError, IdGraphResult, Page, RawEntity};

const PAGE_SIZE: usize = 2;

#[derive(Default)]
struct State {
    entities: HashMap<String, Vec<RawEntity>>,
    targets: HashMap<(String, String), Vec<RawEntity>>,
    failing_entities: HashSet<String>,
    failing_targets: HashSet<(String, String)>,
    hanging: HashSet<String>,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<State>,
    fetch_started: Arc<Notify>,
}

fn to_raw(values: Vec<Value>) -> Vec<RawEntity> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(map) => map,
            other => panic!("fake entities must be objects, got {other}"),
        })
        .collect()
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entities(&self, entity_type: &str, values: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state.entities.insert(entity_type.to_string(), to_raw(values));
        state.failing_entities.remove(entity_type);
    }

    pub fn set_targets(&self, relation: &str, parent_id: &str, values: Vec<Value>) {
        let key = (relation.to_string(), parent_id.to_string());
        let mut state = self.state.lock().unwrap();
        state.failing_targets.remove(&key);
        state.targets.insert(key, to_raw(values));
    }

    pub fn fail_entities(&self, entity_type: &str) {
        self.state.lock().unwrap().failing_entities.insert(entity_type.to_string());
    }

    pub fn fail_targets(&self, relation: &str, parent_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_targets
            .insert((relation.to_string(), parent_id.to_string()));
    }

    /// Fetches of `entity_type` signal [`Self::fetch_started`] and never return.
    pub fn hang_on(&self, entity_type: &str) {
        self.state.lock().unwrap().hanging.insert(entity_type.to_string());
    }

    pub fn fetch_started(&self) -> Arc<Notify> {
        Arc::clone(&self.fetch_started)
    }
}

#[async_trait]
impl EntitySource for FakeSource {
    async fn fetch_entities(&self, entity_type: &str, cursor: Option<&str>) -> IdGraphResult<Page> {
        let page = {
            let state = self.state.lock().unwrap();
            if state.hanging.contains(entity_type) {
                None
            } else if state.failing_entities.contains(entity_type) {
                return Err(IdGraphError::source_fetch(entity_type, "connection reset"));
            } else {
                let all = state.entities.get(entity_type).cloned().unwrap_or_default();
                let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
                let end = (start + PAGE_SIZE).min(all.len());
                Some(Page {
                    records: all[start..end].to_vec(),
                    next_cursor: (end < all.len()).then(|| end.to_string()),
                })
            }
        };

        match page {
            Some(page) => Ok(page),
            None => {
                self.fetch_started.notify_one();
                std::future::pending().await
            }
        }
    }

    async fn fetch_relationship_targets(
        &self,
        parent_id: &str,
        relation: &str,
    ) -> IdGraphResult<Vec<RawEntity>> {
        let key = (relation.to_string(), parent_id.to_string());
        let state = self.state.lock().unwrap();
        if state.failing_targets.contains(&key) {
            return Err(IdGraphError::source_fetch(relation, format!("{parent_id}: 503")));
        }
        Ok(state.targets.get(&key).cloned().unwrap_or_default())
    }
}
