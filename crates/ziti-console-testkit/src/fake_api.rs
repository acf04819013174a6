use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use ziti_console_core::api::{ListQuery, ManagementApi, Page, WriteAck};
use ziti_console_core::error::ApiError;

/// A request the fake received.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    /// `list`.
    List {
        /// Collection.
        resource: String,
        /// Query as sent.
        query: ListQuery,
    },
    /// `get`.
    Get {
        /// Collection.
        resource: String,
        /// Entity id.
        id: String,
    },
    /// `list_related`.
    ListRelated {
        /// Parent collection.
        resource: String,
        /// Parent id.
        id: String,
        /// Sub-resource.
        related: String,
        /// Query as sent.
        query: ListQuery,
    },
    /// `create`.
    Create {
        /// Collection.
        resource: String,
        /// Body as sent.
        body: Value,
    },
    /// `update`.
    Update {
        /// Collection.
        resource: String,
        /// Entity id.
        id: String,
        /// Body as sent.
        body: Value,
    },
    /// `delete`.
    Delete {
        /// Collection.
        resource: String,
        /// Entity id.
        id: String,
    },
    /// `action`.
    Action {
        /// Collection.
        resource: String,
        /// Entity id.
        id: String,
        /// Action segment, e.g. `re-enroll`.
        action: String,
        /// Body as sent.
        body: Value,
    },
}

impl ApiCall {
    /// Whether the call writes (create, update, delete, action).
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Update { .. } | Self::Delete { .. } | Self::Action { .. }
        )
    }
}

/// Holds a scripted response back until released.
#[derive(Debug)]
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    /// Let the held response through.
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug)]
struct Scripted<T> {
    response: Result<T, ApiError>,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Value>>,
    related: HashMap<(String, String, String), Vec<Value>>,
    list_scripts: HashMap<String, VecDeque<Scripted<Page>>>,
    get_scripts: HashMap<String, VecDeque<Result<Value, ApiError>>>,
    write_scripts: HashMap<String, VecDeque<Result<WriteAck, ApiError>>>,
    calls: Vec<ApiCall>,
    next_id: u64,
}

/// In-memory management API.
///
/// Unscripted calls behave like a small controller over the seeded
/// collections. Scripted responses are consumed first, in order.
#[derive(Debug, Default)]
pub struct FakeManagementApi {
    state: Mutex<State>,
}

fn not_found(resource: &str, id: &str) -> ApiError {
    ApiError {
        status: Some(404),
        code: Some("NOT_FOUND".into()),
        message: format!("{resource} {id} not found"),
        field: None,
    }
}

fn page_of(items: &[Value], query: &ListQuery) -> Page {
    let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
    Page {
        data: items.iter().skip(offset).take(limit).cloned().collect(),
        total_count: items.len() as u64,
    }
}

fn id_of(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

impl FakeManagementApi {
    /// Create an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed a collection.
    #[must_use]
    pub fn with_collection(self, resource: &str, items: Vec<Value>) -> Self {
        self.seed(resource, items);
        self
    }

    /// Builder: seed a sub-resource listing.
    #[must_use]
    pub fn with_related(self, resource: &str, id: &str, related: &str, items: Vec<Value>) -> Self {
        self.state.lock().related.insert(
            (resource.to_string(), id.to_string(), related.to_string()),
            items,
        );
        self
    }

    /// Replace a collection.
    pub fn seed(&self, resource: &str, items: Vec<Value>) {
        self.state
            .lock()
            .collections
            .insert(resource.to_string(), items);
    }

    /// Queue the response of the next `list` of `resource`.
    pub fn script_list(&self, resource: &str, response: Result<Page, ApiError>) {
        self.state
            .lock()
            .list_scripts
            .entry(resource.to_string())
            .or_default()
            .push_back(Scripted {
                response,
                gate: None,
            });
    }

    /// Queue a `list` response that waits for the returned gate.
    #[must_use]
    pub fn gate_list(&self, resource: &str, response: Result<Page, ApiError>) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .list_scripts
            .entry(resource.to_string())
            .or_default()
            .push_back(Scripted {
                response,
                gate: Some(rx),
            });
        Gate(tx)
    }

    /// Queue the response of the next `get` on `resource`.
    pub fn script_get(&self, resource: &str, response: Result<Value, ApiError>) {
        self.state
            .lock()
            .get_scripts
            .entry(resource.to_string())
            .or_default()
            .push_back(response);
    }

    /// Queue the response of the next create or update on `resource`.
    pub fn script_write(&self, resource: &str, response: Result<WriteAck, ApiError>) {
        self.state
            .lock()
            .write_scripts
            .entry(resource.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Create, update and delete calls so far.
    #[must_use]
    pub fn writes(&self) -> Vec<ApiCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    /// Queries sent to `list` for a collection.
    #[must_use]
    pub fn list_queries(&self, resource: &str) -> Vec<ListQuery> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::List { resource: r, query } if r == resource => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current contents of a collection.
    #[must_use]
    pub fn collection(&self, resource: &str) -> Vec<Value> {
        self.state
            .lock()
            .collections
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: ApiCall) {
        debug!(?call, "fake management api call");
        self.state.lock().calls.push(call);
    }

    fn next_write_script(&self, resource: &str) -> Option<Result<WriteAck, ApiError>> {
        self.state
            .lock()
            .write_scripts
            .get_mut(resource)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn list(&self, resource: &str, query: &ListQuery) -> Result<Page, ApiError> {
        self.record(ApiCall::List {
            resource: resource.to_string(),
            query: query.clone(),
        });
        let scripted = self
            .state
            .lock()
            .list_scripts
            .get_mut(resource)
            .and_then(VecDeque::pop_front);
        if let Some(Scripted { response, gate }) = scripted {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            return response;
        }
        let state = self.state.lock();
        let items = state
            .collections
            .get(resource)
            .map_or(&[][..], Vec::as_slice);
        Ok(page_of(items, query))
    }

    async fn get(&self, resource: &str, id: &str) -> Result<Value, ApiError> {
        self.record(ApiCall::Get {
            resource: resource.to_string(),
            id: id.to_string(),
        });
        let scripted = self
            .state
            .lock()
            .get_scripts
            .get_mut(resource)
            .and_then(VecDeque::pop_front);
        if let Some(response) = scripted {
            return response;
        }
        self.state
            .lock()
            .collections
            .get(resource)
            .and_then(|items| items.iter().find(|item| id_of(item) == Some(id)))
            .cloned()
            .ok_or_else(|| not_found(resource, id))
    }

    async fn list_related(
        &self,
        resource: &str,
        id: &str,
        related: &str,
        query: &ListQuery,
    ) -> Result<Page, ApiError> {
        self.record(ApiCall::ListRelated {
            resource: resource.to_string(),
            id: id.to_string(),
            related: related.to_string(),
            query: query.clone(),
        });
        let state = self.state.lock();
        let key = (resource.to_string(), id.to_string(), related.to_string());
        let items = state.related.get(&key).map_or(&[][..], Vec::as_slice);
        Ok(page_of(items, query))
    }

    async fn create(&self, resource: &str, body: &Value) -> Result<WriteAck, ApiError> {
        self.record(ApiCall::Create {
            resource: resource.to_string(),
            body: body.clone(),
        });
        if let Some(response) = self.next_write_script(resource) {
            return response;
        }
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("{resource}-{}", state.next_id);
        let mut stored = body.clone();
        if let Value::Object(map) = &mut stored {
            map.insert("id".into(), Value::String(id.clone()));
        }
        state
            .collections
            .entry(resource.to_string())
            .or_default()
            .push(stored.clone());
        Ok(WriteAck {
            id: Some(id),
            data: Some(stored),
        })
    }

    async fn update(&self, resource: &str, id: &str, body: &Value) -> Result<WriteAck, ApiError> {
        self.record(ApiCall::Update {
            resource: resource.to_string(),
            id: id.to_string(),
            body: body.clone(),
        });
        if let Some(response) = self.next_write_script(resource) {
            return response;
        }
        let mut state = self.state.lock();
        let existing = state
            .collections
            .get_mut(resource)
            .and_then(|items| items.iter_mut().find(|item| id_of(item) == Some(id)))
            .ok_or_else(|| not_found(resource, id))?;
        if let (Value::Object(target), Value::Object(patch)) = (&mut *existing, body) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(WriteAck {
            id: Some(id.to_string()),
            data: Some(existing.clone()),
        })
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Delete {
            resource: resource.to_string(),
            id: id.to_string(),
        });
        let mut state = self.state.lock();
        let items = state
            .collections
            .get_mut(resource)
            .ok_or_else(|| not_found(resource, id))?;
        let before = items.len();
        items.retain(|item| id_of(item) != Some(id));
        if items.len() == before {
            return Err(not_found(resource, id));
        }
        Ok(())
    }

    async fn action(
        &self,
        resource: &str,
        id: &str,
        action: &str,
        body: &Value,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::Action {
            resource: resource.to_string(),
            id: id.to_string(),
            action: action.to_string(),
            body: body.clone(),
        });
        if let Some(response) = self.next_write_script(resource) {
            return response.map(|_| ());
        }
        let state = self.state.lock();
        let exists = state
            .collections
            .get(resource)
            .is_some_and(|items| items.iter().any(|item| id_of(item) == Some(id)));
        if exists {
            Ok(())
        } else {
            Err(not_found(resource, id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_pages_seeded_collection() {
        let api = FakeManagementApi::new()
            .with_collection("identities", crate::fixtures::numbered("user", 7));
        let page = api
            .list("identities", &ListQuery::with_limit(5).page(2))
            .await
            .unwrap();
        assert_eq!(page.total_count, 7);
        assert_eq!(page.data.len(), 2);
        assert_eq!(api.list_queries("identities").len(), 1);
    }

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let api = FakeManagementApi::new();
        api.script_list("edge-routers", Err(ApiError::with_status(500, "boom")));
        assert!(api.list("edge-routers", &ListQuery::default()).await.is_err());
        assert!(api.list("edge-routers", &ListQuery::default()).await.is_ok());
    }

    #[tokio::test]
    async fn create_then_update_then_delete() {
        let api = FakeManagementApi::new();
        let ack = api
            .create("edge-router-policies", &json!({"name": "p"}))
            .await
            .unwrap();
        let id = ack.id.unwrap();
        let ack = api
            .update("edge-router-policies", &id, &json!({"name": "q"}))
            .await
            .unwrap();
        assert_eq!(ack.data.unwrap()["name"], "q");
        api.delete("edge-router-policies", &id).await.unwrap();
        assert!(api.collection("edge-router-policies").is_empty());
        assert_eq!(api.writes().len(), 3);
        assert!(
            api.get("edge-router-policies", &id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn gated_list_waits_for_release() {
        let api = std::sync::Arc::new(FakeManagementApi::new());
        let gate = api.gate_list("services", Ok(Page::default()));
        let pending = {
            let api = std::sync::Arc::clone(&api);
            tokio::spawn(async move { api.list("services", &ListQuery::default()).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        gate.release();
        assert!(pending.await.unwrap().is_ok());
    }
}
