//! In-memory HCI API used by unit tests

use crate::api::{ApiClient, ApiRequest, ApiResponse, Method};
use crate::catalog::{DirectoryCatalog, ResourceCatalog};
use crate::context::EnvironmentContext;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Endpoint prefix of the test environment
pub const ENV: &str = "services/compute-on/dev";

/// Catalog of environment `env-1` (`dev` on `compute-on`, organization `org-1`)
pub fn resource_catalog(api: &Arc<FakeApi>) -> ResourceCatalog {
    let context = EnvironmentContext::new("org-1", "compute-on", "env-1", "dev");
    ResourceCatalog::new(api.clone(), context, Arc::new(DirectoryCatalog::new(api.clone())))
}

/// Routes are keyed by `"{METHOD} {endpoint}"`, with `?operation={op}`
/// appended for execute calls. Queued responses are consumed in order and
/// the last one is repeated. Unrouted calls answer 404.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

fn route_key(method: Method, endpoint: &str) -> String {
    format!("{method} {endpoint}")
}

fn request_key(request: &ApiRequest) -> String {
    let key = route_key(request.method, &request.endpoint);
    match request.operation() {
        Some(op) => format!("{key}?operation={op}"),
        None => key,
    }
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, endpoint: &str, response: ApiResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(method, endpoint))
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls whose route key equals `"{method} {endpoint}"`
    pub fn count(&self, method: Method, endpoint: &str) -> usize {
        let key = route_key(method, endpoint);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| request_key(r) == key)
            .count()
    }

    /// Number of calls that mutate remote state
    pub fn mutations(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let key = request_key(&request);
        self.requests.lock().unwrap().push(request);
        tokio::task::yield_now().await;

        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| {
            ApiResponse::error(404, "NOT_FOUND", &format!("no route for {key}"))
        }))
    }
}
