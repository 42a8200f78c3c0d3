#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test fakes for local-intercept integration tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use local_intercept::{
    AnnouncementStore, Directory, FailbackPolicy, InterceptCluster, Invocation, Invoker,
    LocalInvokerCache, ProtocolFactory, RpcError, RpcResult, ServiceUrl,
};
use local_intercept_sdk::{CLUSTER_KEY, INTERFACE_KEY};
use parking_lot::Mutex;

pub const LOCAL_HOST: &str = "192.168.1.20";
pub const REMOTE_HOST: &str = "10.0.0.5";
pub const ORDER_SERVICE: &str = "com.example.OrderService";

/// Invoker answering from a script, then with its own port.
pub struct MockInvoker {
    url: ServiceUrl,
    script: Mutex<VecDeque<Result<RpcResult, RpcError>>>,
    calls: AtomicU32,
}

impl MockInvoker {
    pub fn new(url: ServiceUrl) -> Arc<Self> {
        Arc::new(Self {
            url,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn remote(port: u16) -> Arc<Self> {
        Self::new(
            ServiceUrl::new("dubbo", REMOTE_HOST, port, ORDER_SERVICE)
                .with_param(INTERFACE_KEY, ORDER_SERVICE),
        )
    }

    pub fn push(&self, response: Result<RpcResult, RpcError>) {
        self.script.lock().push_back(response);
    }

    pub fn fail_next(&self, error: RpcError) {
        self.push(Err(error));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    fn url(&self) -> &ServiceUrl {
        &self.url
    }

    async fn invoke(&self, _invocation: &Invocation) -> Result<RpcResult, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(RpcResult::new(serde_json::json!(format!(
                "{}:{}",
                self.url.host, self.url.port
            ))))
        })
    }
}

/// Directory with a fixed consumer URL and candidate list.
pub struct StaticDirectory {
    url: ServiceUrl,
    candidates: Vec<Arc<dyn Invoker>>,
}

impl StaticDirectory {
    pub fn new(cluster: Option<&str>, candidates: Vec<Arc<dyn Invoker>>) -> Arc<Self> {
        let mut url = ServiceUrl::new("consumer", "10.0.0.1", 0, ORDER_SERVICE)
            .with_param(INTERFACE_KEY, ORDER_SERVICE);
        if let Some(cluster) = cluster {
            url = url.with_param(CLUSTER_KEY, cluster);
        }
        Arc::new(Self { url, candidates })
    }
}

impl Directory for StaticDirectory {
    fn url(&self) -> &ServiceUrl {
        &self.url
    }

    fn list(&self, _invocation: &Invocation) -> Result<Vec<Arc<dyn Invoker>>, RpcError> {
        Ok(self.candidates.clone())
    }
}

/// Protocol factory handing out [`MockInvoker`]s and remembering them.
#[derive(Default)]
pub struct RecordingProtocolFactory {
    created: Mutex<Vec<Arc<MockInvoker>>>,
    script: Mutex<Vec<Result<RpcResult, RpcError>>>,
}

impl RecordingProtocolFactory {
    /// Responses preloaded into the next invoker this factory creates.
    pub fn script_next(&self, responses: Vec<Result<RpcResult, RpcError>>) {
        *self.script.lock() = responses;
    }

    pub fn created(&self) -> Vec<Arc<MockInvoker>> {
        self.created.lock().clone()
    }

    pub fn last(&self) -> Arc<MockInvoker> {
        self.created.lock().last().cloned().expect("no invoker created")
    }
}

impl ProtocolFactory for RecordingProtocolFactory {
    fn refer(&self, _interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError> {
        let invoker = MockInvoker::new(url.clone());
        for response in std::mem::take(&mut *self.script.lock()) {
            invoker.push(response);
        }
        self.created.lock().push(Arc::clone(&invoker));
        Ok(invoker)
    }
}

/// Legacy transport message for an unreachable local provider.
pub fn local_dispatch_error() -> RpcError {
    RpcError::remote(format!(
        "local-dispatch failed: connection refused by {LOCAL_HOST}:20880"
    ))
}

pub fn write_announcement(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), body).unwrap();
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub cluster: InterceptCluster,
    pub factory: Arc<RecordingProtocolFactory>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(RecordingProtocolFactory::default());
        let cluster = InterceptCluster::with_parts(
            Arc::new(AnnouncementStore::new(dir.path(), Duration::from_millis(10))),
            Arc::new(LocalInvokerCache::new(LOCAL_HOST)),
            Arc::clone(&factory) as Arc<dyn ProtocolFactory>,
            FailbackPolicy::default(),
        );
        Self {
            dir,
            cluster,
            factory,
        }
    }

    pub fn announce(&self, file: &str, body: &str) {
        write_announcement(self.dir.path(), file, body);
        self.cluster.store().scan().unwrap();
    }
}
