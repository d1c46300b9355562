#![allow(clippy::unwrap_used)]
// End-to-end tests for `Engine` against a loopback fake runtime.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use praxis_api::{CallBody, RequestEnvelope};
use praxis_core::{
    Action, ActionKind, CommandInterpreter, CoreError, Engine, EngineConfig, InterpreterContext,
    InterpreterResponse, Node, NodeAddress,
};

const WAIT: Duration = Duration::from_secs(5);
const CLOSE: &str = "__close__";

// ── Fake runtime ─────────────────────────────────────────────────────

#[derive(Clone)]
struct FakeNode {
    display_name: String,
    category: String,
    properties: BTreeMap<String, Value>,
}

/// A tiny in-memory graph that answers `call` envelopes like a runtime.
#[derive(Clone)]
struct FakeRuntime {
    nodes: Arc<Mutex<BTreeMap<String, FakeNode>>>,
    push: broadcast::Sender<String>,
    request_ids: Arc<Mutex<Vec<String>>>,
}

impl FakeRuntime {
    fn new() -> Self {
        let runtime = Self {
            nodes: Arc::new(Mutex::new(BTreeMap::new())),
            push: broadcast::channel(16).0,
            request_ids: Arc::new(Mutex::new(Vec::new())),
        };
        runtime.add("/audio/osc", "Oscillator", "audio", &[("frequency", json!(440))]);
        runtime.add("/audio/filter", "Filter", "audio", &[("cutoff", json!(1200))]);
        runtime
    }

    fn add(&self, address: &str, name: &str, category: &str, props: &[(&str, Value)]) {
        self.nodes.lock().unwrap().insert(
            address.to_owned(),
            FakeNode {
                display_name: name.to_owned(),
                category: category.to_owned(),
                properties: props
                    .iter()
                    .map(|(id, v)| ((*id).to_owned(), v.clone()))
                    .collect(),
            },
        );
    }

    fn value(&self, address: &str, property: &str) -> Option<Value> {
        self.nodes
            .lock()
            .unwrap()
            .get(address)
            .and_then(|n| n.properties.get(property).cloned())
    }

    /// How many requests so far carried an id with this purpose prefix.
    fn requests_with(&self, prefix: &str) -> usize {
        self.request_ids
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.starts_with(prefix))
            .count()
    }

    /// Push a raw frame (or [`CLOSE`]) to every open connection.
    fn push(&self, frame: impl Into<String>) {
        let _ = self.push.send(frame.into());
    }

    fn answer(&self, req: &RequestEnvelope) -> Value {
        let mut nodes = self.nodes.lock().unwrap();
        let body = match (&req.body, req.to.as_str()) {
            (CallBody::Info, "") => json!({ "displayName": "Root", "type": "root:audio" }),
            (CallBody::Children, "") => json!({ "children": nodes.keys().collect::<Vec<_>>() }),
            (CallBody::Info, to) => match nodes.get(to) {
                Some(n) => json!({
                    "type": "audio:node",
                    "displayName": n.display_name,
                    "category": n.category,
                }),
                None => return error(&req.id, "no such node"),
            },
            (CallBody::List, to) => match nodes.get(to) {
                Some(n) => json!({
                    "properties": n.properties.iter()
                        .map(|(id, value)| json!({ "id": id, "type": "number", "value": value }))
                        .collect::<Vec<_>>(),
                }),
                None => return error(&req.id, "no such node"),
            },
            (CallBody::Invoke { member, args }, to) => match nodes.get_mut(to) {
                Some(n) => {
                    n.properties
                        .insert(member.clone(), args.first().cloned().unwrap_or(Value::Null));
                    json!({})
                }
                None => return error(&req.id, "no such node"),
            },
            (CallBody::Children, _) => json!({ "children": [] }),
        };
        json!({ "type": "reply", "id": req.id, "from": req.to, "body": body })
    }

    /// Accept clients on a random port until the test ends.
    async fn serve(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let runtime = self.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        runtime.handle(ws).await;
                    }
                });
            }
        });
        format!("ws://{addr}/ws")
    }

    async fn handle(self, mut ws: WebSocketStream<TcpStream>) {
        let mut pushes = self.push.subscribe();
        loop {
            tokio::select! {
                frame = ws.next() => {
                    let Some(Ok(Message::Text(text))) = frame else { break };
                    let Ok(req) = RequestEnvelope::decode(text.as_str()) else { continue };
                    self.request_ids.lock().unwrap().push(req.id.clone());
                    let reply = self.answer(&req).to_string();
                    if ws.send(Message::text(reply)).await.is_err() {
                        break;
                    }
                }
                pushed = pushes.recv() => {
                    let Ok(pushed) = pushed else { break };
                    if pushed == CLOSE {
                        // Drop the TCP stream without a close handshake.
                        break;
                    }
                    if ws.send(Message::text(pushed)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

fn error(id: &str, message: &str) -> Value {
    json!({ "type": "error", "id": id, "body": { "message": message } })
}

// ── Helpers ──────────────────────────────────────────────────────────

fn config(url: &str) -> EngineConfig {
    let mut config = EngineConfig::from_url(url).unwrap();
    config.connect_timeout = Duration::from_secs(2);
    config
}

async fn synced_engine(runtime: &FakeRuntime) -> Engine {
    let url = runtime.clone().serve().await;
    let engine = Engine::new(config(&url));
    engine.connect_and_wait(WAIT).await.unwrap();
    engine.wait_for_sync(WAIT).await.unwrap();
    engine
}

async fn wait_for_nodes(engine: &Engine, pred: impl Fn(&[Arc<Node>]) -> bool) -> Vec<Arc<Node>> {
    let mut stream = engine.nodes();
    tokio::time::timeout(WAIT, async {
        loop {
            let snap = stream.latest();
            if pred(&snap) {
                return snap.as_ref().clone();
            }
            stream.changed().await.unwrap();
        }
    })
    .await
    .expect("timed out waiting for the mirror")
}

fn property_value(node: &Node, id: &str) -> Option<Value> {
    node.property(id).map(|p| p.value.clone())
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_mirrors_the_whole_graph() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    let nodes = engine.nodes_snapshot();
    let addresses: Vec<&str> = nodes.iter().map(|n| n.address.as_str()).collect();
    assert_eq!(addresses, ["/audio/filter", "/audio/osc"]);

    let osc = engine.require_node(&NodeAddress::from("/audio/osc")).unwrap();
    assert_eq!(osc.id, "_audio_osc");
    assert_eq!(osc.display_name(), "Oscillator");
    assert_eq!(osc.category(), "audio");
    assert_eq!(osc.parent, Some(NodeAddress::root()));
    assert_eq!(property_value(&osc, "frequency"), Some(json!(440)));

    assert_eq!(engine.root_info().unwrap().display_name, "Root");
    let status = engine.sync_status();
    assert_eq!(status.pending, 0);
    assert!(!status.in_progress);
    assert!(engine.last_error().is_none());

    engine.shutdown().await;
}

#[tokio::test]
async fn property_update_reaches_runtime_but_not_mirror() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;
    let osc = NodeAddress::from("/audio/osc");

    assert!(engine.update_property(&osc, "frequency", json!(880)).await.unwrap());

    // The runtime applies the write; the mirror follows only on re-read.
    tokio::time::timeout(WAIT, async {
        while runtime.value("/audio/osc", "frequency") != Some(json!(880)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        property_value(&engine.node(&osc).unwrap(), "frequency"),
        Some(json!(440))
    );

    assert!(engine.fetch_node_details(&osc).await.unwrap());
    wait_for_nodes(&engine, |nodes| {
        nodes
            .iter()
            .any(|n| n.address == osc && property_value(n, "frequency") == Some(json!(880)))
    })
    .await;

    engine.shutdown().await;
}

#[tokio::test]
async fn graph_changed_notification_picks_up_new_nodes() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    runtime.add("/video/out", "Output", "video", &[]);
    runtime.push(json!({ "type": "system", "body": { "systemType": "graph-changed" } }).to_string());

    let nodes = wait_for_nodes(&engine, |nodes| nodes.len() == 3).await;
    let out = nodes.iter().find(|n| n.address.as_str() == "/video/out").unwrap();
    assert_eq!(out.category(), "video");

    engine.shutdown().await;
}

#[tokio::test]
async fn runtime_errors_surface_as_last_error() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    assert!(engine
        .fetch_node_details(&NodeAddress::from("/missing"))
        .await
        .unwrap());

    tokio::time::timeout(WAIT, async {
        let mut status = engine.store().subscribe_last_error();
        while status.borrow_and_update().is_none() {
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert_eq!(engine.last_error().as_deref(), Some("no such node"));

    engine.shutdown().await;
}

#[tokio::test]
async fn disconnect_clears_mirror_and_refuses_writes() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    engine.disconnect().await;
    wait_for_nodes(&engine, <[Arc<Node>]>::is_empty).await;
    assert!(!engine.is_connected());
    assert!(engine.root_info().is_none());

    let accepted = engine
        .update_property(&NodeAddress::from("/audio/osc"), "frequency", json!(1))
        .await
        .unwrap();
    assert!(!accepted);
    assert_eq!(runtime.value("/audio/osc", "frequency"), Some(json!(440)));

    engine.shutdown().await;
}

#[tokio::test]
async fn each_connection_fetches_the_graph_once() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;
    assert_eq!(runtime.requests_with("graph-"), 1);
    assert_eq!(runtime.requests_with("children-"), 1);

    engine.disconnect().await;
    wait_for_nodes(&engine, <[Arc<Node>]>::is_empty).await;
    assert_eq!(runtime.requests_with("graph-"), 1);

    engine.connect_and_wait(WAIT).await.unwrap();
    engine.wait_for_sync(WAIT).await.unwrap();
    assert_eq!(engine.nodes_snapshot().len(), 2);
    assert_eq!(runtime.requests_with("graph-"), 2);
    assert_eq!(runtime.requests_with("children-"), 2);

    engine.shutdown().await;
}

#[tokio::test]
async fn lost_connection_clears_mirror_and_reconnect_resyncs() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    runtime.push(CLOSE);
    wait_for_nodes(&engine, <[Arc<Node>]>::is_empty).await;

    engine.connect_and_wait(WAIT).await.unwrap();
    engine.wait_for_sync(WAIT).await.unwrap();
    assert_eq!(engine.nodes_snapshot().len(), 2);

    engine.shutdown().await;
}

#[tokio::test]
async fn wait_until_connected_fails_fast_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = Engine::new(config(&format!("ws://{addr}/ws")));
    assert!(engine.connect().await.unwrap());

    let started = tokio::time::Instant::now();
    let err = engine.wait_until_connected(WAIT).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");
    assert!(started.elapsed() < WAIT);
    assert_eq!(engine.connection_status().reconnect_attempts, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn shut_down_engine_rejects_commands() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;

    engine.shutdown().await;
    assert!(matches!(
        engine.fetch_graph().await,
        Err(CoreError::EngineStopped)
    ));
    assert!(matches!(engine.connect().await, Err(CoreError::EngineStopped)));
}

/// Interpreter that always answers with the same actions and records the
/// node count it was shown.
struct ScriptedInterpreter {
    success: bool,
    seen_node_count: Mutex<Option<usize>>,
}

impl CommandInterpreter for ScriptedInterpreter {
    async fn interpret(
        &self,
        _command: &str,
        context: &InterpreterContext,
    ) -> Result<InterpreterResponse, CoreError> {
        *self.seen_node_count.lock().unwrap() = Some(context.node_count);
        Ok(InterpreterResponse {
            success: self.success,
            message: "ok".into(),
            actions: vec![
                Action::node("/audio/filter", "cutoff", json!(300)),
                Action {
                    kind: ActionKind::Video,
                    target: "2".into(),
                    property: "opacity".into(),
                    value: json!(0.5),
                    description: String::new(),
                },
            ],
            error: None,
        })
    }
}

#[tokio::test]
async fn interpreter_actions_are_dispatched() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;
    let interpreter = ScriptedInterpreter {
        success: true,
        seen_node_count: Mutex::new(None),
    };

    let (response, report) = engine
        .interpret_and_dispatch(&interpreter, "darken the filter", InterpreterContext::default())
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(*interpreter.seen_node_count.lock().unwrap(), Some(2));
    assert_eq!(report.sent, 1);
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.deferred[0].kind, ActionKind::Video);

    tokio::time::timeout(WAIT, async {
        while runtime.value("/audio/filter", "cutoff") != Some(json!(300)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    engine.shutdown().await;
}

#[tokio::test]
async fn failed_interpretation_dispatches_nothing() {
    let runtime = FakeRuntime::new();
    let engine = synced_engine(&runtime).await;
    let interpreter = ScriptedInterpreter {
        success: false,
        seen_node_count: Mutex::new(None),
    };

    let (response, report) = engine
        .interpret_and_dispatch(&interpreter, "???", InterpreterContext::default())
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(report.sent, 0);
    assert!(report.deferred.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn oneshot_runs_against_a_synced_mirror() {
    let runtime = FakeRuntime::new();
    let url = runtime.clone().serve().await;

    let count = Engine::oneshot(config(&url), WAIT, |engine| async move {
        Ok::<_, CoreError>(engine.nodes_snapshot().len())
    })
    .await
    .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn oneshot_shuts_down_after_a_failing_closure() {
    let runtime = FakeRuntime::new();
    let url = runtime.clone().serve().await;

    let mut kept = None;
    let result: Result<(), CoreError> = Engine::oneshot(config(&url), WAIT, |engine| {
        kept = Some(engine.clone());
        async move { engine.require_node(&NodeAddress::from("/nope")).map(|_| ()) }
    })
    .await;

    assert!(matches!(result, Err(CoreError::NodeNotFound { .. })));
    let engine = kept.unwrap();
    assert!(matches!(engine.fetch_graph().await, Err(CoreError::EngineStopped)));
}
