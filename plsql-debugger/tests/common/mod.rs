// In-process stand-in for the Oracle JVM debug agent.
//
// Speaks real JDWP over TCP: dials the session's listen port, echoes the
// handshake, answers commands out of a small VM model, and lets tests
// inject composite event packets. State is shared so tests can assert on
// resume counts and recorded event requests.

#![allow(dead_code)]

use jdwp_client::codec::{PacketReader, PacketWriter};
use jdwp_client::commands::{event_kinds, modifier_kinds};
use jdwp_client::protocol::{IncomingPacket, PacketAssembler, JDWP_HANDSHAKE};
use jdwp_client::types::{tags, FrameInfo, Value};
use plsql_debugger::{DebugEvent, DebugSession};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

const ID_WIDTH: usize = 8;

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub method_id: u64,
    pub name: String,
    /// (bytecode index, compiled line number)
    pub lines: Vec<(u64, i32)>,
    pub variables: Vec<VarDef>,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub signature: String,
    pub slot: u32,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub field_id: u64,
    pub name: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub type_id: u64,
    pub methods: Vec<MethodDef>,
    pub fields: Vec<FieldDef>,
    pub static_values: HashMap<u64, Value>,
}

#[derive(Debug, Clone)]
pub struct RequestDef {
    pub request_id: i32,
    pub event_kind: u8,
    pub suspend_policy: u8,
    pub count_filter: Option<i32>,
    pub class_pattern: Option<String>,
    /// (class id, method id, index)
    pub location: Option<(u64, u64, u64)>,
    pub step_thread: Option<u64>,
    pub step_size: Option<i32>,
    pub step_depth: Option<i32>,
    pub cleared: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Loaded classes by signature.
    pub classes: HashMap<String, ClassDef>,
    /// Object id -> field id -> value.
    pub objects: HashMap<u64, HashMap<u64, Value>>,
    pub strings: HashMap<u64, String>,
    pub frames: HashMap<u64, Vec<FrameInfo>>,
    /// (frame id, slot) -> value.
    pub slot_values: HashMap<(u64, i32), Value>,
    pub suspend_counts: HashMap<u64, i32>,
    pub requests: Vec<RequestDef>,
    pub next_request_id: i32,
    pub next_object_id: u64,
    pub vm_suspends: u32,
    pub vm_resumes: u32,
    pub thread_resumes: HashMap<u64, u32>,
    pub disposed: bool,
}

impl MockState {
    pub fn new() -> Self {
        Self {
            next_request_id: 1,
            next_object_id: 0x1000,
            ..Self::default()
        }
    }

    pub fn alloc_object(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    fn class_by_type_id(&self, type_id: u64) -> Option<(&String, &ClassDef)> {
        self.classes.iter().find(|(_, c)| c.type_id == type_id)
    }

    fn field_request(&self, event_kind: u8) -> Option<&RequestDef> {
        self.requests
            .iter()
            .rev()
            .find(|r| r.event_kind == event_kind && !r.cleared)
    }
}

pub struct MockJvm {
    pub state: Arc<Mutex<MockState>>,
    event_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MockJvm {
    /// Dial the session's listen port (retrying until it is up), complete
    /// the handshake, and start serving the model.
    pub async fn connect(port: u16, state: Arc<Mutex<MockState>>) -> Self {
        let mut stream = loop {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        // The debugger writes first
        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await.expect("handshake read");
        assert_eq!(buf, JDWP_HANDSHAKE);
        stream
            .write_all(JDWP_HANDSHAKE)
            .await
            .expect("handshake write");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(stream, state.clone(), event_rx));
        Self { state, event_tx }
    }

    fn send_event(&self, payload: Vec<u8>) {
        let mut w = PacketWriter::new();
        let length = 11 + payload.len();
        w.put_u32(length as u32);
        w.put_u32(0x4000_0000); // VM-chosen id, never collides with ours
        w.put_u8(0x00);
        w.put_u8(64); // Event command set
        w.put_u8(100); // Composite
        w.put_bytes(&payload);
        self.event_tx.send(w.into_vec()).ok();
    }

    /// Fire the class-prepare event for the newest matching watch. The VM
    /// suspends everything (policy 2), so the session must resume.
    pub async fn fire_class_prepare(&self, signature: &str, thread: u64) {
        let (request_id, type_id) = {
            let state = self.state.lock().await;
            let pattern = signature
                .trim_start_matches('L')
                .trim_end_matches(';')
                .replace('/', ".");
            let request = state
                .requests
                .iter()
                .rev()
                .find(|r| {
                    r.event_kind == event_kinds::CLASS_PREPARE
                        && !r.cleared
                        && r.class_pattern.as_deref() == Some(pattern.as_str())
                })
                .expect("no class-prepare watch for signature");
            let type_id = state
                .classes
                .get(signature)
                .map(|c| c.type_id)
                .expect("class not in model");
            (request.request_id, type_id)
        };

        let mut w = PacketWriter::new();
        w.put_u8(2); // suspend all
        w.put_i32(1);
        w.put_u8(event_kinds::CLASS_PREPARE);
        w.put_i32(request_id);
        w.put_id(thread, ID_WIDTH);
        w.put_u8(1);
        w.put_id(type_id, ID_WIDTH);
        w.put_string(signature);
        w.put_i32(7);
        self.send_event(w.into_vec());
    }

    /// Drop a class from the model and report its unload.
    pub async fn fire_class_unload(&self, signature: &str) {
        self.state.lock().await.classes.remove(signature);

        let mut w = PacketWriter::new();
        w.put_u8(0); // unload cannot suspend
        w.put_i32(1);
        w.put_u8(event_kinds::CLASS_UNLOAD);
        w.put_i32(0);
        w.put_string(signature);
        self.send_event(w.into_vec());
    }

    /// Fire the newest armed breakpoint request at its own location,
    /// suspending the event thread like the real agent.
    pub async fn fire_breakpoint(&self, thread: u64) {
        let (request_id, location) = {
            let mut state = self.state.lock().await;
            let request = state
                .field_request(event_kinds::BREAKPOINT)
                .expect("no armed breakpoint request");
            let found = (request.request_id, request.location.expect("no location"));
            *state.suspend_counts.entry(thread).or_insert(0) += 1;
            found
        };

        let mut w = PacketWriter::new();
        w.put_u8(1); // suspend event thread
        w.put_i32(1);
        w.put_u8(event_kinds::BREAKPOINT);
        w.put_i32(request_id);
        w.put_id(thread, ID_WIDTH);
        put_location(&mut w, location);
        self.send_event(w.into_vec());
    }

    /// Fire the newest armed single-step request.
    pub async fn fire_step(&self, thread: u64, location: (u64, u64, u64)) {
        let request_id = {
            let mut state = self.state.lock().await;
            let request = state
                .field_request(event_kinds::SINGLE_STEP)
                .expect("no armed step request");
            let id = request.request_id;
            *state.suspend_counts.entry(thread).or_insert(0) += 1;
            id
        };

        let mut w = PacketWriter::new();
        w.put_u8(1);
        w.put_i32(1);
        w.put_u8(event_kinds::SINGLE_STEP);
        w.put_i32(request_id);
        w.put_id(thread, ID_WIDTH);
        put_location(&mut w, location);
        self.send_event(w.into_vec());
    }
}

fn put_location(w: &mut PacketWriter, (class_id, method_id, index): (u64, u64, u64)) {
    w.put_u8(1);
    w.put_id(class_id, ID_WIDTH);
    w.put_id(method_id, ID_WIDTH);
    w.put_u64(index);
}

async fn serve(
    mut stream: TcpStream,
    state: Arc<Mutex<MockState>>,
    mut event_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut assembler = PacketAssembler::new();
    let mut chunk = vec![0u8; 8192];

    loop {
        tokio::select! {
            Some(bytes) = event_rx.recv() => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }

            result = stream.read(&mut chunk) => {
                let n = match result {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let packets = assembler.feed(&chunk[..n]).expect("client sent bad framing");
                for packet in packets {
                    let IncomingPacket::Command(cmd) = packet else {
                        continue;
                    };
                    let mut state = state.lock().await;
                    let (error, payload) = handle_command(
                        &mut state,
                        cmd.command_set,
                        cmd.command,
                        &cmd.data,
                    );
                    let disposed = state.disposed;
                    drop(state);

                    let mut w = PacketWriter::new();
                    w.put_u32((11 + payload.len()) as u32);
                    w.put_u32(cmd.id);
                    w.put_u8(0x80);
                    w.put_u16(error);
                    w.put_bytes(&payload);
                    if stream.write_all(&w.into_vec()).await.is_err() {
                        return;
                    }
                    if disposed {
                        return; // closes the socket, like the real agent
                    }
                }
            }
        }
    }
}

fn handle_command(state: &mut MockState, set: u8, command: u8, data: &[u8]) -> (u16, Vec<u8>) {
    let mut r = PacketReader::new(data);
    let mut w = PacketWriter::new();

    match (set, command) {
        // VirtualMachine.IDSizes
        (1, 7) => {
            for _ in 0..5 {
                w.put_i32(ID_WIDTH as i32);
            }
        }
        // VirtualMachine.Capabilities
        (1, 12) => {
            for _ in 0..7 {
                w.put_u8(0);
            }
        }
        // VirtualMachine.ClassesBySignature
        (1, 2) => {
            let signature = r.get_string().unwrap();
            match state.classes.get(&signature) {
                Some(class) => {
                    w.put_i32(1);
                    w.put_u8(1);
                    w.put_id(class.type_id, ID_WIDTH);
                    w.put_i32(7);
                }
                None => w.put_i32(0),
            }
        }
        // VirtualMachine.Suspend / Resume
        (1, 8) => {
            state.vm_suspends += 1;
            for count in state.suspend_counts.values_mut() {
                *count += 1;
            }
        }
        (1, 9) => {
            state.vm_resumes += 1;
            for count in state.suspend_counts.values_mut() {
                *count = (*count - 1).max(0);
            }
        }
        // VirtualMachine.Dispose
        (1, 6) => {
            state.disposed = true;
        }
        // VirtualMachine.CreateString
        (1, 11) => {
            let value = r.get_string().unwrap();
            let id = state.alloc_object();
            state.strings.insert(id, value);
            w.put_id(id, ID_WIDTH);
        }
        // ReferenceType.Signature
        (2, 1) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            match state.class_by_type_id(type_id) {
                Some((signature, _)) => w.put_string(signature),
                None => return (21, Vec::new()), // INVALID_CLASS
            }
        }
        // ReferenceType.Fields
        (2, 4) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            let Some((_, class)) = state.class_by_type_id(type_id) else {
                return (21, Vec::new());
            };
            w.put_i32(class.fields.len() as i32);
            for field in &class.fields {
                w.put_id(field.field_id, ID_WIDTH);
                w.put_string(&field.name);
                w.put_string(&field.signature);
                w.put_i32(8);
            }
        }
        // ReferenceType.Methods
        (2, 5) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            let Some((_, class)) = state.class_by_type_id(type_id) else {
                return (21, Vec::new());
            };
            w.put_i32(class.methods.len() as i32);
            for method in &class.methods {
                w.put_id(method.method_id, ID_WIDTH);
                w.put_string(&method.name);
                w.put_string("()V");
                w.put_i32(1);
            }
        }
        // ReferenceType.GetValues (always one field)
        (2, 6) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            let count = r.get_i32().unwrap();
            assert_eq!(count, 1, "batched static GetValues must not be used");
            let field_id = r.get_id(ID_WIDTH).unwrap();
            let Some((_, class)) = state.class_by_type_id(type_id) else {
                return (21, Vec::new());
            };
            let value = class
                .static_values
                .get(&field_id)
                .copied()
                .unwrap_or(Value::object(tags::OBJECT, 0));
            w.put_i32(1);
            put_tagged(&mut w, &value);
        }
        // Method.LineTable
        (6, 1) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            let method_id = r.get_id(ID_WIDTH).unwrap();
            let Some(method) = state
                .class_by_type_id(type_id)
                .and_then(|(_, c)| c.methods.iter().find(|m| m.method_id == method_id))
            else {
                return (23, Vec::new()); // INVALID_METHODID
            };
            w.put_u64(0);
            w.put_u64(method.lines.iter().map(|(i, _)| *i).max().unwrap_or(0));
            w.put_i32(method.lines.len() as i32);
            for (index, line) in &method.lines {
                w.put_u64(*index);
                w.put_i32(*line);
            }
        }
        // Method.VariableTable
        (6, 2) => {
            let type_id = r.get_id(ID_WIDTH).unwrap();
            let method_id = r.get_id(ID_WIDTH).unwrap();
            let Some(method) = state
                .class_by_type_id(type_id)
                .and_then(|(_, c)| c.methods.iter().find(|m| m.method_id == method_id))
            else {
                return (23, Vec::new());
            };
            w.put_i32(0);
            w.put_i32(method.variables.len() as i32);
            for var in &method.variables {
                w.put_u64(0);
                w.put_string(&var.name);
                w.put_string(&var.signature);
                w.put_u32(1000);
                w.put_u32(var.slot);
            }
        }
        // ObjectReference.GetValues (always one field)
        (9, 2) => {
            let object_id = r.get_id(ID_WIDTH).unwrap();
            let count = r.get_i32().unwrap();
            assert_eq!(count, 1, "batched instance GetValues must not be used");
            let field_id = r.get_id(ID_WIDTH).unwrap();
            let Some(value) = state
                .objects
                .get(&object_id)
                .and_then(|fields| fields.get(&field_id))
                .copied()
            else {
                return (20, Vec::new()); // INVALID_OBJECT
            };
            w.put_i32(1);
            put_tagged(&mut w, &value);
        }
        // ObjectReference.SetValues — the session only ever writes string
        // references here, so the untagged payload is one object id
        (9, 3) => {
            let object_id = r.get_id(ID_WIDTH).unwrap();
            let count = r.get_i32().unwrap();
            assert_eq!(count, 1);
            let field_id = r.get_id(ID_WIDTH).unwrap();
            let string_id = r.get_id(ID_WIDTH).unwrap();
            state
                .objects
                .entry(object_id)
                .or_default()
                .insert(field_id, Value::object(tags::STRING, string_id));
        }
        // StringReference.Value
        (10, 1) => {
            let string_id = r.get_id(ID_WIDTH).unwrap();
            let Some(value) = state.strings.get(&string_id) else {
                return (20, Vec::new());
            };
            w.put_string(value);
        }
        // ThreadReference.Resume
        (11, 3) => {
            let thread_id = r.get_id(ID_WIDTH).unwrap();
            *state.thread_resumes.entry(thread_id).or_insert(0) += 1;
            let count = state.suspend_counts.entry(thread_id).or_insert(0);
            *count = (*count - 1).max(0);
        }
        // ThreadReference.Frames
        (11, 6) => {
            let thread_id = r.get_id(ID_WIDTH).unwrap();
            let frames = state.frames.get(&thread_id).cloned().unwrap_or_default();
            w.put_i32(frames.len() as i32);
            for frame in frames {
                w.put_id(frame.frame_id, ID_WIDTH);
                w.put_u8(frame.location.type_tag);
                w.put_id(frame.location.class_id, ID_WIDTH);
                w.put_id(frame.location.method_id, ID_WIDTH);
                w.put_u64(frame.location.index);
            }
        }
        // ThreadReference.SuspendCount
        (11, 12) => {
            let thread_id = r.get_id(ID_WIDTH).unwrap();
            w.put_i32(state.suspend_counts.get(&thread_id).copied().unwrap_or(0));
        }
        // EventRequest.Set
        (15, 1) => {
            let event_kind = r.get_u8().unwrap();
            let suspend_policy = r.get_u8().unwrap();
            let modifier_count = r.get_i32().unwrap();

            let mut request = RequestDef {
                request_id: state.next_request_id,
                event_kind,
                suspend_policy,
                count_filter: None,
                class_pattern: None,
                location: None,
                step_thread: None,
                step_size: None,
                step_depth: None,
                cleared: false,
            };
            state.next_request_id += 1;

            for _ in 0..modifier_count {
                match r.get_u8().unwrap() {
                    modifier_kinds::COUNT => request.count_filter = Some(r.get_i32().unwrap()),
                    modifier_kinds::CLASS_MATCH => {
                        request.class_pattern = Some(r.get_string().unwrap())
                    }
                    modifier_kinds::LOCATION_ONLY => {
                        r.get_u8().unwrap();
                        request.location = Some((
                            r.get_id(ID_WIDTH).unwrap(),
                            r.get_id(ID_WIDTH).unwrap(),
                            r.get_u64().unwrap(),
                        ));
                    }
                    modifier_kinds::STEP => {
                        request.step_thread = Some(r.get_id(ID_WIDTH).unwrap());
                        request.step_size = Some(r.get_i32().unwrap());
                        request.step_depth = Some(r.get_i32().unwrap());
                    }
                    other => panic!("unsupported modifier kind {}", other),
                }
            }

            w.put_i32(request.request_id);
            state.requests.push(request);
        }
        // EventRequest.Clear
        (15, 2) => {
            let event_kind = r.get_u8().unwrap();
            let request_id = r.get_i32().unwrap();
            match state
                .requests
                .iter_mut()
                .find(|req| req.request_id == request_id && req.event_kind == event_kind)
            {
                Some(req) => req.cleared = true,
                None => return (102, Vec::new()), // INVALID_EVENT_TYPE
            }
        }
        // StackFrame.GetValues (always one slot)
        (16, 1) => {
            let _thread = r.get_id(ID_WIDTH).unwrap();
            let frame_id = r.get_id(ID_WIDTH).unwrap();
            let count = r.get_i32().unwrap();
            assert_eq!(count, 1, "batched slot GetValues must not be used");
            let slot = r.get_i32().unwrap();
            let _sig_byte = r.get_u8().unwrap();
            let Some(value) = state.slot_values.get(&(frame_id, slot)).copied() else {
                return (35, Vec::new()); // INVALID_SLOT
            };
            w.put_i32(1);
            put_tagged(&mut w, &value);
        }
        other => panic!("mock has no handler for command {:?}", other),
    }

    (0, w.into_vec())
}

fn put_tagged(w: &mut PacketWriter, value: &Value) {
    w.put_u8(value.tag);
    match value.data {
        jdwp_client::types::ValueData::Object(id) => w.put_id(id, ID_WIDTH),
        jdwp_client::types::ValueData::Int(v) => w.put_i32(v),
        jdwp_client::types::ValueData::Boolean(v) => w.put_u8(v as u8),
        other => panic!("mock cannot encode {:?}", other),
    }
}

// ---- test helpers ----

/// Register a scalar wrapper class whose `_value` field carries the rendered
/// value.
pub fn add_wrapper_class(state: &mut MockState, signature: &str, type_id: u64, field_id: u64) {
    state.classes.insert(
        signature.to_string(),
        ClassDef {
            type_id,
            methods: Vec::new(),
            fields: vec![FieldDef {
                field_id,
                name: "_value".to_string(),
                signature: "Ljava/lang/String;".to_string(),
            }],
            static_values: HashMap::new(),
        },
    );
}

/// Allocate a wrapper instance holding `contents` behind its `_value` field.
pub fn wrapper_object(state: &mut MockState, value_field_id: u64, contents: &str) -> u64 {
    let string_id = state.alloc_object();
    state.strings.insert(string_id, contents.to_string());
    let object_id = state.alloc_object();
    state
        .objects
        .entry(object_id)
        .or_default()
        .insert(value_field_id, Value::object(tags::STRING, string_id));
    object_id
}

/// Run `DebugSession::start` against a freshly connected mock.
pub async fn start_session(
    session: &DebugSession,
    program: &std::path::Path,
    schemas: &[&str],
    state: Arc<Mutex<MockState>>,
) -> MockJvm {
    let port = free_port();
    let schemas: Vec<String> = schemas.iter().map(|s| s.to_string()).collect();
    let (started, jvm) = tokio::join!(
        session.start(program, &schemas, port),
        MockJvm::connect(port, state),
    );
    started.expect("session failed to start");
    jvm
}

/// Poll the mock state until the predicate holds.
pub async fn wait_until<F>(state: &Arc<Mutex<MockState>>, mut pred: F)
where
    F: FnMut(&MockState) -> bool,
{
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if pred(&*state.lock().await) {
            return;
        }
        if std::time::Instant::now() > deadline {
            panic!("timed out waiting on mock state");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Write a `.sql` fixture into the temp dir.
pub fn write_source(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Next session event, skipping plain output noise.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<DebugEvent>) -> DebugEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed");
        if matches!(event, DebugEvent::Output { .. }) {
            continue;
        }
        return event;
    }
}

/// Wait for an event matching the predicate, skipping everything else.
pub async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<DebugEvent>, mut pred: F) -> DebugEvent
where
    F: FnMut(&DebugEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}
