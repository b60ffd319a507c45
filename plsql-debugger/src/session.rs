// The debug session state machine
//
// Owns every session table: breakpoints, source-to-class mappings, pending
// class-prepare watches, variable handles. All of it lives behind one lock;
// protocol round trips are the only suspension points, so the session is
// logically single-threaded.
//
// Line arithmetic, both directions (decl_line is the zero-based source line
// of the declaration header):
//   bytecode_line = source_line + 1 - decl_line
//   source_line   = bytecode_line + decl_line - 1

use crate::error::{SessionError, SessionResult};
use crate::events::{DebugEvent, SourceLoadReason};
use crate::resolve::{NoopResolver, SourceResolver};
use crate::source::{self, ObjectType};
use crate::variables::{self, ScopeTag, VariableHandles, VariableInfo, VALUE_FIELD};
use jdwp_client::commands::{event_kinds, step_depths, step_sizes};
use jdwp_client::types::tags;
use jdwp_client::{
    EventKind, EventRequestManager, EventSet, FrameInfo, JdwpConnection, JdwpError, Value, VmMirror,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Negotiating,
    Running,
    Suspended(StopReason),
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Into,
    Over,
    Out,
}

impl StepKind {
    fn depth(&self) -> i32 {
        match self {
            Self::Into => step_depths::INTO,
            Self::Over => step_depths::OVER,
            Self::Out => step_depths::OUT,
        }
    }
}

/// A user breakpoint. Unverified until its source line resolves to a
/// concrete location in a loaded class.
#[derive(Debug, Clone, Serialize)]
pub struct Breakpoint {
    pub id: u32,
    pub line: u32,
    pub verified: bool,
    #[serde(skip)]
    request_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub index: usize,
    pub name: String,
    pub file: PathBuf,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeInfo {
    pub name: &'static str,
    pub variables_reference: i64,
    pub expensive: bool,
}

#[derive(Debug, Clone)]
struct ClassMapping {
    path: PathBuf,
    decl_line: u32,
}

#[derive(Debug, Clone)]
struct PendingClass {
    path: PathBuf,
    decl_line: u32,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    vm: Option<Arc<VmMirror>>,
    requests: Option<Arc<EventRequestManager>>,
    schemas: BTreeSet<String>,
    source_file: Option<PathBuf>,
    loaded_paths: HashSet<PathBuf>,
    breakpoints: HashMap<PathBuf, Vec<Breakpoint>>,
    /// Canonical class signature -> source mapping. Never shrinks until
    /// teardown.
    mappings: HashMap<String, ClassMapping>,
    /// Watched (not yet loaded) signature -> where its mapping will point.
    pending_classes: HashMap<String, PendingClass>,
    handles: VariableHandles,
    /// Raw values of expandable compound variables, keyed by signature.
    object_values: HashMap<String, Value>,
    next_breakpoint_id: u32,
    current_thread: Option<u64>,
    current_frame: Option<FrameInfo>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            vm: None,
            requests: None,
            schemas: BTreeSet::new(),
            source_file: None,
            loaded_paths: HashSet::new(),
            breakpoints: HashMap::new(),
            mappings: HashMap::new(),
            pending_classes: HashMap::new(),
            handles: VariableHandles::new(),
            object_values: HashMap::new(),
            next_breakpoint_id: 1,
            current_thread: None,
            current_frame: None,
        }
    }

    fn vm(&self) -> SessionResult<Arc<VmMirror>> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::Terminated);
        }
        self.vm.clone().ok_or(SessionError::NotConnected)
    }

    fn requests(&self) -> SessionResult<Arc<EventRequestManager>> {
        self.requests.clone().ok_or(SessionError::NotConnected)
    }

    fn file_loaded(&self, path: &Path) -> bool {
        self.mappings.values().any(|m| m.path == path)
    }
}

/// One PL/SQL debug session. Cheap to clone; all clones share the same
/// state.
#[derive(Clone)]
pub struct DebugSession {
    inner: Arc<Mutex<SessionInner>>,
    event_tx: mpsc::UnboundedSender<DebugEvent>,
    resolver: Arc<dyn SourceResolver>,
}

impl DebugSession {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DebugEvent>) {
        Self::with_resolver(Arc::new(NoopResolver))
    }

    pub fn with_resolver(
        resolver: Arc<dyn SourceResolver>,
    ) -> (Self, mpsc::UnboundedReceiver<DebugEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(Mutex::new(SessionInner::new())),
                event_tx,
                resolver,
            },
            event_rx,
        )
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    fn emit(&self, event: DebugEvent) {
        self.event_tx.send(event).ok();
    }

    // ---- lifecycle ----

    /// Wait for the debuggee to dial in, negotiate, register the watched
    /// schemas, re-verify pre-set breakpoints, scan the initial program, and
    /// let the target run.
    pub async fn start(
        &self,
        program: &Path,
        schemas: &[String],
        port: u16,
    ) -> SessionResult<()> {
        self.emit(DebugEvent::output(format!(
            "Debug started on port {}, waiting on the client to connect...",
            port
        )));
        self.inner.lock().await.state = SessionState::Listening;

        let connection = JdwpConnection::listen(port).await?;
        self.inner.lock().await.state = SessionState::Negotiating;

        let vm = Arc::new(VmMirror::negotiate(connection).await?);
        let requests = Arc::new(EventRequestManager::new(vm.clone()));

        let mut inner = self.inner.lock().await;
        inner.vm = Some(vm.clone());
        inner.requests = Some(requests.clone());
        for schema in schemas {
            let schema = schema.to_uppercase();
            self.emit(DebugEvent::output(format!(
                "Adding watching schema {}",
                schema
            )));
            inner.schemas.insert(schema);
        }

        self.spawn_event_pump(requests);

        self.verify_breakpoints(&mut inner, None, false).await?;
        self.load_source(&mut inner, program).await?;
        inner.state = SessionState::Running;
        drop(inner);

        vm.resume().await?;
        info!("Session running");
        Ok(())
    }

    /// Ask the VM to shut the debug connection down. Termination is reported
    /// through the vm-death path once the connection drops.
    pub async fn stop(&self) -> SessionResult<()> {
        let vm = self.inner.lock().await.vm()?;
        vm.dispose().await?;
        Ok(())
    }

    /// Continue execution until the next breakpoint or the end.
    pub async fn resume(&self) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        let vm = inner.vm()?;
        inner.state = SessionState::Running;
        drop(inner);
        vm.resume().await.map_err(Into::into)
    }

    /// One-shot step on the suspended thread, then a full suspend-count
    /// drain. The count filter, not the drain, makes the step fire exactly
    /// once.
    pub async fn step(&self, kind: StepKind) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        self.step_locked(&mut inner, kind).await
    }

    async fn step_locked(&self, inner: &mut SessionInner, kind: StepKind) -> SessionResult<()> {
        let vm = inner.vm()?;
        let requests = inner.requests()?;
        let thread = inner.current_thread.ok_or(SessionError::NotSuspended)?;

        let mut request = requests.create_step(thread, step_sizes::LINE, kind.depth());
        requests.enable(&mut request).await?;

        let suspends = vm.thread_suspend_count(thread).await?;
        debug!("Draining {} thread suspensions for step", suspends);
        for _ in 0..suspends {
            vm.thread_resume(thread).await?;
        }

        inner.state = SessionState::Running;
        Ok(())
    }

    // ---- event pump ----

    fn spawn_event_pump(&self, requests: Arc<EventRequestManager>) {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(set) = requests.next_event_set().await {
                session.handle_event_set(set).await;
            }
            debug!("Event stream ended");
        });
    }

    async fn handle_event_set(&self, set: EventSet) {
        for event in set.events {
            match event.details {
                EventKind::VmDeath => self.terminate("Debug ended...").await,
                EventKind::ClassPrepare { signature, .. } => {
                    if let Err(e) = self.handle_class_prepare(&signature).await {
                        warn!("Class-prepare handling failed for {}: {}", signature, e);
                    }
                }
                EventKind::ClassUnload { signature } => {
                    if let Err(e) = self.handle_class_unload(&signature).await {
                        warn!("Class-unload handling failed for {}: {}", signature, e);
                    }
                }
                EventKind::Breakpoint { thread, .. } => {
                    self.handle_stop(thread, StopReason::Breakpoint).await;
                }
                EventKind::Step { thread, .. } => {
                    self.handle_stop(thread, StopReason::Step).await;
                }
                other => debug!("Ignoring event {:?}", other),
            }
        }
    }

    async fn terminate(&self, message: &str) {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Terminated {
            return;
        }
        inner.state = SessionState::Terminated;
        drop(inner);
        self.emit(DebugEvent::output(message));
        self.emit(DebugEvent::Terminated);
    }

    /// A watched class showed up: record its mapping, re-verify the file's
    /// breakpoints, and release the VM-wide suspension the watch caused.
    async fn handle_class_prepare(&self, signature: &str) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(pending) = inner.pending_classes.remove(signature) {
            info!("Watched class prepared: {}", signature);
            inner.mappings.insert(
                source::canonical_key(signature),
                ClassMapping {
                    path: pending.path.clone(),
                    decl_line: pending.decl_line,
                },
            );
            self.verify_breakpoints(&mut inner, Some(&pending.path), true)
                .await?;
            self.emit_source_loaded(&mut inner, &pending.path);
        }

        let vm = inner.vm()?;
        drop(inner);
        vm.resume().await.map_err(Into::into)
    }

    /// The class behind a mapped file went away: unverify its breakpoints
    /// under VM suspension and re-arm prepare watches.
    async fn handle_class_unload(&self, signature: &str) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        let canonical = source::canonical_key(signature);
        let Some(mapping) = inner.mappings.get(&canonical).cloned() else {
            return Ok(());
        };
        info!("Mapped class unloaded: {}", signature);

        let vm = inner.vm()?;
        vm.suspend().await?;

        if let Some(bps) = inner.breakpoints.get_mut(&mapping.path) {
            for bp in bps.iter_mut() {
                bp.verified = false;
                bp.request_id = None;
            }
        }
        vm.invalidate_class(signature).await;
        vm.invalidate_class(&canonical).await;

        if !inner.pending_classes.contains_key(signature) {
            self.arm_class_prepare(
                &mut inner,
                signature.to_string(),
                mapping.path.clone(),
                mapping.decl_line,
            )
            .await?;
        }
        // A recompiled package may re-prepare either half first; watch both.
        if let Some(paired) = source::paired_signature(signature) {
            if !inner.pending_classes.contains_key(&paired) {
                self.arm_class_prepare(&mut inner, paired, mapping.path, mapping.decl_line)
                    .await?;
            }
        }

        drop(inner);
        vm.resume().await.map_err(Into::into)
    }

    async fn handle_stop(&self, thread: u64, reason: StopReason) {
        match self.try_handle_stop(thread, reason).await {
            Ok(true) => {}
            Ok(false) => {
                // Internal frame with no source mapping: step through it
                debug!("Transparent frame, stepping over");
                self.recover_with_step_over(thread).await;
            }
            Err(e) => {
                warn!("Stop handling failed: {}", e);
                self.recover_with_step_over(thread).await;
            }
        }
    }

    /// Returns `Ok(false)` when the stop landed in a frame that should be
    /// transparently stepped through.
    async fn try_handle_stop(&self, thread: u64, reason: StopReason) -> SessionResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.current_thread = Some(thread);
        let vm = inner.vm()?;

        let frames = vm.frames(thread, 0, -1).await?;
        let Some(frame) = frames.first().copied() else {
            return Ok(false);
        };
        if frame.location.class_id == 0 {
            return Ok(false);
        }
        let signature = match vm.class_signature(frame.location.class_id).await {
            Ok(s) if !s.is_empty() => s,
            _ => return Ok(false),
        };
        inner.current_frame = Some(frame);

        let canonical = source::canonical_key(&signature);
        match inner.mappings.get(&canonical).cloned() {
            Some(mapping) => {
                if inner.source_file.as_deref() != Some(mapping.path.as_path()) {
                    self.load_source(&mut inner, &mapping.path).await?;
                }
            }
            None => {
                // Best-effort interactive resolution
                if let Some(path) = self.resolver.resolve(&source::simple_name(&signature)) {
                    self.load_source(&mut inner, &path).await?;
                }
            }
        }

        inner.state = SessionState::Suspended(reason);
        drop(inner);

        match reason {
            StopReason::Step => self.emit(DebugEvent::StopOnEntry),
            StopReason::Breakpoint => self.emit(DebugEvent::StopOnBreakpoint),
        }
        Ok(true)
    }

    /// Failure escape hatch: whatever went wrong, keep the debuggee moving.
    async fn recover_with_step_over(&self, thread: u64) {
        let mut inner = self.inner.lock().await;
        inner.current_thread = Some(thread);
        if let Err(e) = self.step_locked(&mut inner, StepKind::Over).await {
            warn!("Recovery step failed: {}", e);
        }
    }

    // ---- source loading and class mapping ----

    async fn load_source(&self, inner: &mut SessionInner, path: &Path) -> SessionResult<()> {
        if inner.source_file.as_deref() == Some(path) {
            return Ok(());
        }
        inner.source_file = Some(path.to_path_buf());

        let text = tokio::fs::read_to_string(path).await?;
        let declarations = source::scan(&text);
        debug!(
            "Scanned {}: {} declaration(s)",
            path.display(),
            declarations.len()
        );

        let vm = inner.vm()?;
        let mut classes_found = false;

        for declaration in &declarations {
            let signatures = source::candidate_signatures(declaration, &inner.schemas);
            for signature in signatures {
                let classes = vm.classes_by_signature(&signature).await?;
                if !classes.is_empty() {
                    inner.mappings.insert(
                        source::canonical_key(&signature),
                        ClassMapping {
                            path: path.to_path_buf(),
                            decl_line: declaration.line,
                        },
                    );
                    classes_found = true;
                }
                if !inner.pending_classes.contains_key(&signature) {
                    self.arm_class_prepare(
                        inner,
                        signature.clone(),
                        path.to_path_buf(),
                        declaration.line,
                    )
                    .await?;
                    if declaration.object_type == ObjectType::Package {
                        if let Some(paired) = source::paired_signature(&signature) {
                            self.arm_class_prepare(
                                inner,
                                paired,
                                path.to_path_buf(),
                                declaration.line,
                            )
                            .await?;
                        }
                    }
                }
            }
        }

        if classes_found {
            self.emit_source_loaded(inner, path);
        }
        Ok(())
    }

    fn emit_source_loaded(&self, inner: &mut SessionInner, path: &Path) {
        let reason = if inner.loaded_paths.insert(path.to_path_buf()) {
            SourceLoadReason::New
        } else {
            SourceLoadReason::Changed
        };
        self.emit(DebugEvent::SourceLoaded {
            reason,
            path: path.to_path_buf(),
        });
    }

    async fn arm_class_prepare(
        &self,
        inner: &mut SessionInner,
        signature: String,
        path: PathBuf,
        decl_line: u32,
    ) -> SessionResult<()> {
        let requests = inner.requests()?;
        let pattern = source::class_name(&signature);
        let mut request = requests.create_class_prepare(&pattern);
        requests.enable(&mut request).await?;
        debug!("Watching for class prepare: {}", signature);
        inner
            .pending_classes
            .insert(signature, PendingClass { path, decl_line });
        Ok(())
    }

    // ---- breakpoints ----

    /// Append an unverified breakpoint and try to verify it right away.
    /// Verification failure is never surfaced here; it retries on the next
    /// class-prepare.
    pub async fn set_breakpoint(&self, path: &Path, line: u32) -> SessionResult<Breakpoint> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_breakpoint_id;
        inner.next_breakpoint_id += 1;

        let breakpoint = Breakpoint {
            id,
            line,
            verified: false,
            request_id: None,
        };
        inner
            .breakpoints
            .entry(path.to_path_buf())
            .or_default()
            .push(breakpoint.clone());

        if inner.vm.is_some() {
            if let Err(e) = self.verify_breakpoints(&mut inner, Some(path), false).await {
                warn!("Breakpoint verification failed: {}", e);
            }
        }

        let stored = inner
            .breakpoints
            .get(path)
            .and_then(|bps| bps.iter().find(|bp| bp.id == id).cloned())
            .unwrap_or(breakpoint);
        Ok(stored)
    }

    /// Remove one breakpoint by line, deleting its backing request.
    pub async fn clear_breakpoint(
        &self,
        path: &Path,
        line: u32,
    ) -> SessionResult<Option<Breakpoint>> {
        let mut inner = self.inner.lock().await;
        let Some(bps) = inner.breakpoints.get_mut(path) else {
            return Ok(None);
        };
        let Some(index) = bps.iter().position(|bp| bp.line == line) else {
            return Ok(None);
        };
        let breakpoint = bps.remove(index);

        if let Some(request_id) = breakpoint.request_id {
            let requests = inner.requests()?;
            if let Err(e) = requests.clear(event_kinds::BREAKPOINT, request_id).await {
                warn!("Failed to clear breakpoint request {}: {}", request_id, e);
            }
        }
        Ok(Some(breakpoint))
    }

    /// Remove every breakpoint for a file.
    pub async fn clear_breakpoints(&self, path: &Path) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(bps) = inner.breakpoints.remove(path) else {
            return Ok(());
        };
        if let Ok(requests) = inner.requests() {
            for bp in bps {
                if let Some(request_id) = bp.request_id {
                    if let Err(e) = requests.clear(event_kinds::BREAKPOINT, request_id).await {
                        warn!("Failed to clear breakpoint request {}: {}", request_id, e);
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn breakpoints(&self, path: &Path) -> Vec<Breakpoint> {
        let inner = self.inner.lock().await;
        inner.breakpoints.get(path).cloned().unwrap_or_default()
    }

    /// Every executable source line of every class mapped to a file.
    pub async fn breakpoint_locations(&self, path: &Path) -> SessionResult<Vec<u32>> {
        let mut inner = self.inner.lock().await;
        let vm = inner.vm()?;
        self.load_source(&mut inner, path).await?;

        let mappings: Vec<(String, ClassMapping)> = inner
            .mappings
            .iter()
            .filter(|(_, m)| m.path == path)
            .map(|(s, m)| (s.clone(), m.clone()))
            .collect();

        let mut lines = BTreeSet::new();
        for (signature, mapping) in mappings {
            for class in vm.classes_by_signature(&signature).await? {
                for method in vm.methods(class.type_id).await? {
                    let Ok(table) = vm.line_table(class.type_id, method.method_id).await else {
                        continue;
                    };
                    for entry in &table.lines {
                        let source_line = entry.line_number as i64 + mapping.decl_line as i64 - 1;
                        if source_line >= 1 {
                            lines.insert(source_line as u32);
                        }
                    }
                }
            }
        }
        Ok(lines.into_iter().collect())
    }

    /// Try to verify every unverified breakpoint, optionally restricted to
    /// one file. `from_class_load` skips re-scanning sources because the
    /// caller just recorded a fresh mapping.
    async fn verify_breakpoints(
        &self,
        inner: &mut SessionInner,
        filter: Option<&Path>,
        from_class_load: bool,
    ) -> SessionResult<()> {
        if inner.vm.is_none() {
            return Ok(());
        }

        let paths: Vec<PathBuf> = inner
            .breakpoints
            .keys()
            .filter(|p| filter.map_or(true, |f| f == p.as_path()))
            .cloned()
            .collect();

        for path in paths {
            if !from_class_load {
                self.load_source(inner, &path).await?;
            }
            if !inner.file_loaded(&path) {
                continue;
            }

            let mappings: Vec<(String, ClassMapping)> = inner
                .mappings
                .iter()
                .filter(|(_, m)| m.path == path)
                .map(|(s, m)| (s.clone(), m.clone()))
                .collect();

            let count = inner.breakpoints.get(&path).map_or(0, |bps| bps.len());
            for index in 0..count {
                let (bp_id, bp_line, verified) = {
                    let bp = &inner.breakpoints[&path][index];
                    (bp.id, bp.line, bp.verified)
                };
                if verified {
                    continue;
                }

                for (signature, mapping) in &mappings {
                    let bytecode_line = bp_line as i64 + 1 - mapping.decl_line as i64;
                    if bytecode_line < 1 {
                        continue;
                    }
                    match self
                        .install_breakpoint(inner, signature, bytecode_line as i32)
                        .await
                    {
                        Ok(Some(request_id)) => {
                            if let Some(bp) = inner
                                .breakpoints
                                .get_mut(&path)
                                .and_then(|bps| bps.get_mut(index))
                            {
                                bp.verified = true;
                                bp.request_id = Some(request_id);
                            }
                            self.emit(DebugEvent::BreakpointChanged {
                                id: bp_id,
                                line: bp_line,
                                verified: true,
                            });
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!("Breakpoint at {}:{} not resolvable: {}", signature, bp_line, e);
                            self.emit(DebugEvent::Output {
                                text: "not able to validate breakpoint".into(),
                                path: Some(path.clone()),
                                line: Some(bp_line),
                                column: None,
                                group: None,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Install a breakpoint request at the first executable location of a
    /// compiled line. `None` when the line has no code.
    async fn install_breakpoint(
        &self,
        inner: &mut SessionInner,
        signature: &str,
        bytecode_line: i32,
    ) -> SessionResult<Option<i32>> {
        let vm = inner.vm()?;
        let requests = inner.requests()?;

        for class in vm.classes_by_signature(signature).await? {
            let locations = vm.locations_of_line(class.type_id, bytecode_line).await?;
            if let Some(location) = locations.first() {
                let mut request = requests.create_breakpoint(location);
                let request_id = requests.enable(&mut request).await?;
                return Ok(Some(request_id));
            }
        }
        Ok(None)
    }

    // ---- stack ----

    /// Live frames top-down, mapped to source positions. Frames without a
    /// resolvable class and mapping are skipped; stops at `max_levels`.
    pub async fn stack(&self, max_levels: usize) -> SessionResult<Vec<StackFrame>> {
        let inner = self.inner.lock().await;
        let vm = inner.vm()?;
        let thread = inner.current_thread.ok_or(SessionError::NotSuspended)?;

        let frames = vm.frames(thread, 0, -1).await?;
        let mut out = Vec::new();

        for frame in frames {
            if out.len() >= max_levels {
                break;
            }
            match self.format_frame(&inner, &vm, &frame).await {
                Ok(Some(mut view)) => {
                    view.index = out.len();
                    out.push(view);
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping unmappable frame: {}", e),
            }
        }
        Ok(out)
    }

    async fn format_frame(
        &self,
        inner: &SessionInner,
        vm: &VmMirror,
        frame: &FrameInfo,
    ) -> SessionResult<Option<StackFrame>> {
        if frame.location.class_id == 0 {
            return Ok(None);
        }
        let signature = vm.class_signature(frame.location.class_id).await?;
        if signature.is_empty() {
            return Ok(None);
        }
        let canonical = source::canonical_key(&signature);
        let Some(mapping) = inner.mappings.get(&canonical) else {
            return Ok(None);
        };

        let Some(method) = vm
            .method_info(frame.location.class_id, frame.location.method_id)
            .await?
        else {
            return Ok(None);
        };
        let table = vm
            .line_table(frame.location.class_id, frame.location.method_id)
            .await?;

        // Largest entry at or before the frame's current offset
        let mut line = None;
        for entry in &table.lines {
            if entry.line_code_index <= frame.location.index {
                line = Some(entry.line_number);
            }
        }
        let Some(line) = line else {
            return Ok(None);
        };
        let source_line = line as i64 + mapping.decl_line as i64 - 1;
        if source_line < 1 {
            return Ok(None);
        }

        Ok(Some(StackFrame {
            index: 0,
            name: format!("{}.{}()", source::stack_display_name(&signature), method.name),
            file: mapping.path.clone(),
            line: source_line as u32,
        }))
    }

    // ---- scopes and variables ----

    /// Local scope always; package-global scopes only inside a package.
    pub async fn scopes(&self) -> SessionResult<Vec<ScopeInfo>> {
        let mut inner = self.inner.lock().await;
        let vm = inner.vm()?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;
        let signature = vm.class_signature(frame.location.class_id).await?;

        let mut scopes = vec![ScopeInfo {
            name: "Local",
            variables_reference: inner.handles.create(ScopeTag::Local),
            expensive: false,
        }];
        if source::is_package_signature(&signature) {
            scopes.push(ScopeInfo {
                name: "Global Header",
                variables_reference: inner.handles.create(ScopeTag::GlobalHeader),
                expensive: true,
            });
            scopes.push(ScopeInfo {
                name: "Global Body",
                variables_reference: inner.handles.create(ScopeTag::GlobalBody),
                expensive: true,
            });
        }
        Ok(scopes)
    }

    pub async fn variables(&self, reference: i64) -> SessionResult<Vec<VariableInfo>> {
        let mut inner = self.inner.lock().await;
        let tag = inner
            .handles
            .get(reference)
            .cloned()
            .ok_or(SessionError::UnknownHandle(reference))?;
        match tag {
            ScopeTag::Local => self.local_variables(&mut inner).await,
            ScopeTag::GlobalHeader => self.global_variables(&mut inner, true).await,
            ScopeTag::GlobalBody => self.global_variables(&mut inner, false).await,
            ScopeTag::Object(signature) => self.object_variables(&mut inner, &signature).await,
        }
    }

    async fn local_variables(&self, inner: &mut SessionInner) -> SessionResult<Vec<VariableInfo>> {
        let vm = inner.vm()?;
        let thread = inner.current_thread.ok_or(SessionError::NotSuspended)?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;

        let slots = vm
            .variable_table(frame.location.class_id, frame.location.method_id)
            .await?;

        let mut out = Vec::new();
        for slot in slots {
            let sig_byte = slot.signature.as_bytes().first().copied().unwrap_or(tags::OBJECT);
            match vm
                .frame_slot(thread, frame.frame_id, slot.slot as i32, sig_byte)
                .await
            {
                Ok(value) => {
                    out.push(
                        self.render_value(inner, &slot.name, &slot.signature, value)
                            .await,
                    );
                }
                Err(e) => {
                    debug!("Slot {} unreadable: {}", slot.name, e);
                    out.push(VariableInfo::placeholder(&slot.name));
                }
            }
        }
        Ok(out)
    }

    async fn global_variables(
        &self,
        inner: &mut SessionInner,
        from_header: bool,
    ) -> SessionResult<Vec<VariableInfo>> {
        let vm = inner.vm()?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;

        let mut signature = vm.class_signature(frame.location.class_id).await?;
        if from_header {
            signature = source::header_signature(&signature);
        }
        let classes = vm.classes_by_signature(&signature).await?;
        let Some(class) = classes.first().cloned() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        // One field per round trip; batched GetValues only fills the first
        // entry on this VM.
        for field in vm.fields(class.type_id).await? {
            match vm.static_field(class.type_id, field.field_id).await {
                Ok(value) => {
                    out.push(
                        self.render_value(inner, &field.name, &field.signature, value)
                            .await,
                    );
                }
                Err(e) => {
                    debug!("Field {} unreadable: {}", field.name, e);
                    out.push(VariableInfo::placeholder(&field.name));
                }
            }
        }
        Ok(out)
    }

    async fn object_variables(
        &self,
        inner: &mut SessionInner,
        signature: &str,
    ) -> SessionResult<Vec<VariableInfo>> {
        let vm = inner.vm()?;
        let holder = inner
            .object_values
            .get(signature)
            .copied()
            .ok_or_else(|| SessionError::UnknownObject(signature.to_string()))?;
        let object = holder
            .object_id()
            .ok_or_else(|| SessionError::UnknownObject(signature.to_string()))?;

        let classes = vm.classes_by_signature(signature).await?;
        let Some(class) = classes.first().cloned() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for field in vm.fields(class.type_id).await? {
            match vm.object_field(object, field.field_id).await {
                Ok(value) => {
                    out.push(
                        self.render_value(inner, &field.name, &field.signature, value)
                            .await,
                    );
                }
                Err(e) => {
                    debug!("Field {} unreadable: {}", field.name, e);
                    out.push(VariableInfo::placeholder(&field.name));
                }
            }
        }
        Ok(out)
    }

    /// Present one raw value. Wrappers unwrap through `_value`; row types
    /// become expandable handles; anything else non-library degrades to a
    /// placeholder.
    async fn render_value(
        &self,
        inner: &mut SessionInner,
        name: &str,
        signature: &str,
        value: Value,
    ) -> VariableInfo {
        match self.try_render_value(inner, name, signature, value).await {
            Ok(info) => info,
            Err(e) => {
                debug!("Failed to render {}: {}", name, e);
                VariableInfo::placeholder(name)
            }
        }
    }

    async fn try_render_value(
        &self,
        inner: &mut SessionInner,
        name: &str,
        signature: &str,
        value: Value,
    ) -> SessionResult<VariableInfo> {
        let vm = inner.vm()?;

        if variables::is_builtin_wrapper(signature) {
            let rendered = self.unwrap_builtin(&vm, signature, &value).await?;
            return Ok(VariableInfo {
                name: name.to_string(),
                type_name: variables::wrapper_type_name(signature).to_string(),
                value: rendered,
                variables_reference: 0,
            });
        }

        if variables::is_rowtype(signature) {
            inner.object_values.insert(signature.to_string(), value);
            let handle = inner.handles.create(ScopeTag::Object(signature.to_string()));
            return Ok(VariableInfo {
                name: name.to_string(),
                type_name: "object".into(),
                value: "Object".into(),
                variables_reference: handle,
            });
        }

        if !signature.starts_with("Ljava/") {
            warn!("Signature not yet implemented: {}", signature);
            self.emit(DebugEvent::output(format!(
                "Signature not yet implemented: {}",
                signature
            )));
        }
        Ok(VariableInfo::placeholder(name))
    }

    /// Read a wrapper's `_value` field and render it, fetching string
    /// contents when it is a string reference.
    async fn unwrap_builtin(
        &self,
        vm: &VmMirror,
        signature: &str,
        value: &Value,
    ) -> SessionResult<String> {
        let classes = vm.classes_by_signature(signature).await?;
        let class = classes
            .first()
            .ok_or_else(|| JdwpError::Protocol(format!("wrapper class {} not loaded", signature)))?;
        let field = vm
            .field_by_name(class.type_id, VALUE_FIELD)
            .await?
            .ok_or_else(|| JdwpError::Protocol(format!("{} has no {} field", signature, VALUE_FIELD)))?;
        let object = value
            .object_id()
            .ok_or_else(|| JdwpError::Protocol("null wrapper object".into()))?;

        let inner_value = vm.object_field(object, field.field_id).await?;
        let rendered = match (inner_value.tag, inner_value.object_id()) {
            (t, Some(id)) if t == tags::STRING => vm.string_value(id).await?,
            (t, None) if t == tags::STRING || t == tags::OBJECT => String::new(),
            _ => inner_value.format(),
        };
        Ok(rendered)
    }

    /// Write a new value into a wrapper's `_value` field via a freshly
    /// allocated target-VM string. No-op for non-wrapper signatures.
    async fn write_builtin(
        &self,
        vm: &VmMirror,
        signature: &str,
        holder: &Value,
        new_value: &str,
    ) -> SessionResult<()> {
        if !variables::is_builtin_wrapper(signature) {
            return Ok(());
        }
        let classes = vm.classes_by_signature(signature).await?;
        let class = classes
            .first()
            .ok_or_else(|| JdwpError::Protocol(format!("wrapper class {} not loaded", signature)))?;
        let field = vm
            .field_by_name(class.type_id, VALUE_FIELD)
            .await?
            .ok_or_else(|| JdwpError::Protocol(format!("{} has no {} field", signature, VALUE_FIELD)))?;
        let object = holder
            .object_id()
            .ok_or_else(|| JdwpError::Protocol("null wrapper object".into()))?;

        let string_id = vm.create_string(new_value).await?;
        vm.set_object_field(object, field.field_id, &Value::object(tags::STRING, string_id))
            .await
            .map_err(Into::into)
    }

    /// Set a named variable in the scope behind a handle. Returns the value
    /// re-read from the target as confirmation.
    pub async fn set_variable(
        &self,
        reference: i64,
        name: &str,
        new_value: &str,
    ) -> SessionResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        let tag = inner
            .handles
            .get(reference)
            .cloned()
            .ok_or(SessionError::UnknownHandle(reference))?;

        let found = match tag {
            ScopeTag::Local => self.locate_local(&mut inner, name).await?,
            ScopeTag::GlobalHeader => self.locate_global(&mut inner, name, true).await?,
            ScopeTag::GlobalBody => self.locate_global(&mut inner, name, false).await?,
            ScopeTag::Object(signature) => {
                self.locate_object_field(&mut inner, &signature, name).await?
            }
        };
        let Some((signature, holder)) = found else {
            return Ok(None);
        };

        let vm = inner.vm()?;
        if let Err(e) = self.write_builtin(&vm, &signature, &holder, new_value).await {
            warn!("Failed to update variable {}: {}", name, e);
            self.emit(DebugEvent::output(format!(
                "Unable to update variable with value {}",
                new_value
            )));
        }

        let info = self.render_value(&mut inner, name, &signature, holder).await;
        Ok(Some(info.value))
    }

    /// Find a local variable by name: its signature and current value.
    async fn locate_local(
        &self,
        inner: &mut SessionInner,
        name: &str,
    ) -> SessionResult<Option<(String, Value)>> {
        let vm = inner.vm()?;
        let thread = inner.current_thread.ok_or(SessionError::NotSuspended)?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;

        let slots = vm
            .variable_table(frame.location.class_id, frame.location.method_id)
            .await?;
        for slot in slots {
            if slot.name == name {
                let sig_byte = slot.signature.as_bytes().first().copied().unwrap_or(tags::OBJECT);
                let value = vm
                    .frame_slot(thread, frame.frame_id, slot.slot as i32, sig_byte)
                    .await?;
                return Ok(Some((slot.signature, value)));
            }
        }
        Ok(None)
    }

    async fn locate_global(
        &self,
        inner: &mut SessionInner,
        name: &str,
        from_header: bool,
    ) -> SessionResult<Option<(String, Value)>> {
        let vm = inner.vm()?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;

        let mut signature = vm.class_signature(frame.location.class_id).await?;
        if from_header {
            signature = source::header_signature(&signature);
        }
        let classes = vm.classes_by_signature(&signature).await?;
        let Some(class) = classes.first().cloned() else {
            return Ok(None);
        };

        for field in vm.fields(class.type_id).await? {
            if field.name == name {
                let value = vm.static_field(class.type_id, field.field_id).await?;
                return Ok(Some((field.signature, value)));
            }
        }
        Ok(None)
    }

    async fn locate_object_field(
        &self,
        inner: &mut SessionInner,
        signature: &str,
        name: &str,
    ) -> SessionResult<Option<(String, Value)>> {
        let vm = inner.vm()?;
        let holder = inner
            .object_values
            .get(signature)
            .copied()
            .ok_or_else(|| SessionError::UnknownObject(signature.to_string()))?;
        let object = holder
            .object_id()
            .ok_or_else(|| SessionError::UnknownObject(signature.to_string()))?;

        let classes = vm.classes_by_signature(signature).await?;
        let Some(class) = classes.first().cloned() else {
            return Ok(None);
        };
        for field in vm.fields(class.type_id).await? {
            if field.name == name {
                let value = vm.object_field(object, field.field_id).await?;
                return Ok(Some((field.signature, value)));
            }
        }
        Ok(None)
    }

    // ---- evaluation ----

    /// Resolve a dotted path: the first segment against locals (and package
    /// globals when inside a package), each further segment against the
    /// previous object's expanded field list. First scalar match wins.
    pub async fn evaluate(&self, expression: &str) -> SessionResult<Option<VariableInfo>> {
        let mut inner = self.inner.lock().await;
        let vm = inner.vm()?;
        let frame = inner.current_frame.ok_or(SessionError::NotSuspended)?;

        let segments: Vec<String> = expression
            .to_uppercase()
            .split('.')
            .map(str::to_string)
            .collect();

        let mut candidates = self.local_variables(&mut inner).await?;
        let signature = vm.class_signature(frame.location.class_id).await?;
        if source::is_package_signature(&signature) {
            candidates.extend(self.global_variables(&mut inner, true).await?);
            candidates.extend(self.global_variables(&mut inner, false).await?);
        }

        if segments.len() < 2 {
            return Ok(candidates.into_iter().find(|v| v.name == segments[0]));
        }

        for segment in &segments {
            let Some(found) = candidates.iter().find(|v| &v.name == segment).cloned() else {
                continue;
            };
            if found.type_name == "object" {
                let Some(ScopeTag::Object(object_sig)) =
                    inner.handles.get(found.variables_reference).cloned()
                else {
                    return Ok(None);
                };
                candidates = self.object_variables(&mut inner, &object_sig).await?;
            } else {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
