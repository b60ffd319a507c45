// VM mirror: local proxies for remote VM entities
//
// Negotiates ID sizes and capabilities right after the handshake, caches
// class/method/field/line-table lookups by id or signature, and tracks the
// global suspend depth. All wire encoding goes through the stateless catalog
// modules.

use crate::connection::JdwpConnection;
use crate::eventloop::ConnEvent;
use crate::events::{parse_event_set, EventSet};
use crate::protocol::{Command, JdwpResult, ReplyPacket};
use crate::types::{
    Capabilities, ClassInfo, FieldId, FieldInfo, FrameId, FrameInfo, IdSizes, LineTable, Location,
    MethodId, MethodInfo, ObjectId, ReferenceTypeId, StringId, ThreadId, Value,
};
use crate::{method, object, reftype, stackframe, string, thread, vm};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct MirrorCaches {
    classes_by_signature: HashMap<String, Vec<ClassInfo>>,
    signatures: HashMap<ReferenceTypeId, String>,
    methods: HashMap<ReferenceTypeId, Vec<MethodInfo>>,
    fields: HashMap<ReferenceTypeId, Vec<FieldInfo>>,
    line_tables: HashMap<(ReferenceTypeId, MethodId), LineTable>,
}

#[derive(Debug)]
pub struct VmMirror {
    conn: JdwpConnection,
    id_sizes: IdSizes,
    capabilities: Capabilities,
    caches: Mutex<MirrorCaches>,
    suspend_depth: AtomicI32,
}

impl VmMirror {
    /// Query ID sizes and capabilities. Completion of this call is the
    /// one-time "ready" signal: every later ID uses the negotiated widths.
    pub async fn negotiate(conn: JdwpConnection) -> JdwpResult<Self> {
        let reply = conn.send(vm::id_sizes()).await?;
        let id_sizes = vm::id_sizes_reply(&reply)?;
        debug!("Negotiated ID sizes: {:?}", id_sizes);

        let reply = conn.send(vm::capabilities()).await?;
        let capabilities = vm::capabilities_reply(&reply)?;
        info!("VM ready, capabilities: {:?}", capabilities);

        Ok(Self {
            conn,
            id_sizes,
            capabilities,
            caches: Mutex::new(MirrorCaches::default()),
            suspend_depth: AtomicI32::new(0),
        })
    }

    pub fn id_sizes(&self) -> &IdSizes {
        &self.id_sizes
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub async fn send(&self, command: Command) -> JdwpResult<ReplyPacket> {
        self.conn.send(command).await
    }

    /// Next decoded event set. Connection loss surfaces as a synthetic
    /// vm-death set; `None` only after that was delivered.
    pub async fn recv_event_set(&self) -> Option<EventSet> {
        loop {
            match self.conn.recv_event().await? {
                ConnEvent::Composite(data) => match parse_event_set(&data, &self.id_sizes) {
                    Ok(set) => return Some(set),
                    Err(e) => {
                        warn!("Failed to parse event set: {}", e);
                        continue;
                    }
                },
                ConnEvent::Closed => return Some(EventSet::synthetic_vm_death()),
            }
        }
    }

    // ---- class mirrors ----

    /// Lookup by exact signature, cached until the class unloads.
    pub async fn classes_by_signature(&self, signature: &str) -> JdwpResult<Vec<ClassInfo>> {
        {
            let caches = self.caches.lock().await;
            if let Some(classes) = caches.classes_by_signature.get(signature) {
                return Ok(classes.clone());
            }
        }

        let reply = self.conn.send(vm::classes_by_signature(signature)).await?;
        let classes = vm::classes_by_signature_reply(&reply, &self.id_sizes, signature)?;

        // A miss is not cached: the class may well load later
        if !classes.is_empty() {
            let mut caches = self.caches.lock().await;
            for class in &classes {
                caches
                    .signatures
                    .insert(class.type_id, class.signature.clone());
            }
            caches
                .classes_by_signature
                .insert(signature.to_string(), classes.clone());
        }
        Ok(classes)
    }

    /// Drop everything cached for a signature; called on class-unload so the
    /// next lookup refreshes from the VM.
    pub async fn invalidate_class(&self, signature: &str) {
        let mut caches = self.caches.lock().await;
        if let Some(classes) = caches.classes_by_signature.remove(signature) {
            for class in classes {
                caches.signatures.remove(&class.type_id);
                caches.methods.remove(&class.type_id);
                caches.fields.remove(&class.type_id);
                caches
                    .line_tables
                    .retain(|(class_id, _), _| *class_id != class.type_id);
            }
        }
    }

    /// Declaring-type signature for a class id. An empty string marks an
    /// internal frame with no source mapping.
    pub async fn class_signature(&self, class_id: ReferenceTypeId) -> JdwpResult<String> {
        {
            let caches = self.caches.lock().await;
            if let Some(signature) = caches.signatures.get(&class_id) {
                return Ok(signature.clone());
            }
        }

        let reply = self
            .conn
            .send(reftype::signature(class_id, &self.id_sizes))
            .await?;
        let signature = reftype::signature_reply(&reply)?;

        let mut caches = self.caches.lock().await;
        caches.signatures.insert(class_id, signature.clone());
        Ok(signature)
    }

    pub async fn methods(&self, class_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>> {
        {
            let caches = self.caches.lock().await;
            if let Some(methods) = caches.methods.get(&class_id) {
                return Ok(methods.clone());
            }
        }

        let reply = self
            .conn
            .send(reftype::methods(class_id, &self.id_sizes))
            .await?;
        let methods = reftype::methods_reply(&reply, &self.id_sizes)?;

        let mut caches = self.caches.lock().await;
        caches.methods.insert(class_id, methods.clone());
        Ok(methods)
    }

    pub async fn method_info(
        &self,
        class_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Option<MethodInfo>> {
        let methods = self.methods(class_id).await?;
        Ok(methods.into_iter().find(|m| m.method_id == method_id))
    }

    /// Visible fields of a class.
    pub async fn fields(&self, class_id: ReferenceTypeId) -> JdwpResult<Vec<FieldInfo>> {
        {
            let caches = self.caches.lock().await;
            if let Some(fields) = caches.fields.get(&class_id) {
                return Ok(fields.clone());
            }
        }

        let reply = self
            .conn
            .send(reftype::fields(class_id, &self.id_sizes))
            .await?;
        let fields = reftype::fields_reply(&reply, &self.id_sizes)?;

        let mut caches = self.caches.lock().await;
        caches.fields.insert(class_id, fields.clone());
        Ok(fields)
    }

    pub async fn field_by_name(
        &self,
        class_id: ReferenceTypeId,
        name: &str,
    ) -> JdwpResult<Option<FieldInfo>> {
        let fields = self.fields(class_id).await?;
        Ok(fields.into_iter().find(|f| f.name == name))
    }

    pub async fn line_table(
        &self,
        class_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<LineTable> {
        {
            let caches = self.caches.lock().await;
            if let Some(table) = caches.line_tables.get(&(class_id, method_id)) {
                return Ok(table.clone());
            }
        }

        let reply = self
            .conn
            .send(method::line_table(class_id, method_id, &self.id_sizes))
            .await?;
        let table = method::line_table_reply(&reply)?;

        let mut caches = self.caches.lock().await;
        caches.line_tables.insert((class_id, method_id), table.clone());
        Ok(table)
    }

    pub async fn variable_table(
        &self,
        class_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<Vec<crate::types::Variable>> {
        let reply = self
            .conn
            .send(method::variable_table(class_id, method_id, &self.id_sizes))
            .await?;
        method::variable_table_reply(&reply)
    }

    /// Every concrete executable location at a compiled line number, across
    /// all of the class's methods.
    pub async fn locations_of_line(
        &self,
        class_id: ReferenceTypeId,
        line: i32,
    ) -> JdwpResult<Vec<Location>> {
        let mut locations = Vec::new();
        for method in self.methods(class_id).await? {
            let table = match self.line_table(class_id, method.method_id).await {
                Ok(table) => table,
                // Methods without line info (natives) just don't contribute
                Err(_) => continue,
            };
            for entry in &table.lines {
                if entry.line_number == line {
                    locations.push(Location {
                        type_tag: 1,
                        class_id,
                        method_id: method.method_id,
                        index: entry.line_code_index,
                    });
                }
            }
        }
        Ok(locations)
    }

    // ---- thread mirrors ----

    pub async fn frames(
        &self,
        thread_id: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<FrameInfo>> {
        let reply = self
            .conn
            .send(thread::frames(thread_id, start_frame, length, &self.id_sizes))
            .await?;
        thread::frames_reply(&reply, &self.id_sizes)
    }

    pub async fn thread_suspend_count(&self, thread_id: ThreadId) -> JdwpResult<i32> {
        let reply = self
            .conn
            .send(thread::suspend_count(thread_id, &self.id_sizes))
            .await?;
        thread::suspend_count_reply(&reply)
    }

    pub async fn thread_resume(&self, thread_id: ThreadId) -> JdwpResult<()> {
        let reply = self
            .conn
            .send(thread::resume(thread_id, &self.id_sizes))
            .await?;
        vm::void_reply(&reply)
    }

    // ---- global suspend/resume ----

    /// VM-wide suspend; depth-counted, not a boolean.
    pub async fn suspend(&self) -> JdwpResult<()> {
        let reply = self.conn.send(vm::suspend()).await?;
        vm::void_reply(&reply)?;
        self.suspend_depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// One VM-wide resume. Resuming fewer times than suspended leaves the
    /// target parked.
    pub async fn resume(&self) -> JdwpResult<()> {
        let reply = self.conn.send(vm::resume()).await?;
        vm::void_reply(&reply)?;
        self.suspend_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| Some(d.max(1) - 1))
            .ok();
        Ok(())
    }

    pub fn suspend_depth(&self) -> i32 {
        self.suspend_depth.load(Ordering::SeqCst)
    }

    pub async fn dispose(&self) -> JdwpResult<()> {
        let reply = self.conn.send(vm::dispose()).await?;
        vm::void_reply(&reply)
    }

    // ---- object/value mirrors ----

    /// Allocate a string in the target VM (needed to write scalar values).
    pub async fn create_string(&self, value: &str) -> JdwpResult<StringId> {
        let reply = self.conn.send(vm::create_string(value)).await?;
        vm::create_string_reply(&reply, &self.id_sizes)
    }

    pub async fn string_value(&self, string_id: StringId) -> JdwpResult<String> {
        let reply = self
            .conn
            .send(string::value(string_id, &self.id_sizes))
            .await?;
        string::value_reply(&reply)
    }

    pub async fn object_reference_type(&self, object_id: ObjectId) -> JdwpResult<ReferenceTypeId> {
        let reply = self
            .conn
            .send(object::reference_type(object_id, &self.id_sizes))
            .await?;
        object::reference_type_reply(&reply, &self.id_sizes)
    }

    /// One instance field value per round trip.
    pub async fn object_field(&self, object_id: ObjectId, field_id: FieldId) -> JdwpResult<Value> {
        let reply = self
            .conn
            .send(object::get_values(object_id, field_id, &self.id_sizes))
            .await?;
        object::get_values_reply(&reply, &self.id_sizes)
    }

    pub async fn set_object_field(
        &self,
        object_id: ObjectId,
        field_id: FieldId,
        value: &Value,
    ) -> JdwpResult<()> {
        let reply = self
            .conn
            .send(object::set_values(object_id, field_id, value, &self.id_sizes))
            .await?;
        object::set_values_reply(&reply)
    }

    /// One static field value per round trip.
    pub async fn static_field(
        &self,
        class_id: ReferenceTypeId,
        field_id: FieldId,
    ) -> JdwpResult<Value> {
        let reply = self
            .conn
            .send(reftype::get_values(class_id, field_id, &self.id_sizes))
            .await?;
        reftype::get_values_reply(&reply, &self.id_sizes)
    }

    /// One local slot value in a suspended frame.
    pub async fn frame_slot(
        &self,
        thread_id: ThreadId,
        frame_id: FrameId,
        slot: i32,
        sig_byte: u8,
    ) -> JdwpResult<Value> {
        let reply = self
            .conn
            .send(stackframe::get_values(
                thread_id,
                frame_id,
                slot,
                sig_byte,
                &self.id_sizes,
            ))
            .await?;
        stackframe::get_values_reply(&reply, &self.id_sizes)
    }
}
