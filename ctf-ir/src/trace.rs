//! Trace/stream/event class hierarchy and their instances (spec §3.5).
//!
//! Mirrors the object model of `field_class.rs`: `Rc<RefCell<_>>` handles,
//! a `Cell<bool>` freeze bit, and deep freeze propagation down the
//! trace → stream → event class chain.

use crate::clock::ClockClass;
use crate::field_class::FieldClassRef;
use crate::value::Value;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

/// Event severity, matching the standard CTF/LTTng log level scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    DebugSystem,
    DebugProgram,
    DebugProcess,
    DebugModule,
    DebugUnit,
    DebugFunction,
    DebugLine,
    Debug,
}

pub type EventClassRef = Rc<std::cell::RefCell<EventClass>>;

#[derive(Debug)]
pub struct EventClass {
    id: u64,
    name: Option<String>,
    log_level: Option<LogLevel>,
    emf_uri: Option<String>,
    specific_context_field_class: Option<FieldClassRef>,
    payload_field_class: Option<FieldClassRef>,
    frozen: Cell<bool>,
}

impl EventClass {
    pub(crate) fn new(id: u64) -> EventClassRef {
        Rc::new(std::cell::RefCell::new(Self {
            id,
            name: None,
            log_level: None,
            emf_uri: None,
            specific_context_field_class: None,
            payload_field_class: None,
            frozen: Cell::new(false),
        }))
    }

    fn check_mut(&self) -> Result<()> {
        if self.frozen.get() {
            Err(Error::Frozen("event class".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        self.name = Some(name.into());
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_log_level(&mut self, log_level: LogLevel) -> Result<()> {
        self.check_mut()?;
        self.log_level = Some(log_level);
        Ok(())
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    pub fn set_emf_uri(&mut self, uri: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        self.emf_uri = Some(uri.into());
        Ok(())
    }

    pub fn emf_uri(&self) -> Option<&str> {
        self.emf_uri.as_deref()
    }

    pub fn set_specific_context_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.specific_context_field_class = Some(fc);
        Ok(())
    }

    pub fn specific_context_field_class(&self) -> Option<&FieldClassRef> {
        self.specific_context_field_class.as_ref()
    }

    pub fn set_payload_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.payload_field_class = Some(fc);
        Ok(())
    }

    pub fn payload_field_class(&self) -> Option<&FieldClassRef> {
        self.payload_field_class.as_ref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Freezes this event class's specific-context and payload classes.
    pub(crate) fn freeze(&self) {
        if self.frozen.get() {
            return;
        }
        self.frozen.set(true);
        if let Some(fc) = &self.specific_context_field_class {
            fc.borrow().freeze();
        }
        if let Some(fc) = &self.payload_field_class {
            fc.borrow().freeze();
        }
    }
}

pub type StreamClassRef = Rc<std::cell::RefCell<StreamClass>>;

#[derive(Debug)]
pub struct StreamClass {
    id: u64,
    name: Option<String>,
    packet_context_field_class: Option<FieldClassRef>,
    event_header_field_class: Option<FieldClassRef>,
    event_common_context_field_class: Option<FieldClassRef>,
    default_clock_class: Option<Rc<ClockClass>>,
    pub supports_packets: bool,
    pub packets_have_begin_cs: bool,
    pub packets_have_end_cs: bool,
    pub supports_discarded_events: bool,
    pub discarded_events_have_cs: bool,
    pub supports_discarded_packets: bool,
    pub discarded_packets_have_cs: bool,
    event_classes: Vec<EventClassRef>,
    next_event_class_id: u64,
    frozen: Cell<bool>,
}

impl StreamClass {
    pub(crate) fn new(id: u64) -> StreamClassRef {
        Rc::new(std::cell::RefCell::new(Self {
            id,
            name: None,
            packet_context_field_class: None,
            event_header_field_class: None,
            event_common_context_field_class: None,
            default_clock_class: None,
            supports_packets: false,
            packets_have_begin_cs: false,
            packets_have_end_cs: false,
            supports_discarded_events: false,
            discarded_events_have_cs: false,
            supports_discarded_packets: false,
            discarded_packets_have_cs: false,
            event_classes: Vec::new(),
            next_event_class_id: 0,
            frozen: Cell::new(false),
        }))
    }

    fn check_mut(&self) -> Result<()> {
        if self.frozen.get() {
            Err(Error::Frozen("stream class".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        self.name = Some(name.into());
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_packet_context_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.packet_context_field_class = Some(fc);
        Ok(())
    }

    pub fn packet_context_field_class(&self) -> Option<&FieldClassRef> {
        self.packet_context_field_class.as_ref()
    }

    pub fn set_event_header_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.event_header_field_class = Some(fc);
        Ok(())
    }

    pub fn event_header_field_class(&self) -> Option<&FieldClassRef> {
        self.event_header_field_class.as_ref()
    }

    pub fn set_event_common_context_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.event_common_context_field_class = Some(fc);
        Ok(())
    }

    pub fn event_common_context_field_class(&self) -> Option<&FieldClassRef> {
        self.event_common_context_field_class.as_ref()
    }

    pub fn set_default_clock_class(&mut self, cc: Rc<ClockClass>) -> Result<()> {
        self.check_mut()?;
        self.default_clock_class = Some(cc);
        Ok(())
    }

    pub fn default_clock_class(&self) -> Option<&Rc<ClockClass>> {
        self.default_clock_class.as_ref()
    }

    pub fn set_supports_packets(&mut self, supports: bool, with_begin_cs: bool, with_end_cs: bool) -> Result<()> {
        self.check_mut()?;
        self.supports_packets = supports;
        self.packets_have_begin_cs = supports && with_begin_cs;
        self.packets_have_end_cs = supports && with_end_cs;
        Ok(())
    }

    pub fn set_supports_discarded_events(&mut self, supports: bool, with_cs: bool) -> Result<()> {
        self.check_mut()?;
        self.supports_discarded_events = supports;
        self.discarded_events_have_cs = supports && with_cs;
        Ok(())
    }

    pub fn set_supports_discarded_packets(&mut self, supports: bool, with_cs: bool) -> Result<()> {
        self.check_mut()?;
        self.supports_discarded_packets = supports;
        self.discarded_packets_have_cs = supports && with_cs;
        Ok(())
    }

    pub fn create_event_class(&mut self) -> Result<EventClassRef> {
        self.check_mut()?;
        let id = self.next_event_class_id;
        self.next_event_class_id += 1;
        let ec = EventClass::new(id);
        self.event_classes.push(ec.clone());
        Ok(ec)
    }

    pub fn event_classes(&self) -> &[EventClassRef] {
        &self.event_classes
    }

    pub fn event_class_by_id(&self, id: u64) -> Option<&EventClassRef> {
        self.event_classes.iter().find(|ec| ec.borrow().id == id)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Freezes this stream class's event classes, packet-context class,
    /// event-common-context class, and default clock class (spec §3.1).
    pub(crate) fn freeze(&self) {
        if self.frozen.get() {
            return;
        }
        self.frozen.set(true);
        for ec in &self.event_classes {
            ec.borrow().freeze();
        }
        if let Some(fc) = &self.packet_context_field_class {
            fc.borrow().freeze();
        }
        if let Some(fc) = &self.event_header_field_class {
            fc.borrow().freeze();
        }
        if let Some(fc) = &self.event_common_context_field_class {
            fc.borrow().freeze();
        }
        if let Some(cc) = &self.default_clock_class {
            cc.freeze();
        }
    }
}

pub type TraceClassRef = Rc<std::cell::RefCell<TraceClass>>;

#[derive(Debug)]
pub struct TraceClass {
    name: Option<String>,
    uuid: Option<Uuid>,
    packet_header_field_class: Option<FieldClassRef>,
    environment: IndexMap<String, Value>,
    user_attributes: IndexMap<String, Value>,
    stream_classes: Vec<StreamClassRef>,
    next_stream_class_id: u64,
    frozen: Cell<bool>,
}

impl TraceClass {
    pub fn new() -> TraceClassRef {
        Rc::new(std::cell::RefCell::new(Self {
            name: None,
            uuid: None,
            packet_header_field_class: None,
            environment: IndexMap::new(),
            user_attributes: IndexMap::new(),
            stream_classes: Vec::new(),
            next_stream_class_id: 0,
            frozen: Cell::new(false),
        }))
    }

    fn check_mut(&self) -> Result<()> {
        if self.frozen.get() {
            Err(Error::Frozen("trace class".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        self.name = Some(name.into());
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<()> {
        self.check_mut()?;
        self.uuid = Some(uuid);
        Ok(())
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn set_packet_header_field_class(&mut self, fc: FieldClassRef) -> Result<()> {
        self.check_mut()?;
        self.packet_header_field_class = Some(fc);
        Ok(())
    }

    pub fn packet_header_field_class(&self) -> Option<&FieldClassRef> {
        self.packet_header_field_class.as_ref()
    }

    /// Sets (or overwrites) a single environment entry. Environment values
    /// are restricted to integers, reals, and strings, matching the TSDL
    /// `env` block grammar.
    pub fn set_environment_entry(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.check_mut()?;
        match &value {
            Value::SignedInteger(_) | Value::UnsignedInteger(_) | Value::Real(_) | Value::String(_) => {}
            _ => {
                return Err(Error::InvalidFieldClass(
                    "trace class environment entries must be an integer, real, or string".to_string(),
                ))
            }
        }
        self.environment.insert(name.into(), value);
        Ok(())
    }

    pub fn environment(&self) -> &IndexMap<String, Value> {
        &self.environment
    }

    pub fn set_user_attribute(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        self.check_mut()?;
        self.user_attributes.insert(key.into(), value);
        Ok(())
    }

    pub fn user_attributes(&self) -> &IndexMap<String, Value> {
        &self.user_attributes
    }

    pub fn create_stream_class(&mut self) -> Result<StreamClassRef> {
        self.check_mut()?;
        let id = self.next_stream_class_id;
        self.next_stream_class_id += 1;
        let sc = StreamClass::new(id);
        self.stream_classes.push(sc.clone());
        Ok(sc)
    }

    pub fn stream_classes(&self) -> &[StreamClassRef] {
        &self.stream_classes
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<&StreamClassRef> {
        self.stream_classes.iter().find(|sc| sc.borrow().id == id)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn freeze(&self) {
        if self.frozen.get() {
            return;
        }
        self.frozen.set(true);
        if let Some(fc) = &self.packet_header_field_class {
            fc.borrow().freeze();
        }
        for sc in &self.stream_classes {
            sc.borrow().freeze();
        }
    }
}

/// A trace instance: a live, possibly-still-building trace bound to a
/// [`TraceClass`]. Field *values* are out of scope (spec Non-goals); only
/// the class back-reference and instance-level identity matter here.
#[derive(Debug, Clone)]
pub struct Trace {
    pub class: TraceClassRef,
    pub name: Option<String>,
    pub uuid: Option<Uuid>,
}

impl Trace {
    pub fn new(class: TraceClassRef) -> Self {
        Self {
            class,
            name: None,
            uuid: None,
        }
    }
}

/// A stream instance: `Trace` × `StreamClass`, identified by its id.
#[derive(Debug, Clone)]
pub struct Stream {
    pub trace: Rc<Trace>,
    pub class: StreamClassRef,
    pub id: u64,
}

impl Stream {
    pub fn new(trace: Rc<Trace>, class: StreamClassRef, id: u64) -> Self {
        Self { trace, class, id }
    }
}

/// A packet instance, optional per stream (spec §3.5).
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream: Rc<Stream>,
}

impl Packet {
    pub fn new(stream: Rc<Stream>) -> Self {
        Self { stream }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freezing_trace_class_freezes_stream_and_event_classes() {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let ec = sc.borrow_mut().create_event_class().unwrap();

        tc.borrow().freeze();

        assert!(tc.borrow().is_frozen());
        assert!(sc.borrow().is_frozen());
        assert!(ec.borrow().is_frozen());
    }

    #[test]
    fn mutating_frozen_trace_class_fails() {
        let tc = TraceClass::new();
        tc.borrow().freeze();
        assert!(matches!(
            tc.borrow_mut().set_name("x"),
            Err(Error::Frozen(_))
        ));
    }

    #[test]
    fn event_class_ids_are_assigned_in_creation_order() {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let e0 = sc.borrow_mut().create_event_class().unwrap();
        let e1 = sc.borrow_mut().create_event_class().unwrap();
        assert_eq!(e0.borrow().id(), 0);
        assert_eq!(e1.borrow().id(), 1);
    }

    #[test]
    fn environment_rejects_non_scalar_values() {
        let tc = TraceClass::new();
        let err = tc
            .borrow_mut()
            .set_environment_entry("bad", Value::Array(vec![]));
        assert!(err.is_err());
    }

    #[test]
    fn environment_accepts_scalars() {
        let tc = TraceClass::new();
        tc.borrow_mut()
            .set_environment_entry("hostname", Value::String("a".to_string()))
            .unwrap();
        tc.borrow_mut()
            .set_environment_entry("pid", Value::SignedInteger(42))
            .unwrap();
        assert_eq!(tc.borrow().environment().len(), 2);
    }
}
