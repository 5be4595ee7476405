//! Component and message-iterator classes (spec §3.6/§4.4), ported from
//! `graph/component-class.c`, `graph/message-iterator-class.c`, and
//! `graph/component-class-sink-simple.c`.
//!
//! The original reaches each method (`initialize`, `next`, `consume`,
//! `finalize`, `query`, port-connected, `seek_*`, ...) through a
//! function-pointer vtable set one field at a time on a
//! `bt_component_class_{source,filter,sink}` plus its
//! `bt_message_iterator_class`. Here each kind is a plain trait
//! (`SourceComponent`/`FilterComponent`/`SinkComponent`) implemented on
//! whatever type holds the component's private data; the message-iterator
//! class's methods (`next`, `seek_beginning`/`can_seek_beginning`,
//! `seek_ns_from_origin`/`can_seek_ns_from_origin`) live directly on
//! `SourceComponent`/`FilterComponent` rather than a second trait, since
//! every source/filter in this library owns exactly one iterator. A
//! `Box<dyn Trait>` stands in for the vtable + opaque data pointer pair.

use crate::message::Message;
use crate::mip::ComponentDescriptor;
use crate::status::FuncStatus;
use ctf_ir::interval::UnsignedIntegerRangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentClassType {
    Source,
    Filter,
    Sink,
}

/// A named port on a component, exposed by [`crate::graph::Graph::ports`].
///
/// The graph wires components in a single fixed linear chain (source →
/// filters in order → sink), so there is exactly one output port per
/// source/filter and one input port per filter/sink — unlike the
/// original's arbitrary port-graph wiring, which this library doesn't
/// need since it has no plugin loader building graphs from user-supplied
/// topology (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// A source component: produces messages, has no input port.
///
/// Mirrors `bt_message_iterator_class`'s `next` method plus
/// `bt_component_class_source`'s `initialize`/`finalize`.
pub trait SourceComponent {
    fn initialize(&mut self) -> FuncStatus {
        FuncStatus::Ok
    }

    /// Pulls the next batch of messages into `buf` (cleared by the
    /// caller before the call), matching spec §4.5.2's
    /// `next(buffer, capacity)` contract. Returning `FuncStatus::End`
    /// tells the graph this iterator is exhausted.
    fn next(&mut self, buf: &mut Vec<Message>) -> FuncStatus;

    fn finalize(&mut self) {}

    /// Called once the graph has connected this component's output port.
    fn port_connected(&mut self) {}

    /// Answers a query by name; unsupported by default.
    fn query(&self, _name: &str) -> FuncStatus {
        FuncStatus::UnknownObject
    }

    fn can_seek_beginning(&self) -> bool {
        false
    }

    fn seek_beginning(&mut self) -> FuncStatus {
        FuncStatus::UnknownObject
    }

    fn can_seek_ns_from_origin(&self, _ns_from_origin: i64) -> bool {
        false
    }

    fn seek_ns_from_origin(&mut self, _ns_from_origin: i64) -> FuncStatus {
        FuncStatus::UnknownObject
    }
}

/// A filter component: consumes from upstream and re-emits, possibly
/// transformed.
pub trait FilterComponent {
    fn initialize(&mut self) -> FuncStatus {
        FuncStatus::Ok
    }

    /// Processes one upstream message into `buf` (cleared by the caller
    /// before the call); see [`SourceComponent::next`].
    fn next(&mut self, upstream: Message, buf: &mut Vec<Message>) -> FuncStatus;

    fn finalize(&mut self) {}

    /// Called once the graph has connected both of this component's
    /// ports.
    fn port_connected(&mut self) {}

    fn query(&self, _name: &str) -> FuncStatus {
        FuncStatus::UnknownObject
    }

    fn can_seek_beginning(&self) -> bool {
        false
    }

    fn seek_beginning(&mut self) -> FuncStatus {
        FuncStatus::UnknownObject
    }

    fn can_seek_ns_from_origin(&self, _ns_from_origin: i64) -> bool {
        false
    }

    fn seek_ns_from_origin(&mut self, _ns_from_origin: i64) -> FuncStatus {
        FuncStatus::UnknownObject
    }
}

/// A sink component: consumes messages, produces none.
///
/// Ported from `component-class-sink-simple.c`'s three-closure shape
/// (`init_func`/`consume_func`/`finalize_func`), generalized to a trait so
/// a sink can hold arbitrary state instead of one `void *user_data` blob.
pub trait SinkComponent {
    fn initialize(&mut self) -> FuncStatus {
        FuncStatus::Ok
    }

    /// Called once the graph has connected this sink's input port,
    /// mirroring `simple_sink_graph_is_configured`'s message-iterator
    /// creation step.
    fn graph_is_configured(&mut self) -> FuncStatus {
        FuncStatus::Ok
    }

    fn consume(&mut self, message: Message) -> FuncStatus;

    fn finalize(&mut self) {}

    fn port_connected(&mut self) {}

    fn query(&self, _name: &str) -> FuncStatus {
        FuncStatus::UnknownObject
    }
}

/// Blanket object-safe bundle of [`FilterComponent`] and
/// [`ComponentDescriptor`], letting [`crate::graph::Graph`] hold a
/// heterogeneous chain of filters while still negotiating MIP versions
/// (§4.5.1) across the whole pipeline at construction time.
pub trait FilterComponentClass: FilterComponent + ComponentDescriptor {}
impl<T: FilterComponent + ComponentDescriptor> FilterComponentClass for T {}

/// A simple sink built directly from closures, ported from
/// `bt_component_class_sink_simple_borrow`'s single shared instance —
/// here there's one value per construction instead of a process-wide
/// singleton, since Rust has no need to intern it.
pub struct SimpleSinkComponent<F>
where
    F: FnMut(Message) -> FuncStatus,
{
    consume_fn: F,
}

impl<F> SimpleSinkComponent<F>
where
    F: FnMut(Message) -> FuncStatus,
{
    pub fn new(consume_fn: F) -> Self {
        Self { consume_fn }
    }
}

impl<F> SinkComponent for SimpleSinkComponent<F>
where
    F: FnMut(Message) -> FuncStatus,
{
    fn consume(&mut self, message: Message) -> FuncStatus {
        (self.consume_fn)(message)
    }
}

impl<F> ComponentDescriptor for SimpleSinkComponent<F>
where
    F: FnMut(Message) -> FuncStatus,
{
    fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
        supports_mip_zero_only(range_set)
    }
}

/// Shared by every built-in component descriptor: this library implements
/// MIP version 0 only (spec §4.5.1).
pub(crate) fn supports_mip_zero_only(range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
    if range_set.add_range(0, 0).is_err() {
        return FuncStatus::Error;
    }
    FuncStatus::Ok
}

/// A component class's static metadata, ported from the common fields of
/// `bt_component_class` (`name`/`description`/`help`/`plugin_name`/`type`).
#[derive(Debug, Clone)]
pub struct ComponentClass {
    pub kind: ComponentClassType,
    pub name: String,
    pub description: Option<String>,
    pub help: Option<String>,
    pub plugin_name: Option<String>,
}

impl ComponentClass {
    pub fn new(kind: ComponentClassType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            help: None,
            plugin_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl ComponentDescriptor for ComponentClass {
    /// Supports MIP version 0 only, matching every component class in
    /// this library (spec §3.6 carries no MIP extension points).
    fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
        supports_mip_zero_only(range_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_ir::trace::{Stream, Trace, TraceClass};
    use std::rc::Rc;

    fn dummy_stream() -> Rc<Stream> {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let trace = Rc::new(Trace::new(tc));
        Rc::new(Stream::new(trace, sc, 0))
    }

    #[test]
    fn simple_sink_forwards_to_closure() {
        let mut seen = Vec::new();
        {
            let mut sink = SimpleSinkComponent::new(|msg: Message| {
                seen.push(format!("{:?}", msg));
                FuncStatus::Ok
            });
            let stream = dummy_stream();
            let status = sink.consume(Message::stream_beginning(&stream));
            assert_eq!(status, FuncStatus::Ok);
        }
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn component_class_supports_mip_zero() {
        let cc = ComponentClass::new(ComponentClassType::Source, "test-source");
        let mut range_set = UnsignedIntegerRangeSet::new();
        assert_eq!(cc.supported_mip_versions(&mut range_set), FuncStatus::Ok);
        assert!(range_set.contains(0));
    }
}
