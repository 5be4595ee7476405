//! The message graph: a source feeding zero or more filters feeding a
//! sink, pulled one step at a time.
//!
//! `graph.c` itself wasn't part of the retrieved source pack; this is
//! grounded on the pull-scheduling shape visible from the call site in
//! the CTF conversion pipeline's `main` loop (`pipeline.graph.run_once()`
//! checked against `RunStatus::End` in a `loop`), on
//! `component-class-sink-simple.c`'s `graph_is_configured` step, which
//! runs once before the first `consume`, and on `mip.c`'s negotiation
//! being a graph-construction-time step (§4.5.1).

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::component::{
    FilterComponentClass, Port, PortDirection, SinkComponent, SourceComponent,
};
use crate::message::Message;
use crate::mip::{greatest_operative_mip_version, ComponentDescriptor};
use crate::status::FuncStatus;
use crate::{Error, Result};
use ctf_ir::pool::ObjectPool;

/// A shared, cloneable shutdown flag, checked by the graph between pull
/// steps. Mirrors the `Interruptor` the conversion pipeline hands to a
/// `ctrlc` signal handler in the original tool's `main`.
#[derive(Debug, Clone, Default)]
pub struct Interruptor {
    flag: Arc<AtomicBool>,
}

impl Interruptor {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    End,
}

/// A graph: one source, zero or more filters in a fixed chain, one sink.
///
/// The struct stays generic over the source and sink types so the binary
/// crate's converter can plug in without `ctf-graph` depending on it;
/// filters are stored as trait objects since a chain may mix different
/// filter types.
pub struct Graph<S, K>
where
    S: SourceComponent,
    K: SinkComponent,
{
    source: S,
    filters: Vec<Box<dyn FilterComponentClass>>,
    sink: K,
    interruptor: Interruptor,
    configured: Cell<bool>,
    mip_version: u64,
    message_pool: ObjectPool<Vec<Message>>,
}

impl<S, K> Graph<S, K>
where
    S: SourceComponent + ComponentDescriptor,
    K: SinkComponent + ComponentDescriptor,
{
    /// Builds a graph with no filters between source and sink.
    pub fn new(source: S, sink: K, interruptor: Interruptor) -> Result<Self> {
        Self::new_with_filters(source, Vec::new(), sink, interruptor)
    }

    /// Builds a graph with a fixed filter chain between source and sink,
    /// negotiating the MIP version across the whole pipeline up front
    /// (spec §4.5.1) — this library supports only version 0, so
    /// negotiation fails if any component's descriptor excludes it.
    pub fn new_with_filters(
        source: S,
        filters: Vec<Box<dyn FilterComponentClass>>,
        sink: K,
        interruptor: Interruptor,
    ) -> Result<Self> {
        let mut descriptors: Vec<&dyn ComponentDescriptor> = Vec::with_capacity(filters.len() + 2);
        descriptors.push(&source);
        for filter in &filters {
            descriptors.push(filter.as_ref());
        }
        descriptors.push(&sink);
        let mip_version = greatest_operative_mip_version(descriptors)
            .map_err(|status| Error::InvalidGraph(format!("MIP negotiation failed: {status:?}")))?;

        Ok(Self {
            source,
            filters,
            sink,
            interruptor,
            configured: Cell::new(false),
            mip_version,
            message_pool: ObjectPool::new(Vec::new),
        })
    }

    pub fn mip_version(&self) -> u64 {
        self.mip_version
    }

    /// Describes the graph's fixed port wiring: one output port on the
    /// source, an input/output pair on each filter, one input port on the
    /// sink, connected in chain order.
    pub fn ports(&self) -> Vec<Port> {
        let mut ports = vec![Port {
            name: "source.out".to_string(),
            direction: PortDirection::Output,
        }];
        for (i, _) in self.filters.iter().enumerate() {
            ports.push(Port {
                name: format!("filter{i}.in"),
                direction: PortDirection::Input,
            });
            ports.push(Port {
                name: format!("filter{i}.out"),
                direction: PortDirection::Output,
            });
        }
        ports.push(Port {
            name: "sink.in".to_string(),
            direction: PortDirection::Input,
        });
        ports
    }

    fn ensure_configured(&mut self) -> Result<()> {
        if self.configured.get() {
            return Ok(());
        }
        let status = self.source.initialize();
        if !status.is_ok() {
            return Err(Error::InvalidGraph(format!(
                "source initialization failed: {status:?}"
            )));
        }
        for filter in &mut self.filters {
            let status = filter.initialize();
            if !status.is_ok() {
                return Err(Error::InvalidGraph(format!(
                    "filter initialization failed: {status:?}"
                )));
            }
        }
        let status = self.sink.initialize();
        if !status.is_ok() {
            return Err(Error::InvalidGraph(format!(
                "sink initialization failed: {status:?}"
            )));
        }

        self.source.port_connected();
        for filter in &mut self.filters {
            filter.port_connected();
        }
        self.sink.port_connected();

        let status = self.sink.graph_is_configured();
        if !status.is_ok() {
            return Err(Error::InvalidGraph(format!(
                "sink's graph-is-configured step failed: {status:?}"
            )));
        }
        self.configured.set(true);
        Ok(())
    }

    /// Runs one message batch through the filter chain, draining `batch`
    /// in place. Buffers are drawn from and returned to `self.message_pool`
    /// (the graph's message pool of spec §4.4, adapted to this crate's
    /// enum-valued `Message`: rather than recycling individual boxed
    /// message/event objects, the pool recycles the `Vec<Message>`
    /// allocations that carry them through the chain — see DESIGN.md).
    fn run_filters(&mut self, mut batch: Vec<Message>) -> Result<Vec<Message>> {
        for filter in &mut self.filters {
            let mut next_batch = self.message_pool.create();
            next_batch.clear();
            for message in batch.drain(..) {
                let status = filter.next(message, &mut next_batch);
                if !status.is_ok() {
                    self.message_pool.recycle(batch);
                    self.message_pool.recycle(next_batch);
                    return Err(Error::InvalidGraph(format!(
                        "filter returned unexpected status: {status:?}"
                    )));
                }
            }
            self.message_pool.recycle(batch);
            batch = next_batch;
        }
        Ok(batch)
    }

    /// Pulls one batch of messages from the source, runs it through the
    /// filter chain, and feeds the result to the sink in order. Returns
    /// `RunStatus::End` once the source is exhausted or the interruptor
    /// has been set.
    pub fn run_once(&mut self) -> Result<RunStatus> {
        self.ensure_configured()?;

        if self.interruptor.is_set() {
            debug!("graph interrupted, finalizing");
            self.source.finalize();
            for filter in &mut self.filters {
                filter.finalize();
            }
            self.sink.finalize();
            return Ok(RunStatus::End);
        }

        let mut buf = self.message_pool.create();
        buf.clear();
        let status = self.source.next(&mut buf);
        match status {
            FuncStatus::End => {
                self.message_pool.recycle(buf);
                self.source.finalize();
                for filter in &mut self.filters {
                    filter.finalize();
                }
                self.sink.finalize();
                Ok(RunStatus::End)
            }
            FuncStatus::Again => {
                self.message_pool.recycle(buf);
                Ok(RunStatus::Running)
            }
            FuncStatus::Ok => {
                let mut batch = self.run_filters(buf)?;
                for message in batch.drain(..) {
                    let status = self.sink.consume(message);
                    if !status.is_ok() {
                        self.message_pool.recycle(batch);
                        return Err(Error::InvalidGraph(format!(
                            "sink consume failed: {status:?}"
                        )));
                    }
                }
                self.message_pool.recycle(batch);
                Ok(RunStatus::Running)
            }
            other => {
                self.message_pool.recycle(buf);
                Err(Error::InvalidGraph(format!(
                    "source iterator returned unexpected status: {other:?}"
                )))
            }
        }
    }

    /// Runs until the source is exhausted or interrupted.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.run_once()? == RunStatus::End {
                return Ok(());
            }
        }
    }
}

/// Convenience alias used where a graph's sink is built from a bare
/// closure via [`crate::component::SimpleSinkComponent`].
pub type SimpleSinkGraph<S, F> = Graph<S, crate::component::SimpleSinkComponent<F>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use ctf_ir::trace::{Stream, Trace, TraceClass};

    fn dummy_stream() -> Rc<Stream> {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let trace = Rc::new(Trace::new(tc));
        Rc::new(Stream::new(trace, sc, 0))
    }

    struct CountingSource {
        remaining: u32,
        stream: Rc<Stream>,
    }

    impl SourceComponent for CountingSource {
        fn next(&mut self, buf: &mut Vec<Message>) -> FuncStatus {
            if self.remaining == 0 {
                return FuncStatus::End;
            }
            self.remaining -= 1;
            buf.push(Message::stream_beginning(&self.stream));
            FuncStatus::Ok
        }
    }

    impl ComponentDescriptor for CountingSource {
        fn supported_mip_versions(&self, range_set: &mut ctf_ir::interval::UnsignedIntegerRangeSet) -> FuncStatus {
            crate::component::supports_mip_zero_only(range_set)
        }
    }

    /// Doubles every stream-beginning message, to exercise the filter
    /// chain; everything else passes through unchanged.
    struct DoublingFilter;

    impl crate::component::FilterComponent for DoublingFilter {
        fn next(&mut self, upstream: Message, buf: &mut Vec<Message>) -> FuncStatus {
            buf.push(upstream.clone());
            buf.push(upstream);
            FuncStatus::Ok
        }
    }

    impl ComponentDescriptor for DoublingFilter {
        fn supported_mip_versions(&self, range_set: &mut ctf_ir::interval::UnsignedIntegerRangeSet) -> FuncStatus {
            crate::component::supports_mip_zero_only(range_set)
        }
    }

    #[test]
    fn runs_until_source_ends() {
        let stream = dummy_stream();
        let source = CountingSource {
            remaining: 3,
            stream,
        };
        let consumed = Rc::new(Cell::new(0u32));
        let consumed_clone = consumed.clone();
        let sink = crate::component::SimpleSinkComponent::new(move |_msg| {
            consumed_clone.set(consumed_clone.get() + 1);
            FuncStatus::Ok
        });
        let mut graph = Graph::new(source, sink, Interruptor::new()).unwrap();
        graph.run().unwrap();
        assert_eq!(consumed.get(), 3);
    }

    #[test]
    fn interruptor_stops_the_graph_early() {
        let stream = dummy_stream();
        let source = CountingSource {
            remaining: 1000,
            stream,
        };
        let sink = crate::component::SimpleSinkComponent::new(|_msg| FuncStatus::Ok);
        let intr = Interruptor::new();
        let mut graph = Graph::new(source, sink, intr.clone()).unwrap();
        intr.set();
        assert_eq!(graph.run_once().unwrap(), RunStatus::End);
    }

    #[test]
    fn filter_chain_transforms_messages_before_the_sink() {
        let stream = dummy_stream();
        let source = CountingSource {
            remaining: 2,
            stream,
        };
        let consumed = Rc::new(Cell::new(0u32));
        let consumed_clone = consumed.clone();
        let sink = crate::component::SimpleSinkComponent::new(move |_msg| {
            consumed_clone.set(consumed_clone.get() + 1);
            FuncStatus::Ok
        });
        let filters: Vec<Box<dyn crate::component::FilterComponentClass>> =
            vec![Box::new(DoublingFilter)];
        let mut graph =
            Graph::new_with_filters(source, filters, sink, Interruptor::new()).unwrap();
        graph.run().unwrap();
        // Each of the 2 source messages is doubled by the filter.
        assert_eq!(consumed.get(), 4);
    }

    #[test]
    fn mip_negotiation_rejects_a_descriptor_that_excludes_version_zero() {
        struct NoMipZero;
        impl SourceComponent for NoMipZero {
            fn next(&mut self, _buf: &mut Vec<Message>) -> FuncStatus {
                FuncStatus::End
            }
        }
        impl ComponentDescriptor for NoMipZero {
            fn supported_mip_versions(&self, range_set: &mut ctf_ir::interval::UnsignedIntegerRangeSet) -> FuncStatus {
                range_set.add_range(1, 1).unwrap();
                FuncStatus::Ok
            }
        }

        let sink = crate::component::SimpleSinkComponent::new(|_msg| FuncStatus::Ok);
        assert!(Graph::new(NoMipZero, sink, Interruptor::new()).is_err());
    }

    #[test]
    fn ports_describe_the_fixed_chain() {
        let stream = dummy_stream();
        let source = CountingSource {
            remaining: 0,
            stream,
        };
        let sink = crate::component::SimpleSinkComponent::new(|_msg| FuncStatus::Ok);
        let filters: Vec<Box<dyn crate::component::FilterComponentClass>> =
            vec![Box::new(DoublingFilter)];
        let graph = Graph::new_with_filters(source, filters, sink, Interruptor::new()).unwrap();
        let ports = graph.ports();
        assert_eq!(ports.len(), 4);
        assert_eq!(ports[0].name, "source.out");
        assert_eq!(ports.last().unwrap().name, "sink.in");
    }
}
