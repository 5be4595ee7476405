use crate::convert::TrcCtfConverter;
use crate::error::{Error, Result};
use crate::types::MessageBatch;
use chrono::prelude::{DateTime, Utc};
use clap::Parser;
use ctf_graph::component::{SimpleSinkComponent, SourceComponent};
use ctf_graph::graph::{Graph, Interruptor};
use ctf_graph::message::Message;
use ctf_graph::mip::ComponentDescriptor;
use ctf_graph::status::FuncStatus;
use ctf_ir::interval::UnsignedIntegerRangeSet;
use ctf_ir::clock::ClockClass;
use ctf_ir::field_class::{
    ByteOrder, CharacterEncoding, DisplayBase, FieldClass, FieldClassKind, IntegerFieldClass,
    StructureFieldClass,
};
use ctf_ir::trace::{Packet, Stream, StreamClassRef, Trace, TraceClass};
use ctf_ir::tsdl;
use ctf_ir::validator::validate_all;
use ctf_ir::Value;
use std::{
    cell::Cell,
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
    rc::Rc,
};
use trace_recorder_parser::{
    streaming::event::{Event, EventCode, EventType, TrackingEventCounter},
    streaming::RecorderData,
    time::StreamingInstant,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod convert;
mod error;
mod events;
mod types;

/// Convert FreeRTOS trace-recorder traces to CTF
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    /// The CTF clock class name
    #[clap(long, default_value = "monotonic")]
    pub clock_name: String,

    /// The CTF trace name
    #[clap(long, default_value = "freertos")]
    pub trace_name: String,

    /// Output directory to write the trace's TSDL metadata to
    #[clap(short = 'o', long, default_value = "ctf_trace")]
    pub output: PathBuf,

    /// Path to the input trace recorder binary file (psf) to read
    pub input: PathBuf,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    match do_main() {
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
        Ok(()) => Ok(()),
    }
}

fn do_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let opts = Opts::parse();

    let interruptor = Interruptor::new();
    let intr_clone = interruptor.clone();
    ctrlc::set_handler(move || {
        if intr_clone.is_set() {
            let exit_code = if cfg!(target_family = "unix") { 130 } else { -1073741510 };
            std::process::exit(exit_code);
        }
        debug!("Shutdown signal received");
        intr_clone.set();
    })?;

    info!(input = %opts.input.display(), "Reading header info");
    let file = File::open(&opts.input)?;
    let mut reader = BufReader::new(file);
    let trd = RecorderData::find(&mut reader).map_err(|e| Error::TraceRecorder(e.to_string()))?;

    let (trace_class, stream_class) = build_stream_class(&opts, &trd)?;
    let converter = TrcCtfConverter::new(&stream_class)?;

    validate_all(&trace_class)?;
    trace_class.borrow().freeze();

    fs::create_dir_all(&opts.output)?;
    fs::write(opts.output.join("metadata.tsdl"), render_metadata(&stream_class))?;

    let trace = Rc::new(Trace::new(trace_class));
    let stream = Rc::new(Stream::new(trace, stream_class, 0));
    let packet = Rc::new(Packet::new(stream.clone()));

    let source = TraceRecorderSource {
        reader,
        trd,
        converter,
        stream,
        packet,
        first_event_observed: false,
        eof_reached: false,
        stream_is_open: false,
        time_rollover_tracker: StreamingInstant::zero(),
        event_counter_tracker: TrackingEventCounter::zero(),
    };

    let consumed = Rc::new(Cell::new(0u64));
    let consumed_clone = consumed.clone();
    let sink = SimpleSinkComponent::new(move |msg: Message| {
        consumed_clone.set(consumed_clone.get() + 1);
        debug!(message = ?msg, "consumed message");
        FuncStatus::Ok
    });

    let mut graph = Graph::new(source, sink, interruptor)?;
    graph.run()?;

    info!(messages = consumed.get(), "Done");

    Ok(())
}

/// Builds the trace class, clock class, and stream class metadata: the
/// common event context (event id/count/timer), the packet context
/// (cpu id), and the environment entries the original tool stamps onto
/// every converted trace.
fn build_stream_class(
    opts: &Opts,
    trd: &RecorderData,
) -> Result<(ctf_ir::trace::TraceClassRef, StreamClassRef)> {
    let trace_class = TraceClass::new();
    trace_class.borrow_mut().set_name(opts.trace_name.clone())?;
    set_trace_environment(&trace_class, opts, trd)?;

    let mut clock_class = ClockClass::new(trd.timestamp_info.timer_frequency.get_raw() as u64)?;
    clock_class.set_name(opts.clock_name.clone())?;
    clock_class.set_origin_is_unix_epoch(false)?;

    let stream_class = trace_class.borrow_mut().create_stream_class()?;
    stream_class
        .borrow_mut()
        .set_default_clock_class(Rc::new(clock_class))?;
    stream_class
        .borrow_mut()
        .set_supports_packets(true, false, false)?;
    stream_class
        .borrow_mut()
        .set_supports_discarded_packets(false, false)?;
    stream_class
        .borrow_mut()
        .set_supports_discarded_events(true, false)?;
    stream_class
        .borrow_mut()
        .set_event_common_context_field_class(event_common_context_field_class())?;
    stream_class
        .borrow_mut()
        .set_packet_context_field_class(packet_context_field_class())?;

    Ok((trace_class, stream_class))
}

fn u64_member(display_base: DisplayBase) -> ctf_ir::field_class::FieldClassRef {
    FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
        signed: false,
        width: 64,
        alignment: 8,
        display_base,
        encoding: CharacterEncoding::None,
        byte_order: ByteOrder::LittleEndian,
        mapped_clock_class: None,
    }))
}

fn event_common_context_field_class() -> ctf_ir::field_class::FieldClassRef {
    let mut s = StructureFieldClass::new();
    s.append_member("id", u64_member(DisplayBase::Hexadecimal)).unwrap();
    s.append_member("event_count", u64_member(DisplayBase::Decimal)).unwrap();
    s.append_member("timer", u64_member(DisplayBase::Decimal)).unwrap();
    FieldClass::new(FieldClassKind::Structure(s))
}

fn packet_context_field_class() -> ctf_ir::field_class::FieldClassRef {
    let mut s = StructureFieldClass::new();
    s.append_member("cpu_id", u64_member(DisplayBase::Decimal)).unwrap();
    FieldClass::new(FieldClassKind::Structure(s))
}

fn set_trace_environment(
    trace_class: &ctf_ir::trace::TraceClassRef,
    opts: &Opts,
    trd: &RecorderData,
) -> Result<()> {
    let now: DateTime<Utc> = Utc::now();
    let mut tc = trace_class.borrow_mut();
    tc.set_environment_entry("hostname", Value::String("trace-recorder".to_string()))?;
    tc.set_environment_entry("domain", Value::String("kernel".to_string()))?;
    tc.set_environment_entry("tracer_name", Value::String("lttng-modules".to_string()))?;
    tc.set_environment_entry("tracer_major", Value::SignedInteger(2))?;
    tc.set_environment_entry("tracer_minor", Value::SignedInteger(12))?;
    tc.set_environment_entry("tracer_patchlevel", Value::SignedInteger(5))?;
    tc.set_environment_entry("trace_buffering_scheme", Value::String("global".to_string()))?;
    tc.set_environment_entry(
        "trc_endianness",
        Value::String(trd.header.endianness.to_string()),
    )?;
    tc.set_environment_entry(
        "trc_format_version",
        Value::SignedInteger(trd.header.format_version.into()),
    )?;
    tc.set_environment_entry(
        "trc_kernel_version",
        Value::String(format!("{:X?}", trd.header.kernel_version)),
    )?;
    tc.set_environment_entry(
        "trc_kernel_port",
        Value::String(trd.header.kernel_port.to_string()),
    )?;
    tc.set_environment_entry(
        "trc_platform_cfg",
        Value::String(trd.header.platform_cfg.to_string()),
    )?;
    tc.set_environment_entry(
        "trc_platform_cfg_version",
        Value::String(trd.header.platform_cfg_version.to_string()),
    )?;
    tc.set_environment_entry(
        "input_file",
        Value::String(
            opts.input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
    )?;
    tc.set_environment_entry(
        "trace_creation_datetime",
        Value::String(now.format("%Y%m%dT%H%M%S+0000").to_string()),
    )?;
    tc.set_environment_entry("trace_creation_datetime_utc", Value::String(now.to_string()))?;
    Ok(())
}

/// Renders every event class's payload as TSDL, prefixed by its name --
/// a plain-text stand-in for a full `.tsdl`/CTF metadata stream (binary
/// metadata packetization is out of scope).
fn render_metadata(stream_class: &StreamClassRef) -> String {
    let sc = stream_class.borrow();
    let mut out = String::new();
    for ec in sc.event_classes() {
        let ec = ec.borrow();
        let name = ec.name().unwrap_or("<unnamed>");
        out.push_str(&format!("event {{\n    name = {name};\n"));
        if let Some(fc) = ec.payload_field_class() {
            out.push_str(&format!("    fields := {};\n", tsdl::to_tsdl(fc)));
        }
        out.push_str("};\n\n");
    }
    out
}

/// Pulls trace-recorder events off the reader and converts each to one
/// or more graph messages. Ported from the original's
/// `SourcePluginHandler::iterator_next`, generalized from a babeltrace2
/// plugin callback to a plain [`SourceComponent`].
struct TraceRecorderSource {
    reader: BufReader<File>,
    trd: RecorderData,
    converter: TrcCtfConverter,
    stream: Rc<Stream>,
    packet: Rc<Packet>,
    first_event_observed: bool,
    eof_reached: bool,
    stream_is_open: bool,
    time_rollover_tracker: StreamingInstant,
    event_counter_tracker: TrackingEventCounter,
}

impl TraceRecorderSource {
    fn read_event(&mut self) -> Result<Option<(EventCode, Event)>> {
        if self.eof_reached {
            return Ok(None);
        }

        match self.trd.read_event(&mut self.reader) {
            Ok(Some(ev)) => Ok(Some(ev)),
            Ok(None) => Ok(None),
            Err(e) => {
                use trace_recorder_parser::streaming::Error as TrcError;
                match e {
                    TrcError::TraceRestarted(psf_start_word_endianness) => {
                        warn!("Detected a restarted trace stream");
                        self.trd = RecorderData::read_with_endianness(
                            psf_start_word_endianness,
                            &mut self.reader,
                        )
                        .map_err(|e| Error::TraceRecorder(e.to_string()))?;
                        self.first_event_observed = false;
                        Ok(None)
                    }
                    _ => {
                        warn!(%e, "Data error");
                        Ok(None)
                    }
                }
            }
        }
    }

    fn process_event(
        &mut self,
        event_code: EventCode,
        event: Event,
        batch: &mut MessageBatch,
    ) -> Result<()> {
        let event_type = event_code.event_type();

        let dropped_events = if !self.first_event_observed {
            self.first_event_observed = true;
            if event_type != EventType::TraceStart {
                warn!(%event_type, "First event should be TRACE_START");
            }
            self.event_counter_tracker.set_initial_count(event.event_count());
            self.time_rollover_tracker = StreamingInstant::new(
                event.timestamp().ticks() as u32,
                self.trd.timestamp_info.timer_wraparounds,
            );
            None
        } else {
            self.event_counter_tracker.update(event.event_count())
        };

        if let Some(dropped_events) = dropped_events {
            warn!(event_count = %event.event_count(), dropped_events, "Detected dropped events");
            let mut msg = Message::discarded_events(&self.stream, None)?;
            msg.set_discarded_count(dropped_events)?;
            batch.push(msg);
        }

        self.converter.convert(event_code, event, batch)?;
        Ok(())
    }
}

impl SourceComponent for TraceRecorderSource {
    fn next(&mut self, buf: &mut Vec<Message>) -> FuncStatus {
        let mut batch = MessageBatch::new(self.stream.clone(), self.packet.clone());

        let status = match self.read_event() {
            Err(e) => {
                error!("{e}");
                FuncStatus::Error
            }
            Ok(Some((event_code, event))) => {
                if !self.stream_is_open {
                    debug!("Opening stream");
                    self.stream_is_open = true;
                    batch.push(Message::stream_beginning(&self.stream));
                    match Message::packet_beginning(&self.packet, None) {
                        Ok(msg) => batch.push(msg),
                        Err(e) => {
                            error!("{e}");
                            return FuncStatus::Error;
                        }
                    }
                }

                if let Err(e) = self.process_event(event_code, event, &mut batch) {
                    error!("{e}");
                    return FuncStatus::Error;
                }

                FuncStatus::Ok
            }
            Ok(None) => {
                if self.stream_is_open && !self.first_event_observed {
                    // Trace restart condition.
                    FuncStatus::Again
                } else if self.eof_reached {
                    FuncStatus::End
                } else {
                    debug!("End of file reached");
                    self.eof_reached = true;
                    match Message::packet_end(&self.packet, None) {
                        Ok(msg) => batch.push(msg),
                        Err(e) => {
                            error!("{e}");
                            return FuncStatus::Error;
                        }
                    }
                    batch.push(Message::stream_end(&self.stream));
                    FuncStatus::Ok
                }
            }
        };

        buf.extend(batch.into_messages());
        status
    }
}

impl ComponentDescriptor for TraceRecorderSource {
    fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
        if range_set.add_range(0, 0).is_err() {
            return FuncStatus::Error;
        }
        FuncStatus::Ok
    }
}
