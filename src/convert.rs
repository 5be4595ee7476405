use crate::error::Result;
use crate::events::*;
use crate::types::{Context, MessageBatch};
use ctf_graph::message::Message;
use ctf_ir::trace::{EventClassRef, StreamClassRef};
use std::collections::{hash_map::Entry, HashMap};
use trace_recorder_parser::{streaming::event::*, time::Timestamp, types::*};
use tracing::warn;

/// Converts trace-recorder events to CTF event messages against a fixed
/// stream class, mirroring the original converter's event-class cache and
/// running task/ISR context tracking. Unlike the original, no field
/// *values* are set on the messages it produces (out of scope) -- its job
/// ends at picking the right event class and clock value per event.
pub struct TrcCtfConverter {
    unknown_event_class: EventClassRef,
    user_event_class: EventClassRef,
    sched_switch_event_class: EventClassRef,
    irq_handler_entry_event_class: EventClassRef,
    irq_handler_exit_event_class: EventClassRef,
    sched_wakeup_event_class: EventClassRef,
    event_classes: HashMap<EventType, EventClassRef>,
    active_context: Context,
    pending_isrs: Vec<Context>,
}

impl TrcCtfConverter {
    /// Creates the small set of event classes known upfront; the rest
    /// (`TRACE_START` and unrecognized event types) are created on first
    /// use via [`Self::event_class`].
    pub fn new(stream_class: &StreamClassRef) -> Result<Self> {
        Ok(Self {
            unknown_event_class: Unknown::event_class(stream_class)?,
            user_event_class: User::event_class(stream_class)?,
            sched_switch_event_class: SchedSwitch::event_class(stream_class)?,
            irq_handler_entry_event_class: IrqHandlerEntry::event_class(stream_class)?,
            irq_handler_exit_event_class: IrqHandlerExit::event_class(stream_class)?,
            sched_wakeup_event_class: SchedWakeup::event_class(stream_class)?,
            event_classes: HashMap::new(),
            active_context: Context {
                handle: ObjectHandle::NO_TASK,
                name: STARTUP_TASK_NAME.to_string().into(),
                priority: 0_u32.into(),
            },
            pending_isrs: Vec::new(),
        })
    }

    fn event_class<F>(
        &mut self,
        stream_class: &StreamClassRef,
        event_type: EventType,
        f: F,
    ) -> Result<EventClassRef>
    where
        F: FnOnce(&StreamClassRef) -> ctf_ir::Result<EventClassRef>,
    {
        let event_class_ref = match self.event_classes.entry(event_type) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => {
                let event_class = f(stream_class)?;
                v.insert(event_class)
            }
        };
        Ok(event_class_ref.clone())
    }

    fn emit(
        &self,
        event_class: &EventClassRef,
        raw_timestamp: Timestamp,
        batch: &mut MessageBatch,
    ) -> Result<()> {
        let msg = Message::event(
            event_class,
            batch.stream(),
            Some(batch.packet()),
            Some(raw_timestamp.ticks()),
        )?;
        batch.push(msg);
        Ok(())
    }

    pub fn convert(
        &mut self,
        event_code: EventCode,
        event: Event,
        batch: &mut MessageBatch,
    ) -> Result<()> {
        let event_type = event_code.event_type();
        let raw_timestamp = event.timestamp();
        let stream_class = batch.stream().class.clone();

        match event {
            Event::TraceStart(_) => {
                let event_class =
                    self.event_class(&stream_class, event_type, TraceStart::event_class)?;
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            Event::Unknown(_) => {
                let event_class = self.unknown_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            Event::User(_) => {
                let event_class = self.user_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            Event::TaskReady(_) => {
                let event_class = self.sched_wakeup_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            Event::TaskResume(ev) | Event::TaskActivate(ev) => {
                // Check for return from ISR.
                if self.pending_isrs.pop().is_some() {
                    // TODO should sched_switch be created if on the same context?
                    // depends on the arg given to xTraceISREnd(arg)
                    let event_class = self.irq_handler_exit_event_class.clone();
                    self.emit(&event_class, raw_timestamp, batch)?;
                }

                let event_class = self.sched_switch_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
                self.active_context = Context::from(ev);
            }

            Event::IsrBegin(ev) => {
                self.pending_isrs.push(Context {
                    handle: ev.handle,
                    name: ev.name.clone(),
                    priority: ev.priority,
                });
                let event_class = self.irq_handler_entry_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            // Return to the interrupted ISR (nested ISR).
            Event::IsrResume(ev) if !self.pending_isrs.is_empty() => {
                let ctx = self.pending_isrs.pop().unwrap();
                let previous_isr = self.pending_isrs.last();
                let previous_ctx = Context::from(ev);
                assert_eq!(Some(&previous_ctx), previous_isr);
                let _ = ctx;

                let event_class = self.irq_handler_exit_event_class.clone();
                self.emit(&event_class, raw_timestamp, batch)?;
            }

            // The rest are named events with no payload.
            _ => {
                if let Event::IsrResume(ref ev) = event {
                    warn!(%event_type, event = %ev, "Got ISR resume but no pending ISR");
                }

                let event_class = self.event_class(&stream_class, event_type, |sc| {
                    Unsupported::event_class(event_type, sc)
                })?;
                self.emit(&event_class, raw_timestamp, batch)?;
            }
        }

        Ok(())
    }
}
