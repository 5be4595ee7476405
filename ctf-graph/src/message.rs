//! Graph messages (spec §3.6/§4.4), ported from `graph/message/event.c`,
//! `graph/message/discarded-items.c` and
//! `graph/message/message-iterator-inactivity.c`.
//!
//! Unlike the original's per-kind heap-allocated, pool-recycled structs
//! reached through a common `bt_message` base, messages here are a single
//! tagged `enum`: the kind tag and the payload are the same value, so
//! there's no separate type-check before a downcast.

use ctf_ir::clock::{ClockClass, ClockSnapshot};
use ctf_ir::trace::{EventClassRef, Packet, Stream};
use std::rc::Rc;

use crate::{Error, Result};

pub type StreamRef = Rc<Stream>;
pub type PacketRef = Rc<Packet>;

/// A default clock snapshot, present only when the owning stream class
/// enables it for this message kind.
pub type DefaultClockSnapshot = Option<ClockSnapshot>;

#[derive(Debug, Clone)]
pub enum Message {
    StreamBeginning {
        stream: StreamRef,
    },
    StreamEnd {
        stream: StreamRef,
    },
    PacketBeginning {
        packet: PacketRef,
        default_cs: DefaultClockSnapshot,
    },
    PacketEnd {
        packet: PacketRef,
        default_cs: DefaultClockSnapshot,
    },
    Event {
        event_class: EventClassRef,
        stream: StreamRef,
        packet: Option<PacketRef>,
        default_cs: DefaultClockSnapshot,
    },
    DiscardedEvents {
        stream: StreamRef,
        count: Option<u64>,
        default_begin_cs: DefaultClockSnapshot,
        default_end_cs: DefaultClockSnapshot,
    },
    DiscardedPackets {
        stream: StreamRef,
        count: Option<u64>,
        default_begin_cs: DefaultClockSnapshot,
        default_end_cs: DefaultClockSnapshot,
    },
    MessageIteratorInactivity {
        cs: ClockSnapshot,
    },
}

impl Message {
    /// Ported from `bt_message_event_create{,_with_packet}{,_and_default_clock_snapshot}`.
    ///
    /// `raw_value`'s presence and the stream class's default clock class
    /// must agree (`event.c`'s
    /// `with-default-clock-snapshot-if-stream-class-has-default-clock-class`
    /// precondition); `packet`, if given, must belong to `stream`.
    pub fn event(
        event_class: &EventClassRef,
        stream: &StreamRef,
        packet: Option<&PacketRef>,
        raw_value: Option<u64>,
    ) -> Result<Self> {
        let sc = stream.class.borrow();
        if raw_value.is_some() != sc.default_clock_class().is_some() {
            return Err(Error::InvalidMessage(
                "event message default clock snapshot presence must match stream class's default clock class".into(),
            ));
        }
        if let Some(p) = packet {
            if !Rc::ptr_eq(&p.stream, stream) {
                return Err(Error::InvalidMessage(
                    "packet's stream differs from the event's stream".into(),
                ));
            }
        }
        let default_cs = match (raw_value, sc.default_clock_class()) {
            (Some(v), Some(cc)) => Some(ClockSnapshot::new(cc.clone(), v)),
            _ => None,
        };
        drop(sc);
        Ok(Message::Event {
            event_class: event_class.clone(),
            stream: stream.clone(),
            packet: packet.cloned(),
            default_cs,
        })
    }

    pub fn stream_beginning(stream: &StreamRef) -> Self {
        Message::StreamBeginning {
            stream: stream.clone(),
        }
    }

    pub fn stream_end(stream: &StreamRef) -> Self {
        Message::StreamEnd {
            stream: stream.clone(),
        }
    }

    pub fn packet_beginning(packet: &PacketRef, raw_value: Option<u64>) -> Result<Self> {
        let default_cs = Self::packet_cs(packet, raw_value)?;
        Ok(Message::PacketBeginning {
            packet: packet.clone(),
            default_cs,
        })
    }

    pub fn packet_end(packet: &PacketRef, raw_value: Option<u64>) -> Result<Self> {
        let default_cs = Self::packet_cs(packet, raw_value)?;
        Ok(Message::PacketEnd {
            packet: packet.clone(),
            default_cs,
        })
    }

    fn packet_cs(packet: &PacketRef, raw_value: Option<u64>) -> Result<DefaultClockSnapshot> {
        let sc = packet.stream.class.borrow();
        if !sc.supports_packets {
            return Err(Error::InvalidMessage(
                "stream class does not support packets".into(),
            ));
        }
        match (raw_value, sc.default_clock_class()) {
            (Some(v), Some(cc)) => Ok(Some(ClockSnapshot::new(cc.clone(), v))),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidMessage(
                "packet message default clock snapshot presence must match stream class's default clock class".into(),
            )),
        }
    }

    /// Ported from `create_discarded_items_message`: the presence of
    /// `cs_range` must match whether the stream class requires default
    /// clock snapshots for this kind, and (when present) `begin <= end`.
    pub fn discarded_events(stream: &StreamRef, cs_range: Option<(u64, u64)>) -> Result<Self> {
        Self::discarded(stream, cs_range, true)
    }

    pub fn discarded_packets(stream: &StreamRef, cs_range: Option<(u64, u64)>) -> Result<Self> {
        Self::discarded(stream, cs_range, false)
    }

    fn discarded(stream: &StreamRef, cs_range: Option<(u64, u64)>, events: bool) -> Result<Self> {
        let sc = stream.class.borrow();
        let (has_support, need_cs) = if events {
            (sc.supports_discarded_events, sc.discarded_events_have_cs)
        } else {
            (sc.supports_discarded_packets, sc.discarded_packets_have_cs)
        };
        if !has_support {
            return Err(Error::InvalidMessage(
                "stream class does not support discarded events or packets".into(),
            ));
        }
        if need_cs != cs_range.is_some() {
            return Err(Error::InvalidMessage(
                "discarded items message default clock snapshot presence must match stream class configuration".into(),
            ));
        }
        let (default_begin_cs, default_end_cs) = match cs_range {
            Some((begin, end)) => {
                if begin > end {
                    return Err(Error::InvalidMessage(
                        "discarded items beginning clock snapshot is after the end one".into(),
                    ));
                }
                let cc = sc
                    .default_clock_class()
                    .expect("need_cs implies a default clock class")
                    .clone();
                (
                    Some(ClockSnapshot::new(cc.clone(), begin)),
                    Some(ClockSnapshot::new(cc, end)),
                )
            }
            None => (None, None),
        };
        drop(sc);
        let stream = stream.clone();
        let count = None;
        Ok(if events {
            Message::DiscardedEvents {
                stream,
                count,
                default_begin_cs,
                default_end_cs,
            }
        } else {
            Message::DiscardedPackets {
                stream,
                count,
                default_begin_cs,
                default_end_cs,
            }
        })
    }

    /// Sets the discarded item count; must be non-zero
    /// (`bt_message_discarded_{events,packets}_set_count`'s
    /// `"Discarded event count is 0."` precondition).
    pub fn set_discarded_count(&mut self, new_count: u64) -> Result<()> {
        if new_count == 0 {
            return Err(Error::InvalidMessage("discarded item count is 0".into()));
        }
        match self {
            Message::DiscardedEvents { count, .. } | Message::DiscardedPackets { count, .. } => {
                *count = Some(new_count);
                Ok(())
            }
            _ => Err(Error::InvalidMessage(
                "set_discarded_count called on a non-discarded-items message".into(),
            )),
        }
    }

    pub fn message_iterator_inactivity(clock_class: &Rc<ClockClass>, raw_value: u64) -> Self {
        Message::MessageIteratorInactivity {
            cs: ClockSnapshot::new(clock_class.clone(), raw_value),
        }
    }

    pub fn stream(&self) -> Option<&StreamRef> {
        match self {
            Message::StreamBeginning { stream }
            | Message::StreamEnd { stream }
            | Message::Event { stream, .. }
            | Message::DiscardedEvents { stream, .. }
            | Message::DiscardedPackets { stream, .. } => Some(stream),
            Message::PacketBeginning { packet, .. } | Message::PacketEnd { packet, .. } => {
                Some(&packet.stream)
            }
            Message::MessageIteratorInactivity { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_ir::trace::{Trace, TraceClass};

    fn stream_with_clock(with_clock: bool, supports_packets: bool) -> StreamRef {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        if with_clock {
            sc.borrow_mut()
                .set_default_clock_class(Rc::new(ClockClass::new(1_000_000_000).unwrap()))
                .unwrap();
        }
        sc.borrow_mut()
            .set_supports_packets(supports_packets, false, false)
            .unwrap();
        let trace = Rc::new(Trace::new(tc));
        Rc::new(Stream::new(trace, sc, 0))
    }

    #[test]
    fn discarded_events_rejects_unsupported_stream_class() {
        let stream = stream_with_clock(false, false);
        assert!(Message::discarded_events(&stream, None).is_err());
    }

    #[test]
    fn discarded_events_rejects_begin_after_end() {
        let stream = stream_with_clock(true, false);
        stream
            .class
            .borrow_mut()
            .set_supports_discarded_events(true, true)
            .unwrap();
        assert!(Message::discarded_events(&stream, Some((10, 5))).is_err());
    }

    #[test]
    fn set_discarded_count_rejects_zero() {
        let stream = stream_with_clock(false, false);
        stream
            .class
            .borrow_mut()
            .set_supports_discarded_events(true, false)
            .unwrap();
        let mut msg = Message::discarded_events(&stream, None).unwrap();
        assert!(msg.set_discarded_count(0).is_err());
        assert!(msg.set_discarded_count(3).is_ok());
    }

    #[test]
    fn packet_beginning_requires_packet_support() {
        let stream = stream_with_clock(false, false);
        let packet = Rc::new(Packet::new(stream));
        assert!(Message::packet_beginning(&packet, None).is_err());
    }

    #[test]
    fn event_requires_default_clock_snapshot_presence_to_match_stream_class() {
        let tc = TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let ec = sc.borrow_mut().create_event_class().unwrap();
        sc.borrow_mut()
            .set_default_clock_class(Rc::new(ClockClass::new(1_000_000_000).unwrap()))
            .unwrap();
        let trace = Rc::new(Trace::new(tc));
        let stream = Rc::new(Stream::new(trace, sc, 0));
        assert!(Message::event(&ec, &stream, None, None).is_err());
        assert!(Message::event(&ec, &stream, None, Some(1)).is_ok());
    }
}
