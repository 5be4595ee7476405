//! Two-pass validator (spec §4.3), ported from `validation.c`.
//!
//! Pass 1 (resolution) walks field classes in dependency order (packet
//! header, packet context, event header, event common context, event
//! specific context, event payload), deep-copying any subtree that
//! contains a sequence or variant so resolution never mutates a tree
//! another class might still be sharing, then resolves field paths
//! (`resolve::resolve_field_paths`). Pass 2 (local validation) runs each
//! field class's own per-kind checks, recursively.
//!
//! Packet-header and event-header classes are walked for pass 2 only:
//! the scope lattice of spec §3.3 has exactly four members (packet
//! context, event common context, event specific context, event
//! payload), so a sequence or variant nested in a packet/event header
//! has no scope to resolve against and is validated structurally but
//! not resolved.

use crate::field_class::{
    ArrayFieldClass, FieldClass, FieldClassKind, FieldClassRef, OptionFieldClass,
    SequenceFieldClass, StructureFieldClass, VariantFieldClass,
};
use crate::resolve::{resolve_field_paths, ResolveContext};
use crate::trace::{EventClassRef, StreamClassRef, TraceClassRef};
use crate::Result;

fn contains_sequence_or_variant(fc: &FieldClassRef) -> bool {
    match fc.borrow().kind() {
        FieldClassKind::Sequence(_) | FieldClassKind::Variant(_) => true,
        FieldClassKind::Array(a) => contains_sequence_or_variant(&a.element),
        FieldClassKind::Option(o) => contains_sequence_or_variant(&o.content),
        FieldClassKind::Structure(s) => s.members.iter().any(|m| contains_sequence_or_variant(&m.field_class)),
        _ => false,
    }
}

fn deep_copy(fc: &FieldClassRef) -> Result<FieldClassRef> {
    let kind = fc.borrow().kind().clone();
    let new_kind = match kind {
        FieldClassKind::Bool { alignment } => FieldClassKind::Bool { alignment },
        FieldClassKind::BitArray { width, alignment } => FieldClassKind::BitArray { width, alignment },
        FieldClassKind::Integer(i) => FieldClassKind::Integer(i),
        FieldClassKind::Real(r) => FieldClassKind::Real(r),
        FieldClassKind::Enumeration(e) => FieldClassKind::Enumeration(e),
        FieldClassKind::String(s) => FieldClassKind::String(s),
        FieldClassKind::Structure(s) => {
            let mut new_s = StructureFieldClass::new();
            for m in &s.members {
                new_s.append_member(m.name.clone(), deep_copy(&m.field_class)?)?;
            }
            FieldClassKind::Structure(new_s)
        }
        FieldClassKind::Variant(v) => {
            let mut new_v = VariantFieldClass::new();
            if let Some(name) = &v.tag_field_name {
                new_v.set_tag_field_name(name.clone());
            }
            new_v.tag = v.tag.clone();
            for o in &v.options {
                new_v.append_option(o.name.clone(), deep_copy(&o.field_class)?)?;
            }
            FieldClassKind::Variant(new_v)
        }
        FieldClassKind::Array(a) => FieldClassKind::Array(ArrayFieldClass {
            element: deep_copy(&a.element)?,
            length: a.length,
        }),
        FieldClassKind::Sequence(s) => FieldClassKind::Sequence(SequenceFieldClass {
            element: deep_copy(&s.element)?,
            length_field_name: s.length_field_name.clone(),
            length_field_path: None,
        }),
        FieldClassKind::Option(o) => FieldClassKind::Option(OptionFieldClass {
            content: deep_copy(&o.content)?,
            selector_field_name: o.selector_field_name.clone(),
            selector: o.selector.clone(),
            selector_field_path: None,
        }),
    };
    let copy = FieldClass::new(new_kind);
    copy.borrow().freeze();
    Ok(copy)
}

/// Returns the field class unchanged if it contains no sequence or
/// variant, otherwise a fresh deep copy of it (spec §4.3 deep-copy
/// policy). Either way the returned field class is frozen immediately,
/// matching `validation.c`'s `bt_field_type_freeze()` call right after
/// each deep-copy.
fn maybe_copy(fc: &FieldClassRef) -> Result<FieldClassRef> {
    if contains_sequence_or_variant(fc) {
        deep_copy(fc)
    } else {
        fc.borrow().freeze();
        Ok(fc.clone())
    }
}

/// Validates a trace class's packet-header field class (local pass
/// only; see module docs).
pub fn validate_trace_class(tc: &TraceClassRef) -> Result<()> {
    let packet_header = tc.borrow().packet_header_field_class().cloned();
    if let Some(fc) = &packet_header {
        fc.borrow().validate()?;
    }
    Ok(())
}

/// Resolves and validates a stream class's packet-context and
/// event-common-context classes (both scope roots), and locally
/// validates its event-header class.
pub fn validate_stream_class(sc: &StreamClassRef) -> Result<()> {
    let (packet_context, event_header, event_common_context) = {
        let b = sc.borrow();
        (
            b.packet_context_field_class().cloned(),
            b.event_header_field_class().cloned(),
            b.event_common_context_field_class().cloned(),
        )
    };

    let packet_context = packet_context.map(|fc| maybe_copy(&fc)).transpose()?;
    let event_header = event_header.map(|fc| maybe_copy(&fc)).transpose()?;
    let event_common_context = event_common_context.map(|fc| maybe_copy(&fc)).transpose()?;

    let ctx = ResolveContext {
        packet_context: packet_context.clone(),
        event_common_context: event_common_context.clone(),
        ..Default::default()
    };

    if let Some(fc) = &packet_context {
        resolve_field_paths(fc, &ctx)?;
    }
    if let Some(fc) = &event_common_context {
        resolve_field_paths(fc, &ctx)?;
    }

    if let Some(fc) = &packet_context {
        fc.borrow().validate()?;
    }
    if let Some(fc) = &event_header {
        fc.borrow().validate()?;
    }
    if let Some(fc) = &event_common_context {
        fc.borrow().validate()?;
    }

    let mut b = sc.borrow_mut();
    if let Some(fc) = packet_context {
        b.set_packet_context_field_class(fc)?;
    }
    if let Some(fc) = event_header {
        b.set_event_header_field_class(fc)?;
    }
    if let Some(fc) = event_common_context {
        b.set_event_common_context_field_class(fc)?;
    }
    Ok(())
}

/// Resolves and validates an event class's specific-context and payload
/// classes against the full scope lattice, including the owning stream
/// class's already-validated packet-context and event-common-context.
pub fn validate_event_class(ec: &EventClassRef, sc: &StreamClassRef) -> Result<()> {
    let (specific_context, payload) = {
        let b = ec.borrow();
        (
            b.specific_context_field_class().cloned(),
            b.payload_field_class().cloned(),
        )
    };

    let specific_context = specific_context.map(|fc| maybe_copy(&fc)).transpose()?;
    let payload = payload.map(|fc| maybe_copy(&fc)).transpose()?;

    let ctx = ResolveContext {
        packet_context: sc.borrow().packet_context_field_class().cloned(),
        event_common_context: sc.borrow().event_common_context_field_class().cloned(),
        event_specific_context: specific_context.clone(),
        event_payload: payload.clone(),
    };

    if let Some(fc) = &specific_context {
        resolve_field_paths(fc, &ctx)?;
    }
    if let Some(fc) = &payload {
        resolve_field_paths(fc, &ctx)?;
    }

    if let Some(fc) = &specific_context {
        fc.borrow().validate()?;
    }
    if let Some(fc) = &payload {
        fc.borrow().validate()?;
    }

    let mut b = ec.borrow_mut();
    if let Some(fc) = specific_context {
        b.set_specific_context_field_class(fc)?;
    }
    if let Some(fc) = payload {
        b.set_payload_field_class(fc)?;
    }
    Ok(())
}

/// Validates a whole trace class graph: the trace class itself, then
/// every stream class, then every event class of every stream class.
pub fn validate_all(tc: &TraceClassRef) -> Result<()> {
    validate_trace_class(tc)?;
    let stream_classes = tc.borrow().stream_classes().to_vec();
    for sc in &stream_classes {
        validate_stream_class(sc)?;
        let event_classes = sc.borrow().event_classes().to_vec();
        for ec in &event_classes {
            validate_event_class(ec, sc)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_class::{
        ByteOrder, CharacterEncoding, DisplayBase, IntegerFieldClass,
    };

    fn u16_fc() -> FieldClassRef {
        FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
            signed: false,
            width: 16,
            alignment: 1,
            display_base: DisplayBase::Decimal,
            encoding: CharacterEncoding::None,
            byte_order: ByteOrder::LittleEndian,
            mapped_clock_class: None,
        }))
    }

    fn u8_fc() -> FieldClassRef {
        FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
            signed: false,
            width: 8,
            alignment: 1,
            display_base: DisplayBase::Decimal,
            encoding: CharacterEncoding::None,
            byte_order: ByteOrder::LittleEndian,
            mapped_clock_class: None,
        }))
    }

    #[test]
    fn validates_a_simple_trace_stream_event_graph() {
        let tc = crate::trace::TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();

        let mut pc = StructureFieldClass::new();
        pc.append_member("len", u16_fc()).unwrap();
        sc.borrow_mut()
            .set_packet_context_field_class(FieldClass::new(FieldClassKind::Structure(pc)))
            .unwrap();

        let ec = sc.borrow_mut().create_event_class().unwrap();
        let mut payload = StructureFieldClass::new();
        payload.append_member("x", u8_fc()).unwrap();
        ec.borrow_mut()
            .set_payload_field_class(FieldClass::new(FieldClassKind::Structure(payload)))
            .unwrap();

        validate_all(&tc).unwrap();
    }

    #[test]
    fn sequence_in_payload_resolves_against_packet_context() {
        let tc = crate::trace::TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();

        let mut pc = StructureFieldClass::new();
        pc.append_member("len", u16_fc()).unwrap();
        sc.borrow_mut()
            .set_packet_context_field_class(FieldClass::new(FieldClassKind::Structure(pc)))
            .unwrap();

        let ec = sc.borrow_mut().create_event_class().unwrap();
        let seq = FieldClass::new(FieldClassKind::Sequence(SequenceFieldClass {
            element: u8_fc(),
            length_field_name: "len".to_string(),
            length_field_path: None,
        }));
        let mut payload = StructureFieldClass::new();
        payload.append_member("data", seq).unwrap();
        ec.borrow_mut()
            .set_payload_field_class(FieldClass::new(FieldClassKind::Structure(payload)))
            .unwrap();

        validate_stream_class(&sc).unwrap();
        validate_event_class(&ec, &sc).unwrap();

        let payload_fc = ec.borrow().payload_field_class().unwrap().clone();
        if let FieldClassKind::Structure(s) = payload_fc.borrow().kind() {
            let seq_fc = &s.members[0].field_class;
            if let FieldClassKind::Sequence(seq) = seq_fc.borrow().kind() {
                let path = seq.length_field_path.as_ref().unwrap();
                assert_eq!(path.scope, crate::field_path::Scope::PacketContext);
            } else {
                panic!("expected sequence");
            }
        } else {
            panic!("expected structure");
        }
    }

    #[test]
    fn validation_is_idempotent() {
        let tc = crate::trace::TraceClass::new();
        let sc = tc.borrow_mut().create_stream_class().unwrap();
        let mut pc = StructureFieldClass::new();
        pc.append_member("len", u16_fc()).unwrap();
        sc.borrow_mut()
            .set_packet_context_field_class(FieldClass::new(FieldClassKind::Structure(pc)))
            .unwrap();

        validate_all(&tc).unwrap();
        validate_all(&tc).unwrap();
    }
}
