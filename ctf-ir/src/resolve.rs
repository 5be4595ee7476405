//! Field-path resolver (spec §4.2), ported from `resolve-field-path.c`.
//!
//! Resolves the by-name references that variant tags, sequence lengths,
//! and option selectors make to other field classes in the scope lattice
//! into positional [`FieldPath`]s, and checks the four validity
//! conditions of spec §4.2.

use crate::field_class::{FieldClassKind, FieldClassRef};
use crate::field_path::{FieldPath, FieldPathItem, Scope};
use crate::{Error, Result};
use std::rc::Rc;

/// The four (optional) scope roots a field class tree may resolve
/// against, in scope-lattice order.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub packet_context: Option<FieldClassRef>,
    pub event_common_context: Option<FieldClassRef>,
    pub event_specific_context: Option<FieldClassRef>,
    pub event_payload: Option<FieldClassRef>,
}

impl ResolveContext {
    fn roots(&self) -> [(Scope, &Option<FieldClassRef>); 4] {
        [
            (Scope::PacketContext, &self.packet_context),
            (Scope::EventCommonContext, &self.event_common_context),
            (Scope::EventSpecificContext, &self.event_specific_context),
            (Scope::EventPayload, &self.event_payload),
        ]
    }

    fn root(&self, scope: Scope) -> Option<&FieldClassRef> {
        match scope {
            Scope::PacketContext => self.packet_context.as_ref(),
            Scope::EventCommonContext => self.event_common_context.as_ref(),
            Scope::EventSpecificContext => self.event_specific_context.as_ref(),
            Scope::EventPayload => self.event_payload.as_ref(),
        }
    }
}

fn child_of(parent: &FieldClassRef, item: FieldPathItem) -> FieldClassRef {
    let node = parent.borrow();
    match (node.kind(), item) {
        (FieldClassKind::Structure(s), FieldPathItem::Index(i)) => s.members[i].field_class.clone(),
        (FieldClassKind::Variant(v), FieldPathItem::Index(i)) => v.options[i].field_class.clone(),
        (FieldClassKind::Array(a), FieldPathItem::CurrentArrayElement) => a.element.clone(),
        (FieldClassKind::Sequence(s), FieldPathItem::CurrentArrayElement) => s.element.clone(),
        (FieldClassKind::Option(o), FieldPathItem::CurrentOptionContent) => o.content.clone(),
        _ => unreachable!("field path item does not match field class kind"),
    }
}

fn is_array_option_or_variant(fc: &FieldClassRef) -> bool {
    matches!(
        fc.borrow().kind(),
        FieldClassKind::Array(_) | FieldClassKind::Sequence(_) | FieldClassKind::Option(_)
            | FieldClassKind::Variant(_)
    )
}

fn find_identity_recursive(
    fc: &FieldClassRef,
    target: &FieldClassRef,
    path: &mut FieldPath,
) -> bool {
    if Rc::ptr_eq(fc, target) {
        return true;
    }

    let children: Vec<(FieldPathItem, FieldClassRef)> = {
        let node = fc.borrow();
        match node.kind() {
            FieldClassKind::Option(o) => {
                vec![(FieldPathItem::CurrentOptionContent, o.content.clone())]
            }
            FieldClassKind::Structure(s) => s
                .members
                .iter()
                .enumerate()
                .map(|(i, m)| (FieldPathItem::Index(i), m.field_class.clone()))
                .collect(),
            FieldClassKind::Variant(v) => v
                .options
                .iter()
                .enumerate()
                .map(|(i, o)| (FieldPathItem::Index(i), o.field_class.clone()))
                .collect(),
            FieldClassKind::Array(a) => {
                vec![(FieldPathItem::CurrentArrayElement, a.element.clone())]
            }
            FieldClassKind::Sequence(s) => {
                vec![(FieldPathItem::CurrentArrayElement, s.element.clone())]
            }
            _ => Vec::new(),
        }
    };

    for (item, child) in children {
        path.push(item);
        if find_identity_recursive(&child, target, path) {
            return true;
        }
        path.pop();
    }

    false
}

fn find_identity_in_ctx(ctx: &ResolveContext, target: &FieldClassRef) -> Option<FieldPath> {
    for (scope, root) in ctx.roots() {
        if let Some(root) = root {
            let mut path = FieldPath::new(scope);
            if find_identity_recursive(root, target, &mut path) {
                return Some(path);
            }
        }
    }
    None
}

fn find_named_recursive(
    fc: &FieldClassRef,
    name: &str,
    path: &mut FieldPath,
    results: &mut Vec<(FieldPath, FieldClassRef)>,
) {
    let entries: Vec<(FieldPathItem, Option<String>, FieldClassRef)> = {
        let node = fc.borrow();
        match node.kind() {
            FieldClassKind::Option(o) => {
                vec![(FieldPathItem::CurrentOptionContent, None, o.content.clone())]
            }
            FieldClassKind::Structure(s) => s
                .members
                .iter()
                .enumerate()
                .map(|(i, m)| (FieldPathItem::Index(i), Some(m.name.clone()), m.field_class.clone()))
                .collect(),
            FieldClassKind::Variant(v) => v
                .options
                .iter()
                .enumerate()
                .map(|(i, o)| (FieldPathItem::Index(i), Some(o.name.clone()), o.field_class.clone()))
                .collect(),
            FieldClassKind::Array(a) => {
                vec![(FieldPathItem::CurrentArrayElement, None, a.element.clone())]
            }
            FieldClassKind::Sequence(s) => {
                vec![(FieldPathItem::CurrentArrayElement, None, s.element.clone())]
            }
            _ => Vec::new(),
        }
    };

    for (item, maybe_name, child) in entries {
        path.push(item);
        if maybe_name.as_deref() == Some(name) {
            results.push((path.clone(), child.clone()));
        }
        find_named_recursive(&child, name, path, results);
        path.pop();
    }
}

fn find_named_in_ctx(ctx: &ResolveContext, name: &str) -> Vec<(FieldPath, FieldClassRef)> {
    let mut results = Vec::new();
    for (scope, root) in ctx.roots() {
        if let Some(root) = root {
            let mut path = FieldPath::new(scope);
            find_named_recursive(root, name, &mut path, &mut results);
        }
    }
    results
}

/// Target must be before source: strictly earlier scope, or same scope and
/// lexicographically earlier in the pre-order walk.
fn target_is_before_source(src: &FieldPath, tgt: &FieldPath) -> bool {
    if tgt.scope < src.scope {
        return true;
    }
    if tgt.scope > src.scope {
        return false;
    }

    for (s_item, t_item) in src.items.iter().zip(tgt.items.iter()) {
        if let (FieldPathItem::Index(si), FieldPathItem::Index(ti)) = (s_item, t_item) {
            if ti > si {
                return false;
            }
        }
    }
    true
}

/// If target is in an earlier scope than source, the walk from that
/// scope's root to target must pass through structures only.
fn target_in_different_scope_is_struct_path_only(
    src: &FieldPath,
    tgt: &FieldPath,
    ctx: &ResolveContext,
) -> bool {
    if src.scope == tgt.scope {
        return true;
    }

    let mut fc = match ctx.root(tgt.scope) {
        Some(fc) => fc.clone(),
        None => return false,
    };

    for item in &tgt.items {
        if is_array_option_or_variant(&fc) {
            return false;
        }
        fc = child_of(&fc, *item);
    }
    true
}

/// Same-scope only: the lowest common ancestor of `src` and `tgt` (found by
/// walking both paths from the shared root until the field classes
/// diverge) must be a structure field class.
fn lca_is_structure(src: &FieldPath, tgt: &FieldPath, ctx: &ResolveContext) -> bool {
    if src.scope != tgt.scope {
        return true;
    }

    let mut src_fc = match ctx.root(src.scope) {
        Some(fc) => fc.clone(),
        None => return false,
    };
    let mut tgt_fc = src_fc.clone();
    let mut prev_fc: Option<FieldClassRef> = None;

    for (s_item, t_item) in src.items.iter().zip(tgt.items.iter()) {
        if !Rc::ptr_eq(&src_fc, &tgt_fc) {
            return match prev_fc {
                None => true,
                Some(p) => matches!(p.borrow().kind(), FieldClassKind::Structure(_)),
            };
        }
        prev_fc = Some(src_fc.clone());
        src_fc = child_of(&src_fc, *s_item);
        tgt_fc = child_of(&tgt_fc, *t_item);
    }

    true
}

/// Same-scope only: from the LCA to the target, only structures.
fn lca_to_target_is_struct_path_only(
    src: &FieldPath,
    tgt: &FieldPath,
    ctx: &ResolveContext,
) -> bool {
    if src.scope != tgt.scope {
        return true;
    }

    let mut src_fc = match ctx.root(src.scope) {
        Some(fc) => fc.clone(),
        None => return false,
    };
    let mut tgt_fc = src_fc.clone();
    let mut tgt_i = 0usize;

    for (s_item, t_item) in src.items.iter().zip(tgt.items.iter()) {
        if !Rc::ptr_eq(&src_fc, &tgt_fc) {
            break;
        }
        src_fc = child_of(&src_fc, *s_item);
        tgt_fc = child_of(&tgt_fc, *t_item);
        tgt_i += 1;
    }

    for item in &tgt.items[tgt_i..] {
        if is_array_option_or_variant(&tgt_fc) {
            return false;
        }
        tgt_fc = child_of(&tgt_fc, *item);
    }
    true
}

fn field_path_is_valid(
    src_path: &FieldPath,
    tgt_path: &FieldPath,
    ctx: &ResolveContext,
) -> Result<()> {
    if !target_is_before_source(src_path, tgt_path) {
        return Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: format!("{:?}", tgt_path),
            reason: "target field class is located after requesting field class".to_string(),
        });
    }
    if !target_in_different_scope_is_struct_path_only(src_path, tgt_path, ctx) {
        return Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: format!("{:?}", tgt_path),
            reason: "target is in a different scope but reached through an array, sequence, option, or variant".to_string(),
        });
    }
    if !lca_is_structure(src_path, tgt_path, ctx) {
        return Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: format!("{:?}", tgt_path),
            reason: "lowest common ancestor of target and source is not a structure".to_string(),
        });
    }
    if !lca_to_target_is_struct_path_only(src_path, tgt_path, ctx) {
        return Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: format!("{:?}", tgt_path),
            reason: "path from the lowest common ancestor to target contains an array, sequence, option, or variant".to_string(),
        });
    }
    Ok(())
}

fn resolve_name(ctx: &ResolveContext, src_fc: &FieldClassRef, name: &str) -> Result<FieldPath> {
    let src_path = find_identity_in_ctx(ctx, src_fc).ok_or_else(|| Error::InvalidFieldPath {
        source: "<unattached>".to_string(),
        target: name.to_string(),
        reason: "source field class is not attached to a resolvable scope".to_string(),
    })?;

    let matches = find_named_in_ctx(ctx, name);
    match matches.len() {
        0 => Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: name.to_string(),
            reason: format!("no field named `{}` found in any scope", name),
        }),
        1 => {
            let (tgt_path, _tgt_fc) = &matches[0];
            field_path_is_valid(&src_path, tgt_path, ctx)?;
            Ok(tgt_path.clone())
        }
        _ => Err(Error::InvalidFieldPath {
            source: format!("{:?}", src_path),
            target: name.to_string(),
            reason: format!("field name `{}` is ambiguous: matches {} fields", name, matches.len()),
        }),
    }
}

/// Walks `fc`'s tree, resolving every sequence length, variant tag, and
/// option selector by-name reference into a [`FieldPath`]. Idempotent:
/// running twice on an already-resolved tree re-derives the same paths.
pub fn resolve_field_paths(fc: &FieldClassRef, ctx: &ResolveContext) -> Result<()> {
    {
        let mut node = fc.borrow_mut();
        let kind = node.kind_mut()?;
        match kind {
            FieldClassKind::Sequence(seq) => {
                let name = seq.length_field_name.clone();
                let path = resolve_name(ctx, fc, &name)?;
                seq.length_field_path = Some(path);
            }
            FieldClassKind::Variant(v) => {
                if let Some(name) = v.tag_field_name.clone() {
                    let path = resolve_name(ctx, fc, &name)?;
                    v.tag_field_path = Some(path);
                }
            }
            FieldClassKind::Option(o) => {
                if let Some(name) = o.selector_field_name.clone() {
                    let path = resolve_name(ctx, fc, &name)?;
                    o.selector_field_path = Some(path);
                }
            }
            _ => {}
        }
    }

    let children: Vec<FieldClassRef> = {
        let node = fc.borrow();
        match node.kind() {
            FieldClassKind::Structure(s) => {
                s.members.iter().map(|m| m.field_class.clone()).collect()
            }
            FieldClassKind::Variant(v) => {
                v.options.iter().map(|o| o.field_class.clone()).collect()
            }
            FieldClassKind::Array(a) => vec![a.element.clone()],
            FieldClassKind::Sequence(s) => vec![s.element.clone()],
            FieldClassKind::Option(o) => vec![o.content.clone()],
            _ => Vec::new(),
        }
    };

    for child in &children {
        resolve_field_paths(child, ctx)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_class::{
        ByteOrder, CharacterEncoding, DisplayBase, FieldClass, IntegerFieldClass,
        NamedFieldClass, SequenceFieldClass, StructureFieldClass,
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
    fn sequence_length_resolves_to_sibling_in_packet_context() {
        // packet-context = struct { u16 len; u8[len] data }
        let len_fc = u16_fc();
        let seq = FieldClass::new(FieldClassKind::Sequence(SequenceFieldClass {
            element: u8_fc(),
            length_field_name: "len".to_string(),
            length_field_path: None,
        }));

        let mut s = StructureFieldClass::new();
        s.append_member("len", len_fc).unwrap();
        s.append_member("data", seq.clone()).unwrap();
        let packet_context = FieldClass::new(FieldClassKind::Structure(s));

        let ctx = ResolveContext {
            packet_context: Some(packet_context.clone()),
            ..Default::default()
        };

        resolve_field_paths(&packet_context, &ctx).unwrap();

        let node = seq.borrow();
        if let FieldClassKind::Sequence(s) = node.kind() {
            let path = s.length_field_path.as_ref().unwrap();
            assert_eq!(path.scope, Scope::PacketContext);
            assert_eq!(path.items, vec![FieldPathItem::Index(0)]);
        } else {
            panic!("expected sequence field class");
        }
    }

    #[test]
    fn unknown_length_name_is_invalid_field_path() {
        let seq = FieldClass::new(FieldClassKind::Sequence(SequenceFieldClass {
            element: u8_fc(),
            length_field_name: "nope".to_string(),
            length_field_path: None,
        }));
        let mut s = StructureFieldClass::new();
        s.append_member("data", seq.clone()).unwrap();
        let packet_context = FieldClass::new(FieldClassKind::Structure(s));

        let ctx = ResolveContext {
            packet_context: Some(packet_context.clone()),
            ..Default::default()
        };

        assert!(matches!(
            resolve_field_paths(&packet_context, &ctx),
            Err(Error::InvalidFieldPath { .. })
        ));
    }

    #[test]
    fn length_field_after_sequence_is_invalid() {
        // struct { u8[len] data; u16 len } -- len comes after the sequence.
        let seq = FieldClass::new(FieldClassKind::Sequence(SequenceFieldClass {
            element: u8_fc(),
            length_field_name: "len".to_string(),
            length_field_path: None,
        }));
        let mut s = StructureFieldClass::new();
        s.append_member("data", seq.clone()).unwrap();
        s.append_member("len", u16_fc()).unwrap();
        let payload = FieldClass::new(FieldClassKind::Structure(s));

        let ctx = ResolveContext {
            event_payload: Some(payload.clone()),
            ..Default::default()
        };

        assert!(matches!(
            resolve_field_paths(&payload, &ctx),
            Err(Error::InvalidFieldPath { .. })
        ));
    }

    #[test]
    fn resolution_is_idempotent() {
        let len_fc = u16_fc();
        let seq = FieldClass::new(FieldClassKind::Sequence(SequenceFieldClass {
            element: u8_fc(),
            length_field_name: "len".to_string(),
            length_field_path: None,
        }));
        let mut s = StructureFieldClass::new();
        s.append_member("len", len_fc).unwrap();
        s.append_member("data", seq.clone()).unwrap();
        let packet_context = FieldClass::new(FieldClassKind::Structure(s));

        let ctx = ResolveContext {
            packet_context: Some(packet_context.clone()),
            ..Default::default()
        };

        resolve_field_paths(&packet_context, &ctx).unwrap();
        let first = {
            let node = seq.borrow();
            match node.kind() {
                FieldClassKind::Sequence(s) => s.length_field_path.clone(),
                _ => unreachable!(),
            }
        };
        resolve_field_paths(&packet_context, &ctx).unwrap();
        let second = {
            let node = seq.borrow();
            match node.kind() {
                FieldClassKind::Sequence(s) => s.length_field_path.clone(),
                _ => unreachable!(),
            }
        };
        assert_eq!(first, second);
    }

    #[allow(dead_code)]
    fn named_field_class(name: &str, fc: FieldClassRef) -> NamedFieldClass {
        NamedFieldClass {
            name: name.to_string(),
            field_class: fc,
        }
    }
}
