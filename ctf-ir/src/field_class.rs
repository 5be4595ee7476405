//! Field classes (types), spec §3.2.
//!
//! Ported from `field-types.c`'s tagged-union-of-structs layout. Rust
//! expresses the "table of kinds" directly as an enum with per-variant
//! payload structs instead of a kind tag plus a cast, and the
//! parent-owns-child freeze propagation of §3.1 as a recursive `freeze()`
//! that walks contained classes.

use crate::clock::ClockClass;
use crate::interval::{SignedIntegerRangeSet, UnsignedIntegerRangeSet};
use crate::{Error, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub type FieldClassRef = Rc<RefCell<FieldClass>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBase {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterEncoding {
    None,
    Ascii,
    Utf8,
}

#[derive(Debug, Clone)]
pub struct IntegerFieldClass {
    pub signed: bool,
    pub width: u8,
    pub alignment: u16,
    pub display_base: DisplayBase,
    pub encoding: CharacterEncoding,
    pub byte_order: ByteOrder,
    pub mapped_clock_class: Option<Rc<ClockClass>>,
}

impl IntegerFieldClass {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.width > 64 {
            return Err(Error::InvalidFieldClass(
                "integer field class width must be in 1..=64".to_string(),
            ));
        }
        if !self.alignment.is_power_of_two() {
            return Err(Error::InvalidFieldClass(
                "integer field class alignment must be a power of two".to_string(),
            ));
        }
        if self.mapped_clock_class.is_some() && self.signed {
            return Err(Error::InvalidFieldClass(
                "a clock-mapped integer field class must be unsigned".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RealFieldClass {
    pub exponent_width: u8,
    pub mantissa_width: u8,
    pub byte_order: ByteOrder,
    pub alignment: u16,
}

impl RealFieldClass {
    /// `(exponent_width, mantissa_width)` must match IEEE 754 binary32
    /// `(8, 24)` or binary64 `(11, 53)` (mantissa width here includes the
    /// implicit sign bit, matching the TSDL `mant_dig` convention).
    fn validate(&self) -> Result<()> {
        if !self.alignment.is_power_of_two() {
            return Err(Error::InvalidFieldClass(
                "real field class alignment must be a power of two".to_string(),
            ));
        }
        match (self.exponent_width, self.mantissa_width) {
            (8, 24) | (11, 53) => Ok(()),
            _ => Err(Error::InvalidFieldClass(format!(
                "real field class shape ({}, {}) does not match IEEE 754 binary32/binary64",
                self.exponent_width, self.mantissa_width
            ))),
        }
    }

    pub fn is_single(&self) -> bool {
        (self.exponent_width, self.mantissa_width) == (8, 24)
    }

    pub fn is_double(&self) -> bool {
        (self.exponent_width, self.mantissa_width) == (11, 53)
    }
}

#[derive(Debug, Clone)]
pub enum EnumerationRanges {
    Unsigned(UnsignedIntegerRangeSet),
    Signed(SignedIntegerRangeSet),
}

#[derive(Debug, Clone)]
pub struct EnumerationFieldClass {
    pub container: IntegerFieldClass,
    /// Ordered `label -> ranges` mappings. Labels are unique; ranges may
    /// overlap across labels.
    pub mappings: Vec<(String, EnumerationRanges)>,
}

impl EnumerationFieldClass {
    fn validate(&self) -> Result<()> {
        self.container.validate()?;
        let mut seen = std::collections::HashSet::new();
        for (label, ranges) in &self.mappings {
            if !seen.insert(label.as_str()) {
                return Err(Error::DuplicateName(label.clone()));
            }
            match (self.container.signed, ranges) {
                (false, EnumerationRanges::Unsigned(_)) => {}
                (true, EnumerationRanges::Signed(_)) => {}
                _ => {
                    return Err(Error::InvalidFieldClass(
                        "enumeration mapping range signedness must match its container"
                            .to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(|(l, _)| l.as_str())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.mappings.iter().any(|(l, _)| l == label)
    }
}

#[derive(Debug, Clone)]
pub struct StringFieldClass {
    pub encoding: CharacterEncoding,
}

#[derive(Debug, Clone)]
pub struct NamedFieldClass {
    pub name: String,
    pub field_class: FieldClassRef,
}

#[derive(Debug, Clone, Default)]
pub struct StructureFieldClass {
    pub members: Vec<NamedFieldClass>,
    name_index: HashMap<String, usize>,
}

impl StructureFieldClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_member(&mut self, name: impl Into<String>, fc: FieldClassRef) -> Result<()> {
        let name = name.into();
        if self.name_index.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        self.name_index.insert(name.clone(), self.members.len());
        self.members.push(NamedFieldClass {
            name,
            field_class: fc,
        });
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Alignment is the maximum of its members' alignments.
    pub fn alignment(&self) -> u16 {
        self.members
            .iter()
            .map(|m| m.field_class.borrow().alignment())
            .max()
            .unwrap_or(1)
    }

    fn validate(&self) -> Result<()> {
        if !self.alignment().is_power_of_two() {
            return Err(Error::InvalidFieldClass(
                "structure field class alignment must be a power of two".to_string(),
            ));
        }
        for m in &self.members {
            m.field_class.borrow().validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VariantFieldClass {
    pub tag_field_name: Option<String>,
    pub tag: Option<FieldClassRef>,
    pub options: Vec<NamedFieldClass>,
    name_index: HashMap<String, usize>,
    pub tag_field_path: Option<crate::field_path::FieldPath>,
}

impl VariantFieldClass {
    pub fn new() -> Self {
        Self {
            tag_field_name: None,
            tag: None,
            options: Vec::new(),
            name_index: HashMap::new(),
            tag_field_path: None,
        }
    }

    pub fn set_tag_field_name(&mut self, name: impl Into<String>) {
        self.tag_field_name = Some(name.into());
    }

    pub fn append_option(&mut self, name: impl Into<String>, fc: FieldClassRef) -> Result<()> {
        let name = name.into();
        if self.name_index.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        self.name_index.insert(name.clone(), self.options.len());
        self.options.push(NamedFieldClass {
            name,
            field_class: fc,
        });
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    fn validate(&self) -> Result<()> {
        if let Some(tag) = &self.tag {
            let tag_borrow = tag.borrow();
            let tag_fc = match tag_borrow.kind() {
                FieldClassKind::Enumeration(e) => e,
                _ => {
                    return Err(Error::InvalidFieldClass(
                        "variant tag discriminator must be an enumeration field class"
                            .to_string(),
                    ))
                }
            };

            // Every tag label must appear as an option name, and option
            // count must equal label count.
            let label_count = tag_fc.mappings.len();
            if self.options.len() != label_count {
                return Err(Error::InvalidFieldClass(format!(
                    "variant has {} option(s) but its tag has {} label(s)",
                    self.options.len(),
                    label_count
                )));
            }
            for label in tag_fc.labels() {
                if self.index_of(label).is_none() {
                    return Err(Error::InvalidFieldClass(format!(
                        "variant is missing an option for tag label `{}`",
                        label
                    )));
                }
            }
        }

        for o in &self.options {
            o.field_class.borrow().validate()?;
        }
        Ok(())
    }
}

impl Default for VariantFieldClass {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ArrayFieldClass {
    pub element: FieldClassRef,
    pub length: u64,
}

impl ArrayFieldClass {
    fn validate(&self) -> Result<()> {
        if self.length < 1 {
            return Err(Error::InvalidFieldClass(
                "static array field class length must be >= 1".to_string(),
            ));
        }
        self.element.borrow().validate()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceFieldClass {
    pub element: FieldClassRef,
    pub length_field_name: String,
    pub length_field_path: Option<crate::field_path::FieldPath>,
}

impl SequenceFieldClass {
    fn validate(&self) -> Result<()> {
        if self.length_field_name.is_empty() {
            return Err(Error::InvalidFieldClass(
                "sequence field class length field name must be non-empty".to_string(),
            ));
        }
        self.element.borrow().validate()
    }
}

#[derive(Debug, Clone)]
pub enum OptionSelector {
    Bool,
    Integer(EnumerationRanges),
    EnumerationLabels(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct OptionFieldClass {
    pub content: FieldClassRef,
    pub selector_field_name: Option<String>,
    pub selector: Option<OptionSelector>,
    pub selector_field_path: Option<crate::field_path::FieldPath>,
}

impl OptionFieldClass {
    fn validate(&self) -> Result<()> {
        self.content.borrow().validate()
    }
}

#[derive(Debug, Clone)]
pub enum FieldClassKind {
    Bool {
        alignment: u16,
    },
    BitArray {
        width: u8,
        alignment: u16,
    },
    Integer(IntegerFieldClass),
    Real(RealFieldClass),
    Enumeration(EnumerationFieldClass),
    String(StringFieldClass),
    Structure(StructureFieldClass),
    Variant(VariantFieldClass),
    Array(ArrayFieldClass),
    Sequence(SequenceFieldClass),
    Option(OptionFieldClass),
}

/// A field class node: kind plus a freeze bit.
///
/// Freezing is deep for container kinds: freezing a structure freezes its
/// members; freezing a variant freezes its tag and options; freezing an
/// array/sequence/option freezes its element/content.
#[derive(Debug, Clone)]
pub struct FieldClass {
    kind: FieldClassKind,
    frozen: Cell<bool>,
}

impl FieldClass {
    pub fn new(kind: FieldClassKind) -> FieldClassRef {
        Rc::new(RefCell::new(Self {
            kind,
            frozen: Cell::new(false),
        }))
    }

    pub fn kind(&self) -> &FieldClassKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> Result<&mut FieldClassKind> {
        if self.frozen.get() {
            Err(Error::Frozen("field class".to_string()))
        } else {
            Ok(&mut self.kind)
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn freeze(&self) {
        if self.frozen.get() {
            return;
        }
        self.frozen.set(true);
        match &self.kind {
            FieldClassKind::Structure(s) => {
                for m in &s.members {
                    m.field_class.borrow().freeze();
                }
            }
            FieldClassKind::Variant(v) => {
                if let Some(tag) = &v.tag {
                    tag.borrow().freeze();
                }
                for o in &v.options {
                    o.field_class.borrow().freeze();
                }
            }
            FieldClassKind::Array(a) => a.element.borrow().freeze(),
            FieldClassKind::Sequence(s) => s.element.borrow().freeze(),
            FieldClassKind::Option(o) => o.content.borrow().freeze(),
            _ => {}
        }
    }

    /// Alignment in bits. Variants have undefined alignment (reported as
    /// 0), matching spec §3.2.
    pub fn alignment(&self) -> u16 {
        match &self.kind {
            FieldClassKind::Bool { alignment } => *alignment,
            FieldClassKind::BitArray { alignment, .. } => *alignment,
            FieldClassKind::Integer(i) => i.alignment,
            FieldClassKind::Real(r) => r.alignment,
            FieldClassKind::Enumeration(e) => e.container.alignment,
            FieldClassKind::String(_) => 8,
            FieldClassKind::Structure(s) => s.alignment(),
            FieldClassKind::Variant(_) => 0,
            FieldClassKind::Array(a) => a.element.borrow().alignment(),
            FieldClassKind::Sequence(s) => s.element.borrow().alignment(),
            FieldClassKind::Option(o) => o.content.borrow().alignment(),
        }
    }

    /// Per-kind local validation, with recursive descent into containers.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            FieldClassKind::Bool { alignment } | FieldClassKind::BitArray { alignment, .. } => {
                if !alignment.is_power_of_two() {
                    return Err(Error::InvalidFieldClass(
                        "alignment must be a power of two".to_string(),
                    ));
                }
                Ok(())
            }
            FieldClassKind::Integer(i) => i.validate(),
            FieldClassKind::Real(r) => r.validate(),
            FieldClassKind::Enumeration(e) => e.validate(),
            FieldClassKind::String(_) => Ok(()),
            FieldClassKind::Structure(s) => s.validate(),
            FieldClassKind::Variant(v) => v.validate(),
            FieldClassKind::Array(a) => a.validate(),
            FieldClassKind::Sequence(s) => s.validate(),
            FieldClassKind::Option(o) => o.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_fc(alignment: u16) -> FieldClassRef {
        FieldClass::new(FieldClassKind::Bool { alignment })
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

    #[test]
    fn struct_alignment_is_max_of_members() {
        let mut s = StructureFieldClass::new();
        s.append_member("a", u8_fc()).unwrap();
        s.append_member("b", u16_fc()).unwrap();
        assert_eq!(s.alignment(), 1);
    }

    #[test]
    fn struct_rejects_duplicate_member_names() {
        let mut s = StructureFieldClass::new();
        s.append_member("a", u8_fc()).unwrap();
        assert!(matches!(
            s.append_member("a", u8_fc()),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn integer_width_out_of_range_is_rejected() {
        let fc = FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
            signed: false,
            width: 65,
            alignment: 1,
            display_base: DisplayBase::Decimal,
            encoding: CharacterEncoding::None,
            byte_order: ByteOrder::LittleEndian,
            mapped_clock_class: None,
        }));
        assert!(fc.borrow().validate().is_err());
    }

    #[test]
    fn real_shape_must_match_ieee754() {
        let fc = FieldClass::new(FieldClassKind::Real(RealFieldClass {
            exponent_width: 11,
            mantissa_width: 53,
            byte_order: ByteOrder::LittleEndian,
            alignment: 8,
        }));
        assert!(fc.borrow().validate().is_ok());

        let bad = FieldClass::new(FieldClassKind::Real(RealFieldClass {
            exponent_width: 5,
            mantissa_width: 10,
            byte_order: ByteOrder::LittleEndian,
            alignment: 8,
        }));
        assert!(bad.borrow().validate().is_err());
    }

    #[test]
    fn variant_requires_an_option_per_tag_label() {
        let container = IntegerFieldClass {
            signed: false,
            width: 8,
            alignment: 1,
            display_base: DisplayBase::Decimal,
            encoding: CharacterEncoding::None,
            byte_order: ByteOrder::LittleEndian,
            mapped_clock_class: None,
        };
        let mut x_range = UnsignedIntegerRangeSet::new();
        x_range.add_range(0, 0).unwrap();
        let mut y_range = UnsignedIntegerRangeSet::new();
        y_range.add_range(1, 1).unwrap();
        let tag = FieldClass::new(FieldClassKind::Enumeration(EnumerationFieldClass {
            container,
            mappings: vec![
                ("x".to_string(), EnumerationRanges::Unsigned(x_range)),
                ("y".to_string(), EnumerationRanges::Unsigned(y_range)),
            ],
        }));

        let mut v = VariantFieldClass::new();
        v.tag = Some(tag);
        v.append_option("x", u8_fc()).unwrap();
        let variant_fc = FieldClass::new(FieldClassKind::Variant(v));
        // Missing the "y" option.
        assert!(variant_fc.borrow().validate().is_err());

        if let FieldClassKind::Variant(v) = variant_fc.borrow_mut().kind_mut().unwrap() {
            v.append_option("z", u8_fc()).unwrap();
        }
        // Now has x, z but not y, and one extra relative to label count.
        assert!(variant_fc.borrow().validate().is_err());
    }

    #[test]
    fn freezing_a_structure_freezes_its_members() {
        let a = u8_fc();
        let mut s = StructureFieldClass::new();
        s.append_member("a", a.clone()).unwrap();
        let struct_fc = FieldClass::new(FieldClassKind::Structure(s));
        struct_fc.borrow().freeze();
        assert!(a.borrow().is_frozen());
    }

    #[test]
    fn bool_example_one_alignment() {
        let fc = bool_fc(1);
        assert_eq!(fc.borrow().alignment(), 1);
    }
}
