//! The C type algebra.
//!
//! Types are immutable value objects under an LP64 model: char=1, short=2,
//! int=4, long/long long/pointer=8, float=4, double=8. `Pointer` and
//! `Array` share their nested type by reference, so cloning is cheap and
//! the graph stays acyclic: records and enums refer to their tag *by
//! name*, and the layout behind a tag lives in the process-wide
//! [`TagTable`].

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Integer conversion ranks, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntRank {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FloatRank {
    Float,
    Double,
    LongDouble,
}

/// `const`/`volatile` flags, attached after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Integer {
        rank: IntRank,
        unsigned: bool,
    },
    Float {
        rank: FloatRank,
    },
    Pointer {
        pointee: Rc<CType>,
    },
    Array {
        element: Rc<CType>,
        /// `None` for an incomplete array (`int a[]`).
        length: Option<u64>,
    },
    Function {
        return_type: Rc<CType>,
        params: Vec<CType>,
        variadic: bool,
    },
    /// A struct or union, identified nominally by tag.
    Record {
        tag: String,
        is_union: bool,
    },
    /// An enum, identified nominally by tag.
    Enum {
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CType {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
}

impl CType {
    pub fn new(kind: TypeKind) -> Self {
        CType {
            kind,
            qualifiers: Qualifiers::default(),
        }
    }

    pub fn void() -> Self {
        CType::new(TypeKind::Void)
    }

    pub fn integer(rank: IntRank, unsigned: bool) -> Self {
        CType::new(TypeKind::Integer { rank, unsigned })
    }

    pub fn int() -> Self {
        CType::integer(IntRank::Int, false)
    }

    pub fn char_type() -> Self {
        CType::integer(IntRank::Char, false)
    }

    pub fn long() -> Self {
        CType::integer(IntRank::Long, false)
    }

    pub fn unsigned_long() -> Self {
        CType::integer(IntRank::Long, true)
    }

    pub fn float(rank: FloatRank) -> Self {
        CType::new(TypeKind::Float { rank })
    }

    pub fn double() -> Self {
        CType::float(FloatRank::Double)
    }

    pub fn pointer_to(pointee: CType) -> Self {
        CType::new(TypeKind::Pointer {
            pointee: Rc::new(pointee),
        })
    }

    pub fn array_of(element: CType, length: Option<u64>) -> Self {
        CType::new(TypeKind::Array {
            element: Rc::new(element),
            length,
        })
    }

    pub fn function(return_type: CType, params: Vec<CType>, variadic: bool) -> Self {
        CType::new(TypeKind::Function {
            return_type: Rc::new(return_type),
            params,
            variadic,
        })
    }

    pub fn record(tag: impl Into<String>, is_union: bool) -> Self {
        CType::new(TypeKind::Record {
            tag: tag.into(),
            is_union,
        })
    }

    pub fn enumeration(tag: impl Into<String>) -> Self {
        CType::new(TypeKind::Enum { tag: tag.into() })
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Integer { .. } | TypeKind::Enum { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float { .. })
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function { .. })
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record { .. })
    }

    /// Scalar per C: arithmetic or pointer. Arrays and functions become
    /// scalar through decay before this question is asked.
    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_void_pointer(&self) -> bool {
        match &self.kind {
            TypeKind::Pointer { pointee } => pointee.is_void(),
            _ => false,
        }
    }

    pub fn pointee(&self) -> Option<&CType> {
        match &self.kind {
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&CType> {
        match &self.kind {
            TypeKind::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Array-to-pointer and function-to-pointer decay; other types pass
    /// through unchanged.
    pub fn decayed(&self) -> CType {
        match &self.kind {
            TypeKind::Array { element, .. } => CType::new(TypeKind::Pointer {
                pointee: element.clone(),
            }),
            TypeKind::Function { .. } => CType::pointer_to(self.clone()),
            _ => self.clone(),
        }
    }

    /// Size in bytes under LP64. Incomplete types size to 0.
    pub fn size(&self, tags: &TagTable) -> u64 {
        match &self.kind {
            TypeKind::Void => 0,
            TypeKind::Integer { rank, .. } => int_rank_size(*rank),
            TypeKind::Float { rank } => match rank {
                FloatRank::Float => 4,
                FloatRank::Double | FloatRank::LongDouble => 8,
            },
            TypeKind::Pointer { .. } => 8,
            TypeKind::Array { element, length } => element.size(tags) * length.unwrap_or(0),
            TypeKind::Function { .. } => 0,
            TypeKind::Record { tag, .. } => {
                tags.record(tag).map(|layout| layout.size).unwrap_or(0)
            }
            TypeKind::Enum { .. } => 4,
        }
    }

    pub fn align(&self, tags: &TagTable) -> u64 {
        match &self.kind {
            TypeKind::Void => 1,
            TypeKind::Integer { rank, .. } => int_rank_size(*rank),
            TypeKind::Float { rank } => match rank {
                FloatRank::Float => 4,
                FloatRank::Double | FloatRank::LongDouble => 8,
            },
            TypeKind::Pointer { .. } => 8,
            TypeKind::Array { element, .. } => element.align(tags),
            TypeKind::Function { .. } => 1,
            TypeKind::Record { tag, .. } => {
                tags.record(tag).map(|layout| layout.align).unwrap_or(1)
            }
            TypeKind::Enum { .. } => 4,
        }
    }

    /// Complete enough to declare an object of this type.
    pub fn is_complete(&self, tags: &TagTable) -> bool {
        match &self.kind {
            TypeKind::Void => false,
            TypeKind::Array { element, length } => {
                length.is_some() && element.is_complete(tags)
            }
            TypeKind::Record { tag, .. } => {
                tags.record(tag).map(|layout| layout.complete).unwrap_or(false)
            }
            _ => true,
        }
    }
}

fn int_rank_size(rank: IntRank) -> u64 {
    match rank {
        IntRank::Char => 1,
        IntRank::Short => 2,
        IntRank::Int => 4,
        IntRank::Long | IntRank::LongLong => 8,
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifiers.is_const {
            write!(f, "const ")?;
        }
        if self.qualifiers.is_volatile {
            write!(f, "volatile ")?;
        }
        match &self.kind {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Integer { rank, unsigned } => {
                if *unsigned {
                    write!(f, "unsigned ")?;
                }
                match rank {
                    IntRank::Char => write!(f, "char"),
                    IntRank::Short => write!(f, "short"),
                    IntRank::Int => write!(f, "int"),
                    IntRank::Long => write!(f, "long"),
                    IntRank::LongLong => write!(f, "long long"),
                }
            }
            TypeKind::Float { rank } => match rank {
                FloatRank::Float => write!(f, "float"),
                FloatRank::Double => write!(f, "double"),
                FloatRank::LongDouble => write!(f, "long double"),
            },
            TypeKind::Pointer { pointee } => write!(f, "{} *", pointee),
            TypeKind::Array { element, length } => match length {
                Some(n) => write!(f, "{} [{}]", element, n),
                None => write!(f, "{} []", element),
            },
            TypeKind::Function {
                return_type,
                params,
                variadic,
            } => {
                write!(f, "{} (", return_type)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            TypeKind::Record { tag, is_union } => {
                if *is_union {
                    write!(f, "union {}", tag)
                } else {
                    write!(f, "struct {}", tag)
                }
            }
            TypeKind::Enum { tag } => write!(f, "enum {}", tag),
        }
    }
}

/// Structural compatibility, qualifiers ignored. Enums are compatible
/// with plain `int`.
pub fn compatible(a: &CType, b: &CType) -> bool {
    match (&a.kind, &b.kind) {
        (TypeKind::Void, TypeKind::Void) => true,
        (
            TypeKind::Integer { rank: ra, unsigned: ua },
            TypeKind::Integer { rank: rb, unsigned: ub },
        ) => ra == rb && ua == ub,
        (TypeKind::Float { rank: ra }, TypeKind::Float { rank: rb }) => ra == rb,
        (TypeKind::Pointer { pointee: pa }, TypeKind::Pointer { pointee: pb }) => {
            compatible(pa, pb)
        }
        (
            TypeKind::Array { element: ea, length: la },
            TypeKind::Array { element: eb, length: lb },
        ) => compatible(ea, eb) && (la == lb || la.is_none() || lb.is_none()),
        (
            TypeKind::Function {
                return_type: ra,
                params: pa,
                variadic: va,
            },
            TypeKind::Function {
                return_type: rb,
                params: pb,
                variadic: vb,
            },
        ) => {
            compatible(ra, rb)
                && va == vb
                && pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(x, y)| compatible(x, y))
        }
        (
            TypeKind::Record { tag: ta, is_union: ua },
            TypeKind::Record { tag: tb, is_union: ub },
        ) => ta == tb && ua == ub,
        (TypeKind::Enum { tag: ta }, TypeKind::Enum { tag: tb }) => ta == tb,
        (TypeKind::Enum { .. }, TypeKind::Integer { rank, unsigned })
        | (TypeKind::Integer { rank, unsigned }, TypeKind::Enum { .. }) => {
            *rank == IntRank::Int && !*unsigned
        }
        _ => false,
    }
}

/// Outcome of testing an implicit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    Allowed,
    /// Allowed, but worth a diagnostic (pointer/integer mixing).
    AllowedWithWarning(&'static str),
    Forbidden,
}

/// Implicit-conversion rules for assignment-like contexts. The source is
/// expected to be decayed already; `source_is_null_constant` marks a
/// literal integer `0`.
pub fn assignable(target: &CType, source: &CType, source_is_null_constant: bool) -> Assignability {
    if compatible(target, source) {
        return Assignability::Allowed;
    }
    if target.is_arithmetic() && source.is_arithmetic() {
        return Assignability::Allowed;
    }
    if target.is_pointer() && source.is_pointer() {
        if target.is_void_pointer() || source.is_void_pointer() {
            return Assignability::Allowed;
        }
        return Assignability::AllowedWithWarning("incompatible pointer types");
    }
    if target.is_pointer() && source_is_null_constant {
        return Assignability::Allowed;
    }
    if target.is_pointer() && source.is_integer() {
        return Assignability::AllowedWithWarning("implicit conversion of integer to pointer");
    }
    if target.is_integer() && source.is_pointer() {
        return Assignability::AllowedWithWarning("implicit conversion of pointer to integer");
    }
    Assignability::Forbidden
}

/// Integral promotion: anything narrower than `int` widens to `int`;
/// enums become `int`. Qualifiers do not survive promotion.
pub fn integral_promotion(ty: &CType) -> CType {
    match &ty.kind {
        TypeKind::Integer { rank, .. } if *rank < IntRank::Int => CType::int(),
        TypeKind::Enum { .. } => CType::int(),
        _ => CType::new(ty.kind.clone()),
    }
}

/// The usual arithmetic conversions: both operands promote, then the
/// common type follows the ladder
/// `long double > double > float > unsigned long long > long long >
///  unsigned long > long > unsigned int > int`.
pub fn usual_arithmetic_conversion(a: &CType, b: &CType) -> CType {
    let a = integral_promotion(a);
    let b = integral_promotion(b);
    if ladder_position(&a) >= ladder_position(&b) { a } else { b }
}

fn ladder_position(ty: &CType) -> u8 {
    match &ty.kind {
        TypeKind::Float { rank } => match rank {
            FloatRank::LongDouble => 15,
            FloatRank::Double => 14,
            FloatRank::Float => 13,
        },
        TypeKind::Integer { rank, unsigned } => match (rank, unsigned) {
            (IntRank::LongLong, true) => 12,
            (IntRank::LongLong, false) => 11,
            (IntRank::Long, true) => 10,
            (IntRank::Long, false) => 9,
            (IntRank::Int, true) => 8,
            _ => 7,
        },
        // Promotion has already rewritten enums and narrow integers.
        _ => 0,
    }
}

/// One member of a completed record layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMember {
    pub name: String,
    pub ty: CType,
    pub offset: u64,
}

/// Layout of a struct or union behind a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub tag: String,
    pub is_union: bool,
    pub complete: bool,
    pub members: Vec<RecordMember>,
    pub size: u64,
    pub align: u64,
}

impl RecordLayout {
    pub fn member(&self, name: &str) -> Option<&RecordMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// An enum definition behind a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub tag: String,
    pub enumerators: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagEntry {
    Record(RecordLayout),
    Enum(EnumDef),
}

/// The single flat tag namespace of a translation unit. `struct`/`union`
/// and `enum` tags all live here; lookup is by name only.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    entries: HashMap<String, TagEntry>,
    /// Tags in declaration order, for deterministic dumps.
    order: Vec<String>,
}

impl TagTable {
    pub fn new() -> Self {
        TagTable::default()
    }

    pub fn lookup(&self, tag: &str) -> Option<&TagEntry> {
        self.entries.get(tag)
    }

    pub fn record(&self, tag: &str) -> Option<&RecordLayout> {
        match self.entries.get(tag) {
            Some(TagEntry::Record(layout)) => Some(layout),
            _ => None,
        }
    }

    pub fn enumeration(&self, tag: &str) -> Option<&EnumDef> {
        match self.entries.get(tag) {
            Some(TagEntry::Enum(def)) => Some(def),
            _ => None,
        }
    }

    /// Forward-declare a record tag. A no-op if the tag already exists
    /// with the same flavor; an error if it names an enum or the other
    /// record flavor.
    pub fn declare_record(&mut self, tag: &str, is_union: bool) -> Result<(), String> {
        match self.entries.get(tag) {
            None => {
                self.order.push(tag.to_string());
                self.entries.insert(
                    tag.to_string(),
                    TagEntry::Record(RecordLayout {
                        tag: tag.to_string(),
                        is_union,
                        complete: false,
                        members: Vec::new(),
                        size: 0,
                        align: 1,
                    }),
                );
                Ok(())
            }
            Some(TagEntry::Record(layout)) if layout.is_union == is_union => Ok(()),
            Some(_) => Err(format!("'{}' redeclared as a different tag kind", tag)),
        }
    }

    /// Complete a record tag with its members, computing C layout: each
    /// member offset rounds the running offset up to the member's
    /// alignment; the record size pads to the record's own alignment.
    /// Union members all sit at offset 0.
    pub fn complete_record(
        &mut self,
        tag: &str,
        is_union: bool,
        members: Vec<(String, CType)>,
    ) -> Result<(), String> {
        if let Some(TagEntry::Record(existing)) = self.entries.get(tag) {
            if existing.complete {
                return Err(format!(
                    "redefinition of '{}{}'",
                    if is_union { "union " } else { "struct " },
                    tag
                ));
            }
            if existing.is_union != is_union {
                return Err(format!("'{}' redeclared as a different tag kind", tag));
            }
        } else if self.entries.contains_key(tag) {
            return Err(format!("'{}' redeclared as a different tag kind", tag));
        } else {
            self.order.push(tag.to_string());
        }

        let mut laid_out = Vec::with_capacity(members.len());
        let mut offset: u64 = 0;
        let mut max_align: u64 = 1;
        let mut max_size: u64 = 0;
        for (name, ty) in members {
            let member_size = ty.size(self);
            let member_align = ty.align(self).max(1);
            max_align = max_align.max(member_align);
            max_size = max_size.max(member_size);
            let member_offset = if is_union {
                0
            } else {
                offset = round_up(offset, member_align);
                let at = offset;
                offset += member_size;
                at
            };
            laid_out.push(RecordMember {
                name,
                ty,
                offset: member_offset,
            });
        }
        let size = if is_union {
            round_up(max_size, max_align)
        } else {
            round_up(offset, max_align)
        };

        self.entries.insert(
            tag.to_string(),
            TagEntry::Record(RecordLayout {
                tag: tag.to_string(),
                is_union,
                complete: true,
                members: laid_out,
                size,
                align: max_align,
            }),
        );
        Ok(())
    }

    /// Define an enum tag with its enumerator table.
    pub fn define_enum(&mut self, tag: &str, enumerators: Vec<(String, i64)>) -> Result<(), String> {
        if self.entries.contains_key(tag) {
            return Err(format!("redefinition of 'enum {}'", tag));
        }
        self.order.push(tag.to_string());
        self.entries.insert(
            tag.to_string(),
            TagEntry::Enum(EnumDef {
                tag: tag.to_string(),
                enumerators,
            }),
        );
        Ok(())
    }

    /// Tags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagEntry)> {
        self.order
            .iter()
            .filter_map(|tag| self.entries.get(tag).map(|e| (tag.as_str(), e)))
    }
}

pub fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lp64_sizes() {
        let tags = TagTable::new();
        assert_eq!(CType::char_type().size(&tags), 1);
        assert_eq!(CType::integer(IntRank::Short, false).size(&tags), 2);
        assert_eq!(CType::int().size(&tags), 4);
        assert_eq!(CType::long().size(&tags), 8);
        assert_eq!(CType::integer(IntRank::LongLong, true).size(&tags), 8);
        assert_eq!(CType::float(FloatRank::Float).size(&tags), 4);
        assert_eq!(CType::double().size(&tags), 8);
        assert_eq!(CType::pointer_to(CType::char_type()).size(&tags), 8);
        assert_eq!(CType::array_of(CType::int(), Some(3)).size(&tags), 12);
        assert_eq!(CType::array_of(CType::int(), None).size(&tags), 0);
    }

    #[test]
    fn test_struct_layout_with_padding() {
        let mut tags = TagTable::new();
        tags.complete_record(
            "s",
            false,
            vec![
                ("c".to_string(), CType::char_type()),
                ("x".to_string(), CType::int()),
                ("p".to_string(), CType::pointer_to(CType::void())),
            ],
        )
        .unwrap();
        let layout = tags.record("s").unwrap();
        assert_eq!(layout.member("c").unwrap().offset, 0);
        assert_eq!(layout.member("x").unwrap().offset, 4);
        assert_eq!(layout.member("p").unwrap().offset, 8);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.align, 8);
    }

    #[test]
    fn test_trailing_padding_rounds_to_alignment() {
        let mut tags = TagTable::new();
        tags.complete_record(
            "t",
            false,
            vec![
                ("x".to_string(), CType::long()),
                ("c".to_string(), CType::char_type()),
            ],
        )
        .unwrap();
        assert_eq!(tags.record("t").unwrap().size, 16);
    }

    #[test]
    fn test_union_layout() {
        let mut tags = TagTable::new();
        tags.complete_record(
            "u",
            true,
            vec![
                ("c".to_string(), CType::char_type()),
                ("d".to_string(), CType::double()),
            ],
        )
        .unwrap();
        let layout = tags.record("u").unwrap();
        assert_eq!(layout.member("c").unwrap().offset, 0);
        assert_eq!(layout.member("d").unwrap().offset, 0);
        assert_eq!(layout.size, 8);
        assert_eq!(layout.align, 8);
    }

    #[test]
    fn test_forward_declaration_then_completion() {
        let mut tags = TagTable::new();
        tags.declare_record("node", false).unwrap();
        assert!(!CType::record("node", false).is_complete(&tags));
        tags.complete_record(
            "node",
            false,
            vec![
                ("value".to_string(), CType::int()),
                (
                    "next".to_string(),
                    CType::pointer_to(CType::record("node", false)),
                ),
            ],
        )
        .unwrap();
        assert!(CType::record("node", false).is_complete(&tags));
        assert_eq!(CType::record("node", false).size(&tags), 16);
    }

    #[test]
    fn test_record_redefinition_rejected() {
        let mut tags = TagTable::new();
        tags.complete_record("s", false, vec![("x".to_string(), CType::int())])
            .unwrap();
        assert!(
            tags.complete_record("s", false, vec![("y".to_string(), CType::int())])
                .is_err()
        );
    }

    #[test]
    fn test_tag_kind_conflicts_rejected() {
        let mut tags = TagTable::new();
        tags.declare_record("t", false).unwrap();
        assert!(tags.declare_record("t", true).is_err());
        assert!(tags.define_enum("t", vec![]).is_err());
    }

    #[test]
    fn test_compatibility() {
        assert!(compatible(&CType::int(), &CType::int()));
        assert!(!compatible(&CType::int(), &CType::unsigned_long()));
        assert!(!compatible(
            &CType::integer(IntRank::Int, false),
            &CType::integer(IntRank::Int, true)
        ));
        assert!(compatible(
            &CType::pointer_to(CType::int()),
            &CType::pointer_to(CType::int())
        ));
        assert!(!compatible(
            &CType::pointer_to(CType::int()),
            &CType::pointer_to(CType::long())
        ));
        // Unknown array length matches any length.
        assert!(compatible(
            &CType::array_of(CType::int(), None),
            &CType::array_of(CType::int(), Some(4))
        ));
        assert!(!compatible(
            &CType::array_of(CType::int(), Some(3)),
            &CType::array_of(CType::int(), Some(4))
        ));
        // Enums are compatible with int.
        assert!(compatible(&CType::enumeration("e"), &CType::int()));
        assert!(!compatible(
            &CType::enumeration("e"),
            &CType::integer(IntRank::Int, true)
        ));
        assert!(!compatible(&CType::enumeration("a"), &CType::enumeration("b")));
    }

    #[test]
    fn test_function_compatibility() {
        let f1 = CType::function(CType::int(), vec![CType::int()], false);
        let f2 = CType::function(CType::int(), vec![CType::int()], false);
        let f3 = CType::function(CType::int(), vec![CType::int()], true);
        let f4 = CType::function(CType::int(), vec![CType::long()], false);
        assert!(compatible(&f1, &f2));
        assert!(!compatible(&f1, &f3));
        assert!(!compatible(&f1, &f4));
    }

    #[test]
    fn test_usual_arithmetic_conversions() {
        let cases = [
            (CType::char_type(), CType::char_type(), CType::int()),
            (CType::int(), CType::long(), CType::long()),
            (CType::unsigned_long(), CType::long(), CType::unsigned_long()),
            (CType::int(), CType::double(), CType::double()),
            (
                CType::float(FloatRank::Float),
                CType::long(),
                CType::float(FloatRank::Float),
            ),
            (CType::enumeration("e"), CType::long(), CType::long()),
        ];
        for (a, b, expect) in cases {
            assert_eq!(usual_arithmetic_conversion(&a, &b), expect);
            assert_eq!(usual_arithmetic_conversion(&b, &a), expect);
        }
    }

    #[test]
    fn test_integral_promotion() {
        assert_eq!(integral_promotion(&CType::char_type()), CType::int());
        assert_eq!(
            integral_promotion(&CType::integer(IntRank::Short, true)),
            CType::int()
        );
        assert_eq!(integral_promotion(&CType::enumeration("e")), CType::int());
        assert_eq!(integral_promotion(&CType::long()), CType::long());
    }

    #[test]
    fn test_assignability() {
        let int_ptr = CType::pointer_to(CType::int());
        let void_ptr = CType::pointer_to(CType::void());
        let long_ptr = CType::pointer_to(CType::long());
        assert_eq!(
            assignable(&CType::int(), &CType::double(), false),
            Assignability::Allowed
        );
        assert_eq!(assignable(&int_ptr, &void_ptr, false), Assignability::Allowed);
        assert_eq!(assignable(&void_ptr, &int_ptr, false), Assignability::Allowed);
        assert_eq!(assignable(&int_ptr, &CType::int(), true), Assignability::Allowed);
        assert!(matches!(
            assignable(&int_ptr, &long_ptr, false),
            Assignability::AllowedWithWarning(_)
        ));
        assert!(matches!(
            assignable(&int_ptr, &CType::int(), false),
            Assignability::AllowedWithWarning(_)
        ));
        assert_eq!(
            assignable(&CType::record("s", false), &CType::int(), false),
            Assignability::Forbidden
        );
    }

    #[test]
    fn test_decay() {
        let arr = CType::array_of(CType::int(), Some(3));
        assert_eq!(arr.decayed(), CType::pointer_to(CType::int()));
        let func = CType::function(CType::void(), vec![], false);
        assert_eq!(func.decayed(), CType::pointer_to(func.clone()));
        assert_eq!(CType::int().decayed(), CType::int());
    }

    #[test]
    fn test_display() {
        assert_eq!(CType::int().to_string(), "int");
        assert_eq!(
            CType::integer(IntRank::LongLong, true).to_string(),
            "unsigned long long"
        );
        assert_eq!(CType::pointer_to(CType::char_type()).to_string(), "char *");
        assert_eq!(CType::array_of(CType::int(), Some(3)).to_string(), "int [3]");
        assert_eq!(CType::record("point", false).to_string(), "struct point");
    }
}
