//! Quadruple IR.
//!
//! The machine-oriented intermediate form handed to the backend: a bundle
//! of global variables with flattened initializers, per-function
//! quadruple sequences, and the string literal pool. The textual form
//! rendered here is the contract with the driver's `-i` dump: each quad
//! prints as `  OPCODE result, arg1, arg2` with trailing empty operands
//! omitted and interior ones shown as `_`; `Label` quads print as
//! `name:` with no indentation.

use crate::types::CType;
use std::fmt;

/// The fixed opcode set. `Switch`/`Case` are part of the backend
/// contract even though the generator lowers `switch` statements to a
/// comparison ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    FNeg,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    // Integer comparisons
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Float comparisons
    FEq,
    FNe,
    FLt,
    FLe,
    FGt,
    FGe,
    // Logical
    And,
    Or,
    Not,
    // Data movement
    Assign,
    Load,
    Store,
    LoadAddr,
    IndexAddr,
    MemberAddr,
    // Control flow
    Label,
    Jump,
    JumpTrue,
    JumpFalse,
    // Calls
    Param,
    Call,
    Return,
    // Conversions
    IntToFloat,
    FloatToInt,
    IntExtend,
    IntTrunc,
    PtrToInt,
    IntToPtr,
    // Switch dispatch
    Switch,
    Case,
    // Misc
    Nop,
    Comment,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A quad operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Temp(String, CType),
    Variable(String, CType),
    Global(String, CType),
    IntConst(i64, CType),
    FloatConst(f64, CType),
    StringConst(Vec<u8>),
    Label(String),
}

impl Operand {
    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    pub fn ty(&self) -> Option<&CType> {
        match self {
            Operand::Temp(_, ty)
            | Operand::Variable(_, ty)
            | Operand::Global(_, ty)
            | Operand::IntConst(_, ty)
            | Operand::FloatConst(_, ty) => Some(ty),
            _ => None,
        }
    }

    /// The label name, for `Label`/`Jump*` operands.
    pub fn label_name(&self) -> Option<&str> {
        match self {
            Operand::Label(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => write!(f, "_"),
            Operand::Temp(name, _) | Operand::Variable(name, _) | Operand::Global(name, _) => {
                write!(f, "{}", name)
            }
            Operand::IntConst(value, _) => write!(f, "{}", value),
            // Always keeps a decimal point, distinguishing float
            // constants from integer ones.
            Operand::FloatConst(value, _) => write!(f, "{:?}", value),
            Operand::StringConst(bytes) => write!(f, "\"{}\"", escape_bytes(bytes)),
            Operand::Label(name) => write!(f, "{}", name),
        }
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

/// One three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub opcode: Opcode,
    pub result: Operand,
    pub arg1: Operand,
    pub arg2: Operand,
}

impl Quad {
    pub fn new(opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) -> Self {
        Quad {
            opcode,
            result,
            arg1,
            arg2,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Quad::new(
            Opcode::Label,
            Operand::Label(name.into()),
            Operand::None,
            Operand::None,
        )
    }

    pub fn jump(target: impl Into<String>) -> Self {
        Quad::new(
            Opcode::Jump,
            Operand::Label(target.into()),
            Operand::None,
            Operand::None,
        )
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == Opcode::Label {
            return write!(f, "{}:", self.result);
        }
        write!(f, "  {}", self.opcode)?;
        let operands = [&self.result, &self.arg1, &self.arg2];
        if let Some(last) = operands.iter().rposition(|o| !o.is_none()) {
            for (i, operand) in operands.iter().take(last + 1).enumerate() {
                if i == 0 {
                    write!(f, " {}", operand)?;
                } else {
                    write!(f, ", {}", operand)?;
                }
            }
        }
        Ok(())
    }
}

/// One flattened initializer unit for a global.
#[derive(Debug, Clone, PartialEq)]
pub enum InitValue {
    /// An integer value occupying `size` bytes, little-endian.
    Integer(i64, u64),
    /// A float value occupying `size` bytes.
    Float(f64, u64),
    /// The address of a pooled string literal.
    String(String),
    /// The address of a named symbol.
    Address(String),
    /// `size` zero bytes.
    Zero(u64),
}

impl InitValue {
    pub fn size(&self) -> u64 {
        match self {
            InitValue::Integer(_, size) | InitValue::Float(_, size) | InitValue::Zero(size) => {
                *size
            }
            InitValue::String(_) | InitValue::Address(_) => 8,
        }
    }
}

impl fmt::Display for InitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitValue::Integer(value, size) => write!(f, "Integer({}, {})", value, size),
            InitValue::Float(value, size) => write!(f, "Float({:?}, {})", value, size),
            InitValue::String(label) => write!(f, "String({})", label),
            InitValue::Address(name) => write!(f, "Address({})", name),
            InitValue::Zero(size) => write!(f, "Zero({})", size),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub ty: CType,
    pub is_extern: bool,
    pub initializers: Vec<InitValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionIr {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<(String, CType)>,
    pub quads: Vec<Quad>,
    pub stack_size: u64,
    pub variadic: bool,
}

/// The complete lowered translation unit.
#[derive(Debug, Clone, Default)]
pub struct IrProgram {
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<FunctionIr>,
    /// `(label, bytes)`, emitted verbatim by the backend.
    pub string_pool: Vec<(String, Vec<u8>)>,
}

impl fmt::Display for IrProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, bytes) in &self.string_pool {
            writeln!(f, "string {} = \"{}\"", label, escape_bytes(bytes))?;
        }
        for global in &self.globals {
            if global.is_extern {
                writeln!(f, "extern {}: {}", global.name, global.ty)?;
                continue;
            }
            write!(f, "global {}: {} =", global.name, global.ty)?;
            for (i, init) in global.initializers.iter().enumerate() {
                write!(f, "{}{}", if i == 0 { " " } else { ", " }, init)?;
            }
            writeln!(f)?;
        }
        for function in &self.functions {
            write!(f, "function {}(", function.name)?;
            for (i, (name, ty)) in function.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name, ty)?;
            }
            if function.variadic {
                if !function.params.is_empty() {
                    write!(f, ", ")?;
                }
                write!(f, "...")?;
            }
            writeln!(
                f,
                ") -> {} stack={} {{",
                function.return_type, function.stack_size
            )?;
            for quad in &function.quads {
                writeln!(f, "{}", quad)?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_ty() -> CType {
        CType::int()
    }

    #[test]
    fn test_label_renders_without_indent() {
        assert_eq!(Quad::label("L0").to_string(), "L0:");
    }

    #[test]
    fn test_quad_renders_operands_in_order() {
        let quad = Quad::new(
            Opcode::Call,
            Operand::Temp("t0".to_string(), int_ty()),
            Operand::Label("f".to_string()),
            Operand::IntConst(1, int_ty()),
        );
        assert_eq!(quad.to_string(), "  Call t0, f, 1");
    }

    #[test]
    fn test_trailing_none_omitted_interior_shown() {
        let ret = Quad::new(
            Opcode::Return,
            Operand::None,
            Operand::Temp("t0".to_string(), int_ty()),
            Operand::None,
        );
        assert_eq!(ret.to_string(), "  Return _, t0");

        let param = Quad::new(
            Opcode::Param,
            Operand::None,
            Operand::IntConst(5, int_ty()),
            Operand::None,
        );
        assert_eq!(param.to_string(), "  Param _, 5");

        let bare = Quad::new(Opcode::Nop, Operand::None, Operand::None, Operand::None);
        assert_eq!(bare.to_string(), "  Nop");
    }

    #[test]
    fn test_jump_renders_target() {
        assert_eq!(Quad::jump("L3").to_string(), "  Jump L3");
        let jf = Quad::new(
            Opcode::JumpFalse,
            Operand::Temp("t1".to_string(), int_ty()),
            Operand::Label("L2".to_string()),
            Operand::None,
        );
        assert_eq!(jf.to_string(), "  JumpFalse t1, L2");
    }

    #[test]
    fn test_float_constant_keeps_decimal_point() {
        let quad = Quad::new(
            Opcode::FAdd,
            Operand::Temp("t0".to_string(), CType::double()),
            Operand::FloatConst(2.0, CType::double()),
            Operand::FloatConst(0.5, CType::double()),
        );
        assert_eq!(quad.to_string(), "  FAdd t0, 2.0, 0.5");
    }

    #[test]
    fn test_string_operand_escapes() {
        let op = Operand::StringConst(b"a\"b\n".to_vec());
        assert_eq!(op.to_string(), "\"a\\\"b\\n\"");
    }

    #[test]
    fn test_init_value_sizes() {
        assert_eq!(InitValue::Integer(7, 4).size(), 4);
        assert_eq!(InitValue::Zero(12).size(), 12);
        assert_eq!(InitValue::String(".LC0".to_string()).size(), 8);
        assert_eq!(InitValue::Address("f".to_string()).size(), 8);
    }

    #[test]
    fn test_program_rendering() {
        let program = IrProgram {
            globals: vec![GlobalVar {
                name: "x".to_string(),
                ty: int_ty(),
                is_extern: false,
                initializers: vec![InitValue::Integer(11, 4)],
            }],
            functions: vec![FunctionIr {
                name: "main".to_string(),
                return_type: int_ty(),
                params: vec![],
                quads: vec![
                    Quad::label("L0"),
                    Quad::new(
                        Opcode::Return,
                        Operand::None,
                        Operand::IntConst(0, int_ty()),
                        Operand::None,
                    ),
                ],
                stack_size: 0,
                variadic: false,
            }],
            string_pool: vec![(".LC0".to_string(), b"hi".to_vec())],
        };
        let text = program.to_string();
        assert!(text.contains("string .LC0 = \"hi\""));
        assert!(text.contains("global x: int = Integer(11, 4)"));
        assert!(text.contains("function main() -> int stack=0 {"));
        assert!(text.contains("L0:"));
        assert!(text.contains("  Return _, 0"));
    }
}
