//! Runtime-library manifest.
//!
//! The runtime exposes `printf`, `malloc`, and friends as ordinary
//! extern functions. With no preprocessor in the pipeline there are no
//! headers to declare them, so the driver pre-registers the manifest's
//! signatures with the analyzer before analysis runs. The default
//! manifest is embedded; `CompilerConfig` can disable it (freestanding
//! builds) or layer an extra manifest from disk on top.

use crate::types::{CType, FloatRank, IntRank};
use serde::Deserialize;

/// Embedded default manifest.
pub static DEFAULT_RUNTIME: &str = include_str!("runtime.toml");

/// One extern function exported by the runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeFn {
    pub name: String,
    pub returns: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub variadic: bool,
}

impl RuntimeFn {
    /// Resolve the declared signature to a function type.
    pub fn signature(&self) -> Result<CType, String> {
        let return_type = parse_c_type(&self.returns)
            .map_err(|e| format!("function '{}': {}", self.name, e))?;
        let mut params = Vec::with_capacity(self.params.len());
        for param in &self.params {
            params.push(
                parse_c_type(param).map_err(|e| format!("function '{}': {}", self.name, e))?,
            );
        }
        Ok(CType::function(return_type, params, self.variadic))
    }
}

/// A parsed runtime manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeManifest {
    #[serde(rename = "function", default)]
    pub functions: Vec<RuntimeFn>,
}

impl RuntimeManifest {
    /// Parse a manifest from TOML text.
    pub fn parse(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("failed to parse runtime manifest: {}", e))
    }

    /// The embedded default manifest.
    pub fn default_manifest() -> Result<Self, String> {
        Self::parse(DEFAULT_RUNTIME)
    }
}

/// Read a C type name as written in a manifest: a base type phrase
/// followed by optional `*`s (`"unsigned long"`, `"char *"`,
/// `"void **"`).
pub fn parse_c_type(text: &str) -> Result<CType, String> {
    let trimmed = text.trim();
    let mut pointer_depth = 0;
    let mut base_end = trimmed.len();
    for (index, c) in trimmed.char_indices().rev() {
        match c {
            '*' => {
                pointer_depth += 1;
                base_end = index;
            }
            c if c.is_whitespace() => base_end = index,
            _ => break,
        }
    }
    let base_text = trimmed[..base_end].trim();
    let words: Vec<&str> = base_text.split_whitespace().collect();
    let base = match words.as_slice() {
        ["void"] => CType::void(),
        ["char"] | ["signed", "char"] => CType::char_type(),
        ["unsigned", "char"] => CType::integer(IntRank::Char, true),
        ["short"] | ["short", "int"] => CType::integer(IntRank::Short, false),
        ["unsigned", "short"] | ["unsigned", "short", "int"] => {
            CType::integer(IntRank::Short, true)
        }
        ["int"] | ["signed"] | ["signed", "int"] => CType::int(),
        ["unsigned"] | ["unsigned", "int"] => CType::integer(IntRank::Int, true),
        ["long"] | ["long", "int"] => CType::long(),
        ["unsigned", "long"] | ["unsigned", "long", "int"] => CType::unsigned_long(),
        ["long", "long"] | ["long", "long", "int"] => CType::integer(IntRank::LongLong, false),
        ["unsigned", "long", "long"] => CType::integer(IntRank::LongLong, true),
        ["float"] => CType::float(FloatRank::Float),
        ["double"] => CType::double(),
        _ => return Err(format!("unknown type name '{}'", text.trim())),
    };
    let mut ty = base;
    for _ in 0..pointer_depth {
        ty = CType::pointer_to(ty);
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_type_names() {
        assert_eq!(parse_c_type("int").unwrap(), CType::int());
        assert_eq!(parse_c_type("unsigned long").unwrap(), CType::unsigned_long());
        assert_eq!(parse_c_type("double").unwrap(), CType::double());
        assert_eq!(parse_c_type("void").unwrap(), CType::void());
    }

    #[test]
    fn test_parse_pointer_type_names() {
        assert_eq!(
            parse_c_type("char *").unwrap(),
            CType::pointer_to(CType::char_type())
        );
        assert_eq!(
            parse_c_type("void *").unwrap(),
            CType::pointer_to(CType::void())
        );
        assert_eq!(
            parse_c_type("char **").unwrap(),
            CType::pointer_to(CType::pointer_to(CType::char_type()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert!(parse_c_type("quux").is_err());
        assert!(parse_c_type("").is_err());
    }

    #[test]
    fn test_default_manifest_parses_and_resolves() {
        let manifest = RuntimeManifest::default_manifest().unwrap();
        assert!(manifest.functions.len() >= 20);
        for function in &manifest.functions {
            function
                .signature()
                .unwrap_or_else(|e| panic!("bad signature: {}", e));
        }
        let printf = manifest
            .functions
            .iter()
            .find(|f| f.name == "printf")
            .expect("printf missing");
        assert!(printf.variadic);
        assert_eq!(
            printf.signature().unwrap(),
            CType::function(
                CType::int(),
                vec![CType::pointer_to(CType::char_type())],
                true
            )
        );
    }

    #[test]
    fn test_manifest_round_trip_from_text() {
        let manifest = RuntimeManifest::parse(
            "[[function]]\nname = \"sqrt\"\nreturns = \"double\"\nparams = [\"double\"]\n",
        )
        .unwrap();
        assert_eq!(manifest.functions.len(), 1);
        assert_eq!(
            manifest.functions[0].signature().unwrap(),
            CType::function(CType::double(), vec![CType::double()], false)
        );
    }

    #[test]
    fn test_malformed_manifest_reports() {
        assert!(RuntimeManifest::parse("[[function]]\nreturns = \"int\"\n").is_err());
    }
}
