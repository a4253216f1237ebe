//! Typed variable operations
//!
//! Every operation resolves the variable's range through the registry and
//! goes through the same permission-checked paths as raw writes.

use super::Engine;
use crate::allocator::Placement;
use crate::codec::{bits_to_decimal, bits_to_string, decimal_to_bits, string_to_bits};
use crate::error::{BitramError, Result};
use crate::variables::{VarType, Variable, VariableValue};
use tracing::debug;

impl Engine {
    /// Declare a variable of `length` bits holding `initial`.
    ///
    /// The value is encoded as a `length`-bit two's-complement integer for
    /// every type. Fails with `NameCollision` if `name` exists, `EncodingError`
    /// if `initial` does not fit and `OutOfMemory` if no window is found.
    /// Returns the chosen position.
    pub fn declare(
        &mut self,
        name: &str,
        length: usize,
        initial: i64,
        var_type: VarType,
        alignment: usize,
        placement: Placement,
    ) -> Result<usize> {
        self.variables.check_available(name)?;
        let bits = decimal_to_bits(initial, Some(length))?;
        self.declare_bits(name, bits, var_type, alignment, placement)
    }

    /// Declare an `int` variable placed at the lowest free address
    pub fn declare_int(&mut self, name: &str, length: usize, initial: i64) -> Result<usize> {
        self.declare(name, length, initial, VarType::Int, 1, Placement::LeftFit)
    }

    /// Declare a string variable sized to `8 * text.chars().count()` bits
    pub fn declare_string(
        &mut self,
        name: &str,
        text: &str,
        alignment: usize,
        placement: Placement,
    ) -> Result<usize> {
        self.variables.check_available(name)?;
        let bits = string_to_bits(text);
        self.declare_bits(name, bits, VarType::String, alignment, placement)
    }

    fn declare_bits(
        &mut self,
        name: &str,
        bits: Vec<bool>,
        var_type: VarType,
        alignment: usize,
        placement: Placement,
    ) -> Result<usize> {
        let length = bits.len();
        let position = self
            .allocator
            .allocate(length, placement, alignment, self.rng.as_mut())?;

        // Leftover restrictions on the free range must not leak a reservation
        if let Err(err) = self.memory.write(&self.permissions, position, &bits) {
            self.allocator.release(position, length);
            return Err(err);
        }

        debug!(
            "Declared {} variable '{}' ({} bits at {})",
            var_type, name, length, position
        );
        self.variables.insert(
            name,
            Variable {
                position,
                length,
                var_type,
                alignment,
            },
        );
        Ok(position)
    }

    /// Registry entry of a variable
    pub fn variable(&self, name: &str) -> Result<&Variable> {
        self.variables.get(name)
    }

    /// All variables ordered by position
    pub fn variables(&self) -> Vec<(&str, &Variable)> {
        self.variables.by_position()
    }

    /// Decoded integer for `int` variables, raw bits for everything else
    pub fn read_variable(&self, name: &str) -> Result<VariableValue> {
        let variable = self.variables.get(name)?;
        let bits = self.read(variable.position, variable.length)?;
        match variable.var_type {
            VarType::Int => Ok(VariableValue::Int(bits_to_decimal(&bits)?)),
            _ => Ok(VariableValue::Bits(bits)),
        }
    }

    /// Value of an `int` variable
    pub fn read_int(&self, name: &str) -> Result<i64> {
        let variable = self.expect_type(name, &VarType::Int)?;
        let bits = self.read(variable.position, variable.length)?;
        bits_to_decimal(&bits)
    }

    /// Bits of any variable decoded as 8-bit characters
    pub fn read_string(&self, name: &str) -> Result<String> {
        Ok(bits_to_string(&self.read_bits(name)?))
    }

    /// Raw bits of any variable
    pub fn read_bits(&self, name: &str) -> Result<Vec<bool>> {
        let variable = self.variables.get(name)?;
        self.read(variable.position, variable.length)
    }

    /// Store `value` in an `int` variable at its fixed width
    pub fn write_int(&mut self, name: &str, value: i64) -> Result<()> {
        let (position, length) = {
            let variable = self.expect_type(name, &VarType::Int)?;
            (variable.position, variable.length)
        };
        let bits = decimal_to_bits(value, Some(length))?;
        self.write(position, &bits)
    }

    /// Store `text`, zero-padded to the variable's allocated length.
    ///
    /// Fails with `ValueTooLarge` if the encoded text is longer than the variable.
    pub fn write_string(&mut self, name: &str, text: &str) -> Result<()> {
        let variable = self.variables.get(name)?;
        let (position, length) = (variable.position, variable.length);

        let mut bits = string_to_bits(text);
        if bits.len() > length {
            return Err(BitramError::ValueTooLarge {
                needed: bits.len(),
                available: length,
            });
        }
        bits.resize(length, false);
        self.write(position, &bits)
    }

    /// Add one to an `int` variable and return the new value
    pub fn increment(&mut self, name: &str) -> Result<i64> {
        self.step(name, 1)
    }

    /// Subtract one from an `int` variable and return the new value
    pub fn decrement(&mut self, name: &str) -> Result<i64> {
        self.step(name, -1)
    }

    fn step(&mut self, name: &str, delta: i64) -> Result<i64> {
        let current = self.read_int(name)?;
        let next = current.checked_add(delta).ok_or_else(|| {
            BitramError::EncodingError(format!("{} + {} overflows", current, delta))
        })?;
        self.write_int(name, next)?;
        Ok(next)
    }

    /// Bit offset of a variable
    pub fn location(&self, name: &str) -> Result<usize> {
        self.variables.location(name)
    }

    /// Bit offset of a variable as `0x..` hex
    pub fn location_hex(&self, name: &str) -> Result<String> {
        Ok(format!("{:#x}", self.location(name)?))
    }

    /// Bit count of a variable
    pub fn length(&self, name: &str) -> Result<usize> {
        self.variables.length(name)
    }

    /// Free a variable's range and drop its registry entry
    pub fn free_variable(&mut self, name: &str) -> Result<()> {
        let variable = self.variables.get(name)?;
        let (position, length) = (variable.position, variable.length);
        self.free(position, length)?;
        self.variables.remove(name)?;
        debug!("Removed variable '{}'", name);
        Ok(())
    }

    fn expect_type(&self, name: &str, expected: &VarType) -> Result<&Variable> {
        let variable = self.variables.get(name)?;
        if &variable.var_type != expected {
            return Err(BitramError::TypeMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                found: variable.var_type.to_string(),
            });
        }
        Ok(variable)
    }
}

#[cfg(test)]
mod tests {
    use crate::allocator::Placement;
    use crate::config::EngineConfig;
    use crate::error::BitramError;
    use crate::variables::{VarType, VariableValue};
    use crate::Engine;

    fn engine() -> Engine {
        let mut config = EngineConfig::new(512);
        config.seed = Some(1);
        Engine::from_config(config).unwrap()
    }

    #[test]
    fn test_declare_and_read_int() {
        let mut engine = engine();
        let position = engine.declare_int("c", 8, 10).unwrap();
        assert_eq!(position, 0);
        assert_eq!(engine.read_int("c").unwrap(), 10);
        assert_eq!(engine.read_variable("c").unwrap(), VariableValue::Int(10));
        assert_eq!(engine.length("c").unwrap(), 8);
    }

    #[test]
    fn test_increment_decrement() {
        let mut engine = engine();
        engine.declare_int("c", 8, 10).unwrap();
        assert_eq!(engine.increment("c").unwrap(), 11);
        assert_eq!(engine.decrement("c").unwrap(), 10);
        assert_eq!(engine.read_int("c").unwrap(), 10);
    }

    #[test]
    fn test_increment_overflow_leaves_value() {
        let mut engine = engine();
        engine.declare_int("small", 4, 7).unwrap();
        assert!(matches!(
            engine.increment("small"),
            Err(BitramError::EncodingError(_))
        ));
        assert_eq!(engine.read_int("small").unwrap(), 7);
    }

    #[test]
    fn test_negative_values() {
        let mut engine = engine();
        engine.declare_int("n", 16, -1234).unwrap();
        assert_eq!(engine.read_int("n").unwrap(), -1234);
        engine.write_int("n", -32768).unwrap();
        assert_eq!(engine.read_int("n").unwrap(), -32768);
    }

    #[test]
    fn test_name_collision_keeps_original() {
        let mut engine = engine();
        engine.declare_int("a", 8, 1).unwrap();
        let used = engine.allocator().used_bits();

        assert!(matches!(
            engine.declare_int("a", 8, 2),
            Err(BitramError::NameCollision(_))
        ));
        assert_eq!(engine.read_int("a").unwrap(), 1);
        assert_eq!(engine.allocator().used_bits(), used);
    }

    #[test]
    fn test_encoding_failure_allocates_nothing() {
        let mut engine = engine();
        assert!(engine.declare_int("big", 8, 300).is_err());
        assert_eq!(engine.allocator().used_bits(), 0);
        assert!(engine.variable("big").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let mut engine = engine();
        engine
            .declare_string("s", "abc", 1, Placement::LeftFit)
            .unwrap();

        assert!(matches!(
            engine.write_int("s", 1),
            Err(BitramError::TypeMismatch { .. })
        ));
        assert!(matches!(
            engine.read_int("s"),
            Err(BitramError::TypeMismatch { .. })
        ));
        assert!(matches!(
            engine.increment("s"),
            Err(BitramError::TypeMismatch { .. })
        ));
        assert!(matches!(
            engine.read_variable("s").unwrap(),
            VariableValue::Bits(bits) if bits.len() == 24
        ));
    }

    #[test]
    fn test_opaque_variable_reads_bits() {
        let mut engine = engine();
        engine
            .declare(
                "flags",
                4,
                5,
                VarType::Opaque("flags".into()),
                1,
                Placement::LeftFit,
            )
            .unwrap();
        assert_eq!(
            engine.read_variable("flags").unwrap(),
            VariableValue::Bits(vec![false, true, false, true])
        );
    }

    #[test]
    fn test_write_string_too_large() {
        let mut engine = engine();
        engine
            .declare_string("greet", "hey", 1, Placement::LeftFit)
            .unwrap();
        assert!(matches!(
            engine.write_string("greet", "hello"),
            Err(BitramError::ValueTooLarge {
                needed: 40,
                available: 24
            })
        ));
        assert_eq!(engine.read_string("greet").unwrap(), "hey");
    }

    #[test]
    fn test_aligned_declaration() {
        let mut engine = engine();
        engine.declare_int("pad", 3, 0).unwrap();
        let position = engine
            .declare("aligned_int", 16, 1234, VarType::Int, 8, Placement::Aligned)
            .unwrap();
        assert_eq!(position, 8);
        assert_eq!(engine.location_hex("aligned_int").unwrap(), "0x8");
        assert_eq!(engine.read_int("aligned_int").unwrap(), 1234);
    }

    #[test]
    fn test_random_placement_respects_alignment() {
        let mut engine = engine();
        for i in 0..8 {
            let position = engine
                .declare(&format!("r{}", i), 8, i, VarType::Int, 16, Placement::Random)
                .unwrap();
            assert_eq!(position % 16, 0);
        }
        for i in 0..8 {
            assert_eq!(engine.read_int(&format!("r{}", i)).unwrap(), i);
        }
    }

    #[test]
    fn test_declare_rolls_back_on_denied_write() {
        let mut engine = engine();
        engine.set_permissions(0, 8, true, false).unwrap();

        assert!(matches!(
            engine.declare_int("x", 8, 1),
            Err(BitramError::PermissionDenied { .. })
        ));
        assert_eq!(engine.allocator().used_bits(), 0);
        assert!(engine.variable("x").is_err());
    }

    #[test]
    fn test_free_variable_removes_entry() {
        let mut engine = engine();
        engine.declare_int("x", 8, 42).unwrap();
        engine.free_variable("x").unwrap();

        assert!(matches!(
            engine.read_int("x"),
            Err(BitramError::UnknownVariable(_))
        ));
        assert_eq!(engine.allocator().used_bits(), 0);
    }

    #[test]
    fn test_raw_free_leaves_stale_entry() {
        let mut engine = engine();
        engine.declare_int("x", 8, 42).unwrap();
        let (position, length) = (engine.location("x").unwrap(), engine.length("x").unwrap());
        engine.free(position, length).unwrap();

        // Entry survives and now reads the zeroed range
        assert_eq!(engine.read_int("x").unwrap(), 0);
    }

    #[test]
    fn test_unknown_variable() {
        let mut engine = engine();
        assert!(matches!(
            engine.location("nope"),
            Err(BitramError::UnknownVariable(_))
        ));
        assert!(engine.write_string("nope", "x").is_err());
        assert!(engine.free_variable("nope").is_err());
    }

    #[test]
    fn test_invalid_name() {
        let mut engine = engine();
        assert!(matches!(
            engine.declare_int("9lives", 8, 0),
            Err(BitramError::InvalidVariableName(_))
        ));
    }
}
