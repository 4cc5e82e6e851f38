use crate::{ByteOrder, DispatchTable};

/// How the interpreter finds the handler of an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dispatch {
    /// Opcode slots hold opcode numbers.
    #[default]
    Switch,
    /// Opcode slots hold handler offsets into the given table.
    Threaded(DispatchTable),
}

/// Whether the runtime interprets bytecode or runs ahead-of-time compiled
/// native code. Only bytecode units can be loaded and released at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Bytecode,
    Native,
}

#[derive(Debug, Clone)]
pub struct CodeSettings {
    /// Byte order the compiler emitted the code words in.
    pub byte_order: ByteOrder,
    pub dispatch: Dispatch,
    pub mode: ExecutionMode,
    /// The global table grows in multiples of this many slots.
    pub global_granularity: usize,
    /// Initial capacity of the fragment table.
    pub initial_fragment_capacity: usize,
    /// Serialized section table of the running program, if it has one.
    pub section_table: Option<Vec<u8>>,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            dispatch: Dispatch::Switch,
            mode: ExecutionMode::Bytecode,
            global_granularity: 256,
            initial_fragment_capacity: 8,
            section_table: None,
        }
    }
}

impl CodeSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.global_granularity == 0 {
            return Err("global_granularity must be > 0");
        }
        if !self.global_granularity.is_power_of_two() {
            return Err("global_granularity must be a power of two");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = CodeSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.global_granularity, 256);
        assert_eq!(settings.mode, ExecutionMode::Bytecode);
        assert_eq!(settings.dispatch, Dispatch::Switch);
    }

    #[test]
    fn granularity_is_checked() {
        let mut settings = CodeSettings {
            global_granularity: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        settings.global_granularity = 100;
        assert!(settings.validate().is_err());
        settings.global_granularity = 64;
        assert!(settings.validate().is_ok());
    }
}
