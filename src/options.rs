//! Interpreter-level settings.

use rustc_hash::FxHashMap;

/// Tunable bridge property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeProperty {
    /// Non-zero appends a script traceback to runtime errors.
    UseTraceback,
    /// Extra stack slots reserved before pushing call results.
    StackReserve,
    /// Maximum number of values on the script stack.
    MaxStackSize,
    /// Maximum nesting of calls through the bridge.
    MaxCallDepth,
}

impl BridgeProperty {
    pub fn default_value(&self) -> usize {
        match self {
            BridgeProperty::UseTraceback => 0,
            BridgeProperty::StackReserve => 6,
            BridgeProperty::MaxStackSize => 1_000_000,
            BridgeProperty::MaxCallDepth => 200,
        }
    }
}

/// Property values, falling back to each property's default.
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    values: FxHashMap<BridgeProperty, usize>,
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: BridgeProperty, value: usize) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: BridgeProperty, value: usize) {
        self.values.insert(property, value);
    }

    pub fn get(&self, property: BridgeProperty) -> usize {
        self.values
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn use_traceback(&self) -> bool {
        self.get(BridgeProperty::UseTraceback) != 0
    }

    pub fn stack_reserve(&self) -> usize {
        self.get(BridgeProperty::StackReserve)
    }
}
