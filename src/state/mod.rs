//! The stack-based interface the bridge drives.
//!
//! [`ScriptState`] is the minimal set of raw operations the bridge needs
//! from a script runtime. Indices follow the usual stack convention:
//! positive indices count from the bottom of the current frame (1 is the
//! first argument), negative indices count from the top (-1 is the top).
//!
//! Everything that honours metatables (indexed access, calls, arithmetic)
//! is implemented by [`Bridge`](crate::Bridge) on top of these raw
//! operations. Errors are not raised through the state: they propagate as
//! `Err(ScriptError)` out of the function body that hit them.

mod memory;

use std::rc::Rc;

pub use memory::MemoryState;

use crate::{Bridge, ScriptResult};

/// A function callable from script code. Receives its arguments on the
/// stack and returns how many results it left on top.
pub type StackFunction = Rc<dyn Fn(&mut Bridge) -> ScriptResult<i32>>;

/// Type of a stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    /// Index outside the current frame.
    None,
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    UserData,
}

impl ScriptType {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptType::None => "no value",
            ScriptType::Nil => "nil",
            ScriptType::Boolean => "boolean",
            ScriptType::Number => "number",
            ScriptType::String => "string",
            ScriptType::Table => "table",
            ScriptType::Function => "function",
            ScriptType::UserData => "userdata",
        }
    }
}

/// Raw operations on a script runtime.
pub trait ScriptState {
    // === Stack ===
    fn get_top(&self) -> i32;
    fn set_top(&mut self, index: i32);
    /// Ensure room for `extra` more values.
    fn check_stack(&mut self, extra: usize) -> bool;
    fn type_of(&self, index: i32) -> ScriptType;
    /// Push a copy of the value at `index`.
    fn push_value(&mut self, index: i32);
    fn remove(&mut self, index: i32);
    /// Move the top value to `index`, shifting values above it up.
    fn insert(&mut self, index: i32);
    fn raw_equal(&self, a: i32, b: i32) -> bool;

    // === Push ===
    fn push_nil(&mut self);
    fn push_bool(&mut self, value: bool);
    fn push_integer(&mut self, value: i64);
    fn push_number(&mut self, value: f64);
    fn push_string(&mut self, value: &str);
    /// Push a function. Named functions stand for script code and report
    /// their name as error location.
    fn push_function(&mut self, name: Option<&str>, function: StackFunction);

    // === Read ===
    /// Truthiness: everything but nil and false.
    fn to_bool(&self, index: i32) -> bool;
    /// Integers, and floats with an integral value.
    fn to_integer(&self, index: i32) -> Option<i64>;
    fn to_number(&self, index: i32) -> Option<f64>;
    /// Strings, and numbers formatted as strings.
    fn to_string(&self, index: i32) -> Option<String>;
    /// Number stored with an integer representation.
    fn is_integer(&self, index: i32) -> bool;
    fn to_function(&self, index: i32) -> Option<StackFunction>;
    /// Name a function was pushed with.
    fn function_name(&self, index: i32) -> Option<String>;

    // === Tables ===
    fn new_table(&mut self);
    /// Pops a key and pushes `t[key]` for the table at `index`, ignoring metatables.
    fn raw_get(&mut self, index: i32);
    /// Pops a value and a key and stores `t[key] = value`, ignoring metatables.
    fn raw_set(&mut self, index: i32);
    fn raw_get_index(&mut self, index: i32, n: i64);
    /// Pops a value and stores `t[n] = value`.
    fn raw_set_index(&mut self, index: i32, n: i64);
    /// Length of the array part.
    fn raw_len(&self, index: i32) -> usize;
    /// Pops a key and pushes the next key/value pair; returns false at the end.
    fn next(&mut self, index: i32) -> bool;
    /// Push the global table.
    fn push_globals(&mut self);

    // === Userdata and metatables ===
    /// Push a new userdata carrying a registry id.
    fn new_userdata(&mut self, id: i64);
    fn userdata_id(&self, index: i32) -> Option<i64>;
    /// Pops a table or nil and makes it the metatable of the value at `index`.
    fn set_metatable(&mut self, index: i32);
    /// Pushes the metatable of the value at `index` if it has one.
    fn get_metatable(&mut self, index: i32) -> bool;
    /// Pushes the metatable registered under `name`, creating it when absent.
    /// Returns true when it was created.
    fn new_metatable(&mut self, name: &str) -> bool;
    /// Pushes the metatable registered under `name`, or nil.
    fn get_named_metatable(&mut self, name: &str) -> bool;

    // === References ===
    /// Pops the top value and pins it, returning a handle.
    fn reference(&mut self) -> i32;
    fn unreference(&mut self, handle: i32);
    fn push_reference(&mut self, handle: i32);

    // === Object slots ===
    /// Pushes the live userdata aliasing registry id `id`. Returns false,
    /// pushing nothing, when script code has already collected it.
    fn push_object_slot(&mut self, id: i64) -> bool;
    /// Weakly record the userdata at `index` as the alias of `id`.
    fn set_object_slot(&mut self, index: i32, id: i64);
    /// Registry ids of userdata collected since the last call.
    fn take_finalized(&mut self) -> Vec<i64>;

    // === Frames ===
    /// Start a call frame over the top `nargs` values.
    fn enter_frame(&mut self, nargs: i32, name: Option<&str>);
    /// Finish the current frame, moving its top `nresults` values to where
    /// the function was and truncating or padding them to `wanted`.
    /// Returns the number of values left.
    fn leave_frame(&mut self, nresults: i32, wanted: Option<i32>) -> i32;
    /// Drop the current frame and everything pushed since the call began.
    fn unwind_frame(&mut self);
    fn call_depth(&self) -> usize;
    /// `name:` of the script function `level` frames up, if it has one.
    fn location(&self, level: usize) -> Option<String>;
    fn traceback(&self) -> String;
}
