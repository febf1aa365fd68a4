//! An in-process script runtime state.
//!
//! [`MemoryState`] keeps values in reference-counted cells: tables are
//! insertion-ordered maps, userdata carry a registry id and push that id
//! onto a finalization list when the last script reference is dropped.
//! Object slots hold only weak references, so dropping every strong copy
//! of a userdata makes its slot read as collected.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::{ScriptState, ScriptType, StackFunction};

/// Handle returned by [`ScriptState::reference`] for nil.
const NIL_REF: i32 = -1;

#[derive(Clone, Default)]
enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(Rc<FunctionCell>),
    UserData(Rc<UserDataCell>),
}

impl Value {
    fn script_type(&self) -> ScriptType {
        match self {
            Value::Nil => ScriptType::Nil,
            Value::Bool(_) => ScriptType::Boolean,
            Value::Integer(_) | Value::Number(_) => ScriptType::Number,
            Value::String(_) => ScriptType::String,
            Value::Table(_) => ScriptType::Table,
            Value::Function(_) => ScriptType::Function,
            Value::UserData(_) => ScriptType::UserData,
        }
    }

    fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn key(&self) -> Option<Key> {
        match self {
            Value::Nil => None,
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Integer(i) => Some(Key::Int(*i)),
            Value::Number(f) if f.is_nan() => None,
            Value::Number(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                Some(Key::Int(*f as i64))
            }
            Value::Number(f) => Some(Key::Float(f.to_bits())),
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Table(t) => Some(Key::Ptr(Rc::as_ptr(&t.0) as *const () as usize)),
            Value::Function(f) => Some(Key::Ptr(Rc::as_ptr(f) as *const () as usize)),
            Value::UserData(u) => Some(Key::Ptr(Rc::as_ptr(u) as *const () as usize)),
        }
    }

    fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(a), Value::Number(b)) | (Value::Number(b), Value::Integer(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::UserData(a), Value::UserData(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Key {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Ptr(usize),
}

#[derive(Clone, Default)]
struct TableRef(Rc<RefCell<Table>>);

/// Entries keep the original key value so it stays alive and can be
/// returned by `next`. Assigning nil leaves a tombstone, keeping traversal
/// positions stable.
#[derive(Default)]
struct Table {
    entries: IndexMap<Key, (Value, Value)>,
    metatable: Option<TableRef>,
}

impl TableRef {
    fn get(&self, key: &Value) -> Value {
        key.key()
            .and_then(|k| self.0.borrow().entries.get(&k).map(|(_, v)| v.clone()))
            .unwrap_or_default()
    }

    fn set(&self, key: Value, value: Value) {
        let Some(k) = key.key() else { return };
        let mut table = self.0.borrow_mut();
        if value.is_nil() && !table.entries.contains_key(&k) {
            return;
        }
        table.entries.insert(k, (key, value));
    }
}

struct FunctionCell {
    name: Option<Rc<str>>,
    body: StackFunction,
}

struct UserDataCell {
    id: i64,
    metatable: RefCell<Option<TableRef>>,
    finalized: Rc<RefCell<Vec<i64>>>,
}

impl Drop for UserDataCell {
    fn drop(&mut self) {
        self.finalized.borrow_mut().push(self.id);
    }
}

struct Frame {
    base: usize,
    name: Option<Rc<str>>,
}

/// In-process [`ScriptState`].
pub struct MemoryState {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: TableRef,
    named_metatables: FxHashMap<String, TableRef>,
    refs: FxHashMap<i32, Value>,
    free_refs: Vec<i32>,
    next_ref: i32,
    object_slots: FxHashMap<i64, Weak<UserDataCell>>,
    finalized: Rc<RefCell<Vec<i64>>>,
    max_stack: usize,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    pub fn new() -> Self {
        Self::with_max_stack(1_000_000)
    }

    pub fn with_max_stack(max_stack: usize) -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: TableRef::default(),
            named_metatables: FxHashMap::default(),
            refs: FxHashMap::default(),
            free_refs: Vec::new(),
            next_ref: 1,
            object_slots: FxHashMap::default(),
            finalized: Rc::new(RefCell::new(Vec::new())),
            max_stack,
        }
    }

    /// Number of pinned references.
    pub fn reference_count(&self) -> usize {
        self.refs.len()
    }

    fn base(&self) -> usize {
        self.frames.last().map_or(0, |f| f.base)
    }

    fn abs(&self, index: i32) -> Option<usize> {
        let base = self.base();
        let len = self.stack.len();
        if index > 0 {
            let pos = base + index as usize - 1;
            (pos < len).then_some(pos)
        } else if index < 0 {
            let depth = index.unsigned_abs() as usize;
            (depth <= len - base).then(|| len - depth)
        } else {
            None
        }
    }

    fn at(&self, index: i32) -> Option<&Value> {
        self.abs(index).map(|pos| &self.stack[pos])
    }

    fn pop(&mut self) -> Value {
        if self.stack.len() > self.base() {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::Nil
        }
    }

    fn table_at(&self, pos: Option<usize>) -> Option<TableRef> {
        match pos.map(|p| &self.stack[p]) {
            Some(Value::Table(t)) => Some(t.clone()),
            _ => None,
        }
    }
}

impl ScriptState for MemoryState {
    fn get_top(&self) -> i32 {
        (self.stack.len() - self.base()) as i32
    }

    fn set_top(&mut self, index: i32) {
        let base = self.base();
        let new_len = if index >= 0 {
            base + index as usize
        } else {
            (self.stack.len() as i64 + index as i64 + 1).max(base as i64) as usize
        };
        self.stack.resize(new_len, Value::Nil);
    }

    fn check_stack(&mut self, extra: usize) -> bool {
        self.stack.len() + extra <= self.max_stack
    }

    fn type_of(&self, index: i32) -> ScriptType {
        self.at(index).map_or(ScriptType::None, Value::script_type)
    }

    fn push_value(&mut self, index: i32) {
        let value = self.at(index).cloned().unwrap_or_default();
        self.stack.push(value);
    }

    fn remove(&mut self, index: i32) {
        if let Some(pos) = self.abs(index) {
            self.stack.remove(pos);
        }
    }

    fn insert(&mut self, index: i32) {
        if let Some(pos) = self.abs(index) {
            let value = self.pop();
            self.stack.insert(pos, value);
        }
    }

    fn raw_equal(&self, a: i32, b: i32) -> bool {
        match (self.at(a), self.at(b)) {
            (Some(a), Some(b)) => a.raw_eq(b),
            _ => false,
        }
    }

    fn push_nil(&mut self) {
        self.stack.push(Value::Nil);
    }

    fn push_bool(&mut self, value: bool) {
        self.stack.push(Value::Bool(value));
    }

    fn push_integer(&mut self, value: i64) {
        self.stack.push(Value::Integer(value));
    }

    fn push_number(&mut self, value: f64) {
        self.stack.push(Value::Number(value));
    }

    fn push_string(&mut self, value: &str) {
        self.stack.push(Value::String(Rc::from(value)));
    }

    fn push_function(&mut self, name: Option<&str>, function: StackFunction) {
        self.stack.push(Value::Function(Rc::new(FunctionCell {
            name: name.map(Rc::from),
            body: function,
        })));
    }

    fn to_bool(&self, index: i32) -> bool {
        !matches!(self.at(index), None | Some(Value::Nil) | Some(Value::Bool(false)))
    }

    fn to_integer(&self, index: i32) -> Option<i64> {
        match self.at(index)? {
            Value::Integer(i) => Some(*i),
            Value::Number(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    fn to_number(&self, index: i32) -> Option<f64> {
        match self.at(index)? {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(f) => Some(*f),
            _ => None,
        }
    }

    fn to_string(&self, index: i32) -> Option<String> {
        match self.at(index)? {
            Value::String(s) => Some(s.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(f) => Some(format!("{f:?}")),
            _ => None,
        }
    }

    fn is_integer(&self, index: i32) -> bool {
        matches!(self.at(index), Some(Value::Integer(_)))
    }

    fn to_function(&self, index: i32) -> Option<StackFunction> {
        match self.at(index)? {
            Value::Function(f) => Some(f.body.clone()),
            _ => None,
        }
    }

    fn function_name(&self, index: i32) -> Option<String> {
        match self.at(index)? {
            Value::Function(f) => f.name.as_deref().map(str::to_string),
            _ => None,
        }
    }

    fn new_table(&mut self) {
        self.stack.push(Value::Table(TableRef::default()));
    }

    fn raw_get(&mut self, index: i32) {
        let table = self.table_at(self.abs(index));
        let key = self.pop();
        let value = table.map(|t| t.get(&key)).unwrap_or_default();
        self.stack.push(value);
    }

    fn raw_set(&mut self, index: i32) {
        let table = self.table_at(self.abs(index));
        let value = self.pop();
        let key = self.pop();
        if let Some(table) = table {
            table.set(key, value);
        }
    }

    fn raw_get_index(&mut self, index: i32, n: i64) {
        let value = self
            .table_at(self.abs(index))
            .map(|t| t.get(&Value::Integer(n)))
            .unwrap_or_default();
        self.stack.push(value);
    }

    fn raw_set_index(&mut self, index: i32, n: i64) {
        let table = self.table_at(self.abs(index));
        let value = self.pop();
        if let Some(table) = table {
            table.set(Value::Integer(n), value);
        }
    }

    fn raw_len(&self, index: i32) -> usize {
        let Some(table) = self.table_at(self.abs(index)) else {
            return 0;
        };
        let mut n = 0;
        while !table.get(&Value::Integer(n as i64 + 1)).is_nil() {
            n += 1;
        }
        n
    }

    fn next(&mut self, index: i32) -> bool {
        let table = self.table_at(self.abs(index));
        let key = self.pop();
        let Some(table) = table else { return false };
        let found = {
            let inner = table.0.borrow();
            let start = match key.key() {
                None => 0,
                Some(k) => match inner.entries.get_index_of(&k) {
                    Some(i) => i + 1,
                    None => return false,
                },
            };
            inner
                .entries
                .values()
                .skip(start)
                .find(|(_, v)| !v.is_nil())
                .cloned()
        };
        match found {
            Some((k, v)) => {
                self.stack.push(k);
                self.stack.push(v);
                true
            }
            None => false,
        }
    }

    fn push_globals(&mut self) {
        self.stack.push(Value::Table(self.globals.clone()));
    }

    fn new_userdata(&mut self, id: i64) {
        self.stack.push(Value::UserData(Rc::new(UserDataCell {
            id,
            metatable: RefCell::new(None),
            finalized: self.finalized.clone(),
        })));
    }

    fn userdata_id(&self, index: i32) -> Option<i64> {
        match self.at(index)? {
            Value::UserData(u) => Some(u.id),
            _ => None,
        }
    }

    fn set_metatable(&mut self, index: i32) {
        let pos = self.abs(index);
        let metatable = match self.pop() {
            Value::Table(t) => Some(t),
            _ => None,
        };
        match pos.map(|p| &self.stack[p]) {
            Some(Value::Table(t)) => t.0.borrow_mut().metatable = metatable,
            Some(Value::UserData(u)) => *u.metatable.borrow_mut() = metatable,
            _ => {}
        }
    }

    fn get_metatable(&mut self, index: i32) -> bool {
        let metatable = match self.at(index) {
            Some(Value::Table(t)) => t.0.borrow().metatable.clone(),
            Some(Value::UserData(u)) => u.metatable.borrow().clone(),
            _ => None,
        };
        match metatable {
            Some(mt) => {
                self.stack.push(Value::Table(mt));
                true
            }
            None => false,
        }
    }

    fn new_metatable(&mut self, name: &str) -> bool {
        let (table, created) = match self.named_metatables.get(name) {
            Some(t) => (t.clone(), false),
            None => {
                let t = TableRef::default();
                self.named_metatables.insert(name.to_string(), t.clone());
                (t, true)
            }
        };
        self.stack.push(Value::Table(table));
        created
    }

    fn get_named_metatable(&mut self, name: &str) -> bool {
        match self.named_metatables.get(name) {
            Some(t) => {
                let t = t.clone();
                self.stack.push(Value::Table(t));
                true
            }
            None => {
                self.stack.push(Value::Nil);
                false
            }
        }
    }

    fn reference(&mut self) -> i32 {
        let value = self.pop();
        if value.is_nil() {
            return NIL_REF;
        }
        let handle = self.free_refs.pop().unwrap_or_else(|| {
            let h = self.next_ref;
            self.next_ref += 1;
            h
        });
        self.refs.insert(handle, value);
        handle
    }

    fn unreference(&mut self, handle: i32) {
        if self.refs.remove(&handle).is_some() {
            self.free_refs.push(handle);
        }
    }

    fn push_reference(&mut self, handle: i32) {
        let value = self.refs.get(&handle).cloned().unwrap_or_default();
        self.stack.push(value);
    }

    fn push_object_slot(&mut self, id: i64) -> bool {
        match self.object_slots.get(&id).and_then(Weak::upgrade) {
            Some(cell) => {
                self.stack.push(Value::UserData(cell));
                true
            }
            None => {
                self.object_slots.remove(&id);
                false
            }
        }
    }

    fn set_object_slot(&mut self, index: i32, id: i64) {
        if let Some(Value::UserData(u)) = self.at(index) {
            let weak = Rc::downgrade(u);
            self.object_slots.insert(id, weak);
        }
    }

    fn take_finalized(&mut self) -> Vec<i64> {
        let ids = std::mem::take(&mut *self.finalized.borrow_mut());
        for id in &ids {
            if self.object_slots.get(id).is_some_and(|w| w.strong_count() == 0) {
                self.object_slots.remove(id);
            }
        }
        ids
    }

    fn enter_frame(&mut self, nargs: i32, name: Option<&str>) {
        let base = self.stack.len().saturating_sub(nargs.max(0) as usize).max(self.base());
        self.frames.push(Frame {
            base,
            name: name.map(Rc::from),
        });
    }

    fn leave_frame(&mut self, nresults: i32, wanted: Option<i32>) -> i32 {
        let Some(frame) = self.frames.pop() else {
            return 0;
        };
        let available = self.stack.len() - frame.base.min(self.stack.len());
        let n = (nresults.max(0) as usize).min(available);
        let mut results = self.stack.split_off(self.stack.len() - n);
        self.stack.truncate(frame.base.saturating_sub(1));
        if let Some(wanted) = wanted {
            results.resize(wanted.max(0) as usize, Value::Nil);
        }
        let count = results.len() as i32;
        self.stack.extend(results);
        count
    }

    fn unwind_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.stack.truncate(frame.base.saturating_sub(1));
        }
    }

    fn call_depth(&self) -> usize {
        self.frames.len()
    }

    fn location(&self, level: usize) -> Option<String> {
        let index = self.frames.len().checked_sub(level + 1)?;
        self.frames[index].name.as_deref().map(|name| format!("{name}:"))
    }

    fn traceback(&self) -> String {
        let mut out = String::from("stack traceback:");
        for frame in self.frames.iter().rev() {
            out.push_str("\n\t");
            out.push_str(frame.name.as_deref().unwrap_or("[host]"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_indices() {
        let mut state = MemoryState::new();
        state.push_integer(1);
        state.push_string("two");
        state.push_bool(true);
        assert_eq!(state.get_top(), 3);
        assert_eq!(state.type_of(1), ScriptType::Number);
        assert_eq!(state.type_of(-2), ScriptType::String);
        assert_eq!(state.type_of(4), ScriptType::None);
        state.set_top(1);
        assert_eq!(state.get_top(), 1);
        state.set_top(3);
        assert_eq!(state.type_of(3), ScriptType::Nil);
    }

    #[test]
    fn insert_and_remove() {
        let mut state = MemoryState::new();
        state.push_integer(1);
        state.push_integer(2);
        state.push_integer(3);
        state.insert(1);
        assert_eq!(state.to_integer(1), Some(3));
        state.remove(1);
        assert_eq!(state.to_integer(1), Some(1));
        assert_eq!(state.get_top(), 2);
    }

    #[test]
    fn tables_keep_insertion_order() {
        let mut state = MemoryState::new();
        state.new_table();
        for (k, v) in [("b", 1), ("a", 2), ("c", 3)] {
            state.push_string(k);
            state.push_integer(v);
            state.raw_set(-3);
        }
        state.push_nil();
        let mut keys = Vec::new();
        while state.next(1) {
            keys.push(state.to_string(-2).unwrap());
            state.set_top(-2);
        }
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn float_keys_normalize_to_integers() {
        let mut state = MemoryState::new();
        state.new_table();
        state.push_number(1.0);
        state.push_string("one");
        state.raw_set(1);
        state.raw_get_index(1, 1);
        assert_eq!(state.to_string(-1).as_deref(), Some("one"));
        assert_eq!(state.raw_len(1), 1);
    }

    #[test]
    fn nil_assignment_hides_entry() {
        let mut state = MemoryState::new();
        state.new_table();
        state.push_integer(7);
        state.raw_set_index(1, 1);
        state.push_nil();
        state.raw_set_index(1, 1);
        assert_eq!(state.raw_len(1), 0);
        state.push_nil();
        assert!(!state.next(1));
    }

    #[test]
    fn references_pin_values() {
        let mut state = MemoryState::new();
        state.push_string("kept");
        let handle = state.reference();
        assert_eq!(state.get_top(), 0);
        state.push_reference(handle);
        assert_eq!(state.to_string(-1).as_deref(), Some("kept"));
        state.unreference(handle);
        state.push_reference(handle);
        assert_eq!(state.type_of(-1), ScriptType::Nil);
        state.push_nil();
        assert_eq!(state.reference(), NIL_REF);
    }

    #[test]
    fn object_slots_are_weak() {
        let mut state = MemoryState::new();
        state.new_userdata(5);
        state.set_object_slot(-1, 5);
        assert!(state.push_object_slot(5));
        assert_eq!(state.userdata_id(-1), Some(5));
        state.set_top(0);
        assert!(!state.push_object_slot(5));
        assert_eq!(state.get_top(), 0);
        assert_eq!(state.take_finalized(), vec![5]);
        assert!(state.take_finalized().is_empty());
    }

    #[test]
    fn frames_move_results_over_callee() {
        let mut state = MemoryState::new();
        state.push_string("caller");
        state.push_function(None, Rc::new(|_| Ok(0)));
        state.push_integer(10);
        state.enter_frame(1, Some("chunk"));
        assert_eq!(state.get_top(), 1);
        assert_eq!(state.to_integer(1), Some(10));
        state.push_integer(20);
        state.push_integer(30);
        let n = state.leave_frame(2, Some(3));
        assert_eq!(n, 3);
        assert_eq!(state.get_top(), 4);
        assert_eq!(state.to_string(1).as_deref(), Some("caller"));
        assert_eq!(state.to_integer(2), Some(20));
        assert_eq!(state.type_of(4), ScriptType::Nil);
    }

    #[test]
    fn location_names_calling_script_frame() {
        let mut state = MemoryState::new();
        state.push_function(None, Rc::new(|_| Ok(0)));
        state.enter_frame(0, Some("main"));
        state.push_function(None, Rc::new(|_| Ok(0)));
        state.enter_frame(0, None);
        assert_eq!(state.location(1).as_deref(), Some("main:"));
        assert_eq!(state.location(0), None);
        assert_eq!(state.location(5), None);
        assert!(state.traceback().contains("main"));
        state.unwind_frame();
        state.unwind_frame();
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn metatables() {
        let mut state = MemoryState::new();
        assert!(state.new_metatable("demo"));
        assert!(!state.new_metatable("demo"));
        state.set_top(0);
        state.new_userdata(1);
        state.get_named_metatable("demo");
        state.set_metatable(-2);
        assert!(state.get_metatable(-1));
        assert_eq!(state.type_of(-1), ScriptType::Table);
        assert!(!state.get_named_metatable("missing"));
    }
}
