//! The script-level protocol: calls, indexed access, arithmetic and
//! comparison, each honouring metatables.

use std::cmp::Ordering;
use std::rc::Rc;

use hostbridge_core::Dynamic;

use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, BridgeProperty, Operator, ScriptError, ScriptResult};

/// Longest chain of `__index`/`__newindex` tables followed before giving up.
const MAX_META_CHAIN: usize = 100;

impl Bridge {
    /// Convert a relative index to an absolute one.
    pub(crate) fn abs_index(&self, index: i32) -> i32 {
        if index < 0 {
            self.state.get_top() + index + 1
        } else {
            index
        }
    }

    /// Push the non-nil metatable field `event` of the value at `index`.
    pub(crate) fn push_metafield(&mut self, index: i32, event: &str) -> bool {
        let index = self.abs_index(index);
        if !self.state.get_metatable(index) {
            return false;
        }
        self.state.push_string(event);
        self.state.raw_get(-2);
        self.state.remove(-2);
        if self.state.type_of(-1) == ScriptType::Nil {
            self.state.set_top(-2);
            return false;
        }
        true
    }

    /// Call the function below the top `nargs` values. `wanted` pads or
    /// truncates the results; `None` keeps them all. Returns how many
    /// results were left on the stack.
    ///
    /// On error the function and its arguments are removed.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&mut self, nargs: i32, wanted: Option<i32>) -> ScriptResult<i32> {
        let func = self.state.get_top() - nargs;
        if func < 1 {
            return Err(self.raise("attempt to call a nil value"));
        }
        let mut nargs = nargs;
        if self.state.type_of(func) != ScriptType::Function {
            if !self.push_metafield(func, "__call") {
                let type_name = self.state.type_of(func).name();
                self.state.set_top(func - 1);
                return Err(self.raise(format!("attempt to call a {type_name} value")));
            }
            self.state.insert(func);
            nargs += 1;
        }
        let (Some(function), name) = (self.state.to_function(func), self.state.function_name(func)) else {
            self.state.set_top(func - 1);
            return Err(self.raise("attempt to call a non-function value"));
        };
        if self.state.call_depth() >= self.options.get(BridgeProperty::MaxCallDepth) {
            self.state.set_top(func - 1);
            return Err(ScriptError::StackOverflow);
        }
        self.state.enter_frame(nargs, name.as_deref());
        match function(self) {
            Ok(results) => Ok(self.state.leave_frame(results, wanted)),
            Err(err) => {
                self.state.unwind_frame();
                Err(err)
            }
        }
    }

    /// Protected call. Runtime errors come back as the inner `Err`; fatal
    /// errors propagate.
    pub fn pcall(&mut self, nargs: i32, wanted: Option<i32>) -> ScriptResult<Result<i32, ScriptError>> {
        match self.call(nargs, wanted) {
            Ok(n) => Ok(Ok(n)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(Err(err)),
        }
    }

    /// Pops a key and pushes `t[key]` for the value at `index`.
    pub fn get_table(&mut self, index: i32) -> ScriptResult<()> {
        let index = self.abs_index(index);
        self.state.push_value(index);
        self.state.insert(-2);
        self.index_top()
    }

    /// Pushes `t[name]` for the value at `index`.
    pub fn get_field(&mut self, index: i32, name: &str) -> ScriptResult<()> {
        let index = self.abs_index(index);
        self.state.push_string(name);
        self.get_table(index)
    }

    /// Pops a value and a key and performs `t[key] = value`.
    pub fn set_table(&mut self, index: i32) -> ScriptResult<()> {
        let index = self.abs_index(index);
        self.state.push_value(index);
        self.state.insert(-3);
        self.new_index_top()
    }

    /// Pops a value and performs `t[name] = value`.
    pub fn set_field(&mut self, index: i32, name: &str) -> ScriptResult<()> {
        let index = self.abs_index(index);
        self.state.push_string(name);
        self.state.insert(-2);
        self.set_table(index)
    }

    pub fn get_global(&mut self, name: &str) -> ScriptResult<()> {
        self.state.push_globals();
        self.get_field(-1, name)?;
        self.state.remove(-2);
        Ok(())
    }

    /// Pops a value and stores it as global `name`.
    pub fn set_global(&mut self, name: &str) -> ScriptResult<()> {
        self.state.push_globals();
        self.state.insert(-2);
        self.state.push_string(name);
        self.state.insert(-2);
        self.new_index_top()
    }

    /// `[obj, key]` on top becomes `[obj[key]]`.
    fn index_top(&mut self) -> ScriptResult<()> {
        for _ in 0..MAX_META_CHAIN {
            let obj = self.state.get_top() - 1;
            let is_table = self.state.type_of(obj) == ScriptType::Table;
            if is_table {
                self.state.push_value(-1);
                self.state.raw_get(obj);
                if self.state.type_of(-1) != ScriptType::Nil {
                    self.state.remove(-2);
                    self.state.remove(-2);
                    return Ok(());
                }
                self.state.set_top(-2);
            }
            if !self.push_metafield(obj, "__index") {
                let type_name = self.state.type_of(obj).name();
                self.state.set_top(-3);
                if is_table {
                    self.state.push_nil();
                    return Ok(());
                }
                return Err(self.raise(format!("attempt to index a {type_name} value")));
            }
            if self.state.type_of(-1) == ScriptType::Function {
                self.state.insert(-3);
                self.call(2, Some(1))?;
                return Ok(());
            }
            // [obj, key, handler] -> [handler, key]
            self.state.remove(-3);
            self.state.insert(-2);
        }
        self.state.set_top(-3);
        Err(self.raise("'__index' chain too long; possible loop"))
    }

    /// `[obj, key, value]` on top performs `obj[key] = value` and pops all three.
    fn new_index_top(&mut self) -> ScriptResult<()> {
        for _ in 0..MAX_META_CHAIN {
            let obj = self.state.get_top() - 2;
            if self.state.type_of(obj) == ScriptType::Table {
                self.state.push_value(-2);
                self.state.raw_get(obj);
                let present = self.state.type_of(-1) != ScriptType::Nil;
                self.state.set_top(-2);
                if present || !self.push_metafield(obj, "__newindex") {
                    self.state.raw_set(obj);
                    self.state.set_top(-2);
                    return Ok(());
                }
            } else if !self.push_metafield(obj, "__newindex") {
                let type_name = self.state.type_of(obj).name();
                self.state.set_top(-4);
                return Err(self.raise(format!("attempt to index a {type_name} value")));
            }
            if self.state.type_of(-1) == ScriptType::Function {
                self.state.insert(-4);
                self.call(3, Some(0))?;
                return Ok(());
            }
            // [obj, key, value, handler] -> [handler, key, value]
            self.state.remove(-4);
            self.state.insert(-3);
        }
        self.state.set_top(-4);
        Err(self.raise("'__newindex' chain too long; possible loop"))
    }

    /// Apply `op` to the top one (unary) or two values, replacing them with the result.
    pub fn arith(&mut self, op: Operator) -> ScriptResult<()> {
        let top = self.state.get_top();
        let (a, b) = if op.is_unary() { (top, top) } else { (top - 1, top) };
        let operands = if op.is_unary() { 1 } else { 2 };
        if let Some(result) = self.raw_arith(op, a, b)? {
            self.state.set_top(-(operands + 1));
            self.push(&result)?;
            return Ok(());
        }
        if !self.push_metafield(a, op.metamethod()) && !self.push_metafield(b, op.metamethod()) {
            let culprit = if self.state.to_number(a).is_none() { a } else { b };
            let type_name = self.state.type_of(culprit).name();
            self.state.set_top(-(operands + 1));
            return Err(self.raise(format!("attempt to perform arithmetic on a {type_name} value")));
        }
        self.state.insert(a);
        if op.is_unary() {
            self.state.push_value(-1);
        }
        self.call(2, Some(1))?;
        Ok(())
    }

    fn raw_arith(&mut self, op: Operator, a: i32, b: i32) -> ScriptResult<Option<Dynamic>> {
        if self.state.type_of(a) != ScriptType::Number || self.state.type_of(b) != ScriptType::Number {
            return Ok(None);
        }
        let both_int = self.state.is_integer(a) && self.state.is_integer(b);
        if both_int
            && let (Some(x), Some(y)) = (self.state.to_integer(a), self.state.to_integer(b))
        {
            let int = match op {
                Operator::Add => Some(x.wrapping_add(y)),
                Operator::Sub => Some(x.wrapping_sub(y)),
                Operator::Mul => Some(x.wrapping_mul(y)),
                Operator::Mod if y == 0 => return Err(self.raise("attempt to perform 'n%%0'")),
                Operator::Mod => Some(x.rem_euclid(y) + if y < 0 && x.rem_euclid(y) != 0 { y } else { 0 }),
                Operator::Unm => Some(x.wrapping_neg()),
                _ => None,
            };
            if let Some(int) = int {
                return Ok(Some(Dynamic::Int(int)));
            }
        }
        let (Some(x), Some(y)) = (self.state.to_number(a), self.state.to_number(b)) else {
            return Ok(None);
        };
        Ok(match op {
            Operator::Add => Some(Dynamic::Float(x + y)),
            Operator::Sub => Some(Dynamic::Float(x - y)),
            Operator::Mul => Some(Dynamic::Float(x * y)),
            Operator::Div => Some(Dynamic::Float(x / y)),
            Operator::Mod => Some(Dynamic::Float(x - (x / y).floor() * y)),
            Operator::Unm => Some(Dynamic::Float(-x)),
            Operator::Eq | Operator::Lt | Operator::Le => None,
        })
    }

    /// Compare the values at `a` and `b` with `Eq`, `Lt` or `Le`.
    pub fn compare(&mut self, a: i32, b: i32, op: Operator) -> ScriptResult<bool> {
        let (a, b) = (self.abs_index(a), self.abs_index(b));
        let (ta, tb) = (self.state.type_of(a), self.state.type_of(b));
        if op == Operator::Eq {
            if self.state.raw_equal(a, b) {
                return Ok(true);
            }
            if ta != tb || !matches!(ta, ScriptType::Table | ScriptType::UserData) {
                return Ok(false);
            }
            if !self.push_metafield(a, "__eq") && !self.push_metafield(b, "__eq") {
                return Ok(false);
            }
            return self.call_comparison(a, b);
        }
        let ordering = match (ta, tb) {
            (ScriptType::Number, ScriptType::Number) => {
                let (x, y) = (self.state.to_number(a), self.state.to_number(b));
                x.partial_cmp(&y)
            }
            (ScriptType::String, ScriptType::String) => {
                let (x, y) = (self.state.to_string(a), self.state.to_string(b));
                Some(x.cmp(&y))
            }
            _ => None,
        };
        if matches!(ta, ScriptType::Number | ScriptType::String) && ta == tb {
            return Ok(match op {
                Operator::Lt => ordering == Some(Ordering::Less),
                _ => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            });
        }
        if !self.push_metafield(a, op.metamethod()) && !self.push_metafield(b, op.metamethod()) {
            return Err(self.raise(format!("attempt to compare {} with {}", ta.name(), tb.name())));
        }
        self.call_comparison(a, b)
    }

    /// Handler on top; calls it with the values at `a` and `b`.
    fn call_comparison(&mut self, a: i32, b: i32) -> ScriptResult<bool> {
        self.state.push_value(a);
        self.state.push_value(b);
        self.call(2, Some(1))?;
        let result = self.state.to_bool(-1);
        self.state.set_top(-2);
        Ok(result)
    }

    /// Push a named function. Named functions stand for script code in
    /// error locations and tracebacks.
    pub fn create_function<F>(&mut self, name: &str, body: F)
    where
        F: Fn(&mut Bridge) -> ScriptResult<i32> + 'static,
    {
        self.state.push_function(Some(name), Rc::new(body));
    }

    /// Define a global script function.
    pub fn register_function<F>(&mut self, name: &str, body: F) -> ScriptResult<()>
    where
        F: Fn(&mut Bridge) -> ScriptResult<i32> + 'static,
    {
        self.create_function(name, body);
        self.set_global(name)
    }

    /// Call global function `name` with host arguments, returning every result.
    pub fn call_global(&mut self, name: &str, args: &[Dynamic]) -> ScriptResult<Vec<Dynamic>> {
        let old_top = self.state.get_top();
        self.get_global(name)?;
        if let Err(err) = self.push_values(args) {
            self.state.set_top(old_top);
            return Err(err);
        }
        self.call(args.len() as i32, None)?;
        self.pop_values(old_top)
    }

    /// `target:name(args...)` for the value at `target`.
    pub fn call_method(&mut self, target: i32, name: &str, args: &[Dynamic]) -> ScriptResult<Vec<Dynamic>> {
        let target = self.abs_index(target);
        let old_top = self.state.get_top();
        self.get_field(target, name)?;
        self.state.push_value(target);
        if let Err(err) = self.push_values(args) {
            self.state.set_top(old_top);
            return Err(err);
        }
        self.call(args.len() as i32 + 1, None)?;
        self.pop_values(old_top)
    }
}
