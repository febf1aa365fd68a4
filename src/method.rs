//! Callable wrappers around host method groups.

use std::cell::RefCell;
use std::rc::Rc;

use hostbridge_core::{Dynamic, MethodEntry, TypeHash};

use crate::checks;
use crate::resolver::{self, InvocationPlan};
use crate::state::{ScriptState, StackFunction};
use crate::{Bridge, BridgeProperty, ScriptError, ScriptResult};

/// How a wrapper finds the receiver of an instance call.
#[derive(Debug, Clone)]
pub(crate) enum Receiver {
    /// Static methods and constructors.
    None,
    /// Taken from the first stack slot (`obj:Method(...)`).
    Stack,
    /// Fixed when the wrapper was created.
    Bound(Dynamic),
}

/// A group of overloads callable from script code.
///
/// Remembers the last successful plan. With a single candidate and the
/// same argument count, the plan is replayed instead of re-resolving.
pub(crate) struct MethodWrapper {
    type_name: String,
    name: String,
    candidates: Vec<MethodEntry>,
    receiver: Receiver,
    /// Call base implementations directly, bypassing script overrides.
    non_virtual: bool,
    last: RefCell<Option<InvocationPlan>>,
}

impl MethodWrapper {
    pub(crate) fn new(type_name: impl Into<String>, name: impl Into<String>, candidates: Vec<MethodEntry>, receiver: Receiver) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            candidates,
            receiver,
            non_virtual: false,
            last: RefCell::new(None),
        }
    }

    pub(crate) fn non_virtual(mut self) -> Self {
        self.non_virtual = true;
        self
    }

    pub(crate) fn into_function(self) -> StackFunction {
        let wrapper = Rc::new(self);
        Rc::new(move |bridge: &mut Bridge| wrapper.call(bridge))
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn call(&self, bridge: &mut Bridge) -> ScriptResult<i32> {
        let (this, first) = match &self.receiver {
            Receiver::None => (None, 1),
            Receiver::Bound(target) => (Some(target.clone()), 1),
            Receiver::Stack => match checks::host_value_at(bridge, 1) {
                Some(target) => (Some(target), 2),
                None => {
                    return Err(bridge.raise(format!(
                        "instance method '{}' requires a non null target object",
                        self.name
                    )));
                }
            },
        };

        // Taken out for the duration of the call so reentrant calls re-resolve.
        let cached = self.last.borrow_mut().take();
        let offered = bridge.state.get_top() - first + 1;
        let plan = match cached {
            Some(mut plan) if self.candidates.len() == 1 && plan.arg_count == offered => {
                if let Err(n) = resolver::revalidate(bridge, &mut plan, first) {
                    return Err(bridge.raise(format!("Argument number {n} is invalid")));
                }
                plan
            }
            _ => match resolver::resolve(bridge, &self.candidates, first) {
                Some(plan) => plan,
                None if self.candidates.len() == 1 => return Err(bridge.raise("Invalid arguments to method call")),
                None => {
                    return Err(bridge.raise(format!(
                        "Invalid arguments to method: {}.{}",
                        self.type_name, self.name
                    )));
                }
            },
        };

        let method = &self.candidates[plan.candidate];
        let mut args = resolver::build_args(bridge, &plan)?;
        let result = bridge.invoke_entry(method, this.as_ref(), &mut args, self.non_virtual);
        let pushed = match result {
            Ok(ret) => push_results(bridge, &plan, ret, &args),
            Err(err) => Err(bridge.raise_native(&err)),
        };
        *self.last.borrow_mut() = Some(plan);
        pushed
    }
}

/// Push the return value (unless void) followed by by-ref and out values.
pub(crate) fn push_results(bridge: &mut Bridge, plan: &InvocationPlan, ret: Dynamic, args: &[Dynamic]) -> ScriptResult<i32> {
    let reserve = bridge.options.get(BridgeProperty::StackReserve);
    if !bridge.state.check_stack(reserve + plan.out_indices.len() + 1) {
        return Err(ScriptError::StackOverflow);
    }
    let mut pushed = 0;
    if !plan.returns_void {
        bridge.push(&ret)?;
        pushed += 1;
    }
    for &index in &plan.out_indices {
        bridge.push(args.get(index).unwrap_or(&Dynamic::Null))?;
        pushed += 1;
    }
    Ok(pushed)
}

/// Wrapper for the overloads of `name` visible on `type_hash`.
pub(crate) fn method_group(bridge: &Bridge, type_hash: TypeHash, name: &str, is_static: bool) -> Option<MethodWrapper> {
    let candidates: Vec<MethodEntry> = bridge
        .registry
        .methods_recursive(type_hash, name)
        .into_iter()
        .filter(|m| m.is_static() == is_static)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let receiver = if is_static { Receiver::None } else { Receiver::Stack };
    Some(MethodWrapper::new(
        bridge.registry.type_name(type_hash),
        name,
        candidates,
        receiver,
    ))
}
