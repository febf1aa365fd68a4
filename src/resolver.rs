//! Overload resolution.
//!
//! Matches the arguments on the stack against a candidate's declared
//! parameters and records how to extract each one. Candidates are tried in
//! declaration order and the first that matches wins; there is no scoring.

use tracing::trace;

use hostbridge_core::{DataType, Dynamic, HostArray, MethodEntry, ParamMode};

use crate::checks::{self, Extractor};
use crate::state::{ScriptState, ScriptType};
use crate::{Bridge, ScriptResult};

/// How one declared parameter gets its value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArgStep {
    /// A single stack argument.
    Stack {
        index: i32,
        param: DataType,
        extractor: Extractor,
    },
    /// Stack arguments `start..start + count` gathered into an array.
    Gather { start: i32, count: i32, element: DataType },
    /// Declared default of an optional parameter.
    Default(Dynamic),
    /// Placeholder for an out parameter.
    Out,
}

/// A resolved call: which candidate, and how to build its arguments from
/// the stack. Replayable while the stack has the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPlan {
    /// Index into the candidate list.
    pub(crate) candidate: usize,
    /// One step per declared parameter.
    pub(crate) steps: Vec<ArgStep>,
    /// Parameters written back to the caller, in declaration order.
    pub(crate) out_indices: Vec<usize>,
    pub(crate) returns_void: bool,
    /// Stack arguments the plan was built for.
    pub(crate) arg_count: i32,
}

impl InvocationPlan {
    pub fn candidate(&self) -> usize {
        self.candidate
    }

    pub fn out_indices(&self) -> &[usize] {
        &self.out_indices
    }

    pub fn returns_void(&self) -> bool {
        self.returns_void
    }
}

/// First candidate whose parameters accept the arguments from stack index
/// `first` to the top.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn resolve(bridge: &mut Bridge, candidates: &[MethodEntry], first: i32) -> Option<InvocationPlan> {
    candidates.iter().enumerate().find_map(|(i, method)| {
        let plan = match_parameters(bridge, method, i, first);
        trace!(
            method = %method.name,
            candidate = i,
            matched = plan.is_some(),
            "overload attempt"
        );
        plan
    })
}

/// Match `method` against the stack arguments starting at `first`.
pub(crate) fn match_parameters(
    bridge: &mut Bridge,
    method: &MethodEntry,
    candidate: usize,
    first: i32,
) -> Option<InvocationPlan> {
    let top = bridge.state.get_top();
    let mut pos = first;
    let mut steps = Vec::with_capacity(method.params.len());
    let mut out_indices = Vec::new();

    for (i, param) in method.params.iter().enumerate() {
        match param.mode {
            ParamMode::Out => {
                steps.push(ArgStep::Out);
                out_indices.push(i);
                continue;
            }
            ParamMode::Ref => out_indices.push(i),
            ParamMode::In => {}
        }

        if param.variadic {
            let element = DataType::simple(param.data_type.type_hash);
            let remaining = (top - pos + 1).max(0);
            if remaining == 1
                && bridge.state.type_of(pos) == ScriptType::Table
                && let Some(extractor) = checks::classify(bridge, pos, &param.data_type)
            {
                steps.push(ArgStep::Stack {
                    index: pos,
                    param: param.data_type,
                    extractor,
                });
                pos += 1;
                continue;
            }
            if (pos..=top).any(|index| checks::classify(bridge, index, &element).is_none()) {
                return None;
            }
            steps.push(ArgStep::Gather {
                start: pos,
                count: remaining,
                element,
            });
            pos = top + 1;
            continue;
        }

        if pos > top {
            steps.push(ArgStep::Default(param.default.clone()?));
            continue;
        }
        match checks::classify(bridge, pos, &param.data_type) {
            Some(extractor) => {
                steps.push(ArgStep::Stack {
                    index: pos,
                    param: param.data_type,
                    extractor,
                });
                pos += 1;
            }
            None => steps.push(ArgStep::Default(param.default.clone()?)),
        }
    }

    (pos == top + 1).then(|| InvocationPlan {
        candidate,
        steps,
        out_indices,
        returns_void: method.returns_void() && !method.is_constructor(),
        arg_count: top - first + 1,
    })
}

/// Whether a cached plan still fits the current stack. Returns the
/// 1-based number of the first argument that no longer binds.
pub(crate) fn revalidate(bridge: &mut Bridge, plan: &mut InvocationPlan, first: i32) -> Result<(), i32> {
    for step in &mut plan.steps {
        if let ArgStep::Stack {
            index,
            param,
            extractor,
        } = step
        {
            match checks::classify(bridge, *index, param) {
                Some(current) => *extractor = current,
                None => return Err(*index - first + 1),
            }
        }
    }
    Ok(())
}

/// Build the argument slots for `plan`, one per declared parameter.
pub(crate) fn build_args(bridge: &mut Bridge, plan: &InvocationPlan) -> ScriptResult<Vec<Dynamic>> {
    let mut args = Vec::with_capacity(plan.steps.len());
    for step in &plan.steps {
        let value = match step {
            ArgStep::Stack { index, extractor, .. } => extractor.extract(bridge, *index)?,
            ArgStep::Gather { start, count, element } => {
                let mut items = Vec::with_capacity(*count as usize);
                for index in *start..*start + *count {
                    let item = match checks::classify(bridge, index, element) {
                        Some(extractor) => extractor.extract(bridge, index)?,
                        None => Dynamic::default_of(element.type_hash),
                    };
                    items.push(item);
                }
                Dynamic::Array(HostArray::new(element.type_hash, items))
            }
            ArgStep::Default(value) => value.clone(),
            ArgStep::Out => Dynamic::Null,
        };
        args.push(value);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hostbridge_core::{ParamDef, primitives};
    use hostbridge_registry::TypeRegistry;

    use super::*;

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(TypeRegistry::new()))
    }

    fn sum() -> MethodEntry {
        MethodEntry::new("Sum")
            .param(ParamDef::variadic("xs", primitives::INT32))
            .returns(primitives::INT32)
    }

    fn gathered(b: &mut Bridge, method: &MethodEntry) -> Vec<Dynamic> {
        let plan = match_parameters(b, method, 0, 1).unwrap();
        let args = build_args(b, &plan).unwrap();
        args[0].as_array().unwrap().to_vec()
    }

    #[test]
    fn variadic_gathers_trailing_arguments() {
        let mut b = bridge();
        b.state.push_integer(1);
        b.state.push_number(2.0);
        b.state.push_integer(3);
        assert_eq!(gathered(&mut b, &sum()), vec![Dynamic::Int(1), Dynamic::Int(2), Dynamic::Int(3)]);
    }

    #[test]
    fn variadic_accepts_single_table() {
        let mut b = bridge();
        b.state.new_table();
        for n in 1..=3 {
            b.state.push_integer(n);
            b.state.raw_set_index(1, n);
        }
        assert_eq!(gathered(&mut b, &sum()), vec![Dynamic::Int(1), Dynamic::Int(2), Dynamic::Int(3)]);
    }

    #[test]
    fn variadic_accepts_nothing() {
        let mut b = bridge();
        assert!(gathered(&mut b, &sum()).is_empty());
    }

    #[test]
    fn optional_and_out_parameters() {
        let parse = MethodEntry::new("Parse")
            .param(ParamDef::new("text", primitives::STRING))
            .param(ParamDef::new("value", primitives::INT32).out())
            .param(ParamDef::new("radix", primitives::INT32).optional(10))
            .returns(primitives::BOOL);
        let mut b = bridge();
        b.state.push_string("42");
        let plan = match_parameters(&mut b, &parse, 0, 1).unwrap();
        assert_eq!(plan.out_indices, vec![1]);
        let args = build_args(&mut b, &plan).unwrap();
        assert_eq!(args, vec![Dynamic::String("42".into()), Dynamic::Null, Dynamic::Int(10)]);
    }

    #[test]
    fn trailing_arguments_reject() {
        let one = MethodEntry::new("One").param(ParamDef::new("x", primitives::INT32));
        let mut b = bridge();
        b.state.push_integer(1);
        b.state.push_integer(2);
        assert!(match_parameters(&mut b, &one, 0, 1).is_none());
    }

    #[test]
    fn first_declared_match_wins() {
        let by_float = MethodEntry::new("Add").param(ParamDef::new("x", primitives::FLOAT64));
        let by_int = MethodEntry::new("Add").param(ParamDef::new("x", primitives::INT32));
        let mut b = bridge();
        b.state.push_integer(1);
        let plan = resolve(&mut b, &[by_float.clone(), by_int.clone()], 1).unwrap();
        assert_eq!(plan.candidate, 0);
        let plan = resolve(&mut b, &[by_int, by_float], 1).unwrap();
        assert_eq!(plan.candidate, 0);
    }

    #[test]
    fn revalidate_reports_changed_argument() {
        let method = MethodEntry::new("Neg").param(ParamDef::new("x", primitives::INT32));
        let mut b = bridge();
        b.state.push_integer(1);
        let mut plan = match_parameters(&mut b, &method, 0, 1).unwrap();
        b.state.set_top(0);
        b.state.push_string("x");
        assert_eq!(revalidate(&mut b, &mut plan, 1), Err(1));
    }
}
