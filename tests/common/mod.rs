//! Shared fixture: a small `Demo` assembly and helpers for driving a bridge
//! from Rust closures standing in for script functions.

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use hostbridge::StackFunction;
use hostbridge::prelude::*;
use hostbridge_core::{EventEntry, NativeError, raise_all};
use rustc_hash::FxHashMap;

pub const GREETER: TypeHash = TypeHash::from_name("Demo.IGreeter");
pub const ANIMAL: TypeHash = TypeHash::from_name("Demo.Animal");
pub const CALCULATOR: TypeHash = TypeHash::from_name("Demo.Calculator");
pub const MODE: TypeHash = TypeHash::from_name("Demo.Calculator+Mode");
pub const CHANGED: TypeHash = TypeHash::from_name("Demo.ChangedHandler");
pub const VECTOR: TypeHash = TypeHash::from_name("Demo.Vector");
pub const TRANSFORM: TypeHash = TypeHash::from_name("Demo.Transform");
pub const COLOR: TypeHash = TypeHash::from_name("Demo.Color");
pub const SEALED: TypeHash = TypeHash::from_name("Demo.Sealed");
pub const GREETINGS: TypeHash = TypeHash::from_name("Demo.Greetings");
pub const METER: TypeHash = TypeHash::from_name("Demo.IMeter");
pub const READING: TypeHash = TypeHash::from_name("Demo.Reading");

pub struct AnimalState {
    pub name: String,
}

#[derive(Default)]
pub struct CalcState {
    pub total: i64,
    pub items: FxHashMap<String, i64>,
    pub changed: HostEvent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

fn native(f: impl Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static) -> NativeFn {
    NativeFn::new(f)
}

fn greeter() -> TypeEntry {
    TypeEntry::interface("Demo.IGreeter").with_method(
        MethodEntry::new("Greet")
            .param(ParamDef::new("name", primitives::STRING))
            .returns(primitives::STRING)
            .abstract_method(),
    )
}

fn meter() -> TypeEntry {
    TypeEntry::interface("Demo.IMeter").with_method(
        MethodEntry::new("Measure")
            .param(ParamDef::new("value", primitives::INT32).out())
            .abstract_method(),
    )
}

fn greetings() -> TypeEntry {
    TypeEntry::class("Demo.Greetings").with_method(
        MethodEntry::new("Welcome")
            .static_method()
            .param(ParamDef::new("greeter", GREETER))
            .param(ParamDef::new("name", primitives::STRING))
            .returns(primitives::STRING)
            .native(native(|ctx| {
                let greeter = ctx.arg_slot(0)?.clone();
                let mut args = [ctx.arg_slot(1)?.clone()];
                let greeting = ctx.host().invoke_method(&greeter, "Greet", &mut args)?;
                ctx.set_return(greeting);
                Ok(())
            })),
    )
}

fn animal() -> TypeEntry {
    TypeEntry::class("Demo.Animal")
        .with_constructor(MethodEntry::constructor().native(native(|ctx| {
            ctx.set_return(HostObject::new(ANIMAL, AnimalState { name: "animal".into() }));
            Ok(())
        })))
        .with_property(PropertyEntry::property("Name", primitives::STRING).getter(native(|ctx| {
            let name = ctx.with_this(|a: &AnimalState| a.name.clone())?;
            ctx.set_return(name);
            Ok(())
        })))
        .with_method(
            MethodEntry::new("Speak")
                .returns(primitives::STRING)
                .virtual_method()
                .native(native(|ctx| {
                    ctx.set_return("...");
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("Legs")
                .returns(primitives::INT32)
                .virtual_method()
                .native(native(|ctx| {
                    ctx.set_return(4);
                    Ok(())
                })),
        )
        // Calls back through the host so overrides are honoured.
        .with_method(MethodEntry::new("Describe").returns(primitives::STRING).native(native(|ctx| {
            let this = ctx.this_value()?.clone();
            let sound = ctx.host().invoke_method(&this, "Speak", &mut [])?;
            let legs = ctx.host().invoke_method(&this, "Legs", &mut [])?;
            let sound = sound.as_str().unwrap_or_default().to_string();
            ctx.set_return(format!("{sound} on {} legs", legs.as_int().unwrap_or_default()));
            Ok(())
        })))
}

fn calc_getter(f: fn(&CalcState) -> i64) -> NativeFn {
    native(move |ctx| {
        let value = ctx.with_this(|c: &CalcState| f(c))?;
        ctx.set_return(value);
        Ok(())
    })
}

fn calculator(mode: &TypeEntry) -> TypeEntry {
    let add = |ty: TypeHash| {
        MethodEntry::new("Add")
            .param(ParamDef::new("a", ty))
            .param(ParamDef::new("b", ty))
            .returns(ty)
            .native(native(move |ctx| {
                let a = ctx.arg_slot(0)?.clone();
                let b = ctx.arg_slot(1)?.clone();
                let sum = match (a, b) {
                    (Dynamic::Int(a), Dynamic::Int(b)) => Dynamic::Int(a + b),
                    (Dynamic::String(a), Dynamic::String(b)) => Dynamic::String(a + &b),
                    (a, b) => Dynamic::Float(a.as_float().unwrap_or_default() + b.as_float().unwrap_or_default()),
                };
                ctx.set_return(sum);
                Ok(())
            }))
    };
    TypeEntry::class("Demo.Calculator")
        .with_constructor(MethodEntry::constructor().native(native(|ctx| {
            ctx.set_return(HostObject::new(CALCULATOR, CalcState::default()));
            Ok(())
        })))
        .with_constructor(
            MethodEntry::constructor()
                .param(ParamDef::new("start", primitives::INT64))
                .native(native(|ctx| {
                    let total: i64 = ctx.arg(0)?;
                    ctx.set_return(HostObject::new(
                        CALCULATOR,
                        CalcState {
                            total,
                            ..CalcState::default()
                        },
                    ));
                    Ok(())
                })),
        )
        .with_property(
            PropertyEntry::property("Total", primitives::INT64)
                .getter(calc_getter(|c| c.total))
                .setter(native(|ctx| {
                    let value: i64 = ctx.arg(0)?;
                    ctx.with_this_mut(|c: &mut CalcState| c.total = value)
                })),
        )
        .with_property(
            PropertyEntry::field("Precision", primitives::INT32)
                .static_member()
                .getter(native(|ctx| {
                    ctx.set_return(6);
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("Sum")
                .param(ParamDef::variadic("values", primitives::INT32))
                .returns(primitives::INT64)
                .native(native(|ctx| {
                    let values: HostArray = ctx.arg(0)?;
                    let sum: i64 = values.to_vec().iter().filter_map(Dynamic::as_int).sum();
                    ctx.set_return(sum);
                    Ok(())
                })),
        )
        .with_method(add(primitives::INT32))
        .with_method(add(primitives::FLOAT64))
        .with_method(add(primitives::STRING))
        .with_method(
            MethodEntry::new("Parse")
                .static_method()
                .param(ParamDef::new("text", primitives::STRING))
                .param(ParamDef::new("value", primitives::INT32).out())
                .returns(primitives::BOOL)
                .native(native(|ctx| {
                    let text: String = ctx.arg(0)?;
                    match text.trim().parse::<i32>() {
                        Ok(v) => {
                            ctx.set_arg(1, v)?;
                            ctx.set_return(true);
                        }
                        Err(_) => ctx.set_return(false),
                    }
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("Scale")
                .param(ParamDef::new("x", primitives::FLOAT64))
                .param(ParamDef::new("factor", primitives::FLOAT64).optional(2.0))
                .returns(primitives::FLOAT64)
                .native(native(|ctx| {
                    let x: f64 = ctx.arg(0)?;
                    let factor: f64 = ctx.arg(1)?;
                    ctx.set_return(x * factor);
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("Max")
                .static_method()
                .param(ParamDef::new("a", primitives::INT32))
                .param(ParamDef::new("b", primitives::INT32))
                .returns(primitives::INT32)
                .native(native(|ctx| {
                    let a: i32 = ctx.arg(0)?;
                    let b: i32 = ctx.arg(1)?;
                    ctx.set_return(a.max(b));
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("Bump")
                .param(ParamDef::new("by", primitives::INT64))
                .native(native(|ctx| {
                    let by: i64 = ctx.arg(0)?;
                    let (total, handlers) = ctx.with_this_mut(|c: &mut CalcState| {
                        c.total += by;
                        (c.total, c.changed.handlers())
                    })?;
                    raise_all(&handlers, ctx.host(), &[Dynamic::Int(total)])
                })),
        )
        .with_method(
            MethodEntry::new("Apply")
                .param(ParamDef::new("f", TRANSFORM))
                .param(ParamDef::new("x", primitives::INT32))
                .returns(primitives::INT32)
                .native(native(|ctx| {
                    let f: Delegate = ctx.arg(0)?;
                    let mut args = [ctx.arg_slot(1)?.clone()];
                    let ret = ctx.host().invoke_delegate(&f, &mut args)?;
                    ctx.set_return(ret);
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("get_Item")
                .param(ParamDef::new("key", primitives::STRING))
                .returns(primitives::INT64)
                .native(native(|ctx| {
                    let key: String = ctx.arg(0)?;
                    let value = ctx.with_this(|c: &CalcState| c.items.get(&key).copied())?;
                    match value {
                        Some(value) => {
                            ctx.set_return(value);
                            Ok(())
                        }
                        None => Err(NativeError::KeyNotFound { key }),
                    }
                })),
        )
        .with_method(
            MethodEntry::new("set_Item")
                .param(ParamDef::new("key", primitives::STRING))
                .param(ParamDef::new("value", primitives::INT64))
                .native(native(|ctx| {
                    let key: String = ctx.arg(0)?;
                    let value: i64 = ctx.arg(1)?;
                    ctx.with_this_mut(|c: &mut CalcState| {
                        c.items.insert(key, value);
                    })
                })),
        )
        .with_event(EventEntry::new(
            "Changed",
            CHANGED,
            native(|ctx| {
                let handler: Delegate = ctx.arg(0)?;
                ctx.with_this_mut(|c: &mut CalcState| c.changed.subscribe(handler))
            }),
            native(|ctx| {
                let handler: Delegate = ctx.arg(0)?;
                ctx.with_this_mut(|c: &mut CalcState| {
                    c.changed.unsubscribe(&handler);
                })
            }),
        ))
        .with_nested(mode)
}

fn vector_operands(ctx: &CallContext<'_>) -> Result<(Vector, Vector), NativeError> {
    let a: HostObject = ctx.arg(0)?;
    let b: HostObject = ctx.arg(1)?;
    let a = a.with(|v: &Vector| *v).ok_or_else(|| NativeError::failed("not a vector"))?;
    let b = b.with(|v: &Vector| *v).ok_or_else(|| NativeError::failed("not a vector"))?;
    Ok((a, b))
}

fn vector() -> TypeEntry {
    let component = |f: fn(&Vector) -> f64| {
        native(move |ctx| {
            let value = ctx.with_this(|v: &Vector| f(v))?;
            ctx.set_return(value);
            Ok(())
        })
    };
    TypeEntry::value("Demo.Vector")
        .with_constructor(
            MethodEntry::constructor()
                .param(ParamDef::new("x", primitives::FLOAT64))
                .param(ParamDef::new("y", primitives::FLOAT64))
                .native(native(|ctx| {
                    let v = Vector {
                        x: ctx.arg(0)?,
                        y: ctx.arg(1)?,
                    };
                    ctx.set_return(HostObject::new(VECTOR, v));
                    Ok(())
                })),
        )
        .with_property(PropertyEntry::field("X", primitives::FLOAT64).getter(component(|v| v.x)))
        .with_property(PropertyEntry::field("Y", primitives::FLOAT64).getter(component(|v| v.y)))
        .with_method(
            MethodEntry::new("op_Addition")
                .static_method()
                .param(ParamDef::new("a", VECTOR))
                .param(ParamDef::new("b", VECTOR))
                .returns(VECTOR)
                .native(native(|ctx| {
                    let (a, b) = vector_operands(ctx)?;
                    let sum = Vector {
                        x: a.x + b.x,
                        y: a.y + b.y,
                    };
                    ctx.set_return(HostObject::new(VECTOR, sum));
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("op_Equality")
                .static_method()
                .param(ParamDef::new("a", VECTOR))
                .param(ParamDef::new("b", VECTOR))
                .returns(primitives::BOOL)
                .native(native(|ctx| {
                    let (a, b) = vector_operands(ctx)?;
                    ctx.set_return(a == b);
                    Ok(())
                })),
        )
        .with_method(
            MethodEntry::new("op_UnaryNegation")
                .static_method()
                .param(ParamDef::new("a", VECTOR))
                .returns(VECTOR)
                .native(native(|ctx| {
                    let a: HostObject = ctx.arg(0)?;
                    let v = a.with(|v: &Vector| *v).ok_or_else(|| NativeError::failed("not a vector"))?;
                    ctx.set_return(HostObject::new(VECTOR, Vector { x: -v.x, y: -v.y }));
                    Ok(())
                })),
        )
        .with_method(MethodEntry::new("ToString").returns(primitives::STRING).native(native(|ctx| {
            let text = ctx.with_this(|v: &Vector| format!("({}, {})", v.x, v.y))?;
            ctx.set_return(text);
            Ok(())
        })))
}

fn assembly() -> Assembly {
    let mode = TypeEntry::enumeration("Demo.Calculator+Mode")
        .with_enum_member("Fast", 1)
        .with_enum_member("Precise", 2);
    let calculator = calculator(&mode);
    let transform = TypeEntry::delegate(
        "Demo.Transform",
        MethodEntry::new("Invoke")
            .param(ParamDef::new("x", primitives::INT32))
            .returns(primitives::INT32),
    );
    let changed = TypeEntry::delegate(
        "Demo.ChangedHandler",
        MethodEntry::new("Invoke").param(ParamDef::new("total", primitives::INT64)),
    );
    let reading = TypeEntry::delegate(
        "Demo.Reading",
        MethodEntry::new("Invoke").param(ParamDef::new("value", primitives::INT32).out()),
    );
    let color = TypeEntry::enumeration("Demo.Color")
        .with_enum_member("Red", 1)
        .with_enum_member("Green", 2)
        .with_enum_member("Blue", 4);
    let sealed = TypeEntry::class("Demo.Sealed").with_constructor(
        MethodEntry::constructor().param(ParamDef::new("seed", primitives::INT32)),
    );
    let doubled = MethodEntry::new("Doubled")
        .param(ParamDef::new("calc", CALCULATOR))
        .returns(primitives::INT64)
        .native(native(|ctx| {
            let calc: HostObject = ctx.arg(0)?;
            let total = calc
                .with(|c: &CalcState| c.total)
                .ok_or_else(|| NativeError::failed("not a calculator"))?;
            ctx.set_return(total * 2);
            Ok(())
        }));
    Assembly::new("Demo")
        .with_type(greeter())
        .with_type(greetings())
        .with_type(animal())
        .with_type(calculator)
        .with_type(mode)
        .with_type(transform)
        .with_type(changed)
        .with_type(reading)
        .with_type(meter())
        .with_type(vector())
        .with_type(color)
        .with_type(sealed)
        .with_extension(doubled)
}

/// Registry with the `Demo` assembly, shared by every test in a binary.
pub fn registry() -> Arc<TypeRegistry> {
    static REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut registry = TypeRegistry::new();
            registry.register_assembly(assembly()).expect("demo assembly registers");
            Arc::new(registry)
        })
        .clone()
}

/// A bridge with `Demo` loaded.
pub fn bridge() -> Bridge {
    let _ = tracing_subscriber::fmt::try_init();
    let mut bridge = Bridge::new(registry());
    bridge.load_assembly("Demo").expect("demo assembly loads");
    bridge
}

/// Push the global `name` (normally a type reference or global function).
pub fn global(b: &mut Bridge, name: &str) {
    b.get_global(name).expect("global lookup");
}

/// Push a fresh calculator built from script.
pub fn new_calculator(b: &mut Bridge, start: i64) {
    b.push(&Dynamic::Type(CALCULATOR)).unwrap();
    b.state().push_integer(start);
    b.call(1, Some(1)).unwrap();
}

/// Push a table with the given function fields.
pub fn push_table(b: &mut Bridge, fields: Vec<(&str, StackFunction)>) {
    b.state().new_table();
    for (name, function) in fields {
        b.state().push_string(name);
        b.state().push_function(Some(name), function);
        b.state().raw_set(-3);
    }
}

/// `obj:name(args...)` for the value at `target`, returning every result.
pub fn method(b: &mut Bridge, target: i32, name: &str, args: &[Dynamic]) -> Vec<Dynamic> {
    b.call_method(target, name, args)
        .unwrap_or_else(|e| panic!("{name} failed: {e}"))
}

/// A script function implemented by `body`.
pub fn script(body: impl Fn(&mut Bridge) -> ScriptResult<i32> + 'static) -> StackFunction {
    Rc::new(body)
}

/// Host handle to a named script function.
pub fn function_ref(b: &mut Bridge, name: &str, body: impl Fn(&mut Bridge) -> ScriptResult<i32> + 'static) -> Dynamic {
    b.create_function(name, body);
    let function = b.to_dynamic(-1).unwrap();
    b.state().set_top(-2);
    function
}

/// `make_object(table, superclass)` for the table at `table`, leaving the result on top.
pub fn make_object(b: &mut Bridge, table: i32, superclass: &str) -> ScriptResult<i32> {
    global(b, "make_object");
    b.state().push_value(table);
    b.state().push_string(superclass);
    b.call(2, Some(1))
}
