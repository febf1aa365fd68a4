//! Host values crossing into script code and back.

mod common;

use common::*;
use hostbridge::prelude::*;

#[test]
fn test_reference_instance_has_single_alias() {
    let mut b = bridge();
    let calc = Dynamic::Object(HostObject::new(CALCULATOR, CalcState::default()));
    b.push(&calc).unwrap();
    b.push(&calc).unwrap();
    assert!(b.state().raw_equal(1, 2));
    assert_eq!(b.object_count(), 1);
}

#[test]
fn test_value_type_instances_get_own_aliases() {
    let mut b = bridge();
    let v = Dynamic::Object(HostObject::new(VECTOR, Vector { x: 1.0, y: 2.0 }));
    b.push(&v).unwrap();
    b.push(&v).unwrap();
    assert!(!b.state().raw_equal(1, 2));
    assert_eq!(b.object_count(), 2);
}

#[test]
fn test_collected_alias_is_rebuilt() {
    let mut b = bridge();
    let calc = Dynamic::Object(HostObject::new(CALCULATOR, CalcState::default()));
    b.push(&calc).unwrap();
    let first = b.state().userdata_id(-1).unwrap();
    b.state().set_top(0);

    // The alias is gone but its finalizer has not run yet.
    b.push(&calc).unwrap();
    let second = b.state().userdata_id(-1).unwrap();
    assert_ne!(first, second);
    assert_eq!(b.object_count(), 1);

    // The late finalizer must not release the new alias.
    b.collect_garbage();
    assert_eq!(b.object_count(), 1);
    assert_eq!(b.to_dynamic(-1).unwrap(), calc);
}

#[test]
fn test_collect_garbage_releases_dropped_aliases() {
    let mut b = bridge();
    b.push(&Dynamic::Object(HostObject::new(CALCULATOR, CalcState::default())))
        .unwrap();
    b.push(&Dynamic::Object(HostObject::new(VECTOR, Vector { x: 0.0, y: 0.0 })))
        .unwrap();
    b.state().set_top(0);
    assert_eq!(b.collect_garbage(), 2);
    assert_eq!(b.object_count(), 0);
}

#[test]
fn test_values_round_trip() {
    let mut b = bridge();
    let values = [
        Dynamic::Null,
        Dynamic::Bool(true),
        Dynamic::Int(-7),
        Dynamic::Float(0.5),
        Dynamic::from("text"),
        Dynamic::Enum(EnumValue::new(COLOR, 4)),
        Dynamic::Type(VECTOR),
    ];
    for value in &values {
        b.push(value).unwrap();
        assert_eq!(&b.to_dynamic(-1).unwrap(), value);
        b.state().set_top(-2);
    }
}

#[test]
fn test_nested_table_round_trip() {
    let mut b = bridge();
    // { inner = { n = 3 } }
    b.state().new_table();
    b.state().push_string("inner");
    b.state().new_table();
    b.state().push_string("n");
    b.state().push_integer(3);
    b.state().raw_set(-3);
    b.state().raw_set(1);
    let outer = b.to_dynamic(1).unwrap();
    assert!(matches!(outer, Dynamic::Table(_)));
    b.state().set_top(0);

    b.push(&outer).unwrap();
    b.get_field(1, "inner").unwrap();
    let inner = b.to_dynamic(2).unwrap();
    assert!(matches!(inner, Dynamic::Table(_)));
    b.push(&inner).unwrap();
    assert!(b.state().raw_equal(2, 3));
    b.get_field(3, "n").unwrap();
    assert_eq!(b.to_dynamic(-1).unwrap(), Dynamic::Int(3));
}

#[test]
fn test_host_mapping_round_trip_keeps_identity() {
    let mut b = bridge();
    let calc = Dynamic::Object(HostObject::new(CALCULATOR, CalcState::default()));
    b.push(&calc).unwrap();
    b.state().push_string("apple");
    b.state().push_integer(5);
    b.set_table(1).unwrap();

    let back = b.to_dynamic(1).unwrap();
    assert_eq!(back, calc);
    let stored = back
        .as_object()
        .and_then(|obj| obj.with(|c: &CalcState| c.items.get("apple").copied()))
        .flatten();
    assert_eq!(stored, Some(5));

    b.state().set_top(0);
    b.push(&back).unwrap();
    b.get_field(1, "apple").unwrap();
    assert_eq!(b.to_dynamic(-1).unwrap(), Dynamic::Int(5));
}

#[test]
fn test_delegate_round_trip_keeps_identity() {
    let mut b = bridge();
    let delegate = Delegate::native(
        TRANSFORM,
        NativeFn::new(|ctx: &mut CallContext<'_>| {
            let x: i32 = ctx.arg(0)?;
            ctx.set_return(x + 1);
            Ok(())
        }),
    );
    b.push(&Dynamic::Delegate(delegate.clone())).unwrap();
    let back = b.to_dynamic(-1).unwrap();
    assert!(back.as_delegate().is_some_and(|d| d.ptr_eq(&delegate)));

    // Delegates are callable from script code.
    b.state().push_integer(5);
    b.call(1, Some(1)).unwrap();
    assert_eq!(b.to_dynamic(-1).unwrap(), Dynamic::Int(6));
}

#[test]
fn test_script_values_become_references() {
    let mut b = bridge();
    b.state().new_table();
    let table = b.to_dynamic(-1).unwrap();
    assert!(matches!(table, Dynamic::Table(_)));
    b.state().set_top(0);

    // The handle keeps the table alive after the stack drops it.
    b.push(&table).unwrap();
    assert_eq!(b.state().type_of(-1), ScriptType::Table);
}

#[test]
fn test_foreign_reference_is_rejected() {
    let mut a = bridge();
    let mut b = bridge();
    a.state().new_table();
    let table = a.to_dynamic(-1).unwrap();
    let err = b.push(&table).unwrap_err();
    assert_eq!(err, ScriptError::ForeignReference);
}
