//! Script operators on host values.

mod common;

use common::*;
use hostbridge::Operator;
use hostbridge::prelude::*;

fn push_vector(b: &mut Bridge, x: f64, y: f64) {
    b.push(&Dynamic::Object(HostObject::new(VECTOR, Vector { x, y }))).unwrap();
}

fn vector_at(b: &mut Bridge, index: i32) -> Vector {
    let value = b.to_dynamic(index).unwrap();
    value
        .as_object()
        .and_then(|obj| obj.with(|v: &Vector| *v))
        .expect("vector value")
}

#[test]
fn test_addition_uses_static_operator() {
    let mut b = bridge();
    push_vector(&mut b, 1.0, 2.0);
    push_vector(&mut b, 3.0, 4.0);
    b.arith(Operator::Add).unwrap();
    assert_eq!(b.state().get_top(), 1);
    assert_eq!(vector_at(&mut b, 1), Vector { x: 4.0, y: 6.0 });
}

#[test]
fn test_unary_negation() {
    let mut b = bridge();
    push_vector(&mut b, 1.0, -2.0);
    b.arith(Operator::Unm).unwrap();
    assert_eq!(vector_at(&mut b, -1), Vector { x: -1.0, y: 2.0 });
}

#[test]
fn test_equality_compares_values() {
    let mut b = bridge();
    push_vector(&mut b, 1.0, 2.0);
    push_vector(&mut b, 1.0, 2.0);
    push_vector(&mut b, 0.0, 2.0);
    assert!(b.compare(1, 2, Operator::Eq).unwrap());
    assert!(!b.compare(1, 3, Operator::Eq).unwrap());
}

#[test]
fn test_undefined_operator_names_types() {
    let mut b = bridge();
    push_vector(&mut b, 1.0, 2.0);
    b.state().push_integer(1);
    let err = b.arith(Operator::Add).unwrap_err();
    assert_eq!(err.message(), "operator op_Addition is not defined for Demo.Vector");
}

#[test]
fn test_numbers_skip_host_operators() {
    let mut b = bridge();
    b.state().push_integer(2);
    b.state().push_number(0.5);
    b.arith(Operator::Mul).unwrap();
    assert_eq!(b.to_dynamic(-1).unwrap(), Dynamic::Float(1.0));
}
