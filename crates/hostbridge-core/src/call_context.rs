//! Call context handed to native host functions.

use std::any::{Any, type_name};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use crate::convert::{FromDynamic, IntoDynamic};
use crate::{ConversionError, Dynamic, HostObject, NativeError, ScriptHost};

/// Context for native function calls.
///
/// Gives typed access to the receiver and arguments, collects the return
/// value, and lets the callee reach back into the interpreter through
/// [`CallContext::host`].
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// let total = ctx.with_this(|c: &Calculator| c.total)?;
/// ctx.set_return(x + total);
/// ```
pub struct CallContext<'a> {
    this: Option<&'a Dynamic>,
    args: &'a mut [Dynamic],
    return_slot: &'a mut Dynamic,
    host: &'a mut dyn ScriptHost,
}

impl<'a> CallContext<'a> {
    /// Create a new call context.
    ///
    /// `args` holds one slot per declared parameter. By-ref and out
    /// parameters are written back through [`CallContext::set_arg`].
    pub fn new(
        this: Option<&'a Dynamic>,
        args: &'a mut [Dynamic],
        return_slot: &'a mut Dynamic,
        host: &'a mut dyn ScriptHost,
    ) -> Self {
        Self {
            this,
            args,
            return_slot,
            host,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.args.get(index).ok_or(NativeError::ArgumentIndexOutOfBounds {
            index,
            count: self.args.len(),
        })
    }

    /// Get a typed argument value.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    /// All argument slots.
    pub fn args(&self) -> &[Dynamic] {
        self.args
    }

    /// Write a by-ref or out argument.
    pub fn set_arg(&mut self, index: usize, value: impl IntoDynamic) -> Result<(), NativeError> {
        let count = self.args.len();
        let slot = self
            .args
            .get_mut(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })?;
        *slot = value.into_dynamic();
        Ok(())
    }

    /// Set the return value from a raw slot.
    pub fn set_return_slot(&mut self, slot: Dynamic) {
        *self.return_slot = slot;
    }

    /// Set a typed return value.
    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        *self.return_slot = value.into_dynamic();
    }

    /// The receiver, for instance members.
    pub fn this_value(&self) -> Result<&'a Dynamic, NativeError> {
        self.this
            .ok_or_else(|| NativeError::invalid_this("static call has no receiver"))
    }

    /// The receiver as a host object.
    pub fn this_object(&self) -> Result<&'a HostObject, NativeError> {
        match self.this_value()? {
            Dynamic::Object(obj) => Ok(obj),
            other => Err(NativeError::invalid_this(format!(
                "expected object, got {}",
                other.type_name()
            ))),
        }
    }

    /// Borrow the receiver's payload as `T`.
    pub fn this_ref<T: Any>(&self) -> Result<MappedRwLockReadGuard<'a, T>, NativeError> {
        self.this_object()?
            .read::<T>()
            .ok_or_else(|| payload_mismatch::<T>())
    }

    /// Mutably borrow the receiver's payload as `T`.
    pub fn this_mut<T: Any>(&self) -> Result<MappedRwLockWriteGuard<'a, T>, NativeError> {
        self.this_object()?
            .write::<T>()
            .ok_or_else(|| payload_mismatch::<T>())
    }

    /// Run `f` against the receiver's payload.
    pub fn with_this<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        let guard = self.this_ref::<T>()?;
        Ok(f(&guard))
    }

    /// Run `f` against the receiver's mutable payload.
    pub fn with_this_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, NativeError> {
        let mut guard = self.this_mut::<T>()?;
        Ok(f(&mut guard))
    }

    /// The interpreter this call came from.
    pub fn host(&mut self) -> &mut dyn ScriptHost {
        &mut *self.host
    }
}

fn payload_mismatch<T: Any>() -> NativeError {
    NativeError::Conversion(ConversionError::PayloadMismatch {
        target_type: type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DetachedHost, TypeHash};

    struct Account {
        balance: i64,
    }

    #[test]
    fn typed_args_and_return() {
        let mut args = vec![Dynamic::Int(2), Dynamic::Float(0.5)];
        let mut ret = Dynamic::Null;
        let mut host = DetachedHost;
        let mut ctx = CallContext::new(None, &mut args, &mut ret, &mut host);
        let a: i32 = ctx.arg(0).unwrap();
        let b: f64 = ctx.arg(1).unwrap();
        ctx.set_return(a as f64 + b);
        assert!(matches!(
            ctx.arg::<i32>(2),
            Err(NativeError::ArgumentIndexOutOfBounds { index: 2, count: 2 })
        ));
        assert_eq!(ret, Dynamic::Float(2.5));
    }

    #[test]
    fn out_args_write_back() {
        let mut args = vec![Dynamic::Null];
        let mut ret = Dynamic::Null;
        let mut host = DetachedHost;
        let mut ctx = CallContext::new(None, &mut args, &mut ret, &mut host);
        ctx.set_arg(0, 17i32).unwrap();
        assert_eq!(args[0], Dynamic::Int(17));
    }

    #[test]
    fn receiver_payload() {
        let this = Dynamic::Object(HostObject::new(TypeHash::from_name("Demo.Account"), Account { balance: 5 }));
        let mut args = Vec::new();
        let mut ret = Dynamic::Null;
        let mut host = DetachedHost;
        let ctx = CallContext::new(Some(&this), &mut args, &mut ret, &mut host);
        ctx.with_this_mut(|a: &mut Account| a.balance += 10).unwrap();
        assert_eq!(ctx.with_this(|a: &Account| a.balance).unwrap(), 15);
        assert!(matches!(
            ctx.this_ref::<String>(),
            Err(NativeError::Conversion(ConversionError::PayloadMismatch { .. }))
        ));
    }

    #[test]
    fn static_call_has_no_receiver() {
        let mut args = Vec::new();
        let mut ret = Dynamic::Null;
        let mut host = DetachedHost;
        let ctx = CallContext::new(None, &mut args, &mut ret, &mut host);
        assert!(matches!(ctx.this_object(), Err(NativeError::InvalidThis { .. })));
    }
}
