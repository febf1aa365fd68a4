//! Methods, constructors and their parameters.

use crate::{DataType, Dynamic, NativeFn, TypeHash};

use super::MemberFlags;

/// Name under which constructors are stored.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamMode {
    #[default]
    In,
    /// Read and written back to the caller.
    Ref,
    /// Written only; the caller supplies nothing.
    Out,
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub data_type: DataType,
    pub mode: ParamMode,
    /// Trailing variable-length argument list. `data_type` is the array type.
    pub variadic: bool,
    /// Default used when the caller omits the argument.
    pub default: Option<Dynamic>,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            mode: ParamMode::In,
            variadic: false,
            default: None,
        }
    }

    /// Trailing `params`-style list of `element` values.
    pub fn variadic(name: impl Into<String>, element: TypeHash) -> Self {
        Self {
            variadic: true,
            ..Self::new(name, DataType::array_of(element))
        }
    }

    pub fn by_ref(mut self) -> Self {
        self.mode = ParamMode::Ref;
        self
    }

    pub fn out(mut self) -> Self {
        self.mode = ParamMode::Out;
        self
    }

    pub fn optional(mut self, default: impl Into<Dynamic>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    /// Value is written back to the caller.
    pub fn is_by_ref(&self) -> bool {
        self.mode != ParamMode::In
    }
}

/// A method or constructor of a host type.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    /// Set when the method is added to a type.
    pub declaring_type: TypeHash,
    pub params: Vec<ParamDef>,
    pub return_type: DataType,
    pub flags: MemberFlags,
    /// Implementation. `None` for abstract and interface members.
    pub native: Option<NativeFn>,
}

impl MethodEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: TypeHash::EMPTY,
            params: Vec::new(),
            return_type: DataType::VOID,
            flags: MemberFlags::empty(),
            native: None,
        }
    }

    /// A constructor; `native` must set the new instance as its return value.
    pub fn constructor() -> Self {
        Self::new(CONSTRUCTOR_NAME).with_flags(MemberFlags::STATIC)
    }

    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, data_type: impl Into<DataType>) -> Self {
        self.return_type = data_type.into();
        self
    }

    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn static_method(self) -> Self {
        self.with_flags(MemberFlags::STATIC)
    }

    pub fn virtual_method(self) -> Self {
        self.with_flags(MemberFlags::VIRTUAL)
    }

    pub fn abstract_method(self) -> Self {
        self.with_flags(MemberFlags::VIRTUAL | MemberFlags::ABSTRACT)
    }

    pub fn native(mut self, native: NativeFn) -> Self {
        self.native = Some(native);
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.intersects(MemberFlags::VIRTUAL | MemberFlags::ABSTRACT)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MemberFlags::ABSTRACT)
    }

    pub fn is_extension(&self) -> bool {
        self.flags.contains(MemberFlags::EXTENSION)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Parameters the caller passes a value for.
    pub fn input_count(&self) -> usize {
        self.params.iter().filter(|p| p.mode != ParamMode::Out).count()
    }

    /// Result slots handed back to the caller: return value, then by-ref values in order.
    pub fn result_types(&self) -> Vec<DataType> {
        std::iter::once(self.return_type)
            .chain(self.params.iter().filter(|p| p.is_by_ref()).map(|p| p.data_type))
            .collect()
    }

    /// Exact parameter type list match.
    pub fn has_signature(&self, params: &[DataType]) -> bool {
        self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(p, t)| p.data_type == *t)
    }
}
