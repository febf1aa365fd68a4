use crate::{TypeHash, primitives};

/// The declared type of a parameter, return value, field or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    /// Element type for arrays, the type itself otherwise.
    pub type_hash: TypeHash,
    pub is_array: bool,
}

impl DataType {
    pub const VOID: DataType = DataType::simple(primitives::VOID);

    pub const fn simple(type_hash: TypeHash) -> Self {
        Self {
            type_hash,
            is_array: false,
        }
    }

    pub const fn array_of(element: TypeHash) -> Self {
        Self {
            type_hash: element,
            is_array: true,
        }
    }

    pub fn is_void(&self) -> bool {
        !self.is_array && self.type_hash == primitives::VOID
    }
}

impl From<TypeHash> for DataType {
    fn from(type_hash: TypeHash) -> Self {
        DataType::simple(type_hash)
    }
}
