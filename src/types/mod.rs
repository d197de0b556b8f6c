use crate::global::GlobalContext;
use crate::global::platform::Platform;

/// The structural type model shared by the whole middle-end. Types are
/// compared structurally, equality is total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Char,
    /// A string is a (pointer, length) pair.
    String,
    Void,
    Pointer(Box<Type>),
    Array(Box<Type>, Option<usize>),
    Record(String),
}

impl Type {
    pub fn pointer_to(inner: Type) -> Type {
        Type::Pointer(Box::new(inner))
    }

    pub fn array_of(element: Type, length: Option<usize>) -> Type {
        Type::Array(Box::new(element), length)
    }

    /// Byte size of a value of this type on the given platform. Array sizes
    /// include the length header; record sizes come from the record table.
    pub fn size(&self, platform: &Platform, global: &GlobalContext) -> usize {
        match self {
            Type::Int | Type::Bool | Type::Char | Type::Pointer(_) => platform.word_size,
            Type::Float => platform.float_size,
            Type::String => 2 * platform.word_size,
            Type::Void => 0,
            Type::Array(element, length) => {
                let elements = length.unwrap_or(0);
                platform.word_size + elements * element.size(platform, global)
            }
            Type::Record(name) => global.record_size(name, platform),
        }
    }

    /// Whether a value of this type fits in a single integer register.
    pub fn is_single_int_register(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Bool | Type::Char | Type::Pointer(_)
        )
    }

    /// Whether a value of this type fits in a single floating register.
    pub fn is_single_float_register(&self) -> bool {
        matches!(self, Type::Float)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_))
    }

    /// Element type of an array or pointee of a pointer.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) | Type::Array(inner, _) => Some(inner),
            _ => None,
        }
    }
}
