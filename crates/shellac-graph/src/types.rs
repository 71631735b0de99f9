//! Interned type descriptors for shader-graph values.
//!
//! A [`TypeDesc`] names a value type that can flow through a graph.
//! Descriptors are interned for the lifetime of the process and compared
//! by identity: two [`TypeRef`]s denote the same type exactly when they
//! point at the same descriptor. [`TypeDesc::get`] resolves document type
//! names to handles; [`TypeDesc::register`] interns extension types and
//! must happen before graphs are processed concurrently.

use crate::error::GraphError;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{OnceLock, RwLock};

/// Semantic category of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSemantic {
    Scalar,
    Vector,
    Color,
    Matrix,
    String,
    Filename,
    /// A light-interaction closure (BSDF, EDF, VDF).
    Closure,
    /// A full shader signature (surface, light).
    Shader,
}

/// An interned value-type descriptor.
#[derive(Debug)]
pub struct TypeDesc {
    name: &'static str,
    semantic: TypeSemantic,
    size: usize,
}

/// Handle to an interned type descriptor.
pub type TypeRef = &'static TypeDesc;

impl TypeDesc {
    const fn new(name: &'static str, semantic: TypeSemantic, size: usize) -> Self {
        Self {
            name,
            semantic,
            size,
        }
    }

    /// The document name of this type.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The semantic category.
    pub fn semantic(&self) -> TypeSemantic {
        self.semantic
    }

    /// Number of scalar components; 0 for opaque types.
    pub fn size(&self) -> usize {
        self.size
    }

    /// True for single-component numeric types.
    pub fn is_scalar(&self) -> bool {
        self.semantic == TypeSemantic::Scalar
    }

    /// True for closure types.
    pub fn is_closure(&self) -> bool {
        self.semantic == TypeSemantic::Closure
    }

    /// True for shader types.
    pub fn is_shader(&self) -> bool {
        self.semantic == TypeSemantic::Shader
    }

    /// Looks up an interned descriptor by document type name.
    pub fn get(name: &str) -> Option<TypeRef> {
        registry()
            .read()
            .expect("type registry poisoned")
            .get(name)
            .copied()
    }

    /// Interns a new descriptor, returning the existing handle when the
    /// name is already registered.
    pub fn register(name: &str, semantic: TypeSemantic, size: usize) -> TypeRef {
        let mut reg = registry().write().expect("type registry poisoned");
        if let Some(existing) = reg.get(name) {
            return existing;
        }
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let desc: TypeRef = Box::leak(Box::new(TypeDesc::new(name, semantic, size)));
        reg.insert(name, desc);
        desc
    }
}

/// Resolves a document type name, raising on unknown names.
pub(crate) fn resolve(name: &str) -> Result<TypeRef, GraphError> {
    TypeDesc::get(name).ok_or_else(|| GraphError::UnknownType(name.to_string()))
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const TypeDesc).hash(state);
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Built-in types known to every generator.
pub mod builtin {
    use super::{TypeDesc, TypeSemantic};

    pub static BOOLEAN: TypeDesc = TypeDesc::new("boolean", TypeSemantic::Scalar, 1);
    pub static INTEGER: TypeDesc = TypeDesc::new("integer", TypeSemantic::Scalar, 1);
    pub static FLOAT: TypeDesc = TypeDesc::new("float", TypeSemantic::Scalar, 1);
    pub static VECTOR2: TypeDesc = TypeDesc::new("vector2", TypeSemantic::Vector, 2);
    pub static VECTOR3: TypeDesc = TypeDesc::new("vector3", TypeSemantic::Vector, 3);
    pub static VECTOR4: TypeDesc = TypeDesc::new("vector4", TypeSemantic::Vector, 4);
    pub static COLOR3: TypeDesc = TypeDesc::new("color3", TypeSemantic::Color, 3);
    pub static COLOR4: TypeDesc = TypeDesc::new("color4", TypeSemantic::Color, 4);
    pub static MATRIX33: TypeDesc = TypeDesc::new("matrix33", TypeSemantic::Matrix, 9);
    pub static MATRIX44: TypeDesc = TypeDesc::new("matrix44", TypeSemantic::Matrix, 16);
    pub static STRING: TypeDesc = TypeDesc::new("string", TypeSemantic::String, 1);
    pub static FILENAME: TypeDesc = TypeDesc::new("filename", TypeSemantic::Filename, 1);
    pub static SURFACESHADER: TypeDesc = TypeDesc::new("surfaceshader", TypeSemantic::Shader, 0);
    pub static LIGHTSHADER: TypeDesc = TypeDesc::new("lightshader", TypeSemantic::Shader, 0);
    pub static BSDF: TypeDesc = TypeDesc::new("BSDF", TypeSemantic::Closure, 0);
    pub static EDF: TypeDesc = TypeDesc::new("EDF", TypeSemantic::Closure, 0);
    pub static VDF: TypeDesc = TypeDesc::new("VDF", TypeSemantic::Closure, 0);
}

fn registry() -> &'static RwLock<HashMap<&'static str, TypeRef>> {
    static REGISTRY: OnceLock<RwLock<HashMap<&'static str, TypeRef>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let builtins: [TypeRef; 17] = [
            &builtin::BOOLEAN,
            &builtin::INTEGER,
            &builtin::FLOAT,
            &builtin::VECTOR2,
            &builtin::VECTOR3,
            &builtin::VECTOR4,
            &builtin::COLOR3,
            &builtin::COLOR4,
            &builtin::MATRIX33,
            &builtin::MATRIX44,
            &builtin::STRING,
            &builtin::FILENAME,
            &builtin::SURFACESHADER,
            &builtin::LIGHTSHADER,
            &builtin::BSDF,
            &builtin::EDF,
            &builtin::VDF,
        ];
        RwLock::new(builtins.iter().map(|t| (t.name, *t)).collect())
    })
}
