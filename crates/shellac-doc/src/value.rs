//! Literal values carried by material documents and shader-graph ports.
//!
//! A [`Value`] is the tagged union that flows from document defaults and
//! bindings into graph input ports. Type safety across connections is the
//! graph layer's job; the accessors here fail when a literal is read as
//! the wrong dynamic type.

use glam::{Vec2, Vec3, Vec4};
use std::fmt;
use thiserror::Error;

/// Error when a literal value is read as the wrong dynamic type.
#[derive(Debug, Clone, Error)]
#[error("value type error: expected {expected}, got {got}")]
pub struct ValueTypeError {
    /// The type that was requested.
    pub expected: &'static str,
    /// The type the value actually holds.
    pub got: &'static str,
}

impl ValueTypeError {
    /// Creates a new error for a failed typed read.
    pub fn expected(expected: &'static str, got: &'static str) -> Self {
        Self { expected, got }
    }
}

/// A typed literal value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// RGB color, distinct from `Vec3` at the type level.
    Color3(Vec3),
    /// RGBA color, distinct from `Vec4` at the type level.
    Color4(Vec4),
    String(String),
    /// A file path, distinct from `String` at the type level.
    Filename(String),
}

impl Value {
    /// Returns the document type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Vec2(_) => "vector2",
            Value::Vec3(_) => "vector3",
            Value::Vec4(_) => "vector4",
            Value::Color3(_) => "color3",
            Value::Color4(_) => "color4",
            Value::String(_) => "string",
            Value::Filename(_) => "filename",
        }
    }

    /// Attempts to extract a bool.
    pub fn as_bool(&self) -> Result<bool, ValueTypeError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(ValueTypeError::expected("boolean", other.type_name())),
        }
    }

    /// Attempts to extract an integer.
    pub fn as_int(&self) -> Result<i32, ValueTypeError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(ValueTypeError::expected("integer", other.type_name())),
        }
    }

    /// Attempts to extract a float.
    pub fn as_float(&self) -> Result<f32, ValueTypeError> {
        match self {
            Value::Float(v) => Ok(*v),
            other => Err(ValueTypeError::expected("float", other.type_name())),
        }
    }

    /// Attempts to extract a Vec2.
    pub fn as_vec2(&self) -> Result<Vec2, ValueTypeError> {
        match self {
            Value::Vec2(v) => Ok(*v),
            other => Err(ValueTypeError::expected("vector2", other.type_name())),
        }
    }

    /// Attempts to extract a Vec3.
    pub fn as_vec3(&self) -> Result<Vec3, ValueTypeError> {
        match self {
            Value::Vec3(v) => Ok(*v),
            other => Err(ValueTypeError::expected("vector3", other.type_name())),
        }
    }

    /// Attempts to extract a Vec4.
    pub fn as_vec4(&self) -> Result<Vec4, ValueTypeError> {
        match self {
            Value::Vec4(v) => Ok(*v),
            other => Err(ValueTypeError::expected("vector4", other.type_name())),
        }
    }

    /// Attempts to extract an RGB color.
    pub fn as_color3(&self) -> Result<Vec3, ValueTypeError> {
        match self {
            Value::Color3(v) => Ok(*v),
            other => Err(ValueTypeError::expected("color3", other.type_name())),
        }
    }

    /// Attempts to extract an RGBA color.
    pub fn as_color4(&self) -> Result<Vec4, ValueTypeError> {
        match self {
            Value::Color4(v) => Ok(*v),
            other => Err(ValueTypeError::expected("color4", other.type_name())),
        }
    }

    /// Attempts to extract a string.
    pub fn as_string(&self) -> Result<&str, ValueTypeError> {
        match self {
            Value::String(v) => Ok(v),
            other => Err(ValueTypeError::expected("string", other.type_name())),
        }
    }

    /// Attempts to extract a file path.
    pub fn as_filename(&self) -> Result<&str, ValueTypeError> {
        match self {
            Value::Filename(v) => Ok(v),
            other => Err(ValueTypeError::expected("filename", other.type_name())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Vec2(v) => write!(f, "{}, {}", v.x, v.y),
            Value::Vec3(v) | Value::Color3(v) => write!(f, "{}, {}, {}", v.x, v.y, v.z),
            Value::Vec4(v) | Value::Color4(v) => {
                write!(f, "{}, {}, {}, {}", v.x, v.y, v.z, v.w)
            }
            Value::String(v) | Value::Filename(v) => write!(f, "{v}"),
        }
    }
}
