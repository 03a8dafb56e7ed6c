//! Decoded property values
//!
//! Every property on a virtual or live node holds exactly one `Variant`.
//! The serde representation is externally tagged, so a value travels as
//! `{"Vector3": [1.0, 2.0, 3.0]}`.

use crate::live::LiveHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// RGB color with float channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Quantize every channel to an 8-bit integer
    pub fn to_rgb8(&self) -> [u8; 3] {
        [quantize(self.r), quantize(self.g), quantize(self.b)]
    }
}

fn quantize(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Position plus a 3x3 rotation matrix (one row per axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CFrame {
    pub position: Vector3,
    pub orientation: [Vector3; 3],
}

impl CFrame {
    /// Identity rotation at `position`
    pub fn from_position(position: Vector3) -> Self {
        Self {
            position,
            orientation: [
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: f32,
    pub max: f32,
}

/// Named enumeration member with its underlying numeric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub enum_type: String,
    pub value: u32,
}

/// Reference from one node to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ref {
    /// Points at nothing
    Null,
    /// Points at a node by stable identity (virtual side)
    Id(String),
    /// Points at a live node (decoded)
    Handle(LiveHandle),
}

/// A decoded property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    EnumItem(EnumItem),
    Color3(Color3),
    Vector2(Vector2),
    Vector3(Vector3),
    CFrame(CFrame),
    NumberRange(NumberRange),
    Tags(Vec<String>),
    Attributes(BTreeMap<String, Variant>),
    Ref(Ref),
}

impl Variant {
    /// Short type name, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Bool(_) => "Bool",
            Variant::Int64(_) => "Int64",
            Variant::Float64(_) => "Float64",
            Variant::String(_) => "String",
            Variant::EnumItem(_) => "EnumItem",
            Variant::Color3(_) => "Color3",
            Variant::Vector2(_) => "Vector2",
            Variant::Vector3(_) => "Vector3",
            Variant::CFrame(_) => "CFrame",
            Variant::NumberRange(_) => "NumberRange",
            Variant::Tags(_) => "Tags",
            Variant::Attributes(_) => "Attributes",
            Variant::Ref(_) => "Ref",
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Variant::Int64(v) => Some(*v as f64),
            Variant::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// True for values that point at another node by identity
    pub fn is_identity_ref(&self) -> bool {
        matches!(self, Variant::Ref(Ref::Id(_)))
    }

    /// The null-reference sentinel
    pub const fn null_ref() -> Self {
        Variant::Ref(Ref::Null)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Float64(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Int64(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<Vector3> for Variant {
    fn from(value: Vector3) -> Self {
        Variant::Vector3(value)
    }
}

impl From<Color3> for Variant {
    fn from(value: Color3) -> Self {
        Variant::Color3(value)
    }
}
