use std::fmt;

use dangle_ids::NodeID;
use glam::Vec3;

/// Well-known attribute and plug names used by the host and the rig stages.
pub mod attrs {
    pub const VISIBILITY: &str = "visibility";
    pub const LOCKED: &str = "locked";

    pub const WORLD_SPACE: &str = "worldSpace";
    pub const WORLD_MATRIX: &str = "worldMatrix";
    pub const IN_CURVE: &str = "inCurve";
    pub const OUT_CURVE: &str = "outCurve";
    pub const CREATE: &str = "create";

    pub const START_POSITION: &str = "startPosition";
    pub const OUT_HAIR: &str = "outHair";
    pub const POINT_LOCK: &str = "pointLock";

    pub const TWIST_CONTROL_ENABLE: &str = "dTwistControlEnable";
    pub const WORLD_UP_TYPE: &str = "dWorldUpType";
    pub const WORLD_UP_MATRIX: &str = "dWorldUpMatrix";

    pub const BLEND_OUTPUT: &str = "outCurve";

    /// `inputHair[i]` on a simulation context.
    pub fn input_hair(index: usize) -> String {
        format!("inputHair[{index}]")
    }

    /// `input[i]` on a blend node.
    pub fn blend_input(index: usize) -> String {
        format!("input[{index}]")
    }

    /// `weight[i]` on a blend node.
    pub fn blend_weight(index: usize) -> String {
        format!("weight[{index}]")
    }
}

/// Value stored in a node attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vec3(Vec3),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            AttrValue::Bool(v) => Some(v),
            AttrValue::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AttrValue::Int(v) => Some(v),
            AttrValue::Bool(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttrValue::Float(v) => Some(v),
            AttrValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(v) => write!(f, "{v:?}"),
            AttrValue::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float(value as f64)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<Vec3> for AttrValue {
    fn from(value: Vec3) -> Self {
        AttrValue::Vec3(value)
    }
}

/// A node attribute as a connection endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Plug {
    pub node: NodeID,
    pub attr: String,
}

impl Plug {
    pub fn new(node: NodeID, attr: impl Into<String>) -> Self {
        Self {
            node,
            attr: attr.into(),
        }
    }
}

impl fmt::Display for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)
    }
}

/// Directed edge between two plugs. A destination has at most one source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source: Plug,
    pub destination: Plug,
}
