use std::collections::BTreeMap;
use std::fmt;

use dangle_ids::NodeID;
use glam::Vec3;

use crate::attr::{AttrValue, attrs};
use crate::transform::Transform3D;

/// Ordered control points of a spline curve, in the curve node's object space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveData {
    pub points: Vec<Vec3>,
}

impl CurveData {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Spline IK handle spanning `start..=end` of a joint chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplineHandleData {
    pub start: NodeID,
    pub end: NodeID,
}

/// Point-cluster deformer bound to exactly one control point of `curve`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterData {
    pub curve: NodeID,
    pub point: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Position follows the driver.
    Position,
    /// Aims an axis at the driver.
    Orientation,
    /// Full parent-style follow (position + rotation).
    Follow,
    Scale,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 4] = [
        ConstraintKind::Position,
        ConstraintKind::Orientation,
        ConstraintKind::Follow,
        ConstraintKind::Scale,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConstraintKind::Position => "pointConstraint",
            ConstraintKind::Orientation => "aimConstraint",
            ConstraintKind::Follow => "parentConstraint",
            ConstraintKind::Scale => "scaleConstraint",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Request for a new constraint. `driven` is the node being moved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintSpec {
    pub kind: ConstraintKind,
    pub driver: NodeID,
    pub driven: NodeID,
    pub maintain_offset: bool,
    /// Local axis an orientation constraint points at its driver. No up
    /// reference is used.
    pub aim_axis: Vec3,
}

impl ConstraintSpec {
    pub fn new(kind: ConstraintKind, driver: NodeID, driven: NodeID) -> Self {
        Self {
            kind,
            driver,
            driven,
            maintain_offset: false,
            aim_axis: Vec3::X,
        }
    }

    pub fn maintain_offset(mut self, maintain_offset: bool) -> Self {
        self.maintain_offset = maintain_offset;
        self
    }

    pub fn aim(mut self, axis: Vec3) -> Self {
        self.aim_axis = axis;
        self
    }
}

/// A constraint as it lives in the scene (see `ConstraintSpec`).
pub type ConstraintData = ConstraintSpec;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Transform,
    Group,
    Joint,
    Curve(CurveData),
    SplineHandle(SplineHandleData),
    Cluster(ClusterData),
    Follicle,
    SimulationContext,
    BlendNode,
    Constraint(ConstraintData),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Transform => "transform",
            NodeKind::Group => "group",
            NodeKind::Joint => "joint",
            NodeKind::Curve(_) => "nurbsCurve",
            NodeKind::SplineHandle(_) => "ikHandle",
            NodeKind::Cluster(_) => "clusterHandle",
            NodeKind::Follicle => "follicle",
            NodeKind::SimulationContext => "hairSystem",
            NodeKind::BlendNode => "blendShape",
            NodeKind::Constraint(c) => c.kind.label(),
        }
    }

    pub fn is_joint(&self) -> bool {
        matches!(self, NodeKind::Joint)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group)
    }

    pub fn as_curve(&self) -> Option<&CurveData> {
        match self {
            NodeKind::Curve(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_constraint(&self) -> Option<&ConstraintData> {
        match self {
            NodeKind::Constraint(c) => Some(c),
            _ => None,
        }
    }
}

/// A node in the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub id: NodeID,
    /// Full name, `ns:short` when the node lives in a namespace.
    pub name: String,
    pub parent: NodeID,
    pub children: Vec<NodeID>,
    pub kind: NodeKind,
    pub transform: Transform3D,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeID::nil(),
            name: name.into(),
            parent: NodeID::nil(),
            children: Vec::new(),
            kind,
            transform: Transform3D::IDENTITY,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    pub fn has_parent(&self) -> bool {
        !self.parent.is_nil()
    }

    pub fn add_child(&mut self, child: NodeID) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub fn remove_child(&mut self, child: NodeID) {
        self.children.retain(|c| *c != child);
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn is_visible(&self) -> bool {
        self.attr(attrs::VISIBILITY)
            .and_then(AttrValue::as_bool)
            .unwrap_or(true)
    }

    pub fn is_locked(&self) -> bool {
        self.attr(attrs::LOCKED)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }
}
