//! Scene data model
//!
//! Plain data mirrored from the host's data blocks. Everything derives
//! `Serialize` so the CLI host can dump the scene after a run.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw node attributes that do not correspond to a declared input socket.
/// Values are stored as given; nothing validates them.
pub type UncheckedProps = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Mesh primitive shapes and their construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Primitive {
    Cube,
    UvSphere { segments: u32, rings: u32 },
    IcoSphere { subdivisions: u32 },
    Cylinder { vertices: u32, radius: f32, depth: f32 },
    Cone { vertices: u32, radius: f32, depth: f32 },
    Torus { major_radius: f32, minor_radius: f32 },
    Plane,
    Circle { vertices: u32, radius: f32 },
    Grid { x_subdivisions: u32, y_subdivisions: u32 },
    Monkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraType {
    #[default]
    Persp,
    Ortho,
    Pano,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightType {
    #[default]
    Point,
    Sun,
    Spot,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmptyType {
    #[default]
    PlainAxes,
    Arrows,
    SingleArrow,
    Circle,
    Cube,
    Sphere,
    Cone,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectData {
    Mesh {
        primitive: Primitive,
        /// Material slot names, slot 0 first.
        materials: Vec<String>,
    },
    Camera {
        camera_type: CameraType,
    },
    Light {
        light_type: LightType,
        energy: f32,
        color: [f32; 3],
    },
    Empty {
        empty_type: EmptyType,
    },
}

impl ObjectData {
    pub fn mesh(primitive: Primitive) -> Self {
        ObjectData::Mesh {
            primitive,
            materials: Vec::new(),
        }
    }

    /// Host type tag (`MESH`, `CAMERA`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectData::Mesh { .. } => "MESH",
            ObjectData::Camera { .. } => "CAMERA",
            ObjectData::Light { .. } => "LIGHT",
            ObjectData::Empty { .. } => "EMPTY",
        }
    }
}

/// A geometry-nodes modifier bound to a node tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modifier {
    pub name: String,
    pub node_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<String>,
    pub data: ObjectData,
    pub modifiers: Vec<Modifier>,
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendMode {
    #[default]
    Opaque,
    Blend,
}

/// Principled-BSDF style material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emission_color: [f32; 4],
    pub emission_strength: f32,
    pub alpha: f32,
    pub ior: f32,
    pub specular: f32,
    pub blend: BlendMode,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emission_color: [1.0, 1.0, 1.0, 1.0],
            emission_strength: 0.0,
            alpha: 1.0,
            ior: 1.5,
            specular: 0.5,
            blend: BlendMode::Opaque,
        }
    }

    /// Apply every field present in `patch`.
    pub fn apply(&mut self, patch: &MaterialPatch) {
        if let Some(color) = patch.base_color {
            self.base_color = color;
        }
        if let Some(metallic) = patch.metallic {
            self.metallic = metallic;
        }
        if let Some(roughness) = patch.roughness {
            self.roughness = roughness;
        }
        if let Some(emission) = patch.emission_color {
            self.emission_color = emission;
        }
        if let Some(strength) = patch.emission_strength {
            self.emission_strength = strength;
        }
        if let Some(alpha) = patch.alpha {
            self.alpha = alpha;
        }
        if let Some(ior) = patch.ior {
            self.ior = ior;
        }
        if let Some(specular) = patch.specular {
            self.specular = specular;
        }
        if let Some(blend) = patch.blend {
            self.blend = blend;
        }
    }
}

/// Optional material inputs; `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPatch {
    pub base_color: Option<[f32; 4]>,
    pub metallic: Option<f32>,
    pub roughness: Option<f32>,
    pub emission_color: Option<[f32; 4]>,
    pub emission_strength: Option<f32>,
    pub alpha: Option<f32>,
    pub ior: Option<f32>,
    pub specular: Option<f32>,
    pub blend: Option<BlendMode>,
}

// ============================================================================
// Geometry node trees
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDirection {
    Input,
    Output,
}

impl fmt::Display for SocketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocketDirection::Input => "input",
            SocketDirection::Output => "output",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Socket {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl Socket {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub name: String,
    pub node_type: String,
    pub label: String,
    pub location: [f32; 2],
    pub inputs: Vec<Socket>,
    pub outputs: Vec<Socket>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: UncheckedProps,
}

impl Node {
    pub fn sockets(&self, direction: SocketDirection) -> &[Socket] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    pub fn socket_index(&self, direction: SocketDirection, name: &str) -> Option<usize> {
        self.sockets(direction).iter().position(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub from_node: String,
    pub from_socket: String,
    pub to_node: String,
    pub to_socket: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTree {
    pub name: String,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl NodeTree {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }
}

/// Names of the interface nodes every geometry node tree starts with.
pub const GROUP_INPUT: &str = "Group Input";
pub const GROUP_OUTPUT: &str = "Group Output";
