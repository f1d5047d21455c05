//! Command vocabulary
//!
//! One payload struct per command kind. Payloads decode from a JSON object
//! whose `type` (or `kind`) names the command; absent optional fields take
//! the defaults applied by the dispatcher.

use crate::error::CommandError;
use bridge_scene::{CameraType, EmptyType, LightType, UncheckedProps};
use serde::Deserialize;
use serde_json::Value;

pub type Vec3Field = Option<[f32; 3]>;

// ============================================================================
// Object commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreatePrimitive {
    pub shape: String,
    pub name: String,
    pub location: Vec3Field,
    pub rotation: Vec3Field,
    pub scale: Vec3Field,
    pub segments: Option<u32>,
    pub rings: Option<u32>,
    pub subdivisions: Option<u32>,
    pub vertices: Option<u32>,
    pub radius: Option<f32>,
    pub depth: Option<f32>,
    pub minor_radius: Option<f32>,
    pub x_subdivisions: Option<u32>,
    pub y_subdivisions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateCamera {
    pub name: String,
    pub location: Vec3Field,
    pub rotation: Vec3Field,
    pub camera_type: Option<CameraType>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateLight {
    pub name: String,
    pub location: Vec3Field,
    pub rotation: Vec3Field,
    pub light_type: Option<LightType>,
    pub energy: Option<f32>,
    pub color: Vec3Field,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateEmpty {
    pub name: String,
    pub location: Vec3Field,
    pub rotation: Vec3Field,
    pub scale: Vec3Field,
    pub empty_type: Option<EmptyType>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SetTransform {
    pub name: String,
    pub location: Vec3Field,
    #[serde(alias = "rotation")]
    pub rotation_euler: Vec3Field,
    pub scale: Vec3Field,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DeleteObject {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SetParent {
    pub child: String,
    /// `None` unparents.
    pub parent: Option<String>,
}

// ============================================================================
// Material commands
// ============================================================================

/// PBR inputs shared by material creation and update. Colours may be RGB or
/// RGBA.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MaterialInputs {
    pub color: Option<Vec<f32>>,
    pub metallic: Option<f32>,
    pub roughness: Option<f32>,
    pub emission: Option<Vec<f32>>,
    #[serde(rename = "emissionStrength", alias = "emission_strength")]
    pub emission_strength: Option<f32>,
    pub alpha: Option<f32>,
    pub ior: Option<f32>,
    pub specular: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateMaterial {
    pub name: String,
    #[serde(flatten)]
    pub inputs: MaterialInputs,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UpdateMaterial {
    pub name: String,
    #[serde(flatten)]
    pub inputs: MaterialInputs,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SetMaterial {
    pub object: String,
    /// `None` clears every slot.
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DeleteMaterial {
    pub name: String,
}

// ============================================================================
// Geometry node commands
// ============================================================================

/// A socket addressed by position or by name. Digit-only names are
/// treated as positions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SocketRef {
    Index(usize),
    Name(String),
}

impl Default for SocketRef {
    fn default() -> Self {
        SocketRef::Index(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CreateGeometryNodes {
    pub name: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AddGeometryNode {
    pub tree: String,
    #[serde(rename = "nodeType", alias = "node_type")]
    pub node_type: String,
    #[serde(rename = "nodeId", alias = "node_id")]
    pub node_id: String,
    #[serde(default)]
    pub props: UncheckedProps,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConnectGeometryNodes {
    pub tree: String,
    #[serde(rename = "fromNode", alias = "from_node")]
    pub from_node: String,
    #[serde(rename = "fromSocket", alias = "from_socket")]
    pub from_socket: SocketRef,
    #[serde(rename = "toNode", alias = "to_node")]
    pub to_node: String,
    #[serde(rename = "toSocket", alias = "to_socket")]
    pub to_socket: SocketRef,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UpdateGeometryNode {
    pub tree: String,
    #[serde(rename = "nodeId", alias = "node_id")]
    pub node_id: String,
    #[serde(default)]
    pub props: UncheckedProps,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DeleteGeometryNode {
    pub tree: String,
    #[serde(rename = "nodeId", alias = "node_id")]
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DeleteGeometryNodes {
    pub name: String,
    pub object: Option<String>,
}

// ============================================================================
// Command
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreatePrimitive(CreatePrimitive),
    CreateCamera(CreateCamera),
    CreateLight(CreateLight),
    CreateEmpty(CreateEmpty),
    SetTransform(SetTransform),
    DeleteObject(DeleteObject),
    SetParent(SetParent),
    CreateMaterial(CreateMaterial),
    UpdateMaterial(UpdateMaterial),
    SetMaterial(SetMaterial),
    DeleteMaterial(DeleteMaterial),
    CreateGeometryNodes(CreateGeometryNodes),
    AddGeometryNode(AddGeometryNode),
    ConnectGeometryNodes(ConnectGeometryNodes),
    UpdateGeometryNode(UpdateGeometryNode),
    DeleteGeometryNode(DeleteGeometryNode),
    DeleteGeometryNodes(DeleteGeometryNodes),
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T, CommandError> {
    serde_json::from_value(value).map_err(|err| CommandError::from_decode(kind, err))
}

impl Command {
    /// Wire name of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreatePrimitive(_) => "create_primitive",
            Command::CreateCamera(_) => "create_camera",
            Command::CreateLight(_) => "create_light",
            Command::CreateEmpty(_) => "create_empty",
            Command::SetTransform(_) => "set_transform",
            Command::DeleteObject(_) => "delete_object",
            Command::SetParent(_) => "set_parent",
            Command::CreateMaterial(_) => "create_material",
            Command::UpdateMaterial(_) => "update_material",
            Command::SetMaterial(_) => "set_material",
            Command::DeleteMaterial(_) => "delete_material",
            Command::CreateGeometryNodes(_) => "create_geometry_nodes",
            Command::AddGeometryNode(_) => "add_geometry_node",
            Command::ConnectGeometryNodes(_) => "connect_geometry_nodes",
            Command::UpdateGeometryNode(_) => "update_geometry_node",
            Command::DeleteGeometryNode(_) => "delete_geometry_node",
            Command::DeleteGeometryNodes(_) => "delete_geometry_nodes",
        }
    }

    /// Decode a command object. The discriminant is `type`, falling back to
    /// `kind`.
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        let Value::Object(fields) = &value else {
            return Err(CommandError::invalid("command", "expected a JSON object"));
        };
        let kind = match fields.get("type").or_else(|| fields.get("kind")) {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => {
                return Err(CommandError::invalid(
                    "command",
                    format!("command type must be a string, got {other}"),
                ))
            }
            None => {
                return Err(CommandError::MissingField {
                    command: "command".to_string(),
                    field: "type".to_string(),
                })
            }
        };

        let k = kind.as_str();
        let command = match k {
            "create_primitive" => Command::CreatePrimitive(decode(k, value)?),
            "create_camera" => Command::CreateCamera(decode(k, value)?),
            "create_light" => Command::CreateLight(decode(k, value)?),
            "create_empty" => Command::CreateEmpty(decode(k, value)?),
            "set_transform" => Command::SetTransform(decode(k, value)?),
            "delete_object" => Command::DeleteObject(decode(k, value)?),
            "set_parent" => Command::SetParent(decode(k, value)?),
            "create_material" => Command::CreateMaterial(decode(k, value)?),
            "update_material" => Command::UpdateMaterial(decode(k, value)?),
            "set_material" => Command::SetMaterial(decode(k, value)?),
            "delete_material" => Command::DeleteMaterial(decode(k, value)?),
            "create_geometry_nodes" => Command::CreateGeometryNodes(decode(k, value)?),
            "add_geometry_node" => Command::AddGeometryNode(decode(k, value)?),
            "connect_geometry_nodes" => Command::ConnectGeometryNodes(decode(k, value)?),
            "update_geometry_node" => Command::UpdateGeometryNode(decode(k, value)?),
            "delete_geometry_node" => Command::DeleteGeometryNode(decode(k, value)?),
            "delete_geometry_nodes" => Command::DeleteGeometryNodes(decode(k, value)?),
            _ => return Err(CommandError::UnknownCommand(kind)),
        };
        Ok(command)
    }

    pub fn from_json(text: &str) -> Result<Self, CommandError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| CommandError::invalid("command", format!("invalid JSON: {err}")))?;
        Self::from_value(value)
    }
}
