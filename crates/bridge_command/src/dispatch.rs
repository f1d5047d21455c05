//! Command dispatch
//!
//! Every command is validated and applied to the scene synchronously; there
//! is no queueing. Errors come back to the caller unchanged.

use crate::command::*;
use crate::error::CommandError;
use crate::nodes::host_node_type;
use crate::outcome::CommandOutcome;
use bridge_scene::{
    BlendMode, EntityKind, MaterialPatch, ObjectData, Primitive, SceneGraph, SceneHandle,
    SocketDirection, Transform, UncheckedProps, GROUP_INPUT, GROUP_OUTPUT,
};
use glam::Vec3;
use serde_json::Value;

/// Group interface aliases accepted by `connect_geometry_nodes`.
pub const INPUT_ALIAS: &str = "__input__";
pub const OUTPUT_ALIAS: &str = "__output__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Fail unresolvable socket names instead of falling back to socket 0.
    pub strict_socket_lookup: bool,
}

/// Maps commands onto scene mutations.
pub struct CommandDispatcher {
    scene: SceneHandle,
    options: DispatchOptions,
}

impl CommandDispatcher {
    pub fn new(scene: SceneHandle) -> Self {
        Self::with_options(scene, DispatchOptions::default())
    }

    pub fn with_options(scene: SceneHandle, options: DispatchOptions) -> Self {
        Self { scene, options }
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Decode and apply a JSON command, returning the outcome as JSON text.
    pub fn apply_json(&self, text: &str) -> Result<String, CommandError> {
        let command = Command::from_json(text)?;
        Ok(self.apply(&command)?.to_json())
    }

    /// Decode and apply an already-parsed command object.
    pub fn apply_value(&self, value: Value) -> Result<Value, CommandError> {
        let command = Command::from_value(value)?;
        Ok(self.apply(&command)?.to_value())
    }

    pub fn apply(&self, command: &Command) -> Result<CommandOutcome, CommandError> {
        tracing::debug!(command = command.kind(), "applying command");
        let result = {
            let mut scene = self.scene.borrow_mut();
            self.dispatch(&mut *scene, command)
        };
        if let Err(err) = &result {
            tracing::warn!(command = command.kind(), error = %err, "command failed");
        }
        result
    }

    fn dispatch(&self, scene: &mut dyn SceneGraph, command: &Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::CreatePrimitive(cmd) => create_primitive(scene, cmd),
            Command::CreateCamera(cmd) => create_camera(scene, cmd),
            Command::CreateLight(cmd) => create_light(scene, cmd),
            Command::CreateEmpty(cmd) => create_empty(scene, cmd),
            Command::SetTransform(cmd) => scene
                .set_transform(
                    &cmd.name,
                    cmd.location.map(Vec3::from),
                    cmd.rotation_euler.map(Vec3::from),
                    cmd.scale.map(Vec3::from),
                )
                .map(|()| CommandOutcome::success())
                .map_err(CommandError::from),
            Command::DeleteObject(cmd) => {
                scene.remove_object(&cmd.name);
                Ok(CommandOutcome::success())
            }
            Command::SetParent(cmd) => scene
                .set_parent(&cmd.child, cmd.parent.as_deref().filter(|p| !p.is_empty()))
                .map(|()| CommandOutcome::success())
                .map_err(CommandError::from),
            Command::CreateMaterial(cmd) => {
                let mut patch = material_patch("create_material", &cmd.inputs)?;
                if patch.alpha.is_some() {
                    patch.blend = Some(BlendMode::Blend);
                }
                let name = scene.add_material(&cmd.name, &patch);
                Ok(CommandOutcome::Named { name })
            }
            Command::UpdateMaterial(cmd) => {
                let patch = material_patch("update_material", &cmd.inputs)?;
                scene.update_material(&cmd.name, &patch)?;
                Ok(CommandOutcome::success())
            }
            Command::SetMaterial(cmd) => {
                let material = cmd.material.as_deref().filter(|m| !m.is_empty());
                scene.assign_material(&cmd.object, material)?;
                Ok(CommandOutcome::success())
            }
            Command::DeleteMaterial(cmd) => {
                scene.remove_material(&cmd.name);
                Ok(CommandOutcome::success())
            }
            Command::CreateGeometryNodes(cmd) => create_geometry_nodes(scene, cmd),
            Command::AddGeometryNode(cmd) => add_geometry_node(scene, cmd),
            Command::ConnectGeometryNodes(cmd) => self.connect_geometry_nodes(scene, cmd),
            Command::UpdateGeometryNode(cmd) => update_geometry_node(scene, cmd),
            Command::DeleteGeometryNode(cmd) => {
                if scene.node_tree(&cmd.tree).is_some() {
                    scene.remove_node(&cmd.tree, &cmd.node_id)?;
                }
                Ok(CommandOutcome::success())
            }
            Command::DeleteGeometryNodes(cmd) => {
                if let Some(object) = cmd.object.as_deref() {
                    if scene.object(object).is_some() {
                        scene.remove_nodes_modifier(object, &cmd.name)?;
                    }
                }
                scene.remove_node_tree(&cmd.name);
                Ok(CommandOutcome::success())
            }
        }
    }

    fn connect_geometry_nodes(
        &self,
        scene: &mut dyn SceneGraph,
        cmd: &ConnectGeometryNodes,
    ) -> Result<CommandOutcome, CommandError> {
        if scene.node_tree(&cmd.tree).is_none() {
            return Err(CommandError::not_found(EntityKind::NodeTree, &cmd.tree));
        }
        let from_node = if cmd.from_node == INPUT_ALIAS { GROUP_INPUT } else { cmd.from_node.as_str() };
        let to_node = if cmd.to_node == OUTPUT_ALIAS { GROUP_OUTPUT } else { cmd.to_node.as_str() };

        let outputs = scene.node_sockets(&cmd.tree, from_node, SocketDirection::Output)?;
        let inputs = scene.node_sockets(&cmd.tree, to_node, SocketDirection::Input)?;
        let from = self.resolve_socket(from_node, SocketDirection::Output, &outputs, &cmd.from_socket)?;
        let to = self.resolve_socket(to_node, SocketDirection::Input, &inputs, &cmd.to_socket)?;

        scene.link(&cmd.tree, (from_node, from), (to_node, to))?;
        Ok(CommandOutcome::success())
    }

    /// Resolve a socket reference against a node's declared sockets: exact
    /// name, then digit string as index, then (lenient mode only) socket 0.
    pub fn resolve_socket(
        &self,
        node: &str,
        direction: SocketDirection,
        sockets: &[String],
        socket: &SocketRef,
    ) -> Result<usize, CommandError> {
        let not_found = |label: String| CommandError::SocketNotFound {
            node: node.to_string(),
            direction,
            socket: label,
        };
        let in_range = |index: usize| {
            if index < sockets.len() {
                Ok(index)
            } else {
                Err(not_found(index.to_string()))
            }
        };

        match socket {
            SocketRef::Index(index) => in_range(*index),
            SocketRef::Name(name) => {
                if let Some(index) = sockets.iter().position(|s| s == name) {
                    return Ok(index);
                }
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    let index = name.parse().map_err(|_| not_found(name.clone()))?;
                    return in_range(index);
                }
                if self.options.strict_socket_lookup || sockets.is_empty() {
                    return Err(not_found(name.clone()));
                }
                tracing::warn!(
                    node,
                    %direction,
                    socket = %name,
                    fallback = %sockets[0],
                    "socket name not found, using first socket"
                );
                Ok(0)
            }
        }
    }
}

// ============================================================================
// Object handlers
// ============================================================================

fn vec3_or(value: Option<[f32; 3]>, default: Vec3) -> Vec3 {
    value.map(Vec3::from).unwrap_or(default)
}

fn created(scene: &dyn SceneGraph, name: String) -> Result<CommandOutcome, CommandError> {
    let object = scene
        .object(&name)
        .ok_or_else(|| CommandError::not_found(EntityKind::Object, &name))?;
    Ok(CommandOutcome::Created {
        location: object.transform.location.to_array(),
        name,
    })
}

fn primitive(cmd: &CreatePrimitive) -> Result<Primitive, CommandError> {
    let vertices = cmd.vertices.unwrap_or(32);
    let radius = cmd.radius.unwrap_or(1.0);
    let depth = cmd.depth.unwrap_or(2.0);
    Ok(match cmd.shape.as_str() {
        "cube" => Primitive::Cube,
        "uv_sphere" => Primitive::UvSphere {
            segments: cmd.segments.unwrap_or(32),
            rings: cmd.rings.unwrap_or(16),
        },
        "ico_sphere" => Primitive::IcoSphere {
            subdivisions: cmd.subdivisions.unwrap_or(2),
        },
        "cylinder" => Primitive::Cylinder { vertices, radius, depth },
        "cone" => Primitive::Cone { vertices, radius, depth },
        "torus" => Primitive::Torus {
            major_radius: radius,
            minor_radius: cmd.minor_radius.unwrap_or(0.25),
        },
        "plane" => Primitive::Plane,
        "circle" => Primitive::Circle { vertices, radius },
        "grid" => Primitive::Grid {
            x_subdivisions: cmd.x_subdivisions.unwrap_or(10),
            y_subdivisions: cmd.y_subdivisions.unwrap_or(10),
        },
        "monkey" => Primitive::Monkey,
        other => {
            return Err(CommandError::invalid(
                "create_primitive",
                format!("Unsupported shape: {other}"),
            ))
        }
    })
}

fn create_primitive(scene: &mut dyn SceneGraph, cmd: &CreatePrimitive) -> Result<CommandOutcome, CommandError> {
    let primitive = primitive(cmd)?;
    let transform = Transform {
        location: vec3_or(cmd.location, Vec3::ZERO),
        rotation: vec3_or(cmd.rotation, Vec3::ZERO),
        scale: vec3_or(cmd.scale, Vec3::ONE),
    };
    let name = scene.add_object(&cmd.name, transform, ObjectData::mesh(primitive));
    created(scene, name)
}

fn create_camera(scene: &mut dyn SceneGraph, cmd: &CreateCamera) -> Result<CommandOutcome, CommandError> {
    let transform = Transform {
        location: vec3_or(cmd.location, Vec3::ZERO),
        rotation: vec3_or(cmd.rotation, Vec3::ZERO),
        scale: Vec3::ONE,
    };
    let data = ObjectData::Camera {
        camera_type: cmd.camera_type.unwrap_or_default(),
    };
    let name = scene.add_object(&cmd.name, transform, data);
    created(scene, name)
}

fn create_light(scene: &mut dyn SceneGraph, cmd: &CreateLight) -> Result<CommandOutcome, CommandError> {
    let transform = Transform {
        location: vec3_or(cmd.location, Vec3::ZERO),
        rotation: vec3_or(cmd.rotation, Vec3::ZERO),
        scale: Vec3::ONE,
    };
    let data = ObjectData::Light {
        light_type: cmd.light_type.unwrap_or_default(),
        energy: cmd.energy.unwrap_or(1000.0),
        color: cmd.color.unwrap_or([1.0, 1.0, 1.0]),
    };
    let name = scene.add_object(&cmd.name, transform, data);
    created(scene, name)
}

fn create_empty(scene: &mut dyn SceneGraph, cmd: &CreateEmpty) -> Result<CommandOutcome, CommandError> {
    let transform = Transform {
        location: vec3_or(cmd.location, Vec3::ZERO),
        rotation: vec3_or(cmd.rotation, Vec3::ZERO),
        scale: vec3_or(cmd.scale, Vec3::ONE),
    };
    let data = ObjectData::Empty {
        empty_type: cmd.empty_type.unwrap_or_default(),
    };
    let name = scene.add_object(&cmd.name, transform, data);
    created(scene, name)
}

// ============================================================================
// Material handlers
// ============================================================================

/// Widen an RGB colour to RGBA.
fn rgba(command: &str, field: &str, color: &[f32]) -> Result<[f32; 4], CommandError> {
    match *color {
        [r, g, b] => Ok([r, g, b, 1.0]),
        [r, g, b, a] => Ok([r, g, b, a]),
        _ => Err(CommandError::invalid(
            command,
            format!("`{field}` must have 3 or 4 components, got {}", color.len()),
        )),
    }
}

fn material_patch(command: &str, inputs: &MaterialInputs) -> Result<MaterialPatch, CommandError> {
    Ok(MaterialPatch {
        base_color: inputs.color.as_deref().map(|c| rgba(command, "color", c)).transpose()?,
        metallic: inputs.metallic,
        roughness: inputs.roughness,
        emission_color: inputs
            .emission
            .as_deref()
            .map(|c| rgba(command, "emission", c))
            .transpose()?,
        emission_strength: inputs.emission_strength,
        alpha: inputs.alpha,
        ior: inputs.ior,
        specular: inputs.specular,
        blend: None,
    })
}

// ============================================================================
// Geometry node handlers
// ============================================================================

fn create_geometry_nodes(
    scene: &mut dyn SceneGraph,
    cmd: &CreateGeometryNodes,
) -> Result<CommandOutcome, CommandError> {
    // Validate the target before creating the tree so a failure leaves no orphan
    let object = scene
        .object(&cmd.object)
        .ok_or_else(|| CommandError::not_found(EntityKind::Object, &cmd.object))?;
    if !matches!(object.data, ObjectData::Mesh { .. }) {
        return Err(CommandError::TypeMismatch {
            name: cmd.object.clone(),
            expected: "MESH",
            found: object.data.type_name(),
        });
    }

    let tree = scene.add_node_tree(&cmd.name);
    let modifier = scene.add_nodes_modifier(&cmd.object, &cmd.name, &tree)?;
    Ok(CommandOutcome::GeometryNodes { name: tree, modifier })
}

fn add_geometry_node(scene: &mut dyn SceneGraph, cmd: &AddGeometryNode) -> Result<CommandOutcome, CommandError> {
    let node_type = host_node_type(&cmd.node_type);
    let name = scene.add_node(&cmd.tree, node_type, &cmd.node_id)?;
    apply_node_props(scene, &cmd.tree, &name, &cmd.props);
    Ok(CommandOutcome::Named { name })
}

fn update_geometry_node(scene: &mut dyn SceneGraph, cmd: &UpdateGeometryNode) -> Result<CommandOutcome, CommandError> {
    if scene.node_tree(&cmd.tree).is_none() {
        return Err(CommandError::not_found(EntityKind::NodeTree, &cmd.tree));
    }
    if scene.node(&cmd.tree, &cmd.node_id).is_none() {
        return Err(CommandError::not_found(EntityKind::Node, &cmd.node_id));
    }
    apply_node_props(scene, &cmd.tree, &cmd.node_id, &cmd.props);
    Ok(CommandOutcome::success())
}

/// Best-effort application of a node's property bag. Failures are dropped.
fn apply_node_props(scene: &mut dyn SceneGraph, tree: &str, node: &str, props: &UncheckedProps) {
    for (key, value) in props {
        let applied = match key.as_str() {
            "label" => match value {
                Value::String(label) => scene.set_node_label(tree, node, label),
                _ => Ok(()),
            },
            "location" => match editor_location(value) {
                Some(location) => scene.set_node_location(tree, node, location),
                None => Ok(()),
            },
            _ => {
                let input = scene
                    .node(tree, node)
                    .and_then(|n| n.socket_index(SocketDirection::Input, key));
                match input {
                    Some(index) => scene.set_node_input(tree, node, index, value.clone()),
                    None => scene.set_node_property(tree, node, key, value.clone()),
                }
            }
        };
        if let Err(err) = applied {
            tracing::trace!(node, prop = %key, error = %err, "node prop ignored");
        }
    }
}

fn editor_location(value: &Value) -> Option<[f32; 2]> {
    let pair = value.as_array()?;
    match pair.as_slice() {
        [x, y] => Some([x.as_f64()? as f32, y.as_f64()? as f32]),
        _ => None,
    }
}
