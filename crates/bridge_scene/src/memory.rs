//! In-memory scene graph
//!
//! Stands in for the host data model when running outside the host
//! application: the CLI host and every dispatcher test run against it.

use crate::catalog;
use crate::error::{EntityKind, SceneError};
use crate::graph::SceneGraph;
use crate::types::*;
use crate::unique_name;
use glam::Vec3;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Serialize)]
pub struct MemoryScene {
    objects: BTreeMap<String, SceneObject>,
    materials: BTreeMap<String, Material>,
    node_trees: BTreeMap<String, NodeTree>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    /// Serialize the whole scene for inspection.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn object_mut(&mut self, name: &str) -> Result<&mut SceneObject, SceneError> {
        self.objects
            .get_mut(name)
            .ok_or_else(|| SceneError::not_found(EntityKind::Object, name))
    }

    fn tree_mut(&mut self, name: &str) -> Result<&mut NodeTree, SceneError> {
        self.node_trees
            .get_mut(name)
            .ok_or_else(|| SceneError::not_found(EntityKind::NodeTree, name))
    }

    fn node_mut(&mut self, tree: &str, node: &str) -> Result<&mut Node, SceneError> {
        self.tree_mut(tree)?
            .node_mut(node)
            .ok_or_else(|| SceneError::not_found(EntityKind::Node, node))
    }
}

fn instantiate_node(node_type: &str, name: String) -> Result<Node, SceneError> {
    let (inputs, outputs) = catalog::sockets_for(node_type)
        .ok_or_else(|| SceneError::UnknownNodeType(node_type.to_string()))?;
    Ok(Node {
        name,
        node_type: node_type.to_string(),
        label: String::new(),
        location: [0.0, 0.0],
        inputs: inputs.iter().copied().map(Socket::named).collect(),
        outputs: outputs.iter().copied().map(Socket::named).collect(),
        properties: UncheckedProps::new(),
    })
}

impl SceneGraph for MemoryScene {
    fn add_object(&mut self, name: &str, transform: Transform, data: ObjectData) -> String {
        let name = unique_name(name, |n| self.objects.contains_key(n));
        tracing::debug!(object = %name, kind = data.type_name(), "object added");
        self.objects.insert(
            name.clone(),
            SceneObject {
                name: name.clone(),
                transform,
                parent: None,
                data,
                modifiers: Vec::new(),
            },
        );
        name
    }

    fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.get(name)
    }

    fn remove_object(&mut self, name: &str) -> bool {
        if self.objects.remove(name).is_none() {
            return false;
        }
        for object in self.objects.values_mut() {
            if object.parent.as_deref() == Some(name) {
                object.parent = None;
            }
        }
        tracing::debug!(object = name, "object removed");
        true
    }

    fn set_transform(
        &mut self,
        name: &str,
        location: Option<Vec3>,
        rotation: Option<Vec3>,
        scale: Option<Vec3>,
    ) -> Result<(), SceneError> {
        let transform = &mut self.object_mut(name)?.transform;
        if let Some(location) = location {
            transform.location = location;
        }
        if let Some(rotation) = rotation {
            transform.rotation = rotation;
        }
        if let Some(scale) = scale {
            transform.scale = scale;
        }
        Ok(())
    }

    fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<(), SceneError> {
        if let Some(parent) = parent {
            if !self.objects.contains_key(parent) {
                return Err(SceneError::not_found(EntityKind::Object, parent));
            }
        }
        self.object_mut(child)?.parent = parent.map(str::to_string);
        Ok(())
    }

    fn add_material(&mut self, name: &str, patch: &MaterialPatch) -> String {
        let name = unique_name(name, |n| self.materials.contains_key(n));
        let mut material = Material::new(name.clone());
        material.apply(patch);
        self.materials.insert(name.clone(), material);
        name
    }

    fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    fn update_material(&mut self, name: &str, patch: &MaterialPatch) -> Result<(), SceneError> {
        self.materials
            .get_mut(name)
            .ok_or_else(|| SceneError::not_found(EntityKind::Material, name))?
            .apply(patch);
        Ok(())
    }

    fn remove_material(&mut self, name: &str) -> bool {
        if self.materials.remove(name).is_none() {
            return false;
        }
        // Data-block removal empties every slot that referenced it
        for object in self.objects.values_mut() {
            if let ObjectData::Mesh { materials, .. } = &mut object.data {
                materials.retain(|m| m != name);
            }
        }
        true
    }

    fn assign_material(&mut self, object: &str, material: Option<&str>) -> Result<(), SceneError> {
        if let Some(material) = material {
            if !self.materials.contains_key(material) {
                return Err(SceneError::not_found(EntityKind::Material, material));
            }
        }
        let target = self.object_mut(object)?;
        let found = target.data.type_name();
        let ObjectData::Mesh { materials, .. } = &mut target.data else {
            return Err(SceneError::TypeMismatch {
                name: object.to_string(),
                expected: "MESH",
                found,
            });
        };
        match material {
            Some(material) if materials.is_empty() => materials.push(material.to_string()),
            Some(material) => materials[0] = material.to_string(),
            None => materials.clear(),
        }
        Ok(())
    }

    fn add_node_tree(&mut self, name: &str) -> String {
        let name = unique_name(name, |n| self.node_trees.contains_key(n));
        let mut nodes = Vec::with_capacity(2);
        for (node_type, node_name, x) in [
            ("NodeGroupInput", GROUP_INPUT, -300.0),
            ("NodeGroupOutput", GROUP_OUTPUT, 300.0),
        ] {
            if let Ok(mut node) = instantiate_node(node_type, node_name.to_string()) {
                node.location = [x, 0.0];
                nodes.push(node);
            }
        }
        self.node_trees.insert(
            name.clone(),
            NodeTree {
                name: name.clone(),
                nodes,
                links: Vec::new(),
            },
        );
        name
    }

    fn node_tree(&self, name: &str) -> Option<&NodeTree> {
        self.node_trees.get(name)
    }

    fn remove_node_tree(&mut self, name: &str) -> bool {
        if self.node_trees.remove(name).is_none() {
            return false;
        }
        for object in self.objects.values_mut() {
            object.modifiers.retain(|m| m.node_group != name);
        }
        true
    }

    fn add_nodes_modifier(&mut self, object: &str, name: &str, tree: &str) -> Result<String, SceneError> {
        if !self.node_trees.contains_key(tree) {
            return Err(SceneError::not_found(EntityKind::NodeTree, tree));
        }
        let target = self.object_mut(object)?;
        if !matches!(target.data, ObjectData::Mesh { .. }) {
            return Err(SceneError::TypeMismatch {
                name: object.to_string(),
                expected: "MESH",
                found: target.data.type_name(),
            });
        }
        let name = unique_name(name, |n| target.modifiers.iter().any(|m| m.name == n));
        target.modifiers.push(Modifier {
            name: name.clone(),
            node_group: tree.to_string(),
        });
        Ok(name)
    }

    fn remove_nodes_modifier(&mut self, object: &str, tree: &str) -> Result<bool, SceneError> {
        let target = self.object_mut(object)?;
        let position = target.modifiers.iter().position(|m| m.node_group == tree);
        Ok(position.map(|pos| target.modifiers.remove(pos)).is_some())
    }

    fn add_node(&mut self, tree: &str, node_type: &str, name: &str) -> Result<String, SceneError> {
        let tree = self.tree_mut(tree)?;
        let name = unique_name(name, |n| tree.node(n).is_some());
        let node = instantiate_node(node_type, name.clone())?;
        tree.nodes.push(node);
        Ok(name)
    }

    fn node(&self, tree: &str, node: &str) -> Option<&Node> {
        self.node_trees.get(tree)?.node(node)
    }

    fn remove_node(&mut self, tree: &str, node: &str) -> Result<bool, SceneError> {
        let tree = self.tree_mut(tree)?;
        let before = tree.nodes.len();
        tree.nodes.retain(|n| n.name != node);
        tree.links.retain(|l| l.from_node != node && l.to_node != node);
        Ok(tree.nodes.len() != before)
    }

    fn set_node_label(&mut self, tree: &str, node: &str, label: &str) -> Result<(), SceneError> {
        self.node_mut(tree, node)?.label = label.to_string();
        Ok(())
    }

    fn set_node_location(&mut self, tree: &str, node: &str, location: [f32; 2]) -> Result<(), SceneError> {
        self.node_mut(tree, node)?.location = location;
        Ok(())
    }

    fn set_node_input(
        &mut self,
        tree: &str,
        node: &str,
        input: usize,
        value: serde_json::Value,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(tree, node)?;
        let name = node.name.clone();
        let socket = node
            .inputs
            .get_mut(input)
            .ok_or(SceneError::SocketIndexOutOfRange {
                node: name,
                direction: SocketDirection::Input,
                index: input,
            })?;
        socket.default_value = Some(value);
        Ok(())
    }

    fn set_node_property(
        &mut self,
        tree: &str,
        node: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SceneError> {
        self.node_mut(tree, node)?.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn link(&mut self, tree: &str, from: (&str, usize), to: (&str, usize)) -> Result<(), SceneError> {
        let tree_ref = self.tree_mut(tree)?;
        let socket_name = |node: &str, direction: SocketDirection, index: usize| -> Result<String, SceneError> {
            let node = tree_ref
                .node(node)
                .ok_or_else(|| SceneError::not_found(EntityKind::Node, node))?;
            node.sockets(direction)
                .get(index)
                .map(|s| s.name.clone())
                .ok_or_else(|| SceneError::SocketIndexOutOfRange {
                    node: node.name.clone(),
                    direction,
                    index,
                })
        };
        let from_socket = socket_name(from.0, SocketDirection::Output, from.1)?;
        let to_socket = socket_name(to.0, SocketDirection::Input, to.1)?;

        // An input accepts one link; a new one replaces the old
        tree_ref
            .links
            .retain(|l| !(l.to_node == to.0 && l.to_socket == to_socket));
        tree_ref.links.push(Link {
            from_node: from.0.to_string(),
            from_socket,
            to_node: to.0.to_string(),
            to_socket,
        });
        Ok(())
    }
}
