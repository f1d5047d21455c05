use crate::error::SceneError;
use crate::types::{
    Material, MaterialPatch, Node, NodeTree, ObjectData, SceneObject, SocketDirection, Transform,
};
use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to the scene the dispatcher mutates. Host-thread only.
pub type SceneHandle = Rc<RefCell<dyn SceneGraph>>;

/// The host data model as seen by the command dispatcher.
///
/// Creation calls take a requested name and return the name actually
/// assigned. Removal calls return whether anything was removed.
pub trait SceneGraph {
    // Objects
    fn add_object(&mut self, name: &str, transform: Transform, data: ObjectData) -> String;
    fn object(&self, name: &str) -> Option<&SceneObject>;
    /// Removes the object, unparenting its children.
    fn remove_object(&mut self, name: &str) -> bool;
    fn set_transform(
        &mut self,
        name: &str,
        location: Option<Vec3>,
        rotation: Option<Vec3>,
        scale: Option<Vec3>,
    ) -> Result<(), SceneError>;
    fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<(), SceneError>;

    // Materials
    fn add_material(&mut self, name: &str, patch: &MaterialPatch) -> String;
    fn material(&self, name: &str) -> Option<&Material>;
    fn update_material(&mut self, name: &str, patch: &MaterialPatch) -> Result<(), SceneError>;
    fn remove_material(&mut self, name: &str) -> bool;
    /// Put `material` in slot 0 of a mesh, or clear all slots when `None`.
    fn assign_material(&mut self, object: &str, material: Option<&str>) -> Result<(), SceneError>;

    // Node trees
    /// New geometry node tree with group input/output nodes.
    fn add_node_tree(&mut self, name: &str) -> String;
    fn node_tree(&self, name: &str) -> Option<&NodeTree>;
    fn remove_node_tree(&mut self, name: &str) -> bool;
    /// Attach a geometry-nodes modifier running `tree`; returns the modifier name.
    fn add_nodes_modifier(&mut self, object: &str, name: &str, tree: &str) -> Result<String, SceneError>;
    /// Remove the first modifier on `object` that runs `tree`.
    fn remove_nodes_modifier(&mut self, object: &str, tree: &str) -> Result<bool, SceneError>;

    // Nodes
    fn add_node(&mut self, tree: &str, node_type: &str, name: &str) -> Result<String, SceneError>;
    fn node(&self, tree: &str, node: &str) -> Option<&Node>;
    fn remove_node(&mut self, tree: &str, node: &str) -> Result<bool, SceneError>;
    fn set_node_label(&mut self, tree: &str, node: &str, label: &str) -> Result<(), SceneError>;
    fn set_node_location(&mut self, tree: &str, node: &str, location: [f32; 2]) -> Result<(), SceneError>;
    fn set_node_input(
        &mut self,
        tree: &str,
        node: &str,
        input: usize,
        value: serde_json::Value,
    ) -> Result<(), SceneError>;
    fn set_node_property(
        &mut self,
        tree: &str,
        node: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SceneError>;

    // Links
    fn link(
        &mut self,
        tree: &str,
        from: (&str, usize),
        to: (&str, usize),
    ) -> Result<(), SceneError>;

    /// Socket names of `node` in `direction`.
    fn node_sockets(
        &self,
        tree: &str,
        node: &str,
        direction: SocketDirection,
    ) -> Result<Vec<String>, SceneError> {
        self.node_tree(tree)
            .ok_or_else(|| SceneError::not_found(crate::EntityKind::NodeTree, tree))?;
        let node = self
            .node(tree, node)
            .ok_or_else(|| SceneError::not_found(crate::EntityKind::Node, node))?;
        Ok(node.sockets(direction).iter().map(|s| s.name.clone()).collect())
    }
}
