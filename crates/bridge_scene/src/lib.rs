//! Hostbridge Scene Graph
//!
//! The scene-graph collaborator that dispatched commands mutate:
//! - [`SceneGraph`]: the fallible interface the command dispatcher consumes
//! - [`MemoryScene`]: an in-memory host data model (objects, materials,
//!   geometry node trees) used by the CLI host and the tests
//!
//! Names follow host data-block conventions: requesting a name that is taken
//! yields `Name.001`, `Name.002`, ... and every creation call returns the name
//! actually assigned.

pub mod catalog;
pub mod error;
pub mod graph;
pub mod memory;
pub mod types;

pub use error::{EntityKind, SceneError};
pub use graph::{SceneGraph, SceneHandle};
pub use memory::MemoryScene;
pub use types::*;

pub use glam::Vec3;

/// Pick `base`, or the first `base.NNN` for which `taken` is false.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}.{n:03}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_suffixes() {
        let taken = ["Cube", "Cube.001"];
        assert_eq!(unique_name("Light", |n| taken.contains(&n)), "Light");
        assert_eq!(unique_name("Cube", |n| taken.contains(&n)), "Cube.002");
    }
}
