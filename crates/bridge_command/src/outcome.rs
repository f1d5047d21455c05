use serde::Serialize;

/// Successful result of a command, serialised as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    /// An object was created: `{name, location}`.
    Created { name: String, location: [f32; 3] },
    /// A geometry node tree and its modifier: `{name, modifier}`.
    GeometryNodes { name: String, modifier: String },
    /// A named entity (material, node): `{name}`.
    Named { name: String },
    /// `{success: true}`.
    Success { success: bool },
}

impl CommandOutcome {
    pub fn success() -> Self {
        CommandOutcome::Success { success: true }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
