use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod geometry;
pub mod node_state;

pub use geometry::{Rect, Vec2};
pub use node_state::NodeState;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EdgeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Error type for tag conversion failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Invalid NodeState value: {0}")]
    InvalidNodeState(String),
    #[error("Invalid EdgeStyle value: {0}")]
    InvalidEdgeStyle(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl TryFrom<&str> for EdgeStyle {
    type Error = ConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "solid" => Ok(EdgeStyle::Solid),
            "dashed" => Ok(EdgeStyle::Dashed),
            "dotted" => Ok(EdgeStyle::Dotted),
            other => Err(ConversionError::InvalidEdgeStyle(other.to_string())),
        }
    }
}

/// A positioned, sized, stateful text entity. `x`/`y` are the center in canvas space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub state: NodeState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Node {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.w, self.h)
    }

    /// Bounding rectangle in canvas space.
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.center(), self.size())
    }
}

/// A directed, optionally labeled connection `source_id -> target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub label: Option<String>,
    pub control_points: Vec<Vec2>,
    pub style: EdgeStyle,
}

impl Edge {
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source_id == node || &self.target_id == node
    }

    pub fn has_label(&self) -> bool {
        self.label.as_deref().is_some_and(|label| !label.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert_ne!(EdgeId::generate(), EdgeId::generate());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = NodeId::from("n1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"n1\"");
        let back: EdgeId = serde_json::from_str("\"e7\"").unwrap();
        assert_eq!(back, EdgeId::from("e7"));
    }

    #[test]
    fn test_edge_touches_both_endpoints() {
        let edge = Edge {
            id: EdgeId::from("e"),
            source_id: NodeId::from("a"),
            target_id: NodeId::from("b"),
            label: Some("  ".to_string()),
            control_points: Vec::new(),
            style: EdgeStyle::default(),
        };
        assert!(edge.touches(&NodeId::from("a")));
        assert!(edge.touches(&NodeId::from("b")));
        assert!(!edge.touches(&NodeId::from("c")));
        assert!(!edge.has_label());
    }

    #[test]
    fn test_edge_style_conversion() {
        assert_eq!(EdgeStyle::try_from("dashed"), Ok(EdgeStyle::Dashed));
        assert!(EdgeStyle::try_from("wavy").is_err());
    }

    #[test]
    fn test_node_rect_is_centered() {
        let node = Node {
            id: NodeId::from("n"),
            text: String::new(),
            x: 100.0,
            y: 50.0,
            w: 80.0,
            h: 40.0,
            state: NodeState::Inactive,
            created_at: 0,
            updated_at: 0,
        };
        let rect = node.rect();
        assert_eq!(rect.min, Vec2::new(60.0, 30.0));
        assert_eq!(rect.max, Vec2::new(140.0, 70.0));
    }
}
