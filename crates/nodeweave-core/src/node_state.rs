use crate::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interaction state of a node.
///
/// INACTIVE ⇄ ACTIVE → EDITABLE → ACTIVE; MULTI_SELECTED is entered only by
/// rectangular selection and left by any single-selection action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    #[default]
    Inactive,
    Active,
    Editable,
    MultiSelected,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Inactive => "INACTIVE",
            NodeState::Active => "ACTIVE",
            NodeState::Editable => "EDITABLE",
            NodeState::MultiSelected => "MULTI_SELECTED",
        }
    }

    /// ACTIVE or EDITABLE. At most one node holds focus at a time.
    pub fn is_focused(self) -> bool {
        matches!(self, NodeState::Active | NodeState::Editable)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Inactive, Active | Editable | MultiSelected) => true,
            (Active, Inactive | Editable) => true,
            (Editable, Active | Inactive) => true,
            (MultiSelected, Inactive | Active) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NodeState {
    type Error = ConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "INACTIVE" => Ok(NodeState::Inactive),
            "ACTIVE" => Ok(NodeState::Active),
            "EDITABLE" => Ok(NodeState::Editable),
            "MULTI_SELECTED" => Ok(NodeState::MultiSelected),
            other => Err(ConversionError::InvalidNodeState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tags_round_trip() {
        for state in [
            NodeState::Inactive,
            NodeState::Active,
            NodeState::Editable,
            NodeState::MultiSelected,
        ] {
            assert_eq!(NodeState::try_from(state.as_str()), Ok(state));
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
        assert!(NodeState::try_from("SLEEPING").is_err());
    }

    #[test]
    fn test_transitions() {
        assert!(NodeState::Inactive.can_transition_to(NodeState::Active));
        assert!(NodeState::Active.can_transition_to(NodeState::Editable));
        assert!(NodeState::Editable.can_transition_to(NodeState::Active));
        assert!(!NodeState::Editable.can_transition_to(NodeState::MultiSelected));
        assert!(!NodeState::Active.can_transition_to(NodeState::MultiSelected));
        assert!(NodeState::MultiSelected.can_transition_to(NodeState::Inactive));
    }

    #[test]
    fn test_focus() {
        assert!(NodeState::Active.is_focused());
        assert!(NodeState::Editable.is_focused());
        assert!(!NodeState::MultiSelected.is_focused());
    }
}
