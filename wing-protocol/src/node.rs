//! The typed node model: definitions describing one controllable console
//! parameter, and the values carried by node-data frames.

use serde::{Deserialize, Serialize};

use crate::error::IndexOutOfRange;

/// Identifier of a node in the console parameter tree.
///
/// Stable for a given console's running configuration. Zero addresses the
/// tree root in requests; negative values are reserved.
pub type NodeId = i32;

/// Node type tag, governing which constraint fields a definition carries
/// and which value kind its data frames use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    /// Generic branch node with no value of its own.
    Node = 0,
    /// Float on a linear scale.
    LinearFloat = 1,
    /// Float on a logarithmic scale.
    LogarithmicFloat = 2,
    /// Float mapped through the fader-level taper.
    FaderLevel = 3,
    /// Integer.
    Integer = 4,
    /// One of an ordered set of string choices.
    StringEnum = 5,
    /// One of an ordered set of float choices.
    FloatEnum = 6,
    /// Free-form string.
    String = 7,
}

impl NodeType {
    /// Decode the wire nibble. Unknown values map to the generic node type
    /// so that consoles newer than this library do not break the stream.
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => NodeType::LinearFloat,
            2 => NodeType::LogarithmicFloat,
            3 => NodeType::FaderLevel,
            4 => NodeType::Integer,
            5 => NodeType::StringEnum,
            6 => NodeType::FloatEnum,
            7 => NodeType::String,
            _ => NodeType::Node,
        }
    }

    /// The value kind a data frame for a node of this type must carry,
    /// or `None` for branch nodes.
    pub fn value_kind(self) -> Option<ValueKind> {
        match self {
            NodeType::Node => None,
            NodeType::LinearFloat
            | NodeType::LogarithmicFloat
            | NodeType::FaderLevel
            | NodeType::FloatEnum => Some(ValueKind::Float),
            NodeType::Integer => Some(ValueKind::Int),
            NodeType::StringEnum | NodeType::String => Some(ValueKind::String),
        }
    }
}

/// Unit annotation on a node definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeUnit {
    None = 0,
    Decibels = 1,
    Percent = 2,
    Milliseconds = 3,
    Hertz = 4,
    Meters = 5,
    Seconds = 6,
    Octaves = 7,
}

impl NodeUnit {
    /// Decode the wire byte; unknown units degrade to `None`.
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => NodeUnit::Decibels,
            2 => NodeUnit::Percent,
            3 => NodeUnit::Milliseconds,
            4 => NodeUnit::Hertz,
            5 => NodeUnit::Meters,
            6 => NodeUnit::Seconds,
            7 => NodeUnit::Octaves,
            _ => NodeUnit::None,
        }
    }
}

/// The three value kinds a node-data frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Float,
    Int,
}

/// One entry of an enumerated constraint: the selectable value plus its
/// long display label. Ordering within the definition is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem<T> {
    pub item: T,
    pub long_item: String,
}

/// Type-gated constraints of a node definition.
///
/// Exactly one variant applies per definition, selected by the node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraints {
    /// Branch nodes and unknown future types carry no constraints.
    None,
    /// Float-typed nodes: inclusive range plus step count.
    Float { min: f32, max: f32, steps: i32 },
    /// Integer-typed nodes: inclusive range.
    Integer { min: i32, max: i32 },
    /// String-typed nodes: maximum byte length.
    String { max_len: u16 },
    /// String-enum nodes: ordered selectable items.
    StringEnum(Vec<EnumItem<String>>),
    /// Float-enum nodes: ordered selectable items.
    FloatEnum(Vec<EnumItem<f32>>),
}

/// Static shape and metadata of one console parameter.
///
/// Built by the decoder from a node-definition frame. Constraint accessors
/// return `None` when the constraint does not apply to the node's type;
/// "not applicable" is an expected outcome of the heterogeneous type model,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    pub parent_id: NodeId,
    /// Display position among siblings.
    pub index: u16,
    pub node_type: NodeType,
    pub unit: NodeUnit,
    pub name: String,
    pub long_name: String,
    pub read_only: bool,
    pub constraints: Constraints,
}

impl NodeDef {
    pub fn min_float(&self) -> Option<f32> {
        match self.constraints {
            Constraints::Float { min, .. } => Some(min),
            _ => None,
        }
    }

    pub fn max_float(&self) -> Option<f32> {
        match self.constraints {
            Constraints::Float { max, .. } => Some(max),
            _ => None,
        }
    }

    pub fn steps(&self) -> Option<i32> {
        match self.constraints {
            Constraints::Float { steps, .. } => Some(steps),
            _ => None,
        }
    }

    pub fn min_int(&self) -> Option<i32> {
        match self.constraints {
            Constraints::Integer { min, .. } => Some(min),
            _ => None,
        }
    }

    pub fn max_int(&self) -> Option<i32> {
        match self.constraints {
            Constraints::Integer { max, .. } => Some(max),
            _ => None,
        }
    }

    pub fn max_string_len(&self) -> Option<u16> {
        match self.constraints {
            Constraints::String { max_len } => Some(max_len),
            _ => None,
        }
    }

    pub fn string_enum_count(&self) -> usize {
        match &self.constraints {
            Constraints::StringEnum(items) => items.len(),
            _ => 0,
        }
    }

    pub fn float_enum_count(&self) -> usize {
        match &self.constraints {
            Constraints::FloatEnum(items) => items.len(),
            _ => 0,
        }
    }

    pub fn string_enum_item(&self, index: usize) -> Result<&EnumItem<String>, IndexOutOfRange> {
        let count = self.string_enum_count();
        match &self.constraints {
            Constraints::StringEnum(items) if index < count => Ok(&items[index]),
            _ => Err(IndexOutOfRange { index, count }),
        }
    }

    pub fn float_enum_item(&self, index: usize) -> Result<&EnumItem<f32>, IndexOutOfRange> {
        let count = self.float_enum_count();
        match &self.constraints {
            Constraints::FloatEnum(items) if index < count => Ok(&items[index]),
            _ => Err(IndexOutOfRange { index, count }),
        }
    }

    /// Whether a data value is of the kind this definition's type declares.
    pub fn accepts(&self, value: &NodeValue) -> bool {
        self.node_type.value_kind() == Some(value.kind())
    }
}

/// The current value of a node, decoded from a node-data frame.
///
/// The wire payload carries no type tag of its own; the variant is decided
/// once at decode time from the frame shape. Callers correlate it with the
/// node's definition to pick the right accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    String(String),
    Float(f32),
    Int(i32),
}

impl NodeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            NodeValue::String(_) => ValueKind::String,
            NodeValue::Float(_) => ValueKind::Float,
            NodeValue::Int(_) => ValueKind::Int,
        }
    }

    pub fn has_string(&self) -> bool {
        matches!(self, NodeValue::String(_))
    }

    pub fn has_float(&self) -> bool {
        matches!(self, NodeValue::Float(_))
    }

    pub fn has_int(&self) -> bool {
        matches!(self, NodeValue::Int(_))
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            NodeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            NodeValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeValue::String(s) => f.write_str(s),
            NodeValue::Float(v) => write!(f, "{v}"),
            NodeValue::Int(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_def() -> NodeDef {
        NodeDef {
            id: 100,
            parent_id: 1,
            index: 3,
            node_type: NodeType::Integer,
            unit: NodeUnit::None,
            name: "dly".into(),
            long_name: "Delay".into(),
            read_only: false,
            constraints: Constraints::Integer { min: 0, max: 500 },
        }
    }

    #[test]
    fn integer_node_has_no_float_constraints() {
        let def = int_def();
        assert_eq!(def.min_float(), None);
        assert_eq!(def.max_float(), None);
        assert_eq!(def.steps(), None);
        assert_eq!(def.min_int(), Some(0));
        assert_eq!(def.max_int(), Some(500));
    }

    #[test]
    fn enum_item_index_out_of_range() {
        let def = NodeDef {
            node_type: NodeType::StringEnum,
            constraints: Constraints::StringEnum(vec![
                EnumItem { item: "LR".into(), long_item: "Stereo".into() },
                EnumItem { item: "M".into(), long_item: "Mono".into() },
            ]),
            ..int_def()
        };
        assert_eq!(def.string_enum_count(), 2);
        assert_eq!(def.string_enum_item(1).unwrap().item, "M");
        let err = def.string_enum_item(2).unwrap_err();
        assert_eq!(err, IndexOutOfRange { index: 2, count: 2 });
        // Enum accessors of the other flavor are simply absent.
        assert_eq!(def.float_enum_count(), 0);
        assert!(def.float_enum_item(0).is_err());
    }

    #[test]
    fn value_kind_is_exclusive_and_matches_type() {
        let v = NodeValue::Float(-6.0);
        assert!(v.has_float() && !v.has_int() && !v.has_string());
        let fader = NodeDef {
            node_type: NodeType::FaderLevel,
            constraints: Constraints::Float { min: -144.0, max: 10.0, steps: 1441 },
            ..int_def()
        };
        assert!(fader.accepts(&v));
        assert!(!fader.accepts(&NodeValue::Int(-6)));
        assert!(int_def().accepts(&NodeValue::Int(-6)));
        // Branch nodes accept no data values at all.
        let branch = NodeDef { node_type: NodeType::Node, constraints: Constraints::None, ..int_def() };
        assert!(!branch.accepts(&v));
    }

    #[test]
    fn unknown_wire_type_degrades_to_generic_node() {
        assert_eq!(NodeType::from_wire(12), NodeType::Node);
        assert_eq!(NodeUnit::from_wire(9), NodeUnit::None);
    }
}
