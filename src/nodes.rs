//! Host-side view nodes the choreography animates.
//!
//! The page shell owns layout and markup; this table only mirrors what the
//! animation core needs: a stable handle, the node's document rectangle once
//! it has been laid out, and the visual properties we write back.

use bitflags::bitflags;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Opacity,
    X,
    Y,
    Scale,
    ScaleY,
    Rotation,
    Blur,
    LetterSpacing,
    Glow,
    /// Discrete highlight flag (the "active" class on timeline nodes).
    Active,
}

impl Property {
    pub const COUNT: usize = 10;
    pub const ALL: [Property; Property::COUNT] = [
        Property::Opacity,
        Property::X,
        Property::Y,
        Property::Scale,
        Property::ScaleY,
        Property::Rotation,
        Property::Blur,
        Property::LetterSpacing,
        Property::Glow,
        Property::Active,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn initial(self) -> PropValue {
        match self {
            Property::Opacity | Property::Scale | Property::ScaleY => PropValue::Number(1.0),
            Property::Active => PropValue::Flag(false),
            _ => PropValue::Number(0.0),
        }
    }

    pub fn mask(self) -> PropertyMask {
        PropertyMask::from_bits_truncate(1 << self.slot())
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::Opacity => "opacity",
            Property::X => "x",
            Property::Y => "y",
            Property::Scale => "scale",
            Property::ScaleY => "scaleY",
            Property::Rotation => "rotation",
            Property::Blur => "blur",
            Property::LetterSpacing => "letterSpacing",
            Property::Glow => "glow",
            Property::Active => "active",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyMask: u16 {
        const OPACITY = 1 << 0;
        const X = 1 << 1;
        const Y = 1 << 2;
        const SCALE = 1 << 3;
        const SCALE_Y = 1 << 4;
        const ROTATION = 1 << 5;
        const BLUR = 1 << 6;
        const LETTER_SPACING = 1 << 7;
        const GLOW = 1 << 8;
        const ACTIVE = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropValue {
    Number(f32),
    Flag(bool),
}

impl PropValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            PropValue::Number(value) => Some(value),
            PropValue::Flag(_) => None,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            PropValue::Flag(value) => Some(value),
            PropValue::Number(_) => None,
        }
    }
}

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        PropValue::Number(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Flag(value)
    }
}

/// Document-space rectangle (offsets in CSS pixels from the top of the page).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height: height.max(0.0) }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    layout: Option<Rect>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    values: [PropValue; Property::COUNT],
    dirty: PropertyMask,
}

impl Node {
    fn new(label: String, parent: Option<NodeId>) -> Self {
        Self {
            label,
            layout: None,
            parent,
            children: Vec::new(),
            values: Property::ALL.map(Property::initial),
            dirty: PropertyMask::empty(),
        }
    }

    pub fn layout(&self) -> Option<Rect> {
        self.layout
    }

    pub fn value(&self, property: Property) -> PropValue {
        self.values[property.slot()]
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Default)]
pub struct NodeStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, label: impl Into<String>) -> NodeId {
        self.insert(Node::new(label.into(), None))
    }

    pub fn spawn_child(&mut self, parent: NodeId, label: impl Into<String>) -> NodeId {
        let parent_alive = self.contains(parent);
        let id = self.insert(Node::new(label.into(), parent_alive.then_some(parent)));
        if let Some(parent) = self.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    /// Removes a node and its descendants. Returns false for stale handles.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(node) = self.take(id) else {
            return false;
        };
        if let Some(parent) = node.parent.and_then(|parent| self.get_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }
        let mut pending = node.children;
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.take(child) {
                pending.extend(removed.children);
            }
        }
        true
    }

    fn take(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        self.free.push(id.index);
        Some(node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn set_layout(&mut self, id: NodeId, rect: Rect) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.layout = Some(rect);
                true
            }
            None => false,
        }
    }

    pub fn layout(&self, id: NodeId) -> Option<Rect> {
        self.get(id).and_then(|node| node.layout)
    }

    pub fn value(&self, id: NodeId, property: Property) -> Option<PropValue> {
        self.get(id).map(|node| node.value(property))
    }

    pub fn number(&self, id: NodeId, property: Property) -> Option<f32> {
        self.value(id, property).and_then(PropValue::as_number)
    }

    pub fn flag(&self, id: NodeId, property: Property) -> Option<bool> {
        self.value(id, property).and_then(PropValue::as_flag)
    }

    /// Writes a property. Missing nodes and mismatched value kinds are ignored.
    pub fn set(&mut self, id: NodeId, property: Property, value: PropValue) -> bool {
        let Some(node) = self.get_mut(id) else {
            log::debug!("write of {} to missing node {id} ignored", property.name());
            return false;
        };
        let slot = &mut node.values[property.slot()];
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            log::debug!("write of {} to node {id} has the wrong value kind", property.name());
            return false;
        }
        if *slot != value {
            *slot = value;
            node.dirty |= property.mask();
        }
        true
    }

    /// Properties written since the last drain, per node.
    pub fn drain_dirty(&mut self) -> Vec<(NodeId, PropertyMask)> {
        let mut out = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(node) = slot.node.as_mut() {
                if !node.dirty.is_empty() {
                    out.push((NodeId { index: index as u32, generation: slot.generation }, node.dirty));
                    node.dirty = PropertyMask::empty();
                }
            }
        }
        out
    }
}
