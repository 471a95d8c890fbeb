//! Layer classification for platform geometry.
//!
//! Level geometry lives on named layers. The solver only cares about four
//! platform categories (static/dynamic × block/one-way); a collider's
//! category is resolved once when it is added to the world.

use serde::{Deserialize, Serialize};

/// A collision layer index (0..=31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Layer(pub u8);

impl Layer {
    /// Untagged geometry; never a platform.
    pub const DEFAULT: Self = Self(0);
    /// Character bodies.
    pub const CHARACTER: Self = Self(8);
    /// Immovable solid terrain.
    pub const STATIC_BLOCK: Self = Self(9);
    /// Moving solid platforms.
    pub const DYNAMIC_BLOCK: Self = Self(10);
    /// Immovable pass-through-from-below ledges.
    pub const STATIC_ONEWAY: Self = Self(11);
    /// Moving pass-through-from-below ledges.
    pub const DYNAMIC_ONEWAY: Self = Self(12);

    /// Mask with only this layer set.
    #[inline]
    pub fn mask(self) -> LayerMask {
        LayerMask(1 << (self.0 & 31))
    }
}

/// A set of layers used to filter queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    pub const STATIC_BLOCK: Self = Self(1 << Layer::STATIC_BLOCK.0);
    pub const DYNAMIC_BLOCK: Self = Self(1 << Layer::DYNAMIC_BLOCK.0);
    pub const STATIC_ONEWAY: Self = Self(1 << Layer::STATIC_ONEWAY.0);
    pub const DYNAMIC_ONEWAY: Self = Self(1 << Layer::DYNAMIC_ONEWAY.0);

    /// Always-solid platforms.
    pub const BLOCK: Self = Self(Self::STATIC_BLOCK.0 | Self::DYNAMIC_BLOCK.0);
    /// One-way platforms.
    pub const ONEWAY: Self = Self(Self::STATIC_ONEWAY.0 | Self::DYNAMIC_ONEWAY.0);
    /// Platforms that never move.
    pub const STATIC: Self = Self(Self::STATIC_BLOCK.0 | Self::STATIC_ONEWAY.0);
    /// Platforms driven by a controller.
    pub const DYNAMIC: Self = Self(Self::DYNAMIC_BLOCK.0 | Self::DYNAMIC_ONEWAY.0);
    /// Everything a character can stand on.
    pub const PLATFORM: Self = Self(Self::BLOCK.0 | Self::ONEWAY.0);

    /// Whether `layer` is part of this mask.
    #[inline]
    pub fn contains(self, layer: Layer) -> bool {
        self.0 & layer.mask().0 != 0
    }

    /// Whether any layer is shared.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for LayerMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[inline]
pub fn is_static_block(layer: Layer) -> bool {
    layer == Layer::STATIC_BLOCK
}

#[inline]
pub fn is_dynamic_block(layer: Layer) -> bool {
    layer == Layer::DYNAMIC_BLOCK
}

#[inline]
pub fn is_static_oneway(layer: Layer) -> bool {
    layer == Layer::STATIC_ONEWAY
}

#[inline]
pub fn is_dynamic_oneway(layer: Layer) -> bool {
    layer == Layer::DYNAMIC_ONEWAY
}

/// Platform category of a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformCategory {
    StaticBlock,
    DynamicBlock,
    StaticOneway,
    DynamicOneway,
}

impl PlatformCategory {
    /// Classify a layer. `None` means the layer holds no platforms.
    pub fn from_layer(layer: Layer) -> Option<Self> {
        if is_static_block(layer) {
            Some(Self::StaticBlock)
        } else if is_dynamic_block(layer) {
            Some(Self::DynamicBlock)
        } else if is_static_oneway(layer) {
            Some(Self::StaticOneway)
        } else if is_dynamic_oneway(layer) {
            Some(Self::DynamicOneway)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::DynamicBlock | Self::DynamicOneway)
    }

    #[inline]
    pub fn is_oneway(self) -> bool {
        matches!(self, Self::StaticOneway | Self::DynamicOneway)
    }

    #[inline]
    pub fn is_block(self) -> bool {
        !self.is_oneway()
    }

    /// The layer this category lives on.
    pub fn layer(self) -> Layer {
        match self {
            Self::StaticBlock => Layer::STATIC_BLOCK,
            Self::DynamicBlock => Layer::DYNAMIC_BLOCK,
            Self::StaticOneway => Layer::STATIC_ONEWAY,
            Self::DynamicOneway => Layer::DYNAMIC_ONEWAY,
        }
    }
}
