//! Identifiers and flag sets exchanged with the avatar runtime.
//!
//! Every runtime-side identifier is a transparent newtype over an integer with
//! `0` reserved as the invalid sentinel. Version tokens use the same
//! representation: a version pair whose current value is `INVALID` has never
//! been synchronized.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl $name {
            /// Sentinel for "no value".
            pub const INVALID: Self = Self(0);

            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Runtime entity identifier.
    EntityId(u32)
);
define_id!(
    /// Runtime node identifier (joints and mesh nodes share this space).
    NodeId(u32)
);
define_id!(
    /// Identifier of a loadable render primitive asset.
    PrimitiveId(u64)
);
define_id!(
    /// Identifier of one placed instance of a primitive on an entity.
    RenderInstanceId(u32)
);
define_id!(
    /// Token that changes whenever the runtime skeleton hierarchy changes.
    HierarchyVersion(u32)
);
define_id!(
    /// Token that changes whenever a mesh node list changes.
    RenderStateVersion(u32)
);

// ============================================================================
// Joint Types
// ============================================================================

macro_rules! joint_types {
    ($($variant:ident = $value:literal,)+) => {
        /// Semantic joint slots the runtime can resolve to skeleton nodes.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum JointType {
            $($variant = $value,)+
        }

        impl JointType {
            /// Every joint type in discriminant order.
            pub const ALL: [JointType; JOINT_TYPE_COUNT] = [$(JointType::$variant,)+];

            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(JointType::$variant => stringify!($variant),)+
                }
            }
        }
    };
}

/// Number of [`JointType`] values.
pub const JOINT_TYPE_COUNT: usize = 64;

joint_types! {
    Root = 0,
    Hips = 1,
    LeftLegUpper = 2,
    LeftLegLower = 3,
    LeftFootAnkle = 4,
    LeftFootBall = 5,
    RightLegUpper = 6,
    RightLegLower = 7,
    RightFootAnkle = 8,
    RightFootBall = 9,
    SpineLower = 10,
    SpineMiddle = 11,
    SpineUpper = 12,
    Chest = 13,
    Neck = 14,
    Head = 15,
    LeftShoulder = 16,
    LeftArmUpper = 17,
    LeftArmLower = 18,
    LeftHandWrist = 19,
    RightShoulder = 20,
    RightArmUpper = 21,
    RightArmLower = 22,
    RightHandWrist = 23,
    LeftHandThumbTrapezium = 24,
    LeftHandThumbMeta = 25,
    LeftHandThumbProximal = 26,
    LeftHandThumbDistal = 27,
    LeftHandIndexMeta = 28,
    LeftHandIndexProximal = 29,
    LeftHandIndexIntermediate = 30,
    LeftHandIndexDistal = 31,
    LeftHandMiddleMeta = 32,
    LeftHandMiddleProximal = 33,
    LeftHandMiddleIntermediate = 34,
    LeftHandMiddleDistal = 35,
    LeftHandRingMeta = 36,
    LeftHandRingProximal = 37,
    LeftHandRingIntermediate = 38,
    LeftHandRingDistal = 39,
    LeftHandPinkyMeta = 40,
    LeftHandPinkyProximal = 41,
    LeftHandPinkyIntermediate = 42,
    LeftHandPinkyDistal = 43,
    RightHandThumbTrapezium = 44,
    RightHandThumbMeta = 45,
    RightHandThumbProximal = 46,
    RightHandThumbDistal = 47,
    RightHandIndexMeta = 48,
    RightHandIndexProximal = 49,
    RightHandIndexIntermediate = 50,
    RightHandIndexDistal = 51,
    RightHandMiddleMeta = 52,
    RightHandMiddleProximal = 53,
    RightHandMiddleIntermediate = 54,
    RightHandMiddleDistal = 55,
    RightHandRingMeta = 56,
    RightHandRingProximal = 57,
    RightHandRingIntermediate = 58,
    RightHandRingDistal = 59,
    RightHandPinkyMeta = 60,
    RightHandPinkyProximal = 61,
    RightHandPinkyIntermediate = 62,
    RightHandPinkyDistal = 63,
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Flag Sets
// ============================================================================

/// Number of discrete LOD levels.
pub const LOD_COUNT: usize = 5;

bitflags! {
    /// Levels of detail a primitive participates in. Bit `i` is LOD `i`,
    /// with LOD 0 the highest quality.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LodFlags: u32 {
        const LOD_0 = 1 << 0;
        const LOD_1 = 1 << 1;
        const LOD_2 = 1 << 2;
        const LOD_3 = 1 << 3;
        const LOD_4 = 1 << 4;
        const ALL = Self::LOD_0.bits() | Self::LOD_1.bits() | Self::LOD_2.bits()
            | Self::LOD_3.bits() | Self::LOD_4.bits();
    }
}

impl LodFlags {
    /// Flag for a single LOD level.
    #[must_use]
    pub fn level(index: usize) -> Self {
        debug_assert!(index < LOD_COUNT);
        Self::from_bits_truncate(1 << index)
    }

    /// Index of the highest quality (lowest numbered) level in the set.
    #[inline]
    #[must_use]
    pub fn highest_quality_index(self) -> Option<usize> {
        (!self.is_empty()).then(|| self.bits().trailing_zeros() as usize)
    }

    /// `Some(i)` when exactly one level bit is set.
    #[inline]
    #[must_use]
    pub fn single_level(self) -> Option<usize> {
        (self.bits().count_ones() == 1).then(|| self.bits().trailing_zeros() as usize)
    }
}

bitflags! {
    /// Capabilities requested for an entity at creation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityFeatures: u32 {
        const RENDERING_PRIMS = 1 << 1;
        const RENDERING_SKINNING_MATRICES = 1 << 2;
        const RENDERING_OBJECT_SPACE_TRANSFORMS = 1 << 3;
        const ANIMATION = 1 << 4;
        const USE_DEFAULT_MODEL = 1 << 5;
        const USE_DEFAULT_ANIM_HIERARCHY = 1 << 6;
        const ANALYTIC_IK = 1 << 7;
        const USE_DEFAULT_FACE_ANIMATIONS = 1 << 8;

        /// Features that make the runtime produce a new skeletal pose.
        const UPDATE_POSE = Self::ANIMATION.bits() | Self::ANALYTIC_IK.bits();
        /// Features that make the runtime produce new morph target weights.
        const UPDATE_MORPHS = Self::ANIMATION.bits() | Self::USE_DEFAULT_FACE_ANIMATIONS.bits();
        /// Typical preset for a rendered, animated avatar.
        const PRESET_DEFAULT = Self::RENDERING_PRIMS.bits()
            | Self::RENDERING_SKINNING_MATRICES.bits()
            | Self::ANIMATION.bits()
            | Self::USE_DEFAULT_FACE_ANIMATIONS.bits();
    }
}

impl Default for EntityFeatures {
    fn default() -> Self {
        Self::PRESET_DEFAULT
    }
}
