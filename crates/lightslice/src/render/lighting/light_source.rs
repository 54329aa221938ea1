//! Light sources as seen from the host engine

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Light type (temporal behaviour) of a host light actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightType {
    /// Disabled
    #[default]
    None,
    /// Constant
    Steady,
    /// Pulsing
    Pulse,
    /// Blinking
    Blink,
    /// Flickering
    Flicker,
    /// Strobing
    Strobe,
    /// Lights the backdrop only
    BackdropLight,
    /// Slow pulse
    SubtlePulse,
    /// Palette animation played once
    TexturePaletteOnce,
    /// Palette animation looped
    TexturePaletteLoop,
}

/// Light effect (spatial behaviour) of a host light actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightEffect {
    /// Plain omni light
    #[default]
    None,
    /// Torch waver
    TorchWaver,
    /// Fire waver
    FireWaver,
    /// Watery shimmer
    WateryShimmer,
    /// Rotating searchlight
    Searchlight,
    /// Slow wave
    SlowWave,
    /// Fast wave
    FastWave,
    /// Cloud shadows
    CloudCast,
    /// Static spot
    StaticSpot,
    /// Shock wave
    Shock,
    /// Disco ball
    Disco,
    /// Warp
    Warp,
    /// Cone-shaped spotlight
    Spotlight,
    /// Large-area light ignoring incidence angle
    NonIncidence,
    /// Shell
    Shell,
    /// Omni light with bump mapping
    OmniBumpMap,
    /// Interference
    Interference,
    /// Cylinder-shaped ambient light
    Cylinder,
    /// Rotor
    Rotor,
}

/// Shader-side light kind, derived from the effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Omnidirectional point light, 2 slots
    Point,
    /// Cone light with a direction vector, 3 slots
    Spot,
    /// Cylinder/ambient light, 2 slots
    Ambient,
}

impl LightKind {
    /// Number of vec4 slots a record of this kind occupies
    pub const fn slot_count(self) -> usize {
        match self {
            Self::Spot => 3,
            Self::Point | Self::Ambient => 2,
        }
    }

    /// Tag bit identifying this kind to the shader
    pub const fn tag(self) -> LightTag {
        match self {
            Self::Point => LightTag::POINT,
            Self::Spot => LightTag::SPOT,
            Self::Ambient => LightTag::AMBIENT,
        }
    }
}

bitflags! {
    /// Word stored in the W channel of a packed color vector
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LightTag: u32 {
        /// Point light
        const POINT = 1;
        /// Spotlight
        const SPOT = 1 << 1;
        /// Cylinder/ambient light
        const AMBIENT = 1 << 2;
        /// Only affects specially-lit geometry
        const SPECIAL_LIT = 1 << 4;
    }
}

impl LightTag {
    /// Encode for the shader, which reads the tag back as a float
    pub fn to_shader_word(self) -> f32 {
        self.bits() as f32
    }
}

/// Caller-supplied linear color bypassing the HSV path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectColor {
    /// Linear RGB in [0, 1]
    pub rgb: [f32; 3],
    /// Multiplier applied to `rgb`
    pub intensity: f32,
}

/// Light-emitting actor state read from the host each level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSource {
    /// World position
    pub position: Vec3,
    /// World-space radius of influence
    pub radius: f32,
    /// Hue byte, 0..=255 maps to [0, 1)
    pub hue: u8,
    /// Saturation byte, 0 is fully saturated and 255 is white
    pub saturation: u8,
    /// Brightness byte; zero disables the light
    pub brightness: u8,
    /// Explicit color overriding hue/saturation/brightness
    pub direct_color: Option<DirectColor>,
    /// Temporal behaviour
    pub light_type: LightType,
    /// Spatial behaviour
    pub effect: LightEffect,
    /// World direction (spotlights)
    pub direction: Vec3,
    /// Full cone angle in radians (spotlights)
    pub cone_angle: f32,
    /// Only affects specially-lit geometry
    pub special_lit: bool,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            radius: 0.0,
            hue: 0,
            saturation: 255,
            brightness: 0,
            direct_color: None,
            light_type: LightType::None,
            effect: LightEffect::None,
            direction: Vec3::z(),
            cone_angle: 0.0,
            special_lit: false,
        }
    }
}

impl LightSource {
    /// Steady white point light
    pub fn point(position: Vec3, radius: f32, brightness: u8) -> Self {
        Self {
            position,
            radius,
            brightness,
            light_type: LightType::Steady,
            ..Self::default()
        }
    }

    /// Steady white spotlight
    pub fn spot(position: Vec3, radius: f32, brightness: u8, direction: Vec3, cone_angle: f32) -> Self {
        Self {
            position,
            radius,
            brightness,
            direction,
            cone_angle,
            light_type: LightType::Steady,
            effect: LightEffect::Spotlight,
            ..Self::default()
        }
    }

    /// Whether the light can contribute at all
    ///
    /// Disabled types, large-area non-incidence lights and dark lights are
    /// skipped before any transform work.
    pub fn is_relevant(&self) -> bool {
        self.light_type != LightType::None
            && self.effect != LightEffect::NonIncidence
            && self.brightness > 0
    }

    /// Shader-side kind
    pub fn kind(&self) -> LightKind {
        match self.effect {
            LightEffect::Spotlight | LightEffect::StaticSpot => LightKind::Spot,
            LightEffect::Cylinder => LightKind::Ambient,
            _ => LightKind::Point,
        }
    }

    /// Kind tag combined with the special-lit bit
    pub fn tag(&self) -> LightTag {
        let mut tag = self.kind().tag();
        tag.set(LightTag::SPECIAL_LIT, self.special_lit);
        tag
    }
}
