//! Light color encoding

use crate::foundation::math::Vec3;
use crate::render::lighting::light_source::{LightKind, LightSource};

/// Convert HSV in [0, 1] to linear RGB
///
/// Hue wraps: `1.0` is the same sector as `0.0`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let scaled = h * 6.0;
    let floor = scaled.floor();
    let f = scaled - floor;
    let sector = (floor as i32).rem_euclid(6);

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

/// Intensity scales for the HSV path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScales {
    /// Point and spot lights
    pub point: f32,
    /// Cylinder/ambient lights
    pub ambient: f32,
}

/// Packed color vector: RGB premultiplied by intensity, tag word in W
pub fn encode_light_color(light: &LightSource, scales: ColorScales) -> [f32; 4] {
    let rgb = match light.direct_color {
        Some(direct) => Vec3::from(direct.rgb) * direct.intensity,
        None => {
            let color = hsv_to_rgb(
                f32::from(light.hue) / 255.0,
                1.0 - f32::from(light.saturation) / 255.0,
                1.0,
            );
            let scale = match light.kind() {
                LightKind::Ambient => scales.ambient,
                LightKind::Point | LightKind::Spot => scales.point,
            };
            color * (light.radius * light.radius * f32::from(light.brightness) / 255.0 * scale)
        }
    };
    [rgb.x, rgb.y, rgb.z, light.tag().to_shader_word()]
}
