//! PNG dumps of decoded occlusion maps

use std::path::{Path, PathBuf};

use image::GrayImage;
use lightslice::render::backends::headless::HeadlessTexture;
use lightslice::render::occlusion::LightmapId;

/// Write every array slice of `texture` as `lightmap_<id>_<layer>.png`
pub fn dump_layers(dir: &Path, id: LightmapId, texture: &HeadlessTexture) -> Result<Vec<PathBuf>, image::ImageError> {
    let desc = texture.desc;
    let mut written = Vec::with_capacity(desc.layers as usize);
    for layer in 0..desc.layers {
        let Some(texels) = texture.layer(layer) else {
            break;
        };
        let Some(img) = GrayImage::from_raw(desc.width, desc.height, texels.to_vec()) else {
            log::warn!("Lightmap {id} layer {layer}: texel count does not match {}x{}", desc.width, desc.height);
            continue;
        };
        let path = dir.join(format!("lightmap_{id}_{layer}.png"));
        img.save(&path)?;
        written.push(path);
    }
    Ok(written)
}
