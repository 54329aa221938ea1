//! Occlusion map cache
//!
//! Lightmap id → decoded texture array. Entries live until [`OcclusionMapCache::flush`],
//! which the driver calls when a level is unloaded; ids are per level, so the
//! cache behaves as a per-level arena rather than an LRU.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::OcclusionConfig;
use crate::render::backend::{RenderDevice, TextureArrayDesc};
use crate::render::occlusion::bitplane::{box_filter, decode_plane};
use crate::render::occlusion::slots::SlotBinding;
use crate::render::occlusion::{LightMapInfo, LightmapId, LightmapSource, OcclusionError};

/// Texel value of the placeholder: fully lit
const PLACEHOLDER_TEXEL: u8 = 0xFF;

/// Decoded occlusion texture array for one lightmap
pub struct OcclusionMap<D: RenderDevice> {
    texture: D::Texture,
    view: D::TextureView,
    /// Texture U per world unit, `1 / (UClamp * UScale)`
    pub u_mult: f32,
    /// Texture V per world unit, `1 / (VClamp * VScale)`
    pub v_mult: f32,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// One slice per contributing light
    pub layers: u32,
}

impl<D: RenderDevice> OcclusionMap<D> {
    /// Texture array
    pub fn texture(&self) -> &D::Texture {
        &self.texture
    }

    /// Array view bound to the pixel shader
    pub fn view(&self) -> &D::TextureView {
        &self.view
    }
}

impl<D: RenderDevice> std::fmt::Debug for OcclusionMap<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcclusionMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layers", &self.layers)
            .field("u_mult", &self.u_mult)
            .field("v_mult", &self.v_mult)
            .finish_non_exhaustive()
    }
}

/// Cache of decoded occlusion maps with single-slot prepare/bind
pub struct OcclusionMapCache<D: RenderDevice> {
    entries: HashMap<LightmapId, Arc<OcclusionMap<D>>>,
    placeholder: Arc<OcclusionMap<D>>,
    prepared: Option<(LightmapId, Arc<OcclusionMap<D>>)>,
    binding: SlotBinding<LightmapId>,
    slot: u32,
    antialias: bool,
}

impl<D: RenderDevice> OcclusionMapCache<D> {
    /// Create an empty cache binding to `config.slot`
    ///
    /// Allocates the shared 1x1 placeholder up front so falling back to it
    /// never needs the device.
    pub fn new(device: &mut D, config: &OcclusionConfig) -> Result<Self, OcclusionError> {
        let texture = device.create_texture_array(&TextureArrayDesc::r8(1, 1, 1), &[PLACEHOLDER_TEXEL])?;
        let view = device.create_array_view(&texture)?;
        let placeholder = Arc::new(OcclusionMap {
            texture,
            view,
            u_mult: 1.0,
            v_mult: 1.0,
            width: 1,
            height: 1,
            layers: 1,
        });

        Ok(Self {
            entries: HashMap::new(),
            placeholder,
            prepared: None,
            binding: SlotBinding::new(),
            slot: config.slot,
            antialias: config.antialias,
        })
    }

    /// Shared "no occlusion data" entry
    pub fn placeholder(&self) -> Arc<OcclusionMap<D>> {
        Arc::clone(&self.placeholder)
    }

    /// Whether `map` is the placeholder
    pub fn is_placeholder(&self, map: &Arc<OcclusionMap<D>>) -> bool {
        Arc::ptr_eq(map, &self.placeholder)
    }

    /// Look up `id`, decoding and inserting it on a miss
    ///
    /// Lightmaps without contributors, with a degenerate size, or with
    /// inconsistent source data yield the placeholder, which is never
    /// inserted. Device failures are returned; callers fall back to
    /// [`Self::placeholder`].
    pub fn find_or_insert<S>(
        &mut self,
        device: &mut D,
        source: &S,
        id: LightmapId,
    ) -> Result<Arc<OcclusionMap<D>>, OcclusionError>
    where
        S: LightmapSource + ?Sized,
    {
        if let Some(map) = self.entries.get(&id) {
            return Ok(Arc::clone(map));
        }

        let Some(info) = source.lightmap(id) else {
            log::warn!("Lightmap {id} not found in source; using placeholder");
            return Ok(self.placeholder());
        };

        let (layers, data) = match self.decode(source, info) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Ok(self.placeholder()),
            Err(e) if e.is_data_integrity() => {
                log::warn!("Lightmap {id}: {e}; treating as unoccluded");
                return Ok(self.placeholder());
            }
            Err(e) => return Err(e),
        };

        let desc = TextureArrayDesc::r8(info.u_clamp, info.v_clamp, layers);
        let texture = device.create_texture_array(&desc, &data)?;
        let view = device.create_array_view(&texture)?;
        let map = Arc::new(OcclusionMap {
            texture,
            view,
            u_mult: 1.0 / (info.u_clamp as f32 * info.u_scale),
            v_mult: 1.0 / (info.v_clamp as f32 * info.v_scale),
            width: info.u_clamp,
            height: info.v_clamp,
            layers,
        });

        log::debug!(
            "Cached occlusion map {id}: {}x{}x{layers}",
            info.u_clamp, info.v_clamp
        );
        self.entries.insert(id, Arc::clone(&map));
        Ok(map)
    }

    /// [`Self::find_or_insert`], then remember the result as prepared for binding
    pub fn find_or_insert_and_prepare<S>(
        &mut self,
        device: &mut D,
        source: &S,
        id: LightmapId,
    ) -> Result<Arc<OcclusionMap<D>>, OcclusionError>
    where
        S: LightmapSource + ?Sized,
    {
        let map = self.find_or_insert(device, source, id)?;
        self.prepare(id, Arc::clone(&map));
        Ok(map)
    }

    /// Record `map` as the prepared entry for `id`
    pub fn prepare(&mut self, id: LightmapId, map: Arc<OcclusionMap<D>>) {
        self.prepared = Some((id, map));
    }

    /// Currently prepared entry
    pub fn prepared(&self) -> Option<&Arc<OcclusionMap<D>>> {
        self.prepared.as_ref().map(|(_, map)| map)
    }

    /// Whether `id` is the currently prepared entry
    pub fn is_prepared(&self, id: LightmapId) -> bool {
        matches!(&self.prepared, Some((prepared, _)) if *prepared == id)
    }

    /// Bind the prepared view to the cache's slot
    ///
    /// Returns `true` if a device bind was issued; binding the entry that is
    /// already in the slot is skipped.
    pub fn bind_maps(&mut self, device: &mut D) -> bool {
        let Some((id, map)) = &self.prepared else {
            return false;
        };
        if !self.binding.assign(*id) {
            return false;
        }
        device.bind_pixel_resource(self.slot, Some(map.view()));
        true
    }

    /// Unbind the slot and drop every cached entry
    pub fn flush(&mut self, device: &mut D) {
        if self.binding.clear().is_some() {
            device.bind_pixel_resource(self.slot, None);
        }
        self.prepared = None;

        let count = self.entries.len();
        self.entries.clear();
        log::debug!("Flushed {count} occlusion maps");
    }

    /// Number of cached entries (the placeholder is not counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pixel resource slot the cache binds to
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Count of cached entries per `(width, height)`
    pub fn size_histogram(&self) -> BTreeMap<(u32, u32), usize> {
        let mut histogram = BTreeMap::new();
        for map in self.entries.values() {
            *histogram.entry((map.width, map.height)).or_insert(0) += 1;
        }
        histogram
    }

    /// Decode every contributor plane; `None` means no occlusion data
    fn decode<S>(&self, source: &S, info: &LightMapInfo) -> Result<Option<(u32, Vec<u8>)>, OcclusionError>
    where
        S: LightmapSource + ?Sized,
    {
        if info.light_actors < 0 || info.is_degenerate() {
            return Ok(None);
        }
        let contributors = source.contributor_count(info)?;
        if contributors == 0 {
            return Ok(None);
        }

        let bits = source.light_bits();
        let plane_len = info.bytes_per_light();
        let texels = info.u_clamp as usize * info.v_clamp as usize;
        let mut data = Vec::with_capacity(texels * contributors);
        for light in 0..contributors {
            // Offsets come from host metadata and may be garbage
            let plane = light
                .checked_mul(plane_len)
                .and_then(|offset| offset.checked_add(info.data_offset))
                .and_then(|start| Some(start..start.checked_add(plane_len)?))
                .ok_or(OcclusionError::TruncatedBits {
                    needed: usize::MAX,
                    available: bits.len(),
                })?;
            let plane = bits.get(plane).unwrap_or_default();
            decode_plane(plane, info.u_clamp, info.v_clamp, &mut data)?;

            if self.antialias {
                let decoded = data.split_off(data.len() - texels);
                data.extend(box_filter(&decoded, info.u_clamp, info.v_clamp));
            }
        }
        Ok(Some((contributors as u32, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::backend::DeviceError;
    use crate::render::occlusion::LightmapModel;

    fn info(light_actors: i32, data_offset: usize, u: u32, v: u32) -> LightMapInfo {
        LightMapInfo {
            data_offset,
            light_actors,
            u_clamp: u,
            v_clamp: v,
            u_scale: 2.0,
            v_scale: 4.0,
        }
    }

    /// Lightmap 0: two lights, 5x2. Lightmap 1: no chain. Lightmap 2: empty chain.
    fn model() -> LightmapModel {
        LightmapModel {
            lightmaps: vec![info(0, 0, 5, 2), info(-1, 0, 5, 2), info(3, 0, 5, 2)],
            lights: vec![Some(10), Some(11), None, None],
            light_bits: vec![0x0D, 0x1F, 0x00, 0x01],
        }
    }

    fn cache(device: &mut HeadlessDevice) -> OcclusionMapCache<HeadlessDevice> {
        OcclusionMapCache::new(device, &OcclusionConfig::default()).unwrap()
    }

    #[test]
    fn test_find_or_insert_decodes_every_light() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let map = cache.find_or_insert(&mut device, &model(), 0).unwrap();

        assert_eq!((map.width, map.height, map.layers), (5, 2, 2));
        assert_eq!(map.u_mult, 1.0 / 10.0);
        assert_eq!(map.v_mult, 1.0 / 8.0);
        assert_eq!(map.texture().layer(0).unwrap(), &[255, 0, 255, 255, 0, 255, 255, 255, 255, 255]);
        assert_eq!(map.texture().layer(1).unwrap(), &[0, 0, 0, 0, 0, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_find_or_insert_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let source = model();

        let a = cache.find_or_insert(&mut device, &source, 0).unwrap();
        let b = cache.find_or_insert(&mut device, &source, 0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.textures_created(), 2, "placeholder plus one map");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_placeholder_is_not_inserted() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let source = model();

        for id in [1, 2, 99] {
            let map = cache.find_or_insert(&mut device, &source, id).unwrap();
            assert!(cache.is_placeholder(&map));
        }
        assert!(cache.is_empty());
        assert_eq!(cache.placeholder().texture().data, vec![0xFF]);
    }

    #[test]
    fn test_truncated_bits_fall_back_to_placeholder() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let mut source = model();
        source.light_bits.truncate(3);

        let map = cache.find_or_insert(&mut device, &source, 0).unwrap();
        assert!(cache.is_placeholder(&map));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_data_offset_falls_back_to_placeholder() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let mut source = model();
        source.lightmaps[0].data_offset = usize::MAX - 1;

        let map = cache.find_or_insert(&mut device, &source, 0).unwrap();
        assert!(cache.is_placeholder(&map));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_device_failure_is_reported() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        device.set_fail_texture_creation(true);

        let err = cache.find_or_insert(&mut device, &model(), 0).unwrap_err();
        assert!(matches!(err, OcclusionError::Device(DeviceError::ResourceCreationFailed(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prepare_bind_and_redundant_bind() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let source = model();

        assert!(!cache.is_prepared(0));
        assert!(!cache.bind_maps(&mut device));

        let map = cache.find_or_insert_and_prepare(&mut device, &source, 0).unwrap();
        assert!(cache.is_prepared(0));
        assert!(!cache.is_prepared(1));

        assert!(cache.bind_maps(&mut device));
        assert!(!cache.bind_maps(&mut device));
        assert_eq!(device.pixel_bind_count(), 1);

        let bound = device.bound_pixel_resource(cache.slot()).unwrap();
        assert!(Arc::ptr_eq(bound, map.view()));
    }

    #[test]
    fn test_flush_unbinds_and_releases() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let source = model();

        cache.find_or_insert_and_prepare(&mut device, &source, 0).unwrap();
        cache.bind_maps(&mut device);
        assert_eq!(device.live_textures(), 2);

        cache.flush(&mut device);
        assert!(cache.is_empty());
        assert!(!cache.is_prepared(0));
        assert!(device.bound_pixel_resource(cache.slot()).is_none());
        assert_eq!(device.live_textures(), 1, "only the placeholder survives");
    }

    #[test]
    fn test_antialias_filters_each_plane() {
        let mut device = HeadlessDevice::new();
        let mut cache = OcclusionMapCache::new(
            &mut device,
            &OcclusionConfig { antialias: true, ..OcclusionConfig::default() },
        )
        .unwrap();

        let map = cache.find_or_insert(&mut device, &model(), 0).unwrap();
        let layer1 = map.texture().layer(1).unwrap();
        // Single lit texel at (0, 1): corner sample count 4
        assert_eq!(layer1[5], 255 / 4);
        assert_eq!(layer1[0], 255 / 4);
        assert_eq!(layer1[1], 255 / 6);
        assert_eq!(layer1[4], 0);
    }

    #[test]
    fn test_size_histogram() {
        let mut device = HeadlessDevice::new();
        let mut cache = cache(&mut device);
        let mut source = model();
        source.lightmaps.push(info(0, 0, 5, 2));
        source.lightmaps.push(info(0, 0, 8, 1));

        for id in [0, 3, 4, 1] {
            cache.find_or_insert(&mut device, &source, id).unwrap();
        }
        let histogram = cache.size_histogram();
        assert_eq!(histogram.get(&(5, 2)), Some(&2));
        assert_eq!(histogram.get(&(8, 1)), Some(&1));
        assert_eq!(histogram.len(), 2);
    }
}
