//! Depth-sliced light clustering
//!
//! Partitions the view depth range `[near, far]` into [`SLICE_NUMBER`] equal
//! slices and assigns every visible light to each slice its bounding interval
//! overlaps. The result is serialized into [`PerFrameConstants`]:
//!
//! - `lights`: packed records, 2 vec4 slots per light (3 for spotlights)
//! - `light_indices`: per-slice light lists, concatenated
//! - `slice_table`: prefix-sum start offsets, `SLICE_NUMBER + 1` entries
//!
//! Indices in `light_indices` are slot offsets into `lights` (the record's
//! `real_index`), not the order lights were processed in. With mixed 2- and
//! 3-slot records the two differ.

use crate::config::ClusteringConfig;
use crate::foundation::math::{Mat4Ext, Vec3, ViewFrame};
use crate::render::lighting::color::{encode_light_color, ColorScales};
use crate::render::lighting::light_source::{LightKind, LightSource, LightTag};
use crate::render::shader_constants::{
    PerFrameConstants, MAX_LIGHTS_DATA_SIZE, MAX_SLICE_DATA_SIZE, SLICE_NUMBER,
};

/// One light serialized into the shader layout
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLightRecord {
    /// Position of the light in processing order
    pub logical_index: usize,
    /// Offset of the first slot in the packed light array
    pub real_index: u32,
    /// Shader-side kind
    pub kind: LightKind,
    /// Kind tag plus flags, as stored in the color W channel
    pub tag: LightTag,
    /// First and last slice the light is registered in
    pub slices: (usize, usize),
    vectors: [[f32; 4]; 3],
}

impl PackedLightRecord {
    /// The 2 or 3 vec4 slots of this record
    pub fn slots(&self) -> &[[f32; 4]] {
        &self.vectors[..self.kind.slot_count()]
    }

    /// Color vector: premultiplied RGB, tag word in W
    pub fn color(&self) -> [f32; 4] {
        self.vectors[0]
    }

    /// View-space position, radius in W
    pub fn position_radius(&self) -> [f32; 4] {
        self.vectors[1]
    }

    /// View-space direction, sine of the half cone angle in W (spotlights)
    pub fn direction(&self) -> Option<[f32; 4]> {
        (self.kind == LightKind::Spot).then_some(self.vectors[2])
    }
}

/// Flattened slice lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceIndexTable {
    offsets: [u32; SLICE_NUMBER + 1],
    indices: Vec<u32>,
}

impl Default for SliceIndexTable {
    fn default() -> Self {
        Self {
            offsets: [0; SLICE_NUMBER + 1],
            indices: Vec::new(),
        }
    }
}

impl SliceIndexTable {
    /// Prefix-sum offsets; `offsets[i + 1] - offsets[i]` is the size of slice `i`
    pub fn offsets(&self) -> &[u32; SLICE_NUMBER + 1] {
        &self.offsets
    }

    /// All slice entries, slice 0 first
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Light slot offsets registered in slice `slice`
    pub fn slice(&self, slice: usize) -> &[u32] {
        if slice >= SLICE_NUMBER {
            return &[];
        }
        let start = self.offsets[slice] as usize;
        let end = self.offsets[slice + 1] as usize;
        &self.indices[start..end]
    }

    /// Total assignments, counting a light once per slice it appears in
    pub fn total(&self) -> u32 {
        self.offsets[SLICE_NUMBER]
    }
}

/// Counters from the last recompute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Lights offered to the builder
    pub candidates: usize,
    /// Lights that passed every test and were packed
    pub packed: usize,
    /// Vec4 slots used in the packed light array
    pub slots_used: usize,
    /// Entries in the flattened slice lists
    pub slice_entries: usize,
    /// Lights dropped because the light array was full
    pub truncated_lights: usize,
    /// Slice entries dropped because the index array was full
    pub truncated_entries: usize,
}

/// Why a candidate light was not packed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Disabled, non-incidence or dark
    Irrelevant,
    /// Depth interval does not overlap the clipping range
    OutOfDepthRange,
    /// Outside the view cone and not enclosing the camera
    OutsideCone,
}

/// Builds the per-frame light clusters
#[derive(Debug, Clone)]
pub struct LightClusterBuilder {
    near: f32,
    far: f32,
    thickness: f32,
    sun_direction: Vec3,
    scales: ColorScales,
    strict_capacity: bool,
    last_view: Option<ViewFrame>,
    records: Vec<PackedLightRecord>,
    slices: Vec<Vec<usize>>,
    table: SliceIndexTable,
    stats: ClusterStats,
}

impl LightClusterBuilder {
    /// Create a builder from clustering parameters
    pub fn new(config: &ClusteringConfig) -> Self {
        let near = config.near_clipping_distance;
        let far = config.far_clipping_distance;
        Self {
            near,
            far,
            thickness: (far - near) / SLICE_NUMBER as f32,
            sun_direction: Vec3::from(config.sun_direction),
            scales: ColorScales {
                point: config.point_intensity_scale,
                ambient: config.ambient_intensity_scale,
            },
            strict_capacity: config.strict_capacity,
            last_view: None,
            records: Vec::new(),
            slices: vec![Vec::new(); SLICE_NUMBER],
            table: SliceIndexTable::default(),
            stats: ClusterStats::default(),
        }
    }

    /// Depth covered by one slice
    pub fn slice_thickness(&self) -> f32 {
        self.thickness
    }

    /// Force the next call to recompute even if the view is unchanged
    ///
    /// Needed whenever the light set or the view cone changes under a
    /// stationary camera.
    pub fn invalidate(&mut self) {
        self.last_view = None;
    }

    /// Packed records from the last recompute, in processing order
    pub fn records(&self) -> &[PackedLightRecord] {
        &self.records
    }

    /// Slice table from the last recompute
    pub fn slice_table(&self) -> &SliceIndexTable {
        &self.table
    }

    /// Counters from the last recompute
    pub fn stats(&self) -> ClusterStats {
        self.stats
    }

    /// Recluster if `view` differs from the previous call
    ///
    /// Writes the light arrays, slice table, transposed view matrix and
    /// view-space sun direction into `constants`. Returns `true` when the
    /// payload changed and must be uploaded.
    pub fn recompute_if_view_changed<'a, I>(
        &mut self,
        view: &ViewFrame,
        cone_cos_sq: f32,
        lights: I,
        constants: &mut PerFrameConstants,
    ) -> bool
    where
        I: IntoIterator<Item = &'a LightSource>,
    {
        if self.last_view.as_ref() == Some(view) {
            return false;
        }
        self.last_view = Some(*view);

        self.records.clear();
        for slice in &mut self.slices {
            slice.clear();
        }
        self.stats = ClusterStats::default();

        let mut slots_used = 0;
        for light in lights {
            self.stats.candidates += 1;
            let Ok((view_pos, slices)) = self.classify(view, cone_cos_sq, light) else {
                continue;
            };

            let kind = light.kind();
            if slots_used + kind.slot_count() > MAX_LIGHTS_DATA_SIZE {
                self.capacity_exceeded("light array", slots_used + kind.slot_count(), MAX_LIGHTS_DATA_SIZE);
                self.stats.truncated_lights += 1;
                continue;
            }

            let record = self.pack(view, light, view_pos, slices, slots_used);
            let logical_index = self.records.len();
            for slice in &mut self.slices[slices.0..=slices.1] {
                slice.push(logical_index);
            }
            slots_used += kind.slot_count();
            self.records.push(record);
        }
        self.stats.packed = self.records.len();
        self.stats.slots_used = slots_used;

        self.flatten();
        self.write_constants(view, constants);

        log::trace!(
            "Clustered {} of {} lights into {} slots, {} slice entries",
            self.stats.packed, self.stats.candidates, slots_used, self.stats.slice_entries
        );
        true
    }

    /// Run the relevance, depth and cone tests; on success yield the
    /// view-space position and the slice range
    pub fn classify(
        &self,
        view: &ViewFrame,
        cone_cos_sq: f32,
        light: &LightSource,
    ) -> Result<(Vec3, (usize, usize)), Rejection> {
        if !light.is_relevant() {
            return Err(Rejection::Irrelevant);
        }

        let pos = view.transform_point(&light.position);
        let radius = light.radius;
        let z_min = pos.z - radius;
        let z_max = pos.z + radius;
        if z_max < self.near || z_min > self.far {
            return Err(Rejection::OutOfDepthRange);
        }

        let dist_sq = pos.norm_squared();
        let in_cone = pos.z * pos.z > dist_sq * cone_cos_sq;
        let encloses_camera = dist_sq < radius * radius;
        if !(in_cone || encloses_camera) {
            return Err(Rejection::OutsideCone);
        }

        Ok((pos, self.slice_range(z_min, z_max)))
    }

    /// First and last slice overlapped by the depth interval `[z_min, z_max]`
    pub fn slice_range(&self, z_min: f32, z_max: f32) -> (usize, usize) {
        let last_slice = SLICE_NUMBER - 1;
        let to_slice = |z: f32| ((z - self.near) / self.thickness).floor().max(0.0) as usize;

        let first = if z_min > self.near { to_slice(z_min) } else { 0 };
        let last = if z_max < self.far { to_slice(z_max) } else { last_slice };
        (first.min(last_slice), last.min(last_slice))
    }

    fn pack(
        &self,
        view: &ViewFrame,
        light: &LightSource,
        view_pos: Vec3,
        slices: (usize, usize),
        real_index: usize,
    ) -> PackedLightRecord {
        let kind = light.kind();
        let mut vectors = [[0.0; 4]; 3];
        vectors[0] = encode_light_color(light, self.scales);
        vectors[1] = [view_pos.x, view_pos.y, view_pos.z, light.radius];
        if kind == LightKind::Spot {
            let dir = view
                .transform_vector(&light.direction)
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vec3::z);
            vectors[2] = [dir.x, dir.y, dir.z, (light.cone_angle * 0.5).sin()];
        }

        PackedLightRecord {
            logical_index: self.records.len(),
            real_index: real_index as u32,
            kind,
            tag: light.tag(),
            slices,
            vectors,
        }
    }

    /// Re-index slice entries by packed offset and build the prefix sum
    fn flatten(&mut self) {
        let mut offsets = [0u32; SLICE_NUMBER + 1];
        let mut indices = Vec::new();
        let mut dropped = 0;

        for (slice, lights) in self.slices.iter().enumerate() {
            offsets[slice] = indices.len() as u32;
            for &logical in lights {
                if indices.len() < MAX_SLICE_DATA_SIZE {
                    indices.push(self.records[logical].real_index);
                } else {
                    dropped += 1;
                }
            }
        }
        offsets[SLICE_NUMBER] = indices.len() as u32;

        if dropped > 0 {
            self.capacity_exceeded("slice index array", indices.len() + dropped, MAX_SLICE_DATA_SIZE);
        }
        self.stats.slice_entries = indices.len();
        self.stats.truncated_entries = dropped;
        self.table = SliceIndexTable { offsets, indices };
    }

    fn write_constants(&self, view: &ViewFrame, constants: &mut PerFrameConstants) {
        constants.view = view.view_matrix().transpose().to_gpu_rows();
        let sun = view.transform_vector(&self.sun_direction);
        constants.light_dir = [sun.x, sun.y, sun.z, 0.0];

        constants.slice_table = [0; crate::render::shader_constants::SLICE_TABLE_LEN];
        constants.slice_table[..=SLICE_NUMBER].copy_from_slice(&self.table.offsets);

        constants.light_indices = [0; MAX_SLICE_DATA_SIZE];
        constants.light_indices[..self.table.indices.len()].copy_from_slice(&self.table.indices);

        constants.lights = [[0.0; 4]; MAX_LIGHTS_DATA_SIZE];
        for record in &self.records {
            let start = record.real_index as usize;
            let slots = record.slots();
            constants.lights[start..start + slots.len()].copy_from_slice(slots);
        }
    }

    fn capacity_exceeded(&self, what: &str, needed: usize, capacity: usize) {
        assert!(
            !self.strict_capacity,
            "{what} overflow: {needed} entries needed, capacity {capacity}"
        );
        log::warn!("{what} overflow: {needed} entries needed, capacity {capacity}; truncating");
    }
}
