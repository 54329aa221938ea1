//! Per-level index of light-emitting actors
//!
//! Rebuilt with one scan of the level's actor table whenever the level
//! changes. Actors are classified by exact class name; anything else is not
//! a light and is skipped.

use serde::{Deserialize, Serialize};

/// Host level identifier
pub type LevelId = u64;

/// Light actor classes the renderer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorClass {
    /// `Lamp1`, `Lamp2`, `Lamp3`
    Lamp,
    /// `TriggerLight`
    TriggerLight,
    /// `Light`, `BarrelFire`
    PointLight,
    /// `Spotlight`
    Spotlight,
    /// `AugLight`, the player's attachable light
    Flashlight,
}

impl ActorClass {
    /// Classify a host class name
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "Lamp1" | "Lamp2" | "Lamp3" => Some(Self::Lamp),
            "TriggerLight" => Some(Self::TriggerLight),
            "Light" | "BarrelFire" => Some(Self::PointLight),
            "Spotlight" => Some(Self::Spotlight),
            "AugLight" => Some(Self::Flashlight),
            _ => None,
        }
    }
}

/// One row of the host's actor table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord<H> {
    /// Host handle
    pub handle: H,
    /// Exact class name
    pub class_name: String,
}

/// Classified light actor handles for the current level
#[derive(Debug, Clone)]
pub struct SceneActorIndex<H> {
    level: Option<LevelId>,
    lamps: Vec<H>,
    trigger_lights: Vec<H>,
    point_lights: Vec<H>,
    spotlights: Vec<H>,
    flashlight: Option<H>,
}

impl<H> Default for SceneActorIndex<H> {
    fn default() -> Self {
        Self {
            level: None,
            lamps: Vec::new(),
            trigger_lights: Vec::new(),
            point_lights: Vec::new(),
            spotlights: Vec::new(),
            flashlight: None,
        }
    }
}

impl<H: Copy> SceneActorIndex<H> {
    /// Empty index that has not seen a level
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the lists if `level` differs from the last one seen
    ///
    /// `actors` is the level's actor table; empty rows are `None`. Returns
    /// `true` when the lists were rebuilt.
    pub fn check_level_change<'a, I>(&mut self, level: LevelId, actors: I) -> bool
    where
        I: IntoIterator<Item = Option<&'a ActorRecord<H>>>,
        H: 'a,
    {
        if self.level == Some(level) {
            return false;
        }
        self.level = Some(level);
        self.clear();

        for actor in actors.into_iter().flatten() {
            match ActorClass::from_class_name(&actor.class_name) {
                Some(ActorClass::Lamp) => self.lamps.push(actor.handle),
                Some(ActorClass::TriggerLight) => self.trigger_lights.push(actor.handle),
                Some(ActorClass::PointLight) => self.point_lights.push(actor.handle),
                Some(ActorClass::Spotlight) => self.spotlights.push(actor.handle),
                Some(ActorClass::Flashlight) => self.flashlight = Some(actor.handle),
                None => {}
            }
        }

        log::info!(
            "Level {level}: {} point lights, {} spotlights, {} lamps, {} trigger lights, flashlight {}",
            self.point_lights.len(),
            self.spotlights.len(),
            self.lamps.len(),
            self.trigger_lights.len(),
            if self.flashlight.is_some() { "present" } else { "absent" },
        );
        true
    }

    /// Forget the level so the next check rescans
    pub fn invalidate(&mut self) {
        self.level = None;
        self.clear();
    }

    /// Level the lists were built for
    pub fn level(&self) -> Option<LevelId> {
        self.level
    }

    /// Every indexed light, in clustering order
    ///
    /// Point lights, spotlights, lamps, trigger lights, then the flashlight.
    pub fn candidates(&self) -> impl Iterator<Item = H> + '_ {
        self.point_lights
            .iter()
            .chain(&self.spotlights)
            .chain(&self.lamps)
            .chain(&self.trigger_lights)
            .chain(&self.flashlight)
            .copied()
    }

    /// Lamp actors
    pub fn lamps(&self) -> &[H] {
        &self.lamps
    }

    /// Trigger-linked lights
    pub fn trigger_lights(&self) -> &[H] {
        &self.trigger_lights
    }

    /// Point lights
    pub fn point_lights(&self) -> &[H] {
        &self.point_lights
    }

    /// Spotlights
    pub fn spotlights(&self) -> &[H] {
        &self.spotlights
    }

    /// Player's attachable light
    pub fn flashlight(&self) -> Option<H> {
        self.flashlight
    }

    fn clear(&mut self) {
        self.lamps.clear();
        self.trigger_lights.clear();
        self.point_lights.clear();
        self.spotlights.clear();
        self.flashlight = None;
    }
}
