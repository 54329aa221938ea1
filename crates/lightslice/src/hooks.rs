//! Level transition hooks
//!
//! The injector intercepts the host's native calls; this module is the plain
//! callback surface it forwards level transitions to.

use crate::config::LevelFlagConfig;

/// Callbacks fired around level loads
pub trait LevelHooks {
    /// The current level is about to be unloaded
    fn on_pre_load_level(&mut self);

    /// Level `name` finished loading
    fn on_load_level(&mut self, name: &str);
}

/// Where the driver is in the level lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderState {
    /// Nothing loaded yet
    #[default]
    Default,
    /// Unload announced, level resources released
    PreLoadLevel,
    /// New level loaded, not rendered yet
    LoadLevel,
    /// Rendering the current level
    RenderLevel,
}

/// Recognizes the script flags that announce level transitions
///
/// The host's scripts set one of these flags right before leaving a level and
/// query it right after the next one loads. Intercepted flag natives forward
/// every set/query here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagWatch {
    ids: Vec<u32>,
}

impl FlagWatch {
    /// Watch the configured flag ids
    pub fn new(config: &LevelFlagConfig) -> Self {
        Self {
            ids: config.transition_flag_ids.clone(),
        }
    }

    /// Whether `id` marks a level transition
    pub fn is_transition_flag(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// A flag was set; fires `on_pre_load_level` for transition flags
    pub fn on_flag_set<L: LevelHooks + ?Sized>(&self, id: u32, hooks: &mut L) -> bool {
        if !self.is_transition_flag(id) {
            return false;
        }
        log::debug!("Transition flag {id} set");
        hooks.on_pre_load_level();
        true
    }

    /// A flag was queried; fires `on_load_level` for transition flags
    pub fn on_flag_query<L: LevelHooks + ?Sized>(&self, id: u32, level_name: &str, hooks: &mut L) -> bool {
        if !self.is_transition_flag(id) {
            return false;
        }
        log::debug!("Transition flag {id} queried in {level_name}");
        hooks.on_load_level(level_name);
        true
    }
}
