//! Scene-side views of the host engine

pub mod actor_index;

pub use actor_index::{ActorClass, ActorRecord, LevelId, SceneActorIndex};
