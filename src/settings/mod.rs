//! User preferences and other client-local state.

mod client_state;
mod definition;
mod store;

pub use client_state::{marker_scale, ClientState, DEFAULT_MAP_ZOOM};
pub use definition::{
  SelectOption, SettingDefinition, SettingGroup, SettingKind, SettingValue, Settings,
  SettingsError, SettingsLayout,
};
pub use store::{MemoryStorage, SqliteStorage, StateStorage};
