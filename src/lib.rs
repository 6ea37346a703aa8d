pub mod camera3d;
pub mod choreography;
pub mod cli;
pub mod config;
pub mod easing;
pub mod events;
pub mod guard;
pub mod motion;
pub mod nodes;
pub mod populate;
pub mod scene;
pub mod stage;
pub mod time;
pub mod timeline;
pub mod trigger;

pub use choreography::{DemoPage, LeaveStyle};
pub use config::{StageConfig, StageConfigOverrides};
pub use events::{SceneStopReason, StageEvent};
pub use guard::{Disposer, ScopeId};
pub use nodes::{NodeId, PropValue, Property, Rect};
pub use stage::Stage;
pub use timeline::{PlayOptions, TimelineId, ToggleActions, TweenSpec};
pub use trigger::{Threshold, TriggerCallbacks, TriggerEventKind, TriggerHandle, TriggerSpec};
