pub mod binder;
pub mod chain;
pub mod compositor;
pub mod config;
pub mod controls;
pub mod dynamics;
pub mod error;
pub mod naming;
pub mod organizer;
pub mod pipeline;
pub mod spline;

pub use binder::{BinderOptions, bind_links};
pub use chain::{
    BranchedChainError, Chain, CrossLink, WorkingChain, cross_links, duplicate_chain, walk_chain,
};
pub use compositor::{CompositeStrategy, CompositeTarget, DEFAULT_BLEND_WEIGHT, composite};
pub use config::{ConfigError, RigConfig, load_rig_toml, parse_rig_toml};
pub use controls::{ControlHierarchy, ControlProxy, build_control_hierarchy, follow_parent};
pub use dynamics::{
    DynamicsBridge, DynamicsOutcome, DynamicsPort, SceneDiffDynamics, SimulationInput,
    SimulationPair, apply_context_settings, prepare_simulation_input,
};
pub use error::{RigError, RigResult, ValidationError};
pub use naming::NameAllocator;
pub use organizer::{SceneGroups, ensure_group, hide_helpers, safe_parent, teardown};
pub use pipeline::{ChainRig, RunReport, SecondaryMotionRig};
pub use spline::{SplineBinding, create_spline_binding, setup_twist_reference};
