//! Host routing: declared entries, composition with remote tables, matching
//! and resolution.

pub mod composer;
pub mod matcher;
pub mod render;
pub mod tables;
pub mod types;

pub use composer::{RemoteRoutes, RemoteView, RouteComposer, REMOTE_LOAD_FAILED};
pub use render::{render, resolve, Mode, Rendered, View, MAX_REDIRECTS};
pub use types::{
    HostElement, HostRoute, LocalHandler, RemoteTarget, RouteDef, RouteEntry, RouteMetadata,
    RouteParams, RouterTable,
};
