//! Impulse-response and HRTF asset management.
//!
//! Manifests and binary assets are fetched once and memoized; failures
//! degrade gracefully (procedural impulse, HRTF disablement) instead
//! of interrupting playback.

pub mod cache;
pub mod manifest;

pub use cache::{AssetFetcher, FsFetcher, HrtfCache, ImpulseCache};
pub use manifest::{
    HrtfManifest, HrtfPositionDescriptor, ImpulseManifest, ImpulsePresetDescriptor,
};
