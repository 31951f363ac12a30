//! Components and worlds shared by the integration tests.

#![allow(dead_code)]

use bytemuck::{Pod, Zeroable};
use tessera_core::{Component, World, WorldConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Heat(pub u64);
impl Component for Heat {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Label(pub [u8; 12]);
impl Component for Label {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Frozen;
impl Component for Frozen {}

/// A world with small chunks and a low analysis floor.
pub fn small_world(floor: usize) -> World {
    let mut config = WorldConfig::default();
    config.chunk_capacity = 4;
    config.archive.min_entities_for_analysis = floor;
    World::with_config(config).expect("valid test config")
}
