//! Schedules driving a world built from TOML configuration.

use bytemuck::{Pod, Zeroable};
use tessera::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
}
impl Component for Velocity {}

fn world() -> World {
    let config = tessera::config::load_str("chunk_capacity = 4\n").unwrap();
    World::with_config(config).unwrap()
}

#[test]
fn test_systems_run_in_dependency_order() {
    let mut world = world();
    let entities = world.spawn_batch((0..10).map(|_| (Position::default(), Velocity::default())));

    let mut schedule = Schedule::new();
    schedule
        .add_system(SystemDescriptor::new("integrate").after("accelerate"), |world: &mut World| {
            world.query().for_each2::<Position, Velocity>(|pos, vel| pos.x += vel.x);
        })
        .add_system(SystemDescriptor::new("accelerate"), |world: &mut World| {
            world.query().for_each1::<Velocity>(|vel| vel.x += 1.0);
        })
        .add_system(
            SystemDescriptor::new("reset").in_stage(Stage::Last),
            |world: &mut World| world.query().for_each1::<Velocity>(|vel| vel.x = 0.0),
        );
    schedule.build(&mut world).unwrap();

    schedule.run(&mut world);
    schedule.run(&mut world);

    for entity in entities {
        assert_eq!(world.get_component::<Position>(entity).x, 2.0);
        assert_eq!(world.get_component::<Velocity>(entity).x, 0.0);
    }
}

#[test]
fn test_failed_build_installs_nothing() {
    let mut world = world();
    let mut schedule = Schedule::new();
    schedule
        .add_system(SystemDescriptor::new("ok").in_stage(Stage::First), |_: &mut World| {})
        .add_system(SystemDescriptor::new("loop").after("loop"), |_: &mut World| {});

    let err = schedule.build(&mut world).unwrap_err();
    assert!(matches!(err, ScheduleError::Cycle { .. }));
    assert!(world.stage_callback_names(Stage::First).is_empty());

    let wrapped: TesseraError = err.into();
    assert!(wrapped.to_string().contains("loop"));
}

#[test]
fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("tessera-config-{}.toml", std::process::id()));
    std::fs::write(&path, "chunk_pool_limit = 1\n[archive]\nmin_entities_for_analysis = 5\n")
        .unwrap();

    let world = tessera::config::world_from_file(&path).unwrap();
    assert_eq!(world.config().chunk_pool_limit, 1);
    assert_eq!(world.config().archive.min_entities_for_analysis, 5);
    std::fs::remove_file(path).unwrap();
}
