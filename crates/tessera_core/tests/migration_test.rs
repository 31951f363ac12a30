//! # Migration Tests
//!
//! Density-driven residency changes: promotion, demotion, the hysteresis
//! band and the analysis floor.

mod common;

use common::{small_world, Frozen, Heat, Position};
use tessera_core::{Entity, Residency, World};

/// Spawns `total` empty entities and gives `Heat(i)` to the first `with_heat`.
fn populate(world: &mut World, total: usize, with_heat: usize) -> Vec<Entity> {
    let entities: Vec<Entity> = (0..total).map(|_| world.create_entity()).collect();
    for (i, &entity) in entities.iter().take(with_heat).enumerate() {
        world.add_component(entity, Heat(i as u64 * 7));
    }
    entities
}

fn assert_heat_intact(world: &World, entities: &[Entity]) {
    for (i, &entity) in entities.iter().enumerate() {
        assert_eq!(world.get::<Heat>(entity), Some(&Heat(i as u64 * 7)), "entity {i}");
    }
}

/// Test: a component carried by 30% of entities is promoted with its bytes.
#[test]
fn test_dense_component_promoted() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 30);
    assert_eq!(world.residency::<Heat>(), Residency::Sparse);

    let report = world.maintain();
    let heat = world.registry().lookup::<Heat>().unwrap();
    assert_eq!(report.promoted, vec![heat]);
    assert_eq!(world.residency::<Heat>(), Residency::Archetype);
    assert_heat_intact(&world, &entities[..30]);
    assert_eq!(world.query().with::<Heat>().count(), 30);
    assert!(!world.has_component::<Heat>(entities[30]));
}

/// Test: once most carriers are gone the component is demoted again.
#[test]
fn test_rare_component_demoted() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 30);
    world.maintain();

    for &entity in &entities[3..30] {
        world.destroy_entity(entity);
    }
    // 3 of 73 live entities
    let report = world.maintain();
    assert_eq!(report.demoted.len(), 1);
    assert_eq!(world.residency::<Heat>(), Residency::Sparse);
    assert_heat_intact(&world, &entities[..3]);
    assert_eq!(world.query().with::<Heat>().count(), 3);
}

/// Test: densities inside the band never flip residency.
#[test]
fn test_hysteresis_band_is_stable() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 10);

    for _ in 0..3 {
        assert!(world.maintain().is_empty());
        assert_eq!(world.residency::<Heat>(), Residency::Sparse);
    }

    world.set_residency::<Heat>(Residency::Archetype).unwrap();
    for _ in 0..3 {
        assert!(world.maintain().is_empty());
        assert_eq!(world.residency::<Heat>(), Residency::Archetype);
    }
    assert_heat_intact(&world, &entities[..10]);
}

/// Test: exactly 15% stays sparse; the first carrier above it promotes.
#[test]
fn test_promotion_threshold_is_exclusive() {
    let mut world = small_world(20);
    let mut entities = populate(&mut world, 100, 15);

    assert!(world.maintain().is_empty());
    assert_eq!(world.residency::<Heat>(), Residency::Sparse);

    // 16 of 101
    let extra = world.create_entity();
    world.add_component(extra, Heat(15 * 7));
    entities.insert(15, extra);
    assert_eq!(world.maintain().promoted.len(), 1);
    assert_eq!(world.residency::<Heat>(), Residency::Archetype);
    assert_heat_intact(&world, &entities[..16]);
}

/// Test: exactly 5% stays in archetypes; one carrier fewer demotes.
#[test]
fn test_demotion_threshold_is_exclusive() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 5);
    world.set_residency::<Heat>(Residency::Archetype).unwrap();

    assert!(world.maintain().is_empty());
    assert_eq!(world.residency::<Heat>(), Residency::Archetype);

    assert_eq!(world.remove_component::<Heat>(entities[4]), Some(Heat(4 * 7)));
    assert_eq!(world.maintain().demoted.len(), 1);
    assert_eq!(world.residency::<Heat>(), Residency::Sparse);
    assert_heat_intact(&world, &entities[..4]);
}

/// Test: densities alternating on either side of one threshold never
/// cross the other one, so residency holds across passes.
#[test]
fn test_alternating_boundary_passes_keep_residency() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 15);
    for pass in 0..6 {
        if pass % 2 == 0 {
            world.remove_component::<Heat>(entities[14]);
        } else {
            world.add_component(entities[14], Heat(14 * 7));
        }
        assert!(world.maintain().is_empty(), "pass {pass}");
        assert_eq!(world.residency::<Heat>(), Residency::Sparse);
    }

    let mut world = small_world(20);
    let entities = populate(&mut world, 100, 6);
    world.set_residency::<Heat>(Residency::Archetype).unwrap();
    for pass in 0..6 {
        if pass % 2 == 0 {
            world.remove_component::<Heat>(entities[5]);
        } else {
            world.add_component(entities[5], Heat(5 * 7));
        }
        assert!(world.maintain().is_empty(), "pass {pass}");
        assert_eq!(world.residency::<Heat>(), Residency::Archetype);
    }
    assert_heat_intact(&world, &entities[..5]);
}

/// Test: below the analysis floor nothing migrates, however dense.
#[test]
fn test_floor_blocks_analysis() {
    let mut world = small_world(20);
    populate(&mut world, 10, 10);
    assert!(world.maintain().is_empty());
    assert_eq!(world.residency::<Heat>(), Residency::Sparse);
}

/// Test: zero-sized tags keep their residency.
#[test]
fn test_tags_are_not_analysed() {
    let mut world = small_world(20);
    for _ in 0..50 {
        world.spawn((Frozen, Position::default()));
    }
    let report = world.maintain();
    assert_eq!(report.promoted, vec![world.registry().lookup::<Position>().unwrap()]);
    assert_eq!(world.residency::<Frozen>(), Residency::Sparse);
    assert_eq!(world.query().with::<Frozen>().with::<Position>().count(), 50);
}

/// Test: migration does not change the structural shape seen by queries
/// and bumps the structural version when it creates archetypes.
#[test]
fn test_migration_keeps_queries_consistent() {
    let mut world = small_world(20);
    let entities = populate(&mut world, 60, 30);
    let before = world.query().with::<Heat>().to_list().len();
    let version = world.stats().structural_version;

    world.maintain();
    assert!(world.stats().structural_version > version);

    let mut after = world.query().with::<Heat>().to_list();
    after.sort();
    let mut expected = entities[..30].to_vec();
    expected.sort();
    assert_eq!(before, 30);
    assert_eq!(after, expected);
}
