//! # Query Tests
//!
//! Matching, cache freshness and the iteration flavours over mixed
//! archetype and sparse-set residency.

mod common;

use common::{small_world, Frozen, Heat, Position, Velocity};
use tessera_core::{Entity, RelationKind, Residency, World};

/// Position in archetypes, Velocity and Heat sparse.
fn mixed_world(count: usize) -> (World, Vec<Entity>) {
    let mut world = small_world(1000);
    world.set_residency::<Position>(Residency::Archetype).unwrap();
    let entities = (0..count)
        .map(|i| {
            let entity = world.spawn((Position { x: i as f32, y: 0.0 },));
            if i % 2 == 0 {
                world.add_component(entity, Velocity { x: 1.0, y: 2.0 });
            }
            if i % 3 == 0 {
                world.add_component(entity, Heat(i as u64));
            }
            entity
        })
        .collect();
    (world, entities)
}

/// Test: an archetype created after a query ran is visible to the next run.
#[test]
fn test_cache_sees_new_archetypes() {
    let mut world = World::new();
    world.set_residency::<Position>(Residency::Archetype).unwrap();
    world.set_residency::<Velocity>(Residency::Archetype).unwrap();
    world.spawn((Position::default(),));

    assert_eq!(world.query().with::<Position>().count(), 1);
    assert_eq!(world.query().with::<Position>().count(), 1);
    let hits = world.stats().cache_hits;
    assert!(hits >= 1);

    world.spawn((Position::default(), Velocity::default()));
    assert_eq!(world.query().with::<Position>().count(), 2);
}

/// Test: dense and sparse components are written through the same call.
#[test]
fn test_for_each_over_mixed_residency() {
    let (mut world, entities) = mixed_world(10);
    world.query().for_each2::<Position, Velocity>(|pos, vel| {
        pos.x += vel.x;
        vel.y = pos.x;
    });

    for (i, &entity) in entities.iter().enumerate() {
        let x = world.get_component::<Position>(entity).x;
        if i % 2 == 0 {
            assert_eq!(x, i as f32 + 1.0);
            assert_eq!(world.get_component::<Velocity>(entity).y, x);
        } else {
            assert_eq!(x, i as f32);
        }
    }
}

/// Test: entity handles match the rows they are passed with.
#[test]
fn test_for_each_entity_pairs_handles() {
    let (mut world, entities) = mixed_world(12);
    let mut seen = Vec::new();
    world.query().for_each_entity2::<Heat, Position>(|entity, heat, pos| {
        seen.push((entity, heat.0, pos.x));
    });
    seen.sort_by_key(|&(entity, ..)| entity);

    let expected: Vec<_> = entities
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 0)
        .map(|(i, &entity)| (entity, i as u64, i as f32))
        .collect();
    assert_eq!(seen, expected);
}

/// Test: batches are chunk sized and sparse values are written back.
#[test]
fn test_for_each_batch_writes_back() {
    let (mut world, entities) = mixed_world(10);
    let mut sizes = Vec::new();
    world.query().for_each_batch2::<Position, Velocity>(|batch, positions, velocities| {
        assert_eq!(batch.len(), positions.len());
        assert_eq!(batch.len(), velocities.len());
        sizes.push(batch.len());
        for (pos, vel) in positions.iter_mut().zip(velocities.iter_mut()) {
            vel.x = pos.x * 10.0;
        }
    });
    assert_eq!(sizes.iter().sum::<usize>(), 5);
    assert!(sizes.iter().all(|&size| size <= 4));

    for (i, &entity) in entities.iter().enumerate().filter(|(i, _)| i % 2 == 0) {
        assert_eq!(world.get_component::<Velocity>(entity).x, i as f32 * 10.0);
    }
}

/// Test: filtered batches only expose and write back the selected rows.
#[test]
fn test_filtered_batch_leaves_other_rows() {
    let (mut world, entities) = mixed_world(8);
    let keep = entities[2];
    world.query().filter(move |entity| entity == keep).for_each_batch1::<Position>(|batch, positions| {
        assert_eq!(batch, &[keep]);
        positions[0].y = 99.0;
    });
    for &entity in &entities {
        let expected = if entity == keep { 99.0 } else { 0.0 };
        assert_eq!(world.get_component::<Position>(entity).y, expected);
    }
}

/// Test: parallel iteration visits every match exactly once.
#[test]
fn test_par_for_each_matches_sequential() {
    let (mut world, entities) = mixed_world(1000);
    world.query().par_for_each3::<Position, Velocity, Heat>(|entity, pos, vel, heat| {
        pos.y = entity.index() as f32;
        vel.x = heat.0 as f32;
        heat.0 += 1;
    });

    for (i, &entity) in entities.iter().enumerate() {
        let hit = i % 6 == 0;
        let pos = world.get_component::<Position>(entity);
        assert_eq!(pos.y, if hit { entity.index() as f32 } else { 0.0 });
        if hit {
            assert_eq!(world.get_component::<Velocity>(entity).x, i as f32);
            assert_eq!(world.get_component::<Heat>(entity).0, i as u64 + 1);
        }
    }
}

/// Test: `any` and `none` work on sparse-resident ids.
#[test]
fn test_any_and_none_on_sparse_ids() {
    let (mut world, entities) = mixed_world(12);
    world.add_component(entities[1], Frozen);

    let either = world.query().any::<(Velocity, Heat)>().count();
    assert_eq!(either, 8);

    let thawed = world.query().with::<Position>().without::<Frozen>().count();
    assert_eq!(thawed, 11);

    let mut calls = 0;
    world.query().without::<Velocity>().for_each1::<Heat>(|_| calls += 1);
    assert_eq!(calls, 2);
}

/// Test: relation filters select the children of one parent.
#[test]
fn test_with_relation_filter() {
    let (mut world, entities) = mixed_world(6);
    let parent = world.create_entity();
    world.set_parent(entities[0], parent);
    world.set_parent(entities[4], parent);
    let other = world.create_entity();
    world.set_parent(entities[5], other);

    let mut children =
        world.query().with::<Position>().with_relation(RelationKind::CHILD_OF, parent).to_list();
    children.sort();
    assert_eq!(children, vec![entities[0], entities[4]]);
    assert_eq!(world.children(parent), vec![entities[0], entities[4]]);

    world.set_parent(entities[4], other);
    assert_eq!(world.parent(entities[4]), Some(other));
    assert_eq!(world.query().with_relation(RelationKind::CHILD_OF, parent).count(), 1);
}

/// Test: entities reserved through `&World` are matched once a query runs.
#[test]
fn test_reserved_entities_are_flushed_by_queries() {
    let mut world = World::new();
    let reserved = [world.reserve_entity(), world.reserve_entity()];
    assert_eq!(world.query().count(), 2);
    for entity in reserved {
        assert!(world.location(entity).is_some());
    }
}

/// Test: a fetch of an unused sparse component matches nothing.
#[test]
fn test_fetch_of_missing_sparse_set_is_empty() {
    let (mut world, _) = mixed_world(4);
    let mut calls = 0;
    world.query().for_each1::<Frozen>(|_| calls += 1);
    assert_eq!(calls, 0);
    assert!(!world.query().with::<Frozen>().exists());
}
