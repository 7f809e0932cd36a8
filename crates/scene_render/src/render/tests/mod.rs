//! Scenario tests spanning several render components

use std::sync::{Arc, RwLock};

use approx::assert_relative_eq;

use crate::ecs::components::{
    Capabilities, DrawableInfo, Image, Rotate, Scale, Sprite, TextureId, Translate,
};
use crate::ecs::Entity;
use crate::events::SceneEvent;
use crate::foundation::logging;
use crate::foundation::math::{Mat4Ext, Point2};
use crate::foundation::time::FrameContext;
use crate::render::batch_renderer::RenderPipeline;
use crate::render::layer::{RenderLayer, Resolution};
use crate::render::renderer::ShaderId;
use crate::render::viewport::Viewport;
use crate::scene::Scene;

fn sprite(scene: &mut Scene, id: &str, x: f32, y: f32) -> Entity {
    scene
        .spawn(
            id,
            Capabilities::default()
                .with_scale(Scale::from_size(10.0, 10.0))
                .with_translate(Translate::new(x, y))
                .with_image(Image::default().with_sprite(Sprite::from_texture(TextureId(1)))),
        )
        .unwrap()
}

fn in_room(scene: &mut Scene, entities: &[Entity]) {
    let entities = entities.to_vec();
    scene.update_room(|room| room.objects = entities);
}

#[test]
fn test_batch_count_is_alternations_plus_one() {
    let mut scene = Scene::default();
    let entities: Vec<Entity> = (0..5)
        .map(|i| {
            let e = sprite(&mut scene, &format!("e{i}"), 0.0, 50.0 - 10.0 * i as f32);
            let shader = ShaderId(1 + (i % 2) as u32);
            scene
                .update(e, |caps| caps.drawable = Some(DrawableInfo::default().with_shader(shader)))
                .unwrap();
            e
        })
        .collect();
    in_room(&mut scene, &entities);

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    assert_eq!(output[0].batches.len(), 5);
    assert_eq!(pipeline.stats().state_changes, 4);
}

#[test]
fn test_uniform_display_list_is_one_batch() {
    let mut scene = Scene::default();
    let entities: Vec<Entity> = (0..6)
        .map(|i| sprite(&mut scene, &format!("e{i}"), i as f32, i as f32))
        .collect();
    in_room(&mut scene, &entities);

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    assert_eq!(output[0].batches.len(), 1);
    assert_eq!(output[0].batches[0].instruction_count(), 6);
    assert_eq!(pipeline.stats().avg_instructions_per_batch(), 6.0);
}

#[test]
fn test_layer_resolution_splits_batches() {
    let mut scene = Scene::default();
    let hires = scene.add_layer(RenderLayer::new(0).with_resolution(Resolution::new(640, 400)));
    let a = sprite(&mut scene, "a", 0.0, 30.0);
    let b = sprite(&mut scene, "b", 0.0, 20.0);
    let c = sprite(&mut scene, "c", 0.0, 10.0);
    scene
        .update(b, |caps| caps.drawable = Some(DrawableInfo::on_layer(hires)))
        .unwrap();
    in_room(&mut scene, &[a, b, c]);

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    let resolutions: Vec<Resolution> = output[0].batches.iter().map(|b| b.resolution()).collect();
    assert_eq!(
        resolutions,
        vec![Resolution::new(320, 200), Resolution::new(640, 400), Resolution::new(320, 200)]
    );
    // The hi-res quad is expressed in the layer's own resolution
    let quad = output[0].batches[1].instructions()[0].vertices;
    assert_relative_eq!(quad[3].position[0], 20.0, epsilon = 1e-4);
    assert_relative_eq!(quad[3].position[1], 60.0, epsilon = 1e-4);
}

#[test]
fn test_bulk_update_notifies_once() {
    let mut scene = Scene::default();
    let e = sprite(&mut scene, "e", 0.0, 0.0);
    scene.model_matrices(e);
    scene.take_events();

    scene
        .bulk_update(&[e], |world| {
            world.update(e, |caps| caps.translate = Some(Translate::new(10.0, 0.0)))?;
            world.update(e, |caps| caps.translate = Some(Translate::new(20.0, 0.0)))?;
            world.update(e, |caps| caps.rotate = Some(Rotate { angle: 90.0 }))
        })
        .unwrap();

    let events = scene.take_events();
    let matrix_events = events
        .iter()
        .filter(|event| **event == SceneEvent::ModelMatrixChanged(e))
        .count();
    assert_eq!(matrix_events, 1);

    let moved = scene.model_matrices(e).in_virtual_resolution.transform_point_2d(Point2::origin());
    assert_relative_eq!(moved.x, 20.0, epsilon = 1e-4);
}

#[test]
fn test_locked_reads_return_snapshot() {
    let mut scene = Scene::default();
    let parent = sprite(&mut scene, "parent", 0.0, 0.0);
    let child = sprite(&mut scene, "child", 5.0, 0.0);
    scene.set_parent(child, Some(parent)).unwrap();
    let before = scene.model_matrices(parent);
    let before_box = scene.hit_test_box(parent).unwrap();

    scene.lock(parent).unwrap();
    scene
        .update(parent, |caps| caps.translate = Some(Translate::new(100.0, 0.0)))
        .unwrap();
    assert_eq!(scene.model_matrices(parent), before);
    assert_eq!(scene.hit_test_box(parent), Some(before_box));

    scene.prepare_for_unlock(parent).unwrap();
    assert_eq!(scene.model_matrices(parent), before);

    scene.take_events();
    scene.unlock(parent).unwrap();
    let events = scene.take_events();
    assert!(events.contains(&SceneEvent::ModelMatrixChanged(parent)));
    // The deferred notification reaches the subtree
    assert!(events.contains(&SceneEvent::ModelMatrixChanged(child)));

    let origin = scene
        .model_matrices(child)
        .in_virtual_resolution
        .transform_point_2d(Point2::origin());
    assert_relative_eq!(origin.x, 105.0, epsilon = 1e-4);
    assert_relative_eq!(scene.hit_test_box(parent).unwrap().bottom_left.x, 100.0, epsilon = 1e-4);
}

#[test]
fn test_nested_locks_publish_once_on_last_unlock() {
    let mut scene = Scene::default();
    let e = sprite(&mut scene, "e", 0.0, 0.0);
    let before = scene.model_matrices(e);
    scene.take_events();

    scene.lock(e).unwrap();
    scene.lock(e).unwrap();
    scene.lock(e).unwrap();
    scene
        .update(e, |caps| caps.translate = Some(Translate::new(10.0, 0.0)))
        .unwrap();
    assert_eq!(scene.model_matrices(e), before);
    scene
        .update(e, |caps| caps.translate = Some(Translate::new(30.0, 0.0)))
        .unwrap();
    assert_eq!(scene.model_matrices(e), before);

    scene.unlock(e).unwrap();
    assert_eq!(scene.model_matrices(e), before);
    scene.unlock(e).unwrap();
    assert_eq!(scene.model_matrices(e), before);
    scene.unlock(e).unwrap();

    let events = scene.take_events();
    let matrix_events = events
        .iter()
        .filter(|event| **event == SceneEvent::ModelMatrixChanged(e))
        .count();
    assert_eq!(matrix_events, 1);
    let moved = scene.model_matrices(e).in_virtual_resolution.transform_point_2d(Point2::origin());
    assert_relative_eq!(moved.x, 30.0, epsilon = 1e-4);
}

#[test]
fn test_quad_round_trip_through_inverse() {
    let mut scene = Scene::default();
    let e = scene
        .spawn(
            "e",
            Capabilities::default()
                .with_scale(Scale::from_size(8.0, 4.0).with_scale(2.0, 3.0))
                .with_translate(Translate::new(40.0, 25.0))
                .with_rotate(Rotate { angle: 30.0 })
                .with_image(Image::with_pivot(0.5, 0.5)),
        )
        .unwrap();

    let matrix = scene.model_matrices(e).in_virtual_resolution;
    let inverse = matrix.try_inverse().unwrap();
    let quad = scene.hit_test_box(e).unwrap();
    let mut local: Vec<(f32, f32)> = quad
        .corners()
        .iter()
        .map(|&corner| {
            let p = inverse.transform_point_2d(corner);
            ((p.x * 100.0).round() / 100.0, (p.y * 100.0).round() / 100.0)
        })
        .collect();
    local.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(local, vec![(0.0, 0.0), (0.0, 4.0), (8.0, 0.0), (8.0, 4.0)]);

    // The pivot lands on the translation
    let center = matrix.transform_point_2d(Point2::new(4.0, 2.0));
    assert_relative_eq!(center.x, 40.0, epsilon = 1e-4);
    assert_relative_eq!(center.y, 25.0, epsilon = 1e-4);
}

#[test]
fn test_parent_child_render_quad() {
    let mut scene = Scene::default();
    let parent = sprite(&mut scene, "parent", 100.0, 50.0);
    let child = sprite(&mut scene, "child", 50.0, 50.0);
    scene.set_parent(child, Some(parent)).unwrap();
    in_room(&mut scene, &[parent]);

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    let instructions = output[0].batches[0].instructions();
    assert_eq!(instructions.len(), 2);
    assert_eq!(instructions[0].entity, parent);
    assert_eq!(instructions[1].entity, child);
    assert_eq!(instructions[1].vertices[0].position, [150.0, 100.0]);
}

#[test]
fn test_child_box_offset_by_parent() {
    let mut scene = Scene::default();
    let parent = sprite(&mut scene, "parent", 50.0, 50.0);
    let child = scene
        .spawn(
            "child",
            Capabilities::default()
                .with_scale(Scale::from_size(100.0, 50.0))
                .with_translate(Translate::new(0.0, 0.0)),
        )
        .unwrap();
    scene.set_parent(child, Some(parent)).unwrap();

    let hit = scene.hit_test_box(child).unwrap();
    assert_relative_eq!(hit.bottom_left.x, 50.0, epsilon = 1e-4);
    assert_relative_eq!(hit.bottom_left.y, 50.0, epsilon = 1e-4);
    assert_relative_eq!(hit.top_right.x, 150.0, epsilon = 1e-4);
    assert_relative_eq!(hit.top_right.y, 100.0, epsilon = 1e-4);

    let main = scene.main_viewport();
    let render = scene.bounding_boxes(child, main).unwrap().render;
    assert_relative_eq!(render.bottom_left.x, 50.0, epsilon = 1e-4);
    assert_relative_eq!(render.bottom_left.y, 50.0, epsilon = 1e-4);
    assert_relative_eq!(render.top_right.x, 150.0, epsilon = 1e-4);
    assert_relative_eq!(render.top_right.y, 100.0, epsilon = 1e-4);
}

#[test]
fn test_cursor_batch_only_on_main_viewport() {
    let mut scene = Scene::default();
    let item = sprite(&mut scene, "item", 0.0, 0.0);
    let cursor = sprite(&mut scene, "cursor", 0.0, 0.0);
    in_room(&mut scene, &[item]);
    scene.set_cursor(Some(cursor)).unwrap();
    scene.set_mouse_position(Point2::new(30.0, 40.0));
    let minimap = scene.add_viewport(Viewport::default());

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    assert_eq!(output.len(), 2);

    let main = output.iter().find(|o| o.viewport == scene.main_viewport()).unwrap();
    assert_eq!(main.batches.len(), 2);
    let cursor_batch = main.batches.last().unwrap();
    assert_eq!(cursor_batch.instructions()[0].entity, cursor);
    assert_eq!(cursor_batch.instructions()[0].vertices[0].position, [30.0, 40.0]);

    let other = output.iter().find(|o| o.viewport == minimap).unwrap();
    assert_eq!(other.batches.len(), 1);
    assert!(other.batches[0].instructions().iter().all(|i| i.entity != cursor));
}

#[test]
fn test_cursor_follows_mouse_under_panned_camera() {
    let mut scene = Scene::default();
    let item = sprite(&mut scene, "item", 150.0, 0.0);
    let cursor = sprite(&mut scene, "cursor", 0.0, 0.0);
    in_room(&mut scene, &[item]);
    scene.set_cursor(Some(cursor)).unwrap();
    scene.set_mouse_position(Point2::new(30.0, 40.0));
    let main = scene.main_viewport();
    scene.update_viewport(main, |v| v.x = 100.0).unwrap();

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_frame(&mut scene, &FrameContext::new());
    let batches = &output[0].batches;
    // The room item moves with the camera, the cursor does not
    assert_eq!(batches[0].instructions()[0].vertices[0].position, [50.0, 0.0]);
    let cursor_batch = batches.last().unwrap();
    assert_eq!(cursor_batch.instructions()[0].entity, cursor);
    assert_eq!(cursor_batch.instructions()[0].vertices[0].position, [30.0, 40.0]);
}

#[test]
fn test_shared_scene_contention_reuses_previous_batches() {
    logging::init_for_tests();
    let mut scene = Scene::default();
    let item = sprite(&mut scene, "item", 0.0, 0.0);
    in_room(&mut scene, &[item]);
    let shared = scene.into_shared();

    let mut pipeline = RenderPipeline::new();
    let frame = FrameContext::new();
    let first = pipeline.render_shared(&shared, &frame);
    assert_eq!(first.len(), 1);
    assert_eq!(pipeline.stats().skipped_viewports, 0);

    {
        let _reader = shared.read().unwrap();
        let second = pipeline.render_shared(&shared, &frame);
        assert_eq!(second, first);
        assert_eq!(pipeline.stats().skipped_viewports, 1);
    }
    {
        let _writer = shared.write().unwrap();
        let third = pipeline.render_shared(&shared, &frame);
        assert_eq!(third, first);
        assert_eq!(pipeline.stats().skipped_viewports, 1);
    }

    let fourth = pipeline.render_shared(&shared, &frame);
    assert_eq!(fourth, first);
    assert_eq!(pipeline.stats().skipped_viewports, 0);
}

#[test]
fn test_poisoned_scene_is_recovered() {
    logging::init_for_tests();
    let mut scene = Scene::default();
    let item = sprite(&mut scene, "item", 0.0, 0.0);
    in_room(&mut scene, &[item]);
    let shared: Arc<RwLock<Scene>> = scene.into_shared();

    let poisoner = Arc::clone(&shared);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.write().unwrap();
        panic!("worker failed while holding the scene");
    })
    .join();
    assert!(shared.is_poisoned());

    let mut pipeline = RenderPipeline::new();
    let output = pipeline.render_shared(&shared, &FrameContext::new());
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].batches[0].instruction_count(), 1);
}
