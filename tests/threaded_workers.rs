use std::thread;
use std::time::{Duration, Instant};

use pagepane::pdf::{CoordinatorOptions, LoadStatus, RenderCoordinator, Surfaces};
use pagepane::test_utils::test_helpers::ScriptedEngine;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Polls until `done` holds or the timeout expires
fn poll_until(
    coordinator: &mut RenderCoordinator,
    surfaces: &mut Surfaces,
    done: impl Fn(&RenderCoordinator, &Surfaces) -> bool,
) {
    let started = Instant::now();
    while !done(coordinator, surfaces) {
        assert!(started.elapsed() < TIMEOUT, "coordinator did not settle");
        coordinator.poll(surfaces);
        thread::sleep(Duration::from_millis(2));
    }
}

fn settled_on(page: usize) -> impl Fn(&RenderCoordinator, &Surfaces) -> bool {
    move |coordinator, surfaces| {
        surfaces.canvas.rendered_page() == Some(page)
            && coordinator.render_in_flight().is_none()
            && surfaces.overlay.page() == Some(page)
    }
}

#[test]
fn spawned_workers_settle_on_the_last_requested_page() {
    let engine = ScriptedEngine::with_pages(5);
    let mut options = CoordinatorOptions::new("five.pdf");
    options.workers = 3;
    let mut coordinator = RenderCoordinator::spawn(engine.clone(), options);
    let mut surfaces = Surfaces::new();

    poll_until(&mut coordinator, &mut surfaces, settled_on(1));
    assert_eq!(coordinator.status(), &LoadStatus::Ready);

    for page in [2, 3, 4, 5, 4] {
        coordinator.set_page(page);
        coordinator.poll(&mut surfaces);
    }
    poll_until(&mut coordinator, &mut surfaces, settled_on(4));

    assert_eq!(coordinator.page().map(|page| page.index), Some(4));
    assert_eq!(engine.rendered_pages().last(), Some(&4));
    assert_eq!(engine.opened_sources().first().map(String::as_str), Some("five.pdf"));
}

#[test]
fn dropping_the_coordinator_stops_workers() {
    let engine = ScriptedEngine::with_pages(1);
    let mut coordinator = RenderCoordinator::spawn(engine.clone(), CoordinatorOptions::new("one.pdf"));
    let mut surfaces = Surfaces::new();
    poll_until(&mut coordinator, &mut surfaces, settled_on(1));

    drop(coordinator);
    // Workers exit on Shutdown; give them a moment and make sure nothing panicked
    thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.rendered_pages(), vec![1]);
}
