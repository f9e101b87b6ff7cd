use pagepane::pdf::{CoordinatorOptions, ScreenRect};
use pagepane::test_utils::test_helpers::*;
use pagepane::theme::OCEANIC_NEXT;
use pagepane::{App, run_app_with_event_source};

const PAGER_ROW: u16 = 11;

fn viewer(pages: usize) -> (App, ManualWorker) {
    let (coordinator, worker) =
        manual_coordinator(ScriptedEngine::with_pages(pages), CoordinatorOptions::new("three.pdf"));
    (App::new(coordinator, &OCEANIC_NEXT, "three.pdf"), worker)
}

fn settle_app(app: &mut App, worker: &mut ManualWorker) {
    app.poll_renders();
    while worker.serve_all() > 0 {
        app.poll_renders();
    }
}

fn snapshot(app: &mut App) -> String {
    let mut terminal = create_test_terminal(40, 12);
    terminal.draw(|f| app.draw(f)).unwrap();
    app.after_draw();
    capture_terminal_state(&terminal)
}

#[test]
fn loading_then_first_page_with_pager() {
    let (mut app, mut worker) = viewer(3);

    let screen = snapshot(&mut app);
    assert_eq!(screen.lines().next(), Some(format!("{:^40}", "Loading...").trim_end()));
    assert!(!screen.contains("Next"));

    settle_app(&mut app, &mut worker);
    let screen = snapshot(&mut app);
    let lines: Vec<&str> = screen.lines().collect();
    assert!(lines[0].contains("three.pdf"));
    assert_eq!(lines[PAGER_ROW as usize].trim(), "[ Previous ]  Page 1 / 3  [ Next ]");

    // 100x200 pt page at 8x16 px cells, shrunk to the 10 free rows
    assert_eq!(app.view.canvas_area(), ratatui::layout::Rect::new(15, 1, 10, 10));
    assert!(lines[1].contains('\u{2580}'));

    // The overlay covers exactly the painted cells
    let area = app.view.canvas_area();
    let painted = ScreenRect::new(
        f32::from(area.x) * 8.0,
        f32::from(area.y) * 16.0,
        f32::from(area.width) * 8.0,
        f32::from(area.height) * 16.0,
    );
    assert_eq!(app.view.surfaces.canvas.screen_rect(), painted);
    assert_eq!(app.view.surfaces.overlay.rect(), painted);
}

#[test]
fn clicking_next_and_previous_moves_one_page() {
    let (mut app, mut worker) = viewer(3);
    settle_app(&mut app, &mut worker);
    snapshot(&mut app);

    // [ Previous ] starts at column 3, [ Next ] at column 29
    app.handle_event(&pagepane::event_source::SimulatedEventSource::left_click(30, PAGER_ROW));
    settle_app(&mut app, &mut worker);
    let screen = snapshot(&mut app);
    assert!(screen.contains("Page 2 / 3"));
    assert_eq!(app.view.surfaces.canvas.rendered_page(), Some(2));

    app.handle_event(&pagepane::event_source::SimulatedEventSource::left_click(4, PAGER_ROW));
    app.handle_event(&pagepane::event_source::SimulatedEventSource::left_click(4, PAGER_ROW));
    settle_app(&mut app, &mut worker);
    assert_eq!(app.view.requested_page(), 1);
    assert_eq!(app.view.surfaces.canvas.rendered_page(), Some(1));
}

#[test]
fn text_overlay_is_drawn_when_toggled() {
    let (mut app, mut worker) = viewer(1);
    settle_app(&mut app, &mut worker);
    assert!(!snapshot(&mut app).contains("Page 1\n"));

    app.handle_event(&pagepane::event_source::SimulatedEventSource::char_key('t'));
    let screen = snapshot(&mut app);
    assert!(screen.lines().any(|line| line.contains("Page 1") && !line.contains('/')));
    assert!(screen.contains("Page 1 / 1"));
}

#[test]
fn event_loop_processes_navigation_until_quit() {
    let (mut app, mut worker) = viewer(3);
    settle_app(&mut app, &mut worker);

    let mut terminal = create_test_terminal(40, 12);
    let mut events = TestScenarioBuilder::new().next_page(2).quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.view.requested_page(), 3);
    assert_eq!(app.coordinator().requested_page(), 3);

    settle_app(&mut app, &mut worker);
    assert_eq!(app.view.surfaces.canvas.rendered_page(), Some(3));
    assert!(snapshot(&mut app).contains("Page 3 / 3"));
}

#[test]
fn open_failure_shows_error_and_no_pager() {
    let (coordinator, mut worker) = manual_coordinator(
        ScriptedEngine::with_pages(3).failing_open(),
        CoordinatorOptions::new("broken.pdf"),
    );
    let mut app = App::new(coordinator, &OCEANIC_NEXT, "broken.pdf");
    settle_app(&mut app, &mut worker);

    let screen = snapshot(&mut app);
    assert!(screen.contains("Failed to open document"));
    assert!(!screen.contains("Loading..."));
    assert!(!screen.contains("Previous"));
}
