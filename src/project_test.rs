use super::*;
use image::Rgba;

use crate::canvas::TRANSPARENT;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn small_settings() -> EngineSettings {
    EngineSettings {
        default_width: 40,
        default_height: 30,
        ..EngineSettings::default()
    }
}

fn project() -> Project {
    let mut p = Project::new_untitled(1, &small_settings());
    p.fonts.registered_only = true;
    p
}

fn drag(p: &mut Project, from: (f32, f32), to: (f32, f32)) {
    p.pointer_down(PointerEvent::new(from.0, from.1));
    p.pointer_move(PointerEvent::new(to.0, to.1));
    p.pointer_up(PointerEvent::new(to.0, to.1));
}

// =============================================================
// Lifecycle
// =============================================================

#[test]
fn untitled_project_starts_clean() {
    let p = project();
    assert_eq!(p.name, "Untitled-1");
    assert_eq!((p.canvas().width, p.canvas().height), (40, 30));
    assert_eq!(p.canvas().len(), 1);
    assert_eq!(p.history().len(), 1);
    assert_eq!(p.history_buttons(), HistoryButtons::default());
    assert!(!p.is_dirty);
    assert_eq!(p.frame().width(), 40);
    assert!(p.frame().is_fully_transparent());
}

#[test]
fn settings_feed_tools_and_palette() {
    let mut settings = small_settings();
    settings.grid_step = 8;
    settings.max_undo_steps = 3;
    settings.swatches[4] = Rgba([1, 1, 1, 255]);
    let p = Project::new_untitled(2, &settings);
    assert_eq!(p.tools().config().grid_step, 8);
    assert_eq!(p.history().capacity(), 3);
    assert_eq!(p.palette.get(4), Some(Rgba([1, 1, 1, 255])));
}

#[test]
fn display_title_marks_unsaved_changes() {
    let mut p = project();
    assert_eq!(p.display_title(), "Untitled-1");
    p.add_layer(None);
    assert_eq!(p.display_title(), "Untitled-1*");
    p.mark_clean();
    assert_eq!(p.display_title(), "Untitled-1");
}

// =============================================================
// Drawing and history
// =============================================================

#[test]
fn stroke_updates_frame_and_undoes() {
    let mut p = project();
    p.apply_config(ConfigChange::Color(RED));
    drag(&mut p, (5.0, 10.0), (30.0, 10.0));

    assert!(p.is_dirty);
    assert_eq!(p.frame().get_pixel(15, 10), RED);
    assert!(p.history_buttons().can_undo);

    assert!(p.undo().applied);
    assert!(p.canvas().layers[0].pixels.is_fully_transparent());
    assert_eq!(p.frame().get_pixel(15, 10), TRANSPARENT);

    assert!(p.redo().applied);
    assert_eq!(p.frame().get_pixel(15, 10), RED);
}

#[test]
fn keyboard_drives_tools_and_history() {
    let mut p = project();
    assert_eq!(p.handle_key("g", false, false), Some(KeyAction::SelectTool(Tool::Fill)));
    assert_eq!(p.tools().tool(), Tool::Fill);

    p.pointer_down(PointerEvent::new(3.0, 3.0));
    p.pointer_up(PointerEvent::new(3.0, 3.0));
    assert_eq!(p.frame().get_pixel(39, 29)[3], 255);

    assert_eq!(p.handle_key("z", true, false), Some(KeyAction::Undo));
    assert!(p.frame().is_fully_transparent());
    assert_eq!(p.handle_key("q", false, false), None);
}

#[test]
fn shape_preview_lives_on_overlay() {
    let mut p = project();
    p.set_tool(Tool::Rect);
    p.pointer_down(PointerEvent::new(5.0, 5.0));
    p.pointer_move(PointerEvent::new(20.0, 20.0));
    assert!(!p.overlay().is_fully_transparent());
    assert!(p.frame().is_fully_transparent());
    p.pointer_leave(PointerEvent::new(20.0, 20.0));
    assert!(p.overlay().is_fully_transparent());
    assert!(!p.frame().is_fully_transparent());
}

#[test]
fn text_needs_a_font() {
    let mut p = project();
    p.set_tool(Tool::Text);
    drag(&mut p, (2.0, 2.0), (20.0, 20.0));
    assert!(p.tools().pending_text().is_some());
    assert!(p.commit_text("hello").is_empty());
    assert!(p.frame().is_fully_transparent());
    assert!(!p.cancel_text());
}

#[test]
fn swatches_and_saved_colour() {
    let mut p = project();
    assert!(p.pick_swatch(1));
    assert_eq!(p.tools().config().color, Rgba([255, 255, 255, 255]));
    assert!(!p.pick_swatch(6));

    p.apply_config(ConfigChange::Color(Rgba([9, 9, 9, 255])));
    p.save_color();
    assert_eq!(p.palette.get(0), Some(Rgba([9, 9, 9, 255])));
}

// =============================================================
// Layers
// =============================================================

#[test]
fn layer_commands_record_history() {
    let mut p = project();
    p.add_layer(Some("Ink".into()));
    assert_eq!(p.canvas().layers[1].name, "Ink");
    assert_eq!(p.duplicate_layer(1), Some(2));
    assert_eq!(p.canvas().layers[2].name, "Ink Copy");
    assert!(p.move_layer(2, MoveDirection::Down));
    assert!(p.delete_layer(0));
    assert_eq!(p.history().len(), 5);

    p.undo();
    assert_eq!(p.canvas().len(), 3);
}

#[test]
fn raising_top_layer_only_selects_it() {
    let mut p = project();
    p.add_layer(None);
    p.select_layer(0);
    let before = p.history().len();
    assert!(p.raise_to_top(1));
    assert_eq!(p.canvas().active_layer_index, 1);
    assert_eq!(p.history().len(), before);
}

#[test]
fn hidden_layer_leaves_frame() {
    let mut p = project();
    p.set_tool(Tool::Fill);
    p.pointer_down(PointerEvent::new(1.0, 1.0));
    p.pointer_up(PointerEvent::new(1.0, 1.0));
    assert!(!p.frame().is_fully_transparent());
    assert!(p.set_visibility(0, false));
    assert!(p.frame().is_fully_transparent());
}

#[test]
fn imported_image_goes_to_the_bottom() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dot.png");
    let mut img = RgbaImage::new(4, 3);
    for px in img.pixels_mut() {
        *px = RED;
    }
    img.save(&path).unwrap();

    let mut p = project();
    p.import_image_file(&path).unwrap();
    let canvas = p.canvas();
    assert_eq!(canvas.len(), 2);
    assert_eq!(canvas.layers[0].name, "dot.png");
    assert_eq!(canvas.active_layer_index, 0);
    assert_eq!(canvas.layers[0].pixels.width(), 40);
    let px = p.frame().get_pixel(20, 15);
    assert!(px[0] >= 250 && px[3] >= 250, "got {:?}", px);
}

#[test]
fn clear_canvas_is_undoable() {
    let mut p = project();
    drag(&mut p, (2.0, 2.0), (20.0, 2.0));
    p.clear_canvas();
    assert!(p.frame().is_fully_transparent());
    p.undo();
    assert!(!p.frame().is_fully_transparent());
}

#[test]
fn resize_reallocates_frame() {
    let mut p = project();
    assert!(p.resize(10, 12));
    assert_eq!((p.frame().width(), p.frame().height()), (10, 12));
    assert_eq!(p.overlay().height(), 12);
}

#[test]
fn out_of_range_resize_keeps_canvas() {
    let mut p = project();
    drag(&mut p, (2.0, 2.0), (20.0, 2.0));
    let before = p.canvas().layers[0].pixels.clone();
    let history_len = p.history().len();

    assert!(!p.resize(20_000, 20_000));
    assert!(!p.resize(0, 5));
    assert!(!p.resize_preserving(40_000, 1));

    assert_eq!((p.canvas().width, p.canvas().height), (40, 30));
    assert_eq!(p.canvas().layers[0].pixels, before);
    assert_eq!(p.frame().width(), 40);
    assert_eq!(p.history().len(), history_len);
}

#[test]
fn resize_finishes_drag_in_progress() {
    let mut p = project();
    p.set_tool(Tool::Line);
    p.pointer_down(PointerEvent::new(35.0, 25.0));
    p.pointer_move(PointerEvent::new(30.0, 25.0));
    let history_len = p.history().len();

    assert!(p.resize(20, 20));
    assert!(!p.tools().is_active());
    // The line was committed on the old canvas before reallocation
    assert_eq!(p.history().len(), history_len + 1);

    // A late release no longer draws anything
    assert!(p.pointer_up(PointerEvent::new(2.0, 2.0)).is_empty());
    assert!(p.canvas().layers[0].pixels.is_fully_transparent());
    assert!(p.overlay().is_fully_transparent());
}

#[test]
fn resize_drops_pending_text() {
    let mut p = project();
    p.set_tool(Tool::Text);
    drag(&mut p, (2.0, 2.0), (20.0, 10.0));
    assert!(p.tools().pending_text().is_some());
    assert!(p.resize_preserving(80, 60));
    assert!(p.tools().pending_text().is_none());
}

// =============================================================
// Persistence
// =============================================================

#[test]
fn rejected_record_keeps_current_stack() {
    let mut p = project();
    p.add_layer(None);
    let history_len = p.history().len();
    let bad = ProjectRecord { width: 0, height: 0, layers: Vec::new() };
    assert!(p.load_record(&bad).is_err());
    assert_eq!(p.canvas().len(), 2);
    assert_eq!(p.history().len(), history_len);
}

#[test]
fn record_round_trip_replaces_stack() {
    let mut source = project();
    source.add_layer(Some("Keep".into()));
    let record = source.to_record().unwrap();

    let mut target = project();
    let before = target.history().len();
    target.load_record(&record).unwrap();
    assert_eq!(target.canvas().len(), 2);
    assert_eq!(target.canvas().layers[1].name, "Keep");
    assert_eq!(target.history().len(), before + 1);
}

#[test]
fn save_requires_a_path() {
    let mut p = project();
    assert!(matches!(p.save(), Err(ProjectError::InvalidFormat(_))));
}

#[test]
fn save_as_then_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sketch.pcp");
    let mut p = project();
    p.add_layer(None);
    p.save_as(&path).unwrap();
    assert_eq!(p.name, "sketch.pcp");
    assert!(!p.is_dirty);
    p.save().unwrap();

    let opened = Project::open(&path, &small_settings()).unwrap();
    assert_eq!(opened.path.as_deref(), Some(path.as_path()));
    assert_eq!(opened.canvas().len(), 2);
}

#[test]
fn opening_raster_leaves_path_unset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pic.png");
    RgbaImage::new(5, 5).save(&path).unwrap();
    let opened = Project::open(&path, &small_settings()).unwrap();
    assert!(opened.path.is_none());
    assert_eq!(opened.name, "pic.png");
    assert_eq!(opened.canvas().width, 5);
}

#[test]
fn export_writes_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let p = project();
    let png = dir.path().join("flat.png");
    p.export_to(&png, ExportOptions::default()).unwrap();
    let img = io::load_image_file(&png).unwrap();
    assert_eq!(img.dimensions(), (40, 30));
    assert_eq!(img.get_pixel(0, 0)[0], 255);

    let gif = dir.path().join("flat.gif");
    assert!(matches!(
        p.export_to(&gif, ExportOptions::default()),
        Err(ProjectError::InvalidFormat(_))
    ));
}
