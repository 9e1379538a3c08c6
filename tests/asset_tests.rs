//! Asset Loading Tests
//!
//! Tests for:
//! - TextureLoad: decode on a worker thread, flip, missing files
//! - LoadGroup barriers: pre → (must, sub) ordering, one completion each
//! - Failed loads count towards completion
//! - Uploading loaded textures through a backend

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use glam::Vec4;

use afterglow::assets::{AssetEvent, AssetLoader, LoadGroupKind, LoadStatus, TextureLoad};
use afterglow::errors::AfterglowError;
use afterglow::renderer::backend::software::SoftwareBackend;
use afterglow::resources::texture::{ColorSpace, TextureParams};

const TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Helpers
// ============================================================================

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("afterglow-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 2×2 PNG: red top row, blue bottom row.
fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let image = image::RgbaImage::from_fn(2, 2, |_, y| {
        if y == 0 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        }
    });
    image.save(&path).unwrap();
    path
}

fn poll_until_loaded(loader: &mut AssetLoader) -> Vec<AssetEvent> {
    let deadline = Instant::now() + TIMEOUT;
    let mut events = Vec::new();
    while !loader.is_loaded() {
        assert!(Instant::now() < deadline, "loader timed out: {events:?}");
        events.extend(loader.poll());
        std::thread::sleep(Duration::from_millis(2));
    }
    events
}

fn position(events: &[AssetEvent], wanted: &AssetEvent) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in {events:?}"))
}

// ============================================================================
// TextureLoad
// ============================================================================

#[test]
fn spawned_load_decodes_and_flips() {
    let dir = scratch_dir("texture-load");
    let path = write_png(&dir, "stripes.png");

    let plain = TextureLoad::spawn(path.clone(), TextureParams::new())
        .wait()
        .unwrap();
    assert_eq!((plain.width(), plain.height()), (2, 2));
    assert_eq!(plain.texel(0, 0), Vec4::new(1.0, 0.0, 0.0, 1.0));

    let flipped = TextureLoad::spawn(path, TextureParams::new().with_flip_y(true))
        .wait()
        .unwrap();
    assert_eq!(flipped.texel(0, 0), Vec4::new(0.0, 0.0, 1.0, 1.0));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_file_fails_without_panicking() {
    let mut load = TextureLoad::spawn(
        PathBuf::from("/definitely/not/here.png"),
        TextureParams::smaa_search(),
    );
    let deadline = Instant::now() + TIMEOUT;
    loop {
        match load.poll() {
            LoadStatus::Pending => {
                assert!(Instant::now() < deadline);
                std::thread::sleep(Duration::from_millis(2));
            }
            LoadStatus::Ready(_) => panic!("missing file decoded"),
            LoadStatus::Failed(err) => {
                assert!(matches!(err, AfterglowError::IoError(_)));
                break;
            }
        }
    }
    // Terminal: the worker is gone.
    assert!(matches!(
        load.poll(),
        LoadStatus::Failed(AfterglowError::LoadDisconnected)
    ));
}

// ============================================================================
// Load groups
// ============================================================================

#[test]
fn groups_complete_in_barrier_order() {
    let dir = scratch_dir("groups");
    let logo = write_png(&dir, "logo.png");
    let area = write_png(&dir, "area.png");
    let extra = write_png(&dir, "extra.png");

    let mut loader = AssetLoader::new();
    loader.add(LoadGroupKind::Pre, "logo", logo, TextureParams::new());
    loader.add(LoadGroupKind::Must, "area", area, TextureParams::smaa_area());
    loader.add(LoadGroupKind::Sub, "extra", extra, TextureParams::new());

    // Nothing moves before start.
    assert!(loader.poll().is_empty());
    assert!(!loader.group(LoadGroupKind::Must).is_started());

    loader.start();
    let events = poll_until_loaded(&mut loader);

    let pre_done = position(&events, &AssetEvent::GroupComplete(LoadGroupKind::Pre));
    let area_loaded = position(
        &events,
        &AssetEvent::TextureLoaded {
            group: LoadGroupKind::Must,
            name: "area".into(),
        },
    );
    let must_done = position(&events, &AssetEvent::GroupComplete(LoadGroupKind::Must));
    assert!(pre_done < area_loaded);
    assert!(area_loaded < must_done);
    assert!(
        events
            .iter()
            .filter(|e| matches!(e, AssetEvent::TextureLoaded { group: LoadGroupKind::Sub, .. }))
            .all(|e| position(&events, e) > pre_done)
    );

    // Completion fires once per group.
    let mut late = Vec::new();
    let deadline = Instant::now() + TIMEOUT;
    while !loader.group(LoadGroupKind::Sub).is_complete() {
        assert!(Instant::now() < deadline);
        late.extend(loader.poll());
        std::thread::sleep(Duration::from_millis(2));
    }
    late.extend(loader.poll());
    late.extend(loader.poll());
    let all: Vec<_> = events.iter().chain(&late).collect();
    for kind in [LoadGroupKind::Pre, LoadGroupKind::Must, LoadGroupKind::Sub] {
        let count = all
            .iter()
            .filter(|e| ***e == AssetEvent::GroupComplete(kind))
            .count();
        assert_eq!(count, 1, "{kind:?}");
    }

    assert_eq!(loader.texture_names(), ["area", "extra", "logo"]);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn empty_groups_complete_immediately() {
    let mut loader = AssetLoader::new();
    loader.start();
    let events = loader.poll();
    assert!(loader.is_loaded());
    assert_eq!(
        events,
        [
            AssetEvent::GroupComplete(LoadGroupKind::Pre),
            AssetEvent::GroupComplete(LoadGroupKind::Sub),
            AssetEvent::GroupComplete(LoadGroupKind::Must),
        ]
    );
}

#[test]
fn failures_still_complete_the_group() {
    let mut loader = AssetLoader::new();
    loader.add(
        LoadGroupKind::Must,
        "search",
        "/definitely/not/search.png",
        TextureParams::smaa_search(),
    );
    loader.start();
    let events = poll_until_loaded(&mut loader);

    assert!(events.iter().any(|e| matches!(
        e,
        AssetEvent::TextureFailed { group: LoadGroupKind::Must, name, .. } if name == "search"
    )));
    assert_eq!(loader.group(LoadGroupKind::Must).progress(), (1, 1));
    assert!(loader.texture("search").is_none());
}

#[test]
fn late_additions_to_completed_groups_are_ignored() {
    let mut loader = AssetLoader::new();
    loader.start();
    loader.poll();
    loader.add(LoadGroupKind::Pre, "late", "late.png", TextureParams::new());
    assert_eq!(loader.group(LoadGroupKind::Pre).progress(), (0, 0));
}

// ============================================================================
// Upload
// ============================================================================

#[test]
fn loaded_texture_uploads_with_its_params() {
    let dir = scratch_dir("upload");
    let path = write_png(&dir, "albedo.png");

    let mut loader = AssetLoader::new();
    loader.add(
        LoadGroupKind::Must,
        "albedo",
        path,
        TextureParams::new().with_color_space(ColorSpace::Srgb),
    );
    loader.start();
    poll_until_loaded(&mut loader);

    let mut backend = SoftwareBackend::new(1, 1);
    let id = loader.upload(&mut backend, "albedo").unwrap();
    let pixels = backend.texture_pixels(id).unwrap();
    assert_eq!(pixels.size(), (2, 2));
    // sRGB 1.0 and 0.0 are fixed points of the linear conversion.
    assert_eq!(pixels.get(0, 0), Vec4::new(1.0, 0.0, 0.0, 1.0));

    assert!(loader.upload(&mut backend, "unknown").is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}
