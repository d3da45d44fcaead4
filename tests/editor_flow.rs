//! End-to-end editor session: place, drag, resize, layer, validate, export, save.

use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use std::sync::Arc;

use souvy::editor::bounds::SafeZone;
use souvy::editor::element::{ElementKind, ElementPatch};
use souvy::editor::interaction::{CanvasRect, DragMode, InteractionState, Point, PointerTarget};
use souvy::editor::layering::LayerDirection;
use souvy::editor::{EditorSession, ProductRef};
use souvy::render::context::RenderContext;
use souvy::render::fetch::StaticFetcher;
use souvy::render::text::FontRegistry;
use souvy::render::{Exporter, encode_png};
use souvy::{Customization, Tone};

const TUMBLER: &str = "https://shop.test/tumbler.png";
const LOGO: &str = "https://shop.test/logo.png";

fn exporter() -> Exporter {
    let base = encode_png(&RgbaImage::from_pixel(400, 400, Rgba([240, 240, 240, 255]))).unwrap();
    let logo = encode_png(&RgbaImage::from_pixel(16, 16, Rgba([0, 0, 200, 255]))).unwrap();
    let fetcher = StaticFetcher::new().with(TUMBLER, base).with(LOGO, logo);
    Exporter::new(RenderContext::new(Arc::new(fetcher), FontRegistry::new()))
}

fn product() -> ProductRef {
    ProductRef {
        name: "Steel Tumbler".to_string(),
        image_url: TUMBLER.to_string(),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test]
async fn test_full_editing_session() {
    let exporter = exporter();
    let canvas = CanvasRect::new(50.0, 20.0, 400.0, 400.0);
    let mut session = EditorSession::new(product());
    session.finish_analysis(SafeZone::FALLBACK);

    // Place a logo and a message
    let logo = session.add(ElementKind::Image, Some(LOGO));
    let message = session.add(ElementKind::Text, Some("For Robin"));
    assert_eq!(session.elements().len(), 2);
    assert_eq!(session.store().get(&message).unwrap().z_index, 1);
    assert_eq!(session.selected(), Some(&message));

    // Drag the logo, grabbed off-center, 12.5% up
    let grab = PointerTarget::Element {
        id: logo.clone(),
        mode: DragMode::Move,
    };
    session.pointer_down(&grab, Point::new(270.0, 230.0), &canvas);
    assert_eq!(session.selected(), Some(&logo));
    session.pointer_move(Point::new(270.0, 180.0), &canvas);
    session.pointer_leave();
    let el = session.store().get(&logo).unwrap();
    assert!(close(el.x, 50.0) && close(el.y, 37.5), "logo at ({}, {})", el.x, el.y);
    assert_eq!(session.interaction(), &InteractionState::Selected { id: logo.clone() });

    // Resize the message symmetrically: handle 24% right and 6% below center
    let handle = PointerTarget::Element {
        id: message.clone(),
        mode: DragMode::Resize,
    };
    session.pointer_down(&handle, Point::new(346.0, 244.0), &canvas);
    session.pointer_move(Point::new(346.0, 244.0), &canvas);
    session.pointer_up();
    let el = session.store().get(&message).unwrap();
    assert!(close(el.width, 48.0) && close(el.height, 12.0), "size {}x{}", el.width, el.height);
    assert!(close(el.x, 50.0) && close(el.y, 50.0));

    // Push the message off the printable area, then bring it back
    session.update(&message, &ElementPatch::position(80.0, 50.0));
    assert!(session.is_out_of_bound(&message));
    assert!(!session.is_out_of_bound(&logo));
    session.update(
        &message,
        &ElementPatch {
            y: Some(60.0),
            width: Some(30.0),
            x: Some(50.0),
            ..Default::default()
        },
    );
    assert!(!session.is_out_of_bound(&message));

    // Logo above the message
    session.reorder(&logo, LayerDirection::Up);
    let rows = session.layer_list();
    assert_eq!(rows[0].id, logo);
    assert_eq!(rows[1].id, message);

    // Export keeps the photo size and shows the logo at its new spot
    let result = session.export(&exporter).await;
    assert_eq!(result.dimensions(), Some((400, 400)));
    let img = image::load_from_memory(&result.into_png().unwrap()).unwrap().to_rgba8();
    assert_eq!(*img.get_pixel(200, 150), Rgba([0, 0, 200, 255]));
    assert_eq!(*img.get_pixel(10, 10), Rgba([240, 240, 240, 255]));

    // Save hands over everything
    session.set_recipient("Robin");
    session.set_tone(Tone::Romantic);
    let saved = session.save(&exporter).await;
    assert_eq!(saved.elements.len(), 2);
    assert_eq!(saved.recipient_name, "Robin");
    assert_eq!(saved.tone, Tone::Romantic);
    assert!(saved.preview_image.is_some());

    // The saved value survives a JSON round trip and reopens the same design
    let json = serde_json::to_string(&saved).unwrap();
    let restored: Customization = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, saved);
    let reopened = EditorSession::seeded(product(), restored);
    assert_eq!(reopened.elements(), saved.elements.as_slice());
    assert_eq!(reopened.creative().recipient_name, "Robin");
}

#[tokio::test]
async fn test_unknown_ids_never_disturb_the_design() {
    let mut session = EditorSession::new(product());
    let only = session.add(ElementKind::Text, None);
    let before = session.elements().to_vec();

    let ghost = "missing".into();
    session.update(&ghost, &ElementPatch::size(90.0, 90.0));
    session.reorder(&ghost, LayerDirection::Top);
    session.remove(&ghost);
    session.pointer_down(
        &PointerTarget::Element {
            id: ghost,
            mode: DragMode::Move,
        },
        Point::new(0.0, 0.0),
        &CanvasRect::new(0.0, 0.0, 100.0, 100.0),
    );

    assert_eq!(session.elements(), before.as_slice());
    assert_eq!(session.selected(), Some(&only));
}

#[tokio::test]
async fn test_export_fails_empty_without_product_photo() {
    let exporter = Exporter::new(RenderContext::empty());
    let mut session = EditorSession::new(product());
    session.add(ElementKind::Text, Some("Hi"));
    assert!(session.export(&exporter).await.is_empty());
}
