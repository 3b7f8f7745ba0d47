use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facemark_core::{
    normalize_buffer, resample, CropRegion, DisplayFrame, FileSource, FixedDetector, MappedRect,
    NormalizedBox, Overlay, SourceImage,
};
use facemark_session::{spawn_detector, Config, ImageId, Session};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod compose;

#[derive(Parser)]
#[command(name = "facemark", about = "Draw detected face boxes over photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Present an image, replay detector boxes, and write the overlay and thumbnails
    Annotate {
        /// Image file (JPEG, PNG, ...)
        image: PathBuf,
        /// JSON array of normalized boxes with a bottom-left origin
        #[arg(short, long)]
        boxes: Option<PathBuf>,
        /// Write the composited view to this PNG
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Directory for face thumbnails
        #[arg(long)]
        thumbs: Option<PathBuf>,
        /// Longest side of the displayed copy
        #[arg(long)]
        max_dimension: Option<u32>,
        /// View size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_view_size)]
        view: Option<(f32, f32)>,
    },
    /// Print orientation, sizes and display fit for an image
    Inspect {
        image: PathBuf,
        #[arg(long, value_parser = parse_view_size)]
        view: Option<(f32, f32)>,
    },
}

#[derive(Serialize)]
struct FaceReport {
    bbox: NormalizedBox,
    rect: MappedRect,
    crop: CropRegion,
    clamped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<PathBuf>,
}

#[derive(Serialize)]
struct AnnotateReport<'a> {
    image: ImageId,
    original: (u32, u32),
    display: (u32, u32),
    frame: DisplayFrame,
    overlay: &'a Overlay,
    faces: Vec<FaceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detection_error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Annotate {
            image,
            boxes,
            out,
            thumbs,
            max_dimension,
            view,
        } => {
            if let Some(bound) = max_dimension {
                config.max_dimension = bound;
            }
            apply_view(&mut config, view);
            let boxes = match boxes {
                Some(path) => load_boxes(&path)?,
                None => Vec::new(),
            };
            annotate(&config, &image, boxes, out.as_deref(), thumbs.as_deref()).await?;
        }
        Commands::Inspect { image, view } => {
            apply_view(&mut config, view);
            inspect(&config, &image)?;
        }
    }

    Ok(())
}

async fn annotate(
    config: &Config,
    image: &Path,
    boxes: Vec<NormalizedBox>,
    out: Option<&Path>,
    thumbs: Option<&Path>,
) -> Result<()> {
    let detector = spawn_detector(Box::new(FixedDetector::new(boxes)), config.detector_queue_depth)?;
    let mut session = Session::new(detector, config);

    let mut source = FileSource::new(image);
    let shown = session
        .acquire_from(&mut source)
        .with_context(|| format!("failed to present {}", image.display()))?
        .context("no image acquired")?
        .clone();
    let update = session
        .next_update()
        .await
        .context("detector stopped before returning a result")?;

    if let Some(dir) = thumbs {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut faces = Vec::with_capacity(update.thumbnails.len());
    for (index, face) in update.thumbnails.iter().enumerate() {
        let thumbnail = match thumbs {
            Some(dir) => {
                let path = dir.join(format!("face-{index}.png"));
                face.crop
                    .buffer
                    .to_dynamic()
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Some(path)
            }
            None => None,
        };
        faces.push(FaceReport {
            bbox: face.bbox,
            rect: face.rect,
            crop: face.crop.region,
            clamped: face.crop.out_of_bounds.is_some(),
            thumbnail,
        });
    }

    if let Some(path) = out {
        compose::compose(&shown.display, &shown.frame, &update.overlay)
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote overlay image");
    }

    let report = AnnotateReport {
        image: shown.id,
        original: shown.original.dimensions(),
        display: shown.display.dimensions(),
        frame: shown.frame,
        overlay: &update.overlay,
        faces,
        notice: update.overlay.is_empty().then_some("No faces found"),
        detection_error: update.detection_error.as_ref().map(ToString::to_string),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn inspect(config: &Config, image: &Path) -> Result<()> {
    let (buffer, orientation) = SourceImage::from_path(image)?.decode()?;
    let stored = buffer.dimensions();
    let upright = normalize_buffer(buffer, orientation);
    let display = resample(&upright, config.max_dimension)?;
    let frame = DisplayFrame::aspect_fit(config.view_rect(), display.width(), display.height())?;

    let report = serde_json::json!({
        "path": image,
        "orientation": orientation,
        "exif_orientation": orientation.to_exif(),
        "stored": stored,
        "upright": upright.dimensions(),
        "display": display.dimensions(),
        "format": format!("{:?}", upright.format()),
        "bits_per_pixel": upright.bits_per_pixel(),
        "color_space": format!("{:?}", upright.color_space()),
        "frame": frame,
        "content_rect": frame.content_rect(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn apply_view(config: &mut Config, view: Option<(f32, f32)>) {
    if let Some((width, height)) = view {
        config.view.width = width;
        config.view.height = height;
    }
}

fn load_boxes(path: &Path) -> Result<Vec<NormalizedBox>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let boxes: Vec<NormalizedBox> = serde_json::from_str(&text)
        .with_context(|| format!("invalid box list in {}", path.display()))?;
    for bbox in boxes.iter().filter(|b| !b.is_within_unit()) {
        tracing::warn!(?bbox, "box extends outside the unit square");
    }
    Ok(boxes)
}

fn parse_view_size(text: &str) -> Result<(f32, f32), String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f32>()
            .ok()
            .filter(|v| *v > 0.0 && v.is_finite())
            .ok_or_else(|| format!("invalid view dimension {s:?}"))
    };
    Ok((parse(w)?, parse(h)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_size() {
        assert_eq!(parse_view_size("640x480"), Ok((640.0, 480.0)));
        assert_eq!(parse_view_size("375X667"), Ok((375.0, 667.0)));
        assert!(parse_view_size("640").is_err());
        assert!(parse_view_size("0x480").is_err());
        assert!(parse_view_size("wide x tall").is_err());
    }

    #[test]
    fn test_load_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.json");
        std::fs::write(
            &path,
            r#"[{"x": 0.25, "y": 0.25, "width": 0.5, "height": 0.5}, {"x": 0.9, "y": 0.0, "width": 0.3, "height": 0.1}]"#,
        )
        .unwrap();

        let boxes = load_boxes(&path).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0], NormalizedBox::new(0.25, 0.25, 0.5, 0.5));
        assert!(!boxes[1].is_within_unit());
    }

    #[test]
    fn test_load_boxes_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.json");
        std::fs::write(&path, "{\"faces\": 3}").unwrap();
        assert!(load_boxes(&path).is_err());
    }

    #[tokio::test]
    async fn test_annotate_writes_overlay_and_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("photo.png");
        image::RgbImage::from_pixel(200, 100, image::Rgb([120, 80, 40]))
            .save(&image_path)
            .unwrap();
        let out = dir.path().join("overlay.png");
        let thumbs = dir.path().join("thumbs");

        let boxes = vec![NormalizedBox::new(0.25, 0.25, 0.5, 0.5)];
        annotate(&Config::default(), &image_path, boxes, Some(&out), Some(&thumbs))
            .await
            .unwrap();

        let overlay = image::open(&out).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (640, 480));
        let thumb = image::open(thumbs.join("face-0.png")).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 50));
    }

    #[test]
    fn test_inspect_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("photo.png");
        image::RgbImage::new(30, 20).save(&image_path).unwrap();
        inspect(&Config::default(), &image_path).unwrap();
    }
}
