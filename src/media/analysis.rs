use std::io::Cursor;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbImage};
use serde_json::{json, Value};

use crate::db::models::JsonMap;

const PALETTE_SIZE: usize = 5;
const THUMBNAIL_EDGE: u32 = 150;
const MAX_KMEANS_ITERATIONS: usize = 25;
const HIGH_RESOLUTION_EDGE: u32 = 1920;

/// What an uploaded image contributes to its reference material row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnalysis {
    pub color_analysis: JsonMap,
    pub style_analysis: JsonMap,
    pub content_tags: Vec<String>,
}

fn error_map(err: &anyhow::Error) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("error".to_string(), Value::String(format!("{err:#}")));
    map
}

fn decode(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to read image header")?;
    let format = reader.format();
    let image = reader.decode().context("failed to decode image")?;
    Ok((image, format))
}

fn format_name(format: Option<ImageFormat>) -> Value {
    let name = match format {
        Some(ImageFormat::Png) => "PNG",
        Some(ImageFormat::Jpeg) => "JPEG",
        Some(ImageFormat::Gif) => "GIF",
        Some(ImageFormat::WebP) => "WEBP",
        Some(other) => return Value::String(format!("{other:?}").to_uppercase()),
        None => return Value::Null,
    };
    Value::String(name.to_string())
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "I;16".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

pub fn orientation_tags(width: u32, height: u32) -> Vec<String> {
    let mut tags = Vec::new();
    let orientation = if width > height {
        "landscape"
    } else if height > width {
        "portrait"
    } else {
        "square"
    };
    tags.push(orientation.to_string());
    if width >= HIGH_RESOLUTION_EDGE || height >= HIGH_RESOLUTION_EDGE {
        tags.push("high-resolution".to_string());
    }
    tags
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

fn nearest(centroids: &[[f64; 3]], point: [f64; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (index, centroid) in centroids.iter().enumerate() {
        let d = distance(*centroid, point);
        if d < best_distance {
            best = index;
            best_distance = d;
        }
    }
    best
}

/// Deterministic k-means over RGB pixels. Seeds with the mean colour, then
/// repeatedly the pixel farthest from every chosen seed. Clusters come back
/// largest first.
pub fn dominant_colors(image: &RgbImage, k: usize) -> Vec<[u8; 3]> {
    let points: Vec<[f64; 3]> = image
        .pixels()
        .map(|pixel| [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64])
        .collect();
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let count = points.len() as f64;
    let mean = points.iter().fold([0.0; 3], |acc, p| {
        [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
    });
    let mut centroids = vec![[mean[0] / count, mean[1] / count, mean[2] / count]];
    while centroids.len() < k {
        let farthest = points
            .iter()
            .copied()
            .max_by(|a, b| {
                let da = distance(centroids[nearest(&centroids, *a)], *a);
                let db = distance(centroids[nearest(&centroids, *b)], *b);
                da.total_cmp(&db)
            })
            .unwrap_or(centroids[0]);
        centroids.push(farthest);
    }

    let mut assignments = vec![usize::MAX; points.len()];
    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut changed = false;
        for (index, point) in points.iter().enumerate() {
            let cluster = nearest(&centroids, *point);
            if assignments[index] != cluster {
                assignments[index] = cluster;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut sizes = vec![0usize; k];
        for (point, cluster) in points.iter().zip(&assignments) {
            sizes[*cluster] += 1;
            for channel in 0..3 {
                sums[*cluster][channel] += point[channel];
            }
        }
        for cluster in 0..k {
            // Empty clusters keep their previous centre.
            if sizes[cluster] > 0 {
                let n = sizes[cluster] as f64;
                centroids[cluster] = [
                    sums[cluster][0] / n,
                    sums[cluster][1] / n,
                    sums[cluster][2] / n,
                ];
            }
        }
    }

    let mut sizes = vec![0usize; k];
    for cluster in &assignments {
        if *cluster < k {
            sizes[*cluster] += 1;
        }
    }
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| sizes[*b].cmp(&sizes[*a]).then(a.cmp(b)));

    order
        .into_iter()
        .map(|cluster| {
            let c = centroids[cluster];
            [c[0] as u8, c[1] as u8, c[2] as u8]
        })
        .collect()
}

pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

fn color_analysis_for(image: &DynamicImage) -> JsonMap {
    let thumbnail = image
        .resize_exact(THUMBNAIL_EDGE, THUMBNAIL_EDGE, FilterType::Triangle)
        .to_rgb8();
    let colors: Vec<String> = dominant_colors(&thumbnail, PALETTE_SIZE)
        .into_iter()
        .map(hex_color)
        .collect();
    let mut map = JsonMap::new();
    map.insert("color_count".to_string(), json!(colors.len()));
    map.insert("dominant_colors".to_string(), json!(colors));
    map
}

/// Decodes and analyzes an image. Failures are recorded in the returned maps
/// as `{"error": ...}` rather than propagated.
pub fn analyze_image(bytes: &[u8]) -> ImageAnalysis {
    match decode(bytes) {
        Ok((image, format)) => {
            let (width, height) = image.dimensions();
            let mut style_analysis = JsonMap::new();
            style_analysis.insert(
                "dimensions".to_string(),
                Value::String(format!("{width}x{height}")),
            );
            style_analysis.insert("format".to_string(), format_name(format));
            style_analysis.insert(
                "mode".to_string(),
                Value::String(color_mode(image.color())),
            );
            ImageAnalysis {
                color_analysis: color_analysis_for(&image),
                style_analysis,
                content_tags: orientation_tags(width, height),
            }
        }
        Err(err) => ImageAnalysis {
            color_analysis: error_map(&err),
            style_analysis: error_map(&err),
            content_tags: Vec::new(),
        },
    }
}

#[cfg(test)]
pub(crate) fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}
