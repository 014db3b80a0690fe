use crate::shared::error::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;

/// アップロード圧縮で扱う画像タイプの判定。
pub fn is_image_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// 最大辺に収まるようアスペクト比を保って縮小する。
/// 既に収まっている画像はそのまま返す。
pub fn resize_to_fit(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image;
    }
    image.resize(max_width, max_height, FilterType::Lanczos3)
}

/// 中央を正方形に切り出してサムネイルサイズへ縮小する。
pub fn center_crop_thumbnail(image: DynamicImage, size: u32) -> DynamicImage {
    image.resize_to_fill(size, size, FilterType::Lanczos3)
}

/// JPEGへ再エンコードする。quality は 0.0..=1.0。
pub fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, AppError> {
    let quality = (quality.clamp(0.0, 1.0) * 100.0).round() as u8;
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.max(1));
    // JPEGはアルファ非対応のためRGBへ落とす
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// デコード → 縮小 → JPEG再エンコードの一括処理。
pub fn compress_to_jpeg(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    quality: f32,
) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = resize_to_fit(decoded, max_width, max_height);
    encode_jpeg(&resized, quality)
}

/// 正方形サムネイルのJPEGバイト列を生成する。
pub fn square_thumbnail_jpeg(bytes: &[u8], size: u32, quality: f32) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)?;
    let thumb = center_crop_thumbnail(decoded, size);
    encode_jpeg(&thumb, quality)
}

/// 再エンコード後のファイル名。拡張子をjpgへ揃える。
pub fn with_jpeg_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{file_name}.jpg"),
    }
}
