use image::{GrayImage, Rgb, RgbImage, imageops};

use crate::{
    error::{RechromaError, RechromaResult},
    format::VideoFormat,
};

/// Interpret the leading `width * height` bytes of a packed I420 frame as a
/// row-major grayscale image.
///
/// The chroma planes, if present, are ignored. Fails when the buffer is shorter
/// than the luma plane.
pub fn extract_luma(frame: &[u8], format: VideoFormat) -> RechromaResult<GrayImage> {
    let luma = format.luma_bytes();
    if frame.len() < luma {
        return Err(RechromaError::format(format!(
            "frame buffer too short for luma plane: got {} bytes, need {luma}",
            frame.len()
        )));
    }

    GrayImage::from_raw(format.width, format.height, frame[..luma].to_vec())
        .ok_or_else(|| RechromaError::format("luma plane does not match width*height"))
}

/// Replicate a grayscale image into three equal RGB channels.
pub fn expand_luma(luma: &GrayImage) -> RgbImage {
    RgbImage::from_fn(luma.width(), luma.height(), |x, y| {
        let v = luma.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Pack an RGB image into one I420 frame of exactly `format.frame_bytes()` bytes.
///
/// Images whose dimensions differ from the format are first resized with a
/// deterministic bilinear filter; the resize is part of this codec's contract,
/// not the caller's. Layout: full-resolution Y plane, then U, then V at half
/// width and half height each, row-major.
pub fn synthesize_frame(image: &RgbImage, format: VideoFormat) -> RechromaResult<Vec<u8>> {
    if image.dimensions() == (format.width, format.height) {
        return Ok(pack_i420(image, format));
    }

    let resized = imageops::resize(
        image,
        format.width,
        format.height,
        imageops::FilterType::Triangle,
    );
    Ok(pack_i420(&resized, format))
}

fn pack_i420(image: &RgbImage, format: VideoFormat) -> Vec<u8> {
    let w = format.width as usize;
    let h = format.height as usize;
    let y_size = format.luma_bytes();
    let uv_size = y_size / 4;

    let mut frame = vec![0u8; format.frame_bytes()];
    let (y_plane, uv_planes) = frame.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for (x, y, px) in image.enumerate_pixels() {
        y_plane[y as usize * w + x as usize] = luma_of(px.0);
    }

    // 2x2 block average, one chroma pair per block.
    for row in (0..h).step_by(2) {
        for col in (0..w).step_by(2) {
            let mut r_sum = 0.0f32;
            let mut g_sum = 0.0f32;
            let mut b_sum = 0.0f32;
            for dr in 0..2u32 {
                for dc in 0..2u32 {
                    let p = image.get_pixel(col as u32 + dc, row as u32 + dr).0;
                    r_sum += f32::from(p[0]);
                    g_sum += f32::from(p[1]);
                    b_sum += f32::from(p[2]);
                }
            }
            let r = r_sum / 4.0;
            let g = g_sum / 4.0;
            let b = b_sum / 4.0;

            let uv_idx = (row / 2) * (w / 2) + (col / 2);
            u_plane[uv_idx] = (-0.169 * r - 0.331 * g + 0.500 * b + 128.0)
                .round()
                .clamp(0.0, 255.0) as u8;
            v_plane[uv_idx] = (0.500 * r - 0.419 * g - 0.081 * b + 128.0)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }

    frame
}

// Full-range BT.601 luma in 8.8 fixed point. The coefficients sum to 256, so an
// r == g == b pixel maps back to exactly that byte.
fn luma_of(rgb: [u8; 3]) -> u8 {
    let r = u32::from(rgb[0]);
    let g = u32::from(rgb[1]);
    let b = u32::from(rgb[2]);
    ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
}
