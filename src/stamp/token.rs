//! Verification token generation and lifecycle.
//!
//! A token is one uniquely identified QR marker: a fresh UUIDv4, the
//! verification URL carrying it, and a rasterized QR image on disk.
//! Token images are file-scoped scratch artifacts: minted when a plan is
//! built, deleted once the document they stamped has been written.
//! Uniqueness is purely structural; nothing registers the token with a
//! verification service.

use crate::error::{Error, Result};
use qrcode::{EcLevel, QrCode};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Rendered pixel size of a minted QR image.
const QR_IMAGE_SIZE: u32 = 125;
/// Quiet zone around the QR modules, in modules.
const QR_QUIET_ZONE: u32 = 4;

/// One verification token.
#[derive(Debug, Clone)]
pub struct TokenRef {
    /// Unique token identity
    pub id: Uuid,
    /// Rasterized QR image on disk
    pub image_path: PathBuf,
    /// URL encoded in the QR payload
    pub target_url: String,
}

/// Mints verification tokens into a scratch directory.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    base_url: String,
    scratch_dir: PathBuf,
}

impl TokenMinter {
    /// Create a minter. `base_url` is the verification domain prefix
    /// (no trailing slash); images land in `scratch_dir`.
    pub fn new(base_url: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Mint a fresh token: new UUID, payload `<base>/verify/<uuid>`,
    /// QR image written to `<scratch>/<uuid>.png`.
    pub fn mint(&self) -> Result<TokenRef> {
        let id = Uuid::new_v4();
        let target_url = format!("{}/verify/{}", self.base_url, id);
        let image_path = self.scratch_dir.join(format!("{}.png", id));

        let png = render_qr(&target_url)?;
        std::fs::write(&image_path, png)?;

        log::debug!("minted token {} at {}", id, image_path.display());

        Ok(TokenRef {
            id,
            image_path,
            target_url,
        })
    }
}

/// Render a QR code for `data` as PNG bytes.
///
/// Error correction level M, fixed output size, white background.
fn render_qr(data: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data, EcLevel::M)
        .map_err(|e| Error::Token(format!("QR encoding failed: {}", e)))?;

    let qr_width = code.width();
    let module_count = qr_width + (QR_QUIET_ZONE as usize * 2);

    let module_size = (QR_IMAGE_SIZE as usize / module_count).max(1);
    let actual_size = module_count * module_size;

    let mut img = image::GrayImage::from_pixel(
        actual_size as u32,
        actual_size as u32,
        image::Luma([255u8]),
    );

    let quiet_px = QR_QUIET_ZONE as usize * module_size;
    for (y, row) in code.to_colors().chunks(qr_width).enumerate() {
        for (x, &module) in row.iter().enumerate() {
            if module == qrcode::Color::Dark {
                let start_x = quiet_px + x * module_size;
                let start_y = quiet_px + y * module_size;
                for dy in 0..module_size {
                    for dx in 0..module_size {
                        let px = (start_x + dx) as u32;
                        let py = (start_y + dy) as u32;
                        if px < actual_size as u32 && py < actual_size as u32 {
                            img.put_pixel(px, py, image::Luma([0u8]));
                        }
                    }
                }
            }
        }
    }

    let final_img = if actual_size != QR_IMAGE_SIZE as usize {
        image::DynamicImage::ImageLuma8(img).resize_exact(
            QR_IMAGE_SIZE,
            QR_IMAGE_SIZE,
            image::imageops::FilterType::Nearest,
        )
    } else {
        image::DynamicImage::ImageLuma8(img)
    };

    let mut buf = Vec::new();
    final_img
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| Error::Token(format!("QR PNG encoding failed: {}", e)))?;

    Ok(buf)
}

/// Resize the shared badge asset for stamping and write it to `dest`.
///
/// The badge is a per-document scratch file: recreated before each
/// document is composed and deleted immediately after serialization.
pub fn prepare_badge(source: &Path, dest: &Path) -> Result<()> {
    let data = std::fs::read(source)?;
    let img = image::load_from_memory(&data)
        .map_err(|e| Error::Image(format!("badge decode failed: {}", e)))?;

    let side = TOKEN_BADGE_RENDER_SIZE;
    let resized = img.resize_exact(side, side, image::imageops::FilterType::Lanczos3);

    let mut buf = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| Error::Image(format!("badge PNG encoding failed: {}", e)))?;
    std::fs::write(dest, buf)?;

    Ok(())
}

/// Pixel size the badge asset is resized to before embedding.
const TOKEN_BADGE_RENDER_SIZE: u32 = 75;

/// Delete every token image minted for one plan.
///
/// Runs after the document's output has been written, whether or not
/// serialization succeeded. Deletion failures are logged and never
/// re-open the file's processing.
pub fn cleanup_plan(plan: &super::StampPlan) {
    for token in plan.tokens() {
        if let Err(e) = std::fs::remove_file(&token.image_path) {
            log::warn!(
                "failed to delete token image {}: {}",
                token.image_path.display(),
                e
            );
        }
    }
}

/// Delete every file in the scratch directory (batch-end purge).
pub fn purge_dir(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                log::warn!("failed to purge {}: {}", path.display(), e);
            }
        } else if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("failed to purge {}: {}", path.display(), e);
        }
    }
    Ok(())
}
