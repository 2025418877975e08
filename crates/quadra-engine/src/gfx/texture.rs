use std::path::{Path, PathBuf};

use anyhow::ensure;

use super::api::{TextureFilter, TextureParam, TextureWrap};
use super::context::{gfx_call, Context, OwnedHandle};

/// Immutable RGBA8 2D texture.
///
/// Sampled with linear filtering and clamped to the edge on both axes.
/// Pixel data lives only on the GPU after construction.
#[derive(Debug)]
pub struct Texture {
    handle: OwnedHandle,
    width: u32,
    height: u32,
    path: Option<PathBuf>,
}

impl Texture {
    /// Decodes the image at `path` and uploads it.
    ///
    /// Rows are flipped so row 0 is the bottom of the image, matching the
    /// texture-coordinate origin. An undecodable file is warned about and
    /// produces an empty texture with undefined contents.
    pub fn from_file(ctx: &Context, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let decoded = match image::open(path) {
            Ok(img) => Some(img.flipv().to_rgba8()),
            Err(e) => {
                log::warn!("cannot decode texture {}: {e}", path.display());
                None
            }
        };

        let mut texture = match &decoded {
            Some(rgba) => {
                log::debug!("loaded texture {} ({}x{})", path.display(), rgba.width(), rgba.height());
                Self::upload(ctx, rgba.width(), rgba.height(), Some(rgba.as_raw()))
            }
            None => Self::upload(ctx, 0, 0, None),
        };
        texture.path = Some(path.to_path_buf());
        texture
    }

    /// Uploads tightly packed RGBA8 rows, bottom row first.
    pub fn from_rgba8(ctx: &Context, width: u32, height: u32, pixels: &[u8]) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 4;
        ensure!(
            pixels.len() == expected,
            "{width}x{height} RGBA8 texture needs {expected} bytes, got {}",
            pixels.len()
        );
        Ok(Self::upload(ctx, width, height, Some(pixels)))
    }

    fn upload(ctx: &Context, width: u32, height: u32, pixels: Option<&[u8]>) -> Self {
        let raw = gfx_call!(ctx, api => api.create_texture());
        let handle = OwnedHandle::new(ctx, raw, "delete_texture", |api, h| api.delete_texture(h));

        gfx_call!(ctx, api => api.bind_texture(Some(raw)));
        for param in [
            TextureParam::MinFilter(TextureFilter::Linear),
            TextureParam::MagFilter(TextureFilter::Linear),
            TextureParam::WrapS(TextureWrap::ClampToEdge),
            TextureParam::WrapT(TextureWrap::ClampToEdge),
        ] {
            gfx_call!(ctx, api => api.texture_parameter(param));
        }
        gfx_call!(ctx, api => api.texture_image_2d(width, height, pixels));
        gfx_call!(ctx, api => api.bind_texture(None));

        Self { handle, width, height, path: None }
    }

    /// Binds to texture unit `slot`.
    pub fn bind(&self, slot: u32) {
        let ctx = self.handle.ctx();
        let raw = self.handle.raw();
        gfx_call!(ctx, api => api.active_texture(slot));
        gfx_call!(ctx, api => api.bind_texture(Some(raw)));
    }

    /// Clears the texture binding of the active unit.
    pub fn unbind(&self) {
        gfx_call!(self.handle.ctx(), api => api.bind_texture(None));
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// File the texture was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> super::api::RawHandle {
        self.handle.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::testing::{spy_context, Call};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn uploaded(calls: &[Call]) -> Option<(u32, u32, Option<Vec<u8>>)> {
        calls.iter().find_map(|c| match c {
            Call::TexImage { width, height, pixels } => Some((*width, *height, pixels.clone())),
            _ => None,
        })
    }

    #[test]
    fn upload_sets_params_and_unbinds() {
        let (ctx, spy) = spy_context();
        let tex = Texture::from_rgba8(&ctx, 1, 1, &RED).unwrap();
        let id = tex.raw().get();

        assert_eq!(
            spy.borrow().calls,
            [
                Call::CreateTexture(id),
                Call::BindTexture(Some(id)),
                Call::TexParameter(TextureParam::MinFilter(TextureFilter::Linear)),
                Call::TexParameter(TextureParam::MagFilter(TextureFilter::Linear)),
                Call::TexParameter(TextureParam::WrapS(TextureWrap::ClampToEdge)),
                Call::TexParameter(TextureParam::WrapT(TextureWrap::ClampToEdge)),
                Call::TexImage { width: 1, height: 1, pixels: Some(RED.to_vec()) },
                Call::BindTexture(None),
            ]
        );
    }

    #[test]
    fn rejects_wrong_pixel_count() {
        let (ctx, spy) = spy_context();
        let err = Texture::from_rgba8(&ctx, 2, 2, &RED).unwrap_err();

        assert!(err.to_string().contains("needs 16 bytes"));
        assert_eq!(spy.borrow().allocated(), 0);
    }

    #[test]
    fn decoded_file_is_flipped_bottom_row_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripes.png");
        let top_red_bottom_blue = [RED, BLUE].concat();
        image::RgbaImage::from_raw(1, 2, top_red_bottom_blue).unwrap().save(&path).unwrap();

        let (ctx, spy) = spy_context();
        let tex = Texture::from_file(&ctx, &path);

        assert_eq!((tex.width(), tex.height()), (1, 2));
        assert_eq!(tex.path(), Some(path.as_path()));
        assert_eq!(uploaded(&spy.borrow().calls), Some((1, 2, Some([BLUE, RED].concat()))));
    }

    #[test]
    fn undecodable_file_uploads_empty_texture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let (ctx, spy) = spy_context();
        let tex = Texture::from_file(&ctx, &path);

        assert_eq!((tex.width(), tex.height()), (0, 0));
        assert_eq!(uploaded(&spy.borrow().calls), Some((0, 0, None)));
        assert_eq!(spy.borrow().live(), 1);
    }

    #[test]
    fn bind_selects_unit_first() {
        let (ctx, spy) = spy_context();
        let tex = Texture::from_rgba8(&ctx, 1, 1, &BLUE).unwrap();
        let start = spy.borrow().calls.len();

        tex.bind(3);
        tex.unbind();

        assert_eq!(
            spy.borrow().calls[start..],
            [Call::ActiveTexture(3), Call::BindTexture(Some(tex.raw().get())), Call::BindTexture(None)]
        );
    }

    #[test]
    fn drop_releases_once() {
        let (ctx, spy) = spy_context();
        let tex = Texture::from_rgba8(&ctx, 1, 1, &RED).unwrap();
        let raw = tex.raw();
        drop(tex);

        assert_eq!(spy.borrow().release_count(raw), 1);
        assert_eq!(spy.borrow().live(), 0);
    }
}
