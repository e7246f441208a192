//! Live preview window backed by `minifb`.

use crate::session::{Preview, SessionError};
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// A window that is opened on the first frame and closed when dropped.
pub struct PreviewWindow {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl PreviewWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window, SessionError> {
        let reopen = match &self.window {
            Some(w) => w.get_size() != (width, height),
            None => true,
        };
        if reopen {
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|e| SessionError::Preview(e.to_string()))?;
            tracing::debug!(title = %self.title, width, height, "opened preview window");
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| SessionError::Preview("window unavailable".to_string()))
    }
}

impl Preview for PreviewWindow {
    fn present(&mut self, image: &RgbImage) -> Result<bool, SessionError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut buffer = std::mem::take(&mut self.buffer);
        pack_rgb(image, &mut buffer);

        let window = self.window_for(width, height)?;
        let result = window
            .update_with_buffer(&buffer, width, height)
            .map_err(|e| SessionError::Preview(e.to_string()));
        // presses since the last update catch quick taps between slow frames
        let keep_going = window.is_open()
            && !stop_requested(&window.get_keys_pressed(KeyRepeat::No))
            && !stop_requested(&window.get_keys());

        self.buffer = buffer;
        result.map(|()| keep_going)
    }
}

fn stop_requested(keys: &[Key]) -> bool {
    keys.iter().any(|k| matches!(k, Key::Q | Key::Escape))
}

/// RGB pixels → minifb's 0RGB u32 layout.
fn pack_rgb(image: &RgbImage, out: &mut Vec<u32>) {
    out.clear();
    out.extend(image.pixels().map(|p| {
        let [r, g, b] = p.0;
        (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn pack_rgb_uses_0rgb_layout() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0x12, 0x34, 0x56]));
        img.put_pixel(1, 0, Rgb([0xff, 0x00, 0x01]));
        let mut buf = vec![7; 10];
        pack_rgb(&img, &mut buf);
        assert_eq!(buf, vec![0x0012_3456, 0x00ff_0001]);
    }

    #[test]
    fn q_or_escape_stops() {
        assert!(stop_requested(&[Key::Q]));
        assert!(stop_requested(&[Key::LeftShift, Key::Escape]));
        assert!(!stop_requested(&[]));
        assert!(!stop_requested(&[Key::W, Key::Space]));
    }
}
