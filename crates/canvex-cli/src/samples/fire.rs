//! Fire propagation: each pixel takes the intensity of the one below it,
//! minus a random decay, shifted sideways by the same amount. The result
//! is uploaded as one RGBA buffer per frame.

use canvex_canvas::{FrameHandler, RenderContext};
use canvex_core::events::FrameTick;
use canvex_core::types::BufferHandle;
use rand::Rng;
use tracing::warn;

const START_INTENSITY: u8 = 36;

const PALETTE: [[u8; 3]; 37] = [
    [7, 7, 7],
    [31, 7, 7],
    [47, 15, 7],
    [71, 15, 7],
    [87, 23, 7],
    [103, 31, 7],
    [119, 31, 7],
    [143, 39, 7],
    [159, 47, 7],
    [175, 63, 7],
    [191, 71, 7],
    [199, 71, 7],
    [223, 79, 7],
    [223, 87, 7],
    [223, 87, 7],
    [215, 95, 7],
    [215, 95, 7],
    [215, 103, 15],
    [207, 111, 15],
    [207, 119, 15],
    [207, 127, 15],
    [207, 135, 23],
    [199, 135, 23],
    [199, 143, 23],
    [199, 151, 31],
    [191, 159, 31],
    [191, 159, 31],
    [191, 167, 39],
    [191, 167, 39],
    [191, 175, 47],
    [183, 175, 47],
    [183, 183, 47],
    [183, 183, 55],
    [207, 207, 111],
    [223, 223, 159],
    [239, 239, 199],
    [255, 255, 255],
];

pub struct FireSample {
    width: usize,
    height: usize,
    intensity: Vec<u8>,
    rgba: Vec<u8>,
    buffer: Option<BufferHandle>,
}

impl FireSample {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            intensity: vec![START_INTENSITY; width * height],
            rgba: vec![0; width * height * 4],
            buffer: None,
        }
    }

    /// Advance the fire by one step.
    pub fn propagate(&mut self, rng: &mut impl Rng) {
        let len = self.width * self.height;
        for column in 0..self.width {
            for row in 0..self.height {
                let pixel = column + self.width * row;
                let below = pixel + self.width;
                if below >= len {
                    continue;
                }

                let decay: u8 = rng.random_range(0..3);
                let heat = self.intensity[below].saturating_sub(decay);
                let Some(target) = pixel.checked_sub(decay as usize) else {
                    continue;
                };
                self.intensity[target] = heat;

                let [r, g, b] = PALETTE
                    .get(heat as usize)
                    .copied()
                    .unwrap_or([255, 255, 255]);
                self.rgba[target * 4..target * 4 + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }
    }

    pub fn hottest(&self) -> u8 {
        self.intensity.iter().copied().max().unwrap_or(0)
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

impl FrameHandler for FireSample {
    fn on_frame(&mut self, ctx: &mut RenderContext, tick: &FrameTick) {
        let buffer = match self.buffer {
            Some(buffer) => buffer,
            None => match ctx.create_image_buffer(self.width as u32, self.height as u32) {
                Ok(buffer) => *self.buffer.insert(buffer),
                Err(e) => {
                    warn!(error = %e, "Cannot create fire buffer");
                    return;
                }
            },
        };

        self.propagate(&mut rand::rng());
        if let Err(e) = ctx.put_image_buffer(&buffer, self.rgba.clone(), 0, 0) {
            warn!(error = %e, "Fire upload rejected");
        }

        ctx.set_font("12px monospace");
        ctx.set_fill_style("#ffffff");
        ctx.fill_text(&format!("t={:.0}ms", tick.timestamp), 4.0, 14.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fire_cools_upward() {
        let mut fire = FireSample::new(8, 16);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            fire.propagate(&mut rng);
        }

        // source row never changes
        let bottom = &fire.intensity[8 * 15..];
        assert!(bottom.iter().all(|&i| i == START_INTENSITY));
        assert!(fire.intensity[..8].iter().all(|&i| i < START_INTENSITY));
        assert_eq!(fire.hottest(), START_INTENSITY);
    }

    #[test]
    fn test_pixels_are_opaque_palette_colors() {
        let mut fire = FireSample::new(4, 4);
        fire.propagate(&mut StdRng::seed_from_u64(1));
        for px in fire.rgba().chunks(4).filter(|px| px[3] != 0) {
            assert_eq!(px[3], 255);
            assert!(PALETTE.iter().any(|c| c[..] == px[..3]));
        }
    }

    #[test]
    fn test_frame_queues_buffer_and_caption() {
        let mut fire = FireSample::new(4, 4);
        let mut ctx = RenderContext::new(4, 4, 16);
        fire.on_frame(&mut ctx, &FrameTick { timestamp: 0.0 });
        fire.on_frame(&mut ctx, &FrameTick { timestamp: 16.0 });

        // one create, two uploads, each caption drawn after its upload
        let frame = ctx.take_frame();
        assert_eq!(frame.ops.len(), 6);
        let positions: Vec<usize> = frame.buffers.iter().map(|p| p.at).collect();
        assert_eq!(positions, [0, 0, 3]);
    }
}
