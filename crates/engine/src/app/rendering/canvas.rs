/// Mutable RGBA8 view over a frame buffer; every write is clipped.
pub(crate) struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub(crate) fn inset(self, amount: i32) -> Self {
        let amount = amount.min(self.width / 2).min(self.height / 2).max(0);
        Self {
            x: self.x + amount,
            y: self.y + amount,
            width: self.width - amount * 2,
            height: self.height - amount * 2,
        }
    }
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn clear(&mut self, color: [u8; 4]) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let mut color = [0; 4];
        color.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(color)
    }

    pub(crate) fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if let Some(offset) = self.offset(x, y) {
            self.frame[offset..offset + 4].copy_from_slice(&color);
        }
    }

    /// Source-over blend; alpha 255 overwrites.
    pub(crate) fn blend(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        let alpha = u16::from(color[3]);
        if alpha == 255 {
            self.frame[offset..offset + 3].copy_from_slice(&color[..3]);
            self.frame[offset + 3] = 255;
            return;
        }
        for channel in 0..3 {
            let dst = u16::from(self.frame[offset + channel]);
            let src = u16::from(color[channel]);
            self.frame[offset + channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
        }
        self.frame[offset + 3] = 255;
    }

    pub(crate) fn fill_rect(&mut self, rect: ScreenRect, color: [u8; 4]) {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.x.saturating_add(rect.width).min(self.width as i32);
        let y1 = rect.y.saturating_add(rect.height).min(self.height as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    pub(crate) fn outline_rect(&mut self, rect: ScreenRect, color: [u8; 4]) {
        if rect.width <= 0 || rect.height <= 0 {
            return;
        }
        let right = rect.x + rect.width - 1;
        let bottom = rect.y + rect.height - 1;
        for x in rect.x..=right {
            self.put(x, rect.y, color);
            self.put(x, bottom, color);
        }
        for y in rect.y..=bottom {
            self.put(rect.x, y, color);
            self.put(right, y, color);
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let index = (y as usize).checked_mul(self.width as usize)?.checked_add(x as usize)?;
        let offset = index.checked_mul(4)?;
        (offset + 4 <= self.frame.len()).then_some(offset)
    }
}
