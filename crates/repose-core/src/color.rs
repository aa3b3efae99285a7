/// 8-bit RGBA, non-premultiplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

impl Color {
    pub const TRANSPARENT: Color = Color(0, 0, 0, 0);
    pub const BLACK: Color = Color(0, 0, 0, 255);
    pub const WHITE: Color = Color(255, 255, 255, 255);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(r, g, b, 0xFF)
    }

    /// Packed `0xAARRGGBB`, the layout most platform color APIs use.
    pub const fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Color(r, g, b, a)
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA`. Anything else is black; unreadable
    /// color channels read as 0 and an unreadable alpha as opaque.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.trim_start_matches('#');
        if !matches!(digits.len(), 6 | 8) {
            return Color::BLACK;
        }
        let mut rgba = [0, 0, 0, 0xFF];
        for (i, slot) in rgba.iter_mut().enumerate() {
            if let Some(pair) = digits.get(i * 2..i * 2 + 2) {
                *slot = u8::from_str_radix(pair, 16).unwrap_or(*slot);
            }
        }
        let [r, g, b, a] = rgba;
        Color(r, g, b, a)
    }

    pub fn with_alpha(self, alpha: u8) -> Self {
        Color(self.0, self.1, self.2, alpha)
    }

    pub fn channels(self) -> [u8; 4] {
        [self.0, self.1, self.2, self.3]
    }

    pub fn is_transparent(&self) -> bool {
        self.3 == 0
    }
}
