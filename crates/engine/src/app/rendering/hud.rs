use crate::app::HudLine;

use super::canvas::{Canvas, ScreenRect};

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const TEXT_SCALE: i32 = 2;
const CHAR_ADVANCE_PX: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
const LINE_ADVANCE_PX: i32 = (GLYPH_HEIGHT + 2) * TEXT_SCALE;
const PANEL_PADDING_PX: i32 = 6;
const PANEL_MARGIN_PX: i32 = 8;
const PANEL_COLOR: [u8; 4] = [12, 14, 18, 190];
const PANEL_BORDER_COLOR: [u8; 4] = [70, 78, 92, 255];
const TEXT_COLOR: [u8; 4] = [230, 232, 236, 255];
const ALERT_COLOR: [u8; 4] = [255, 120, 96, 255];

/// Top-left panel with one text row per line. Nothing is drawn for an empty
/// list.
pub(crate) fn draw_hud(canvas: &mut Canvas<'_>, lines: &[HudLine]) {
    if lines.is_empty() {
        return;
    }
    let panel = panel_rect(lines);
    canvas.fill_rect(panel, PANEL_COLOR);
    canvas.outline_rect(panel, PANEL_BORDER_COLOR);

    let x = panel.x + PANEL_PADDING_PX;
    let mut y = panel.y + PANEL_PADDING_PX;
    for line in lines {
        let color = if line.emphasis { ALERT_COLOR } else { TEXT_COLOR };
        draw_text(canvas, x, y, &line.text, color);
        y += LINE_ADVANCE_PX;
    }
}

fn panel_rect(lines: &[HudLine]) -> ScreenRect {
    let widest = lines
        .iter()
        .map(|line| text_width_px(&line.text))
        .max()
        .unwrap_or(0);
    ScreenRect {
        x: PANEL_MARGIN_PX,
        y: PANEL_MARGIN_PX,
        width: widest + PANEL_PADDING_PX * 2,
        height: lines.len() as i32 * LINE_ADVANCE_PX + PANEL_PADDING_PX * 2 - TEXT_SCALE * 2,
    }
}

fn text_width_px(text: &str) -> i32 {
    match text.chars().count() as i32 {
        0 => 0,
        count => count * CHAR_ADVANCE_PX - TEXT_SCALE,
    }
}

pub(crate) fn draw_text(canvas: &mut Canvas<'_>, x: i32, y: i32, text: &str, color: [u8; 4]) {
    let mut pen_x = x;
    for ch in text.chars() {
        if ch != ' ' {
            draw_glyph(canvas, pen_x, y, glyph_rows(ch), color);
        }
        pen_x += CHAR_ADVANCE_PX;
    }
}

fn draw_glyph(canvas: &mut Canvas<'_>, x: i32, y: i32, rows: [u8; 5], color: [u8; 4]) {
    for (row_index, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (0b100 >> col) == 0 {
                continue;
            }
            canvas.fill_rect(
                ScreenRect {
                    x: x + col * TEXT_SCALE,
                    y: y + row_index as i32 * TEXT_SCALE,
                    width: TEXT_SCALE,
                    height: TEXT_SCALE,
                },
                color,
            );
        }
    }
}

/// 3x5 bitmap, one `u8` per row with the leftmost pixel in bit 2. Letters are
/// case-insensitive; unknown characters draw as `?`.
fn glyph_rows(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        ' ' => [0; 5],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '[' => [0b011, 0b010, 0b010, 0b010, 0b011],
        ']' => [0b110, 0b010, 0b010, 0b010, 0b110],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '<' => [0b001, 0b010, 0b100, 0b010, 0b001],
        '>' => [0b100, 0b010, 0b001, 0b010, 0b100],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '*' => [0b000, 0b101, 0b010, 0b101, 0b000],
        _ => [0b110, 0b001, 0b010, 0b000, 0b010],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_shares_uppercase_glyphs() {
        assert_eq!(glyph_rows('a'), glyph_rows('A'));
        assert_eq!(glyph_rows('z'), glyph_rows('Z'));
        assert_eq!(glyph_rows('~'), glyph_rows('?'));
    }

    #[test]
    fn panel_fits_widest_line() {
        let lines = vec![HudLine::plain("FPS 60"), HudLine::alert("BLOCKED")];
        let panel = panel_rect(&lines);
        assert_eq!(panel.width, text_width_px("BLOCKED") + PANEL_PADDING_PX * 2);
        assert!(panel.height >= 2 * GLYPH_HEIGHT * TEXT_SCALE);
    }

    #[test]
    fn alert_lines_use_alert_color() {
        let mut frame = vec![0u8; 64 * 32 * 4];
        let mut canvas = Canvas::new(&mut frame, 64, 32);
        draw_hud(&mut canvas, &[HudLine::alert("I")]);
        // Top bar of the I glyph.
        let x = PANEL_MARGIN_PX + PANEL_PADDING_PX;
        let y = PANEL_MARGIN_PX + PANEL_PADDING_PX;
        assert_eq!(canvas.pixel(x, y), Some(ALERT_COLOR));
    }

    #[test]
    fn empty_hud_draws_nothing() {
        let mut frame = vec![0u8; 16 * 16 * 4];
        let mut canvas = Canvas::new(&mut frame, 16, 16);
        draw_hud(&mut canvas, &[]);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn text_off_screen_is_clipped() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        let mut canvas = Canvas::new(&mut frame, 8, 8);
        draw_text(&mut canvas, -20, 4, "CLIPPED TEXT", TEXT_COLOR);
        draw_text(&mut canvas, 6, 6, "W", TEXT_COLOR);
    }
}
