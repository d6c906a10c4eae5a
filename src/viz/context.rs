use ratatui::layout::Rect;
use ratatui::style::Color;

use crate::gym::{Action, Pos};

/// Red/green contributions in `[0,1]` for a value against the observed
/// bounds. Saturation is capped at 0.65 at either bound; zero contributes
/// no color at all.
pub fn color_scale(v: f64, min: f64, max: f64) -> (f64, f64) {
    let mut red = 0.0;
    let mut green = 0.0;
    if v < 0.0 && min < 0.0 {
        debug_assert!(v >= min, "value below the observed minimum");
        red = v * 0.65 / min;
    }
    if v > 0.0 && max > 0.0 {
        debug_assert!(v <= max, "value above the observed maximum");
        green = v * 0.65 / max;
    }
    (red, green)
}

/// [`color_scale`] as a terminal color
pub fn value_color(v: f64, min: f64, max: f64) -> Color {
    let (red, green) = color_scale(v, min, max);
    Color::Rgb((red * 255.0) as u8, (green * 255.0) as u8, 0)
}

/// The min/max over displayed values, always including a 0.0 baseline
pub fn value_bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    values
        .into_iter()
        .fold((0.0, 0.0), |(min, max), &v| (min.min(v), max.max(v)))
}

/// Which movement action's wedge the character cell at `(col, row)` belongs
/// to, splitting a `width x height` region along its diagonals. Ties on the
/// diagonals go to the vertical wedges.
pub fn wedge_at(col: u16, row: u16, width: u16, height: u16) -> Action {
    let u = (col as f64 + 0.5) / width as f64 - 0.5;
    let v = (row as f64 + 0.5) / height as f64 - 0.5; // positive points down-screen
    if v <= 0.0 && v.abs() >= u.abs() {
        Action::Up
    } else if v > 0.0 && v >= u.abs() {
        Action::Down
    } else if u < 0.0 {
        Action::Left
    } else {
        Action::Right
    }
}

/// Geometry of one rendered grid.
///
/// An explicit context object rather than process-wide state, so several
/// displays can coexist and the transforms stay pure. Cells are drawn twice
/// as wide as tall to compensate for terminal glyph aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayContext {
    width: i32,
    height: i32,
    cell_w: u16,
    cell_h: u16,
    margin_x: u16,
    margin_y: u16,
}

impl DisplayContext {
    /// `cell_size` is the cell height in rows, clamped to at least 3 so a
    /// bordered cell keeps one interior row
    pub fn new(width: i32, height: i32, cell_size: u16) -> Self {
        let cell_h = cell_size.max(3);
        let cell_w = cell_h * 2;
        Self {
            width,
            height,
            cell_w,
            cell_h,
            margin_x: cell_w * 3 / 4,
            margin_y: cell_h * 3 / 4,
        }
    }

    /// Total canvas size in character cells, margins included
    pub fn canvas_size(&self) -> (u16, u16) {
        (
            self.width as u16 * self.cell_w + 2 * self.margin_x,
            self.height as u16 * self.cell_h + 2 * self.margin_y,
        )
    }

    /// The on-screen rectangle of a grid cell. The grid's y axis points up,
    /// the screen's points down.
    pub fn cell_rect(&self, (x, y): Pos) -> Rect {
        Rect::new(
            self.margin_x + x as u16 * self.cell_w,
            self.margin_y + (self.height - 1 - y) as u16 * self.cell_h,
            self.cell_w,
            self.cell_h,
        )
    }

    /// Map a screen position back to the grid cell containing it
    pub fn to_grid(&self, x: u16, y: u16) -> Option<Pos> {
        if x < self.margin_x || y < self.margin_y {
            return None;
        }
        let gx = ((x - self.margin_x) / self.cell_w) as i32;
        let gy = self.height - 1 - ((y - self.margin_y) / self.cell_h) as i32;
        (gx < self.width && gy >= 0).then_some((gx, gy))
    }

    /// The title line, centered in the top margin
    pub fn title_rect(&self) -> Rect {
        let (w, _) = self.canvas_size();
        Rect::new(0, self.margin_y / 2, w, 1)
    }

    /// The caption line, centered in the bottom margin
    pub fn caption_rect(&self) -> Rect {
        let (w, h) = self.canvas_size();
        Rect::new(0, h - self.margin_y / 2 - 1, w, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_no_color() {
        assert_eq!(color_scale(0.0, -2.0, 3.0), (0.0, 0.0));
        assert_eq!(color_scale(0.0, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn bounds_saturate_at_065() {
        let (red, green) = color_scale(-2.0, -2.0, 3.0);
        assert_eq!(red, 0.65);
        assert_eq!(green, 0.0);

        let (red, green) = color_scale(3.0, -2.0, 3.0);
        assert_eq!(red, 0.0);
        assert_eq!(green, 0.65);
    }

    #[test]
    fn interior_values_scale_linearly() {
        let (red, green) = color_scale(-1.0, -2.0, 3.0);
        assert_eq!(red, 0.325);
        assert_eq!(green, 0.0);
    }

    #[test]
    fn bounds_include_zero_baseline() {
        assert_eq!(value_bounds([1.0, 2.0].iter()), (0.0, 2.0));
        assert_eq!(value_bounds([-3.0, -1.0].iter()), (-3.0, 0.0));
        assert_eq!(value_bounds([].iter()), (0.0, 0.0));
    }

    #[test]
    fn cell_rect_round_trips_through_to_grid() {
        let ctx = DisplayContext::new(5, 4, 4);
        for x in 0..5 {
            for y in 0..4 {
                let rect = ctx.cell_rect((x, y));
                assert_eq!(ctx.to_grid(rect.x, rect.y), Some((x, y)));
                assert_eq!(
                    ctx.to_grid(rect.x + rect.width - 1, rect.y + rect.height - 1),
                    Some((x, y))
                );
            }
        }
    }

    #[test]
    fn margins_are_not_grid_cells() {
        let ctx = DisplayContext::new(5, 4, 4);
        assert_eq!(ctx.to_grid(0, 0), None);
        let (w, _) = ctx.canvas_size();
        assert_eq!(ctx.to_grid(w - 1, 0), None);
    }

    #[test]
    fn grid_rows_stack_top_down() {
        let ctx = DisplayContext::new(3, 3, 4);
        // higher grid y sits higher on screen (smaller screen y)
        assert!(ctx.cell_rect((0, 2)).y < ctx.cell_rect((0, 0)).y);
    }

    #[test]
    fn wedges_cover_the_four_directions() {
        let (w, h) = (8, 4);
        assert_eq!(wedge_at(4, 0, w, h), Action::Up);
        assert_eq!(wedge_at(4, 3, w, h), Action::Down);
        assert_eq!(wedge_at(0, 2, w, h), Action::Left);
        assert_eq!(wedge_at(7, 2, w, h), Action::Right);
    }
}
