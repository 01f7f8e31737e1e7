/// Number of rows that fit a list area laid out in columns.
///
/// Narrow areas still get two columns so a minimum of content is kept.
pub fn capacity_for_area(width: f32, height: f32, row_height: f32, min_column_width: f32) -> usize {
    if row_height <= 0.0 || min_column_width <= 0.0 {
        return 0;
    }
    let lines = (height / row_height).floor().max(0.0) as usize;
    let columns = (width / min_column_width).floor().max(0.0) as usize;
    lines * columns.max(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Next item to select when stepping through the displayed list.
///
/// Wraps at both ends. With nothing (or something not displayed) selected,
/// stepping forward selects the first item and stepping back the last.
pub fn cycle_selection<H: Clone + PartialEq>(
    displayed: &[H],
    selected: Option<&H>,
    direction: Direction,
) -> Option<H> {
    if displayed.is_empty() {
        return None;
    }
    let last = displayed.len() - 1;
    let position = selected.and_then(|s| displayed.iter().position(|h| h == s));

    let next = match (position, direction) {
        (None, Direction::Next) => 0,
        (None, Direction::Previous) => last,
        (Some(i), Direction::Next) if i == last => 0,
        (Some(i), Direction::Next) => i + 1,
        (Some(0), Direction::Previous) => last,
        (Some(i), Direction::Previous) => i - 1,
    };
    displayed.get(next).cloned()
}
