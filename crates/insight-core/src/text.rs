//! Line and column lookup for byte offsets.
//!
//! Lines and columns are 1-indexed; byte offsets are 0-indexed. Columns
//! count `char`s, so a non-ASCII class name reports the column an editor
//! shows.

/// Largest char boundary in `content` that is not past `offset`.
fn floor_boundary(content: &str, offset: usize) -> usize {
    let mut at = offset.min(content.len());
    while !content.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// 1-indexed (line, column) of a byte offset.
///
/// Offsets past the end clamp to the end of `content`.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let prefix = &content[..floor_boundary(content, offset)];
    let line_start = prefix.rfind('\n').map_or(0, |nl| nl + 1);
    let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
    let col = prefix[line_start..].chars().count() + 1;
    (line as u32, col as u32)
}

/// 1-indexed line number of a byte offset.
pub fn line_of_offset(content: &str, offset: usize) -> u32 {
    byte_offset_to_position(content, offset).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_across_lines() {
        let php = "<?php\n$a = new Foo();\n$b = 1;\n";
        assert_eq!(byte_offset_to_position(php, 0), (1, 1));
        assert_eq!(byte_offset_to_position(php, 5), (1, 6));
        assert_eq!(byte_offset_to_position(php, 6), (2, 1));
        assert_eq!(byte_offset_to_position(php, 15), (2, 10));
        assert_eq!(byte_offset_to_position(php, 22), (3, 1));
    }

    #[test]
    fn columns_count_chars() {
        let php = "$ü = new Ärger();";
        // "Ärger" starts after "$ü = new ", which is 10 bytes and 9 chars.
        assert_eq!(byte_offset_to_position(php, 10), (1, 10));
    }

    #[test]
    fn offset_inside_a_char_rounds_down() {
        let php = "Ä";
        assert_eq!(byte_offset_to_position(php, 1), (1, 1));
    }

    #[test]
    fn offset_past_end_clamps() {
        assert_eq!(byte_offset_to_position("ab\nc", 99), (2, 2));
        assert_eq!(line_of_offset("ab\nc", 99), 2);
    }

    #[test]
    fn line_of_offset_at_newline() {
        let php = "a\nb\nc";
        assert_eq!(line_of_offset(php, 1), 1);
        assert_eq!(line_of_offset(php, 2), 2);
        assert_eq!(line_of_offset(php, 4), 3);
    }
}
