// src/utils/mod.rs
pub mod debug;
pub mod error;
pub mod logging;

pub use error::AppError; // Re-export main error type for convenience

/// Largest char boundary at or below `index`, clamped to the text length.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_char_boundary() {
        let text = "a\u{e9}b";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 99), text.len());
    }
}
