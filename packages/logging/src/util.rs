use unicode_segmentation::UnicodeSegmentation;

/// Visible width of `s` in terminal columns, counted in grapheme clusters
/// rather than bytes or `char`s so combining marks and multi-codepoint
/// emoji don't over-count.
pub fn str_width(s: &str) -> usize {
    s.graphemes(true).count()
}
