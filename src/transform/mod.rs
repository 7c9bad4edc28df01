/// Table transformations between loading and rendering.
///
/// ```text
///   Table ──► clean ──► Table ──► aggregate ──► tally / matrix / fits / pivots
/// ```

pub mod aggregate;
pub mod clean;
