//! Category → node color mapping.

use crate::model::node::Category;

/// Color used for `General` and every category without its own entry.
pub const GENERAL_COLOR: &str = "#6366f1";

/// Returns the hex color a renderer should use for `category`.
pub fn category_color(category: &Category) -> &'static str {
    match category {
        Category::General => GENERAL_COLOR,
        Category::CS => "#3b82f6",
        Category::Math => "#ef4444",
        Category::Personal => "#10b981",
        Category::Project => "#f59e0b",
        Category::Custom(_) => GENERAL_COLOR,
    }
}
