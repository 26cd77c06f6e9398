use std::fmt;

use crate::types::RowValues;

/// Identity of one query result: statement id, row window, SQL, bound values and environment.
///
/// Values are recorded through their `Debug` form, so `Int(1)` and `Text("1")` never collide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey {
    parts: Vec<String>,
}

impl CacheKey {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, part: impl fmt::Display) {
        self.parts.push(part.to_string());
    }

    pub fn update_value(&mut self, value: &RowValues) {
        self.parts.push(format!("{value:?}"));
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.parts.len()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguishes_value_types() {
        let mut a = CacheKey::new();
        a.update("s.id");
        a.update_value(&RowValues::Int(1));
        let mut b = CacheKey::new();
        b.update("s.id");
        b.update_value(&RowValues::Text("1".into()));
        assert_ne!(a, b);
        assert_eq!(a.update_count(), 2);
    }
}
