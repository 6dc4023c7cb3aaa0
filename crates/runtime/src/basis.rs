//! The baked-in basis (§6): a handful of names every Ven program gets for
//! free without writing `expose`. Most of it is plain Ven, compiled as the
//! very first unit in every program's chunk table so user code's `fun`s and
//! `box`es layer on top of it in the same root scope.

/// Embedded exactly once at build time — no filesystem lookup at runtime.
pub const SOURCE: &str = include_str!("basis/basis.ven");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_source_is_non_empty() {
        assert!(!SOURCE.trim().is_empty());
    }

    #[test]
    fn basis_source_parses() {
        let unit = venc::Reader::read(SOURCE, "basis.ven").unwrap();
        assert!(!unit.quotes.is_empty());
    }
}
