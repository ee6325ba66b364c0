//! `WITH (...)` hints consumed by the core (§6).

/// Parsed `WITH (...)` directives for a single scan. The SQL surface hands
/// these to the engine as already-uppercased directive names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// `NO_CACHE` — disable the blob cache for this read.
    pub no_cache: bool,
    /// `NO_PARTITION` — disable temporal partition rendering.
    pub no_partition: bool,
    /// `NO_PUSH_PROJECTION` — disable projection pushdown to decoders.
    pub no_push_projection: bool,
}

impl Hints {
    pub fn parse(raw: &[String]) -> Self {
        let mut hints = Hints::default();
        for directive in raw {
            match directive.as_str() {
                "NO_CACHE" => hints.no_cache = true,
                "NO_PARTITION" => hints.no_partition = true,
                "NO_PUSH_PROJECTION" => hints.no_push_projection = true,
                _ => {}
            }
        }
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hints_are_ignored() {
        let hints = Hints::parse(&["NO_CACHE".into(), "SOMETHING_ELSE".into()]);
        assert!(hints.no_cache);
        assert!(!hints.no_partition);
    }

    #[test]
    fn empty_hints_disable_nothing() {
        assert_eq!(Hints::parse(&[]), Hints::default());
    }
}
