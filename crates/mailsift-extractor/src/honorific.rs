//! Person-name normalization

/// Honorific suffixes stripped by default
pub const DEFAULT_HONORIFICS: &[&str] = &[
    "様", "さま", "サマ", "さん", "サン", "殿", "どの", "氏", "先生", "君", "くん", "ちゃん",
    "-san", "-sama", "-sensei", "-kun", "-chan",
];

/// A name after honorific stripping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    /// The bare name
    pub name: String,

    /// Characters dropped from the end of the original text
    pub removed_chars: usize,
}

/// Ordered table of honorific suffixes
///
/// Suffixes are tried longest first. Stripping repeats until no suffix
/// applies, so `normalize(normalize(x)) == normalize(x)`, and a suffix is
/// never stripped when it would leave nothing behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HonorificTable {
    suffixes: Vec<String>,
}

impl HonorificTable {
    /// Build a table from arbitrary suffixes; blanks and duplicates are dropped
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        suffixes.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        suffixes.dedup();
        Self { suffixes }
    }

    /// Suffixes in matching order
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Strip honorifics, returning the bare name
    pub fn strip<'a>(&self, name: &'a str) -> &'a str {
        let mut current = name.trim();
        while let Some(rest) = self.strip_once(current) {
            current = rest;
        }
        current
    }

    /// Strip honorifics and report how many trailing characters went away
    pub fn normalize(&self, raw: &str) -> NormalizedName {
        let leading = raw.chars().take_while(|c| c.is_whitespace()).count();
        let name = self.strip(raw);
        let removed_chars = raw
            .chars()
            .count()
            .saturating_sub(leading + name.chars().count());
        NormalizedName {
            name: name.to_string(),
            removed_chars,
        }
    }

    fn strip_once<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.suffixes.iter().find_map(|suffix| {
            name.strip_suffix(suffix.as_str())
                .map(str::trim_end)
                .filter(|rest| !rest.is_empty())
        })
    }
}

impl Default for HonorificTable {
    fn default() -> Self {
        Self::new(DEFAULT_HONORIFICS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_common_suffixes() {
        let table = HonorificTable::default();
        assert_eq!(table.strip("田中様"), "田中");
        assert_eq!(table.strip("佐藤さん"), "佐藤");
        assert_eq!(table.strip("山田先生"), "山田");
        assert_eq!(table.strip("Tanaka-san"), "Tanaka");
        assert_eq!(table.strip("田中"), "田中");
    }

    #[test]
    fn test_stacked_suffixes() {
        let table = HonorificTable::default();
        assert_eq!(table.strip("鈴木先生様"), "鈴木");
    }

    #[test]
    fn test_never_empties_a_name() {
        let table = HonorificTable::default();
        assert_eq!(table.strip("様"), "様");
        assert_eq!(table.strip("先生"), "先生");
    }

    #[test]
    fn test_longest_suffix_first() {
        // "さま" must win over a shorter table entry that also matches
        let table = HonorificTable::new(["ま", "さま"]);
        assert_eq!(table.suffixes()[0], "さま");
        assert_eq!(table.strip("田中さま"), "田中");
    }

    #[test]
    fn test_whitespace_before_suffix() {
        let table = HonorificTable::default();
        let normalized = table.normalize("田中 様");
        assert_eq!(normalized.name, "田中");
        assert_eq!(normalized.removed_chars, 2);
    }

    #[test]
    fn test_removed_chars_counts_characters() {
        let table = HonorificTable::default();
        let normalized = table.normalize("佐藤さん");
        assert_eq!(normalized.name, "佐藤");
        assert_eq!(normalized.removed_chars, 2);

        let untouched = table.normalize("木村");
        assert_eq!(untouched.removed_chars, 0);
    }

    #[test]
    fn test_custom_table_replaces_default() {
        let table = HonorificTable::new(["部長"]);
        assert_eq!(table.strip("高橋部長"), "高橋");
        assert_eq!(table.strip("高橋様"), "高橋様");
    }

    #[test]
    fn test_blank_entries_ignored() {
        let table = HonorificTable::new(["", "  ", "様"]);
        assert_eq!(table.suffixes(), &["様".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_normalization_is_idempotent(
            base in "[a-zA-Z田中佐藤山]{0,6}",
            suffixes in proptest::collection::vec(
                prop_oneof![Just("様"), Just("さん"), Just("先生"), Just(" "), Just("-san")],
                0..4,
            ),
        ) {
            let table = HonorificTable::default();
            let raw = format!("{}{}", base, suffixes.concat());
            let once = table.strip(&raw).to_string();
            let twice = table.strip(&once).to_string();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_stripped_name_is_prefix(raw in "\\PC{0,12}") {
            let table = HonorificTable::default();
            let stripped = table.strip(&raw);
            prop_assert!(raw.trim().starts_with(stripped));
        }
    }
}
