use serde::{Deserialize, Serialize};

/// Calendar month as used by both spreadsheets
///
/// The purchase sheet identifies months by a three letter Portuguese code
/// (`jan`, `fev`, ...) while the patient sheet has one column per month,
/// headed by the full Portuguese name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

const CODES: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

const LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

const FULL_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

// Field keys of a patient record, accent-free
const KEYS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "marco",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

impl Month {
    /// All months in calendar order
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// Zero based position in the calendar
    pub fn index(self) -> usize {
        self as usize
    }

    /// Month at a calendar position, wrapping past December
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    /// Three letter lowercase code, e.g. `"fev"`
    pub fn code(self) -> &'static str {
        CODES[self.index()]
    }

    /// Capitalized code used as a chart label, e.g. `"Fev"`
    pub fn label(self) -> &'static str {
        LABELS[self.index()]
    }

    /// Full Portuguese name, e.g. `"Março"`
    pub fn full_name(self) -> &'static str {
        FULL_NAMES[self.index()]
    }

    /// Accent-free lowercase key used when serializing patient counts
    pub fn key(self) -> &'static str {
        KEYS[self.index()]
    }

    /// Match a month code case-insensitively (`"JAN"`, `" jan "` and `"jan"` all match)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        CODES
            .iter()
            .position(|c| *c == code)
            .map(Self::from_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(Month::from_code("jan"), Some(Month::Jan));
        assert_eq!(Month::from_code("DEZ"), Some(Month::Dec));
        assert_eq!(Month::from_code(" Mar "), Some(Month::Mar));
        assert_eq!(Month::from_code("janeiro"), None);
        assert_eq!(Month::from_code(""), None);
    }

    #[test]
    fn index_wraps() {
        assert_eq!(Month::from_index(12), Month::Jan);
        assert_eq!(Month::from_index(14), Month::Mar);
        assert_eq!(Month::Dec.index(), 11);
    }

    #[test]
    fn names_line_up() {
        assert_eq!(Month::Mar.label(), "Mar");
        assert_eq!(Month::Mar.full_name(), "Março");
        assert_eq!(Month::Mar.key(), "marco");
        assert_eq!(Month::Sep.code(), "set");
    }
}
