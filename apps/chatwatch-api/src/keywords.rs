//! Keyword relevance filter for incoming chat messages.
//!
//! Short keywords (two characters or fewer) only match as whole words so an
//! abbreviation like `tp` does not fire inside `http`. Longer keywords match
//! anywhere in the text.

use regex::Regex;

/// Keywords at or below this many characters require word boundaries.
const WHOLE_WORD_MAX_CHARS: usize = 2;

#[derive(Debug, Clone)]
enum Rule {
    WholeWord(Regex),
    Substring(String),
}

impl Rule {
    fn compile(keyword: &str) -> Self {
        if keyword.chars().count() <= WHOLE_WORD_MAX_CHARS {
            // Boundaries are ASCII non-word characters or the string edges.
            let pattern = format!(
                r"(?i)(?:^|[^0-9A-Za-z_]){}(?:[^0-9A-Za-z_]|$)",
                regex::escape(keyword)
            );
            // An escaped literal between two fixed groups always compiles.
            Self::WholeWord(Regex::new(&pattern).expect("escaped keyword pattern"))
        } else {
            Self::Substring(keyword.to_string())
        }
    }

    fn matches(&self, text: &str, lowered: &str) -> bool {
        match self {
            Self::WholeWord(re) => re.is_match(text),
            Self::Substring(needle) => lowered.contains(needle.as_str()),
        }
    }
}

/// Compiled keyword list. Immutable once built.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    rules: Vec<Rule>,
}

impl KeywordMatcher {
    /// Trim and lowercase each keyword, drop blanks, and compile a rule per
    /// remaining keyword in the given order.
    pub fn compile<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let rules = keywords.iter().map(|k| Rule::compile(k)).collect();
        Self { keywords, rules }
    }

    /// Whether any compiled rule matches `text`. Empty text never matches.
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.rules.iter().any(|rule| rule.matches(text, &lowered))
    }

    /// The normalized keywords, in configured order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keywords_are_dropped() {
        let m = KeywordMatcher::compile(["  RIP ", "", "   ", "Tp"]);
        assert_eq!(m.keywords(), ["rip", "tp"]);
    }

    #[test]
    fn short_keyword_requires_whole_word() {
        let m = KeywordMatcher::compile(["tp"]);
        assert!(m.matches("tp"));
        assert!(m.matches("TP!"));
        assert!(m.matches("ada tp gak"));
        assert!(!m.matches("http"));
        assert!(!m.matches("tpx"));
        assert!(!m.matches("x_tp"));
    }

    #[test]
    fn long_keyword_matches_substring() {
        let m = KeywordMatcher::compile(["tepung"]);
        assert!(m.matches("ketepungan"));
        assert!(m.matches("TEPUNG terigu"));
        assert!(!m.matches("tepu ng"));
    }

    #[test]
    fn empty_text_never_matches() {
        let m = KeywordMatcher::compile(["a"]);
        assert!(!m.matches(""));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let m = KeywordMatcher::compile(Vec::<String>::new());
        assert!(m.is_empty());
        assert!(!m.matches("anything at all"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = KeywordMatcher::compile(["c+", ".*"]);
        assert!(m.matches("i like c+ a lot"));
        assert!(!m.matches("cc"));
        assert!(m.matches("wild .* card"));
        assert!(!m.matches("wildcard"));
    }

    #[test]
    fn non_ascii_characters_act_as_boundaries() {
        let m = KeywordMatcher::compile(["ok"]);
        assert!(m.matches("ok👍"));
        assert!(m.matches("«ok»"));
    }

    #[test]
    fn compiling_twice_behaves_identically() {
        let inputs = ["rip", "tp", "http", "RIP bro", "tp!", "ketepungan", ""];
        let a = KeywordMatcher::compile(["rip", " TP "]);
        let b = KeywordMatcher::compile(a.keywords().to_vec());
        assert_eq!(a.keywords(), b.keywords());
        for text in inputs {
            assert_eq!(a.matches(text), b.matches(text), "diverged on {text:?}");
        }
    }

    #[test]
    fn rip_and_tp_accept_only_rip_bro() {
        let m = KeywordMatcher::compile(["rip", "tp"]);
        assert!(!m.matches("mati dong"));
        assert!(!m.matches("http error"));
        assert!(m.matches("RIP bro"));
        assert!(!m.matches("no match here"));
    }
}
