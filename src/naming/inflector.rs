//! Singular/plural inflection
//!
//! The rule set is built once per run. Lookup order is: caller supplied
//! irregular pairs, built-in irregular pairs, uncountable words, built-in
//! substitutions, and finally the general English substitutions. The first
//! layer that recognises a word decides the result.

use regex::Regex;
use serde::Deserialize;
use tracing::trace;

/// An irregular singular/plural pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InflectionRule {
    pub singular: String,
    pub plural: String,
}

impl InflectionRule {
    pub fn new(singular: &str, plural: &str) -> Self {
        Self {
            singular: singular.to_string(),
            plural: plural.to_string(),
        }
    }
}

/// Built-in singular substitutions that take priority over the general rules
const SINGULAR_OVERRIDES: &[(&str, &str)] = &[("(slave)s$", "${1}"), ("(drive)s$", "${1}")];

/// Built-in plural substitutions that take priority over the general rules
const PLURAL_OVERRIDES: &[(&str, &str)] = &[("(people)$", "${1}"), ("(drive)$", "${1}s")];

/// Built-in irregular pairs (singular, plural)
pub const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("mouse", "mice"),
    ("louse", "lice"),
    ("ox", "oxen"),
    ("hero", "heroes"),
    ("potato", "potatoes"),
    ("tomato", "tomatoes"),
    ("echo", "echoes"),
    ("veto", "vetoes"),
    ("photo", "photos"),
    ("piano", "pianos"),
    ("halo", "halos"),
    ("cafe", "cafes"),
    ("index", "indices"),
    ("appendix", "appendices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("criterion", "criteria"),
    ("phenomenon", "phenomena"),
    ("datum", "data"),
    ("media", "media"),
    ("alumnus", "alumni"),
    ("cactus", "cacti"),
    ("fungus", "fungi"),
    ("nucleus", "nuclei"),
    ("radius", "radii"),
    ("stimulus", "stimuli"),
    ("genus", "genera"),
    ("analysis", "analyses"),
    ("axis", "axes"),
    ("crisis", "crises"),
    ("thesis", "theses"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("life", "lives"),
    ("leaf", "leaves"),
    ("wolf", "wolves"),
    ("half", "halves"),
    ("shelf", "shelves"),
    ("thief", "thieves"),
    ("quiz", "quizzes"),
    ("die", "dice"),
    ("deer", "deer"),
    ("sheep", "sheep"),
    ("fish", "fish"),
    ("moose", "moose"),
    ("aircraft", "aircraft"),
];

const UNCOUNTABLES: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "jeans",
    "police",
    "news",
];

/// General plural substitutions, highest priority first
const PLURALS: &[(&str, &str)] = &[
    ("(quiz)$", "${1}zes"),
    ("^(oxen)$", "${1}"),
    ("^(ox)$", "${1}en"),
    ("^(m|l)ice$", "${1}ice"),
    ("^(m|l)ouse$", "${1}ice"),
    ("(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    ("(x|ch|ss|sh)$", "${1}es"),
    ("([^aeiouy]|qu)y$", "${1}ies"),
    ("(hive)$", "${1}s"),
    ("(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    ("sis$", "ses"),
    ("([ti])a$", "${1}a"),
    ("([ti])um$", "${1}a"),
    ("(buffal|tomat)o$", "${1}oes"),
    ("(bu)s$", "${1}ses"),
    ("(alias|status|campus)$", "${1}es"),
    ("(octop|vir)i$", "${1}i"),
    ("(octop|vir)us$", "${1}i"),
    ("^(ax|test)is$", "${1}es"),
    ("s$", "s"),
    ("$", "s"),
];

/// General singular substitutions, highest priority first
const SINGULARS: &[(&str, &str)] = &[
    ("(database)s$", "${1}"),
    ("(quiz)zes$", "${1}"),
    ("(matr)ices$", "${1}ix"),
    ("(vert|ind)ices$", "${1}ex"),
    ("^(ox)en", "${1}"),
    ("(alias|status)(es)?$", "${1}"),
    ("(octop|vir)(us|i)$", "${1}us"),
    ("^(a)x[ie]s$", "${1}xis"),
    ("(cris|test)(is|es)$", "${1}is"),
    ("(shoe)s$", "${1}"),
    ("(o)es$", "${1}"),
    ("(bus|campus)(es)?$", "${1}"),
    ("^(m|l)ice$", "${1}ouse"),
    ("(x|ch|ss|sh)es$", "${1}"),
    ("(m)ovies$", "${1}ovie"),
    ("(c)ookies$", "${1}ookie"),
    ("(s)eries$", "${1}eries"),
    ("([^aeiouy]|qu)ies$", "${1}y"),
    ("([lr])ves$", "${1}f"),
    ("(tive)s$", "${1}"),
    ("(hive)s$", "${1}"),
    ("([^f])ves$", "${1}fe"),
    ("(^analy)(sis|ses)$", "${1}sis"),
    (
        "((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)(sis|ses)$",
        "${1}sis",
    ),
    ("([ti])a$", "${1}um"),
    ("(n)ews$", "${1}ews"),
    ("(ss)$", "${1}"),
    ("s$", ""),
];

#[derive(Debug, Clone, Copy)]
enum Direction {
    Singular,
    Plural,
}

#[derive(Debug)]
struct Substitution {
    pattern: Regex,
    replacement: &'static str,
}

fn compile(rules: &[(&str, &'static str)]) -> Vec<Substitution> {
    rules
        .iter()
        .map(|(pattern, replacement)| Substitution {
            pattern: Regex::new(&format!("(?i){pattern}")).expect("valid inflection pattern"),
            replacement,
        })
        .collect()
}

/// Singular/plural transformer
#[derive(Debug)]
pub struct Inflector {
    irregulars: Vec<(String, String)>,
    singulars: Vec<Substitution>,
    plurals: Vec<Substitution>,
}

impl Default for Inflector {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Inflector {
    /// Build the rule set. `rules` are consulted before any built-in rule.
    pub fn new(rules: &[InflectionRule]) -> Self {
        let irregulars = rules
            .iter()
            .map(|r| (r.singular.to_ascii_lowercase(), r.plural.to_ascii_lowercase()))
            .chain(
                IRREGULARS
                    .iter()
                    .map(|(s, p)| ((*s).to_string(), (*p).to_string())),
            )
            .collect();

        let mut singulars = compile(SINGULAR_OVERRIDES);
        singulars.extend(compile(SINGULARS));
        let mut plurals = compile(PLURAL_OVERRIDES);
        plurals.extend(compile(PLURALS));

        Self {
            irregulars,
            singulars,
            plurals,
        }
    }

    /// Singular form of `word`
    pub fn singularize(&self, word: &str) -> String {
        self.inflect(word, Direction::Singular)
    }

    /// Plural form of `word`
    pub fn pluralize(&self, word: &str) -> String {
        self.inflect(word, Direction::Plural)
    }

    fn inflect(&self, word: &str, direction: Direction) -> String {
        // Only the last underscore separated segment is inflected
        let (prefix, tail) = match word.rfind('_') {
            Some(pos) => word.split_at(pos + 1),
            None => ("", word),
        };
        if tail.is_empty() {
            return word.to_string();
        }

        let inflected = self.inflect_tail(tail, direction);
        trace!(word = ?word, inflected = ?inflected, direction = ?direction, "Inflected");
        format!("{prefix}{inflected}")
    }

    fn inflect_tail(&self, tail: &str, direction: Direction) -> String {
        let lower = tail.to_ascii_lowercase();

        for (singular, plural) in &self.irregulars {
            let (from, to) = match direction {
                Direction::Singular => (plural, singular),
                Direction::Plural => (singular, plural),
            };
            if let Some(start) = suffix_match(tail, &lower, from) {
                return format!("{}{}", &tail[..start], match_case(&tail[start..], to));
            }
            if suffix_match(tail, &lower, to).is_some() {
                return tail.to_string();
            }
        }

        if UNCOUNTABLES
            .iter()
            .any(|word| suffix_match(tail, &lower, word).is_some())
        {
            return tail.to_string();
        }

        let rules = match direction {
            Direction::Singular => &self.singulars,
            Direction::Plural => &self.plurals,
        };
        rules
            .iter()
            .find(|rule| rule.pattern.is_match(tail))
            .map(|rule| rule.pattern.replace(tail, rule.replacement).into_owned())
            .unwrap_or_else(|| tail.to_string())
    }
}

/// Find `form` at the end of `word`, either as the whole word or starting
/// at a CamelCase boundary. Returns the byte offset of the match.
fn suffix_match(word: &str, lower: &str, form: &str) -> Option<usize> {
    if form.is_empty() || !lower.ends_with(form) {
        return None;
    }
    let start = lower.len() - form.len();
    if start == 0 || word.as_bytes()[start].is_ascii_uppercase() {
        Some(start)
    } else {
        None
    }
}

/// Render `replacement` in the casing pattern of `matched`
fn match_case(matched: &str, replacement: &str) -> String {
    let all_upper = matched.len() > 1 && matched.chars().all(|c| c.is_ascii_uppercase());
    if all_upper {
        return replacement.to_ascii_uppercase();
    }

    let first_upper = matched.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if first_upper => first.to_ascii_uppercase().to_string() + chars.as_str(),
        _ => replacement.to_string(),
    }
}
