//! Book alias table

use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical book names with the abbreviations folded onto them
const BOOKS: &[(&str, &[&str])] = &[
    ("Genesis", &["gen", "ge", "gn"]),
    ("Exodus", &["exod", "exo", "ex"]),
    ("Leviticus", &["lev", "le", "lv"]),
    ("Numbers", &["num", "nu", "nm", "nb"]),
    ("Deuteronomy", &["deut", "dt", "de"]),
    ("Joshua", &["josh", "jos", "jsh"]),
    ("Judges", &["judg", "jdg", "jg"]),
    ("Ruth", &["rth", "ru"]),
    ("1 Samuel", &["1sam", "1sa", "1sm"]),
    ("2 Samuel", &["2sam", "2sa", "2sm"]),
    ("1 Kings", &["1kgs", "1ki", "1kin"]),
    ("2 Kings", &["2kgs", "2ki", "2kin"]),
    ("1 Chronicles", &["1chron", "1chr", "1ch"]),
    ("2 Chronicles", &["2chron", "2chr", "2ch"]),
    ("Ezra", &["ezr"]),
    ("Nehemiah", &["neh", "ne"]),
    ("Esther", &["esth", "est", "es"]),
    ("Job", &["jb"]),
    ("Psalms", &["psalm", "ps", "psa", "pss", "psm"]),
    ("Proverbs", &["prov", "pro", "prv", "pr"]),
    ("Ecclesiastes", &["eccles", "eccl", "ecc", "qoh"]),
    ("Song of Solomon", &["song", "songofsongs", "sos", "canticles"]),
    ("Isaiah", &["isa", "is"]),
    ("Jeremiah", &["jer", "je"]),
    ("Lamentations", &["lam", "la"]),
    ("Ezekiel", &["ezek", "eze", "ezk"]),
    ("Daniel", &["dan", "da", "dn"]),
    ("Hosea", &["hos", "ho"]),
    ("Joel", &["jl"]),
    ("Amos", &["am"]),
    ("Obadiah", &["obad", "ob"]),
    ("Jonah", &["jon", "jnh"]),
    ("Micah", &["mic", "mc"]),
    ("Nahum", &["nah", "na"]),
    ("Habakkuk", &["hab", "hb"]),
    ("Zephaniah", &["zeph", "zep", "zp"]),
    ("Haggai", &["hag", "hg"]),
    ("Zechariah", &["zech", "zec", "zc"]),
    ("Malachi", &["mal", "ml"]),
    ("Matthew", &["matt", "mat", "mt"]),
    ("Mark", &["mrk", "mar", "mk", "mr"]),
    ("Luke", &["luk", "lk"]),
    ("John", &["joh", "jhn", "jn"]),
    ("Acts", &["act", "ac"]),
    ("Romans", &["rom", "ro", "rm"]),
    ("1 Corinthians", &["1cor", "1co"]),
    ("2 Corinthians", &["2cor", "2co"]),
    ("Galatians", &["gal", "ga"]),
    ("Ephesians", &["eph", "ephes"]),
    ("Philippians", &["phil", "php", "pp"]),
    ("Colossians", &["col", "co"]),
    ("1 Thessalonians", &["1thess", "1thes", "1th"]),
    ("2 Thessalonians", &["2thess", "2thes", "2th"]),
    ("1 Timothy", &["1tim", "1ti"]),
    ("2 Timothy", &["2tim", "2ti"]),
    ("Titus", &["tit", "ti"]),
    ("Philemon", &["philem", "phm", "pm"]),
    ("Hebrews", &["heb"]),
    ("James", &["jas", "jm"]),
    ("1 Peter", &["1pet", "1pe", "1pt"]),
    ("2 Peter", &["2pet", "2pe", "2pt"]),
    ("1 John", &["1jn", "1jhn", "1jo"]),
    ("2 John", &["2jn", "2jhn", "2jo"]),
    ("3 John", &["3jn", "3jhn", "3jo"]),
    ("Jude", &["jud", "jd"]),
    ("Revelation", &["rev", "re", "revelations", "apocalypse"]),
];

fn alias_table() -> &'static HashMap<String, &'static str> {
    static TABLE: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for (canonical, aliases) in BOOKS {
            table.insert(book_key(canonical), *canonical);
            for alias in aliases.iter() {
                table.insert(book_key(alias), *canonical);
            }
        }
        table
    })
}

/// Lookup key for a book name: lowercase, no dots or spaces, with
/// ordinal prefixes ("I", "First", "1st") folded to digits
pub(crate) fn book_key(raw: &str) -> String {
    let cleaned = raw.replace('.', " ").to_lowercase();
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    let ordinal = match words.first().copied() {
        Some("i") | Some("first") | Some("1st") if words.len() > 1 => Some("1"),
        Some("ii") | Some("second") | Some("2nd") if words.len() > 1 => Some("2"),
        Some("iii") | Some("third") | Some("3rd") if words.len() > 1 => Some("3"),
        _ => None,
    };
    if let Some(digit) = ordinal {
        words[0] = digit;
    }

    words.concat()
}

/// Canonical display name for a book; unknown books are title-cased
pub fn canonical_book(raw: &str) -> String {
    if let Some(name) = alias_table().get(&book_key(raw)) {
        return (*name).to_string();
    }

    raw.replace('.', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
