//! Natural filename ordering.
//!
//! A filename splits into a prefix, a run of ASCII digits directly before
//! the extension (or the end of the name), and an extension starting at the
//! first `.`:
//!
//! ```text
//! page10.png  ->  ("page", "10", ".png")
//! img2x.png   ->  ("img2x", "", ".png")
//! chapter3    ->  ("chapter", "3", "")
//! ```
//!
//! Names sharing a prefix compare by the integer value of their digit runs
//! first, so `page2.png < page10.png` and `page2.jpg < page10.png`. Names
//! with equal prefix and value but different extensions fall back to byte
//! order (`x1.jpg < x1.png`), as do names whose prefixes differ. The
//! relation is the order of the key `(prefix, value, extension, name)`,
//! which keeps it a strict total order.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*?)([0-9]*)(\..*)?$").expect("valid filename pattern"));

/// A filename split for natural ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<'a> {
    pub prefix: &'a str,
    pub digits: &'a str,
    pub extension: &'a str,
}

impl<'a> SortKey<'a> {
    pub fn new(name: &'a str) -> Self {
        match FILENAME.captures(name) {
            Some(caps) => {
                let group = |i| caps.get(i).map_or("", |m| m.as_str());
                Self {
                    prefix: group(1),
                    digits: group(2),
                    extension: group(3),
                }
            }
            // Unreachable, the pattern matches any string
            None => Self {
                prefix: name,
                digits: "",
                extension: "",
            },
        }
    }
}

/// Compare two filenames in natural order.
pub fn compare(a: &str, b: &str) -> Ordering {
    let ka = SortKey::new(a);
    let kb = SortKey::new(b);

    ka.prefix
        .cmp(kb.prefix)
        .then_with(|| compare_digits(ka.digits, kb.digits))
        .then_with(|| ka.extension.cmp(kb.extension))
        .then_with(|| a.cmp(b))
}

/// Sort names in place in natural order.
pub fn sort(names: &mut [String]) {
    names.sort_by(|a, b| compare(a, b));
}

/// Compare digit runs by integer value without parsing, so runs of any
/// length work. An empty run sorts before every number.
fn compare_digits(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
    }
}
