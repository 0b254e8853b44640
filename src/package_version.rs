// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package version string handling.

Versions take the form `[EPOCH:]UPSTREAM[-RELEASE]`. Sorting follows the
Debian policy rules for comparing version components, with one
relaxation: a version that merely extends another past a `-`, `.`, or
`+` boundary compares equal to the shorter one. This mirrors how release
suffixes like `1.19-1.emt3` are treated as interchangeable with `1.19`
when repositories disagree about how much of the release to spell out.
*/

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

/// A parsed package version.
///
/// Parsing never fails: a missing epoch is `0` and a missing release is
/// empty. The empty version sorts before every non-empty version.
#[derive(Clone, Debug)]
pub struct PackageVersion {
    raw: String,
    epoch: u64,
    rest: String,
    upstream: String,
    release: String,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        // Epoch is the part before the first colon. Upstream and release
        // are split at the last hyphen.
        let (epoch, rest) = match s.find(':') {
            Some(pos) => (s[..pos].parse::<u64>().ok().unwrap_or(0), &s[pos + 1..]),
            None => (0, s),
        };

        let (upstream, release) = match rest.rfind('-') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };

        Self {
            raw: s.to_string(),
            epoch,
            rest: rest.to_string(),
            upstream: upstream.to_string(),
            release: release.to_string(),
        }
    }

    /// The numeric epoch component. `0` when absent.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The upstream version component.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// The release component. Empty when absent.
    pub fn release(&self) -> &str {
        &self.release
    }

    /// The version string this instance was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    PackageVersion::parse(a).cmp(&PackageVersion::parse(b))
}

/// Characters that terminate a sub-release boundary. A version extending
/// another only past one of these compares equal to the shorter one.
const PREFIX_BOUNDARY: &[u8] = b"-.+";

fn rests_equal_by_prefix(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };

    long.len() > short.len()
        && long.starts_with(short)
        && PREFIX_BOUNDARY.contains(&long.as_bytes()[short.len()])
}

/// Split a string into its leading non-digit run and the remainder.
fn split_leading_nondigits(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_ascii_digit()) {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    }
}

/// Split a string into its leading digit run and the remainder.
fn split_leading_digits(s: &str) -> (&str, &str) {
    match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => s.split_at(pos),
        None => (s, ""),
    }
}

/// Sort weight of a character at a given position, where `None` is
/// end-of-string. Tilde sorts before the end, letters before everything
/// else.
fn char_weight(c: Option<u8>) -> (u8, u8) {
    match c {
        Some(b'~') => (0, 0),
        None => (1, 0),
        Some(c) if c.is_ascii_alphabetic() => (2, c),
        Some(c) => (3, c),
    }
}

fn compare_nondigits(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();

    for pos in 0..a.len().max(b.len()) {
        match char_weight(a.get(pos).copied()).cmp(&char_weight(b.get(pos).copied())) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
    }

    Ordering::Equal
}

/// Compare digit runs numerically without overflow: strip leading
/// zeros, longer wins, equal lengths compare lexically.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');

    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare one version component (upstream or release) by alternating
/// non-digit and digit runs.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut a_remaining = a;
    let mut b_remaining = b;

    loop {
        let (a_head, a_rest) = split_leading_nondigits(a_remaining);
        let (b_head, b_rest) = split_leading_nondigits(b_remaining);

        match compare_nondigits(a_head, b_head) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        let (a_digits, a_rest) = split_leading_digits(a_rest);
        let (b_digits, b_rest) = split_leading_digits(b_rest);

        match compare_numbers(a_digits, b_digits) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        if a_rest.is_empty() && b_rest.is_empty() {
            return Ordering::Equal;
        }

        a_remaining = a_rest;
        b_remaining = b_rest;
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.raw.is_empty(), other.raw.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        if self.rest == other.rest || rests_equal_by_prefix(&self.rest, &other.rest) {
            return Ordering::Equal;
        }

        match compare_component(&self.upstream, &other.upstream) {
            Ordering::Equal => compare_component(&self.release, &other.release),
            unequal => unequal,
        }
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_components() {
        let v = PackageVersion::parse("2:1.4.0+dfsg-3.azl3");
        assert_eq!(v.epoch(), 2);
        assert_eq!(v.upstream(), "1.4.0+dfsg");
        assert_eq!(v.release(), "3.azl3");

        let v = PackageVersion::parse("1.19");
        assert_eq!(v.epoch(), 0);
        assert_eq!(v.upstream(), "1.19");
        assert_eq!(v.release(), "");
    }

    #[test]
    fn simple_ordering() {
        assert_eq!(compare("1.0.0", "2.0.0"), Ordering::Less);
        assert_eq!(compare("2.0.0", "1.0.0"), Ordering::Greater);
        assert_eq!(compare("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare("1.09", "1.9"), Ordering::Equal);
    }

    #[test]
    fn epoch_dominates() {
        assert_eq!(compare("2:1.0.0", "1:2.0.0"), Ordering::Greater);
        assert_eq!(compare("1:0.1", "999"), Ordering::Greater);
    }

    #[test]
    fn tilde_sorts_before_everything() {
        assert_eq!(compare("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(compare("1.0~~", "1.0~a"), Ordering::Less);
    }

    #[test]
    fn letters_sort_before_other_characters() {
        assert_eq!(compare("1.0a", "1.0+"), Ordering::Less);
        assert_eq!(compare("1.0+", "1.0a"), Ordering::Greater);
    }

    #[test]
    fn release_extension_is_equal() {
        assert_eq!(compare("1.19-1.emt3", "1.19"), Ordering::Equal);
        assert_eq!(compare("1.19", "1.19-1.emt3"), Ordering::Equal);
        assert_eq!(compare("8.8.0+hotfix", "8.8.0"), Ordering::Equal);
    }

    #[test]
    fn empty_sorts_first() {
        assert_eq!(compare("", "0"), Ordering::Less);
        assert_eq!(compare("0", ""), Ordering::Greater);
        assert_eq!(compare("", ""), Ordering::Equal);
    }

    #[test]
    fn ordering_is_antisymmetric_and_transitive() {
        let versions = [
            "",
            "0.1",
            "1.0~rc1",
            "1.0",
            "1.0a",
            "1.2-5",
            "1.10",
            "2:0.5",
            "10:1",
        ];

        for a in versions {
            assert_eq!(compare(a, a), Ordering::Equal);

            for b in versions {
                assert_eq!(compare(a, b), compare(b, a).reverse());

                for c in versions {
                    if compare(a, b) == Ordering::Less && compare(b, c) == Ordering::Less {
                        assert_eq!(compare(a, c), Ordering::Less, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }
    }
}
