// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package requirement expression handling.

Requirements are expressed against *capabilities*: a package name, a
shared library soname, or an installed file path. A requirement
expression is either a bare capability name or `NAME (OP VERSION)` with
OP one of `=`, `<`, `<=`, `>`, `>=`. The doubled forms `<<` and `>>` are
accepted as synonyms for `<` and `>`.
*/

use {
    crate::{
        error::{AcquireError, Result},
        package_version::PackageVersion,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
    },
};

/// Regular expression to parse requirement expressions.
static RE_REQUIREMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ^
        # Capability name terminates at whitespace. Parentheses stay in:
        # soname capabilities look like `libc.so.6()(64bit)`.
        (?P<capability>\S+)
        \s*
        # Version constraint is within an optional parenthesis.
        (?:\(
            \s*
            (?P<relop>(<<|<=|=|>=|>>|<|>))
            \s*
            (?P<version>[^\s)]+)
            \s*
        \))?
        "#,
    )
    .unwrap()
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VersionRelationship {
    StrictlyEarlier,
    EarlierOrEqual,
    ExactlyEqual,
    LaterOrEqual,
    StrictlyLater,
}

impl VersionRelationship {
    fn from_operator(s: &str) -> Option<Self> {
        match s {
            "<" | "<<" => Some(Self::StrictlyEarlier),
            "<=" => Some(Self::EarlierOrEqual),
            "=" => Some(Self::ExactlyEqual),
            ">=" => Some(Self::LaterOrEqual),
            ">" | ">>" => Some(Self::StrictlyLater),
            _ => None,
        }
    }
}

impl Display for VersionRelationship {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrictlyEarlier => write!(f, "<"),
            Self::EarlierOrEqual => write!(f, "<="),
            Self::ExactlyEqual => write!(f, "="),
            Self::LaterOrEqual => write!(f, ">="),
            Self::StrictlyLater => write!(f, ">"),
        }
    }
}

/// A version bound on a required capability.
#[derive(Clone, Debug)]
pub struct VersionConstraint {
    pub relationship: VersionRelationship,
    pub version: PackageVersion,
}

impl VersionConstraint {
    /// Evaluate whether a concrete version satisfies this constraint.
    pub fn satisfied_by(&self, candidate: &PackageVersion) -> bool {
        matches!(
            (candidate.cmp(&self.version), self.relationship),
            (
                Ordering::Equal,
                VersionRelationship::ExactlyEqual
                    | VersionRelationship::LaterOrEqual
                    | VersionRelationship::EarlierOrEqual,
            ) | (
                Ordering::Less,
                VersionRelationship::StrictlyEarlier | VersionRelationship::EarlierOrEqual,
            ) | (
                Ordering::Greater,
                VersionRelationship::StrictlyLater | VersionRelationship::LaterOrEqual,
            )
        )
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.relationship, self.version)
    }
}

/// A single parsed requirement: a capability with an optional version bound.
#[derive(Clone, Debug)]
pub struct Requirement {
    pub capability: String,
    pub constraint: Option<VersionConstraint>,
}

impl Requirement {
    /// Parse a requirement expression.
    pub fn parse(s: &str) -> Result<Self> {
        let caps = RE_REQUIREMENT
            .captures(s.trim())
            .ok_or_else(|| AcquireError::RequirementParse(s.to_string()))?;

        let capability = caps["capability"].to_string();

        let constraint = match (caps.name("relop"), caps.name("version")) {
            (Some(relop), Some(version)) => {
                let relationship = VersionRelationship::from_operator(relop.as_str())
                    .ok_or_else(|| AcquireError::RequirementParse(s.to_string()))?;

                Some(VersionConstraint {
                    relationship,
                    version: PackageVersion::parse(version.as_str()),
                })
            }
            _ => None,
        };

        Ok(Self {
            capability,
            constraint,
        })
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.capability)?;
        if let Some(constraint) = &self.constraint {
            write!(f, " ({})", constraint)?;
        }

        Ok(())
    }
}

/// Reduce a raw requirement name to the capability base used for lookup.
///
/// Takes the first whitespace-separated token, drops a trailing
/// `()(64bit)` marker, and unwraps a leading parenthesis from boolean
/// requirement syntax. Can return an empty string, which callers skip.
pub fn requirement_base(name: &str) -> &str {
    let token = name.split_whitespace().next().unwrap_or("");
    let token = token.strip_suffix("()(64bit)").unwrap_or(token);

    token.strip_prefix('(').unwrap_or(token)
}
