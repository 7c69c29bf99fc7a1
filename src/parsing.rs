use std::cmp::Ordering;

use semver::Version;

/// A parsed version directory name.
///
/// SDK generators are not consistent about how they name version folders, so a
/// name is parsed into the most specific shape it fits:
/// - `v2021_01_01`, `2021-01-01`, `v2018_09_01_preview` are dates
/// - `v1.2.3`, `1.2.3-beta.1` are semver versions
/// - `v7_0`, `v7.1`, `v3`, `v5_1_preview` are plain numeric sequences
///
/// Anything else that still looks like a version folder is kept as `Opaque`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionId {
    Date {
        year: u16,
        month: u8,
        day: u8,
        label: Option<String>,
    },
    Semver(Version),
    Numeric {
        parts: Vec<u64>,
        label: Option<String>,
    },
    Opaque(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionKind {
    Date,
    Semver,
    Numeric,
    Opaque,
}

impl VersionId {
    pub fn kind(&self) -> VersionKind {
        match self {
            VersionId::Date { .. } => VersionKind::Date,
            VersionId::Semver(_) => VersionKind::Semver,
            VersionId::Numeric { .. } => VersionKind::Numeric,
            VersionId::Opaque(_) => VersionKind::Opaque,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, VersionId::Opaque(_))
    }

    /// Compare two ids by value.
    ///
    /// Semver and numeric ids are both integer sequences and compare with each
    /// other. Returns `None` for a date against anything else, or when either
    /// side is opaque, since there is no meaningful order between those.
    pub fn cmp_value(&self, other: &VersionId) -> Option<Ordering> {
        match (self, other) {
            (
                VersionId::Date {
                    year: y1,
                    month: m1,
                    day: d1,
                    label: l1,
                },
                VersionId::Date {
                    year: y2,
                    month: m2,
                    day: d2,
                    label: l2,
                },
            ) => Some(
                (y1, m1, d1)
                    .cmp(&(y2, m2, d2))
                    .then_with(|| cmp_labels(l1, l2)),
            ),
            (VersionId::Semver(a), VersionId::Semver(b)) => Some(a.cmp(b)),
            (
                VersionId::Numeric {
                    parts: p1,
                    label: l1,
                },
                VersionId::Numeric {
                    parts: p2,
                    label: l2,
                },
            ) => Some(cmp_parts(p1, p2).then_with(|| cmp_labels(l1, l2))),
            (VersionId::Semver(_), VersionId::Numeric { .. })
            | (VersionId::Numeric { .. }, VersionId::Semver(_)) => self.cmp_sequence(other),
            _ => None,
        }
    }

    /// Compare as plain integer sequences plus label, with a semver
    /// pre-release standing in for the label.
    ///
    /// Unlike [`cmp_value`](Self::cmp_value) this is the same ordering for
    /// every pair of semver and numeric ids, so a surface mixing both can be
    /// sorted with it.
    pub fn cmp_sequence(&self, other: &VersionId) -> Option<Ordering> {
        let (p1, l1) = self.sequence()?;
        let (p2, l2) = other.sequence()?;
        Some(cmp_parts(&p1, &p2).then_with(|| cmp_labels(&l1, &l2)))
    }

    fn sequence(&self) -> Option<(Vec<u64>, Option<String>)> {
        match self {
            VersionId::Semver(v) => {
                let label = (!v.pre.is_empty()).then(|| v.pre.as_str().to_ascii_lowercase());
                Some((vec![v.major, v.minor, v.patch], label))
            }
            VersionId::Numeric { parts, label } => Some((parts.clone(), label.clone())),
            _ => None,
        }
    }
}

/// Returns true if `name` follows the version folder naming convention: an
/// optional leading `v` followed by a digit.
pub fn is_version_dir_name(name: &str) -> bool {
    strip_prefix_v(name)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

/// Parse a version directory name into a [`VersionId`].
///
/// Never fails: names that match the folder convention but not any known
/// shape come back as [`VersionId::Opaque`].
pub fn parse_version_id(name: &str) -> VersionId {
    let body = strip_prefix_v(name);
    let opaque = || VersionId::Opaque(name.to_string());

    if !is_version_dir_name(name) {
        return opaque();
    }

    // Semver wants exactly three numeric components, so "7.0" falls through
    if body.contains('.')
        && let Ok(version) = Version::parse(body)
    {
        return VersionId::Semver(version);
    }

    let tokens: Vec<&str> = body.split(['_', '-', '.']).collect();
    let numeric_len = tokens
        .iter()
        .take_while(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .count();
    if numeric_len == 0 {
        return opaque();
    }

    let label = match parse_label(&tokens[numeric_len..]) {
        Some(label) => label,
        None => return opaque(),
    };

    let digits = &tokens[..numeric_len];
    if let Some((year, month, day)) = parse_date(digits) {
        return VersionId::Date {
            year,
            month,
            day,
            label,
        };
    }

    let parts: Option<Vec<u64>> = digits.iter().map(|t| t.parse().ok()).collect();
    match parts {
        Some(parts) => VersionId::Numeric { parts, label },
        None => opaque(),
    }
}

fn strip_prefix_v(name: &str) -> &str {
    name.strip_prefix(['v', 'V']).unwrap_or(name)
}

/// `Some(None)` when there is no label, `Some(Some(..))` for a valid label
/// and `None` when the trailing tokens are not a label at all.
fn parse_label(tokens: &[&str]) -> Option<Option<String>> {
    if tokens.is_empty() {
        return Some(None);
    }
    let starts_alpha = tokens[0]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    let well_formed = tokens
        .iter()
        .all(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric()));
    if !starts_alpha || !well_formed {
        return None;
    }
    Some(Some(tokens.join("_").to_ascii_lowercase()))
}

fn parse_date(digits: &[&str]) -> Option<(u16, u8, u8)> {
    let [year, month, day] = digits else {
        return None;
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    let year: u16 = year.parse().ok()?;
    let month: u8 = month.parse().ok()?;
    let day: u8 = day.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((year, month, day))
}

/// A release sorts above any labelled build (preview, beta) of itself.
fn cmp_labels(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Missing trailing components count as zero, so `7` == `7_0`.
fn cmp_parts(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
