//! 通配符权限
//!
//! 形如 `domain:action1,action2:target` 的三段式权限。任一段为 `*` 时匹配该维度的所有取值，
//! 缺省的尾段等价于 `*`。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::permission::{Dimension, PermissionGroup, join_tokens};
use super::resolver::ResolveError;

const PART_DIVIDER: char = ':';
const SUBPART_DIVIDER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardPermission {
    domain: Dimension,
    actions: BTreeSet<Dimension>,
    targets: BTreeSet<Dimension>,
}

impl WildcardPermission {
    pub fn new(
        domain: Dimension,
        actions: impl IntoIterator<Item = Dimension>,
        targets: impl IntoIterator<Item = Dimension>,
    ) -> Self {
        Self {
            domain,
            actions: normalize(actions.into_iter().collect()),
            targets: normalize(targets.into_iter().collect()),
        }
    }

    pub fn domain(&self) -> &Dimension {
        &self.domain
    }

    pub fn actions(&self) -> &BTreeSet<Dimension> {
        &self.actions
    }

    pub fn targets(&self) -> &BTreeSet<Dimension> {
        &self.targets
    }

    /// 当前权限是否覆盖 `other`
    pub fn implies(&self, other: &WildcardPermission) -> bool {
        let domain_matches = self.domain.is_any() || self.domain == other.domain;
        domain_matches
            && part_implies(&self.actions, &other.actions)
            && part_implies(&self.targets, &other.targets)
    }
}

/// 含 `Any` 的段收缩为只含 `Any`
fn normalize(part: BTreeSet<Dimension>) -> BTreeSet<Dimension> {
    if part.is_empty() || part.contains(&Dimension::Any) {
        return BTreeSet::from([Dimension::Any]);
    }
    part
}

fn part_implies(mine: &BTreeSet<Dimension>, theirs: &BTreeSet<Dimension>) -> bool {
    if mine.contains(&Dimension::Any) {
        return true;
    }
    !theirs.contains(&Dimension::Any) && theirs.is_subset(mine)
}

fn parse_part(part: &str) -> Result<BTreeSet<Dimension>, ResolveError> {
    part.split(SUBPART_DIVIDER)
        .map(str::trim)
        .map(|token| {
            if token.is_empty() {
                Err(ResolveError::Malformed(format!("empty token in part '{}'", part)))
            } else {
                Ok(Dimension::from_token(token))
            }
        })
        .collect()
}

impl From<&PermissionGroup> for WildcardPermission {
    fn from(group: &PermissionGroup) -> Self {
        Self::new(
            group.domain.clone(),
            group.actions.iter().cloned(),
            group.resources.iter().cloned(),
        )
    }
}

impl FromStr for WildcardPermission {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ResolveError::Malformed("permission string is empty".to_string()));
        }

        let parts: Vec<&str> = s.split(PART_DIVIDER).collect();
        if parts.len() > 3 {
            return Err(ResolveError::Malformed(format!(
                "permission '{}' has more than three parts",
                s
            )));
        }

        let domain_token = parts[0].trim();
        if domain_token.is_empty() || domain_token.contains(SUBPART_DIVIDER) {
            return Err(ResolveError::Malformed(format!(
                "permission '{}' must name exactly one domain",
                s
            )));
        }

        let actions = match parts.get(1) {
            Some(part) => parse_part(part)?,
            None => BTreeSet::new(),
        };
        let targets = match parts.get(2) {
            Some(part) => parse_part(part)?,
            None => BTreeSet::new(),
        };

        Ok(Self::new(Dimension::from_token(domain_token), actions, targets))
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.domain.token(),
            join_tokens(&self.actions),
            join_tokens(&self.targets)
        )
    }
}
