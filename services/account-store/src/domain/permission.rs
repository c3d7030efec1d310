//! 权限聚合结果
//!
//! 一个 `PermissionGroup` 对应权限聚合查询的一行：同一 `(domain_id, resource_id)`
//! 下的所有 action 被合并为一个集合。

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::resolver::ResolveError;

/// 通配符标记，保留字
pub const WILDCARD_TOKEN: &str = "*";

/// 字面名称恰好为 `*` 时的转义形式
pub const ESCAPED_WILDCARD_TOKEN: &str = "\\*";

/// 权限的一个维度（domain / action / resource）
///
/// 数据库中的 NULL 引用映射为 `Any`，与名称为 `*` 的真实记录（`Named("*")`）不同。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Any,
    Named(String),
}

impl Dimension {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// 渲染为描述符中的片段
    pub fn token(&self) -> Cow<'_, str> {
        match self {
            Self::Any => Cow::Borrowed(WILDCARD_TOKEN),
            Self::Named(name) if name == WILDCARD_TOKEN => Cow::Borrowed(ESCAPED_WILDCARD_TOKEN),
            Self::Named(name) => Cow::Borrowed(name.as_str()),
        }
    }

    /// `token` 的逆操作
    pub fn from_token(token: &str) -> Self {
        match token {
            WILDCARD_TOKEN => Self::Any,
            ESCAPED_WILDCARD_TOKEN => Self::named(WILDCARD_TOKEN),
            other => Self::named(other),
        }
    }
}

impl From<Option<String>> for Dimension {
    fn from(name: Option<String>) -> Self {
        name.map_or(Self::Any, Self::Named)
    }
}

impl From<&str> for Dimension {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// 权限聚合查询返回的原始行
///
/// 维度名称保留 NULL；`actions`/`resources` 为数据库数组聚合结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPermissionGroup {
    pub domain_id: Option<i32>,
    pub resource_id: Option<i32>,
    pub domain: Option<String>,
    pub actions: Option<Vec<Option<String>>>,
    pub resources: Option<Vec<Option<String>>>,
}

/// 一个 (domain, resource) 分组下的有效权限
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionGroup {
    pub domain: Dimension,
    pub actions: BTreeSet<Dimension>,
    pub resources: BTreeSet<Dimension>,
}

impl PermissionGroup {
    pub fn new(
        domain: Dimension,
        actions: impl IntoIterator<Item = Dimension>,
        resources: impl IntoIterator<Item = Dimension>,
    ) -> Self {
        Self {
            domain,
            actions: actions.into_iter().collect(),
            resources: resources.into_iter().collect(),
        }
    }

    /// 紧凑描述符：`domain:action1,action2:resource`
    pub fn descriptor(&self) -> String {
        format!(
            "{}:{}:{}",
            self.domain.token(),
            join_tokens(&self.actions),
            join_tokens(&self.resources)
        )
    }
}

impl fmt::Display for PermissionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl TryFrom<RawPermissionGroup> for PermissionGroup {
    type Error = ResolveError;

    fn try_from(raw: RawPermissionGroup) -> Result<Self, Self::Error> {
        let actions = collect_dimensions(raw.actions, "actions")?;
        let resources = collect_dimensions(raw.resources, "resources")?;

        Ok(Self {
            domain: Dimension::from(raw.domain),
            actions,
            resources,
        })
    }
}

fn collect_dimensions(
    values: Option<Vec<Option<String>>>,
    field: &'static str,
) -> Result<BTreeSet<Dimension>, ResolveError> {
    let dimensions: BTreeSet<Dimension> = values
        .ok_or(ResolveError::MissingField(field))?
        .into_iter()
        .map(Dimension::from)
        .collect();

    if dimensions.is_empty() {
        return Err(ResolveError::MissingField(field));
    }
    Ok(dimensions)
}

pub(crate) fn join_tokens(dimensions: &BTreeSet<Dimension>) -> String {
    dimensions
        .iter()
        .map(|d| d.token())
        .collect::<Vec<_>>()
        .join(",")
}

/// 按 domain 分组的已解析权限
pub type PermissionsByDomain<P> = HashMap<Dimension, Vec<P>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        domain: Option<&str>,
        actions: &[Option<&str>],
        resources: &[Option<&str>],
    ) -> RawPermissionGroup {
        let owned = |values: &[Option<&str>]| {
            Some(values.iter().map(|v| v.map(str::to_string)).collect())
        };
        RawPermissionGroup {
            domain_id: None,
            resource_id: None,
            domain: domain.map(str::to_string),
            actions: owned(actions),
            resources: owned(resources),
        }
    }

    #[test]
    fn test_null_dimensions_render_as_wildcard() {
        let group = PermissionGroup::try_from(raw(None, &[Some("paint")], &[None])).unwrap();

        assert_eq!(group.domain, Dimension::Any);
        assert_eq!(group.descriptor(), "*:paint:*");
    }

    #[test]
    fn test_literal_star_is_not_the_wildcard() {
        let literal = PermissionGroup::try_from(raw(Some("*"), &[Some("paint")], &[None])).unwrap();

        assert_eq!(literal.domain, Dimension::named("*"));
        assert_ne!(literal.domain, Dimension::Any);
        assert_eq!(literal.descriptor(), "\\*:paint:*");
    }

    #[test]
    fn test_actions_are_a_set() {
        let group = PermissionGroup::try_from(raw(
            Some("money"),
            &[Some("deposit"), Some("access"), Some("deposit")],
            &[Some("ransom")],
        ))
        .unwrap();

        assert_eq!(group.actions.len(), 2);
        assert!(group.actions.contains(&Dimension::named("access")));
        assert!(group.actions.contains(&Dimension::named("deposit")));
        assert_eq!(group.descriptor(), "money:access,deposit:ransom");
    }

    #[test]
    fn test_fully_specified_permission_passes_unchanged() {
        let group = PermissionGroup::try_from(raw(
            Some("leatherduffelbag"),
            &[Some("transport")],
            &[Some("theringer")],
        ))
        .unwrap();

        assert_eq!(group.descriptor(), "leatherduffelbag:transport:theringer");
    }

    #[test]
    fn test_missing_aggregate_is_structural_failure() {
        let mut record = raw(Some("money"), &[Some("write")], &[None]);
        record.actions = None;
        assert_eq!(
            PermissionGroup::try_from(record),
            Err(ResolveError::MissingField("actions"))
        );

        let mut record = raw(Some("money"), &[Some("write")], &[None]);
        record.resources = Some(Vec::new());
        assert_eq!(
            PermissionGroup::try_from(record),
            Err(ResolveError::MissingField("resources"))
        );
    }

    #[test]
    fn test_token_round_trip() {
        for dimension in [Dimension::Any, Dimension::named("*"), Dimension::named("money")] {
            assert_eq!(Dimension::from_token(&dimension.token()), dimension);
        }
    }
}
