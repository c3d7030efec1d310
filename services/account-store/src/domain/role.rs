use std::fmt;

/// 角色查询返回的原始行，`title` 列允许为 NULL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRecord {
    pub title: Option<String>,
}

impl RoleRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

/// 默认的角色表示
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimpleRole {
    pub title: String,
}

impl SimpleRole {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl fmt::Display for SimpleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
