//! 授权查询结果

use super::resolver::ResolveError;

/// 授权查询结果，区分 "没有数据" 与 "数据无法转换"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationLookup<T> {
    Found(T),
    NotFound,
    Unresolvable(ResolveError),
}

impl<T> AuthorizationLookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound | Self::Unresolvable(_) => None,
        }
    }
}

impl<T> From<Result<T, ResolveError>> for AuthorizationLookup<T> {
    fn from(result: Result<T, ResolveError>) -> Self {
        match result {
            Ok(value) => Self::Found(value),
            Err(e) => Self::Unresolvable(e),
        }
    }
}

/// 默认的授权信息表示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleAuthorizationInfo<R, P> {
    pub roles: Vec<R>,
    pub permissions: Vec<P>,
}
