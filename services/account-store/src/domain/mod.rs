pub mod account;
pub mod authorization;
pub mod permission;
pub mod repository;
pub mod resolver;
pub mod role;
pub mod unit_of_work;
pub mod wildcard;

pub use account::{
    Account, AuthenticationInfo, CredentialKind, CredentialRecord, CredentialTypeMap,
    HashedCredential, StoredCredential,
};
pub use authorization::{AuthorizationLookup, SimpleAuthorizationInfo};
pub use permission::{
    Dimension, PermissionGroup, PermissionsByDomain, RawPermissionGroup, WILDCARD_TOKEN,
};
pub use repository::AccountRepository;
pub use resolver::{
    AuthorizationInfoResolver, CredentialResolver, PermissionResolver, PhcCredentialResolver,
    ResolveError, RoleResolver, SimpleAuthorizationInfoResolver, SimpleRoleResolver,
    WildcardPermissionResolver,
};
pub use role::{RoleRecord, SimpleRole};
pub use unit_of_work::{UnitOfWork, UnitOfWorkFactory};
pub use wildcard::WildcardPermission;
