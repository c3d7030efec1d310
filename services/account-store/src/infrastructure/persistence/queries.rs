//! SQL 模板
//!
//! 所有查询都以 `$1` 绑定用户 identifier。

/// 有效权限聚合
///
/// 按 `(domain_id, resource_id)` 分组并合并 action。维度名称保留 NULL，
/// 由上层转换为通配符，避免与名称恰好为 `*` 的记录混淆。
pub const PERMISSION_GROUPS: &str = r#"
    SELECT p.domain_id,
           p.resource_id,
           MAX(d.name)::text AS domain_name,
           array_agg(DISTINCT a.name::text) AS action_names,
           array_agg(DISTINCT r.name::text) AS resource_names
    FROM "user" u
    JOIN role_membership rm ON rm.user_id = u.pk_id
    JOIN role_permission rp ON rp.role_id = rm.role_id
    JOIN permission p ON p.pk_id = rp.permission_id
    LEFT JOIN domain d ON d.pk_id = p.domain_id
    LEFT JOIN action a ON a.pk_id = p.action_id
    LEFT JOIN resource r ON r.pk_id = p.resource_id
    WHERE u.identifier = $1
    GROUP BY p.domain_id, p.resource_id
    ORDER BY p.domain_id NULLS FIRST, p.resource_id NULLS FIRST
"#;

pub const ROLES: &str = r#"
    SELECT r.title::text AS title
    FROM "user" u
    JOIN role_membership rm ON rm.user_id = u.pk_id
    JOIN role r ON r.pk_id = rm.role_id
    WHERE u.identifier = $1
    ORDER BY r.pk_id
"#;

pub const CREDENTIALS: &str = r#"
    SELECT c.credential,
           ct.title::text AS credential_type,
           c.expiration_dt,
           u.account_lock_millis,
           u.phone_number::text AS phone_number
    FROM "user" u
    JOIN credential c ON c.user_id = u.pk_id
    JOIN credential_type ct ON ct.pk_id = c.credential_type_id
    WHERE u.identifier = $1
    ORDER BY c.pk_id
"#;

/// `$2` 为 NULL 时解除锁定
pub const SET_ACCOUNT_LOCK: &str = r#"
    UPDATE "user"
    SET account_lock_millis = $2
    WHERE identifier = $1
"#;
