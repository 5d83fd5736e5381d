use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{AuthzError, PermissionGraph};
use crate::db::row_parsers::operation_from_row;
use crate::models::rbac::{EffectiveOperation, EffectiveOperations, Operation};

const OPERATION_COLUMNS: &str = "id, name, code, description, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqlitePermissionGraph {
    pool: SqlitePool,
}

impl SqlitePermissionGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_operations(&self) -> Result<Vec<Operation>, AuthzError> {
        let rows = sqlx::query(&format!("SELECT {OPERATION_COLUMNS} FROM operations ORDER BY code"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| operation_from_row(row).map_err(AuthzError::from))
            .collect()
    }

    /// Every operation the user can reach, with the roles granting it.
    pub async fn effective_operations(&self, user_id: i64) -> Result<EffectiveOperations, AuthzError> {
        let rows = sqlx::query(
            r#"
            SELECT o.code, o.name, r.name AS role_name
            FROM operations o
            INNER JOIN role_operations ro ON ro.operation_id = o.id
            INNER JOIN roles r ON r.id = ro.role_id
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ? AND ro.can_access = 1
            ORDER BY o.code, r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_code: BTreeMap<String, EffectiveOperation> = BTreeMap::new();
        for row in rows {
            let code: String = row.try_get("code")?;
            let name: String = row.try_get("name")?;
            let role_name: String = row.try_get("role_name")?;
            by_code
                .entry(code.clone())
                .or_insert_with(|| EffectiveOperation {
                    code,
                    name,
                    granted_by: Vec::new(),
                })
                .granted_by
                .push(role_name);
        }

        Ok(EffectiveOperations {
            user_id,
            operations: by_code.into_values().collect(),
        })
    }
}

#[async_trait]
impl PermissionGraph for SqlitePermissionGraph {
    async fn find_operation(&self, code: &str) -> Result<Operation, AuthzError> {
        let row = sqlx::query(&format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE code = ?"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AuthzError::NotFound(code.to_string()))?;

        Ok(operation_from_row(&row)?)
    }

    async fn has_operation_access(&self, user_id: i64, operation_id: i64) -> Result<bool, AuthzError> {
        let grants: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_roles ur
            INNER JOIN role_operations ro ON ro.role_id = ur.role_id
            WHERE ur.user_id = ? AND ro.operation_id = ? AND ro.can_access = 1
            "#,
        )
        .bind(user_id)
        .bind(operation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(grants > 0)
    }
}
