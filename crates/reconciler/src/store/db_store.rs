/// 基于 SeaORM 的状态存储

use async_trait::async_trait;
use common::{Error, Result, Task};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use super::{StateStore, StoredTask};
use crate::db::models::task::{
    ActiveModel as TaskActiveModel, Column as TaskColumn, Entity as TaskEntity,
};
use crate::db::models::token::{ActiveModel as TokenActiveModel, Entity as TokenEntity};
use crate::db::models::vm::{ActiveModel as VmActiveModel, Column as VmColumn, Entity as VmEntity};

/// 令牌表中唯一一行的主键
const TOKEN_ROW_ID: i32 = 0;

#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn db_err(e: sea_orm::DbErr) -> Error {
    Error::Database(e.to_string())
}

#[async_trait]
impl StateStore for DbStore {
    async fn load_vms(&self) -> Result<Vec<(String, String)>> {
        let rows = VmEntity::find()
            .order_by_asc(VmColumn::NodeName)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(|row| (row.node_name, row.uuid)).collect())
    }

    async fn insert_vm(&self, node_name: &str, vm_id: &str) -> Result<()> {
        let vm_active = VmActiveModel {
            node_name: Set(node_name.to_string()),
            uuid: Set(vm_id.to_string()),
        };

        VmEntity::insert(vm_active)
            .on_conflict(
                OnConflict::column(VmColumn::NodeName)
                    .update_column(VmColumn::Uuid)
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn delete_vm(&self, node_name: &str) -> Result<()> {
        VmEntity::delete_many()
            .filter(VmColumn::NodeName.eq(node_name))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn load_tasks(&self) -> Result<Vec<StoredTask>> {
        let rows = TaskEntity::find()
            .order_by_asc(TaskColumn::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| StoredTask {
                node_name: row.node_name,
                operation: row.operation,
            })
            .collect())
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        let task_active = TaskActiveModel {
            node_name: Set(task.node_name.clone()),
            operation: Set(task.operation.as_i32()),
            ..Default::default()
        };

        TaskEntity::insert(task_active)
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn delete_task(&self, task: &Task) -> Result<()> {
        TaskEntity::delete_many()
            .filter(TaskColumn::NodeName.eq(task.node_name.as_str()))
            .filter(TaskColumn::Operation.eq(task.operation.as_i32()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn load_token(&self) -> Result<Option<String>> {
        let row = TokenEntity::find_by_id(TOKEN_ROW_ID)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(row.map(|row| row.token))
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        TokenEntity::delete_many()
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        let token_active = TokenActiveModel {
            id: Set(TOKEN_ROW_ID),
            token: Set(token.to_string()),
        };
        TokenEntity::insert(token_active)
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}
