/// 待处理任务数据模型

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 任务模型
///
/// `id` 自增，加载时按 `id` 排序以保持入队顺序
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orchestrator_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub node_name: String,
    pub operation: i32,  // 0 = power off, 1 = power on
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
