/// 已跟踪虚拟机数据模型

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 节点名到编排器虚拟机 ID 的映射
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orchestrator_vms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub node_name: String,
    pub uuid: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
