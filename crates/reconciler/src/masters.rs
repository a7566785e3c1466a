/// 主节点识别
///
/// 创建时间最早的计算资源被视为集群主节点，永远不参与开关机。
/// 结果在第一次得到非空集合后缓存，之后不再重新计算。

use chrono::NaiveDateTime;
use common::utils::parse_creation_time;
use common::{Resource, Result};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MasterClassifier {
    masters: Option<HashSet<String>>,
}

impl MasterClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回主节点 ID 集合，首次调用时根据 `resources` 计算
    pub fn masters(&mut self, resources: &[Resource]) -> Result<HashSet<String>> {
        if let Some(masters) = &self.masters {
            return Ok(masters.clone());
        }

        let masters = classify(resources)?;
        if !masters.is_empty() {
            debug!("识别到主节点: {:?}", masters);
            self.masters = Some(masters.clone());
        }
        Ok(masters)
    }
}

/// 按快照顺序扫描，创建时间不晚于当前最小值的资源都计入主节点
///
/// 阈值在扫描过程中逐步下降，因此乱序快照或同一分钟创建的多个资源都可能被计入
pub fn classify(resources: &[Resource]) -> Result<HashSet<String>> {
    let mut threshold: Option<NaiveDateTime> = None;
    let mut masters = HashSet::new();

    for resource in resources {
        let created = parse_creation_time(&resource.creation_time)?;
        if threshold.map_or(true, |t| created <= t) {
            threshold = Some(created);
            masters.insert(resource.uuid.clone());
        }
    }

    Ok(masters)
}
