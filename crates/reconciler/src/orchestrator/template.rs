/// 伸缩模板改写
///
/// 读取部署的 TOSCA 模板，定位工作节点所在的计算节点模板，改写 `scalable` 数量，
/// 删除时写入 `removal_list`，新增时写入 `endpoint.dns_name`

use common::models::constants::WORKER_NODE_TYPE_PREFIX;
use common::{Error, Result};
use serde_yaml::{Mapping, Value};

use super::ScaleChange;

/// 生成新的部署模板
pub fn render_scale_template(
    template: &str,
    current_count: usize,
    change: &ScaleChange,
) -> Result<String> {
    let mut doc: Value = serde_yaml::from_str(template)
        .map_err(|e| Error::Template(format!("模板解析失败: {}", e)))?;

    let node_name = find_worker_node_template(&doc)
        .ok_or_else(|| Error::Template("未找到工作节点模板".to_string()))?;

    let node_template = doc
        .get_mut("topology_template")
        .and_then(|t| t.get_mut("node_templates"))
        .and_then(|n| n.get_mut(node_name.as_str()))
        .ok_or_else(|| Error::Template(format!("节点模板 {} 不存在", node_name)))?;

    let capabilities = child(node_template, "capabilities")?;

    match change {
        ScaleChange::Remove(nodes) => {
            let base = if current_count < nodes.len() { 1 } else { current_count };
            let count = base.saturating_sub(nodes.len());

            let properties = child(child(capabilities, "scalable")?, "properties")?;
            set(properties, "count", Value::from(count as u64))?;
            set(
                properties,
                "removal_list",
                Value::Sequence(nodes.iter().map(|n| Value::from(n.as_str())).collect()),
            )?;
        }
        ScaleChange::Add(nodes) => {
            let count = current_count + nodes.len();
            let properties = child(child(capabilities, "scalable")?, "properties")?;
            set(properties, "count", Value::from(count as u64))?;

            let dns_name = match nodes.as_slice() {
                [single] => Value::from(single.as_str()),
                many => Value::Sequence(many.iter().map(|n| Value::from(n.as_str())).collect()),
            };
            let endpoint = child(child(capabilities, "endpoint")?, "properties")?;
            set(endpoint, "dns_name", dns_name)?;
        }
    }

    serde_yaml::to_string(&doc).map_err(|e| Error::Template(format!("模板序列化失败: {}", e)))
}

/// 查找工作节点所依附的计算节点模板名
pub fn find_worker_node_template(doc: &Value) -> Option<String> {
    let templates = doc
        .get("topology_template")?
        .get("node_templates")?
        .as_mapping()?;

    for node in templates.values() {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();
        if !node_type.starts_with(WORKER_NODE_TYPE_PREFIX) {
            continue;
        }
        let requirements = node.get("requirements").and_then(Value::as_sequence);
        for requirement in requirements.into_iter().flatten() {
            if let Some(host) = requirement.get("host").and_then(Value::as_str) {
                return Some(host.to_string());
            }
        }
    }

    None
}

/// 取得（必要时创建）子映射
fn child<'a>(value: &'a mut Value, key: &str) -> Result<&'a mut Value> {
    let mapping = value
        .as_mapping_mut()
        .ok_or_else(|| Error::Template(format!("{} 的上级不是映射", key)))?;

    let entry = mapping
        .entry(Value::from(key))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if entry.is_null() {
        *entry = Value::Mapping(Mapping::new());
    }
    Ok(entry)
}

fn set(value: &mut Value, key: &str, new_value: Value) -> Result<()> {
    let mapping = value
        .as_mapping_mut()
        .ok_or_else(|| Error::Template(format!("{} 的上级不是映射", key)))?;
    mapping.insert(Value::from(key), new_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
tosca_definitions_version: tosca_simple_yaml_1_0
topology_template:
  node_templates:
    lrms_wn:
      type: tosca.nodes.indigo.LRMS.WorkerNode.Slurm
      requirements:
        - host: vm_wn
    vm_wn:
      type: tosca.nodes.indigo.Compute
      capabilities:
        scalable:
          properties:
            count: 2
        host:
          properties:
            num_cpus: 1
"#;

    fn worker(doc: &str) -> Value {
        let doc: Value = serde_yaml::from_str(doc).unwrap();
        doc["topology_template"]["node_templates"]["vm_wn"].clone()
    }

    #[test]
    fn test_find_worker_node_template() {
        let doc: Value = serde_yaml::from_str(TEMPLATE).unwrap();
        assert_eq!(find_worker_node_template(&doc), Some("vm_wn".to_string()));
    }

    #[test]
    fn test_render_add_single_node() {
        let rendered =
            render_scale_template(TEMPLATE, 2, &ScaleChange::Add(vec!["wn3".to_string()])).unwrap();
        let vm = worker(&rendered);
        assert_eq!(vm["capabilities"]["scalable"]["properties"]["count"], Value::from(3u64));
        assert_eq!(vm["capabilities"]["endpoint"]["properties"]["dns_name"], Value::from("wn3"));
        assert_eq!(vm["capabilities"]["host"]["properties"]["num_cpus"], Value::from(1u64));
    }

    #[test]
    fn test_render_remove_nodes() {
        let change = ScaleChange::Remove(vec!["uuid-1".to_string(), "uuid-2".to_string()]);
        let rendered = render_scale_template(TEMPLATE, 3, &change).unwrap();
        let vm = worker(&rendered);
        let properties = &vm["capabilities"]["scalable"]["properties"];
        assert_eq!(properties["count"], Value::from(1u64));
        assert_eq!(
            properties["removal_list"],
            Value::Sequence(vec![Value::from("uuid-1"), Value::from("uuid-2")])
        );
    }

    #[test]
    fn test_render_remove_more_than_tracked() {
        let change = ScaleChange::Remove(vec!["uuid-1".to_string()]);
        let rendered = render_scale_template(TEMPLATE, 0, &change).unwrap();
        let vm = worker(&rendered);
        assert_eq!(vm["capabilities"]["scalable"]["properties"]["count"], Value::from(0u64));
    }

    #[test]
    fn test_render_without_worker_node() {
        let template = "topology_template:\n  node_templates:\n    vm:\n      type: tosca.nodes.indigo.Compute\n";
        let result = render_scale_template(template, 1, &ScaleChange::Add(vec!["x".to_string()]));
        assert!(matches!(result, Err(Error::Template(_))));
    }
}
