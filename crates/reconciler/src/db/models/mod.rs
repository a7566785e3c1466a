/// 数据库模型
pub mod task;
pub mod token;
pub mod vm;
