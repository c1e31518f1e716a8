//! 配置校验模块
//!
//! 校验规则：
//! - simulation.events > 0, account_pool > 0
//! - batch_size (若显式给出) 在 1..=MAX_BATCH_SIZE
//! - pull_consumers >= 1, retry.max_attempts >= 1
//! - push_batch_size >= 1
//! - modes 非空且不重复
//! - 数据库文件名非空且互不相同

use std::collections::HashSet;

use contracts::{ContractError, SimulationBlueprint, MAX_BATCH_SIZE};

/// 校验 SimulationBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    validate_simulation(blueprint)?;
    validate_consumer(blueprint)?;
    validate_dispatch(blueprint)?;
    validate_modes(blueprint)?;
    validate_storage(blueprint)?;
    Ok(())
}

/// 校验事件生成设置
fn validate_simulation(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let sim = &blueprint.simulation;
    if sim.events == 0 {
        return Err(ContractError::config_validation(
            "simulation.events",
            "event count must be > 0",
        ));
    }
    if sim.account_pool == 0 {
        return Err(ContractError::config_validation(
            "simulation.account_pool",
            "account pool must be > 0",
        ));
    }
    Ok(())
}

/// 校验消费者设置
fn validate_consumer(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let consumer = &blueprint.consumer;
    if let Some(batch_size) = consumer.batch_size {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(ContractError::config_validation(
                "consumer.batch_size",
                format!("batch_size must be in 1..={MAX_BATCH_SIZE}, got {batch_size}"),
            ));
        }
    }
    if consumer.pull_consumers == 0 {
        return Err(ContractError::config_validation(
            "consumer.pull_consumers",
            "at least one pull consumer is required",
        ));
    }
    if consumer.retry.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "consumer.retry.max_attempts",
            "max_attempts must be >= 1",
        ));
    }
    Ok(())
}

/// 校验分发设置
fn validate_dispatch(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let dispatch = &blueprint.dispatch;
    if dispatch.push_batch_size == 0 {
        return Err(ContractError::config_validation(
            "dispatch.push_batch_size",
            "push_batch_size must be >= 1",
        ));
    }
    if dispatch.push_batch_size > MAX_BATCH_SIZE {
        return Err(ContractError::config_validation(
            "dispatch.push_batch_size",
            format!("push_batch_size must be <= {MAX_BATCH_SIZE}"),
        ));
    }
    Ok(())
}

/// 校验运行模式列表
fn validate_modes(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    if blueprint.modes.is_empty() {
        return Err(ContractError::config_validation(
            "modes",
            "at least one mode is required",
        ));
    }
    let mut seen = HashSet::new();
    for mode in &blueprint.modes {
        if !seen.insert(mode) {
            return Err(ContractError::config_validation(
                format!("modes[{mode}]"),
                "duplicate mode",
            ));
        }
    }
    Ok(())
}

/// 校验存储设置
fn validate_storage(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let storage = &blueprint.storage;
    for (field, name) in [
        ("storage.pull_db", &storage.pull_db),
        ("storage.push_db", &storage.push_db),
    ] {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                field,
                "database file name must not be empty",
            ));
        }
    }
    if storage.pull_db == storage.push_db {
        return Err(ContractError::config_validation(
            "storage.push_db",
            format!("pull and push must use different databases, both are '{}'", storage.pull_db),
        ));
    }
    Ok(())
}
